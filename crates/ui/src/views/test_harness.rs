use std::sync::Arc;

use dioxus::core::NoOpMutations;
use dioxus::prelude::*;
use dioxus_router::{Routable, Router};
use url::Url;

use services::{InMemoryApi, SessionEngine};
use services::api::{FigureApi, PracticeApi};

use crate::context::{UiApp, UserContext, build_app_context};
use crate::views::practice::{PracticeIntent, PracticeTestHandles};
use crate::views::{ActivityView, CaptureView, PracticeView};

#[derive(Clone)]
struct TestApp {
    api: InMemoryApi,
    push_url: Option<Url>,
}

impl UiApp for TestApp {
    fn practice_api(&self) -> Arc<dyn PracticeApi> {
        Arc::new(self.api.clone())
    }

    fn figure_api(&self) -> Arc<dyn FigureApi> {
        Arc::new(self.api.clone())
    }

    fn user(&self) -> UserContext {
        UserContext::new("en")
    }

    fn push_url(&self) -> Option<Url> {
        self.push_url.clone()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    Practice,
    Capture(&'static str, u64),
    Activity,
}

#[derive(Props, Clone)]
struct ViewHarnessProps {
    app: Arc<TestApp>,
    view: ViewKind,
    practice_handles: PracticeTestHandles,
}

impl PartialEq for ViewHarnessProps {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl Eq for ViewHarnessProps {}

#[component]
fn ViewRouterHarness(props: ViewHarnessProps) -> Element {
    let app: Arc<dyn UiApp> = props.app.clone();
    use_context_provider(|| build_app_context(&app));
    use_context_provider(|| props.view);
    use_context_provider(|| props.practice_handles.clone());
    rsx! { Router::<TestRoute> {} }
}

#[derive(Clone, Routable, PartialEq)]
#[rustfmt::skip]
enum TestRoute {
    #[route("/")]
    Root {},
}

#[component]
fn Root() -> Element {
    let view = use_context::<ViewKind>();
    match view {
        ViewKind::Practice => rsx! { PracticeView {} },
        ViewKind::Capture(kind, id) => rsx! { CaptureView { kind: kind.to_string(), id } },
        ViewKind::Activity => rsx! { ActivityView {} },
    }
}

pub struct ViewHarness {
    pub dom: VirtualDom,
    pub api: InMemoryApi,
    pub practice: PracticeTestHandles,
}

impl ViewHarness {
    pub fn rebuild(&mut self) {
        self.dom.rebuild_in_place();
        drive_dom(&mut self.dom);
    }

    pub async fn drive_async(&mut self) {
        let _ = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            self.dom.wait_for_work(),
        )
        .await;
        self.dom.render_immediate(&mut NoOpMutations);
        self.dom.process_events();
    }

    /// Drive until pending tasks and resources have had a chance to finish.
    pub async fn settle(&mut self) {
        for _ in 0..6 {
            self.drive_async().await;
        }
    }

    pub fn dispatch(&mut self, intent: PracticeIntent) {
        let dispatch = self.practice.dispatch();
        self.dom.in_runtime(|| dispatch.call(intent));
        drive_dom(&mut self.dom);
    }

    pub fn read_engine<R>(&self, f: impl FnOnce(&SessionEngine) -> R) -> R {
        let engine = self.practice.engine();
        self.dom.in_runtime(|| f(&engine.peek()))
    }

    pub fn render(&self) -> String {
        dioxus_ssr::render(&self.dom)
    }
}

pub fn drive_dom(dom: &mut VirtualDom) {
    dom.process_events();
    dom.render_immediate(&mut NoOpMutations);
    dom.process_events();
}

pub fn setup_view_harness(view: ViewKind, api: InMemoryApi) -> ViewHarness {
    setup_view_harness_with_push(view, api, None)
}

pub fn setup_view_harness_with_push(
    view: ViewKind,
    api: InMemoryApi,
    push_url: Option<Url>,
) -> ViewHarness {
    let practice = PracticeTestHandles::default();
    let app = Arc::new(TestApp {
        api: api.clone(),
        push_url,
    });
    let dom = VirtualDom::new_with_props(
        ViewRouterHarness,
        ViewHarnessProps {
            app,
            view,
            practice_handles: practice.clone(),
        },
    );
    ViewHarness { dom, api, practice }
}
