use dioxus::prelude::*;
use dioxus_router::{Link, Outlet, Routable};

use crate::context::AppContext;
use crate::views::{ActivityView, CaptureView, PracticeView};

#[derive(Clone, Routable, PartialEq)]
#[rustfmt::skip]
pub enum Route {
    #[layout(Layout)]
        #[route("/", PracticeView)] Practice {},
        #[route("/activity", ActivityView)] Activity {},
        #[route("/capture/:kind/:id", CaptureView)] Capture { kind: String, id: u64 },
}

#[component]
fn Layout() -> Element {
    rsx! {
        div { class: "app",
            Sidebar {}
            main { class: "content",
                Outlet::<Route> {}
            }
        }
    }
}

#[component]
fn Sidebar() -> Element {
    let ctx = use_context::<AppContext>();
    let mut language = use_signal(|| ctx.language());

    rsx! {
        nav { class: "sidebar",
            h1 { "Prep" }
            ul {
                li { Link { to: Route::Practice {}, "Practice" } }
                li { Link { to: Route::Activity {}, "Activity" } }
            }
            label { class: "sidebar__language",
                "Narration"
                select {
                    value: "{language}",
                    onchange: move |evt: FormEvent| {
                        let value = evt.value();
                        ctx.set_language(&value);
                        language.set(value);
                    },
                    option { value: "en", "English" }
                    option { value: "ko", "한국어" }
                }
            }
        }
    }
}
