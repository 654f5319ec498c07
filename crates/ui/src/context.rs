use std::sync::Arc;

use tokio::sync::watch;
use url::Url;

use services::api::{FigureApi, PracticeApi};
use services::{FigureCaptureService, PracticeLoopService};

/// Which language explanations should use.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserContext {
    pub language: String,
}

impl UserContext {
    #[must_use]
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
        }
    }
}

pub trait UiApp: Send + Sync {
    fn practice_api(&self) -> Arc<dyn PracticeApi>;
    fn figure_api(&self) -> Arc<dyn FigureApi>;
    fn user(&self) -> UserContext;

    /// Websocket endpoint for live job and draft updates, when online.
    fn push_url(&self) -> Option<Url>;
}

#[derive(Clone)]
pub struct AppContext {
    practice: Arc<PracticeLoopService>,
    figures: Arc<FigureCaptureService>,
    user: watch::Receiver<UserContext>,
    user_updates: Arc<watch::Sender<UserContext>>,
    push_url: Option<Url>,
}

impl AppContext {
    #[must_use]
    pub fn new(app: &Arc<dyn UiApp>) -> Self {
        let practice = Arc::new(PracticeLoopService::new(app.practice_api()));
        let figures = Arc::new(FigureCaptureService::new(app.figure_api()));
        let (user_updates, user) = watch::channel(app.user());

        Self {
            practice,
            figures,
            user,
            user_updates: Arc::new(user_updates),
            push_url: app.push_url(),
        }
    }

    #[must_use]
    pub fn practice(&self) -> Arc<PracticeLoopService> {
        Arc::clone(&self.practice)
    }

    #[must_use]
    pub fn figures(&self) -> Arc<FigureCaptureService> {
        Arc::clone(&self.figures)
    }

    #[must_use]
    pub fn user(&self) -> UserContext {
        self.user.borrow().clone()
    }

    #[must_use]
    pub fn language(&self) -> String {
        self.user.borrow().language.clone()
    }

    /// Receiver that observes locale changes.
    #[must_use]
    pub fn user_updates(&self) -> watch::Receiver<UserContext> {
        self.user.clone()
    }

    pub fn set_language(&self, language: &str) {
        let language = language.trim().to_ascii_lowercase();
        self.user_updates.send_if_modified(|user| {
            if user.language == language {
                return false;
            }
            user.language = language;
            true
        });
    }

    #[must_use]
    pub fn push_url(&self) -> Option<Url> {
        self.push_url.clone()
    }
}

// This context is provided by the application composition root (e.g. `crates/app`).

/// Build an `AppContext` from a UI-facing app implementation.
#[must_use]
pub fn build_app_context(app: &Arc<dyn UiApp>) -> AppContext {
    AppContext::new(app)
}
