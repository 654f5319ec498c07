use std::fmt;
use std::sync::Arc;

use dioxus::LaunchBuilder;
use dioxus::desktop::{Config as DesktopConfig, WindowBuilder};
use tracing::info;
use tracing_subscriber::EnvFilter;
use url::Url;

use services::api::{FigureApi, PracticeApi};
use services::{ApiConfig, ConfigError, HttpApi, InMemoryApi};
use ui::{App, UiApp, UserContext, build_app_context};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidLanguage { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidLanguage { raw } => write!(f, "invalid --lang value: {raw:?}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- [--api <url>] [--token <token>] [--lang <code>] [--offline]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --api http://127.0.0.1:8000/api");
    eprintln!("  --lang en");
    eprintln!();
    eprintln!("  --offline uses a built-in demo server instead of the network.");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  PREP_API_BASE_URL, PREP_API_TOKEN, PREP_PUSH_URL, PREP_LANGUAGE, RUST_LOG");
}

#[derive(Debug, Default)]
struct Args {
    api: Option<String>,
    token: Option<String>,
    language: Option<String>,
    offline: bool,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut parsed = Self::default();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--api" => parsed.api = Some(require_value(args, "--api")?),
                "--token" => parsed.token = Some(require_value(args, "--token")?),
                "--lang" => {
                    let value = require_value(args, "--lang")?;
                    if value.trim().is_empty() || !value.trim().chars().all(|ch| ch.is_ascii_alphabetic()) {
                        return Err(ArgsError::InvalidLanguage { raw: value });
                    }
                    parsed.language = Some(value);
                }
                "--offline" => parsed.offline = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }
        Ok(parsed)
    }

    /// Environment config with command-line flags taking precedence.
    fn config(&self) -> Result<ApiConfig, ConfigError> {
        ApiConfig::from_lookup(|key| {
            let flag = match key {
                "PREP_API_BASE_URL" => self.api.clone(),
                "PREP_API_TOKEN" => self.token.clone(),
                "PREP_LANGUAGE" => self.language.clone(),
                _ => None,
            };
            flag.or_else(|| std::env::var(key).ok())
        })
    }
}

struct DesktopApp {
    practice: Arc<dyn PracticeApi>,
    figures: Arc<dyn FigureApi>,
    user: UserContext,
    push_url: Option<Url>,
}

impl DesktopApp {
    fn online(config: &ApiConfig) -> Self {
        let api = Arc::new(HttpApi::new(config.clone()));
        Self {
            practice: api.clone(),
            figures: api,
            user: user_context(config),
            push_url: Some(config.push_url().clone()),
        }
    }

    fn offline(config: &ApiConfig) -> Self {
        let api = Arc::new(InMemoryApi::demo());
        Self {
            practice: api.clone(),
            figures: api,
            user: user_context(config),
            push_url: None,
        }
    }
}

fn user_context(config: &ApiConfig) -> UserContext {
    UserContext::new(config.language())
}

impl UiApp for DesktopApp {
    fn practice_api(&self) -> Arc<dyn PracticeApi> {
        Arc::clone(&self.practice)
    }

    fn figure_api(&self) -> Arc<dyn FigureApi> {
        Arc::clone(&self.figures)
    }

    fn user(&self) -> UserContext {
        self.user.clone()
    }

    fn push_url(&self) -> Option<Url> {
        self.push_url.clone()
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);
    let args = Args::parse(&mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    init_tracing();
    let config = args.config()?;

    let app = if args.offline {
        info!("starting in offline mode with demo data");
        DesktopApp::offline(&config)
    } else {
        info!(api = %config.base_url(), push = %config.push_url(), "starting");
        DesktopApp::online(&config)
    };

    let app: Arc<dyn UiApp> = Arc::new(app);
    let context = build_app_context(&app);

    // On macOS, Dioxus/tao can default to an always-on-top window in some dev setups.
    let desktop_cfg = DesktopConfig::new().with_window(
        WindowBuilder::new()
            .with_title("Prep")
            .with_always_on_top(false),
    );

    LaunchBuilder::desktop()
        .with_cfg(desktop_cfg)
        .with_context(context)
        .launch(App);
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
