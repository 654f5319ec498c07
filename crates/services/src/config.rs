use std::env;

use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/api";
pub const DEFAULT_LANGUAGE: &str = "en";

const BASE_URL_KEY: &str = "PREP_API_BASE_URL";
const TOKEN_KEY: &str = "PREP_API_TOKEN";
const PUSH_URL_KEY: &str = "PREP_PUSH_URL";
const LANGUAGE_KEY: &str = "PREP_LANGUAGE";

/// Connection settings for the practice server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiConfig {
    base_url: Url,
    push_url: Url,
    token: Option<String>,
    language: String,
}

impl ApiConfig {
    /// Build a config for `base_url`, deriving the push URL from it.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the URL does not parse or is not http(s).
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        let base_url = parse_url(BASE_URL_KEY, base_url)?;
        let push_url = derive_push_url(&base_url)?;
        Ok(Self {
            base_url,
            push_url,
            token: None,
            language: DEFAULT_LANGUAGE.to_string(),
        })
    }

    /// Read `PREP_API_BASE_URL`, `PREP_API_TOKEN`, `PREP_PUSH_URL` and
    /// `PREP_LANGUAGE`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for malformed URLs.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`ApiConfig::from_env`] with an explicit variable source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for malformed URLs.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_blank = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let base = non_blank(BASE_URL_KEY).unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let mut config = Self::new(base.trim())?;
        if let Some(push) = non_blank(PUSH_URL_KEY) {
            config = config.with_push_url(push.trim())?;
        }
        if let Some(token) = non_blank(TOKEN_KEY) {
            config = config.with_token(token);
        }
        if let Some(language) = non_blank(LANGUAGE_KEY) {
            config = config.with_language(language);
        }
        Ok(config)
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.token = Some(token.trim().to_string()).filter(|token| !token.is_empty());
        self
    }

    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into().trim().to_lowercase();
        self
    }

    /// # Errors
    ///
    /// Returns `ConfigError` if the URL does not parse or is not ws(s)/http(s).
    pub fn with_push_url(mut self, push_url: &str) -> Result<Self, ConfigError> {
        let mut url = parse_url(PUSH_URL_KEY, push_url)?;
        if matches!(url.scheme(), "http" | "https") {
            url = derive_push_scheme(url)?;
        }
        self.push_url = url;
        Ok(self)
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub fn push_url(&self) -> &Url {
        &self.push_url
    }

    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Resolve `path` (no leading slash) under the base URL.
    ///
    /// # Errors
    ///
    /// Returns `url::ParseError` if the joined URL is invalid.
    pub fn endpoint(&self, path: &str) -> Result<Url, url::ParseError> {
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.join(path.trim_start_matches('/'))
    }
}

fn parse_url(key: &'static str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|source| ConfigError::InvalidUrl { key, source })?;
    match url.scheme() {
        "http" | "https" | "ws" | "wss" => Ok(url),
        other => Err(ConfigError::UnsupportedScheme {
            key,
            scheme: other.to_string(),
        }),
    }
}

fn derive_push_url(base: &Url) -> Result<Url, ConfigError> {
    let mut url = derive_push_scheme(base.clone())?;
    let path = format!("{}/ws", base.path().trim_end_matches('/'));
    url.set_path(&path);
    Ok(url)
}

fn derive_push_scheme(mut url: Url) -> Result<Url, ConfigError> {
    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        _ => "ws",
    };
    url.set_scheme(scheme)
        .map_err(|()| ConfigError::UnsupportedScheme {
            key: PUSH_URL_KEY,
            scheme: url.scheme().to_string(),
        })?;
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_environment_is_empty() {
        let config = ApiConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.base_url().as_str(), DEFAULT_BASE_URL);
        assert_eq!(config.push_url().as_str(), "ws://127.0.0.1:8000/api/ws");
        assert_eq!(config.token(), None);
        assert_eq!(config.language(), "en");
    }

    #[test]
    fn push_url_follows_https_base() {
        let config = ApiConfig::from_lookup(lookup(&[
            ("PREP_API_BASE_URL", "https://prep.example.com/api/"),
            ("PREP_API_TOKEN", "  secret "),
            ("PREP_LANGUAGE", "KO"),
        ]))
        .unwrap();
        assert_eq!(config.push_url().as_str(), "wss://prep.example.com/api/ws");
        assert_eq!(config.token(), Some("secret"));
        assert_eq!(config.language(), "ko");
    }

    #[test]
    fn explicit_push_url_wins() {
        let config = ApiConfig::from_lookup(lookup(&[(
            "PREP_PUSH_URL",
            "http://push.example.com/live",
        )]))
        .unwrap();
        assert_eq!(config.push_url().as_str(), "ws://push.example.com/live");
    }

    #[test]
    fn endpoints_join_under_base_path() {
        let config = ApiConfig::new("http://localhost:8000/api").unwrap();
        assert_eq!(
            config.endpoint("/sessions/4/answers").unwrap().as_str(),
            "http://localhost:8000/api/sessions/4/answers"
        );
    }

    #[test]
    fn rejects_unsupported_scheme() {
        let err = ApiConfig::new("ftp://example.com").unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedScheme { .. }));
    }
}
