use std::fmt;

use shipdesk_domain::CoreError;

pub const ENV_API_TOKEN: &str = "SHIPDESK_API_TOKEN";
pub const ENV_API_URL: &str = "SHIPDESK_API_URL";

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";
const DEFAULT_USER_AGENT: &str = "shipdesk/shipdesk-api";

#[derive(Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub api_token: String,
    pub user_agent: String,
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("api_token", &"<redacted>")
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_owned(),
            api_token: String::new(),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

impl ApiConfig {
    /// Reads the token from the environment; `base_url` overrides the default
    /// unless `SHIPDESK_API_URL` is set.
    pub fn from_env(base_url: Option<&str>) -> Result<Self, CoreError> {
        let api_token = std::env::var(ENV_API_TOKEN).map_err(|_| {
            CoreError::Configuration(format!(
                "{ENV_API_TOKEN} is not set. Export a valid token before calling the packing API."
            ))
        })?;
        let api_token = api_token.trim();
        if api_token.is_empty() {
            return Err(CoreError::Configuration(format!(
                "{ENV_API_TOKEN} is empty. Provide a non-empty token."
            )));
        }

        let mut config = Self {
            api_token: api_token.to_owned(),
            ..Self::default()
        };
        if let Some(base_url) = base_url.map(str::trim).filter(|value| !value.is_empty()) {
            config.base_url = base_url.to_owned();
        }
        if let Ok(api_url) = std::env::var(ENV_API_URL) {
            let api_url = api_url.trim();
            if !api_url.is_empty() {
                config.base_url = api_url.to_owned();
            }
        }
        config.base_url = config.base_url.trim_end_matches('/').to_owned();

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Mutex, OnceLock};

    use super::*;

    fn env_lock() -> &'static Mutex<()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn with_env_vars<F>(vars: &[(&str, Option<&str>)], test: F)
    where
        F: FnOnce(),
    {
        let _guard = env_lock().lock().expect("env lock");
        let backup = vars
            .iter()
            .map(|(name, _)| ((*name).to_owned(), std::env::var(name).ok()))
            .collect::<Vec<_>>();

        for (name, value) in vars {
            match value {
                Some(value) => std::env::set_var(name, value),
                None => std::env::remove_var(name),
            }
        }

        test();

        for (name, value) in backup {
            match value {
                Some(value) => std::env::set_var(name, value),
                None => std::env::remove_var(name),
            }
        }
    }

    #[test]
    fn from_env_requires_a_token() {
        with_env_vars(&[(ENV_API_TOKEN, None), (ENV_API_URL, None)], || {
            let error = ApiConfig::from_env(None).expect_err("missing token");
            assert!(matches!(error, CoreError::Configuration(_)));
        });
        with_env_vars(&[(ENV_API_TOKEN, Some("   ")), (ENV_API_URL, None)], || {
            let error = ApiConfig::from_env(None).expect_err("blank token");
            assert!(error.to_string().contains("is empty"));
        });
    }

    #[test]
    fn env_url_overrides_configured_base_url() {
        with_env_vars(
            &[
                (ENV_API_TOKEN, Some("token")),
                (ENV_API_URL, Some("https://desk.example.com/")),
            ],
            || {
                let config =
                    ApiConfig::from_env(Some("http://localhost:9000")).expect("load config");
                assert_eq!(config.base_url, "https://desk.example.com");
                assert_eq!(config.api_token, "token");
            },
        );
        with_env_vars(
            &[(ENV_API_TOKEN, Some("token")), (ENV_API_URL, None)],
            || {
                let config =
                    ApiConfig::from_env(Some("http://localhost:9000/")).expect("load config");
                assert_eq!(config.base_url, "http://localhost:9000");
            },
        );
    }

    #[test]
    fn debug_output_redacts_token() {
        let config = ApiConfig {
            api_token: "secret-token".to_owned(),
            ..ApiConfig::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("<redacted>"));
    }
}
