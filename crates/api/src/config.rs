use std::str::FromStr;

use weatherman_actions::ActionsConfig;
use weatherman_core::error::CoreError;
use weatherman_core::run_match::{MatchMode, DEFAULT_WORKFLOW_NAME};
use weatherman_core::run_request::{DispatchMode, DispatchSettings, SeriesShape, DEFAULT_REPO};
use weatherman_core::slug::SlugZone;

/// Provider endpoints and workflow identity.
#[derive(Debug, Clone)]
pub struct GitHubConfig {
    /// REST API base (default: `https://api.github.com`).
    pub api_url: String,
    /// Web UI base used for links (default: `https://github.com`).
    pub web_url: String,
    /// Workflow file that gets dispatched (default: `forecast-request.yml`).
    pub workflow_file: String,
    /// Git ref the workflow runs on (default: `main`).
    pub git_ref: String,
    /// Display name of the workflow's runs (default: `Forecast Request`).
    pub workflow_name: String,
    /// Runs scanned per status poll, 1..=100 (default: `30`).
    pub runs_page_size: u8,
    pub user_agent: String,
}

/// Server configuration loaded from environment variables.
///
/// All fields except the token have defaults suitable for the public
/// deployment. The token is only checked when a request needs it, so the
/// server still starts (and reports 500s) when it is missing.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Provider bearer token. Empty values are treated as unset.
    pub github_token: Option<String>,
    /// The only repository requests may target.
    pub allowed_repo: String,
    pub github: GitHubConfig,
    pub dispatch: DispatchSettings,
    /// Add `actions_url` and `status_url` to dispatch responses.
    pub response_links: bool,
    pub run_match: MatchMode,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got '{value}'")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("{name}: {source}")]
    Setting {
        name: &'static str,
        #[source]
        source: CoreError,
    },
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                    |
    /// |---------------------------|----------------------------|
    /// | `HOST`                    | `0.0.0.0`                  |
    /// | `PORT`                    | `3000`                     |
    /// | `REQUEST_TIMEOUT_SECS`    | `30`                       |
    /// | `GITHUB_TOKEN`            | unset                      |
    /// | `ALLOWED_REPO`            | `bryanwhiting/weatherman`  |
    /// | `GITHUB_API_URL`          | `https://api.github.com`   |
    /// | `GITHUB_WEB_URL`          | `https://github.com`       |
    /// | `WORKFLOW_FILE`           | `forecast-request.yml`     |
    /// | `WORKFLOW_REF`            | `main`                     |
    /// | `WORKFLOW_NAME`           | `Forecast Request`         |
    /// | `RUNS_PAGE_SIZE`          | `30`                       |
    /// | `DISPATCH_MODE`           | `derive`                   |
    /// | `SERIES_SHAPE`            | `single`                   |
    /// | `SLUG_TZ`                 | unset (UTC)                |
    /// | `DISPATCH_RESPONSE_LINKS` | `true`                     |
    /// | `RUN_MATCH_MODE`          | `legacy`                   |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`ServerConfig::from_env`] with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let text = |name: &str, default: &str| var(name).unwrap_or_else(|| default.to_string());

        let port = match var("PORT") {
            Some(v) => v.parse().map_err(|_| invalid("PORT", "a valid u16", &v))?,
            None => 3000,
        };

        let request_timeout_secs = match var("REQUEST_TIMEOUT_SECS") {
            Some(v) => v
                .parse()
                .map_err(|_| invalid("REQUEST_TIMEOUT_SECS", "a valid u64", &v))?,
            None => 30,
        };

        let runs_page_size = match var("RUNS_PAGE_SIZE") {
            Some(v) => v
                .parse::<u8>()
                .ok()
                .filter(|n| (1..=100).contains(n))
                .ok_or_else(|| invalid("RUNS_PAGE_SIZE", "an integer between 1 and 100", &v))?,
            None => 30,
        };

        let response_links = match var("DISPATCH_RESPONSE_LINKS") {
            Some(v) => parse_bool(&v)
                .ok_or_else(|| invalid("DISPATCH_RESPONSE_LINKS", "a boolean", &v))?,
            None => true,
        };

        let slug_zone = match var("SLUG_TZ") {
            Some(zone) => SlugZone::civil(&zone).map_err(|source| ConfigError::Setting {
                name: "SLUG_TZ",
                source,
            })?,
            None => SlugZone::Utc,
        };

        let dispatch = DispatchSettings {
            mode: parse_setting::<DispatchMode>(var("DISPATCH_MODE"), "DISPATCH_MODE")?,
            series_shape: parse_setting::<SeriesShape>(var("SERIES_SHAPE"), "SERIES_SHAPE")?,
            slug_zone,
        };

        let github = GitHubConfig {
            api_url: text("GITHUB_API_URL", "https://api.github.com"),
            web_url: text("GITHUB_WEB_URL", "https://github.com"),
            workflow_file: text("WORKFLOW_FILE", "forecast-request.yml"),
            git_ref: text("WORKFLOW_REF", "main"),
            workflow_name: text("WORKFLOW_NAME", DEFAULT_WORKFLOW_NAME),
            runs_page_size,
            user_agent: format!("weatherman-api/{}", env!("CARGO_PKG_VERSION")),
        };

        Ok(Self {
            host: text("HOST", "0.0.0.0"),
            port,
            request_timeout_secs,
            github_token: var("GITHUB_TOKEN"),
            allowed_repo: text("ALLOWED_REPO", DEFAULT_REPO),
            github,
            dispatch,
            response_links,
            run_match: parse_setting::<MatchMode>(var("RUN_MATCH_MODE"), "RUN_MATCH_MODE")?,
        })
    }

    /// Provider client settings derived from this configuration.
    pub fn actions_config(&self) -> ActionsConfig {
        ActionsConfig {
            api_url: self.github.api_url.clone(),
            token: self.github_token.clone(),
            user_agent: self.github.user_agent.clone(),
            workflow_file: self.github.workflow_file.clone(),
            git_ref: self.github.git_ref.clone(),
            runs_page_size: self.github.runs_page_size,
        }
    }
}

fn invalid(name: &'static str, expected: &'static str, value: &str) -> ConfigError {
    ConfigError::Invalid {
        name,
        expected,
        value: value.to_string(),
    }
}

fn parse_setting<T>(value: Option<String>, name: &'static str) -> Result<T, ConfigError>
where
    T: FromStr<Err = CoreError> + Default,
{
    value
        .map(|v| v.parse().map_err(|source| ConfigError::Setting { name, source }))
        .transpose()
        .map(Option::unwrap_or_default)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
