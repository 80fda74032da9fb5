use std::{fmt, str::FromStr, time::Duration};

use reqwest::Url;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env var: {0}")]
    Missing(&'static str),

    #[error("{key} is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },

    /// Neither `HUBITAT_API_URL` nor the `HUBITAT_HOST` + `HUBITAT_TOKEN` pair
    /// resolved. Only presence flags are reported so the token never leaks.
    #[error(
        "Hubitat configuration missing. Provide HUBITAT_API_URL or both HUBITAT_HOST and \
         HUBITAT_TOKEN (HUBITAT_API_URL set: {api_url_set}, HUBITAT_HOST set: {host_set}, \
         HUBITAT_TOKEN set: {token_set})"
    )]
    HubEndpointMissing {
        api_url_set: bool,
        host_set: bool,
        token_set: bool,
    },

    #[error("hub endpoint is not a valid http(s) URL: {0}")]
    HubEndpointInvalid(String),
}

// ---------------------------------------------------------------------------
// Mode
// ---------------------------------------------------------------------------

/// Delivery mode selected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Periodically fetch every device from the hub.
    Pull,
    /// Accept device events posted by the hub.
    Push,
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "poll" | "pull" => Ok(Self::Pull),
            "server" | "push" => Ok(Self::Push),
            other => Err(ConfigError::Invalid {
                key: "MODE",
                reason: format!("unknown mode {other:?}, expected poll or server"),
            }),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Pull => "poll",
            Mode::Push => "server",
        })
    }
}

// ---------------------------------------------------------------------------
// HubSettings
// ---------------------------------------------------------------------------

/// The two accepted shapes of hub configuration, kept unresolved until the
/// pull mode actually needs an endpoint.
#[derive(Clone, Default)]
pub struct HubSettings {
    /// Fully-formed device listing URL, access token included.
    pub api_url: Option<String>,
    pub host: Option<String>,
    pub token: Option<String>,
    /// Maker API app instance id used when building the URL from host + token.
    pub app_id: String,
}

impl fmt::Debug for HubSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HubSettings")
            .field("api_url", &self.api_url.as_deref().map(redact_url))
            .field("host", &self.host)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("app_id", &self.app_id)
            .finish()
    }
}

impl HubSettings {
    /// Resolve the device listing endpoint.
    ///
    /// `api_url` wins when set. Otherwise both `host` and `token` must be set
    /// and the canonical Maker API URL is built from them:
    /// `http://{host}/apps/api/{app_id}/devices/all?access_token={token}`.
    /// A `host` that already carries an `http://` or `https://` scheme keeps it.
    pub fn endpoint(&self) -> Result<Url, ConfigError> {
        if let Some(api_url) = self.api_url.as_deref() {
            return parse_http_url(api_url);
        }

        let (Some(host), Some(token)) = (self.host.as_deref(), self.token.as_deref()) else {
            return Err(ConfigError::HubEndpointMissing {
                api_url_set: false,
                host_set: self.host.is_some(),
                token_set: self.token.is_some(),
            });
        };

        let host = host.trim_end_matches('/');
        let base = if host.starts_with("http://") || host.starts_with("https://") {
            format!("{host}/apps/api/{}/devices/all", self.app_id)
        } else {
            format!("http://{host}/apps/api/{}/devices/all", self.app_id)
        };

        let mut url = parse_http_url(&base)?;
        url.query_pairs_mut().append_pair("access_token", token);
        Ok(url)
    }
}

fn parse_http_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::HubEndpointInvalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(url),
        scheme => Err(ConfigError::HubEndpointInvalid(format!(
            "unsupported scheme or missing host (scheme {scheme:?})"
        ))),
    }
}

/// Render a URL for logs with the `access_token` query value masked.
pub fn redact_url(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw) else {
        return "<unparseable url>".to_owned();
    };
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == "access_token" { "***".to_owned() } else { v.into_owned() };
            (k.into_owned(), v)
        })
        .collect();
    if !pairs.is_empty() {
        url.query_pairs_mut().clear().extend_pairs(pairs);
    }
    url.to_string()
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub hub: HubSettings,
    /// Request timeout for a single hub fetch.
    pub hub_timeout: Duration,
    pub mode: Mode,
    pub poll_interval: Duration,
    /// Perform exactly one pull cycle and exit.
    pub run_once: bool,
    pub server_host: String,
    pub server_port: u16,
    /// Raises the default log filter to `debug`.
    pub debug: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup. Empty values
    /// are treated the same as unset ones.
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let optional = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_owned());

        let database_url = get("TIMESCALEDB_URL")
            .or_else(|| get("DATABASE_URL"))
            .ok_or(ConfigError::Missing("TIMESCALEDB_URL or DATABASE_URL"))?;

        let poll_interval_secs: u64 =
            parse_positive("POLL_INTERVAL_SECONDS", &optional("POLL_INTERVAL_SECONDS", "60"))?;
        let hub_timeout_secs: u64 =
            parse_positive("HUBITAT_TIMEOUT_SECS", &optional("HUBITAT_TIMEOUT_SECS", "10"))?;
        let database_max_connections: u32 =
            parse_positive("DATABASE_MAX_CONNECTIONS", &optional("DATABASE_MAX_CONNECTIONS", "5"))?;

        Ok(Self {
            database_url,
            database_max_connections,
            hub: HubSettings {
                api_url: get("HUBITAT_API_URL"),
                host: get("HUBITAT_HOST"),
                token: get("HUBITAT_TOKEN"),
                app_id: optional("HUBITAT_APP_ID", "50"),
            },
            hub_timeout: Duration::from_secs(hub_timeout_secs),
            mode: optional("MODE", "poll").parse()?,
            poll_interval: Duration::from_secs(poll_interval_secs),
            run_once: is_truthy(&optional("RUN_ONCE", "false")),
            server_host: optional("HOST", "0.0.0.0"),
            server_port: optional("PORT", "8080").parse().map_err(|_| ConfigError::Invalid {
                key: "PORT",
                reason: "must be a valid port number".to_owned(),
            })?,
            debug: is_truthy(&optional("HUBITAT_DEBUG", "")),
        })
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn parse_positive<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + Default,
{
    match raw.trim().parse::<T>() {
        Ok(v) if v > T::default() => Ok(v),
        _ => Err(ConfigError::Invalid {
            key,
            reason: format!("must be a positive integer, got {raw:?}"),
        }),
    }
}

/// `1`, `true` and `yes` (any case) enable a flag; everything else disables it.
pub fn is_truthy(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}
