use crate::error::ViewError;
use crate::resolver::Dispatch;
use crate::zones::MatchMode;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub listen_udp: String,
    pub listen_tcp: String,

    #[serde(default)]
    pub upstreams: Option<Vec<String>>,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    pub views: ViewsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ViewsConfig {
    /// Ruta local o URL http(s):// con los grupos de clientes.
    #[serde(default)]
    pub clients: String,
    /// Ruta local o URL http(s):// con los registros por grupo.
    #[serde(default)]
    pub records: String,

    #[serde(default = "default_reload_secs")]
    pub reload_secs: u64,

    #[serde(default)]
    pub match_mode: MatchMode,

    #[serde(default)]
    pub dispatch: Dispatch,

    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    #[serde(default = "default_fallthrough")]
    pub fallthrough: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_request_timeout_ms() -> u64 {
    5000
}

fn default_reload_secs() -> u64 {
    5
}

fn default_fetch_timeout_secs() -> u64 {
    60
}

fn default_fallthrough() -> bool {
    true
}

impl AppConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let s = std::fs::read_to_string(path)?;
        let cfg: Self = toml::from_str(&s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ViewError> {
        if self.views.clients.trim().is_empty() {
            return Err(ViewError::MissingSource("views.clients"));
        }
        if self.views.records.trim().is_empty() {
            return Err(ViewError::MissingSource("views.records"));
        }
        if self.views.reload_secs == 0 {
            return Err(ViewError::InvalidConfig(
                "views.reload_secs debe ser mayor que 0".to_string(),
            ));
        }
        if self.request_timeout_ms == 0 {
            return Err(ViewError::InvalidConfig(
                "request_timeout_ms debe ser mayor que 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn upstreams(&self) -> Vec<String> {
        self.upstreams.clone().unwrap_or_default()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl ViewsConfig {
    pub fn reload_interval(&self) -> Duration {
        Duration::from_secs(self.reload_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}
