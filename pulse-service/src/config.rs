use serde::Deserialize;
use std::{fs, path::PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub http_bind_addr: String,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// When set, `POST /pulse` requires `Authorization: Bearer <token>`.
    #[serde(default)]
    pub auth_bearer_token: Option<String>,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { path: default_store_path() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SinkConfig {
    pub batch_size: usize,
    pub flush_interval_ms: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            batch_size: 1,
            flush_interval_ms: 250,
            max_retries: 3,
            retry_backoff_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    pub contamination: f64,
    pub min_records: usize,
    pub n_trees: usize,
    pub max_samples: usize,
    /// Fixed seed for reproducible scans; entropy-seeded when absent.
    pub seed: Option<u64>,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            contamination: 0.1,
            min_records: 10,
            n_trees: 100,
            max_samples: 256,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotifierKind {
    Log,
    Outbox,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub kind: NotifierKind,
    pub sender: String,
    pub recipient: String,
    /// NDJSON file picked up by an external mailer; required for `outbox`.
    pub outbox_path: Option<PathBuf>,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub suppress_repeats: bool,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            kind: NotifierKind::Log,
            sender: "nexaaudit-alert@example.com".to_string(),
            recipient: "temple-alert@example.com".to_string(),
            outbox_path: None,
            max_retries: 2,
            retry_backoff_ms: 200,
            suppress_repeats: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HeatmapConfig {
    pub center_lat: f64,
    pub center_lon: f64,
    pub zoom: u8,
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self {
            center_lat: 22.5,
            center_lon: 71.5,
            zoom: 6,
            lat_min: 21.0,
            lat_max: 24.0,
            lon_min: 70.0,
            lon_max: 74.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ViewsConfig {
    pub recent_limit: usize,
}

impl Default for ViewsConfig {
    fn default() -> Self {
        Self { recent_limit: 20 }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub sink: SinkConfig,
    #[serde(default)]
    pub anomaly: AnomalyConfig,
    #[serde(default)]
    pub alerts: AlertConfig,
    #[serde(default)]
    pub heatmap: HeatmapConfig,
    #[serde(default)]
    pub views: ViewsConfig,
    pub metrics: Option<MetricsConfig>,
}

fn default_channel_capacity() -> usize {
    1024
}

fn default_max_body_bytes() -> usize {
    64 * 1024
}

fn default_store_path() -> PathBuf {
    PathBuf::from("temple_pulse.csv")
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        use std::env;

        let path = env::var("PULSE_CONFIG").unwrap_or_else(|_| "pulse-config.toml".to_string());
        let contents = fs::read_to_string(&path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        let cfg: AppConfig = toml::from_str(contents)?;
        if cfg.alerts.kind == NotifierKind::Outbox && cfg.alerts.outbox_path.is_none() {
            anyhow::bail!("alerts.outbox_path is required when alerts.kind = \"outbox\"");
        }
        if !(0.0..=0.5).contains(&cfg.anomaly.contamination) {
            anyhow::bail!("anomaly.contamination must be within [0, 0.5]");
        }
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_fills_defaults() {
        let cfg = AppConfig::from_toml(
            r#"
            [server]
            http_bind_addr = "127.0.0.1:8501"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.store.path, PathBuf::from("temple_pulse.csv"));
        assert_eq!(cfg.anomaly.contamination, 0.1);
        assert_eq!(cfg.anomaly.min_records, 10);
        assert_eq!(cfg.alerts.kind, NotifierKind::Log);
        assert_eq!(cfg.views.recent_limit, 20);
        assert!(cfg.metrics.is_none());
    }

    #[test]
    fn outbox_without_path_is_rejected() {
        let res = AppConfig::from_toml(
            r#"
            [server]
            http_bind_addr = "127.0.0.1:8501"

            [alerts]
            kind = "outbox"
            "#,
        );
        assert!(res.is_err());
    }

    #[test]
    fn full_config_parses() {
        let cfg = AppConfig::from_toml(
            r#"
            [server]
            http_bind_addr = "0.0.0.0:8080"
            auth_bearer_token = "s3cret"

            [store]
            path = "/var/lib/pulse/temple_pulse.csv"

            [sink]
            batch_size = 16
            flush_interval_ms = 500
            max_retries = 5
            retry_backoff_ms = 50

            [anomaly]
            seed = 7

            [alerts]
            kind = "outbox"
            outbox_path = "/var/spool/pulse/alerts.ndjson"
            suppress_repeats = false

            [metrics]
            bind_addr = "0.0.0.0:9000"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.server.auth_bearer_token.as_deref(), Some("s3cret"));
        assert_eq!(cfg.sink.batch_size, 16);
        assert_eq!(cfg.anomaly.seed, Some(7));
        assert_eq!(cfg.anomaly.n_trees, 100);
        assert!(!cfg.alerts.suppress_repeats);
        assert_eq!(cfg.metrics.unwrap().bind_addr, "0.0.0.0:9000");
    }
}
