use ferromon_collector::CollectorConfig;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Server base URL; falls back to the CLI flag when unset.
    pub server_url: Option<String>,
    pub collect_interval_secs: u64,
    /// Local metric buffer retention.
    pub retention_minutes: i64,
    pub collectors: CollectorConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            collect_interval_secs: 2,
            retention_minutes: 60,
            collectors: CollectorConfig::default(),
        }
    }
}

impl AgentConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}
