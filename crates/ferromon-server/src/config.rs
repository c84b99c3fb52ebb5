use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    /// Server-side metric buffer retention.
    pub retention_minutes: i64,
    /// How often stale agents are reaped.
    pub reap_interval_secs: u64,
    /// An agent with no push for this long is considered gone.
    pub liveness_threshold_secs: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            retention_minutes: 60,
            reap_interval_secs: 60,
            liveness_threshold_secs: 300,
        }
    }
}

impl ServerConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}
