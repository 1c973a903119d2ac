use config::ConfigError;
use serde::Deserialize;
use std::collections::HashMap;

const ENV_PREFIX: &str = "COMMENTS_";

#[derive(Deserialize, Clone, Debug)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub uploads: UploadSettings,
    pub engine: EngineSettings,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub cors_origins: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct DatabaseSettings {
    /// Without the mirror, threads live only as long as the process.
    pub enabled: bool,
    pub url: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct UploadSettings {
    pub dir: String,
    pub url_prefix: String,
    pub max_bytes: usize,
}

#[derive(Deserialize, Clone, Debug)]
pub struct EngineSettings {
    pub event_capacity: usize,
    pub command_capacity: usize,
    pub command_timeout_secs: u64,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());
        Self::load(&run_mode, collect_env_vars(std::env::vars()))
    }

    fn load(run_mode: &str, env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let env_json = serde_json::to_string(&env_map)
            .map_err(|e| ConfigError::Message(format!("Bad environment: {}", e)))?;

        let s = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("server.cors_origins", "*")?
            .set_default("database.enabled", true)?
            .set_default("database.url", "sqlite://data/comments.db")?
            .set_default("uploads.dir", "data/uploads")?
            .set_default("uploads.url_prefix", "/uploads")?
            .set_default("uploads.max_bytes", 10 * 1024 * 1024)?
            .set_default("engine.event_capacity", 256)?
            .set_default("engine.command_capacity", 100)?
            .set_default("engine.command_timeout_secs", 30)?
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::File::with_name(&format!("config.{}", run_mode)).required(false))
            .add_source(config::File::from_str(&env_json, config::FileFormat::Json))
            .build()?;

        s.try_deserialize()
    }
}

// COMMENTS_UPLOADS__MAX_BYTES -> uploads.max_bytes
fn collect_env_vars(vars: impl Iterator<Item = (String, String)>) -> HashMap<String, String> {
    vars.filter(|(k, _)| k.starts_with(ENV_PREFIX))
        .map(|(k, v)| {
            let new_key = k
                .trim_start_matches(ENV_PREFIX)
                .replace("__", ".")
                .to_lowercase();
            (new_key, v)
        })
        .collect()
}
