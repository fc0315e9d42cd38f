use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub user_id: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let user_id = env_map
            .get("USER_ID")
            .map(|s| s.as_str())
            .unwrap_or("default")
            .trim()
            .to_string();
        if user_id.is_empty() {
            return Err(ConfigError::InvalidValue(
                "USER_ID".to_string(),
                "must not be empty".to_string(),
            ));
        }

        Ok(Config {
            database_path,
            user_id,
        })
    }
}
