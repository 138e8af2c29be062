use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {env_var}")]
    MissingEnvVar { env_var: String },
    #[error("Configuration error: {0}")]
    Other(#[from] config::ConfigError),
}

/// Environment variable that sets a dotted settings key, e.g. `server.port` -> `RIPPLE_SERVER__PORT`
pub fn to_env_var(field_path: &str) -> String {
    format!("RIPPLE_{}", field_path.replace('.', "__").to_uppercase())
}
