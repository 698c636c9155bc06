//! Server configuration.
//!
//! Every option can be given as a flag or through its environment variable.

use std::path::PathBuf;

use snaphunt_progress::FinishPolicy;

/// Lowest bcrypt cost accepted.
pub const MIN_PASSWORD_COST: u32 = 4;
/// Highest bcrypt cost accepted.
pub const MAX_PASSWORD_COST: u32 = 31;

/// Configuration errors, reported at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The token secret is empty
    #[error("JWT secret must not be empty")]
    EmptySecret,

    /// Token lifetime is zero or negative
    #[error("JWT lifetime must be positive, got {0}s")]
    InvalidTokenLifetime(i64),

    /// bcrypt cost out of range
    #[error("password cost must be between 4 and 31, got {0}")]
    InvalidPasswordCost(u32),

    /// No usable CORS origin
    #[error("at least one CORS origin is required")]
    NoCorsOrigins,

    /// Upload limit of zero
    #[error("upload limit must be positive")]
    InvalidUploadLimit,
}

/// Options of the `serve` command.
#[derive(Debug, Clone, clap::Args)]
pub struct ServerConfig {
    /// Address to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    /// Secret used to sign auth tokens
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    /// Lifetime of issued tokens, in seconds
    #[arg(long, env = "JWT_EXPIRE_SECS", default_value_t = 3600)]
    pub jwt_expire_secs: i64,

    /// Comma-separated list of allowed browser origins
    #[arg(long, env = "CORS_ORIGINS", default_value = "http://localhost:3000")]
    pub cors_origins: String,

    /// Directory holding `imgs/` and `evidence/`
    #[arg(long, env = "STORAGE_DIR", default_value = "storage")]
    pub storage_dir: PathBuf,

    /// Environment name reported by the health check
    #[arg(long = "environment", env = "APP_ENV", default_value = "development")]
    pub environment: String,

    /// What happens to a session once finished: `clear` or `retain`
    #[arg(long, env = "FINISH_POLICY", default_value = "clear")]
    pub finish_policy: FinishPolicy,

    /// bcrypt cost for new passwords
    #[arg(long, env = "PASSWORD_COST", default_value_t = 10)]
    pub password_cost: u32,

    /// Largest accepted request body, in bytes
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = 10 * 1024 * 1024)]
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    /// Check the configuration before anything is started.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.trim().is_empty() {
            return Err(ConfigError::EmptySecret);
        }
        if self.jwt_expire_secs <= 0 {
            return Err(ConfigError::InvalidTokenLifetime(self.jwt_expire_secs));
        }
        if !(MIN_PASSWORD_COST..=MAX_PASSWORD_COST).contains(&self.password_cost) {
            return Err(ConfigError::InvalidPasswordCost(self.password_cost));
        }
        if self.cors_origin_list().is_empty() {
            return Err(ConfigError::NoCorsOrigins);
        }
        if self.max_upload_bytes == 0 {
            return Err(ConfigError::InvalidUploadLimit);
        }
        Ok(())
    }

    /// Allowed origins, trimmed and without empty entries.
    pub fn cors_origin_list(&self) -> Vec<String> {
        split_origins(&self.cors_origins)
    }

    /// `host:port` to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}
