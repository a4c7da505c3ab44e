use std::net::IpAddr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub host: IpAddr,
    pub port: u16,
    pub max_body_size: usize,
    pub log_level: String,
    pub delivery: DeliveryConfig,
    pub recovery: RecoveryConfig,
}

#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    pub webhook_url: String,
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Zero disables the sweeper.
    pub interval: Duration,
    pub grace: Duration,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            webhook_url: String::new(),
            max_attempts: 3,
            backoff_base: Duration::from_secs(2),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            grace: Duration::from_secs(300),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let database_url = env_required("DATABASE_URL")?;
        let jwt_secret = env_required("JWT_SECRET")?;
        let webhook_url = env_required("FIELDRELAY_WEBHOOK_URL")?;

        if !webhook_url.starts_with("http://") && !webhook_url.starts_with("https://") {
            return Err(format!(
                "Invalid FIELDRELAY_WEBHOOK_URL: expected an http(s) URL, got '{webhook_url}'"
            ));
        }

        let host: IpAddr = env_or("FIELDRELAY_HOST", "0.0.0.0")
            .parse()
            .map_err(|e| format!("Invalid FIELDRELAY_HOST: {e}"))?;

        let port: u16 = env_parse("FIELDRELAY_PORT", "3000")?;

        let max_body_size: usize = env_parse("FIELDRELAY_MAX_BODY_SIZE", "1048576")?;

        let max_attempts: u32 = env_parse("FIELDRELAY_MAX_ATTEMPTS", "3")?;
        if max_attempts == 0 {
            return Err("Invalid FIELDRELAY_MAX_ATTEMPTS: must be at least 1".to_string());
        }

        let backoff_base = Duration::from_secs(env_parse("FIELDRELAY_BACKOFF_BASE_SECS", "2")?);
        let request_timeout =
            Duration::from_secs(env_parse("FIELDRELAY_REQUEST_TIMEOUT_SECS", "30")?);

        let recovery = RecoveryConfig {
            interval: Duration::from_secs(env_parse("FIELDRELAY_RECOVERY_INTERVAL_SECS", "60")?),
            grace: Duration::from_secs(env_parse("FIELDRELAY_RECOVERY_GRACE_SECS", "300")?),
        };

        let log_level = env_or("FIELDRELAY_LOG_LEVEL", "info");

        Ok(Config {
            database_url,
            jwt_secret,
            host,
            port,
            max_body_size,
            log_level,
            delivery: DeliveryConfig {
                webhook_url,
                max_attempts,
                backoff_base,
                request_timeout,
            },
            recovery,
        })
    }
}

fn env_required(key: &str) -> Result<String, String> {
    std::env::var(key).map_err(|_| format!("Missing required environment variable: {key}"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T>(key: &str, default: &str) -> Result<T, String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    env_or(key, default)
        .parse()
        .map_err(|e| format!("Invalid {key}: {e}"))
}
