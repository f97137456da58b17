use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database_url: String,
    pub postq_env: String,
    pub api_bind: String,
    pub poll_interval_secs: u64,
    pub timezone: String,
    pub default_interval_secs: i64,
    pub publish_url: String,
    pub publish_timeout_secs: u64,
    pub media_dir: String,
}

impl Settings {
    pub fn from_env() -> Result<Self, std::env::VarError> {
        let database_url =
            std::env::var("DATABASE_URL").or_else(|_| std::env::var("POSTQ_DATABASE_URL"))?;
        let postq_env = std::env::var("POSTQ_ENV").unwrap_or_else(|_| "dev".to_string());
        let api_bind =
            std::env::var("POSTQ_API_BIND").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let poll_interval_secs = std::env::var("POSTQ_POLL_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5);
        let timezone =
            std::env::var("POSTQ_TIMEZONE").unwrap_or_else(|_| "Europe/Kyiv".to_string());
        let default_interval_secs = std::env::var("POSTQ_DEFAULT_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(7200);
        let publish_url = std::env::var("POSTQ_PUBLISH_URL")
            .unwrap_or_else(|_| "http://localhost:8081/publish".to_string());
        let publish_timeout_secs = std::env::var("POSTQ_PUBLISH_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);
        let media_dir = std::env::var("POSTQ_MEDIA_DIR").unwrap_or_else(|_| "uploads".to_string());

        Ok(Self {
            database_url,
            postq_env,
            api_bind,
            poll_interval_secs,
            timezone,
            default_interval_secs,
            publish_url,
            publish_timeout_secs,
            media_dir,
        })
    }

    /// Parse the configured timezone, falling back to UTC on a bad name.
    pub fn tz(&self) -> chrono_tz::Tz {
        self.timezone.parse::<chrono_tz::Tz>().unwrap_or(chrono_tz::UTC)
    }
}
