// src/config.rs
use crate::application::realtime::{Backoff, RetryPolicy};
use crate::domain::errors::{AppError, AppResult};
use crate::infrastructure::http::BasicAuth;
use dotenv::dotenv;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// Order dashboard configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Order service endpoint and credentials
    pub order_service: OrderServiceConfig,

    /// Analytics service endpoint
    pub analytics: AnalyticsConfig,

    /// Realtime stream endpoint and reconnect policy
    pub realtime: RealtimeConfig,

    /// Dashboard refresh behaviour
    pub dashboard: DashboardConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderServiceConfig {
    /// Base URL, including the `/api` prefix
    pub base_url: String,

    pub username: String,

    pub password: String,

    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    pub base_url: String,

    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// WebSocket URL (ws:// or wss://)
    pub url: String,

    /// Consecutive failures tolerated before the channel gives up
    pub max_attempts: u32,

    pub retry_delay_secs: u64,

    /// "fixed" or "exponential"
    pub backoff: String,

    /// Upper bound on the delay when backing off exponentially
    pub max_retry_delay_secs: u64,

    /// Time allowed for connect plus upgrade before an attempt counts as failed
    #[serde(default = "default_handshake_timeout_secs")]
    pub handshake_timeout_secs: u64,
}

fn default_handshake_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Hours of revenue history requested per refresh
    pub hourly_window: u32,

    /// Page size of the order listing used to count orders in the fallback
    pub fallback_page_size: u32,

    pub refresh_secs: u64,

    /// Number of recent orders shown
    pub recent_orders: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "warn", "error")
    pub level: String,

    /// Log to file
    pub to_file: bool,

    /// Log file path
    pub file_path: Option<String>,
}

fn env_or<T: FromStr>(key: &str, default: T) -> AppResult<T> {
    match env::var(key) {
        Ok(value) => value.trim().parse().map_err(|_| {
            AppError::Config(format!("Invalid value for {}: {:?}", key, value))
        }),
        Err(_) => Ok(default),
    }
}

fn required(key: &str) -> AppResult<String> {
    env::var(key).map_err(|_| AppError::Config(format!("Missing {} environment variable", key)))
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        // Load .env file if it exists
        dotenv().ok();

        let defaults = Config::default();

        let order_service = OrderServiceConfig {
            base_url: env::var("ORDER_SERVICE_URL").unwrap_or(defaults.order_service.base_url),
            username: required("ORDER_SERVICE_USERNAME")?,
            password: required("ORDER_SERVICE_PASSWORD")?,
            timeout_secs: env_or("ORDER_SERVICE_TIMEOUT_SECS", defaults.order_service.timeout_secs)?,
        };

        let analytics = AnalyticsConfig {
            base_url: env::var("ANALYTICS_SERVICE_URL").unwrap_or(defaults.analytics.base_url),
            timeout_secs: env_or("ANALYTICS_SERVICE_TIMEOUT_SECS", defaults.analytics.timeout_secs)?,
        };

        let realtime = RealtimeConfig {
            url: env::var("REALTIME_URL").unwrap_or(defaults.realtime.url),
            max_attempts: env_or("REALTIME_MAX_ATTEMPTS", defaults.realtime.max_attempts)?,
            retry_delay_secs: env_or("REALTIME_RETRY_DELAY_SECS", defaults.realtime.retry_delay_secs)?,
            backoff: env::var("REALTIME_BACKOFF").unwrap_or(defaults.realtime.backoff),
            max_retry_delay_secs: env_or(
                "REALTIME_MAX_RETRY_DELAY_SECS",
                defaults.realtime.max_retry_delay_secs,
            )?,
            handshake_timeout_secs: env_or(
                "REALTIME_HANDSHAKE_TIMEOUT_SECS",
                defaults.realtime.handshake_timeout_secs,
            )?,
        };

        let dashboard = DashboardConfig {
            hourly_window: env_or("DASHBOARD_HOURLY_WINDOW", defaults.dashboard.hourly_window)?,
            fallback_page_size: env_or(
                "DASHBOARD_FALLBACK_PAGE_SIZE",
                defaults.dashboard.fallback_page_size,
            )?,
            refresh_secs: env_or("DASHBOARD_REFRESH_SECS", defaults.dashboard.refresh_secs)?,
            recent_orders: env_or("DASHBOARD_RECENT_ORDERS", defaults.dashboard.recent_orders)?,
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or(defaults.logging.level),
            to_file: env_or("LOG_TO_FILE", false)?,
            file_path: env::var("LOG_FILE_PATH").ok(),
        };

        let config = Config {
            order_service,
            analytics,
            realtime,
            dashboard,
            logging,
        };
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let mut file = File::open(path).map_err(|e| {
            AppError::Config(format!("Failed to open config file: {}", e))
        })?;

        let mut contents = String::new();
        file.read_to_string(&mut contents).map_err(|e| {
            AppError::Config(format!("Failed to read config file: {}", e))
        })?;

        let config: Config = serde_json::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file: {}", e))
        })?;
        config.validate()?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> AppResult<()> {
        let contents = serde_json::to_string_pretty(self).map_err(|e| {
            AppError::Config(format!("Failed to serialize config: {}", e))
        })?;

        std::fs::write(path, contents).map_err(|e| {
            AppError::Config(format!("Failed to write config file: {}", e))
        })?;

        Ok(())
    }

    pub fn validate(&self) -> AppResult<()> {
        parse_url("order service URL", &self.order_service.base_url)?;
        parse_url("analytics service URL", &self.analytics.base_url)?;
        self.realtime_url()?;
        self.retry_policy()?;

        if self.realtime.handshake_timeout_secs == 0 {
            return Err(AppError::Config("Realtime handshake timeout must be positive".into()));
        }
        if self.dashboard.refresh_secs == 0 {
            return Err(AppError::Config("Dashboard refresh interval must be positive".into()));
        }
        if self.dashboard.fallback_page_size == 0 {
            return Err(AppError::Config("Fallback page size must be positive".into()));
        }

        Ok(())
    }

    pub fn realtime_url(&self) -> AppResult<Url> {
        let url = parse_url("realtime URL", &self.realtime.url)?;
        match url.scheme() {
            "ws" | "wss" => Ok(url),
            other => Err(AppError::Config(format!(
                "Realtime URL must use ws or wss, got {}",
                other
            ))),
        }
    }

    pub fn retry_policy(&self) -> AppResult<RetryPolicy> {
        let backoff = match self.realtime.backoff.to_lowercase().as_str() {
            "fixed" => Backoff::Fixed,
            "exponential" => Backoff::Exponential {
                max: Duration::from_secs(self.realtime.max_retry_delay_secs),
            },
            other => {
                return Err(AppError::Config(format!("Unknown realtime backoff: {}", other)));
            }
        };

        if self.realtime.max_attempts == 0 {
            return Err(AppError::Config("Realtime max attempts must be at least 1".into()));
        }

        Ok(RetryPolicy {
            max_attempts: self.realtime.max_attempts,
            delay: Duration::from_secs(self.realtime.retry_delay_secs),
            backoff,
        })
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.realtime.handshake_timeout_secs)
    }

    pub fn order_service_auth(&self) -> BasicAuth {
        BasicAuth::new(&self.order_service.username, &self.order_service.password)
    }

    /// Initialize logging based on configuration
    pub fn init_logging(&self) -> AppResult<()> {
        let mut builder = env_logger::Builder::new();

        // Set log level
        let log_level = match self.logging.level.to_lowercase().as_str() {
            "trace" => log::LevelFilter::Trace,
            "debug" => log::LevelFilter::Debug,
            "info" => log::LevelFilter::Info,
            "warn" => log::LevelFilter::Warn,
            "error" => log::LevelFilter::Error,
            _ => log::LevelFilter::Info,
        };

        builder.filter_level(log_level);

        // Configure output
        if self.logging.to_file {
            if let Some(file_path) = &self.logging.file_path {
                let file = File::create(file_path).map_err(|e| {
                    AppError::Config(format!("Failed to create log file: {}", e))
                })?;

                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
        }

        // Initialize the logger
        builder.try_init().map_err(|e| {
            AppError::Config(format!("Failed to initialize logger: {}", e))
        })?;

        Ok(())
    }
}

fn parse_url(what: &str, value: &str) -> AppResult<Url> {
    Url::parse(value).map_err(|e| AppError::Config(format!("Invalid {} {:?}: {}", what, value, e)))
}

impl Default for Config {
    /// Local development endpoints. Credentials stay empty and must be
    /// supplied through the environment or a config file.
    fn default() -> Self {
        Self {
            order_service: OrderServiceConfig {
                base_url: "http://localhost:8090/api".to_string(),
                username: String::new(),
                password: String::new(),
                timeout_secs: 10,
            },
            analytics: AnalyticsConfig {
                base_url: "http://localhost:8091".to_string(),
                timeout_secs: 10,
            },
            realtime: RealtimeConfig {
                url: "ws://localhost:8091/ws/realtime".to_string(),
                max_attempts: 5,
                retry_delay_secs: 5,
                backoff: "fixed".to_string(),
                max_retry_delay_secs: 60,
                handshake_timeout_secs: default_handshake_timeout_secs(),
            },
            dashboard: DashboardConfig {
                hourly_window: 24,
                fallback_page_size: 100,
                refresh_secs: 30,
                recent_orders: 5,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                to_file: false,
                file_path: None,
            },
        }
    }
}
