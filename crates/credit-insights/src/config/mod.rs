use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub dashboard: DashboardConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            dashboard: DashboardConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Longest risk window accepted from the environment, roughly a century.
pub const MAX_RISK_WINDOW_DAYS: i64 = 36_500;

/// Knobs for the dashboard views and the record store reads behind them.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardConfig {
    /// Trailing window, in days, used by the risk distribution chart.
    pub risk_window_days: i64,
    /// Number of rows shown in the recent applications table.
    pub recent_limit: usize,
    /// Upper bound for a single record store read.
    pub store_timeout: Duration,
    /// Prefix used when rendering monetary amounts.
    pub currency: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            risk_window_days: 30,
            recent_limit: 5,
            store_timeout: Duration::from_millis(5_000),
            currency: "KSh".to_string(),
        }
    }
}

impl DashboardConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let risk_window_days = match env::var("APP_RISK_WINDOW_DAYS") {
            Ok(raw) => raw
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|days| (1..=MAX_RISK_WINDOW_DAYS).contains(days))
                .ok_or(ConfigError::InvalidRiskWindow)?,
            Err(_) => defaults.risk_window_days,
        };

        let recent_limit = match env::var("APP_RECENT_LIMIT") {
            Ok(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|limit| *limit > 0)
                .ok_or(ConfigError::InvalidRecentLimit)?,
            Err(_) => defaults.recent_limit,
        };

        let store_timeout = match env::var("APP_STORE_TIMEOUT_MS") {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|millis| *millis > 0)
                .map(Duration::from_millis)
                .ok_or(ConfigError::InvalidStoreTimeout)?,
            Err(_) => defaults.store_timeout,
        };

        let currency = env::var("APP_CURRENCY")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or(defaults.currency);

        Ok(Self {
            risk_window_days,
            recent_limit,
            store_timeout,
            currency,
        })
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidRiskWindow,
    InvalidRecentLimit,
    InvalidStoreTimeout,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidRiskWindow => {
                write!(
                    f,
                    "APP_RISK_WINDOW_DAYS must be between 1 and {MAX_RISK_WINDOW_DAYS} days"
                )
            }
            ConfigError::InvalidRecentLimit => {
                write!(f, "APP_RECENT_LIMIT must be a positive row count")
            }
            ConfigError::InvalidStoreTimeout => {
                write!(f, "APP_STORE_TIMEOUT_MS must be a positive number of milliseconds")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidRiskWindow
            | ConfigError::InvalidRecentLimit
            | ConfigError::InvalidStoreTimeout => None,
        }
    }
}
