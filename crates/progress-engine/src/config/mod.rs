mod scoring;

pub use scoring::{
    CacheConfig, CategoryWeights, DebounceConfig, DecayStep, EquipmentConfig, EventConfig,
    ExperienceConfig, MilestoneConfig, PenaltyConfig, PenaltyMode, SchedulerConfig, ScoreBounds,
    ScoringConfig, StatisticKind, StatisticsConfig, WealthConfig, WealthThreshold,
};

use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

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
    pub scoring: ScoringConfig,
}

impl AppConfig {
    /// Reads the environment (after `.env`) and the optional scoring file named by
    /// `PROGRESS_CONFIG`. The scoring section is validated before it is returned.
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
        let format = LogFormat::from_str(
            &env::var("APP_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string()),
        );

        let scoring = match env::var("PROGRESS_CONFIG") {
            Ok(path) if !path.trim().is_empty() => ScoringConfig::from_path(path.trim())?,
            _ => ScoringConfig::default(),
        };
        scoring.validate()?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level, format },
            scoring,
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

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Compact,
        }
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub format: LogFormat,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost {
        source: std::net::AddrParseError,
    },
    ScoringFile {
        path: PathBuf,
        source: std::io::Error,
    },
    ScoringFormat {
        source: serde_json::Error,
    },
    InvalidWeight {
        category: String,
        value: f64,
    },
    InvalidBounds {
        min: f64,
        max: f64,
    },
    InvalidThreshold {
        field: &'static str,
        value: f64,
    },
    InvalidDecaySchedule(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::ScoringFile { path, .. } => {
                write!(f, "unable to read scoring config '{}'", path.display())
            }
            ConfigError::ScoringFormat { source } => {
                write!(f, "scoring config is malformed: {source}")
            }
            ConfigError::InvalidWeight { category, value } => write!(
                f,
                "weight for '{category}' must be a finite, non-negative percent (got {value})"
            ),
            ConfigError::InvalidBounds { min, max } => write!(
                f,
                "score bounds must be finite with min < max (got min {min}, max {max})"
            ),
            ConfigError::InvalidThreshold { field, value } => {
                write!(f, "{field} must be finite and positive (got {value})")
            }
            ConfigError::InvalidDecaySchedule(reason) => {
                write!(f, "invalid decay schedule: {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::ScoringFile { source, .. } => Some(source),
            ConfigError::ScoringFormat { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidWeight { .. }
            | ConfigError::InvalidBounds { .. }
            | ConfigError::InvalidThreshold { .. }
            | ConfigError::InvalidDecaySchedule(_) => None,
        }
    }
}
