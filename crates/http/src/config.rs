//! Process settings, read once from flags and environment variables at startup.

use std::time::Duration;

use clap::Parser;
use thiserror::Error;

const KB: u64 = 1024;
const MB: u64 = 1024 * KB;
const GB: u64 = 1024 * MB;

pub const DEFAULT_MAX_BODY_SIZE: u64 = 10 * MB;

const KNOWN_ENVIRONMENTS: [&str; 3] = ["development", "production", "test"];
const KNOWN_LOG_LEVELS: [&str; 4] = ["debug", "info", "warn", "error"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Args(#[from] clap::Error),

    #[error("invalid PORT: {port}. Must be between 1 and 65535")]
    InvalidPort { port: u16 },

    #[error("invalid size {value:?}: {reason}")]
    InvalidSize { value: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(version, about = "Demo HTTP server with health, greeting, echo and data endpoints")]
pub struct ServerConfig {
    /// TCP port to listen on
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// development, production or test
    #[arg(long, env = "APP_ENV", default_value = "development")]
    pub environment: String,

    /// debug, info, warn or error
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Largest accepted request body, e.g. `512kb` or `10mb`
    #[arg(long, env = "MAX_BODY_SIZE", default_value = "10mb", value_parser = parse_byte_size)]
    pub max_body_size: u64,

    /// Value of `Access-Control-Allow-Origin`
    #[arg(long, env = "CORS_ORIGIN", default_value = "*")]
    pub cors_origin: String,

    /// Milliseconds to wait for open connections after a shutdown signal
    #[arg(long, env = "SHUTDOWN_TIMEOUT", default_value_t = 10_000)]
    pub shutdown_timeout: u64,

    /// Milliseconds allowed for reading a request body, 0 disables the limit
    #[arg(long, env = "BODY_TIMEOUT", default_value_t = 30_000)]
    pub body_timeout: u64,

    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            environment: "development".to_owned(),
            log_level: "info".to_owned(),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            cors_origin: "*".to_owned(),
            shutdown_timeout: 10_000,
            body_timeout: 30_000,
            jwt_secret: None,
        }
    }
}

impl ServerConfig {
    /// Parses flags and environment, then validates.
    ///
    /// Returns the config together with any warnings worth logging once a
    /// subscriber is installed.
    pub fn load() -> Result<(Self, Vec<String>), ConfigError> {
        let config = Self::try_parse()?;
        let warnings = config.validate()?;
        Ok((config, warnings))
    }

    pub fn validate(&self) -> Result<Vec<String>, ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidPort { port: self.port });
        }

        let mut warnings = vec![];
        if !KNOWN_ENVIRONMENTS.contains(&self.environment.as_str()) {
            warnings.push(format!(
                "Unknown APP_ENV: {}. Expected: development, production, or test.",
                self.environment
            ));
        }
        if !KNOWN_LOG_LEVELS.contains(&self.log_level.as_str()) {
            warnings.push(format!("Unknown LOG_LEVEL: {}. Expected: debug, info, warn, or error.", self.log_level));
        }
        if self.is_production() {
            if self.jwt_secret.as_deref().is_none_or(str::is_empty) {
                warnings.push("JWT_SECRET not set in production environment".to_owned());
            }
            if self.cors_origin == "*" {
                warnings.push(
                    "CORS_ORIGIN is set to \"*\" in production - consider restricting to specific domains".to_owned(),
                );
            }
        }
        Ok(warnings)
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout)
    }

    /// `None` when body reads are unbounded in time.
    pub fn body_timeout(&self) -> Option<Duration> {
        (self.body_timeout > 0).then(|| Duration::from_millis(self.body_timeout))
    }
}

/// Parses `<n>`, `<n>b`, `<n>kb`, `<n>mb` or `<n>gb`, case-insensitive, binary multiples.
pub fn parse_byte_size(value: &str) -> Result<u64, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidSize { value: value.to_owned(), reason: reason.to_owned() };

    let text = value.trim().to_ascii_lowercase();
    let split = text.find(|c: char| !c.is_ascii_digit()).unwrap_or(text.len());
    let (digits, unit) = text.split_at(split);
    if digits.is_empty() {
        return Err(invalid("expected a number"));
    }

    let number: u64 = digits.parse().map_err(|_e| invalid("number out of range"))?;
    let multiplier = match unit.trim() {
        "" | "b" => 1,
        "kb" => KB,
        "mb" => MB,
        "gb" => GB,
        _ => return Err(invalid("unit must be b, kb, mb or gb")),
    };
    number.checked_mul(multiplier).ok_or_else(|| invalid("size out of range"))
}

/// Renders a byte count the way limits are written: `10MB`, `512KB`, or `1500 bytes`.
pub fn format_byte_size(bytes: u64) -> String {
    match bytes {
        b if b >= GB && b % GB == 0 => format!("{}GB", b / GB),
        b if b >= MB && b % MB == 0 => format!("{}MB", b / MB),
        b if b >= KB && b % KB == 0 => format!("{}KB", b / KB),
        b => format!("{b} bytes"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_sizes() {
        assert_eq!(parse_byte_size("10mb").unwrap(), 10_485_760);
        assert_eq!(parse_byte_size("512KB").unwrap(), 524_288);
        assert_eq!(parse_byte_size("2048").unwrap(), 2048);
        assert_eq!(parse_byte_size("1 gb").unwrap(), GB);
        assert!(parse_byte_size("mb").is_err());
        assert!(parse_byte_size("10tb").is_err());
        assert!(parse_byte_size("").is_err());
    }

    #[test]
    fn formatted_sizes() {
        assert_eq!(format_byte_size(DEFAULT_MAX_BODY_SIZE), "10MB");
        assert_eq!(format_byte_size(64 * KB), "64KB");
        assert_eq!(format_byte_size(1500), "1500 bytes");
    }

    #[test]
    fn flags_override_defaults() {
        let config = ServerConfig::try_parse_from([
            "duet-http",
            "--port",
            "8080",
            "--max-body-size",
            "1kb",
            "--body-timeout",
            "0",
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.max_body_size, 1024);
        assert_eq!(config.body_timeout(), None);
    }

    #[test]
    fn malformed_size_flag_is_rejected() {
        assert!(ServerConfig::try_parse_from(["duet-http", "--max-body-size", "lots"]).is_err());
    }

    #[test]
    fn help_and_bad_flags_carry_their_exit_codes() {
        let help = ServerConfig::try_parse_from(["duet-http", "--help"]).unwrap_err();
        assert_eq!(help.kind(), clap::error::ErrorKind::DisplayHelp);
        assert_eq!(help.exit_code(), 0);

        let bad = ConfigError::from(ServerConfig::try_parse_from(["duet-http", "--port", "http"]).unwrap_err());
        let ConfigError::Args(bad) = bad else { panic!("expected an argument error") };
        assert_eq!(bad.exit_code(), 2);
    }

    #[test]
    fn port_zero_is_an_error() {
        let config = ServerConfig { port: 0, ..ServerConfig::default() };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidPort { port: 0 })));
    }

    #[test]
    fn production_warnings() {
        let config = ServerConfig { environment: "production".to_owned(), ..ServerConfig::default() };
        let warnings = config.validate().unwrap();
        assert_eq!(warnings.len(), 2);
        assert!(warnings.iter().any(|w| w.contains("JWT_SECRET")));
        assert!(warnings.iter().any(|w| w.contains("CORS_ORIGIN")));

        let quiet = ServerConfig {
            environment: "production".to_owned(),
            cors_origin: "https://example.com".to_owned(),
            jwt_secret: Some("s3cret".to_owned()),
            ..ServerConfig::default()
        };
        assert!(quiet.validate().unwrap().is_empty());
    }

    #[test]
    fn unknown_values_only_warn() {
        let config =
            ServerConfig { environment: "staging".to_owned(), log_level: "loud".to_owned(), ..ServerConfig::default() };
        assert_eq!(config.validate().unwrap().len(), 2);
    }
}
