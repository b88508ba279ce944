//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use private_codex::SessionConfig;
use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

pub const DEFAULT_TCP_BIND: &str = "127.0.0.1:6969";
pub const DEFAULT_HTTP_BIND: &str = "127.0.0.1:8080";

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address of the bincode TCP transport
    pub tcp_bind: SocketAddr,
    /// Bind address of the HTTP/WebSocket server
    pub http_bind: SocketAddr,
    /// Prometheus scrape endpoint. Metrics are off when unset.
    pub metrics_bind: Option<SocketAddr>,
    /// Snapshot file. In-flight matches only survive in memory when unset.
    pub snapshot_path: Option<PathBuf>,
    /// Session actor settings
    pub session: SessionConfig,
    /// WebSocket input limits
    pub rate_limit: RateLimitConfig,
}

/// Per-connection WebSocket message limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Messages allowed per second
    pub burst: usize,
    /// Messages allowed per minute
    pub sustained: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            burst: 10,
            sustained: 100,
        }
    }
}

/// Values given on the command line win over the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub tcp_bind: Option<SocketAddr>,
    pub http_bind: Option<SocketAddr>,
    pub snapshot_path: Option<PathBuf>,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `overrides` - Values from CLI args
    ///
    /// # Returns
    ///
    /// * `Result<ServerConfig, ConfigError>` - Loaded configuration or error
    ///
    /// # Errors
    ///
    /// Returns error if a variable is set but can't be parsed
    pub fn from_env(overrides: Overrides) -> Result<Self, ConfigError> {
        let tcp_bind = match overrides.tcp_bind {
            Some(addr) => addr,
            None => parse_env_or("CODEX_TCP_BIND", default_addr(DEFAULT_TCP_BIND)?)?,
        };
        let http_bind = match overrides.http_bind {
            Some(addr) => addr,
            None => parse_env_or("CODEX_HTTP_BIND", default_addr(DEFAULT_HTTP_BIND)?)?,
        };
        let metrics_bind = parse_env("CODEX_METRICS_BIND")?;
        let snapshot_path = overrides
            .snapshot_path
            .or(parse_env::<PathBuf>("CODEX_SNAPSHOT_PATH")?);

        let defaults = SessionConfig::default();
        let probe_ms: u64 = parse_env_or(
            "CODEX_PROBE_INTERVAL_MS",
            defaults.probe_interval.as_millis() as u64,
        )?;
        let session = SessionConfig {
            probe_interval: Duration::from_millis(probe_ms),
            inbox_capacity: parse_env_or("CODEX_INBOX_CAPACITY", defaults.inbox_capacity)?,
            rng_seed: parse_env("CODEX_RNG_SEED")?,
        };

        let rate_defaults = RateLimitConfig::default();
        let rate_limit = RateLimitConfig {
            burst: parse_env_or("CODEX_WS_BURST", rate_defaults.burst)?,
            sustained: parse_env_or("CODEX_WS_SUSTAINED", rate_defaults.sustained)?,
        };

        Ok(ServerConfig {
            tcp_bind,
            http_bind,
            metrics_bind,
            snapshot_path,
            session,
            rate_limit,
        })
    }

    /// Validate configuration after loading
    ///
    /// # Returns
    ///
    /// * `Result<(), ConfigError>` - Success or validation error
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.session
            .validate()
            .map_err(|reason| ConfigError::Invalid {
                var: "CODEX_PROBE_INTERVAL_MS/CODEX_INBOX_CAPACITY".to_string(),
                reason,
            })?;

        if self.tcp_bind.port() != 0 && self.tcp_bind == self.http_bind {
            return Err(ConfigError::Invalid {
                var: "CODEX_HTTP_BIND".to_string(),
                reason: format!("Must differ from the TCP bind address ({})", self.tcp_bind),
            });
        }

        if let Some(metrics_bind) = self.metrics_bind
            && metrics_bind.port() != 0
            && (metrics_bind == self.tcp_bind || metrics_bind == self.http_bind)
        {
            return Err(ConfigError::Invalid {
                var: "CODEX_METRICS_BIND".to_string(),
                reason: "Must differ from the TCP and HTTP bind addresses".to_string(),
            });
        }

        if self.rate_limit.burst == 0 {
            return Err(ConfigError::Invalid {
                var: "CODEX_WS_BURST".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.rate_limit.sustained < self.rate_limit.burst {
            return Err(ConfigError::Invalid {
                var: "CODEX_WS_SUSTAINED".to_string(),
                reason: format!(
                    "Must be at least the burst limit ({})",
                    self.rate_limit.burst
                ),
            });
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

fn default_addr(addr: &str) -> Result<SocketAddr, ConfigError> {
    addr.parse().map_err(|_| ConfigError::Invalid {
        var: "default bind address".to_string(),
        reason: format!("{addr} is not a socket address"),
    })
}

/// Parse an optional environment variable. Set but unparsable is an error.
fn parse_env<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
{
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => {
            value
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| ConfigError::Invalid {
                    var: key.to_string(),
                    reason: format!("Can't parse {value:?}"),
                })
        }
        _ => Ok(None),
    }
}

/// Helper to parse environment variable with default fallback
fn parse_env_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
{
    Ok(parse_env(key)?.unwrap_or(default))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 9] = [
        "CODEX_TCP_BIND",
        "CODEX_HTTP_BIND",
        "CODEX_METRICS_BIND",
        "CODEX_SNAPSHOT_PATH",
        "CODEX_PROBE_INTERVAL_MS",
        "CODEX_INBOX_CAPACITY",
        "CODEX_RNG_SEED",
        "CODEX_WS_BURST",
        "CODEX_WS_SUSTAINED",
    ];

    fn clear_env() {
        for var in VARS {
            // SAFETY: tests touching the environment are serialized.
            unsafe { std::env::remove_var(var) };
        }
    }

    fn set(var: &str, value: &str) {
        // SAFETY: tests touching the environment are serialized.
        unsafe { std::env::set_var(var, value) };
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();
        let config = ServerConfig::from_env(Overrides::default()).unwrap();
        assert_eq!(config.tcp_bind, DEFAULT_TCP_BIND.parse().unwrap());
        assert_eq!(config.http_bind, DEFAULT_HTTP_BIND.parse().unwrap());
        assert!(config.metrics_bind.is_none());
        assert!(config.snapshot_path.is_none());
        assert_eq!(config.session, SessionConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_env_values() {
        clear_env();
        set("CODEX_TCP_BIND", "0.0.0.0:7000");
        set("CODEX_PROBE_INTERVAL_MS", "250");
        set("CODEX_RNG_SEED", "42");
        set("CODEX_SNAPSHOT_PATH", "/tmp/codex.snapshot");
        let config = ServerConfig::from_env(Overrides::default()).unwrap();
        assert_eq!(config.tcp_bind, "0.0.0.0:7000".parse().unwrap());
        assert_eq!(config.session.probe_interval, Duration::from_millis(250));
        assert_eq!(config.session.rng_seed, Some(42));
        assert_eq!(
            config.snapshot_path,
            Some(PathBuf::from("/tmp/codex.snapshot"))
        );
        clear_env();
    }

    #[test]
    #[serial]
    fn test_overrides_win() {
        clear_env();
        set("CODEX_TCP_BIND", "0.0.0.0:7000");
        let overrides = Overrides {
            tcp_bind: Some("127.0.0.1:7100".parse().unwrap()),
            ..Default::default()
        };
        let config = ServerConfig::from_env(overrides).unwrap();
        assert_eq!(config.tcp_bind, "127.0.0.1:7100".parse().unwrap());
        clear_env();
    }

    #[test]
    #[serial]
    fn test_unparsable_value_is_an_error() {
        clear_env();
        set("CODEX_PROBE_INTERVAL_MS", "soon");
        let err = ServerConfig::from_env(Overrides::default()).unwrap_err();
        assert!(err.to_string().contains("CODEX_PROBE_INTERVAL_MS"));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_zero_probe_interval_fails_validation() {
        clear_env();
        set("CODEX_PROBE_INTERVAL_MS", "0");
        let config = ServerConfig::from_env(Overrides::default()).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { .. })
        ));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_same_bind_fails_validation() {
        clear_env();
        let overrides = Overrides {
            tcp_bind: Some("127.0.0.1:7000".parse().unwrap()),
            http_bind: Some("127.0.0.1:7000".parse().unwrap()),
            ..Default::default()
        };
        let config = ServerConfig::from_env(overrides).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("CODEX_HTTP_BIND"));
    }

    #[test]
    fn test_sustained_below_burst_fails_validation() {
        let config = ServerConfig {
            tcp_bind: "127.0.0.1:0".parse().unwrap(),
            http_bind: "127.0.0.1:0".parse().unwrap(),
            metrics_bind: None,
            snapshot_path: None,
            session: SessionConfig::default(),
            rate_limit: RateLimitConfig {
                burst: 10,
                sustained: 5,
            },
        };
        assert!(config.validate().is_err());
    }
}
