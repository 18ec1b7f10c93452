use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use crate::services::review::{DEFAULT_REVIEW_LIMIT, MAX_REVIEW_LIMIT};

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub logging: LogConfig,
    /// Due-word count when the caller gives no `limit`
    pub review_default_limit: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogConfig {
    /// `EnvFilter` directive, from `RUST_LOG`
    pub level: String,
    /// Directory for daily log files; `None` keeps logs on stdout only
    pub file_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3000);

        let host = std::env::var("HOST")
            .ok()
            .and_then(|value| value.parse::<IpAddr>().ok())
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));

        let review_default_limit = std::env::var("REVIEW_DEFAULT_LIMIT")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(DEFAULT_REVIEW_LIMIT)
            .clamp(1, MAX_REVIEW_LIMIT);

        Self {
            host,
            port,
            logging: LogConfig::from_env(),
            review_default_limit,
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 3000,
            logging: LogConfig::default(),
            review_default_limit: DEFAULT_REVIEW_LIMIT,
        }
    }
}

impl LogConfig {
    pub fn from_env() -> Self {
        Self::from_vars(
            std::env::var("RUST_LOG").ok(),
            std::env::var("ENABLE_FILE_LOGS").ok(),
            std::env::var("LOG_DIR").ok(),
        )
    }

    fn from_vars(
        rust_log: Option<String>,
        enable_file_logs: Option<String>,
        log_dir: Option<String>,
    ) -> Self {
        let enabled = enable_file_logs
            .as_deref()
            .map(str::trim)
            .is_some_and(|v| v.eq_ignore_ascii_case("true") || v == "1");

        let file_dir = enabled.then(|| {
            log_dir
                .map(|dir| dir.trim().to_string())
                .filter(|dir| !dir.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./logs"))
        });

        Self {
            level: rust_log
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| "info".to_string()),
            file_dir,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_dir: None,
        }
    }
}
