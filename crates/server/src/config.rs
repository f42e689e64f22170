use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub http_bind: String,
    pub tcp_bind: String,
    pub syslog_udp_bind: String,
    pub syslog_tcp_bind: String,
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
    pub http_body_limit_single: usize,
    pub http_body_limit_bulk: usize,
    pub read_timeout_secs: u64,
    pub write_timeout_secs: u64,
    pub tcp_read_idle_timeout_secs: u64,

    pub batch_size: usize,
    pub flush_interval_secs: u64,
    pub max_retries: u32,
    pub initial_backoff_secs: u64,

    pub hub_channel_bound: usize,
    pub ws_max_message: usize,
    pub ws_pong_wait_secs: u64,
    pub ws_ping_period_secs: u64,

    pub tailer_poll_secs: u64,
    pub tailer_batch: usize,

    pub shutdown_deadline_secs: u64,

    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info,logserver=debug".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl ServerConfig {
    /// Load configuration from `server.toml` and environment variables.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = config::Config::try_from(&ServerConfig::default())
            .context("Failed to serialize default configuration")?;

        let mut builder = config::Config::builder().add_source(defaults);

        let config_paths = ["/etc/logcore/server", "config/server", "crates/server/config/server"];
        for path in config_paths {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("SERVER")
                .separator("__")
                .try_parsing(true),
        );

        builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    pub fn validate(&self) -> Result<()> {
        self.http_bind
            .parse::<std::net::SocketAddr>()
            .context("Invalid http_bind")?;
        self.tcp_bind
            .parse::<std::net::SocketAddr>()
            .context("Invalid tcp_bind")?;
        self.syslog_udp_bind
            .parse::<std::net::SocketAddr>()
            .context("Invalid syslog_udp_bind")?;
        self.syslog_tcp_bind
            .parse::<std::net::SocketAddr>()
            .context("Invalid syslog_tcp_bind")?;

        anyhow::ensure!(self.batch_size > 0, "batch_size must be > 0");
        anyhow::ensure!(self.hub_channel_bound > 0, "hub_channel_bound must be > 0");
        anyhow::ensure!(self.http_body_limit_single > 0, "http_body_limit_single must be > 0");
        anyhow::ensure!(self.http_body_limit_bulk > 0, "http_body_limit_bulk must be > 0");
        anyhow::ensure!(self.tailer_batch > 0, "tailer_batch must be > 0");

        Ok(())
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_secs(self.initial_backoff_secs)
    }

    pub fn ws_pong_wait(&self) -> Duration {
        Duration::from_secs(self.ws_pong_wait_secs)
    }

    pub fn ws_ping_period(&self) -> Duration {
        Duration::from_secs(self.ws_ping_period_secs)
    }

    pub fn tailer_poll(&self) -> Duration {
        Duration::from_secs(self.tailer_poll_secs)
    }

    pub fn shutdown_deadline(&self) -> Duration {
        Duration::from_secs(self.shutdown_deadline_secs)
    }

    pub fn tcp_read_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.tcp_read_idle_timeout_secs)
    }

    pub fn batch_config(&self) -> logcore::BatchConfig {
        logcore::BatchConfig {
            batch_size: self.batch_size,
            flush_interval: self.flush_interval(),
            max_retries: self.max_retries,
            initial_backoff: self.initial_backoff(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_bind: "0.0.0.0:8080".to_string(),
            tcp_bind: "0.0.0.0:8081".to_string(),
            syslog_udp_bind: "0.0.0.0:8514".to_string(),
            syslog_tcp_bind: "0.0.0.0:8515".to_string(),
            enable_cors: true,
            cors_origins: vec!["http://localhost:3000".to_string()],
            http_body_limit_single: 1024 * 1024,
            http_body_limit_bulk: 10 * 1024 * 1024,
            read_timeout_secs: 30,
            write_timeout_secs: 30,
            tcp_read_idle_timeout_secs: 300,

            batch_size: 500,
            flush_interval_secs: 5,
            max_retries: 3,
            initial_backoff_secs: 1,

            hub_channel_bound: 256,
            ws_max_message: 512 * 1024,
            ws_pong_wait_secs: 60,
            ws_ping_period_secs: 54,

            tailer_poll_secs: 1,
            tailer_batch: 100,

            shutdown_deadline_secs: 30,

            logging: LoggingConfig::default(),
        }
    }
}
