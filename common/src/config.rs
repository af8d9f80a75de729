// Configuration management with layered configuration (file, env)

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main settings structure containing all configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub scraper: ScraperConfig,
    pub dedup: DedupConfig,
    pub email: EmailConfig,
    pub scan: ScanConfig,
    pub retention: RetentionConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    pub pool_size: u32,
}

/// Discovery engine client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    pub base_url: String,
    pub connect_timeout_seconds: u64,
    /// Upper bound for a single scraping job, submission to terminal status
    pub job_timeout_seconds: u64,
    pub poll_interval_seconds: u64,
    pub max_concurrent_jobs: usize,
    pub max_results: u32,
}

/// Deduplication and relevance thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupConfig {
    pub similarity_threshold: f64,
    pub min_relevance_score: f64,
    /// How many recent same-source tenders to compare against
    pub recent_window: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: String,
}

/// Daily scan and maintenance schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    pub hour: u32,
    pub minute: u32,
    pub maintenance_hour: u32,
    pub timezone: String,
    pub lease_ttl_seconds: u64,
    /// Cap on total run duration regardless of source count
    pub max_run_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    pub tender_days: i64,
    /// Tenders at or above this relevance are kept past the window
    pub keep_relevance_at_least: f64,
    pub job_days: i64,
    pub notification_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub json_logs: bool,
    pub metrics_port: u16,
}

impl Settings {
    /// Load configuration with layered precedence: defaults -> file -> env
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("config")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();
        let defaults = Config::try_from(&Settings::default())?;

        let builder = Config::builder()
            .add_source(defaults)
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Local configuration, not committed to git
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("Server port must be greater than 0".to_string());
        }

        if self.database.url.is_empty() {
            return Err("Database URL cannot be empty".to_string());
        }
        if self.database.max_connections == 0 {
            return Err("Database max_connections must be greater than 0".to_string());
        }

        if self.redis.url.is_empty() {
            return Err("Redis URL cannot be empty".to_string());
        }

        if self.scraper.base_url.is_empty() {
            return Err("Scraper base_url cannot be empty".to_string());
        }
        if self.scraper.poll_interval_seconds == 0 {
            return Err("Scraper poll_interval_seconds must be greater than 0".to_string());
        }
        if self.scraper.job_timeout_seconds < self.scraper.poll_interval_seconds {
            return Err("Scraper job_timeout_seconds must cover at least one poll".to_string());
        }
        if self.scraper.max_concurrent_jobs == 0 {
            return Err("Scraper max_concurrent_jobs must be greater than 0".to_string());
        }

        if !(0.0..=1.0).contains(&self.dedup.similarity_threshold) {
            return Err("Dedup similarity_threshold must be between 0.0 and 1.0".to_string());
        }
        if !(0.0..=1.0).contains(&self.dedup.min_relevance_score) {
            return Err("Dedup min_relevance_score must be between 0.0 and 1.0".to_string());
        }
        if self.dedup.recent_window == 0 {
            return Err("Dedup recent_window must be greater than 0".to_string());
        }

        if self.email.smtp_host.is_empty() {
            return Err("Email smtp_host cannot be empty".to_string());
        }
        if !self.email.from_address.contains('@') {
            return Err("Email from_address must be a valid address".to_string());
        }

        if self.scan.hour > 23 || self.scan.maintenance_hour > 23 {
            return Err("Scan hours must be between 0 and 23".to_string());
        }
        if self.scan.minute > 59 {
            return Err("Scan minute must be between 0 and 59".to_string());
        }
        if self.scan.lease_ttl_seconds == 0 {
            return Err("Scan lease_ttl_seconds must be greater than 0".to_string());
        }

        if self.retention.tender_days <= 0
            || self.retention.job_days <= 0
            || self.retention.notification_days <= 0
        {
            return Err("Retention windows must be positive".to_string());
        }

        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                url: "postgresql://localhost/tenderwatch".to_string(),
                max_connections: 10,
                min_connections: 2,
                connect_timeout_seconds: 30,
            },
            redis: RedisConfig {
                url: "redis://localhost:6379".to_string(),
                pool_size: 10,
            },
            scraper: ScraperConfig {
                base_url: "http://localhost:9100".to_string(),
                connect_timeout_seconds: 30,
                job_timeout_seconds: 600,
                poll_interval_seconds: 5,
                max_concurrent_jobs: 5,
                max_results: 50,
            },
            dedup: DedupConfig {
                similarity_threshold: 0.8,
                min_relevance_score: 0.3,
                recent_window: 50,
            },
            email: EmailConfig {
                smtp_host: "localhost".to_string(),
                smtp_port: 1025,
                username: None,
                password: None,
                from_address: "tenderwatch@example.com".to_string(),
            },
            scan: ScanConfig {
                hour: 8,
                minute: 0,
                maintenance_hour: 2,
                timezone: "Europe/Prague".to_string(),
                lease_ttl_seconds: 900,
                max_run_seconds: 3600,
            },
            retention: RetentionConfig {
                tender_days: 90,
                keep_relevance_at_least: 0.7,
                job_days: 30,
                notification_days: 60,
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                json_logs: true,
                metrics_port: 9090,
            },
        }
    }
}
