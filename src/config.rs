//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every section and field is optional; missing values fall back to the
//! defaults below. Both binaries read the same file.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, SurveyError};
use crate::sampler::AnchorPolicy;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub serial: SerialConfig,
    pub modem: ModemConfig,
    pub sampler: SamplerConfig,
    pub store: StoreConfig,
    pub sync: SyncConfig,
    pub remote: RemoteConfig,
    pub weather: WeatherConfig,
    pub backfill: BackfillConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

/// Serial port configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_nmea_port")]
    pub nmea_port: String,

    #[serde(default = "default_modem_port")]
    pub modem_port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
}

/// Modem query configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ModemConfig {
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,

    #[serde(default = "default_modem_command")]
    pub command: String,

    #[serde(default = "default_response_prefix")]
    pub response_prefix: String,
}

/// Sampler configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SamplerConfig {
    #[serde(default = "default_sample_interval_secs")]
    pub interval_secs: u64,

    #[serde(default = "default_distance_threshold_m")]
    pub distance_threshold_m: f64,

    #[serde(default)]
    pub anchor: AnchorPolicy,
}

/// Local record store configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

/// Sync driver configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    #[serde(default = "default_sync_interval_secs")]
    pub interval_secs: u64,
}

/// Remote PostGIS connection
#[derive(Debug, Deserialize, Clone)]
pub struct RemoteConfig {
    #[serde(default = "default_remote_host")]
    pub host: String,

    #[serde(default = "default_remote_port")]
    pub port: u16,

    #[serde(default = "default_remote_user")]
    pub user: String,

    #[serde(default)]
    pub password: String,

    #[serde(default = "default_remote_database")]
    pub database: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Create the `samples` table on startup if it is missing
    #[serde(default = "default_create_schema")]
    pub create_schema: bool,
}

/// Weather API configuration
#[derive(Debug, Deserialize, Clone)]
pub struct WeatherConfig {
    #[serde(default = "default_weather_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_weather_exclude")]
    pub exclude: String,

    #[serde(default = "default_weather_timeout_secs")]
    pub timeout_secs: u64,
}

/// Weather backfill configuration
#[derive(Debug, Deserialize, Clone)]
pub struct BackfillConfig {
    #[serde(default = "default_sweep_delay_secs")]
    pub sweep_delay_secs: u64,
}

/// Read endpoint configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_server_address")]
    pub address: String,

    #[serde(default = "default_server_port")]
    pub port: u16,

    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Also write daily-rolling log files here when set
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

// Default value functions
fn default_nmea_port() -> String { "/dev/ttyUSB0".to_string() }
fn default_modem_port() -> String { "/dev/ttyUSB1".to_string() }
fn default_baud_rate() -> u32 { 9600 }

fn default_query_timeout_ms() -> u64 { 2000 }
fn default_modem_command() -> String { "AT+CSQ".to_string() }
fn default_response_prefix() -> String { "+CSQ: ".to_string() }

fn default_sample_interval_secs() -> u64 { 300 }
fn default_distance_threshold_m() -> f64 { 800.0 }

fn default_store_path() -> PathBuf { PathBuf::from("./samples.db") }

fn default_sync_interval_secs() -> u64 { 3600 }

fn default_remote_host() -> String { "localhost".to_string() }
fn default_remote_port() -> u16 { 5432 }
fn default_remote_user() -> String { "postgres".to_string() }
fn default_remote_database() -> String { "gpssamples".to_string() }
fn default_max_connections() -> u32 { 5 }
fn default_connect_timeout_secs() -> u64 { 30 }
fn default_create_schema() -> bool { true }

fn default_weather_base_url() -> String { "https://api.darksky.net".to_string() }
fn default_weather_exclude() -> String { "minutely,hourly,daily,flags".to_string() }
fn default_weather_timeout_secs() -> u64 { 30 }

fn default_sweep_delay_secs() -> u64 { 600 }

fn default_server_address() -> String { "0.0.0.0".to_string() }
fn default_server_port() -> u16 { 4001 }
fn default_static_dir() -> PathBuf { PathBuf::from("resources") }

fn default_log_level() -> String { "info".to_string() }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            nmea_port: default_nmea_port(),
            modem_port: default_modem_port(),
            baud_rate: default_baud_rate(),
        }
    }
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            query_timeout_ms: default_query_timeout_ms(),
            command: default_modem_command(),
            response_prefix: default_response_prefix(),
        }
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_sample_interval_secs(),
            distance_threshold_m: default_distance_threshold_m(),
            anchor: AnchorPolicy::default(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { path: default_store_path() }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { interval_secs: default_sync_interval_secs() }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: default_remote_host(),
            port: default_remote_port(),
            user: default_remote_user(),
            password: String::new(),
            database: default_remote_database(),
            max_connections: default_max_connections(),
            connect_timeout_secs: default_connect_timeout_secs(),
            create_schema: default_create_schema(),
        }
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: default_weather_base_url(),
            api_key: String::new(),
            exclude: default_weather_exclude(),
            timeout_secs: default_weather_timeout_secs(),
        }
    }
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self { sweep_delay_secs: default_sweep_delay_secs() }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_server_address(),
            port: default_server_port(),
            static_dir: default_static_dir(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: None,
        }
    }
}

fn invalid(msg: impl std::fmt::Display) -> SurveyError {
    SurveyError::Config(toml::de::Error::custom(msg))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use signal_survey::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// Overrides applied after loading (command-line flags) should be
    /// followed by another call.
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        // Validate serial ports
        if self.serial.nmea_port.is_empty() {
            return Err(invalid("nmea_port cannot be empty"));
        }

        if self.serial.modem_port.is_empty() {
            return Err(invalid("modem_port cannot be empty"));
        }

        if self.serial.nmea_port == self.serial.modem_port {
            return Err(invalid("nmea_port and modem_port must be different devices"));
        }

        if ![4800, 9600, 19200, 38400, 57600, 115200].contains(&self.serial.baud_rate) {
            return Err(invalid(
                "baud_rate must be one of: 4800, 9600, 19200, 38400, 57600, 115200",
            ));
        }

        // Validate modem protocol
        if self.modem.query_timeout_ms == 0 || self.modem.query_timeout_ms > 30000 {
            return Err(invalid("query_timeout_ms must be between 1 and 30000"));
        }

        if self.modem.command.is_empty() {
            return Err(invalid("modem command cannot be empty"));
        }

        if self.modem.response_prefix.is_empty() {
            return Err(invalid("modem response_prefix cannot be empty"));
        }

        // Validate timing fields
        for (name, value) in [
            ("sampler interval_secs", self.sampler.interval_secs),
            ("sync interval_secs", self.sync.interval_secs),
            ("sweep_delay_secs", self.backfill.sweep_delay_secs),
            ("weather timeout_secs", self.weather.timeout_secs),
            ("connect_timeout_secs", self.remote.connect_timeout_secs),
        ] {
            if value == 0 {
                return Err(invalid(format!("{} must be greater than 0", name)));
            }
        }

        // Validate distance gate
        let threshold = self.sampler.distance_threshold_m;
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(invalid("distance_threshold_m must be a finite, non-negative number"));
        }

        if self.store.path.as_os_str().is_empty() {
            return Err(invalid("store path cannot be empty"));
        }

        // Validate remote store
        if self.remote.host.is_empty() {
            return Err(invalid("remote host cannot be empty"));
        }

        if self.remote.database.is_empty() {
            return Err(invalid("remote database cannot be empty"));
        }

        if self.remote.max_connections == 0 {
            return Err(invalid("max_connections must be greater than 0"));
        }

        if self.weather.base_url.is_empty() {
            return Err(invalid("weather base_url cannot be empty"));
        }

        if self.server.port == 0 {
            return Err(invalid("server port must be greater than 0"));
        }

        Ok(())
    }
}

impl ModemConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }
}

impl SamplerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl SyncConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl BackfillConfig {
    pub fn sweep_delay(&self) -> Duration {
        Duration::from_secs(self.sweep_delay_secs)
    }
}

impl WeatherConfig {
    /// The weather API key is only needed by the backfill process
    ///
    /// # Errors
    ///
    /// Returns a `Config` error if no key is configured
    pub fn validate_api_key(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(invalid("weather api_key is required"));
        }
        Ok(())
    }
}
