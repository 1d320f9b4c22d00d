use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const ENV_PREFIX: &str = "CUSTOMERS_";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub privileges: PrivilegesConfig,
    pub storage: StorageConfig,
    pub clock: ClockConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct PrivilegesConfig {
    pub path: Option<PathBuf>,
    pub latency_ms: u64,
    pub cache: bool,
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub path: Option<PathBuf>,
}

#[derive(Clone, Debug, Default)]
pub struct ClockConfig {
    pub fixed_epoch_secs: Option<i64>,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Memory,
    FileLog,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub port: Option<u16>,
    pub log_level: Option<String>,
    pub privileges_path: Option<PathBuf>,
    pub privileges_latency_ms: Option<u64>,
    pub storage_backend: Option<StorageBackend>,
    pub storage_path: Option<PathBuf>,
    pub fixed_epoch_secs: Option<i64>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 5050,
                graceful_shutdown_secs: 15,
            },
            privileges: PrivilegesConfig { path: None, latency_ms: 0, cache: true },
            storage: StorageConfig { backend: StorageBackend::Memory, path: None },
            clock: ClockConfig::default(),
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::FileLog => "file_log",
        }
    }
}

impl std::str::FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "memory" => Ok(Self::Memory),
            "file_log" => Ok(Self::FileLog),
            other => Err(ConfigError::Validation(format!(
                "unsupported storage backend `{other}` (expected memory|file_log)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("customers.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(privileges) = patch.privileges {
            if let Some(path) = privileges.path {
                self.privileges.path = Some(path);
            }
            if let Some(latency_ms) = privileges.latency_ms {
                self.privileges.latency_ms = latency_ms;
            }
            if let Some(cache) = privileges.cache {
                self.privileges.cache = cache;
            }
        }

        if let Some(storage) = patch.storage {
            if let Some(backend) = storage.backend {
                self.storage.backend = backend;
            }
            if let Some(path) = storage.path {
                self.storage.path = Some(path);
            }
        }

        if let Some(clock) = patch.clock {
            if let Some(fixed_epoch_secs) = clock.fixed_epoch_secs {
                self.clock.fixed_epoch_secs = Some(fixed_epoch_secs);
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("CUSTOMERS_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("CUSTOMERS_SERVER_PORT") {
            self.server.port = parse_env("CUSTOMERS_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("CUSTOMERS_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_env("CUSTOMERS_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("CUSTOMERS_PRIVILEGES_PATH") {
            self.privileges.path = Some(PathBuf::from(value));
        }
        if let Some(value) = read_env("CUSTOMERS_PRIVILEGES_LATENCY_MS") {
            self.privileges.latency_ms = parse_env("CUSTOMERS_PRIVILEGES_LATENCY_MS", &value)?;
        }
        if let Some(value) = read_env("CUSTOMERS_PRIVILEGES_CACHE") {
            self.privileges.cache = parse_env("CUSTOMERS_PRIVILEGES_CACHE", &value)?;
        }

        if let Some(value) = read_env("CUSTOMERS_STORAGE_BACKEND") {
            self.storage.backend = value.parse()?;
        }
        if let Some(value) = read_env("CUSTOMERS_STORAGE_PATH") {
            self.storage.path = Some(PathBuf::from(value));
        }

        if let Some(value) = read_env("CUSTOMERS_CLOCK_FIXED_EPOCH_SECS") {
            self.clock.fixed_epoch_secs =
                Some(parse_env("CUSTOMERS_CLOCK_FIXED_EPOCH_SECS", &value)?);
        }

        let log_level =
            read_env("CUSTOMERS_LOGGING_LEVEL").or_else(|| read_env("CUSTOMERS_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("CUSTOMERS_LOGGING_FORMAT").or_else(|| read_env("CUSTOMERS_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(path) = overrides.privileges_path {
            self.privileges.path = Some(path);
        }
        if let Some(latency_ms) = overrides.privileges_latency_ms {
            self.privileges.latency_ms = latency_ms;
        }
        if let Some(backend) = overrides.storage_backend {
            self.storage.backend = backend;
        }
        if let Some(path) = overrides.storage_path {
            self.storage.path = Some(path);
        }
        if let Some(fixed_epoch_secs) = overrides.fixed_epoch_secs {
            self.clock.fixed_epoch_secs = Some(fixed_epoch_secs);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_server(&self.server)?;
        validate_privileges(&self.privileges)?;
        validate_storage(&self.storage)?;
        validate_clock(&self.clock)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

/// Locates the config file: an explicit path wins, otherwise the well-known locations.
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("customers.toml"), PathBuf::from("config/customers.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }

    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_privileges(privileges: &PrivilegesConfig) -> Result<(), ConfigError> {
    let missing = privileges
        .path
        .as_ref()
        .map(|path| path.as_os_str().is_empty())
        .unwrap_or(true);
    if missing {
        return Err(ConfigError::Validation(
            "privileges.path is required: point it at a YAML file mapping auth tokens to privileges"
                .to_string(),
        ));
    }

    if privileges.latency_ms > 60_000 {
        return Err(ConfigError::Validation(
            "privileges.latency_ms must be in range 0..=60000".to_string(),
        ));
    }

    Ok(())
}

fn validate_storage(storage: &StorageConfig) -> Result<(), ConfigError> {
    if storage.backend == StorageBackend::FileLog && storage.path.is_none() {
        return Err(ConfigError::Validation(
            "storage.path is required when storage.backend is `file_log`".to_string(),
        ));
    }

    Ok(())
}

fn validate_clock(clock: &ClockConfig) -> Result<(), ConfigError> {
    if let Some(secs) = clock.fixed_epoch_secs {
        if crate::clock::FixedClock::from_epoch_secs(secs).is_none() {
            return Err(ConfigError::Validation(format!(
                "clock.fixed_epoch_secs `{secs}` is outside the supported timestamp range"
            )));
        }
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    server: Option<ServerPatch>,
    privileges: Option<PrivilegesPatch>,
    storage: Option<StoragePatch>,
    clock: Option<ClockPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct PrivilegesPatch {
    path: Option<PathBuf>,
    latency_ms: Option<u64>,
    cache: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct StoragePatch {
    backend: Option<StorageBackend>,
    path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct ClockPatch {
    fixed_epoch_secs: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
