use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use customers_core::config::{resolve_config_path, AppConfig, LoadOptions, ENV_PREFIX};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = resolve_config_path(None);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines =
        vec!["effective config (source precedence: env > file > default):".to_string()];

    for (key_path, value, env_aliases) in effective_values(&config) {
        let source = field_source(
            key_path,
            &env_aliases,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(key_path, &value, source));
    }

    lines.join("\n")
}

fn effective_values(config: &AppConfig) -> Vec<(&'static str, String, Vec<String>)> {
    let display_path = |path: Option<&PathBuf>| {
        path.map(|path| path.display().to_string()).unwrap_or_else(|| "<unset>".to_string())
    };

    vec![
        ("server.bind_address", config.server.bind_address.clone(), env_keys(&["SERVER_BIND_ADDRESS"])),
        ("server.port", config.server.port.to_string(), env_keys(&["SERVER_PORT"])),
        (
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            env_keys(&["SERVER_GRACEFUL_SHUTDOWN_SECS"]),
        ),
        ("privileges.path", display_path(config.privileges.path.as_ref()), env_keys(&["PRIVILEGES_PATH"])),
        (
            "privileges.latency_ms",
            config.privileges.latency_ms.to_string(),
            env_keys(&["PRIVILEGES_LATENCY_MS"]),
        ),
        ("privileges.cache", config.privileges.cache.to_string(), env_keys(&["PRIVILEGES_CACHE"])),
        ("storage.backend", config.storage.backend.as_str().to_string(), env_keys(&["STORAGE_BACKEND"])),
        ("storage.path", display_path(config.storage.path.as_ref()), env_keys(&["STORAGE_PATH"])),
        (
            "clock.fixed_epoch_secs",
            config
                .clock
                .fixed_epoch_secs
                .map(|secs| secs.to_string())
                .unwrap_or_else(|| "<system clock>".to_string()),
            env_keys(&["CLOCK_FIXED_EPOCH_SECS"]),
        ),
        ("logging.level", config.logging.level.clone(), env_keys(&["LOGGING_LEVEL", "LOG_LEVEL"])),
        (
            "logging.format",
            format!("{:?}", config.logging.format).to_ascii_lowercase(),
            env_keys(&["LOGGING_FORMAT", "LOG_FORMAT"]),
        ),
    ]
}

fn env_keys(suffixes: &[&str]) -> Vec<String> {
    suffixes.iter().map(|suffix| format!("{ENV_PREFIX}{suffix}")).collect()
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_aliases: &[String],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_aliases.iter().find(|key| env::var_os(key.as_str()).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
