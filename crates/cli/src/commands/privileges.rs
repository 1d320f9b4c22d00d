use customers_core::config::{AppConfig, LoadOptions};
use customers_core::{AuthToken, PrivilegeError, PrivilegeRepository};
use customers_db::StaticPrivilegeRepository;

use crate::commands::{runtime, CommandResult};

/// Looks a token up against the configured privilege source, honoring its simulated latency.
pub fn run(token: &str) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "privileges",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "privileges",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let token = AuthToken::new(token);
    let result = runtime.block_on(async {
        let path = config
            .privileges
            .path
            .as_deref()
            .ok_or_else(|| ("privilege_source", "privileges.path is not set".to_string(), 4u8))?;
        let source = StaticPrivilegeRepository::load(path)
            .await
            .map_err(|error| ("privilege_source", error.to_string(), 4u8))?
            .with_latency(std::time::Duration::from_millis(config.privileges.latency_ms));

        source.privileges(&token).await.map_err(|error| match error {
            PrivilegeError::UnknownToken => ("unknown_token", error.to_string(), 5u8),
            PrivilegeError::Source(_) => ("privilege_source", error.to_string(), 4u8),
        })
    });

    match result {
        Ok(granted) => {
            let mut names: Vec<&str> = granted.iter().map(|privilege| privilege.as_str()).collect();
            names.sort_unstable();
            let message = if names.is_empty() {
                "token is known but holds no privileges".to_string()
            } else {
                format!("token grants {}", names.join(", "))
            };
            CommandResult::success("privileges", message)
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("privileges", error_class, message, exit_code)
        }
    }
}
