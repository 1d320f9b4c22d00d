use std::{path::PathBuf, sync::Arc, time::Duration};

use customers_core::config::{AppConfig, ConfigError, LoadOptions, StorageBackend};
use customers_core::{
    Clock, CustomerRepository, CustomerService, FixedClock, PrivilegeRepository, RepositoryError,
    SystemClock,
};
use customers_db::{
    CachedPrivilegeRepository, FileLogCustomerRepository, InMemoryCustomerRepository,
    StaticPrivilegeRepository,
};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub service: CustomerService,
    pub customers: Arc<dyn CustomerRepository>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("privilege source could not be loaded: {0}")]
    Privileges(#[source] RepositoryError),
    #[error("customer storage could not be opened: {0}")]
    Storage(#[source] RepositoryError),
    #[error("{0} is required")]
    MissingPath(&'static str),
    #[error("clock.fixed_epoch_secs {0} is out of range")]
    ClockOutOfRange(i64),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        storage_backend = config.storage.backend.as_str(),
        "starting application bootstrap"
    );

    let clock = build_clock(&config)?;
    let privileges = build_privileges(&config).await?;
    let customers = build_storage(&config).await?;

    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        privilege_cache = config.privileges.cache,
        fixed_clock = config.clock.fixed_epoch_secs.is_some(),
        "customer service assembled"
    );

    let service = CustomerService::new(customers.clone(), privileges, clock);
    Ok(Application { config, service, customers })
}

fn build_clock(config: &AppConfig) -> Result<Arc<dyn Clock>, BootstrapError> {
    match config.clock.fixed_epoch_secs {
        Some(secs) => {
            let fixed =
                FixedClock::from_epoch_secs(secs).ok_or(BootstrapError::ClockOutOfRange(secs))?;
            Ok(Arc::new(fixed))
        }
        None => Ok(Arc::new(SystemClock)),
    }
}

pub async fn build_privileges(
    config: &AppConfig,
) -> Result<Arc<dyn PrivilegeRepository>, BootstrapError> {
    let path = required_path(config.privileges.path.as_ref(), "privileges.path")?;
    let source = StaticPrivilegeRepository::load(&path)
        .await
        .map_err(BootstrapError::Privileges)?
        .with_latency(Duration::from_millis(config.privileges.latency_ms));

    info!(
        event_name = "system.bootstrap.privileges_loaded",
        correlation_id = "bootstrap",
        path = %path.display(),
        tokens = source.token_count(),
        latency_ms = config.privileges.latency_ms,
        "privilege source loaded"
    );

    let source: Arc<dyn PrivilegeRepository> = Arc::new(source);
    if config.privileges.cache {
        Ok(Arc::new(CachedPrivilegeRepository::new(source)))
    } else {
        Ok(source)
    }
}

pub async fn build_storage(
    config: &AppConfig,
) -> Result<Arc<dyn CustomerRepository>, BootstrapError> {
    match config.storage.backend {
        StorageBackend::Memory => Ok(Arc::new(InMemoryCustomerRepository::default())),
        StorageBackend::FileLog => {
            let path = required_path(config.storage.path.as_ref(), "storage.path")?;
            let repository =
                FileLogCustomerRepository::open(path).await.map_err(BootstrapError::Storage)?;
            info!(
                event_name = "system.bootstrap.storage_opened",
                correlation_id = "bootstrap",
                path = %repository.path().display(),
                "file log storage replayed"
            );
            Ok(Arc::new(repository))
        }
    }
}

fn required_path(path: Option<&PathBuf>, key: &'static str) -> Result<PathBuf, BootstrapError> {
    path.cloned().ok_or(BootstrapError::MissingPath(key))
}
