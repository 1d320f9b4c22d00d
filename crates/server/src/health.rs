use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use customers_core::config::StorageBackend;
use customers_core::{CustomerId, CustomerRepository};
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    customers: Arc<dyn CustomerRepository>,
    backend: StorageBackend,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub storage: HealthCheck,
    pub checked_at: String,
}

pub fn router(customers: Arc<dyn CustomerRepository>, backend: StorageBackend) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { customers, backend })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let storage = storage_check(&state).await;
    let ready = storage.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "customers-server runtime initialized".to_string(),
        },
        storage,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

// Ids start at 1, so probing id 0 exercises the read path without matching a record.
async fn storage_check(state: &HealthState) -> HealthCheck {
    match state.customers.find_one(CustomerId(0)).await {
        Ok(_) => HealthCheck {
            status: "ready",
            detail: format!("{} storage answered a probe read", state.backend.as_str()),
        },
        Err(error) => HealthCheck {
            status: "degraded",
            detail: format!("{} storage probe failed: {error}", state.backend.as_str()),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::{extract::State, http::StatusCode, Json};
    use chrono::{DateTime, Utc};
    use customers_core::config::StorageBackend;
    use customers_core::{
        Customer, CustomerCreate, CustomerFindCriteria, CustomerId, CustomerRepository,
        CustomerStream, CustomerUpdate, RepositoryError,
    };
    use customers_db::InMemoryCustomerRepository;

    use crate::health::{health, HealthState};

    struct BrokenStorage;

    #[async_trait]
    impl CustomerRepository for BrokenStorage {
        async fn insert(
            &self,
            _create: CustomerCreate,
            _now: DateTime<Utc>,
        ) -> Result<Customer, RepositoryError> {
            Err(RepositoryError::Unavailable("offline".into()))
        }

        async fn find_one(&self, _id: CustomerId) -> Result<Option<Customer>, RepositoryError> {
            Err(RepositoryError::Unavailable("offline".into()))
        }

        async fn find(
            &self,
            _criteria: CustomerFindCriteria,
        ) -> Result<CustomerStream, RepositoryError> {
            Err(RepositoryError::Unavailable("offline".into()))
        }

        async fn update(
            &self,
            _id: CustomerId,
            _update: CustomerUpdate,
        ) -> Result<Option<Customer>, RepositoryError> {
            Err(RepositoryError::Unavailable("offline".into()))
        }

        async fn delete(&self, _id: CustomerId) -> Result<Option<Customer>, RepositoryError> {
            Err(RepositoryError::Unavailable("offline".into()))
        }
    }

    #[tokio::test]
    async fn health_returns_ready_when_storage_answers() {
        let state = HealthState {
            customers: Arc::new(InMemoryCustomerRepository::default()),
            backend: StorageBackend::Memory,
        };

        let (status, Json(payload)) = health(State(state)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.storage.status, "ready");
        assert!(payload.storage.detail.starts_with("memory"));
    }

    #[tokio::test]
    async fn health_returns_service_unavailable_when_storage_fails() {
        let state =
            HealthState { customers: Arc::new(BrokenStorage), backend: StorageBackend::FileLog };

        let (status, Json(payload)) = health(State(state)).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert_eq!(payload.storage.status, "degraded");
        assert_eq!(payload.service.status, "ready");
    }
}
