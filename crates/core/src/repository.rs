use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use thiserror::Error;

use crate::domain::access::{AuthToken, Privilege};
use crate::domain::customer::{
    Customer, CustomerCreate, CustomerFindCriteria, CustomerId, CustomerUpdate,
};

/// Finite stream of search results. Empty is a normal outcome.
pub type CustomerStream = BoxStream<'static, Customer>;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("encode error: {0}")]
    Encode(String),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PrivilegeError {
    #[error("invalid auth token")]
    UnknownToken,
    #[error("privilege source failure: {0}")]
    Source(String),
}

/// Raw CRUD over a customer store. Performs no authorization.
///
/// Single-record operations report a missing id as `Ok(None)`.
#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn insert(
        &self,
        create: CustomerCreate,
        now: DateTime<Utc>,
    ) -> Result<Customer, RepositoryError>;

    async fn find_one(&self, id: CustomerId) -> Result<Option<Customer>, RepositoryError>;

    async fn find(&self, criteria: CustomerFindCriteria) -> Result<CustomerStream, RepositoryError>;

    async fn update(
        &self,
        id: CustomerId,
        update: CustomerUpdate,
    ) -> Result<Option<Customer>, RepositoryError>;

    async fn delete(&self, id: CustomerId) -> Result<Option<Customer>, RepositoryError>;
}

/// Resolves a token to the full set of privileges it holds.
#[async_trait]
pub trait PrivilegeRepository: Send + Sync {
    async fn privileges(&self, token: &AuthToken) -> Result<HashSet<Privilege>, PrivilegeError>;
}
