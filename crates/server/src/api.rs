use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequestParts, Path, Query, State,
    },
    http::{request::Parts, StatusCode},
    routing::get,
    Json, Router,
};
use customers_core::{
    AuthToken, Customer, CustomerCreate, CustomerFindCriteria, CustomerId, CustomerService,
    CustomerUpdate,
};
use futures::StreamExt;

use crate::error::ApiError;

pub const AUTH_TOKEN_HEADER: &str = "AuthToken";
pub const CUSTOMER_ROUTE: &str = "/api/v1/customer";

#[derive(Clone)]
pub struct ApiState {
    service: CustomerService,
}

pub fn router(service: CustomerService) -> Router {
    Router::new()
        .route(CUSTOMER_ROUTE, get(get_many_customers).post(create_customer))
        .route(
            &format!("{CUSTOMER_ROUTE}/{{id}}"),
            get(get_customer).put(update_customer).patch(update_customer).delete(delete_customer),
        )
        .with_state(ApiState { service })
}

/// Caller credential taken from the `AuthToken` header.
///
/// A missing, blank or non-ASCII header is rejected here, before the service runs.
/// Any other value is passed through byte for byte.
#[derive(Debug)]
pub struct Caller(pub AuthToken);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTH_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| ApiError::unauthenticated("must provide an AuthToken header"))?;

        Ok(Self(AuthToken::new(token)))
    }
}

fn customer_id(path: Result<Path<u64>, PathRejection>) -> Result<CustomerId, ApiError> {
    let Path(id) = path?;
    Ok(CustomerId(id))
}

async fn create_customer(
    State(state): State<ApiState>,
    Caller(token): Caller,
    body: Result<Json<CustomerCreate>, JsonRejection>,
) -> Result<(StatusCode, Json<Customer>), ApiError> {
    let Json(create) = body?;
    let created = state.service.create(create, &token).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_customer(
    State(state): State<ApiState>,
    Caller(token): Caller,
    path: Result<Path<u64>, PathRejection>,
) -> Result<Json<Customer>, ApiError> {
    let id = customer_id(path)?;
    Ok(Json(state.service.get_one(id, &token).await?))
}

async fn get_many_customers(
    State(state): State<ApiState>,
    Caller(token): Caller,
    query: Result<Query<CustomerFindCriteria>, QueryRejection>,
) -> Result<Json<Vec<Customer>>, ApiError> {
    let Query(criteria) = query?;
    let stream = state.service.get_many(criteria, &token).await?;
    Ok(Json(stream.collect().await))
}

async fn update_customer(
    State(state): State<ApiState>,
    Caller(token): Caller,
    path: Result<Path<u64>, PathRejection>,
    body: Result<Json<CustomerUpdate>, JsonRejection>,
) -> Result<Json<Customer>, ApiError> {
    let id = customer_id(path)?;
    let Json(update) = body?;
    Ok(Json(state.service.update(id, update, &token).await?))
}

async fn delete_customer(
    State(state): State<ApiState>,
    Caller(token): Caller,
    path: Result<Path<u64>, PathRejection>,
) -> Result<Json<Customer>, ApiError> {
    let id = customer_id(path)?;
    Ok(Json(state.service.delete(id, &token).await?))
}
