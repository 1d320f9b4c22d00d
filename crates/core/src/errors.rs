use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::domain::access::Privilege;
use crate::domain::customer::CustomerId;
use crate::repository::{PrivilegeError, RepositoryError};

/// Fixed failure taxonomy shared by the core and every transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    BadInput,
    Unauthenticated,
    Unauthorized,
    NotFound,
    UnsupportedMedia,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BadInput => "bad_input",
            Self::Unauthenticated => "unauthenticated",
            Self::Unauthorized => "unauthorized",
            Self::NotFound => "not_found",
            Self::UnsupportedMedia => "unsupported_media",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Unauthenticated(String),
    #[error("must have '{required}' privilege")]
    Unauthorized { required: Privilege },
    #[error("could not find customer with id {id}")]
    NotFound { id: CustomerId },
    #[error(transparent)]
    Privileges(#[from] PrivilegeError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthenticated(_) | Self::Privileges(PrivilegeError::UnknownToken) => {
                ErrorKind::Unauthenticated
            }
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Privileges(PrivilegeError::Source(_)) | Self::Repository(_) => ErrorKind::Internal,
        }
    }

    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        InterfaceError::new(self.kind(), self.to_string()).with_correlation_id(correlation_id)
    }
}

/// Caller-facing failure. Internal details stay out of [`InterfaceError::user_message`].
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct InterfaceError {
    pub kind: ErrorKind,
    pub message: String,
    pub correlation_id: String,
}

impl InterfaceError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), correlation_id: "unassigned".to_owned() }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }

    pub fn user_message(&self) -> String {
        match self.kind {
            ErrorKind::Internal => "An unexpected internal error occurred.".to_owned(),
            _ => self.message.clone(),
        }
    }
}
