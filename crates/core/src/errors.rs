use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::CatalogError;
use crate::lifecycle::LifecycleError;

/// Error taxonomy shared by the domain, the API client, and the CLI.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Validation,
    Authorization,
    NotFound,
    Unauthenticated,
    Transport,
}

/// Where a failure of a given kind is surfaced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Presentation {
    InlineField,
    FailureBanner,
    NotFoundState,
    SignIn,
    FallbackBanner,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Authorization => "authorization",
            Self::NotFound => "not_found",
            Self::Unauthenticated => "unauthenticated",
            Self::Transport => "transport",
        }
    }

    pub fn presentation(&self) -> Presentation {
        match self {
            Self::Validation => Presentation::InlineField,
            Self::Authorization => Presentation::FailureBanner,
            Self::NotFound => Presentation::NotFoundState,
            Self::Unauthenticated => Presentation::SignIn,
            Self::Transport => Presentation::FallbackBanner,
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Validation => "Some fields are missing or invalid. Check the highlighted input.",
            Self::Authorization => "You are not allowed to perform this action.",
            Self::NotFound => "The requested item does not exist.",
            Self::Unauthenticated => "Your session has expired. Please sign in again.",
            Self::Transport => "The service could not be reached. Please try again later.",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid {field}: {message}")]
    Validation { field: &'static str, message: String },
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("access denied: {0}")]
    AccessDenied(String),
    #[error("authentication required")]
    Unauthenticated,
}

impl DomainError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation { field, message: message.into() }
    }

    pub fn not_found(entity: &'static str, id: impl fmt::Display) -> Self {
        Self::NotFound { entity, id: id.to_string() }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Lifecycle(error) => error.kind(),
            Self::Catalog(error) => error.kind(),
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::AccessDenied(_) => ErrorKind::Authorization,
            Self::Unauthenticated => ErrorKind::Unauthenticated,
        }
    }

    /// Offending input field for inline display, when the error is about one.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Validation { field, .. } => Some(field),
            Self::Lifecycle(error) => error.field(),
            Self::Catalog(error) => error.field(),
            _ => None,
        }
    }
}
