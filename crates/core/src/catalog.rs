//! Request type catalog rules: admin-managed codes, soft deactivation, and which types a
//! new request may reference.

use thiserror::Error;

use crate::domain::request_type::{NewRequestType, RequestType, RequestTypePatch};
use crate::domain::user::Role;
use crate::errors::ErrorKind;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("request type code is required")]
    BlankCode,
    #[error("request type name is required")]
    BlankName,
    #[error("request type code `{0}` is already in use")]
    DuplicateCode(String),
    #[error("request type `{0}` is inactive")]
    InactiveType(String),
}

impl CatalogError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }

    pub fn field(&self) -> Option<&str> {
        match self {
            Self::BlankCode | Self::DuplicateCode(_) => Some("code"),
            Self::BlankName => Some("name"),
            Self::InactiveType(_) => Some("typeId"),
        }
    }
}

fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

fn code_taken<'a>(
    existing: impl IntoIterator<Item = &'a RequestType>,
    code: &str,
    skip: Option<&RequestType>,
) -> bool {
    let wanted = normalize_code(code);
    existing
        .into_iter()
        .filter(|candidate| skip.map_or(true, |skipped| skipped.id != candidate.id))
        .any(|candidate| normalize_code(&candidate.code) == wanted)
}

/// Validates a new type against the catalog and returns it trimmed.
pub fn validate_new<'a>(
    input: &NewRequestType,
    existing: impl IntoIterator<Item = &'a RequestType>,
) -> Result<NewRequestType, CatalogError> {
    let code = input.code.trim();
    let name = input.name.trim();
    if code.is_empty() {
        return Err(CatalogError::BlankCode);
    }
    if name.is_empty() {
        return Err(CatalogError::BlankName);
    }
    if code_taken(existing, code, None) {
        return Err(CatalogError::DuplicateCode(code.to_string()));
    }
    Ok(NewRequestType { code: code.to_string(), name: name.to_string() })
}

/// Applies a partial update in place. `target` is untouched when validation fails.
pub fn apply_patch<'a>(
    target: &mut RequestType,
    patch: &RequestTypePatch,
    existing: impl IntoIterator<Item = &'a RequestType>,
) -> Result<(), CatalogError> {
    let code = match &patch.code {
        Some(code) if code.trim().is_empty() => return Err(CatalogError::BlankCode),
        Some(code) => {
            if code_taken(existing, code, Some(&*target)) {
                return Err(CatalogError::DuplicateCode(code.trim().to_string()));
            }
            Some(code.trim().to_string())
        }
        None => None,
    };
    let name = match &patch.name {
        Some(name) if name.trim().is_empty() => return Err(CatalogError::BlankName),
        Some(name) => Some(name.trim().to_string()),
        None => None,
    };

    if let Some(code) = code {
        target.code = code;
    }
    if let Some(name) = name {
        target.name = name;
    }
    if let Some(active) = patch.active {
        target.active = active;
    }
    Ok(())
}

/// Admins see the full catalog; everyone else only the selectable types.
pub fn visible_to<'a>(
    role: Role,
    types: impl IntoIterator<Item = &'a RequestType>,
) -> Vec<RequestType> {
    if role == Role::Admin {
        return types.into_iter().cloned().collect();
    }
    active_only(types)
}

pub fn active_only<'a>(types: impl IntoIterator<Item = &'a RequestType>) -> Vec<RequestType> {
    types.into_iter().filter(|request_type| request_type.active).cloned().collect()
}

pub fn ensure_selectable(request_type: &RequestType) -> Result<(), CatalogError> {
    if !request_type.active {
        return Err(CatalogError::InactiveType(request_type.code.clone()));
    }
    Ok(())
}
