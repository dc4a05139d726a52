//! API key domain type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{ApiKeyId, HostelId};
use crate::error::AppError;

/// An API key for authenticating requests.
///
/// A key without `hostel_id` is global and may act on every hostel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: ApiKeyId,
    pub name: String,
    pub key_hash: String,
    pub hostel_id: Option<HostelId>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl ApiKey {
    /// Creates a new API key with the given name and hash.
    pub fn new(name: String, key_hash: String, hostel_id: Option<HostelId>) -> Self {
        Self {
            id: ApiKeyId::new(),
            name,
            key_hash,
            hostel_id,
            is_active: true,
            created_at: Utc::now(),
            last_used_at: None,
        }
    }

    pub fn principal(&self) -> Principal {
        Principal {
            key_id: self.id,
            hostel_id: self.hostel_id,
        }
    }
}

/// The authenticated caller of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub key_id: ApiKeyId,
    pub hostel_id: Option<HostelId>,
}

impl Principal {
    pub fn is_global(&self) -> bool {
        self.hostel_id.is_none()
    }

    /// Fails with `PermissionDenied` when a hostel-scoped key reaches outside its hostel.
    pub fn ensure_hostel(&self, hostel_id: HostelId) -> Result<(), AppError> {
        match self.hostel_id {
            Some(own) if own != hostel_id => Err(AppError::PermissionDenied(format!(
                "API key is scoped to another hostel than {hostel_id}"
            ))),
            _ => Ok(()),
        }
    }

    /// Fails unless the key is global.
    pub fn ensure_global(&self) -> Result<(), AppError> {
        if self.is_global() {
            Ok(())
        } else {
            Err(AppError::PermissionDenied(
                "This operation requires a global API key".into(),
            ))
        }
    }
}
