//! Access-control policies.
//!
//! The request components ask a policy three questions: may this caller read
//! a record, may they modify one, and may they upload. Staff identity is
//! established from an `Authorization: Bearer` token; the comparison runs in
//! constant time.

use axum::http::{header, HeaderMap};
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::error::MediaError;

use super::record::MediaRecord;

/// Who is making the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
    Anonymous,
    Staff,
}

impl Identity {
    pub fn is_staff(&self) -> bool {
        matches!(self, Identity::Staff)
    }
}

/// Trait for access-control decisions.
pub trait AccessControl: Send + Sync {
    /// Establish the caller's identity from request headers.
    fn identify(&self, headers: &HeaderMap) -> Identity;

    fn check_read(&self, identity: Identity, record: &MediaRecord) -> Result<(), MediaError>;

    /// Write check. `record` is `None` for the gate applied before any lookup.
    fn check_write(
        &self,
        identity: Identity,
        record: Option<&MediaRecord>,
    ) -> Result<(), MediaError>;

    fn check_upload(&self, identity: Identity) -> Result<(), MediaError>;
}

/// Policy that allows everything. Development only.
#[derive(Debug, Clone, Default)]
pub struct OpenAccess;

impl AccessControl for OpenAccess {
    fn identify(&self, _headers: &HeaderMap) -> Identity {
        Identity::Staff
    }

    fn check_read(&self, _identity: Identity, _record: &MediaRecord) -> Result<(), MediaError> {
        Ok(())
    }

    fn check_write(
        &self,
        _identity: Identity,
        _record: Option<&MediaRecord>,
    ) -> Result<(), MediaError> {
        Ok(())
    }

    fn check_upload(&self, _identity: Identity) -> Result<(), MediaError> {
        Ok(())
    }
}

/// Public reads, staff-only writes and uploads.
#[derive(Clone)]
pub struct StaffTokenAccess {
    token: Vec<u8>,
}

impl StaffTokenAccess {
    pub fn new(token: impl AsRef<[u8]>) -> Self {
        Self {
            token: token.as_ref().to_vec(),
        }
    }

    fn require_staff(&self, identity: Identity) -> Result<(), MediaError> {
        if identity.is_staff() {
            Ok(())
        } else {
            Err(MediaError::Unauthorized)
        }
    }
}

impl AccessControl for StaffTokenAccess {
    fn identify(&self, headers: &HeaderMap) -> Identity {
        let presented = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim);

        match presented {
            Some(token) if !self.token.is_empty() => {
                if bool::from(token.as_bytes().ct_eq(&self.token)) {
                    Identity::Staff
                } else {
                    debug!("Rejected staff token");
                    Identity::Anonymous
                }
            }
            _ => Identity::Anonymous,
        }
    }

    fn check_read(&self, _identity: Identity, _record: &MediaRecord) -> Result<(), MediaError> {
        Ok(())
    }

    fn check_write(
        &self,
        identity: Identity,
        _record: Option<&MediaRecord>,
    ) -> Result<(), MediaError> {
        self.require_staff(identity)
    }

    fn check_upload(&self, identity: Identity) -> Result<(), MediaError> {
        self.require_staff(identity)
    }
}
