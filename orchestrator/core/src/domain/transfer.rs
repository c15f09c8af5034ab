// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use crate::domain::registry::{ReferenceError, RegistryFailure};
use crate::domain::runtime::RuntimeError;
use crate::domain::volume::VolumeNameError;
use thiserror::Error;

/// How a caller should react to a failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    BadRequest,
    Unauthorized,
    Internal,
}

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("registry transfer failed: {0}")]
    Registry(String),

    #[error("worker exited with status code {code}")]
    WorkerExitedNonZero { code: i64, output: String },

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl TransferError {
    pub fn invalid(message: impl Into<String>) -> Self {
        TransferError::InvalidRequest(message.into())
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            TransferError::InvalidRequest(_) => ErrorClass::BadRequest,
            TransferError::Unauthorized(_) => ErrorClass::Unauthorized,
            TransferError::Registry(_)
            | TransferError::WorkerExitedNonZero { .. }
            | TransferError::Runtime(_) => ErrorClass::Internal,
        }
    }

    /// Captured worker output, when the failure came from a worker.
    pub fn worker_output(&self) -> Option<&str> {
        match self {
            TransferError::WorkerExitedNonZero { output, .. } => Some(output),
            _ => None,
        }
    }
}

impl From<VolumeNameError> for TransferError {
    fn from(err: VolumeNameError) -> Self {
        TransferError::InvalidRequest(err.to_string())
    }
}

impl From<ReferenceError> for TransferError {
    fn from(err: ReferenceError) -> Self {
        TransferError::InvalidRequest(err.to_string())
    }
}

impl From<RegistryFailure> for TransferError {
    fn from(failure: RegistryFailure) -> Self {
        match failure {
            RegistryFailure::Unauthorized(message) => TransferError::Unauthorized(message),
            RegistryFailure::Other(message) => TransferError::Registry(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        assert_eq!(TransferError::invalid("path is required").class(), ErrorClass::BadRequest);
        assert_eq!(
            TransferError::from(RegistryFailure::Unauthorized("no basic auth credentials".into())).class(),
            ErrorClass::Unauthorized
        );
        assert_eq!(
            TransferError::from(RegistryFailure::Other("manifest unknown".into())).class(),
            ErrorClass::Internal
        );
        assert_eq!(
            TransferError::from(RuntimeError::NotFound("vol".into())).class(),
            ErrorClass::Internal
        );
    }

    #[test]
    fn test_worker_failure_keeps_output() {
        let err = TransferError::WorkerExitedNonZero {
            code: 2,
            output: "tar: short read".into(),
        };
        assert_eq!(err.to_string(), "worker exited with status code 2");
        assert_eq!(err.worker_output(), Some("tar: short read"));
        assert_eq!(err.class(), ErrorClass::Internal);
    }

    #[test]
    fn test_validation_errors_are_bad_requests() {
        let err: TransferError = VolumeNameError::Empty.into();
        assert_eq!(err.class(), ErrorClass::BadRequest);
        assert_eq!(err.to_string(), "volume is required");

        let err: TransferError = ReferenceError::Empty.into();
        assert_eq!(err.class(), ErrorClass::BadRequest);
    }
}
