// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Registry Transfer
//!
//! The registry leg of push and pull. Authentication and the wire protocol
//! belong to the runtime's registry client; this module only interprets what
//! comes back.

use crate::domain::registry::{scan_transfer_log, ImageReference, RegistryAuth, RegistryFailure};
use crate::domain::runtime::{ContainerRuntime, RuntimeError, TransferLog};
use crate::domain::transfer::TransferError;
use std::sync::Arc;
use tracing::{error, info};

pub struct RegistryTransfer {
    runtime: Arc<dyn ContainerRuntime>,
}

impl RegistryTransfer {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { runtime }
    }

    pub async fn push(&self, reference: &ImageReference, auth: &RegistryAuth) -> Result<(), TransferError> {
        info!("Pushing {} (anonymous: {})", reference, auth.is_empty_credential());
        let log = self.runtime.push_image(reference, auth).await;
        Self::interpret("push", reference, log)
    }

    pub async fn pull(&self, reference: &ImageReference, auth: &RegistryAuth) -> Result<(), TransferError> {
        info!("Pulling {} (anonymous: {})", reference, auth.is_empty_credential());
        let log = self.runtime.pull_image_authenticated(reference, auth).await;
        Self::interpret("pull", reference, log)
    }

    fn interpret(
        action: &str,
        reference: &ImageReference,
        log: Result<TransferLog, RuntimeError>,
    ) -> Result<(), TransferError> {
        let lines = log.map_err(classify_runtime_error)?;

        if let Err(failure) = scan_transfer_log(&lines) {
            error!("Registry {} of {} failed: {}", action, reference, failure.message());
            return Err(failure.into());
        }

        info!("Registry {} of {} completed", action, reference);
        Ok(())
    }
}

/// Some engines reject bad credentials on the request itself instead of in
/// the stream; the message text is the only signal in both cases.
fn classify_runtime_error(err: RuntimeError) -> TransferError {
    match &err {
        RuntimeError::Request { message, .. } | RuntimeError::ImageUnavailable { message, .. } => {
            match RegistryFailure::from_message(message) {
                RegistryFailure::Unauthorized(message) => TransferError::Unauthorized(message),
                RegistryFailure::Other(_) => TransferError::Runtime(err),
            }
        }
        _ => TransferError::Runtime(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::transfer::ErrorClass;

    fn reference() -> ImageReference {
        ImageReference::parse("localhost:5000/backup:v1").unwrap()
    }

    #[test]
    fn test_interpret_stream_error() {
        let log = Ok(vec![
            r#"{"status":"Preparing"}"#.to_string(),
            r#"{"error":"no basic auth credentials"}"#.to_string(),
        ]);
        let err = RegistryTransfer::interpret("push", &reference(), log).unwrap_err();
        assert_eq!(err.class(), ErrorClass::Unauthorized);
    }

    #[test]
    fn test_interpret_request_error() {
        let log = Err(RuntimeError::request(
            "pull",
            "localhost:5000/backup:v1",
            "unauthorized: authentication required",
        ));
        let err = RegistryTransfer::interpret("pull", &reference(), log).unwrap_err();
        assert_eq!(err.class(), ErrorClass::Unauthorized);

        let log = Err(RuntimeError::Connection("refused".into()));
        let err = RegistryTransfer::interpret("pull", &reference(), log).unwrap_err();
        assert_eq!(err.class(), ErrorClass::Internal);
    }

    #[test]
    fn test_interpret_clean_stream() {
        let log = Ok(vec![r#"{"status":"v1: digest: sha256:1 size: 528"}"#.to_string()]);
        assert!(RegistryTransfer::interpret("push", &reference(), log).is_ok());
    }
}
