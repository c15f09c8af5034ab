// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Registry references, credentials and response classification.

use serde::Deserialize;
use thiserror::Error;

/// Base64 of `"\n"`. The Docker engine rejects a missing `X-Registry-Auth`
/// header for some registries but accepts this well-formed empty value.
pub const EMPTY_REGISTRY_AUTH: &str = "Cg==";

/// Image reference split into repository, tag and optional digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    pub repository: String,
    pub tag: String,
    pub digest: Option<String>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReferenceError {
    #[error("reference is required")]
    Empty,
    #[error("invalid reference format: {0}")]
    Invalid(String),
}

impl ImageReference {
    pub fn parse(reference: &str) -> Result<Self, ReferenceError> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(ReferenceError::Empty);
        }
        if reference.chars().any(char::is_whitespace) {
            return Err(ReferenceError::Invalid(reference.to_string()));
        }

        let (name, digest) = match reference.split_once('@') {
            Some((name, digest)) if !digest.is_empty() => (name, Some(digest.to_string())),
            Some(_) => return Err(ReferenceError::Invalid(reference.to_string())),
            None => (reference, None),
        };

        // A ':' after the last '/' separates the tag; earlier ones belong to a registry port.
        let last_slash = name.rfind('/').map(|i| i + 1).unwrap_or(0);
        let (repository, tag) = match name[last_slash..].rfind(':') {
            Some(pos) => {
                let split = last_slash + pos;
                (&name[..split], &name[split + 1..])
            }
            None => (name, "latest"),
        };

        if repository.is_empty() || tag.is_empty() || repository.ends_with('/') {
            return Err(ReferenceError::Invalid(reference.to_string()));
        }
        if repository.chars().any(|c| c.is_ascii_uppercase()) {
            return Err(ReferenceError::Invalid(reference.to_string()));
        }

        Ok(Self {
            repository: repository.to_string(),
            tag: tag.to_string(),
            digest,
        })
    }
}

impl std::fmt::Display for ImageReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.digest {
            Some(digest) => write!(f, "{}@{}", self.repository, digest),
            None => write!(f, "{}:{}", self.repository, self.tag),
        }
    }
}

/// Encoded registry credential as sent in `X-Registry-Auth`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryAuth(String);

impl RegistryAuth {
    /// Uses the empty credential token when `encoded` is missing or blank.
    pub fn from_header(encoded: Option<&str>) -> Self {
        match encoded.map(str::trim) {
            Some(value) if !value.is_empty() => Self(value.to_string()),
            _ => Self::default(),
        }
    }

    pub fn encoded(&self) -> &str {
        &self.0
    }

    pub fn is_empty_credential(&self) -> bool {
        self.0 == EMPTY_REGISTRY_AUTH
    }
}

impl Default for RegistryAuth {
    fn default() -> Self {
        Self(EMPTY_REGISTRY_AUTH.to_string())
    }
}

/// Why a registry transfer failed.
///
/// Registries do not report a structured error code consistently, so the
/// reason is recovered from message text. Only messages that are known to mean
/// "credentials missing or rejected" are mapped to [`RegistryFailure::Unauthorized`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryFailure {
    Unauthorized(String),
    Other(String),
}

const UNAUTHORIZED_MARKERS: [&str; 2] = [
    "unauthorized: authentication required",
    "no basic auth credentials",
];

impl RegistryFailure {
    pub fn from_message(message: &str) -> Self {
        if UNAUTHORIZED_MARKERS.iter().any(|marker| message.contains(marker)) {
            RegistryFailure::Unauthorized(message.to_string())
        } else {
            RegistryFailure::Other(message.to_string())
        }
    }

    pub fn message(&self) -> &str {
        match self {
            RegistryFailure::Unauthorized(m) | RegistryFailure::Other(m) => m,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProgressLine {
    #[serde(default)]
    error: Option<String>,
    #[serde(default, rename = "errorDetail")]
    error_detail: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: Option<String>,
}

/// Scans a streamed push/pull response for the first error object.
///
/// A transfer call can succeed at the transport level while the stream carries
/// `{"errorDetail":{...},"error":"..."}`; that line decides the outcome.
pub fn scan_transfer_log<S: AsRef<str>>(lines: &[S]) -> Result<(), RegistryFailure> {
    for line in lines {
        let line = line.as_ref().trim();
        if line.is_empty() || !line.contains("error") {
            continue;
        }

        let Ok(parsed) = serde_json::from_str::<ProgressLine>(line) else {
            continue;
        };

        let message = parsed
            .error
            .filter(|m| !m.is_empty())
            .or_else(|| parsed.error_detail.and_then(|d| d.message))
            .filter(|m| !m.is_empty());

        if let Some(message) = message {
            return Err(RegistryFailure::from_message(&message));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reference_with_registry_port() {
        let r = ImageReference::parse("localhost:5000/felipe/test-push:v1").unwrap();
        assert_eq!(r.repository, "localhost:5000/felipe/test-push");
        assert_eq!(r.tag, "v1");
        assert_eq!(r.to_string(), "localhost:5000/felipe/test-push:v1");
    }

    #[test]
    fn test_parse_reference_defaults_to_latest() {
        let r = ImageReference::parse("localhost:5000/backup").unwrap();
        assert_eq!(r.repository, "localhost:5000/backup");
        assert_eq!(r.tag, "latest");

        let r = ImageReference::parse("backup").unwrap();
        assert_eq!(r.to_string(), "backup:latest");
    }

    #[test]
    fn test_parse_reference_with_digest() {
        let r = ImageReference::parse("docker.io/library/busybox@sha256:abc").unwrap();
        assert_eq!(r.repository, "docker.io/library/busybox");
        assert_eq!(r.digest.as_deref(), Some("sha256:abc"));
        assert_eq!(r.to_string(), "docker.io/library/busybox@sha256:abc");
    }

    #[test]
    fn test_parse_reference_rejects_garbage() {
        assert_eq!(ImageReference::parse("  "), Err(ReferenceError::Empty));
        assert!(ImageReference::parse("has space:1").is_err());
        assert!(ImageReference::parse("Upper/Case").is_err());
        assert!(ImageReference::parse("repo:").is_err());
        assert!(ImageReference::parse("repo@").is_err());
    }

    #[test]
    fn test_registry_auth_defaults_to_empty_token() {
        assert_eq!(RegistryAuth::from_header(None).encoded(), "Cg==");
        assert_eq!(RegistryAuth::from_header(Some("   ")).encoded(), "Cg==");
        assert!(RegistryAuth::default().is_empty_credential());
        assert_eq!(RegistryAuth::from_header(Some("eyJ1In0=")).encoded(), "eyJ1In0=");
    }

    #[test]
    fn test_scan_detects_unauthorized() {
        let lines = vec![
            r#"{"status":"The push refers to repository [localhost:5000/x]"}"#,
            r#"{"errorDetail":{"message":"unauthorized: authentication required"},"error":"unauthorized: authentication required"}"#,
        ];
        assert_eq!(
            scan_transfer_log(&lines),
            Err(RegistryFailure::Unauthorized("unauthorized: authentication required".into()))
        );

        let lines = vec![r#"{"errorDetail":{"message":"no basic auth credentials"},"error":"no basic auth credentials"}"#];
        assert!(matches!(scan_transfer_log(&lines), Err(RegistryFailure::Unauthorized(_))));
    }

    #[test]
    fn test_scan_classifies_other_errors_generically() {
        let lines = vec![r#"{"error":"manifest unknown"}"#];
        assert_eq!(
            scan_transfer_log(&lines),
            Err(RegistryFailure::Other("manifest unknown".into()))
        );
    }

    #[test]
    fn test_scan_uses_error_detail_when_error_missing() {
        let lines = vec![r#"{"errorDetail":{"message":"denied: requested access to the resource is denied"}}"#];
        assert!(matches!(scan_transfer_log(&lines), Err(RegistryFailure::Other(_))));
    }

    #[test]
    fn test_scan_ignores_progress_and_non_json() {
        let lines = vec![
            r#"{"status":"Pushing","progress":"[=====>   ]"}"#,
            "error-free plain text",
            "",
            r#"{"status":"latest: digest: sha256:1 size: 528"}"#,
        ];
        assert_eq!(scan_transfer_log(&lines), Ok(()));
    }
}
