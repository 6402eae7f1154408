use thiserror::Error;

/// Boxed error produced by a singleton factory.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors returned by [`SingletonRegistry`](crate::SingletonRegistry) operations.
///
/// Keys are carried in their `Debug` rendering so the error type stays
/// independent of the registry's key type.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The factory returned an error. Nothing was published, a later call may retry.
    #[error("failed to construct instance for key {key}")]
    ConstructionFailed {
        key: String,
        #[source]
        source: BoxError,
    },

    /// The factory tried to obtain the key it is currently constructing.
    #[error("factory for key {key} re-entered the registry for the same key")]
    Reentrant { key: String },

    /// The key holds an instance of a different concrete type.
    #[error("instance for key {key} is not of type {type_name}")]
    TypeMismatch {
        key: String,
        type_name: &'static str,
    },

    /// No instance has been published for the key.
    #[error("no instance published for key {key}")]
    NotFound { key: String },
}

impl RegistryError {
    /// Returns `true` for errors that a later call may resolve by retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RegistryError::ConstructionFailed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_construction_failed_display_and_source() {
        let err = RegistryError::ConstructionFailed {
            key: "\"db\"".to_string(),
            source: "connection refused".into(),
        };
        assert_eq!(err.to_string(), "failed to construct instance for key \"db\"");
        assert_eq!(err.source().unwrap().to_string(), "connection refused");
        assert!(err.is_retryable());
    }

    #[test]
    fn test_reentrant_display() {
        let err = RegistryError::Reentrant {
            key: "\"db\"".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "factory for key \"db\" re-entered the registry for the same key"
        );
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_type_mismatch_display() {
        let err = RegistryError::TypeMismatch {
            key: "7".to_string(),
            type_name: "u32",
        };
        assert_eq!(err.to_string(), "instance for key 7 is not of type u32");
    }

    #[test]
    fn test_not_found_display() {
        let err = RegistryError::NotFound {
            key: "\"cache\"".to_string(),
        };
        assert_eq!(err.to_string(), "no instance published for key \"cache\"");
    }

    #[test]
    fn test_error_trait() {
        let err: &dyn std::error::Error = &RegistryError::NotFound {
            key: "1".to_string(),
        };
        assert_eq!(err.to_string(), "no instance published for key 1");
        assert!(err.source().is_none());
    }
}
