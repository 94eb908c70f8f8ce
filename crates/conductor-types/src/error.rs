use thiserror::Error;

/// Errors from snapshot persistence operations.
///
/// The state manager logs and swallows these; they never reach a running
/// workflow.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("corrupt snapshot for '{workflow_id}': {reason}")]
    Corrupt { workflow_id: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        let err = StoreError::Corrupt {
            workflow_id: "checkout".to_string(),
            reason: "EOF while parsing".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "corrupt snapshot for 'checkout': EOF while parsing"
        );

        let err = StoreError::Serialization("bad map key".to_string());
        assert!(err.to_string().contains("bad map key"));
    }
}
