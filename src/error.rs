// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Kernel error type

use std::time::Duration;
use thiserror::Error;

/// Result alias used across the kernel
pub type Result<T> = std::result::Result<T, KernelError>;

/// Every failure the kernel reports to its host
#[derive(Debug, Error)]
pub enum KernelError {
    /// Malformed geometry input or generator options
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Script rejected by the static checks, before anything ran
    #[error("script rejected: {}", .violations.join("; "))]
    Validation { violations: Vec<String> },

    /// The script threw, returned nothing usable, or had no entry point
    #[error("script execution failed: {0}")]
    Execution(String),

    /// The caller stopped waiting for the execution context
    #[error("script timed out after {0:?}")]
    Timeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image decoding error: {0}")]
    Image(#[from] image::ImageError),

    /// Zip or XML failure while building a container
    #[error("container error: {0}")]
    Container(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl KernelError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn container(message: impl Into<String>) -> Self {
        Self::Container(message.into())
    }

    /// True when the failure means "script is slow/stuck" rather than "script is wrong"
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_lists_every_violation() {
        let err = KernelError::Validation {
            violations: vec!["network access".into(), "storage access".into()],
        };
        let message = err.to_string();
        assert!(message.contains("network access"));
        assert!(message.contains("storage access"));
    }

    #[test]
    fn test_timeout_is_distinct_from_execution() {
        assert!(KernelError::Timeout(Duration::from_secs(30)).is_timeout());
        assert!(!KernelError::Execution("boom".into()).is_timeout());
    }
}
