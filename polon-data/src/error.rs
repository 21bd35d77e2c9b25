use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Identifies one rung of the transport cascade.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    /// Direct request to the target.
    Direct,
    /// Relay A: target passed via query parameter, request carries the
    /// distinguishing relay header.
    RelayHeader,
    /// Relay B: plain URL-encoded passthrough, no extra headers.
    RelayEncoded,
    /// Sentinel reported once every stage has been exhausted.
    All,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Direct => "direct",
            Stage::RelayHeader => "relay-header",
            Stage::RelayEncoded => "relay-encoded",
            Stage::All => "all",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All errors generated in `polon-data`.
///
/// Managed feed sessions absorb every variant internally and convert it into
/// degradation-flag state; the only error that crosses the core boundary is
/// [`DataError::Transport`] with [`Stage::All`] from a direct one-shot
/// resolve call.
#[derive(Debug, Clone, Error)]
pub enum DataError {
    #[error("transport stage {stage} failed: {reason}")]
    Transport { stage: Stage, reason: String },

    #[error("transport stage {stage} timed out after {timeout:?}")]
    Timeout { stage: Stage, timeout: Duration },

    #[error("payload not decodable: {0}")]
    Parse(String),

    #[error("push stream failed: {0}")]
    Stream(String),
}

impl DataError {
    /// Terminal cascade failure: every stage was attempted and failed.
    pub fn exhausted(reason: impl Into<String>) -> Self {
        DataError::Transport {
            stage: Stage::All,
            reason: reason.into(),
        }
    }

    /// Determine if this error means the whole cascade was exhausted, as
    /// opposed to a single stage failing.
    pub fn is_exhausted(&self) -> bool {
        matches!(
            self,
            DataError::Transport {
                stage: Stage::All,
                ..
            }
        )
    }

    /// Timeouts are treated identically to transport errors for cascade and
    /// fallback purposes; this only exists for logging and tests.
    pub fn is_timeout(&self) -> bool {
        matches!(self, DataError::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_error_is_exhausted() {
        struct TestCase {
            input: DataError,
            expected: bool,
        }

        let tests = vec![
            TestCase {
                // TC0: exhausted w/ Stage::All
                input: DataError::exhausted("every stage failed"),
                expected: true,
            },
            TestCase {
                // TC1: not exhausted w/ single stage failure
                input: DataError::Transport {
                    stage: Stage::Direct,
                    reason: "connection refused".to_string(),
                },
                expected: false,
            },
            TestCase {
                // TC2: not exhausted w/ stage timeout
                input: DataError::Timeout {
                    stage: Stage::RelayHeader,
                    timeout: Duration::from_secs(8),
                },
                expected: false,
            },
            TestCase {
                // TC3: not exhausted w/ parse failure
                input: DataError::Parse("unexpected end of input".to_string()),
                expected: false,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            assert_eq!(test.input.is_exhausted(), test.expected, "TC{index} failed");
        }
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::Direct.to_string(), "direct");
        assert_eq!(Stage::RelayHeader.to_string(), "relay-header");
        assert_eq!(Stage::RelayEncoded.to_string(), "relay-encoded");
        assert_eq!(Stage::All.to_string(), "all");
    }

    #[test]
    fn test_timeout_is_timeout() {
        let error = DataError::Timeout {
            stage: Stage::Direct,
            timeout: Duration::from_secs(8),
        };
        assert!(error.is_timeout());
        assert!(!DataError::Parse("oops".to_string()).is_timeout());
    }
}
