use thiserror::Error;

/// All errors generated in `scanner-data`.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Error)]
pub enum ScannerError {
    #[error("SocketError: {0}")]
    Socket(String),

    #[error("ticker snapshot request failed: {0}")]
    Rest(String),

    #[error("failed to deserialise {entity}: {error}")]
    Deserialise { entity: &'static str, error: String },

    #[error("order book level has negative {field}: {value}")]
    InvalidLevel { field: &'static str, value: String },

    #[error("invalid symbol '{0}', expected BASE/QUOTE")]
    InvalidSymbol(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("scanner engine has stopped")]
    EngineStopped,
}

impl ScannerError {
    /// Determine if an error means the connection that produced it is gone for good.
    ///
    /// Connections are never retried by the scanner, so a terminal error freezes the affected
    /// symbol until the next pause/resume cycle.
    #[allow(clippy::match_like_matches_macro)]
    pub fn is_terminal(&self) -> bool {
        match self {
            ScannerError::Socket(error_msg) => {
                let error_lower = error_msg.to_lowercase();
                error_lower.contains("terminated")
                    || error_lower.contains("connectionclosed")
                    || error_lower.contains("alreadyclosed")
                    || error_lower.contains("io(")
                    || error_lower.contains("refused")
            }
            ScannerError::EngineStopped => true,
            _ => false,
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ScannerError {
    fn from(value: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Socket(format!("{value:?}"))
    }
}

impl From<reqwest::Error> for ScannerError {
    fn from(value: reqwest::Error) -> Self {
        Self::Rest(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scanner_error_is_terminal() {
        struct TestCase {
            input: ScannerError,
            expected: bool,
        }

        let tests = vec![
            TestCase {
                // TC0: is terminal w/ ScannerError::Socket containing "ConnectionClosed"
                input: ScannerError::Socket("WebSocket error: ConnectionClosed".to_string()),
                expected: true,
            },
            TestCase {
                // TC1: is terminal w/ ScannerError::Socket containing "Io("
                input: ScannerError::Socket(
                    "Io(Os { code: 111, kind: ConnectionRefused })".to_string(),
                ),
                expected: true,
            },
            TestCase {
                // TC2: is not terminal w/ ScannerError::Socket (send failure on live socket)
                input: ScannerError::Socket("Capacity(MessageTooLong)".to_string()),
                expected: false,
            },
            TestCase {
                // TC3: is not terminal w/ ScannerError::Rest
                input: ScannerError::Rest("HTTP error: 503".to_string()),
                expected: false,
            },
            TestCase {
                // TC4: is terminal w/ ScannerError::EngineStopped
                input: ScannerError::EngineStopped,
                expected: true,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = test.input.is_terminal();
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }
}
