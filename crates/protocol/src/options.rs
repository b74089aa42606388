//! Per-session behavior knobs.

use serde::{Deserialize, Serialize};

/// Options fixed for the lifetime of one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionOptions {
    /// Whether transport-level retry notifications are honored
    /// automatically. When `false` the retry signal is dropped and the
    /// transport must treat the request as not retried.
    pub forward_retries: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            forward_retries: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_forward_retries() {
        assert!(SessionOptions::default().forward_retries);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let options: SessionOptions = serde_json::from_str("{}").unwrap();
        assert!(options.forward_retries);
    }
}
