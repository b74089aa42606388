//! Response head delivered when the final response arrives.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Status line and headers of the final (non-redirect, non-auth) response.
///
/// `final_url` reflects the URL the response was actually served from,
/// after any redirects the caller allowed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseHead {
    pub status: u16,
    #[serde(default)]
    pub status_text: String,
    pub final_url: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl ResponseHead {
    /// Returns `true` for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
