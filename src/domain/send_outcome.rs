use serde::{Deserialize, Serialize};
use serde_aux::field_attributes::deserialize_default_from_null;

use super::Recipient;

/// Body returned by `POST /send_email`. Either list may be missing or `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendResponse {
    #[serde(default, deserialize_with = "deserialize_default_from_null")]
    pub success: Vec<Recipient>,
    #[serde(default, deserialize_with = "deserialize_default_from_null")]
    pub failed: Vec<Recipient>,
}

/// Result of one send cycle, folded across its retries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendOutcome {
    success: Vec<Recipient>,
    failed: Vec<Recipient>,
    retry_armed: bool,
}

impl SendOutcome {
    /// Fold the response of the first send in a cycle.
    pub fn first(response: SendResponse) -> Self {
        let retry_armed = !response.failed.is_empty();
        Self {
            success: response.success,
            failed: response.failed,
            retry_armed,
        }
    }

    /// Fold a retry response: new successes are appended, the failed list
    /// is whatever the server still reports as outstanding.
    pub fn fold_retry(&mut self, response: SendResponse) {
        self.success.extend(response.success);
        self.retry_armed = !response.failed.is_empty();
        self.failed = response.failed;
    }

    pub fn success(&self) -> &[Recipient] {
        &self.success
    }

    pub fn failed(&self) -> &[Recipient] {
        &self.failed
    }

    pub fn retry_armed(&self) -> bool {
        self.retry_armed
    }
}
