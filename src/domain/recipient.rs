use serde::{Deserialize, Serialize};
use serde_aux::field_attributes::deserialize_string_from_number;

/// Identifier assigned by the server. Either a JSON string or number is
/// accepted on the wire and kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecipientId(#[serde(deserialize_with = "deserialize_string_from_number")] String);

impl AsRef<str> for RecipientId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for RecipientId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// One row of the uploaded spreadsheet, as returned by the server.
///
/// The display fields are opaque: they are never validated or rewritten
/// on this side of the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecipientId>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub tax_id: String,
}

/// Locally assigned identity of a row.
///
/// Keys come from a monotonically increasing sequence and are never reused,
/// so they stay stable while rows are removed from a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecipientKey(u64);

impl RecipientKey {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for RecipientKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Default)]
pub struct KeySequence {
    next: u64,
}

impl KeySequence {
    pub fn next_key(&mut self) -> RecipientKey {
        let key = RecipientKey(self.next);
        self.next += 1;
        key
    }

    /// Tag every recipient with a fresh key, preserving order.
    pub fn assign(&mut self, recipients: Vec<Recipient>) -> Vec<Row> {
        recipients
            .into_iter()
            .map(|recipient| Row {
                key: self.next_key(),
                recipient,
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub key: RecipientKey,
    pub recipient: Recipient,
}
