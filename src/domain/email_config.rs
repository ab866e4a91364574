use base64::{Engine, engine::general_purpose};
use serde::{Deserialize, Serialize};

/// Template the server renders for every recipient of a send.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailConfig {
    pub subject: String,
    /// HTML body.
    pub body: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl EmailConfig {
    pub fn remove_attachment(&mut self, index: usize) -> Option<Attachment> {
        (index < self.attachments.len()).then(|| self.attachments.remove(index))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub size: u64,
    /// `data:<mime>;base64,<payload>`
    pub data: String,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum DataUrlError {
    #[error("invalid data URL format")]
    MissingPrefix,
    #[error("invalid data URL format: missing comma")]
    MissingComma,
    #[error("invalid base64 payload: {0}")]
    Payload(String),
}

impl Attachment {
    pub fn from_bytes(name: String, mime_type: String, bytes: &[u8]) -> Self {
        let data = format!(
            "data:{};base64,{}",
            mime_type,
            general_purpose::STANDARD.encode(bytes)
        );
        Self {
            name,
            mime_type,
            size: bytes.len() as u64,
            data,
        }
    }

    pub fn decode(&self) -> Result<Vec<u8>, DataUrlError> {
        let header_and_payload = self
            .data
            .strip_prefix("data:")
            .ok_or(DataUrlError::MissingPrefix)?;
        let (_, payload) = header_and_payload
            .split_once(',')
            .ok_or(DataUrlError::MissingComma)?;
        general_purpose::STANDARD
            .decode(payload)
            .map_err(|e| DataUrlError::Payload(e.to_string()))
    }
}
