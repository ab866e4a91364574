mod email_config;
mod recipient;
mod send_outcome;
mod upload_file;
mod user_info;

pub use email_config::{Attachment, DataUrlError, EmailConfig};
pub use recipient::{KeySequence, Recipient, RecipientId, RecipientKey, Row};
pub use send_outcome::{SendOutcome, SendResponse};
pub use upload_file::{LocalValidationError, UploadFile};
pub use user_info::UserInfo;
