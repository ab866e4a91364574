use std::path::Path;

const SPREADSHEET_EXTENSION: &str = ".xlsx";

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum LocalValidationError {
    #[error("Please select an Excel (.xlsx) file")]
    NotASpreadsheet(String),
    #[error("couldn't read {path}: {reason}")]
    Unreadable { path: String, reason: String },
}

/// A spreadsheet that passed the local extension check and may be uploaded.
#[derive(Debug, Clone)]
pub struct UploadFile {
    file_name: String,
    contents: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: String, contents: Vec<u8>) -> Result<UploadFile, LocalValidationError> {
        check_extension(&file_name)?;
        Ok(Self {
            file_name,
            contents,
        })
    }

    /// The extension is checked before the file is read.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<UploadFile, LocalValidationError> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        check_extension(&file_name)?;

        let contents = tokio::fs::read(path)
            .await
            .map_err(|e| LocalValidationError::Unreadable {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            file_name,
            contents,
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn contents(&self) -> &[u8] {
        &self.contents
    }
}

fn check_extension(file_name: &str) -> Result<(), LocalValidationError> {
    if file_name.to_lowercase().ends_with(SPREADSHEET_EXTENSION)
        && file_name.len() > SPREADSHEET_EXTENSION.len()
    {
        Ok(())
    } else {
        Err(LocalValidationError::NotASpreadsheet(file_name.to_owned()))
    }
}
