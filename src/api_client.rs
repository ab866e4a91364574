use std::time::Duration;

use chrono::NaiveDateTime;
use reqwest::{
    Client, Response, StatusCode,
    multipart::{Form, Part},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{EmailConfig, Recipient, SendResponse, UploadFile};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// HTTP client for the mail-merge backend.
///
/// Every call is a single request: nothing here retries on its own.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http_client: Client,
    base_url: String,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
pub struct LoginResponse {
    pub token: String,
    /// Identity as sent by the server; parsed by the session layer.
    pub user: serde_json::Value,
}

#[derive(Serialize)]
struct SendEmailRequest<'a> {
    data: &'a [Recipient],
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("the session is no longer authorized")]
    Unauthorized,
    #[error("request failed with status {status}: {message}")]
    Request { status: u16, message: String },
    #[error("couldn't reach the mail-merge backend, reqwest error {0}")]
    Transport(#[from] reqwest::Error),
}

impl ApiClient {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[tracing::instrument(
        name = "Logging in to the mail-merge backend",
        skip(self, password),
        fields(request_id = %Uuid::new_v4())
    )]
    pub async fn login(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<LoginResponse, ApiError> {
        let url = format!("{}/login", self.base_url);
        let request_body = LoginRequest {
            username,
            password: password.expose_secret(),
        };
        let response = self
            .http_client
            .post(&url)
            .json(&request_body)
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }

    #[tracing::instrument(
        name = "Uploading recipient spreadsheet",
        skip(self, token, file),
        fields(file_name = %file.file_name(), request_id = %Uuid::new_v4())
    )]
    pub async fn upload_file(
        &self,
        token: &SecretString,
        file: &UploadFile,
        user: &str,
        timestamp: NaiveDateTime,
    ) -> Result<Vec<Recipient>, ApiError> {
        let url = format!("{}/upload_file", self.base_url);
        let file_part =
            Part::bytes(file.contents().to_vec()).file_name(file.file_name().to_owned());
        let form = Form::new()
            .part("file", file_part)
            .text("user", user.to_owned())
            .text("timestamp", timestamp.format(TIMESTAMP_FORMAT).to_string());
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(token.expose_secret())
            .multipart(form)
            .send()
            .await?;
        let recipients: Vec<Recipient> = check_status(response).await?.json().await?;
        tracing::info!(rows = recipients.len(), "Spreadsheet parsed by the backend");
        Ok(recipients)
    }

    #[tracing::instrument(
        name = "Sending emails to recipients",
        skip(self, token, recipients),
        fields(recipients = recipients.len(), request_id = %Uuid::new_v4())
    )]
    pub async fn send_email(
        &self,
        token: &SecretString,
        recipients: &[Recipient],
    ) -> Result<SendResponse, ApiError> {
        let url = format!("{}/send_email", self.base_url);
        let request_body = SendEmailRequest { data: recipients };
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(token.expose_secret())
            .json(&request_body)
            .send()
            .await?;
        let send_response: SendResponse = check_status(response).await?.json().await?;
        tracing::info!(
            sent = send_response.success.len(),
            failed = send_response.failed.len(),
            "Send request answered"
        );
        Ok(send_response)
    }

    #[tracing::instrument(
        name = "Saving email configuration",
        skip(self, token, config),
        fields(attachments = config.attachments.len(), request_id = %Uuid::new_v4())
    )]
    pub async fn save_email_config(
        &self,
        token: &SecretString,
        config: &EmailConfig,
    ) -> Result<(), ApiError> {
        let url = format!("{}/email-config", self.base_url);
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(token.expose_secret())
            .json(config)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

/// Map a non-2xx response onto `ApiError`, passing successful ones through.
async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED {
        tracing::warn!("Backend rejected the bearer credential");
        return Err(ApiError::Unauthorized);
    }
    let body = response.text().await.unwrap_or_default();
    let message = error_message(status, &body);
    tracing::error!(status = status.as_u16(), %message, "Backend returned an error");
    Err(ApiError::Request {
        status: status.as_u16(),
        message,
    })
}

fn error_message(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            message: Some(message),
        }) => message,
        _ if !body.trim().is_empty() => body.trim().to_owned(),
        _ => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_owned(),
    }
}
