use std::path::Path;

use chrono::Local;
use secrecy::SecretString;

use crate::{
    api_client::{ApiClient, ApiError},
    domain::{EmailConfig, LocalValidationError, RecipientKey, SendOutcome, UploadFile, UserInfo},
    recipient_set::RecipientSet,
    session::{SessionError, SessionGuard},
    workflow::{Applied, SendWorkflow, Ticket, WorkflowError},
};

/// One signed-in user driving upload, review, send and retry against the
/// backend.
pub struct MailMerge {
    api_client: ApiClient,
    session: SessionGuard,
    workflow: SendWorkflow,
    username: String,
}

#[derive(thiserror::Error, Debug)]
pub enum MailMergeError {
    #[error(transparent)]
    LocalValidation(#[from] LocalValidationError),
    #[error("session expired, please sign in again")]
    Unauthorized,
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("{message}")]
    Request { status: u16, message: String },
    #[error("couldn't reach the mail-merge backend, reqwest error {0}")]
    Transport(#[source] reqwest::Error),
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl MailMerge {
    pub fn new(
        api_client: ApiClient,
        session: SessionGuard,
        workflow: SendWorkflow,
        username: String,
    ) -> Self {
        Self {
            api_client,
            session,
            workflow,
            username,
        }
    }

    pub fn session(&self) -> &SessionGuard {
        &self.session
    }

    pub fn workflow(&self) -> &SendWorkflow {
        &self.workflow
    }

    pub fn recipients_mut(&mut self) -> Option<&mut RecipientSet> {
        self.workflow.recipients_mut()
    }

    pub fn remove_from_retry(&mut self, key: RecipientKey) -> bool {
        self.workflow.remove_from_retry(key)
    }

    #[tracing::instrument(name = "Signing in", skip(self, password), fields(username = %self.username))]
    pub async fn login(&mut self, password: &SecretString) -> Result<UserInfo, MailMergeError> {
        let response = match self.api_client.login(&self.username, password).await {
            Ok(response) => response,
            Err(ApiError::Unauthorized) => return Err(MailMergeError::InvalidCredentials),
            Err(e) => return Err(request_error(e)),
        };
        let user = self
            .session
            .sign_in(SecretString::from(response.token), response.user)
            .await?;
        self.workflow.discard();
        Ok(user)
    }

    pub async fn logout(&mut self) -> Result<(), MailMergeError> {
        self.workflow.discard();
        Ok(self.session.sign_out().await?)
    }

    /// The extension is checked before anything else happens; a rejected
    /// file leaves the workflow untouched and issues no request.
    pub async fn upload(
        &mut self,
        file_name: String,
        contents: Vec<u8>,
    ) -> Result<&RecipientSet, MailMergeError> {
        let file = UploadFile::new(file_name, contents)?;
        self.upload_file(file).await
    }

    pub async fn upload_path(
        &mut self,
        path: impl AsRef<Path>,
    ) -> Result<&RecipientSet, MailMergeError> {
        let file = UploadFile::from_path(path).await?;
        self.upload_file(file).await
    }

    #[tracing::instrument(
        name = "Uploading recipients",
        skip(self, file),
        fields(file_name = %file.file_name())
    )]
    async fn upload_file(&mut self, file: UploadFile) -> Result<&RecipientSet, MailMergeError> {
        let token = self.bearer().await?;
        let ticket = self.workflow.begin_upload()?;
        let timestamp = Local::now().naive_local();
        let (ticket, result) = {
            let pending = PendingRequest::new(&mut self.workflow, ticket);
            let result = self
                .api_client
                .upload_file(&token, &file, &self.username, timestamp)
                .await;
            (pending.finish(), result)
        };
        match result {
            Ok(rows) => applied(self.workflow.complete_upload(ticket, rows))?,
            Err(e) => return Err(self.fail(ticket, e).await),
        }
        self.workflow
            .recipients()
            .ok_or(MailMergeError::Workflow(WorkflowError::Superseded))
    }

    #[tracing::instrument(name = "Sending reviewed recipients", skip(self))]
    pub async fn send(&mut self) -> Result<&SendOutcome, MailMergeError> {
        let token = self.bearer().await?;
        let (ticket, payload) = self.workflow.begin_send()?;
        let (ticket, result) = {
            let pending = PendingRequest::new(&mut self.workflow, ticket);
            let result = self.api_client.send_email(&token, &payload).await;
            (pending.finish(), result)
        };
        match result {
            Ok(response) => applied(self.workflow.complete_send(ticket, response))?,
            Err(e) => return Err(self.fail(ticket, e).await),
        }
        self.current_outcome()
    }

    #[tracing::instrument(name = "Retrying failed recipients", skip(self))]
    pub async fn retry(&mut self) -> Result<&SendOutcome, MailMergeError> {
        let token = self.bearer().await?;
        let (ticket, payload) = self.workflow.begin_retry()?;
        let (ticket, result) = {
            let pending = PendingRequest::new(&mut self.workflow, ticket);
            let result = self.api_client.send_email(&token, &payload).await;
            (pending.finish(), result)
        };
        match result {
            Ok(response) => applied(self.workflow.complete_retry(ticket, response))?,
            Err(e) => return Err(self.fail(ticket, e).await),
        }
        self.current_outcome()
    }

    pub fn cancel_retry(&mut self) -> Result<(), MailMergeError> {
        Ok(self.workflow.cancel_retry()?)
    }

    pub fn back_to_main(&mut self) {
        self.workflow.back_to_main();
    }

    pub async fn email_config(&self) -> Result<Option<EmailConfig>, MailMergeError> {
        Ok(self.session.email_config().await?)
    }

    /// Push the template to the backend, then keep a local copy that
    /// survives logout.
    #[tracing::instrument(name = "Configuring email template", skip(self, config))]
    pub async fn save_email_config(&mut self, config: &EmailConfig) -> Result<(), MailMergeError> {
        let token = self.bearer().await?;
        match self.api_client.save_email_config(&token, config).await {
            Ok(()) => Ok(self.session.save_email_config(config).await?),
            Err(ApiError::Unauthorized) => Err(self.force_logout().await),
            Err(e) => Err(request_error(e)),
        }
    }

    async fn bearer(&mut self) -> Result<SecretString, MailMergeError> {
        match self.session.bearer().await {
            Ok(token) => Ok(token),
            Err(SessionError::NotAuthenticated) => Err(self.force_logout().await),
            Err(e) => Err(e.into()),
        }
    }

    fn current_outcome(&self) -> Result<&SendOutcome, MailMergeError> {
        self.workflow
            .outcome()
            .ok_or(MailMergeError::Workflow(WorkflowError::Superseded))
    }

    async fn fail(&mut self, ticket: Ticket, error: ApiError) -> MailMergeError {
        if let ApiError::Unauthorized = error {
            return self.force_logout().await;
        }
        self.workflow.abort(ticket);
        request_error(error)
    }

    async fn force_logout(&mut self) -> MailMergeError {
        self.workflow.discard();
        if let Err(e) = self.session.on_unauthorized().await {
            tracing::error!(error = %e, "Failed to clear the persisted session");
        }
        MailMergeError::Unauthorized
    }
}

/// Holds an in-flight ticket for the duration of one request. If the
/// request future is dropped before it resolves, the ticket is aborted so
/// the workflow leaves its in-flight phase.
struct PendingRequest<'a> {
    workflow: &'a mut SendWorkflow,
    ticket: Ticket,
    finished: bool,
}

impl<'a> PendingRequest<'a> {
    fn new(workflow: &'a mut SendWorkflow, ticket: Ticket) -> Self {
        Self {
            workflow,
            ticket,
            finished: false,
        }
    }

    fn finish(mut self) -> Ticket {
        self.finished = true;
        self.ticket
    }
}

impl Drop for PendingRequest<'_> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!(operation = ?self.ticket.operation(), "Request abandoned before completion");
            let _ = self.workflow.abort(self.ticket);
        }
    }
}

fn applied(applied: Applied) -> Result<(), MailMergeError> {
    match applied {
        Applied::Applied => Ok(()),
        Applied::Stale => Err(WorkflowError::Superseded.into()),
    }
}

fn request_error(error: ApiError) -> MailMergeError {
    match error {
        ApiError::Unauthorized => MailMergeError::Unauthorized,
        ApiError::Request { status, message } => MailMergeError::Request { status, message },
        ApiError::Transport(e) => MailMergeError::Transport(e),
    }
}
