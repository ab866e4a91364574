use std::path::Path;

use anyhow::Context;

use crate::{
    api_client::ApiClient,
    configuration::Settings,
    mail_merge::{MailMerge, MailMergeError},
    session::{SessionGuard, SessionStore},
    workflow::SendWorkflow,
};

pub struct Application {
    mail_merge: MailMerge,
    settings: Settings,
}

impl Application {
    pub async fn build(configuration: Settings) -> anyhow::Result<Self> {
        let api_client = ApiClient::new(
            configuration.api.base_url.clone(),
            configuration.api.timeout(),
        )
        .context("Failed to build the HTTP client")?;
        let store = SessionStore::new(&configuration.session.storage_path);
        let session = SessionGuard::restore(store)
            .await
            .context("Failed to restore the session")?;
        let workflow = SendWorkflow::new(configuration.recipients.page_size);

        let mail_merge = MailMerge::new(
            api_client,
            session,
            workflow,
            configuration.user.username.clone(),
        );

        Ok(Self {
            mail_merge,
            settings: configuration,
        })
    }

    pub fn mail_merge(&mut self) -> &mut MailMerge {
        &mut self.mail_merge
    }

    /// Sign in if needed, upload `spreadsheet`, and send one batch.
    ///
    /// Failed recipients are reported but never retried here.
    pub async fn run(mut self, spreadsheet: &Path) -> anyhow::Result<()> {
        if !self.mail_merge.session().is_authenticated() {
            let password = self
                .settings
                .user
                .password
                .clone()
                .context("Not signed in and no password configured (APP_USER__PASSWORD)")?;
            let user = self.mail_merge.login(&password).await?;
            tracing::info!(username = %user.username, "Signed in");
        }

        let rows = self.mail_merge.upload_path(spreadsheet).await?.len();
        tracing::info!(rows, "Spreadsheet uploaded");

        let outcome = match self.mail_merge.send().await {
            Ok(outcome) => outcome,
            Err(MailMergeError::Unauthorized) => {
                anyhow::bail!("The session was rejected by the backend, sign in again")
            }
            Err(e) => return Err(e.into()),
        };
        tracing::info!(
            sent = outcome.success().len(),
            failed = outcome.failed().len(),
            retry_armed = outcome.retry_armed(),
            "Send finished"
        );
        for recipient in outcome.failed() {
            tracing::warn!(email = %recipient.email, name = %recipient.name, "Not delivered");
        }
        Ok(())
    }
}
