//! Upload → review → send → retry, as one explicit state machine.
//!
//! Every network round trip is split in two: `begin_*` hands out a
//! [`Ticket`] stamped with the current epoch and moves into an in-flight
//! phase; `complete_*` or [`SendWorkflow::abort`] applies the result only if
//! the epoch still matches. Going back to the main screen bumps the epoch,
//! so a response that lands afterwards cannot resurrect discarded state.

use crate::domain::{KeySequence, Recipient, RecipientKey, Row, SendOutcome, SendResponse};
use crate::recipient_set::{DEFAULT_PAGE_SIZE, RecipientSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Uploading,
    Reviewing,
    Sending,
    AllSucceeded,
    PartialFailure,
    Retrying,
    RetryCancelled,
}

impl Phase {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Phase::Uploading | Phase::Sending | Phase::Retrying)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Upload,
    Send,
    Retry,
}

/// Proof that an operation was started, used to apply its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct Ticket {
    epoch: u64,
    operation: Operation,
    resume: Phase,
}

impl Ticket {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Applied,
    /// The workflow moved on since the ticket was issued; nothing changed.
    Stale,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("another request is still in flight")]
    Busy,
    #[error("{operation:?} is not possible while {phase:?}")]
    InvalidPhase { operation: Operation, phase: Phase },
    #[error("the response arrived after the workflow was reset")]
    Superseded,
}

pub struct SendWorkflow {
    phase: Phase,
    epoch: u64,
    page_size: usize,
    recipients: Option<RecipientSet>,
    outcome: Option<SendOutcome>,
    retry_list: Vec<Row>,
    retry_keys: KeySequence,
}

impl Default for SendWorkflow {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl SendWorkflow {
    pub fn new(page_size: usize) -> Self {
        Self {
            phase: Phase::Idle,
            epoch: 0,
            page_size,
            recipients: None,
            outcome: None,
            retry_list: Vec::new(),
            retry_keys: KeySequence::default(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_busy(&self) -> bool {
        self.phase.is_in_flight()
    }

    pub fn recipients(&self) -> Option<&RecipientSet> {
        self.recipients.as_ref()
    }

    /// Editing is only possible while reviewing an upload.
    pub fn recipients_mut(&mut self) -> Option<&mut RecipientSet> {
        match self.phase {
            Phase::Reviewing => self.recipients.as_mut(),
            _ => None,
        }
    }

    pub fn outcome(&self) -> Option<&SendOutcome> {
        self.outcome.as_ref()
    }

    /// Locally editable copy of the failed recipients; the next retry sends
    /// exactly these.
    pub fn retry_list(&self) -> &[Row] {
        &self.retry_list
    }

    pub fn begin_upload(&mut self) -> Result<Ticket, WorkflowError> {
        self.begin(
            Operation::Upload,
            &[
                Phase::Idle,
                Phase::Reviewing,
                Phase::AllSucceeded,
                Phase::PartialFailure,
                Phase::RetryCancelled,
            ],
            Phase::Uploading,
        )
    }

    pub fn complete_upload(&mut self, ticket: Ticket, rows: Vec<Recipient>) -> Applied {
        if !self.accepts(&ticket, Operation::Upload) {
            return Applied::Stale;
        }
        let mut recipients = RecipientSet::with_page_size(self.page_size);
        recipients.load(rows);
        tracing::info!(rows = recipients.len(), "Recipients loaded for review");
        self.recipients = Some(recipients);
        self.outcome = None;
        self.retry_list.clear();
        self.phase = Phase::Reviewing;
        Applied::Applied
    }

    /// Start the first send of a cycle with the whole reviewed list.
    pub fn begin_send(&mut self) -> Result<(Ticket, Vec<Recipient>), WorkflowError> {
        let ticket = self.begin(Operation::Send, &[Phase::Reviewing], Phase::Sending)?;
        let payload = self
            .recipients
            .as_ref()
            .map(RecipientSet::recipients)
            .unwrap_or_default();
        Ok((ticket, payload))
    }

    pub fn complete_send(&mut self, ticket: Ticket, response: SendResponse) -> Applied {
        if !self.accepts(&ticket, Operation::Send) {
            return Applied::Stale;
        }
        self.recipients = None;
        self.settle(SendOutcome::first(response));
        Applied::Applied
    }

    pub fn begin_retry(&mut self) -> Result<(Ticket, Vec<Recipient>), WorkflowError> {
        let ticket = self.begin(Operation::Retry, &[Phase::PartialFailure], Phase::Retrying)?;
        let payload = self
            .retry_list
            .iter()
            .map(|row| row.recipient.clone())
            .collect();
        Ok((ticket, payload))
    }

    pub fn complete_retry(&mut self, ticket: Ticket, response: SendResponse) -> Applied {
        if !self.accepts(&ticket, Operation::Retry) {
            return Applied::Stale;
        }
        let mut outcome = self.outcome.take().unwrap_or_default();
        outcome.fold_retry(response);
        self.settle(outcome);
        Applied::Applied
    }

    /// Drop an entry from the retry list before the next retry.
    pub fn remove_from_retry(&mut self, key: RecipientKey) -> bool {
        if self.phase != Phase::PartialFailure {
            return false;
        }
        let before = self.retry_list.len();
        self.retry_list.retain(|row| row.key != key);
        self.retry_list.len() != before
    }

    pub fn cancel_retry(&mut self) -> Result<(), WorkflowError> {
        if self.phase != Phase::PartialFailure {
            return Err(self.invalid(Operation::Retry));
        }
        tracing::info!(
            outstanding = self.retry_list.len(),
            "Retry dismissed by the user"
        );
        self.phase = Phase::RetryCancelled;
        Ok(())
    }

    /// Undo `begin_*` after a failed request. Prior state is untouched.
    pub fn abort(&mut self, ticket: Ticket) -> Applied {
        if !self.accepts(&ticket, ticket.operation) {
            return Applied::Stale;
        }
        self.phase = ticket.resume;
        Applied::Applied
    }

    pub fn back_to_main(&mut self) {
        self.epoch += 1;
        self.phase = Phase::Idle;
        self.recipients = None;
        self.outcome = None;
        self.retry_list.clear();
    }

    /// Forget everything, e.g. after the session was invalidated.
    pub fn discard(&mut self) {
        tracing::info!(phase = ?self.phase, "Discarding workflow state");
        self.back_to_main();
    }

    fn begin(
        &mut self,
        operation: Operation,
        allowed: &[Phase],
        in_flight: Phase,
    ) -> Result<Ticket, WorkflowError> {
        if self.phase.is_in_flight() {
            return Err(WorkflowError::Busy);
        }
        if !allowed.contains(&self.phase) {
            return Err(self.invalid(operation));
        }
        self.epoch += 1;
        let ticket = Ticket {
            epoch: self.epoch,
            operation,
            resume: self.phase,
        };
        self.phase = in_flight;
        Ok(ticket)
    }

    fn accepts(&self, ticket: &Ticket, operation: Operation) -> bool {
        let in_flight = match operation {
            Operation::Upload => Phase::Uploading,
            Operation::Send => Phase::Sending,
            Operation::Retry => Phase::Retrying,
        };
        let fresh = ticket.epoch == self.epoch
            && ticket.operation == operation
            && self.phase == in_flight;
        if !fresh {
            tracing::warn!(
                ticket_epoch = ticket.epoch,
                current_epoch = self.epoch,
                ?operation,
                "Ignoring stale response"
            );
        }
        fresh
    }

    fn settle(&mut self, outcome: SendOutcome) {
        self.retry_list = self.retry_keys.assign(outcome.failed().to_vec());
        self.phase = if outcome.retry_armed() {
            Phase::PartialFailure
        } else {
            Phase::AllSucceeded
        };
        tracing::info!(
            sent = outcome.success().len(),
            failed = outcome.failed().len(),
            phase = ?self.phase,
            "Send cycle updated"
        );
        self.outcome = Some(outcome);
    }

    fn invalid(&self, operation: Operation) -> WorkflowError {
        WorkflowError::InvalidPhase {
            operation,
            phase: self.phase,
        }
    }
}
