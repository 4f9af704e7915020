//! The per-user document workflow as an explicit state machine.
//!
//! Every mutation goes through [`DocumentSession::apply`]. The service holds
//! the session lock around each call, drops it while the model runs, and
//! hands the result back with the [`ExtractionTicket`] it was issued. A ticket
//! from before a cancel or expiry no longer matches and the result is
//! dropped.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use docintake_config::SessionConfig;
use docintake_core::{
    DocumentKind, ExtractionResult, FieldMap, KindOutcome, SessionEvent, SessionId, Submission,
    ValidationOutcome,
};
use tracing::{debug, info};

use crate::state::SessionState;

/// Workflow parameters shared by every session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPolicy {
    pub required_kinds: Vec<DocumentKind>,
    pub max_retries: u32,
    pub details: Vec<String>,
}

impl SessionPolicy {
    pub fn new(required_kinds: Vec<DocumentKind>, max_retries: u32) -> Self {
        let mut kinds = Vec::with_capacity(required_kinds.len());
        for kind in required_kinds {
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        Self { required_kinds: kinds, max_retries, details: Vec::new() }
    }

    pub fn with_details(mut self, details: Vec<String>) -> Self {
        self.details = details;
        self
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.required_kinds(), config.max_retries()).with_details(config.details())
    }
}

/// Identifies one extraction attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionTicket {
    pub kind: DocumentKind,
    generation: u64,
}

/// Inputs to the transition function.
#[derive(Debug, Clone)]
pub enum SessionInput {
    Start,
    ImageArrived { hint: Option<DocumentKind> },
    Validated(ValidationOutcome),
    Extracted { ticket: ExtractionTicket, result: ExtractionResult },
    ModelUnavailable { message: String },
    Text(String),
    Cancel,
    Expire,
}

#[derive(Debug)]
pub struct DocumentSession {
    id: SessionId,
    policy: Arc<SessionPolicy>,
    /// Kinds not yet started, in request order.
    pending: VecDeque<DocumentKind>,
    state: SessionState,
    retry_count: u32,
    last_failure: Option<String>,
    results: BTreeMap<DocumentKind, KindOutcome>,
    details: FieldMap,
    generation: u64,
    last_activity: Instant,
}

impl DocumentSession {
    pub fn new(id: impl Into<SessionId>, policy: Arc<SessionPolicy>) -> Self {
        let pending = policy.required_kinds.iter().copied().collect();
        Self {
            id: id.into(),
            policy,
            pending,
            state: SessionState::Idle,
            retry_count: 0,
            last_failure: None,
            results: BTreeMap::new(),
            details: FieldMap::new(),
            generation: 0,
            last_activity: Instant::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn results(&self) -> &BTreeMap<DocumentKind, KindOutcome> {
        &self.results
    }

    pub fn details(&self) -> &FieldMap {
        &self.details
    }

    pub fn pending_kinds(&self) -> Vec<DocumentKind> {
        self.pending.iter().copied().collect()
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }

    /// The attempt currently running, if the session is extracting.
    pub fn in_flight(&self) -> Option<ExtractionTicket> {
        match self.state {
            SessionState::Extracting(kind) => Some(ExtractionTicket { kind, generation: self.generation }),
            _ => None,
        }
    }

    /// What the workbook receives: successful kinds and collected details.
    pub fn submission(&self) -> Submission {
        Submission::from_outcomes(&self.results, self.details.clone())
    }

    /// The single transition function. Returns the events to emit, in order.
    pub fn apply(&mut self, input: SessionInput) -> Vec<SessionEvent> {
        self.last_activity = Instant::now();
        let mut events = Vec::new();

        match (self.state, input) {
            (SessionState::Idle, SessionInput::Start) => self.advance(&mut events),
            (SessionState::Idle, SessionInput::ImageArrived { hint }) => {
                self.advance(&mut events);
                events.extend(self.apply(SessionInput::ImageArrived { hint }));
            }
            (state, SessionInput::Start) if !state.is_terminal() => self.rerequest(&mut events),

            (SessionState::AwaitingImage(expected), SessionInput::ImageArrived { hint }) => match hint {
                Some(received) if received != expected => {
                    events.push(SessionEvent::WrongDocumentKind { expected, received });
                }
                _ => self.set_state(SessionState::Validating(expected)),
            },
            (SessionState::Validating(kind) | SessionState::Extracting(kind), SessionInput::ImageArrived { .. }) => {
                events.push(SessionEvent::ExtractionInProgress { kind });
            }

            (SessionState::Validating(kind), SessionInput::Validated(outcome)) => {
                if outcome.is_accepted() {
                    self.generation += 1;
                    self.set_state(SessionState::Extracting(kind));
                } else {
                    self.record_failure(kind, outcome.to_string(), &mut events, |attempts_remaining| {
                        SessionEvent::ValidationRejected { kind, reason: outcome.clone(), attempts_remaining }
                    });
                }
            }

            (SessionState::Extracting(kind), SessionInput::Extracted { ticket, result })
                if ticket.kind == kind && ticket.generation == self.generation =>
            {
                if result.success {
                    self.set_state(SessionState::RecordedSuccess(kind));
                    events.push(SessionEvent::ExtractionSucceeded { kind, fields: result.fields.clone() });
                    self.results.insert(kind, KindOutcome::Succeeded(result));
                    self.advance(&mut events);
                } else {
                    let failure = result.failure.clone().unwrap_or(docintake_core::InferenceFailure::EmptyOutput);
                    self.record_failure(kind, failure.to_string(), &mut events, |attempts_remaining| {
                        SessionEvent::ExtractionFailed { kind, reason: failure.clone(), attempts_remaining }
                    });
                }
            }
            (_, SessionInput::Extracted { ticket, .. }) => {
                debug!(session = %self.id, kind = %ticket.kind, state = %self.state, "Discarding stale extraction result");
            }

            (SessionState::Validating(kind) | SessionState::Extracting(kind), SessionInput::ModelUnavailable { message }) => {
                self.generation += 1;
                self.set_state(SessionState::AwaitingImage(kind));
                events.push(SessionEvent::ModelUnavailable { message });
            }

            (SessionState::AwaitingDetail(index), SessionInput::Text(text)) => {
                let answer = text.split_whitespace().collect::<Vec<_>>().join(" ");
                match self.policy.details.get(index) {
                    Some(name) if !answer.is_empty() => {
                        self.details.insert(name.clone(), answer);
                        self.next_detail(index + 1, &mut events);
                    }
                    _ => self.rerequest(&mut events),
                }
            }

            (state, SessionInput::Cancel) if !state.is_terminal() => {
                self.generation += 1;
                self.set_state(SessionState::Cancelled);
                events.push(SessionEvent::SessionCancelled);
            }
            (state, SessionInput::Expire) if !state.is_terminal() => {
                self.generation += 1;
                self.set_state(SessionState::Cancelled);
                events.push(SessionEvent::SessionExpired);
            }

            (state, input) => {
                events.push(SessionEvent::NotExpected { detail: describe_unexpected(state, &input) });
            }
        }

        events
    }

    /// Count one failed attempt for `kind`: retry if budget remains, else
    /// mark the kind permanently failed and move on.
    fn record_failure(
        &mut self,
        kind: DocumentKind,
        reason: String,
        events: &mut Vec<SessionEvent>,
        failure_event: impl Fn(u32) -> SessionEvent,
    ) {
        self.set_state(SessionState::RecordedFailure(kind));
        self.last_failure = Some(reason);

        if self.retry_count + 1 > self.policy.max_retries {
            let attempts = self.retry_count + 1;
            events.push(failure_event(0));
            events.push(SessionEvent::KindPermanentlyFailed { kind, attempts });
            info!(session = %self.id, %kind, attempts, "Document kind permanently failed");
            self.results.insert(
                kind,
                KindOutcome::PermanentlyFailed {
                    attempts,
                    last_failure: self.last_failure.take().unwrap_or_default(),
                },
            );
            self.advance(events);
        } else {
            self.retry_count += 1;
            let attempts_remaining = self.policy.max_retries - self.retry_count + 1;
            events.push(failure_event(attempts_remaining));
            self.set_state(SessionState::AwaitingImage(kind));
        }
    }

    /// Move to the next pending kind, then to details, then to completion.
    fn advance(&mut self, events: &mut Vec<SessionEvent>) {
        self.retry_count = 0;
        self.last_failure = None;
        match self.pending.pop_front() {
            Some(kind) => {
                self.set_state(SessionState::AwaitingImage(kind));
                events.push(SessionEvent::DocumentRequested { kind });
            }
            None => self.next_detail(0, events),
        }
    }

    fn next_detail(&mut self, index: usize, events: &mut Vec<SessionEvent>) {
        match self.policy.details.get(index).cloned() {
            Some(name) => {
                self.set_state(SessionState::AwaitingDetail(index));
                events.push(SessionEvent::DetailRequested { name });
            }
            None => self.set_state(SessionState::Completed),
        }
    }

    /// Repeat the prompt for the current step.
    fn rerequest(&self, events: &mut Vec<SessionEvent>) {
        match self.state {
            SessionState::AwaitingImage(kind) => events.push(SessionEvent::DocumentRequested { kind }),
            SessionState::Validating(kind) | SessionState::Extracting(kind) => {
                events.push(SessionEvent::ExtractionInProgress { kind })
            }
            SessionState::AwaitingDetail(index) => {
                if let Some(name) = self.policy.details.get(index) {
                    events.push(SessionEvent::DetailRequested { name: name.clone() });
                }
            }
            _ => {}
        }
    }

    fn set_state(&mut self, next: SessionState) {
        debug!(session = %self.id, from = %self.state, to = %next, "Session transition");
        self.state = next;
    }
}

fn describe_unexpected(state: SessionState, input: &SessionInput) -> String {
    let what = match input {
        SessionInput::Start => "start",
        SessionInput::ImageArrived { .. } => "image",
        SessionInput::Validated(_) => "validation result",
        SessionInput::Extracted { .. } => "extraction result",
        SessionInput::ModelUnavailable { .. } => "model failure",
        SessionInput::Text(_) => "text",
        SessionInput::Cancel => "cancel",
        SessionInput::Expire => "expiry",
    };
    match state {
        SessionState::AwaitingImage(kind) => format!("{what} received while waiting for a {} image", kind.label()),
        SessionState::AwaitingDetail(_) => format!("{what} received while waiting for a text answer"),
        other => format!("{what} not accepted in state {other}"),
    }
}
