use std::fmt;

use docintake_core::DocumentKind;

/// Where a session is in its workflow.
///
/// `RecordedSuccess` and `RecordedFailure` are passed through inside a single
/// transition; callers holding the session lock never observe them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingImage(DocumentKind),
    Validating(DocumentKind),
    Extracting(DocumentKind),
    RecordedSuccess(DocumentKind),
    RecordedFailure(DocumentKind),
    /// Index into the configured detail prompts.
    AwaitingDetail(usize),
    Completed,
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Cancelled)
    }

    /// The document kind this state is about, if any.
    pub fn kind(&self) -> Option<DocumentKind> {
        match self {
            SessionState::AwaitingImage(k)
            | SessionState::Validating(k)
            | SessionState::Extracting(k)
            | SessionState::RecordedSuccess(k)
            | SessionState::RecordedFailure(k) => Some(*k),
            _ => None,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::AwaitingImage(k) => write!(f, "awaiting_image({k})"),
            SessionState::Validating(k) => write!(f, "validating({k})"),
            SessionState::Extracting(k) => write!(f, "extracting({k})"),
            SessionState::RecordedSuccess(k) => write!(f, "recorded_success({k})"),
            SessionState::RecordedFailure(k) => write!(f, "recorded_failure({k})"),
            SessionState::AwaitingDetail(i) => write!(f, "awaiting_detail({i})"),
            SessionState::Completed => write!(f, "completed"),
            SessionState::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(SessionState::Completed.is_terminal());
        assert!(SessionState::Cancelled.is_terminal());
        assert!(!SessionState::Extracting(DocumentKind::LogCard).is_terminal());
        assert!(!SessionState::AwaitingDetail(0).is_terminal());
    }

    #[test]
    fn display_names_kind() {
        assert_eq!(SessionState::AwaitingImage(DocumentKind::LogCard).to_string(), "awaiting_image(log_card)");
        assert_eq!(SessionState::AwaitingDetail(0).kind(), None);
    }
}
