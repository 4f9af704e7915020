pub mod error;
pub mod event;
pub mod traits;
pub mod types;

pub use error::{InferenceFailure, IntakeError};
pub use event::{InboundEvent, OutboundEvent, SessionEvent, SubmissionStatus};
pub use traits::{ModelLoader, VisionModel, WorkbookSink};
pub use types::{
    DocumentKind, ExtractionRequest, ExtractionResult, FieldMap, KindOutcome, RawImage,
    SessionId, Submission, ValidationOutcome,
};
