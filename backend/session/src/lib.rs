//! Document sessions: the per-user state machine, the registry that owns
//! live sessions, and the service that drives them from transport events.

pub mod reaper;
pub mod registry;
pub mod service;
pub mod session;
pub mod state;

pub use reaper::{spawn_reaper, sweep_interval};
pub use registry::{SessionHandle, SessionRegistry};
pub use service::IntakeService;
pub use session::{DocumentSession, ExtractionTicket, SessionInput, SessionPolicy};
pub use state::SessionState;
