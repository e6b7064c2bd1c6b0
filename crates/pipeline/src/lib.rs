//! inbound-pipeline: turns streamed proposition responses into engine
//! rules, cached content and notifications.
//!
//! A request registers the surfaces it asks for. Fragments accumulate
//! until the completion signal arrives; the batch is then parsed, merged
//! into the per-category stores surface by surface, and dispatched.

pub mod config;
pub mod correlator;
pub mod dispatch;
pub mod messaging;
pub mod parser;
pub mod reconciler;
pub mod state;

pub use config::{ConfigError, LoggingConfig, PipelineConfig};
pub use correlator::{CompletedBatch, RequestCorrelator, RequestRecord};
pub use dispatch::{
    DispatchPlan, DispatchSummary, Dispatcher, NotificationSink, PropositionsNotification,
    RecordingNotificationSink,
};
pub use messaging::{BatchReport, Messaging};
pub use parser::{parse, ParsedPropositions};
pub use reconciler::{DurableSurfaceStore, MergeOutcome, SurfaceStore};
pub use state::{ReconciliationState, StateSnapshot};
