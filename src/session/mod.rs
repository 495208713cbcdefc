//! Backend session: wire protocol, transport and sync bookkeeping.
//!
//! The pipeline machine talks to the backend only through the
//! [`SessionChannel`] capability. [`ChannelSession`] implements it over a
//! pair of crossbeam channels and a worker thread that drives any
//! [`SessionBackend`]; the `mock-session` feature adds an in-memory
//! [`MockBackend`] for tests and the demo binary.
//!
//! # Features
//!
//! - Monotonic sync tokens with staleness detection on receipt
//! - Stage-indexed rejections mapped back to stage ids
//! - Serialized stage format for external persistence

pub mod bridge;
pub mod channel;
#[cfg(feature = "mock-session")]
pub mod mock;
pub mod protocol;
pub mod sync;

pub use bridge::{ChannelSession, EvaluateError, SessionBackend, SessionWorker};
pub use channel::SessionChannel;
#[cfg(feature = "mock-session")]
pub use mock::{MockBackend, MockDataset};
pub use protocol::{
    parse_pipeline_json, serialize_pipeline, SerializedStage, SessionEvent, SessionRequest,
    STAGE_CLASS_PREFIX,
};
pub use sync::{InFlight, Resolution, SyncTracker};
