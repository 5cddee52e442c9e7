//! Domain model (ids, tags, items, specs, decisions, outcomes, errors).

pub mod credentials;
pub mod decision;
pub mod errors;
pub mod ids;
pub mod item;
pub mod outcome;
pub mod retry;
pub mod spec;
pub mod stats;
pub mod tag;

pub use self::credentials::Credentials;
pub use self::decision::{
    DEFAULT_BACKLOG_PRESSURE_THRESHOLD, Decider, DefaultDecider, DeleteReason, Disposition,
    MissingRetrySignal,
};
pub use self::errors::{CredentialError, DispatchError, HandlerError, QueueError, RemoteError};
pub use self::ids::{ItemId, ItemRef, WorkerTaskId};
pub use self::item::{LeaseBatch, NewWorkItem, WorkItem};
pub use self::outcome::{PassFailure, PassOutcome};
pub use self::retry::RetryOptions;
pub use self::spec::{LeaseSettings, WorkerSpec, WorkerTaskRequest, WorkerTemplate};
pub use self::stats::QueueStats;
pub use self::tag::{DEFAULT_TAG_PREFIX, TagId};
