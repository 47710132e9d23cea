//! Structured generation across interchangeable AI backends.
//!
//! A caller describes the JSON it wants with a [`SchemaDescriptor`] and
//! hands a [`GenerationRequest`] to the [`Orchestrator`]. The orchestrator:
//!
//! - calls the active backend through a [`Transport`], retrying transient
//!   failures with exponential backoff ([`RetryPolicy`])
//! - extracts JSON from whatever text the backend returned ([`extract()`])
//! - fails over to the other viable backends in order when the active one
//!   gives up, making the first one that succeeds the new active backend
//!
//! Backend configuration lives in [`OrchestratorSettings`] and is persisted
//! through a [`SettingsStore`].

pub mod backend;
pub mod error;
pub mod extract;
pub mod models;
pub mod orchestrator;
pub mod retry;
pub mod schema;
pub mod settings;
pub mod transport;

pub use backend::{
    BackendConfig, BackendKind, DEFAULT_NATIVE_MODEL, GenerationRequest, GenerationResult,
    RawOutput, Transport, TransportExecutor,
};
pub use error::{BackendFailure, GenerationError, SettingsError};
pub use extract::extract;
pub use models::ModelCatalog;
pub use orchestrator::Orchestrator;
pub use retry::{RetryPolicy, with_retry};
pub use schema::{Property, SchemaDescriptor, ShapeViolation};
pub use settings::{FileSettingsStore, MemorySettingsStore, OrchestratorSettings, SettingsStore};
pub use transport::HttpTransport;
