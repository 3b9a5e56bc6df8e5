//! bindtrace-core: structured trace events for runtime assembly binding.
//!
//! The crate observes, and never performs, module resolution. A resolver
//! wraps its work in two scoped trackers:
//!
//! - [`BindOperation`] brackets one load request with a start/stop event pair
//! - [`ResolutionAttempt`] reports every resolution stage the resolver enters
//!
//! plus the stateless [`path_probed`] for individual filesystem probes.
//!
//! Both trackers emit from `Drop`, so each logical unit of work produces its
//! events exactly once on every exit path. Whether a category is collected
//! is asked once per tracker; when the answer is no, the tracker does no
//! further work.
//!
//! ```text
//! BindOperation ──────────────────────────────────────────── bind_start / bind_stop
//!   └── ResolutionAttempt
//!         ├── go_to_stage(FindInLoadContext)
//!         ├── go_to_stage(AssemblyLoadContextLoad) ───────── resolution_attempted (previous)
//!         ├── go_to_stage(PlatformAssemblies) ────────────── resolution_attempted (previous)
//!         │     └── path_probed(...) ─────────────────────── path_probed
//!         └── drop ───────────────────────────────────────── resolution_attempted (last)
//! ```

pub mod bind;
pub mod config;
pub mod error;
pub mod event;
pub mod gate;
pub mod identity;
pub mod probe;
pub mod request;
pub mod resolution;
pub mod sink;
pub mod status;
pub mod tracer;

pub use bind::{BindFilter, BindOperation, TraceAllBinds};
pub use config::TraceConfig;
pub use error::{BindTraceError, Result};
pub use event::{
    BindStartEvent, BindStopEvent, BinderEvent, PathProbedEvent, ResolutionAttemptedEvent,
};
pub use gate::{CategoryGate, EnablementGate, EventCategory};
pub use identity::{AssemblyIdentity, DefaultIdentityPolicy, IdentityPolicy, Version};
pub use probe::{path_probed, PathSource};
pub use request::{AssemblySpec, BindRequest, LoadContext, LoadContextId, LoadedAssembly};
pub use resolution::{classify, ResolutionAttempt, ResolutionResult, Stage};
pub use sink::{EventSink, JsonLinesSink, MemorySink, NullSink, TracingSink};
pub use status::StatusCode;
pub use tracer::BinderTracer;
