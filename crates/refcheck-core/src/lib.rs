//! Building blocks shared by the key validation engine: the file-type
//! dependency graph, per-run key digests, and cooperative cancellation.

pub mod cancel;
pub mod digest;
pub mod graph;
pub mod redact;

pub use cancel::{CancellationToken, Cancelled};
pub use digest::{Duplicate, EncounteredKeys, KeyOrigin, KeySink, PrimaryKeySet};
pub use graph::{DependencyGraph, DirectedGraph, RelationEdge};
pub use redact::{REDACTED_VALUE, key_logging_enabled, redact_key, set_key_logging};
