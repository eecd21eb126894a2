//! Routing core for notebridge.
//!
//! Decouples one inbound [`MessageSource`](notebridge_core::MessageSource)
//! from any number of [`NoteBackend`](notebridge_core::NoteBackend)s:
//!
//! - **filter** picks the backends a message goes to, by start-word.
//! - **router** owns the routing table, fans messages out, aggregates
//!   pending-note listings and deletes completed notes on request.

pub mod filter;
pub mod router;

pub use filter::select_targets;
pub use router::{BackendCleanup, BackendRegistration, CleanupReport, NotesRouter};
