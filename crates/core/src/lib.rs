//! # notebridge core
//!
//! Domain types, traits, and error definitions for notebridge, the bridge
//! between a chat message source and one or more note-taking backends.
//! This crate performs no I/O: it defines the contracts that the router,
//! the backend adapters and the message sources implement against.
//!
//! ## Seams
//!
//! - [`NoteBackend`]: one note-storage integration (Notion, Teamly, ...).
//! - [`MessageSource`]: an inbound chat platform that invokes callbacks.
//! - [`Transcriber`]: speech-to-text used by voice-capable sources.

pub mod channel;
pub mod error;
pub mod note;
pub mod speech;

pub use channel::{CreateHandler, ListHandler, MessageSource};
pub use error::{BackendError, ChannelError, Error, Result, TranscriptionError};
pub use note::{Note, NoteBackend, NoteId};
pub use speech::Transcriber;
