//! MessageSource trait: the abstraction over inbound chat platforms.
//!
//! A message source connects notebridge to a platform (Telegram, an
//! in-process queue, ...). It owns everything platform-specific, such as
//! authentication, access control and voice-to-text, and hands plain text
//! to the callbacks registered here.

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::error::Result;

/// Callback invoked with the text of every accepted inbound message.
pub type CreateHandler = Arc<dyn Fn(String) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Callback invoked when a user asks for the pending-notes report.
pub type ListHandler = Arc<dyn Fn() -> BoxFuture<'static, Result<String>> + Send + Sync>;

/// The core MessageSource trait.
///
/// Registering a handler replaces any handler registered before it.
pub trait MessageSource: Send + Sync {
    /// Human-readable source name (e.g., "telegram", "local").
    fn name(&self) -> &str;

    /// Route new-note messages to `handler`.
    fn register_create_handler(&self, handler: CreateHandler);

    /// Route pending-notes requests to `handler`.
    fn register_list_handler(&self, handler: ListHandler);
}
