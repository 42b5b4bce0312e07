//! Language-server port.
//!
//! The enricher only needs hover/definition at a position plus lifecycle.
//! Transport details (stdio daemon, socket) stay behind the trait; requests
//! are serialized by the adapter and demultiplexed by request id.

use crate::shared::models::Result;
use async_trait::async_trait;

/// Lifecycle of one LSP client.
///
/// `Starting → Active` requires the initialize response; any transport error
/// forces `Stopped`, after which the enricher continues without LSP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LspState {
    Unstarted,
    Starting,
    Initialized,
    Active,
    Draining,
    Stopped,
}

#[async_trait]
pub trait LspPort: Send + Sync {
    /// Perform the initialize handshake.
    async fn initialize(&self) -> Result<()>;

    /// Announce a file once per session before querying positions in it.
    async fn did_open(&self, file_path: &str, source: &str) -> Result<()>;

    /// Hover text at `(line, col)` (1-based line, 0-based col), if the
    /// server knows one.
    async fn hover(&self, file_path: &str, line: u32, col: u32) -> Result<Option<String>>;

    /// Definition location rendered as `file:line:col`, if resolvable.
    async fn definition(&self, file_path: &str, line: u32, col: u32) -> Result<Option<String>>;

    /// Graceful shutdown (`Active → Draining → Stopped`).
    async fn shutdown(&self) -> Result<()>;
}
