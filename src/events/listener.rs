use async_trait::async_trait;

use super::SessionEvent;

/// Trait for handling session lifecycle events asynchronously.
///
/// Implement this trait to create custom event listeners. Listeners can
/// perform any async operation: logging, metrics, audit trails, etc.
///
/// # Example
///
/// ```rust,ignore
/// use gatehouse::events::{Listener, SessionEvent};
/// use async_trait::async_trait;
///
/// struct AuditListener {
///     sink: AuditSink,
/// }
///
/// #[async_trait]
/// impl Listener for AuditListener {
///     async fn handle(&self, event: &SessionEvent) {
///         if let SessionEvent::AllRevoked { user_id, revoked, .. } = event {
///             // record the purge
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Listener: Send + Sync + 'static {
    /// Handle a session lifecycle event.
    ///
    /// This method is called for every event dispatched. Filter by matching
    /// on the event variant to handle specific events.
    async fn handle(&self, event: &SessionEvent);
}
