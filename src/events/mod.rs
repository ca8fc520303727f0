//! Event system for session lifecycle transitions.
//!
//! Events are fired from every mutating lifecycle operation. If no
//! listeners are registered, they are silently ignored (zero overhead).
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use gatehouse::register_event_listeners;
//! use gatehouse::events::listeners::LoggingListener;
//!
//! fn main() {
//!     // register listeners at startup
//!     register_event_listeners(|registry| {
//!         registry.listen(LoggingListener::new());
//!     });
//!
//!     // lifecycle events will now be logged
//! }
//! ```
//!
//! # Custom Listeners
//!
//! Implement the [`Listener`] trait to create custom event handlers:
//!
//! ```rust,ignore
//! use gatehouse::events::{Listener, SessionEvent};
//! use async_trait::async_trait;
//!
//! struct MetricsListener;
//!
//! #[async_trait]
//! impl Listener for MetricsListener {
//!     async fn handle(&self, event: &SessionEvent) {
//!         if let SessionEvent::Expired { .. } = event {
//!             // increment lazy-expiry counter
//!         }
//!     }
//! }
//! ```

mod event;
mod listener;
mod registry;

pub mod listeners;

pub use event::SessionEvent;
pub use listener::Listener;
pub use registry::{dispatch, register_event_listeners};
