//! Change notification bus.
//!
//! # Data Flow
//! ```text
//! SessionManager (after releasing its state lock)
//!     → ChangeNotifier::publish(ChangeEvent)
//!     → handlers, synchronously, in registration order
//! ```
//!
//! # Design Decisions
//! - Subscribing and unsubscribing are explicit; dropping a handle keeps the subscription
//! - A panicking handler never reaches the publisher
//! - A handler removed mid-dispatch is not invoked for the rest of that dispatch

pub mod bus;
pub mod event;

pub use bus::{ChangeNotifier, EventHandler, SubscriptionHandle};
pub use event::ChangeEvent;
