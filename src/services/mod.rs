//! External collaborators: the chain provider, the webhook notification
//! sender and the event monitor forwarder.

pub mod event_monitor;
pub mod notification;
pub mod provider;

pub use event_monitor::*;
pub use notification::*;
pub use provider::*;
