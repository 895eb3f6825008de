mod bus;
mod handlers;
mod types;

pub use bus::{EventBus, EventReceiver};
pub use handlers::{LoggingEventHandler, NotificationHandler};
pub use types::{EventSequence, QueueEvent, QueueEventPayload, RejectionReason};
