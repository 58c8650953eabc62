// Messaging between the UI, the engine thread and the status line

pub mod channels;
pub mod command;
pub mod notification;

pub use command::{EngineCommand, EngineEvent, EngineNotice};
pub use notification::{Notification, NotificationCategory, NotificationLevel};
