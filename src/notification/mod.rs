//! Notification payloads and the fan-out dispatcher.

mod dispatcher;
mod types;

pub use dispatcher::{DeliveryReport, NotificationDispatcher, PathReport};
pub use types::{NotificationPayload, NotificationTarget, PushAssets, PushNotificationEvent};
