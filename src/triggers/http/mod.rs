//! HTTP notification trigger handlers
//!
//! Admin endpoints that feed the dispatcher and the subscription store:
//! - Targeted notifications (`POST /send`)
//! - Broadcast notifications (`POST /broadcast`)
//! - Push subscription registration (`POST /push-subscription`)

mod handlers;
mod models;

pub use handlers::{add_push_subscription, broadcast_notification, send_notifications};

pub use models::{
    BroadcastRequest, MessageResponse, NotificationRequest, PushSubscriptionKeys,
    PushSubscriptionQuery, PushSubscriptionRequest,
};
