mod http;

pub use http::{
    add_push_subscription, broadcast_notification, send_notifications, BroadcastRequest,
    MessageResponse, NotificationRequest, PushSubscriptionKeys, PushSubscriptionQuery,
    PushSubscriptionRequest,
};
