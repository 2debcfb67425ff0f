use std::sync::Arc;

use axum::body::Bytes;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::connection_manager::{ConnectionRegistry, OutboundFrame};
use crate::metrics::DeliveryMetrics;
use crate::push::PushSender;
use crate::subscription::SubscriptionStore;

use super::{NotificationPayload, NotificationTarget, PushAssets, PushNotificationEvent};

/// Outcome counts for one transport
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PathReport {
    pub delivered: usize,
    pub failed: usize,
    /// Recipient had no connection / no subscription on this path
    pub skipped: usize,
}

impl PathReport {
    fn delivered() -> Self {
        Self {
            delivered: 1,
            ..Default::default()
        }
    }

    fn failed() -> Self {
        Self {
            failed: 1,
            ..Default::default()
        }
    }

    fn skipped() -> Self {
        Self {
            skipped: 1,
            ..Default::default()
        }
    }

    fn record(&mut self, ok: bool) {
        if ok {
            self.delivered += 1;
        } else {
            self.failed += 1;
        }
    }
}

/// Result of a dispatch across both transports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub live: PathReport,
    pub push: PathReport,
}

/// Wire forms of one payload, encoded once per dispatch
struct Encoded {
    live: OutboundFrame,
    push: Bytes,
}

/// Fans a notification out to live connections and Web Push subscriptions.
///
/// The two transports are independent: a failure or miss on one never
/// affects the other, and a failing recipient never aborts the rest.
pub struct NotificationDispatcher {
    registry: Arc<ConnectionRegistry>,
    subscriptions: Arc<dyn SubscriptionStore>,
    push: Arc<dyn PushSender>,
    assets: PushAssets,
}

impl NotificationDispatcher {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        subscriptions: Arc<dyn SubscriptionStore>,
        push: Arc<dyn PushSender>,
        assets: PushAssets,
    ) -> Self {
        Self {
            registry,
            subscriptions,
            push,
            assets,
        }
    }

    /// Start delivery in the background and return immediately.
    pub fn dispatch(
        self: &Arc<Self>,
        payload: NotificationPayload,
        target: NotificationTarget,
    ) -> JoinHandle<DeliveryReport> {
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move { dispatcher.deliver(&payload, target).await })
    }

    /// Run a dispatch to completion.
    #[tracing::instrument(
        name = "dispatcher.deliver",
        skip(self, payload, target),
        fields(target = %target)
    )]
    pub async fn deliver(
        &self,
        payload: &NotificationPayload,
        target: NotificationTarget,
    ) -> DeliveryReport {
        let encoded = match self.encode(payload) {
            Ok(encoded) => encoded,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize notification");
                return DeliveryReport::default();
            }
        };

        let report = match target {
            NotificationTarget::User(ref user_id) => {
                DeliveryMetrics::record_user_dispatch();
                let (live, push) = tokio::join!(
                    self.live_to_user(user_id, &encoded.live),
                    self.push_to_user(user_id, &encoded.push),
                );
                DeliveryReport { live, push }
            }
            NotificationTarget::All => {
                DeliveryMetrics::record_broadcast_dispatch();
                let (live, push) = tokio::join!(
                    self.live_to_all(&encoded.live),
                    self.push_to_all(&encoded.push),
                );
                DeliveryReport { live, push }
            }
        };

        tracing::debug!(
            live_delivered = report.live.delivered,
            live_failed = report.live.failed,
            push_delivered = report.push.delivered,
            push_failed = report.push.failed,
            "Dispatch finished"
        );
        report
    }

    fn encode(&self, payload: &NotificationPayload) -> Result<Encoded, serde_json::Error> {
        let live = serde_json::to_string(payload)?;
        let push = serde_json::to_vec(&PushNotificationEvent::new(payload, &self.assets))?;
        Ok(Encoded {
            live: OutboundFrame::text(live),
            push: Bytes::from(push),
        })
    }

    async fn live_to_user(&self, user_id: &str, frame: &OutboundFrame) -> PathReport {
        let Some(handle) = self.registry.lookup(user_id) else {
            tracing::debug!(user_id = %user_id, "No live connection");
            DeliveryMetrics::record_live("skipped");
            return PathReport::skipped();
        };

        match handle.send(frame.clone()).await {
            Ok(()) => {
                DeliveryMetrics::record_live("delivered");
                PathReport::delivered()
            }
            Err(e) => {
                tracing::warn!(
                    user_id = %user_id,
                    connection_id = %handle.id,
                    error = %e,
                    "Live delivery failed"
                );
                DeliveryMetrics::record_live("failed");
                PathReport::failed()
            }
        }
    }

    async fn push_to_user(&self, user_id: &str, body: &Bytes) -> PathReport {
        let record = match self.subscriptions.get(user_id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::debug!(user_id = %user_id, "No push subscription");
                DeliveryMetrics::record_push("skipped");
                return PathReport::skipped();
            }
            Err(e) => {
                tracing::error!(user_id = %user_id, error = %e, "Failed to load push subscription");
                DeliveryMetrics::record_push("failed");
                return PathReport::failed();
            }
        };

        match self.push.send(body, &record).await {
            Ok(()) => {
                DeliveryMetrics::record_push("delivered");
                PathReport::delivered()
            }
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Push delivery failed");
                DeliveryMetrics::record_push("failed");
                PathReport::failed()
            }
        }
    }

    /// One task per live connection, against a registry snapshot.
    async fn live_to_all(&self, frame: &OutboundFrame) -> PathReport {
        let mut sends: FuturesUnordered<_> = self
            .registry
            .snapshot()
            .into_iter()
            .map(|handle| {
                let frame = frame.clone();
                tokio::spawn(async move {
                    match handle.send(frame).await {
                        Ok(()) => true,
                        Err(e) => {
                            tracing::warn!(
                                user_id = %handle.user_id,
                                connection_id = %handle.id,
                                error = %e,
                                "Live delivery failed"
                            );
                            false
                        }
                    }
                })
            })
            .collect();

        let mut report = PathReport::default();
        while let Some(result) = sends.next().await {
            let ok = result.unwrap_or(false);
            DeliveryMetrics::record_live(if ok { "delivered" } else { "failed" });
            report.record(ok);
        }
        report
    }

    /// One task per stored subscription, spawned as the store is walked.
    async fn push_to_all(&self, body: &Bytes) -> PathReport {
        let mut report = PathReport::default();
        let mut sends = FuturesUnordered::new();
        let mut records = self.subscriptions.iter_all();

        while let Some(entry) = records.next().await {
            let (user_id, record) = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to read push subscriptions");
                    DeliveryMetrics::record_push("failed");
                    report.failed += 1;
                    continue;
                }
            };

            let push = Arc::clone(&self.push);
            let body = body.clone();
            sends.push(tokio::spawn(async move {
                match push.send(&body, &record).await {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::warn!(user_id = %user_id, error = %e, "Push delivery failed");
                        false
                    }
                }
            }));
        }

        while let Some(result) = sends.next().await {
            let ok = result.unwrap_or(false);
            DeliveryMetrics::record_push(if ok { "delivered" } else { "failed" });
            report.record(ok);
        }
        report
    }
}
