use async_trait::async_trait;
use web_push::{
    ContentEncoding, HyperWebPushClient, PartialVapidSignatureBuilder, SubscriptionInfo, Urgency,
    VapidSignatureBuilder, WebPushClient, WebPushMessage, WebPushMessageBuilder, URL_SAFE_NO_PAD,
};

use crate::config::PushConfig;
use crate::subscription::SubscriptionRecord;

use super::{PushError, PushSender};

/// VAPID-signed Web Push over HTTPS.
///
/// The private key is parsed once; each send clones the partial signer and
/// binds it to the recipient's endpoint.
pub struct WebPushSender {
    client: HyperWebPushClient,
    signer: PartialVapidSignatureBuilder,
    subscriber: String,
}

impl WebPushSender {
    pub fn new(config: &PushConfig) -> Result<Self, PushError> {
        let signer =
            VapidSignatureBuilder::from_base64_no_sub(&config.vapid_private_key, URL_SAFE_NO_PAD)
                .map_err(PushError::InvalidKey)?;

        Ok(Self {
            client: HyperWebPushClient::new(),
            signer,
            subscriber: config.subscriber.clone(),
        })
    }
}

impl WebPushSender {
    /// Encrypt and sign `payload` for one subscription.
    fn message(
        &self,
        payload: &[u8],
        record: &SubscriptionRecord,
    ) -> Result<WebPushMessage, PushError> {
        let info = SubscriptionInfo::new(
            record.endpoint.as_str(),
            record.keys.p256dh.as_str(),
            record.keys.auth.as_str(),
        );

        let mut signature = self.signer.clone().add_sub_info(&info);
        signature.add_claim("sub", self.subscriber.as_str());
        let signature = signature.build()?;

        let mut builder = WebPushMessageBuilder::new(&info);
        builder.set_payload(ContentEncoding::Aes128Gcm, payload);
        builder.set_urgency(Urgency::Normal);
        builder.set_vapid_signature(signature);
        Ok(builder.build()?)
    }
}

#[async_trait]
impl PushSender for WebPushSender {
    async fn send(&self, payload: &[u8], record: &SubscriptionRecord) -> Result<(), PushError> {
        let message = self.message(payload, record)?;
        self.client.send(message).await?;

        tracing::debug!(endpoint = %record.endpoint, "Push notification sent");
        Ok(())
    }
}
