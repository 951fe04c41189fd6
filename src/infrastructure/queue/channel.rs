use anyhow::Result;
use async_trait::async_trait;

/// One message as retrieved from a notification channel.
#[derive(Debug, Clone)]
pub struct RawMessage {
    /// Receipt used to delete the message once it has been consumed.
    pub delivery_tag: u64,
    /// Connection the receipt belongs to. Receipts are only valid on the
    /// connection that issued them.
    pub generation: u64,
    pub body: Vec<u8>,
}

/// At-least-once source of job-status notifications.
///
/// `receive` returns whatever is available right now, in channel order, and
/// may return an empty batch.
#[async_trait]
pub trait NotificationChannel: Send + Sync + 'static {
    async fn receive(&self) -> Result<Vec<RawMessage>>;

    async fn delete(&self, message: &RawMessage) -> Result<()>;
}
