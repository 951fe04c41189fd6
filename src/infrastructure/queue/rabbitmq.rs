use anyhow::{anyhow, Result};
use async_trait::async_trait;
use lapin::{options::*, types::FieldTable, Channel, Connection, ConnectionProperties};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::channel::{NotificationChannel, RawMessage};

/// The live channel together with a counter bumped on every reconnect.
struct Session {
    channel: Channel,
    generation: u64,
}

#[derive(Clone)]
pub struct RabbitMqService {
    url: String,
    conn: Arc<Mutex<Connection>>,
    session: Arc<Mutex<Session>>,
}

impl RabbitMqService {
    async fn connect(url: &str) -> Result<(Connection, Channel)> {
        info!("Connecting to RabbitMQ");
        let conn = Connection::connect(url, ConnectionProperties::default())
            .await
            .map_err(|e| anyhow!("Failed to connect to RabbitMQ: {}", e))?;

        let channel = conn
            .create_channel()
            .await
            .map_err(|e| anyhow!("Failed to create channel: {}", e))?;

        info!("Connected to RabbitMQ");
        Ok((conn, channel))
    }

    pub async fn new(url: &str) -> Result<Self> {
        let (conn, channel) = Self::connect(url).await?;

        Ok(Self {
            url: url.to_string(),
            conn: Arc::new(Mutex::new(conn)),
            session: Arc::new(Mutex::new(Session { channel, generation: 0 })),
        })
    }

    async fn reconnect(&self) -> Result<()> {
        warn!("RabbitMQ connection dropped, reconnecting...");
        let (conn, channel) = Self::connect(&self.url).await?;
        *self.conn.lock().await = conn;

        let mut session = self.session.lock().await;
        session.channel = channel;
        session.generation += 1;
        Ok(())
    }

    pub async fn declare_queue(&self, queue: &str) -> Result<()> {
        self.session
            .lock()
            .await
            .channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| anyhow!("Failed to declare queue: {}", e))?;

        Ok(())
    }

    async fn get_batch(&self, queue: &str, max_messages: usize) -> Result<Vec<RawMessage>> {
        let session = self.session.lock().await;
        let mut batch = Vec::new();

        while batch.len() < max_messages {
            let message = session
                .channel
                .basic_get(queue, BasicGetOptions::default())
                .await
                .map_err(|e| anyhow!("Failed to fetch from '{}': {}", queue, e))?;

            match message {
                Some(message) => batch.push(RawMessage {
                    delivery_tag: message.delivery_tag,
                    generation: session.generation,
                    body: message.data.clone(),
                }),
                None => break,
            }
        }

        Ok(batch)
    }

    async fn ack(&self, message: &RawMessage) -> Result<()> {
        let session = self.session.lock().await;

        // Tags from a replaced channel mean nothing on the new one, and acking
        // them would close it. The broker redelivers those messages anyway.
        if is_stale(session.generation, message) {
            debug!(
                delivery_tag = message.delivery_tag,
                generation = message.generation,
                current = session.generation,
                "Skipping ack for a delivery from a previous connection"
            );
            return Ok(());
        }

        session
            .channel
            .basic_ack(message.delivery_tag, BasicAckOptions::default())
            .await
            .map_err(|e| anyhow!("Failed to ack delivery {}: {}", message.delivery_tag, e))
    }
}

fn is_stale(current_generation: u64, message: &RawMessage) -> bool {
    message.generation != current_generation
}

/// Job-status notifications read from a RabbitMQ queue.
///
/// Messages are fetched with `basic_get` and stay unacknowledged until
/// [`NotificationChannel::delete`] acks them.
#[derive(Clone)]
pub struct RabbitMqNotificationChannel {
    service: RabbitMqService,
    queue: String,
    batch_size: usize,
}

impl RabbitMqNotificationChannel {
    pub async fn new(service: RabbitMqService, queue: &str, batch_size: usize) -> Result<Self> {
        service.declare_queue(queue).await?;
        info!("Listening for job notifications on '{}'", queue);

        Ok(Self {
            service,
            queue: queue.to_string(),
            batch_size: batch_size.max(1),
        })
    }
}

#[async_trait]
impl NotificationChannel for RabbitMqNotificationChannel {
    async fn receive(&self) -> Result<Vec<RawMessage>> {
        match self.service.get_batch(&self.queue, self.batch_size).await {
            Ok(batch) => Ok(batch),
            Err(e) => {
                // Unacked deliveries on the dead channel are redelivered later.
                if let Err(reconnect_err) = self.service.reconnect().await {
                    warn!("RabbitMQ reconnect failed: {}", reconnect_err);
                }
                Err(e)
            }
        }
    }

    async fn delete(&self, message: &RawMessage) -> Result<()> {
        self.service.ack(message).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delivery(delivery_tag: u64, generation: u64) -> RawMessage {
        RawMessage {
            delivery_tag,
            generation,
            body: Vec::new(),
        }
    }

    #[test]
    fn deliveries_from_the_current_connection_are_acked() {
        assert!(!is_stale(0, &delivery(1, 0)));
        assert!(!is_stale(3, &delivery(7, 3)));
    }

    #[test]
    fn deliveries_from_a_replaced_connection_are_skipped() {
        // Issued on the first connection.
        assert!(is_stale(2, &delivery(1, 0)));
        assert!(is_stale(1, &delivery(1, 0)));
    }
}
