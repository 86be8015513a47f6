//! In-process realtime channel.
//!
//! A [`RealtimeChannel`] over `tokio::sync::broadcast`, used for local
//! composition and tests. It deliberately mirrors the semantics the core
//! assumes of a real transport: at-most-once delivery per message, no
//! ordering across senders, and the sender's own publish echoed back to its
//! own subscription (the orchestrator de-duplicates by message id).

use async_trait::async_trait;
use codev_core::Result;
use codev_core::message::ChatMessage;
use codev_core::service::{ChannelEvent, RealtimeChannel};
use std::collections::HashMap;
use tokio::sync::{Mutex, broadcast, mpsc};
use tracing::warn;

const TOPIC_CAPACITY: usize = 256;

/// Broadcast-based in-process channel.
#[derive(Default)]
pub struct InProcessChannel {
    topics: Mutex<HashMap<String, broadcast::Sender<ChatMessage>>>,
}

impl InProcessChannel {
    pub fn new() -> Self {
        Self::default()
    }

    async fn topic_sender(&self, topic: &str) -> broadcast::Sender<ChatMessage> {
        let mut topics = self.topics.lock().await;
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .clone()
    }
}

#[async_trait]
impl RealtimeChannel for InProcessChannel {
    async fn publish(&self, topic: &str, message: &ChatMessage) -> Result<()> {
        let sender = self.topic_sender(topic).await;
        // No subscribers is not a delivery failure; the message is simply
        // not observed by anyone.
        let _ = sender.send(message.clone());
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<mpsc::UnboundedReceiver<ChannelEvent>> {
        let mut broadcast_rx = self.topic_sender(topic).await.subscribe();
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            loop {
                match broadcast_rx.recv().await {
                    Ok(message) => {
                        if tx.send(ChannelEvent::Message(message)).is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "subscriber lagged, messages dropped");
                        let _ = tx.send(ChannelEvent::DeliveryError(format!(
                            "{} messages dropped",
                            missed
                        )));
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Ok(rx)
    }
}
