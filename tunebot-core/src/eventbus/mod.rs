//! src/eventbus/mod.rs
//!
//! In-process event bus between the gateway runtime and the dispatcher.
//! Every subscriber gets its own bounded MPSC queue, so delivery is
//! guaranteed as long as the subscriber keeps its receiver alive.

use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};

use tunebot_common::models::discord::{InboundMessage, InboundReaction, VoicePresenceChange};

/// Everything the gateway runtime forwards to the rest of the bot.
#[derive(Debug, Clone)]
pub enum BotEvent {
    /// A text message posted in the guild.
    ChatMessage(InboundMessage),

    /// Someone added a reaction to a message.
    ReactionAdded(InboundReaction),

    /// A member left a voice channel (moved or disconnected).
    VoicePresence(VoicePresenceChange),

    /// Free-form lifecycle notes (gateway ready, reconnects, ...).
    SystemMessage(String),
}

impl BotEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            BotEvent::ChatMessage(_) => "chat_message",
            BotEvent::ReactionAdded(_) => "reaction_added",
            BotEvent::VoicePresence(_) => "voice_presence",
            BotEvent::SystemMessage(_) => "system_message",
        }
    }
}

/// Each subscriber gets its own `mpsc::Sender<BotEvent>`.
///
/// - If a subscriber's buffer fills, `publish` waits for space (backpressure).
/// - If a subscriber dropped its `Receiver`, sends to it fail and are skipped.
#[derive(Clone)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<mpsc::Sender<BotEvent>>>>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    pub shutdown_rx: watch::Receiver<bool>,
}

const DEFAULT_BUFFER_SIZE: usize = 1024;

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            subscribers: Arc::new(Mutex::new(vec![])),
            shutdown_tx: Arc::new(tx),
            shutdown_rx: rx,
        }
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    /// Returns a receiver on which events will be delivered.
    pub async fn subscribe(&self, buffer_size: Option<usize>) -> mpsc::Receiver<BotEvent> {
        let size = buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE);
        let (tx, rx) = mpsc::channel(size);
        let mut subs = self.subscribers.lock().await;
        subs.push(tx);
        rx
    }

    /// Publish an event to all subscribers.
    pub async fn publish(&self, event: BotEvent) {
        let senders = {
            let mut subs = self.subscribers.lock().await;
            subs.retain(|s| !s.is_closed());
            subs.clone()
        };
        for s in senders {
            let _ = s.send(event.clone()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{sleep, timeout, Duration};

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let bus = EventBus::new();

        let mut rx1 = bus.subscribe(Some(5)).await;
        let mut rx2 = bus.subscribe(Some(5)).await;

        bus.publish(BotEvent::SystemMessage("ready".into())).await;

        let evt1 = rx1.recv().await.expect("rx1 should get event");
        let evt2 = rx2.recv().await.expect("rx2 should get event");

        assert_eq!(evt1.event_type(), "system_message");
        assert_eq!(evt2.event_type(), "system_message");
    }

    #[tokio::test]
    async fn test_backpressure_blocking() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe(Some(1)).await;

        bus.publish(BotEvent::SystemMessage("msg1".into())).await;

        let handle = tokio::spawn(async move {
            sleep(Duration::from_millis(50)).await;
            let first = rx.recv().await.expect("expected first message");
            let second = rx.recv().await.expect("expected second message");
            (first, second)
        });

        // queue is full; this waits until the reader catches up
        let second_publish = bus.publish(BotEvent::SystemMessage("msg2".into()));
        let result = timeout(Duration::from_millis(500), second_publish).await;
        assert!(result.is_ok(), "publish should eventually unblock");

        let (evt1, evt2) = handle.await.unwrap();
        match (evt1, evt2) {
            (BotEvent::SystemMessage(a), BotEvent::SystemMessage(b)) => {
                assert_eq!(a, "msg1");
                assert_eq!(b, "msg2");
            }
            other => panic!("unexpected events: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_publish_is_pending_while_buffer_full() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe(Some(1)).await;
        bus.publish(BotEvent::SystemMessage("first".into())).await;

        let mut publish = tokio_test::task::spawn(bus.publish(BotEvent::SystemMessage("second".into())));
        tokio_test::assert_pending!(publish.poll());

        assert!(rx.recv().await.is_some());
        assert!(publish.is_woken());
        tokio_test::assert_ready!(publish.poll());
    }

    #[tokio::test]
    async fn test_dropped_subscriber_does_not_block_others() {
        let bus = EventBus::new();
        let rx_dropped = bus.subscribe(Some(1)).await;
        let mut rx = bus.subscribe(Some(1)).await;
        drop(rx_dropped);

        let publish = bus.publish(BotEvent::SystemMessage("hello".into()));
        assert!(timeout(Duration::from_millis(200), publish).await.is_ok());
        assert!(matches!(rx.recv().await, Some(BotEvent::SystemMessage(_))));
    }

    #[tokio::test]
    async fn test_shutdown_flag_is_shared_by_clones() {
        let bus = EventBus::new();
        let clone = bus.clone();
        let mut watcher = clone.shutdown_rx.clone();
        assert!(!clone.is_shutdown());

        bus.shutdown();
        watcher.changed().await.unwrap();
        assert!(*watcher.borrow());
        assert!(clone.is_shutdown());
    }
}
