//! Publish/subscribe boundary for battle events.
//!
//! The engine publishes through the `BattleBus` trait only; the in-process
//! implementation below is sufficient for a single instance, and the contract
//! does not assume same-process delivery if a real message broker is swapped
//! in later.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::domain::{BattleId, BattleMessage};

/// Per-battle capacity; slow subscribers that lag past this lose messages
/// rather than stalling the publisher.
const CHANNEL_CAPACITY: usize = 256;

/// Logical publish/subscribe channel set, one stream per battle.
#[async_trait]
pub trait BattleBus: Send + Sync {
    /// Publish a message on the battle's stream. Best-effort: publishing to a
    /// battle nobody listens to is not an error.
    async fn publish(&self, message: BattleMessage);

    /// Subscribe to a battle's stream.
    fn subscribe(&self, battle_id: &BattleId) -> broadcast::Receiver<BattleMessage>;

    /// Drop the battle's channel once it can no longer produce messages.
    fn close(&self, battle_id: &BattleId);
}

/// Single-process bus backed by tokio broadcast channels.
#[derive(Debug, Default)]
pub struct InProcessBus {
    channels: Mutex<HashMap<String, broadcast::Sender<BattleMessage>>>,
}

impl InProcessBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn sender(&self, battle_id: &BattleId) -> broadcast::Sender<BattleMessage> {
        let mut channels = self.channels.lock().expect("bus lock poisoned");
        channels
            .entry(battle_id.as_str().to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }
}

#[async_trait]
impl BattleBus for InProcessBus {
    async fn publish(&self, message: BattleMessage) {
        let sender = self.sender(message.battle_id());
        // Err means no live subscribers; nothing to deliver.
        let _ = sender.send(message);
    }

    fn subscribe(&self, battle_id: &BattleId) -> broadcast::Receiver<BattleMessage> {
        self.sender(battle_id).subscribe()
    }

    fn close(&self, battle_id: &BattleId) {
        self.channels
            .lock()
            .expect("bus lock poisoned")
            .remove(battle_id.as_str());
    }
}
