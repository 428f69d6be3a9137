//! In-process pub/sub for trade changes. Widgets used to re-fetch after every
//! write; the bus lets interested parties (here, the stats cache) react once
//! per change instead. Delivery is best-effort and unordered.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::broadcast;

/// Identical (kind, user) events inside this window are dropped.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeEventKind {
    Created,
    Updated,
    Deleted,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeEvent {
    pub kind: TradeEventKind,
    pub trade_id: String,
    pub user_id: String,
    pub at: i64,
}

struct LastNotify {
    kind: TradeEventKind,
    user_id: String,
    at: Instant,
}

pub struct TradeUpdateBus {
    tx: broadcast::Sender<TradeEvent>,
    last: Mutex<Option<LastNotify>>,
}

impl Default for TradeUpdateBus {
    fn default() -> Self {
        Self::new()
    }
}

impl TradeUpdateBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        TradeUpdateBus {
            tx,
            last: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TradeEvent> {
        self.tx.subscribe()
    }

    /// Publishes unless an identical notification fired within the debounce
    /// window. Returns whether the event went out. "No receivers" is not an
    /// error; notifications are best-effort.
    pub fn notify(&self, kind: TradeEventKind, trade_id: &str, user_id: &str) -> bool {
        {
            let mut last = match self.last.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if let Some(prev) = last.as_ref() {
                if prev.kind == kind
                    && prev.user_id == user_id
                    && prev.at.elapsed() < DEBOUNCE_WINDOW
                {
                    log::debug!("debounced {:?} notification for {}", kind, user_id);
                    return false;
                }
            }
            *last = Some(LastNotify {
                kind,
                user_id: user_id.to_string(),
                at: Instant::now(),
            });
        }

        let event = TradeEvent {
            kind,
            trade_id: trade_id.to_string(),
            user_id: user_id.to_string(),
            at: chrono::Utc::now().timestamp(),
        };
        let _ = self.tx.send(event);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_event() {
        let bus = TradeUpdateBus::new();
        let mut rx = bus.subscribe();
        assert!(bus.notify(TradeEventKind::Created, "TRADE-1", "USER-1"));
        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, TradeEventKind::Created);
        assert_eq!(event.trade_id, "TRADE-1");
    }

    #[tokio::test]
    async fn identical_events_are_debounced() {
        let bus = TradeUpdateBus::new();
        let mut rx = bus.subscribe();
        assert!(bus.notify(TradeEventKind::Updated, "TRADE-1", "USER-1"));
        assert!(!bus.notify(TradeEventKind::Updated, "TRADE-2", "USER-1"));
        // Only the first made it onto the channel.
        assert!(rx.recv().await.is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn different_kind_or_user_passes_through() {
        let bus = TradeUpdateBus::new();
        assert!(bus.notify(TradeEventKind::Updated, "TRADE-1", "USER-1"));
        assert!(bus.notify(TradeEventKind::Deleted, "TRADE-1", "USER-1"));
        assert!(bus.notify(TradeEventKind::Deleted, "TRADE-1", "USER-2"));
    }

    #[test]
    fn notify_without_receivers_is_fine() {
        let bus = TradeUpdateBus::new();
        assert!(bus.notify(TradeEventKind::Created, "TRADE-1", "USER-1"));
    }
}
