//! Engine message bus. Sensor batches, round commands, swing analyses and
//! alerts all travel as `EngineMessage` over one broadcast channel; actors
//! only ever hold a `BusSender`/`BusReceiver` pair.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::broadcast;

use swingsense::EngineMessage;

/// Messages buffered per subscriber. A subscriber that falls further behind
/// skips the oldest motion batches rather than stalling the sensors.
pub const BUS_CAPACITY: usize = 1024;

pub fn channel() -> broadcast::Sender<EngineMessage> {
    broadcast::channel(BUS_CAPACITY).0
}

// ---------------------------------------------------------------------------
// PollError
// ---------------------------------------------------------------------------

/// The receiving actor must stop: every sender is gone or the host raised
/// its shutdown flag.
#[derive(Debug, PartialEq, Eq)]
pub enum PollError {
    Shutdown,
}

// ---------------------------------------------------------------------------
// BusSender
// ---------------------------------------------------------------------------

/// Publishing half held by one actor. Every message leaves stamped with
/// that actor's ID, so the engine can tell which sensor a batch came from.
pub struct BusSender {
    actor_id: String,
    inner: broadcast::Sender<EngineMessage>,
    shutdown: Arc<AtomicBool>,
}

impl BusSender {
    pub fn new(
        actor_id: String,
        inner: broadcast::Sender<EngineMessage>,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            actor_id,
            inner,
            shutdown,
        }
    }

    pub fn actor_id(&self) -> &str {
        &self.actor_id
    }

    /// Publish, overwriting `source` with this actor's ID. Having no
    /// subscribers is not an error.
    pub fn send(&self, mut msg: EngineMessage) {
        msg.source = self.actor_id.clone();
        let _ = self.inner.send(msg);
    }

    /// Subscribe the same actor to the bus. The receiver stops when this
    /// sender's shutdown flag is raised.
    pub fn subscribe(&self) -> BusReceiver {
        BusReceiver {
            inner: self.inner.subscribe(),
            shutdown: Arc::clone(&self.shutdown),
        }
    }
}

impl Clone for BusSender {
    fn clone(&self) -> Self {
        Self {
            actor_id: self.actor_id.clone(),
            inner: self.inner.clone(),
            shutdown: Arc::clone(&self.shutdown),
        }
    }
}

// ---------------------------------------------------------------------------
// BusReceiver
// ---------------------------------------------------------------------------

/// Consuming half held by one actor. Dropping it unsubscribes.
pub struct BusReceiver {
    inner: broadcast::Receiver<EngineMessage>,
    shutdown: Arc<AtomicBool>,
}

impl BusReceiver {
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Next pending message without waiting, for the actors' poll loops.
    /// `Ok(None)` means nothing is queued yet.
    pub fn poll(&mut self) -> Result<Option<EngineMessage>, PollError> {
        if self.is_shutdown() {
            return Err(PollError::Shutdown);
        }
        loop {
            match self.inner.try_recv() {
                Ok(msg) => return Ok(Some(msg)),
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => return Err(PollError::Shutdown),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    tracing::warn!("bus: lagged, dropped {n} events");
                    continue;
                }
            }
        }
    }

    /// Wait for the next message. Only the bus closing ends the wait; the
    /// shutdown flag is checked before each receive.
    pub async fn recv(&mut self) -> Result<EngineMessage, PollError> {
        loop {
            if self.is_shutdown() {
                return Err(PollError::Shutdown);
            }
            match self.inner.recv().await {
                Ok(msg) => return Ok(msg),
                Err(broadcast::error::RecvError::Closed) => return Err(PollError::Shutdown),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("bus: lagged, dropped {n} events");
                }
            }
        }
    }
}

impl From<broadcast::Receiver<EngineMessage>> for BusReceiver {
    fn from(inner: broadcast::Receiver<EngineMessage>) -> Self {
        Self {
            inner,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swingsense::{AlertLevel, AlertMessage, EngineEvent, RoundCommandEvent};

    fn sender(id: &str, tx: &broadcast::Sender<EngineMessage>) -> BusSender {
        BusSender::new(id.into(), tx.clone(), Arc::new(AtomicBool::new(false)))
    }

    #[test]
    fn test_send_stamps_source() {
        let tx = channel();
        let a = sender("mock_sensor.0", &tx);
        let mut rx = a.subscribe();
        a.send(EngineMessage::new(RoundCommandEvent::SetRoundActive { active: true }).source("spoofed"));
        let msg = rx.poll().unwrap().unwrap();
        assert_eq!(msg.source, "mock_sensor.0");
        assert!(matches!(msg.event, EngineEvent::RoundCommand(_)));
        assert!(rx.poll().unwrap().is_none());
    }

    #[test]
    fn test_every_actor_sees_every_other_actors_messages() {
        let tx = channel();
        let sensor = sender("mock_sensor.0", &tx);
        let engine = sender("engine", &tx);
        let mut at_engine = engine.subscribe();
        let mut at_sensor = sensor.subscribe();

        sensor.send(EngineMessage::new(RoundCommandEvent::SetRoundActive { active: true }));
        engine.send(EngineMessage::new(AlertMessage {
            level: AlertLevel::Warn,
            message: "sensor unhealthy".into(),
        }));

        let sources = |rx: &mut BusReceiver| {
            std::iter::from_fn(|| rx.poll().unwrap())
                .map(|m| m.source)
                .collect::<Vec<_>>()
        };
        assert_eq!(sources(&mut at_engine), vec!["mock_sensor.0", "engine"]);
        assert_eq!(sources(&mut at_sensor), vec!["mock_sensor.0", "engine"]);
    }

    #[test]
    fn test_shutdown_flag_stops_poll() {
        let tx = channel();
        let shutdown = Arc::new(AtomicBool::new(false));
        let a = BusSender::new("engine".into(), tx.clone(), Arc::clone(&shutdown));
        let mut rx = a.subscribe();
        assert_eq!(rx.poll().unwrap().map(|m| m.source), None);
        shutdown.store(true, Ordering::Relaxed);
        assert_eq!(rx.poll().unwrap_err(), PollError::Shutdown);
    }

    #[test]
    fn test_lagged_receiver_keeps_newest() {
        let (tx, _) = broadcast::channel::<EngineMessage>(2);
        let a = sender("engine", &tx);
        let mut rx = a.subscribe();
        for i in 0..5 {
            a.send(EngineMessage::new(AlertMessage {
                level: AlertLevel::Warn,
                message: format!("alert {i}"),
            }));
        }
        let mut seen = Vec::new();
        while let Some(msg) = rx.poll().unwrap() {
            if let EngineEvent::Alert(alert) = msg.event {
                seen.push(alert.message);
            }
        }
        assert_eq!(seen, vec!["alert 3", "alert 4"]);
    }

    #[tokio::test]
    async fn test_recv_ends_when_bus_closes() {
        let tx = channel();
        let mut rx = BusReceiver::from(tx.subscribe());
        let a = sender("system", &tx);
        a.send(EngineMessage::new(RoundCommandEvent::SetRoundActive { active: false }));
        drop(a);
        drop(tx);
        assert_eq!(rx.recv().await.map(|m| m.source).unwrap(), "system");
        assert_eq!(rx.recv().await.unwrap_err(), PollError::Shutdown);
    }
}
