//! Change-driven resolution loop, one per connected participant.

use log::{error, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{
    self,
    error::{RecvError, TryRecvError},
};
use tokio::task::JoinHandle;

use crate::services::{error::GameError, phase_machine::PhaseMachine};
use crate::store::{DocumentStore, StoreEvent};

pub struct PhaseObserver {
    machine: PhaseMachine,
    store: Arc<dyn DocumentStore>,
    debounce: Duration,
}

/// Stops the observer when dropped.
pub struct ObserverHandle {
    task: JoinHandle<()>,
}

impl ObserverHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for ObserverHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl PhaseObserver {
    pub fn new(store: Arc<dyn DocumentStore>, debounce: Duration) -> Self {
        Self {
            machine: PhaseMachine::new(store.clone()),
            store,
            debounce,
        }
    }

    /// Subscribes before returning, so no change committed after this call is missed.
    pub async fn spawn(self, room_id: String) -> ObserverHandle {
        let rx = self.store.subscribe(&room_id).await;
        let task = tokio::spawn(async move { self.run(room_id, rx).await });
        ObserverHandle { task }
    }

    async fn run(self, room_id: String, mut rx: broadcast::Receiver<StoreEvent>) {
        if !self.evaluate(&room_id).await {
            return;
        }
        loop {
            match rx.recv().await {
                Ok(_) => {}
                Err(RecvError::Lagged(missed)) => {
                    warn!("observer for room {} lagged by {} events", room_id, missed);
                }
                Err(RecvError::Closed) => break,
            }

            // let sibling writes land, then fold everything queued meanwhile into one pass
            tokio::time::sleep(self.debounce).await;
            loop {
                match rx.try_recv() {
                    Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Closed) => return,
                }
            }

            if !self.evaluate(&room_id).await {
                break;
            }
        }
    }

    // false once the room is gone
    async fn evaluate(&self, room_id: &str) -> bool {
        match self.machine.settle(room_id).await {
            Ok(_) => true,
            Err(GameError::NotFound(_)) => false,
            Err(e) => {
                error!("observer for room {}: resolution failed: {}", room_id, e);
                true
            }
        }
    }
}
