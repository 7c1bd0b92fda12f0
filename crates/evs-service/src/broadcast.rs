//! Status listener registry and fan-out

use std::collections::HashMap;

use evs_core::ServiceStatus;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Identity of a registered status listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(Uuid);

/// A registered listener's subscription.
///
/// Keep the receiver alive to stay registered; dropping it lets the
/// broadcaster prune the entry on the next broadcast.
pub struct StatusSubscription {
    pub id: ListenerId,
    pub rx: mpsc::UnboundedReceiver<ServiceStatus>,
}

/// Fan-out notifier for subscribers interested in state changes.
///
/// Delivery is fire-and-forget per listener: a slow or dead subscriber can
/// neither block the arbiter nor delay delivery to the rest.
#[derive(Default)]
pub(crate) struct StatusBroadcaster {
    listeners: RwLock<HashMap<ListenerId, mpsc::UnboundedSender<ServiceStatus>>>,
}

impl StatusBroadcaster {
    pub fn register(&self) -> StatusSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = ListenerId(Uuid::new_v4());
        let count = {
            let mut listeners = self.listeners.write();
            listeners.insert(id, tx);
            listeners.len()
        };
        debug!(listener_count = count, "Status listener registered");
        StatusSubscription { id, rx }
    }

    pub fn unregister(&self, id: ListenerId) {
        if self.listeners.write().remove(&id).is_some() {
            debug!("Status listener unregistered");
        }
    }

    pub fn broadcast(&self, status: ServiceStatus) {
        let dead: Vec<ListenerId> = {
            let listeners = self.listeners.read();
            listeners
                .iter()
                .filter(|(_, tx)| tx.send(status).is_err())
                .map(|(id, _)| *id)
                .collect()
        };

        if !dead.is_empty() {
            let mut listeners = self.listeners.write();
            for id in dead {
                listeners.remove(&id);
                warn!("Status listener has died, pruning");
            }
        }
    }

    pub fn clear(&self) {
        self.listeners.write().clear();
    }

    #[cfg(test)]
    pub fn count(&self) -> usize {
        self.listeners.read().len()
    }
}
