use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use pulse_types::events::PartnerEvent;

/// Registry of live connections and which couple each belongs to.
///
/// Purely transient state: rebuilt from scratch on restart, and only ever
/// mutated by connect/disconnect. Business events never touch membership.
/// Delivery is at-most-once and fire-and-forget; a client that misses an
/// event reconciles by re-reading through the REST endpoints.
#[derive(Clone)]
pub struct PartnerRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    /// user_id -> (conn_id, sender). One live connection per user; a newer
    /// connection replaces the entry and the old one's teardown is a no-op.
    connections: RwLock<HashMap<Uuid, (Uuid, mpsc::UnboundedSender<PartnerEvent>)>>,

    /// couple_id -> connected member user ids (at most 2).
    couple_members: RwLock<HashMap<Uuid, HashSet<Uuid>>>,
}

impl PartnerRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                connections: RwLock::new(HashMap::new()),
                couple_members: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Register a connection. Returns (conn_id, receiver); the caller owns the
    /// receive loop and must call `disconnect` with the same conn_id on exit.
    pub async fn connect(
        &self,
        user_id: Uuid,
        couple_id: Option<Uuid>,
    ) -> (Uuid, mpsc::UnboundedReceiver<PartnerEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .connections
            .write()
            .await
            .insert(user_id, (conn_id, tx));

        if let Some(couple_id) = couple_id {
            self.inner
                .couple_members
                .write()
                .await
                .entry(couple_id)
                .or_default()
                .insert(user_id);
        }

        (conn_id, rx)
    }

    /// Remove a connection, but only if conn_id still owns the entry: a
    /// reconnect must not be torn down by the old connection's cleanup.
    pub async fn disconnect(&self, user_id: Uuid, conn_id: Uuid) {
        {
            let mut connections = self.inner.connections.write().await;
            match connections.get(&user_id) {
                Some((stored, _)) if *stored == conn_id => {
                    connections.remove(&user_id);
                }
                _ => return,
            }
        }
        self.remove_member(user_id).await;
    }

    /// Deliver an event to the other connected member(s) of the couple,
    /// never to the sender. A failed push disconnects that member; it never
    /// fails or blocks the caller.
    pub async fn notify_partner(&self, couple_id: Uuid, sender_id: Uuid, event: PartnerEvent) {
        let partners: Vec<Uuid> = {
            let members = self.inner.couple_members.read().await;
            members
                .get(&couple_id)
                .map(|set| set.iter().copied().filter(|&id| id != sender_id).collect())
                .unwrap_or_default()
        };

        for partner_id in partners {
            self.push(partner_id, event.clone()).await;
        }
    }

    /// Deliver an event to every connected member of the couple. Used by the
    /// expiry sweep, which has no acting user.
    pub async fn notify_couple(&self, couple_id: Uuid, event: PartnerEvent) {
        let members: Vec<Uuid> = {
            let map = self.inner.couple_members.read().await;
            map.get(&couple_id)
                .map(|set| set.iter().copied().collect())
                .unwrap_or_default()
        };

        for member_id in members {
            self.push(member_id, event.clone()).await;
        }
    }

    /// Best-effort push to one user. Not connected: dropped silently.
    /// Send failure (receiver gone): treated as a disconnect.
    async fn push(&self, user_id: Uuid, event: PartnerEvent) {
        let failed_conn = {
            let connections = self.inner.connections.read().await;
            match connections.get(&user_id) {
                Some((conn_id, tx)) => {
                    if tx.send(event).is_err() {
                        Some(*conn_id)
                    } else {
                        None
                    }
                }
                None => None,
            }
        };

        if let Some(conn_id) = failed_conn {
            self.disconnect(user_id, conn_id).await;
        }
    }

    async fn remove_member(&self, user_id: Uuid) {
        let mut members = self.inner.couple_members.write().await;
        members.retain(|_, set| {
            set.remove(&user_id);
            !set.is_empty()
        });
    }
}

impl Default for PartnerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ping() -> PartnerEvent {
        PartnerEvent::TaskExpired {
            task_id: Uuid::nil(),
        }
    }

    #[tokio::test]
    async fn partner_gets_event_sender_does_not() {
        let registry = PartnerRegistry::new();
        let couple = Uuid::new_v4();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

        let (_, mut alice_rx) = registry.connect(alice, Some(couple)).await;
        let (_, mut bob_rx) = registry.connect(bob, Some(couple)).await;

        registry.notify_partner(couple, alice, ping()).await;

        assert!(bob_rx.try_recv().is_ok());
        assert!(alice_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unconnected_partner_drops_silently() {
        let registry = PartnerRegistry::new();
        let couple = Uuid::new_v4();
        let alice = Uuid::new_v4();

        let (_, mut alice_rx) = registry.connect(alice, Some(couple)).await;

        // Partner never connected; nothing to deliver, nothing blows up.
        registry.notify_partner(couple, alice, ping()).await;
        assert!(alice_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn disconnect_stops_delivery() {
        let registry = PartnerRegistry::new();
        let couple = Uuid::new_v4();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

        let (_, _alice_rx) = registry.connect(alice, Some(couple)).await;
        let (bob_conn, mut bob_rx) = registry.connect(bob, Some(couple)).await;

        registry.disconnect(bob, bob_conn).await;
        registry.notify_partner(couple, alice, ping()).await;

        assert!(bob_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn failed_push_disconnects_partner() {
        let registry = PartnerRegistry::new();
        let couple = Uuid::new_v4();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

        let (_, _alice_rx) = registry.connect(alice, Some(couple)).await;
        let (_, bob_rx) = registry.connect(bob, Some(couple)).await;
        drop(bob_rx);

        registry.notify_partner(couple, alice, ping()).await;

        // Bob's dead connection was reaped; the second notify sees no partner.
        let connections = registry.inner.connections.read().await;
        assert!(!connections.contains_key(&bob));
        let members = registry.inner.couple_members.read().await;
        assert!(!members.get(&couple).is_some_and(|set| set.contains(&bob)));
    }

    #[tokio::test]
    async fn stale_disconnect_leaves_new_connection_alone() {
        let registry = PartnerRegistry::new();
        let couple = Uuid::new_v4();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

        let (_, _alice_rx) = registry.connect(alice, Some(couple)).await;
        let (old_conn, _old_rx) = registry.connect(bob, Some(couple)).await;
        let (_new_conn, mut new_rx) = registry.connect(bob, Some(couple)).await;

        // Old connection's teardown races in after the reconnect.
        registry.disconnect(bob, old_conn).await;

        registry.notify_partner(couple, alice, ping()).await;
        assert!(new_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn couple_broadcast_reaches_both_members() {
        let registry = PartnerRegistry::new();
        let couple = Uuid::new_v4();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

        let (_, mut alice_rx) = registry.connect(alice, Some(couple)).await;
        let (_, mut bob_rx) = registry.connect(bob, Some(couple)).await;

        registry.notify_couple(couple, ping()).await;

        assert!(alice_rx.try_recv().is_ok());
        assert!(bob_rx.try_recv().is_ok());
    }
}
