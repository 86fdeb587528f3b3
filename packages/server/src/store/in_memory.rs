use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{broadcast, Mutex};

use super::{CommitOutcome, DocumentStore, PhaseGuard, Roster, StoreError, StoreEvent, WriteBatch};
use crate::models::{
    player::{Player, PlayerPatch},
    room::Room,
};

const CHANNEL_CAPACITY: usize = 1000;

struct RoomEntry {
    room: Room,
    players: Roster,
}

/// Process-local store. Each room is guarded by the same map lock, so a
/// [`DocumentStore::commit`] is atomic with respect to every other write.
pub struct InMemoryStore {
    rooms: Mutex<HashMap<String, RoomEntry>>,
    channels: Mutex<HashMap<String, broadcast::Sender<StoreEvent>>>,
    available: AtomicBool,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        InMemoryStore {
            rooms: Mutex::new(HashMap::new()),
            channels: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Simulates an outage: every call fails with [`StoreError::Unavailable`] while false.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable)
        }
    }

    async fn get_or_create_room_channel(&self, room_id: &str) -> broadcast::Sender<StoreEvent> {
        let mut channels = self.channels.lock().await;
        if let Some(channel) = channels.get(room_id) {
            channel.clone()
        } else {
            let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
            channels.insert(room_id.to_string(), tx.clone());
            tx
        }
    }

    // rooms nobody ever subscribed to get no channel
    async fn publish(&self, events: Vec<StoreEvent>) {
        let channels = self.channels.lock().await;
        for event in events {
            if let Some(tx) = channels.get(event.room_id()) {
                let _ = tx.send(event);
            }
        }
    }
}

fn room_changed(room_id: &str) -> StoreEvent {
    StoreEvent::RoomChanged {
        room_id: room_id.to_string(),
    }
}

fn player_changed(room_id: &str, player_id: &str) -> StoreEvent {
    StoreEvent::PlayerChanged {
        room_id: room_id.to_string(),
        player_id: player_id.to_string(),
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn insert_room(&self, room: Room) -> Result<(), StoreError> {
        self.ensure_available()?;
        let room_id = room.room_id.clone();
        {
            let mut rooms = self.rooms.lock().await;
            if rooms.contains_key(&room_id) {
                return Err(StoreError::RoomExists(room_id));
            }
            rooms.insert(
                room_id.clone(),
                RoomEntry {
                    room,
                    players: Roster::new(),
                },
            );
        }
        self.publish(vec![room_changed(&room_id)]).await;
        Ok(())
    }

    async fn get_room(&self, room_id: &str) -> Result<Option<Room>, StoreError> {
        self.ensure_available()?;
        let rooms = self.rooms.lock().await;
        Ok(rooms.get(room_id).map(|entry| entry.room.clone()))
    }

    async fn find_rooms_by_code(&self, code: &str) -> Result<Vec<Room>, StoreError> {
        self.ensure_available()?;
        let rooms = self.rooms.lock().await;
        let mut matches: Vec<Room> = rooms
            .values()
            .filter(|entry| entry.room.code == code)
            .map(|entry| entry.room.clone())
            .collect();
        matches.sort_by_key(|room| room.created_at);
        Ok(matches)
    }

    async fn get_player(
        &self,
        room_id: &str,
        player_id: &str,
    ) -> Result<Option<Player>, StoreError> {
        self.ensure_available()?;
        let rooms = self.rooms.lock().await;
        let entry = rooms
            .get(room_id)
            .ok_or_else(|| StoreError::RoomNotFound(room_id.to_string()))?;
        Ok(entry.players.get(player_id).cloned())
    }

    async fn list_players(&self, room_id: &str) -> Result<Roster, StoreError> {
        self.ensure_available()?;
        let rooms = self.rooms.lock().await;
        let entry = rooms
            .get(room_id)
            .ok_or_else(|| StoreError::RoomNotFound(room_id.to_string()))?;
        Ok(entry.players.clone())
    }

    async fn put_player(&self, room_id: &str, player: Player) -> Result<(), StoreError> {
        self.ensure_available()?;
        let player_id = player.id.clone();
        {
            let mut rooms = self.rooms.lock().await;
            let entry = rooms
                .get_mut(room_id)
                .ok_or_else(|| StoreError::RoomNotFound(room_id.to_string()))?;
            entry.players.insert(player_id.clone(), player);
        }
        self.publish(vec![player_changed(room_id, &player_id)]).await;
        Ok(())
    }

    async fn update_player(
        &self,
        room_id: &str,
        player_id: &str,
        patch: PlayerPatch,
    ) -> Result<(), StoreError> {
        self.ensure_available()?;
        {
            let mut rooms = self.rooms.lock().await;
            let entry = rooms
                .get_mut(room_id)
                .ok_or_else(|| StoreError::RoomNotFound(room_id.to_string()))?;
            let player =
                entry
                    .players
                    .get_mut(player_id)
                    .ok_or_else(|| StoreError::PlayerNotFound {
                        room_id: room_id.to_string(),
                        player_id: player_id.to_string(),
                    })?;
            patch.apply(player);
        }
        self.publish(vec![player_changed(room_id, player_id)]).await;
        Ok(())
    }

    async fn commit(
        &self,
        room_id: &str,
        guard: PhaseGuard,
        batch: WriteBatch,
    ) -> Result<CommitOutcome, StoreError> {
        self.ensure_available()?;
        let mut events = Vec::new();
        {
            let mut rooms = self.rooms.lock().await;
            let entry = rooms
                .get_mut(room_id)
                .ok_or_else(|| StoreError::RoomNotFound(room_id.to_string()))?;

            if !guard.matches(&entry.room) {
                return Ok(CommitOutcome::Rejected {
                    phase: entry.room.phase,
                    round: entry.room.round,
                });
            }
            if !batch.conditions.iter().all(|c| c.holds(&entry.players)) {
                return Ok(CommitOutcome::Outdated);
            }
            // all-or-nothing: validate every target before touching anything
            let inserted: Vec<&str> = batch.inserts.iter().map(|p| p.id.as_str()).collect();
            let missing = batch
                .players
                .iter()
                .map(|(id, _)| id)
                .chain(batch.removals.iter())
                .find(|id| !entry.players.contains_key(*id) && !inserted.contains(&id.as_str()));
            if let Some(missing) = missing {
                return Err(StoreError::PlayerNotFound {
                    room_id: room_id.to_string(),
                    player_id: missing.clone(),
                });
            }

            for player in &batch.inserts {
                entry.players.insert(player.id.clone(), player.clone());
                events.push(player_changed(room_id, &player.id));
            }
            for (player_id, patch) in &batch.players {
                if let Some(player) = entry.players.get_mut(player_id) {
                    patch.apply(player);
                    events.push(player_changed(room_id, player_id));
                }
            }
            for player_id in &batch.removals {
                entry.players.remove(player_id);
                events.push(StoreEvent::PlayerRemoved {
                    room_id: room_id.to_string(),
                    player_id: player_id.clone(),
                });
            }
            if !batch.room.is_empty() {
                batch.room.apply(&mut entry.room);
                events.push(room_changed(room_id));
            }
        }
        self.publish(events).await;
        Ok(CommitOutcome::Applied)
    }

    async fn subscribe(&self, room_id: &str) -> broadcast::Receiver<StoreEvent> {
        self.get_or_create_room_channel(room_id).await.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{game::GamePhase, player::Vote, room::RoomPatch};
    use crate::store::Precondition;

    fn lobby_room(room_id: &str) -> Room {
        Room::new(room_id.to_string(), "ABCDEF".to_string(), "host".to_string(), 20)
    }

    #[tokio::test]
    async fn test_commit_rejects_stale_guard() {
        let store = InMemoryStore::new();
        store.insert_room(lobby_room("r1")).await.unwrap();
        store
            .put_player("r1", Player::new("host".to_string(), "Host".to_string()))
            .await
            .unwrap();

        let guard = PhaseGuard {
            phase: GamePhase::Day,
            round: 1,
        };
        let outcome = store
            .commit("r1", guard, WriteBatch::player("host", PlayerPatch::kill()))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            CommitOutcome::Rejected {
                phase: GamePhase::Lobby,
                round: 0
            }
        );
        let host = store.get_player("r1", "host").await.unwrap().unwrap();
        assert!(host.is_alive);
    }

    #[tokio::test]
    async fn test_commit_is_all_or_nothing() {
        let store = InMemoryStore::new();
        store.insert_room(lobby_room("r1")).await.unwrap();
        store
            .put_player("r1", Player::new("host".to_string(), "Host".to_string()))
            .await
            .unwrap();

        let room = store.get_room("r1").await.unwrap().unwrap();
        let batch = WriteBatch::room(RoomPatch::phase(GamePhase::AssignRoles))
            .with_player("host", PlayerPatch::kill())
            .with_player("ghost", PlayerPatch::kill());
        let result = store.commit("r1", PhaseGuard::of(&room), batch).await;

        assert!(matches!(result, Err(StoreError::PlayerNotFound { .. })));
        let room = store.get_room("r1").await.unwrap().unwrap();
        assert_eq!(room.phase, GamePhase::Lobby);
        assert!(store.get_player("r1", "host").await.unwrap().unwrap().is_alive);
    }

    #[tokio::test]
    async fn test_subscribers_see_committed_changes() {
        let store = InMemoryStore::new();
        let mut rx = store.subscribe("r1").await;
        store.insert_room(lobby_room("r1")).await.unwrap();
        store
            .put_player("r1", Player::new("p1".to_string(), "Alice".to_string()))
            .await
            .unwrap();

        assert_eq!(
            rx.recv().await.unwrap(),
            StoreEvent::RoomChanged {
                room_id: "r1".to_string()
            }
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            StoreEvent::PlayerChanged {
                room_id: "r1".to_string(),
                player_id: "p1".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_every_call() {
        let store = InMemoryStore::new();
        store.set_available(false);
        assert_eq!(
            store.get_room("r1").await.unwrap_err(),
            StoreError::Unavailable
        );
        store.set_available(true);
        assert_eq!(store.get_room("r1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_commit_checks_preconditions() {
        let store = InMemoryStore::new();
        store.insert_room(lobby_room("r1")).await.unwrap();
        let police = Player::new("po".to_string(), "Police".to_string());
        store.put_player("r1", police.clone()).await.unwrap();

        let guess = |target: &str| PlayerPatch {
            police_guess: Some(Some(target.to_string())),
            ..Default::default()
        };
        let first =
            WriteBatch::player("po", guess("a")).require(Precondition::Unchanged(police.clone()));
        let second = WriteBatch::player("po", guess("b")).require(Precondition::Unchanged(police));

        let guard = PhaseGuard::lobby();
        let outcome = store.commit("r1", guard, first).await.unwrap();
        assert_eq!(outcome, CommitOutcome::Applied);
        let outcome = store.commit("r1", guard, second).await.unwrap();
        assert_eq!(outcome, CommitOutcome::Outdated);

        let po = store.get_player("r1", "po").await.unwrap().unwrap();
        assert_eq!(po.police_guess.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_guarded_insert_and_removal() {
        let store = InMemoryStore::new();
        store.insert_room(lobby_room("r1")).await.unwrap();
        let join = |id: &str| {
            WriteBatch::default()
                .insert(Player::new(id.to_string(), id.to_uppercase()))
                .require(Precondition::RosterBelow(2))
        };

        for (id, expected) in [
            ("a", CommitOutcome::Applied),
            ("b", CommitOutcome::Applied),
            ("c", CommitOutcome::Outdated),
        ] {
            let outcome = store.commit("r1", PhaseGuard::lobby(), join(id)).await.unwrap();
            assert_eq!(outcome, expected, "{}", id);
        }

        let start = WriteBatch::room(RoomPatch::phase(GamePhase::AssignRoles));
        store.commit("r1", PhaseGuard::lobby(), start).await.unwrap();

        let leave = WriteBatch::default().remove("a");
        let outcome = store.commit("r1", PhaseGuard::lobby(), leave).await.unwrap();
        assert!(matches!(outcome, CommitOutcome::Rejected { .. }));
        assert_eq!(store.list_players("r1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_roster_condition_sees_late_join() {
        let store = InMemoryStore::new();
        store.insert_room(lobby_room("r1")).await.unwrap();
        store
            .put_player("r1", Player::new("a".to_string(), "A".to_string()))
            .await
            .unwrap();
        let seen = store.list_players("r1").await.unwrap().into_keys().collect();
        store
            .put_player("r1", Player::new("b".to_string(), "B".to_string()))
            .await
            .unwrap();

        let patch = PlayerPatch {
            night_vote: Some(Vote::Abstain),
            ..Default::default()
        };
        let batch = WriteBatch::player("a", patch).require(Precondition::Roster(seen));
        let outcome = store.commit("r1", PhaseGuard::lobby(), batch).await.unwrap();
        assert_eq!(outcome, CommitOutcome::Outdated);
    }

    #[tokio::test]
    async fn test_events_only_flow_to_subscribed_rooms() {
        let store = InMemoryStore::new();
        store.insert_room(lobby_room("quiet")).await.unwrap();
        assert!(store.channels.lock().await.is_empty());
    }
}
