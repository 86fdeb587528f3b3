use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, Notify};

use server::{
    models::{
        config::GameConfig,
        game::GamePhase,
        player::{Player, PlayerPatch},
        role::Role,
        room::Room,
    },
    services::{error::GameError, game_service, room_service},
    state::AppState,
    store::{
        CommitOutcome, DocumentStore, InMemoryStore, PhaseGuard, Roster, StoreError, StoreEvent,
        WriteBatch,
    },
    utils::test_setup::setup_test_env,
};

type BatchFilter = Box<dyn Fn(&WriteBatch) -> bool + Send + Sync>;

/// Holds back the first commit matching a filter until released, so a test
/// can run other requests between a service's checks and its write.
struct GatedStore {
    inner: InMemoryStore,
    gate: Mutex<Option<BatchFilter>>,
    reached: Notify,
    release: Notify,
}

impl GatedStore {
    fn new() -> Self {
        Self {
            inner: InMemoryStore::new(),
            gate: Mutex::new(None),
            reached: Notify::new(),
            release: Notify::new(),
        }
    }

    fn hold_next(&self, filter: impl Fn(&WriteBatch) -> bool + Send + Sync + 'static) {
        *self.gate.lock().unwrap() = Some(Box::new(filter));
    }

    async fn wait_until_held(&self) {
        self.reached.notified().await;
    }

    fn release(&self) {
        self.release.notify_one();
    }
}

#[async_trait]
impl DocumentStore for GatedStore {
    async fn insert_room(&self, room: Room) -> Result<(), StoreError> {
        self.inner.insert_room(room).await
    }

    async fn get_room(&self, room_id: &str) -> Result<Option<Room>, StoreError> {
        self.inner.get_room(room_id).await
    }

    async fn find_rooms_by_code(&self, code: &str) -> Result<Vec<Room>, StoreError> {
        self.inner.find_rooms_by_code(code).await
    }

    async fn get_player(
        &self,
        room_id: &str,
        player_id: &str,
    ) -> Result<Option<Player>, StoreError> {
        self.inner.get_player(room_id, player_id).await
    }

    async fn list_players(&self, room_id: &str) -> Result<Roster, StoreError> {
        self.inner.list_players(room_id).await
    }

    async fn put_player(&self, room_id: &str, player: Player) -> Result<(), StoreError> {
        self.inner.put_player(room_id, player).await
    }

    async fn update_player(
        &self,
        room_id: &str,
        player_id: &str,
        patch: PlayerPatch,
    ) -> Result<(), StoreError> {
        self.inner.update_player(room_id, player_id, patch).await
    }

    async fn commit(
        &self,
        room_id: &str,
        guard: PhaseGuard,
        batch: WriteBatch,
    ) -> Result<CommitOutcome, StoreError> {
        let held = {
            let mut gate = self.gate.lock().unwrap();
            match gate.as_ref() {
                Some(filter) if filter(&batch) => {
                    gate.take();
                    true
                }
                _ => false,
            }
        };
        if held {
            self.reached.notify_one();
            self.release.notified().await;
        }
        self.inner.commit(room_id, guard, batch).await
    }

    async fn subscribe(&self, room_id: &str) -> broadcast::Receiver<StoreEvent> {
        self.inner.subscribe(room_id).await
    }
}

fn gated_state() -> (AppState, Arc<GatedStore>) {
    let store = Arc::new(GatedStore::new());
    let state = AppState::with_store(store.clone(), GameConfig::default());
    (state, store)
}

async fn lobby(state: &AppState, players: usize) -> (String, String) {
    let created = room_service::create_room(state, "host", "Host").await.unwrap();
    for i in 1..players {
        room_service::join_room(state, &created.code, &format!("p{}", i), &format!("P{}", i))
            .await
            .unwrap();
    }
    (created.room_id, created.code)
}

#[tokio::test]
async fn test_join_checked_in_lobby_cannot_land_after_start() {
    setup_test_env();
    let (state, store) = gated_state();
    let (room_id, code) = lobby(&state, 4).await;

    store.hold_next(|batch| !batch.inserts.is_empty());
    let joining = {
        let state = state.clone();
        tokio::spawn(async move { room_service::join_room(&state, &code, "late", "Late").await })
    };
    store.wait_until_held().await;

    game_service::start_game(&state, &room_id, "host")
        .await
        .unwrap();
    store.release();

    let joined = joining.await.unwrap();
    assert!(matches!(joined, Err(GameError::Conflict(_))));

    let players = room_service::get_players(&state, &room_id).await.unwrap();
    assert_eq!(players.len(), 4);
    assert!(players.iter().all(|p| p.role.is_some()));
    let room = room_service::get_room_info(&state, &room_id).await.unwrap();
    assert_eq!(room.phase, GamePhase::NightMafia);
}

#[tokio::test]
async fn test_start_rejects_roster_changed_after_its_read() {
    setup_test_env();
    let (state, store) = gated_state();
    let (room_id, code) = lobby(&state, 4).await;

    store.hold_next(|batch| batch.room.phase == Some(GamePhase::AssignRoles));
    let starting = {
        let state = state.clone();
        let room_id = room_id.clone();
        tokio::spawn(async move { game_service::start_game(&state, &room_id, "host").await })
    };
    store.wait_until_held().await;

    room_service::join_room(&state, &code, "late", "Late")
        .await
        .unwrap();
    store.release();

    let started = starting.await.unwrap();
    assert!(matches!(started, Err(GameError::Conflict(_))));
    let room = room_service::get_room_info(&state, &room_id).await.unwrap();
    assert_eq!(room.phase, GamePhase::Lobby);

    // a second attempt deals the late player in
    game_service::start_game(&state, &room_id, "host")
        .await
        .unwrap();
    let players = room_service::get_players(&state, &room_id).await.unwrap();
    assert_eq!(players.len(), 5);
    assert!(players.iter().all(|p| p.role.is_some()));
}

#[tokio::test]
async fn test_leave_checked_in_lobby_cannot_remove_a_dealt_player() {
    setup_test_env();
    let (state, store) = gated_state();
    let (room_id, _) = lobby(&state, 4).await;

    store.hold_next(|batch| !batch.removals.is_empty());
    let leaving = {
        let state = state.clone();
        let room_id = room_id.clone();
        tokio::spawn(async move { room_service::leave_room(&state, &room_id, "p1").await })
    };
    store.wait_until_held().await;

    game_service::start_game(&state, &room_id, "host")
        .await
        .unwrap();
    store.release();

    let left = leaving.await.unwrap();
    assert!(matches!(left, Err(GameError::Conflict(_))));
    let p1 = state.store.get_player(&room_id, "p1").await.unwrap();
    assert!(p1.and_then(|p| p.role).is_some());
}

#[tokio::test]
async fn test_concurrent_police_guesses_reveal_once() {
    setup_test_env();
    let (state, store) = gated_state();
    let (room_id, _) = lobby(&state, 4).await;
    game_service::start_game(&state, &room_id, "host")
        .await
        .unwrap();

    let view = game_service::get_game_state(&state, &room_id).await.unwrap();
    let with_role = |role: Role| {
        view.players
            .iter()
            .find(|p| p.role == Some(role))
            .map(|p| p.id.clone())
            .unwrap()
    };
    let mafia = with_role(Role::Mafia);
    let police = with_role(Role::Police);
    let villager = with_role(Role::Villager);
    game_service::submit_mafia_vote(&state, &room_id, &mafia, &villager)
        .await
        .unwrap();

    store.hold_next(|batch| {
        batch
            .players
            .iter()
            .any(|(_, p)| matches!(p.police_guess, Some(Some(_))))
    });
    let first = {
        let state = state.clone();
        let (room_id, police, villager) = (room_id.clone(), police.clone(), villager.clone());
        tokio::spawn(async move {
            game_service::submit_police_guess(&state, &room_id, &police, &villager).await
        })
    };
    store.wait_until_held().await;

    let second = game_service::submit_police_guess(&state, &room_id, &police, &mafia)
        .await
        .unwrap();
    assert!(second.police_report.unwrap().is_mafia);
    store.release();

    let first = first.await.unwrap();
    assert!(matches!(first, Err(GameError::Conflict(_))));
    let police_now = state.store.get_player(&room_id, &police).await.unwrap().unwrap();
    assert_eq!(police_now.police_guess.as_deref(), Some(mafia.as_str()));
}
