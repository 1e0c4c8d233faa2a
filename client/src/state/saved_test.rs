use super::*;
use crate::state::auth::AuthStore;
use crate::test_helpers::MockBackend;
use crate::util::storage::MemoryStorage;
use tokio::time::{Duration, sleep, timeout};

struct Harness {
    backend: MockBackend,
    auth: AuthStore,
    saved: Arc<SavedItemsStore>,
}

async fn harness() -> Harness {
    let backend = MockBackend::spawn().await;
    backend.add_user("ana", "ana@litflix.test", "pw");
    let api = ApiClient::new(&backend.base_url).unwrap();
    let auth = AuthStore::new(api.clone(), Arc::new(MemoryStorage::new()));
    let saved = Arc::new(SavedItemsStore::new(api, auth.subscribe()));
    Harness { backend, auth, saved }
}

fn dune() -> SavedItem {
    SavedItem::new("E1", "Dune", "book").with_description("Spice.")
}

fn heat() -> SavedItem {
    SavedItem::new("E2", "Heat", "movie").with_favorited(true)
}

fn paris() -> SavedItem {
    SavedItem::new("E3", "Paris", "place")
}

async fn wait_for(mut cond: impl FnMut() -> bool) {
    timeout(Duration::from_secs(2), async {
        while !cond() {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition should hold before timeout");
}

// =============================================================================
// upsert
// =============================================================================

#[test]
fn upsert_appends_new_ids() {
    let mut items = vec![dune()];
    upsert(&mut items, heat());
    assert_eq!(items.len(), 2);
    assert_eq!(items[1].item_id, "E2");
}

#[test]
fn upsert_replaces_matching_id_in_place() {
    let mut items = vec![dune(), heat()];
    upsert(&mut items, dune().with_favorited(true));
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].item_id, "E1");
    assert!(items[0].favorited);
}

// =============================================================================
// load
// =============================================================================

#[tokio::test]
async fn load_after_login_mirrors_backend_list() {
    let h = harness().await;
    h.backend.seed_saved("ana", vec![dune(), heat()]);
    h.auth.login("ana", "pw").await.unwrap();

    assert!(h.saved.load_saved_items().await);
    assert_eq!(h.saved.items(), h.backend.saved_for("ana"));
    assert!(!h.saved.is_loading());
}

#[tokio::test]
async fn overlapping_loads_keep_loading_until_the_last_finishes() {
    let h = harness().await;
    h.backend.seed_saved("ana", vec![dune()]);
    h.auth.login("ana", "pw").await.unwrap();
    h.backend.delay_list(Duration::from_millis(300));

    let first = tokio::spawn({
        let saved = Arc::clone(&h.saved);
        async move { saved.load_saved_items().await }
    });
    sleep(Duration::from_millis(150)).await;
    let second = tokio::spawn({
        let saved = Arc::clone(&h.saved);
        async move { saved.load_saved_items().await }
    });

    wait_for(|| first.is_finished()).await;
    assert!(h.saved.is_loading(), "second fetch still in flight");

    assert!(first.await.unwrap());
    assert!(second.await.unwrap());
    assert!(!h.saved.is_loading());
    assert_eq!(h.saved.len(), 1);
}

#[tokio::test]
async fn load_when_logged_out_clears_without_request() {
    let h = harness().await;
    let before = h.backend.hits();

    assert!(!h.saved.load_saved_items().await);
    assert!(h.saved.is_empty());
    assert_eq!(h.backend.hits(), before);
}

#[tokio::test]
async fn load_failure_falls_back_to_empty_list() {
    let h = harness().await;
    h.backend.seed_saved("ana", vec![dune()]);
    h.auth.login("ana", "pw").await.unwrap();
    assert!(h.saved.load_saved_items().await);

    h.backend.revoke_all_tokens();
    assert!(!h.saved.load_saved_items().await);
    assert!(h.saved.is_empty());
}

// =============================================================================
// save / remove
// =============================================================================

#[tokio::test]
async fn save_appends_backend_copy() {
    let h = harness().await;
    h.auth.login("ana", "pw").await.unwrap();

    assert!(h.saved.save_item(dune()).await);
    let items = h.saved.items();
    assert_eq!(items.len(), 1);
    assert!(items[0].id.is_some(), "local list keeps the stored copy");
    assert!(h.saved.is_item_saved("E1"));
}

#[tokio::test]
async fn save_existing_id_updates_instead_of_duplicating() {
    let h = harness().await;
    h.backend.seed_saved("ana", vec![dune(), paris()]);
    h.auth.login("ana", "pw").await.unwrap();
    h.saved.load_saved_items().await;

    assert!(h.saved.save_item(dune().with_favorited(true)).await);

    let items = h.saved.items();
    assert_eq!(items.len(), 2);
    assert_eq!(items.iter().filter(|i| i.item_id == "E1").count(), 1);
    assert!(items.iter().find(|i| i.item_id == "E1").unwrap().favorited);
    assert_eq!(h.backend.saved_for("ana").len(), 2);
}

#[tokio::test]
async fn save_failure_leaves_list_unchanged() {
    let h = harness().await;
    h.backend.seed_saved("ana", vec![dune()]);
    h.auth.login("ana", "pw").await.unwrap();
    h.saved.load_saved_items().await;
    let before = h.saved.items();

    h.backend.fail_mutations(true);
    assert!(!h.saved.save_item(heat()).await);
    assert_eq!(h.saved.items(), before);
}

#[tokio::test]
async fn save_when_logged_out_is_rejected_locally() {
    let h = harness().await;
    let before = h.backend.hits();

    assert!(!h.saved.save_item(dune()).await);
    assert_eq!(h.backend.hits(), before);
}

#[tokio::test]
async fn remove_drops_only_the_matching_item() {
    let h = harness().await;
    h.backend.seed_saved("ana", vec![dune(), heat(), paris()]);
    h.auth.login("ana", "pw").await.unwrap();
    h.saved.load_saved_items().await;

    assert!(h.saved.remove_item("E2").await);

    let ids: Vec<String> = h.saved.items().into_iter().map(|i| i.item_id).collect();
    assert_eq!(ids, vec!["E1".to_owned(), "E3".to_owned()]);
    assert!(!h.saved.is_item_saved("E2"));
}

#[tokio::test]
async fn remove_failure_leaves_list_unchanged() {
    let h = harness().await;
    h.backend.seed_saved("ana", vec![dune()]);
    h.auth.login("ana", "pw").await.unwrap();
    h.saved.load_saved_items().await;

    assert!(!h.saved.remove_item("E-missing").await, "backend answers 404");
    h.backend.fail_mutations(true);
    assert!(!h.saved.remove_item("E1").await);
    assert!(h.saved.is_item_saved("E1"));
}

// =============================================================================
// check / favorites
// =============================================================================

#[tokio::test]
async fn check_if_saved_logged_out_makes_no_request() {
    let h = harness().await;
    let before = h.backend.hits();

    assert!(!h.saved.check_if_saved("E1").await);
    assert_eq!(h.backend.hits(), before);
}

#[tokio::test]
async fn check_if_saved_asks_backend() {
    let h = harness().await;
    h.backend.seed_saved("ana", vec![dune()]);
    h.auth.login("ana", "pw").await.unwrap();

    assert!(h.saved.check_if_saved("E1").await);
    assert!(!h.saved.check_if_saved("E9").await);
    assert!(!h.saved.is_item_saved("E1"), "nothing loaded locally yet");
}

#[tokio::test]
async fn toggle_favorite_flips_flag() {
    let h = harness().await;
    h.backend.seed_saved("ana", vec![dune(), heat()]);
    h.auth.login("ana", "pw").await.unwrap();
    h.saved.load_saved_items().await;
    assert_eq!(h.saved.favorites().len(), 1);

    assert!(h.saved.toggle_favorite("E1").await);
    assert_eq!(h.saved.favorites().len(), 2);
    assert!(h.saved.toggle_favorite("E2").await);
    let favorites: Vec<String> = h.saved.favorites().into_iter().map(|i| i.item_id).collect();
    assert_eq!(favorites, vec!["E1".to_owned()]);

    assert!(!h.saved.toggle_favorite("E-unknown").await);
}

// =============================================================================
// auth following
// =============================================================================

#[tokio::test]
async fn on_auth_change_logout_clears_list() {
    let h = harness().await;
    h.backend.seed_saved("ana", vec![dune()]);
    h.auth.login("ana", "pw").await.unwrap();
    h.saved.on_auth_change(&h.auth.snapshot()).await;
    assert_eq!(h.saved.len(), 1);

    h.auth.logout();
    h.saved.on_auth_change(&h.auth.snapshot()).await;
    assert!(h.saved.is_empty());
    assert!(h.auth.token().is_none());
}

#[tokio::test]
async fn auth_sync_task_follows_login_and_logout() {
    let h = harness().await;
    h.backend.seed_saved("ana", vec![dune(), heat()]);
    let task = h.saved.spawn_auth_sync();

    h.auth.login("ana", "pw").await.unwrap();
    let saved = Arc::clone(&h.saved);
    wait_for(|| saved.len() == 2).await;

    h.auth.logout();
    wait_for(|| saved.is_empty()).await;

    drop(h.auth);
    timeout(Duration::from_secs(2), task)
        .await
        .expect("sync task should stop once the auth store is gone")
        .unwrap();
}
