use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use hearthstore::config::AppConfig;
use hearthstore::lifecycle::{AuthLifecycle, AuthTransition, MemoryNavigator, Page};
use hearthstore::local_store::StoreHandle;
use hearthstore::model::Identity;
use hearthstore::platform::memory::{MemoryAuth, MemoryRecords};
use hearthstore::platform::records::{ListQuery, RecordStore};
use hearthstore::platform::{AuthProvider, Platform};
use hearthstore::{time, AppState};

struct Harness {
    auth: Arc<MemoryAuth>,
    records: Arc<MemoryRecords>,
    navigator: Arc<MemoryNavigator>,
    lifecycle: AuthLifecycle,
}

fn setup(page: Page) -> Harness {
    let auth = Arc::new(MemoryAuth::new());
    let records = Arc::new(MemoryRecords::new());
    let blobs = Arc::new(hearthstore::platform::memory::MemoryBlobs::new());
    let state = AppState::new(
        AppConfig::default(),
        Platform::new(auth.clone(), records.clone(), blobs),
        StoreHandle::in_memory(),
    );
    let navigator = Arc::new(MemoryNavigator::new(page));
    let lifecycle = AuthLifecycle::new(state, navigator.clone());
    Harness {
        auth,
        records,
        navigator,
        lifecycle,
    }
}

fn identity(uid: &str) -> Identity {
    Identity {
        uid: uid.into(),
        email: format!("{uid}@example.com"),
        display_name: Some("Ming".into()),
        photo_url: None,
    }
}

// Detached work (init, audit writes) runs on ready-on-poll futures, so a
// few scheduler turns are enough to let it all finish.
async fn drain_tasks() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

async fn activity_count(records: &MemoryRecords, kind: &str) -> Result<usize> {
    let rows = records
        .list("activities", ListQuery::filter_eq("kind", kind))
        .await?;
    Ok(rows.len())
}

#[tokio::test]
async fn startup_without_a_user_redirects_dashboard_to_login() -> Result<()> {
    let h = setup(Page::Dashboard);
    let rx = h.auth.subscribe();
    let lc = h.lifecycle.clone();
    let run_task = tokio::spawn(async move { lc.run(rx).await });

    drain_tasks().await;
    assert_eq!(h.navigator.history(), vec![Page::Login]);
    assert!(!h.lifecycle.state().session.is_authenticated());

    run_task.abort();
    Ok(())
}

#[tokio::test]
async fn dashboard_sign_in_initializes_household_and_loads_data() -> Result<()> {
    let h = setup(Page::Dashboard);
    let rx = h.auth.subscribe();
    let lc = h.lifecycle.clone();
    let run_task = tokio::spawn(async move { lc.run(rx).await });
    drain_tasks().await;
    h.navigator.set_current(Page::Dashboard);

    h.auth.emit(Some(identity("u1")));
    drain_tasks().await;
    h.lifecycle.wait_for_init().await;
    drain_tasks().await;

    let session = &h.lifecycle.state().session;
    assert!(session.is_authenticated());
    let household_id = session.household_id().expect("household resolved");

    let profile = h.records.get("users", "u1").await?.expect("profile");
    assert_eq!(
        profile.fields["family_id"],
        serde_json::json!(household_id)
    );
    assert_eq!(h.records.len("families"), 1);
    assert_eq!(activity_count(&h.records, "login").await?, 1);

    run_task.abort();
    Ok(())
}

#[tokio::test]
async fn repeated_notifications_do_not_rerun_init_or_redirects() -> Result<()> {
    let h = setup(Page::Dashboard);
    let rx = h.auth.subscribe();
    let lc = h.lifecycle.clone();
    let run_task = tokio::spawn(async move { lc.run(rx).await });
    drain_tasks().await;
    h.navigator.set_current(Page::Dashboard);

    h.auth.emit(Some(identity("u1")));
    drain_tasks().await;
    h.lifecycle.wait_for_init().await;
    drain_tasks().await;

    // Providers re-deliver on listener re-registration; same uid again.
    h.auth.emit(Some(identity("u1")));
    drain_tasks().await;

    assert_eq!(h.records.len("families"), 1);
    assert_eq!(activity_count(&h.records, "login").await?, 1);

    run_task.abort();
    Ok(())
}

#[tokio::test]
async fn login_page_sign_in_redirects_without_initializing() -> Result<()> {
    let h = setup(Page::Login);

    let transition = h.lifecycle.observe(Some(identity("u1"))).await;
    assert_eq!(transition, AuthTransition::SignedIn);
    assert_eq!(h.navigator.history(), vec![Page::Dashboard]);

    // Initialization belongs to the dashboard page load, which gets its
    // own lifecycle instance after the real navigation.
    h.lifecycle.wait_for_init().await;
    assert!(h.lifecycle.state().session.household_id().is_none());
    assert_eq!(h.records.len("families"), 0);
    Ok(())
}

#[tokio::test]
async fn sign_out_wipes_caches_session_and_local_state() -> Result<()> {
    let h = setup(Page::Dashboard);
    h.lifecycle.observe(Some(identity("u1"))).await;
    h.lifecycle.wait_for_init().await;
    drain_tasks().await;
    assert!(h.lifecycle.state().local.read_last_activity().is_some());

    let transition = h.lifecycle.observe(None).await;
    assert_eq!(transition, AuthTransition::SignedOut);

    assert!(!h.lifecycle.state().session.is_authenticated());
    assert!(h.lifecycle.state().session.household_id().is_none());
    assert_eq!(h.lifecycle.state().members.count(), 0);
    assert_eq!(h.lifecycle.state().documents.count(), 0);
    assert!(h.lifecycle.state().local.read_last_activity().is_none());
    assert_eq!(h.navigator.history().last(), Some(&Page::Login));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn inactivity_check_signs_out_a_stale_session() -> Result<()> {
    let h = setup(Page::Dashboard);
    let rx = h.auth.subscribe();
    let lc = h.lifecycle.clone();
    let run_task = tokio::spawn(async move { lc.run(rx).await });
    drain_tasks().await;
    h.navigator.set_current(Page::Dashboard);

    h.auth.emit(Some(identity("u1")));
    drain_tasks().await;
    h.lifecycle.wait_for_init().await;
    drain_tasks().await;
    assert!(h.lifecycle.state().session.is_authenticated());

    // Make the persisted stamp a day and an hour old.
    let stale = time::now_ms() - 25 * 60 * 60 * 1000;
    h.lifecycle.state().local.write_last_activity(stale);

    let checker = h.lifecycle.spawn_session_checker();
    tokio::time::advance(Duration::from_secs(1)).await;
    drain_tasks().await;

    assert!(!h.lifecycle.state().session.is_authenticated());
    assert_eq!(h.navigator.history().last(), Some(&Page::Login));

    checker.abort();
    run_task.abort();
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn inactivity_check_refreshes_a_live_session() -> Result<()> {
    let h = setup(Page::Dashboard);
    h.lifecycle.observe(Some(identity("u1"))).await;
    h.lifecycle.wait_for_init().await;
    drain_tasks().await;

    let recent = time::now_ms() - 1_000;
    h.lifecycle.state().local.write_last_activity(recent);

    let checker = h.lifecycle.spawn_session_checker();
    tokio::time::advance(Duration::from_secs(1)).await;
    drain_tasks().await;

    assert!(h.lifecycle.state().session.is_authenticated());
    let touched = h
        .lifecycle
        .state()
        .local
        .read_last_activity()
        .expect("stamp still present");
    assert!(touched > recent, "fresh check should touch the stamp");

    checker.abort();
    Ok(())
}

#[tokio::test]
async fn stats_track_cache_counts() -> Result<()> {
    let h = setup(Page::Dashboard);
    h.lifecycle.observe(Some(identity("u1"))).await;
    h.lifecycle.wait_for_init().await;

    let stats = h.lifecycle.stats();
    assert_eq!(stats.members, 0);
    assert_eq!(stats.documents, 0);

    let household_id = h
        .lifecycle
        .state()
        .session
        .household_id()
        .expect("household");
    let mut fields = serde_json::Map::new();
    fields.insert("family_id".into(), serde_json::json!(household_id));
    fields.insert("name".into(), serde_json::json!("Ming"));
    fields.insert("relation".into(), serde_json::json!("Mother"));
    fields.insert("created_by".into(), serde_json::json!("u1"));
    fields.insert("created_at".into(), serde_json::json!(5));
    fields.insert("updated_at".into(), serde_json::json!(5));
    h.records.seed("members", "m1", fields);

    h.lifecycle.refresh().await;
    assert_eq!(h.lifecycle.stats().members, 1);
    Ok(())
}
