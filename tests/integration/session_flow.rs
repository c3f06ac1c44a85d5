//! Session behavior against the in-process API

use std::{sync::Arc, time::Duration};

use serde_json::{json, Value};

use bookhub_client::{
    evaluate_path,
    guard::{HOME_PATH, LOGIN_PATH},
    models::Role,
    storage::{FileStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY},
    ClientError, Decision, Services, Session, SessionPhase, SessionSnapshot,
};

use crate::common::{self, stored, FakeApi, EMAIL, PASSWORD};

#[tokio::test]
async fn test_login_scenario() {
    let api = FakeApi::new();
    let (session, store) = common::session(&api);
    assert_eq!(session.init().await, SessionSnapshot::anonymous());

    let user = session.login(EMAIL, PASSWORD).await.unwrap();
    assert_eq!(user.id, 1);
    assert_eq!(user.username, "a");
    assert_eq!(user.role, Role::Member);

    assert_eq!(stored(&*store, ACCESS_TOKEN_KEY).await.as_deref(), Some("A1"));
    assert_eq!(stored(&*store, REFRESH_TOKEN_KEY).await.as_deref(), Some("R1"));
    let cached: Value = serde_json::from_str(&stored(&*store, USER_KEY).await.unwrap()).unwrap();
    assert_eq!(cached, json!({"id": 1, "username": "a", "role": "MEMBER", "is_staff": false, "is_superuser": false}));

    assert_eq!(session.phase(), SessionPhase::Authenticated);
    assert_eq!(evaluate_path(&session.snapshot(), "/dashboard"), Some(Decision::Render));
    assert_eq!(
        evaluate_path(&session.snapshot(), "/admin/dashboard"),
        Some(Decision::Redirect(HOME_PATH))
    );
}

#[tokio::test]
async fn test_wrong_password_stays_anonymous() {
    let api = FakeApi::new();
    let (session, store) = common::session(&api);
    session.init().await;

    assert!(matches!(
        session.login(EMAIL, "nope").await,
        Err(ClientError::InvalidCredentials(_))
    ));
    assert_eq!(session.phase(), SessionPhase::Anonymous);
    assert!(store.is_empty().await);
    assert_eq!(api.calls("auth/me/"), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_expiry_refreshes_once() {
    let api = FakeApi::new();
    let (session, store) = common::logged_in(&api).await;
    api.expire_access();

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let session = session.clone();
            tokio::spawn(async move { session.api().get_json::<Vec<Value>>("books/").await })
        })
        .collect();

    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap(), Vec::<Value>::new());
    }

    assert_eq!(api.calls("auth/refresh/"), 1);
    assert_eq!(stored(&*store, ACCESS_TOKEN_KEY).await.as_deref(), Some("A2"));
    assert_eq!(stored(&*store, REFRESH_TOKEN_KEY).await.as_deref(), Some("R2"));
    assert_eq!(session.phase(), SessionPhase::Authenticated);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_expiry_with_revoked_refresh_logs_out_once() {
    let api = FakeApi::new();
    let (session, store) = common::logged_in(&api).await;
    api.expire_access();
    api.revoke_refresh();

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let session = session.clone();
            tokio::spawn(async move { session.api().get_json::<Vec<Value>>("books/").await })
        })
        .collect();

    for task in tasks {
        assert_eq!(task.await.unwrap(), Err(ClientError::SessionExpired));
    }

    assert_eq!(api.calls("auth/refresh/"), 1);
    assert!(store.is_empty().await);
    assert_eq!(session.snapshot(), SessionSnapshot::anonymous());
}

#[tokio::test]
async fn test_retries_at_most_once() {
    let api = FakeApi::new();
    let (session, _store) = common::logged_in(&api).await;
    api.always_unauthorized("books/");

    assert_eq!(
        session.api().get_json::<Vec<Value>>("books/").await,
        Err(ClientError::SessionExpired)
    );
    assert_eq!(api.calls("books/"), 2);
    assert_eq!(api.calls("auth/refresh/"), 1);
}

#[tokio::test]
async fn test_refresh_failure_cascades_to_logout() {
    let api = FakeApi::new();
    let (session, store) = common::logged_in(&api).await;
    let mut rx = session.subscribe();
    rx.borrow_and_update();

    api.expire_access();
    api.revoke_refresh();

    assert_eq!(
        session.api().get_json::<Vec<Value>>("books/").await,
        Err(ClientError::SessionExpired)
    );
    assert!(store.is_empty().await);
    assert_eq!(session.snapshot(), SessionSnapshot::anonymous());
    assert!(rx.has_changed().unwrap());
    assert_eq!(
        evaluate_path(&rx.borrow_and_update(), "/search"),
        Some(Decision::Redirect(LOGIN_PATH))
    );
}

#[tokio::test]
async fn test_logout_during_refresh_wins() {
    let api = FakeApi::with_refresh_delay(Duration::from_millis(200));
    let (session, store) = common::logged_in(&api).await;
    api.expire_access();

    let pending = {
        let session = session.clone();
        tokio::spawn(async move { session.api().get_json::<Vec<Value>>("books/").await })
    };

    api.refresh_started().await;
    session.logout().await;

    assert_eq!(pending.await.unwrap(), Err(ClientError::SessionExpired));
    assert!(store.is_empty().await);
    assert_eq!(session.phase(), SessionPhase::Anonymous);
}

#[tokio::test]
async fn test_login_during_refresh_is_kept() {
    let api = FakeApi::with_refresh_delay(Duration::from_millis(300));
    let (session, store) = common::logged_in(&api).await;
    api.expire_access();

    let pending = {
        let session = session.clone();
        tokio::spawn(async move { session.api().get_json::<Vec<Value>>("books/").await })
    };

    api.refresh_started().await;
    session.login(EMAIL, PASSWORD).await.unwrap();

    // The old identity's call fails but the new login survives it
    assert_eq!(pending.await.unwrap(), Err(ClientError::SessionExpired));
    assert_eq!(session.phase(), SessionPhase::Authenticated);
    assert_eq!(stored(&*store, ACCESS_TOKEN_KEY).await.as_deref(), Some("A2"));
    assert_eq!(stored(&*store, REFRESH_TOKEN_KEY).await.as_deref(), Some("R2"));
    assert_eq!(session.api().get_json::<Vec<Value>>("books/").await, Ok(Vec::new()));
}

#[tokio::test]
async fn test_new_login_does_not_join_previous_refresh() {
    let api = FakeApi::with_refresh_delay(Duration::from_millis(300));
    let (session, store) = common::logged_in(&api).await;
    api.expire_access();

    let old = {
        let session = session.clone();
        tokio::spawn(async move { session.api().get_json::<Vec<Value>>("books/").await })
    };
    api.refresh_started().await;

    session.login(EMAIL, PASSWORD).await.unwrap();
    api.expire_access();

    // Needs its own refresh with the new refresh token
    assert_eq!(session.api().get_json::<Vec<Value>>("books/").await, Ok(Vec::new()));
    assert_eq!(old.await.unwrap(), Err(ClientError::SessionExpired));

    assert_eq!(api.calls("auth/refresh/"), 2);
    assert_eq!(stored(&*store, ACCESS_TOKEN_KEY).await.as_deref(), Some("A4"));
    assert_eq!(session.phase(), SessionPhase::Authenticated);
}

#[tokio::test]
async fn test_bootstrap_without_credentials_is_offline() {
    let api = FakeApi::new();
    let (session, _store) = common::session(&api);

    assert_eq!(session.phase(), SessionPhase::Bootstrapping);
    assert_eq!(
        evaluate_path(&session.snapshot(), "/payment"),
        Some(Decision::Loading)
    );

    session.init().await;
    session.init().await;
    assert_eq!(session.phase(), SessionPhase::Anonymous);
    assert_eq!(api.total_calls(), 0);
}

#[tokio::test]
async fn test_bootstrap_is_idempotent() {
    let api = FakeApi::new();
    let (first, store) = common::logged_in(&api).await;
    drop(first);

    let session = Session::new(api.clone(), store.clone());
    let (a, b) = tokio::join!(session.init(), session.init());
    assert_eq!(a, b);
    assert_eq!(a.phase(), SessionPhase::Authenticated);
    // One profile fetch for login, one for the restore
    assert_eq!(api.calls("auth/me/"), 2);
}

#[tokio::test]
async fn test_bootstrap_with_stale_credentials() {
    let api = FakeApi::new();
    let (first, store) = common::logged_in(&api).await;
    drop(first);

    api.expire_access();
    api.revoke_refresh();

    let session = Session::new(api.clone(), store.clone());
    assert_eq!(session.init().await, SessionSnapshot::anonymous());
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_bootstrap_recovers_expired_access_token() {
    let api = FakeApi::new();
    let (first, store) = common::logged_in(&api).await;
    drop(first);
    api.expire_access();

    let session = Session::new(api.clone(), store.clone());
    assert_eq!(session.init().await.phase(), SessionPhase::Authenticated);
    assert_eq!(api.calls("auth/refresh/"), 1);
    assert_eq!(stored(&*store, ACCESS_TOKEN_KEY).await.as_deref(), Some("A2"));
}

#[tokio::test]
async fn test_file_store_survives_restart() {
    let path = std::env::temp_dir().join(format!("bookhub-it-{}.json", uuid::Uuid::new_v4()));
    let api = FakeApi::new();

    {
        let store = Arc::new(FileStore::open(&path).await.unwrap());
        let session = Session::new(api.clone(), store);
        session.init().await;
        session.login(EMAIL, PASSWORD).await.unwrap();
    }

    let store = Arc::new(FileStore::open(&path).await.unwrap());
    let session = Session::new(api.clone(), store.clone());
    let snapshot = session.init().await;
    assert_eq!(snapshot.user.map(|u| u.username), Some("a".to_string()));

    // Closing the view keeps the credentials, logging out drops them
    session.teardown().await;
    assert_eq!(session.phase(), SessionPhase::Bootstrapping);
    assert_eq!(session.init().await.phase(), SessionPhase::Authenticated);

    session.logout().await;
    let reopened = Session::new(api.clone(), Arc::new(FileStore::open(&path).await.unwrap()));
    assert_eq!(reopened.init().await, SessionSnapshot::anonymous());

    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn test_sessions_are_independent() {
    let api = FakeApi::new();
    api.add_account(
        "root@test.com",
        "Admin@123",
        json!({"id": 2, "username": "root", "role": "ADMIN", "is_staff": true, "is_superuser": true}),
    );

    let (member, _) = common::logged_in(&api).await;
    let (admin, _) = common::session(&api);
    admin.init().await;
    admin.login("root@test.com", "Admin@123").await.unwrap();

    member.logout().await;
    assert_eq!(member.phase(), SessionPhase::Anonymous);
    assert_eq!(
        evaluate_path(&admin.snapshot(), "/admin/users"),
        Some(Decision::Render)
    );
}

#[tokio::test]
async fn test_services_share_one_session() {
    let api = FakeApi::new();
    let services = Services::new(api.clone(), Arc::new(bookhub_client::storage::MemoryStore::new()));
    services.session.init().await;
    services.session.login(EMAIL, PASSWORD).await.unwrap();

    api.expire_access();
    api.revoke_refresh();

    assert_eq!(
        services.library.list_books(&Default::default()).await,
        Err(ClientError::SessionExpired)
    );
    assert_eq!(services.session.phase(), SessionPhase::Anonymous);
}
