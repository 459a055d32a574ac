use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use sessreg_core::{
    Backend, Clock, DirBackend, FrozenClock, Id, MemoryBackend, Party, Registry, RegistryError,
    Session, TerminalParams, UpdateRequest, ACTIVE_SESSION_TTL,
};
use tempfile::TempDir;

struct Fixture {
    reg: Registry,
    clock: Arc<FrozenClock>,
    _dir: Option<TempDir>,
}

fn frozen() -> Arc<FrozenClock> {
    Arc::new(FrozenClock::new(Utc.with_ymd_and_hms(2016, 9, 8, 7, 6, 5).unwrap()))
}

fn memory() -> Fixture {
    let clock = frozen();
    let reg = Registry::new(Arc::new(MemoryBackend::new())).with_clock(clock.clone());
    Fixture { reg, clock, _dir: None }
}

async fn on_disk() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let backend: Arc<dyn Backend> = Arc::new(DirBackend::open(dir.path().join("db")).await.unwrap());
    let clock = frozen();
    let reg = Registry::new(backend).with_clock(clock.clone());
    Fixture { reg, clock, _dir: Some(dir) }
}

fn session(f: &Fixture, login: &str) -> Session {
    Session::new(login, TerminalParams::new(100, 100), f.clock.now())
}

fn party(f: &Fixture, user: &str, addr: &str) -> Party {
    Party::new(user, addr, "luna", f.clock.now())
}

/// Runs a scenario once per backend.
macro_rules! both_backends {
    ($($name:ident),* $(,)?) => {
        mod memory_backend {
            $(
                #[tokio::test]
                async fn $name() {
                    super::$name(super::memory()).await;
                }
            )*
        }
        mod dir_backend {
            $(
                #[tokio::test]
                async fn $name() {
                    super::$name(super::on_disk().await).await;
                }
            )*
        }
    };
}

both_backends!(
    sessions_crud,
    sessions_inactivity,
    parties_crud,
    duplicate_create_fails,
    update_missing_fails,
    delete_session,
    purge_expired,
    deactivated_sessions_leave_listing,
    touch_keeps_session_alive,
    expired_session_cannot_be_updated,
    invalid_session_is_rejected,
    uppercase_duplicate_id_is_rejected,
);

async fn sessions_crud(f: Fixture) {
    let out = f.reg.get_sessions().await.unwrap();
    assert!(out.is_empty());

    let mut sess = Session {
        id: Id::new(),
        active: true,
        terminal_params: TerminalParams::new(100, 100),
        login: "bob".into(),
        last_active: f.clock.now(),
        created: f.clock.now(),
        parties: Vec::new(),
    };
    f.reg.create_session(&sess).await.unwrap();

    let out = f.reg.get_sessions().await.unwrap();
    assert_eq!(out, vec![sess.clone()]);

    let s2 = f.reg.get_session(&sess.id).await.unwrap();
    assert_eq!(s2.as_ref(), Some(&sess));

    // mark session inactive
    f.reg
        .update_session(UpdateRequest::new(sess.id.clone()).active(false))
        .await
        .unwrap();
    sess.active = false;
    let s2 = f.reg.get_session(&sess.id).await.unwrap();
    assert_eq!(s2.as_ref(), Some(&sess));

    // update terminal parameters
    f.reg
        .update_session(UpdateRequest::new(sess.id.clone()).terminal_params(TerminalParams::new(101, 101)))
        .await
        .unwrap();
    sess.terminal_params = TerminalParams::new(101, 101);
    let s2 = f.reg.get_session(&sess.id).await.unwrap();
    assert_eq!(s2.as_ref(), Some(&sess));
}

async fn sessions_inactivity(f: Fixture) {
    let sess = session(&f, "bob");
    f.reg.create_session(&sess).await.unwrap();

    f.clock.sleep(ACTIVE_SESSION_TTL - Duration::from_secs(1));
    assert!(f.reg.get_session(&sess.id).await.unwrap().is_some());

    f.clock.sleep(Duration::from_secs(2));
    assert!(f.reg.get_session(&sess.id).await.unwrap().is_none());
    assert!(f.reg.get_sessions().await.unwrap().is_empty());
}

async fn parties_crud(f: Fixture) {
    let sess = session(&f, "vincent");
    f.reg.create_session(&sess).await.unwrap();

    // add two people
    let parties = vec![
        party(&f, "first", "1_remote_addr"),
        party(&f, "second", "2_remote_addr"),
    ];
    f.reg
        .update_session(UpdateRequest::new(sess.id.clone()).parties(parties.clone()))
        .await
        .unwrap();
    let copy = f.reg.get_session(&sess.id).await.unwrap().unwrap();
    assert_eq!(copy.parties, parties);

    // empty update: nothing changes, parties included
    f.reg.update_session(UpdateRequest::new(sess.id.clone())).await.unwrap();
    let mut copy = f.reg.get_session(&sess.id).await.unwrap().unwrap();
    assert_eq!(copy.parties.len(), 2);
    assert_eq!(copy.terminal_params, sess.terminal_params);
    assert_eq!(copy.last_active, sess.last_active);

    // remove the second party
    assert!(copy.remove_party(&parties[1].id));
    assert!(!copy.remove_party(&Id::new()));
    f.reg
        .update_session(UpdateRequest::new(copy.id.clone()).parties(copy.parties.clone()))
        .await
        .unwrap();
    let copy = f.reg.get_session(&sess.id).await.unwrap().unwrap();
    assert_eq!(copy.parties.len(), 1);
    assert_eq!(copy.parties[0].id, parties[0].id);
}

async fn duplicate_create_fails(f: Fixture) {
    let sess = session(&f, "bob");
    f.reg.create_session(&sess).await.unwrap();

    let mut again = session(&f, "alice");
    again.id = sess.id.clone();
    let err = f.reg.create_session(&again).await.unwrap_err();
    assert!(err.is_already_exists(), "{err}");

    let stored = f.reg.get_session(&sess.id).await.unwrap().unwrap();
    assert_eq!(stored.login, "bob");
}

async fn update_missing_fails(f: Fixture) {
    let err = f
        .reg
        .update_session(UpdateRequest::new(Id::new()).active(false))
        .await
        .unwrap_err();
    assert!(err.is_not_found(), "{err}");
}

async fn delete_session(f: Fixture) {
    let sess = session(&f, "bob");
    f.reg.create_session(&sess).await.unwrap();

    f.reg.delete_session(&sess.id).await.unwrap();
    assert!(f.reg.get_session(&sess.id).await.unwrap().is_none());

    let err = f.reg.delete_session(&sess.id).await.unwrap_err();
    assert!(err.is_not_found(), "{err}");
}

async fn purge_expired(f: Fixture) {
    let old = session(&f, "old");
    f.reg.create_session(&old).await.unwrap();

    f.clock.sleep(ACTIVE_SESSION_TTL);
    let fresh = session(&f, "fresh");
    f.reg.create_session(&fresh).await.unwrap();

    let removed = f.reg.purge_expired().await.unwrap();
    assert_eq!(removed, vec![old.id.clone()]);

    // gone from the backend, so it cannot be deleted again
    assert!(f.reg.delete_session(&old.id).await.unwrap_err().is_not_found());
    assert_eq!(f.reg.get_sessions().await.unwrap(), vec![fresh]);
    assert!(f.reg.purge_expired().await.unwrap().is_empty());
}

async fn deactivated_sessions_leave_listing(f: Fixture) {
    let a = session(&f, "a");
    let b = session(&f, "b");
    f.reg.create_session(&a).await.unwrap();
    f.reg.create_session(&b).await.unwrap();
    assert_eq!(f.reg.get_sessions().await.unwrap().len(), 2);

    f.reg
        .update_session(UpdateRequest::new(a.id.clone()).active(false))
        .await
        .unwrap();

    let live = f.reg.get_sessions().await.unwrap();
    assert_eq!(live, vec![b]);
    // still readable directly
    let a2 = f.reg.get_session(&a.id).await.unwrap().unwrap();
    assert!(!a2.active);
}

async fn touch_keeps_session_alive(f: Fixture) {
    let sess = session(&f, "bob");
    f.reg.create_session(&sess).await.unwrap();

    for _ in 0..3 {
        f.clock.sleep(ACTIVE_SESSION_TTL - Duration::from_secs(1));
        f.reg.touch_session(&sess.id).await.unwrap();
    }

    let stored = f.reg.get_session(&sess.id).await.unwrap().unwrap();
    assert_eq!(stored.last_active, f.clock.now());
    assert_eq!(stored.created, sess.created);
}

async fn expired_session_cannot_be_updated(f: Fixture) {
    let sess = session(&f, "bob");
    f.reg.create_session(&sess).await.unwrap();
    f.clock.sleep(ACTIVE_SESSION_TTL + Duration::from_secs(1));

    let err = f.reg.touch_session(&sess.id).await.unwrap_err();
    assert!(err.is_not_found(), "{err}");
}

async fn invalid_session_is_rejected(f: Fixture) {
    let mut sess = session(&f, "bob");
    sess.terminal_params = TerminalParams::new(0, 24);
    assert!(matches!(
        f.reg.create_session(&sess).await,
        Err(RegistryError::BadParameter(_))
    ));

    let sess = session(&f, "");
    assert!(matches!(
        f.reg.create_session(&sess).await,
        Err(RegistryError::BadParameter(_))
    ));

    let mut sess = session(&f, "bob");
    sess.active = false;
    assert!(matches!(
        f.reg.create_session(&sess).await,
        Err(RegistryError::BadParameter(_))
    ));
    assert!(f.reg.get_session(&sess.id).await.unwrap().is_none());

    let sess = session(&f, "bob");
    f.reg.create_session(&sess).await.unwrap();
    let p = party(&f, "first", "addr");
    let err = f
        .reg
        .update_session(UpdateRequest::new(sess.id.clone()).parties(vec![p.clone(), p]))
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::BadParameter(_)), "{err}");
    assert_eq!(f.reg.get_sessions().await.unwrap().len(), 1);
}

async fn uppercase_duplicate_id_is_rejected(f: Fixture) {
    let sess = session(&f, "bob");
    f.reg.create_session(&sess).await.unwrap();

    let upper: Id = serde_json::from_value(serde_json::Value::String(sess.id.as_str().to_uppercase())).unwrap();
    assert_eq!(Id::parse(upper.as_str()).unwrap(), sess.id);

    let mut again = session(&f, "alice");
    again.id = upper.clone();
    let err = f.reg.create_session(&again).await.unwrap_err();
    assert!(matches!(err, RegistryError::InvalidFormat(_)), "{err}");
    assert!(matches!(f.reg.get_session(&upper).await, Err(RegistryError::InvalidFormat(_))));

    assert_eq!(f.reg.get_sessions().await.unwrap(), vec![sess]);
}

#[tokio::test]
async fn records_survive_reopening_the_backend() {
    let dir = tempfile::tempdir().unwrap();
    let clock = frozen();
    let mut sess = Session::new("bob", TerminalParams::new(120, 40), clock.now());
    sess.parties.push(Party::new("first", "10.0.0.1:5000", "luna", clock.now()));

    {
        let backend = Arc::new(DirBackend::open(dir.path()).await.unwrap());
        let reg = Registry::new(backend).with_clock(clock.clone());
        reg.create_session(&sess).await.unwrap();
    }

    let backend = Arc::new(DirBackend::open(dir.path()).await.unwrap());
    let reg = Registry::new(backend).with_clock(clock.clone());
    assert_eq!(reg.get_session(&sess.id).await.unwrap(), Some(sess));
}

#[tokio::test]
async fn concurrent_creates_of_one_id_admit_exactly_one() {
    let f = memory();
    let sess = session(&f, "bob");

    let mut handles = Vec::new();
    for _ in 0..8 {
        let reg = f.reg.clone();
        let sess = sess.clone();
        handles.push(tokio::spawn(async move { reg.create_session(&sess).await }));
    }

    let mut ok = 0;
    for h in handles {
        match h.await.unwrap() {
            Ok(()) => ok += 1,
            Err(e) => assert!(e.is_already_exists(), "{e}"),
        }
    }
    assert_eq!(ok, 1);
}
