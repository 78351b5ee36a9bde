//! Registry election, reaping and on-disk safety tests.
//! Storage: ~/.claude/active/<session_id>.json

use std::cell::RefCell;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use assert_fs::prelude::*;
use predicates::prelude::predicate;
use rstest::rstest;
use slimductor_core::{
    paths, DirStore, EntryStore, Registration, Registry, RegistryError, Role, SessionId,
};

/// Simulated process table: pids in the set are alive.
struct Procs(RefCell<HashSet<u32>>);

impl Procs {
    fn new(pids: &[u32]) -> Self {
        Self(RefCell::new(pids.iter().copied().collect()))
    }
    fn kill(&self, pid: u32) {
        self.0.borrow_mut().remove(&pid);
    }
    fn spawn(&self, pid: u32) {
        self.0.borrow_mut().insert(pid);
    }
    fn alive(&self, pid: u32) -> bool {
        self.0.borrow().contains(&pid)
    }
}

fn registry<'a>(
    home: &Path,
    procs: &'a Procs,
) -> Registry<DirStore, impl Fn(u32) -> bool + 'a> {
    Registry::new(DirStore::at_home(home), move |pid: u32| procs.alive(pid))
}

fn reg(id: &str, pid: u32, cwd: &str) -> Registration {
    Registration::new(id, pid, cwd)
}

// ---------------------------------------------------------------------------
// 1. Election
// ---------------------------------------------------------------------------

#[test]
fn scenario_orchestrator_death_and_succession() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let procs = Procs::new(&[100, 200]);
    let registry = registry(home.path(), &procs);

    let first = registry.register(reg("s-100", 100, "/proj")).expect("register 100");
    let second = registry.register(reg("s-200", 200, "/proj")).expect("register 200");
    assert_eq!(first.role, Role::Orchestrator);
    assert_eq!(second.role, Role::Worker);

    let summary = registry.check().expect("check");
    assert_eq!(summary.total_active, 2);
    assert_eq!(summary.orchestrator_count, 1);

    procs.kill(100);
    procs.spawn(300);
    let third = registry.register(reg("s-300", 300, "/proj")).expect("register 300");
    assert_eq!(third.role, Role::Orchestrator);
    home.child(".claude/active/s-100.json")
        .assert(predicate::path::missing());

    let summary = registry.check().expect("check");
    assert_eq!(summary.total_active, 2);
    assert_eq!(summary.orchestrator_count, 1);
    assert!(summary.contested.is_empty());
}

#[rstest]
#[case(2)]
#[case(5)]
#[case(12)]
fn sequential_registrations_elect_one_orchestrator(#[case] sessions: u32) {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let pids: Vec<u32> = (1..=sessions).map(|n| 1000 + n).collect();
    let procs = Procs::new(&pids);
    let registry = registry(home.path(), &procs);

    for pid in &pids {
        registry
            .register(reg(&format!("s-{pid}"), *pid, "/proj"))
            .expect("register");
        let live = registry.domain(Path::new("/proj")).expect("domain");
        let leaders = live.iter().filter(|e| e.role == Role::Orchestrator).count();
        assert_eq!(leaders, 1, "after registering pid {pid}");
    }
}

#[test]
fn domains_are_independent() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let procs = Procs::new(&[1, 2, 3]);
    let registry = registry(home.path(), &procs);

    let a = registry.register(reg("a", 1, "/repo/a")).expect("a");
    let b = registry.register(reg("b", 2, "/repo/b")).expect("b");
    let a2 = registry.register(reg("a2", 3, "/repo/a")).expect("a2");

    assert_eq!(a.role, Role::Orchestrator);
    assert_eq!(b.role, Role::Orchestrator);
    assert_eq!(a2.role, Role::Worker);
    assert_eq!(registry.check().expect("check").orchestrator_count, 2);
}

#[test]
fn handover_via_vacating() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let procs = Procs::new(&[1, 2, 3]);
    let registry = registry(home.path(), &procs);

    registry.register(reg("lead", 1, "/proj")).expect("lead");
    let vacating = registry
        .set_role(&SessionId::from("lead"), Role::Vacating)
        .expect("vacate");
    assert_eq!(vacating.role, Role::Vacating);

    // a plain newcomer does not take a slot that is still held
    let plain = registry.register(reg("plain", 2, "/proj")).expect("plain");
    assert_eq!(plain.role, Role::Worker);

    let heir = registry
        .register(reg("heir", 3, "/proj").with_role(Some(Role::Orchestrator)))
        .expect("heir");
    assert_eq!(heir.role, Role::Orchestrator);

    let summary = registry.check().expect("check");
    assert_eq!(summary.orchestrator_count, 1);
    assert_eq!(summary.roles[&Role::Vacating], 1);
    assert_eq!(summary.roles[&Role::Worker], 1);
}

#[test]
fn takeover_refused_while_orchestrator_active() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let procs = Procs::new(&[1, 2]);
    let registry = registry(home.path(), &procs);

    registry.register(reg("lead", 1, "/proj")).expect("lead");
    let usurper = registry
        .register(reg("usurper", 2, "/proj").with_role(Some(Role::Orchestrator)))
        .expect("usurper");
    assert_eq!(usurper.role, Role::Worker);
}

#[test]
fn racing_orchestrators_are_reported_not_resolved() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let procs = Procs::new(&[1, 2]);
    let registry = registry(home.path(), &procs);
    let store = DirStore::at_home(home.path());

    // Both processes read an empty domain before either wrote.
    let a = registry.register(reg("a", 1, "/proj")).expect("a");
    let mut b = a.clone();
    b.session_id = SessionId::from("b");
    b.pid = 2;
    store.write(&b).expect("racing write");

    let summary = registry.check().expect("check");
    assert_eq!(summary.orchestrator_count, 2);
    assert_eq!(summary.contested, vec![PathBuf::from("/proj")]);
    assert!(summary.to_string().contains("contested domain: /proj"));

    let after = registry.list().expect("list");
    assert!(after.iter().all(|e| e.role == Role::Orchestrator), "check must not mutate roles");
}

// ---------------------------------------------------------------------------
// 2. Reaping, deregistration, round-trip
// ---------------------------------------------------------------------------

#[rstest]
#[case::register("register")]
#[case::check("check")]
#[case::list("list")]
fn every_read_path_reaps(#[case] op: &str) {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let procs = Procs::new(&[1, 2, 3]);
    let registry = registry(home.path(), &procs);

    registry.register(reg("dead", 1, "/proj")).expect("dead");
    registry.register(reg("live", 2, "/proj")).expect("live");
    procs.kill(1);

    match op {
        "register" => {
            registry.register(reg("new", 3, "/other")).expect("register");
        }
        "check" => {
            registry.check().expect("check");
        }
        "list" => {
            registry.list().expect("list");
        }
        other => unreachable!("unknown op {other}"),
    }

    home.child(".claude/active/dead.json")
        .assert(predicate::path::missing());
    let ids: Vec<_> = registry
        .list()
        .expect("list")
        .into_iter()
        .map(|e| e.session_id)
        .collect();
    assert!(!ids.contains(&SessionId::from("dead")));
    assert!(ids.contains(&SessionId::from("live")));
}

#[test]
fn deregister_is_idempotent() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let procs = Procs::new(&[1]);
    let registry = registry(home.path(), &procs);
    let id = SessionId::from("s-1");

    registry.deregister(&id).expect("never registered");
    registry.register(reg("s-1", 1, "/proj")).expect("register");
    registry.deregister(&id).expect("first");
    registry.deregister(&id).expect("second");
    assert!(registry.list().expect("list").is_empty());
}

#[test]
fn deregistered_orchestrator_frees_the_slot() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let procs = Procs::new(&[1, 2]);
    let registry = registry(home.path(), &procs);

    registry.register(reg("lead", 1, "/proj")).expect("lead");
    registry.deregister(&SessionId::from("lead")).expect("deregister");
    let next = registry.register(reg("next", 2, "/proj")).expect("next");
    assert_eq!(next.role, Role::Orchestrator);
}

#[test]
fn register_then_read_roundtrip() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let procs = Procs::new(&[77]);
    let registry = registry(home.path(), &procs);

    let written = registry.register(reg("rt", 77, "/srv/app")).expect("register");
    let read = registry.store().read(&SessionId::from("rt")).expect("read");
    assert_eq!(read, written);
    assert_eq!(read.pid, 77);
    assert_eq!(read.cwd, PathBuf::from("/srv/app"));
    assert_eq!(read.role, Role::Orchestrator);
    assert_eq!(registry.list().expect("list"), vec![written]);
}

// ---------------------------------------------------------------------------
// 3. On-disk safety
// ---------------------------------------------------------------------------

#[test]
fn malformed_entry_is_skipped_not_fatal() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let procs = Procs::new(&[1]);
    let registry = registry(home.path(), &procs);
    registry.register(reg("good", 1, "/proj")).expect("good");

    let dir = paths::registry_dir(home.path());
    fs::write(dir.join("truncated.json"), b"{\"pid\": 12, \"startedAt\": \"20").expect("write");
    fs::write(dir.join("wrong-role.json"), br#"{"pid":1,"startedAt":"2024-05-01T09:30:00Z","sessionId":"wrong-role","cwd":"/proj","role":"leader"}"#)
        .expect("write");

    let live = registry.list().expect("list");
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].session_id.as_str(), "good");

    // skipped, not reaped: the file is left for its owner
    home.child(".claude/active/truncated.json")
        .assert(predicate::path::exists());

    let err = registry
        .store()
        .read(&SessionId::from("truncated"))
        .unwrap_err();
    assert!(matches!(err, RegistryError::Malformed { .. }), "got: {err}");
    assert!(err.to_string().contains("truncated.json"));
}

#[test]
fn binary_entry_and_json_named_directory_do_not_block_operations() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let procs = Procs::new(&[1, 2]);
    let registry = registry(home.path(), &procs);
    registry.register(reg("good", 1, "/proj")).expect("good");

    home.child(".claude/active/garbage.json")
        .write_binary(&[0xff, 0xfe, 0x00, 0x7b])
        .expect("write");
    home.child(".claude/active/subdir.json")
        .create_dir_all()
        .expect("mkdir");

    let live = registry.list().expect("list");
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].session_id.as_str(), "good");

    let second = registry.register(reg("second", 2, "/proj")).expect("register");
    assert_eq!(second.role, Role::Worker);
    assert_eq!(registry.check().expect("check").total_active, 2);

    let err = registry
        .store()
        .read(&SessionId::from("garbage"))
        .unwrap_err();
    assert!(matches!(err, RegistryError::Malformed { .. }), "got: {err}");
    home.child(".claude/active/garbage.json")
        .assert(predicate::path::exists());
}

#[test]
fn mid_write_crash_leaves_original_intact() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let procs = Procs::new(&[1]);
    let registry = registry(home.path(), &procs);
    registry.register(reg("s-1", 1, "/proj")).expect("register");

    let store = DirStore::at_home(home.path());
    let path = store.entry_path(&SessionId::from("s-1"));
    let original = fs::read(&path).expect("read original");

    // Simulate crash: .tmp written but process died before rename
    let tmp = paths::entry_tmp_path(store.dir(), "s-1");
    fs::write(&tmp, b"CRASH - INCOMPLETE WRITE").expect("write crash tmp");

    assert_eq!(fs::read(&path).expect("read after crash"), original);
    let live = registry.list().expect("list");
    assert_eq!(live.len(), 1, "orphan .tmp must not be enumerated");
}

#[test]
fn entry_file_is_pretty_json_with_wire_keys() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let procs = Procs::new(&[4242]);
    let registry = registry(home.path(), &procs);
    registry.register(reg("wire", 4242, "/proj")).expect("register");

    let raw = fs::read_to_string(home.path().join(".claude/active/wire.json")).expect("read");
    let value: serde_json::Value = serde_json::from_str(&raw).expect("json");
    let mut keys: Vec<_> = value.as_object().expect("object").keys().cloned().collect();
    keys.sort();
    assert_eq!(keys, ["cwd", "pid", "role", "sessionId", "startedAt"]);
    assert_eq!(value["role"], "orchestrator");
    assert!(raw.contains('\n'), "entries are pretty-printed");
}

// ---------------------------------------------------------------------------
// 4. Production binding
// ---------------------------------------------------------------------------

#[test]
fn open_at_honors_config_dir() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".claude/slimductor.yaml")
        .write_str("registry_dir: sessions\n")
        .expect("config");

    let registry = Registry::open_at(home.path()).expect("open");
    registry
        .register(reg("me", std::process::id(), "/proj"))
        .expect("register");

    home.child(".claude/sessions/me.json")
        .assert(predicate::path::exists());
    home.child(".claude/active").assert(predicate::path::missing());
}

#[cfg(unix)]
#[test]
fn open_at_reaps_with_os_liveness() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let registry = Registry::open_at(home.path()).expect("open");
    let store = DirStore::at_home(home.path());

    let me = registry
        .register(reg("me", std::process::id(), "/proj"))
        .expect("register");
    let mut ghost = me.clone();
    ghost.session_id = SessionId::from("ghost");
    ghost.pid = 4_194_304; // beyond the Linux PID range
    store.write(&ghost).expect("write ghost");

    let live = registry.list().expect("list");
    assert_eq!(live, vec![me]);
}

#[test]
fn malformed_config_is_surfaced() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".claude/slimductor.yaml")
        .write_str("max_age_hours: nope\n")
        .expect("config");
    let err = Registry::open_at(home.path()).unwrap_err();
    assert!(matches!(err, RegistryError::Config { .. }), "got: {err}");
}
