//! Integration test harness
//!
//! End-to-end scenarios: every command runs in its own process against a
//! sandboxed workspace, the way the agent host invokes the switcher.

mod common;

use std::fs;

use serde_json::{json, Value};

use common::Sandbox;

/// Create a backup folder by hand with a fixed timestamp.
fn seed_backup(sandbox: &Sandbox, personality: &str, stamp: &str) {
    let dir = sandbox.backups().join(personality).join(stamp);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("SOUL.md"), stamp).unwrap();
}

fn backup_count(sandbox: &Sandbox) -> usize {
    let Ok(personalities) = fs::read_dir(sandbox.backups()) else {
        return 0;
    };
    personalities
        .flatten()
        .map(|p| fs::read_dir(p.path()).map(|d| d.count()).unwrap_or(0))
        .sum()
}

// ─────────────────────────────────────────────────────────────────
// Switch / Restore
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_work_home_restore_after_restart() {
    let sandbox = Sandbox::new();
    sandbox.write_live("SOUL.md", "original soul");
    sandbox.ok(&["init"]);

    sandbox.write_live("SOUL.md", "work soul");
    sandbox.ok(&["create", "work", "--description", "Office"]);
    sandbox.write_live("SOUL.md", "home soul");
    sandbox.ok(&["create", "home"]);

    sandbox.ok(&["switch", "work"]);

    // Something clobbers the workspace while the agent is down.
    sandbox.write_live("SOUL.md", "half-written");

    let record = sandbox.ok(&["restore"]);
    assert_eq!(record["data"]["active"], "work");
    assert_eq!(sandbox.live("SOUL.md"), sandbox.stored("work", "SOUL.md"));
    assert_eq!(sandbox.live("SOUL.md").as_deref(), Some("work soul"));
}

#[test]
fn test_switch_then_restore_keeps_ledger() {
    let sandbox = Sandbox::new();
    sandbox.ok(&["init"]);
    sandbox.install("work", "w");

    let record = sandbox.ok(&["switch", "work"]);
    assert_eq!(record["data"]["previous"], "default");

    sandbox.ok(&["restore"]);
    assert_eq!(sandbox.active().as_deref(), Some("work"));
}

#[test]
fn test_repeated_restore_writes_nothing() {
    let sandbox = Sandbox::new();
    sandbox.ok(&["init"]);
    sandbox.install("work", "w");
    sandbox.ok(&["switch", "work"]);

    let ledger_before = fs::read(sandbox.ledger_path()).unwrap();
    for _ in 0..3 {
        let record = sandbox.ok(&["restore"]);
        assert_eq!(record["data"]["files"]["written"], json!([]));
        assert_eq!(record["data"]["ledger_written"], false);
    }
    assert_eq!(fs::read(sandbox.ledger_path()).unwrap(), ledger_before);
}

#[test]
fn test_corrupt_ledger_restores_default() {
    let sandbox = Sandbox::new();
    sandbox.ok(&["init"]);
    sandbox.install("work", "w");
    sandbox.ok(&["switch", "work"]);

    fs::write(sandbox.ledger_path(), "\0\0garbage").unwrap();
    let record = sandbox.ok(&["restore"]);

    assert_eq!(record["data"]["active"], "default");
    assert_eq!(record["data"]["ledger"], "corrupt");
    assert_eq!(sandbox.active().as_deref(), Some("default"));
    assert_eq!(sandbox.live("SOUL.md"), sandbox.stored("default", "SOUL.md"));
}

#[test]
fn test_restore_without_default_is_fatal() {
    let sandbox = Sandbox::new();
    let (record, code) = sandbox.run(&["restore"]);

    assert_eq!(record["kind"], "no_valid_personality");
    assert_eq!(code, 40);
}

#[test]
fn test_switch_backs_up_outgoing_workspace() {
    let sandbox = Sandbox::new();
    sandbox.ok(&["init"]);
    sandbox.install("work", "w");
    sandbox.write_live("SOUL.md", "local edits");

    let record = sandbox.ok(&["switch", "work"]);

    let backup = record["data"]["backup"].as_str().unwrap();
    assert!(backup.contains("default"));
    assert_eq!(
        fs::read_to_string(std::path::Path::new(backup).join("SOUL.md")).unwrap(),
        "local edits"
    );
}

// ─────────────────────────────────────────────────────────────────
// Delete / Rename
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_delete_default_refused() {
    let sandbox = Sandbox::new();
    sandbox.ok(&["init"]);
    sandbox.install("work", "w");

    let (record, code) = sandbox.run(&["delete", "default"]);

    assert_eq!(record["kind"], "cannot_delete_default");
    assert_eq!(code, 30);
    assert!(sandbox.store().join("default").is_dir());
    assert!(sandbox.store().join("work").is_dir());
}

#[test]
fn test_delete_active_falls_back_to_default() {
    let sandbox = Sandbox::new();
    sandbox.ok(&["init"]);
    sandbox.install("work", "w");
    sandbox.ok(&["switch", "work"]);

    let record = sandbox.ok(&["delete", "work"]);

    assert_eq!(record["data"]["switched_to_default"], true);
    assert_eq!(sandbox.active().as_deref(), Some("default"));
    assert!(!sandbox.store().join("work").exists());
    assert!(sandbox.backups().join("work").is_dir());
}

#[test]
fn test_delete_missing() {
    let sandbox = Sandbox::new();
    sandbox.ok(&["init"]);

    let (record, _) = sandbox.run(&["delete", "ghost"]);
    assert_eq!(record["kind"], "not_found");
}

#[test]
fn test_rename_active_keeps_ledger_consistent() {
    let sandbox = Sandbox::new();
    sandbox.ok(&["init"]);
    sandbox.install("work", "w");
    sandbox.ok(&["switch", "work"]);

    let record = sandbox.ok(&["rename", "work", "office"]);

    assert_eq!(record["data"]["ledger_updated"], true);
    assert_eq!(sandbox.active().as_deref(), Some("office"));
    assert_eq!(sandbox.ok(&["restore"])["data"]["active"], "office");

    let (record, _) = sandbox.run(&["rename", "default", "base"]);
    assert_eq!(record["kind"], "cannot_rename_default");
}

// ─────────────────────────────────────────────────────────────────
// List / Status / Create
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_list_and_status() {
    let sandbox = Sandbox::new();
    sandbox.ok(&["init"]);
    sandbox.ok(&["create", "work", "--template", "--description", "Office"]);
    sandbox.ok(&["switch", "work"]);

    let record = sandbox.ok(&["list"]);
    let list = record["data"]["personalities"].as_array().unwrap();
    let summary: Vec<(&str, &str)> = list
        .iter()
        .map(|p| (p["name"].as_str().unwrap(), p["state"].as_str().unwrap()))
        .collect();
    assert_eq!(summary, vec![("default", "inactive"), ("work", "active")]);
    assert_eq!(list[1]["description"], "Office");

    sandbox.write_live("SOUL.md", "tweaked");
    let status = sandbox.ok(&["status"]);
    assert_eq!(status["data"]["ledger"], "ok");
    assert_eq!(status["data"]["active"], "work");
    assert_eq!(status["data"]["previous"], "default");
    assert_eq!(status["data"]["drifted"], json!(["SOUL.md"]));
}

#[test]
fn test_create_from_other_personality_and_duplicate() {
    let sandbox = Sandbox::new();
    sandbox.ok(&["init"]);
    sandbox.install("work", "work soul");

    sandbox.ok(&["create", "work2", "--from", "work"]);
    assert_eq!(sandbox.stored("work2", "SOUL.md").as_deref(), Some("work soul"));

    let (record, code) = sandbox.run(&["create", "work", "--template"]);
    assert_eq!(record["kind"], "already_exists");
    assert_eq!(code, 30);
}

// ─────────────────────────────────────────────────────────────────
// Backup Retention
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_cleanup_keeps_most_recent() {
    let sandbox = Sandbox::new();
    for day in 1..=10 {
        seed_backup(&sandbox, "work", &format!("202601{:02}T120000.000Z", day));
    }

    let record = sandbox.ok(&["cleanup-backups", "--keep", "3", "--days", "1"]);

    assert_eq!(record["data"]["deleted"], 7);
    let mut left: Vec<String> = fs::read_dir(sandbox.backups().join("work"))
        .unwrap()
        .flatten()
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    left.sort();
    assert_eq!(
        left,
        vec![
            "20260108T120000.000Z",
            "20260109T120000.000Z",
            "20260110T120000.000Z"
        ]
    );
}

#[test]
fn test_cleanup_count_protects_old_backups() {
    let sandbox = Sandbox::new();
    for day in 1..=5 {
        seed_backup(&sandbox, "home", &format!("202001{:02}T000000.000Z", day));
    }

    let record = sandbox.ok(&["cleanup-backups", "--keep", "10", "--days", "7"]);

    assert_eq!(record["data"]["deleted"], 0);
    assert_eq!(backup_count(&sandbox), 5);
}

#[test]
fn test_cleanup_zero_keep_uses_age_only() {
    let sandbox = Sandbox::new();
    seed_backup(&sandbox, "work", "20200101T000000.000Z");
    let recent = chrono::Utc::now().format("%Y%m%dT%H%M%S%.3fZ").to_string();
    seed_backup(&sandbox, "work", &recent);

    let record = sandbox.ok(&["cleanup-backups", "--keep", "0", "--days", "30"]);

    assert_eq!(record["data"]["deleted"], 1);
    assert!(sandbox.backups().join("work").join(&recent).is_dir());
}

// ─────────────────────────────────────────────────────────────────
// Host Registration
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_register_commands_idempotent() {
    let sandbox = Sandbox::new();
    fs::write(&sandbox.host_path, r#"{"model":"x","commands":{"custom":["mine"]}}"#).unwrap();

    let first = sandbox.ok(&["commands", "register"]);
    let second = sandbox.ok(&["commands", "register"]);
    assert_eq!(first["data"]["changed"], true);
    assert_eq!(second["data"]["changed"], false);

    let host: Value = serde_json::from_str(&fs::read_to_string(&sandbox.host_path).unwrap()).unwrap();
    assert_eq!(host["model"], "x");
    assert_eq!(
        host["commands"]["custom"],
        json!(["mine", "personality", "personality-switch", "personality-restore"])
    );

    sandbox.ok(&["commands", "unregister"]);
    let host: Value = serde_json::from_str(&fs::read_to_string(&sandbox.host_path).unwrap()).unwrap();
    assert_eq!(host["commands"]["custom"], json!(["mine"]));
}

// ─────────────────────────────────────────────────────────────────
// Logging
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_log_file_creation() {
    let sandbox = Sandbox::new();
    let log_dir = sandbox.path().join("logs");

    let output = sandbox
        .cmd()
        .env("PSWITCH_LOG_FILE", log_dir.join("switcher.log"))
        .args(["-v", "init"])
        .output()
        .unwrap();

    assert!(output.status.success());
    assert!(log_dir.is_dir());
    assert!(fs::read_dir(&log_dir).unwrap().count() > 0);
}
