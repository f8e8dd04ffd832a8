//! CLI end-to-end tests that invoke the compiled `channel-sync` binary.
//!
//! State is prepared through the library against the same file store the
//! binary opens, then the binary runs with the workspace as its current
//! directory.

use assert_cmd::Command;
use chrono::{Duration, Utc};
use predicates::prelude::*;
use sync_core::{
    Channel, HolderToken, Instruction, InstructionQueue, InstructionType, LockManager,
    OperationParams, Priority, ProcessingRunner, RunRequest, TargetRef,
};
use sync_test_utils::{ScriptedChannel, Step, TestWorkspace, snapshots};

/// `channel-sync` running inside `ws`, isolated from the user's config
fn cli(ws: &TestWorkspace) -> Command {
    let mut cmd = Command::cargo_bin("channel-sync").unwrap();
    cmd.current_dir(ws.root())
        .env("XDG_CONFIG_HOME", ws.root().join(".config"))
        .env("NO_COLOR", "1")
        .env_remove("CHANNEL_SYNC_CONFIG")
        .env_remove("CHANNEL_SYNC_STORE")
        .env_remove("RUST_LOG");
    cmd
}

fn listing_product() -> TargetRef {
    TargetRef::listing_product(Channel::Ebay, 7)
}

#[test]
fn help_lists_commands() {
    let ws = TestWorkspace::new();
    cli(&ws)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("queue").and(predicate::str::contains("reap")));
}

#[test]
fn no_command_prints_hint() {
    let ws = TestWorkspace::new();
    cli(&ws)
        .assert()
        .success()
        .stdout(predicate::str::contains("channel-sync --help"));
}

#[test]
fn empty_queue_is_reported() {
    let ws = TestWorkspace::new();
    cli(&ws)
        .args(["queue", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Queue is empty"));
}

#[test]
fn pending_count_for_target() {
    let ws = TestWorkspace::new();
    InstructionQueue::new(ws.store())
        .enqueue(Instruction::new(
            "template_payment_change_processor",
            listing_product(),
            InstructionType::PaymentDataChanged,
            Priority::LISTED,
        ))
        .unwrap();

    cli(&ws)
        .args(["queue", "pending", "--target", "ebay:listing_product:7"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 override pending"))
        .stdout(predicate::str::contains("PAYMENT_DATA_CHANGED"));
}

#[test]
fn queue_list_json_is_parseable() {
    let ws = TestWorkspace::new();
    InstructionQueue::new(ws.store())
        .enqueue(Instruction::new(
            "template_shipping_change_processor",
            listing_product(),
            InstructionType::ShippingDataChanged,
            Priority::NOT_LISTED,
        ))
        .unwrap();

    let output = cli(&ws).args(["queue", "list", "--json"]).output().unwrap();
    assert!(output.status.success());

    let rows: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(rows[0]["type"], "SHIPPING_DATA_CHANGED");
    assert_eq!(rows[0]["priority"], 5);
}

#[test]
fn locks_can_be_listed_and_released() {
    let ws = TestWorkspace::new();
    let account = TargetRef::account(Channel::Walmart, 3);
    let holder = HolderToken::generate();
    LockManager::new(ws.store())
        .acquire(Some("server_synchronize"), &account, &holder)
        .unwrap();

    cli(&ws)
        .args(["locks", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("walmart:account:3"))
        .stdout(predicate::str::contains("server_synchronize"));

    let holder_arg = holder.to_string();
    cli(&ws)
        .args(["locks", "release", "--target", "walmart:account:3", "--holder", &holder_arg])
        .assert()
        .success()
        .stdout(predicate::str::contains("Released 1 lock(s)"));

    assert!(LockManager::new(ws.store()).all_locks().unwrap().is_empty());
}

#[test]
fn releasing_unheld_lock_is_not_an_error() {
    let ws = TestWorkspace::new();
    let holder_arg = HolderToken::generate().to_string();
    cli(&ws)
        .args(["locks", "release", "--target", "ebay:listing:1", "--holder", &holder_arg, "--global"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no matching lock"));
}

#[test]
fn reap_dry_run_keeps_stale_locks() {
    let ws = TestWorkspace::new();
    let locks = LockManager::new(ws.store());
    let holder = HolderToken::generate();
    let account = TargetRef::account(Channel::Amazon, 9);
    locks.acquire(None, &account, &holder).unwrap();
    locks.heartbeat_at(&holder, Utc::now() - Duration::hours(2)).unwrap();

    cli(&ws)
        .args(["reap", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Would release amazon:account:9"));
    assert_eq!(locks.all_locks().unwrap().len(), 1);

    cli(&ws)
        .arg("reap")
        .assert()
        .success()
        .stdout(predicate::str::contains("Released amazon:account:9"));
    assert!(locks.all_locks().unwrap().is_empty());
}

#[test]
fn reap_respects_configured_threshold() {
    let ws = TestWorkspace::new();
    ws.write_config("[locks]\nstale_after_secs = 86400\nheartbeat_interval_secs = 60\n");
    let locks = LockManager::new(ws.store());
    let holder = HolderToken::generate();
    locks.acquire(None, &TargetRef::account(Channel::Amazon, 9), &holder).unwrap();
    locks.heartbeat_at(&holder, Utc::now() - Duration::hours(2)).unwrap();

    cli(&ws)
        .arg("reap")
        .assert()
        .success()
        .stdout(predicate::str::contains("No stale locks"));
}

#[test]
fn reap_prunes_finished_runs_past_retention() {
    let ws = TestWorkspace::new();
    ws.write_config("[runs]\nretain_secs = 0\n");
    let runner = ProcessingRunner::new(ws.store()).with_executor(ScriptedChannel::new(Channel::Ebay));
    for _ in 0..3 {
        runner
            .run(RunRequest::new(OperationParams::new("revise", listing_product())))
            .unwrap();
    }
    assert_eq!(runner.log().all().unwrap().len(), 3);

    cli(&ws)
        .arg("reap")
        .assert()
        .success()
        .stdout(predicate::str::contains("Pruned 3 finished run(s)"));
    assert!(runner.log().all().unwrap().is_empty());
}

#[test]
fn reap_keeps_recent_runs_by_default() {
    let ws = TestWorkspace::new();
    ProcessingRunner::new(ws.store())
        .with_executor(ScriptedChannel::new(Channel::Ebay))
        .run(RunRequest::new(OperationParams::new("revise", listing_product())))
        .unwrap();

    cli(&ws)
        .arg("reap")
        .assert()
        .success()
        .stdout(predicate::str::contains("No stale locks"));
    assert_eq!(ProcessingRunner::new(ws.store()).log().all().unwrap().len(), 1);
}

#[test]
fn lock_check_reports_busy_and_free_targets() {
    let ws = TestWorkspace::new();
    let holder = HolderToken::generate();
    LockManager::new(ws.store())
        .acquire(Some("server_synchronize"), &TargetRef::account(Channel::Walmart, 3), &holder)
        .unwrap();

    cli(&ws)
        .args(["locks", "check", "--target", "walmart:account:3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("walmart:account:3 is busy"))
        .stdout(predicate::str::contains(holder.to_string()));

    cli(&ws)
        .args(["locks", "check", "--target", "walmart:account:3", "--owner", "adding_to_server"])
        .assert()
        .success()
        .stdout(predicate::str::contains("is free"));

    cli(&ws)
        .args(["locks", "check", "--target", "walmart:account:4"])
        .assert()
        .success()
        .stdout(predicate::str::contains("walmart:account:4 is free"));
}

#[test]
fn diff_previews_listed_priority() {
    let ws = TestWorkspace::new();
    let old = ws.write_snapshot("old.json", &snapshots::payment(&["paypal"]));
    let new = ws.write_snapshot("new.json", &snapshots::payment(&["paypal", "card"]));

    cli(&ws)
        .args(["diff", "payment"])
        .arg(&old)
        .arg(&new)
        .args(["--status", "listed"])
        .assert()
        .success()
        .stdout(predicate::str::contains("payment"))
        .stdout(predicate::str::contains("[ 30] PAYMENT_DATA_CHANGED"));

    // Preview only
    assert_eq!(
        InstructionQueue::new(ws.store())
            .pending_count(&listing_product())
            .unwrap(),
        0
    );
}

#[test]
fn diff_enqueue_adds_instructions() {
    let ws = TestWorkspace::new();
    let old = ws.write_snapshot("old.json", &snapshots::shipping(1));
    let new = ws.write_snapshot("new.json", &snapshots::shipping(3));

    cli(&ws)
        .args(["diff", "shipping"])
        .arg(&old)
        .arg(&new)
        .args(["--target", "ebay:listing_product:7", "--enqueue"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Enqueued 1 instruction(s)"));

    let pending = InstructionQueue::new(ws.store())
        .list_pending(&listing_product())
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].priority, Priority::NOT_LISTED);
}

#[test]
fn diff_rejects_snapshot_of_other_policy() {
    let ws = TestWorkspace::new();
    let old = ws.write_snapshot("old.json", &snapshots::payment(&["paypal"]));
    let new = ws.write_snapshot("new.json", &snapshots::payment(&["card"]));

    cli(&ws)
        .args(["diff", "shipping"])
        .arg(&old)
        .arg(&new)
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected template_shipping"));
}

#[test]
fn runs_show_operation_log() {
    let ws = TestWorkspace::new();
    let runner = ProcessingRunner::new(ws.store())
        .with_executor(ScriptedChannel::new(Channel::Ebay).then(Step::FailRetryable("rate limited")));
    runner
        .run(RunRequest::new(OperationParams::new("revise", listing_product())))
        .unwrap();

    cli(&ws)
        .args(["runs", "--target", "ebay:listing_product:7"])
        .assert()
        .success()
        .stdout(predicate::str::contains("revise"))
        .stdout(predicate::str::contains("failed"))
        .stdout(predicate::str::contains("rate limited"));
}

#[test]
fn invalid_target_fails_with_message() {
    let ws = TestWorkspace::new();
    cli(&ws)
        .args(["queue", "pending", "--target", "etsy:shop:1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"))
        .stderr(predicate::str::contains("invalid target"));
}
