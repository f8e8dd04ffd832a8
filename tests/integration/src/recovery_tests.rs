//! Lock contention and crash recovery across runners
//!
//! Each runner opens its own handle on the same state file, the way separate
//! worker processes would.

use std::sync::{Arc, Barrier};
use std::thread;

use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;
use sync_core::runner::plan::{
    ADDING_TO_SERVER, OP_ADD_ACCOUNT, OP_SYNCHRONIZE, SERVER_SYNCHRONIZE, account_add_locks,
    listing_move_locks,
};
use sync_core::{
    Channel, Error, HolderToken, Instruction, InstructionQueue, InstructionType, LOCKED_MESSAGE,
    LockManager, OperationParams, Priority, ProcessingRunner, Reaper, RunReport, RunRequest,
    RunStatus, TargetRef,
};
use sync_test_utils::{ScriptedChannel, Step, TestWorkspace};

fn account() -> TargetRef {
    TargetRef::account(Channel::Walmart, 5)
}

/// Start `request` on a background runner that pauses inside the channel.
///
/// Returns once the channel call has begun; the run finishes after the
/// barrier is waited on a second time.
fn start_paused(
    ws: &TestWorkspace,
    channel: Channel,
    request: RunRequest,
) -> (Arc<Barrier>, thread::JoinHandle<RunReport>) {
    let barrier = Arc::new(Barrier::new(2));
    let store = ws.store();
    let script = ScriptedChannel::new(channel).then(Step::Pause(barrier.clone()));

    let handle = thread::spawn(move || {
        ProcessingRunner::new(store)
            .with_executor(script)
            .run(request)
            .unwrap()
    });
    barrier.wait();
    (barrier, handle)
}

#[test]
fn second_runner_is_turned_away_while_first_executes() {
    let ws = TestWorkspace::new();
    let (barrier, first) = start_paused(
        &ws,
        Channel::Walmart,
        RunRequest::new(OperationParams::new(OP_SYNCHRONIZE, account())),
    );

    let second = ProcessingRunner::new(ws.store())
        .with_executor(ScriptedChannel::new(Channel::Walmart));
    let report = second
        .run(RunRequest::new(OperationParams::new(OP_SYNCHRONIZE, account())))
        .unwrap();

    assert_eq!(report.status, RunStatus::Failed);
    assert!(report.failure.as_ref().is_some_and(Error::is_lock_conflict));
    let record = second.log().get(&report.holder).unwrap().unwrap();
    assert_eq!(record.error.as_deref(), Some(LOCKED_MESSAGE));

    barrier.wait();
    assert!(first.join().unwrap().is_success());
    assert!(second.locks().all_locks().unwrap().is_empty());
}

#[test]
fn account_add_holds_three_locks_while_running() {
    let ws = TestWorkspace::new();
    let (barrier, handle) = start_paused(
        &ws,
        Channel::Walmart,
        RunRequest::new(OperationParams::new(OP_ADD_ACCOUNT, account())),
    );

    let locks = LockManager::new(ws.store());
    let mut owners: Vec<Option<String>> = locks
        .locks_for(&account())
        .unwrap()
        .into_iter()
        .map(|l| l.owner)
        .collect();
    owners.sort();
    assert_eq!(
        owners,
        vec![
            None,
            Some(ADDING_TO_SERVER.to_string()),
            Some(SERVER_SYNCHRONIZE.to_string()),
        ]
    );

    barrier.wait();
    let report = handle.join().unwrap();
    assert!(report.is_success());
    assert!(locks.all_locks().unwrap().is_empty());
}

#[test]
fn reaper_frees_locks_of_crashed_holder() {
    let ws = TestWorkspace::new();
    let locks = LockManager::new(ws.store());
    let crashed = HolderToken::generate();
    let guard = locks
        .acquire_all(&account_add_locks(account()), &crashed)
        .unwrap();
    // The process died without running destructors
    std::mem::forget(guard);

    let channel = ScriptedChannel::new(Channel::Walmart);
    let runner = ProcessingRunner::new(ws.store()).with_executor(channel.clone());
    let blocked = runner
        .run(RunRequest::new(OperationParams::new(OP_ADD_ACCOUNT, account())))
        .unwrap();
    assert_eq!(blocked.status, RunStatus::Failed);
    assert_eq!(channel.call_count(), 0);

    let report = Reaper::new(ws.store(), Duration::minutes(15))
        .sweep_at(Utc::now() + Duration::hours(1))
        .unwrap();
    assert_eq!(report.released.len(), 3);
    assert!(report.released.iter().all(|s| s.lock.holder == crashed));

    let retried = runner
        .run(RunRequest::new(OperationParams::new(OP_ADD_ACCOUNT, account())))
        .unwrap();
    assert!(retried.is_success());
    assert_eq!(channel.call_count(), 1);
}

#[test]
fn reaped_run_is_failed_and_keeps_its_instructions() {
    let ws = TestWorkspace::new();
    let product = TargetRef::listing_product(Channel::Amazon, 40);
    let instruction = Instruction::new(
        "template_shipping_change_processor",
        product,
        InstructionType::ShippingDataChanged,
        Priority::LISTED,
    );
    let claim = instruction.claim();
    InstructionQueue::new(ws.store())
        .enqueue(instruction)
        .unwrap();

    let (barrier, handle) = start_paused(
        &ws,
        Channel::Amazon,
        RunRequest::new(OperationParams::new("revise", product)).with_instructions([claim]),
    );

    let sweep = Reaper::new(ws.store(), Duration::minutes(15))
        .sweep_at(Utc::now() + Duration::hours(1))
        .unwrap();
    assert_eq!(sweep.released.len(), 1);
    assert_eq!(sweep.failed_runs.len(), 1);

    barrier.wait();
    let report = handle.join().unwrap();
    assert_eq!(report.status, RunStatus::Failed);
    assert!(matches!(report.failure, Some(Error::LockLost { .. })));
    assert_eq!(sweep.failed_runs[0], report.holder);

    let runner = ProcessingRunner::new(ws.store());
    assert_eq!(runner.queue().pending_count(&product).unwrap(), 1);
    let record = runner.log().get(&report.holder).unwrap().unwrap();
    assert_eq!(record.status, RunStatus::Failed);
}

#[test]
fn blocked_move_leaves_no_partial_locks() {
    let ws = TestWorkspace::new();
    let source = TargetRef::listing(Channel::Ebay, 1);
    let destination = TargetRef::listing(Channel::Ebay, 2);
    let locks = LockManager::new(ws.store());
    let other = HolderToken::generate();
    locks.acquire(None, &destination, &other).unwrap();

    let runner = ProcessingRunner::new(ws.store()).with_executor(ScriptedChannel::new(Channel::Ebay));
    let report = runner
        .run(
            RunRequest::new(OperationParams::new("move_items", source))
                .with_locks(listing_move_locks(source, destination)),
        )
        .unwrap();

    assert_eq!(report.status, RunStatus::Failed);
    assert!(locks.locks_for(&source).unwrap().is_empty());
    assert_eq!(locks.locks_held_by(&other).unwrap().len(), 1);
}
