//! End-to-end pipeline tests
//!
//! Template change -> diff -> instructions -> queue -> runner -> channel,
//! all against a file-backed store as the service would run it.

use pretty_assertions::assert_eq;
use serde_json::json;
use sync_core::{
    AffectedTarget, Channel, EnqueueOutcome, Instruction, InstructionFilter, InstructionQueue,
    InstructionType, OperationParams, PolicyKind, Priority, PriorityTiers, ProcessingRunner,
    RunRequest, RunStatus, SyncStatus, TargetRef, TemplateLink, plan_propagation, propagate,
};
use sync_test_utils::{ScriptedChannel, Step, TestWorkspace, snapshots};

fn listed_product() -> TargetRef {
    TargetRef::listing_product(Channel::Ebay, 1)
}

fn hidden_product() -> TargetRef {
    TargetRef::listing_product(Channel::Ebay, 2)
}

fn affected() -> Vec<AffectedTarget> {
    vec![
        AffectedTarget::new(hidden_product(), SyncStatus::NotListed),
        AffectedTarget::new(listed_product(), SyncStatus::Listed),
    ]
}

/// Revise each target with its pending instructions
fn revise(target: &TargetRef, _pending: &[Instruction]) -> Option<RunRequest> {
    Some(RunRequest::new(OperationParams::new("revise", *target)))
}

#[test]
fn template_change_reaches_channel_and_clears_queue() {
    let ws = TestWorkspace::new();
    let store = ws.store();
    let queue = InstructionQueue::new(store.clone());

    let propagation = propagate(
        &snapshots::payment(&["paypal"]),
        &snapshots::payment(&["paypal", "card"]),
        &affected(),
        &PriorityTiers::default(),
        &queue,
    )
    .unwrap();
    assert_eq!(propagation.instructions.len(), 2);

    let channel = ScriptedChannel::new(Channel::Ebay);
    let runner = ProcessingRunner::new(store).with_executor(channel.clone());
    let reports = runner.drain(10, &InstructionFilter::all(), revise).unwrap();

    assert_eq!(reports.len(), 2);
    assert!(reports.iter().all(|r| r.is_success()));

    // Live listings are worked first
    let order: Vec<TargetRef> = channel.calls().iter().map(|p| p.target).collect();
    assert_eq!(order, vec![listed_product(), hidden_product()]);

    assert_eq!(queue.pending_count(&listed_product()).unwrap(), 0);
    assert_eq!(queue.pending_count(&hidden_product()).unwrap(), 0);
    assert!(runner.locks().all_locks().unwrap().is_empty());
}

#[test]
fn failed_run_leaves_work_for_next_pass() {
    let ws = TestWorkspace::new();
    let store = ws.store();
    let queue = InstructionQueue::new(store.clone());
    propagate(
        &snapshots::shipping(1),
        &snapshots::shipping(2),
        &[AffectedTarget::new(listed_product(), SyncStatus::Listed)],
        &PriorityTiers::default(),
        &queue,
    )
    .unwrap();

    let channel = ScriptedChannel::new(Channel::Ebay).then(Step::FailRetryable("service unavailable"));
    let runner = ProcessingRunner::new(store).with_executor(channel.clone());

    let first = runner.drain(10, &InstructionFilter::all(), revise).unwrap();
    assert_eq!(first[0].status, RunStatus::Failed);
    assert_eq!(queue.pending_count(&listed_product()).unwrap(), 1);
    assert!(runner.locks().all_locks().unwrap().is_empty());

    let second = runner.drain(10, &InstructionFilter::all(), revise).unwrap();
    assert!(second[0].is_success());
    assert_eq!(second[0].completed, 1);
    assert_eq!(queue.pending_count(&listed_product()).unwrap(), 0);
    assert_eq!(channel.call_count(), 2);

    let history = runner.log().history(&listed_product()).unwrap();
    let statuses: Vec<RunStatus> = history.iter().map(|r| r.status).collect();
    assert_eq!(statuses, vec![RunStatus::Succeeded, RunStatus::Failed]);
}

#[test]
fn repeated_changes_collapse_to_one_instruction() {
    let ws = TestWorkspace::new();
    let queue = InstructionQueue::new(ws.store());
    let target = [AffectedTarget::new(listed_product(), SyncStatus::NotListed)];
    let tiers = PriorityTiers::default();

    for methods in [["card"], ["cash"], ["wire"]] {
        propagate(&snapshots::payment(&["paypal"]), &snapshots::payment(&methods), &target, &tiers, &queue)
            .unwrap();
    }
    let pending = queue.list_pending(&listed_product()).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].priority, Priority::NOT_LISTED);

    // The product went live before the queue was drained
    let raised = queue
        .enqueue(Instruction::new(
            PolicyKind::Payment.initiator(),
            listed_product(),
            InstructionType::PaymentDataChanged,
            Priority::LISTED,
        ))
        .unwrap();
    assert_eq!(raised, EnqueueOutcome::Raised);
    assert_eq!(queue.list_pending(&listed_product()).unwrap()[0].priority, Priority::LISTED);
}

#[test]
fn listing_settings_link_change_targets_linked_kind_only() {
    let old = snapshots::listing_settings();
    let new = snapshots::with_link(
        snapshots::listing_settings(),
        PolicyKind::Payment,
        TemplateLink::template(12, json!({ "methods": ["card"] })),
    );

    let plan = plan_propagation(&old, &new, &affected(), &PriorityTiers::default()).unwrap();

    assert!(!plan.instructions.is_empty());
    assert!(plan
        .instructions
        .iter()
        .all(|i| i.initiator == PolicyKind::Payment.initiator()));
    assert!(plan
        .instructions
        .iter()
        .any(|i| i.instruction_type == InstructionType::PaymentDataChanged));
}

#[test]
fn unchanged_template_enqueues_nothing() {
    let ws = TestWorkspace::new();
    let queue = InstructionQueue::new(ws.store());
    let snapshot = snapshots::description("Blue mug", &["front.jpg"]);

    let propagation = propagate(&snapshot, &snapshot, &affected(), &PriorityTiers::default(), &queue).unwrap();

    assert!(propagation.diff.is_empty());
    assert!(propagation.instructions.is_empty());
    assert_eq!(queue.pending_count(&listed_product()).unwrap(), 0);
}

#[test]
fn queue_survives_reopening_the_store() {
    let ws = TestWorkspace::new();
    propagate(
        &snapshots::description("Blue mug", &["front.jpg"]),
        &snapshots::description("Blue mug", &["front.jpg", "side.jpg"]),
        &[AffectedTarget::new(listed_product(), SyncStatus::Listed)],
        &PriorityTiers::default(),
        &InstructionQueue::new(ws.store()),
    )
    .unwrap();

    let reopened = InstructionQueue::new(ws.store());
    let pending = reopened.list_pending(&listed_product()).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].instruction_type, InstructionType::ImagesDataChanged);

    let state = ws.read_state();
    assert_eq!(state["instructions"].as_array().map(Vec::len), Some(1));
    assert_eq!(state["instructions"][0]["instruction"]["type"], "IMAGES_DATA_CHANGED");
}
