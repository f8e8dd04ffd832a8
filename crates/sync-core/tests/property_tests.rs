use std::collections::BTreeSet;

use proptest::prelude::*;
use serde_json::{Value, json};
use sync_core::diff::{GroupKind, GroupSchema, Snapshot, compute_diff};
use sync_core::{
    Channel, Instruction, InstructionFilter, InstructionQueue, InstructionType, Priority, TargetRef,
    memory_store,
};

const GROUPS: [&str; 4] = ["alpha", "beta", "gamma", "delta"];

fn schema() -> GroupSchema {
    GROUPS
        .iter()
        .fold(GroupSchema::new("template_test"), |s, g| s.with_group(*g, GroupKind::Mapping))
}

fn group_value() -> impl Strategy<Value = Option<Value>> {
    prop_oneof![
        Just(None),
        (0i64..4).prop_map(|n| Some(json!({"n": n}))),
        (0i64..4, 0i64..4).prop_map(|(a, b)| Some(json!({"a": a, "b": b}))),
    ]
}

fn snapshot() -> impl Strategy<Value = Snapshot> {
    proptest::collection::vec(group_value(), GROUPS.len()).prop_map(|values| {
        GROUPS
            .iter()
            .zip(values)
            .fold(Snapshot::new("template_test"), |snap, (group, value)| match value {
                Some(v) => snap.with_group(*group, v),
                None => snap,
            })
    })
}

proptest! {
    #[test]
    fn diff_reports_exactly_the_differing_groups(old in snapshot(), new in snapshot()) {
        let diff = compute_diff(&old, &new, &schema()).unwrap();

        let expected: BTreeSet<&str> = GROUPS
            .iter()
            .copied()
            .filter(|g| old.group(g) != new.group(g))
            .collect();
        let actual: BTreeSet<&str> = diff.changed_groups().collect();
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn diff_against_self_is_empty(snap in snapshot()) {
        prop_assert!(compute_diff(&snap, &snap, &schema()).unwrap().is_empty());
    }

    #[test]
    fn diff_is_symmetric(old in snapshot(), new in snapshot()) {
        let forward: Vec<String> = compute_diff(&old, &new, &schema())
            .unwrap()
            .changed_groups()
            .map(String::from)
            .collect();
        let backward: Vec<String> = compute_diff(&new, &old, &schema())
            .unwrap()
            .changed_groups()
            .map(String::from)
            .collect();
        prop_assert_eq!(forward, backward);
    }

    #[test]
    fn queue_keeps_one_row_per_key_at_max_priority(
        ops in proptest::collection::vec((0u64..3, 0usize..2, 0u8..=100), 1..40)
    ) {
        let queue = InstructionQueue::new(memory_store());
        let types = [InstructionType::PaymentDataChanged, InstructionType::ShippingDataChanged];
        let mut expected = std::collections::BTreeMap::new();

        for (id, ty, priority) in &ops {
            let target = TargetRef::listing_product(Channel::Amazon, *id);
            let priority = Priority::new(*priority).unwrap();
            queue
                .enqueue(Instruction::new("prop", target, types[*ty], priority))
                .unwrap();
            let entry = expected.entry((*id, *ty)).or_insert(priority);
            *entry = (*entry).max(priority);
        }

        let batch = queue.dequeue_batch(usize::MAX, &InstructionFilter::all()).unwrap();
        prop_assert_eq!(batch.len(), expected.len());

        for instruction in &batch {
            let ty = types.iter().position(|t| *t == instruction.instruction_type).unwrap();
            prop_assert_eq!(Some(&instruction.priority), expected.get(&(instruction.target.id, ty)));
        }

        // Priority never increases along the dequeue order
        for pair in batch.windows(2) {
            prop_assert!(pair[0].priority >= pair[1].priority);
        }
    }
}
