//! Queue inspection commands

use colored::Colorize;
use sync_core::{Instruction, InstructionFilter, InstructionQueue, Priority};

use super::{parse_target, print_json};
use crate::context::Context;
use crate::error::{CliError, Result};

/// Run `queue list`
pub fn run_queue_list(
    ctx: &Context,
    limit: usize,
    initiator: Option<&str>,
    min_priority: Option<u8>,
    json: bool,
) -> Result<()> {
    let mut filter = InstructionFilter::all();
    if let Some(initiator) = initiator {
        filter = filter.for_initiator(initiator);
    }
    if let Some(value) = min_priority {
        let priority = Priority::new(value)
            .ok_or_else(|| CliError::user(format!("priority must be within 0-{}", Priority::MAX)))?;
        filter = filter.at_least(priority);
    }

    let queue = InstructionQueue::new(ctx.store.clone());
    let batch = queue.dequeue_batch(limit, &filter)?;

    if json {
        return print_json(&batch);
    }

    if batch.is_empty() {
        println!("{}", "Queue is empty".dimmed());
        return Ok(());
    }

    println!("{}", "Pending Instructions".bold());
    println!();
    for instruction in &batch {
        print_instruction(instruction, true);
    }
    Ok(())
}

/// Run `queue pending --target`
pub fn run_queue_pending(ctx: &Context, target: &str, json: bool) -> Result<()> {
    let target = parse_target(target)?;
    let queue = InstructionQueue::new(ctx.store.clone());
    let pending = queue.list_pending(&target)?;

    if json {
        return print_json(&pending);
    }

    let noun = if pending.len() == 1 { "override" } else { "overrides" };
    println!(
        "{} {} pending for {}",
        pending.len().to_string().bold(),
        noun,
        target.to_string().cyan()
    );
    for instruction in &pending {
        print_instruction(instruction, false);
    }
    Ok(())
}

fn print_instruction(instruction: &Instruction, with_target: bool) {
    let padded = format!("{:>3}", instruction.priority.value());
    let priority = if instruction.priority >= Priority::LISTED {
        padded.red().bold()
    } else {
        padded.yellow()
    };

    if with_target {
        println!(
            "  [{}] {} {} {}",
            priority,
            instruction.target.to_string().cyan(),
            instruction.instruction_type,
            format!("({})", instruction.initiator).dimmed()
        );
    } else {
        println!(
            "  [{}] {} {}",
            priority,
            instruction.instruction_type,
            format!("({})", instruction.initiator).dimmed()
        );
    }
}
