//! Which locks an operation must hold before it runs

use crate::lock::LockSpec;
use crate::target::TargetRef;

/// Owner of the lock held while pulling remote state into the platform
pub const SERVER_SYNCHRONIZE: &str = "server_synchronize";
/// Owner of the lock held while registering an account with the channel
pub const ADDING_TO_SERVER: &str = "adding_to_server";

pub const OP_ADD_ACCOUNT: &str = "add_account";
pub const OP_SYNCHRONIZE: &str = "synchronize";
pub const OP_MOVE_ITEMS: &str = "move_items";

/// Locks for adding an account: the whole account plus both scoped owners,
/// so neither a synchronization nor a second registration can start.
pub fn account_add_locks(account: TargetRef) -> Vec<LockSpec> {
    vec![
        LockSpec::global(account),
        LockSpec::scoped(account, SERVER_SYNCHRONIZE),
        LockSpec::scoped(account, ADDING_TO_SERVER),
    ]
}

/// Locks for moving items between listings: both listings, whole
pub fn listing_move_locks(source: TargetRef, destination: TargetRef) -> Vec<LockSpec> {
    vec![LockSpec::global(source), LockSpec::global(destination)]
}

/// Default lock plan for `operation` on `target`.
///
/// Unknown operations lock the whole target.
pub fn operation_locks(target: TargetRef, operation: &str) -> Vec<LockSpec> {
    match operation {
        OP_ADD_ACCOUNT => account_add_locks(target),
        OP_SYNCHRONIZE => vec![LockSpec::scoped(target, SERVER_SYNCHRONIZE)],
        _ => vec![LockSpec::global(target)],
    }
}
