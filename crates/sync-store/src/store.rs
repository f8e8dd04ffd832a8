//! The store contract shared by every backend

use crate::{Error, Result};

/// Decision returned by a transaction body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commit {
    /// Persist the mutated document
    Write,
    /// Drop every change made by the body
    Discard,
}

/// A document store with exclusive, all-or-nothing transactions.
///
/// Each call to [`Store::transact`] sees the latest committed document and
/// runs with every other transaction (in this process or another one sharing
/// the same backend) excluded. This is the compare-and-set primitive that lock
/// acquisition and queue upserts are built on: a body reads the rows it cares
/// about, decides, and either commits its writes or discards them.
pub trait Store: Send + Sync {
    /// The persisted document type
    type Doc;

    /// Run `op` once against an exclusive view of the document.
    ///
    /// Changes are persisted only when `op` returns [`Commit::Write`].
    fn transact(&self, op: &mut dyn FnMut(&mut Self::Doc) -> Commit) -> Result<()>;
}

/// Run a fallible transaction, committing on `Ok` and discarding on `Err`.
///
/// Backend failures are converted into the caller's error type.
pub fn update<S, T, E>(
    store: &S,
    op: impl FnOnce(&mut S::Doc) -> std::result::Result<T, E>,
) -> std::result::Result<T, E>
where
    S: Store + ?Sized,
    E: From<Error>,
{
    let mut op = Some(op);
    let mut outcome = None;

    store.transact(&mut |doc| {
        let Some(op) = op.take() else {
            return Commit::Discard;
        };
        let result = op(doc);
        let commit = if result.is_ok() {
            Commit::Write
        } else {
            Commit::Discard
        };
        outcome = Some(result);
        commit
    })?;

    outcome.unwrap_or_else(|| Err(Error::Aborted.into()))
}

/// Run a read-only transaction; nothing the body does is persisted.
pub fn view<S, T>(store: &S, op: impl FnOnce(&S::Doc) -> T) -> Result<T>
where
    S: Store + ?Sized,
{
    let mut op = Some(op);
    let mut outcome = None;

    store.transact(&mut |doc| {
        if let Some(op) = op.take() {
            outcome = Some(op(doc));
        }
        Commit::Discard
    })?;

    outcome.ok_or(Error::Aborted)
}
