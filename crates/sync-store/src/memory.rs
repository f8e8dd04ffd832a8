//! In-process store used by tests and single-process deployments

use std::sync::Mutex;

use crate::store::{Commit, Store};
use crate::{Error, Result};

/// A store holding its document behind a mutex.
///
/// Bodies run against a clone of the document, so a discarded transaction
/// never leaves a partial mutation behind.
#[derive(Debug, Default)]
pub struct MemoryStore<D> {
    doc: Mutex<D>,
}

impl<D> MemoryStore<D> {
    /// Create a store seeded with `doc`
    pub fn new(doc: D) -> Self {
        Self {
            doc: Mutex::new(doc),
        }
    }
}

impl<D: Clone> MemoryStore<D> {
    /// Copy of the current document
    pub fn snapshot(&self) -> Result<D> {
        let guard = self.doc.lock().map_err(|_| Error::Poisoned)?;
        Ok(guard.clone())
    }
}

impl<D> Store for MemoryStore<D>
where
    D: Clone + Send,
{
    type Doc = D;

    fn transact(&self, op: &mut dyn FnMut(&mut D) -> Commit) -> Result<()> {
        let mut guard = self.doc.lock().map_err(|_| Error::Poisoned)?;
        let mut working = guard.clone();
        if op(&mut working) == Commit::Write {
            *guard = working;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{update, view};

    #[test]
    fn committed_changes_are_visible() {
        let store = MemoryStore::new(Vec::<u32>::new());

        let result: Result<()> = update(&store, |doc| {
            doc.push(7);
            Ok(())
        });
        result.unwrap();

        assert_eq!(view(&store, |doc| doc.clone()).unwrap(), vec![7]);
    }

    #[test]
    fn failed_update_discards_partial_writes() {
        let store = MemoryStore::new(vec![1u32]);

        let result: Result<()> = update(&store, |doc| {
            doc.push(2);
            Err(Error::Aborted)
        });

        assert!(result.is_err());
        assert_eq!(store.snapshot().unwrap(), vec![1]);
    }

    #[test]
    fn view_never_persists() {
        let store = MemoryStore::new(0u32);
        store
            .transact(&mut |doc| {
                *doc = 99;
                Commit::Discard
            })
            .unwrap();
        assert_eq!(store.snapshot().unwrap(), 0);
    }
}
