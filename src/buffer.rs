use std::sync::Mutex;

use crate::types::ObjectName;

/// Outcome of taking one name from the [`DeleteBuffer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopResult {
    Name(ObjectName),
    /// Nothing buffered right now, but the lister may still push more.
    Empty,
    /// Nothing buffered and the lister has finished.
    Exhausted,
}

#[derive(Debug, Default)]
struct Inner {
    names: Vec<ObjectName>,
    listing_done: bool,
}

/// Names waiting to be deleted, shared by the lister and the delete workers.
///
/// The lister pushes whole pages, workers pop one name at a time. The order
/// in which names come out is not part of the contract (it is LIFO today).
/// The buffer is soft-bounded: the lister checks [`DeleteBuffer::len`] before
/// pushing and backs off, so it can exceed the capacity by at most one page.
///
/// The emptiness check and the listing-done check happen under the same lock,
/// so a worker can never observe an empty buffer, miss a final push, and exit.
#[derive(Debug, Default)]
pub struct DeleteBuffer {
    inner: Mutex<Inner>,
}

impl DeleteBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, name: ObjectName) {
        self.inner.lock().unwrap().names.push(name);
    }

    pub fn extend<I>(&self, names: I)
    where
        I: IntoIterator<Item = ObjectName>,
    {
        self.inner.lock().unwrap().names.extend(names);
    }

    pub fn pop(&self) -> PopResult {
        let mut inner = self.inner.lock().unwrap();
        match inner.names.pop() {
            Some(name) => PopResult::Name(name),
            None if inner.listing_done => PopResult::Exhausted,
            None => PopResult::Empty,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Signal that no more names will be pushed in this cycle.
    pub fn mark_listing_done(&self) {
        self.inner.lock().unwrap().listing_done = true;
    }

    pub fn is_listing_done(&self) -> bool {
        self.inner.lock().unwrap().listing_done
    }

    /// Drop leftovers and reopen the buffer for a new cycle.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.names.clear();
        inner.listing_done = false;
    }
}
