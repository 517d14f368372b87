// Linear undo/redo history over immutable snapshots.
// Commits that serialize to the same JSON as the current entry are absorbed.
// Committing from a non-tail cursor drops the redo branch; overwrite drops everything.

use std::cell::RefCell;
use std::rc::Rc;

use serde::Serialize;

/// Snapshot history with a cursor.
///
/// `entries` is never empty and `cursor` always indexes an existing entry.
/// Adjacent entries differ in their JSON form, with one exception: a value
/// that fails to serialize cannot be compared, so it is always committed
/// and may sit next to an identical entry.
/// All transitions are synchronous read-modify-writes with no suspension
/// point, so a functional update always sees the latest state.
#[derive(Debug, Clone)]
pub struct History<T> {
    entries: Vec<T>,
    cursor: usize,
}

impl<T> History<T> {
    /// Create a history seeded with `initial`.
    pub fn new(initial: T) -> Self {
        History {
            entries: vec![initial],
            cursor: 0,
        }
    }

    /// The active snapshot.
    pub fn current(&self) -> &T {
        &self.entries[self.cursor]
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false: a history holds at least its seed entry.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[T] {
        &self.entries
    }

    /// Step back one entry. Returns whether the cursor moved.
    pub fn undo(&mut self) -> bool {
        if !self.can_undo() {
            return false;
        }
        self.cursor -= 1;
        true
    }

    /// Step forward one entry. Returns whether the cursor moved.
    pub fn redo(&mut self) -> bool {
        if !self.can_redo() {
            return false;
        }
        self.cursor += 1;
        true
    }
}

impl<T: Serialize> History<T> {
    /// Commit a new value. Returns `false` when it equals the current entry.
    /// With `overwrite` a distinct value replaces the whole history; use
    /// [`History::new`] to reset unconditionally.
    pub fn commit(&mut self, value: T, overwrite: bool) -> bool {
        if same_snapshot(&value, self.current()) {
            return false;
        }
        if overwrite {
            self.entries.clear();
        } else {
            self.entries.truncate(self.cursor + 1);
        }
        self.entries.push(value);
        self.cursor = self.entries.len() - 1;
        true
    }

    /// Commit the result of applying `update` to the current entry.
    pub fn commit_with<F>(&mut self, update: F, overwrite: bool) -> bool
    where
        F: FnOnce(&T) -> T,
    {
        let value = update(self.current());
        self.commit(value, overwrite)
    }

    /// Like [`commit_with`](Self::commit_with), but the update may fail.
    /// On `Err` the history is left untouched and the error is returned as-is.
    pub fn try_commit_with<F, E>(&mut self, update: F, overwrite: bool) -> Result<bool, E>
    where
        F: FnOnce(&T) -> Result<T, E>,
    {
        let value = update(self.current())?;
        Ok(self.commit(value, overwrite))
    }
}

/// Deep structural equality through the JSON data model.
/// Values that fail to serialize are treated as distinct.
fn same_snapshot<T: Serialize>(a: &T, b: &T) -> bool {
    match (serde_json::to_value(a), serde_json::to_value(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Shared handle to a [`History`].
///
/// Cloning is cheap and every clone refers to the same container for its
/// whole lifetime, so a handle captured by a callback never goes stale:
/// each call operates on whatever state the history holds at that moment.
#[derive(Debug)]
pub struct HistoryHandle<T> {
    inner: Rc<RefCell<History<T>>>,
}

impl<T> Clone for HistoryHandle<T> {
    fn clone(&self) -> Self {
        HistoryHandle {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> HistoryHandle<T> {
    pub fn new(initial: T) -> Self {
        HistoryHandle {
            inner: Rc::new(RefCell::new(History::new(initial))),
        }
    }

    /// Whether two handles refer to the same history.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn undo(&self) -> bool {
        self.inner.borrow_mut().undo()
    }

    pub fn redo(&self) -> bool {
        self.inner.borrow_mut().redo()
    }

    pub fn can_undo(&self) -> bool {
        self.inner.borrow().can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.inner.borrow().can_redo()
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.inner.borrow().cursor()
    }

    /// Read the active snapshot without cloning it.
    pub fn with_current<R>(&self, read: impl FnOnce(&T) -> R) -> R {
        read(self.inner.borrow().current())
    }
}

impl<T: Clone> HistoryHandle<T> {
    pub fn current(&self) -> T {
        self.inner.borrow().current().clone()
    }

    pub fn entries(&self) -> Vec<T> {
        self.inner.borrow().entries().to_vec()
    }
}

impl<T: Serialize> HistoryHandle<T> {
    pub fn commit(&self, value: T, overwrite: bool) -> bool {
        self.inner.borrow_mut().commit(value, overwrite)
    }

    /// The update runs while the history is borrowed, so it must not call
    /// back into this handle.
    pub fn commit_with<F>(&self, update: F, overwrite: bool) -> bool
    where
        F: FnOnce(&T) -> T,
    {
        self.inner.borrow_mut().commit_with(update, overwrite)
    }

    pub fn try_commit_with<F, E>(&self, update: F, overwrite: bool) -> Result<bool, E>
    where
        F: FnOnce(&T) -> Result<T, E>,
    {
        self.inner.borrow_mut().try_commit_with(update, overwrite)
    }
}
