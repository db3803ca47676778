use std::fmt;
use std::sync::{Mutex, MutexGuard};

use surge_api::SlotIndex;

/// LIFO registry of idle extra slots that accept new work.
///
/// The most recently idled slot is handed out first, so the warmest thread
/// picks up the next burst. Every operation takes the list's own lock and
/// nothing else; callers must not hold a slot lock while calling in.
/// The closures taken by [`release_if`](Self::release_if) and
/// [`withdraw_and`](Self::withdraw_and) run under the list's lock and may
/// only touch slot atomics.
///
/// A slot is "accepting" exactly while its index is present here.
pub struct FreeList {
    inner: Mutex<FreeListInner>,
}

struct FreeListInner {
    stack: Vec<SlotIndex>,
    present: Vec<bool>,
}

impl FreeList {
    /// Creates an empty list able to hold indices `0..capacity`.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(FreeListInner {
                stack: Vec::with_capacity(capacity),
                present: vec![false; capacity],
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FreeListInner> {
        // The critical sections never panic midway, so a poisoned guard
        // still holds a consistent list.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Pushes `index` unless it is already listed. Returns whether it was added.
    pub fn release(&self, index: SlotIndex) -> bool {
        self.release_if(index, || true)
    }

    /// Like [`release`](Self::release), but only if `admit` still holds
    /// once the lock is taken.
    pub fn release_if<F>(&self, index: SlotIndex, admit: F) -> bool
    where
        F: FnOnce() -> bool,
    {
        let mut inner = self.lock();
        if inner.present.get(index) != Some(&false) || !admit() {
            return false;
        }
        inner.present[index] = true;
        inner.stack.push(index);
        true
    }

    /// Pops the most recently released index.
    pub fn pop(&self) -> Option<SlotIndex> {
        let mut inner = self.lock();
        let index = inner.stack.pop()?;
        inner.present[index] = false;
        Some(index)
    }

    /// Removes `index` wherever it sits. Returns whether it was listed.
    pub fn withdraw(&self, index: SlotIndex) -> bool {
        Self::withdraw_locked(&mut self.lock(), index)
    }

    /// Removes `index`, then runs `then` before releasing the lock.
    pub fn withdraw_and<T, F>(&self, index: SlotIndex, then: F) -> T
    where
        F: FnOnce() -> T,
    {
        let mut inner = self.lock();
        Self::withdraw_locked(&mut inner, index);
        then()
    }

    fn withdraw_locked(inner: &mut FreeListInner, index: SlotIndex) -> bool {
        if !inner.present.get(index).copied().unwrap_or(false) {
            return false;
        }
        inner.present[index] = false;
        inner.stack.retain(|&listed| listed != index);
        true
    }

    pub fn contains(&self, index: SlotIndex) -> bool {
        self.lock().present.get(index).copied().unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.lock().stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().stack.is_empty()
    }

    /// Listed indices from bottom to top; the last element is popped next.
    pub fn snapshot(&self) -> Vec<SlotIndex> {
        self.lock().stack.clone()
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.stack.clear();
        inner.present.iter_mut().for_each(|flag| *flag = false);
    }
}

impl fmt::Debug for FreeList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FreeList")
            .field("stack", &self.snapshot())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_most_recently_released_first() {
        let list = FreeList::new(8);
        list.release(2);
        list.release(5);
        list.release(3);

        assert_eq!(list.pop(), Some(3));
        assert_eq!(list.pop(), Some(5));
        assert_eq!(list.pop(), Some(2));
        assert_eq!(list.pop(), None);
    }

    #[test]
    fn release_is_idempotent() {
        let list = FreeList::new(4);
        assert!(list.release(1));
        assert!(!list.release(1));
        assert_eq!(list.snapshot(), vec![1]);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn withdraw_removes_from_the_middle() {
        let list = FreeList::new(6);
        for index in [0, 4, 2] {
            list.release(index);
        }

        assert!(list.withdraw(4));
        assert!(!list.withdraw(4));
        assert!(!list.contains(4));
        assert_eq!(list.snapshot(), vec![0, 2]);

        // A withdrawn index can be released again and goes on top.
        assert!(list.release(4));
        assert_eq!(list.pop(), Some(4));
    }

    #[test]
    fn conditional_release_and_withdraw() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let list = FreeList::new(4);
        let idle = AtomicBool::new(false);

        assert!(!list.release_if(1, || idle.load(Ordering::SeqCst)));
        assert!(!list.contains(1));

        idle.store(true, Ordering::SeqCst);
        assert!(list.release_if(1, || idle.load(Ordering::SeqCst)));
        assert!(!list.release_if(1, || idle.load(Ordering::SeqCst)));

        let was_idle = list.withdraw_and(1, || idle.swap(false, Ordering::SeqCst));
        assert!(was_idle);
        assert!(list.is_empty());
        assert!(!list.release_if(1, || idle.load(Ordering::SeqCst)));
    }

    #[test]
    fn out_of_range_indices_are_ignored() {
        let list = FreeList::new(2);
        assert!(!list.release(7));
        assert!(!list.withdraw(7));
        assert!(!list.contains(7));
        assert!(list.is_empty());
    }

    #[test]
    fn clear_resets_membership() {
        let list = FreeList::new(3);
        list.release(0);
        list.release(1);
        list.clear();

        assert!(list.is_empty());
        assert!(!list.contains(0));
        assert!(list.release(0));
    }
}
