//! Double buffering that keeps a delivered batch stable under reentrancy.
//!
//! A [`DoubleBuffer`] owns two slots and an index naming the active one.
//! Posts always go to the active slot. Starting a delivery flips the index,
//! so updates posted while the receiver is still processing the batch land in
//! the other slot and are picked up by the next delivery. When the delivery
//! ends, the delivered slot is emptied and becomes the spare.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::fmt;

use crate::{MailboxError, MessageIndexer, MessageSelector, Result};

pub(crate) struct DoubleBuffer<Q> {
    slots: [RefCell<Q>; 2],
    active: Cell<usize>,
    delivering: Cell<bool>,
    recycle_threshold: usize,
}

impl<Q: MessageIndexer> DoubleBuffer<Q> {
    pub(crate) fn new(queue: Q, recycle_threshold: usize) -> Self {
        let spare = queue.empty_like();
        Self {
            slots: [RefCell::new(queue), RefCell::new(spare)],
            active: Cell::new(0),
            delivering: Cell::new(false),
            recycle_threshold,
        }
    }

    /// The slot currently receiving posts.
    pub(crate) fn active(&self) -> Ref<'_, Q> {
        self.slots[self.active.get()].borrow()
    }

    pub(crate) fn active_mut(&self) -> RefMut<'_, Q> {
        self.slots[self.active.get()].borrow_mut()
    }

    pub(crate) fn is_delivering(&self) -> bool {
        self.delivering.get()
    }

    /// Freeze the active slot for delivery and redirect posts to the spare.
    pub(crate) fn begin_delivery(&self, selector: MessageSelector) -> Result<Delivery<'_, Q>> {
        if self.delivering.replace(true) {
            return Err(MailboxError::DeliveryInProgress { selector });
        }
        let frozen = self.active.get();
        self.active.set(1 - frozen);
        Ok(Delivery {
            buffer: self,
            frozen,
        })
    }

    /// Empty both slots.
    ///
    /// A slot frozen by a running delivery is left alone; it is emptied when
    /// that delivery finishes.
    pub(crate) fn clear(&self) {
        self.active_mut().clear();
        if !self.delivering.get() {
            self.slots[1 - self.active.get()].borrow_mut().clear();
        }
    }

    fn finish_delivery(&self, frozen: usize) {
        {
            let mut slot = self.slots[frozen].borrow_mut();
            if slot.len() > self.recycle_threshold {
                *slot = slot.empty_like();
            } else {
                slot.clear();
            }
        }
        self.delivering.set(false);
    }
}

impl<Q: fmt::Debug> fmt::Debug for DoubleBuffer<Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.slots[self.active.get()].try_borrow() {
            Ok(active) => fmt::Debug::fmt(&*active, f),
            Err(_) => f.write_str("<busy>"),
        }
    }
}

/// A running delivery. Dropping it rotates the buffer.
pub(crate) struct Delivery<'a, Q: MessageIndexer> {
    buffer: &'a DoubleBuffer<Q>,
    frozen: usize,
}

impl<Q: MessageIndexer> Delivery<'_, Q> {
    /// The batch being delivered.
    pub(crate) fn batch(&self) -> Ref<'_, Q> {
        self.buffer.slots[self.frozen].borrow()
    }
}

impl<Q: MessageIndexer> Drop for Delivery<'_, Q> {
    fn drop(&mut self) {
        self.buffer.finish_delivery(self.frozen);
    }
}
