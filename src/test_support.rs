//! Recording receivers and groups shared by the unit tests.

use std::cell::RefCell;
use std::rc::Rc;

use crate::mailbox::same_mailbox;
use crate::{
    CommunicationGroup, CountingQueue, Direction, Mailbox, MessageSelector, PosetAwareReceiver,
    PosetComparator, Receiver, Timestamp, Tuple, TupleMask,
};

/// What a receiver was asked to do.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Call {
    Update(Direction, Tuple),
    Batch(Vec<(Tuple, i64)>),
    Poset(Direction, Tuple, bool),
}

type Hook = Box<dyn Fn(&Tuple)>;

/// Records every call; optionally runs a hook on each delivered tuple.
#[derive(Default)]
pub(crate) struct RecordingReceiver {
    calls: RefCell<Vec<Call>>,
    hook: RefCell<Option<Hook>>,
}

impl RecordingReceiver {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub(crate) fn on_delivery(&self, hook: impl Fn(&Tuple) + 'static) {
        *self.hook.borrow_mut() = Some(Box::new(hook));
    }

    pub(crate) fn take(&self) -> Vec<Call> {
        std::mem::take(&mut *self.calls.borrow_mut())
    }

    fn run_hook(&self, tuple: &Tuple) {
        if let Some(hook) = self.hook.borrow().as_ref() {
            hook(tuple);
        }
    }
}

impl Receiver for RecordingReceiver {
    fn update(&self, direction: Direction, tuple: &Tuple, _timestamp: Timestamp) {
        self.calls
            .borrow_mut()
            .push(Call::Update(direction, tuple.clone()));
        self.run_hook(tuple);
    }

    fn batch_update(&self, batch: &CountingQueue, _timestamp: Timestamp) {
        let mut entries: Vec<_> = batch.iter().map(|(t, c)| (t.clone(), c)).collect();
        entries.sort();
        self.calls.borrow_mut().push(Call::Batch(entries.clone()));
        for (tuple, _) in &entries {
            self.run_hook(tuple);
        }
    }
}

/// Poset-aware receiver over `(group, value)` pairs ordered numerically.
pub(crate) struct PosetReceiver {
    inner: RecordingReceiver,
    core: TupleMask,
    poset: TupleMask,
    comparator: Box<dyn PosetComparator>,
}

impl PosetReceiver {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Self {
            inner: RecordingReceiver::default(),
            core: TupleMask::select_single(0, 2),
            poset: TupleMask::select_single(1, 2),
            comparator: Box::new(|a: &Tuple, b: &Tuple| a <= b),
        })
    }

    pub(crate) fn take(&self) -> Vec<Call> {
        self.inner.take()
    }
}

impl Receiver for PosetReceiver {
    fn update(&self, direction: Direction, tuple: &Tuple, timestamp: Timestamp) {
        self.inner.update(direction, tuple, timestamp);
    }
}

impl PosetAwareReceiver for PosetReceiver {
    fn update_with_poset_info(&self, direction: Direction, tuple: &Tuple, monotone: bool) {
        self.inner
            .calls
            .borrow_mut()
            .push(Call::Poset(direction, tuple.clone(), monotone));
    }

    fn core_mask(&self) -> &TupleMask {
        &self.core
    }

    fn poset_mask(&self) -> &TupleMask {
        &self.poset
    }

    fn poset_comparator(&self) -> &dyn PosetComparator {
        self.comparator.as_ref()
    }
}

/// What a group was told.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Notice {
    Has(MessageSelector),
    Lost(MessageSelector),
}

/// Records notifications and the mailbox handles they named.
#[derive(Default)]
pub(crate) struct RecordingGroup {
    notices: RefCell<Vec<Notice>>,
    named: RefCell<Vec<Rc<dyn Mailbox>>>,
}

impl RecordingGroup {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub(crate) fn take(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.notices.borrow_mut())
    }

    /// Whether every notification so far named `mailbox`.
    pub(crate) fn only_named(&self, mailbox: &Rc<dyn Mailbox>) -> bool {
        self.named.borrow().iter().all(|m| same_mailbox(m, mailbox))
    }
}

impl CommunicationGroup for RecordingGroup {
    fn notify_has_message(&self, mailbox: &Rc<dyn Mailbox>, selector: MessageSelector) {
        self.notices.borrow_mut().push(Notice::Has(selector));
        self.named.borrow_mut().push(Rc::clone(mailbox));
    }

    fn notify_lost_all_messages(&self, mailbox: &Rc<dyn Mailbox>, selector: MessageSelector) {
        self.notices.borrow_mut().push(Notice::Lost(selector));
        self.named.borrow_mut().push(Rc::clone(mailbox));
    }
}

pub(crate) fn ins(values: &[i64]) -> Call {
    Call::Update(Direction::Insert, values.iter().copied().map(crate::Value::Int).collect())
}

pub(crate) fn del(values: &[i64]) -> Call {
    Call::Update(Direction::Delete, values.iter().copied().map(crate::Value::Int).collect())
}
