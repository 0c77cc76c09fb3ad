//! Shared network nodes for the integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use rete_mailbox::prelude::*;
use tracing_subscriber::EnvFilter;

#[ctor::ctor]
fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("rete_mailbox=info".parse().unwrap()),
        )
        .with_test_writer()
        .try_init();
}

/// One update seen by a node.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Event {
    pub node: &'static str,
    pub direction: Direction,
    pub tuple: Tuple,
    /// Set for updates delivered through `update_with_poset_info`.
    pub monotone: Option<bool>,
}

/// Event log shared by the nodes of a test network.
pub type Log = Rc<RefCell<Vec<Event>>>;

pub fn new_log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

/// Events of `node`, sorted.
pub fn events_of(log: &Log, node: &str) -> Vec<Event> {
    let mut events: Vec<_> = log
        .borrow()
        .iter()
        .filter(|e| e.node == node)
        .cloned()
        .collect();
    events.sort();
    events
}

pub fn event(node: &'static str, direction: Direction, tuple: Tuple) -> Event {
    Event {
        node,
        direction,
        tuple,
        monotone: None,
    }
}

pub fn poset_event(
    node: &'static str,
    direction: Direction,
    tuple: Tuple,
    monotone: bool,
) -> Event {
    Event {
        node,
        direction,
        tuple,
        monotone: Some(monotone),
    }
}

/// Numeric order over projected values.
pub struct NumericOrder;

impl PosetComparator for NumericOrder {
    fn is_less_or_equal(&self, left: &Tuple, right: &Tuple) -> bool {
        left <= right
    }
}

type Forward = Box<dyn Fn(Direction, &Tuple)>;

/// A node that logs what it receives and may forward it.
///
/// As a poset-aware receiver it reads its tuples as `(group, value)` pairs.
pub struct Node {
    name: &'static str,
    log: Log,
    forward: RefCell<Option<Forward>>,
    core: TupleMask,
    poset: TupleMask,
}

impl Node {
    pub fn new(name: &'static str, log: &Log) -> Rc<Self> {
        Rc::new(Self {
            name,
            log: Rc::clone(log),
            forward: RefCell::new(None),
            core: TupleMask::select_single(0, 2),
            poset: TupleMask::select_single(1, 2),
        })
    }

    /// Run `forward` on every update this node receives.
    pub fn forward_to(&self, forward: impl Fn(Direction, &Tuple) + 'static) {
        *self.forward.borrow_mut() = Some(Box::new(forward));
    }

    fn record(&self, direction: Direction, tuple: &Tuple, monotone: Option<bool>) {
        self.log.borrow_mut().push(Event {
            node: self.name,
            direction,
            tuple: tuple.clone(),
            monotone,
        });
        if let Some(forward) = self.forward.borrow().as_ref() {
            forward(direction, tuple);
        }
    }
}

impl Receiver for Node {
    fn update(&self, direction: Direction, tuple: &Tuple, _timestamp: Timestamp) {
        self.record(direction, tuple, None);
    }
}

impl PosetAwareReceiver for Node {
    fn update_with_poset_info(&self, direction: Direction, tuple: &Tuple, monotone: bool) {
        self.record(direction, tuple, Some(monotone));
    }

    fn core_mask(&self) -> &TupleMask {
        &self.core
    }

    fn poset_mask(&self) -> &TupleMask {
        &self.poset
    }

    fn poset_comparator(&self) -> &dyn PosetComparator {
        &NumericOrder
    }
}

/// Handle through which a forwarding closure reaches a mailbox.
pub fn post_into(mailbox: &Rc<dyn Mailbox>) -> impl Fn(Direction, &Tuple) + 'static {
    let target = Rc::downgrade(mailbox);
    move |direction: Direction, tuple: &Tuple| {
        if let Some(mailbox) = target.upgrade() {
            mailbox.post_message(direction, tuple, Timestamp::ZERO);
        }
    }
}
