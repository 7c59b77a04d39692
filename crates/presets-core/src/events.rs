//! Deferred selection notifications.
//!
//! Selecting a preset never calls listeners synchronously. Instead a job is
//! scheduled on a [`TaskQueue`], closing over the exact before/after values of
//! that step. The owner drains the queue with [`TaskQueue::run_pending`] once
//! its synchronous work has returned.
//!
//! Guarantees:
//! - Jobs run in the order they were scheduled, across every collection
//!   sharing the queue.
//! - One job per successful selection change made while at least one
//!   listener is registered; nothing is coalesced, dropped or cancelled.
//!   With no listeners nothing is queued, so the queue only grows for
//!   owners that subscribe and never drain.
//! - Jobs scheduled while draining run in the same drain, after the jobs that
//!   were already queued.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use crate::preset::Preset;

type Job = Box<dyn FnOnce()>;

/// Single-threaded FIFO of deferred jobs.
///
/// Clones share the same queue.
#[derive(Clone, Default)]
pub struct TaskQueue {
    jobs: Rc<RefCell<VecDeque<Job>>>,
}

impl TaskQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `job` to run on the next drain.
    pub fn schedule(&self, job: impl FnOnce() + 'static) {
        self.jobs.borrow_mut().push_back(Box::new(job));
    }

    /// Number of jobs waiting to run.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.jobs.borrow().len()
    }

    /// Run queued jobs until the queue is empty. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            // The borrow must end before the job runs: jobs may schedule more.
            let next = self.jobs.borrow_mut().pop_front();
            let Some(job) = next else {
                break;
            };
            job();
            ran += 1;
        }
        if ran > 0 {
            tracing::trace!(ran, "drained deferred jobs");
        }
        ran
    }
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue")
            .field("pending", &self.pending())
            .finish()
    }
}

/// Payload delivered to `select` listeners.
#[derive(Debug, Clone)]
pub struct SelectEvent<D> {
    pub next: Option<Rc<Preset<D>>>,
    pub prev: Option<Rc<Preset<D>>>,
    pub next_detail: Option<D>,
    pub prev_detail: Option<D>,
    /// `Some(true)` for an explicit click; `None` when the caller did not say.
    pub by_click: Option<bool>,
    /// `Some(true)` when driven by a group preset.
    pub by_group: Option<bool>,
}

/// Handle returned by [`SelectEmitter::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener<D> = Rc<dyn Fn(&SelectEvent<D>)>;

struct Listeners<D> {
    next_id: Cell<u64>,
    entries: RefCell<Vec<(ListenerId, Listener<D>)>>,
}

/// Listener registry for the `select` event.
///
/// Clones share listeners, so every collection value derived from another
/// notifies the same subscribers.
pub struct SelectEmitter<D> {
    listeners: Rc<Listeners<D>>,
}

impl<D> Clone for SelectEmitter<D> {
    fn clone(&self) -> Self {
        Self {
            listeners: Rc::clone(&self.listeners),
        }
    }
}

impl<D> Default for SelectEmitter<D> {
    fn default() -> Self {
        Self {
            listeners: Rc::new(Listeners {
                next_id: Cell::new(0),
                entries: RefCell::new(Vec::new()),
            }),
        }
    }
}

impl<D> fmt::Debug for SelectEmitter<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectEmitter")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl<D> SelectEmitter<D> {
    pub fn listener_count(&self) -> usize {
        self.listeners.entries.borrow().len()
    }

    /// Whether two emitters share one listener registry.
    pub fn shares_listeners_with(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.listeners, &other.listeners)
    }
}

impl<D: 'static> SelectEmitter<D> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for `select`.
    pub fn subscribe(&self, listener: impl Fn(&SelectEvent<D>) + 'static) -> ListenerId {
        let id = ListenerId(self.listeners.next_id.get());
        self.listeners.next_id.set(id.0 + 1);
        self.listeners
            .entries
            .borrow_mut()
            .push((id, Rc::new(listener)));
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut entries = self.listeners.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|(existing, _)| *existing != id);
        entries.len() != before
    }

    /// Schedule delivery of `event` on `queue`.
    ///
    /// Nothing is queued while no listener is registered, so a listener only
    /// sees selections made after it subscribed. Of those, listeners still
    /// registered when the job runs receive the event.
    pub fn schedule(&self, queue: &TaskQueue, event: SelectEvent<D>) {
        if self.listener_count() == 0 {
            return;
        }
        let listeners = Rc::clone(&self.listeners);
        queue.schedule(move || {
            // Snapshot so listeners may subscribe or unsubscribe while running.
            let current: Vec<Listener<D>> = listeners
                .entries
                .borrow()
                .iter()
                .map(|(_, l)| Rc::clone(l))
                .collect();
            for listener in current {
                listener(&event);
            }
        });
    }
}
