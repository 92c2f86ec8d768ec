use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use tracing::warn;

type Task = Box<dyn FnOnce()>;

/// Upper bound on turns executed by a single [`EventLoop::run_until_idle`].
pub const MAX_TURNS: usize = 1_000_000;

/// Single-threaded cooperative task queue.
///
/// [`EventLoop::defer`] is the "run on a later turn" primitive: the task never
/// runs inside the call that scheduled it. Tasks run strictly in the order
/// they were deferred. Clones share the same queue.
#[derive(Clone, Default)]
pub struct EventLoop {
    tasks: Rc<RefCell<VecDeque<Task>>>,
}

impl EventLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `task` to run on a later turn.
    pub fn defer(&self, task: impl FnOnce() + 'static) {
        self.tasks.borrow_mut().push_back(Box::new(task));
    }

    /// Run the oldest pending task. Returns false when the queue was empty.
    pub fn turn(&self) -> bool {
        // Release the borrow before running: tasks defer more tasks.
        let task = self.tasks.borrow_mut().pop_front();
        match task {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Run tasks until the queue drains, including tasks deferred meanwhile.
    ///
    /// Returns the number of turns executed.
    pub fn run_until_idle(&self) -> usize {
        let mut turns = 0usize;
        while turns < MAX_TURNS && self.turn() {
            turns += 1;
        }
        if turns == MAX_TURNS {
            warn!(pending = self.pending(), "event loop did not go idle");
        }
        turns
    }

    /// Number of tasks waiting to run.
    pub fn pending(&self) -> usize {
        self.tasks.borrow().len()
    }

    /// Drop every pending task without running it.
    pub fn clear(&self) {
        self.tasks.borrow_mut().clear();
    }
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoop")
            .field("pending", &self.pending())
            .finish()
    }
}
