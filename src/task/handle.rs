use crate::error::Fault;
use crate::reactor::event::Interest;
use crate::reactor::job::Job;
use crate::task::{Awaiting, Progress, Routine, Status, Task};

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::{Rc, Weak};

/// Kind-erased view of a unit, used by drivers that hold heterogeneous tasks.
pub trait Unit {
    /// Resumes with the default input.
    fn resume_unit(&mut self) -> Progress;

    fn status(&self) -> Status;

    fn awaiting(&self) -> Option<&Awaiting>;

    fn error(&self) -> Option<&Fault>;

    /// Marks the awaited condition as satisfied.
    fn resolve(&mut self, ready: Interest);

    /// Applies a job-control command; `false` when it had no effect.
    fn apply(&mut self, job: Job) -> bool;

    fn set_attached(&mut self, attached: bool);
}

impl<R: Routine> Unit for Task<R> {
    fn resume_unit(&mut self) -> Progress {
        self.advance()
    }

    fn status(&self) -> Status {
        Task::status(self)
    }

    fn awaiting(&self) -> Option<&Awaiting> {
        Task::awaiting(self)
    }

    fn error(&self) -> Option<&Fault> {
        Task::error(self)
    }

    fn resolve(&mut self, ready: Interest) {
        Task::resolve(self, ready)
    }

    fn apply(&mut self, job: Job) -> bool {
        Task::apply(self, job)
    }

    fn set_attached(&mut self, attached: bool) {
        Task::set_attached(self, attached)
    }
}

/// Shared reference to a unit of any kind.
pub type TaskRef = Rc<RefCell<dyn Unit>>;

/// Non-owning reference held by the reactor's wait sets.
pub(crate) type WeakTask = Weak<RefCell<dyn Unit>>;

/// Identity comparison of two units, ignoring vtables.
pub(crate) fn same_unit(a: *const RefCell<dyn Unit>, b: *const RefCell<dyn Unit>) -> bool {
    std::ptr::addr_eq(a, b)
}

/// Anything that can be turned into a [`TaskRef`].
pub trait AsUnit {
    fn unit(&self) -> TaskRef;
}

impl AsUnit for TaskRef {
    fn unit(&self) -> TaskRef {
        self.clone()
    }
}

/// Owner-side shared handle to a task of kind `R`.
///
/// The creator keeps the handle (and thus the storage) alive; drivers only
/// ever keep weak references to it.
pub struct Handle<R: Routine> {
    inner: Rc<RefCell<Task<R>>>,
}

impl<R: Routine> Handle<R> {
    pub fn new(routine: R) -> Self {
        Self::from_task(Task::new(routine))
    }

    pub fn from_task(task: Task<R>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(task)),
        }
    }

    /// # Panics
    /// Panics if the task is currently being resumed.
    pub fn borrow(&self) -> Ref<'_, Task<R>> {
        self.inner.borrow()
    }

    /// # Panics
    /// Panics if the task is currently borrowed.
    pub fn borrow_mut(&self) -> RefMut<'_, Task<R>> {
        self.inner.borrow_mut()
    }

    pub fn try_borrow_mut(&self) -> Option<RefMut<'_, Task<R>>> {
        self.inner.try_borrow_mut().ok()
    }

    /// Resumes the task; a reentrant call reports [`Progress::Stalled`].
    pub fn resume(&self, input: R::Input) -> Progress {
        match self.inner.try_borrow_mut() {
            Ok(mut task) => task.resume(input),
            Err(_) => {
                tracing::warn!("rejected reentrant resumption");
                Progress::Stalled
            }
        }
    }

    pub fn advance(&self) -> Progress {
        self.resume(R::Input::default())
    }

    pub fn status(&self) -> Status {
        self.inner.borrow().status()
    }

    pub fn is_done(&self) -> bool {
        self.status().is_done()
    }

    /// Returns `true` if `other` refers to the same unit.
    pub fn same(&self, other: &impl AsUnit) -> bool
    where
        R: 'static,
    {
        same_unit(Rc::as_ptr(&self.unit()), Rc::as_ptr(&other.unit()))
    }
}

impl<R: Routine + 'static> AsUnit for Handle<R> {
    fn unit(&self) -> TaskRef {
        self.inner.clone()
    }
}

impl<R: Routine> Clone for Handle<R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<R: Routine> fmt::Debug for Handle<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_borrow() {
            Ok(task) => fmt::Debug::fmt(&*task, f),
            Err(_) => f.write_str("Handle(<running>)"),
        }
    }
}
