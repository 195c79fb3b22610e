//! Dependency Detection
//!
//! While a computed cell evaluates, every cell it reads is recorded so that
//! the computed can subscribe to exactly those cells afterwards.
//!
//! # Implementation
//!
//! A thread-local stack tracks the computed cells currently evaluating. A
//! computed that reads another computed pushes a nested frame, and reads are
//! always attributed to the innermost frame.

use std::cell::RefCell;

use indexmap::IndexMap;

use super::{CellId, Target};

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

/// One evaluating computed and the cells it has read so far.
struct Frame {
    owner: CellId,
    dependencies: IndexMap<CellId, Target>,
}

/// Guard that pops the frame when dropped, even if the evaluation panics.
pub struct ReactiveContext {
    owner: CellId,
}

impl ReactiveContext {
    /// Start recording reads on behalf of `owner`.
    pub fn enter(owner: CellId) -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(Frame {
                owner,
                dependencies: IndexMap::new(),
            });
        });

        Self { owner }
    }

    /// Whether a computed is currently evaluating on this thread.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| !stack.borrow().is_empty())
    }

    /// The cell whose evaluation is currently being recorded.
    pub fn current_owner() -> Option<CellId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().map(|frame| frame.owner))
    }

    /// Record a read of `target`. Reads of the owner itself are ignored.
    pub fn track_dependency(target: Target) {
        CONTEXT_STACK.with(|stack| {
            if let Some(frame) = stack.borrow_mut().last_mut() {
                let id = target.id();
                if id != frame.owner {
                    frame.dependencies.entry(id).or_insert(target);
                }
            }
        });
    }

    /// Take the dependencies recorded in the innermost frame so far.
    pub fn take_dependencies() -> IndexMap<CellId, Target> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow_mut()
                .last_mut()
                .map(|frame| std::mem::take(&mut frame.dependencies))
                .unwrap_or_default()
        })
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();
            if let Some(frame) = popped {
                debug_assert_eq!(
                    frame.owner, self.owner,
                    "ReactiveContext mismatch: expected {:?}, got {:?}",
                    self.owner, frame.owner
                );
            }
        });
    }
}
