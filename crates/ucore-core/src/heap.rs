//! Binary heap over an arbitrary comparator.
//!
//! [`PriorityQueue`] keeps the comparator-maximal element at the root.
//! The comparator is supplied when the queue is built, so the same
//! structure serves the peeling order (weakest vertex first) and any
//! other ranking. Not thread-safe; each queue belongs to one pass.

use std::cmp::Ordering;

use crate::error::CoreError;
use crate::id::VertexId;

/// A `(probability, vertex)` pair as ranked by the peeling engines.
pub type Scored = (f64, VertexId);

/// Peeling comparator: the LOWER probability ranks greater, so `pop()`
/// yields the weakest vertex. Ties go to the lower vertex id.
pub fn weakest_first(a: &Scored, b: &Scored) -> Ordering {
    b.0.total_cmp(&a.0).then_with(|| b.1.cmp(&a.1))
}

pub struct PriorityQueue<T, F>
where
    F: Fn(&T, &T) -> Ordering,
{
    items: Vec<T>,
    compare: F,
}

impl<T, F> PriorityQueue<T, F>
where
    F: Fn(&T, &T) -> Ordering,
{
    /// Establishes the heap invariant over `items` in O(n).
    pub fn build(items: Vec<T>, compare: F) -> Self {
        let mut queue = PriorityQueue { items, compare };
        let len = queue.items.len();
        if len > 1 {
            for i in (0..=(len - 2) / 2).rev() {
                queue.sift_down(i);
            }
        }
        queue
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The comparator-maximal element, if any.
    pub fn peek(&self) -> Option<&T> {
        self.items.first()
    }

    /// Inserts `item` in O(log n).
    pub fn push(&mut self, item: T) {
        self.items.push(item);
        self.sift_up(self.items.len() - 1);
    }

    /// Removes and returns the comparator-maximal element in O(log n).
    ///
    /// Popping an empty queue is a logic error in every caller, reported as
    /// [`CoreError::InvariantViolation`].
    pub fn pop(&mut self) -> Result<T, CoreError> {
        if self.items.is_empty() {
            return Err(CoreError::InvariantViolation {
                reason: "pop on an empty priority queue".to_string(),
            });
        }
        let last = self.items.len() - 1;
        self.items.swap(0, last);
        let top = self.items.pop().ok_or_else(|| CoreError::InvariantViolation {
            reason: "priority queue shrank during pop".to_string(),
        })?;
        self.sift_down(0);
        Ok(top)
    }

    fn greater(&self, a: usize, b: usize) -> bool {
        (self.compare)(&self.items[a], &self.items[b]) == Ordering::Greater
    }

    fn sift_down(&mut self, mut parent: usize) {
        let len = self.items.len();
        loop {
            let mut child = 2 * parent + 1;
            if child >= len {
                break;
            }
            if child + 1 < len && self.greater(child + 1, child) {
                child += 1;
            }
            if self.greater(child, parent) {
                self.items.swap(child, parent);
                parent = child;
            } else {
                break;
            }
        }
    }

    fn sift_up(&mut self, mut index: usize) {
        while index > 0 {
            let parent = (index - 1) / 2;
            if self.greater(index, parent) {
                self.items.swap(index, parent);
                index = parent;
            } else {
                break;
            }
        }
    }
}
