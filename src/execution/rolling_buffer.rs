use crate::error::LoopError;
use std::collections::vec_deque::{self, VecDeque};
use std::ops::Index;

/// Bounded FIFO buffer
///
/// Maintains a rolling window of the most recent `capacity` records.
/// Once full, every push evicts exactly the oldest record first.
#[derive(Debug, Clone)]
pub struct RollingBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> RollingBuffer<T> {
    /// Create a new rolling buffer
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of records to keep (at least 1)
    pub fn new(capacity: usize) -> Result<Self, LoopError> {
        if capacity < 1 {
            return Err(LoopError::InvalidCapacity { capacity });
        }

        Ok(Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        })
    }

    /// Append a record
    ///
    /// If the buffer is full, the oldest record is removed first and returned.
    pub fn append(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() == self.capacity {
            self.items.pop_front()
        } else {
            None
        };

        self.items.push_back(item);
        evicted
    }

    /// Read-only view of the current contents in insertion order
    pub fn snapshot(&self) -> Window<'_, T> {
        Window { items: &self.items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> vec_deque::Iter<'_, T> {
        self.items.iter()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

/// Strategy-visible window over a [`RollingBuffer`]
///
/// Borrowing the buffer keeps it frozen while the window is alive, so
/// building a window per step costs nothing.
#[derive(Debug)]
pub struct Window<'a, T> {
    items: &'a VecDeque<T>,
}

impl<T> Clone for Window<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Window<'_, T> {}

impl<'a, T> Window<'a, T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&'a T> {
        self.items.get(index)
    }

    pub fn first(&self) -> Option<&'a T> {
        self.items.front()
    }

    /// Most recent record
    pub fn last(&self) -> Option<&'a T> {
        self.items.back()
    }

    pub fn iter(&self) -> vec_deque::Iter<'a, T> {
        self.items.iter()
    }

    /// The `n` most recent records, oldest first
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &'a T> {
        let skip = self.items.len().saturating_sub(n);
        self.items.iter().skip(skip)
    }

    /// Contents as two contiguous slices (front, back)
    pub fn as_slices(&self) -> (&'a [T], &'a [T]) {
        self.items.as_slices()
    }
}

impl<T: Clone> Window<'_, T> {
    /// Owned copy of the window, for strategies that keep history around
    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

impl<T> Index<usize> for Window<'_, T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.items[index]
    }
}

impl<'a, T> IntoIterator for Window<'a, T> {
    type Item = &'a T;
    type IntoIter = vec_deque::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<'a, T> IntoIterator for &Window<'a, T> {
    type Item = &'a T;
    type IntoIter = vec_deque::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
