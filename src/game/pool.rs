use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use crate::game::note::NoteEntity;
use crate::game::timeline::Timeline;

/// Generational index into a [`Pool`]. A handle goes stale as soon as its slot
/// is released; lookups through a stale handle return `None`.
pub struct Handle<T> {
    index: u32,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

pub type NoteHandle = Handle<NoteEntity>;
pub type TimelineHandle = Handle<Timeline>;

impl<T> Handle<T> {
    #[inline(always)]
    const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation, _marker: PhantomData }
    }

    #[inline(always)]
    pub const fn index(self) -> u32 {
        self.index
    }

    #[inline(always)]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

// Manual impls: derives would put bounds on `T`.
impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({}v{})", self.index, self.generation)
    }
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slot arena with index recycling. Storage only ever grows; released slots
/// are reused before new ones are appended.
#[derive(Debug)]
pub struct Pool<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    live: usize,
}

impl<T> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Pool<T> {
    pub const fn new() -> Self {
        Self { slots: Vec::new(), free: Vec::new(), live: 0 }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            live: 0,
        }
    }

    pub fn acquire(&mut self, value: T) -> Handle<T> {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return Handle::new(index, slot.generation);
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot { generation: 0, value: Some(value) });
        Handle::new(index, 0)
    }

    /// Takes the value out and invalidates every outstanding handle to it.
    pub fn release(&mut self, handle: Handle<T>) -> Option<T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.live -= 1;
        Some(value)
    }

    #[inline(always)]
    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        self.slots
            .get(handle.index as usize)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.value.as_ref())
    }

    #[inline(always)]
    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.value.as_mut())
    }

    #[inline(always)]
    pub fn contains(&self, handle: Handle<T>) -> bool {
        self.get(handle).is_some()
    }

    #[inline(always)]
    pub const fn len(&self) -> usize {
        self.live
    }

    #[inline(always)]
    pub const fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Slots ever allocated, live or free.
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, s)| {
            s.value
                .as_ref()
                .map(|v| (Handle::new(i as u32, s.generation), v))
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Handle<T>, &mut T)> + '_ {
        self.slots.iter_mut().enumerate().filter_map(|(i, s)| {
            let generation = s.generation;
            s.value
                .as_mut()
                .map(|v| (Handle::new(i as u32, generation), v))
        })
    }

    /// Releases every live slot but keeps the storage.
    pub fn clear(&mut self) {
        self.free.clear();
        for (i, slot) in self.slots.iter_mut().enumerate().rev() {
            if slot.value.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
            }
            self.free.push(i as u32);
        }
        self.live = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn released_slots_are_recycled_with_a_new_generation() {
        let mut pool: Pool<&str> = Pool::new();
        let a = pool.acquire("a");
        let b = pool.acquire("b");
        assert_eq!(pool.len(), 2);

        assert_eq!(pool.release(a), Some("a"));
        assert!(pool.get(a).is_none());
        assert_eq!(pool.release(a), None);

        let c = pool.acquire("c");
        assert_eq!(c.index(), a.index());
        assert_ne!(c, a);
        assert_eq!(pool.get(c), Some(&"c"));
        assert_eq!(pool.get(b), Some(&"b"));
        assert_eq!(pool.capacity(), 2);
    }

    #[test]
    fn clear_invalidates_handles_but_keeps_storage() {
        let mut pool = Pool::with_capacity(4);
        let handles: Vec<_> = (0..4).map(|i| pool.acquire(i)).collect();
        pool.clear();
        assert!(pool.is_empty());
        assert!(handles.iter().all(|h| !pool.contains(*h)));
        assert_eq!(pool.capacity(), 4);

        let h = pool.acquire(9);
        assert_eq!(h.index(), 0);
        assert_eq!(pool.capacity(), 4);
    }

    #[test]
    fn iteration_skips_free_slots() {
        let mut pool = Pool::new();
        let a = pool.acquire(1);
        let _b = pool.acquire(2);
        let _c = pool.acquire(3);
        pool.release(a);
        let mut seen: Vec<i32> = pool.iter().map(|(_, v)| *v).collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![2, 3]);
        for (_, v) in pool.iter_mut() {
            *v *= 10;
        }
        let total: i32 = pool.iter().map(|(_, v)| *v).sum();
        assert_eq!(total, 50);
    }
}
