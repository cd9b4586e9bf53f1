//! Generation-checked handles and the slot arena that issues them.
//!
//! A [`Handle`] is an index plus a generation counter. The arena bumps a
//! slot's generation every time its value is removed, so a handle taken
//! before the removal stops resolving instead of silently pointing at
//! whatever reused the slot. Handles never keep their referent alive.
//!
//! # Example
//!
//! ```ignore
//! let mut arena = Arena::new();
//! let h = arena.insert("smoke");
//! assert_eq!(arena.get(h), Some(&"smoke"));
//!
//! arena.remove(h);
//! assert!(arena.get(h).is_none()); // stale, even if the slot is reused
//! ```

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Weak, typed reference into an [`Arena`].
///
/// Packs a 32-bit slot index and a 32-bit generation. The type parameter
/// only tags which arena the handle belongs to.
pub struct Handle<T> {
    index: u32,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    /// Handle that never resolves.
    pub const NULL: Self = Self {
        index: u32::MAX,
        generation: u32::MAX,
        _marker: PhantomData,
    };

    #[inline]
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self {
            index,
            generation,
            _marker: PhantomData,
        }
    }

    /// Slot index of this handle.
    #[inline]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Generation the slot had when this handle was issued.
    ///
    /// Doubles as the "signature" handed to particle effects for
    /// object-attached emission.
    #[inline]
    pub const fn generation(self) -> u32 {
        self.generation
    }

    /// Whether this is the null handle.
    #[inline]
    pub const fn is_null(self) -> bool {
        self.index == u32::MAX && self.generation == u32::MAX
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

impl<T> Default for Handle<T> {
    fn default() -> Self {
        Self::NULL
    }
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slot storage with stable indices and generation-checked access.
///
/// Removal frees the slot for reuse and invalidates every outstanding
/// handle to it. Iteration visits live values in slot order.
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Arena<T> {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Create an empty arena with room for `capacity` values.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Store a value and return its handle.
    pub fn insert(&mut self, value: T) -> Handle<T> {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return Handle::new(index, slot.generation);
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        Handle::new(index, 0)
    }

    /// Remove a value, returning it if the handle was still live.
    pub fn remove(&mut self, handle: Handle<T>) -> Option<T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.len -= 1;
        Some(value)
    }

    /// Whether the handle still resolves.
    #[inline]
    pub fn contains(&self, handle: Handle<T>) -> bool {
        self.get(handle).is_some()
    }

    /// Resolve a handle.
    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.as_ref()
    }

    /// Resolve a handle mutably.
    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.as_mut()
    }

    /// Number of live values.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no values are live.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate live values with their handles.
    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.value
                .as_ref()
                .map(|v| (Handle::new(i as u32, slot.generation), v))
        })
    }

    /// Iterate live values mutably with their handles.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Handle<T>, &mut T)> {
        self.slots.iter_mut().enumerate().filter_map(|(i, slot)| {
            let generation = slot.generation;
            slot.value
                .as_mut()
                .map(|v| (Handle::new(i as u32, generation), v))
        })
    }

    /// Visit every live value, removing those for which `keep` returns false.
    ///
    /// Removal happens after `keep` returns for that slot, so the callback
    /// may freely mutate the value it is handed. Returns how many were removed.
    pub fn retain(&mut self, mut keep: impl FnMut(Handle<T>, &mut T) -> bool) -> usize {
        let mut removed = 0;
        for (i, slot) in self.slots.iter_mut().enumerate() {
            let Some(value) = slot.value.as_mut() else {
                continue;
            };
            if !keep(Handle::new(i as u32, slot.generation), value) {
                slot.value = None;
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(i as u32);
                removed += 1;
            }
        }
        self.len -= removed;
        removed
    }

    /// Remove every value. All outstanding handles go stale.
    pub fn clear(&mut self) -> usize {
        let removed = self.len;
        self.retain(|_, _| false);
        removed
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let mut arena = Arena::new();
        let a = arena.insert(1);
        let b = arena.insert(2);

        assert_eq!(arena.get(a), Some(&1));
        assert_eq!(arena.get(b), Some(&2));
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn test_stale_handle_after_reuse() {
        let mut arena = Arena::new();
        let a = arena.insert("first");
        assert_eq!(arena.remove(a), Some("first"));

        let b = arena.insert("second");
        assert_eq!(a.index(), b.index());
        assert_ne!(a.generation(), b.generation());
        assert!(arena.get(a).is_none());
        assert_eq!(arena.get(b), Some(&"second"));
    }

    #[test]
    fn test_double_remove_is_none() {
        let mut arena = Arena::new();
        let a = arena.insert(5);
        assert!(arena.remove(a).is_some());
        assert!(arena.remove(a).is_none());
        assert!(arena.is_empty());
    }

    #[test]
    fn test_retain_removes_during_visit() {
        let mut arena = Arena::new();
        let handles: Vec<_> = (0..6).map(|i| arena.insert(i)).collect();

        let removed = arena.retain(|_, v| {
            *v += 10;
            *v % 2 == 0
        });

        assert_eq!(removed, 3);
        assert_eq!(arena.len(), 3);
        assert_eq!(arena.get(handles[0]), Some(&10));
        assert!(arena.get(handles[1]).is_none());
    }

    #[test]
    fn test_clear_invalidates_everything() {
        let mut arena = Arena::new();
        let a = arena.insert(1.0f32);
        let _ = arena.insert(2.0f32);

        assert_eq!(arena.clear(), 2);
        assert!(arena.is_empty());
        assert!(!arena.contains(a));
    }

    #[test]
    fn test_null_handle_never_resolves() {
        let mut arena = Arena::new();
        arena.insert(7u8);
        let null: Handle<u8> = Handle::NULL;
        assert!(null.is_null());
        assert!(arena.get(null).is_none());
    }
}
