//! Generational arena of shared native objects.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::TypeHash;

/// Handle to a heap-allocated native object.
///
/// This is a safe, copyable reference to an object in the `ObjectHeap`.
/// The generational index prevents use-after-free bugs: once the object is
/// freed, every outstanding handle resolves to nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObjectHandle {
    /// Index into ObjectHeap.slots
    pub index: u32,
    /// Generation for use-after-free detection
    pub generation: u32,
    /// Script-level type identity of the object
    pub type_hash: TypeHash,
}

impl ObjectHandle {
    /// Create a new object handle.
    pub fn new(index: u32, generation: u32, type_hash: TypeHash) -> Self {
        Self {
            index,
            generation,
            type_hash,
        }
    }
}

/// Heap storage for script-visible native objects.
///
/// Every slot holds a shared `RefCell<T>` erased behind `Rc<dyn Any>`, so a
/// native cell can be reachable both from the script side (through a
/// handle) and from native code (for example as a field of another object).
/// The heap keeps an identity map from cell address to live handle: inserting
/// a cell that is already live returns the existing handle.
///
/// It also records owner-keeps-alive edges. An inner handle linked to an
/// owner holds a reference on the owner, so the owner cannot be released
/// while the inner handle is live.
pub struct ObjectHeap {
    slots: Vec<HeapSlot>,
    free_list: Vec<u32>,
    identities: FxHashMap<usize, ObjectHandle>,
    outers: FxHashMap<u32, ObjectHandle>,
}

struct HeapSlot {
    generation: u32,
    value: Option<Rc<dyn Any>>,
    ref_count: u32,
}

fn erased_address(value: &Rc<dyn Any>) -> usize {
    Rc::as_ptr(value) as *const () as usize
}

impl ObjectHeap {
    /// Create a new empty object heap.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            identities: FxHashMap::default(),
            outers: FxHashMap::default(),
        }
    }

    /// Allocate a new object on the heap.
    pub fn allocate<T: Any>(&mut self, type_hash: TypeHash, value: T) -> ObjectHandle {
        self.insert_shared(type_hash, Rc::new(RefCell::new(value)))
    }

    /// Expose an existing native cell through a handle.
    ///
    /// If the cell is already live in the heap, its handle is returned with
    /// the reference count incremented, so one native object never has two
    /// live script identities.
    pub fn insert_shared<T: Any>(
        &mut self,
        type_hash: TypeHash,
        cell: Rc<RefCell<T>>,
    ) -> ObjectHandle {
        let erased: Rc<dyn Any> = cell;
        let address = erased_address(&erased);

        if let Some(&existing) = self.identities.get(&address)
            && self.is_live(existing)
        {
            self.add_ref(existing);
            return existing;
        }

        let handle = if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(erased);
            slot.ref_count = 1;
            ObjectHandle::new(index, slot.generation, type_hash)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(HeapSlot {
                generation: 0,
                value: Some(erased),
                ref_count: 1,
            });
            ObjectHandle::new(index, 0, type_hash)
        };

        self.identities.insert(address, handle);
        handle
    }

    /// Resolve a handle to its native cell.
    ///
    /// Returns None if the handle is stale or the type doesn't match; the
    /// binding layer treats that as a null native reference.
    pub fn resolve<T: Any>(&self, handle: ObjectHandle) -> Option<Rc<RefCell<T>>> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let value = slot.value.as_ref()?;
        Rc::clone(value).downcast::<RefCell<T>>().ok()
    }

    /// Check whether a handle still refers to a live object.
    pub fn is_live(&self, handle: ObjectHandle) -> bool {
        self.slots
            .get(handle.index as usize)
            .is_some_and(|slot| slot.generation == handle.generation && slot.value.is_some())
    }

    /// Increment reference count.
    pub fn add_ref(&mut self, handle: ObjectHandle) -> bool {
        if let Some(slot) = self.slots.get_mut(handle.index as usize)
            && slot.generation == handle.generation
            && slot.value.is_some()
        {
            slot.ref_count = slot.ref_count.saturating_add(1);
            return true;
        }
        false
    }

    /// Decrement reference count, free if zero.
    ///
    /// Returns true if the object was freed.
    pub fn release(&mut self, handle: ObjectHandle) -> bool {
        if let Some(slot) = self.slots.get_mut(handle.index as usize)
            && slot.generation == handle.generation
            && slot.value.is_some()
        {
            slot.ref_count = slot.ref_count.saturating_sub(1);
            if slot.ref_count == 0 {
                self.free_slot(handle.index);
                return true;
            }
        }
        false
    }

    /// Free object immediately, regardless of its reference count.
    pub fn free(&mut self, handle: ObjectHandle) {
        if self.is_live(handle) {
            self.free_slot(handle.index);
        }
    }

    /// Get the reference count for an object.
    pub fn ref_count(&self, handle: ObjectHandle) -> Option<u32> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation == handle.generation && slot.value.is_some() {
            Some(slot.ref_count)
        } else {
            None
        }
    }

    /// Record that `inner` keeps `owner` alive.
    ///
    /// The inner handle takes a reference on the owner which is dropped when
    /// the inner object is freed. Relinking to a different owner releases the
    /// previous one. Returns false if either handle is not live.
    pub fn link_outer(&mut self, owner: ObjectHandle, inner: ObjectHandle) -> bool {
        if owner == inner || !self.is_live(owner) || !self.is_live(inner) {
            return false;
        }
        if let Some(previous) = self.outers.get(&inner.index).copied() {
            if previous == owner {
                return true;
            }
            self.outers.remove(&inner.index);
            self.release(previous);
        }
        self.add_ref(owner);
        self.outers.insert(inner.index, owner);
        true
    }

    /// Get the owner an inner handle keeps alive, if any.
    pub fn owner_of(&self, inner: ObjectHandle) -> Option<ObjectHandle> {
        if !self.is_live(inner) {
            return None;
        }
        self.outers.get(&inner.index).copied()
    }

    /// Number of live objects.
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.value.is_some()).count()
    }

    fn free_slot(&mut self, index: u32) {
        let Some(slot) = self.slots.get_mut(index as usize) else {
            return;
        };
        let Some(value) = slot.value.take() else {
            return;
        };
        slot.ref_count = 0;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(index);

        let address = erased_address(&value);
        if self.identities.get(&address).is_some_and(|h| h.index == index) {
            self.identities.remove(&address);
        }

        if let Some(owner) = self.outers.remove(&index) {
            self.release(owner);
        }

        drop(value);
    }
}

impl Default for ObjectHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ObjectHeap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectHeap")
            .field("slot_count", &self.slots.len())
            .field("free_count", &self.free_list.len())
            .field("link_count", &self.outers.len())
            .finish()
    }
}
