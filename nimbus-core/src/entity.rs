// Entity registry: stable opaque identifiers for live objects.
//
// Ids pack a slot index and a generation counter into 64 bits. A slot's
// generation bumps on every release, so a stale id can never resolve to a
// newer occupant of the same slot.

use std::sync::{Arc, Mutex, OnceLock};

use crate::object::Object;

/// An opaque identifier for a live [`Object`]. Copy-able and hashable;
/// resolving goes through the process-wide registry.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(u64);

impl EntityId {
    /// The sentinel null id. Never resolves.
    pub const NULL: EntityId = EntityId(0);

    #[inline]
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// Raw 64-bit value, e.g. for keying external maps.
    #[inline]
    pub fn to_raw(&self) -> u64 {
        self.0
    }

    /// Rebuild from a raw value previously obtained via [`to_raw`](Self::to_raw).
    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        EntityId(raw)
    }

    fn pack(index: u32, generation: u32) -> Self {
        // Index is stored +1 so the all-zero bit pattern stays the null id.
        EntityId(((generation as u64) << 32) | (index as u64 + 1))
    }

    fn index(&self) -> Option<u32> {
        let low = (self.0 & 0xFFFF_FFFF) as u32;
        low.checked_sub(1)
    }

    fn generation(&self) -> u32 {
        (self.0 >> 32) as u32
    }
}

impl std::fmt::Debug for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_null() {
            write!(f, "EntityId(null)")
        } else {
            write!(f, "EntityId({:#x})", self.0)
        }
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

struct Slot {
    generation: u32,
    object: Option<Arc<Object>>,
}

struct RegistryInner {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

/// Process-wide entity registry. All operations take the registry lock;
/// critical sections are short (no user code runs under the lock).
pub struct EntityRegistry {
    inner: Mutex<RegistryInner>,
}

static REGISTRY: OnceLock<EntityRegistry> = OnceLock::new();

/// The process-wide registry singleton.
pub fn entity_registry() -> &'static EntityRegistry {
    REGISTRY.get_or_init(|| EntityRegistry {
        inner: Mutex::new(RegistryInner {
            slots: Vec::new(),
            free: Vec::new(),
        }),
    })
}

impl EntityRegistry {
    /// Reserve a fresh id. The slot stays unresolvable until
    /// [`bind`](Self::bind) installs the object; `Object::spawn` is the only
    /// caller of both.
    pub(crate) fn create(&self) -> EntityId {
        let mut inner = self.inner.lock().expect("entity registry poisoned");
        if let Some(index) = inner.free.pop() {
            let generation = inner.slots[index as usize].generation;
            EntityId::pack(index, generation)
        } else {
            let index = inner.slots.len() as u32;
            inner.slots.push(Slot {
                generation: 0,
                object: None,
            });
            EntityId::pack(index, 0)
        }
    }

    /// Install the object behind a reserved id.
    pub(crate) fn bind(&self, id: EntityId, object: Arc<Object>) {
        let mut inner = self.inner.lock().expect("entity registry poisoned");
        let index = id.index().expect("bind with null id") as usize;
        debug_assert!(inner.slots[index].object.is_none());
        inner.slots[index].object = Some(object);
    }

    /// Release an id. Valid only from the object teardown path. The slot's
    /// generation bumps so the id can never resolve again.
    pub(crate) fn destroy(&self, id: EntityId) {
        let mut inner = self.inner.lock().expect("entity registry poisoned");
        let Some(index) = id.index() else { return };
        let index = index as usize;
        if index >= inner.slots.len() {
            return;
        }
        let slot = &mut inner.slots[index];
        if slot.generation != id.generation() {
            return; // stale id, slot already reused
        }
        slot.object = None;
        slot.generation = slot.generation.wrapping_add(1);
        inner.free.push(index as u32);
    }

    /// Resolve an id to its object. Returns `None` for the null id, a
    /// destroyed object, or a stale generation. O(1).
    pub fn resolve(&self, id: EntityId) -> Option<Arc<Object>> {
        let inner = self.inner.lock().expect("entity registry poisoned");
        let index = id.index()? as usize;
        let slot = inner.slots.get(index)?;
        if slot.generation != id.generation() {
            return None;
        }
        slot.object.clone()
    }

    /// Number of live objects.
    pub fn live_count(&self) -> usize {
        let inner = self.inner.lock().expect("entity registry poisoned");
        inner.slots.iter().filter(|s| s.object.is_some()).count()
    }

    /// Debug sweep over every live object. Collects under the lock, calls
    /// back outside it.
    pub fn each(&self, mut callback: impl FnMut(&Arc<Object>)) {
        let live: Vec<Arc<Object>> = {
            let inner = self.inner.lock().expect("entity registry poisoned");
            inner
                .slots
                .iter()
                .filter_map(|s| s.object.clone())
                .collect()
        };
        for obj in &live {
            callback(obj);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_id_never_resolves() {
        assert!(entity_registry().resolve(EntityId::NULL).is_none());
    }

    #[test]
    fn generation_prevents_stale_resolution() {
        let reg = entity_registry();
        let id = reg.create();
        // Slot was never bound; destroying bumps the generation.
        reg.destroy(id);
        let id2 = reg.create();
        if id2.index() == id.index() {
            assert_ne!(id, id2, "reused slot must carry a new generation");
        }
        assert!(reg.resolve(id).is_none());
        reg.destroy(id2);
    }
}
