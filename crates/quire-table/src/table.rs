use std::collections::BTreeSet;

use quire_types::{DocumentId, ObjectId, Value};
use tracing::{debug, trace};

use crate::entry::{EntryState, IndirectEntry, Location};
use crate::error::{TableError, TableResult};

/// Arena of indirect objects for one document.
///
/// Slot `i` holds object number `i + 1`; number 0 is the reserved free-list
/// head and has no slot. Every number ever handed out keeps its slot for the
/// lifetime of the table, so [`Self::entries`] enumerates unused and
/// structural objects as well as the ones reachable from page content.
///
/// All non-local edges between objects are [`ObjectId`] values, so cycles
/// in the object graph never translate into ownership cycles here.
///
/// The table is single-writer: every mutating method takes `&mut self`.
#[derive(Debug)]
pub struct IndirectTable {
    owner: DocumentId,
    entries: Vec<IndirectEntry>,
    free_numbers: BTreeSet<u32>,
    reuse_free_numbers: bool,
}

impl IndirectTable {
    /// Create an empty table that reuses freed numbers.
    pub fn new(owner: DocumentId) -> Self {
        Self::with_reuse(owner, true)
    }

    /// Create an empty table, choosing whether freed numbers are reused.
    pub fn with_reuse(owner: DocumentId, reuse_free_numbers: bool) -> Self {
        Self {
            owner,
            entries: Vec::new(),
            free_numbers: BTreeSet::new(),
            reuse_free_numbers,
        }
    }

    /// The document this table belongs to.
    pub fn owner(&self) -> DocumentId {
        self.owner
    }

    /// Register `payload` as a new indirect object.
    ///
    /// Takes the lowest freed number (whose generation was already bumped by
    /// [`Self::free`]) when reuse is enabled, otherwise the next number never
    /// handed out.
    pub fn allocate(&mut self, payload: Value) -> TableResult<ObjectId> {
        if self.reuse_free_numbers {
            if let Some(number) = self.free_numbers.pop_first() {
                let slot = &mut self.entries[(number - 1) as usize];
                slot.state = EntryState::InUse;
                slot.payload = Some(payload);
                slot.location = None;
                let id = slot.id();
                trace!(%id, "reused object number");
                return Ok(id);
            }
        }

        self.allocate_fresh(payload)
    }

    /// Register `payload` under the next number never handed out, at
    /// generation 0, regardless of the reuse setting.
    ///
    /// Object streams and cross-reference streams need this: a compressed
    /// cross-reference entry names its container by number alone and implies
    /// generation 0.
    pub fn allocate_fresh(&mut self, payload: Value) -> TableResult<ObjectId> {
        let number = u32::try_from(self.entries.len() + 1).map_err(|_| TableError::Exhausted)?;
        self.entries
            .push(IndirectEntry::in_use(number, 0, payload, self.owner));
        let id = ObjectId::new(number, 0);
        trace!(%id, "allocated object");
        Ok(id)
    }

    /// The slot for `id`, checking the number and generation.
    pub fn lookup(&self, id: ObjectId) -> TableResult<&IndirectEntry> {
        let entry = self.slot(id.number())?;
        if entry.generation != id.generation() {
            return Err(TableError::GenerationMismatch {
                requested: id,
                current: entry.generation,
            });
        }
        Ok(entry)
    }

    /// The slot holding object number `number`, whatever its generation.
    pub fn entry(&self, number: u32) -> Option<&IndirectEntry> {
        if number == 0 {
            return None;
        }
        self.entries.get((number - 1) as usize)
    }

    /// Current state of `id`.
    pub fn state(&self, id: ObjectId) -> TableResult<EntryState> {
        self.lookup(id).map(IndirectEntry::state)
    }

    /// Returns `true` if `id` names a live or flushed object of this table.
    pub fn contains(&self, id: ObjectId) -> bool {
        matches!(self.lookup(id), Ok(entry) if entry.state != EntryState::Free)
    }

    /// The live payload of `id`, or `None` once flushed or freed.
    pub fn resolve(&self, id: ObjectId) -> Option<&Value> {
        self.lookup(id).ok().and_then(|entry| entry.payload.as_ref())
    }

    /// Mutable access to the live payload of `id`.
    pub fn resolve_mut(&mut self, id: ObjectId) -> Option<&mut Value> {
        let entry = self.slot_mut(id).ok()?;
        if entry.flush_pending {
            return None;
        }
        entry.payload.as_mut()
    }

    /// Returns `true` once `id` has been written, never before.
    pub fn is_flushed(&self, id: ObjectId) -> bool {
        matches!(self.lookup(id), Ok(entry) if entry.state.is_flushed())
    }

    /// Pin `id` for flushing. While pinned, [`Self::free`] is refused.
    pub fn begin_flush(&mut self, id: ObjectId) -> TableResult<()> {
        let entry = self.slot_mut(id)?;
        if entry.state != EntryState::InUse {
            return Err(TableError::NotInUse {
                id,
                state: entry.state,
            });
        }
        if entry.flush_pending {
            return Err(TableError::ConcurrentMutation(id));
        }
        entry.flush_pending = true;
        Ok(())
    }

    /// Release the pin taken by [`Self::begin_flush`] without flushing.
    pub fn end_flush(&mut self, id: ObjectId) {
        if let Ok(entry) = self.slot_mut(id) {
            entry.flush_pending = false;
        }
    }

    /// Move the payload out of a pinned entry for serialization.
    pub fn take_payload(&mut self, id: ObjectId) -> TableResult<Value> {
        let entry = self.slot_mut(id)?;
        let state = entry.state;
        entry
            .payload
            .take()
            .ok_or(TableError::NotInUse { id, state })
    }

    /// Put a payload back after a failed flush.
    pub fn restore_payload(&mut self, id: ObjectId, payload: Value) -> TableResult<()> {
        let entry = self.slot_mut(id)?;
        if entry.state != EntryState::InUse {
            return Err(TableError::NotInUse {
                id,
                state: entry.state,
            });
        }
        entry.payload = Some(payload);
        Ok(())
    }

    /// `InUse -> Flushed`: record the byte offset and release the payload.
    pub fn mark_flushed(&mut self, id: ObjectId, offset: u64) -> TableResult<()> {
        self.finish_flush(id, EntryState::Flushed, Location::Offset(offset))
    }

    /// `InUse -> FlushedToObjectStream`.
    pub fn mark_flushed_to_object_stream(
        &mut self,
        id: ObjectId,
        stream: u32,
        index: u32,
    ) -> TableResult<()> {
        self.finish_flush(
            id,
            EntryState::FlushedToObjectStream,
            Location::ObjectStream { stream, index },
        )
    }

    fn finish_flush(&mut self, id: ObjectId, state: EntryState, location: Location) -> TableResult<()> {
        let entry = self.slot_mut(id)?;
        if entry.state != EntryState::InUse {
            return Err(TableError::NotInUse {
                id,
                state: entry.state,
            });
        }
        entry.state = state;
        entry.location = Some(location);
        entry.payload = None;
        entry.flush_pending = false;
        Ok(())
    }

    /// Return `id` to the free list.
    ///
    /// Any state may be freed. The generation is bumped so the old identity
    /// can never resolve again; a number that reaches the maximum generation
    /// is retired instead of being queued for reuse.
    pub fn free(&mut self, id: ObjectId) -> TableResult<()> {
        let reuse = self.reuse_free_numbers;
        let entry = self.slot_mut(id)?;
        if entry.flush_pending {
            return Err(TableError::ConcurrentMutation(id));
        }
        entry.state = EntryState::Free;
        entry.payload = None;
        entry.location = None;
        entry.generation = entry.generation.saturating_add(1);
        let retired = entry.generation == ObjectId::MAX_GENERATION;
        if reuse && !retired {
            self.free_numbers.insert(id.number());
        }
        debug!(%id, retired, "freed object");
        Ok(())
    }

    /// Number of object numbers ever allocated (number 0 not included).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// One past the highest object number: the cross-reference `/Size`.
    pub fn size(&self) -> u32 {
        self.entries.len() as u32 + 1
    }

    /// Every allocated slot in ascending object-number order.
    pub fn entries(&self) -> impl Iterator<Item = &IndirectEntry> {
        self.entries.iter()
    }

    /// Ids of all entries still in use, ascending.
    pub fn live_ids(&self) -> Vec<ObjectId> {
        self.entries
            .iter()
            .filter(|entry| entry.state == EntryState::InUse)
            .map(IndirectEntry::id)
            .collect()
    }

    fn slot(&self, number: u32) -> TableResult<&IndirectEntry> {
        if number == 0 {
            return Err(TableError::Reserved);
        }
        self.entries
            .get((number - 1) as usize)
            .ok_or(TableError::NotAllocated(ObjectId::new(number, 0)))
    }

    fn slot_mut(&mut self, id: ObjectId) -> TableResult<&mut IndirectEntry> {
        if id.number() == 0 {
            return Err(TableError::Reserved);
        }
        let entry = self
            .entries
            .get_mut((id.number() - 1) as usize)
            .ok_or(TableError::NotAllocated(id))?;
        if entry.generation != id.generation() {
            return Err(TableError::GenerationMismatch {
                requested: id,
                current: entry.generation,
            });
        }
        Ok(entry)
    }
}
