//! An in-memory process image that exports the same symbols a HotSpot VM does,
//! for tests and benchmarks.
//!
//! ```text
//! 0x0010_0000  statics: ObjectSynchronizer::gBlockList
//! 0x0100_0000  heap: monitor blocks, objects and stack locks, bump allocated
//! ```
//!
//! Unwritten words inside an allocated region read as zero. Reads outside any
//! region fail like reads of unmapped memory.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::monitor::directory::*;
use crate::monitor::object_monitor::OBJECT_MONITOR_TYPE;
use crate::monitor::{MarkWordLayout, MonitorLayout};
use crate::util::constants::mark_tags::*;
use crate::util::constants::*;
use crate::util::conversions::raw_align_up;
use crate::util::{Address, ObjectReference};
use crate::vm::*;

const STATICS_START: usize = 0x0010_0000;
const HEAP_START: usize = 0x0100_0000;
/// HotSpot's `ObjectSynchronizer::_BLOCKSIZE`.
pub const DEFAULT_BLOCK_SIZE: usize = 128;

/// Word-granular fake memory. Counts reads so tests can assert how much a
/// lookup touched.
#[derive(Default)]
pub struct FakeMemory {
    words: HashMap<usize, usize>,
    mapped: Vec<Range<usize>>,
    reads: AtomicUsize,
}

impl FakeMemory {
    pub fn map(&mut self, start: Address, bytes: usize) {
        self.mapped.push(start.as_usize()..start.as_usize() + bytes);
    }

    pub fn is_mapped(&self, addr: Address) -> bool {
        self.mapped.iter().any(|r| r.contains(&addr.as_usize()))
    }

    /// Write a word. The address must be word aligned and mapped.
    pub fn write_word(&mut self, addr: Address, value: usize) {
        assert!(addr.is_aligned_to(BYTES_IN_WORD), "unaligned write at {}", addr);
        assert!(self.is_mapped(addr), "write to unmapped {}", addr);
        self.words.insert(addr.as_usize(), value);
    }

    /// Write a 32-bit value into its enclosing word.
    pub fn write_i32(&mut self, addr: Address, value: i32) {
        let base = addr.align_down(BYTES_IN_WORD);
        let byte = addr - base;
        let shift = if cfg!(target_endian = "little") {
            byte * BITS_IN_BYTE
        } else {
            (BYTES_IN_WORD - BYTES_IN_INT - byte) * BITS_IN_BYTE
        };
        let mask = (u32::MAX as usize) << shift;
        let old = self.words.get(&base.as_usize()).copied().unwrap_or(0);
        self.write_word(base, (old & !mask) | ((value as u32 as usize) << shift));
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }
}

impl MemoryReader for FakeMemory {
    fn read_word(&self, addr: Address) -> Result<usize, ReadError> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        if !addr.is_aligned_to(BYTES_IN_WORD) {
            return Err(ReadError::new(addr, BYTES_IN_WORD, "unaligned word read"));
        }
        match self.words.get(&addr.as_usize()) {
            Some(v) => Ok(*v),
            None if self.is_mapped(addr) => Ok(0),
            None => Err(ReadError::unmapped(addr, BYTES_IN_WORD)),
        }
    }
}

/// A name table of types and integer constants.
#[derive(Default)]
pub struct FakeTypes {
    types: HashMap<String, TypeInfo>,
    constants: HashMap<String, i64>,
}

impl FakeTypes {
    pub fn add_type(&mut self, ty: TypeInfo) {
        self.types.insert(ty.name.clone(), ty);
    }

    pub fn set_constant(&mut self, name: &str, value: i64) {
        self.constants.insert(name.to_string(), value);
    }

    /// Remove a type or constant of that name.
    pub fn remove(&mut self, name: &str) {
        let removed = self.types.remove(name).is_some() | self.constants.remove(name).is_some();
        assert!(removed, "no symbol {}", name);
    }
}

impl TypeDatabase for FakeTypes {
    fn lookup_type(&self, name: &str) -> Option<TypeInfo> {
        self.types.get(name).cloned()
    }

    fn lookup_int_constant(&self, name: &str) -> Option<i64> {
        self.constants.get(name).copied()
    }
}

pub struct FakeProcessBuilder {
    block_size: usize,
    cache_line_size: usize,
    debugging: bool,
}

impl FakeProcessBuilder {
    pub fn block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn cache_line_size(mut self, cache_line_size: usize) -> Self {
        self.cache_line_size = cache_line_size;
        self
    }

    pub fn debugging(mut self, debugging: bool) -> Self {
        self.debugging = debugging;
        self
    }

    pub fn build(self) -> FakeProcess {
        let word = BYTES_IN_WORD;
        // _header, _object, _owner, _next_om, _recursions, then two ints.
        let monitor_size = 7 * word;
        let monitor = TypeInfo::new(OBJECT_MONITOR_TYPE, monitor_size)
            .with_field(FieldInfo::instance("_header", 0))
            .with_field(FieldInfo::instance("_object", word))
            .with_field(FieldInfo::instance("_owner", 2 * word))
            .with_field(FieldInfo::instance("_next_om", 3 * word))
            .with_field(FieldInfo::instance("_recursions", 4 * word))
            .with_field(FieldInfo::instance("_contentions", 5 * word))
            .with_field(FieldInfo::instance("_waiters", 5 * word + BYTES_IN_INT));
        let block_list_field = Address::from_usize(STATICS_START);
        let synchronizer = TypeInfo::new(OBJECT_SYNCHRONIZER_TYPE, 1)
            .with_field(FieldInfo::static_at(BLOCK_LIST_FIELD, block_list_field));
        let oop = TypeInfo::new("oopDesc", 2 * word).with_field(FieldInfo::instance("_mark", 0));

        let mark_layout = MarkWordLayout::host_default();
        let mut types = FakeTypes::default();
        types.add_type(monitor);
        types.add_type(synchronizer);
        types.add_type(oop);
        types.set_constant(BLOCK_SIZE_CONSTANT, self.block_size as i64);
        types.set_constant(CACHE_LINE_SIZE_CONSTANT, self.cache_line_size as i64);
        types.set_constant("markWord::lock_mask_in_place", mark_layout.lock_mask_in_place as i64);
        types.set_constant(
            "markWord::biased_lock_mask_in_place",
            mark_layout.biased_lock_mask_in_place as i64,
        );
        types.set_constant("markWord::hash_shift", mark_layout.hash_shift as i64);
        types.set_constant("markWord::hash_mask", mark_layout.hash_mask as i64);

        let mut memory = FakeMemory::default();
        memory.map(block_list_field, BYTES_IN_WORD);

        FakeProcess {
            memory,
            types,
            debugging: self.debugging,
            mark_layout,
            block_size: self.block_size,
            cache_line_size: self.cache_line_size,
            monitor_size,
            cursor: HEAP_START,
            last_block: None,
            block_list_field,
        }
    }
}

/// A fake image with the monitor symbols of a HotSpot VM and no blocks.
pub struct FakeProcess {
    memory: FakeMemory,
    types: FakeTypes,
    debugging: bool,
    mark_layout: MarkWordLayout,
    block_size: usize,
    cache_line_size: usize,
    monitor_size: usize,
    cursor: usize,
    last_block: Option<Address>,
    block_list_field: Address,
}

impl FakeProcess {
    pub fn builder() -> FakeProcessBuilder {
        FakeProcessBuilder {
            block_size: DEFAULT_BLOCK_SIZE,
            cache_line_size: DEFAULT_CACHE_LINE_SIZE,
            debugging: true,
        }
    }

    fn allocate(&mut self, bytes: usize, align: usize) -> Address {
        let start = raw_align_up(self.cursor, align);
        self.cursor = start + bytes;
        let addr = Address::from_usize(start);
        self.memory.map(addr, bytes);
        addr
    }

    pub fn reads(&self) -> usize {
        self.memory.reads()
    }

    pub fn monitor_type_size(&self) -> usize {
        self.monitor_size
    }

    /// The layout the directory is expected to resolve.
    pub fn monitor_layout(&self) -> MonitorLayout {
        let ty = self
            .types
            .lookup_type(OBJECT_MONITOR_TYPE)
            .expect("ObjectMonitor was removed");
        MonitorLayout::from_type(&ty, self.cache_line_size, self.mark_layout)
            .expect("fake ObjectMonitor layout is valid")
    }

    /// Allocate a block and append it to the block list.
    pub fn add_block(&mut self) -> Address {
        let stride = self.monitor_layout().stride;
        let base = self.allocate(self.block_size * stride, self.cache_line_size);
        match self.last_block {
            Some(prev) => self.link_blocks(prev, base),
            None => self.memory.write_word(self.block_list_field, base.as_usize()),
        }
        self.last_block = Some(base);
        base
    }

    /// Point the link slot of `from` at `to`.
    pub fn link_blocks(&mut self, from: Address, to: Address) {
        let offset = self.monitor_layout().next_om_offset;
        self.memory.write_word(from + offset, to.as_usize());
    }

    /// Fill in the record in `index` of `block` and return its address.
    pub fn set_monitor(
        &mut self,
        block: Address,
        index: usize,
        header: usize,
        object: ObjectReference,
        owner: Address,
        recursions: isize,
    ) -> Address {
        assert!(index > 0 && index < self.block_size, "slot {} is not a record slot", index);
        let layout = self.monitor_layout();
        let addr = block + index * layout.stride;
        self.memory.write_word(addr + layout.header_offset, header);
        self.memory.write_word(addr + layout.object_offset, object.value());
        self.memory.write_word(addr + layout.owner_offset, owner.as_usize());
        self.memory.write_word(addr + layout.recursions_offset, recursions as usize);
        addr
    }

    /// Set the contention and waiter counters of a record.
    pub fn set_monitor_counters(&mut self, monitor: Address, contentions: i32, waiters: i32) {
        let layout = self.monitor_layout();
        if let Some(offset) = layout.contentions_offset {
            self.memory.write_i32(monitor + offset, contentions);
        }
        if let Some(offset) = layout.waiters_offset {
            self.memory.write_i32(monitor + offset, waiters);
        }
    }

    /// Allocate a two-word object (mark, klass) with the given mark word.
    pub fn add_object(&mut self, mark: usize) -> ObjectReference {
        let addr = self.allocate(2 * BYTES_IN_WORD, BYTES_IN_WORD);
        self.memory.write_word(addr, mark);
        ObjectReference::from_raw_address(addr)
    }

    pub fn set_mark(&mut self, object: ObjectReference, mark: usize) {
        self.memory.write_word(object.to_raw_address(), mark);
    }

    /// Allocate a stack lock holding `displaced` and return its address.
    pub fn add_stack_lock(&mut self, displaced: usize) -> Address {
        let addr = self.allocate(BYTES_IN_WORD, BYTES_IN_WORD);
        self.memory.write_word(addr, displaced);
        addr
    }

    pub fn unlocked_mark(&self, hash: usize) -> usize {
        (hash << self.mark_layout.hash_shift) | UNLOCKED_VALUE
    }

    pub fn monitor_mark(&self, monitor: Address) -> usize {
        monitor.as_usize() | MONITOR_VALUE
    }

    pub fn displaced_mark(&self, lock: Address) -> usize {
        debug_assert!(lock.is_aligned_to(BYTES_IN_WORD));
        lock.as_usize() | LOCKED_VALUE
    }

    pub fn set_constant(&mut self, name: &str, value: i64) {
        self.types.set_constant(name, value);
    }

    /// Remove a type or constant, as an older or stripped image would lack it.
    pub fn remove_symbol(&mut self, name: &str) {
        self.types.remove(name);
    }

    /// Make the `gBlockList` static point at unmapped memory.
    pub fn unmap_block_list_head(&mut self) {
        self.types.add_type(
            TypeInfo::new(OBJECT_SYNCHRONIZER_TYPE, 1)
                .with_field(FieldInfo::static_at(BLOCK_LIST_FIELD, Address::from_usize(0x10))),
        );
    }
}

impl TargetProcess for FakeProcess {
    type Reader = FakeMemory;
    type Types = FakeTypes;

    fn reader(&self) -> &FakeMemory {
        &self.memory
    }

    fn type_database(&self) -> &FakeTypes {
        &self.types
    }

    fn is_debugging(&self) -> bool {
        self.debugging
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwritten_mapped_words_read_zero() {
        let mut fake = FakeProcess::builder().block_size(2).build();
        let block = fake.add_block();
        assert_eq!(fake.reader().read_word(block + BYTES_IN_WORD), Ok(0));
        assert!(fake.reader().read_word(Address::from_usize(0x20)).is_err());
        assert!(fake.reader().read_word(block + 1usize).is_err());
    }

    #[test]
    fn i32_fields_round_trip() {
        let mut fake = FakeProcess::builder().build();
        let block = fake.add_block();
        let layout = fake.monitor_layout();
        let monitor = block + layout.stride;
        fake.set_monitor_counters(monitor, 3, -1);
        let m = crate::monitor::ObjectMonitor::new(monitor);
        assert_eq!(m.contentions(fake.reader(), &layout), Ok(Some(3)));
        assert_eq!(m.waiters(fake.reader(), &layout), Ok(Some(-1)));
    }
}
