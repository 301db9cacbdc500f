use std::fmt;

use crate::error::{InspectError, Result};
use crate::monitor::{MarkWord, MarkWordLayout};
use crate::util::conversions::ceil_to_multiple;
use crate::util::{Address, ObjectReference};
use crate::vm::{MemoryReader, TypeInfo};

/// Name of the monitor record type in the image.
pub const OBJECT_MONITOR_TYPE: &str = "ObjectMonitor";

/// Field layout of one monitor record, and the padded stride between records
/// in a block.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MonitorLayout {
    /// `sizeof(ObjectMonitor)`.
    pub size: usize,
    /// `size` rounded up to a multiple of `cache_line_size`, so two records
    /// never share a cache line.
    pub stride: usize,
    pub cache_line_size: usize,
    pub header_offset: usize,
    pub object_offset: usize,
    pub owner_offset: usize,
    /// The intrusive link. Only meaningful in slot 0 of a block, where it
    /// points at the next block.
    pub next_om_offset: usize,
    pub recursions_offset: usize,
    pub contentions_offset: Option<usize>,
    pub waiters_offset: Option<usize>,
    /// Decoding of the `_header` field.
    pub header_layout: MarkWordLayout,
}

impl MonitorLayout {
    /// Build the layout from the exported `ObjectMonitor` type.
    pub fn from_type(
        ty: &TypeInfo,
        cache_line_size: usize,
        header_layout: MarkWordLayout,
    ) -> Result<MonitorLayout> {
        let required = |name: &str| {
            ty.field_offset(name).ok_or_else(|| {
                InspectError::layout_unavailable(format!("{}::{} not exported", ty.name, name))
            })
        };

        if ty.size == 0 {
            return Err(InspectError::layout_unavailable(format!(
                "{} has size 0",
                ty.name
            )));
        }
        if !cache_line_size.is_power_of_two() {
            return Err(InspectError::layout_unavailable(format!(
                "cache line size {} is not a power of two",
                cache_line_size
            )));
        }
        let stride = ceil_to_multiple(ty.size, cache_line_size).ok_or_else(|| {
            InspectError::layout_unavailable(format!("{} size {} overflows", ty.name, ty.size))
        })?;

        // Older images name the link `FreeNext`.
        let next_om_offset = ty
            .field_offset("_next_om")
            .or_else(|| ty.field_offset("FreeNext"))
            .ok_or_else(|| {
                InspectError::layout_unavailable(format!("{}::_next_om not exported", ty.name))
            })?;

        let layout = MonitorLayout {
            size: ty.size,
            stride,
            cache_line_size,
            header_offset: required("_header")?,
            object_offset: required("_object")?,
            owner_offset: required("_owner")?,
            next_om_offset,
            recursions_offset: required("_recursions")?,
            contentions_offset: ty.field_offset("_contentions"),
            waiters_offset: ty.field_offset("_waiters"),
            header_layout,
        };
        debug_assert!(layout.stride % layout.cache_line_size == 0);
        debug_assert!(layout.stride >= layout.size);
        Ok(layout)
    }
}

/// A reference to one monitor record in the image. Fields are read on demand.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectMonitor {
    addr: Address,
}

impl ObjectMonitor {
    pub const fn new(addr: Address) -> ObjectMonitor {
        ObjectMonitor { addr }
    }

    pub const fn address(&self) -> Address {
        self.addr
    }

    fn field(&self, offset: usize) -> Result<Address> {
        self.addr.checked_add(offset).ok_or_else(|| {
            InspectError::precondition(format!("field +{} of {} overflows", offset, self))
        })
    }

    /// The header saved when the lock was inflated. Once captured it is an
    /// unlocked header carrying the object's identity hash.
    pub fn header<R: MemoryReader + ?Sized>(
        &self,
        reader: &R,
        layout: &MonitorLayout,
    ) -> Result<MarkWord> {
        let value = reader.read_word(self.field(layout.header_offset)?)?;
        Ok(MarkWord::new(value, layout.header_layout))
    }

    /// The object this monitor is associated with. Null for a free slot.
    pub fn object<R: MemoryReader + ?Sized>(
        &self,
        reader: &R,
        layout: &MonitorLayout,
    ) -> Result<ObjectReference> {
        let addr = reader.read_address(self.field(layout.object_offset)?)?;
        Ok(ObjectReference::from_raw_address(addr))
    }

    /// The owning thread (or the lock's stack slot for a lock inflated while
    /// lightweight-locked). Null when unowned.
    pub fn owner<R: MemoryReader + ?Sized>(
        &self,
        reader: &R,
        layout: &MonitorLayout,
    ) -> Result<Address> {
        Ok(reader.read_address(self.field(layout.owner_offset)?)?)
    }

    pub fn next_om<R: MemoryReader + ?Sized>(
        &self,
        reader: &R,
        layout: &MonitorLayout,
    ) -> Result<Option<Address>> {
        Ok(reader.read_address(self.field(layout.next_om_offset)?)?.non_null())
    }

    pub fn recursions<R: MemoryReader + ?Sized>(
        &self,
        reader: &R,
        layout: &MonitorLayout,
    ) -> Result<isize> {
        Ok(reader.read_isize(self.field(layout.recursions_offset)?)?)
    }

    /// Threads contending to enter, if the image exports the counter.
    pub fn contentions<R: MemoryReader + ?Sized>(
        &self,
        reader: &R,
        layout: &MonitorLayout,
    ) -> Result<Option<i32>> {
        match layout.contentions_offset {
            Some(offset) => Ok(Some(reader.read_i32(self.field(offset)?)?)),
            None => Ok(None),
        }
    }

    /// Threads in `wait()`, if the image exports the counter.
    pub fn waiters<R: MemoryReader + ?Sized>(
        &self,
        reader: &R,
        layout: &MonitorLayout,
    ) -> Result<Option<i32>> {
        match layout.waiters_offset {
            Some(offset) => Ok(Some(reader.read_i32(self.field(offset)?)?)),
            None => Ok(None),
        }
    }

    pub fn is_owned<R: MemoryReader + ?Sized>(
        &self,
        reader: &R,
        layout: &MonitorLayout,
    ) -> Result<bool> {
        self.owner(reader, layout).map(|owner| !owner.is_zero())
    }

    /// Read every field once.
    pub fn snapshot<R: MemoryReader + ?Sized>(
        &self,
        reader: &R,
        layout: &MonitorLayout,
    ) -> Result<MonitorRecord> {
        let object = self.object(reader, layout)?;
        let record = MonitorRecord {
            monitor: *self,
            header: self.header(reader, layout)?,
            object,
            owner: self.owner(reader, layout)?,
            recursions: self.recursions(reader, layout)?,
            contentions: self.contentions(reader, layout)?,
            waiters: self.waiters(reader, layout)?,
            is_live: !object.is_null(),
        };
        trace!("Read {:?}", record);
        Ok(record)
    }
}

impl fmt::Display for ObjectMonitor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ObjectMonitor@{}", self.addr)
    }
}

impl fmt::Debug for ObjectMonitor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// The fields of one monitor record, read at one point in time.
///
/// Blocks hold free slots as well as slots in use. `is_live` tells them
/// apart: a record is live while it is associated with an object.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MonitorRecord {
    pub monitor: ObjectMonitor,
    pub header: MarkWord,
    pub object: ObjectReference,
    pub owner: Address,
    pub recursions: isize,
    pub contentions: Option<i32>,
    pub waiters: Option<i32>,
    pub is_live: bool,
}

impl MonitorRecord {
    pub fn is_owned(&self) -> bool {
        !self.owner.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::constants::BYTES_IN_WORD;
    use crate::vm::FieldInfo;

    fn monitor_type(size: usize) -> TypeInfo {
        TypeInfo::new(OBJECT_MONITOR_TYPE, size)
            .with_field(FieldInfo::instance("_header", 0))
            .with_field(FieldInfo::instance("_object", BYTES_IN_WORD))
            .with_field(FieldInfo::instance("_owner", 2 * BYTES_IN_WORD))
            .with_field(FieldInfo::instance("_next_om", 3 * BYTES_IN_WORD))
            .with_field(FieldInfo::instance("_recursions", 4 * BYTES_IN_WORD))
    }

    #[test]
    fn stride_is_padded_to_cache_line() {
        for (size, line, stride) in [(56, 64, 64), (64, 64, 64), (65, 64, 128), (200, 128, 256)] {
            let layout = MonitorLayout::from_type(&monitor_type(size), line, MarkWordLayout::LP64)
                .unwrap_or_else(|e| panic!("{}", e));
            assert_eq!(layout.stride, stride);
            assert_eq!(layout.stride % line, 0);
            assert!(layout.stride >= size);
        }
    }

    #[test]
    fn optional_counters() {
        let layout = MonitorLayout::from_type(&monitor_type(56), 64, MarkWordLayout::LP64).unwrap();
        assert_eq!(layout.contentions_offset, None);
        assert_eq!(layout.waiters_offset, None);

        let ty = monitor_type(56).with_field(FieldInfo::instance("_waiters", 5 * BYTES_IN_WORD));
        let layout = MonitorLayout::from_type(&ty, 64, MarkWordLayout::LP64).unwrap();
        assert_eq!(layout.waiters_offset, Some(5 * BYTES_IN_WORD));
    }

    #[test]
    fn legacy_link_name() {
        let ty = TypeInfo::new(OBJECT_MONITOR_TYPE, 56)
            .with_field(FieldInfo::instance("_header", 0))
            .with_field(FieldInfo::instance("_object", 8))
            .with_field(FieldInfo::instance("_owner", 16))
            .with_field(FieldInfo::instance("FreeNext", 24))
            .with_field(FieldInfo::instance("_recursions", 32));
        let layout = MonitorLayout::from_type(&ty, 64, MarkWordLayout::LP64).unwrap();
        assert_eq!(layout.next_om_offset, 24);
    }

    #[test]
    fn missing_field_or_bad_cache_line() {
        let ty =
            TypeInfo::new(OBJECT_MONITOR_TYPE, 56).with_field(FieldInfo::instance("_header", 0));
        assert!(matches!(
            MonitorLayout::from_type(&ty, 64, MarkWordLayout::LP64),
            Err(InspectError::LayoutUnavailable(_))
        ));
        assert!(matches!(
            MonitorLayout::from_type(&monitor_type(56), 0, MarkWordLayout::LP64),
            Err(InspectError::LayoutUnavailable(_))
        ));
        assert!(matches!(
            MonitorLayout::from_type(&monitor_type(56), 48, MarkWordLayout::LP64),
            Err(InspectError::LayoutUnavailable(_))
        ));
        assert!(matches!(
            MonitorLayout::from_type(&monitor_type(0), 64, MarkWordLayout::LP64),
            Err(InspectError::LayoutUnavailable(_))
        ));
    }
}
