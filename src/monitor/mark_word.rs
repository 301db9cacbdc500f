//! Decoding of the header word found at a fixed offset in every object.
//!
//! The low two bits select the lock state:
//!
//! ```text
//!  value                                     lock bits  state
//!  [ hash | age | 0 ]                        01         unlocked, carries the identity hash
//!  [ ptr to displaced header      ]          00         lightweight-locked (displaced)
//!  [ ptr to ObjectMonitor         ]          10         inflated (monitor)
//!  [ forwarding / GC state        ]          11         marked by the collector
//!  [ thread | epoch | age | 1 ]              01         biased (biased bit set)
//! ```
//!
//! Only the first three are meaningful to the synchronizer.

use std::fmt;

use crate::error::{InspectError, Result};
use crate::monitor::ObjectMonitor;
use crate::util::constants::mark_tags::*;
use crate::util::constants::*;
use crate::util::conversions::constant_to_usize;
use crate::util::Address;
use crate::vm::{MemoryReader, TypeDatabase};

/// Masks and shifts of the mark word, plus where the mark word sits in an object.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MarkWordLayout {
    /// Byte offset of the mark word from the object start (`oopDesc::_mark`).
    pub mark_offset: usize,
    pub lock_mask_in_place: usize,
    pub biased_lock_mask_in_place: usize,
    pub hash_shift: usize,
    /// Right-justified mask of the hash field.
    pub hash_mask: usize,
}

impl MarkWordLayout {
    /// The 64-bit header: `unused:25 hash:31 unused_gap:1 age:4 biased_lock:1 lock:2`.
    pub const LP64: MarkWordLayout = MarkWordLayout {
        mark_offset: 0,
        lock_mask_in_place: 0b11,
        biased_lock_mask_in_place: 0b111,
        hash_shift: 8,
        hash_mask: (1 << 31) - 1,
    };

    /// The 32-bit header: `hash:25 age:4 biased_lock:1 lock:2`.
    pub const ILP32: MarkWordLayout = MarkWordLayout {
        mark_offset: 0,
        lock_mask_in_place: 0b11,
        biased_lock_mask_in_place: 0b111,
        hash_shift: 7,
        hash_mask: (1 << 25) - 1,
    };

    /// The layout a VM built for the observer's pointer width would use.
    pub const fn host_default() -> MarkWordLayout {
        if BYTES_IN_WORD == 8 {
            Self::LP64
        } else {
            Self::ILP32
        }
    }

    /// Resolve the layout from the image. Each missing or out-of-range symbol
    /// falls back to [`MarkWordLayout::host_default`].
    pub fn resolve<T: TypeDatabase + ?Sized>(types: &T) -> MarkWordLayout {
        let default = Self::host_default();
        let constant = |name: &str, fallback: usize, valid: &dyn Fn(usize) -> bool| {
            match types.lookup_int_constant(name).and_then(constant_to_usize) {
                Some(v) if valid(v) => v,
                Some(v) => {
                    warn!("{} = {:#x} is out of range, using {:#x}", name, v, fallback);
                    fallback
                }
                None => {
                    debug!("{} not exported, using {:#x}", name, fallback);
                    fallback
                }
            }
        };

        let mark_offset = match types.lookup_type("oopDesc").and_then(|t| t.field_offset("_mark")) {
            Some(offset) => offset,
            None => {
                debug!("oopDesc::_mark not exported, assuming offset 0");
                default.mark_offset
            }
        };

        let layout = MarkWordLayout {
            mark_offset,
            lock_mask_in_place: constant(
                "markWord::lock_mask_in_place",
                default.lock_mask_in_place,
                &|v: usize| v == 0b11,
            ),
            biased_lock_mask_in_place: constant(
                "markWord::biased_lock_mask_in_place",
                default.biased_lock_mask_in_place,
                &|v: usize| v == 0b111,
            ),
            hash_shift: constant("markWord::hash_shift", default.hash_shift, &|v: usize| {
                v > 2 && v < BITS_IN_ADDRESS
            }),
            hash_mask: constant("markWord::hash_mask", default.hash_mask, &|v: usize| {
                v != 0 && (v & v.wrapping_add(1)) == 0
            }),
        };
        debug!("Resolved mark word layout: {:?}", layout);
        layout
    }
}

impl Default for MarkWordLayout {
    fn default() -> Self {
        Self::host_default()
    }
}

/// The decoded, mutually exclusive states of a mark word.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MarkState {
    /// Neutral header. `hash` is zero if no identity hash has been assigned.
    Unlocked { hash: usize },
    /// Inflated: the header points at a monitor record.
    Monitor(ObjectMonitor),
    /// Lightweight-locked: the header points at the saved original header.
    Displaced(Address),
}

/// A raw header value together with the layout needed to decode it.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct MarkWord {
    value: usize,
    layout: MarkWordLayout,
}

impl MarkWord {
    pub const fn new(value: usize, layout: MarkWordLayout) -> MarkWord {
        MarkWord { value, layout }
    }

    /// Read the mark word of the object at `object_start`.
    pub fn read<R: MemoryReader + ?Sized>(
        reader: &R,
        object_start: Address,
        layout: MarkWordLayout,
    ) -> Result<MarkWord> {
        let addr = object_start.checked_add(layout.mark_offset).ok_or_else(|| {
            InspectError::precondition(format!("object {} too high", object_start))
        })?;
        Ok(MarkWord::new(reader.read_word(addr)?, layout))
    }

    pub const fn value(&self) -> usize {
        self.value
    }

    pub const fn layout(&self) -> &MarkWordLayout {
        &self.layout
    }

    fn lock_bits(&self) -> usize {
        self.value & self.layout.lock_mask_in_place
    }

    /// The pointer carried by a locked or inflated header.
    fn pointer(&self) -> Address {
        Address::from_usize(self.value & !self.layout.lock_mask_in_place)
    }

    pub fn is_unlocked(&self) -> bool {
        self.value & self.layout.biased_lock_mask_in_place == UNLOCKED_VALUE
    }

    pub fn is_biased(&self) -> bool {
        self.value & self.layout.biased_lock_mask_in_place == BIASED_LOCK_PATTERN
    }

    pub fn has_monitor(&self) -> bool {
        self.lock_bits() == MONITOR_VALUE
    }

    pub fn has_displaced_mark_helper(&self) -> bool {
        self.lock_bits() == LOCKED_VALUE
    }

    pub fn is_marked(&self) -> bool {
        self.lock_bits() == MARKED_VALUE
    }

    /// The identity hash bits. Only valid for an unlocked header.
    pub fn hash(&self) -> Result<usize> {
        if !self.is_unlocked() {
            return Err(InspectError::precondition(format!(
                "hash() on non-unlocked {}",
                self
            )));
        }
        Ok(self.hash_bits())
    }

    fn hash_bits(&self) -> usize {
        (self.value >> self.layout.hash_shift) & self.layout.hash_mask
    }

    /// True for an unlocked header that has not been assigned an identity hash yet.
    pub fn has_no_hash(&self) -> Result<bool> {
        self.hash().map(|h| h == NO_HASH)
    }

    /// The monitor record this header points at. Only valid when [`MarkWord::has_monitor`].
    pub fn monitor(&self) -> Result<ObjectMonitor> {
        if !self.has_monitor() {
            return Err(InspectError::precondition(format!(
                "monitor() on {} without a monitor",
                self
            )));
        }
        let addr = self.pointer();
        if addr.is_zero() {
            return Err(InspectError::precondition(format!(
                "{} carries a null monitor pointer",
                self
            )));
        }
        Ok(ObjectMonitor::new(addr))
    }

    /// Address of the saved original header. Only valid when
    /// [`MarkWord::has_displaced_mark_helper`].
    pub fn displaced_mark_address(&self) -> Result<Address> {
        if !self.has_displaced_mark_helper() {
            return Err(InspectError::precondition(format!(
                "displaced_mark_helper() on {} that is not lightweight-locked",
                self
            )));
        }
        let addr = self.pointer();
        if addr.is_zero() {
            return Err(InspectError::precondition(format!(
                "{} carries a null displaced header pointer",
                self
            )));
        }
        Ok(addr)
    }

    /// Read the saved original header of a lightweight-locked object. The
    /// saved header lives on the locking thread's stack, so this is only
    /// meaningful while that thread is suspended; callers gate it on
    /// debug-inspection mode.
    pub fn displaced_mark_helper<R: MemoryReader + ?Sized>(&self, reader: &R) -> Result<MarkWord> {
        let addr = self.displaced_mark_address()?;
        Ok(MarkWord::new(reader.read_word(addr)?, self.layout))
    }

    /// Classify the header into one of the states the synchronizer understands.
    pub fn decode(&self) -> Result<MarkState> {
        if self.is_unlocked() {
            return Ok(MarkState::Unlocked { hash: self.hash()? });
        }
        if self.has_monitor() {
            return Ok(MarkState::Monitor(self.monitor()?));
        }
        if self.has_displaced_mark_helper() {
            return match self.displaced_mark_address() {
                Ok(addr) => Ok(MarkState::Displaced(addr)),
                Err(_) => Err(self.undecodable("null displaced header pointer")),
            };
        }
        if self.is_biased() {
            Err(self.undecodable("biased header"))
        } else {
            debug_assert!(self.is_marked());
            Err(self.undecodable("header claimed by the collector"))
        }
    }

    fn undecodable(&self, reason: &'static str) -> InspectError {
        InspectError::UndecodableMark {
            value: self.value,
            reason,
        }
    }

    fn state_name(&self) -> &'static str {
        if self.is_unlocked() {
            "unlocked"
        } else if self.is_biased() {
            "biased"
        } else if self.has_monitor() {
            "monitor"
        } else if self.has_displaced_mark_helper() {
            "displaced"
        } else {
            "marked"
        }
    }
}

impl fmt::Display for MarkWord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "mark({:#x})[{}", self.value, self.state_name())?;
        if self.is_unlocked() {
            write!(f, " hash={:#x}", self.hash_bits())?;
        } else if self.has_monitor() || self.has_displaced_mark_helper() {
            write!(f, " ptr={}", self.pointer())?;
        }
        write!(f, "]")
    }
}

impl fmt::Debug for MarkWord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
