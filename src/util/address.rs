use bytemuck::NoUninit;

use std::fmt;
use std::ops::{Add, Sub};

/// size in bytes
pub type ByteSize = usize;

/// Address represents an address in the inspected process image. It is only
/// ever used for address arithmetic and as a key into a [`crate::vm::MemoryReader`];
/// it is never dereferenced in the observer's own address space. This type needs
/// to be zero overhead (memory wise and time wise). The idea is from the paper
/// High-level Low-level Programming (VEE09) and JikesRVM.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, Hash, PartialOrd, Ord, PartialEq, NoUninit)]
pub struct Address(usize);

/// Address + ByteSize (positive)
impl Add<ByteSize> for Address {
    type Output = Address;
    fn add(self, offset: ByteSize) -> Address {
        Address(self.0 + offset)
    }
}

/// Address - Address (the first address must be higher)
impl Sub<Address> for Address {
    type Output = ByteSize;
    fn sub(self, other: Address) -> ByteSize {
        debug_assert!(
            self.0 >= other.0,
            "for (addr_a - addr_b), a({}) needs to be larger than b({})",
            self,
            other
        );
        self.0 - other.0
    }
}

impl Address {
    /// The lowest possible address. Remote pointer fields holding this value are null.
    pub const ZERO: Self = Address(0);
    /// The highest possible address.
    pub const MAX: Self = Address(usize::MAX);

    /// creates an Address from a raw word read out of the target image.
    /// Unlike a local pointer, a remote address is only data, so this is safe.
    pub const fn from_usize(raw: usize) -> Address {
        Address(raw)
    }

    /// Add an offset, returning `None` on overflow. Offsets computed from
    /// remote data go through this instead of `+`.
    pub const fn checked_add(self, size: usize) -> Option<Address> {
        match self.0.checked_add(size) {
            Some(v) => Some(Address(v)),
            None => None,
        }
    }

    /// is this address zero?
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// `None` for the null address, `Some(self)` otherwise.
    pub const fn non_null(self) -> Option<Address> {
        if self.is_zero() {
            None
        } else {
            Some(self)
        }
    }

    /// aligns up the address to the given alignment
    pub const fn align_up(self, align: ByteSize) -> Address {
        use crate::util::conversions;
        Address(conversions::raw_align_up(self.0, align))
    }

    /// aligns down the address to the given alignment
    pub const fn align_down(self, align: ByteSize) -> Address {
        use crate::util::conversions;
        Address(conversions::raw_align_down(self.0, align))
    }

    /// is this address aligned to the given alignment
    pub const fn is_aligned_to(self, align: usize) -> bool {
        use crate::util::conversions;
        conversions::raw_is_aligned(self.0, align)
    }

    /// converts the Address to a pointer-sized integer
    pub const fn as_usize(self) -> usize {
        self.0
    }
}

/// allows print Address as lower-case hex value
impl fmt::LowerHex for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

/// allows Display format the Address (as lower-case hex value with 0x prefix)
impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// allows Debug format the Address (as lower-case hex value with 0x prefix)
impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Parses decimal, or hex with a `0x` prefix (the form debuggers print).
impl std::str::FromStr for Address {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => usize::from_str_radix(hex, 16)?,
            None => s.parse()?,
        };
        Ok(Address(raw))
    }
}

#[cfg(test)]
mod tests {
    use crate::util::Address;

    #[test]
    fn align_up() {
        assert_eq!(
            Address::from_usize(0x10).align_up(0x10),
            Address::from_usize(0x10)
        );
        assert_eq!(
            Address::from_usize(0x11).align_up(0x10),
            Address::from_usize(0x20)
        );
    }

    #[test]
    fn align_down() {
        assert_eq!(
            Address::from_usize(0x11).align_down(0x10),
            Address::from_usize(0x10)
        );
        assert_eq!(
            Address::from_usize(0x20).align_down(0x10),
            Address::from_usize(0x20)
        );
    }

    #[test]
    fn is_aligned_to() {
        assert!(Address::from_usize(0x10).is_aligned_to(0x10));
        assert!(!Address::from_usize(0x11).is_aligned_to(0x10));
        assert!(Address::from_usize(0x10).is_aligned_to(0x8));
        assert!(!Address::from_usize(0x10).is_aligned_to(0x20));
    }

    #[test]
    fn checked_add_overflow() {
        assert_eq!(Address::MAX.checked_add(1), None);
        assert_eq!(
            Address::from_usize(0x10).checked_add(0x10),
            Some(Address::from_usize(0x20))
        );
    }

    #[test]
    fn parse_hex_and_decimal() {
        assert_eq!(
            "0x7f00".parse::<Address>().unwrap(),
            Address::from_usize(0x7f00)
        );
        assert_eq!("4096".parse::<Address>().unwrap(), Address::from_usize(4096));
        assert!("0xzz".parse::<Address>().is_err());
    }

    #[test]
    fn display_is_prefixed_hex() {
        assert_eq!(format!("{}", Address::from_usize(0xabc)), "0xabc");
        assert_eq!(format!("{:?}", Address::ZERO), "0x0");
    }
}

/// ObjectReference represents the address of an object in the inspected image.
/// Compared with Address, operations allowed on ObjectReference are very limited.
/// No address arithmetics are allowed for ObjectReference. The idea is from the paper
/// High-level Low-level Programming (VEE09) and JikesRVM.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, Hash, PartialOrd, Ord, PartialEq, NoUninit)]
pub struct ObjectReference(usize);

impl ObjectReference {
    /// The null object reference, represented as zero.
    pub const NULL: ObjectReference = ObjectReference(0);

    /// Cast the object reference to its raw address.
    pub const fn to_raw_address(self) -> Address {
        Address(self.0)
    }

    /// Cast a raw address to an object reference.
    pub const fn from_raw_address(addr: Address) -> ObjectReference {
        ObjectReference(addr.0)
    }

    /// is this object reference null reference?
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// returns the ObjectReference
    pub const fn value(self) -> usize {
        self.0
    }
}

/// allows print ObjectReference as lower-case hex value
impl fmt::LowerHex for ObjectReference {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

/// allows Display format the ObjectReference (as lower-case hex value with 0x prefix)
impl fmt::Display for ObjectReference {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// allows Debug format the ObjectReference (as lower-case hex value with 0x prefix)
impl fmt::Debug for ObjectReference {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}
