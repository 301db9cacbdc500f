use crate::util::constants::*;
use crate::util::Address;

/// A failed read from the target image: the address is unmapped, the
/// process went away, or the core file is truncated.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("cannot read {len} bytes at {addr}: {reason}")]
pub struct ReadError {
    pub addr: Address,
    pub len: usize,
    pub reason: String,
}

impl ReadError {
    pub fn new(addr: Address, len: usize, reason: impl Into<String>) -> Self {
        ReadError {
            addr,
            len,
            reason: reason.into(),
        }
    }

    /// The usual error for an address the image does not map.
    pub fn unmapped(addr: Address, len: usize) -> Self {
        Self::new(addr, len, "address not mapped")
    }
}

/// Raw, read-only access to the memory of the inspected process.
///
/// Implementations read from a suspended process (ptrace, `/proc/pid/mem`),
/// a core file, or a test image. Reads must be synchronous and must not
/// resume the target. Only [`MemoryReader::read_word`] is required; the typed
/// readers default to it, assuming the image has the observer's word size and
/// endianness.
pub trait MemoryReader {
    /// Read one machine word at `addr`.
    fn read_word(&self, addr: Address) -> Result<usize, ReadError>;

    /// Read a pointer-sized field and interpret it as an address in the image.
    fn read_address(&self, addr: Address) -> Result<Address, ReadError> {
        self.read_word(addr).map(Address::from_usize)
    }

    /// Read a 32-bit signed field. The default reads the enclosing word.
    fn read_i32(&self, addr: Address) -> Result<i32, ReadError> {
        let base = addr.align_down(BYTES_IN_WORD);
        let shift = (addr - base) * BITS_IN_BYTE;
        if shift + BYTES_IN_INT * BITS_IN_BYTE > BYTES_IN_WORD * BITS_IN_BYTE {
            return Err(ReadError::new(addr, BYTES_IN_INT, "int field straddles a word"));
        }
        let word = self.read_word(base)?;
        Ok(if cfg!(target_endian = "little") {
            (word >> shift) as u32 as i32
        } else {
            let high = BYTES_IN_WORD * BITS_IN_BYTE - BYTES_IN_INT * BITS_IN_BYTE - shift;
            (word >> high) as u32 as i32
        })
    }

    /// Read a signed field as wide as a machine word (`intx` in the image).
    fn read_isize(&self, addr: Address) -> Result<isize, ReadError> {
        self.read_word(addr).map(|w| w as isize)
    }
}

impl<R: MemoryReader + ?Sized> MemoryReader for &R {
    fn read_word(&self, addr: Address) -> Result<usize, ReadError> {
        (**self).read_word(addr)
    }
    fn read_address(&self, addr: Address) -> Result<Address, ReadError> {
        (**self).read_address(addr)
    }
    fn read_i32(&self, addr: Address) -> Result<i32, ReadError> {
        (**self).read_i32(addr)
    }
    fn read_isize(&self, addr: Address) -> Result<isize, ReadError> {
        (**self).read_isize(addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct Words(HashMap<usize, usize>);

    impl MemoryReader for Words {
        fn read_word(&self, addr: Address) -> Result<usize, ReadError> {
            self.0
                .get(&addr.as_usize())
                .copied()
                .ok_or_else(|| ReadError::unmapped(addr, BYTES_IN_WORD))
        }
    }

    #[cfg(all(target_endian = "little", target_pointer_width = "64"))]
    #[test]
    fn read_i32_halves() {
        let mem = Words(HashMap::from([(0x1000, 0xffff_fffe_0000_0007)]));
        assert_eq!(mem.read_i32(Address::from_usize(0x1000)), Ok(7));
        assert_eq!(mem.read_i32(Address::from_usize(0x1004)), Ok(-2));
        assert!(mem.read_i32(Address::from_usize(0x1006)).is_err());
    }

    #[test]
    fn unmapped_read_reports_address() {
        let mem = Words(HashMap::new());
        let err = mem.read_address(Address::from_usize(0x40)).unwrap_err();
        assert_eq!(err.addr, Address::from_usize(0x40));
        assert!(err.to_string().contains("0x40"));
    }
}
