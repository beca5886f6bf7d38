//! Endian-normalized access to the guest memory buffer.
//!
//! Guest memory is one flat byte buffer holding code and data alike. All
//! multi-byte values on the buffer are little-endian regardless of host
//! endianness, and the guest may use unaligned addresses; both properties
//! fall out of going through `from_le_bytes`/`to_le_bytes` on a subslice
//! rather than reinterpreting the buffer in place.
//!
//! Every accessor is bounds-checked. Returns
//! [`VmError::OutOfRangeAccess`] when the access would fall outside the
//! buffer, so a misbehaving guest can never touch host memory.

use crate::errors::VmError;

/// Size of one instruction word in bytes.
pub const WORD_SIZE: u32 = 4;

/// Returns the `len`-byte subslice at `addr`, or the out-of-range error.
fn span(mem: &[u8], addr: u32, len: u32) -> Result<&[u8], VmError> {
    let start = addr as usize;
    let end = start
        .checked_add(len as usize)
        .ok_or(VmError::OutOfRangeAccess { addr, len })?;
    mem.get(start..end)
        .ok_or(VmError::OutOfRangeAccess { addr, len })
}

/// Mutable variant of [`span`].
fn span_mut(mem: &mut [u8], addr: u32, len: u32) -> Result<&mut [u8], VmError> {
    let start = addr as usize;
    let end = start
        .checked_add(len as usize)
        .ok_or(VmError::OutOfRangeAccess { addr, len })?;
    mem.get_mut(start..end)
        .ok_or(VmError::OutOfRangeAccess { addr, len })
}

/// Reads the byte at `addr`.
pub fn read8(mem: &[u8], addr: u32) -> Result<u8, VmError> {
    Ok(span(mem, addr, 1)?[0])
}

/// Reads the little-endian half-word at `addr`. `addr` may be unaligned.
pub fn read16(mem: &[u8], addr: u32) -> Result<u16, VmError> {
    let bytes = span(mem, addr, 2)?;
    Ok(u16::from_le_bytes(bytes.try_into().unwrap()))
}

/// Reads the little-endian word at `addr`. `addr` may be unaligned.
pub fn read32(mem: &[u8], addr: u32) -> Result<u32, VmError> {
    let bytes = span(mem, addr, 4)?;
    Ok(u32::from_le_bytes(bytes.try_into().unwrap()))
}

/// Writes `value` to the byte at `addr`.
pub fn write8(mem: &mut [u8], addr: u32, value: u8) -> Result<(), VmError> {
    span_mut(mem, addr, 1)?[0] = value;
    Ok(())
}

/// Writes `value` little-endian to the half-word at `addr`.
pub fn write16(mem: &mut [u8], addr: u32, value: u16) -> Result<(), VmError> {
    span_mut(mem, addr, 2)?.copy_from_slice(&value.to_le_bytes());
    Ok(())
}

/// Writes `value` little-endian to the word at `addr`.
pub fn write32(mem: &mut [u8], addr: u32, value: u32) -> Result<(), VmError> {
    span_mut(mem, addr, 4)?.copy_from_slice(&value.to_le_bytes());
    Ok(())
}

/// Copies `words` little-endian into `mem` starting at address 0.
///
/// This is how an assembled or loaded image becomes the initial contents of
/// a memory buffer.
pub fn load_words(mem: &mut [u8], words: &[u32]) -> Result<(), VmError> {
    for (i, &word) in words.iter().enumerate() {
        write32(mem, i as u32 * WORD_SIZE, word)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_roundtrip_at_any_in_range_address() {
        let mut mem = vec![0u8; 16];
        for addr in 0..=12 {
            write32(&mut mem, addr, 0xDEAD_BEEF).unwrap();
            assert_eq!(read32(&mem, addr).unwrap(), 0xDEAD_BEEF);
        }
    }

    #[test]
    fn values_are_stored_little_endian() {
        let mut mem = vec![0u8; 8];
        write32(&mut mem, 0, 0x1234_5678).unwrap();
        assert_eq!(&mem[..4], &[0x78, 0x56, 0x34, 0x12]);

        write16(&mut mem, 4, 0xABCD).unwrap();
        assert_eq!(&mem[4..6], &[0xCD, 0xAB]);
    }

    #[test]
    fn unaligned_word_read_concatenates_bytes() {
        let mem = [0x00, 0x11, 0x22, 0x33, 0x44, 0x55];
        assert_eq!(read32(&mem, 1).unwrap(), 0x4433_2211);
    }

    #[test]
    fn half_word_roundtrip() {
        let mut mem = vec![0u8; 4];
        write16(&mut mem, 1, 0x8001).unwrap();
        assert_eq!(read16(&mem, 1).unwrap(), 0x8001);
    }

    #[test]
    fn out_of_range_read_is_an_error() {
        let mem = [0u8; 8];
        assert_eq!(
            read32(&mem, 5),
            Err(VmError::OutOfRangeAccess { addr: 5, len: 4 })
        );
        assert_eq!(
            read8(&mem, 8),
            Err(VmError::OutOfRangeAccess { addr: 8, len: 1 })
        );
    }

    #[test]
    fn out_of_range_write_leaves_memory_untouched() {
        let mut mem = vec![0u8; 4];
        assert!(write32(&mut mem, 2, 0xFFFF_FFFF).is_err());
        assert_eq!(mem, vec![0u8; 4]);
    }

    #[test]
    fn load_words_places_an_image_at_address_zero() {
        let mut mem = vec![0u8; 12];
        load_words(&mut mem, &[0x0000_0073, 0x0010_0073]).unwrap();
        assert_eq!(read32(&mem, 0).unwrap(), 0x0000_0073);
        assert_eq!(read32(&mem, 4).unwrap(), 0x0010_0073);
        assert_eq!(read32(&mem, 8).unwrap(), 0);
    }
}
