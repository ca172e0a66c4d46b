//! Little-endian field helpers shared by the filter and key-stream formats.
//!
//! Every on-disk artifact starts with a NUL-terminated magic line; scalar
//! metadata follows in a fixed field order, then the raw backing array.

use crate::error::{FilterError, Result};
use std::io::{Read, Write};

/// Writes a magic string followed by its terminating NUL byte.
pub(crate) fn write_magic(w: &mut impl Write, magic: &'static str) -> Result<()> {
    w.write_all(magic.as_bytes())?;
    w.write_all(&[0u8])?;
    Ok(())
}

/// Reads and verifies a NUL-terminated magic string; fails closed on mismatch.
pub(crate) fn read_magic(r: &mut impl Read, magic: &'static str) -> Result<()> {
    let mut buf = vec![0u8; magic.len() + 1];
    r.read_exact(&mut buf)?;
    if &buf[..magic.len()] != magic.as_bytes() || buf[magic.len()] != 0 {
        return Err(FilterError::BadMagic { expected: magic });
    }
    Ok(())
}

/// Total bytes a magic string occupies on disk, NUL included.
pub(crate) fn magic_len(magic: &str) -> u64 {
    magic.len() as u64 + 1
}

pub(crate) fn write_u8(w: &mut impl Write, v: u8) -> Result<()> {
    w.write_all(&[v])?;
    Ok(())
}

pub(crate) fn write_u32(w: &mut impl Write, v: u32) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

pub(crate) fn write_u64(w: &mut impl Write, v: u64) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

pub(crate) fn read_u8(r: &mut impl Read) -> Result<u8> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

pub(crate) fn read_u32(r: &mut impl Read) -> Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

pub(crate) fn read_u64(r: &mut impl Read) -> Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn magic_round_trip() {
        let mut buf = Vec::new();
        write_magic(&mut buf, "$test-1.0\n").unwrap();
        assert_eq!(buf.len(), magic_len("$test-1.0\n") as usize);
        read_magic(&mut Cursor::new(&buf), "$test-1.0\n").unwrap();
        assert!(read_magic(&mut Cursor::new(&buf), "$test-2.0\n").is_err());
    }

    #[test]
    fn scalar_fields_are_little_endian() {
        let mut buf = Vec::new();
        write_u32(&mut buf, 0x0102_0304).unwrap();
        assert_eq!(buf, [0x04, 0x03, 0x02, 0x01]);
        assert_eq!(read_u32(&mut Cursor::new(&buf)).unwrap(), 0x0102_0304);
    }
}
