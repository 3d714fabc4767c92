//! Binary reader/writer for the session format.
//!
//! Primitives:
//! - `bool`: one byte (`0`/`1`), any non-zero byte reads as `true`
//! - `i32`: four bytes, little-endian
//! - `string`: 7-bit variable-length byte count, then UTF-8 bytes
//! - `bytes`: `i32` byte count, then raw bytes

use std::io::{Read, Write};

use crate::domain::error::{PersistError, PersistResult};

/// Writer used by behaviors for their own payload section.
pub type PayloadWriter = BinaryWriter<Vec<u8>>;

/// Reader used by behaviors for their own payload section.
pub type PayloadReader<'a> = BinaryReader<&'a [u8]>;

#[derive(Debug)]
pub struct BinaryWriter<W> {
    inner: W,
}

impl<W: Write> BinaryWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    pub fn write_bool(&mut self, value: bool) -> PersistResult<()> {
        self.inner.write_all(&[u8::from(value)])?;
        Ok(())
    }

    pub fn write_i32(&mut self, value: i32) -> PersistResult<()> {
        self.inner.write_all(&value.to_le_bytes())?;
        Ok(())
    }

    /// Writes a collection length as `i32`.
    pub fn write_len(&mut self, len: usize) -> PersistResult<()> {
        let len = i32::try_from(len).map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "length exceeds i32::MAX")
        })?;
        self.write_i32(len)
    }

    pub fn write_string(&mut self, value: &str) -> PersistResult<()> {
        let mut remaining = value.len();
        loop {
            let mut byte = (remaining & 0x7f) as u8;
            remaining >>= 7;
            if remaining != 0 {
                byte |= 0x80;
            }
            self.inner.write_all(&[byte])?;
            if remaining == 0 {
                break;
            }
        }
        self.inner.write_all(value.as_bytes())?;
        Ok(())
    }

    pub fn write_bytes(&mut self, value: &[u8]) -> PersistResult<()> {
        self.write_len(value.len())?;
        self.write_raw(value)
    }

    /// Writes bytes as-is, without a length prefix.
    pub fn write_raw(&mut self, value: &[u8]) -> PersistResult<()> {
        self.inner.write_all(value)?;
        Ok(())
    }
}

impl BinaryWriter<Vec<u8>> {
    /// Writer over an empty in-memory buffer.
    pub fn buffer() -> Self {
        Self::new(Vec::new())
    }
}

#[derive(Debug)]
pub struct BinaryReader<R> {
    inner: R,
}

impl<R: Read> BinaryReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn read_bool(&mut self) -> PersistResult<bool> {
        let mut buf = [0u8; 1];
        self.inner.read_exact(&mut buf)?;
        Ok(buf[0] != 0)
    }

    pub fn read_i32(&mut self) -> PersistResult<i32> {
        let mut buf = [0u8; 4];
        self.inner.read_exact(&mut buf)?;
        Ok(i32::from_le_bytes(buf))
    }

    /// Reads an `i32` collection length, rejecting negative values.
    pub fn read_len(&mut self) -> PersistResult<usize> {
        let len = self.read_i32()?;
        usize::try_from(len).map_err(|_| PersistError::NegativeLength(len))
    }

    pub fn read_string(&mut self) -> PersistResult<String> {
        let mut len: usize = 0;
        let mut shift = 0;
        loop {
            if shift >= 35 {
                return Err(PersistError::LengthPrefixOverflow);
            }
            let mut buf = [0u8; 1];
            self.inner.read_exact(&mut buf)?;
            len |= usize::from(buf[0] & 0x7f) << shift;
            if buf[0] & 0x80 == 0 {
                break;
            }
            shift += 7;
        }
        let bytes = self.read_exact_vec(len)?;
        Ok(String::from_utf8(bytes)?)
    }

    pub fn read_bytes(&mut self) -> PersistResult<Vec<u8>> {
        let len = self.read_len()?;
        self.read_exact_vec(len)
    }

    /// Drains whatever is left in the source.
    pub fn read_to_end(&mut self) -> PersistResult<Vec<u8>> {
        let mut rest = Vec::new();
        self.inner.read_to_end(&mut rest)?;
        Ok(rest)
    }

    // Reads through `take` so a corrupt length cannot trigger a huge allocation.
    fn read_exact_vec(&mut self, len: usize) -> PersistResult<Vec<u8>> {
        let mut bytes = Vec::new();
        let read = (&mut self.inner).take(len as u64).read_to_end(&mut bytes)?;
        if read != len {
            return Err(PersistError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("expected {} bytes, got {}", len, read),
            )));
        }
        Ok(bytes)
    }
}
