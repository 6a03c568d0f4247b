//! Bounded little-endian cursor over an immutable byte buffer.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Error, Result};

/// A cursor over a borrowed byte buffer.
///
/// The position always stays within `[0, len]`; any operation that would
/// advance past the end fails with `BadFileFormat` and leaves the cursor
/// untouched.
#[derive(Debug)]
pub struct BufferReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BufferReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        BufferReader { data, pos: 0 }
    }

    /// The current position of the cursor.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Read a 32-bit unsigned integer, consuming four bytes little-endian.
    pub fn read_u32(&mut self) -> Result<u32> {
        if self.pos + 4 <= self.data.len() {
            let value = LittleEndian::read_u32(&self.data[self.pos..]);
            self.pos += 4;
            Ok(value)
        } else {
            Err(overrun())
        }
    }

    /// Read a fixed-length block of bytes.
    pub fn read_block(&mut self, size: usize) -> Result<&'a [u8]> {
        if self.pos + size <= self.data.len() {
            let block = &self.data[self.pos..self.pos + size];
            self.pos += size;
            Ok(block)
        } else {
            Err(overrun())
        }
    }

    /// Read up to the first zero byte, returning the enclosed bytes and
    /// advancing past the terminator. A missing terminator is an error.
    pub fn read_null_terminated(&mut self) -> Result<&'a [u8]> {
        for i in self.pos..self.data.len() {
            if self.data[i] == 0 {
                let s = &self.data[self.pos..i];
                self.pos = i + 1;
                return Ok(s);
            }
        }
        Err(Error::BadFileFormat(
            "unterminated string in buffer".to_owned(),
        ))
    }

    /// Advance the cursor by the given number of bytes.
    pub fn skip(&mut self, bytes: usize) -> Result<()> {
        if self.pos + bytes <= self.data.len() {
            self.pos += bytes;
            Ok(())
        } else {
            Err(overrun())
        }
    }
}

fn overrun() -> Error {
    Error::BadFileFormat("premature end of buffer".to_owned())
}

#[cfg(test)]
mod tests {
    use super::BufferReader;

    #[test]
    fn read_u32_little_endian() {
        let mut reader = BufferReader::new(&[0x53, 0x56, 0x31, 0x30, 0xff]);
        assert_eq!(reader.read_u32().unwrap(), 0x3031_5653);
        assert_eq!(reader.position(), 4);
        assert!(reader.read_u32().is_err());
        assert_eq!(reader.position(), 4);
    }

    #[test]
    fn read_blocks_and_skip() {
        let mut reader = BufferReader::new(b"abcdef");
        assert_eq!(reader.read_block(3).unwrap(), b"abc");
        reader.skip(2).unwrap();
        assert_eq!(reader.read_block(1).unwrap(), b"f");
        assert!(reader.skip(1).is_err());
        assert_eq!(reader.read_block(0).unwrap(), b"");
    }

    #[test]
    fn null_terminated_strings() {
        let mut reader = BufferReader::new(b"name\0rest");
        assert_eq!(reader.read_null_terminated().unwrap(), b"name");
        assert_eq!(reader.position(), 5);
        assert!(reader.read_null_terminated().is_err());
    }

    #[test]
    fn empty_terminated_string() {
        let mut reader = BufferReader::new(b"\0x");
        assert_eq!(reader.read_null_terminated().unwrap(), b"");
        assert_eq!(reader.position(), 1);
    }
}
