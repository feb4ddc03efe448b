//! Sequential big-endian reading of class file data.
//! Every multi-byte value in a class file goes through here, so byte order is handled exactly
//! once, immediately after the bytes are read.
use std::io::{ErrorKind, Read};

use crate::{constant_pool::ConstantPoolIndexRaw, ClassFileParseError};

#[derive(Debug)]
pub struct ClassReader<R> {
    inner: R,
    /// Number of bytes consumed so far, used for error reporting
    position: usize,
}
impl<R: Read> ClassReader<R> {
    pub fn new(inner: R) -> ClassReader<R> {
        ClassReader { inner, position: 0 }
    }

    /// Create a reader whose reported positions start at `position`.
    /// Used for reading nested structures out of an already-read payload.
    pub fn with_position(inner: R, position: usize) -> ClassReader<R> {
        ClassReader { inner, position }
    }

    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Fill the entirety of `buf`, or fail with [`ClassFileParseError::Truncated`]
    fn fill(&mut self, buf: &mut [u8]) -> Result<(), ClassFileParseError> {
        let mut had = 0;
        while had < buf.len() {
            match self.inner.read(&mut buf[had..]) {
                Ok(0) => {
                    return Err(ClassFileParseError::Truncated {
                        position: self.position,
                        needed: buf.len(),
                        had,
                    })
                }
                Ok(amount) => had += amount,
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => return Err(ClassFileParseError::Io(err)),
            }
        }

        self.position += buf.len();
        Ok(())
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], ClassFileParseError> {
        let mut buf = [0; N];
        self.fill(&mut buf)?;
        Ok(buf)
    }

    pub fn read_u1(&mut self) -> Result<u8, ClassFileParseError> {
        self.array::<1>().map(|[v]| v)
    }

    pub fn read_u2(&mut self) -> Result<u16, ClassFileParseError> {
        self.array().map(u16::from_be_bytes)
    }

    pub fn read_u4(&mut self) -> Result<u32, ClassFileParseError> {
        self.array().map(u32::from_be_bytes)
    }

    pub fn read_u8(&mut self) -> Result<u64, ClassFileParseError> {
        self.array().map(u64::from_be_bytes)
    }

    pub fn read_index<T>(&mut self) -> Result<ConstantPoolIndexRaw<T>, ClassFileParseError> {
        self.read_u2().map(ConstantPoolIndexRaw::new)
    }

    /// Read exactly `length` bytes.
    pub fn read_bytes(&mut self, length: usize) -> Result<Vec<u8>, ClassFileParseError> {
        // The length comes from the file, so we don't trust it for the initial allocation
        let mut data = Vec::with_capacity(length.min(4096));
        let had = (&mut self.inner)
            .take(length as u64)
            .read_to_end(&mut data)
            .map_err(ClassFileParseError::Io)?;
        if had < length {
            return Err(ClassFileParseError::Truncated {
                position: self.position,
                needed: length,
                had,
            });
        }

        self.position += length;
        Ok(data)
    }
}
impl<'a> ClassReader<&'a [u8]> {
    /// The number of bytes left in the slice
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.inner.len()
    }
}
