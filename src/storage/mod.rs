// Copyright (c) 2025 Joshua Seaton
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Storage abstractions for sequential binary reading and writing.
//!
//! [`Stream`] is the byte source a module is decoded from. Besides plain
//! sequential reads it offers a one-byte [`Stream::peek_byte`], which is all
//! the lookahead the container format needs: a section is recognized by its
//! leading ID byte, and a byte that does not match the expected section must
//! be left in place for the next one.
//!
//! [`Sink`] is the byte destination a module is encoded to.

#[cfg(feature = "std")]
mod std;

#[cfg(feature = "std")]
pub use self::std::{Reader, Writer};

use core::convert::Infallible;
use core::fmt;

use crate::Allocator;
use crate::core_compat::alloc::collections::TryReserveError;
use crate::core_compat::vec::Vec;

/// Storage abstraction for the streamed reading of a WASM module.
pub trait Stream {
    /// Error type for storage-specific failures.
    type Error: fmt::Debug;

    /// Whether the given error signifies a failure to read due to having
    /// reached the end of the stream (i.e., the "End Of the File").
    fn is_eof(err: &Self::Error) -> bool;

    /// Returns the current byte offset into the stream.
    fn offset(&mut self) -> usize;

    /// Returns the next byte without consuming it, or `None` if the stream
    /// is exhausted.
    ///
    /// Peeking repeatedly without an intervening read yields the same byte.
    fn peek_byte(&mut self) -> Result<Option<u8>, Self::Error>;

    /// Reads a single byte from the stream.
    fn read_byte(&mut self) -> Result<u8, Self::Error>;

    /// Reads exactly `buf.len()` bytes into the provided buffer.
    ///
    /// Returns an error if EOF is reached or an I/O error occurs
    /// before the buffer is completely filled.
    ///
    /// Implementors should override for better performance.
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), Self::Error> {
        for byte in buf {
            *byte = self.read_byte()?;
        }
        Ok(())
    }
}

/// Represents attempting to read past the end of a buffer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MemoryEof {}

/// In-memory buffer implementation of [`Stream`].
pub struct Buffer<Bytes: AsRef<[u8]>> {
    bytes: Bytes,
    pos: usize,
}

impl<Bytes: AsRef<[u8]>> Buffer<Bytes> {
    /// Create a new buffer stream from the given bytes.
    pub fn new(bytes: Bytes) -> Self {
        Self { bytes, pos: 0 }
    }

    /// The bytes not yet consumed.
    pub fn remaining(&self) -> &[u8] {
        &self.bytes.as_ref()[self.pos..]
    }
}

impl<Bytes: AsRef<[u8]>> Stream for Buffer<Bytes> {
    type Error = MemoryEof;

    fn is_eof(_: &Self::Error) -> bool {
        true
    }

    fn offset(&mut self) -> usize {
        self.pos
    }

    fn peek_byte(&mut self) -> Result<Option<u8>, Self::Error> {
        Ok(self.bytes.as_ref().get(self.pos).copied())
    }

    fn read_byte(&mut self) -> Result<u8, Self::Error> {
        let byte = self.peek_byte()?.ok_or(MemoryEof {})?;
        self.pos += 1;
        Ok(byte)
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), Self::Error> {
        let bytes = self.bytes.as_ref();
        debug_assert!(self.pos <= bytes.len());
        if buf.len() <= bytes.len() - self.pos {
            buf.copy_from_slice(&bytes[self.pos..(self.pos + buf.len())]);
            self.pos += buf.len();
            Ok(())
        } else {
            Err(MemoryEof {})
        }
    }
}

/// Storage abstraction for the streamed writing of a WASM module.
pub trait Sink {
    /// Error type for storage-specific failures.
    type Error: fmt::Debug;

    /// Writes a single byte.
    fn write_byte(&mut self, byte: u8) -> Result<(), Self::Error>;

    /// Writes all of the given bytes.
    ///
    /// Implementors should override for better performance.
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        for &byte in bytes {
            self.write_byte(byte)?;
        }
        Ok(())
    }
}

impl<S: Sink + ?Sized> Sink for &mut S {
    type Error = S::Error;

    fn write_byte(&mut self, byte: u8) -> Result<(), Self::Error> {
        (**self).write_byte(byte)
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        (**self).write_all(bytes)
    }
}

/// Growable in-memory implementation of [`Sink`]. Growth is fallible.
impl<A: Allocator> Sink for Vec<u8, A> {
    type Error = TryReserveError;

    fn write_byte(&mut self, byte: u8) -> Result<(), Self::Error> {
        self.try_reserve(1)?;
        self.push(byte);
        Ok(())
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        self.try_reserve(bytes.len())?;
        self.extend_from_slice(bytes);
        Ok(())
    }
}

/// A [`Sink`] that discards its input, only counting the number of bytes
/// written.
///
/// This is used to size length-prefixed payloads ahead of writing them.
#[derive(Clone, Copy, Debug, Default)]
pub struct ByteCounter {
    count: usize,
}

impl ByteCounter {
    /// The number of bytes written so far.
    pub fn count(&self) -> usize {
        self.count
    }
}

impl Sink for ByteCounter {
    type Error = Infallible;

    fn write_byte(&mut self, _: u8) -> Result<(), Self::Error> {
        self.count += 1;
        Ok(())
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        self.count += bytes.len();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_compat::alloc::Global;

    #[test]
    fn test_buffer_peek_does_not_consume() {
        let mut buffer = Buffer::new([0x01, 0x02]);
        assert_eq!(buffer.peek_byte(), Ok(Some(0x01)));
        assert_eq!(buffer.peek_byte(), Ok(Some(0x01)));
        assert_eq!(buffer.offset(), 0);

        assert_eq!(buffer.read_byte(), Ok(0x01));
        assert_eq!(buffer.peek_byte(), Ok(Some(0x02)));
        assert_eq!(buffer.offset(), 1);
    }

    #[test]
    fn test_buffer_peek_at_end() {
        let mut buffer = Buffer::new([0x2a]);
        assert_eq!(buffer.read_byte(), Ok(0x2a));
        assert_eq!(buffer.peek_byte(), Ok(None));
        assert_eq!(buffer.read_byte(), Err(MemoryEof {}));
        assert_eq!(buffer.offset(), 1);
    }

    #[test]
    fn test_buffer_read_exact() {
        let mut buffer = Buffer::new([1, 2, 3, 4]);
        let mut buf = [0u8; 3];
        assert_eq!(buffer.read_exact(&mut buf), Ok(()));
        assert_eq!(buf, [1, 2, 3]);
        assert_eq!(buffer.remaining(), &[4]);

        // A short read leaves the position untouched.
        assert_eq!(buffer.read_exact(&mut buf), Err(MemoryEof {}));
        assert_eq!(buffer.offset(), 3);
    }

    #[test]
    fn test_vec_sink() {
        let mut vec = Vec::new_in(Global);
        vec.write_byte(0xaa).unwrap();
        vec.write_all(&[0xbb, 0xcc]).unwrap();
        (&mut vec).write_byte(0xdd).unwrap();
        assert_eq!(vec.as_slice(), &[0xaa, 0xbb, 0xcc, 0xdd]);
    }

    #[test]
    fn test_byte_counter() {
        let mut counter = ByteCounter::default();
        counter.write_byte(0).unwrap();
        counter.write_all(&[0; 17]).unwrap();
        assert_eq!(counter.count(), 18);
    }
}
