// Copyright (c) 2025 Joshua Seaton
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

use std::io;

use super::{Sink, Stream};

/// Stream implementation for `std::io` readers.
///
/// Peeking is implemented by buffering (at most) one byte, so the underlying
/// reader need not be seekable.
pub struct Reader<R: io::Read> {
    inner: R,
    peeked: Option<u8>,
    offset: usize,
}

impl<R: io::Read> Reader<R> {
    /// Wraps the given reader, treating its current position as offset zero.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            peeked: None,
            offset: 0,
        }
    }

    /// Unwraps the underlying reader. A byte buffered by a previous peek is
    /// lost.
    pub fn into_inner(self) -> R {
        self.inner
    }

    // Pulls a fresh byte from the underlying reader, or None on EOF.
    fn fill(&mut self) -> io::Result<Option<u8>> {
        let mut buf = [0u8; 1];
        loop {
            match self.inner.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(buf[0])),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(err),
            }
        }
    }
}

impl<R: io::Read> Stream for Reader<R> {
    type Error = io::Error;

    fn is_eof(err: &Self::Error) -> bool {
        err.kind() == io::ErrorKind::UnexpectedEof
    }

    fn offset(&mut self) -> usize {
        self.offset
    }

    fn peek_byte(&mut self) -> Result<Option<u8>, Self::Error> {
        if self.peeked.is_none() {
            self.peeked = self.fill()?;
        }
        Ok(self.peeked)
    }

    fn read_byte(&mut self) -> Result<u8, Self::Error> {
        let byte = match self.peeked.take() {
            Some(byte) => byte,
            None => self
                .fill()?
                .ok_or_else(|| io::Error::from(io::ErrorKind::UnexpectedEof))?,
        };
        self.offset += 1;
        Ok(byte)
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), Self::Error> {
        let rest = if let (false, Some(byte)) = (buf.is_empty(), self.peeked) {
            self.peeked = None;
            buf[0] = byte;
            self.offset += 1;
            &mut buf[1..]
        } else {
            buf
        };
        io::Read::read_exact(&mut self.inner, rest)?;
        self.offset += rest.len();
        Ok(())
    }
}

/// Sink implementation for `std::io` writers.
pub struct Writer<W: io::Write> {
    inner: W,
}

impl<W: io::Write> Writer<W> {
    /// Wraps the given writer.
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Unwraps the underlying writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: io::Write> Sink for Writer<W> {
    type Error = io::Error;

    fn write_byte(&mut self, byte: u8) -> Result<(), Self::Error> {
        self.inner.write_all(&[byte])
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        self.inner.write_all(bytes)
    }
}
