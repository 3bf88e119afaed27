// Copyright (c) 2025 Joshua Seaton
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! WebAssembly module container encoding.
//!
//! Encoding is the mirror image of decoding: the header, then for each
//! standard section ID in order, the custom sections positioned before it
//! followed by the section itself (if present), and finally the trailing
//! custom sections. All integers are written in their minimal LEB128 form, so
//! a module decoded from canonically-encoded bytes re-encodes to those same
//! bytes.

mod encodable_impls;

use core::fmt;

use log::{debug, trace};

use crate::leb128::{self, Leb128};
use crate::storage::{ByteCounter, Sink};
use crate::types::{CustomSection, Header, Section, SectionId};
use crate::{Allocator, Module};

/// Represents errors that can arise during module encoding.
#[derive(Clone, Copy, Eq, PartialEq)]
pub enum Error<S: Sink> {
    /// A length-prefixed item is too large to have its length represented.
    LengthOverflow(usize),
    /// Error from the underlying storage.
    Storage(S::Error),
}

impl<S: Sink> Error<S> {
    fn in_section(self, section: Option<SectionId>) -> ErrorWithContext<S> {
        ErrorWithContext {
            error: self,
            section,
        }
    }
}

impl<S: Sink> fmt::Debug for Error<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::LengthOverflow(len) => write!(f, "length overflow ({len:#x})"),
            Error::Storage(err) => write!(f, "{err:?}"),
        }
    }
}

/// An encoding error along with the section being written at the time, if
/// any.
pub struct ErrorWithContext<S: Sink> {
    /// The underlying encoding error.
    pub error: Error<S>,
    /// The section being written, or `None` if the error occurred within the
    /// header.
    pub section: Option<SectionId>,
}

impl<S: Sink> fmt::Debug for ErrorWithContext<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.error)?;
        match self.section {
            Some(id) => write!(f, "\nwhile writing {id:?} section"),
            None => write!(f, "\nwhile writing header"),
        }
    }
}

pub(crate) struct Encoder<S: Sink> {
    sink: S,
}

impl<S: Sink> Encoder<S> {
    fn new(sink: S) -> Self {
        Self { sink }
    }

    fn into_inner(self) -> S {
        self.sink
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), Error<S>> {
        self.sink.write_byte(byte).map_err(Error::Storage)
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), Error<S>> {
        self.sink.write_all(bytes).map_err(Error::Storage)
    }

    fn write_leb128<T: Leb128>(&mut self, value: T) -> Result<(), Error<S>> {
        leb128::write(value, |byte| self.write_byte(byte))
    }

    // Writes a vector or byte length, which must fit in a u32.
    fn write_len(&mut self, len: usize) -> Result<(), Error<S>> {
        let len = u32::try_from(len).map_err(|_| Error::LengthOverflow(len))?;
        self.write_leb128(len)
    }

    fn write<T: Encodable>(&mut self, value: &T) -> Result<(), Error<S>> {
        value.encode(self)
    }

    // The number of bytes the encoding of a value occupies.
    fn measure<T: Encodable>(value: &T) -> Result<usize, Error<S>> {
        let mut counter = Encoder::new(ByteCounter::default());
        match counter.write(value) {
            Ok(()) => Ok(counter.sink.count()),
            Err(Error::LengthOverflow(len)) => Err(Error::LengthOverflow(len)),
            Err(Error::Storage(never)) => match never {},
        }
    }

    // Writes a payload preceded by its encoded length.
    fn write_framed<T: Encodable>(&mut self, payload: &T) -> Result<usize, Error<S>> {
        let len = Self::measure(payload)?;
        self.write_len(len)?;
        self.write(payload)?;
        Ok(len)
    }

    fn write_header(&mut self, header: Header) -> Result<(), Error<S>> {
        self.write_all(&(header.magic as u32).to_le_bytes())?;
        self.write_all(&(header.version as u32).to_le_bytes())
    }

    fn write_section<A: Allocator>(&mut self, section: &Section<A>) -> Result<(), Error<S>> {
        let id = section.id();
        self.write_byte(id as u8)?;
        let len = match section {
            Section::Type(typesec) => self.write_framed(typesec)?,
            Section::Import(importsec) => self.write_framed(importsec)?,
            Section::Function(funcsec) => self.write_framed(funcsec)?,
            Section::Table(tablesec) => self.write_framed(tablesec)?,
            Section::Memory(memsec) => self.write_framed(memsec)?,
            Section::Global(globalsec) => self.write_framed(globalsec)?,
            Section::Export(exportsec) => self.write_framed(exportsec)?,
            Section::Start(startsec) => self.write_framed(startsec)?,
            Section::Element(elemsec) => self.write_framed(elemsec)?,
            Section::Code(codesec) => self.write_framed(codesec)?,
            Section::Data(datasec) => self.write_framed(datasec)?,
        };
        debug!("wrote {id:?} section: {len:#x} bytes");
        Ok(())
    }

    fn write_custom_section<A: Allocator>(
        &mut self,
        custom: &CustomSection<A>,
    ) -> Result<(), Error<S>> {
        self.write_byte(SectionId::Custom as u8)?;
        self.write(custom)?;
        trace!(
            "wrote custom section \"{}\": {:#x} bytes",
            custom.name.as_str(),
            custom.bytes.len()
        );
        Ok(())
    }

    fn write_custom_sections<A: Allocator>(
        &mut self,
        customs: &[CustomSection<A>],
    ) -> Result<(), ErrorWithContext<S>> {
        for custom in customs {
            self.write_custom_section(custom)
                .map_err(|err| err.in_section(Some(SectionId::Custom)))?;
        }
        Ok(())
    }
}

// Types that can be encoded to a sink.
pub(crate) trait Encodable {
    fn encode<S: Sink>(&self, encoder: &mut Encoder<S>) -> Result<(), Error<S>>;
}

// Encode a WebAssembly module to a sink, handing the sink back on success.
pub(crate) fn encode_module<S, A>(module: &Module<A>, sink: S) -> Result<S, ErrorWithContext<S>>
where
    S: Sink,
    A: Allocator,
{
    let mut encoder = Encoder::new(sink);
    encoder
        .write_header(*module.header())
        .map_err(|err| err.in_section(None))?;

    let custom = module.custom_sections();
    for id in SectionId::STANDARD {
        encoder.write_custom_sections(custom.before(id))?;
        if let Some(section) = module.section(id) {
            encoder
                .write_section(section)
                .map_err(|err| err.in_section(Some(id)))?;
        }
    }
    encoder.write_custom_sections(custom.trailing())?;
    Ok(encoder.into_inner())
}
