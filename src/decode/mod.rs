// Copyright (c) 2025 Joshua Seaton
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! WebAssembly module container decoding.
//!
//! A module is read in a single forward pass with one byte of lookahead. For
//! each standard section ID in turn, any custom sections at the head of the
//! stream are gathered into the position preceding that ID, and then the
//! section itself is read if the next ID byte names it. Whatever is left once
//! every position has been visited (be it a duplicate, an out-of-order
//! section, or an unknown ID) is an error.

mod decodable_impls;

use core::array;
use core::fmt;

use log::{debug, trace};

use crate::core_compat::alloc::collections::TryReserveError;
use crate::core_compat::vec::Vec;
use crate::leb128::{self, Leb128};
use crate::storage::Stream;
use crate::types::{CUSTOM_SLOT_COUNT, CustomSection, CustomSlots, Header, Section, SectionId};
use crate::{Allocator, Module};

// The maximum nesting depth of decoding contexts. The deepest path through
// the format is a constant expression immediate within an element segment.
const MAX_DEPTH: usize = 6;

// The largest allocation made ahead of reading raw bytes.
const READ_CHUNK_SIZE: usize = 0x1000;

// Represents decoding context.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[repr(u8)]
enum ContextId {
    #[default]
    Invalid,
    CodeSec,
    ConstExpr,
    ConstOpcode,
    CustomSec,
    Data,
    DataSec,
    DataToken,
    Elem,
    ElemKind,
    ElemSec,
    ElemToken,
    Export,
    ExportDesc,
    ExportDescToken,
    ExportSec,
    F32,
    F64,
    Func,
    FuncIdx,
    FuncSec,
    FuncType,
    FuncTypeToken,
    Global,
    GlobalIdx,
    GlobalSec,
    GlobalType,
    I32,
    I64,
    Import,
    ImportDesc,
    ImportDescToken,
    ImportSec,
    Limits,
    LimitsMaxToken,
    Local,
    Locals,
    Magic,
    MemIdx,
    MemType,
    MemorySec,
    Mut,
    Name,
    ReadingBytes,
    RefType,
    ResultType,
    StartSec,
    TableIdx,
    TableSec,
    TableType,
    TypeIdx,
    TypeSec,
    U32,
    ValType,
    VecByte,
    Version,
}

impl From<ContextId> for &'static str {
    fn from(id: ContextId) -> Self {
        match id {
            ContextId::Invalid => unreachable!("invalid context somehow reached!?"),
            ContextId::CodeSec => "codesec",
            ContextId::ConstExpr => "constant expr",
            ContextId::ConstOpcode => "constant opcode",
            ContextId::CustomSec => "customsec",
            ContextId::Data => "data",
            ContextId::DataSec => "datasec",
            ContextId::DataToken => "data token",
            ContextId::Elem => "elem",
            ContextId::ElemKind => "elemkind",
            ContextId::ElemSec => "elemsec",
            ContextId::ElemToken => "elem token",
            ContextId::Export => "export",
            ContextId::ExportDesc => "exportdesc",
            ContextId::ExportDescToken => "exportdesc token",
            ContextId::ExportSec => "exportsec",
            ContextId::F32 => "f32",
            ContextId::F64 => "f64",
            ContextId::Func => "func",
            ContextId::FuncIdx => "funcidx",
            ContextId::FuncSec => "funcsec",
            ContextId::FuncType => "functype",
            ContextId::FuncTypeToken => "functype token",
            ContextId::Global => "global",
            ContextId::GlobalIdx => "globalidx",
            ContextId::GlobalSec => "globalsec",
            ContextId::GlobalType => "globaltype",
            ContextId::I32 => "i32",
            ContextId::I64 => "i64",
            ContextId::Import => "import",
            ContextId::ImportDesc => "importdesc",
            ContextId::ImportDescToken => "importdesc token",
            ContextId::ImportSec => "importsec",
            ContextId::Limits => "limits",
            ContextId::LimitsMaxToken => "limits max token",
            ContextId::Local => "local",
            ContextId::Locals => "locals",
            ContextId::Magic => "magic",
            ContextId::MemIdx => "memidx",
            ContextId::MemType => "memtype",
            ContextId::MemorySec => "memsec",
            ContextId::Mut => "mut",
            ContextId::Name => "name",
            ContextId::ReadingBytes => "reading bytes",
            ContextId::RefType => "reftype",
            ContextId::ResultType => "resulttype",
            ContextId::StartSec => "startsec",
            ContextId::TableIdx => "tableidx",
            ContextId::TableSec => "tablesec",
            ContextId::TableType => "tabletype",
            ContextId::TypeIdx => "typeidx",
            ContextId::TypeSec => "typesec",
            ContextId::U32 => "u32",
            ContextId::ValType => "valtype",
            ContextId::VecByte => "vec(byte)",
            ContextId::Version => "version",
        }
    }
}

impl From<SectionId> for ContextId {
    fn from(id: SectionId) -> Self {
        match id {
            SectionId::Custom => ContextId::CustomSec,
            SectionId::Type => ContextId::TypeSec,
            SectionId::Import => ContextId::ImportSec,
            SectionId::Function => ContextId::FuncSec,
            SectionId::Table => ContextId::TableSec,
            SectionId::Memory => ContextId::MemorySec,
            SectionId::Global => ContextId::GlobalSec,
            SectionId::Export => ContextId::ExportSec,
            SectionId::Start => ContextId::StartSec,
            SectionId::Element => ContextId::ElemSec,
            SectionId::Code => ContextId::CodeSec,
            SectionId::Data => ContextId::DataSec,
        }
    }
}

trait Contextual {
    const ID: ContextId;
}

// A frame of decoding context.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct ContextFrame {
    // A description of what is being decoded.
    context: &'static str,

    // Byte offset in the stream where this context was entered.
    offset: usize,
}

/// Stack for tracking decoding context during error reporting.
#[derive(Clone, Debug, Default)]
pub(crate) struct ContextStack {
    offsets: [usize; MAX_DEPTH],
    ids: [ContextId; MAX_DEPTH],
    depth: u8,
}

impl ContextStack {
    // Pushes a new context frame, returning true if successful.
    fn push(&mut self, id: ContextId, offset: usize) -> bool {
        let depth = self.depth as usize;
        if depth >= MAX_DEPTH {
            return false;
        }
        self.offsets[depth] = offset;
        self.ids[depth] = id;
        self.depth += 1;
        true
    }

    // Pop the top context frame.
    fn pop(&mut self) {
        debug_assert!(self.depth > 0, "{self:#?}");
        self.depth -= 1;
    }

    // Returns an iterator over frames in "pushed" order (outermost to
    // innermost).
    fn iter(&self) -> impl Iterator<Item = ContextFrame> + '_ {
        self.offsets
            .iter()
            .zip(&self.ids)
            .take(self.depth as usize)
            .map(|(&offset, &id)| ContextFrame {
                context: id.into(),
                offset,
            })
    }
}

/// A decoding error with additional context around what hierarchy of things
/// were being decoded at the time.
pub struct ErrorWithContext<Storage: Stream> {
    /// The underlying decoding error.
    pub error: Error<Storage>,
    pub(crate) context: ContextStack,
}

impl<Storage: Stream> ErrorWithContext<Storage> {
    /// The descriptions of what was being decoded when the error occurred,
    /// outermost first, along with the stream offsets at which each was
    /// entered.
    pub fn frames(&self) -> impl Iterator<Item = (&'static str, usize)> + '_ {
        self.context.iter().map(|frame| (frame.context, frame.offset))
    }
}

impl<Storage: Stream> fmt::Debug for ErrorWithContext<Storage> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.error)?;
        for (i, frame) in self.context.iter().enumerate() {
            write!(f, "\n{:#x}: ", frame.offset)?;
            for _ in 0..i {
                write!(f, "  ")?;
            }
            write!(f, "{}", frame.context)?;
        }
        Ok(())
    }
}

/// Represents errors that can arise during module decoding.
#[derive(Clone, Copy, Eq, PartialEq)]
pub enum Error<Storage: Stream> {
    /// Failed memory allocation.
    AllocError,
    /// Decoder context stack exceeded maximum depth to prevent stack overflow.
    ExcessiveParsingDepth {
        context: &'static str,
        offset: usize,
    },
    /// An opcode outside of those permitted in a constant expression.
    InvalidConstOpcode(u8),
    /// Invalid data segment token encountered.
    InvalidDataToken(u32),
    /// Invalid element segment token encountered.
    InvalidElementToken(u32),
    /// Function body length doesn't match the declared length.
    InvalidFunctionLength { expected: u32, actual: u32 },
    /// Invalid LEB128 encoding encountered.
    InvalidLeb128,
    /// Invalid WebAssembly magic number.
    InvalidMagic(u32),
    /// Section length doesn't match the declared length.
    InvalidSectionLength {
        id: SectionId,
        expected: u32,
        actual: u32,
    },
    /// Invalid byte token encountered during decoding.
    InvalidToken(u8),
    /// Invalid UTF-8 encoding in a name field.
    InvalidUtf8,
    /// Error from the underlying storage.
    Storage(Storage::Error),
    /// The stream ended partway through the module.
    TruncatedInput,
    /// A section ID byte was found where no section may appear: a duplicate
    /// or out-of-order standard section, or an unknown ID.
    UnexpectedSectionId { id: u8, offset: usize },
    /// Unsupported WebAssembly version number.
    UnknownVersion(u32),
}

impl<Storage: Stream> Error<Storage> {
    fn from_storage(err: Storage::Error) -> Self {
        if Storage::is_eof(&err) {
            Error::TruncatedInput
        } else {
            Error::Storage(err)
        }
    }
}

impl<Storage: Stream> fmt::Debug for Error<Storage> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::AllocError => write!(f, "allocation failure"),
            Error::ExcessiveParsingDepth { context, offset } => {
                write!(f, "unexpected frame at {offset:#x}: {context}")
            }
            Error::InvalidConstOpcode(op) => write!(f, "invalid constant opcode ({op:#x})"),
            Error::InvalidDataToken(token) => write!(f, "invalid data token ({token:#x})"),
            Error::InvalidElementToken(token) => write!(f, "invalid element token ({token:#x})"),
            Error::InvalidFunctionLength { expected, actual } => write!(
                f,
                "invalid func length: expected {expected:#x}; got {actual:#x}"
            ),
            Error::InvalidLeb128 => write!(f, "invalid LEB128-encoding"),
            Error::InvalidMagic(magic) => write!(f, "invalid magic ({magic:#x})"),
            Error::InvalidSectionLength {
                id,
                expected,
                actual,
            } => write!(
                f,
                "invalid section length for {id:?}: expected {expected:#x}; got {actual:#x}"
            ),
            Error::InvalidToken(token) => write!(f, "invalid byte token ({token:#x})"),
            Error::InvalidUtf8 => write!(f, "invalid UTF-8"),
            Error::Storage(err) => write!(f, "{err:?}"),
            Error::TruncatedInput => write!(f, "truncated input"),
            Error::UnexpectedSectionId { id, offset } => {
                write!(f, "unexpected section ID ({id:#x}) at {offset:#x}")
            }
            Error::UnknownVersion(version) => write!(f, "unknown version ({version:#x})"),
        }
    }
}

impl<Storage: Stream> leb128::Error for Error<Storage> {
    fn invalid_leb128() -> Self {
        Error::InvalidLeb128
    }
}

impl<Storage: Stream> From<TryReserveError> for Error<Storage> {
    fn from(_: TryReserveError) -> Self {
        Error::AllocError
    }
}

pub(crate) struct Decoder<Storage: Stream> {
    stream: Storage,
}

impl<Storage: Stream> Decoder<Storage> {
    fn new(stream: Storage) -> Self {
        Self { stream }
    }

    // Pushes a context frame before a call, popping it if successful.
    fn with_context<F, R>(
        &mut self,
        context: &mut ContextStack,
        id: ContextId,
        f: F,
    ) -> Result<R, Error<Storage>>
    where
        F: FnOnce(&mut Self, &mut ContextStack) -> Result<R, Error<Storage>>,
    {
        let offset = self.stream.offset();
        if !context.push(id, offset) {
            return Err(Error::ExcessiveParsingDepth {
                context: id.into(),
                offset,
            });
        }
        let val = f(self, context)?;
        context.pop();
        Ok(val)
    }

    fn offset(&mut self) -> usize {
        self.stream.offset()
    }

    fn peek_byte_raw(&mut self) -> Result<Option<u8>, Error<Storage>> {
        self.stream.peek_byte().map_err(Error::from_storage)
    }

    fn read_byte_raw(&mut self) -> Result<u8, Error<Storage>> {
        self.stream.read_byte().map_err(Error::from_storage)
    }

    fn read_leb128_raw<T: Leb128>(&mut self) -> Result<T, Error<Storage>> {
        leb128::read(|| self.read_byte_raw())
    }

    fn read_exact_raw(&mut self, buf: &mut [u8]) -> Result<(), Error<Storage>> {
        self.stream.read_exact(buf).map_err(Error::from_storage)
    }

    fn read_bytes<A: Allocator>(
        &mut self,
        context: &mut ContextStack,
        count: usize,
        alloc: &A,
    ) -> Result<Vec<u8, A>, Error<Storage>> {
        self.with_context(context, ContextId::ReadingBytes, |decoder, _| {
            // Filled a chunk at a time, so that a corrupt length hits the end
            // of input before it can force a large allocation.
            let mut buf = Vec::new_in(alloc.clone());
            while buf.len() < count {
                let start = buf.len();
                let chunk = (count - start).min(READ_CHUNK_SIZE);
                buf.try_reserve_exact(chunk)?;
                buf.resize(start + chunk, 0); // No allocation with previous reservation.
                decoder.read_exact_raw(&mut buf[start..])?;
            }
            Ok(buf)
        })
    }

    fn read<A: Allocator, T: Decodable<A> + Contextual>(
        &mut self,
        context: &mut ContextStack,
        alloc: &A,
    ) -> Result<T, Error<Storage>> {
        self.with_context(context, T::ID, |decoder, context| {
            T::decode(decoder, context, alloc)
        })
    }

    fn read_bounded<T: BoundedDecodable + Contextual>(
        &mut self,
        context: &mut ContextStack,
    ) -> Result<T, Error<Storage>> {
        self.with_context(context, T::ID, |decoder, context| {
            T::decode(decoder, context)
        })
    }

    // Consumes the next section ID byte if it is the given one.
    fn next_section_is(&mut self, id: SectionId) -> Result<bool, Error<Storage>> {
        if self.peek_byte_raw()? == Some(id as u8) {
            self.read_byte_raw()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    // Reads the length-prefixed payload of a standard section whose ID byte
    // has already been consumed.
    fn read_section<A: Allocator>(
        &mut self,
        context: &mut ContextStack,
        id: SectionId,
        alloc: &A,
    ) -> Result<Section<A>, Error<Storage>> {
        self.with_context(context, id.into(), |decoder, context| {
            let len: u32 = decoder.read_bounded(context)?;
            let offset_start = decoder.offset();
            let section = match id {
                SectionId::Custom => unreachable!("custom sections are not standard sections"),
                SectionId::Type => Section::Type(Decodable::decode(decoder, context, alloc)?),
                SectionId::Import => Section::Import(Decodable::decode(decoder, context, alloc)?),
                SectionId::Function => {
                    Section::Function(Decodable::decode(decoder, context, alloc)?)
                }
                SectionId::Table => Section::Table(Decodable::decode(decoder, context, alloc)?),
                SectionId::Memory => Section::Memory(Decodable::decode(decoder, context, alloc)?),
                SectionId::Global => Section::Global(Decodable::decode(decoder, context, alloc)?),
                SectionId::Export => Section::Export(Decodable::decode(decoder, context, alloc)?),
                SectionId::Start => Section::Start(Decodable::decode(decoder, context, alloc)?),
                SectionId::Element => Section::Element(Decodable::decode(decoder, context, alloc)?),
                SectionId::Code => Section::Code(Decodable::decode(decoder, context, alloc)?),
                SectionId::Data => Section::Data(Decodable::decode(decoder, context, alloc)?),
            };
            let actual_len = decoder.offset() - offset_start;
            if actual_len != len as usize {
                return Err(Error::InvalidSectionLength {
                    id,
                    expected: len,
                    actual: actual_len as u32,
                });
            }
            debug!("{id:?} section at {offset_start:#x}: {len:#x} bytes");
            Ok(section)
        })
    }

    // Reads every custom section at the head of the stream into the given
    // position.
    fn read_custom_sections<A: Allocator>(
        &mut self,
        context: &mut ContextStack,
        position: &mut Vec<CustomSection<A>, A>,
        alloc: &A,
    ) -> Result<(), Error<Storage>> {
        while self.next_section_is(SectionId::Custom)? {
            let custom: CustomSection<A> = self.read(context, alloc)?;
            position.try_reserve(1)?;
            position.push(custom);
        }
        Ok(())
    }
}

// Types that can be decoded from a storage stream, possibly with allocation.
trait Decodable<A>: Sized
where
    A: Allocator,
{
    /// Decode this type from the binary stream.
    fn decode<Storage: Stream>(
        decoder: &mut Decoder<Storage>,
        context: &mut ContextStack,
        alloc: &A,
    ) -> Result<Self, Error<Storage>>;
}

// Types that can be decoded from a storage stream without allocation.
trait BoundedDecodable: Sized + Copy {
    fn decode<Storage: Stream>(
        decoder: &mut Decoder<Storage>,
        context: &mut ContextStack,
    ) -> Result<Self, Error<Storage>>;
}

impl<Bounded: BoundedDecodable, A: Allocator> Decodable<A> for Bounded {
    fn decode<Storage: Stream>(
        decoder: &mut Decoder<Storage>,
        context: &mut ContextStack,
        _: &A,
    ) -> Result<Self, Error<Storage>> {
        <Self as BoundedDecodable>::decode(decoder, context)
    }
}

// Decode a WebAssembly module from a storage stream.
pub(crate) fn decode_module<Storage, A>(
    storage: Storage,
    context: &mut ContextStack,
    alloc: A,
) -> Result<Module<A>, Error<Storage>>
where
    Storage: Stream,
    A: Allocator,
{
    let mut decoder = Decoder::new(storage);
    let header = Header {
        magic: decoder.read_bounded(context)?,
        version: decoder.read_bounded(context)?,
    };

    let mut sections: [Option<Section<A>>; SectionId::STANDARD.len()] = array::from_fn(|_| None);
    let mut custom: [Vec<CustomSection<A>, A>; CUSTOM_SLOT_COUNT] =
        array::from_fn(|_| Vec::new_in(alloc.clone()));

    for (slot, id) in SectionId::STANDARD.into_iter().enumerate() {
        decoder.read_custom_sections(context, &mut custom[slot], &alloc)?;
        if decoder.next_section_is(id)? {
            sections[slot] = Some(decoder.read_section(context, id, &alloc)?);
        }
    }
    let trailing = CUSTOM_SLOT_COUNT - 1;
    decoder.read_custom_sections(context, &mut custom[trailing], &alloc)?;

    // Every position has been visited, so anything left over cannot be
    // placed.
    let offset = decoder.offset();
    if let Some(id) = decoder.peek_byte_raw()? {
        return Err(Error::UnexpectedSectionId { id, offset });
    }

    for (position, customs) in custom.iter().enumerate() {
        if !customs.is_empty() {
            trace!("{} custom section(s) at position {position}", customs.len());
        }
    }

    Ok(Module {
        header,
        sections,
        custom: CustomSlots::from_array(custom),
    })
}
