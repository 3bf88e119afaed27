// Copyright (c) 2025 Joshua Seaton
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! WebAssembly type definitions.
//!
//! This module contains the in-memory representation of a module container:
//! its header, the section identity mapping, the payloads of the eleven
//! standard sections, custom sections, and the fixed set of positions at which
//! custom sections are interleaved.

mod const_expr;
mod custom;

pub use const_expr::*;
pub use custom::*;

use num_enum::TryFromPrimitive;

use crate::Allocator;
use crate::core_compat::alloc::collections::TryReserveError;
use crate::core_compat::boxed::Box;
use crate::core_compat::vec::Vec;

// Defines a public newtype without public mutable access to the underlying
// type, along with some convenience trait implementations like Deref and AsRef.
macro_rules! newtype {
    (
        $(#[$meta:meta])*
        pub struct $type:ident<A: Allocator>($underlying:ty);
    ) => {
        $(#[$meta])*
        pub struct $type<A: Allocator>($underlying);

        newtype!(@impl [A: Allocator], $type<A>, $underlying);
    };
    (
        $(#[$meta:meta])*
        pub struct $type:ident($underlying:ty);
    ) => {
        $(#[$meta])*
        pub struct $type($underlying);

        newtype!(@impl [], $type, $underlying);
    };
    (@impl [$($generic_params:tt)*], $qualified_type:ty, $underlying:ty) => {
        impl<$($generic_params)*> $qualified_type {
            pub fn new(value: $underlying) -> Self {
                Self(value)
            }

            pub fn into_inner(self) -> $underlying {
                self.0
            }
        }

        impl<$($generic_params)*> ::core::ops::Deref for $qualified_type {
            type Target = $underlying;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl<$($generic_params)*> AsRef<$underlying> for $qualified_type {
            fn as_ref(&self) -> &$underlying {
                &self.0
            }
        }
    };
}
pub(crate) use newtype;

/// The module magic number, `\0asm` read as a little-endian u32.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, TryFromPrimitive)]
#[repr(u32)]
pub enum Magic {
    #[default]
    Wasm = 0x6d_73_61_00,
}

/// WebAssembly module version.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, TryFromPrimitive)]
#[repr(u32)]
pub enum Version {
    #[default]
    V1 = 1,
}

/// The fixed preamble of a module container.
///
/// Both fields can only hold the values the format permits, so a `Header` is
/// well-formed by construction; the default is the canonical header.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Header {
    pub magic: Magic,
    pub version: Version,
}

impl Header {
    /// The size in bytes of an encoded header.
    pub const SIZE: usize = 8;
}

/// Section identifier within a module.
///
/// This is the single source of truth for section ordering: standard
/// sections must appear in increasing ID order, while custom sections may
/// appear anywhere around them.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, TryFromPrimitive)]
#[repr(u8)]
pub enum SectionId {
    /// Custom section with arbitrary data.
    Custom = 0,
    /// Function type declarations.
    Type = 1,
    /// Import declarations.
    Import = 2,
    /// Function type indices for module functions.
    Function = 3,
    /// Table declarations.
    Table = 4,
    /// Memory declarations.
    Memory = 5,
    /// Global declarations.
    Global = 6,
    /// Export declarations.
    Export = 7,
    /// Start function index.
    Start = 8,
    /// Element segments for table initialization.
    Element = 9,
    /// Function bodies.
    Code = 10,
    /// Data segments for memory initialization.
    Data = 11,
}

impl SectionId {
    /// The standard (i.e., non-custom) section IDs, in the order in which
    /// they must appear.
    pub const STANDARD: [SectionId; 11] = [
        SectionId::Type,
        SectionId::Import,
        SectionId::Function,
        SectionId::Table,
        SectionId::Memory,
        SectionId::Global,
        SectionId::Export,
        SectionId::Start,
        SectionId::Element,
        SectionId::Code,
        SectionId::Data,
    ];

    /// The zero-based position of a standard section among
    /// [`SectionId::STANDARD`], or `None` for [`SectionId::Custom`].
    pub const fn slot(self) -> Option<usize> {
        match self {
            SectionId::Custom => None,
            id => Some(id as usize - 1),
        }
    }
}

newtype!(
    /// A name (of a module, section, or field).
    #[derive(Debug, Eq, PartialEq)]
    pub struct Name<A: Allocator>(Box<str, A>);
);

impl<A: Allocator> Name<A> {
    /// Copies a string into a new name.
    pub fn from_str_in(s: &str, alloc: A) -> Result<Self, TryReserveError> {
        let mut bytes = Vec::new_in(alloc);
        bytes.try_reserve_exact(s.len())?;
        bytes.extend_from_slice(s.as_bytes());
        // Safety: The bytes are a copy of a str.
        Ok(unsafe { Self::from_utf8_unchecked(bytes) })
    }

    // Safety: `bytes` must be valid UTF-8.
    pub(crate) unsafe fn from_utf8_unchecked(bytes: Vec<u8, A>) -> Self {
        let (ptr, alloc) = Box::into_raw_with_allocator(bytes.into_boxed_slice());
        // Safety: The ABIs of [u8] and str are identical, and the caller
        // guarantees that the contents are valid UTF-8.
        Self::new(unsafe { Box::from_raw_in(ptr as *mut str, alloc) })
    }

    /// The name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The type of a reference to an object in the runtime store.
#[derive(Clone, Copy, Debug, Eq, PartialEq, TryFromPrimitive)]
#[repr(u8)]
pub enum RefType {
    /// Function reference type.
    Func = 0x70,
    /// External reference type.
    Extern = 0x6f,
}

/// Value types classify the individual values that WebAssembly code can compute
/// with and the values that a variable accepts.
#[derive(Clone, Copy, Debug, Eq, PartialEq, TryFromPrimitive)]
#[repr(u8)]
pub enum ValType {
    /// 32-bit signed integer.
    I32 = 0x7f,
    /// 64-bit signed integer.
    I64 = 0x7e,
    /// 32-bit floating point number.
    F32 = 0x7d,
    /// 64-bit floating point number.
    F64 = 0x7c,
    /// 128-bit SIMD vector.
    Vec = 0x7b,
    /// Function reference.
    FuncRef = RefType::Func as u8,
    /// External reference.
    ExternRef = RefType::Extern as u8,
}

newtype!(
    /// The sequence of types representing the parameters or results of a
    /// function.
    #[derive(Clone, Debug)]
    pub struct ResultType<A: Allocator>(Vec<ValType, A>);
);

/// The signature of a function, mapping parameters to results.
#[derive(Clone, Debug)]
pub struct FunctionType<A: Allocator> {
    pub parameters: ResultType<A>,
    pub results: ResultType<A>,
}

/// The size range of the resizeable storage associated with memory (# of pages)
/// and table types (# of elements).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Limits {
    /// Minimum size.
    pub min: u32,
    /// Maximum size, with None indicating that there is no upper limit.
    pub max: Option<u32>,
}

newtype!(
    /// A linear memory type with its size limits.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct MemType(Limits);
);

/// WebAssembly table type.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TableType {
    /// Type of references stored in table.
    pub reftype: RefType,
    /// Table size limits.
    pub limits: Limits,
}

/// The mutability of a global variable.
#[derive(Clone, Copy, Debug, Eq, PartialEq, TryFromPrimitive)]
#[repr(u8)]
pub enum GlobalTypeMutability {
    /// Immutable.
    Const = 0x00,
    /// Mutable.
    Var = 0x01,
}

/// Represents a global variable.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct GlobalType {
    /// The type of the global.
    pub value: ValType,

    /// The mutability of the global.
    pub mutability: GlobalTypeMutability,
}

newtype!(
    /// An index into the type section.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct TypeIdx(u32);
);

newtype!(
    /// An index into the function index space.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct FuncIdx(u32);
);

newtype!(
    /// An index into the table index space.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct TableIdx(u32);
);

newtype!(
    /// An index into the memory index space.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct MemIdx(u32);
);

newtype!(
    /// An index into the global index space.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct GlobalIdx(u32);
);

newtype!(
    /// Section containing function type declarations.
    #[derive(Clone, Debug)]
    pub struct TypeSection<A: Allocator>(Vec<FunctionType<A>, A>);
);

/// Import descriptor types.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ImportDescriptor {
    /// Import a function with the given type index.
    Function(TypeIdx),
    /// Import a table with the given type.
    Table(TableType),
    /// Import a memory with the given type.
    Memory(MemType),
    /// Import a global with the given type.
    Global(GlobalType),
}

/// An import declaration.
#[derive(Debug)]
pub struct Import<A: Allocator> {
    /// Name of the module to import from.
    pub module: Name<A>,
    /// Name of the imported entity.
    pub field: Name<A>,
    /// Type of the imported entity.
    pub descriptor: ImportDescriptor,
}

newtype!(
    /// Section containing import declarations.
    #[derive(Debug)]
    pub struct ImportSection<A: Allocator>(Vec<Import<A>, A>);
);

newtype!(
    /// Section containing type indices for module-defined functions.
    #[derive(Clone, Debug)]
    pub struct FunctionSection<A: Allocator>(Vec<TypeIdx, A>);
);

newtype!(
    /// Section containing table type declarations.
    #[derive(Clone, Debug)]
    pub struct TableSection<A: Allocator>(Vec<TableType, A>);
);

newtype!(
    /// Section containing linear memory type declarations.
    #[derive(Clone, Debug)]
    pub struct MemorySection<A: Allocator>(Vec<MemType, A>);
);

/// A global declaration.
#[derive(Clone, Debug)]
pub struct Global<A: Allocator> {
    /// Global type and mutability.
    pub ty: GlobalType,
    /// Initialization expression.
    pub init: ConstExpr<A>,
}

newtype!(
    /// Section containing global variable declarations.
    #[derive(Clone, Debug)]
    pub struct GlobalSection<A: Allocator>(Vec<Global<A>, A>);
);

/// Describes what kind of entity is being exported.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExportDescriptor {
    /// Export a function with the given index.
    Function(FuncIdx),
    /// Export a table with the given index.
    Table(TableIdx),
    /// Export a memory with the given index.
    Memory(MemIdx),
    /// Export a global with the given index.
    Global(GlobalIdx),
}

/// An export declaration.
#[derive(Debug)]
pub struct Export<A: Allocator> {
    /// Name of the exported entity.
    pub field: Name<A>,
    /// Type and index of the exported entity.
    pub descriptor: ExportDescriptor,
}

newtype!(
    /// Section containing export declarations.
    #[derive(Debug)]
    pub struct ExportSection<A: Allocator>(Vec<Export<A>, A>);
);

newtype!(
    /// Holds the index of the start function.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct StartSection(FuncIdx);
);

newtype!(
    /// Section containing element segments for table initialization.
    #[derive(Clone, Debug)]
    pub struct ElementSection<A: Allocator>(Vec<ElementSegment<A>, A>);
);

/// WebAssembly element segment.
#[derive(Clone, Debug)]
pub struct ElementSegment<A: Allocator> {
    /// The type of references this element segment contains.
    pub ty: RefType,
    /// The initial values for the element segment.
    pub init: ElementInit<A>,
    /// How this element segment should be placed (active, passive, or
    /// declarative).
    pub mode: ElementMode<A>,
}

/// The initialization data for an element segment.
#[derive(Clone, Debug)]
pub enum ElementInit<A: Allocator> {
    /// Element segment contains function indices.
    FunctionIndices(Vec<FuncIdx, A>),
    /// Element segment contains initialization expressions.
    Expressions(Vec<ConstExpr<A>, A>),
}

/// Active element mode with table and offset.
#[derive(Clone, Debug)]
pub struct ElementModeActive<A: Allocator> {
    /// Index of the table to initialize.
    pub table: TableIdx,
    /// Expression computing the offset within the table.
    pub offset: ConstExpr<A>,
}

/// Element segment mode.
#[derive(Clone, Debug)]
pub enum ElementMode<A: Allocator> {
    Passive,
    Active(ElementModeActive<A>),
    Declarative,
}

/// A run of identically-typed local variables, as declared in a function
/// body.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LocalGroup {
    /// The number of locals in the run.
    pub count: u32,
    /// Their type.
    pub ty: ValType,
}

newtype!(
    /// The local variable declarations of a function body.
    #[derive(Clone, Debug)]
    pub struct Locals<A: Allocator>(Vec<LocalGroup, A>);
);

impl<A: Allocator> Locals<A> {
    /// The total number of locals declared.
    pub fn total(&self) -> u64 {
        self.iter().map(|group| u64::from(group.count)).sum()
    }
}

/// A function body: its local declarations followed by its instructions.
#[derive(Clone, Debug)]
pub struct Function<A: Allocator> {
    /// Local variable declarations for this function.
    pub locals: Locals<A>,
    /// The function's instruction sequence, kept in its original encoding
    /// (including the terminating `end`).
    pub body: Box<[u8], A>,
}

newtype!(
    /// Section containing function bodies.
    #[derive(Clone, Debug)]
    pub struct CodeSection<A: Allocator>(Vec<Function<A>, A>);
);

/// A data segment for initializing linear memory.
#[derive(Clone, Debug)]
pub struct DataSegment<A: Allocator> {
    /// The initial data bytes for this segment.
    pub init: Vec<u8, A>,
    /// How this data segment should be placed (active or passive).
    pub mode: DataMode<A>,
}

/// The placement mode for a data segment.
#[derive(Clone, Debug)]
pub enum DataMode<A: Allocator> {
    /// Passive data segment (must be explicitly copied via memory.init).
    Passive,
    /// Active data segment (automatically copied to memory during instantiation).
    Active(DataModeActive<A>),
}

/// Active placement information for a data segment.
#[derive(Clone, Debug)]
pub struct DataModeActive<A: Allocator> {
    /// Index of the memory to initialize.
    pub memory: MemIdx,
    /// Expression computing the offset within the memory.
    pub offset: ConstExpr<A>,
}

newtype!(
    /// Section containing data segments for memory initialization.
    #[derive(Clone, Debug)]
    pub struct DataSection<A: Allocator>(Vec<DataSegment<A>, A>);
);

/// A standard section, tagged by kind.
///
/// Each variant corresponds to exactly one non-custom [`SectionId`]; see
/// [`Section::id`].
#[derive(Debug)]
pub enum Section<A: Allocator> {
    Type(TypeSection<A>),
    Import(ImportSection<A>),
    Function(FunctionSection<A>),
    Table(TableSection<A>),
    Memory(MemorySection<A>),
    Global(GlobalSection<A>),
    Export(ExportSection<A>),
    Start(StartSection),
    Element(ElementSection<A>),
    Code(CodeSection<A>),
    Data(DataSection<A>),
}

impl<A: Allocator> Section<A> {
    /// The ID of this section.
    pub const fn id(&self) -> SectionId {
        match self {
            Section::Type(_) => SectionId::Type,
            Section::Import(_) => SectionId::Import,
            Section::Function(_) => SectionId::Function,
            Section::Table(_) => SectionId::Table,
            Section::Memory(_) => SectionId::Memory,
            Section::Global(_) => SectionId::Global,
            Section::Export(_) => SectionId::Export,
            Section::Start(_) => SectionId::Start,
            Section::Element(_) => SectionId::Element,
            Section::Code(_) => SectionId::Code,
            Section::Data(_) => SectionId::Data,
        }
    }
}

macro_rules! impl_from_for_section {
    ($variant:ident($type:ident<A>)) => {
        impl<A: Allocator> From<$type<A>> for Section<A> {
            fn from(section: $type<A>) -> Self {
                Section::$variant(section)
            }
        }
    };
    ($variant:ident($type:ident)) => {
        impl<A: Allocator> From<$type> for Section<A> {
            fn from(section: $type) -> Self {
                Section::$variant(section)
            }
        }
    };
}

impl_from_for_section!(Type(TypeSection<A>));
impl_from_for_section!(Import(ImportSection<A>));
impl_from_for_section!(Function(FunctionSection<A>));
impl_from_for_section!(Table(TableSection<A>));
impl_from_for_section!(Memory(MemorySection<A>));
impl_from_for_section!(Global(GlobalSection<A>));
impl_from_for_section!(Export(ExportSection<A>));
impl_from_for_section!(Start(StartSection));
impl_from_for_section!(Element(ElementSection<A>));
impl_from_for_section!(Code(CodeSection<A>));
impl_from_for_section!(Data(DataSection<A>));
