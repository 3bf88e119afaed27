// Copyright (c) 2025 Joshua Seaton
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! A WebAssembly module container codec.
//!
//! A binary module is an 8-byte header followed by up to eleven standard
//! sections, in strictly increasing ID order, with any number of custom
//! sections interleaved anywhere around them. [`Module`] captures all of that,
//! including exactly where each custom section sat relative to the standard
//! ones, so that decoding and then re-encoding a module is faithful.
//!
//! The crate is `no_std` and allocator-generic: every decoded collection is
//! allocated with a caller-provided [`Allocator`], and all allocation is
//! fallible.

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![cfg_attr(nightly, feature(allocator_api))]

#[cfg(nightly)]
extern crate alloc;

pub mod core_compat;
pub mod decode;
pub mod encode;
pub mod storage;
pub mod types;

mod leb128;
mod token;

use core::fmt;

use core_compat::vec::Vec;
use decode::{ContextStack, decode_module};
use encode::encode_module;
use storage::{Buffer, Sink, Stream};
use types::{
    CodeSection, CustomSlots, DataSection, ElementSection, ExportSection, FunctionSection,
    GlobalSection, Header, ImportSection, MemorySection, Section, SectionId, StartSection,
    TableSection, TypeSection,
};

/// A convenience trait that captures the required allocation-related trait
/// bounds.
pub trait Allocator: core_compat::alloc::Allocator + fmt::Debug + Clone {}

impl<A> Allocator for A where A: core_compat::alloc::Allocator + fmt::Debug + Clone {}

/// A WebAssembly module: a header, the standard sections present, and the
/// custom sections at each of their twelve possible positions.
#[derive(Debug)]
pub struct Module<A: Allocator> {
    header: Header,
    // Indexed by `SectionId::slot()`.
    sections: [Option<Section<A>>; SectionId::STANDARD.len()],
    custom: CustomSlots<A>,
}

macro_rules! section_accessor {
    ($(#[$meta:meta])* $name:ident, $variant:ident, $type:ty) => {
        $(#[$meta])*
        pub fn $name(&self) -> Option<&$type> {
            match self.section(SectionId::$variant) {
                Some(Section::$variant(section)) => Some(section),
                _ => None,
            }
        }
    };
}

impl<A: Allocator> Module<A> {
    /// Decodes a module from streaming storage, with a given allocator.
    ///
    /// Every custom section is retained, positioned relative to the standard
    /// sections around it.
    pub fn decode<Storage: Stream>(
        storage: Storage,
        alloc: A,
    ) -> Result<Self, decode::ErrorWithContext<Storage>> {
        let mut context = ContextStack::default();
        decode_module(storage, &mut context, alloc)
            .map_err(|error| decode::ErrorWithContext { error, context })
    }

    /// Decodes a module from an in-memory byte slice.
    pub fn decode_bytes(
        bytes: &[u8],
        alloc: A,
    ) -> Result<Self, decode::ErrorWithContext<Buffer<&[u8]>>> {
        Self::decode(Buffer::new(bytes), alloc)
    }

    /// Assembles a module with the canonical header and no custom sections.
    ///
    /// Sections may be given in any order. If more than one section of the
    /// same kind is given, the last one wins.
    pub fn from_sections(sections: impl IntoIterator<Item = Section<A>>, alloc: A) -> Self {
        let mut slots = [const { None }; SectionId::STANDARD.len()];
        for section in sections {
            if let Some(slot) = section.id().slot() {
                slots[slot] = Some(section);
            }
        }
        Self {
            header: Header::default(),
            sections: slots,
            custom: CustomSlots::new(&alloc),
        }
    }

    /// Assembles a module from its constituent parts.
    ///
    /// Position `k` of `sections` should hold the section whose ID is
    /// `SectionId::STANDARD[k]`; a section found at another position is moved
    /// to its own, replacing whatever was there.
    pub fn from_parts(
        header: Header,
        sections: [Option<Section<A>>; SectionId::STANDARD.len()],
        custom: CustomSlots<A>,
    ) -> Self {
        let mut slots = [const { None }; SectionId::STANDARD.len()];
        for section in sections.into_iter().flatten() {
            if let Some(slot) = section.id().slot() {
                slots[slot] = Some(section);
            }
        }
        Self {
            header,
            sections: slots,
            custom,
        }
    }

    /// Decomposes the module into its constituent parts.
    pub fn into_parts(
        self,
    ) -> (
        Header,
        [Option<Section<A>>; SectionId::STANDARD.len()],
        CustomSlots<A>,
    ) {
        (self.header, self.sections, self.custom)
    }

    /// Encodes the module to the given sink, returning the sink once
    /// complete.
    pub fn encode<S: Sink>(&self, sink: S) -> Result<S, encode::ErrorWithContext<S>> {
        encode_module(self, sink)
    }

    /// Encodes the module into a newly allocated byte vector.
    pub fn encode_to_vec<B: Allocator>(
        &self,
        alloc: B,
    ) -> Result<Vec<u8, B>, encode::ErrorWithContext<Vec<u8, B>>> {
        self.encode(Vec::new_in(alloc))
    }

    /// The module header.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// The section with the given ID, if present. Always `None` for
    /// [`SectionId::Custom`]; see [`Module::custom_sections`].
    pub fn section(&self, id: SectionId) -> Option<&Section<A>> {
        self.sections[id.slot()?].as_ref()
    }

    /// Iterates over the standard sections present, in ID order.
    pub fn sections(&self) -> impl Iterator<Item = &Section<A>> {
        self.sections.iter().flatten()
    }

    /// The custom sections, by position.
    pub fn custom_sections(&self) -> &CustomSlots<A> {
        &self.custom
    }

    section_accessor!(
        /// The type section, if present.
        typesec, Type, TypeSection<A>
    );
    section_accessor!(
        /// The import section, if present.
        importsec, Import, ImportSection<A>
    );
    section_accessor!(
        /// The function section, if present.
        funcsec, Function, FunctionSection<A>
    );
    section_accessor!(
        /// The table section, if present.
        tablesec, Table, TableSection<A>
    );
    section_accessor!(
        /// The memory section, if present.
        memsec, Memory, MemorySection<A>
    );
    section_accessor!(
        /// The global section, if present.
        globalsec, Global, GlobalSection<A>
    );
    section_accessor!(
        /// The export section, if present.
        exportsec, Export, ExportSection<A>
    );
    section_accessor!(
        /// The start section, if present.
        startsec, Start, StartSection
    );
    section_accessor!(
        /// The element section, if present.
        elemsec, Element, ElementSection<A>
    );
    section_accessor!(
        /// The code section, if present.
        codesec, Code, CodeSection<A>
    );
    section_accessor!(
        /// The data section, if present.
        datasec, Data, DataSection<A>
    );
}
