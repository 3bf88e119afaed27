// Copyright (c) 2025 Joshua Seaton
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Custom sections and their placement among the standard sections.

use core::ops;

use crate::Allocator;
use crate::core_compat::boxed::Box;
use crate::core_compat::vec::Vec;

use super::{Name, SectionId};

/// The number of positions at which custom sections may be interleaved: one
/// before each standard section, plus one after the last.
pub const CUSTOM_SLOT_COUNT: usize = 12;

/// Custom section with arbitrary binary data.
#[derive(Debug)]
pub struct CustomSection<A: Allocator> {
    /// Section name.
    pub name: Name<A>,
    /// Section content.
    pub bytes: Box<[u8], A>,
}

/// The custom sections of a module, grouped by where they appear relative to
/// the standard sections.
///
/// Position `k < 11` holds the custom sections found immediately before the
/// standard section with ID `k + 1` (or before where it would be, were it
/// absent); position 11 holds those after the last standard section. Within a
/// position, sections are kept in stream order.
///
/// When standard sections are absent, more than one position describes the
/// same place in the stream. Decoding always picks the earliest: a custom
/// section between the type and function sections of a module without imports
/// lands before the import section.
#[derive(Debug)]
pub struct CustomSlots<A: Allocator>([Vec<CustomSection<A>, A>; CUSTOM_SLOT_COUNT]);

impl<A: Allocator> CustomSlots<A> {
    /// Creates twelve empty positions.
    pub fn new(alloc: &A) -> Self {
        Self(core::array::from_fn(|_| Vec::new_in(alloc.clone())))
    }

    /// Wraps an explicit set of positions.
    pub fn from_array(slots: [Vec<CustomSection<A>, A>; CUSTOM_SLOT_COUNT]) -> Self {
        Self(slots)
    }

    /// The custom sections preceding the given standard section.
    ///
    /// # Panics
    ///
    /// Panics if `id` is [`SectionId::Custom`].
    pub fn before(&self, id: SectionId) -> &[CustomSection<A>] {
        let slot = id
            .slot()
            .expect("custom sections are only positioned relative to standard sections");
        &self.0[slot]
    }

    /// The custom sections following the last standard section.
    pub fn trailing(&self) -> &[CustomSection<A>] {
        &self.0[CUSTOM_SLOT_COUNT - 1]
    }

    /// The custom sections at a given position, if in range.
    pub fn get(&self, position: usize) -> Option<&[CustomSection<A>]> {
        self.0.get(position).map(Vec::as_slice)
    }

    /// Iterates over all positions in order, including empty ones.
    pub fn iter(&self) -> impl Iterator<Item = &[CustomSection<A>]> {
        self.0.iter().map(Vec::as_slice)
    }

    /// The total number of custom sections across all positions.
    pub fn total(&self) -> usize {
        self.0.iter().map(Vec::len).sum()
    }

    /// The first custom section with the given name, across all positions.
    pub fn find(&self, name: &str) -> Option<&CustomSection<A>> {
        self.0
            .iter()
            .flatten()
            .find(|section| section.name.as_str() == name)
    }
}

impl<A: Allocator> ops::Index<usize> for CustomSlots<A> {
    type Output = [CustomSection<A>];

    fn index(&self, position: usize) -> &Self::Output {
        &self.0[position]
    }
}
