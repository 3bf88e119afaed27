// Copyright (c) 2025 Joshua Seaton
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Single-byte and flag tokens of the binary format that have no counterpart
//! in the in-memory representation.

use num_enum::TryFromPrimitive;

use crate::types::RefType;

#[derive(Clone, Copy, Debug, TryFromPrimitive)]
#[repr(u8)]
pub(crate) enum FunctionTypeToken {
    Value = 0x60,
}

#[derive(Clone, Copy, Debug, TryFromPrimitive)]
#[repr(u8)]
pub(crate) enum LimitsToken {
    WithoutMax = 0x00,
    WithMax = 0x01,
}

#[derive(Clone, Copy, Debug, TryFromPrimitive)]
#[repr(u8)]
pub(crate) enum ImportDescriptorToken {
    Function = 0x0,
    Table = 0x1,
    Memory = 0x2,
    Global = 0x3,
}

#[derive(Clone, Copy, Debug, TryFromPrimitive)]
#[repr(u8)]
pub(crate) enum ExportDescriptorToken {
    Function = 0x0,
    Table = 0x1,
    Memory = 0x2,
    Global = 0x3,
}

// The leading flags of an element segment. Bit 0 distinguishes passive or
// declarative segments from active ones; bit 1 marks an explicit table index
// (if active) or declarative mode (if not); bit 2 marks expression-based
// initializers.
#[derive(Clone, Copy, Debug, TryFromPrimitive)]
#[repr(u32)]
pub(crate) enum ElementSegmentToken {
    ActiveElemIndices = 0,
    PassiveElemIndices = 1,
    ActiveTableIndexElemIndices = 2,
    DeclarativeElemIndices = 3,
    ActiveElemExprs = 4,
    PassiveElemExprs = 5,
    ActiveTableIndexElemExprs = 6,
    DeclarativeElemExprs = 7,
}

#[derive(Clone, Copy, Debug, TryFromPrimitive)]
#[repr(u8)]
pub(crate) enum ElementKind {
    FuncRef = 0x00,
}

impl From<ElementKind> for RefType {
    fn from(value: ElementKind) -> Self {
        match value {
            ElementKind::FuncRef => Self::Func,
        }
    }
}

#[derive(Clone, Copy, Debug, TryFromPrimitive)]
#[repr(u32)]
pub(crate) enum DataSegmentToken {
    ActiveNoMemIdx = 0,
    Passive = 1,
    ActiveWithMemIdx = 2,
}
