// Copyright (c) 2025 Joshua Seaton
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Constant expressions.
//!
//! Global initializers and segment offsets are restricted to a small set of
//! constant instructions. Decoding them structurally (rather than scanning for
//! an `end` byte, which may well appear inside an immediate) only requires
//! knowing the immediates of that set.

use num_enum::TryFromPrimitive;

use crate::Allocator;
use crate::core_compat::vec::Vec;

use super::{FuncIdx, GlobalIdx, RefType, newtype};

/// Opcodes permitted within a constant expression.
#[derive(Clone, Copy, Debug, Eq, PartialEq, TryFromPrimitive)]
#[repr(u8)]
pub(crate) enum ConstOpcode {
    End = 0x0b,
    GlobalGet = 0x23,
    I32Const = 0x41,
    I64Const = 0x42,
    F32Const = 0x43,
    F64Const = 0x44,
    I32Add = 0x6a,
    I32Sub = 0x6b,
    I32Mul = 0x6c,
    I64Add = 0x7c,
    I64Sub = 0x7d,
    I64Mul = 0x7e,
    RefNull = 0xd0,
    RefFunc = 0xd2,
}

/// A single instruction of a constant expression, with its immediate.
///
/// Float immediates are kept bit-for-bit; compare them with `to_bits()` when
/// NaNs may be involved.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ConstInstr {
    I32Const(i32),
    I64Const(i64),
    F32Const(f32),
    F64Const(f64),
    GlobalGet(GlobalIdx),
    RefNull(RefType),
    RefFunc(FuncIdx),
    I32Add,
    I32Sub,
    I32Mul,
    I64Add,
    I64Sub,
    I64Mul,
}

impl ConstInstr {
    pub(crate) const fn opcode(&self) -> ConstOpcode {
        match self {
            ConstInstr::I32Const(_) => ConstOpcode::I32Const,
            ConstInstr::I64Const(_) => ConstOpcode::I64Const,
            ConstInstr::F32Const(_) => ConstOpcode::F32Const,
            ConstInstr::F64Const(_) => ConstOpcode::F64Const,
            ConstInstr::GlobalGet(_) => ConstOpcode::GlobalGet,
            ConstInstr::RefNull(_) => ConstOpcode::RefNull,
            ConstInstr::RefFunc(_) => ConstOpcode::RefFunc,
            ConstInstr::I32Add => ConstOpcode::I32Add,
            ConstInstr::I32Sub => ConstOpcode::I32Sub,
            ConstInstr::I32Mul => ConstOpcode::I32Mul,
            ConstInstr::I64Add => ConstOpcode::I64Add,
            ConstInstr::I64Sub => ConstOpcode::I64Sub,
            ConstInstr::I64Mul => ConstOpcode::I64Mul,
        }
    }
}

newtype!(
    /// A constant expression: a sequence of constant instructions. The
    /// terminating `end` is implicit.
    #[derive(Clone, Debug)]
    pub struct ConstExpr<A: Allocator>(Vec<ConstInstr, A>);
);
