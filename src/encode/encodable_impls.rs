// Copyright (c) 2025 Joshua Seaton
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Encodable trait implementations for WebAssembly types.

use core::ops;

use crate::Allocator;
use crate::core_compat::vec::Vec;
use crate::storage::Sink;
use crate::token::*;
use crate::types::*;

use super::{Encodable, Encoder, Error};

macro_rules! impl_encodable_for_u8_enum {
    ($type:ty) => {
        impl Encodable for $type {
            fn encode<S: Sink>(&self, encoder: &mut Encoder<S>) -> Result<(), Error<S>> {
                encoder.write_byte(*self as u8)
            }
        }
    };
}

macro_rules! impl_encodable_for_leb128 {
    ($type:ty) => {
        impl Encodable for $type {
            fn encode<S: Sink>(&self, encoder: &mut Encoder<S>) -> Result<(), Error<S>> {
                encoder.write_leb128(*self)
            }
        }
    };
}

macro_rules! impl_encodable_for_newtype {
    ($type:ident<A>) => {
        impl<A: Allocator> Encodable for $type<A> {
            fn encode<S: Sink>(&self, encoder: &mut Encoder<S>) -> Result<(), Error<S>> {
                encoder.write(<Self as ops::Deref>::deref(self))
            }
        }
    };
    ($type:ident) => {
        impl Encodable for $type {
            fn encode<S: Sink>(&self, encoder: &mut Encoder<S>) -> Result<(), Error<S>> {
                encoder.write(<Self as ops::Deref>::deref(self))
            }
        }
    };
}

impl<T: Encodable, A: Allocator> Encodable for Vec<T, A> {
    fn encode<S: Sink>(&self, encoder: &mut Encoder<S>) -> Result<(), Error<S>> {
        encoder.write_len(self.len())?;
        for item in self {
            encoder.write(item)?;
        }
        Ok(())
    }
}

impl_encodable_for_u8_enum!(GlobalTypeMutability);
impl_encodable_for_u8_enum!(RefType);
impl_encodable_for_u8_enum!(ValType);

impl_encodable_for_leb128!(u32);
impl_encodable_for_leb128!(i32);
impl_encodable_for_leb128!(i64);

impl_encodable_for_newtype!(FuncIdx);
impl_encodable_for_newtype!(GlobalIdx);
impl_encodable_for_newtype!(MemIdx);
impl_encodable_for_newtype!(MemType);
impl_encodable_for_newtype!(StartSection);
impl_encodable_for_newtype!(TableIdx);
impl_encodable_for_newtype!(TypeIdx);
impl_encodable_for_newtype!(CodeSection<A>);
impl_encodable_for_newtype!(DataSection<A>);
impl_encodable_for_newtype!(ElementSection<A>);
impl_encodable_for_newtype!(ExportSection<A>);
impl_encodable_for_newtype!(FunctionSection<A>);
impl_encodable_for_newtype!(GlobalSection<A>);
impl_encodable_for_newtype!(ImportSection<A>);
impl_encodable_for_newtype!(Locals<A>);
impl_encodable_for_newtype!(MemorySection<A>);
impl_encodable_for_newtype!(ResultType<A>);
impl_encodable_for_newtype!(TableSection<A>);
impl_encodable_for_newtype!(TypeSection<A>);

impl Encodable for f32 {
    fn encode<S: Sink>(&self, encoder: &mut Encoder<S>) -> Result<(), Error<S>> {
        encoder.write_all(&self.to_le_bytes())
    }
}

impl Encodable for f64 {
    fn encode<S: Sink>(&self, encoder: &mut Encoder<S>) -> Result<(), Error<S>> {
        encoder.write_all(&self.to_le_bytes())
    }
}

// Writes a length-prefixed vector of raw bytes.
fn write_byte_vec<S: Sink>(encoder: &mut Encoder<S>, bytes: &[u8]) -> Result<(), Error<S>> {
    encoder.write_len(bytes.len())?;
    encoder.write_all(bytes)
}

impl<A: Allocator> Encodable for Name<A> {
    fn encode<S: Sink>(&self, encoder: &mut Encoder<S>) -> Result<(), Error<S>> {
        write_byte_vec(encoder, self.as_str().as_bytes())
    }
}

impl<A: Allocator> Encodable for CustomSection<A> {
    fn encode<S: Sink>(&self, encoder: &mut Encoder<S>) -> Result<(), Error<S>> {
        let len = Encoder::<S>::measure(&self.name)? + self.bytes.len();
        encoder.write_len(len)?;
        encoder.write(&self.name)?;
        encoder.write_all(&self.bytes)
    }
}

impl<A: Allocator> Encodable for FunctionType<A> {
    fn encode<S: Sink>(&self, encoder: &mut Encoder<S>) -> Result<(), Error<S>> {
        encoder.write_byte(FunctionTypeToken::Value as u8)?;
        encoder.write(&self.parameters)?;
        encoder.write(&self.results)
    }
}

impl Encodable for Limits {
    fn encode<S: Sink>(&self, encoder: &mut Encoder<S>) -> Result<(), Error<S>> {
        match self.max {
            None => {
                encoder.write_byte(LimitsToken::WithoutMax as u8)?;
                encoder.write(&self.min)
            }
            Some(max) => {
                encoder.write_byte(LimitsToken::WithMax as u8)?;
                encoder.write(&self.min)?;
                encoder.write(&max)
            }
        }
    }
}

impl Encodable for TableType {
    fn encode<S: Sink>(&self, encoder: &mut Encoder<S>) -> Result<(), Error<S>> {
        encoder.write(&self.reftype)?;
        encoder.write(&self.limits)
    }
}

impl Encodable for GlobalType {
    fn encode<S: Sink>(&self, encoder: &mut Encoder<S>) -> Result<(), Error<S>> {
        encoder.write(&self.value)?;
        encoder.write(&self.mutability)
    }
}

impl Encodable for ConstInstr {
    fn encode<S: Sink>(&self, encoder: &mut Encoder<S>) -> Result<(), Error<S>> {
        encoder.write_byte(self.opcode() as u8)?;
        match self {
            ConstInstr::I32Const(value) => encoder.write(value),
            ConstInstr::I64Const(value) => encoder.write(value),
            ConstInstr::F32Const(value) => encoder.write(value),
            ConstInstr::F64Const(value) => encoder.write(value),
            ConstInstr::GlobalGet(global) => encoder.write(global),
            ConstInstr::RefNull(reftype) => encoder.write(reftype),
            ConstInstr::RefFunc(func) => encoder.write(func),
            ConstInstr::I32Add
            | ConstInstr::I32Sub
            | ConstInstr::I32Mul
            | ConstInstr::I64Add
            | ConstInstr::I64Sub
            | ConstInstr::I64Mul => Ok(()),
        }
    }
}

impl<A: Allocator> Encodable for ConstExpr<A> {
    fn encode<S: Sink>(&self, encoder: &mut Encoder<S>) -> Result<(), Error<S>> {
        for instr in self.iter() {
            encoder.write(instr)?;
        }
        encoder.write_byte(ConstOpcode::End as u8)
    }
}

impl Encodable for ImportDescriptor {
    fn encode<S: Sink>(&self, encoder: &mut Encoder<S>) -> Result<(), Error<S>> {
        type Token = ImportDescriptorToken;

        match self {
            ImportDescriptor::Function(ty) => {
                encoder.write_byte(Token::Function as u8)?;
                encoder.write(ty)
            }
            ImportDescriptor::Table(table) => {
                encoder.write_byte(Token::Table as u8)?;
                encoder.write(table)
            }
            ImportDescriptor::Memory(memory) => {
                encoder.write_byte(Token::Memory as u8)?;
                encoder.write(memory)
            }
            ImportDescriptor::Global(global) => {
                encoder.write_byte(Token::Global as u8)?;
                encoder.write(global)
            }
        }
    }
}

impl<A: Allocator> Encodable for Import<A> {
    fn encode<S: Sink>(&self, encoder: &mut Encoder<S>) -> Result<(), Error<S>> {
        encoder.write(&self.module)?;
        encoder.write(&self.field)?;
        encoder.write(&self.descriptor)
    }
}

impl<A: Allocator> Encodable for Global<A> {
    fn encode<S: Sink>(&self, encoder: &mut Encoder<S>) -> Result<(), Error<S>> {
        encoder.write(&self.ty)?;
        encoder.write(&self.init)
    }
}

impl Encodable for ExportDescriptor {
    fn encode<S: Sink>(&self, encoder: &mut Encoder<S>) -> Result<(), Error<S>> {
        type Token = ExportDescriptorToken;

        match self {
            ExportDescriptor::Function(func) => {
                encoder.write_byte(Token::Function as u8)?;
                encoder.write(func)
            }
            ExportDescriptor::Table(table) => {
                encoder.write_byte(Token::Table as u8)?;
                encoder.write(table)
            }
            ExportDescriptor::Memory(memory) => {
                encoder.write_byte(Token::Memory as u8)?;
                encoder.write(memory)
            }
            ExportDescriptor::Global(global) => {
                encoder.write_byte(Token::Global as u8)?;
                encoder.write(global)
            }
        }
    }
}

impl<A: Allocator> Encodable for Export<A> {
    fn encode<S: Sink>(&self, encoder: &mut Encoder<S>) -> Result<(), Error<S>> {
        encoder.write(&self.field)?;
        encoder.write(&self.descriptor)
    }
}

impl<A: Allocator> Encodable for ElementSegment<A> {
    // Segments are written in the most compact form able to express them:
    // the implicit-table flags are used for active segments of funcrefs into
    // table 0.
    fn encode<S: Sink>(&self, encoder: &mut Encoder<S>) -> Result<(), Error<S>> {
        type Token = ElementSegmentToken;

        let implicit = match &self.mode {
            ElementMode::Active(active) => *active.table == 0 && self.ty == RefType::Func,
            ElementMode::Passive | ElementMode::Declarative => false,
        };
        let token = match (&self.mode, &self.init, implicit) {
            (ElementMode::Active(_), ElementInit::FunctionIndices(_), true) => {
                Token::ActiveElemIndices
            }
            (ElementMode::Active(_), ElementInit::FunctionIndices(_), false) => {
                Token::ActiveTableIndexElemIndices
            }
            (ElementMode::Passive, ElementInit::FunctionIndices(_), _) => Token::PassiveElemIndices,
            (ElementMode::Declarative, ElementInit::FunctionIndices(_), _) => {
                Token::DeclarativeElemIndices
            }
            (ElementMode::Active(_), ElementInit::Expressions(_), true) => Token::ActiveElemExprs,
            (ElementMode::Active(_), ElementInit::Expressions(_), false) => {
                Token::ActiveTableIndexElemExprs
            }
            (ElementMode::Passive, ElementInit::Expressions(_), _) => Token::PassiveElemExprs,
            (ElementMode::Declarative, ElementInit::Expressions(_), _) => {
                Token::DeclarativeElemExprs
            }
        };
        encoder.write(&(token as u32))?;

        if let ElementMode::Active(active) = &self.mode {
            if !implicit {
                encoder.write(&active.table)?;
            }
            encoder.write(&active.offset)?;
        }

        match &self.init {
            // Function indices only ever denote funcrefs, whose element kind
            // is the sole one defined.
            ElementInit::FunctionIndices(funcs) => {
                if !implicit {
                    encoder.write_byte(ElementKind::FuncRef as u8)?;
                }
                encoder.write(funcs)
            }
            ElementInit::Expressions(exprs) => {
                if !implicit {
                    encoder.write(&self.ty)?;
                }
                encoder.write(exprs)
            }
        }
    }
}

impl Encodable for LocalGroup {
    fn encode<S: Sink>(&self, encoder: &mut Encoder<S>) -> Result<(), Error<S>> {
        encoder.write(&self.count)?;
        encoder.write(&self.ty)
    }
}

impl<A: Allocator> Encodable for Function<A> {
    fn encode<S: Sink>(&self, encoder: &mut Encoder<S>) -> Result<(), Error<S>> {
        let size = Encoder::<S>::measure(&self.locals)? + self.body.len();
        encoder.write_len(size)?;
        encoder.write(&self.locals)?;
        encoder.write_all(&self.body)
    }
}

impl<A: Allocator> Encodable for DataSegment<A> {
    fn encode<S: Sink>(&self, encoder: &mut Encoder<S>) -> Result<(), Error<S>> {
        match &self.mode {
            DataMode::Passive => encoder.write(&(DataSegmentToken::Passive as u32))?,
            DataMode::Active(active) if *active.memory == 0 => {
                encoder.write(&(DataSegmentToken::ActiveNoMemIdx as u32))?;
                encoder.write(&active.offset)?;
            }
            DataMode::Active(active) => {
                encoder.write(&(DataSegmentToken::ActiveWithMemIdx as u32))?;
                encoder.write(&active.memory)?;
                encoder.write(&active.offset)?;
            }
        }
        write_byte_vec(encoder, &self.init)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_compat::alloc::Global;
    use crate::storage::ByteCounter;

    fn encode<T: Encodable>(value: &T) -> std::vec::Vec<u8> {
        let mut encoder = Encoder::new(Vec::new_in(Global));
        encoder.write(value).unwrap();
        encoder.into_inner().as_slice().to_vec()
    }

    fn const_expr(instrs: &[ConstInstr]) -> ConstExpr<Global> {
        let mut vec = Vec::new_in(Global);
        vec.extend_from_slice(instrs);
        ConstExpr::new(vec)
    }

    fn func_indices(indices: &[u32]) -> ElementInit<Global> {
        let mut vec = Vec::new_in(Global);
        vec.extend(indices.iter().copied().map(FuncIdx::new));
        ElementInit::FunctionIndices(vec)
    }

    #[test]
    fn test_const_expr() {
        let expr = const_expr(&[
            ConstInstr::I32Const(11),
            ConstInstr::GlobalGet(GlobalIdx::new(1)),
            ConstInstr::I32Add,
        ]);
        assert_eq!(encode(&expr), [0x41, 0x0b, 0x23, 0x01, 0x6a, 0x0b]);

        let expr = const_expr(&[ConstInstr::F32Const(1.0)]);
        assert_eq!(encode(&expr), [0x43, 0x00, 0x00, 0x80, 0x3f, 0x0b]);
    }

    #[test]
    fn test_limits() {
        let limits = Limits { min: 1, max: None };
        assert_eq!(encode(&limits), [0x00, 0x01]);
        let limits = Limits {
            min: 0,
            max: Some(0x80),
        };
        assert_eq!(encode(&limits), [0x01, 0x00, 0x80, 0x01]);
    }

    #[test]
    fn test_element_segment_flags() {
        let offset = || const_expr(&[ConstInstr::I32Const(0)]);

        // Funcrefs actively placed in table 0 take the short form.
        let segment = ElementSegment {
            ty: RefType::Func,
            init: func_indices(&[5]),
            mode: ElementMode::Active(ElementModeActive {
                table: TableIdx::new(0),
                offset: offset(),
            }),
        };
        assert_eq!(encode(&segment), [0x00, 0x41, 0x00, 0x0b, 0x01, 0x05]);

        // Any other table needs the explicit form, with an element kind.
        let segment = ElementSegment {
            ty: RefType::Func,
            init: func_indices(&[5]),
            mode: ElementMode::Active(ElementModeActive {
                table: TableIdx::new(1),
                offset: offset(),
            }),
        };
        assert_eq!(
            encode(&segment),
            [0x02, 0x01, 0x41, 0x00, 0x0b, 0x00, 0x01, 0x05]
        );

        let segment = ElementSegment {
            ty: RefType::Func,
            init: func_indices(&[]),
            mode: ElementMode::Declarative,
        };
        assert_eq!(encode(&segment), [0x03, 0x00, 0x00]);

        // Active externrefs in table 0 cannot use the short form either.
        let mut exprs = Vec::new_in(Global);
        exprs.push(const_expr(&[ConstInstr::RefNull(RefType::Extern)]));
        let segment = ElementSegment {
            ty: RefType::Extern,
            init: ElementInit::Expressions(exprs),
            mode: ElementMode::Active(ElementModeActive {
                table: TableIdx::new(0),
                offset: offset(),
            }),
        };
        assert_eq!(
            encode(&segment),
            [0x06, 0x00, 0x41, 0x00, 0x0b, 0x6f, 0x01, 0xd0, 0x6f, 0x0b]
        );
    }

    #[test]
    fn test_data_segment_flags() {
        let mut init = Vec::new_in(Global);
        init.extend_from_slice(b"ab");
        let segment = DataSegment {
            init,
            mode: DataMode::Active(DataModeActive {
                memory: MemIdx::new(2),
                offset: const_expr(&[ConstInstr::I32Const(-1)]),
            }),
        };
        assert_eq!(
            encode(&segment),
            [0x02, 0x02, 0x41, 0x7f, 0x0b, 0x02, b'a', b'b']
        );
    }

    #[test]
    fn test_function_size_prefix() {
        let mut groups = Vec::new_in(Global);
        groups.push(LocalGroup {
            count: 1,
            ty: ValType::I64,
        });
        let mut body = Vec::new_in(Global);
        body.extend_from_slice(&[0x0b]);
        let function = Function {
            locals: Locals::new(groups),
            body: body.into_boxed_slice(),
        };
        // Size covers the locals vector (three bytes) and the body.
        assert_eq!(encode(&function), [0x04, 0x01, 0x01, 0x7e, 0x0b]);
    }

    #[test]
    fn test_measure_matches_encoding() {
        let name = Name::from_str_in("measured", Global).unwrap();
        let measured = Encoder::<ByteCounter>::measure(&name).unwrap();
        assert_eq!(measured, encode(&name).len());
    }
}
