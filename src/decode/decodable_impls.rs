// Copyright (c) 2025 Joshua Seaton
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Decodable trait implementations for WebAssembly types.

use core::ops;

use log::trace;

use crate::Allocator;
use crate::core_compat::vec::Vec;
use crate::storage::Stream;
use crate::token::*;
use crate::types::*;

use super::{BoundedDecodable, ContextId, ContextStack, Contextual, Decodable, Decoder, Error};

macro_rules! impl_contextual {
    ($type:ident<A: Allocator>, $id:path) => {
        impl<A: Allocator> Contextual for $type<A> {
            const ID: ContextId = $id;
        }
    };
    ($type:ty, $id:path) => {
        impl Contextual for $type {
            const ID: ContextId = $id;
        }
    };
}

macro_rules! impl_decodable_for_u8_enum {
    ($type:ty) => {
        impl_decodable_for_u8_enum!($type, Error::InvalidToken);
    };
    ($type:ty, $make_err:path) => {
        impl BoundedDecodable for $type {
            fn decode<Storage: Stream>(
                decoder: &mut Decoder<Storage>,
                _: &mut ContextStack,
            ) -> Result<Self, Error<Storage>> {
                let byte = decoder.read_byte_raw()?;
                Self::try_from(byte).map_err(|_| $make_err(byte))
            }
        }
    };
}

macro_rules! impl_decodable_for_leb128_u32_enum {
    ($type:ty, $make_err:path) => {
        impl BoundedDecodable for $type {
            fn decode<Storage: Stream>(
                decoder: &mut Decoder<Storage>,
                _: &mut ContextStack,
            ) -> Result<Self, Error<Storage>> {
                let val: u32 = decoder.read_leb128_raw()?;
                Self::try_from(val).map_err(|_| $make_err(val))
            }
        }
    };
}

macro_rules! impl_decodable_for_le_u32_enum {
    ($type:ty, $make_err:path) => {
        impl BoundedDecodable for $type {
            fn decode<Storage: Stream>(
                decoder: &mut Decoder<Storage>,
                _: &mut ContextStack,
            ) -> Result<Self, Error<Storage>> {
                let mut buf = [0u8; 4];
                decoder.read_exact_raw(&mut buf)?;
                let val = u32::from_le_bytes(buf);
                Self::try_from(val).map_err(|_| $make_err(val))
            }
        }
    };
}

macro_rules! impl_decodable_for_newtype {
    ($type:ident<A>) => {
        impl<A: Allocator> Decodable<A> for $type<A> {
            fn decode<Storage: Stream>(
                decoder: &mut Decoder<Storage>,
                context: &mut ContextStack,
                alloc: &A,
            ) -> Result<Self, Error<Storage>> {
                Ok(Self::new(<Self as ops::Deref>::Target::decode(
                    decoder, context, alloc,
                )?))
            }
        }
    };
    ($type:ident) => {
        impl BoundedDecodable for $type {
            fn decode<Storage: Stream>(
                decoder: &mut Decoder<Storage>,
                context: &mut ContextStack,
            ) -> Result<Self, Error<Storage>> {
                Ok(Self::new(
                    <<Self as ops::Deref>::Target as BoundedDecodable>::decode(decoder, context)?,
                ))
            }
        }
    };
}

impl<T, A> Decodable<A> for Vec<T, A>
where
    T: Decodable<A> + Contextual,
    A: Allocator,
{
    fn decode<Storage: Stream>(
        decoder: &mut Decoder<Storage>,
        context: &mut ContextStack,
        alloc: &A,
    ) -> Result<Self, Error<Storage>> {
        let len: u32 = decoder.read_bounded(context)?;
        let mut vec = Vec::new_in(alloc.clone());
        // The declared length is untrusted, so grow as elements actually
        // materialize rather than reserving it all upfront.
        for _ in 0..len {
            vec.try_reserve(1)?;
            vec.push(decoder.read(context, alloc)?);
        }
        Ok(vec)
    }
}

impl_contextual!(i32, ContextId::I32);
impl_contextual!(i64, ContextId::I64);
impl_contextual!(f32, ContextId::F32);
impl_contextual!(f64, ContextId::F64);
impl_contextual!(u32, ContextId::U32);
impl_contextual!(ConstExpr<A: Allocator>, ContextId::ConstExpr);
impl_contextual!(ConstOpcode, ContextId::ConstOpcode);
impl_contextual!(CustomSection<A: Allocator>, ContextId::CustomSec);
impl_contextual!(DataSegment<A: Allocator>, ContextId::Data);
impl_contextual!(DataSegmentToken, ContextId::DataToken);
impl_contextual!(ElementKind, ContextId::ElemKind);
impl_contextual!(ElementSegment<A: Allocator>, ContextId::Elem);
impl_contextual!(ElementSegmentToken, ContextId::ElemToken);
impl_contextual!(Export<A: Allocator>, ContextId::Export);
impl_contextual!(ExportDescriptor, ContextId::ExportDesc);
impl_contextual!(ExportDescriptorToken, ContextId::ExportDescToken);
impl_contextual!(FuncIdx, ContextId::FuncIdx);
impl_contextual!(Function<A: Allocator>, ContextId::Func);
impl_contextual!(FunctionType<A: Allocator>, ContextId::FuncType);
impl_contextual!(FunctionTypeToken, ContextId::FuncTypeToken);
impl_contextual!(Global<A: Allocator>, ContextId::Global);
impl_contextual!(GlobalIdx, ContextId::GlobalIdx);
impl_contextual!(GlobalType, ContextId::GlobalType);
impl_contextual!(GlobalTypeMutability, ContextId::Mut);
impl_contextual!(Import<A: Allocator>, ContextId::Import);
impl_contextual!(ImportDescriptor, ContextId::ImportDesc);
impl_contextual!(ImportDescriptorToken, ContextId::ImportDescToken);
impl_contextual!(Limits, ContextId::Limits);
impl_contextual!(LimitsToken, ContextId::LimitsMaxToken);
impl_contextual!(LocalGroup, ContextId::Local);
impl_contextual!(Locals<A: Allocator>, ContextId::Locals);
impl_contextual!(Magic, ContextId::Magic);
impl_contextual!(MemIdx, ContextId::MemIdx);
impl_contextual!(MemType, ContextId::MemType);
impl_contextual!(Name<A: Allocator>, ContextId::Name);
impl_contextual!(RefType, ContextId::RefType);
impl_contextual!(ResultType<A: Allocator>, ContextId::ResultType);
impl_contextual!(TableIdx, ContextId::TableIdx);
impl_contextual!(TableType, ContextId::TableType);
impl_contextual!(TypeIdx, ContextId::TypeIdx);
impl_contextual!(ValType, ContextId::ValType);
impl_contextual!(Version, ContextId::Version);

impl_decodable_for_u8_enum!(ConstOpcode, Error::InvalidConstOpcode);
impl_decodable_for_u8_enum!(ElementKind);
impl_decodable_for_u8_enum!(ExportDescriptorToken);
impl_decodable_for_u8_enum!(FunctionTypeToken);
impl_decodable_for_u8_enum!(GlobalTypeMutability);
impl_decodable_for_u8_enum!(ImportDescriptorToken);
impl_decodable_for_u8_enum!(LimitsToken);
impl_decodable_for_u8_enum!(RefType);
impl_decodable_for_u8_enum!(ValType);

impl_decodable_for_leb128_u32_enum!(DataSegmentToken, Error::InvalidDataToken);
impl_decodable_for_leb128_u32_enum!(ElementSegmentToken, Error::InvalidElementToken);

impl_decodable_for_le_u32_enum!(Magic, Error::InvalidMagic);
impl_decodable_for_le_u32_enum!(Version, Error::UnknownVersion);

impl_decodable_for_newtype!(FuncIdx);
impl_decodable_for_newtype!(GlobalIdx);
impl_decodable_for_newtype!(MemIdx);
impl_decodable_for_newtype!(MemType);
impl_decodable_for_newtype!(StartSection);
impl_decodable_for_newtype!(TableIdx);
impl_decodable_for_newtype!(TypeIdx);
impl_decodable_for_newtype!(CodeSection<A>);
impl_decodable_for_newtype!(DataSection<A>);
impl_decodable_for_newtype!(ElementSection<A>);
impl_decodable_for_newtype!(ExportSection<A>);
impl_decodable_for_newtype!(FunctionSection<A>);
impl_decodable_for_newtype!(GlobalSection<A>);
impl_decodable_for_newtype!(ImportSection<A>);
impl_decodable_for_newtype!(Locals<A>);
impl_decodable_for_newtype!(MemorySection<A>);
impl_decodable_for_newtype!(ResultType<A>);
impl_decodable_for_newtype!(TableSection<A>);
impl_decodable_for_newtype!(TypeSection<A>);

impl BoundedDecodable for u32 {
    fn decode<Storage: Stream>(
        decoder: &mut Decoder<Storage>,
        _: &mut ContextStack,
    ) -> Result<Self, Error<Storage>> {
        decoder.read_leb128_raw()
    }
}

impl BoundedDecodable for i32 {
    fn decode<Storage: Stream>(
        decoder: &mut Decoder<Storage>,
        _: &mut ContextStack,
    ) -> Result<Self, Error<Storage>> {
        decoder.read_leb128_raw()
    }
}

impl BoundedDecodable for i64 {
    fn decode<Storage: Stream>(
        decoder: &mut Decoder<Storage>,
        _: &mut ContextStack,
    ) -> Result<Self, Error<Storage>> {
        decoder.read_leb128_raw()
    }
}

impl BoundedDecodable for f32 {
    fn decode<Storage: Stream>(
        decoder: &mut Decoder<Storage>,
        _: &mut ContextStack,
    ) -> Result<Self, Error<Storage>> {
        let mut buf = [0u8; 4];
        decoder.read_exact_raw(&mut buf)?;
        Ok(f32::from_le_bytes(buf))
    }
}

impl BoundedDecodable for f64 {
    fn decode<Storage: Stream>(
        decoder: &mut Decoder<Storage>,
        _: &mut ContextStack,
    ) -> Result<Self, Error<Storage>> {
        let mut buf = [0u8; 8];
        decoder.read_exact_raw(&mut buf)?;
        Ok(f64::from_le_bytes(buf))
    }
}

// Reads a length-prefixed vector of raw bytes.
fn read_byte_vec<Storage: Stream, A: Allocator>(
    decoder: &mut Decoder<Storage>,
    context: &mut ContextStack,
    alloc: &A,
) -> Result<Vec<u8, A>, Error<Storage>> {
    decoder.with_context(context, ContextId::VecByte, |decoder, context| {
        let len: u32 = decoder.read_bounded(context)?;
        decoder.read_bytes(context, len as usize, alloc)
    })
}

impl<A: Allocator> Decodable<A> for Name<A> {
    fn decode<Storage: Stream>(
        decoder: &mut Decoder<Storage>,
        context: &mut ContextStack,
        alloc: &A,
    ) -> Result<Self, Error<Storage>> {
        let len: u32 = decoder.read_bounded(context)?;
        let bytes = decoder.read_bytes(context, len as usize, alloc)?;
        core::str::from_utf8(&bytes).map_err(|_| Error::InvalidUtf8)?;

        // Safety: We have just validated that the byte sequence is valid
        // UTF-8.
        Ok(unsafe { Self::from_utf8_unchecked(bytes) })
    }
}

impl<A: Allocator> Decodable<A> for CustomSection<A> {
    fn decode<Storage: Stream>(
        decoder: &mut Decoder<Storage>,
        context: &mut ContextStack,
        alloc: &A,
    ) -> Result<Self, Error<Storage>> {
        let len: u32 = decoder.read_bounded(context)?;
        let name_start = decoder.offset();
        let name: Name<A> = decoder.read(context, alloc)?;
        let name_len = decoder.offset() - name_start;

        // The name alone may already exceed the purported section length.
        let Some(remaining) = (len as usize).checked_sub(name_len) else {
            return Err(Error::InvalidSectionLength {
                id: SectionId::Custom,
                expected: len,
                actual: name_len as u32,
            });
        };
        let bytes = decoder.read_bytes(context, remaining, alloc)?;
        trace!(
            "custom section \"{}\" at {name_start:#x}: {len:#x} bytes",
            name.as_str()
        );
        Ok(Self {
            name,
            bytes: bytes.into_boxed_slice(),
        })
    }
}

impl<A: Allocator> Decodable<A> for FunctionType<A> {
    fn decode<Storage: Stream>(
        decoder: &mut Decoder<Storage>,
        context: &mut ContextStack,
        alloc: &A,
    ) -> Result<Self, Error<Storage>> {
        decoder.read_bounded::<FunctionTypeToken>(context)?;
        Ok(Self {
            parameters: decoder.read(context, alloc)?,
            results: decoder.read(context, alloc)?,
        })
    }
}

impl BoundedDecodable for Limits {
    fn decode<Storage: Stream>(
        decoder: &mut Decoder<Storage>,
        context: &mut ContextStack,
    ) -> Result<Self, Error<Storage>> {
        let token: LimitsToken = decoder.read_bounded(context)?;
        let min: u32 = decoder.read_bounded(context)?;
        let max = match token {
            LimitsToken::WithoutMax => None,
            LimitsToken::WithMax => Some(decoder.read_bounded(context)?),
        };
        Ok(Self { min, max })
    }
}

impl BoundedDecodable for TableType {
    fn decode<Storage: Stream>(
        decoder: &mut Decoder<Storage>,
        context: &mut ContextStack,
    ) -> Result<Self, Error<Storage>> {
        Ok(Self {
            reftype: decoder.read_bounded(context)?,
            limits: decoder.read_bounded(context)?,
        })
    }
}

impl BoundedDecodable for GlobalType {
    fn decode<Storage: Stream>(
        decoder: &mut Decoder<Storage>,
        context: &mut ContextStack,
    ) -> Result<Self, Error<Storage>> {
        Ok(Self {
            value: decoder.read_bounded(context)?,
            mutability: decoder.read_bounded(context)?,
        })
    }
}

impl<A: Allocator> Decodable<A> for ConstExpr<A> {
    fn decode<Storage: Stream>(
        decoder: &mut Decoder<Storage>,
        context: &mut ContextStack,
        alloc: &A,
    ) -> Result<Self, Error<Storage>> {
        let mut instrs = Vec::new_in(alloc.clone());
        loop {
            let instr = match decoder.read_bounded(context)? {
                ConstOpcode::End => break,
                ConstOpcode::I32Const => ConstInstr::I32Const(decoder.read_bounded(context)?),
                ConstOpcode::I64Const => ConstInstr::I64Const(decoder.read_bounded(context)?),
                ConstOpcode::F32Const => ConstInstr::F32Const(decoder.read_bounded(context)?),
                ConstOpcode::F64Const => ConstInstr::F64Const(decoder.read_bounded(context)?),
                ConstOpcode::GlobalGet => ConstInstr::GlobalGet(decoder.read_bounded(context)?),
                ConstOpcode::RefNull => ConstInstr::RefNull(decoder.read_bounded(context)?),
                ConstOpcode::RefFunc => ConstInstr::RefFunc(decoder.read_bounded(context)?),
                ConstOpcode::I32Add => ConstInstr::I32Add,
                ConstOpcode::I32Sub => ConstInstr::I32Sub,
                ConstOpcode::I32Mul => ConstInstr::I32Mul,
                ConstOpcode::I64Add => ConstInstr::I64Add,
                ConstOpcode::I64Sub => ConstInstr::I64Sub,
                ConstOpcode::I64Mul => ConstInstr::I64Mul,
            };
            instrs.try_reserve(1)?;
            instrs.push(instr);
        }
        Ok(Self::new(instrs))
    }
}

impl BoundedDecodable for ImportDescriptor {
    fn decode<Storage: Stream>(
        decoder: &mut Decoder<Storage>,
        context: &mut ContextStack,
    ) -> Result<Self, Error<Storage>> {
        type Token = ImportDescriptorToken;

        match decoder.read_bounded(context)? {
            Token::Function => Ok(ImportDescriptor::Function(decoder.read_bounded(context)?)),
            Token::Table => Ok(ImportDescriptor::Table(decoder.read_bounded(context)?)),
            Token::Memory => Ok(ImportDescriptor::Memory(decoder.read_bounded(context)?)),
            Token::Global => Ok(ImportDescriptor::Global(decoder.read_bounded(context)?)),
        }
    }
}

impl<A: Allocator> Decodable<A> for Import<A> {
    fn decode<Storage: Stream>(
        decoder: &mut Decoder<Storage>,
        context: &mut ContextStack,
        alloc: &A,
    ) -> Result<Self, Error<Storage>> {
        Ok(Self {
            module: decoder.read(context, alloc)?,
            field: decoder.read(context, alloc)?,
            descriptor: decoder.read_bounded(context)?,
        })
    }
}

impl<A: Allocator> Decodable<A> for Global<A> {
    fn decode<Storage: Stream>(
        decoder: &mut Decoder<Storage>,
        context: &mut ContextStack,
        alloc: &A,
    ) -> Result<Self, Error<Storage>> {
        Ok(Self {
            ty: decoder.read_bounded(context)?,
            init: decoder.read(context, alloc)?,
        })
    }
}

impl BoundedDecodable for ExportDescriptor {
    fn decode<Storage: Stream>(
        decoder: &mut Decoder<Storage>,
        context: &mut ContextStack,
    ) -> Result<Self, Error<Storage>> {
        type Token = ExportDescriptorToken;

        match decoder.read_bounded(context)? {
            Token::Function => Ok(ExportDescriptor::Function(decoder.read_bounded(context)?)),
            Token::Table => Ok(ExportDescriptor::Table(decoder.read_bounded(context)?)),
            Token::Memory => Ok(ExportDescriptor::Memory(decoder.read_bounded(context)?)),
            Token::Global => Ok(ExportDescriptor::Global(decoder.read_bounded(context)?)),
        }
    }
}

impl<A: Allocator> Decodable<A> for Export<A> {
    fn decode<Storage: Stream>(
        decoder: &mut Decoder<Storage>,
        context: &mut ContextStack,
        alloc: &A,
    ) -> Result<Self, Error<Storage>> {
        Ok(Self {
            field: decoder.read(context, alloc)?,
            descriptor: decoder.read_bounded(context)?,
        })
    }
}

impl<A: Allocator> Decodable<A> for ElementSegment<A> {
    fn decode<Storage: Stream>(
        decoder: &mut Decoder<Storage>,
        context: &mut ContextStack,
        alloc: &A,
    ) -> Result<Self, Error<Storage>> {
        type Token = ElementSegmentToken;

        let token: Token = decoder.read_bounded(context)?;

        // Flags 0 and 4 imply table 0 and an element type of funcref.
        let mode = match token {
            Token::ActiveElemIndices | Token::ActiveElemExprs => {
                ElementMode::Active(ElementModeActive {
                    table: TableIdx::new(0),
                    offset: decoder.read(context, alloc)?,
                })
            }
            Token::ActiveTableIndexElemIndices | Token::ActiveTableIndexElemExprs => {
                ElementMode::Active(ElementModeActive {
                    table: decoder.read_bounded(context)?,
                    offset: decoder.read(context, alloc)?,
                })
            }
            Token::PassiveElemIndices | Token::PassiveElemExprs => ElementMode::Passive,
            Token::DeclarativeElemIndices | Token::DeclarativeElemExprs => ElementMode::Declarative,
        };

        let (ty, init) = match token {
            Token::ActiveElemIndices => (
                RefType::Func,
                ElementInit::FunctionIndices(Decodable::decode(decoder, context, alloc)?),
            ),
            Token::PassiveElemIndices
            | Token::ActiveTableIndexElemIndices
            | Token::DeclarativeElemIndices => {
                let kind: ElementKind = decoder.read_bounded(context)?;
                (
                    kind.into(),
                    ElementInit::FunctionIndices(Decodable::decode(decoder, context, alloc)?),
                )
            }
            Token::ActiveElemExprs => (
                RefType::Func,
                ElementInit::Expressions(Decodable::decode(decoder, context, alloc)?),
            ),
            Token::PassiveElemExprs
            | Token::ActiveTableIndexElemExprs
            | Token::DeclarativeElemExprs => {
                let reftype: RefType = decoder.read_bounded(context)?;
                (
                    reftype,
                    ElementInit::Expressions(Decodable::decode(decoder, context, alloc)?),
                )
            }
        };
        Ok(Self { ty, init, mode })
    }
}

impl BoundedDecodable for LocalGroup {
    fn decode<Storage: Stream>(
        decoder: &mut Decoder<Storage>,
        context: &mut ContextStack,
    ) -> Result<Self, Error<Storage>> {
        Ok(Self {
            count: decoder.read_bounded(context)?,
            ty: decoder.read_bounded(context)?,
        })
    }
}

impl<A: Allocator> Decodable<A> for Function<A> {
    fn decode<Storage: Stream>(
        decoder: &mut Decoder<Storage>,
        context: &mut ContextStack,
        alloc: &A,
    ) -> Result<Self, Error<Storage>> {
        let expected: u32 = decoder.read_bounded(context)?;
        let offset_start = decoder.offset();
        let locals = decoder.read(context, alloc)?;
        let locals_len = decoder.offset() - offset_start;
        let Some(body_len) = (expected as usize).checked_sub(locals_len) else {
            return Err(Error::InvalidFunctionLength {
                expected,
                actual: locals_len as u32,
            });
        };
        let body = decoder.read_bytes(context, body_len, alloc)?;
        Ok(Self {
            locals,
            body: body.into_boxed_slice(),
        })
    }
}

impl<A: Allocator> Decodable<A> for DataSegment<A> {
    fn decode<Storage: Stream>(
        decoder: &mut Decoder<Storage>,
        context: &mut ContextStack,
        alloc: &A,
    ) -> Result<Self, Error<Storage>> {
        let token: DataSegmentToken = decoder.read_bounded(context)?;
        let mode = match token {
            DataSegmentToken::ActiveNoMemIdx => DataMode::Active(DataModeActive {
                memory: MemIdx::new(0),
                offset: decoder.read(context, alloc)?,
            }),
            DataSegmentToken::Passive => DataMode::Passive,
            DataSegmentToken::ActiveWithMemIdx => DataMode::Active(DataModeActive {
                memory: decoder.read_bounded(context)?,
                offset: decoder.read(context, alloc)?,
            }),
        };
        Ok(Self {
            init: read_byte_vec(decoder, context, alloc)?,
            mode,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Module;
    use crate::core_compat::alloc::Global;
    use crate::decode::decode_module;
    use crate::storage::Buffer;

    type TestError = Error<Buffer<std::vec::Vec<u8>>>;

    // Decodes a module consisting of the header and a single section.
    fn decode_section(id: u8, payload: &[u8]) -> Result<Module<Global>, TestError> {
        let mut bytes = std::vec![0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00, id];
        bytes.push(payload.len() as u8);
        bytes.extend_from_slice(payload);
        decode_module(Buffer::new(bytes), &mut ContextStack::default(), Global)
    }

    #[test]
    fn test_type_section() {
        // (i32, i64) -> f32 and () -> ().
        let payload = [0x02, 0x60, 0x02, 0x7f, 0x7e, 0x01, 0x7d, 0x60, 0x00, 0x00];
        let module = decode_section(0x01, &payload).unwrap();
        let typesec = module.typesec().unwrap();
        assert_eq!(typesec.len(), 2);
        assert_eq!(typesec[0].parameters.as_slice(), &[ValType::I32, ValType::I64]);
        assert_eq!(typesec[0].results.as_slice(), &[ValType::F32]);
        assert!(typesec[1].parameters.is_empty());
    }

    #[test]
    fn test_invalid_functype_token() {
        let err = decode_section(0x01, &[0x01, 0x61, 0x00, 0x00]).unwrap_err();
        assert!(matches!(err, Error::InvalidToken(0x61)));
    }

    #[test]
    fn test_import_section() {
        // "env"."f" as a function of type 0, and "env"."m" as a memory with
        // limits [1, 2].
        let module = decode_section(
            0x02,
            &[
                0x02, //
                0x03, b'e', b'n', b'v', 0x01, b'f', 0x00, 0x00, //
                0x03, b'e', b'n', b'v', 0x01, b'm', 0x02, 0x01, 0x01, 0x02,
            ],
        )
        .unwrap();
        let importsec = module.importsec().unwrap();
        assert_eq!(importsec[0].module.as_str(), "env");
        assert_eq!(importsec[0].field.as_str(), "f");
        assert_eq!(
            importsec[0].descriptor,
            ImportDescriptor::Function(TypeIdx::new(0))
        );
        assert_eq!(
            importsec[1].descriptor,
            ImportDescriptor::Memory(MemType::new(Limits {
                min: 1,
                max: Some(2)
            }))
        );
    }

    #[test]
    fn test_global_section() {
        // (global (mut i64) (i64.const -1)) and
        // (global f64 (global.get 0)).
        let module = decode_section(
            0x06,
            &[
                0x02, //
                0x7e, 0x01, 0x42, 0x7f, 0x0b, //
                0x7c, 0x00, 0x23, 0x00, 0x0b,
            ],
        )
        .unwrap();
        let globalsec = module.globalsec().unwrap();
        assert_eq!(globalsec[0].ty.mutability, GlobalTypeMutability::Var);
        assert_eq!(globalsec[0].init.as_slice(), &[ConstInstr::I64Const(-1)]);
        assert_eq!(
            globalsec[1].init.as_slice(),
            &[ConstInstr::GlobalGet(GlobalIdx::new(0))]
        );
    }

    #[test]
    fn test_const_expr_end_byte_in_immediate() {
        // i32.const 11 encodes its immediate as 0x0b, the same as `end`.
        let module = decode_section(0x06, &[0x01, 0x7f, 0x00, 0x41, 0x0b, 0x0b]).unwrap();
        assert_eq!(
            module.globalsec().unwrap()[0].init.as_slice(),
            &[ConstInstr::I32Const(11)]
        );
    }

    #[test]
    fn test_invalid_const_opcode() {
        // local.get is not constant.
        let err = decode_section(0x06, &[0x01, 0x7f, 0x00, 0x20, 0x00, 0x0b]).unwrap_err();
        assert!(matches!(err, Error::InvalidConstOpcode(0x20)));
    }

    #[test]
    fn test_element_section() {
        let module = decode_section(
            0x09,
            &[
                0x03, //
                // Flags 0: active in table 0 at offset 1, functions 0 and 1.
                0x00, 0x41, 0x01, 0x0b, 0x02, 0x00, 0x01, //
                // Flags 3: declarative funcref, function 2.
                0x03, 0x00, 0x01, 0x02, //
                // Flags 5: passive externref, one null expression.
                0x05, 0x6f, 0x01, 0xd0, 0x6f, 0x0b,
            ],
        )
        .unwrap();
        let elemsec = module.elemsec().unwrap();

        let ElementMode::Active(active) = &elemsec[0].mode else {
            panic!("expected an active segment: {:?}", elemsec[0].mode);
        };
        assert_eq!(active.table, TableIdx::new(0));
        assert_eq!(active.offset.as_slice(), &[ConstInstr::I32Const(1)]);
        let ElementInit::FunctionIndices(funcs) = &elemsec[0].init else {
            panic!("expected function indices: {:?}", elemsec[0].init);
        };
        assert_eq!(funcs.as_slice(), &[FuncIdx::new(0), FuncIdx::new(1)]);

        assert!(matches!(elemsec[1].mode, ElementMode::Declarative));
        assert_eq!(elemsec[1].ty, RefType::Func);

        assert!(matches!(elemsec[2].mode, ElementMode::Passive));
        assert_eq!(elemsec[2].ty, RefType::Extern);
        let ElementInit::Expressions(exprs) = &elemsec[2].init else {
            panic!("expected expressions: {:?}", elemsec[2].init);
        };
        assert_eq!(exprs[0].as_slice(), &[ConstInstr::RefNull(RefType::Extern)]);
    }

    #[test]
    fn test_invalid_element_token() {
        let err = decode_section(0x09, &[0x01, 0x08]).unwrap_err();
        assert!(matches!(err, Error::InvalidElementToken(8)));
    }

    #[test]
    fn test_code_section() {
        // One function with two i32 locals and one f64 local, whose body is
        // `local.get 0; drop; end`.
        let payload = [0x01, 0x08, 0x02, 0x02, 0x7f, 0x01, 0x7c, 0x20, 0x00, 0x1a, 0x0b];
        let err = decode_section(0x0a, &payload).unwrap_err();
        // The entry claims 8 bytes, but holds 9.
        assert!(matches!(
            err,
            Error::InvalidSectionLength {
                id: SectionId::Code,
                ..
            }
        ));

        let payload = [0x01, 0x09, 0x02, 0x02, 0x7f, 0x01, 0x7c, 0x20, 0x00, 0x1a, 0x0b];
        let module = decode_section(0x0a, &payload).unwrap();
        let codesec = module.codesec().unwrap();
        assert_eq!(codesec[0].locals.total(), 3);
        assert_eq!(&*codesec[0].body, &[0x20, 0x00, 0x1a, 0x0b]);
    }

    #[test]
    fn test_function_length_shorter_than_locals() {
        let err = decode_section(0x0a, &[0x01, 0x01, 0x01, 0x01, 0x7f]).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidFunctionLength {
                expected: 1,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_data_section() {
        let module = decode_section(
            0x0b,
            &[
                0x02, //
                // Flags 0: active in memory 0 at offset 16.
                0x00, 0x41, 0x10, 0x0b, 0x02, b'h', b'i', //
                // Flags 1: passive.
                0x01, 0x01, 0x2a,
            ],
        )
        .unwrap();
        let datasec = module.datasec().unwrap();
        assert_eq!(datasec[0].init.as_slice(), b"hi");
        let DataMode::Active(active) = &datasec[0].mode else {
            panic!("expected an active segment: {:?}", datasec[0].mode);
        };
        assert_eq!(active.memory, MemIdx::new(0));
        assert!(matches!(datasec[1].mode, DataMode::Passive));
        assert_eq!(datasec[1].init.as_slice(), &[0x2a]);
    }

    #[test]
    fn test_invalid_data_token() {
        let err = decode_section(0x0b, &[0x01, 0x03]).unwrap_err();
        assert!(matches!(err, Error::InvalidDataToken(3)));
    }

    #[test]
    fn test_start_section() {
        let module = decode_section(0x08, &[0x80, 0x01]).unwrap();
        assert_eq!(**module.startsec().unwrap(), FuncIdx::new(128));
    }
}
