// Copyright (c) 2025 Joshua Seaton
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! LEB128 decoding and encoding.

use core::ops;

const CONTENT_MASK: u8 = 0x7f;
const LAST_CHUNK_MASK: u8 = 0x80;
const SIGN_EXTEND_MASK: u8 = 0x40;

// A LEB128-encodable integral type.
pub(crate) trait Leb128:
    Copy                           //
    + From<u8>                     //
    + ops::BitOrAssign             //
    + ops::Not<Output = Self>      //
    + ops::Shl<u32, Output = Self> //
{
    const MAX_BITS: u32;
    const IS_SIGNED: bool;

    // Splits off the low 7 bits as the next chunk to encode, returning the
    // remaining value if further chunks are needed to represent it.
    fn split_chunk(self) -> (u8, Option<Self>);
}

macro_rules! impl_leb128_unsigned {
    ($type:ty) => {
        impl Leb128 for $type {
            const MAX_BITS: u32 = <$type>::BITS;
            const IS_SIGNED: bool = false;

            fn split_chunk(self) -> (u8, Option<Self>) {
                let chunk = (self as u8) & CONTENT_MASK;
                let rest = self >> 7;
                (chunk, (rest != 0).then_some(rest))
            }
        }
    };
}

macro_rules! impl_leb128_signed {
    ($type:ty) => {
        impl Leb128 for $type {
            const MAX_BITS: u32 = <$type>::BITS;
            const IS_SIGNED: bool = true;

            #[allow(clippy::cast_sign_loss)]
            fn split_chunk(self) -> (u8, Option<Self>) {
                let chunk = (self as u8) & CONTENT_MASK;
                let rest = self >> 7; // Arithmetic shift.

                // Done once the remaining bits are pure sign extension of the
                // chunk's sign bit.
                let sign_bit_set = chunk & SIGN_EXTEND_MASK != 0;
                let done = (rest == 0 && !sign_bit_set) || (rest == -1 && sign_bit_set);
                (chunk, (!done).then_some(rest))
            }
        }
    };
}

impl_leb128_unsigned!(u32);
impl_leb128_signed!(i32);
impl_leb128_signed!(i64);

// Error trait for LEB128 parsing failures.
pub(crate) trait Error {
    fn invalid_leb128() -> Self;
}

// Read a LEB128-encoded value using the provided byte source function.
//
// Implements LEB128 decoding as the binary format defines it. Validates encoding
// constraints including maximum length and proper unused bit handling.
pub(crate) fn read<T, F, E>(mut read_byte: F) -> Result<T, E>
where
    T: Leb128,
    F: FnMut() -> Result<u8, E>,
    E: Error,
{
    let mut result = T::from(0);
    let mut shift = 0;
    let mut byte;

    loop {
        if shift >= T::MAX_BITS {
            return Err(E::invalid_leb128());
        }

        byte = read_byte()?;
        let content = byte & CONTENT_MASK;

        // Validate that the final byte doesn't overflow the remaining bits.
        if T::MAX_BITS - shift < 7 {
            let remaining_bits = T::MAX_BITS - shift;
            let valid = if T::IS_SIGNED {
                // For signed types, the unused bits must be consistent with the
                // sign bit.
                let mask = ((!0u8) << (remaining_bits - 1)) & CONTENT_MASK;
                let masked = content & mask;
                masked == 0 || masked == mask
            } else {
                // For unsigned types, the unused bits must be zero.
                content < (1u8 << remaining_bits)
            };
            if !valid {
                return Err(E::invalid_leb128());
            }
        }

        result |= T::from(content) << shift;
        shift += 7;

        if byte & LAST_CHUNK_MASK == 0 {
            break;
        }
    }

    // Sign extend if this is a signed type and the sign bit is set.
    if T::IS_SIGNED && shift < T::MAX_BITS && (byte & SIGN_EXTEND_MASK) != 0 {
        result |= !T::from(0) << shift;
    }
    Ok(result)
}

// Write the minimal LEB128 encoding of a value using the provided byte sink
// function.
pub(crate) fn write<T, F, E>(mut value: T, mut write_byte: F) -> Result<(), E>
where
    T: Leb128,
    F: FnMut(u8) -> Result<(), E>,
{
    loop {
        match value.split_chunk() {
            (chunk, Some(rest)) => {
                write_byte(chunk | LAST_CHUNK_MASK)?;
                value = rest;
            }
            (chunk, None) => return write_byte(chunk),
        }
    }
}
