// Copyright (c) 2025 Joshua Seaton
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Container-level round-trip and interleaving tests through the public API.

use proptest::prelude::*;

use sectional::Module;
use sectional::core_compat::alloc::Global;
use sectional::core_compat::vec::Vec;
use sectional::decode;
use sectional::types::*;

const HEADER: [u8; 8] = [0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00];

fn vec_of<T: Clone>(items: &[T]) -> Vec<T, Global> {
    let mut vec = Vec::new_in(Global);
    vec.extend_from_slice(items);
    vec
}

fn custom(name: &str, bytes: &[u8]) -> CustomSection<Global> {
    CustomSection {
        name: Name::from_str_in(name, Global).unwrap(),
        bytes: vec_of(bytes).into_boxed_slice(),
    }
}

// The custom sections of a module as (position, name, bytes) triples, in
// encoding order.
fn custom_layout(module: &Module<Global>) -> std::vec::Vec<(usize, String, std::vec::Vec<u8>)> {
    module
        .custom_sections()
        .iter()
        .enumerate()
        .flat_map(|(position, customs)| {
            customs.iter().map(move |custom| {
                (
                    position,
                    custom.name.as_str().to_owned(),
                    custom.bytes.to_vec(),
                )
            })
        })
        .collect()
}

fn section_ids(module: &Module<Global>) -> std::vec::Vec<SectionId> {
    module.sections().map(Section::id).collect()
}

#[test]
fn test_example_layout() {
    let mut bytes = HEADER.to_vec();
    bytes.extend_from_slice(&[0x01, 0x04, 0x01, 0x60, 0x00, 0x00]); // type
    bytes.extend_from_slice(&[0x00, 0x06, 0x05, b'h', b'e', b'l', b'l', b'o']); // custom
    bytes.extend_from_slice(&[0x03, 0x02, 0x01, 0x00]); // function

    let module = Module::decode_bytes(&bytes, Global).unwrap();
    assert_eq!(section_ids(&module), [SectionId::Type, SectionId::Function]);
    assert_eq!(
        custom_layout(&module),
        [(1, "hello".to_owned(), std::vec::Vec::new())]
    );
    // Between the type and function sections, at the earliest position.
    assert_eq!(module.custom_sections().before(SectionId::Import).len(), 1);
    assert!(module.custom_sections().before(SectionId::Function).is_empty());
    assert!(module.custom_sections().find("hello").is_some());

    let encoded = module.encode_to_vec(Global).unwrap();
    assert_eq!(encoded.as_slice(), bytes.as_slice());
}

#[test]
fn test_every_section_kind_round_trips() {
    let mut bytes = HEADER.to_vec();
    for section in [
        &[0x01, 0x05, 0x01, 0x60, 0x00, 0x01, 0x7f][..], // type: () -> i32
        &[
            0x02, 0x0b, 0x01, 0x03, b'e', b'n', b'v', 0x01, b't', 0x01, 0x70, 0x00, 0x01,
        ], // import: table funcref [1, -]
        &[0x03, 0x02, 0x01, 0x00],                       // function
        &[0x04, 0x05, 0x01, 0x6f, 0x01, 0x00, 0x0a],     // table: externref [0, 10]
        &[0x05, 0x03, 0x01, 0x00, 0x01],                 // memory: [1, -]
        &[0x06, 0x06, 0x01, 0x7f, 0x00, 0x41, 0x2a, 0x0b], // global: i32 = 42
        &[0x07, 0x05, 0x01, 0x01, b'f', 0x00, 0x01],     // export: "f" = func 1
        &[0x08, 0x01, 0x01],                             // start: func 1
        &[0x09, 0x07, 0x01, 0x00, 0x41, 0x00, 0x0b, 0x01, 0x01], // elem
        &[0x0a, 0x04, 0x01, 0x02, 0x00, 0x0b],           // code: no locals
        &[0x0b, 0x06, 0x01, 0x01, 0x03, b'a', b'b', b'c'], // data: passive
    ] {
        bytes.extend_from_slice(section);
    }

    let module = Module::decode_bytes(&bytes, Global).unwrap();
    assert_eq!(section_ids(&module), SectionId::STANDARD);
    assert_eq!(module.custom_sections().total(), 0);

    let encoded = module.encode_to_vec(Global).unwrap();
    assert_eq!(encoded.as_slice(), bytes.as_slice());
}

#[test]
fn test_non_minimal_lengths_round_trip_structurally() {
    // Section and name lengths padded to two bytes each.
    let mut bytes = HEADER.to_vec();
    bytes.extend_from_slice(&[0x00, 0x84, 0x00, 0x81, 0x00, b'x', 0xee]);
    bytes.extend_from_slice(&[0x08, 0x81, 0x00, 0x02]);

    let module = Module::decode_bytes(&bytes, Global).unwrap();
    let encoded = module.encode_to_vec(Global).unwrap();
    assert!(encoded.len() < bytes.len());

    let redecoded = Module::decode_bytes(&encoded, Global).unwrap();
    assert_eq!(custom_layout(&redecoded), custom_layout(&module));
    assert_eq!(
        **redecoded.startsec().unwrap(),
        **module.startsec().unwrap()
    );
    assert_eq!(
        redecoded.encode_to_vec(Global).unwrap().as_slice(),
        encoded.as_slice()
    );
}

#[test]
fn test_explicit_table_and_memory_segments_round_trip() {
    let mut bytes = HEADER.to_vec();
    // elem: flags 6, table 1, offset 0, externref, [ref.null extern].
    bytes.extend_from_slice(&[
        0x09, 0x0b, 0x01, 0x06, 0x01, 0x41, 0x00, 0x0b, 0x6f, 0x01, 0xd0, 0x6f, 0x0b,
    ]);
    // data: flags 2, memory 1, offset 0, "hi".
    bytes.extend_from_slice(&[0x0b, 0x09, 0x01, 0x02, 0x01, 0x41, 0x00, 0x0b, 0x02, b'h', b'i']);

    let module = Module::decode_bytes(&bytes, Global).unwrap();
    assert_eq!(section_ids(&module), [SectionId::Element, SectionId::Data]);
    let encoded = module.encode_to_vec(Global).unwrap();
    assert_eq!(encoded.as_slice(), bytes.as_slice());
}

#[test]
fn test_bad_id_after_later_section_is_fatal() {
    let mut bytes = HEADER.to_vec();
    bytes.extend_from_slice(&[0x03, 0x01, 0x00]);
    bytes.extend_from_slice(&[0x02, 0x01, 0x00]);

    let err = Module::decode_bytes(&bytes, Global).unwrap_err();
    assert!(matches!(
        err.error,
        decode::Error::UnexpectedSectionId { id: 2, .. }
    ));
}

#[test]
fn test_custom_section_after_bad_id_is_never_reached() {
    // An unknown ID before a custom section.
    let mut bytes = HEADER.to_vec();
    bytes.extend_from_slice(&[0x0d, 0x00]);
    bytes.extend_from_slice(&[0x00, 0x02, 0x01, b'a']);

    let err = Module::decode_bytes(&bytes, Global).unwrap_err();
    assert!(matches!(
        err.error,
        decode::Error::UnexpectedSectionId { id: 0x0d, offset: 8 }
    ));
}

#[cfg(feature = "std")]
#[test]
fn test_std_io_round_trip() {
    use sectional::storage::{Reader, Writer};

    let mut bytes = HEADER.to_vec();
    bytes.extend_from_slice(&[0x00, 0x02, 0x01, b'a']);
    bytes.extend_from_slice(&[0x05, 0x03, 0x01, 0x00, 0x02]);
    bytes.extend_from_slice(&[0x00, 0x02, 0x01, b'b']);

    let module = Module::decode(Reader::new(std::io::Cursor::new(&bytes)), Global).unwrap();
    let writer = module.encode(Writer::new(std::vec::Vec::new())).unwrap();
    assert_eq!(writer.into_inner(), bytes);
}

// A generated standard section, as a constructor from its raw parts.
fn arb_section() -> impl Strategy<Value = SectionParts> {
    prop_oneof![
        prop::collection::vec(any::<u32>(), 0..4).prop_map(SectionParts::Function),
        (any::<u32>(), prop::option::of(any::<u32>()))
            .prop_map(|(min, max)| SectionParts::Memory(min, max)),
        any::<u32>().prop_map(SectionParts::Start),
        prop::collection::vec(prop::collection::vec(any::<u8>(), 0..8), 0..3)
            .prop_map(SectionParts::Data),
    ]
}

#[derive(Clone, Debug)]
enum SectionParts {
    Function(std::vec::Vec<u32>),
    Memory(u32, Option<u32>),
    Start(u32),
    Data(std::vec::Vec<std::vec::Vec<u8>>),
}

impl SectionParts {
    fn build(&self) -> Section<Global> {
        match self {
            SectionParts::Function(indices) => {
                let mut funcs = Vec::new_in(Global);
                funcs.extend(indices.iter().copied().map(TypeIdx::new));
                FunctionSection::new(funcs).into()
            }
            SectionParts::Memory(min, max) => {
                let limits = Limits {
                    min: *min,
                    max: *max,
                };
                MemorySection::new(vec_of(&[MemType::new(limits)])).into()
            }
            SectionParts::Start(func) => StartSection::new(FuncIdx::new(*func)).into(),
            SectionParts::Data(segments) => {
                let mut data = Vec::new_in(Global);
                for init in segments {
                    data.push(DataSegment {
                        init: vec_of(init),
                        mode: DataMode::Passive,
                    });
                }
                DataSection::new(data).into()
            }
        }
    }
}

proptest! {
    #[test]
    fn prop_round_trip_preserves_interleaving(
        sections in prop::collection::vec(arb_section(), 0..4),
        customs in prop::collection::vec(
            (0usize..CUSTOM_SLOT_COUNT, "[a-z._]{0,8}", prop::collection::vec(any::<u8>(), 0..16)),
            0..8,
        ),
    ) {
        let mut positions: [Vec<CustomSection<Global>, Global>; CUSTOM_SLOT_COUNT] =
            core::array::from_fn(|_| Vec::new_in(Global));
        for (position, name, bytes) in &customs {
            positions[*position].push(custom(name, bytes));
        }
        let mut slots = [const { None }; 11];
        for parts in &sections {
            let section = parts.build();
            let slot = section.id().slot().unwrap();
            slots[slot] = Some(section);
        }
        let module = Module::from_parts(
            Header::default(),
            slots,
            CustomSlots::from_array(positions),
        );

        let encoded = module.encode_to_vec(Global).unwrap();
        let decoded = Module::decode_bytes(&encoded, Global).unwrap();
        prop_assert_eq!(section_ids(&decoded), section_ids(&module));

        // Custom sections keep their stream order. Positions before absent
        // standard sections may collapse to an earlier equivalent one, but
        // never a later one.
        let original = custom_layout(&module);
        let layout = custom_layout(&decoded);
        prop_assert_eq!(layout.len(), customs.len());
        for (before, after) in original.iter().zip(&layout) {
            prop_assert_eq!((&before.1, &before.2), (&after.1, &after.2));
            prop_assert!(after.0 <= before.0);
        }

        let reencoded = decoded.encode_to_vec(Global).unwrap();
        prop_assert_eq!(reencoded.as_slice(), encoded.as_slice());

        // Once decoded, the layout is a fixed point.
        let redecoded = Module::decode_bytes(&reencoded, Global).unwrap();
        prop_assert_eq!(custom_layout(&redecoded), layout);
    }

    #[test]
    fn prop_leading_customs_land_before_type(
        names in prop::collection::vec("[a-z]{1,6}", 0..6),
    ) {
        let mut bytes = HEADER.to_vec();
        for name in &names {
            let len = u8::try_from(name.len()).unwrap();
            bytes.push(0x00);
            bytes.push(len + 1);
            bytes.push(len);
            bytes.extend_from_slice(name.as_bytes());
        }

        let module = Module::decode_bytes(&bytes, Global).unwrap();
        prop_assert_eq!(module.sections().count(), 0);
        let decoded: std::vec::Vec<&str> = module
            .custom_sections()
            .before(SectionId::Type)
            .iter()
            .map(|custom| custom.name.as_str())
            .collect();
        prop_assert_eq!(decoded, names.iter().map(String::as_str).collect::<std::vec::Vec<_>>());
        prop_assert_eq!(module.custom_sections().iter().count(), CUSTOM_SLOT_COUNT);
    }

    #[test]
    fn prop_arbitrary_bytes_never_panic(body in prop::collection::vec(any::<u8>(), 0..64)) {
        let mut bytes = HEADER.to_vec();
        bytes.extend_from_slice(&body);
        if let Ok(module) = Module::decode_bytes(&bytes, Global) {
            prop_assert!(module.encode_to_vec(Global).is_ok());
        }
    }
}
