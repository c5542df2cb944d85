use akpk::crypto::{apply_xor_table, XorTable, KEY_MATERIAL_LEN};
use akpk::index::{ResourceFlags, ResourceHeader, RESOURCE_HEADER_SIZE};
use akpk::io_stream::{PackOptions, PackageReader, PackageWriter};
use akpk::superblock::{ExtensionHeader, VersionInfo, FILE_HEADER_SIZE};
use akpk::{
    content_hash, estimate_header_size, CompressionScheme, Endian, ErrorKind, Obfuscation, Package,
    PackageError,
};
use proptest::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor};
use tempfile::NamedTempFile;

fn pack(options: PackOptions, entries: &[(u64, Vec<u8>, CompressionScheme)]) -> Vec<u8> {
    let mut writer = PackageWriter::new(Cursor::new(Vec::new()), options, entries.len()).unwrap();
    for (hash, data, scheme) in entries {
        writer.add_resource_bytes(*hash, data, *scheme).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn sample_entries(count: usize) -> Vec<(u64, Vec<u8>, CompressionScheme)> {
    let schemes = [CompressionScheme::None, CompressionScheme::Deflate, CompressionScheme::Zstd];
    (0..count)
        .map(|i| {
            let hash = (i as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
            let data = format!("resource #{i} ").repeat(i * 7 + 1).into_bytes();
            (hash, data, schemes[i % 3])
        })
        .collect()
}

#[test]
fn test_pack_and_list_on_disk() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path().to_path_buf();
    let entries = sample_entries(5);

    {
        let file = BufWriter::new(File::create(&path).unwrap());
        let mut writer = PackageWriter::new(file, PackOptions::default(), entries.len()).unwrap();
        for (hash, data, scheme) in &entries {
            writer.add_resource_bytes(*hash, data, *scheme).unwrap();
        }
        writer.finish().unwrap();
    }

    {
        let file = BufReader::new(File::open(&path).unwrap());
        let mut reader = PackageReader::new(file).unwrap();
        assert_eq!(reader.resources().len(), 5);
        for (hash, data, scheme) in &entries {
            let r = *reader.find(*hash).unwrap();
            assert_eq!(r.compression(), *scheme);
            assert_eq!(r.uncompressed_size, data.len() as i64);
            assert_eq!(r.content_hash, content_hash(data));
            assert_eq!(&reader.read_resource(&r).unwrap(), data);
        }
    }
}

#[test]
fn test_round_trip_counts_and_byte_orders() {
    for count in [0, 1, 2, 17] {
        for endian in [Endian::Little, Endian::Big] {
            let entries = sample_entries(count);
            let bytes = pack(PackOptions { endian, ..PackOptions::default() }, &entries);

            let mut reader = PackageReader::new(Cursor::new(bytes)).unwrap();
            assert_eq!(reader.endian(), endian);
            assert_eq!(reader.resources().len(), count);
            for (hash, data, _) in &entries {
                let r = *reader.find(*hash).unwrap();
                assert_eq!(&reader.read_resource(&r).unwrap(), data, "count {count} {endian:?}");
            }
        }
    }
}

#[test]
fn test_ten_thousand_resources() {
    const COUNT: usize = 10_000;
    let entries: Vec<(u64, Vec<u8>, CompressionScheme)> = (0..COUNT)
        .map(|i| {
            let hash = (i as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
            (hash, (i as u32).to_le_bytes().to_vec(), CompressionScheme::None)
        })
        .collect();

    for endian in [Endian::Little, Endian::Big] {
        let bytes = pack(PackOptions { endian, ..PackOptions::default() }, &entries);
        let mut reader = PackageReader::new(Cursor::new(bytes)).unwrap();

        let header_size = reader.package().header_size();
        assert_eq!(header_size, estimate_header_size(COUNT, false, false, None, false));
        assert_eq!(header_size, FILE_HEADER_SIZE + COUNT * RESOURCE_HEADER_SIZE);
        assert_eq!(reader.by_offset()[0].data_offset as usize, header_size);

        let hashes: Vec<u64> = reader.resources().iter().map(|r| r.name_hash).collect();
        assert!(hashes.windows(2).all(|w| w[0] < w[1]), "directory not sorted ({endian:?})");

        let read: BTreeMap<u64, Vec<u8>> = reader
            .by_offset()
            .iter()
            .map(|r| (r.name_hash, reader.read_resource(r).unwrap()))
            .collect();
        let written: BTreeMap<u64, Vec<u8>> = entries.iter().map(|(h, d, _)| (*h, d.clone())).collect();
        assert_eq!(read, written);
    }
}

#[test]
fn test_signature_bytes_follow_byte_order() {
    let little = pack(PackOptions::default(), &[]);
    assert_eq!(&little[..4], b"KPKA");
    assert_eq!(&little[4..6], &[4, 1]);

    let big = pack(PackOptions { endian: Endian::Big, ..PackOptions::default() }, &[]);
    assert_eq!(&big[..4], b"AKPK");
}

#[test]
fn test_directory_is_sorted_on_disk() {
    let entries = vec![
        (0xFFFF_0000_0000_0000, b"c".to_vec(), CompressionScheme::None),
        (0x0000_0000_0000_0001, b"a".to_vec(), CompressionScheme::None),
        (0x0000_00FF_0000_0000, b"b".to_vec(), CompressionScheme::None),
    ];
    let bytes = pack(PackOptions::default(), &entries);

    let hashes: Vec<u64> = (0..3)
        .map(|i| {
            let at = FILE_HEADER_SIZE + i * RESOURCE_HEADER_SIZE;
            u64::from_le_bytes(bytes[at..at + 8].try_into().unwrap())
        })
        .collect();
    assert_eq!(hashes, vec![1, 0xFF_0000_0000, 0xFFFF_0000_0000_0000]);

    // Payloads stay in insertion order.
    let reader = PackageReader::new(Cursor::new(bytes)).unwrap();
    let order: Vec<u64> = reader.by_offset().iter().map(|r| r.name_hash).collect();
    assert_eq!(order, vec![0xFFFF_0000_0000_0000, 1, 0xFF_0000_0000]);
}

#[test]
fn test_first_payload_follows_reserved_header() {
    let version = VersionInfo { tag: 0x1234_5678, type_code: 2, version: 9 };
    let cases = [
        (PackOptions::default(), estimate_header_size(3, false, false, None, false)),
        (
            PackOptions { version: Some(version), ..PackOptions::default() },
            estimate_header_size(3, true, false, None, false),
        ),
        (
            PackOptions { extension: Some(ExtensionHeader(1)), ..PackOptions::default() },
            estimate_header_size(3, false, true, None, false),
        ),
        (
            PackOptions { obfuscation: Obfuscation::Legacy, ..PackOptions::default() },
            estimate_header_size(3, false, false, None, true),
        ),
    ];

    for (options, expected) in cases {
        let bytes = pack(options, &sample_entries(3));
        let reader = PackageReader::new(Cursor::new(bytes)).unwrap();
        let first = reader.by_offset()[0];
        assert_eq!(first.data_offset as usize, expected);
        assert_eq!(reader.package().header_size(), expected);
    }
}

#[test]
fn test_legacy_obfuscation_with_random_seed() {
    let options = PackOptions { obfuscation: Obfuscation::Legacy, ..PackOptions::default() };
    let entries = sample_entries(4);
    let bytes = pack(options, &entries);

    // No directory record may appear in the clear.
    for (hash, _, _) in &entries {
        let needle = hash.to_le_bytes();
        let header_end = estimate_header_size(4, false, false, None, true);
        assert!(!bytes[..header_end].windows(8).any(|w| w == needle) || *hash == 0);
    }

    let mut reader = PackageReader::new(Cursor::new(bytes)).unwrap();
    assert_eq!(reader.package().obfuscation, Obfuscation::Legacy);
    assert!(reader.package().key_material.is_some());
    for (hash, data, _) in &entries {
        let r = *reader.find(*hash).unwrap();
        assert_eq!(&reader.read_resource(&r).unwrap(), data);
    }
}

#[test]
fn test_corruption_is_rejected() {
    let bytes = pack(PackOptions::default(), &sample_entries(2));

    let mut bad_magic = bytes.clone();
    bad_magic[0] ^= 0xFF;
    let err = PackageReader::new(Cursor::new(bad_magic)).err().unwrap();
    assert!(matches!(err, PackageError::BadSignature(_)));

    let mut bad_version = bytes.clone();
    bad_version[5] = 0;
    let err = PackageReader::new(Cursor::new(bad_version)).err().unwrap();
    assert!(matches!(err, PackageError::UnsupportedVersion { major: 4, minor: 0 }));

    for bit in [0u16, 5, 15] {
        let mut bad_flags = bytes.clone();
        bad_flags[6..8].copy_from_slice(&(1u16 << bit).to_le_bytes());
        let err = PackageReader::new(Cursor::new(bad_flags)).err().unwrap();
        assert!(matches!(err, PackageError::UnknownFileFlags(_)), "bit {bit}");
    }

    let mut negative = bytes.clone();
    negative[8..12].copy_from_slice(&(-1i32).to_le_bytes());
    let err = PackageReader::new(Cursor::new(negative)).err().unwrap();
    assert!(matches!(err, PackageError::NegativeCount { count: -1, .. }));

    let err = PackageReader::new(Cursor::new(bytes[..40].to_vec())).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Truncated);

    let err = PackageReader::new(Cursor::new(bytes[..bytes.len() - 1].to_vec())).err().unwrap();
    assert!(matches!(err, PackageError::OutOfBounds { .. }));
}

#[test]
fn test_corrupt_payload_fails_to_decode() {
    let entries = vec![(7u64, b"zstd payload ".repeat(50), CompressionScheme::Zstd)];
    let mut bytes = pack(PackOptions::default(), &entries);
    let start = estimate_header_size(1, false, false, None, false);
    for b in &mut bytes[start..start + 4] {
        *b = 0;
    }
    let mut reader = PackageReader::new(Cursor::new(bytes)).unwrap();
    let r = *reader.find(7).unwrap();
    assert_eq!(reader.read_resource(&r).unwrap_err().kind(), ErrorKind::Format);
}

#[test]
fn test_unknown_names_use_hash_and_sniffed_extension() {
    let entries = vec![
        (0x0123_4567_89AB_CDEF, b"TEX\0 texture body".to_vec(), CompressionScheme::Deflate),
        (0x42, b"\0\0\0\0IFNT font".to_vec(), CompressionScheme::None),
        (0x43, b"plain".to_vec(), CompressionScheme::Zstd),
    ];
    let mut reader = PackageReader::new(Cursor::new(pack(PackOptions::default(), &entries))).unwrap();
    let known: HashMap<u64, String> = [(0x43, "natives/stm/readme.txt".to_owned())].into();

    let names: Vec<String> = reader
        .resources()
        .to_vec()
        .iter()
        .map(|r| reader.resource_name(r, &known).unwrap())
        .collect();
    assert_eq!(
        names,
        vec![
            "__UNKNOWN/0000000000000042.ifnt".to_owned(),
            "natives/stm/readme.txt".to_owned(),
            "__UNKNOWN/0123456789ABCDEF.tex".to_owned(),
        ]
    );
}

// ── Properties ──────────────────────────────────────────────────────────────

fn arb_flags() -> impl Strategy<Value = ResourceFlags> {
    (0u64..3, 0u64..5, 0u64..0x1000).prop_map(|(compression, crypto, reserved)| {
        ResourceFlags::from_raw(compression | (reserved << 4) | (crypto << 16)).unwrap()
    })
}

fn arb_resources() -> impl Strategy<Value = Vec<ResourceHeader>> {
    prop::collection::btree_map(
        any::<u64>(),
        (any::<i64>(), any::<i64>(), any::<i64>(), arb_flags(), any::<u32>(), any::<u32>()),
        0..24,
    )
    .prop_map(|map: BTreeMap<_, _>| {
        map.into_iter()
            .map(|(name_hash, (data_offset, compressed_size, uncompressed_size, flags, content_hash, group_hash))| {
                ResourceHeader {
                    name_hash,
                    data_offset,
                    compressed_size,
                    uncompressed_size,
                    flags,
                    content_hash,
                    group_hash,
                }
            })
            .collect()
    })
}

fn arb_endian() -> impl Strategy<Value = Endian> {
    prop_oneof![Just(Endian::Little), Just(Endian::Big)]
}

proptest! {
    #[test]
    fn prop_directory_round_trip(
        resources in arb_resources(),
        endian in arb_endian(),
        legacy in any::<bool>(),
        seed in prop::array::uniform32(any::<u8>()),
    ) {
        let mut package = Package::new(endian);
        package.resources = resources.clone();
        if legacy {
            package.obfuscation = Obfuscation::Legacy;
            let mut material = [0u8; KEY_MATERIAL_LEN];
            for (i, b) in material.iter_mut().enumerate() {
                *b = seed[i % 32];
            }
            package.key_material = Some(material);
        }

        let bytes = package.to_header_bytes().unwrap();
        prop_assert_eq!(bytes.len(), package.header_size());

        let back = Package::deserialize(Cursor::new(&bytes), None).unwrap();
        prop_assert_eq!(back.resources, resources);
        prop_assert_eq!(back.endian, endian);
    }

    #[test]
    fn prop_keystream_is_an_involution(
        table in prop::array::uniform32(any::<u8>()),
        data in prop::collection::vec(any::<u8>(), 0..512),
    ) {
        let table: XorTable = table;
        let mut buf = data.clone();
        apply_xor_table(&table, &mut buf);
        apply_xor_table(&table, &mut buf);
        prop_assert_eq!(buf, data);
    }

    #[test]
    fn prop_header_size_is_determined_by_counts(
        count in 0usize..64,
        version in any::<bool>(),
        extension in any::<bool>(),
        legacy in any::<bool>(),
    ) {
        let mut package = Package::new(Endian::Little);
        package.resources = (0..count as u64).map(ResourceHeader::new).collect();
        if version {
            package.version = Some(VersionInfo { tag: 1, type_code: 0, version: 0 });
        }
        if extension {
            package.extension = Some(ExtensionHeader(0));
        } else if legacy {
            package.obfuscation = Obfuscation::Legacy;
        }
        let expected = estimate_header_size(
            count, version, extension, None, !extension && legacy,
        );
        prop_assert_eq!(package.to_header_bytes().unwrap().len(), expected);
    }

    #[test]
    fn prop_payloads_round_trip(
        payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..2048), 0..6),
        scheme in prop_oneof![
            Just(CompressionScheme::None),
            Just(CompressionScheme::Deflate),
            Just(CompressionScheme::Zstd),
        ],
    ) {
        let entries: Vec<_> = payloads
            .iter()
            .enumerate()
            .map(|(i, p)| (i as u64 * 31 + 5, p.clone(), scheme))
            .collect();
        let mut reader = PackageReader::new(Cursor::new(pack(PackOptions::default(), &entries))).unwrap();
        for (hash, data, _) in &entries {
            let r = *reader.find(*hash).unwrap();
            prop_assert_eq!(&reader.read_resource(&r).unwrap(), data);
        }
    }

    #[test]
    fn prop_arbitrary_headers_never_panic(tail in prop::collection::vec(any::<u8>(), 0..400)) {
        let mut bytes = b"KPKA\x04\x01".to_vec();
        bytes.extend(tail);
        let _ = PackageReader::new(Cursor::new(bytes));
    }
}
