use akpk::codec::{Codec, DeflateCodec, ZstdCodec};
use akpk::crypto::bogocrypt::Bogocrypt;
use akpk::io_stream::{PackOptions, PackageReader, PackageWriter};
use akpk::CompressionScheme;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::io::Cursor;

fn sample(len: usize) -> Vec<u8> {
    b"MESH vertex index payload ".iter().copied().cycle().take(len).collect()
}

fn bench_compression(c: &mut Criterion) {
    let data = sample(1024 * 1024);

    c.bench_function("zstd_compress_1mb", |b| {
        b.iter(|| {
            let mut out = Vec::new();
            ZstdCodec.compress(&mut Cursor::new(black_box(&data)), &mut out, 3).unwrap();
            out
        })
    });
    c.bench_function("deflate_compress_1mb", |b| {
        b.iter(|| {
            let mut out = Vec::new();
            DeflateCodec.compress(&mut Cursor::new(black_box(&data)), &mut out, 9).unwrap();
            out
        })
    });
}

fn bench_pack_and_read(c: &mut Criterion) {
    let data = sample(1024 * 1024);

    c.bench_function("pack_1mb_zstd", |b| {
        b.iter(|| {
            let mut writer = PackageWriter::new(Cursor::new(Vec::new()), PackOptions::default(), 1).unwrap();
            writer.add_resource_bytes(1, black_box(&data), CompressionScheme::Zstd).unwrap();
            writer.finish().unwrap()
        })
    });

    let mut writer = PackageWriter::new(Cursor::new(Vec::new()), PackOptions::default(), 1).unwrap();
    writer.add_resource_bytes(1, &data, CompressionScheme::Zstd).unwrap();
    let bytes = writer.finish().unwrap().into_inner();

    c.bench_function("read_1mb_zstd", |b| {
        b.iter(|| {
            let mut reader = PackageReader::new(Cursor::new(black_box(&bytes))).unwrap();
            let r = reader.resources()[0];
            reader.read_resource(&r).unwrap()
        })
    });
}

fn bench_directory_obfuscation(c: &mut Criterion) {
    let seed = [0x5Au8; 128];
    let mut directory = vec![0u8; 48 * 10_000];

    c.bench_function("legacy_key_derivation", |b| b.iter(|| Bogocrypt::new(black_box(&seed))));

    let crypt = Bogocrypt::new(&seed);
    c.bench_function("legacy_xor_10k_records", |b| b.iter(|| crypt.apply(black_box(&mut directory))));
}

criterion_group!(benches, bench_compression, bench_pack_and_read, bench_directory_obfuscation);
criterion_main!(benches);
