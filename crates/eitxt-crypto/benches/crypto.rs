use eitxt_core::Compression;
use eitxt_crypto::{
    build_aad, compress, decrypt_all, decrypt_chunk, derive_key, encrypt_all, encrypt_chunk,
    KdfParams, Key, PayloadMetadata,
};
use secrecy::SecretString;

fn make_data(size: usize) -> Vec<u8> {
    (0..size)
        .map(|i| (i.wrapping_mul(7) ^ (i >> 3)) as u8)
        .collect()
}

fn meta(size: usize) -> PayloadMetadata {
    PayloadMetadata::new("image/png", "bench.png", size as u64, Compression::None)
}

#[divan::bench(args = [1024, 65536, 1048576])]
fn bench_encrypt_chunk(bencher: divan::Bencher, size: usize) {
    let key = Key::from_bytes([0xABu8; 32]);
    let aad = build_aad(&meta(size));
    let data = make_data(size);
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| {
            encrypt_chunk(
                divan::black_box(&key),
                0,
                divan::black_box(&aad),
                divan::black_box(&data),
            )
            .unwrap()
        });
}

#[divan::bench(args = [1024, 65536, 1048576])]
fn bench_decrypt_chunk(bencher: divan::Bencher, size: usize) {
    let key = Key::from_bytes([0xABu8; 32]);
    let aad = build_aad(&meta(size));
    let data = make_data(size);
    let record = encrypt_chunk(&key, 0, &aad, &data).unwrap();
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| {
            decrypt_chunk(
                divan::black_box(&key),
                divan::black_box(&aad),
                divan::black_box(&record),
            )
            .unwrap()
        });
}

#[divan::bench(args = [4 * 1048576, 16 * 1048576])]
fn bench_container_round_trip(bencher: divan::Bencher, size: usize) {
    let key = Key::from_bytes([0x11u8; 32]);
    let data = make_data(size);
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| {
            let container = encrypt_all(
                divan::black_box(&data),
                &key,
                KdfParams::generate(1),
                meta(size),
                1 << 20,
            )
            .unwrap();
            decrypt_all(&container, &key).unwrap()
        });
}

#[divan::bench(args = [65536, 1048576])]
fn bench_gzip(bencher: divan::Bencher, size: usize) {
    let data = make_data(size);
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| compress::compress(divan::black_box(&data)).unwrap());
}

#[divan::bench(sample_count = 10)]
fn bench_pbkdf2_default_iterations() -> Key {
    let passphrase = SecretString::from("correct horse battery staple");
    derive_key(
        divan::black_box(&passphrase),
        &[7u8; 16],
        eitxt_crypto::DEFAULT_ITERATIONS,
    )
}

fn main() {
    divan::main();
}
