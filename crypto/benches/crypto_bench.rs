use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn ed25519_sign_bench(c: &mut Criterion) {
    let kp = pof_crypto::generate_keypair();
    let msg = [42u8; 32];

    c.bench_function("ed25519_sign_32B", |b| {
        b.iter(|| pof_crypto::sign_message(black_box(&msg), &kp))
    });
}

fn ed25519_verify_bench(c: &mut Criterion) {
    let kp = pof_crypto::generate_keypair();
    let msg = [42u8; 32];
    let sig = pof_crypto::sign_message(&msg, &kp);

    c.bench_function("ed25519_verify_32B", |b| {
        b.iter(|| pof_crypto::verify_signature(black_box(&msg), &sig))
    });
}

fn blake2b_256_bench(c: &mut Criterion) {
    let data = [0xABu8; 256];

    c.bench_function("blake2b_256_256B", |b| {
        b.iter(|| pof_crypto::blake2b_256(black_box(&data)))
    });
}

fn double_hash_bench(c: &mut Criterion) {
    let data = vec![0xCDu8; 1024];

    c.bench_function("double_hash_1KB", |b| {
        b.iter(|| pof_crypto::double_hash(black_box(&data)))
    });
}

criterion_group!(
    benches,
    ed25519_sign_bench,
    ed25519_verify_bench,
    blake2b_256_bench,
    double_hash_bench
);
criterion_main!(benches);
