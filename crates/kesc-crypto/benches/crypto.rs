use kesc_crypto::{generate_session_key, open, seal, Derived, Secret};

fn make_data(size: usize) -> Vec<u8> {
    (0..size)
        .map(|i| (i.wrapping_mul(7) ^ (i >> 3)) as u8)
        .collect()
}

#[divan::bench(args = [1024, 65536, 1048576])]
fn bench_seal(bencher: divan::Bencher, size: usize) {
    let key = generate_session_key();
    let data = make_data(size);
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| seal(divan::black_box(key.as_bytes()), divan::black_box(&data)).unwrap());
}

#[divan::bench(args = [1024, 65536, 1048576])]
fn bench_open(bencher: divan::Bencher, size: usize) {
    let key = generate_session_key();
    let data = make_data(size);
    let envelope = seal(key.as_bytes(), &data).unwrap();
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| open(divan::black_box(key.as_bytes()), divan::black_box(&envelope)).unwrap());
}

#[divan::bench(args = [1024, 1048576])]
fn bench_derive(bencher: divan::Bencher, size: usize) {
    let secret = Secret::new(b"benchmark-secret").unwrap();
    let data = make_data(size);
    bencher.bench(|| Derived::new(divan::black_box(&data), divan::black_box(&secret)));
}

fn main() {
    divan::main();
}
