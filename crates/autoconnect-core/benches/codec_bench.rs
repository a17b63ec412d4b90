//! Criterion benchmarks for the handshake codec.
//!
//! Run with:
//! ```bash
//! cargo bench --package autoconnect-core --bench codec_bench
//! ```

use autoconnect_core::protocol::{decode_message, encode_message, Command, HandshakeMessage};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn make_message(command: Command) -> HandshakeMessage {
    let mut msg = HandshakeMessage::new(command);
    msg.mac_address = "3C-22-FB-10-20-30".to_string();
    msg.vpn_ip = "10.1.1.5".to_string();
    msg.vpn_netmask = "255.255.255.0".to_string();
    msg.public_key = "HIgo9xNzJMWLKASShiTqIybxZ0U3wGLiUeJ1PKf8ykw=".to_string();
    msg.endpoint_ip = "203.0.113.1".to_string();
    msg.endpoint_port = "51820".to_string();
    msg.allowed_ips = "10.1.0.0/16,192.168.0.0/16".to_string();
    msg
}

fn bench_encode(c: &mut Criterion) {
    let messages = [
        ("Hello", make_message(Command::Hello)),
        ("Ping", make_message(Command::Ping)),
        ("Bye", HandshakeMessage::new(Command::Bye)),
    ];

    let mut group = c.benchmark_group("encode_message");
    for (name, msg) in &messages {
        group.bench_with_input(BenchmarkId::new("msg", name), msg, |b, msg| {
            b.iter(|| encode_message(black_box(msg)).expect("encode must succeed"))
        });
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let messages = [
        ("Ok", make_message(Command::Ok)),
        ("Unknown", make_message(Command::Unknown("MAINTENANCE".to_string()))),
    ];

    let mut group = c.benchmark_group("decode_message");
    for (name, msg) in &messages {
        let mut bytes = encode_message(msg).expect("encode must succeed for benchmark setup");
        // Replies arrive in a zero-filled 1024-byte buffer.
        bytes.resize(1024, 0);
        group.bench_with_input(BenchmarkId::new("msg", name), &bytes, |b, bytes| {
            b.iter(|| decode_message(black_box(bytes)).expect("decode must succeed"))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
