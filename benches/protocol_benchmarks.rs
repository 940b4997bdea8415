// ABOUTME: Benchmark suite for the pure protocol paths of the modem engine
// ABOUTME: Measures response line classification, response filtering and incoming text decoding

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use gsmmodem::encoding::decode_incoming_text;
use gsmmodem::filter::filter_response;
use gsmmodem::response::classify;
use std::time::Duration;

fn sample_response(notifications: usize) -> Vec<String> {
    let mut lines = vec![
        "AT+CSQ".to_string(),
        String::new(),
        "+WIND: 4".to_string(),
        "+CSQ: 20,99".to_string(),
    ];
    for i in 0..notifications {
        lines.push(format!("+CMT: \"+1555{i:04}\",,\"23/06/01,10:00:00-04\""));
        lines.push(format!("Message body number {i}"));
        lines.push(String::new());
    }
    lines
}

fn benchmark_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify");

    for line in [
        "OK",
        "ERROR",
        "+CMS ERROR: 515",
        "+CMT: \"+15551234\",,\"23/06/01,10:00:00-04\"",
        "Just some message content",
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(line), line, |b, line| {
            b.iter(|| black_box(classify(black_box(line))))
        });
    }

    group.finish();
}

fn benchmark_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_response");

    for count in [0usize, 1, 10, 50] {
        let lines = sample_response(count);
        group.bench_with_input(BenchmarkId::new("notifications", count), &lines, |b, lines| {
            b.iter(|| black_box(filter_response("AT+CSQ", black_box(lines.clone()))))
        });
    }

    group.finish();
}

fn benchmark_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_incoming_text");

    let plain = "Hello there, this is a plain text message";
    let hex: String = "Hello there, this is a hex encoded message"
        .encode_utf16()
        .map(|unit| format!("{unit:04X}"))
        .collect();

    group.bench_function("plain", |b| {
        b.iter(|| black_box(decode_incoming_text(black_box(plain))))
    });
    group.bench_function("ucs2_hex", |b| {
        b.iter(|| black_box(decode_incoming_text(black_box(&hex))))
    });

    group.finish();
}

criterion_group!(
    name = benches;
    config = Criterion::default().measurement_time(Duration::from_secs(5));
    targets = benchmark_classify, benchmark_filter, benchmark_decode
);
criterion_main!(benches);
