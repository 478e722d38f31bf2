//! Performance benchmarks for the realtime speech client
//!
//! Run with: cargo bench
//! Or for specific benchmarks: cargo bench -- <filter>

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use std::time::Duration;

use speech_realtime::core::credentials::{ApiKeySigner, RequestSigner};
use speech_realtime::core::realtime::{
    CustomizationInference, RealtimeMessage, RealtimeParameters, SendFinalResultMessage,
};

const TEST_KEY: &[u8] = include_bytes!("../tests/fixtures/keys/test_rsa_key.pem");

/// Benchmark inbound frame parsing
fn bench_message_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("message_parsing");
    group.measurement_time(Duration::from_secs(5));

    let ack = r#"{"event":"ACKAUDIO","sessionId":"s-1","details":{"sequenceNumber":42,"length":3200,"offset":131200}}"#;

    let partial = r#"{"event":"RESULT","sessionId":"s-1","transcriptions":[{"transcription":"hello there","isFinal":false,"startTimeInMs":0,"endTimeInMs":900,"confidence":0.61,"tokens":[]}]}"#;

    // Final result with per-token timing
    let tokens: Vec<String> = (0..40)
        .map(|i| {
            format!(
                r#"{{"token":"word{i}","startTimeInMs":{},"endTimeInMs":{},"confidence":0.9,"type":"WORD"}}"#,
                i * 250,
                i * 250 + 200
            )
        })
        .collect();
    let final_result = format!(
        r#"{{"event":"RESULT","sessionId":"s-1","transcriptions":[{{"transcription":"{}","isFinal":true,"startTimeInMs":0,"endTimeInMs":10000,"confidence":0.93,"tokens":[{}]}}]}}"#,
        (0..40).map(|i| format!("word{i}")).collect::<Vec<_>>().join(" "),
        tokens.join(",")
    );

    let unknown = r#"{"event":"SOMETHINGNEW","sessionId":"s-1"}"#;

    for (name, frame) in [
        ("ack", ack.to_string()),
        ("partial", partial.to_string()),
        ("final_40_tokens", final_result),
        ("unknown", unknown.to_string()),
    ] {
        group.throughput(Throughput::Bytes(frame.len() as u64));
        group.bench_with_input(BenchmarkId::new(name, frame.len()), &frame, |b, frame| {
            b.iter(|| RealtimeMessage::parse(black_box(frame)));
        });
    }

    group.finish();
}

/// Benchmark outbound control frame serialization
fn bench_message_serialization(c: &mut Criterion) {
    let mut group = c.benchmark_group("message_serialization");

    let request = SendFinalResultMessage::default();
    group.bench_function("send_final_result", |b| {
        b.iter(|| black_box(&request).to_json());
    });

    group.finish();
}

/// Benchmark session URL construction
fn bench_url_building(c: &mut Criterion) {
    let mut group = c.benchmark_group("url_building");
    let endpoint = "wss://realtime.aiservice.us-phoenix-1.oci.oraclecloud.com/";

    let standard = RealtimeParameters::standard();
    group.bench_function("standard", |b| {
        b.iter(|| black_box(&standard).build_url(black_box(endpoint)));
    });

    let customized = RealtimeParameters {
        is_ack_enabled: Some(true),
        partial_silence_threshold_in_ms: Some(200),
        final_silence_threshold_in_ms: Some(1000),
        customizations: Some(
            (0..5)
                .map(|i| CustomizationInference {
                    compartment_id: Some("ocid1.compartment.oc1..bench".to_string()),
                    customization_alias: Some(format!("vocab-{i}")),
                    ..CustomizationInference::new(format!("ocid1.customization.oc1..{i}"))
                })
                .collect(),
        ),
        ..RealtimeParameters::standard()
    };
    group.bench_function("five_customizations", |b| {
        b.iter(|| black_box(&customized).build_url(black_box(endpoint)));
    });

    group.finish();
}

/// Benchmark RSA request signing for the credential frame
fn bench_request_signing(c: &mut Criterion) {
    let mut group = c.benchmark_group("request_signing");
    group.measurement_time(Duration::from_secs(10));

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => panic!("Failed to build runtime: {e}"),
    };
    let signer = match ApiKeySigner::new("tenancy", "user", "aa:bb", TEST_KEY) {
        Ok(signer) => signer,
        Err(e) => panic!("Failed to load benchmark key: {e}"),
    };
    let request = match http::Request::get(
        "wss://realtime.aiservice.us-phoenix-1.oci.oraclecloud.com/",
    )
    .body(())
    {
        Ok(request) => request,
        Err(e) => panic!("Failed to build request: {e}"),
    };

    group.bench_function("api_key_rs256", |b| {
        b.to_async(&runtime).iter(|| signer.sign(black_box(&request)));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_message_parsing,
    bench_message_serialization,
    bench_url_building,
    bench_request_signing,
);

criterion_main!(benches);
