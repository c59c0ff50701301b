//! Benchmarks for SMIL ingestion and the transform pipeline.
//!
//! Run with: cargo bench

use std::fmt::Write;
use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};

use folio::io::ByteStream;
use folio::smil::parse_overlay;
use folio::transform::ADOBE_OBFUSCATION;
use folio::{EncryptionDescriptor, Link, TransformContext, TransformPipeline};

const UUID: &str = "urn:uuid:0f3a2b4c-5d6e-4f70-8192-a3b4c5d6e7f8";

/// A chapter-sized SMIL document: `sections` sequences of 50 pars each.
fn sample_smil(sections: usize) -> String {
    let mut smil = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<smil xmlns="http://www.w3.org/ns/SMIL" xmlns:epub="http://www.idpf.org/2007/ops" version="3.0">
<body epub:textref="../text/c1.xhtml">"#,
    );
    let mut clock = 0.0f64;
    for s in 0..sections {
        let _ = write!(smil, r#"<seq id="s{s}" epub:textref="../text/c1.xhtml#s{s}">"#);
        for p in 0..50 {
            let _ = write!(
                smil,
                r#"<par id="p{s}_{p}"><text src="../text/c1.xhtml#w{s}_{p}"/><audio src="../audio/c1.mp3" clipBegin="{:.3}s" clipEnd="{:.3}s"/></par>"#,
                clock,
                clock + 1.5
            );
            clock += 1.5;
        }
        smil.push_str("</seq>");
    }
    smil.push_str("</body></smil>");
    smil
}

fn bench_parse_overlay(c: &mut Criterion) {
    let smil = sample_smil(40);
    c.bench_function("parse_overlay_2000_pars", |b| {
        b.iter(|| parse_overlay(black_box(smil.as_bytes()), "OEBPS/smil/c1.smil").unwrap());
    });
}

fn bench_deobfuscate(c: &mut Criterion) {
    let pipeline = TransformPipeline::with_builtins();
    let ctx = TransformContext::new(UUID);
    let link = Link::new("OEBPS/fonts/f.otf", "font/otf")
        .with_encryption(EncryptionDescriptor::new(ADOBE_OBFUSCATION));
    let font = vec![0xA5u8; 256 * 1024];

    c.bench_function("deobfuscate_256k_font", |b| {
        b.iter(|| {
            pipeline
                .decode_stream(&ctx, &link, ByteStream::from_bytes(font.clone()), None)
                .unwrap()
                .read_to_vec()
                .unwrap()
        });
    });
}

criterion_group!(benches, bench_parse_overlay, bench_deobfuscate);
criterion_main!(benches);
