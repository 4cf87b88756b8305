//! Performance benchmarks for documentation parsing and marshalling
//!
//! These benchmarks run the integration test fixtures under `tests/docs` to measure:
//! - Single block parsing (strict and loose grammar alternatives)
//! - Whole-corpus compilation (unit splitting, parsing, assembly)
//! - Client rendering
//! - Record to property-map conversion
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use docbind_core::{
    compiler::ApiCompiler,
    generator::Generator,
    marshal::{from_map, to_map},
    parser::{BlockKind, BlockParsers, ParsePolicy, SpecBlock},
    property_record,
    variant::{ObjectPath, PropertyMap},
};
use std::path::PathBuf;

fn docs_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/docs")
}

fn bench_block_parsers(c: &mut Criterion) {
    let parsers = BlockParsers::new().unwrap();
    let strict = SpecBlock::new(
        BlockKind::Property,
        "uint16 Volume [readwrite]\n\n        Indicates volume level of the transport.",
    );
    let loose = SpecBlock::new(
        BlockKind::Property,
        "dict Options\n\n        Options without a flag list.",
    );
    let method = SpecBlock::new(
        BlockKind::Method,
        "fd, uint16, uint16 Acquire()\n\n        Acquire transport file descriptor.\n\n        Possible Errors: org.bluez.Error.NotAuthorized\n                         org.bluez.Error.Failed",
    );

    c.bench_function("parse_property_strict", |b| {
        b.iter(|| parsers.parse(black_box(&strict)).unwrap())
    });
    c.bench_function("parse_property_loose", |b| {
        b.iter(|| parsers.parse(black_box(&loose)).unwrap())
    });
    c.bench_function("parse_method", |b| {
        b.iter(|| parsers.parse(black_box(&method)).unwrap())
    });
}

fn bench_compile_corpus(c: &mut Criterion) {
    c.bench_function("compile_corpus", |b| {
        b.iter(|| {
            let mut compiler = ApiCompiler::new(ParsePolicy::SkipMalformed).unwrap();
            compiler.add_dir(docs_dir()).unwrap();
            compiler.finish().unwrap()
        })
    });

    let mut compiler = ApiCompiler::new(ParsePolicy::SkipMalformed).unwrap();
    compiler.add_dir(docs_dir()).unwrap();
    let api = compiler.finish().unwrap().api;
    let generator = Generator::new();
    c.bench_function("render_corpus", |b| {
        b.iter(|| {
            for model in api.interfaces.iter() {
                black_box(generator.render(model).unwrap());
            }
        })
    });
}

property_record! {
    #[derive(Debug, Clone, Default, PartialEq)]
    struct Device {
        #[property("Address")]
        address: String,
        #[property("Adapter")]
        adapter: ObjectPath,
        #[property("RSSI", "omitEmpty")]
        rssi: i16,
        #[property("UUIDs")]
        uuids: Vec<String>,
        #[property("ManufacturerData", "omitEmpty")]
        manufacturer_data: PropertyMap,
        #[property("Trusted", "writable")]
        trusted: bool,
    }
}

fn bench_marshal(c: &mut Criterion) {
    let device = Device {
        address: "00:11:22:33:44:55".to_string(),
        adapter: ObjectPath::new("/org/bluez/hci0"),
        rssi: -61,
        uuids: vec!["0000110b-0000-1000-8000-00805f9b34fb".to_string(); 4],
        trusted: true,
        ..Default::default()
    };
    let map = to_map(&device);

    c.bench_function("to_map", |b| b.iter(|| to_map(black_box(&device))));
    c.bench_function("from_map", |b| {
        b.iter(|| from_map::<Device>(black_box(&map)).unwrap())
    });
}

criterion_group!(benches, bench_block_parsers, bench_compile_corpus, bench_marshal);
criterion_main!(benches);
