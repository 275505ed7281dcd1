use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use criterion::{Criterion, criterion_group, criterion_main};
use csv_sqlgen::convert::{ConversionOptions, convert};
use tempfile::TempDir;

fn generate_orders(rows: usize) -> (TempDir, PathBuf) {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let csv_path = temp_dir.path().join("orders.csv");
    let mut file = File::create(&csv_path).expect("create csv");
    writeln!(file, "id,ordered_at,amount,status,note").expect("header");
    for i in 0..rows {
        let status = match i % 3 {
            0 => "shipped",
            1 => "pending",
            _ => "processing",
        };
        let day = (i % 28) + 1;
        let hour = i % 24;
        writeln!(
            file,
            "{i},2024-01-{day:02} {hour:02}:00:00,{}.{:02},{status},it's #{i}",
            i % 500,
            i % 100
        )
        .expect("row");
    }
    (temp_dir, csv_path)
}

fn bench_convert(c: &mut Criterion) {
    let (_dir, csv_path) = generate_orders(20_000);
    let mut group = c.benchmark_group("convert");
    group.sample_size(20);

    group.bench_function("plain", |b| {
        let options = ConversionOptions::new(&csv_path);
        b.iter(|| convert(&options).expect("convert"));
    });

    group.bench_function("lookup_and_id", |b| {
        let mut options = ConversionOptions::new(&csv_path);
        options.overrides.lookup_column = Some("status".into());
        options.overrides.add_id = true;
        b.iter(|| convert(&options).expect("convert"));
    });

    group.finish();
}

criterion_group!(benches, bench_convert);
criterion_main!(benches);
