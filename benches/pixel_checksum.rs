use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image_preservation_rs::image_pipeline::validation::generate_pixel_checksum_as;
use image_preservation_rs::image_pipeline::{check_visually_identical, generate_pixel_checksum, StreamEncoding};
use std::fs::File;
use std::path::{Path, PathBuf};
use tiff::encoder::{colortype, TiffEncoder};

fn generate_mock_pixels(width: u32, height: u32, channels: u32) -> Vec<u8> {
    let mut data = Vec::with_capacity((width * height * channels) as usize);
    for y in 0..height {
        for x in 0..width {
            for c in 0..channels {
                data.push(((x * 7 + y * 3 + c * 50) % 256) as u8);
            }
        }
    }
    data
}

fn write_rgb(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    let data = generate_mock_pixels(width, height, 3);
    TiffEncoder::new(File::create(&path).unwrap())
        .unwrap()
        .write_image::<colortype::RGB8>(width, height, &data)
        .unwrap();
    path
}

/// Greyscale holding only black and white, as a bitonal source expands to.
fn write_black_and_white(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    let data: Vec<u8> = (0..width * height).map(|i| if (i / 3) % 2 == 0 { 0 } else { 255 }).collect();
    TiffEncoder::new(File::create(&path).unwrap())
        .unwrap()
        .write_image::<colortype::Gray8>(width, height, &data)
        .unwrap();
    path
}

fn benchmark_checksum_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("checksum_by_size");
    let dir = tempfile::tempdir().unwrap();

    let sizes = vec![
        (256, 256, "256x256"),
        (1024, 1024, "1024x1024"),
        (2048, 2048, "2048x2048"),
    ];

    for (width, height, label) in sizes {
        let path = write_rgb(dir.path(), &format!("{label}.tif"), width, height);
        group.bench_with_input(BenchmarkId::from_parameter(label), &path, |b, path| {
            b.iter(|| generate_pixel_checksum(black_box(path)).unwrap());
        });
    }

    group.finish();
}

fn benchmark_bitonal_repack(c: &mut Criterion) {
    let mut group = c.benchmark_group("bitonal_repack");
    let dir = tempfile::tempdir().unwrap();
    let path = write_black_and_white(dir.path(), "grey.tif", 2048, 2048);

    group.bench_function("greyscale_native", |b| {
        b.iter(|| generate_pixel_checksum(black_box(&path)).unwrap());
    });

    group.bench_function("greyscale_as_bilevel", |b| {
        b.iter(|| generate_pixel_checksum_as(black_box(&path), StreamEncoding::Bilevel).unwrap());
    });

    group.finish();
}

fn benchmark_verification(c: &mut Criterion) {
    let mut group = c.benchmark_group("verification");
    let dir = tempfile::tempdir().unwrap();
    let source = write_rgb(dir.path(), "source.tif", 1024, 1024);
    let converted = write_rgb(dir.path(), "converted.tif", 1024, 1024);
    let precomputed = generate_pixel_checksum(&source).unwrap();

    group.bench_function("both_checksums", |b| {
        b.iter(|| check_visually_identical(black_box(&source), black_box(&converted), None).unwrap());
    });

    group.bench_function("precomputed_source", |b| {
        b.iter(|| check_visually_identical(black_box(&source), black_box(&converted), Some(&precomputed)).unwrap());
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_checksum_sizes,
    benchmark_bitonal_repack,
    benchmark_verification
);
criterion_main!(benches);
