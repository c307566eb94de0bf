use adas::{AdasConfig, AdasModule, SignClassifier};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};
use inference_engine::{InferenceError, LabelSet, SignModel};

struct ConstModel;

impl SignModel for ConstModel {
    fn predict(&self, _descriptor: &[f32]) -> Result<i64, InferenceError> {
        Ok(1)
    }
}

fn road_scene() -> RgbImage {
    let mut frame = RgbImage::from_pixel(720, 480, Rgb([70, 70, 75]));
    for dx in 0..5 {
        let dx = dx as f32;
        draw_line_segment_mut(&mut frame, (380.0 + dx, 470.0), (470.0 + dx, 330.0), Rgb([240, 240, 240]));
        draw_line_segment_mut(&mut frame, (490.0 + dx, 330.0), (690.0 + dx, 470.0), Rgb([240, 240, 240]));
    }
    draw_filled_circle_mut(&mut frame, (600, 120), 30, Rgb([30, 60, 210]));
    frame
}

fn bench_analyze(c: &mut Criterion) {
    let classifier = match SignClassifier::new(Box::new(ConstModel), LabelSet::default()) {
        Ok(classifier) => classifier,
        Err(e) => panic!("classifier: {}", e),
    };
    let mut adas = AdasModule::new(AdasConfig::default(), classifier);
    let frame = road_scene();
    let mut index = 0u64;

    c.bench_function("analyze_720x480", |b| {
        b.iter(|| {
            index += 1;
            black_box(adas.analyze(black_box(&frame), index, 8))
        })
    });
}

criterion_group!(benches, bench_analyze);
criterion_main!(benches);
