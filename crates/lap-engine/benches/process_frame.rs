use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{Rgba, RgbaImage};
use lap_engine::{LapEngine, TrackConfig};

const W: u32 = 640;
const H: u32 = 480;

fn frames() -> (RgbaImage, RgbaImage) {
    let dark = RgbaImage::from_pixel(W, H, Rgba([20, 20, 20, 255]));
    let mut lit = dark.clone();
    for y in 0..H {
        for x in (W / 2)..(W / 2 + 40) {
            lit.put_pixel(x, y, Rgba([230, 40, 40, 255]));
        }
    }
    (dark, lit)
}

fn criterion_benchmark(c: &mut Criterion) {
    let (dark, lit) = frames();

    c.bench_function("process_frame_4_lanes_racing", |b| {
        let mut track = TrackConfig::default();
        track.lanes = TrackConfig::default_lanes(4);
        let mut engine = LapEngine::new(track).unwrap();
        engine.start_race(0);
        let mut now = 0u64;
        b.iter(|| {
            now += 33;
            let frame = if (now / 33) % 2 == 0 { &dark } else { &lit };
            black_box(engine.process_frame(black_box(frame), now));
        });
    });

    c.bench_function("process_rgba_2_lanes_idle", |b| {
        let mut engine = LapEngine::new(TrackConfig::default()).unwrap();
        let raw = dark.as_raw().clone();
        let mut now = 0u64;
        b.iter(|| {
            now += 33;
            black_box(engine.process_rgba(black_box(&raw), W, H, now).unwrap());
        });
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
