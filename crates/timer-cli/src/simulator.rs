//! Synthetic track feed
//!
//! Stands in for the camera: a grey track with sensor noise, and one car per
//! lane that sweeps across its lane's finish-line band once per lap.

use frame_sampler::PixelRect;
use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use lap_engine::{LaneConfig, LaneId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::settings::SimulatorSettings;

const TRACK_LUMA: u8 = 70;
const CAR_WIDTH: u32 = 24;

#[derive(Debug, Clone)]
struct SimulatedCar {
    lane_id: LaneId,
    band: PixelRect,
    color: Rgba<u8>,
    lap_ms: u64,
}

/// Renders frames of a track with cars on the enabled lanes
pub struct TrackSimulator {
    width: u32,
    height: u32,
    pass_ms: u64,
    noise: u8,
    cars: Vec<SimulatedCar>,
    race_start_ms: Option<u64>,
    rng: StdRng,
}

fn parse_color(token: &str) -> Rgba<u8> {
    let hex = token.trim_start_matches('#');
    let channel = |i: usize| {
        hex.get(i..i + 2)
            .and_then(|s| u8::from_str_radix(s, 16).ok())
            .unwrap_or(255)
    };
    Rgba([channel(0), channel(2), channel(4), 255])
}

impl TrackSimulator {
    pub fn new(settings: &SimulatorSettings, lanes: &[LaneConfig]) -> Self {
        let width = settings.width.max(1);
        let height = settings.height.max(1);
        let cars = lanes
            .iter()
            .filter(|l| l.enabled)
            .enumerate()
            .map(|(i, lane)| SimulatedCar {
                lane_id: lane.id,
                band: lane.region.pixel_bounds(width, height),
                color: parse_color(&lane.color),
                lap_ms: settings
                    .lap_ms
                    .get(i)
                    .copied()
                    .unwrap_or(2_500 + 250 * i as u64)
                    .max(settings.pass_ms + 1),
            })
            .collect();

        Self {
            width,
            height,
            pass_ms: settings.pass_ms.max(1),
            noise: settings.noise,
            cars,
            race_start_ms: None,
            rng: StdRng::seed_from_u64(settings.seed),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Cars start driving at `now_ms`; before that the track is clear
    pub fn start(&mut self, now_ms: u64) {
        self.race_start_ms = Some(now_ms);
    }

    pub fn stop(&mut self) {
        self.race_start_ms = None;
    }

    /// Left edge of a lane's car at `now_ms`, if on screen
    fn car_x(&self, car: &SimulatedCar, now_ms: u64) -> Option<i32> {
        let start = self.race_start_ms?;
        let t = now_ms.checked_sub(start)?;
        // The car reaches the frame centre exactly at each whole lap
        let phase = (t + self.pass_ms / 2) % car.lap_ms;
        if t + self.pass_ms / 2 < car.lap_ms || phase >= self.pass_ms {
            return None;
        }
        let travel = (self.width + CAR_WIDTH) as f64;
        Some((phase as f64 / self.pass_ms as f64 * travel) as i32 - CAR_WIDTH as i32)
    }

    /// Lane ids whose car is currently on screen
    pub fn visible_cars(&self, now_ms: u64) -> Vec<LaneId> {
        self.cars
            .iter()
            .filter(|car| self.car_x(car, now_ms).is_some())
            .map(|car| car.lane_id)
            .collect()
    }

    pub fn render(&mut self, now_ms: u64) -> RgbaImage {
        let half = i16::from(self.noise / 2);
        let mut frame = RgbaImage::new(self.width, self.height);
        for pixel in frame.pixels_mut() {
            let jitter = if half > 0 {
                self.rng.gen_range(-half..=half)
            } else {
                0
            };
            let v = (i16::from(TRACK_LUMA) + jitter).clamp(0, 255) as u8;
            *pixel = Rgba([v, v, v, 255]);
        }

        for car in &self.cars {
            if let Some(x) = self.car_x(car, now_ms) {
                let rect = Rect::at(x, car.band.y as i32).of_size(CAR_WIDTH, car.band.height.max(1));
                draw_filled_rect_mut(&mut frame, rect, car.color);
            }
        }
        frame
    }
}
