//! Turns pointer events into splats of force and dye.

use crate::grid;
use crate::rng;

/// Dye colors are attenuated because splats accumulate in the dye field.
const COLOR_INTENSITY: f32 = 0.06;
/// Press splats are brighter than drag splats.
const PRESS_BOOST: f32 = 6.0;
/// Range of the random impulse a press injects.
const PRESS_IMPULSE: [f32; 2] = [10.0, 30.0];

/// A Gaussian injection of force and dye centred on `point`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Splat {
    /// Normalised texture coordinates, origin at the bottom left.
    pub point: [f32; 2],
    pub force: [f32; 2],
    pub color: [f32; 3],
}

/// The latest pointer sample.
///
/// Written by the input handler and read once per frame. A newer move
/// overwrites an unread one.
#[derive(Clone, Debug, PartialEq)]
pub struct PointerState {
    pub texcoord: [f32; 2],
    pub prev_texcoord: [f32; 2],
    pub delta: [f32; 2],
    pub color: [f32; 3],
    pub moved: bool,
}

impl Default for PointerState {
    fn default() -> Self {
        Self::new()
    }
}

impl PointerState {
    pub fn new() -> Self {
        Self {
            texcoord: [0.0, 0.0],
            prev_texcoord: [0.0, 0.0],
            delta: [0.0, 0.0],
            color: generate_color(),
            moved: false,
        }
    }

    /// Records a move to `(client_x, client_y)`, in logical pixels from the
    /// top left of a surface whose backing store is `surface` device pixels.
    pub fn on_move(&mut self, client_x: f64, client_y: f64, pixel_ratio: f64, surface: (u32, u32)) {
        let Some(texcoord) = to_texcoord(client_x, client_y, pixel_ratio, surface) else {
            return;
        };
        let aspect_ratio = grid::aspect_ratio(surface.0, surface.1);

        self.prev_texcoord = self.texcoord;
        self.texcoord = texcoord;
        self.delta = [
            correct_delta_x(self.texcoord[0] - self.prev_texcoord[0], aspect_ratio),
            correct_delta_y(self.texcoord[1] - self.prev_texcoord[1], aspect_ratio),
        ];
        self.moved = self.delta[0].abs() > 0.0 || self.delta[1].abs() > 0.0;
    }

    /// Moves the pointer to the press location and returns a bright splat
    /// with a random impulse. The pending drag, if any, is left alone.
    pub fn on_press(
        &mut self,
        client_x: f64,
        client_y: f64,
        pixel_ratio: f64,
        surface: (u32, u32),
    ) -> Option<Splat> {
        let texcoord = to_texcoord(client_x, client_y, pixel_ratio, surface)?;
        self.texcoord = texcoord;

        let color = generate_color().map(|channel| channel * PRESS_BOOST);
        let force = [
            PRESS_IMPULSE[0] * rng::centered(),
            PRESS_IMPULSE[1] * rng::centered(),
        ];

        Some(Splat {
            point: texcoord,
            force,
            color,
        })
    }

    /// Consumes the pending move.
    pub fn take_splat(&mut self, splat_force: f32) -> Option<Splat> {
        if !self.moved {
            return None;
        }
        self.moved = false;

        Some(Splat {
            point: self.texcoord,
            force: [self.delta[0] * splat_force, self.delta[1] * splat_force],
            color: self.color,
        })
    }
}

fn to_texcoord(
    client_x: f64,
    client_y: f64,
    pixel_ratio: f64,
    (width, height): (u32, u32),
) -> Option<[f32; 2]> {
    if width == 0 || height == 0 {
        return None;
    }

    let x = (client_x * pixel_ratio).floor();
    let y = (client_y * pixel_ratio).floor();

    Some([
        (x / f64::from(width)) as f32,
        (1.0 - y / f64::from(height)) as f32,
    ])
}

pub fn correct_delta_x(delta: f32, aspect_ratio: f32) -> f32 {
    if aspect_ratio < 1.0 {
        delta * aspect_ratio
    } else {
        delta
    }
}

pub fn correct_delta_y(delta: f32, aspect_ratio: f32) -> f32 {
    if aspect_ratio > 1.0 {
        delta / aspect_ratio
    } else {
        delta
    }
}

/// Stretches the radius along x on landscape surfaces, so splats stay round.
pub fn correct_radius(radius: f32, aspect_ratio: f32) -> f32 {
    if aspect_ratio > 1.0 {
        radius * aspect_ratio
    } else {
        radius
    }
}

pub fn hsv_to_rgb(hue: f32, saturation: f32, value: f32) -> [f32; 3] {
    let sector = (hue * 6.0).floor();
    let f = hue * 6.0 - sector;
    let p = value * (1.0 - saturation);
    let q = value * (1.0 - f * saturation);
    let t = value * (1.0 - (1.0 - f) * saturation);

    match (sector as i32).rem_euclid(6) {
        0 => [value, t, p],
        1 => [q, value, p],
        2 => [p, value, t],
        3 => [p, q, value],
        4 => [t, p, value],
        _ => [value, p, q],
    }
}

pub fn generate_color() -> [f32; 3] {
    hsv_to_rgb(rng::gen::<f32>(), 1.0, 1.0).map(|channel| channel * COLOR_INTENSITY)
}
