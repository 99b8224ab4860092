//! A CPU rasterizer for the fluid passes, so the simulation can be checked
//! without a graphics context.
//!
//! Every pass evaluates the same expressions as its fragment shader at each
//! texel centre. Sampling clamps to the edge like the GPU textures do.

use crate::pointer::Splat;
use crate::render::PingPong;
use crate::stepper::FluidPasses;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Filter {
    Nearest,
    Linear,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    pub width: usize,
    pub height: usize,
    pub filter: Filter,
    pub data: Vec<[f32; 4]>,
}

impl Field {
    pub fn new(width: usize, height: usize, filter: Filter) -> Self {
        Self {
            width,
            height,
            filter,
            data: vec![[0.0; 4]; width * height],
        }
    }

    pub fn texel_size(&self) -> [f32; 2] {
        [1.0 / self.width as f32, 1.0 / self.height as f32]
    }

    pub fn texel(&self, x: i64, y: i64) -> [f32; 4] {
        let x = x.clamp(0, self.width as i64 - 1) as usize;
        let y = y.clamp(0, self.height as i64 - 1) as usize;
        self.data[y * self.width + x]
    }

    pub fn sample(&self, uv: [f32; 2]) -> [f32; 4] {
        let s = uv[0] * self.width as f32;
        let t = uv[1] * self.height as f32;

        match self.filter {
            Filter::Nearest => self.texel(s.floor() as i64, t.floor() as i64),
            Filter::Linear => {
                let s = s - 0.5;
                let t = t - 0.5;
                let (x, y) = (s.floor(), t.floor());
                let (fx, fy) = (s - x, t - y);
                let (x, y) = (x as i64, y as i64);

                let a = self.texel(x, y);
                let b = self.texel(x + 1, y);
                let c = self.texel(x, y + 1);
                let d = self.texel(x + 1, y + 1);

                let mut out = [0.0; 4];
                for i in 0..4 {
                    let bottom = a[i] + (b[i] - a[i]) * fx;
                    let top = c[i] + (d[i] - c[i]) * fx;
                    out[i] = bottom + (top - bottom) * fy;
                }
                out
            }
        }
    }

    /// Overwrites every texel with `f` evaluated at the texel's centre.
    pub fn fill<F>(&mut self, mut f: F)
    where
        F: FnMut([f32; 2]) -> [f32; 4],
    {
        for y in 0..self.height {
            for x in 0..self.width {
                let uv = [
                    (x as f32 + 0.5) / self.width as f32,
                    (y as f32 + 0.5) / self.height as f32,
                ];
                self.data[y * self.width + x] = f(uv);
            }
        }
    }

    pub fn luminance(&self) -> f32 {
        self.data.iter().map(|t| t[0] + t[1] + t[2]).sum()
    }
}

/// Neighbour coordinates, as the shared vertex stage computes them.
struct Stencil {
    uv: [f32; 2],
    l: [f32; 2],
    r: [f32; 2],
    t: [f32; 2],
    b: [f32; 2],
}

impl Stencil {
    fn new(uv: [f32; 2], texel_size: [f32; 2]) -> Self {
        Self {
            uv,
            l: [uv[0] - texel_size[0], uv[1]],
            r: [uv[0] + texel_size[0], uv[1]],
            t: [uv[0], uv[1] + texel_size[1]],
            b: [uv[0], uv[1] - texel_size[1]],
        }
    }
}

pub struct Rasterizer {
    pub velocity: PingPong<Field>,
    pub dye: PingPong<Field>,
    pub pressure: PingPong<Field>,
    pub divergence: Field,
    pub curl: Field,
    pub aspect_ratio: f32,
}

fn double(width: usize, height: usize, filter: Filter) -> PingPong<Field> {
    PingPong::new(
        Field::new(width, height, filter),
        Field::new(width, height, filter),
    )
}

impl Rasterizer {
    pub fn new(sim: (usize, usize), dye: (usize, usize)) -> Self {
        Self {
            velocity: double(sim.0, sim.1, Filter::Linear),
            dye: double(dye.0, dye.1, Filter::Linear),
            pressure: double(sim.0, sim.1, Filter::Nearest),
            divergence: Field::new(sim.0, sim.1, Filter::Nearest),
            curl: Field::new(sim.0, sim.1, Filter::Nearest),
            aspect_ratio: sim.0 as f32 / sim.1 as f32,
        }
    }

    fn texel_size(&self) -> [f32; 2] {
        self.velocity.read().texel_size()
    }
}

fn splat_into(
    field: &mut PingPong<Field>,
    splat: &Splat,
    color: [f32; 3],
    radius: f32,
    aspect_ratio: f32,
) {
    let (read, write) = split(field);
    write.fill(|uv| {
        let p = [(uv[0] - splat.point[0]) * aspect_ratio, uv[1] - splat.point[1]];
        let falloff = (-(p[0] * p[0] + p[1] * p[1]) / radius).exp();
        let base = read.sample(uv);
        [
            base[0] + falloff * color[0],
            base[1] + falloff * color[1],
            base[2] + falloff * color[2],
            1.0,
        ]
    });
    field.swap();
}

// Both members of a pair at once, for passes that read one and write the other.
fn split(field: &mut PingPong<Field>) -> (Field, &mut Field) {
    let read = field.read().clone();
    (read, field.write_mut())
}

impl FluidPasses for Rasterizer {
    fn splat(&mut self, splat: &Splat, radius: f32) {
        let force = [splat.force[0], splat.force[1], 0.0];
        splat_into(&mut self.velocity, splat, force, radius, self.aspect_ratio);
        splat_into(&mut self.dye, splat, splat.color, radius, self.aspect_ratio);
    }

    fn compute_curl(&mut self) {
        let texel_size = self.texel_size();
        let velocity = self.velocity.read();
        self.curl.fill(|uv| {
            let s = Stencil::new(uv, texel_size);
            let l = velocity.sample(s.l)[1];
            let r = velocity.sample(s.r)[1];
            let t = velocity.sample(s.t)[0];
            let b = velocity.sample(s.b)[0];
            [0.5 * (r - l - t + b), 0.0, 0.0, 1.0]
        });
    }

    fn confine_vorticity(&mut self, curl_strength: f32, timestep: f32) {
        let texel_size = self.texel_size();
        let curl = &self.curl;
        let (velocity, write) = split(&mut self.velocity);
        write.fill(|uv| {
            let s = Stencil::new(uv, texel_size);
            let l = curl.sample(s.l)[0];
            let r = curl.sample(s.r)[0];
            let t = curl.sample(s.t)[0];
            let b = curl.sample(s.b)[0];
            let c = curl.sample(s.uv)[0];

            let mut force = [0.5 * (t.abs() - b.abs()), 0.5 * (r.abs() - l.abs())];
            let length = (force[0] * force[0] + force[1] * force[1]).sqrt() + 0.0001;
            force = [
                force[0] / length * curl_strength * c,
                -force[1] / length * curl_strength * c,
            ];

            let v = velocity.sample(uv);
            [
                (v[0] + force[0] * timestep).clamp(-1000.0, 1000.0),
                (v[1] + force[1] * timestep).clamp(-1000.0, 1000.0),
                0.0,
                1.0,
            ]
        });
        self.velocity.swap();
    }

    fn compute_divergence(&mut self) {
        let texel_size = self.texel_size();
        let velocity = self.velocity.read();
        self.divergence.fill(|uv| {
            let s = Stencil::new(uv, texel_size);
            let c = velocity.sample(s.uv);
            let mut l = velocity.sample(s.l)[0];
            let mut r = velocity.sample(s.r)[0];
            let mut t = velocity.sample(s.t)[1];
            let mut b = velocity.sample(s.b)[1];

            if s.l[0] < 0.0 {
                l = -c[0];
            }
            if s.r[0] > 1.0 {
                r = -c[0];
            }
            if s.t[1] > 1.0 {
                t = -c[1];
            }
            if s.b[1] < 0.0 {
                b = -c[1];
            }

            [0.5 * (r - l + t - b), 0.0, 0.0, 1.0]
        });
    }

    fn decay_pressure(&mut self, factor: f32) {
        let (pressure, write) = split(&mut self.pressure);
        write.fill(|uv| pressure.sample(uv).map(|channel| channel * factor));
        self.pressure.swap();
    }

    fn relax_pressure(&mut self) {
        let texel_size = self.texel_size();
        let divergence = &self.divergence;
        let (pressure, write) = split(&mut self.pressure);
        write.fill(|uv| {
            let s = Stencil::new(uv, texel_size);
            let l = pressure.sample(s.l)[0];
            let r = pressure.sample(s.r)[0];
            let t = pressure.sample(s.t)[0];
            let b = pressure.sample(s.b)[0];
            let d = divergence.sample(s.uv)[0];
            [(l + r + b + t - d) * 0.25, 0.0, 0.0, 1.0]
        });
        self.pressure.swap();
    }

    fn subtract_gradient(&mut self) {
        let texel_size = self.texel_size();
        let pressure = self.pressure.read();
        let (velocity, write) = split(&mut self.velocity);
        write.fill(|uv| {
            let s = Stencil::new(uv, texel_size);
            let l = pressure.sample(s.l)[0];
            let r = pressure.sample(s.r)[0];
            let t = pressure.sample(s.t)[0];
            let b = pressure.sample(s.b)[0];
            let v = velocity.sample(uv);
            [v[0] - (r - l), v[1] - (t - b), 0.0, 1.0]
        });
        self.velocity.swap();
    }

    fn advect_velocity(&mut self, timestep: f32, dissipation: f32) {
        let texel_size = self.texel_size();
        let (velocity, write) = split(&mut self.velocity);
        write.fill(|uv| advect(&velocity, &velocity, uv, texel_size, timestep, dissipation));
        self.velocity.swap();
    }

    fn advect_dye(&mut self, timestep: f32, dissipation: f32) {
        let texel_size = self.texel_size();
        let velocity = self.velocity.read();
        let (dye, write) = split(&mut self.dye);
        write.fill(|uv| advect(velocity, &dye, uv, texel_size, timestep, dissipation));
        self.dye.swap();
    }
}

fn advect(
    velocity: &Field,
    source: &Field,
    uv: [f32; 2],
    texel_size: [f32; 2],
    timestep: f32,
    dissipation: f32,
) -> [f32; 4] {
    let v = velocity.sample(uv);
    let coord = [
        uv[0] - timestep * v[0] * texel_size[0],
        uv[1] - timestep * v[1] * texel_size[1],
    ];
    source
        .sample(coord)
        .map(|channel| channel / (1.0 + dissipation * timestep))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::stepper::{self, MAX_TIMESTEP};
    use approx::assert_relative_eq;

    const SIM: (usize, usize) = (24, 16);
    const DYE: (usize, usize) = (48, 32);
    const RADIUS: f32 = 0.0012;

    fn push() -> Splat {
        Splat {
            point: [0.4, 0.5],
            force: [300.0, 120.0],
            color: [0.06, 0.02, 0.0],
        }
    }

    fn simulate(timestep: f32, frames: usize) -> Rasterizer {
        let mut rasterizer = Rasterizer::new(SIM, DYE);
        rasterizer.splat(&push(), RADIUS);
        for _ in 0..frames {
            stepper::step(&mut rasterizer, timestep);
        }
        rasterizer
    }

    #[test]
    fn pressure_relaxation_is_deterministic() {
        let first = simulate(MAX_TIMESTEP, 3);
        let second = simulate(MAX_TIMESTEP, 3);

        assert_eq!(first.pressure.read(), second.pressure.read());
        assert_eq!(first.velocity.read(), second.velocity.read());
        assert!(first
            .pressure
            .read()
            .data
            .iter()
            .all(|texel| texel[0].is_finite()));
    }

    #[test]
    fn pressure_responds_to_a_push() {
        let rasterizer = simulate(MAX_TIMESTEP, 1);
        let peak = rasterizer
            .pressure
            .read()
            .data
            .iter()
            .map(|texel| texel[0].abs())
            .fold(0.0, f32::max);
        assert!(peak > 0.0);
    }

    #[test]
    fn splats_stay_local() {
        let mut rasterizer = Rasterizer::new(SIM, DYE);
        let splat = Splat {
            point: [0.5, 0.5],
            force: [1.0, 1.0],
            color: [1.0, 1.0, 1.0],
        };
        rasterizer.splat(&splat, RADIUS);

        // Beyond three times the gaussian's width, the falloff is below e^-9.
        let cutoff = RADIUS.sqrt() * 3.0;
        let bound = (-9.0f32).exp() * 1.001;
        let aspect_ratio = rasterizer.aspect_ratio;

        for (name, field) in [
            ("velocity", rasterizer.velocity.read()),
            ("dye", rasterizer.dye.read()),
        ] {
            let mut touched = false;
            for y in 0..field.height {
                for x in 0..field.width {
                    let u = (x as f32 + 0.5) / field.width as f32 - 0.5;
                    let v = (y as f32 + 0.5) / field.height as f32 - 0.5;
                    let distance = ((u * aspect_ratio).powi(2) + v * v).sqrt();
                    let value = field.data[y * field.width + x][0];

                    assert!(value <= 1.0);
                    touched |= value > 0.1;
                    if distance > cutoff {
                        assert!(
                            value <= bound,
                            "{} texel ({}, {}) got {}",
                            name,
                            x,
                            y,
                            value
                        );
                    }
                }
            }
            assert!(touched, "{} was never splatted", name);
        }
    }

    #[test]
    fn dye_fades_without_input() {
        let mut rasterizer = Rasterizer::new(SIM, DYE);
        let splat = Splat {
            point: [0.5, 0.5],
            force: [0.0, 0.0],
            color: [0.3, 0.1, 0.2],
        };
        rasterizer.splat(&splat, RADIUS);

        let mut luminance = rasterizer.dye.read().luminance();
        assert!(luminance > 0.0);

        for _ in 0..10 {
            stepper::step(&mut rasterizer, MAX_TIMESTEP);
            let next = rasterizer.dye.read().luminance();
            assert!(next < luminance);
            luminance = next;
        }

        let expected = 1.0 / (1.0 + stepper::DYE_DISSIPATION * MAX_TIMESTEP);
        let mut once = Rasterizer::new(SIM, DYE);
        once.splat(&splat, RADIUS);
        let before = once.dye.read().luminance();
        stepper::step(&mut once, MAX_TIMESTEP);
        assert_relative_eq!(
            once.dye.read().luminance() / before,
            expected,
            max_relative = 1e-4
        );
    }

    #[test]
    fn long_frames_step_like_capped_frames() {
        let capped = simulate(MAX_TIMESTEP, 2);
        let long = simulate(0.5, 2);

        assert_eq!(capped.velocity.read(), long.velocity.read());
        assert_eq!(capped.dye.read(), long.dye.read());
    }

    #[test]
    fn rigid_rotation_has_positive_curl() {
        let mut rasterizer = Rasterizer::new((16, 16), (16, 16));
        rasterizer
            .velocity
            .read_mut()
            .fill(|uv| [-(uv[1] - 0.5) * 10.0, (uv[0] - 0.5) * 10.0, 0.0, 1.0]);

        rasterizer.compute_curl();

        let curl = &rasterizer.curl;
        for y in 1..curl.height - 1 {
            for x in 1..curl.width - 1 {
                // 0.5 * (10 * 2/16 + 10 * 2/16)
                assert_relative_eq!(
                    curl.texel(x as i64, y as i64)[0],
                    1.25,
                    max_relative = 1e-4
                );
            }
        }
    }

    #[test]
    fn uniform_flow_has_no_interior_divergence() {
        let mut rasterizer = Rasterizer::new((16, 16), (16, 16));
        rasterizer
            .velocity
            .read_mut()
            .fill(|_| [3.0, -2.0, 0.0, 1.0]);

        rasterizer.compute_divergence();

        let divergence = &rasterizer.divergence;
        for y in 1..divergence.height - 1 {
            for x in 1..divergence.width - 1 {
                assert_relative_eq!(divergence.texel(x as i64, y as i64)[0], 0.0);
            }
        }
    }

    #[test]
    fn linear_sampling_interpolates_between_centres() {
        let mut field = Field::new(2, 1, Filter::Linear);
        field.data = vec![[0.0; 4], [1.0; 4]];

        assert_relative_eq!(field.sample([0.5, 0.5])[0], 0.5);
        assert_relative_eq!(field.sample([0.25, 0.5])[0], 0.0);
        assert_relative_eq!(field.sample([1.5, 0.5])[0], 1.0);
    }
}
