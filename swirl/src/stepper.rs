//! The fixed sequence of passes that advances the fluid by one frame.

use crate::pointer::Splat;

pub const CURL_STRENGTH: f32 = 3.0;
/// Fraction of last frame's pressure that seeds the next solve.
pub const PRESSURE_DECAY: f32 = 0.1;
pub const PRESSURE_ITERATIONS: usize = 20;
pub const VELOCITY_DISSIPATION: f32 = 2.0;
pub const DYE_DISSIPATION: f32 = 5.5;
/// Explicit integration blows up on long frames, so steps are capped at 60Hz.
pub const MAX_TIMESTEP: f32 = 0.016666;

/// The passes a fluid backend provides.
///
/// Each pass reads the current fields and writes its result to the write
/// side of the affected double buffer before swapping it.
pub trait FluidPasses {
    /// Adds `splat.force` to velocity and then `splat.color` to dye.
    fn splat(&mut self, splat: &Splat, radius: f32);

    fn compute_curl(&mut self);

    fn confine_vorticity(&mut self, curl_strength: f32, timestep: f32);

    fn compute_divergence(&mut self);

    /// Scales the pressure field in place.
    fn decay_pressure(&mut self, factor: f32);

    /// One Jacobi iteration of the pressure Poisson equation.
    fn relax_pressure(&mut self);

    fn subtract_gradient(&mut self);

    fn advect_velocity(&mut self, timestep: f32, dissipation: f32);

    fn advect_dye(&mut self, timestep: f32, dissipation: f32);
}

pub fn clamp_timestep(timestep: f32) -> f32 {
    if timestep.is_nan() {
        return 0.0;
    }
    timestep.clamp(0.0, MAX_TIMESTEP)
}

pub fn step<P>(passes: &mut P, timestep: f32)
where
    P: FluidPasses + ?Sized,
{
    let timestep = clamp_timestep(timestep);

    passes.compute_curl();
    passes.confine_vorticity(CURL_STRENGTH, timestep);
    passes.compute_divergence();

    passes.decay_pressure(PRESSURE_DECAY);
    for _ in 0..PRESSURE_ITERATIONS {
        passes.relax_pressure();
    }

    passes.subtract_gradient();
    passes.advect_velocity(timestep, VELOCITY_DISSIPATION);
    passes.advect_dye(timestep, DYE_DISSIPATION);
}

/// Applies a pending splat, if any, and steps.
pub fn advance<P>(passes: &mut P, pending: Option<Splat>, radius: f32, timestep: f32)
where
    P: FluidPasses + ?Sized,
{
    if let Some(splat) = pending {
        passes.splat(&splat, radius);
    }

    step(passes, timestep);
}

/// Applies a splat between frames. The fields are not stepped.
pub fn splat_now<P>(passes: &mut P, splat: Option<Splat>, radius: f32)
where
    P: FluidPasses + ?Sized,
{
    if let Some(splat) = splat {
        passes.splat(&splat, radius);
    }
}

/// Turns frame timestamps into clamped timesteps.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameClock {
    /// Milliseconds, as reported by the host's frame callback.
    last_timestamp: f64,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&mut self, timestamp: f64) -> f32 {
        let elapsed = (timestamp - self.last_timestamp) * 0.001;
        self.last_timestamp = timestamp;

        clamp_timestep(elapsed as f32)
    }
}
