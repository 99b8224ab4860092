use crate::{fluid, negotiate, pointer, render, rng, settings, stepper};
use fluid::Fluid;
use negotiate::{Capabilities, ContextKind};
use pointer::PointerState;
use settings::Settings;
use stepper::FrameClock;

use std::fmt;
use std::rc::Rc;

pub struct Swirl {
    fluid: Fluid,
    pointer: PointerState,
    clock: FrameClock,
    settings: Rc<Settings>,

    pub context: render::Context,
    /// Backing size of the surface, in device pixels.
    width: u32,
    height: u32,
}

impl Swirl {
    pub fn new(
        context: &render::Context,
        kind: ContextKind,
        physical_width: u32,
        physical_height: u32,
        settings: &Rc<Settings>,
    ) -> Result<Swirl, Problem> {
        log::info!("Starting swirl {}", env!("CARGO_PKG_VERSION"));

        settings.validate().map_err(Problem::InvalidSettings)?;
        rng::init_from_seed(&settings.seed);

        let capabilities = Capabilities::detect(context, kind).map_err(Problem::CannotRender)?;
        let fluid = Fluid::new(
            context,
            &capabilities,
            settings,
            physical_width,
            physical_height,
        )
        .map_err(Problem::CannotRender)?;

        Ok(Swirl {
            fluid,
            pointer: PointerState::new(),
            clock: FrameClock::new(),
            settings: Rc::clone(settings),

            context: Rc::clone(context),
            width: physical_width,
            height: physical_height,
        })
    }

    pub fn resize(&mut self, physical_width: u32, physical_height: u32) -> Result<(), Problem> {
        self.width = physical_width;
        self.height = physical_height;
        self.fluid
            .resize(physical_width, physical_height)
            .map_err(Problem::CannotRender)
    }

    /// Records a pointer move, in logical pixels from the top left of the
    /// surface. The splat is applied on the next frame.
    pub fn pointer_moved(&mut self, client_x: f64, client_y: f64, pixel_ratio: f64) {
        self.pointer
            .on_move(client_x, client_y, pixel_ratio, (self.width, self.height));
    }

    /// Splats immediately at the press location.
    pub fn pointer_pressed(&mut self, client_x: f64, client_y: f64, pixel_ratio: f64) {
        let pressed = self
            .pointer
            .on_press(client_x, client_y, pixel_ratio, (self.width, self.height));
        let radius = self.splat_radius();

        self.fluid.prepare();
        stepper::splat_now(&mut self.fluid, pressed, radius);
    }

    pub fn animate(&mut self, timestamp: f64) {
        let timestep = self.clock.tick(timestamp);
        let pending = self.pointer.take_splat(self.settings.splat_force);
        let radius = self.splat_radius();

        self.fluid.prepare();
        stepper::advance(&mut self.fluid, pending, radius, timestep);
        self.fluid
            .render(self.settings.mode, self.width, self.height);
    }

    fn splat_radius(&self) -> f32 {
        pointer::correct_radius(self.settings.splat_radius / 100.0, self.fluid.aspect_ratio)
    }
}

#[derive(Debug)]
pub enum Problem {
    InvalidSettings(String),
    CannotRender(render::Problem),
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Problem::*;
        match self {
            InvalidSettings(msg) => write!(f, "Invalid settings: {}", msg),
            CannotRender(problem) => write!(f, "{}", problem),
        }
    }
}

impl std::error::Error for Problem {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Problem::InvalidSettings(_) => None,
            Problem::CannotRender(problem) => Some(problem),
        }
    }
}

impl From<render::Problem> for Problem {
    fn from(problem: render::Problem) -> Self {
        Problem::CannotRender(problem)
    }
}
