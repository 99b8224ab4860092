mod data;
pub mod fluid;
pub mod grid;
pub mod negotiate;
pub mod pointer;
pub mod render;
pub mod rng;
pub mod scheduler;
pub mod settings;
pub mod shaders;
pub mod stepper;
mod swirl;

#[cfg(test)]
mod reference;

pub use scheduler::{Scheduler, Surface, Tick};
pub use settings::Settings;
pub use swirl::{Problem, Swirl};
