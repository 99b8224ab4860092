use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub mode: Mode,
    pub seed: Option<String>,

    /// Short side, in texels, of the velocity, pressure, divergence and curl
    /// fields.
    pub sim_resolution: u32,
    /// Short side, in texels, of the dye field.
    pub dye_resolution: u32,

    /// Splat radius as a percentage of the surface.
    pub splat_radius: f32,
    /// Multiplier turning a pointer delta into an impulse.
    pub splat_force: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            mode: Mode::Normal,
            seed: None,
            sim_resolution: 128,
            dye_resolution: 1440,
            splat_radius: 0.12,
            splat_force: 3500.0,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), String> {
        if self.sim_resolution == 0 {
            return Err("simResolution must be positive".to_string());
        }

        if self.dye_resolution < self.sim_resolution {
            return Err(format!(
                "dyeResolution ({}) must be at least simResolution ({})",
                self.dye_resolution, self.sim_resolution
            ));
        }

        if !(self.splat_radius > 0.0 && self.splat_radius.is_finite()) {
            return Err(format!(
                "splatRadius must be positive, got {}",
                self.splat_radius
            ));
        }

        if !self.splat_force.is_finite() {
            return Err("splatForce must be finite".to_string());
        }

        Ok(())
    }
}

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum Mode {
    #[default]
    Normal,
    DebugVelocity,
    DebugPressure,
    DebugDivergence,
    DebugCurl,
}
