use crate::grid::{self, Resolution};
use crate::negotiate::Capabilities;
use crate::pointer::Splat;
use crate::render::{
    self, Context, DoubleFramebuffer, Framebuffer, Program, Quad, TextureOptions, Uniform,
    UniformValue,
};
use crate::settings::{Mode, Settings};
use crate::shaders::Programs;
use crate::stepper::FluidPasses;

use glow::HasContext;
use std::rc::Rc;

/// The simulation fields, sized for one surface.
pub struct Fields {
    pub velocity: DoubleFramebuffer,
    pub dye: DoubleFramebuffer,
    pub pressure: DoubleFramebuffer,
    pub divergence: Framebuffer,
    pub curl: Framebuffer,

    pub sim_resolution: Resolution,
    pub dye_resolution: Resolution,
}

impl Fields {
    pub fn new(
        context: &Context,
        capabilities: &Capabilities,
        sim_resolution: Resolution,
        dye_resolution: Resolution,
    ) -> render::Result<Self> {
        let Resolution { width, height } = sim_resolution;

        let velocity = DoubleFramebuffer::with_options(
            context,
            width,
            height,
            TextureOptions {
                format: capabilities.rg,
                filter: capabilities.filter,
            },
        )?;
        let dye = DoubleFramebuffer::with_options(
            context,
            dye_resolution.width,
            dye_resolution.height,
            TextureOptions {
                format: capabilities.rgba,
                filter: capabilities.filter,
            },
        )?;

        let scalar = TextureOptions {
            format: capabilities.r,
            filter: glow::NEAREST,
        };
        let pressure = DoubleFramebuffer::with_options(context, width, height, scalar)?;
        let divergence = Framebuffer::new(context, width, height, scalar)?;
        let curl = Framebuffer::new(context, width, height, scalar)?;

        Ok(Self {
            velocity,
            dye,
            pressure,
            divergence,
            curl,
            sim_resolution,
            dye_resolution,
        })
    }

    pub fn sim_texel_size(&self) -> [f32; 2] {
        self.sim_resolution.texel_size()
    }

    pub fn dye_texel_size(&self) -> [f32; 2] {
        self.dye_resolution.texel_size()
    }
}

/// The GPU fluid: fields, programs and the quad every pass draws.
pub struct Fluid {
    context: Context,
    capabilities: Capabilities,
    settings: Rc<Settings>,
    programs: Programs,
    quad: Quad,

    pub fields: Fields,
    pub aspect_ratio: f32,
}

impl Fluid {
    pub fn new(
        context: &Context,
        capabilities: &Capabilities,
        settings: &Rc<Settings>,
        width: u32,
        height: u32,
    ) -> render::Result<Self> {
        let programs = Programs::new(
            context,
            capabilities.shader_version,
            capabilities.manual_filtering(),
        )?;
        let quad = Quad::new(context, capabilities.vertex_arrays)?;
        let fields = Fields::new(
            context,
            capabilities,
            Resolution::from_reference(settings.sim_resolution, width, height),
            Resolution::from_reference(settings.dye_resolution, width, height),
        )?;

        log::debug!(
            "Velocity field {:?}, dye field {:?}",
            fields.sim_resolution,
            fields.dye_resolution
        );

        Ok(Self {
            context: Rc::clone(context),
            capabilities: *capabilities,
            settings: Rc::clone(settings),
            programs,
            quad,
            fields,
            aspect_ratio: grid::aspect_ratio(width, height),
        })
    }

    /// Reallocates the fields for a new surface size, carrying the velocity,
    /// dye and pressure over by resampling.
    pub fn resize(&mut self, width: u32, height: u32) -> render::Result<()> {
        let sim_resolution = Resolution::from_reference(self.settings.sim_resolution, width, height);
        let dye_resolution = Resolution::from_reference(self.settings.dye_resolution, width, height);
        self.aspect_ratio = grid::aspect_ratio(width, height);

        if sim_resolution == self.fields.sim_resolution
            && dye_resolution == self.fields.dye_resolution
        {
            return Ok(());
        }

        let mut fields = Fields::new(
            &self.context,
            &self.capabilities,
            sim_resolution,
            dye_resolution,
        )?;

        self.prepare();
        for (from, to) in [
            (&self.fields.velocity, &mut fields.velocity),
            (&self.fields.dye, &mut fields.dye),
            (&self.fields.pressure, &mut fields.pressure),
        ] {
            resample(&self.quad, &self.programs.copy, from.read(), to);
        }

        log::debug!(
            "Resized velocity field to {:?}, dye field to {:?}",
            sim_resolution,
            dye_resolution
        );

        // The old framebuffers are released here.
        self.fields = fields;

        Ok(())
    }

    /// Resets the blend state the passes expect.
    pub fn prepare(&self) {
        unsafe {
            self.context.disable(glow::BLEND);
        }
    }

    /// Composites the field selected by `mode` onto the default framebuffer.
    pub fn render(&self, mode: Mode, width: u32, height: u32) {
        let (source, scale, bias) = match mode {
            Mode::Normal => (self.fields.dye.read(), 1.0, 0.0),
            Mode::DebugVelocity => (self.fields.velocity.read(), 0.01, 0.5),
            Mode::DebugPressure => (self.fields.pressure.read(), 0.5, 0.5),
            Mode::DebugDivergence => (&self.fields.divergence, 0.5, 0.5),
            Mode::DebugCurl => (&self.fields.curl, 0.1, 0.5),
        };

        unsafe {
            self.context.bind_framebuffer(glow::FRAMEBUFFER, None);
            self.context.viewport(0, 0, width as i32, height as i32);
            self.context.clear_color(0.0, 0.0, 0.0, 0.0);
            self.context.clear(glow::COLOR_BUFFER_BIT);

            self.context.enable(glow::BLEND);
            self.context
                .blend_func(glow::ONE, glow::ONE_MINUS_SRC_ALPHA);
        }

        let display = &self.programs.display;
        display.use_program();
        display.set_uniforms(&[
            &Uniform {
                name: "texelSize",
                value: UniformValue::Vec2(source.texel_size()),
            },
            &Uniform {
                name: "uTexture",
                value: UniformValue::Texture2D(source.attach(0)),
            },
            &Uniform {
                name: "scale",
                value: UniformValue::Float(scale),
            },
            &Uniform {
                name: "bias",
                value: UniformValue::Float(bias),
            },
        ]);
        self.quad.draw();
    }
}

fn draw(quad: &Quad, program: &Program, uniforms: &[&Uniform], target: &Framebuffer) {
    program.use_program();
    program.set_uniforms(uniforms);
    target.draw_to(|| quad.draw());
}

fn resample(quad: &Quad, copy: &Program, from: &Framebuffer, to: &mut DoubleFramebuffer) {
    draw(
        quad,
        copy,
        &[
            &Uniform {
                name: "texelSize",
                value: UniformValue::Vec2(to.texel_size()),
            },
            &Uniform {
                name: "uTexture",
                value: UniformValue::Texture2D(from.attach(0)),
            },
        ],
        to.write(),
    );
    to.swap();
}

impl FluidPasses for Fluid {
    fn splat(&mut self, splat: &Splat, radius: f32) {
        let program = &self.programs.splat;
        let shared = [
            Uniform {
                name: "aspectRatio",
                value: UniformValue::Float(self.aspect_ratio),
            },
            Uniform {
                name: "point",
                value: UniformValue::Vec2(splat.point),
            },
            Uniform {
                name: "radius",
                value: UniformValue::Float(radius),
            },
        ];

        let velocity = &mut self.fields.velocity;
        draw(
            &self.quad,
            program,
            &[
                &shared[0],
                &shared[1],
                &shared[2],
                &Uniform {
                    name: "texelSize",
                    value: UniformValue::Vec2(velocity.texel_size()),
                },
                &Uniform {
                    name: "uTarget",
                    value: UniformValue::Texture2D(velocity.read().attach(0)),
                },
                &Uniform {
                    name: "color",
                    value: UniformValue::Vec3([splat.force[0], splat.force[1], 0.0]),
                },
            ],
            velocity.write(),
        );
        velocity.swap();

        let dye = &mut self.fields.dye;
        draw(
            &self.quad,
            program,
            &[
                &shared[0],
                &shared[1],
                &shared[2],
                &Uniform {
                    name: "texelSize",
                    value: UniformValue::Vec2(dye.texel_size()),
                },
                &Uniform {
                    name: "uTarget",
                    value: UniformValue::Texture2D(dye.read().attach(0)),
                },
                &Uniform {
                    name: "color",
                    value: UniformValue::Vec3(splat.color),
                },
            ],
            dye.write(),
        );
        dye.swap();
    }

    fn compute_curl(&mut self) {
        let fields = &self.fields;
        draw(
            &self.quad,
            &self.programs.curl,
            &[
                &Uniform {
                    name: "texelSize",
                    value: UniformValue::Vec2(fields.sim_texel_size()),
                },
                &Uniform {
                    name: "uVelocity",
                    value: UniformValue::Texture2D(fields.velocity.read().attach(0)),
                },
            ],
            &fields.curl,
        );
    }

    fn confine_vorticity(&mut self, curl_strength: f32, timestep: f32) {
        let texel_size = self.fields.sim_texel_size();
        let velocity = &mut self.fields.velocity;
        draw(
            &self.quad,
            &self.programs.vorticity,
            &[
                &Uniform {
                    name: "texelSize",
                    value: UniformValue::Vec2(texel_size),
                },
                &Uniform {
                    name: "uVelocity",
                    value: UniformValue::Texture2D(velocity.read().attach(0)),
                },
                &Uniform {
                    name: "uCurl",
                    value: UniformValue::Texture2D(self.fields.curl.attach(1)),
                },
                &Uniform {
                    name: "curl",
                    value: UniformValue::Float(curl_strength),
                },
                &Uniform {
                    name: "dt",
                    value: UniformValue::Float(timestep),
                },
            ],
            velocity.write(),
        );
        velocity.swap();
    }

    fn compute_divergence(&mut self) {
        let fields = &self.fields;
        draw(
            &self.quad,
            &self.programs.divergence,
            &[
                &Uniform {
                    name: "texelSize",
                    value: UniformValue::Vec2(fields.sim_texel_size()),
                },
                &Uniform {
                    name: "uVelocity",
                    value: UniformValue::Texture2D(fields.velocity.read().attach(0)),
                },
            ],
            &fields.divergence,
        );
    }

    fn decay_pressure(&mut self, factor: f32) {
        let texel_size = self.fields.sim_texel_size();
        let pressure = &mut self.fields.pressure;
        draw(
            &self.quad,
            &self.programs.clear,
            &[
                &Uniform {
                    name: "texelSize",
                    value: UniformValue::Vec2(texel_size),
                },
                &Uniform {
                    name: "uTexture",
                    value: UniformValue::Texture2D(pressure.read().attach(0)),
                },
                &Uniform {
                    name: "value",
                    value: UniformValue::Float(factor),
                },
            ],
            pressure.write(),
        );
        pressure.swap();
    }

    fn relax_pressure(&mut self) {
        let texel_size = self.fields.sim_texel_size();
        let pressure = &mut self.fields.pressure;
        draw(
            &self.quad,
            &self.programs.pressure,
            &[
                &Uniform {
                    name: "texelSize",
                    value: UniformValue::Vec2(texel_size),
                },
                &Uniform {
                    name: "uDivergence",
                    value: UniformValue::Texture2D(self.fields.divergence.attach(0)),
                },
                &Uniform {
                    name: "uPressure",
                    value: UniformValue::Texture2D(pressure.read().attach(1)),
                },
            ],
            pressure.write(),
        );
        pressure.swap();
    }

    fn subtract_gradient(&mut self) {
        let texel_size = self.fields.sim_texel_size();
        let velocity = &mut self.fields.velocity;
        draw(
            &self.quad,
            &self.programs.gradient_subtract,
            &[
                &Uniform {
                    name: "texelSize",
                    value: UniformValue::Vec2(texel_size),
                },
                &Uniform {
                    name: "uPressure",
                    value: UniformValue::Texture2D(self.fields.pressure.read().attach(0)),
                },
                &Uniform {
                    name: "uVelocity",
                    value: UniformValue::Texture2D(velocity.read().attach(1)),
                },
            ],
            velocity.write(),
        );
        velocity.swap();
    }

    fn advect_velocity(&mut self, timestep: f32, dissipation: f32) {
        let texel_size = self.fields.sim_texel_size();
        let velocity = &mut self.fields.velocity;
        let unit = velocity.read().attach(0);
        draw(
            &self.quad,
            &self.programs.advect,
            &[
                &Uniform {
                    name: "texelSize",
                    value: UniformValue::Vec2(texel_size),
                },
                &Uniform {
                    name: "dyeTexelSize",
                    value: UniformValue::Vec2(texel_size),
                },
                &Uniform {
                    name: "uVelocity",
                    value: UniformValue::Texture2D(unit),
                },
                &Uniform {
                    name: "uSource",
                    value: UniformValue::Texture2D(unit),
                },
                &Uniform {
                    name: "dt",
                    value: UniformValue::Float(timestep),
                },
                &Uniform {
                    name: "dissipation",
                    value: UniformValue::Float(dissipation),
                },
            ],
            velocity.write(),
        );
        velocity.swap();
    }

    fn advect_dye(&mut self, timestep: f32, dissipation: f32) {
        let texel_size = self.fields.sim_texel_size();
        let dye_texel_size = self.fields.dye_texel_size();
        let dye = &mut self.fields.dye;
        draw(
            &self.quad,
            &self.programs.advect,
            &[
                &Uniform {
                    name: "texelSize",
                    value: UniformValue::Vec2(texel_size),
                },
                &Uniform {
                    name: "dyeTexelSize",
                    value: UniformValue::Vec2(dye_texel_size),
                },
                &Uniform {
                    name: "uVelocity",
                    value: UniformValue::Texture2D(self.fields.velocity.read().attach(0)),
                },
                &Uniform {
                    name: "uSource",
                    value: UniformValue::Texture2D(dye.read().attach(1)),
                },
                &Uniform {
                    name: "dt",
                    value: UniformValue::Float(timestep),
                },
                &Uniform {
                    name: "dissipation",
                    value: UniformValue::Float(dissipation),
                },
            ],
            dye.write(),
        );
        dye.swap();
    }
}
