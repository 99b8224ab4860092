use crate::data;

use glow::HasContext;
use rustc_hash::FxHashMap;
use std::rc::Rc;
use thiserror::Error;

pub type Context = Rc<glow::Context>;
type GlDataType = u32;
pub type Result<T> = std::result::Result<T, Problem>;

#[derive(Error, Debug)]
pub enum Problem {
    #[error("No compatible graphics context is available")]
    ContextUnavailable,

    #[error("No renderable texture format for {0} fields")]
    FormatUnsupported(&'static str),

    #[error("Cannot create buffer")]
    CannotCreateBuffer,

    #[error("Cannot create texture")]
    CannotCreateTexture,

    #[error("Cannot create framebuffer")]
    CannotCreateFramebuffer,

    #[error("Framebuffer is incomplete (status {0:#x})")]
    IncompleteFramebuffer(u32),

    #[error("Cannot create vertex array")]
    CannotCreateVertexArray,

    #[error("Cannot create shader")]
    CannotCreateShader,

    #[error("Cannot compile the {stage} shader of `{program}`: {log}")]
    CannotCompileShader {
        program: &'static str,
        stage: &'static str,
        log: String,
    },

    #[error("Cannot create program")]
    CannotCreateProgram,

    #[error("Cannot link `{program}`: {log}")]
    CannotLinkProgram { program: &'static str, log: String },
}

#[derive(Debug)]
pub struct Buffer {
    context: Context,
    pub id: glow::Buffer,
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            self.context.delete_buffer(self.id);
        }
    }
}

impl Buffer {
    pub fn from_bytes(
        context: &Context,
        data: &[u8],
        buffer_type: u32,
        usage: u32,
    ) -> Result<Self> {
        let buffer = unsafe {
            let buffer = context
                .create_buffer()
                .map_err(|_| Problem::CannotCreateBuffer)?;

            context.bind_buffer(buffer_type, Some(buffer));
            context.buffer_data_u8_slice(buffer_type, data, usage);
            context.bind_buffer(buffer_type, None);

            buffer
        };

        Ok(Self {
            context: Rc::clone(context),
            id: buffer,
        })
    }

    pub fn from_f32(context: &Context, data: &[f32], buffer_type: u32, usage: u32) -> Result<Self> {
        Self::from_bytes(context, bytemuck::cast_slice(data), buffer_type, usage)
    }

    pub fn from_u16(context: &Context, data: &[u16], buffer_type: u32, usage: u32) -> Result<Self> {
        Self::from_bytes(context, bytemuck::cast_slice(data), buffer_type, usage)
    }
}

/// An `(internal format, format, type)` triple accepted by `tex_image_2d`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureFormat {
    pub internal_format: GlDataType,
    pub format: GlDataType,
    pub type_: GlDataType,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureOptions {
    pub format: TextureFormat,
    pub filter: GlDataType,
}

/// A texture and the framebuffer it is attached to.
///
/// The texture belongs to this framebuffer alone and both are deleted together.
pub struct Framebuffer {
    context: Context,
    pub id: glow::Framebuffer,
    pub texture: glow::Texture,
    pub width: u32,
    pub height: u32,
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe {
            self.context
                .bind_framebuffer(glow::FRAMEBUFFER, Some(self.id));
            self.context.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                None,
                0,
            );
            self.context.bind_framebuffer(glow::FRAMEBUFFER, None);
            self.context.delete_framebuffer(self.id);
            self.context.delete_texture(self.texture);
        }
    }
}

impl Framebuffer {
    /// Allocates a render target and clears it to zero.
    pub fn new(context: &Context, width: u32, height: u32, options: TextureOptions) -> Result<Self> {
        let (framebuffer, texture) = unsafe {
            let texture = context
                .create_texture()
                .map_err(|_| Problem::CannotCreateTexture)?;

            context.active_texture(glow::TEXTURE0);
            context.bind_texture(glow::TEXTURE_2D, Some(texture));
            context.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MIN_FILTER,
                options.filter as i32,
            );
            context.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MAG_FILTER,
                options.filter as i32,
            );
            context.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_WRAP_S,
                glow::CLAMP_TO_EDGE as i32,
            );
            context.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_WRAP_T,
                glow::CLAMP_TO_EDGE as i32,
            );
            context.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                options.format.internal_format as i32,
                width as i32,
                height as i32,
                0,
                options.format.format,
                options.format.type_,
                None,
            );

            let framebuffer = match context.create_framebuffer() {
                Ok(framebuffer) => framebuffer,
                Err(_) => {
                    context.delete_texture(texture);
                    return Err(Problem::CannotCreateFramebuffer);
                }
            };

            context.bind_framebuffer(glow::FRAMEBUFFER, Some(framebuffer));
            context.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                Some(texture),
                0,
            );

            let status = context.check_framebuffer_status(glow::FRAMEBUFFER);
            if status != glow::FRAMEBUFFER_COMPLETE {
                context.bind_framebuffer(glow::FRAMEBUFFER, None);
                context.delete_framebuffer(framebuffer);
                context.delete_texture(texture);
                return Err(Problem::IncompleteFramebuffer(status));
            }

            context.viewport(0, 0, width as i32, height as i32);
            context.clear_color(0.0, 0.0, 0.0, 0.0);
            context.clear(glow::COLOR_BUFFER_BIT);
            context.bind_framebuffer(glow::FRAMEBUFFER, None);

            (framebuffer, texture)
        };

        Ok(Self {
            context: Rc::clone(context),
            id: framebuffer,
            texture,
            width,
            height,
        })
    }

    pub fn texel_size(&self) -> [f32; 2] {
        [1.0 / self.width as f32, 1.0 / self.height as f32]
    }

    /// Binds the texture to `unit` and returns the unit for use as a sampler
    /// uniform.
    pub fn attach(&self, unit: u32) -> u32 {
        unsafe {
            self.context.active_texture(glow::TEXTURE0 + unit);
            self.context
                .bind_texture(glow::TEXTURE_2D, Some(self.texture));
        }
        unit
    }

    pub fn draw_to<T>(&self, draw_call: T)
    where
        T: FnOnce(),
    {
        unsafe {
            self.context
                .bind_framebuffer(glow::FRAMEBUFFER, Some(self.id));
            self.context
                .viewport(0, 0, self.width as i32, self.height as i32);
            draw_call();
            self.context.bind_framebuffer(glow::FRAMEBUFFER, None);
        }
    }
}

/// A read/write pair addressed by a parity bit.
///
/// `swap` only flips which member is read and which is written. The members
/// themselves never move.
#[derive(Debug)]
pub struct PingPong<T> {
    buffers: [T; 2],
    parity: usize,
}

impl<T> PingPong<T> {
    pub fn new(first: T, second: T) -> Self {
        Self {
            buffers: [first, second],
            parity: 0,
        }
    }

    pub fn read(&self) -> &T {
        &self.buffers[self.parity]
    }

    pub fn write(&self) -> &T {
        &self.buffers[1 - self.parity]
    }

    pub fn read_mut(&mut self) -> &mut T {
        &mut self.buffers[self.parity]
    }

    pub fn write_mut(&mut self) -> &mut T {
        &mut self.buffers[1 - self.parity]
    }

    pub fn parity(&self) -> usize {
        self.parity
    }

    pub fn swap(&mut self) {
        self.parity = 1 - self.parity;
    }
}

pub type DoubleFramebuffer = PingPong<Framebuffer>;

impl PingPong<Framebuffer> {
    pub fn with_options(
        context: &Context,
        width: u32,
        height: u32,
        options: TextureOptions,
    ) -> Result<Self> {
        let front = Framebuffer::new(context, width, height, options)?;
        let back = Framebuffer::new(context, width, height, options)?;
        Ok(Self::new(front, back))
    }

    pub fn width(&self) -> u32 {
        self.read().width
    }

    pub fn height(&self) -> u32 {
        self.read().height
    }

    pub fn texel_size(&self) -> [f32; 2] {
        self.read().texel_size()
    }
}

/// A linked program with its uniform locations resolved once, at link time.
pub struct Program {
    context: Context,
    pub program: glow::Program,
    uniforms: FxHashMap<String, glow::UniformLocation>,
}

impl Drop for Program {
    fn drop(&mut self) {
        unsafe {
            self.context.delete_program(self.program);
        }
    }
}

impl Program {
    pub fn new(context: &Context, name: &'static str, shaders: (&str, &str)) -> Result<Self> {
        let vertex_shader = compile_shader(context, name, glow::VERTEX_SHADER, shaders.0)?;
        let fragment_shader =
            match compile_shader(context, name, glow::FRAGMENT_SHADER, shaders.1) {
                Ok(shader) => shader,
                Err(problem) => {
                    unsafe { context.delete_shader(vertex_shader) };
                    return Err(problem);
                }
            };

        let program = unsafe {
            let program = context
                .create_program()
                .map_err(|_| Problem::CannotCreateProgram)?;
            context.attach_shader(program, vertex_shader);
            context.attach_shader(program, fragment_shader);

            // Every program shares the same quad, so pin the position attribute.
            context.bind_attrib_location(program, data::POSITION_LOCATION, "aPosition");
            context.link_program(program);

            // Delete the shaders to free up memory
            context.detach_shader(program, vertex_shader);
            context.detach_shader(program, fragment_shader);
            context.delete_shader(vertex_shader);
            context.delete_shader(fragment_shader);

            if !context.get_program_link_status(program) {
                let log = context.get_program_info_log(program);
                context.delete_program(program);
                return Err(Problem::CannotLinkProgram { program: name, log });
            }

            program
        };

        let mut uniforms = FxHashMap::default();
        unsafe {
            let uniform_count = context.get_active_uniforms(program);
            for index in 0..uniform_count {
                if let Some(info) = context.get_active_uniform(program, index) {
                    if let Some(location) = context.get_uniform_location(program, &info.name) {
                        uniforms.insert(info.name, location);
                    }
                }
            }
        }

        log::trace!("Linked `{}` with uniforms {:?}", name, uniforms.keys());

        Ok(Program {
            context: Rc::clone(context),
            program,
            uniforms,
        })
    }

    pub fn use_program(&self) {
        unsafe {
            self.context.use_program(Some(self.program));
        }
    }

    pub fn set_uniforms(&self, uniforms: &[&Uniform]) {
        for uniform in uniforms.iter() {
            self.set_uniform(uniform);
        }
    }

    // Uniforms the driver optimised away have no location and are skipped.
    pub fn set_uniform(&self, uniform: &Uniform) {
        let Some(location) = self.uniforms.get(uniform.name) else {
            return;
        };
        let location = Some(location);

        unsafe {
            match uniform.value {
                UniformValue::Float(value) => self.context.uniform_1_f32(location, value),

                UniformValue::Vec2(value) => {
                    self.context.uniform_2_f32(location, value[0], value[1])
                }

                UniformValue::Vec3(value) => {
                    self.context
                        .uniform_3_f32(location, value[0], value[1], value[2])
                }

                UniformValue::Texture2D(unit) => self.context.uniform_1_i32(location, unit as i32),
            }
        }
    }
}

pub struct Uniform {
    pub name: &'static str,
    pub value: UniformValue,
}

#[derive(Clone, Copy, Debug)]
pub enum UniformValue {
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Texture2D(u32),
}

pub fn compile_shader(
    context: &Context,
    program: &'static str,
    shader_type: u32,
    source: &str,
) -> Result<glow::Shader> {
    unsafe {
        let shader = context
            .create_shader(shader_type)
            .map_err(|_| Problem::CannotCreateShader)?;
        context.shader_source(shader, source);
        context.compile_shader(shader);

        if context.get_shader_compile_status(shader) {
            Ok(shader)
        } else {
            let log = context.get_shader_info_log(shader);
            context.delete_shader(shader);
            Err(Problem::CannotCompileShader {
                program,
                stage: match shader_type {
                    glow::VERTEX_SHADER => "vertex",
                    _ => "fragment",
                },
                log,
            })
        }
    }
}

/// The full-screen quad every pass draws.
///
/// Legacy contexts may lack vertex array objects, in which case the attribute
/// state is rebound on every draw. Callers decide up front, since glow panics
/// when asked for a vertex array the context can't provide.
pub struct Quad {
    context: Context,
    vertices: Buffer,
    indices: Buffer,
    vertex_array: Option<glow::VertexArray>,
}

impl Drop for Quad {
    fn drop(&mut self) {
        if let Some(vertex_array) = self.vertex_array {
            unsafe {
                self.context.delete_vertex_array(vertex_array);
            }
        }
    }
}

impl Quad {
    pub fn new(context: &Context, vertex_arrays: bool) -> Result<Self> {
        let vertices = Buffer::from_f32(
            context,
            &data::PLANE_VERTICES,
            glow::ARRAY_BUFFER,
            glow::STATIC_DRAW,
        )?;
        let indices = Buffer::from_u16(
            context,
            &data::PLANE_INDICES,
            glow::ELEMENT_ARRAY_BUFFER,
            glow::STATIC_DRAW,
        )?;

        let vertex_array = if vertex_arrays {
            let vertex_array = unsafe { context.create_vertex_array() }
                .map_err(|_| Problem::CannotCreateVertexArray)?;
            Some(vertex_array)
        } else {
            log::debug!("Vertex arrays are unavailable; binding attributes per draw");
            None
        };

        let quad = Self {
            context: Rc::clone(context),
            vertices,
            indices,
            vertex_array,
        };

        if let Some(vertex_array) = quad.vertex_array {
            unsafe {
                context.bind_vertex_array(Some(vertex_array));
                quad.bind_attributes();
                context.bind_vertex_array(None);
            }
        }

        Ok(quad)
    }

    unsafe fn bind_attributes(&self) {
        self.context
            .bind_buffer(glow::ARRAY_BUFFER, Some(self.vertices.id));
        self.context.vertex_attrib_pointer_f32(
            data::POSITION_LOCATION,
            2,
            glow::FLOAT,
            false,
            0,
            0,
        );
        self.context
            .enable_vertex_attrib_array(data::POSITION_LOCATION);
        self.context
            .bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(self.indices.id));
    }

    pub fn draw(&self) {
        unsafe {
            match self.vertex_array {
                Some(vertex_array) => self.context.bind_vertex_array(Some(vertex_array)),
                None => self.bind_attributes(),
            }

            self.context.draw_elements(
                glow::TRIANGLES,
                data::PLANE_INDICES.len() as i32,
                glow::UNSIGNED_SHORT,
                0,
            );
        }
    }
}
