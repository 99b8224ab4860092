//! Picking a graphics context and the texture formats it can render to.

use crate::render::{Problem, Result, TextureFormat};
use crate::shaders::ShaderVersion;

use glow::HasContext;
use std::collections::HashSet;

/// `HALF_FLOAT_OES` from `OES_texture_half_float`. WebGL1 uses a different
/// enum than the core `HALF_FLOAT`.
pub const HALF_FLOAT_OES: u32 = 0x8D61;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContextKind {
    /// WebGL2, OpenGL 3.3 core or OpenGL ES 3.0. Can render to float color
    /// buffers.
    Modern,
    /// WebGL1 or OpenGL ES 2.0 with half-float textures.
    Legacy,
}

pub const PREFERRED_CONTEXTS: [ContextKind; 2] = [ContextKind::Modern, ContextKind::Legacy];

/// Tries each kind of context in order and returns the first one the host
/// manages to create.
pub fn first_available<T, F>(kinds: &[ContextKind], mut create: F) -> Result<(ContextKind, T)>
where
    F: FnMut(ContextKind) -> Option<T>,
{
    for &kind in kinds {
        if let Some(context) = create(kind) {
            log::info!("Using a {:?} graphics context", kind);
            return Ok((kind, context));
        }

        log::debug!("{:?} graphics context is unavailable", kind);
    }

    Err(Problem::ContextUnavailable)
}

/// Answers whether a texture of the given format can be attached as a color
/// buffer.
pub trait RenderTargetProbe {
    fn is_renderable(&self, format: TextureFormat) -> bool;
}

impl RenderTargetProbe for glow::Context {
    fn is_renderable(&self, format: TextureFormat) -> bool {
        unsafe {
            let Ok(texture) = self.create_texture() else {
                return false;
            };
            let framebuffer = match self.create_framebuffer() {
                Ok(framebuffer) => framebuffer,
                Err(_) => {
                    self.delete_texture(texture);
                    return false;
                }
            };

            self.bind_texture(glow::TEXTURE_2D, Some(texture));
            self.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MIN_FILTER,
                glow::NEAREST as i32,
            );
            self.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MAG_FILTER,
                glow::NEAREST as i32,
            );
            self.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_WRAP_S,
                glow::CLAMP_TO_EDGE as i32,
            );
            self.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_WRAP_T,
                glow::CLAMP_TO_EDGE as i32,
            );
            self.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                format.internal_format as i32,
                4,
                4,
                0,
                format.format,
                format.type_,
                None,
            );

            self.bind_framebuffer(glow::FRAMEBUFFER, Some(framebuffer));
            self.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                Some(texture),
                0,
            );
            let status = self.check_framebuffer_status(glow::FRAMEBUFFER);

            self.bind_framebuffer(glow::FRAMEBUFFER, None);
            self.bind_texture(glow::TEXTURE_2D, None);
            self.delete_framebuffer(framebuffer);
            self.delete_texture(texture);

            status == glow::FRAMEBUFFER_COMPLETE
        }
    }
}

/// The next wider format to fall back on, if there is one.
fn wider(format: TextureFormat) -> Option<TextureFormat> {
    match format.internal_format {
        glow::R16F => Some(TextureFormat {
            internal_format: glow::RG16F,
            format: glow::RG,
            ..format
        }),
        glow::RG16F => Some(TextureFormat {
            internal_format: glow::RGBA16F,
            format: glow::RGBA,
            ..format
        }),
        _ => None,
    }
}

/// Walks R → RG → RGBA until the probe accepts a format.
///
/// Every step strictly widens the format, so the walk ends after at most
/// three probes.
pub fn supported_format<P>(probe: &P, requested: TextureFormat) -> Option<TextureFormat>
where
    P: RenderTargetProbe + ?Sized,
{
    let mut candidate = requested;
    loop {
        if probe.is_renderable(candidate) {
            return Some(candidate);
        }
        candidate = wider(candidate)?;
    }
}

/// Everything the simulation needs to know about the context it runs on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    pub kind: ContextKind,
    pub shader_version: ShaderVersion,
    pub rgba: TextureFormat,
    pub rg: TextureFormat,
    pub r: TextureFormat,
    /// Filter for the velocity and dye fields. `NEAREST` when half floats
    /// can't be filtered linearly.
    pub filter: u32,
    /// Legacy contexts only have vertex array objects through an extension.
    pub vertex_arrays: bool,
}

impl Capabilities {
    pub fn detect(context: &glow::Context, kind: ContextKind) -> Result<Self> {
        let version = context.version();
        let extensions = context.supported_extensions();
        let shader_version = match (kind, version.is_embedded) {
            (ContextKind::Legacy, _) => ShaderVersion::Gles100,
            (ContextKind::Modern, true) => ShaderVersion::Gles300,
            (ContextKind::Modern, false) => ShaderVersion::Gl330,
        };
        let linear_filtering = !version.is_embedded
            || match kind {
                ContextKind::Modern => has_extension(extensions, "OES_texture_float_linear"),
                ContextKind::Legacy => {
                    has_extension(extensions, "OES_texture_half_float_linear")
                }
            };

        Self::probe(
            context,
            kind,
            shader_version,
            linear_filtering,
            supports_vertex_arrays(kind, extensions),
        )
    }

    pub fn probe<P>(
        probe: &P,
        kind: ContextKind,
        shader_version: ShaderVersion,
        linear_filtering: bool,
        vertex_arrays: bool,
    ) -> Result<Self>
    where
        P: RenderTargetProbe + ?Sized,
    {
        let requested = match kind {
            ContextKind::Modern => [
                (glow::RGBA16F, glow::RGBA),
                (glow::RG16F, glow::RG),
                (glow::R16F, glow::RED),
            ],
            // WebGL1 only knows unsized formats, so every field is RGBA.
            ContextKind::Legacy => [(glow::RGBA, glow::RGBA); 3],
        };
        let type_ = match kind {
            ContextKind::Modern => glow::HALF_FLOAT,
            ContextKind::Legacy => HALF_FLOAT_OES,
        };

        let select = |(internal_format, format): (u32, u32), name: &'static str| {
            supported_format(
                probe,
                TextureFormat {
                    internal_format,
                    format,
                    type_,
                },
            )
            .ok_or(Problem::FormatUnsupported(name))
        };

        let capabilities = Self {
            kind,
            shader_version,
            rgba: select(requested[0], "RGBA")?,
            rg: select(requested[1], "RG")?,
            r: select(requested[2], "R")?,
            filter: if linear_filtering {
                glow::LINEAR
            } else {
                glow::NEAREST
            },
            vertex_arrays,
        };

        log::debug!("Negotiated {:?}", capabilities);

        Ok(capabilities)
    }

    pub fn manual_filtering(&self) -> bool {
        self.filter != glow::LINEAR
    }
}

/// Whether `create_vertex_array` is safe to call. Without the extension,
/// glow panics instead of returning an error.
pub fn supports_vertex_arrays(kind: ContextKind, extensions: &HashSet<String>) -> bool {
    match kind {
        ContextKind::Modern => true,
        ContextKind::Legacy => {
            has_extension(extensions, "OES_vertex_array_object")
                || has_extension(extensions, "ARB_vertex_array_object")
        }
    }
}

// Desktop drivers report extensions with a `GL_` prefix.
fn has_extension(extensions: &HashSet<String>, name: &str) -> bool {
    extensions.contains(name) || extensions.contains(&format!("GL_{}", name))
}
