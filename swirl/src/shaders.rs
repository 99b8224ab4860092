use crate::render::{self, Context, Program};

static BASE_VERT_SHADER: &str = include_str!("../shaders/base.vert");
static COPY_FRAG_SHADER: &str = include_str!("../shaders/copy.frag");
static CLEAR_FRAG_SHADER: &str = include_str!("../shaders/clear.frag");
static SPLAT_FRAG_SHADER: &str = include_str!("../shaders/splat.frag");
static ADVECT_FRAG_SHADER: &str = include_str!("../shaders/advect.frag");
static DIVERGENCE_FRAG_SHADER: &str = include_str!("../shaders/divergence.frag");
static CURL_FRAG_SHADER: &str = include_str!("../shaders/curl.frag");
static VORTICITY_FRAG_SHADER: &str = include_str!("../shaders/vorticity.frag");
static PRESSURE_FRAG_SHADER: &str = include_str!("../shaders/pressure.frag");
static GRADIENT_SUBTRACT_FRAG_SHADER: &str = include_str!("../shaders/gradient_subtract.frag");
static DISPLAY_FRAG_SHADER: &str = include_str!("../shaders/display.frag");

/// The GLSL dialect a context accepts.
///
/// The shaders are written once, against a handful of macros
/// (`ATTRIBUTE`, `VARYING`, `fragColor`, `texture`), and the preamble maps
/// those onto each dialect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShaderVersion {
    /// Desktop OpenGL 3.3 core.
    Gl330,
    /// WebGL2 and OpenGL ES 3.0.
    Gles300,
    /// WebGL1 and OpenGL ES 2.0.
    Gles100,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Vertex,
    Fragment,
}

const HIGHP_FRAGMENT_PRECISION: &str = "#ifdef GL_FRAGMENT_PRECISION_HIGH
precision highp float;
#else
precision mediump float;
#endif
";

impl ShaderVersion {
    pub fn preamble(&self, stage: Stage) -> String {
        use ShaderVersion::*;
        use Stage::*;

        let header = match (self, stage) {
            (Gl330, Vertex) => "#version 330 core\n#define ATTRIBUTE in\n#define VARYING out\n",
            (Gl330, Fragment) => "#version 330 core\n#define VARYING in\nout vec4 fragColor;\n",
            (Gles300, Vertex) => {
                "#version 300 es\nprecision highp float;\n#define ATTRIBUTE in\n#define VARYING out\n"
            }
            (Gles300, Fragment) => {
                "#version 300 es\nprecision highp float;\nprecision highp sampler2D;\n#define VARYING in\nout vec4 fragColor;\n"
            }
            (Gles100, Vertex) => {
                "#version 100\nprecision highp float;\n#define ATTRIBUTE attribute\n#define VARYING varying\n"
            }
            (Gles100, Fragment) => {
                return format!(
                    "#version 100\n{}#define VARYING varying\n#define fragColor gl_FragColor\n#define texture texture2D\n",
                    HIGHP_FRAGMENT_PRECISION
                );
            }
        };

        header.to_string()
    }

    /// Prefixes `source` with the dialect preamble and any `#define`s.
    pub fn prepare(&self, stage: Stage, source: &str, defines: &[&str]) -> String {
        let preamble = defines
            .iter()
            .fold(self.preamble(stage), |preamble, name| {
                preamble + &format!("#define {}\n", name)
            });

        preamble + source
    }
}

/// The fixed set of programs the simulation runs.
pub struct Programs {
    pub copy: Program,
    pub clear: Program,
    pub splat: Program,
    pub advect: Program,
    pub divergence: Program,
    pub curl: Program,
    pub vorticity: Program,
    pub pressure: Program,
    pub gradient_subtract: Program,
    pub display: Program,
}

pub const PROGRAM_SOURCES: [(&str, &str); 10] = [
    ("copy", COPY_FRAG_SHADER),
    ("clear", CLEAR_FRAG_SHADER),
    ("splat", SPLAT_FRAG_SHADER),
    ("advect", ADVECT_FRAG_SHADER),
    ("divergence", DIVERGENCE_FRAG_SHADER),
    ("curl", CURL_FRAG_SHADER),
    ("vorticity", VORTICITY_FRAG_SHADER),
    ("pressure", PRESSURE_FRAG_SHADER),
    ("gradient_subtract", GRADIENT_SUBTRACT_FRAG_SHADER),
    ("display", DISPLAY_FRAG_SHADER),
];

impl Programs {
    pub fn new(
        context: &Context,
        version: ShaderVersion,
        manual_filtering: bool,
    ) -> render::Result<Self> {
        let defines: &[&str] = if manual_filtering {
            &["MANUAL_FILTERING"]
        } else {
            &[]
        };
        let vertex_shader = version.prepare(Stage::Vertex, BASE_VERT_SHADER, defines);

        let build = |name: &'static str, fragment_source: &str| {
            let fragment_shader = version.prepare(Stage::Fragment, fragment_source, defines);
            Program::new(context, name, (&vertex_shader, &fragment_shader)).map_err(|problem| {
                log::error!("{}", problem);
                problem
            })
        };

        let programs = Self {
            copy: build("copy", COPY_FRAG_SHADER)?,
            clear: build("clear", CLEAR_FRAG_SHADER)?,
            splat: build("splat", SPLAT_FRAG_SHADER)?,
            advect: build("advect", ADVECT_FRAG_SHADER)?,
            divergence: build("divergence", DIVERGENCE_FRAG_SHADER)?,
            curl: build("curl", CURL_FRAG_SHADER)?,
            vorticity: build("vorticity", VORTICITY_FRAG_SHADER)?,
            pressure: build("pressure", PRESSURE_FRAG_SHADER)?,
            gradient_subtract: build("gradient_subtract", GRADIENT_SUBTRACT_FRAG_SHADER)?,
            display: build("display", DISPLAY_FRAG_SHADER)?,
        };

        log::debug!(
            "Compiled {} programs for {:?}{}",
            PROGRAM_SOURCES.len(),
            version,
            if manual_filtering {
                " with manual filtering"
            } else {
                ""
            }
        );

        Ok(programs)
    }
}
