use swirl::negotiate::{self, ContextKind};
use swirl::{Scheduler, Settings, Swirl};

use glutin::config::{Config, ConfigTemplateBuilder, GlConfig};
use glutin::context::{
    ContextApi, ContextAttributesBuilder, GlProfile, NotCurrentContext, NotCurrentGlContext,
    PossiblyCurrentContext, Version,
};
use glutin::display::{Display, DisplayApiPreference, GetGlDisplay, GlDisplay};
use glutin::surface::{GlSurface, Surface, SwapInterval, WindowSurface};
use glutin_winit::GlWindow;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawWindowHandle};
use std::ffi::CString;
use std::num::NonZeroU32;
use std::rc::Rc;
use std::time::Instant;
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalPosition};
use winit::event::{ElementState, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();

    let settings = match std::env::args().nth(1) {
        Some(path) => {
            log::info!("Reading settings from {}", path);
            serde_json::from_str(&std::fs::read_to_string(path)?)?
        }
        None => Settings::default(),
    };

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = App {
        settings: Rc::new(settings),
        start: Instant::now(),
        cursor: PhysicalPosition::new(0.0, 0.0),
        state: None,
    };
    event_loop.run_app(&mut app)?;

    Ok(())
}

struct App {
    settings: Rc<Settings>,
    start: Instant,
    cursor: PhysicalPosition<f64>,
    state: Option<State>,
}

// Fields drop in order: the effect goes before the context it renders with.
struct State {
    scheduler: Scheduler,
    backing_size: (u32, u32),
    gl_surface: Surface<WindowSurface>,
    gl_context: PossiblyCurrentContext,
    window: Window,
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        match create_state(event_loop, &self.settings) {
            Ok(state) => self.state = Some(state),
            Err(problem) => {
                log::error!("{}", problem);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _: WindowId, event: WindowEvent) {
        let Some(state) = self.state.as_mut() else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                state.scheduler.cancel();
                event_loop.exit();
            }

            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = position;
                let pixel_ratio = state.window.scale_factor();
                let logical = position.to_logical::<f64>(pixel_ratio);
                state.scheduler.with_effect(|swirl| {
                    swirl.pointer_moved(logical.x, logical.y, pixel_ratio)
                });
            }

            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } => {
                let pixel_ratio = state.window.scale_factor();
                let logical = self.cursor.to_logical::<f64>(pixel_ratio);
                state.scheduler.with_effect(|swirl| {
                    swirl.pointer_pressed(logical.x, logical.y, pixel_ratio)
                });
            }

            WindowEvent::RedrawRequested => {
                let timestamp = self.start.elapsed().as_secs_f64() * 1000.0;
                let mut surface = DesktopSurface {
                    window: &state.window,
                    gl_surface: &state.gl_surface,
                    gl_context: &state.gl_context,
                    backing_size: &mut state.backing_size,
                };

                if state.scheduler.tick(&mut surface, timestamp) == swirl::Tick::Rendered {
                    if let Err(error) = state.gl_surface.swap_buffers(&state.gl_context) {
                        log::warn!("Cannot swap buffers: {}", error);
                    }
                }
            }

            _ => (),
        }
    }

    fn about_to_wait(&mut self, _: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            state.window.request_redraw();
        }
    }
}

fn create_state(
    event_loop: &ActiveEventLoop,
    settings: &Rc<Settings>,
) -> Result<State, Box<dyn std::error::Error>> {
    let window_attributes = Window::default_attributes()
        .with_title("Swirl")
        .with_inner_size(LogicalSize::new(1280, 800))
        .with_resizable(true)
        .with_transparent(true);

    // WGL only offers modern configs once it has a window to match.
    #[cfg(target_os = "windows")]
    let window = Some(event_loop.create_window(window_attributes.clone())?);
    #[cfg(not(target_os = "windows"))]
    let window: Option<Window> = None;

    let raw_window_handle = window
        .as_ref()
        .map(|window| window.window_handle().map(|handle| handle.as_raw()))
        .transpose()?;
    let display = create_display(event_loop, raw_window_handle)?;

    let mut template = ConfigTemplateBuilder::new().with_alpha_size(8);
    if let Some(raw_window_handle) = raw_window_handle {
        template = template.compatible_with_native_window(raw_window_handle);
    }

    // The effect does its own filtering, so skip multisampling.
    let gl_config = unsafe { display.find_configs(template.build())? }
        .min_by_key(|config| config.num_samples())
        .ok_or("the display offered no GL configs")?;

    let window = match window {
        Some(window) => window,
        None => glutin_winit::finalize_window(event_loop, window_attributes, &gl_config)?,
    };

    let (kind, not_current) = negotiate::first_available(&negotiate::PREFERRED_CONTEXTS, |kind| {
        create_context(&window, &gl_config, kind)
    })?;

    let surface_attributes = window.build_surface_attributes(Default::default())?;
    let gl_surface = unsafe {
        gl_config
            .display()
            .create_window_surface(&gl_config, &surface_attributes)?
    };
    let gl_context = not_current.make_current(&gl_surface)?;

    if let Err(error) =
        gl_surface.set_swap_interval(&gl_context, SwapInterval::Wait(NonZeroU32::MIN))
    {
        log::warn!("Cannot enable vsync: {}", error);
    }

    let display = gl_config.display();
    let context = unsafe {
        glow::Context::from_loader_function(|symbol| match CString::new(symbol) {
            Ok(symbol) => display.get_proc_address(&symbol).cast(),
            Err(_) => std::ptr::null(),
        })
    };
    let context = Rc::new(context);

    let size = window.inner_size();
    let scheduler = Scheduler::new(Swirl::new(
        &context,
        kind,
        size.width,
        size.height,
        settings,
    ));

    Ok(State {
        scheduler,
        backing_size: (size.width, size.height),
        gl_surface,
        gl_context,
        window,
    })
}

fn create_display(
    event_loop: &ActiveEventLoop,
    _raw_window_handle: Option<RawWindowHandle>,
) -> Result<Display, Box<dyn std::error::Error>> {
    #[cfg(target_os = "macos")]
    let preference = DisplayApiPreference::Cgl;

    #[cfg(target_os = "windows")]
    let preference = DisplayApiPreference::WglThenEgl(_raw_window_handle);

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let preference = DisplayApiPreference::EglThenGlx(Box::new(
        winit::platform::x11::register_xlib_error_hook,
    ));

    let handle = event_loop.display_handle()?.as_raw();
    Ok(unsafe { Display::new(handle, preference)? })
}

fn create_context(
    window: &Window,
    gl_config: &Config,
    kind: ContextKind,
) -> Option<NotCurrentContext> {
    let raw_window_handle = window
        .window_handle()
        .ok()
        .map(|handle| handle.as_raw());
    let display = gl_config.display();

    let attempts: &[(ContextApi, Option<GlProfile>)] = match kind {
        ContextKind::Modern => &[
            (ContextApi::OpenGl(Some(Version::new(3, 3))), Some(GlProfile::Core)),
            (ContextApi::Gles(Some(Version::new(3, 0))), None),
        ],
        ContextKind::Legacy => &[(ContextApi::Gles(Some(Version::new(2, 0))), None)],
    };

    attempts.iter().find_map(|&(api, profile)| {
        let mut attributes = ContextAttributesBuilder::new().with_context_api(api);
        if let Some(profile) = profile {
            attributes = attributes.with_profile(profile);
        }
        let attributes = attributes.build(raw_window_handle);

        match unsafe { display.create_context(gl_config, &attributes) } {
            Ok(context) => Some(context),
            Err(error) => {
                log::debug!("Cannot create a {:?} context: {}", api, error);
                None
            }
        }
    })
}

struct DesktopSurface<'a> {
    window: &'a Window,
    gl_surface: &'a Surface<WindowSurface>,
    gl_context: &'a PossiblyCurrentContext,
    backing_size: &'a mut (u32, u32),
}

impl swirl::Surface for DesktopSurface<'_> {
    fn displayed_size(&self) -> (f64, f64) {
        let size = self.window.inner_size().to_logical::<f64>(self.pixel_ratio());
        (size.width, size.height)
    }

    fn pixel_ratio(&self) -> f64 {
        self.window.scale_factor()
    }

    fn backing_size(&self) -> (u32, u32) {
        *self.backing_size
    }

    fn set_backing_size(&mut self, width: u32, height: u32) {
        *self.backing_size = (width, height);

        // Minimised windows report a zero size.
        if let (Some(width), Some(height)) = (NonZeroU32::new(width), NonZeroU32::new(height)) {
            self.gl_surface.resize(self.gl_context, width, height);
        }
    }
}
