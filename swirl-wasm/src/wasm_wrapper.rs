use swirl::negotiate::{self, ContextKind};
use swirl::{Scheduler, Settings, Tick};

use gloo_utils::format::JsValueSerdeExt;
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{HtmlCanvasElement, MouseEvent, Window};

type FrameCallback = Closure<dyn FnMut(f64)>;
type PointerCallback = Closure<dyn FnMut(MouseEvent)>;

struct Shared {
    scheduler: Scheduler,
    canvas: HtmlCanvasElement,
    /// The pending `requestAnimationFrame` handle.
    frame: Option<i32>,
}

#[wasm_bindgen]
pub struct Swirl {
    shared: Rc<RefCell<Shared>>,
    animate: Rc<RefCell<Option<FrameCallback>>>,
    listeners: Vec<(&'static str, PointerCallback)>,
}

#[wasm_bindgen]
impl Swirl {
    #[wasm_bindgen(constructor)]
    pub fn new(canvas_id: &str, settings_object: &JsValue) -> Result<Swirl, JsValue> {
        set_panic_hook();
        // A second instance finds the logger already installed.
        console_log::init_with_level(log::Level::Debug).ok();

        let settings: Settings = if settings_object.is_undefined() || settings_object.is_null() {
            Settings::default()
        } else {
            settings_object
                .into_serde()
                .map_err(|err| JsValue::from_str(&err.to_string()))?
        };
        let settings = Rc::new(settings);

        let window = window()?;
        let canvas = window
            .document()
            .and_then(|document| document.get_element_by_id(canvas_id))
            .ok_or_else(|| {
                JsValue::from_str(&format!("Cannot find a canvas with id `{}`", canvas_id))
            })?
            .dyn_into::<HtmlCanvasElement>()?;

        let (physical_width, physical_height) = swirl::scheduler::physical_from_logical_size(
            (
                f64::from(canvas.client_width()),
                f64::from(canvas.client_height()),
            ),
            window.device_pixel_ratio(),
        );
        canvas.set_width(physical_width);
        canvas.set_height(physical_height);

        let effect = negotiate::first_available(&negotiate::PREFERRED_CONTEXTS, |kind| {
            create_context(&canvas, kind)
        })
        .map_err(swirl::Problem::from)
        .and_then(|(kind, context)| {
            swirl::Swirl::new(
                &Rc::new(context),
                kind,
                physical_width,
                physical_height,
                &settings,
            )
        });

        let shared = Rc::new(RefCell::new(Shared {
            scheduler: Scheduler::new(effect),
            canvas,
            frame: None,
        }));

        let mut swirl = Self {
            shared,
            animate: Rc::new(RefCell::new(None)),
            listeners: Vec::new(),
        };
        swirl.listen(&window)?;

        Ok(swirl)
    }

    /// Starts the frame loop. Does nothing if it is already running.
    pub fn start(&mut self) -> Result<(), JsValue> {
        if self.shared.borrow().frame.is_some() || self.shared.borrow().scheduler.is_cancelled() {
            return Ok(());
        }

        let shared = Rc::clone(&self.shared);
        let next = Rc::clone(&self.animate);
        let animate = Closure::wrap(Box::new(move |timestamp: f64| {
            let mut shared = shared.borrow_mut();
            let Shared {
                scheduler,
                canvas,
                frame,
            } = &mut *shared;

            let mut surface = CanvasSurface { canvas: &*canvas };
            *frame = match scheduler.tick(&mut surface, timestamp) {
                Tick::Rendered => next
                    .borrow()
                    .as_ref()
                    .and_then(|callback| request_animation_frame(callback).ok()),
                Tick::Inert | Tick::Cancelled => None,
            };
        }) as Box<dyn FnMut(f64)>);

        let frame = request_animation_frame(&animate)?;
        *self.animate.borrow_mut() = Some(animate);
        self.shared.borrow_mut().frame = Some(frame);

        Ok(())
    }

    /// Stops the loop, detaches the listeners and releases every GPU resource.
    pub fn destroy(&mut self) -> Result<(), JsValue> {
        let window = window()?;

        {
            let mut shared = self.shared.borrow_mut();
            shared.scheduler.cancel();
            if let Some(frame) = shared.frame.take() {
                window.cancel_animation_frame(frame)?;
            }
        }

        for (event, listener) in self.listeners.drain(..) {
            window.remove_event_listener_with_callback(event, listener.as_ref().unchecked_ref())?;
        }

        // Breaks the cycle between the frame callback and itself.
        self.animate.borrow_mut().take();

        Ok(())
    }
}

impl Drop for Swirl {
    fn drop(&mut self) {
        if let Err(error) = self.destroy() {
            log::warn!("Cannot tear down cleanly: {:?}", error);
        }
    }
}

impl Swirl {
    fn listen(&mut self, window: &Window) -> Result<(), JsValue> {
        let shared = Rc::clone(&self.shared);
        let on_move = Closure::wrap(Box::new(move |event: MouseEvent| {
            let mut shared = shared.borrow_mut();
            let (x, y) = client_position(&shared.canvas, &event);
            let pixel_ratio = device_pixel_ratio();
            shared
                .scheduler
                .with_effect(|swirl| swirl.pointer_moved(x, y, pixel_ratio));
        }) as Box<dyn FnMut(MouseEvent)>);

        let shared = Rc::clone(&self.shared);
        let on_press = Closure::wrap(Box::new(move |event: MouseEvent| {
            let mut shared = shared.borrow_mut();
            let (x, y) = client_position(&shared.canvas, &event);
            let pixel_ratio = device_pixel_ratio();
            shared
                .scheduler
                .with_effect(|swirl| swirl.pointer_pressed(x, y, pixel_ratio));
        }) as Box<dyn FnMut(MouseEvent)>);

        for (event, listener) in [("mousemove", on_move), ("mousedown", on_press)] {
            window.add_event_listener_with_callback(event, listener.as_ref().unchecked_ref())?;
            self.listeners.push((event, listener));
        }

        Ok(())
    }
}

struct CanvasSurface<'a> {
    canvas: &'a HtmlCanvasElement,
}

impl swirl::Surface for CanvasSurface<'_> {
    fn displayed_size(&self) -> (f64, f64) {
        (
            f64::from(self.canvas.client_width()),
            f64::from(self.canvas.client_height()),
        )
    }

    fn pixel_ratio(&self) -> f64 {
        device_pixel_ratio()
    }

    fn backing_size(&self) -> (u32, u32) {
        (self.canvas.width(), self.canvas.height())
    }

    fn set_backing_size(&mut self, width: u32, height: u32) {
        self.canvas.set_width(width);
        self.canvas.set_height(height);
    }
}

fn create_context(canvas: &HtmlCanvasElement, kind: ContextKind) -> Option<glow::Context> {
    use web_sys::{WebGl2RenderingContext, WebGlRenderingContext};

    let options = ContextOptions {
        // The effect is composited over the page.
        alpha: true,
        depth: false,
        stencil: false,
        antialias: false,
        power_preference: "default",
        premultiplied_alpha: true,
        preserve_drawing_buffer: false,
    }
    .serialize()
    .ok()?;

    match kind {
        ContextKind::Modern => {
            let gl = get_context(canvas, "webgl2", &options)?
                .dyn_into::<WebGl2RenderingContext>()
                .ok()?;
            gl.get_extension("EXT_color_buffer_float").ok()?;
            gl.get_extension("OES_texture_float_linear").ok()?;

            Some(glow::Context::from_webgl2_context(gl))
        }

        ContextKind::Legacy => {
            let gl = ["webgl", "experimental-webgl"].iter().find_map(|id| {
                get_context(canvas, id, &options)
                    .and_then(|gl| gl.dyn_into::<WebGlRenderingContext>().ok())
            })?;

            // Half floats are the one extension legacy contexts can't do without.
            gl.get_extension("OES_texture_half_float").ok()??;
            gl.get_extension("OES_texture_half_float_linear").ok()?;
            gl.get_extension("EXT_color_buffer_half_float").ok()?;

            Some(glow::Context::from_webgl1_context(gl))
        }
    }
}

fn get_context(
    canvas: &HtmlCanvasElement,
    context_id: &str,
    options: &JsValue,
) -> Option<js_sys::Object> {
    match canvas.get_context_with_context_options(context_id, options) {
        Ok(context) => context,
        Err(error) => {
            log::debug!("Cannot get a `{}` context: {:?}", context_id, error);
            None
        }
    }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ContextOptions {
    pub alpha: bool,
    pub depth: bool,
    pub stencil: bool,
    pub antialias: bool,
    pub power_preference: &'static str,
    pub premultiplied_alpha: bool,
    pub preserve_drawing_buffer: bool,
}

impl ContextOptions {
    pub fn serialize(&self) -> Result<JsValue, serde_json::Error> {
        JsValue::from_serde(self)
    }
}

fn client_position(canvas: &HtmlCanvasElement, event: &MouseEvent) -> (f64, f64) {
    let rect = canvas.get_bounding_client_rect();
    (
        f64::from(event.client_x()) - rect.left(),
        f64::from(event.client_y()) - rect.top(),
    )
}

fn request_animation_frame(callback: &FrameCallback) -> Result<i32, JsValue> {
    window()?.request_animation_frame(callback.as_ref().unchecked_ref())
}

fn device_pixel_ratio() -> f64 {
    web_sys::window().map_or(1.0, |window| window.device_pixel_ratio())
}

fn window() -> Result<Window, JsValue> {
    web_sys::window().ok_or_else(|| JsValue::from_str("The global `window` doesn’t exist"))
}

// https://github.com/rustwasm/console_error_panic_hook#readme
fn set_panic_hook() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}
