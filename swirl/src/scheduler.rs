//! Drives the effect once per frame and keeps its fields matched to the
//! surface.

use crate::swirl::{Problem, Swirl};

/// The drawable a host renders into.
pub trait Surface {
    /// Size on screen, in logical pixels.
    fn displayed_size(&self) -> (f64, f64);

    fn pixel_ratio(&self) -> f64;

    /// Size of the backing store, in device pixels.
    fn backing_size(&self) -> (u32, u32);

    fn set_backing_size(&mut self, width: u32, height: u32);
}

pub fn physical_from_logical_size((width, height): (f64, f64), pixel_ratio: f64) -> (u32, u32) {
    (
        (width * pixel_ratio).floor().max(0.0) as u32,
        (height * pixel_ratio).floor().max(0.0) as u32,
    )
}

/// Something that can be animated frame by frame.
pub trait Animation {
    fn resize(&mut self, physical_width: u32, physical_height: u32) -> Result<(), Problem>;

    fn animate(&mut self, timestamp: f64);
}

impl Animation for Swirl {
    fn resize(&mut self, physical_width: u32, physical_height: u32) -> Result<(), Problem> {
        Swirl::resize(self, physical_width, physical_height)
    }

    fn animate(&mut self, timestamp: f64) {
        Swirl::animate(self, timestamp)
    }
}

/// A running effect, or nothing at all when it couldn't start.
pub enum Effect<A> {
    Active(A),
    Inert,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tick {
    Rendered,
    /// The effect failed at some point and only no-ops remain.
    Inert,
    Cancelled,
}

pub struct Scheduler<A = Swirl> {
    effect: Effect<A>,
    cancelled: bool,
}

impl<A: Animation> Scheduler<A> {
    /// Failures degrade to an inert effect rather than reaching the host.
    pub fn new(effect: Result<A, Problem>) -> Self {
        let effect = match effect {
            Ok(animation) => Effect::Active(animation),
            Err(problem) => {
                log::warn!("Disabling the effect: {}", problem);
                Effect::Inert
            }
        };

        Self {
            effect,
            cancelled: false,
        }
    }

    pub fn tick<S>(&mut self, surface: &mut S, timestamp: f64) -> Tick
    where
        S: Surface + ?Sized,
    {
        if self.cancelled {
            return Tick::Cancelled;
        }

        let Effect::Active(animation) = &mut self.effect else {
            return Tick::Inert;
        };

        let (width, height) =
            physical_from_logical_size(surface.displayed_size(), surface.pixel_ratio());
        if surface.backing_size() != (width, height) {
            surface.set_backing_size(width, height);

            if let Err(problem) = animation.resize(width, height) {
                log::warn!("Disabling the effect after a failed resize: {}", problem);
                self.effect = Effect::Inert;
                return Tick::Inert;
            }
        }

        animation.animate(timestamp);
        Tick::Rendered
    }

    /// Stops the loop and releases the effect.
    pub fn cancel(&mut self) {
        if !self.cancelled {
            log::debug!("Cancelling the render loop");
        }
        self.cancelled = true;
        self.effect = Effect::Inert;
    }

    /// Runs `f` against the effect if it is still running.
    pub fn with_effect<T, F>(&mut self, f: F) -> Option<T>
    where
        F: FnOnce(&mut A) -> T,
    {
        match &mut self.effect {
            Effect::Active(animation) if !self.cancelled => Some(f(animation)),
            _ => None,
        }
    }

    pub fn is_inert(&self) -> bool {
        matches!(self.effect, Effect::Inert)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[derive(Default)]
    struct Journal {
        resizes: RefCell<Vec<(u32, u32)>>,
        frames: Cell<usize>,
        dropped: Cell<bool>,
    }

    struct FakeAnimation {
        journal: Rc<Journal>,
        fail_resize: bool,
    }

    impl FakeAnimation {
        fn new(journal: &Rc<Journal>) -> Self {
            Self {
                journal: Rc::clone(journal),
                fail_resize: false,
            }
        }
    }

    impl Drop for FakeAnimation {
        fn drop(&mut self) {
            self.journal.dropped.set(true);
        }
    }

    impl Animation for FakeAnimation {
        fn resize(&mut self, width: u32, height: u32) -> Result<(), Problem> {
            self.journal.resizes.borrow_mut().push((width, height));
            if self.fail_resize {
                Err(Problem::CannotRender(
                    crate::render::Problem::CannotCreateFramebuffer,
                ))
            } else {
                Ok(())
            }
        }

        fn animate(&mut self, _: f64) {
            self.journal.frames.set(self.journal.frames.get() + 1);
        }
    }

    struct FakeSurface {
        displayed: (f64, f64),
        pixel_ratio: f64,
        backing: (u32, u32),
    }

    impl Surface for FakeSurface {
        fn displayed_size(&self) -> (f64, f64) {
            self.displayed
        }
        fn pixel_ratio(&self) -> f64 {
            self.pixel_ratio
        }
        fn backing_size(&self) -> (u32, u32) {
            self.backing
        }
        fn set_backing_size(&mut self, width: u32, height: u32) {
            self.backing = (width, height);
        }
    }

    fn surface() -> FakeSurface {
        FakeSurface {
            displayed: (800.0, 600.0),
            pixel_ratio: 2.0,
            backing: (1600, 1200),
        }
    }

    #[test]
    fn renders_without_resizing_a_matching_surface() {
        let journal = Rc::new(Journal::default());
        let mut scheduler = Scheduler::new(Ok(FakeAnimation::new(&journal)));
        let mut surface = surface();

        assert_eq!(scheduler.tick(&mut surface, 16.0), Tick::Rendered);
        assert_eq!(scheduler.tick(&mut surface, 32.0), Tick::Rendered);

        assert!(journal.resizes.borrow().is_empty());
        assert_eq!(journal.frames.get(), 2);
    }

    #[test]
    fn reconciles_the_backing_size() {
        let journal = Rc::new(Journal::default());
        let mut scheduler = Scheduler::new(Ok(FakeAnimation::new(&journal)));
        let mut surface = surface();
        surface.displayed = (500.3, 300.9);
        surface.pixel_ratio = 1.5;

        scheduler.tick(&mut surface, 16.0);
        scheduler.tick(&mut surface, 32.0);

        assert_eq!(surface.backing, (750, 451));
        assert_eq!(*journal.resizes.borrow(), vec![(750, 451)]);
    }

    #[test]
    fn a_failed_start_is_inert() {
        let mut scheduler: Scheduler<FakeAnimation> =
            Scheduler::new(Err(Problem::InvalidSettings("nope".to_string())));
        let mut surface = surface();

        assert!(scheduler.is_inert());
        assert_eq!(scheduler.tick(&mut surface, 16.0), Tick::Inert);
        assert_eq!(scheduler.with_effect(|_| ()), None);
    }

    #[test]
    fn a_failed_resize_disables_the_effect() {
        let journal = Rc::new(Journal::default());
        let mut animation = FakeAnimation::new(&journal);
        animation.fail_resize = true;
        let mut scheduler = Scheduler::new(Ok(animation));
        let mut surface = surface();
        surface.displayed = (100.0, 100.0);

        assert_eq!(scheduler.tick(&mut surface, 16.0), Tick::Inert);
        assert_eq!(scheduler.tick(&mut surface, 32.0), Tick::Inert);
        assert_eq!(journal.frames.get(), 0);
        assert!(journal.dropped.get());
    }

    #[test]
    fn cancelling_releases_the_effect_and_stops_ticks() {
        let journal = Rc::new(Journal::default());
        let mut scheduler = Scheduler::new(Ok(FakeAnimation::new(&journal)));
        let mut surface = surface();

        scheduler.tick(&mut surface, 16.0);
        scheduler.cancel();

        assert!(journal.dropped.get());
        assert!(scheduler.is_cancelled());
        for timestamp in [32.0, 48.0] {
            assert_eq!(scheduler.tick(&mut surface, timestamp), Tick::Cancelled);
        }
        assert_eq!(journal.frames.get(), 1);
        assert_eq!(scheduler.with_effect(|_| ()), None);
    }

    #[test]
    fn forwards_to_a_running_effect() {
        let journal = Rc::new(Journal::default());
        let mut scheduler = Scheduler::new(Ok(FakeAnimation::new(&journal)));

        let frames = scheduler.with_effect(|animation| {
            animation.animate(0.0);
            animation.journal.frames.get()
        });
        assert_eq!(frames, Some(1));
    }

    #[test]
    fn rounds_physical_sizes_down() {
        assert_eq!(physical_from_logical_size((333.7, 100.0), 1.0), (333, 100));
        assert_eq!(physical_from_logical_size((100.0, 100.0), 1.25), (125, 125));
        assert_eq!(physical_from_logical_size((0.0, 0.0), 3.0), (0, 0));
    }
}
