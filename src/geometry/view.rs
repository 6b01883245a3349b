use std::sync::Arc;

use serde::Serialize;

use crate::camera::types::Resolution;

pub const DEFAULT_ASPECT_RATIO: f64 = 16.0 / 9.0;
pub const DEFAULT_MIN_WIDTH: f64 = 240.0;

/// Named display sizes, as fractions of the container width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    Small,
    Medium,
    Large,
    Full,
}

impl Preset {
    pub fn fraction(self) -> f64 {
        match self {
            Self::Small => 0.4,
            Self::Medium => 0.65,
            Self::Large => 0.85,
            Self::Full => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "preset")]
pub enum SizeMode {
    Preset(Preset),
    Custom,
}

/// Current display size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewGeometry {
    pub width: f64,
    pub height: f64,
    pub aspect_ratio: f64,
    pub mode: SizeMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEventKind {
    Move,
    Up,
}

/// Handle returned when a listener is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerToken(pub u64);

/// The surface pointer listeners are attached to (usually the window).
pub trait PointerEvents: Send + Sync {
    fn attach(&self, kind: PointerEventKind) -> ListenerToken;
    fn detach(&self, token: ListenerToken);
}

/// An active resize gesture. Owns its listeners and detaches them on drop.
struct ResizeDrag {
    events: Arc<dyn PointerEvents>,
    tokens: Vec<ListenerToken>,
    origin_x: f64,
    origin_width: f64,
}

impl ResizeDrag {
    fn begin(events: Arc<dyn PointerEvents>, origin_x: f64, origin_width: f64) -> Self {
        let tokens = vec![
            events.attach(PointerEventKind::Move),
            events.attach(PointerEventKind::Up),
        ];
        Self {
            events,
            tokens,
            origin_x,
            origin_width,
        }
    }
}

impl Drop for ResizeDrag {
    fn drop(&mut self) {
        for token in self.tokens.drain(..) {
            self.events.detach(token);
        }
    }
}

/// Computes the displayed width and height of the video.
pub struct ViewGeometryManager {
    container_width: f64,
    min_width: f64,
    aspect_ratio: f64,
    aspect_fixed: bool,
    mode: SizeMode,
    width: f64,
    drag: Option<ResizeDrag>,
}

impl ViewGeometryManager {
    pub fn new(container_width: f64, min_width: f64) -> Self {
        let mut manager = Self {
            container_width: container_width.max(0.0),
            min_width,
            aspect_ratio: DEFAULT_ASPECT_RATIO,
            aspect_fixed: false,
            mode: SizeMode::Preset(Preset::Full),
            width: 0.0,
            drag: None,
        };
        manager.apply_preset(Preset::Full);
        manager
    }

    pub fn geometry(&self) -> ViewGeometry {
        ViewGeometry {
            width: self.width,
            height: self.width / self.aspect_ratio,
            aspect_ratio: self.aspect_ratio,
            mode: self.mode,
        }
    }

    pub fn container_width(&self) -> f64 {
        self.container_width
    }

    /// Fix the aspect ratio from the camera's native resolution.
    ///
    /// Only the first call after construction or [`reset_aspect`] takes
    /// effect; returns whether it did.
    ///
    /// [`reset_aspect`]: Self::reset_aspect
    pub fn set_native_resolution(&mut self, resolution: Resolution) -> bool {
        if self.aspect_fixed {
            return false;
        }
        let Some(ratio) = resolution.aspect_ratio() else {
            return false;
        };
        self.aspect_ratio = ratio;
        self.aspect_fixed = true;
        self.reapply();
        true
    }

    /// Unlock the aspect ratio so the next camera start can fix a new one.
    pub fn reset_aspect(&mut self) {
        self.aspect_ratio = DEFAULT_ASPECT_RATIO;
        self.aspect_fixed = false;
        self.reapply();
    }

    pub fn apply_preset(&mut self, preset: Preset) {
        self.mode = SizeMode::Preset(preset);
        self.width = self.clamp_width(self.container_width * preset.fraction());
    }

    pub fn set_container_width(&mut self, width: f64) {
        self.container_width = width.max(0.0);
        self.reapply();
    }

    /// Start a drag-resize at pointer position `pointer_x`.
    ///
    /// Any drag already in progress is ended first.
    pub fn begin_resize(&mut self, events: Arc<dyn PointerEvents>, pointer_x: f64) {
        self.drag = None;
        self.drag = Some(ResizeDrag::begin(events, pointer_x, self.width));
    }

    /// Track the pointer during a drag. Ignored when no drag is active.
    pub fn update_resize(&mut self, pointer_x: f64) -> bool {
        let Some(drag) = &self.drag else {
            return false;
        };
        let width = drag.origin_width + (pointer_x - drag.origin_x);
        self.width = self.clamp_width(width);
        self.mode = SizeMode::Custom;
        true
    }

    pub fn end_resize(&mut self) {
        self.drag = None;
    }

    /// Window lost focus; the pointer-up may never arrive.
    pub fn on_blur(&mut self) {
        self.drag = None;
    }

    pub fn is_resizing(&self) -> bool {
        self.drag.is_some()
    }

    fn reapply(&mut self) {
        match self.mode {
            SizeMode::Preset(preset) => self.apply_preset(preset),
            SizeMode::Custom => self.width = self.clamp_width(self.width),
        }
    }

    fn clamp_width(&self, width: f64) -> f64 {
        let min = self.min_width.min(self.container_width);
        width.clamp(min, self.container_width)
    }
}

impl Default for ViewGeometryManager {
    fn default() -> Self {
        Self::new(1280.0, DEFAULT_MIN_WIDTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashSet;

    #[derive(Default)]
    struct FakeWindow {
        next: Mutex<u64>,
        attached: Mutex<HashSet<ListenerToken>>,
    }

    impl FakeWindow {
        fn attached(&self) -> usize {
            self.attached.lock().len()
        }
    }

    impl PointerEvents for FakeWindow {
        fn attach(&self, _kind: PointerEventKind) -> ListenerToken {
            let mut next = self.next.lock();
            *next += 1;
            let token = ListenerToken(*next);
            self.attached.lock().insert(token);
            token
        }

        fn detach(&self, token: ListenerToken) {
            self.attached.lock().remove(&token);
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn hd_manager(container: f64) -> ViewGeometryManager {
        let mut m = ViewGeometryManager::new(container, DEFAULT_MIN_WIDTH);
        m.set_native_resolution(Resolution::new(1280, 720));
        m
    }

    #[test]
    fn small_preset_on_hd_camera() {
        let mut m = hd_manager(800.0);
        m.apply_preset(Preset::Small);
        let g = m.geometry();
        assert!(approx(g.width, 320.0));
        assert!(approx(g.height, 180.0));
        assert_eq!(g.mode, SizeMode::Preset(Preset::Small));
    }

    #[test]
    fn full_preset_fills_container() {
        for container in [300.0, 640.0, 1024.0, 1917.0] {
            for res in [Resolution::new(1280, 720), Resolution::new(640, 480)] {
                let mut m = ViewGeometryManager::new(container, DEFAULT_MIN_WIDTH);
                m.set_native_resolution(res);
                m.apply_preset(Preset::Full);
                let g = m.geometry();
                assert_eq!(g.width, container);
                assert!(approx(g.height, container / g.aspect_ratio));
            }
        }
    }

    #[test]
    fn aspect_ratio_fixed_once_per_start() {
        let mut m = ViewGeometryManager::new(800.0, DEFAULT_MIN_WIDTH);
        assert!(m.set_native_resolution(Resolution::new(640, 480)));
        assert!(!m.set_native_resolution(Resolution::new(1280, 720)));
        assert!(approx(m.geometry().aspect_ratio, 4.0 / 3.0));

        m.reset_aspect();
        assert!(m.set_native_resolution(Resolution::new(1280, 720)));
        assert!(approx(m.geometry().aspect_ratio, 16.0 / 9.0));
    }

    #[test]
    fn default_aspect_until_known() {
        let m = ViewGeometryManager::new(800.0, DEFAULT_MIN_WIDTH);
        assert!(approx(m.geometry().aspect_ratio, DEFAULT_ASPECT_RATIO));
    }

    #[test]
    fn drag_tracks_pointer_within_bounds() {
        let window = Arc::new(FakeWindow::default());
        let mut m = hd_manager(800.0);
        m.apply_preset(Preset::Medium);
        let start = m.geometry().width;

        m.begin_resize(window.clone(), 500.0);
        assert!(m.update_resize(450.0));
        let g = m.geometry();
        assert!(approx(g.width, start - 50.0));
        assert!(approx(g.height, g.width * 9.0 / 16.0));
        assert_eq!(g.mode, SizeMode::Custom);

        m.update_resize(-10_000.0);
        assert!(approx(m.geometry().width, DEFAULT_MIN_WIDTH));
        m.update_resize(10_000.0);
        assert!(approx(m.geometry().width, 800.0));
    }

    #[test]
    fn custom_mode_sticks_until_preset_selected() {
        let window = Arc::new(FakeWindow::default());
        let mut m = hd_manager(800.0);
        m.begin_resize(window, 800.0);
        m.update_resize(600.0);
        m.end_resize();

        m.set_container_width(500.0);
        assert_eq!(m.geometry().mode, SizeMode::Custom);
        assert!(approx(m.geometry().width, 500.0));

        m.apply_preset(Preset::Large);
        assert!(approx(m.geometry().width, 425.0));
    }

    #[test]
    fn listeners_detach_on_every_exit_path() {
        let window = Arc::new(FakeWindow::default());
        let mut m = hd_manager(800.0);

        m.begin_resize(window.clone(), 0.0);
        assert_eq!(window.attached(), 2);
        m.end_resize();
        assert_eq!(window.attached(), 0);

        m.begin_resize(window.clone(), 0.0);
        m.on_blur();
        assert_eq!(window.attached(), 0);
        assert!(!m.update_resize(10.0));

        m.begin_resize(window.clone(), 0.0);
        m.begin_resize(window.clone(), 0.0);
        assert_eq!(window.attached(), 2);

        drop(m);
        assert_eq!(window.attached(), 0);
    }

    #[test]
    fn geometry_serialises_mode() {
        let mut m = hd_manager(800.0);
        m.apply_preset(Preset::Small);
        let json = serde_json::to_value(m.geometry()).unwrap();
        assert_eq!(json["mode"]["kind"], "preset");
        assert_eq!(json["mode"]["preset"], "small");
        assert!(json["aspectRatio"].is_number());
    }
}
