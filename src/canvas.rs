//! The drawing session: brush state, stroke history and the color palette.

use serde::Deserialize;
use winit::{event::MouseButton, keyboard::ModifiersState};

use crate::{
    cmd::Cmd,
    config::Config,
    draw::Frame,
    input::{Bindings, Key, PRIMARY_BUTTON},
    math::{vec2, Vec2f},
};

pub const MIN_BRUSH_SIZE: f32 = 1.0;
pub const MAX_BRUSH_SIZE: f32 = 100.0;

const GROW_FACTOR: f32 = 1.33;
const SHRINK_FACTOR: f32 = 0.75;
/// Fading multiplies the alpha by this, intensifying divides by it.
const FADE_FACTOR: f32 = 0.75;

const BUTTON_RADIUS: f32 = 40.0;
/// Center of the leftmost palette button.
const PALETTE_ORIGIN: Vec2f = vec2(50.0, 35.0);
/// Distance between neighboring palette buttons, relative to their initial radius.
const BUTTON_SPACING: f32 = 1.42;

const TOOLBAR_CENTER_Y: f32 = 35.0;
const TOOLBAR_HEIGHT: f32 = 70.0;
const TOOLBAR_COLOR: Color = Color::new(0.1, 0.1, 0.1);
const BACKGROUND_COLOR: Color = Color::new(0.95, 0.95, 0.95);

/// An RGB color with channels in range 0-1.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(from = "[f32; 3]")]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0);
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn is_normalized(&self) -> bool {
        [self.r, self.g, self.b]
            .iter()
            .all(|c| (0.0..=1.0).contains(c))
    }
}

impl From<[f32; 3]> for Color {
    fn from([r, g, b]: [f32; 3]) -> Self {
        Self::new(r, g, b)
    }
}

/// The default palette: red, green, blue, yellow, magenta, cyan, white, black.
pub const PALETTE: [Color; 8] = [
    Color::new(1.0, 0.0, 0.0),
    Color::new(0.0, 1.0, 0.0),
    Color::new(0.0, 0.0, 1.0),
    Color::new(1.0, 1.0, 0.0),
    Color::new(1.0, 0.0, 1.0),
    Color::new(0.0, 1.0, 1.0),
    Color::WHITE,
    Color::BLACK,
];

/// A straight segment of paint between two consecutive pointer samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stroke {
    pub start: Vec2f,
    pub end: Vec2f,
    pub width: f32,
    pub color: Color,
    pub alpha: f32,
}

impl Stroke {
    /// Draws the stroke as a capsule: a disc at each end joined by a line of equal width.
    fn draw(&self, frame: &mut Frame) {
        let radius = self.width * 0.5;
        frame.set_color(self.color, self.alpha);
        frame.circle(self.start, radius);
        frame.circle(self.end, radius);
        frame.line(self.start, self.end, self.width);
    }
}

/// A circular button that selects a brush color when clicked.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaletteButton {
    pub center: Vec2f,
    pub radius: f32,
    pub color: Color,
    pub alpha: f32,
}

impl PaletteButton {
    /// Returns whether `point` lies strictly inside the button's circle.
    pub fn contains(&self, point: Vec2f) -> bool {
        self.center.dist_squared(point) < self.radius * self.radius
    }

    /// Draws the disc with a diameter of `radius`, so that it is as wide as a stroke of the
    /// same brush size. The clickable area stays the full `radius`.
    fn draw(&self, frame: &mut Frame) {
        frame.set_color(self.color, self.alpha);
        frame.circle(self.center, self.radius * 0.5);
    }
}

/// Settings applied to newly drawn strokes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Brush {
    size: f32,
    alpha: f32,
    pub color: Color,
}

impl Brush {
    pub fn new(size: f32, alpha: f32, color: Color) -> Self {
        Self {
            size: size.clamp(MIN_BRUSH_SIZE, MAX_BRUSH_SIZE),
            alpha: alpha.clamp(0.0, 1.0),
            color,
        }
    }

    pub fn size(&self) -> f32 {
        self.size
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    fn grow(&mut self) {
        self.size = MAX_BRUSH_SIZE.min(self.size * GROW_FACTOR);
    }

    fn shrink(&mut self) {
        self.size = MIN_BRUSH_SIZE.max(self.size * SHRINK_FACTOR);
    }

    fn fade(&mut self) {
        self.alpha = 0.0f32.max(self.alpha * FADE_FACTOR);
    }

    fn intensify(&mut self) {
        self.alpha = 1.0f32.min(self.alpha / FADE_FACTOR);
    }
}

pub struct Canvas {
    width: f32,
    brush: Brush,
    /// Where the pointer was at the previous drag sample, `None` when no drag is in progress.
    last_pos: Option<Vec2f>,
    strokes: Vec<Stroke>,
    buttons: Vec<PaletteButton>,
    bindings: Bindings,
}

impl Canvas {
    /// Creates an empty canvas for a window of `width`x`height` pixels.
    pub fn setup(width: u32, height: u32, config: &Config) -> Self {
        log::debug!("canvas size: {width}x{height}");

        let brush = Brush::new(config.brush.size, config.brush.alpha, config.brush.color);
        let buttons = config
            .palette
            .iter()
            .enumerate()
            .map(|(i, &color)| PaletteButton {
                center: vec2(
                    PALETTE_ORIGIN.x() + i as f32 * BUTTON_SPACING * BUTTON_RADIUS,
                    PALETTE_ORIGIN.y(),
                ),
                radius: BUTTON_RADIUS,
                color,
                alpha: brush.alpha,
            })
            .collect();

        Self {
            width: width as f32,
            brush,
            last_pos: None,
            strokes: Vec::new(),
            buttons,
            bindings: config.bindings.clone(),
        }
    }

    #[cfg(test)]
    pub fn brush(&self) -> &Brush {
        &self.brush
    }

    #[cfg(test)]
    /// All strokes, oldest first.
    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    #[cfg(test)]
    pub fn buttons(&self) -> &[PaletteButton] {
        &self.buttons
    }

    /// Extends the current drag to `pos`, appending at most one stroke.
    ///
    /// The first sample of a drag only records the position, so that separate drags are never
    /// joined together.
    pub fn on_pointer_move(&mut self, pos: Vec2f, primary_down: bool) {
        if !primary_down {
            self.last_pos = None;
            return;
        }

        if let Some(last) = self.last_pos {
            self.strokes.push(Stroke {
                start: last,
                end: pos,
                width: self.brush.size,
                color: self.brush.color,
                alpha: self.brush.alpha,
            });
        }
        self.last_pos = Some(pos);
    }

    /// Picks the brush color from the palette button under `pos`, if any.
    ///
    /// If buttons overlap, the last one in palette order wins.
    pub fn on_pointer_press(&mut self, button: MouseButton, _mods: ModifiersState, pos: Vec2f) {
        if button != PRIMARY_BUTTON {
            return;
        }

        for b in &self.buttons {
            if b.contains(pos) {
                self.brush.color = b.color;
            }
        }
    }

    /// Ends the current drag.
    pub fn on_pointer_release(&mut self, button: MouseButton) {
        if button == PRIMARY_BUTTON {
            self.last_pos = None;
        }
    }

    /// Runs the command bound to `key` (if any), then syncs the palette with the brush.
    ///
    /// `key` is `None` for presses that carry no usable key, which still resync the palette.
    pub fn on_key_press(&mut self, key: Option<Key>) {
        if let Some(cmd) = key.and_then(|key| self.bindings.get(key)) {
            self.apply(cmd);
        }

        for b in &mut self.buttons {
            b.radius = self.brush.size();
            b.alpha = self.brush.alpha();
        }
    }

    fn apply(&mut self, cmd: Cmd) {
        match cmd {
            Cmd::Grow => self.brush.grow(),
            Cmd::Shrink => self.brush.shrink(),
            Cmd::Fade => self.brush.fade(),
            Cmd::Intensify => self.brush.intensify(),
            Cmd::Clear => {
                log::info!("clearing canvas ({} strokes)", self.strokes.len());
                self.strokes = Vec::new();
            }
        }

        match cmd {
            Cmd::Grow | Cmd::Shrink => log::info!("brush size: {}", self.brush.size()),
            Cmd::Fade | Cmd::Intensify => log::info!("brush alpha: {}", self.brush.alpha()),
            Cmd::Clear => {}
        }
    }

    /// Draws the strokes, then the toolbar and palette on top of them.
    pub fn render(&self, frame: &mut Frame) {
        frame.fill(BACKGROUND_COLOR);

        for stroke in &self.strokes {
            stroke.draw(frame);
        }

        frame.set_color(TOOLBAR_COLOR, 1.0);
        frame.rect(
            vec2(self.width * 0.5, TOOLBAR_CENTER_Y),
            vec2(self.width, TOOLBAR_HEIGHT),
        );
        for b in &self.buttons {
            b.draw(frame);
        }
    }
}

#[cfg(test)]
mod tests {
    use winit::keyboard::{self, NamedKey, NativeKey};

    use super::*;
    use crate::draw::{Paint, Shape};

    const UP: Key = Key::Named(NamedKey::ArrowUp);
    const DOWN: Key = Key::Named(NamedKey::ArrowDown);
    const LEFT: Key = Key::Named(NamedKey::ArrowLeft);
    const RIGHT: Key = Key::Named(NamedKey::ArrowRight);
    const CLEAR: Key = Key::Char('c');

    fn canvas() -> Canvas {
        Canvas::setup(500, 500, &Config::default())
    }

    fn drag(canvas: &mut Canvas, points: &[(f32, f32)]) {
        for &(x, y) in points {
            canvas.on_pointer_move(vec2(x, y), true);
        }
    }

    fn click(canvas: &mut Canvas, x: f32, y: f32) {
        canvas.on_pointer_press(MouseButton::Left, ModifiersState::empty(), vec2(x, y));
    }

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < 0.01
    }

    #[test]
    fn lays_out_palette() {
        let canvas = canvas();
        let buttons = canvas.buttons();
        assert_eq!(buttons.len(), 8);
        for (i, (b, color)) in buttons.iter().zip(PALETTE).enumerate() {
            assert_eq!(b.color, color);
            assert_eq!(b.radius, 40.0);
            assert_eq!(b.alpha, 1.0);
            assert_eq!(b.center.y(), 35.0);
            assert!(approx_eq(b.center.x(), 50.0 + i as f32 * 56.8));
        }
        assert_eq!(canvas.brush().size(), 20.0);
        assert_eq!(canvas.brush().alpha(), 1.0);
        assert_eq!(canvas.brush().color, Color::new(1.0, 0.0, 0.0));
        assert!(canvas.strokes().is_empty());
    }

    #[test]
    fn drag_appends_segments() {
        let mut canvas = canvas();
        canvas.on_key_press(Some(DOWN));
        let size = canvas.brush().size();

        drag(&mut canvas, &[(10.0, 10.0), (20.0, 10.0), (20.0, 20.0)]);

        let paint = |start, end| Stroke {
            start,
            end,
            width: size,
            color: Color::new(1.0, 0.0, 0.0),
            alpha: 1.0,
        };
        assert_eq!(
            canvas.strokes(),
            [
                paint(vec2(10.0, 10.0), vec2(20.0, 10.0)),
                paint(vec2(20.0, 10.0), vec2(20.0, 20.0)),
            ]
        );
    }

    #[test]
    fn moving_without_button_draws_nothing() {
        let mut canvas = canvas();
        canvas.on_pointer_move(vec2(1.0, 1.0), false);
        canvas.on_pointer_move(vec2(2.0, 2.0), false);
        assert!(canvas.strokes().is_empty());

        // a single sample is not a stroke yet
        canvas.on_pointer_move(vec2(3.0, 3.0), true);
        assert!(canvas.strokes().is_empty());
    }

    #[test]
    fn separate_drags_are_not_joined() {
        let mut canvas = canvas();
        drag(&mut canvas, &[(0.0, 100.0), (10.0, 100.0)]);
        canvas.on_pointer_move(vec2(10.0, 100.0), false);
        drag(&mut canvas, &[(200.0, 200.0), (210.0, 200.0)]);

        let strokes = canvas.strokes();
        assert_eq!(strokes.len(), 2);
        assert_eq!(strokes[0].end, vec2(10.0, 100.0));
        assert_eq!(strokes[1].start, vec2(200.0, 200.0));
    }

    #[test]
    fn release_ends_drag_without_motion() {
        let mut canvas = canvas();
        drag(&mut canvas, &[(0.0, 100.0), (10.0, 100.0)]);
        canvas.on_pointer_release(MouseButton::Left);
        drag(&mut canvas, &[(200.0, 200.0), (210.0, 200.0)]);

        let strokes = canvas.strokes();
        assert_eq!(strokes.len(), 2);
        assert_eq!(strokes[1].start, vec2(200.0, 200.0));

        // other buttons don't interrupt the drag
        canvas.on_pointer_release(MouseButton::Right);
        drag(&mut canvas, &[(220.0, 200.0)]);
        assert_eq!(canvas.strokes()[2].start, vec2(210.0, 200.0));
    }

    #[test]
    fn grows_by_a_third() {
        let mut canvas = canvas();
        let mut sizes = Vec::new();
        for _ in 0..3 {
            canvas.on_key_press(Some(UP));
            sizes.push(canvas.brush().size());
        }
        assert!(approx_eq(sizes[0], 26.6));
        assert!(approx_eq(sizes[1], 35.378));
        assert!(approx_eq(sizes[2], 47.05));
    }

    #[test]
    fn size_stays_in_range() {
        let mut canvas = canvas();
        for _ in 0..50 {
            canvas.on_key_press(Some(UP));
            assert!(canvas.brush().size() <= MAX_BRUSH_SIZE);
        }
        assert_eq!(canvas.brush().size(), MAX_BRUSH_SIZE);

        for _ in 0..50 {
            canvas.on_key_press(Some(DOWN));
            assert!(canvas.brush().size() >= MIN_BRUSH_SIZE);
        }
        assert_eq!(canvas.brush().size(), MIN_BRUSH_SIZE);
    }

    #[test]
    fn alpha_stays_in_range() {
        let mut canvas = canvas();
        canvas.on_key_press(Some(RIGHT));
        assert_eq!(canvas.brush().alpha(), 1.0);

        canvas.on_key_press(Some(LEFT));
        assert_eq!(canvas.brush().alpha(), 0.75);

        for _ in 0..200 {
            canvas.on_key_press(Some(LEFT));
            assert!((0.0..=1.0).contains(&canvas.brush().alpha()));
        }
        for _ in 0..400 {
            canvas.on_key_press(Some(RIGHT));
            assert!((0.0..=1.0).contains(&canvas.brush().alpha()));
        }
    }

    #[test]
    fn clear_empties_history() {
        let mut canvas = canvas();
        canvas.on_key_press(Some(CLEAR));
        assert!(canvas.strokes().is_empty());

        drag(&mut canvas, &[(0.0, 0.0), (1.0, 1.0), (2.0, 2.0), (3.0, 3.0)]);
        assert_eq!(canvas.strokes().len(), 3);
        canvas.on_key_press(Some(CLEAR));
        assert!(canvas.strokes().is_empty());
    }

    #[test]
    fn key_press_syncs_palette() {
        let mut canvas = canvas();
        for key in [UP, LEFT, Key::Char('q'), DOWN, CLEAR, RIGHT, LEFT, LEFT] {
            canvas.on_key_press(Some(key));
            let brush = *canvas.brush();
            for b in canvas.buttons() {
                assert_eq!(b.radius, brush.size());
                assert_eq!(b.alpha, brush.alpha());
            }
        }
    }

    #[test]
    fn unbound_key_only_syncs_palette() {
        let mut canvas = canvas();
        drag(&mut canvas, &[(0.0, 0.0), (1.0, 1.0)]);
        let brush = *canvas.brush();
        canvas.on_key_press(Some(Key::Named(NamedKey::Escape)));
        assert_eq!(*canvas.brush(), brush);
        assert_eq!(canvas.strokes().len(), 1);
        assert_eq!(canvas.buttons()[0].radius, 20.0);
    }

    #[test]
    fn unidentified_key_syncs_palette() {
        let mut canvas = canvas();
        assert_eq!(canvas.buttons()[0].radius, 40.0);

        let key = Key::from_logical(&keyboard::Key::Unidentified(NativeKey::Unidentified));
        assert_eq!(key, None);
        canvas.on_key_press(key);

        let brush = *canvas.brush();
        for b in canvas.buttons() {
            assert_eq!(b.radius, brush.size());
            assert_eq!(b.alpha, brush.alpha());
        }
        assert_eq!(brush.size(), 20.0);
    }

    #[test]
    fn palette_discs_are_as_wide_as_strokes() {
        let mut canvas = canvas();
        canvas.on_key_press(Some(UP));
        drag(&mut canvas, &[(100.0, 300.0), (200.0, 300.0)]);

        let mut frame = Frame::new();
        canvas.render(&mut frame);
        let radius_of = |shape: &Shape| match *shape {
            Shape::Circle { radius, .. } => radius,
            _ => panic!("expected a circle, got {shape:?}"),
        };
        let shapes = frame.shapes();
        let stroke_cap = radius_of(&shapes[0]);
        let disc = radius_of(shapes.last().unwrap());
        assert_eq!(disc, stroke_cap);

        // discs stay inside the toolbar and apart from each other
        assert!(disc <= TOOLBAR_HEIGHT * 0.5);
        let spacing = canvas.buttons()[1].center.x() - canvas.buttons()[0].center.x();
        assert!(2.0 * disc < spacing);
    }

    #[test]
    fn click_inside_button_picks_color() {
        let mut canvas = canvas();
        let blue = canvas.buttons()[2];
        click(&mut canvas, blue.center.x(), blue.center.y() + 10.0);
        assert_eq!(canvas.brush().color, blue.color);
    }

    #[test]
    fn click_on_boundary_or_outside_is_ignored() {
        let mut canvas = canvas();
        // single button far from the toolbar's neighbors
        canvas.buttons = vec![PaletteButton {
            center: vec2(100.0, 100.0),
            radius: 10.0,
            color: Color::new(0.0, 0.0, 1.0),
            alpha: 1.0,
        }];

        click(&mut canvas, 110.0, 100.0);
        assert_eq!(canvas.brush().color, Color::new(1.0, 0.0, 0.0));
        click(&mut canvas, 200.0, 200.0);
        assert_eq!(canvas.brush().color, Color::new(1.0, 0.0, 0.0));
        click(&mut canvas, 109.0, 100.0);
        assert_eq!(canvas.brush().color, Color::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn overlapping_buttons_last_wins() {
        let mut canvas = canvas();
        // red (x=50) and green (x=106.8) overlap around x=80 at radius 40
        click(&mut canvas, 80.0, 35.0);
        assert_eq!(canvas.brush().color, PALETTE[1]);
    }

    #[test]
    fn only_primary_button_picks_color() {
        let mut canvas = canvas();
        let green = canvas.buttons()[1];
        canvas.on_pointer_press(MouseButton::Right, ModifiersState::empty(), green.center);
        assert_eq!(canvas.brush().color, Color::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn strokes_use_brush_at_creation() {
        let mut canvas = canvas();
        drag(&mut canvas, &[(0.0, 0.0), (1.0, 0.0)]);
        canvas.on_key_press(Some(UP));
        canvas.on_key_press(Some(LEFT));
        let yellow = canvas.buttons()[3];
        click(&mut canvas, yellow.center.x(), yellow.center.y());
        drag(&mut canvas, &[(2.0, 0.0)]);

        let strokes = canvas.strokes();
        assert_eq!(strokes[0].width, 20.0);
        assert_eq!(strokes[0].alpha, 1.0);
        assert_eq!(strokes[0].color, PALETTE[0]);
        assert!(approx_eq(strokes[1].width, 26.6));
        assert_eq!(strokes[1].alpha, 0.75);
        assert_eq!(strokes[1].color, PALETTE[3]);
    }

    #[test]
    fn renders_strokes_below_toolbar() {
        let mut canvas = canvas();
        drag(&mut canvas, &[(10.0, 10.0), (20.0, 10.0)]);

        let mut frame = Frame::new();
        canvas.render(&mut frame);
        assert_eq!(frame.background(), BACKGROUND_COLOR);

        let red = Paint {
            color: PALETTE[0],
            alpha: 1.0,
        };
        let shapes = frame.shapes();
        assert_eq!(shapes.len(), 3 + 1 + 8);
        assert_eq!(
            shapes[..4],
            [
                Shape::Circle {
                    center: vec2(10.0, 10.0),
                    radius: 10.0,
                    paint: red,
                },
                Shape::Circle {
                    center: vec2(20.0, 10.0),
                    radius: 10.0,
                    paint: red,
                },
                Shape::Line {
                    start: vec2(10.0, 10.0),
                    end: vec2(20.0, 10.0),
                    width: 20.0,
                    paint: red,
                },
                Shape::Rect {
                    center: vec2(250.0, 35.0),
                    size: vec2(500.0, 70.0),
                    paint: Paint {
                        color: TOOLBAR_COLOR,
                        alpha: 1.0,
                    },
                },
            ]
        );
        for (shape, b) in shapes[4..].iter().zip(canvas.buttons()) {
            assert_eq!(
                *shape,
                Shape::Circle {
                    center: b.center,
                    radius: b.radius * 0.5,
                    paint: Paint {
                        color: b.color,
                        alpha: b.alpha,
                    },
                }
            );
        }
    }

    #[test]
    fn later_strokes_render_on_top() {
        let mut canvas = canvas();
        drag(&mut canvas, &[(0.0, 0.0), (5.0, 0.0)]);
        let blue = canvas.buttons()[2];
        click(&mut canvas, blue.center.x(), blue.center.y());
        canvas.on_pointer_move(vec2(5.0, 0.0), false);
        drag(&mut canvas, &[(0.0, 0.0), (5.0, 0.0)]);

        let mut frame = Frame::new();
        canvas.render(&mut frame);
        let colors: Vec<_> = frame.shapes()[..6]
            .iter()
            .map(|shape| match shape {
                Shape::Circle { paint, .. }
                | Shape::Rect { paint, .. }
                | Shape::Line { paint, .. } => paint.color,
            })
            .collect();
        assert_eq!(colors[..3], [PALETTE[0]; 3]);
        assert_eq!(colors[3..], [PALETTE[2]; 3]);
    }
}
