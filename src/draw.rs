//! Immediate-mode drawing primitives, recorded into a display list.
//!
//! [`Canvas::render`](crate::canvas::Canvas::render) issues its draw calls against a [`Frame`],
//! which the renderer then turns into GPU instances.

use crate::{canvas::Color, math::Vec2f};

/// Color and opacity that a shape is filled with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Paint {
    pub color: Color,
    pub alpha: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Circle {
        center: Vec2f,
        radius: f32,
        paint: Paint,
    },
    /// Axis-aligned rectangle.
    Rect {
        center: Vec2f,
        size: Vec2f,
        paint: Paint,
    },
    /// Thick line segment with flat ends.
    Line {
        start: Vec2f,
        end: Vec2f,
        width: f32,
        paint: Paint,
    },
}

pub struct Frame {
    background: Color,
    paint: Paint,
    shapes: Vec<Shape>,
}

impl Frame {
    pub fn new() -> Self {
        Self {
            background: Color::BLACK,
            paint: Paint {
                color: Color::BLACK,
                alpha: 1.0,
            },
            shapes: Vec::new(),
        }
    }

    /// Empties the frame while keeping its allocation around for the next one.
    pub fn reset(&mut self) {
        *self = Self {
            shapes: std::mem::take(&mut self.shapes),
            ..Self::new()
        };
        self.shapes.clear();
    }

    /// Fills the whole frame with `color`, covering everything drawn so far.
    pub fn fill(&mut self, color: Color) {
        self.background = color;
        self.shapes.clear();
    }

    /// Sets the paint used by subsequent shapes.
    pub fn set_color(&mut self, color: Color, alpha: f32) {
        self.paint = Paint { color, alpha };
    }

    pub fn circle(&mut self, center: Vec2f, radius: f32) {
        self.shapes.push(Shape::Circle {
            center,
            radius,
            paint: self.paint,
        });
    }

    pub fn rect(&mut self, center: Vec2f, size: Vec2f) {
        self.shapes.push(Shape::Rect {
            center,
            size,
            paint: self.paint,
        });
    }

    pub fn line(&mut self, start: Vec2f, end: Vec2f, width: f32) {
        self.shapes.push(Shape::Line {
            start,
            end,
            width,
            paint: self.paint,
        });
    }

    pub fn background(&self) -> Color {
        self.background
    }

    /// Shapes in back-to-front order.
    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }
}
