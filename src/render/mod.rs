//! Backend-agnostic draw interface consumed by the scene-graph paint
//! traversal.
//!
//! Paint state is two-phase: `set_fill` / `set_stroke` stage state that the
//! next `draw_path` consumes and clears. Opacity set through `set_opacity`
//! applies to the next compositing layer as a group-level multiplier, not as
//! per-draw alpha. Every `layer_start` must be matched by one `layer_end`
//! before `render_end`.

pub mod cpu;
#[cfg(feature = "gpu")]
pub mod gpu;
pub mod record;

use kurbo::{Affine, Rect, Vec2};

use crate::error::{VetraError, VetraResult};
use crate::geometry::MultiBezier;
use crate::model::{Bitmap, Color, FillRule, GradientStop, LineCap, LineJoin};

/// Resolved paint source, with document asset references already expanded.
#[derive(Clone, Debug, PartialEq)]
pub enum Paint {
    Color(Color),
    LinearGradient {
        start: kurbo::Point,
        end: kurbo::Point,
        stops: Vec<GradientStop>,
    },
    RadialGradient {
        center: kurbo::Point,
        radius: f64,
        highlight: kurbo::Point,
        stops: Vec<GradientStop>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Fill {
    pub paint: Paint,
    pub rule: FillRule,
    pub opacity: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Stroke {
    pub paint: Paint,
    pub width: f64,
    pub cap: LineCap,
    pub join: LineJoin,
    pub miter_limit: f64,
    pub dashes: Vec<f64>,
    pub dash_offset: f64,
    pub opacity: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClipOp {
    /// Drop any clip already active in the current compositing scope.
    Replace,
    Intersect,
}

pub trait Renderer {
    fn render_start(&mut self) -> VetraResult<()>;

    /// Finishes the frame. Fails if any compositing layer is still open or
    /// a `layer_end` ever underflowed the stack.
    fn render_end(&mut self) -> VetraResult<()>;

    fn set_fill(&mut self, fill: Fill);
    fn set_stroke(&mut self, stroke: Stroke);

    /// Draws with the staged fill and/or stroke, then clears both.
    fn draw_path(&mut self, path: &MultiBezier) -> VetraResult<()>;

    fn draw_image(&mut self, image: &Bitmap, opacity: f64) -> VetraResult<()>;

    /// Stages the opacity for the next `layer_start`.
    fn set_opacity(&mut self, opacity: f64);
    fn layer_start(&mut self) -> VetraResult<()>;
    fn layer_end(&mut self) -> VetraResult<()>;

    fn clip_rect(&mut self, rect: Rect, op: ClipOp) -> VetraResult<()>;
    fn clip_path(&mut self, path: &MultiBezier, op: ClipOp) -> VetraResult<()>;

    fn set_transform(&mut self, affine: Affine);
    fn current_transform(&self) -> Affine;

    fn translate(&mut self, offset: Vec2) {
        self.set_transform(self.current_transform() * Affine::translate(offset));
    }

    fn scale(&mut self, x: f64, y: f64) {
        self.set_transform(self.current_transform() * Affine::scale_non_uniform(x, y));
    }
}

/// Layer-balance bookkeeping shared by all backends. An underflow latches
/// so that `render_end` still fails even if the depth recovers.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct LayerTracker {
    depth: usize,
    underflow: bool,
}

impl LayerTracker {
    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }

    pub(crate) fn push(&mut self) {
        self.depth += 1;
    }

    pub(crate) fn pop(&mut self) -> VetraResult<()> {
        if self.depth == 0 {
            self.underflow = true;
            return Err(VetraError::render("layer_end without matching layer_start"));
        }
        self.depth -= 1;
        Ok(())
    }

    pub(crate) fn finish(&self) -> VetraResult<()> {
        if self.underflow {
            return Err(VetraError::render("compositing layer stack underflowed"));
        }
        if self.depth != 0 {
            return Err(VetraError::render(format!(
                "{} compositing layers left open at render_end",
                self.depth
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracker_balanced() {
        let mut t = LayerTracker::default();
        t.push();
        t.push();
        t.pop().unwrap();
        t.pop().unwrap();
        assert!(t.finish().is_ok());
    }

    #[test]
    fn tracker_underflow_latches() {
        let mut t = LayerTracker::default();
        assert!(t.pop().is_err());
        t.push();
        t.pop().unwrap();
        assert!(t.finish().is_err());
    }

    #[test]
    fn tracker_open_layer_fails() {
        let mut t = LayerTracker::default();
        t.push();
        assert!(t.finish().is_err());
    }
}
