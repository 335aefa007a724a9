//! Command-capturing backend. Stands in for an external immediate-mode
//! painter and doubles as the layer-balance test vehicle.

use kurbo::Affine;

use crate::error::VetraResult;
use crate::geometry::MultiBezier;
use crate::model::Bitmap;
use crate::render::{ClipOp, Fill, LayerTracker, Renderer, Stroke};

#[derive(Clone, Debug)]
pub enum Command {
    Start,
    End,
    DrawPath {
        fill: Option<Fill>,
        stroke: Option<Stroke>,
        path: MultiBezier,
        transform: Affine,
    },
    DrawImage {
        width: u32,
        height: u32,
        opacity: f64,
        transform: Affine,
    },
    LayerStart {
        opacity: f64,
    },
    LayerEnd,
    ClipRect {
        rect: kurbo::Rect,
        op: ClipOp,
    },
    ClipPath {
        path: MultiBezier,
        op: ClipOp,
    },
}

#[derive(Default)]
pub struct RecordingRenderer {
    commands: Vec<Command>,
    transform: Affine,
    fill: Option<Fill>,
    stroke: Option<Stroke>,
    next_opacity: f64,
    layers: LayerTracker,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self {
            next_opacity: 1.0,
            ..Self::default()
        }
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn into_commands(self) -> Vec<Command> {
        self.commands
    }
}

impl Renderer for RecordingRenderer {
    fn render_start(&mut self) -> VetraResult<()> {
        self.commands.clear();
        self.transform = Affine::IDENTITY;
        self.fill = None;
        self.stroke = None;
        self.next_opacity = 1.0;
        self.layers.reset();
        self.commands.push(Command::Start);
        Ok(())
    }

    fn render_end(&mut self) -> VetraResult<()> {
        self.layers.finish()?;
        self.commands.push(Command::End);
        Ok(())
    }

    fn set_fill(&mut self, fill: Fill) {
        self.fill = Some(fill);
    }

    fn set_stroke(&mut self, stroke: Stroke) {
        self.stroke = Some(stroke);
    }

    fn draw_path(&mut self, path: &MultiBezier) -> VetraResult<()> {
        self.commands.push(Command::DrawPath {
            fill: self.fill.take(),
            stroke: self.stroke.take(),
            path: path.clone(),
            transform: self.transform,
        });
        Ok(())
    }

    fn draw_image(&mut self, image: &Bitmap, opacity: f64) -> VetraResult<()> {
        self.commands.push(Command::DrawImage {
            width: image.width,
            height: image.height,
            opacity,
            transform: self.transform,
        });
        Ok(())
    }

    fn set_opacity(&mut self, opacity: f64) {
        self.next_opacity = opacity;
    }

    fn layer_start(&mut self) -> VetraResult<()> {
        let opacity = std::mem::replace(&mut self.next_opacity, 1.0);
        self.commands.push(Command::LayerStart { opacity });
        self.layers.push();
        Ok(())
    }

    fn layer_end(&mut self) -> VetraResult<()> {
        self.layers.pop()?;
        self.commands.push(Command::LayerEnd);
        Ok(())
    }

    fn clip_rect(&mut self, rect: kurbo::Rect, op: ClipOp) -> VetraResult<()> {
        self.commands.push(Command::ClipRect { rect, op });
        Ok(())
    }

    fn clip_path(&mut self, path: &MultiBezier, op: ClipOp) -> VetraResult<()> {
        self.commands.push(Command::ClipPath {
            path: path.clone(),
            op,
        });
        Ok(())
    }

    fn set_transform(&mut self, affine: Affine) {
        self.transform = affine;
    }

    fn current_transform(&self) -> Affine {
        self.transform
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_are_consumed_by_draw() {
        let mut r = RecordingRenderer::new();
        r.render_start().unwrap();
        r.set_fill(Fill {
            paint: crate::render::Paint::Color(crate::model::Color::BLACK),
            rule: crate::model::FillRule::NonZero,
            opacity: 1.0,
        });
        r.draw_path(&MultiBezier::new()).unwrap();
        r.draw_path(&MultiBezier::new()).unwrap();
        r.render_end().unwrap();

        let cmds = r.commands();
        let Command::DrawPath { fill, .. } = &cmds[1] else {
            panic!("expected draw");
        };
        assert!(fill.is_some());
        let Command::DrawPath { fill, stroke, .. } = &cmds[2] else {
            panic!("expected draw");
        };
        assert!(fill.is_none() && stroke.is_none());
    }

    #[test]
    fn layer_opacity_is_staged() {
        let mut r = RecordingRenderer::new();
        r.render_start().unwrap();
        r.set_opacity(0.5);
        r.layer_start().unwrap();
        r.layer_end().unwrap();
        r.layer_start().unwrap();
        r.render_end().unwrap_err();

        let Command::LayerStart { opacity } = r.commands()[1] else {
            panic!("expected layer start");
        };
        assert_eq!(opacity, 0.5);
        // Staged opacity does not leak into the next layer.
        let Command::LayerStart { opacity } = r.commands()[3] else {
            panic!("expected layer start");
        };
        assert_eq!(opacity, 1.0);
    }
}
