//! Software rasterizer backed by `vello_cpu`.

use kurbo::Affine;

use crate::error::{VetraError, VetraResult};
use crate::geometry::MultiBezier;
use crate::model::{Bitmap, Color, FillRule, LineCap, LineJoin};
use crate::render::{ClipOp, Fill, LayerTracker, Paint, Renderer, Stroke};

/// Renders into an owned RGBA pixmap. Binding a zero-sized or oversized
/// target is an error, never a silent no-op.
pub struct SoftwareRenderer {
    width: u16,
    height: u16,
    ctx: vello_cpu::RenderContext,
    pixmap: vello_cpu::Pixmap,
    background: Option<Color>,
    transform: Affine,
    fill: Option<Fill>,
    stroke: Option<Stroke>,
    next_opacity: f64,
    layers: LayerTracker,
    /// Clip-layer count per compositing scope; index 0 is the frame scope.
    clip_scopes: Vec<usize>,
}

impl SoftwareRenderer {
    pub fn new(width: u32, height: u32) -> VetraResult<Self> {
        if width == 0 || height == 0 {
            return Err(VetraError::render("render target must not be empty"));
        }
        let width: u16 = width
            .try_into()
            .map_err(|_| VetraError::render("render target width exceeds u16"))?;
        let height: u16 = height
            .try_into()
            .map_err(|_| VetraError::render("render target height exceeds u16"))?;
        Ok(Self {
            width,
            height,
            ctx: vello_cpu::RenderContext::new(width, height),
            pixmap: vello_cpu::Pixmap::new(width, height),
            background: None,
            transform: Affine::IDENTITY,
            fill: None,
            stroke: None,
            next_opacity: 1.0,
            layers: LayerTracker::default(),
            clip_scopes: vec![0],
        })
    }

    pub fn set_background(&mut self, color: Color) {
        self.background = Some(color);
    }

    pub fn width(&self) -> u32 {
        u32::from(self.width)
    }

    pub fn height(&self) -> u32 {
        u32::from(self.height)
    }

    /// Premultiplied RGBA8 pixels of the last finished frame.
    pub fn pixels(&self) -> &[u8] {
        self.pixmap.data_as_u8_slice()
    }

    fn prepare_paint(&mut self, paint: &Paint, alpha: f64) {
        self.ctx
            .set_transform(affine_to_cpu(self.transform));
        self.ctx
            .set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
        match paint {
            Paint::Color(c) => {
                self.ctx.set_paint(color_to_cpu(*c, alpha));
            }
            Paint::LinearGradient { start, end, stops } => {
                let gradient = vello_cpu::peniko::Gradient::new_linear(
                    point_to_cpu(*start),
                    point_to_cpu(*end),
                )
                .with_stops(stops_to_cpu(stops, alpha).as_slice());
                self.ctx.set_paint(gradient);
            }
            Paint::RadialGradient {
                center,
                radius,
                highlight,
                stops,
            } => {
                let gradient = vello_cpu::peniko::Gradient::new_two_point_radial(
                    point_to_cpu(*highlight),
                    0.0,
                    point_to_cpu(*center),
                    *radius as f32,
                )
                .with_stops(stops_to_cpu(stops, alpha).as_slice());
                self.ctx.set_paint(gradient);
            }
        }
    }
}

impl Renderer for SoftwareRenderer {
    fn render_start(&mut self) -> VetraResult<()> {
        self.ctx = vello_cpu::RenderContext::new(self.width, self.height);
        self.transform = Affine::IDENTITY;
        self.fill = None;
        self.stroke = None;
        self.next_opacity = 1.0;
        self.layers.reset();
        self.clip_scopes.clear();
        self.clip_scopes.push(0);

        if let Some(bg) = self.background {
            self.ctx.set_paint(color_to_cpu(bg, 1.0));
            self.ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
                0.0,
                0.0,
                f64::from(self.width),
                f64::from(self.height),
            ));
        }
        Ok(())
    }

    fn render_end(&mut self) -> VetraResult<()> {
        self.layers.finish()?;
        for _ in 0..self.clip_scopes.pop().unwrap_or(0) {
            self.ctx.pop_layer();
        }
        self.ctx.flush();
        self.ctx.render_to_pixmap(&mut self.pixmap);
        Ok(())
    }

    fn set_fill(&mut self, fill: Fill) {
        self.fill = Some(fill);
    }

    fn set_stroke(&mut self, stroke: Stroke) {
        self.stroke = Some(stroke);
    }

    fn draw_path(&mut self, path: &MultiBezier) -> VetraResult<()> {
        let cpu_path = bezpath_to_cpu(&path.to_bez_path());
        if let Some(fill) = self.fill.take() {
            self.prepare_paint(&fill.paint, fill.opacity);
            self.ctx.set_fill_rule(match fill.rule {
                FillRule::NonZero => vello_cpu::peniko::Fill::NonZero,
                FillRule::EvenOdd => vello_cpu::peniko::Fill::EvenOdd,
            });
            self.ctx.fill_path(&cpu_path);
        }
        if let Some(stroke) = self.stroke.take() {
            self.prepare_paint(&stroke.paint, stroke.opacity);
            self.ctx.set_stroke(stroke_to_cpu(&stroke));
            self.ctx.stroke_path(&cpu_path);
        }
        Ok(())
    }

    fn draw_image(&mut self, image: &Bitmap, opacity: f64) -> VetraResult<()> {
        if image.rgba.is_empty() {
            return Ok(());
        }
        let paint = bitmap_to_image(image)?;
        self.ctx.set_transform(affine_to_cpu(self.transform));
        self.ctx
            .set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
        self.ctx.set_paint(paint);

        let opaque = opacity >= 1.0;
        if !opaque {
            self.ctx.push_opacity_layer(opacity as f32);
        }
        self.ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
            0.0,
            0.0,
            f64::from(image.width),
            f64::from(image.height),
        ));
        if !opaque {
            self.ctx.pop_layer();
        }
        Ok(())
    }

    fn set_opacity(&mut self, opacity: f64) {
        self.next_opacity = opacity.clamp(0.0, 1.0);
    }

    fn layer_start(&mut self) -> VetraResult<()> {
        let opacity = std::mem::replace(&mut self.next_opacity, 1.0);
        self.ctx.push_opacity_layer(opacity as f32);
        self.layers.push();
        self.clip_scopes.push(0);
        Ok(())
    }

    fn layer_end(&mut self) -> VetraResult<()> {
        self.layers.pop()?;
        for _ in 0..self.clip_scopes.pop().unwrap_or(0) {
            self.ctx.pop_layer();
        }
        self.ctx.pop_layer();
        Ok(())
    }

    fn clip_rect(&mut self, rect: kurbo::Rect, op: ClipOp) -> VetraResult<()> {
        let path = MultiBezier::from_bez_path(&kurbo::Shape::to_path(&rect, 1e-9));
        self.clip_path(&path, op)
    }

    fn clip_path(&mut self, path: &MultiBezier, op: ClipOp) -> VetraResult<()> {
        if op == ClipOp::Replace
            && let Some(count) = self.clip_scopes.last_mut()
        {
            for _ in 0..*count {
                self.ctx.pop_layer();
            }
            *count = 0;
        }
        self.ctx.set_transform(affine_to_cpu(self.transform));
        self.ctx
            .push_clip_layer(&bezpath_to_cpu(&path.to_bez_path()));
        if let Some(count) = self.clip_scopes.last_mut() {
            *count += 1;
        }
        Ok(())
    }

    fn set_transform(&mut self, affine: Affine) {
        self.transform = affine;
    }

    fn current_transform(&self) -> Affine {
        self.transform
    }
}

fn color_to_cpu(c: Color, alpha: f64) -> vello_cpu::peniko::Color {
    let a = (f64::from(c.a) * alpha.clamp(0.0, 1.0)).round() as u8;
    vello_cpu::peniko::Color::from_rgba8(c.r, c.g, c.b, a)
}

fn stops_to_cpu(
    stops: &[crate::model::GradientStop],
    alpha: f64,
) -> Vec<(f32, vello_cpu::peniko::Color)> {
    stops
        .iter()
        .map(|s| (s.offset as f32, color_to_cpu(s.color, alpha)))
        .collect()
}

fn stroke_to_cpu(stroke: &Stroke) -> vello_cpu::kurbo::Stroke {
    let mut out = vello_cpu::kurbo::Stroke::new(stroke.width)
        .with_caps(match stroke.cap {
            LineCap::Butt => vello_cpu::kurbo::Cap::Butt,
            LineCap::Round => vello_cpu::kurbo::Cap::Round,
            LineCap::Square => vello_cpu::kurbo::Cap::Square,
        })
        .with_join(match stroke.join {
            LineJoin::Miter => vello_cpu::kurbo::Join::Miter,
            LineJoin::Round => vello_cpu::kurbo::Join::Round,
            LineJoin::Bevel => vello_cpu::kurbo::Join::Bevel,
        })
        .with_miter_limit(stroke.miter_limit);
    if !stroke.dashes.is_empty() {
        out = out.with_dashes(stroke.dash_offset, stroke.dashes.iter().copied());
    }
    out
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn point_to_cpu(p: kurbo::Point) -> vello_cpu::kurbo::Point {
    vello_cpu::kurbo::Point::new(p.x, p.y)
}

fn bezpath_to_cpu(path: &kurbo::BezPath) -> vello_cpu::kurbo::BezPath {
    use kurbo::PathEl;

    let mut out = vello_cpu::kurbo::BezPath::new();
    for &el in path.elements() {
        match el {
            PathEl::MoveTo(p) => out.move_to(point_to_cpu(p)),
            PathEl::LineTo(p) => out.line_to(point_to_cpu(p)),
            PathEl::QuadTo(p1, p2) => out.quad_to(point_to_cpu(p1), point_to_cpu(p2)),
            PathEl::CurveTo(p1, p2, p3) => {
                out.curve_to(point_to_cpu(p1), point_to_cpu(p2), point_to_cpu(p3));
            }
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}

fn bitmap_to_image(bitmap: &Bitmap) -> VetraResult<vello_cpu::Image> {
    let expected = bitmap.width as usize * bitmap.height as usize * 4;
    if bitmap.rgba.len() != expected {
        return Err(VetraError::render("bitmap byte length mismatch"));
    }
    let w: u16 = bitmap
        .width
        .try_into()
        .map_err(|_| VetraError::render("bitmap width exceeds u16"))?;
    let h: u16 = bitmap
        .height
        .try_into()
        .map_err(|_| VetraError::render("bitmap height exceeds u16"))?;

    let mut may_have_opacities = false;
    let mut pixels = Vec::with_capacity(bitmap.rgba.len() / 4);
    for px in bitmap.rgba.chunks_exact(4) {
        let a = px[3];
        may_have_opacities |= a != 255;
        let af = u16::from(a) + 1;
        let premul = |c: u8| -> u8 { ((u16::from(c) * af) >> 8) as u8 };
        pixels.push(vello_cpu::peniko::color::PremulRgba8 {
            r: premul(px[0]),
            g: premul(px[1]),
            b: premul(px[2]),
            a,
        });
    }

    let pixmap = vello_cpu::Pixmap::from_parts_with_opacity(pixels, w, h, may_have_opacities);
    Ok(vello_cpu::Image {
        image: vello_cpu::ImageSource::Pixmap(std::sync::Arc::new(pixmap)),
        sampler: vello_cpu::peniko::ImageSampler::default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_target() {
        assert!(SoftwareRenderer::new(0, 10).is_err());
        assert!(SoftwareRenderer::new(10, 0).is_err());
        assert!(SoftwareRenderer::new(100_000, 10).is_err());
    }

    #[test]
    fn unbalanced_layers_fail_render_end() {
        let mut r = SoftwareRenderer::new(4, 4).unwrap();
        r.render_start().unwrap();
        r.layer_start().unwrap();
        assert!(r.render_end().is_err());
    }

    #[test]
    fn fill_covers_pixels() {
        let mut r = SoftwareRenderer::new(4, 4).unwrap();
        r.render_start().unwrap();
        r.set_fill(Fill {
            paint: Paint::Color(Color::rgb(255, 0, 0)),
            rule: FillRule::NonZero,
            opacity: 1.0,
        });
        let path = MultiBezier::from_bez_path(&kurbo::Shape::to_path(
            &kurbo::Rect::new(0.0, 0.0, 4.0, 4.0),
            1e-9,
        ));
        r.draw_path(&path).unwrap();
        r.render_end().unwrap();
        assert!(r.pixels().chunks_exact(4).any(|px| px[0] > 0));
    }
}
