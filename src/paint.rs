//! Depth-first scene-graph traversal emitting draw calls into a bound
//! renderer at a single time sample.
//!
//! Stylers paint the union of the sibling shapes that precede them in the
//! child list, so a group's shapes are collected first and replayed once per
//! fill or stroke node.

use kurbo::Affine;

use crate::animation::FrameTime;
use crate::error::{VetraError, VetraResult};
use crate::geometry::MultiBezier;
use crate::model::{
    Brush, Color, Composition, Document, FillStyle, Group, Layer, NodeKind, PrecompLayer,
    StrokeStyle,
};
use crate::render::{ClipOp, Fill, Paint, Renderer, Stroke};

/// Precomp cycles terminate here instead of recursing forever.
const MAX_PRECOMP_DEPTH: usize = 32;

/// Renders one frame of `comp` into the renderer, resolving brush assets
/// against `doc`.
#[tracing::instrument(skip_all, fields(comp = %comp.name, time))]
pub fn render_composition(
    doc: &Document,
    comp: &Composition,
    time: FrameTime,
    renderer: &mut dyn Renderer,
) -> VetraResult<()> {
    renderer.render_start()?;
    let mut painter = Painter { doc, renderer };
    painter.composition(comp, time, Affine::IDENTITY, 0)?;
    painter.renderer.render_end()
}

/// Renders the document's main composition.
pub fn render_document(
    doc: &Document,
    time: FrameTime,
    renderer: &mut dyn Renderer,
) -> VetraResult<()> {
    let comp = doc
        .main()
        .ok_or_else(|| VetraError::render("document has no compositions"))?;
    render_composition(doc, comp, time, renderer)
}

struct Painter<'a> {
    doc: &'a Document,
    renderer: &'a mut dyn Renderer,
}

impl Painter<'_> {
    fn composition(
        &mut self,
        comp: &Composition,
        time: FrameTime,
        affine: Affine,
        depth: usize,
    ) -> VetraResult<()> {
        if let Some(bg) = comp.background {
            let rect = kurbo::Rect::new(0.0, 0.0, comp.width, comp.height);
            self.renderer.set_transform(affine);
            self.renderer.set_fill(Fill {
                paint: Paint::Color(bg),
                rule: crate::model::FillRule::NonZero,
                opacity: 1.0,
            });
            self.renderer
                .draw_path(&MultiBezier::from_bez_path(&kurbo::Shape::to_path(
                    &rect, 1e-9,
                )))?;
        }
        self.children(&comp.nodes, time, affine, depth)
    }

    fn children(
        &mut self,
        nodes: &[crate::model::Node],
        time: FrameTime,
        affine: Affine,
        depth: usize,
    ) -> VetraResult<()> {
        // Shapes accumulate until a styler replays them.
        let mut shapes: Vec<MultiBezier> = Vec::new();
        for node in nodes {
            if !node.visible {
                continue;
            }
            match &node.kind {
                NodeKind::Shape(shape) => shapes.push(shape.to_path(time)),
                NodeKind::Fill(fill) => self.fill_shapes(fill, &shapes, time, affine)?,
                NodeKind::Stroke(stroke) => self.stroke_shapes(stroke, &shapes, time, affine)?,
                NodeKind::Layer(layer) => self.layer(layer, time, affine, depth)?,
                NodeKind::Group(group) => self.group(group, time, affine, depth)?,
                NodeKind::Image(image) => self.image(image, time, affine)?,
                NodeKind::Precomp(precomp) => self.precomp(precomp, time, affine, depth)?,
            }
        }
        Ok(())
    }

    fn layer(
        &mut self,
        layer: &Layer,
        time: FrameTime,
        affine: Affine,
        depth: usize,
    ) -> VetraResult<()> {
        if !layer.in_range(time) {
            return Ok(());
        }
        let local = affine * layer.group.transform.to_affine(time);
        self.renderer
            .set_opacity(layer.group.opacity.get_at(time).clamp(0.0, 1.0));
        self.renderer.layer_start()?;
        if let Some(mask) = &layer.mask {
            self.renderer.set_transform(local);
            self.renderer.clip_path(&mask.to_path(time), ClipOp::Intersect)?;
        }
        self.children(&layer.group.children, time, local, depth)?;
        self.renderer.layer_end()
    }

    fn group(
        &mut self,
        group: &Group,
        time: FrameTime,
        affine: Affine,
        depth: usize,
    ) -> VetraResult<()> {
        let local = affine * group.transform.to_affine(time);
        self.renderer
            .set_opacity(group.opacity.get_at(time).clamp(0.0, 1.0));
        self.renderer.layer_start()?;
        self.children(&group.children, time, local, depth)?;
        self.renderer.layer_end()
    }

    fn image(
        &mut self,
        image: &crate::model::ImageShape,
        time: FrameTime,
        affine: Affine,
    ) -> VetraResult<()> {
        let Some(bitmap) = self.doc.assets.bitmaps.get(&image.asset) else {
            return Ok(());
        };
        self.renderer
            .set_transform(affine * image.transform.to_affine(time));
        self.renderer
            .draw_image(bitmap, image.opacity.get_at(time).clamp(0.0, 1.0))
    }

    fn precomp(
        &mut self,
        precomp: &PrecompLayer,
        time: FrameTime,
        affine: Affine,
        depth: usize,
    ) -> VetraResult<()> {
        if depth >= MAX_PRECOMP_DEPTH {
            return Err(VetraError::render(format!(
                "precomp nesting exceeds {MAX_PRECOMP_DEPTH} levels"
            )));
        }
        if time < precomp.start_time || time > precomp.end_time {
            return Ok(());
        }
        let Some(comp) = self.doc.composition(&precomp.composition) else {
            return Ok(());
        };
        let local = affine * precomp.transform.to_affine(time);
        self.renderer
            .set_opacity(precomp.opacity.get_at(time).clamp(0.0, 1.0));
        self.renderer.layer_start()?;
        self.composition(comp, time + precomp.time_offset, local, depth + 1)?;
        self.renderer.layer_end()
    }

    fn fill_shapes(
        &mut self,
        fill: &FillStyle,
        shapes: &[MultiBezier],
        time: FrameTime,
        affine: Affine,
    ) -> VetraResult<()> {
        let paint = self.resolve_brush(&fill.brush, time);
        for path in shapes {
            self.renderer.set_transform(affine);
            self.renderer.set_fill(Fill {
                paint: paint.clone(),
                rule: fill.rule,
                opacity: fill.opacity.get_at(time).clamp(0.0, 1.0),
            });
            self.renderer.draw_path(path)?;
        }
        Ok(())
    }

    fn stroke_shapes(
        &mut self,
        stroke: &StrokeStyle,
        shapes: &[MultiBezier],
        time: FrameTime,
        affine: Affine,
    ) -> VetraResult<()> {
        let paint = self.resolve_brush(&stroke.brush, time);
        for path in shapes {
            self.renderer.set_transform(affine);
            self.renderer.set_stroke(Stroke {
                paint: paint.clone(),
                width: stroke.width.get_at(time).max(0.0),
                cap: stroke.cap,
                join: stroke.join,
                miter_limit: stroke.miter_limit,
                dashes: stroke.dashes.clone(),
                dash_offset: stroke.dash_offset,
                opacity: stroke.opacity.get_at(time).clamp(0.0, 1.0),
            });
            self.renderer.draw_path(path)?;
        }
        Ok(())
    }

    /// Expands a brush into a concrete paint. Dangling asset references
    /// paint as transparent.
    fn resolve_brush(&self, brush: &Brush, time: FrameTime) -> Paint {
        match brush {
            Brush::Flat(color) => Paint::Color(color.get_at(time)),
            Brush::Named(id) => match self.doc.assets.colors.get(id) {
                Some(named) => Paint::Color(named.color.get_at(time)),
                None => Paint::Color(Color::TRANSPARENT),
            },
            Brush::Gradient(id) => {
                let Some(gradient) = self.doc.assets.gradients.get(id) else {
                    return Paint::Color(Color::TRANSPARENT);
                };
                let Some(colors) = self.doc.assets.gradient_colors.get(&gradient.colors) else {
                    return Paint::Color(Color::TRANSPARENT);
                };
                match gradient.kind {
                    crate::model::GradientKind::Linear => Paint::LinearGradient {
                        start: gradient.start,
                        end: gradient.end,
                        stops: colors.stops.clone(),
                    },
                    crate::model::GradientKind::Radial => Paint::RadialGradient {
                        center: gradient.start,
                        radius: (gradient.end - gradient.start).hypot(),
                        highlight: gradient.highlight,
                        stops: colors.stops.clone(),
                    },
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::AnimatedProperty;
    use crate::model::{
        EllipseShape, FillRule, Node, NodeKind, Shape,
    };
    use crate::render::record::{Command, RecordingRenderer};
    use kurbo::{Point, Size};

    fn dot(center: Point) -> Node {
        Node::new(
            "dot",
            NodeKind::Shape(Shape::Ellipse(EllipseShape {
                position: AnimatedProperty::new(center),
                size: AnimatedProperty::new(Size::new(2.0, 2.0)),
            })),
        )
    }

    fn fill_node(color: Color) -> Node {
        Node::new("fill", NodeKind::Fill(FillStyle::new(Brush::flat(color))))
    }

    #[test]
    fn stylers_replay_preceding_shapes() {
        let mut doc = Document::new("test");
        let mut comp = Composition::new("main", 10.0, 10.0);
        let mut group = Group::default();
        group.children = vec![
            dot(Point::new(2.0, 2.0)),
            dot(Point::new(6.0, 6.0)),
            fill_node(Color::rgb(255, 0, 0)),
        ];
        comp.nodes.push(Node::new("g", NodeKind::Group(group)));
        doc.compositions.push(comp);

        let mut renderer = RecordingRenderer::new();
        render_document(&doc, 0.0, &mut renderer).unwrap();

        let draws = renderer
            .commands()
            .iter()
            .filter(|c| matches!(c, Command::DrawPath { fill: Some(_), .. }))
            .count();
        assert_eq!(draws, 2);
    }

    #[test]
    fn shapes_without_styler_do_not_draw() {
        let mut doc = Document::new("test");
        let mut comp = Composition::new("main", 10.0, 10.0);
        comp.nodes.push(dot(Point::new(2.0, 2.0)));
        doc.compositions.push(comp);

        let mut renderer = RecordingRenderer::new();
        render_document(&doc, 0.0, &mut renderer).unwrap();
        assert!(
            !renderer
                .commands()
                .iter()
                .any(|c| matches!(c, Command::DrawPath { .. }))
        );
    }

    #[test]
    fn layers_outside_their_range_are_skipped() {
        let mut doc = Document::new("test");
        let mut comp = Composition::new("main", 10.0, 10.0);
        let mut layer = Layer::new(10.0);
        layer.group.children = vec![dot(Point::new(2.0, 2.0)), fill_node(Color::BLACK)];
        comp.nodes.push(Node::new("layer", NodeKind::Layer(layer)));
        doc.compositions.push(comp);

        let mut renderer = RecordingRenderer::new();
        render_document(&doc, 20.0, &mut renderer).unwrap();
        assert!(
            !renderer
                .commands()
                .iter()
                .any(|c| matches!(c, Command::LayerStart { .. }))
        );

        render_document(&doc, 5.0, &mut renderer).unwrap();
        assert!(
            renderer
                .commands()
                .iter()
                .any(|c| matches!(c, Command::DrawPath { fill: Some(_), .. }))
        );
    }

    #[test]
    fn precomp_cycle_is_an_error() {
        let mut doc = Document::new("test");
        let mut comp = Composition::new("main", 10.0, 10.0);
        comp.end_frame = 100.0;
        comp.nodes.push(Node::new(
            "self",
            NodeKind::Precomp(PrecompLayer {
                composition: "main".to_owned(),
                transform: crate::model::Transform::new(),
                opacity: AnimatedProperty::new(1.0),
                start_time: 0.0,
                end_time: 100.0,
                time_offset: 0.0,
            }),
        ));
        doc.compositions.push(comp);

        let mut renderer = RecordingRenderer::new();
        assert!(render_document(&doc, 0.0, &mut renderer).is_err());
    }

    #[test]
    fn missing_gradient_paints_transparent() {
        let mut doc = Document::new("test");
        let mut comp = Composition::new("main", 10.0, 10.0);
        let mut group = Group::default();
        group.children = vec![
            dot(Point::new(2.0, 2.0)),
            Node::new(
                "fill",
                NodeKind::Fill(FillStyle {
                    brush: Brush::Gradient("missing".to_owned()),
                    opacity: AnimatedProperty::new(1.0),
                    rule: FillRule::NonZero,
                }),
            ),
        ];
        comp.nodes.push(Node::new("g", NodeKind::Group(group)));
        doc.compositions.push(comp);

        let mut renderer = RecordingRenderer::new();
        render_document(&doc, 0.0, &mut renderer).unwrap();
        let fill = renderer.commands().iter().find_map(|c| match c {
            Command::DrawPath { fill: Some(f), .. } => Some(f.clone()),
            _ => None,
        });
        assert_eq!(fill.map(|f| f.paint), Some(Paint::Color(Color::TRANSPARENT)));
    }
}
