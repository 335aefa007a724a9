//! After Effects project import: RIFX container -> [`project`] object model
//! -> scene-graph [`Document`].

pub mod cos;
pub mod parser;
pub mod project;

use kurbo::{Point, Size, Vec2};

use crate::animation::{AnimatedProperty, Interpolate, KeyframeTransition};
use crate::error::{VetraResult, Warnings};
use crate::geometry::Bezier;
use crate::model::{
    Bitmap, Brush, Color, Composition, Document, EllipseShape, FillStyle, Gradient, GradientColors,
    GradientKind, GradientStop, Group, ImageShape, Layer, Node, NodeKind, PathShape, PrecompLayer,
    RectShape, Shape, StarKind, StarShape, StrokeStyle, Transform,
};
use crate::riff::parse_riff;

use parser::AepParser;
use project as aep;

/// Parses binary After Effects project data into a document.
///
/// Only a wrong container signature is fatal; structural problems inside the
/// project degrade to warnings and whatever could still be decoded.
#[tracing::instrument(skip_all)]
pub fn parse_aep(bytes: &[u8], warnings: &mut Warnings) -> VetraResult<Document> {
    let root = parse_riff(bytes)?;
    let project = AepParser::new(warnings).parse(&root)?;
    Ok(project_to_document(&project, warnings))
}

/// Builds the scene graph from a parsed project. Layers convert in reverse
/// file order so the first node painted is the bottom layer.
pub fn project_to_document(project: &aep::Project, warnings: &mut Warnings) -> Document {
    let mut converter = Converter {
        project,
        warnings,
        doc: Document::new("project"),
        gradient_count: 0,
    };
    for comp in project.compositions() {
        let converted = converter.convert_composition(comp);
        converter.doc.compositions.push(converted);
    }
    converter.doc
}

struct Converter<'a, 'w> {
    project: &'a aep::Project,
    warnings: &'w mut Warnings,
    doc: Document,
    gradient_count: usize,
}

impl Converter<'_, '_> {
    fn convert_composition(&mut self, comp: &aep::Composition) -> Composition {
        let mut out = Composition::new(&comp.name, f64::from(comp.width), f64::from(comp.height));
        out.fps = if comp.framerate > 0.0 { comp.framerate } else { 60.0 };
        out.start_frame = comp.in_time;
        out.end_frame = comp.out_time;
        out.background = Some(comp.color);

        for layer in comp.layers.iter().rev() {
            if let Some(node) = self.convert_layer(layer) {
                out.nodes.push(node);
            }
        }
        out
    }

    fn convert_layer(&mut self, layer: &aep::Layer) -> Option<Node> {
        let transform_group = layer.properties.group("ADBE Transform Group");
        let (transform, opacity) = self.convert_transform(transform_group);

        let mut children = Vec::new();
        match layer.r#type {
            aep::LayerType::Shape => {
                if let Some(root) = layer.properties.group("ADBE Root Vectors Group") {
                    children.extend(self.convert_shape_group(root));
                }
            }
            aep::LayerType::AssetLayer => {
                children.extend(self.convert_asset_layer(layer)?);
            }
            aep::LayerType::Text | aep::LayerType::Camera | aep::LayerType::Light => {
                // Carried in the project model but not drawable here.
                return None;
            }
            aep::LayerType::Unknown(t) => {
                self.warnings.warn(format!("Unsupported layer type {t}"));
                return None;
            }
        }

        let mut model_layer = Layer::new(layer.out_time);
        model_layer.start_time = layer.in_time;
        model_layer.group = Group {
            transform,
            opacity,
            children,
        };
        model_layer.mask = self.convert_mask(layer);

        let mut node = Node::new(&layer.name, NodeKind::Layer(model_layer));
        node.visible = layer.visible;
        Some(node)
    }

    /// Solid, footage and nested-composition layers, dispatched on the
    /// referenced folder item.
    fn convert_asset_layer(&mut self, layer: &aep::Layer) -> Option<Vec<Node>> {
        let Some(item) = self.project.item(layer.asset_id) else {
            self.warnings
                .warn(format!("Layer {:?} references missing asset", layer.name));
            return None;
        };

        match &item.data {
            aep::ItemData::Composition(nested) => {
                // Placement comes from the enclosing layer group, so the
                // precomp node itself stays at identity.
                let precomp = PrecompLayer {
                    composition: nested.name.clone(),
                    transform: Transform::new(),
                    opacity: AnimatedProperty::new(1.0),
                    start_time: layer.in_time,
                    end_time: layer.out_time,
                    time_offset: -layer.start_time,
                };
                let node = Node::new(&layer.name, NodeKind::Precomp(precomp));
                Some(vec![node])
            }
            aep::ItemData::Solid {
                width,
                height,
                solid,
            } => {
                let w = f64::from(*width);
                let h = f64::from(*height);
                let rect = Shape::Rect(RectShape {
                    position: AnimatedProperty::new(Point::new(w / 2.0, h / 2.0)),
                    size: AnimatedProperty::new(Size::new(w, h)),
                    rounded: AnimatedProperty::new(0.0),
                });
                Some(vec![
                    Node::new(&solid.name, NodeKind::Shape(rect)),
                    Node::new("fill", NodeKind::Fill(FillStyle::new(Brush::flat(solid.color)))),
                ])
            }
            aep::ItemData::File { width, height, file } => {
                let id = if file.name.is_empty() {
                    format!("asset-{}", item.id)
                } else {
                    file.name.clone()
                };
                // Pixels are external; the bitmap records dimensions and the
                // renderer skips assets with no data.
                self.doc.assets.bitmaps.entry(id.clone()).or_insert(Bitmap {
                    width: u32::from(*width),
                    height: u32::from(*height),
                    rgba: Vec::new(),
                });
                let image = ImageShape {
                    asset: id,
                    transform: Transform::new(),
                    opacity: AnimatedProperty::new(1.0),
                };
                Some(vec![Node::new(&layer.name, NodeKind::Image(image))])
            }
            aep::ItemData::Folder(_) => {
                self.warnings
                    .warn(format!("Layer {:?} references a folder", layer.name));
                None
            }
        }
    }

    fn convert_mask(&mut self, layer: &aep::Layer) -> Option<Shape> {
        let parade = layer.properties.group("ADBE Mask Parade")?;
        for (_, base) in &parade.properties {
            let mask = match base {
                aep::PropertyBase::Mask(m) => m,
                aep::PropertyBase::Group(g) => {
                    if let Some(aep::PropertyBase::Mask(m)) = g
                        .properties
                        .iter()
                        .map(|(_, b)| b)
                        .find(|b| matches!(b, aep::PropertyBase::Mask(_)))
                    {
                        m
                    } else {
                        continue;
                    }
                }
                _ => continue,
            };
            if let Some(shape) = mask.properties.simple("ADBE Mask Shape") {
                return Some(Shape::Path(PathShape {
                    shape: self.convert_bezier_property(shape),
                }));
            }
        }
        None
    }

    fn convert_shape_group(&mut self, group: &aep::PropertyGroup) -> Vec<Node> {
        let mut nodes = Vec::new();
        for (match_name, base) in &group.properties {
            match (match_name.as_str(), base) {
                ("ADBE Vector Group", aep::PropertyBase::Group(g)) => {
                    let (transform, opacity) =
                        self.convert_vector_transform(g.group("ADBE Vector Transform Group"));
                    let children = g
                        .group("ADBE Vectors Group")
                        .map(|inner| self.convert_shape_group(inner))
                        .unwrap_or_default();
                    let name = if g.name.is_empty() { "group" } else { &g.name };
                    nodes.push(Node::new(
                        name,
                        NodeKind::Group(Group {
                            transform,
                            opacity,
                            children,
                        }),
                    ));
                }
                ("ADBE Vector Shape - Group", aep::PropertyBase::Group(g)) => {
                    if let Some(prop) = g.simple("ADBE Vector Shape") {
                        nodes.push(Node::new(
                            "path",
                            NodeKind::Shape(Shape::Path(PathShape {
                                shape: self.convert_bezier_property(prop),
                            })),
                        ));
                    }
                }
                ("ADBE Vector Shape - Rect", aep::PropertyBase::Group(g)) => {
                    nodes.push(Node::new(
                        "rect",
                        NodeKind::Shape(Shape::Rect(RectShape {
                            position: self
                                .convert_point(g.simple("ADBE Vector Rect Position"), Point::ZERO),
                            size: self.convert_size(g.simple("ADBE Vector Rect Size")),
                            rounded: self
                                .convert_scalar(g.simple("ADBE Vector Rect Roundness"), 0.0, 1.0),
                        })),
                    ));
                }
                ("ADBE Vector Shape - Ellipse", aep::PropertyBase::Group(g)) => {
                    nodes.push(Node::new(
                        "ellipse",
                        NodeKind::Shape(Shape::Ellipse(EllipseShape {
                            position: self
                                .convert_point(g.simple("ADBE Vector Ellipse Position"), Point::ZERO),
                            size: self.convert_size(g.simple("ADBE Vector Ellipse Size")),
                        })),
                    ));
                }
                ("ADBE Vector Shape - Star", aep::PropertyBase::Group(g)) => {
                    let kind = match g
                        .simple("ADBE Vector Star Type")
                        .and_then(|p| p.value.as_number())
                    {
                        Some(2.0) => StarKind::Polygon,
                        _ => StarKind::Star,
                    };
                    nodes.push(Node::new(
                        "star",
                        NodeKind::Shape(Shape::Star(StarShape {
                            position: self
                                .convert_point(g.simple("ADBE Vector Star Position"), Point::ZERO),
                            outer_radius: self
                                .convert_scalar(g.simple("ADBE Vector Star Outer Radius"), 0.0, 1.0),
                            inner_radius: self
                                .convert_scalar(g.simple("ADBE Vector Star Inner Radius"), 0.0, 1.0),
                            angle: self
                                .convert_scalar(g.simple("ADBE Vector Star Rotation"), 0.0, 1.0),
                            points: self.convert_scalar(g.simple("ADBE Vector Star Points"), 5.0, 1.0),
                            kind,
                        })),
                    ));
                }
                ("ADBE Vector Graphic - Fill", aep::PropertyBase::Group(g)) => {
                    let color = self.convert_color(g.simple("ADBE Vector Fill Color"));
                    let mut fill = FillStyle::new(Brush::Flat(color));
                    fill.opacity =
                        self.convert_scalar(g.simple("ADBE Vector Fill Opacity"), 100.0, 1.0 / 100.0);
                    nodes.push(Node::new("fill", NodeKind::Fill(fill)));
                }
                ("ADBE Vector Graphic - Stroke", aep::PropertyBase::Group(g)) => {
                    let color = self.convert_color(g.simple("ADBE Vector Stroke Color"));
                    let width = self.convert_scalar(g.simple("ADBE Vector Stroke Width"), 1.0, 1.0);
                    let mut stroke = StrokeStyle::new(Brush::Flat(color), 1.0);
                    stroke.width = width;
                    stroke.opacity = self
                        .convert_scalar(g.simple("ADBE Vector Stroke Opacity"), 100.0, 1.0 / 100.0);
                    nodes.push(Node::new("stroke", NodeKind::Stroke(stroke)));
                }
                ("ADBE Vector Graphic - G-Fill", aep::PropertyBase::Group(g)) => {
                    if let Some(node) = self.convert_gradient_fill(g) {
                        nodes.push(node);
                    }
                }
                _ => {}
            }
        }
        nodes
    }

    /// Gradient fills become document assets plus a fill node referencing
    /// them.
    fn convert_gradient_fill(&mut self, g: &aep::PropertyGroup) -> Option<Node> {
        let colors_prop = g.simple("ADBE Vector Grad Colors")?;
        let stops = match &colors_prop.value {
            aep::PropertyValue::Gradient(stops) => stops,
            _ => colors_prop.keyframes.first().and_then(|kf| match &kf.value {
                aep::PropertyValue::Gradient(stops) => Some(stops),
                _ => None,
            })?,
        };

        self.gradient_count += 1;
        let colors_id = format!("gradient-colors-{}", self.gradient_count);
        let gradient_id = format!("gradient-{}", self.gradient_count);

        let mut converted = GradientColors::default();
        for &(offset, color) in &stops.color_stops {
            let alpha = sample_alpha(&stops.alpha_stops, offset);
            converted.stops.push(GradientStop {
                offset,
                color: color.with_alpha(alpha),
            });
        }
        self.doc
            .assets
            .gradient_colors
            .insert(colors_id.clone(), converted);

        let start = g
            .simple("ADBE Vector Grad Start")
            .and_then(|p| p.value.as_vector2())
            .unwrap_or(Point::ZERO);
        let end = g
            .simple("ADBE Vector Grad End")
            .and_then(|p| p.value.as_vector2())
            .unwrap_or(Point::new(100.0, 0.0));
        let kind = match g
            .simple("ADBE Vector Grad Type")
            .and_then(|p| p.value.as_number())
        {
            Some(2.0) => GradientKind::Radial,
            _ => GradientKind::Linear,
        };
        self.doc.assets.gradients.insert(
            gradient_id.clone(),
            Gradient {
                kind,
                colors: colors_id,
                start,
                end,
                highlight: start,
            },
        );

        let mut fill = FillStyle::new(Brush::Gradient(gradient_id));
        fill.opacity = self.convert_scalar(g.simple("ADBE Vector Fill Opacity"), 100.0, 1.0 / 100.0);
        Some(Node::new("gradient fill", NodeKind::Fill(fill)))
    }

    fn convert_transform(
        &mut self,
        group: Option<&aep::PropertyGroup>,
    ) -> (Transform, AnimatedProperty<f64>) {
        let mut transform = Transform::new();
        let mut opacity = AnimatedProperty::new(1.0);
        if let Some(g) = group {
            transform.anchor = self.convert_point(g.simple("ADBE Anchor Point"), Point::ZERO);
            transform.position = self.convert_point(g.simple("ADBE Position"), Point::ZERO);
            transform.scale = self.convert_scale(g.simple("ADBE Scale"));
            let rotation = g
                .simple("ADBE Rotate Z")
                .or_else(|| g.simple("ADBE Rotation"));
            transform.rotation = self.convert_scalar(rotation, 0.0, 1.0);
            opacity = self.convert_scalar(g.simple("ADBE Opacity"), 100.0, 1.0 / 100.0);
        }
        (transform, opacity)
    }

    fn convert_vector_transform(
        &mut self,
        group: Option<&aep::PropertyGroup>,
    ) -> (Transform, AnimatedProperty<f64>) {
        let mut transform = Transform::new();
        let mut opacity = AnimatedProperty::new(1.0);
        if let Some(g) = group {
            transform.anchor = self.convert_point(g.simple("ADBE Vector Anchor"), Point::ZERO);
            transform.position = self.convert_point(g.simple("ADBE Vector Position"), Point::ZERO);
            transform.scale = self.convert_scale(g.simple("ADBE Vector Scale"));
            transform.rotation = self.convert_scalar(g.simple("ADBE Vector Rotation"), 0.0, 1.0);
            opacity = self
                .convert_scalar(g.simple("ADBE Vector Group Opacity"), 100.0, 1.0 / 100.0);
        }
        (transform, opacity)
    }

    fn convert_point(
        &mut self,
        prop: Option<&aep::Property>,
        default: Point,
    ) -> AnimatedProperty<Point> {
        self.convert(
            prop,
            |v| v.as_vector2(),
            |a, b| (*b - *a).hypot(),
            default,
        )
    }

    fn convert_size(&mut self, prop: Option<&aep::Property>) -> AnimatedProperty<Size> {
        self.convert(
            prop,
            |v| v.as_vector2().map(|p| Size::new(p.x, p.y)),
            |a, b| (b.width - a.width).hypot(b.height - a.height),
            Size::ZERO,
        )
    }

    /// Percent scale vectors map to unit factors.
    fn convert_scale(&mut self, prop: Option<&aep::Property>) -> AnimatedProperty<Vec2> {
        self.convert(
            prop,
            |v| v.as_vector2().map(|p| Vec2::new(p.x / 100.0, p.y / 100.0)),
            |a, b| (*b - *a).hypot(),
            Vec2::new(1.0, 1.0),
        )
    }

    fn convert_scalar(
        &mut self,
        prop: Option<&aep::Property>,
        default: f64,
        scale: f64,
    ) -> AnimatedProperty<f64> {
        self.convert(
            prop,
            move |v| v.as_number().map(|n| n * scale),
            |a, b| (b - a).abs(),
            default * scale,
        )
    }

    fn convert_color(&mut self, prop: Option<&aep::Property>) -> AnimatedProperty<Color> {
        self.convert(
            prop,
            |v| v.as_color(),
            |a, b| {
                let a = a.components();
                let b = b.components();
                (0..4).map(|i| f64::from(b[i] - a[i]).abs()).sum()
            },
            Color::BLACK,
        )
    }

    fn convert_bezier_property(&mut self, prop: &aep::Property) -> AnimatedProperty<Bezier> {
        self.convert(
            Some(prop),
            |v| match v {
                aep::PropertyValue::Bezier(data) => Some(bezier_from_data(data)),
                _ => None,
            },
            // Structural values get linear timing; speed normalization has
            // no meaningful magnitude here.
            |_, _| 0.0,
            Bezier::new(),
        )
    }

    /// Shared keyframe conversion: static value plus one model keyframe per
    /// record, with easing rebuilt from the stored speed/influence pairs.
    fn convert<T: Interpolate>(
        &mut self,
        prop: Option<&aep::Property>,
        map: impl Fn(&aep::PropertyValue) -> Option<T>,
        magnitude: impl Fn(&T, &T) -> f64,
        default: T,
    ) -> AnimatedProperty<T> {
        let Some(prop) = prop else {
            return AnimatedProperty::new(default);
        };
        let static_value = map(&prop.value)
            .or_else(|| prop.keyframes.first().and_then(|kf| map(&kf.value)))
            .unwrap_or(default);
        let mut out = AnimatedProperty::new(static_value);

        for (i, kf) in prop.keyframes.iter().enumerate() {
            let Some(value) = map(&kf.value) else {
                self.warnings.warn("Keyframe value has unexpected type");
                continue;
            };
            let transition = match kf.transition_type {
                aep::KeyframeTransitionType::Hold => KeyframeTransition::hold(),
                aep::KeyframeTransitionType::Linear => KeyframeTransition::linear(),
                aep::KeyframeTransitionType::Bezier => {
                    if let Some(next) = prop.keyframes.get(i + 1) {
                        let next_value = map(&next.value).unwrap_or_else(|| value.clone());
                        ease_transition(kf, next, magnitude(&value, &next_value))
                    } else {
                        KeyframeTransition::linear()
                    }
                }
                aep::KeyframeTransitionType::Unknown(t) => {
                    self.warnings
                        .warn(format!("Unknown keyframe transition {t}"));
                    KeyframeTransition::linear()
                }
            };
            out.set_keyframe_with(kf.time, value, transition);
        }
        out
    }
}

/// Rebuilds the unit-square timing curve from the per-segment speed and
/// influence records, normalizing speeds against the segment's average
/// speed so linear motion keeps a linear curve.
fn ease_transition(kf: &aep::Keyframe, next: &aep::Keyframe, distance: f64) -> KeyframeTransition {
    let dt = next.time - kf.time;
    let avg_speed = if dt > 0.0 { distance / dt } else { 0.0 };
    let norm = |speed: Option<&f64>| {
        if avg_speed.abs() < 1e-12 {
            1.0
        } else {
            speed.copied().unwrap_or(0.0) / avg_speed
        }
    };
    KeyframeTransition::from_ease(
        norm(kf.out_speed.first()),
        kf.out_influence.first().copied().unwrap_or(100.0 / 3.0),
        norm(next.in_speed.first()),
        next.in_influence.first().copied().unwrap_or(100.0 / 3.0),
    )
}

fn sample_alpha(alpha_stops: &[(f64, f64)], offset: f64) -> u8 {
    let alpha = match alpha_stops {
        [] => 1.0,
        [single] => single.1,
        stops => {
            let idx = stops.partition_point(|(o, _)| *o <= offset);
            if idx == 0 {
                stops[0].1
            } else if idx >= stops.len() {
                stops[stops.len() - 1].1
            } else {
                let (o0, a0) = stops[idx - 1];
                let (o1, a1) = stops[idx];
                if o1 > o0 {
                    a0 + (a1 - a0) * (offset - o0) / (o1 - o0)
                } else {
                    a0
                }
            }
        }
    };
    (alpha * 255.0).round().clamp(0.0, 255.0) as u8
}

/// The `shap` point stream is the cubic control polygon in normalized
/// bounds space: a first vertex, then (out handle, in handle, vertex)
/// triples; a closed shape's final handle pair wraps to the first vertex.
fn bezier_from_data(data: &aep::BezierData) -> Bezier {
    let mut bezier = Bezier::new();
    let points: Vec<Point> = data.points.iter().map(|p| data.denormalize(*p)).collect();
    if points.is_empty() {
        return bezier;
    }

    bezier.push(points[0].into());
    let mut i = 1;
    while i + 2 < points.len() {
        bezier.cubic_to(points[i], points[i + 1], points[i + 2]);
        i += 3;
    }
    if data.closed {
        if i + 1 < points.len() {
            // Wrap handles back to the start point.
            if let Some(first) = bezier.points().first().copied() {
                let mut start = first;
                start.tan_in = points[i + 1];
                bezier.set_point(0, start);
            }
            if bezier.len() > 0 {
                let last_idx = bezier.len() - 1;
                let mut last = bezier.points()[last_idx];
                last.tan_out = points[i];
                bezier.set_point(last_idx, last);
            }
        }
        bezier.close();
    }
    bezier
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bezier_from_data_denormalizes_and_closes() {
        let data = aep::BezierData {
            closed: true,
            minimum: Point::new(0.0, 0.0),
            maximum: Point::new(100.0, 100.0),
            points: vec![
                Point::new(0.0, 0.0),
                Point::new(0.25, 0.0),
                Point::new(0.75, 0.0),
                Point::new(1.0, 0.0),
                Point::new(1.0, 0.5),
                Point::new(0.0, 0.5),
            ],
        };
        let bezier = bezier_from_data(&data);
        assert!(bezier.closed());
        assert_eq!(bezier.len(), 2);
        assert_eq!(bezier.points()[0].pos, Point::new(0.0, 0.0));
        assert_eq!(bezier.points()[1].pos, Point::new(100.0, 0.0));
        assert_eq!(bezier.points()[1].tan_in, Point::new(75.0, 0.0));
        // Wrapped handles on the closing segment.
        assert_eq!(bezier.points()[1].tan_out, Point::new(100.0, 50.0));
        assert_eq!(bezier.points()[0].tan_in, Point::new(0.0, 50.0));
    }

    #[test]
    fn alpha_stops_interpolate_at_color_offsets() {
        let stops = vec![(0.0, 0.0), (1.0, 1.0)];
        assert_eq!(sample_alpha(&stops, 0.5), 128);
        assert_eq!(sample_alpha(&[], 0.5), 255);
        assert_eq!(sample_alpha(&[(0.0, 0.5)], 0.9), 128);
    }

    #[test]
    fn ease_transition_normalizes_speed() {
        let mut a = aep::Keyframe {
            time: 0.0,
            out_speed: vec![10.0],
            out_influence: vec![33.0],
            ..aep::Keyframe::default()
        };
        a.transition_type = aep::KeyframeTransitionType::Bezier;
        let b = aep::Keyframe {
            time: 10.0,
            in_speed: vec![10.0],
            in_influence: vec![33.0],
            ..aep::Keyframe::default()
        };
        // Distance 100 over 10 frames: average speed 10, so both handles sit
        // on the diagonal and the curve collapses to linear timing.
        let t = ease_transition(&a, &b, 100.0);
        for ratio in [0.25, 0.5, 0.75] {
            assert!((t.lerp_factor(ratio) - ratio).abs() < 1e-6);
        }
    }
}
