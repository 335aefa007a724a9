use std::collections::BTreeMap;

use kurbo::{Affine, Point, Size, Vec2};

use crate::animation::{AnimatedProperty, FrameTime, Interpolate};
use crate::geometry::{Bezier, MultiBezier};

/// Straight-alpha RGBA color, 8 bits per channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const TRANSPARENT: Color = Color::new(0, 0, 0, 0);
    pub const BLACK: Color = Color::new(0, 0, 0, 255);
    pub const WHITE: Color = Color::new(255, 255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    pub const fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }

    /// Channels as floats in `[0, 1]`, straight alpha.
    pub fn components(self) -> [f32; 4] {
        [
            f32::from(self.r) / 255.0,
            f32::from(self.g) / 255.0,
            f32::from(self.b) / 255.0,
            f32::from(self.a) / 255.0,
        ]
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

impl Interpolate for Color {
    fn interpolate(a: &Self, b: &Self, t: f64) -> Self {
        fn lerp_u8(a: u8, b: u8, t: f64) -> u8 {
            let a = f64::from(a);
            let b = f64::from(b);
            (a + (b - a) * t).round().clamp(0.0, 255.0) as u8
        }

        Self {
            r: lerp_u8(a.r, b.r, t),
            g: lerp_u8(a.g, b.g, t),
            b: lerp_u8(a.b, b.b, t),
            a: lerp_u8(a.a, b.a, t),
        }
    }
}

/// Anchor / position / scale / rotation transform stack, each part animatable.
///
/// Composition order is translate(position), rotate, scale,
/// translate(-anchor), matching how layer transforms nest in the source
/// formats.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Transform {
    pub anchor: AnimatedProperty<Point>,
    pub position: AnimatedProperty<Point>,
    /// Scale factors, 1.0 = unscaled.
    pub scale: AnimatedProperty<Vec2>,
    /// Degrees, clockwise in y-down coordinates.
    pub rotation: AnimatedProperty<f64>,
}

impl Transform {
    pub fn new() -> Self {
        Self {
            anchor: AnimatedProperty::new(Point::ZERO),
            position: AnimatedProperty::new(Point::ZERO),
            scale: AnimatedProperty::new(Vec2::new(1.0, 1.0)),
            rotation: AnimatedProperty::new(0.0),
        }
    }

    pub fn to_affine(&self, time: FrameTime) -> Affine {
        let pos = self.position.get_at(time);
        let anchor = self.anchor.get_at(time);
        let scale = self.scale.get_at(time);
        let rotation = self.rotation.get_at(time).to_radians();
        Affine::translate(pos.to_vec2())
            * Affine::rotate(rotation)
            * Affine::scale_non_uniform(scale.x, scale.y)
            * Affine::translate(-anchor.to_vec2())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FillRule {
    #[default]
    NonZero,
    EvenOdd,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum LineCap {
    #[default]
    Butt,
    Round,
    Square,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum LineJoin {
    #[default]
    Miter,
    Round,
    Bevel,
}

/// What a styler paints with: an inline animated color or a document asset.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Brush {
    Flat(AnimatedProperty<Color>),
    /// Named-color asset id.
    Named(String),
    /// Gradient asset id.
    Gradient(String),
}

impl Brush {
    pub fn flat(color: Color) -> Self {
        Self::Flat(AnimatedProperty::new(color))
    }
}

/// Fills the union of sibling shapes that precede it in the child list.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FillStyle {
    pub brush: Brush,
    pub opacity: AnimatedProperty<f64>,
    pub rule: FillRule,
}

impl FillStyle {
    pub fn new(brush: Brush) -> Self {
        Self {
            brush,
            opacity: AnimatedProperty::new(1.0),
            rule: FillRule::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StrokeStyle {
    pub brush: Brush,
    pub opacity: AnimatedProperty<f64>,
    pub width: AnimatedProperty<f64>,
    pub cap: LineCap,
    pub join: LineJoin,
    pub miter_limit: f64,
    pub dashes: Vec<f64>,
    pub dash_offset: f64,
}

impl StrokeStyle {
    pub fn new(brush: Brush, width: f64) -> Self {
        Self {
            brush,
            opacity: AnimatedProperty::new(1.0),
            width: AnimatedProperty::new(width),
            cap: LineCap::default(),
            join: LineJoin::default(),
            miter_limit: 4.0,
            dashes: Vec::new(),
            dash_offset: 0.0,
        }
    }
}

/// Kappa for approximating a quarter circle with one cubic.
const CIRCLE_K: f64 = 0.5522847498307935;

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RectShape {
    /// Center of the rectangle.
    pub position: AnimatedProperty<Point>,
    pub size: AnimatedProperty<Size>,
    pub rounded: AnimatedProperty<f64>,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EllipseShape {
    pub position: AnimatedProperty<Point>,
    pub size: AnimatedProperty<Size>,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PathShape {
    pub shape: AnimatedProperty<Bezier>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum StarKind {
    Star,
    Polygon,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StarShape {
    pub position: AnimatedProperty<Point>,
    pub outer_radius: AnimatedProperty<f64>,
    pub inner_radius: AnimatedProperty<f64>,
    /// Rotation of the first point, degrees.
    pub angle: AnimatedProperty<f64>,
    pub points: AnimatedProperty<f64>,
    pub kind: StarKind,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Shape {
    Rect(RectShape),
    Ellipse(EllipseShape),
    Path(PathShape),
    Star(StarShape),
}

impl Shape {
    /// Geometry at `time`, in local coordinates.
    pub fn to_path(&self, time: FrameTime) -> MultiBezier {
        match self {
            Shape::Rect(r) => {
                let center = r.position.get_at(time);
                let size = r.size.get_at(time);
                let rounded = r.rounded.get_at(time);
                rect_path(center, size, rounded)
            }
            Shape::Ellipse(e) => {
                let center = e.position.get_at(time);
                let size = e.size.get_at(time);
                ellipse_path(center, Vec2::new(size.width / 2.0, size.height / 2.0))
            }
            Shape::Path(p) => p.shape.get_at(time).into(),
            Shape::Star(s) => star_path(
                s.position.get_at(time),
                s.outer_radius.get_at(time),
                s.inner_radius.get_at(time),
                s.angle.get_at(time),
                s.points.get_at(time).round().max(3.0) as usize,
                s.kind,
            ),
        }
    }
}

fn ellipse_path(center: Point, radii: Vec2) -> MultiBezier {
    let kx = radii.x * CIRCLE_K;
    let ky = radii.y * CIRCLE_K;
    let mut b = Bezier::new();
    b.add_point(
        Point::new(center.x, center.y - radii.y),
        Vec2::new(-kx, 0.0),
        Vec2::new(kx, 0.0),
    );
    b.add_point(
        Point::new(center.x + radii.x, center.y),
        Vec2::new(0.0, -ky),
        Vec2::new(0.0, ky),
    );
    b.add_point(
        Point::new(center.x, center.y + radii.y),
        Vec2::new(kx, 0.0),
        Vec2::new(-kx, 0.0),
    );
    b.add_point(
        Point::new(center.x - radii.x, center.y),
        Vec2::new(0.0, ky),
        Vec2::new(0.0, -ky),
    );
    b.close();
    b.into()
}

fn rect_path(center: Point, size: Size, rounded: f64) -> MultiBezier {
    let x0 = center.x - size.width / 2.0;
    let x1 = center.x + size.width / 2.0;
    let y0 = center.y - size.height / 2.0;
    let y1 = center.y + size.height / 2.0;

    let mut b = Bezier::new();
    let r = rounded.min(size.width / 2.0).min(size.height / 2.0);
    if r <= 0.0 {
        b.add_point(Point::new(x0, y0), Vec2::ZERO, Vec2::ZERO);
        b.add_point(Point::new(x1, y0), Vec2::ZERO, Vec2::ZERO);
        b.add_point(Point::new(x1, y1), Vec2::ZERO, Vec2::ZERO);
        b.add_point(Point::new(x0, y1), Vec2::ZERO, Vec2::ZERO);
    } else {
        let k = r * CIRCLE_K;
        b.add_point(Point::new(x0 + r, y0), Vec2::new(-k, 0.0), Vec2::ZERO);
        b.add_point(Point::new(x1 - r, y0), Vec2::ZERO, Vec2::new(k, 0.0));
        b.add_point(Point::new(x1, y0 + r), Vec2::new(0.0, -k), Vec2::ZERO);
        b.add_point(Point::new(x1, y1 - r), Vec2::ZERO, Vec2::new(0.0, k));
        b.add_point(Point::new(x1 - r, y1), Vec2::new(k, 0.0), Vec2::ZERO);
        b.add_point(Point::new(x0 + r, y1), Vec2::ZERO, Vec2::new(-k, 0.0));
        b.add_point(Point::new(x0, y1 - r), Vec2::new(0.0, k), Vec2::ZERO);
        b.add_point(Point::new(x0, y0 + r), Vec2::ZERO, Vec2::new(0.0, -k));
    }
    b.close();
    b.into()
}

fn star_path(
    center: Point,
    outer_radius: f64,
    inner_radius: f64,
    angle: f64,
    points: usize,
    kind: StarKind,
) -> MultiBezier {
    let start = angle.to_radians() - std::f64::consts::FRAC_PI_2;
    let step = std::f64::consts::TAU / points as f64;
    let mut b = Bezier::new();
    for i in 0..points {
        let theta = start + step * i as f64;
        b.push(Point::new(
            center.x + theta.cos() * outer_radius,
            center.y + theta.sin() * outer_radius,
        )
        .into());
        if kind == StarKind::Star {
            let theta = theta + step / 2.0;
            b.push(Point::new(
                center.x + theta.cos() * inner_radius,
                center.y + theta.sin() * inner_radius,
            )
            .into());
        }
    }
    b.close();
    b.into()
}

/// Reference to a bitmap asset, placed by its own transform.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ImageShape {
    pub asset: String,
    pub transform: Transform,
    pub opacity: AnimatedProperty<f64>,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Group {
    pub transform: Transform,
    pub opacity: AnimatedProperty<f64>,
    pub children: Vec<Node>,
}

impl Default for Group {
    fn default() -> Self {
        Self {
            transform: Transform::new(),
            opacity: AnimatedProperty::new(1.0),
            children: Vec::new(),
        }
    }
}

/// A top-level timeline object: a group limited to a frame range, optionally
/// clipped by a mask shape.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Layer {
    pub group: Group,
    pub start_time: FrameTime,
    pub end_time: FrameTime,
    /// Clip geometry applied to everything in the layer.
    pub mask: Option<Shape>,
}

impl Layer {
    pub fn new(end_time: FrameTime) -> Self {
        Self {
            group: Group::default(),
            start_time: 0.0,
            end_time,
            mask: None,
        }
    }

    pub fn in_range(&self, time: FrameTime) -> bool {
        time >= self.start_time && time <= self.end_time
    }
}

/// A layer that instantiates another composition by name.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PrecompLayer {
    pub composition: String,
    pub transform: Transform,
    pub opacity: AnimatedProperty<f64>,
    pub start_time: FrameTime,
    pub end_time: FrameTime,
    /// Added to the sample time when entering the referenced composition.
    pub time_offset: FrameTime,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum NodeKind {
    Layer(Layer),
    Group(Group),
    Shape(Shape),
    Fill(FillStyle),
    Stroke(StrokeStyle),
    Image(ImageShape),
    Precomp(PrecompLayer),
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Node {
    pub name: String,
    pub visible: bool,
    pub kind: NodeKind,
}

impl Node {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            visible: true,
            kind,
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Composition {
    pub name: String,
    pub width: f64,
    pub height: f64,
    pub fps: f64,
    pub start_frame: FrameTime,
    pub end_frame: FrameTime,
    pub background: Option<Color>,
    pub nodes: Vec<Node>,
}

impl Composition {
    pub fn new(name: impl Into<String>, width: f64, height: f64) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            fps: 60.0,
            start_frame: 0.0,
            end_frame: 0.0,
            background: None,
            nodes: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NamedColor {
    pub name: String,
    pub color: AnimatedProperty<Color>,
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GradientStop {
    /// Offset along the gradient in `[0, 1]`.
    pub offset: f64,
    pub color: Color,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GradientColors {
    pub stops: Vec<GradientStop>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum GradientKind {
    Linear,
    Radial,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Gradient {
    pub kind: GradientKind,
    /// Id of the [`GradientColors`] asset holding the stops.
    pub colors: String,
    /// Linear: line start. Radial: center.
    pub start: Point,
    /// Linear: line end. Radial: a point on the outer circle.
    pub end: Point,
    /// Radial focal point; equals `start` for centered gradients.
    pub highlight: Point,
}

/// Decoded raster asset, straight-alpha RGBA8.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Assets {
    pub colors: BTreeMap<String, NamedColor>,
    pub gradient_colors: BTreeMap<String, GradientColors>,
    pub gradients: BTreeMap<String, Gradient>,
    pub bitmaps: BTreeMap<String, Bitmap>,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Document {
    pub name: String,
    pub compositions: Vec<Composition>,
    pub assets: Assets,
}

impl Document {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            compositions: Vec::new(),
            assets: Assets::default(),
        }
    }

    /// The composition playback starts on.
    pub fn main(&self) -> Option<&Composition> {
        self.compositions.first()
    }

    pub fn composition(&self, name: &str) -> Option<&Composition> {
        self.compositions.iter().find(|c| c.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_applies_anchor_before_scale_and_rotation() {
        let mut t = Transform::new();
        t.anchor.set_value(Point::new(10.0, 10.0));
        t.position.set_value(Point::new(100.0, 100.0));
        t.scale.set_value(Vec2::new(2.0, 2.0));

        // The anchor maps onto the position regardless of scale.
        let m = t.to_affine(0.0);
        let p = m * Point::new(10.0, 10.0);
        assert!((p - Point::new(100.0, 100.0)).hypot() < 1e-9);
        // A point 1 unit right of the anchor lands 2 units right.
        let p = m * Point::new(11.0, 10.0);
        assert!((p - Point::new(102.0, 100.0)).hypot() < 1e-9);
    }

    #[test]
    fn transform_rotation_is_degrees() {
        let mut t = Transform::new();
        t.rotation.set_value(90.0);
        let p = t.to_affine(0.0) * Point::new(1.0, 0.0);
        assert!((p - Point::new(0.0, 1.0)).hypot() < 1e-9);
    }

    #[test]
    fn rect_path_bbox_matches_shape() {
        let shape = Shape::Rect(RectShape {
            position: AnimatedProperty::new(Point::new(5.0, 5.0)),
            size: AnimatedProperty::new(Size::new(10.0, 10.0)),
            rounded: AnimatedProperty::new(0.0),
        });
        let bbox = shape.to_path(0.0).bounding_box().unwrap();
        assert_eq!(bbox, kurbo::Rect::new(0.0, 0.0, 10.0, 10.0));
    }

    #[test]
    fn ellipse_path_stays_inside_its_rect() {
        let shape = Shape::Ellipse(EllipseShape {
            position: AnimatedProperty::new(Point::new(0.0, 0.0)),
            size: AnimatedProperty::new(Size::new(20.0, 10.0)),
        });
        let bbox = shape.to_path(0.0).bounding_box().unwrap();
        assert!((bbox.x0 - -10.0).abs() < 1e-9);
        assert!((bbox.x1 - 10.0).abs() < 1e-9);
        assert!((bbox.y0 - -5.0).abs() < 1e-9);
        assert!((bbox.y1 - 5.0).abs() < 1e-9);
    }

    #[test]
    fn star_alternates_radii() {
        let shape = Shape::Star(StarShape {
            position: AnimatedProperty::new(Point::ZERO),
            outer_radius: AnimatedProperty::new(10.0),
            inner_radius: AnimatedProperty::new(4.0),
            angle: AnimatedProperty::new(0.0),
            points: AnimatedProperty::new(5.0),
            kind: StarKind::Star,
        });
        let path = shape.to_path(0.0);
        let points = path.beziers()[0].points();
        assert_eq!(points.len(), 10);
        assert!((points[0].pos.to_vec2().hypot() - 10.0).abs() < 1e-9);
        assert!((points[1].pos.to_vec2().hypot() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn color_interpolation_rounds_channels() {
        let a = Color::rgb(0, 0, 0);
        let b = Color::rgb(255, 255, 255);
        let mid = Color::interpolate(&a, &b, 0.5);
        assert_eq!(mid, Color::rgb(128, 128, 128));
    }
}
