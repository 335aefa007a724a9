//! SVG DOM walk: elements to scene-graph nodes, with CSS cascade, SMIL
//! keyframes, gradients and masks.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64_STANDARD};
use kurbo::{Affine, Point, Size, Vec2};
use regex::Regex;
use roxmltree::Node as XmlNode;

use crate::animation::{AnimatedProperty, FrameTime, KeyframeTransition};
use crate::error::{VetraError, VetraResult, Warnings};
use crate::geometry::Bezier;
use crate::model::{
    Brush, Color, Composition, Document, EllipseShape, FillRule, FillStyle, Gradient,
    GradientColors, GradientKind, GradientStop, Group, ImageShape, Layer, LineCap, LineJoin,
    NamedColor, Node, NodeKind, PathShape, RectShape, Shape, StarKind, StarShape, StrokeStyle,
    Transform,
};
use crate::svg::animate::{AnimateParser, AnimatedProperties, ValueVariant, split_values};
use crate::svg::color::parse_color;
use crate::svg::css::{CSS_ATTRS, Style, StyleBlock, parse_css, sort_blocks};
use crate::svg::path_d::PathDParser;

static TRANSFORM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-zA-Z]+)\s*\(([^)]*)\)").unwrap());
static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"url\s*\(\s*#([-a-zA-Z0-9_]+)\s*\)").unwrap());
static UNIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([-+]?(?:[0-9]*\.[0-9]+|[0-9]+)(?:[eE][-+]?[0-9]+)?)\s*([a-z%]*)\s*$")
        .unwrap()
});

const XLINK_NS: &str = "http://www.w3.org/1999/xlink";
const SODIPODI_NS: &str = "http://sodipodi.sourceforge.net/DTD/sodipodi-0.0.dtd";
const INKSCAPE_NS: &str = "http://www.inkscape.org/namespaces/inkscape";

#[derive(Clone, Copy, Debug)]
pub struct SvgOptions {
    pub fps: f64,
    /// Composition length when the file has no animations.
    pub default_duration: FrameTime,
}

impl Default for SvgOptions {
    fn default() -> Self {
        Self {
            fps: 60.0,
            default_duration: 180.0,
        }
    }
}

/// Length with an optional absolute CSS unit, resolved at 96 dpi.
fn parse_unit(text: &str) -> Option<f64> {
    let m = UNIT_RE.captures(text)?;
    let value: f64 = m[1].parse().ok()?;
    let scale = match &m[2] {
        "" | "px" | "%" => 1.0,
        "pt" => 96.0 / 72.0,
        "pc" => 16.0,
        "in" => 96.0,
        "cm" => 96.0 / 2.54,
        "mm" => 96.0 / 25.4,
        _ => return None,
    };
    Some(value * scale)
}

fn percent_1(text: &str) -> f64 {
    if let Some(stripped) = text.strip_suffix('%') {
        stripped.trim().parse::<f64>().unwrap_or(100.0) / 100.0
    } else {
        text.parse().unwrap_or(1.0)
    }
}

pub(crate) fn parse_document(
    text: &str,
    options: &SvgOptions,
    warnings: &mut Warnings,
) -> VetraResult<Document> {
    let xml = roxmltree::Document::parse(text)
        .map_err(|e| VetraError::parse(format!("invalid markup: {e}")))?;
    let root = xml.root_element();
    if root.tag_name().name() != "svg" {
        return Err(VetraError::parse("not an svg document"));
    }

    let mut parser = SvgParser {
        warnings,
        animate: AnimateParser::new(options.fps),
        css_blocks: Vec::new(),
        brushes: HashMap::new(),
        gradient_colors: HashMap::new(),
        doc: Document::new(root.attribute("id").unwrap_or("svg")),
        text_warned: false,
    };
    let comp = parser.parse(root, options);
    parser.doc.compositions.push(comp);
    Ok(parser.doc)
}

struct SvgParser<'w> {
    warnings: &'w mut Warnings,
    animate: AnimateParser,
    css_blocks: Vec<StyleBlock>,
    /// Resolved paint servers by element id.
    brushes: HashMap<String, Brush>,
    /// Gradient stop-list asset ids by element id, for `href` reuse.
    gradient_colors: HashMap<String, String>,
    doc: Document,
    text_warned: bool,
}

struct ParseArgs<'a, 'input> {
    element: XmlNode<'a, 'input>,
    parent_style: Style,
    in_group: bool,
    skip_mask: bool,
}

impl SvgParser<'_> {
    fn parse(&mut self, svg: XmlNode, options: &SvgOptions) -> Composition {
        let mut size = Size::new(
            svg.attribute("width").and_then(parse_unit).unwrap_or(0.0),
            svg.attribute("height").and_then(parse_unit).unwrap_or(0.0),
        );

        let mut pos = Point::ZERO;
        let mut scale = Vec2::new(1.0, 1.0);
        if let Some(view_box) = svg.attribute("viewBox") {
            let vb = split_values(view_box);
            if vb.len() == 4 {
                if svg.attribute("width").is_none() {
                    size.width = vb[2];
                }
                if svg.attribute("height").is_none() {
                    size.height = vb[3];
                }
                pos = Point::new(-vb[0], -vb[1]);
                if vb[2] != 0.0 && vb[3] != 0.0 {
                    scale = Vec2::new(size.width / vb[2], size.height / vb[3]);
                }
            }
        }

        self.parse_css(svg);
        self.parse_defs(svg);
        self.parse_gradients(svg);

        let mut default_style = Style::default();
        default_style.set("fill", "black");
        let style = self.resolve_style(svg, &default_style);

        let mut children = Vec::new();
        for child in svg.children().filter(|c| c.is_element()) {
            self.parse_shape(
                ParseArgs {
                    element: child,
                    parent_style: style.clone(),
                    in_group: false,
                    skip_mask: false,
                },
                &mut children,
            );
        }

        let end_frame = if self.animate.max_kf > 0.0 {
            self.animate.max_kf
        } else {
            options.default_duration
        };
        // Nested layers were created before the duration was known.
        fix_layer_times(&mut children, end_frame);

        let mut root_layer = Layer::new(end_frame);
        root_layer.group.transform.position = AnimatedProperty::new(pos);
        root_layer.group.transform.scale = AnimatedProperty::new(scale);
        root_layer.group.children = children;

        let name = svg.attribute("id").unwrap_or("svg").to_owned();
        let mut comp = Composition::new(name.clone(), size.width, size.height);
        comp.fps = options.fps;
        comp.end_frame = end_frame;
        comp.nodes.push(Node::new(name, NodeKind::Layer(root_layer)));
        comp
    }

    fn parse_css(&mut self, svg: XmlNode) {
        for style in svg.descendants().filter(|n| n.has_tag_name("style")) {
            let mut data = String::new();
            for child in style.children() {
                if let Some(t) = child.text() {
                    data.push_str(t);
                }
            }
            parse_css(&data, &mut self.css_blocks);
        }
        sort_blocks(&mut self.css_blocks);
    }

    /// Detached animators from `<defs>`, re-attached via `href="#id"`.
    fn parse_defs(&mut self, svg: XmlNode) {
        for defs in svg.descendants().filter(|n| n.has_tag_name("defs")) {
            for def in defs.children().filter(|c| c.is_element()) {
                if def.tag_name().name().starts_with("animate")
                    && let Some(link) = href(def)
                    && let Some(id) = link.strip_prefix('#')
                {
                    self.animate.store_animate(id, def);
                }
            }
        }
    }

    /// Paint-server pass with a retry backlog: gradients referencing other
    /// gradients via `href` wait until their link target resolved. A pass
    /// that resolves nothing terminates the loop.
    fn parse_gradients(&mut self, svg: XmlNode) {
        let mut later = Vec::new();
        for node in svg.descendants().filter(|n| {
            n.has_tag_name("linearGradient") || n.has_tag_name("radialGradient")
        }) {
            if node.attribute("id").is_some() && self.gradient_link_check(node, &mut later) {
                self.parse_gradient_nolink(node);
            }
        }

        let mut unprocessed = Vec::new();
        while !later.is_empty() && unprocessed.len() != later.len() {
            unprocessed.clear();
            for element in &later {
                self.gradient_link_check(*element, &mut unprocessed);
            }
            std::mem::swap(&mut later, &mut unprocessed);
        }
    }

    /// Returns true when the element has no link and must be parsed from
    /// its own stops.
    fn gradient_link_check<'a, 'input>(
        &mut self,
        element: XmlNode<'a, 'input>,
        later: &mut Vec<XmlNode<'a, 'input>>,
    ) -> bool {
        let Some(link) = href(element) else {
            return true;
        };
        let Some(link) = link.strip_prefix('#') else {
            return false;
        };
        let id = element.attribute("id").unwrap_or_default().to_owned();

        if let Some(brush) = self.brushes.get(link) {
            // Single-stop targets degrade to named colors; aliases share it.
            if matches!(brush, Brush::Named(_)) {
                let brush = brush.clone();
                self.brushes.insert(id, brush);
                return false;
            }
        }
        if let Some(colors_id) = self.gradient_colors.get(link).cloned() {
            self.parse_gradient(element, &id, colors_id);
            return false;
        }

        later.push(element);
        false
    }

    fn parse_gradient_stops(&mut self, gradient: XmlNode) -> Vec<GradientStop> {
        let mut stops = Vec::new();
        for stop in gradient.children().filter(|c| c.has_tag_name("stop")) {
            let style = self.resolve_style(stop, &Style::default());
            if !style.contains("stop-color") {
                continue;
            }
            let Some(color) = parse_color(style.get("stop-color", "")) else {
                continue;
            };
            let opacity = percent_1(style.get("stop-opacity", "1"));
            let alpha = (f64::from(color.a) * opacity).round().clamp(0.0, 255.0) as u8;
            let offset = percent_1(stop.attribute("offset").unwrap_or("0"));
            stops.push(GradientStop {
                offset,
                color: color.with_alpha(alpha),
            });
        }
        stops.sort_by(|a, b| a.offset.total_cmp(&b.offset));
        stops
    }

    fn parse_gradient_nolink(&mut self, gradient: XmlNode) {
        let id = gradient.attribute("id").unwrap_or_default().to_owned();
        let stops = self.parse_gradient_stops(gradient);
        if stops.is_empty() {
            return;
        }

        if stops.len() == 1 {
            // Degrade to a flat named color.
            let mut color = AnimatedProperty::new(stops[0].color);
            if let Some(stop) = gradient.children().find(|c| c.has_tag_name("stop")) {
                let anim = self.animate.parse_animated_properties(stop, self.warnings);
                for kf in anim.single("stop-color") {
                    color.set_keyframe_with(kf.time, kf.values.color(), kf.transition);
                }
            }
            self.doc.assets.colors.insert(
                id.clone(),
                NamedColor {
                    name: id.clone(),
                    color,
                },
            );
            self.brushes.insert(id.clone(), Brush::Named(id));
            return;
        }

        self.doc
            .assets
            .gradient_colors
            .insert(id.clone(), GradientColors { stops });
        self.gradient_colors.insert(id.clone(), id.clone());
        self.parse_gradient(gradient, &id.clone(), id);
    }

    fn parse_gradient(&mut self, element: XmlNode, id: &str, colors_id: String) {
        let transform = element
            .attribute("gradientTransform")
            .map(|t| self.svg_transform(t).affine)
            .unwrap_or_default();
        let coord = |name: &str| element.attribute(name).and_then(parse_unit);

        let gradient = if element.has_tag_name("linearGradient") {
            let (Some(x1), Some(y1), Some(x2), Some(y2)) =
                (coord("x1"), coord("y1"), coord("x2"), coord("y2"))
            else {
                return;
            };
            let start = transform * Point::new(x1, y1);
            Gradient {
                kind: GradientKind::Linear,
                colors: colors_id,
                start,
                end: transform * Point::new(x2, y2),
                highlight: start,
            }
        } else {
            let (Some(cx), Some(cy), Some(r)) = (coord("cx"), coord("cy"), coord("r")) else {
                return;
            };
            let center = Point::new(cx, cy);
            let highlight = match (coord("fx"), coord("fy")) {
                (Some(fx), Some(fy)) => Point::new(fx, fy),
                _ => center,
            };
            Gradient {
                kind: GradientKind::Radial,
                colors: colors_id,
                start: transform * center,
                end: transform * Point::new(cx + r, cy),
                highlight: transform * highlight,
            }
        };
        self.doc.assets.gradients.insert(id.to_owned(), gradient);
        self.brushes.insert(id.to_owned(), Brush::Gradient(id.to_owned()));
    }

    /// Style resolution order: inherited style, CSS rules by specificity,
    /// inline `style`, presentation attributes, then `inherit` cleanup.
    fn resolve_style(&self, element: XmlNode, parent_style: &Style) -> Style {
        let mut style = parent_style.clone();

        let class_attr = element.attribute("class").unwrap_or_default();
        let classes: HashSet<&str> = class_attr.split_whitespace().collect();
        let tag = element.tag_name().name();
        let id = element.attribute("id");
        for block in &self.css_blocks {
            if block.selector.matches(tag, id, &classes) {
                for (k, v) in &block.declarations {
                    style.set(k, v);
                }
            }
        }

        if let Some(inline) = element.attribute("style") {
            for item in inline.split(';') {
                if let Some((name, value)) = item.split_once(':') {
                    let name = name.trim();
                    if CSS_ATTRS.contains(&name) {
                        style.set(name, value.trim());
                    }
                }
            }
        }

        for attr in element.attributes() {
            if CSS_ATTRS.contains(&attr.name()) {
                style.set(attr.name(), attr.value());
            }
        }

        style.resolve_inherit(parent_style);

        if !style.contains("fill") {
            let fill = parent_style.get("fill", "").to_owned();
            style.set("fill", &fill);
        }

        style.color = match style.get("color", "") {
            "" | "currentColor" => parent_style.color,
            other => parse_color(other).unwrap_or(parent_style.color),
        };
        style
    }

    fn parse_shape(&mut self, args: ParseArgs, out: &mut Vec<Node>) {
        if !args.skip_mask && self.handle_mask(&args, out) {
            return;
        }
        match args.element.tag_name().name() {
            "g" => self.parse_g(args, out),
            "rect" => self.parse_rect(args, out),
            "ellipse" => self.parse_ellipse(args, out),
            "circle" => self.parse_circle(args, out),
            "line" => self.parse_line(args, out),
            "polyline" => self.parse_poly(args, out, false),
            "polygon" => self.parse_poly(args, out, true),
            "path" => self.parse_path(args, out),
            "use" => self.parse_use(args, out),
            "image" => self.parse_image(args, out),
            "text" => self.parse_text(args, out),
            _ => {}
        }
    }

    /// `clip-path`/`mask` references become a layer whose mask shape is the
    /// referenced element's geometry.
    fn handle_mask(&mut self, args: &ParseArgs, out: &mut Vec<Node>) -> bool {
        let mask_ref = args
            .element
            .attribute("clip-path")
            .or_else(|| args.element.attribute("mask"));
        let Some(mask_ref) = mask_ref else {
            return false;
        };
        let Some(m) = URL_RE.captures(mask_ref) else {
            return false;
        };
        let Some(mask_element) = element_by_id(args.element, &m[1]) else {
            return false;
        };

        let mask_shape = self.first_shape(mask_element);
        if mask_shape.is_none() {
            self.warnings.warn("Mask content has no usable geometry");
        }

        let mut children = Vec::new();
        self.parse_shape(
            ParseArgs {
                element: args.element,
                parent_style: args.parent_style.clone(),
                in_group: true,
                skip_mask: true,
            },
            &mut children,
        );

        let mut layer = Layer::new(0.0);
        layer.group.children = children;
        layer.mask = mask_shape;
        out.push(Node::new(
            name_for(args.element),
            NodeKind::Layer(layer),
        ));
        true
    }

    /// Static geometry of the first shape-producing element in a subtree.
    fn first_shape(&mut self, element: XmlNode) -> Option<Shape> {
        let tag = element.tag_name().name();
        let len = |name: &str| {
            element
                .attribute(name)
                .and_then(parse_unit)
                .unwrap_or(0.0)
        };
        match tag {
            "rect" => Some(Shape::Rect(RectShape {
                position: AnimatedProperty::new(Point::new(
                    len("x") + len("width") / 2.0,
                    len("y") + len("height") / 2.0,
                )),
                size: AnimatedProperty::new(Size::new(len("width"), len("height"))),
                rounded: AnimatedProperty::new(len("rx").max(len("ry"))),
            })),
            "ellipse" => Some(Shape::Ellipse(EllipseShape {
                position: AnimatedProperty::new(Point::new(len("cx"), len("cy"))),
                size: AnimatedProperty::new(Size::new(len("rx") * 2.0, len("ry") * 2.0)),
            })),
            "circle" => Some(Shape::Ellipse(EllipseShape {
                position: AnimatedProperty::new(Point::new(len("cx"), len("cy"))),
                size: AnimatedProperty::new(Size::new(len("r") * 2.0, len("r") * 2.0)),
            })),
            "path" => {
                let d = element.attribute("d")?;
                let mbez = PathDParser::new(d).parse();
                let bezier = mbez.beziers().first()?.clone();
                Some(Shape::Path(PathShape {
                    shape: AnimatedProperty::new(bezier),
                }))
            }
            _ => element
                .children()
                .filter(|c| c.is_element())
                .find_map(|c| self.first_shape(c)),
        }
    }

    fn parse_g(&mut self, args: ParseArgs, out: &mut Vec<Node>) {
        let style = self.resolve_style(args.element, &args.parent_style);
        let mut group = Group::default();
        let anim = self
            .animate
            .parse_animated_properties(args.element, self.warnings);

        group.opacity = AnimatedProperty::new(percent_1(style.get("opacity", "1")));
        for kf in anim.single("opacity") {
            group.opacity.set_keyframe_with(
                kf.time,
                kf.values.vector().first().copied().unwrap_or(1.0),
                kf.transition,
            );
        }
        let visible = self.display_to_opacity(&anim, &mut group.opacity, &style);

        let mut child_style = style.clone();
        // Group opacity is on the node; do not double it on children.
        child_style.map.remove("opacity");
        for child in args.element.children().filter(|c| c.is_element()) {
            self.parse_shape(
                ParseArgs {
                    element: child,
                    parent_style: child_style.clone(),
                    in_group: true,
                    skip_mask: false,
                },
                &mut group.children,
            );
        }

        self.parse_transform(args.element, &mut group.transform);

        let kind = if args.in_group {
            NodeKind::Group(group)
        } else {
            let mut layer = Layer::new(0.0);
            layer.group = group;
            NodeKind::Layer(layer)
        };
        let mut node = Node::new(name_for(args.element), kind);
        node.visible = visible;
        out.push(node);
    }

    /// Wraps shapes plus their stylers in one group node, with the
    /// element's transform and opacity on the group.
    fn add_shapes(&mut self, args: &ParseArgs, shapes: Vec<Node>, out: &mut Vec<Node>) {
        let style = self.resolve_style(args.element, &args.parent_style);
        let mut group = Group::default();
        group.opacity = AnimatedProperty::new(percent_1(style.get("opacity", "1")));
        group.children = shapes;

        let anim = self
            .animate
            .parse_animated_properties(args.element, self.warnings);
        let visible = self.display_to_opacity(&anim, &mut group.opacity, &style)
            && style.get("visibility", "visible") != "hidden";

        let paint_order = match style.get("paint-order", "normal") {
            "normal" => "fill stroke",
            other => other,
        }
        .to_owned();
        for op in paint_order.split_whitespace() {
            match op {
                "fill" => {
                    if let Some(node) = self.fill_node(&anim, &style) {
                        group.children.push(node);
                    }
                }
                "stroke" => {
                    if let Some(node) = self.stroke_node(&anim, &style) {
                        group.children.push(node);
                    }
                }
                _ => {}
            }
        }

        self.parse_transform(args.element, &mut group.transform);

        let mut node = Node::new(name_for(args.element), NodeKind::Group(group));
        node.visible = visible;
        out.push(node);
    }

    /// `display` animations become hold keyframes on the opacity property.
    /// Returns the node's static visibility.
    fn display_to_opacity(
        &mut self,
        anim: &AnimatedProperties,
        opacity: &mut AnimatedProperty<f64>,
        style: &Style,
    ) -> bool {
        if anim.has("display") {
            if opacity.animated() {
                self.warnings
                    .warn("Either animate `opacity` or `display`, not both");
            } else {
                for kf in anim.single("display") {
                    let value = if kf.values.string() == "none" { 0.0 } else { 1.0 };
                    opacity.set_keyframe_with(kf.time, value, KeyframeTransition::hold());
                }
            }
            return true;
        }
        style.get("display", "") != "none"
    }

    fn brush_for(&self, color_str: &str, current_color: Color) -> Brush {
        if color_str.starts_with("url") {
            if let Some(m) = URL_RE.captures(color_str)
                && let Some(brush) = self.brushes.get(&m[1])
            {
                return brush.clone();
            }
            return Brush::flat(current_color);
        }
        if color_str.is_empty() || color_str == "currentColor" {
            return Brush::flat(current_color);
        }
        Brush::flat(parse_color(color_str).unwrap_or(current_color))
    }

    fn fill_node(&mut self, anim: &AnimatedProperties, style: &Style) -> Option<Node> {
        let fill_color = style.get("fill", "");
        let mut brush = self.brush_for(fill_color, style.color);
        if let Brush::Flat(color) = &mut brush {
            for kf in anim.single("fill") {
                color.set_keyframe_with(kf.time, kf.values.color(), kf.transition);
            }
        }

        let mut fill = FillStyle::new(brush);
        fill.opacity = AnimatedProperty::new(percent_1(style.get("fill-opacity", "1")));
        for kf in anim.single("fill-opacity") {
            fill.opacity.set_keyframe_with(
                kf.time,
                kf.values.vector().first().copied().unwrap_or(1.0),
                kf.transition,
            );
        }
        if style.get("fill-rule", "") == "evenodd" {
            fill.rule = FillRule::EvenOdd;
        }

        let mut node = Node::new("fill", NodeKind::Fill(fill));
        if fill_color == "none" {
            node.visible = false;
        }
        Some(node)
    }

    fn stroke_node(&mut self, anim: &AnimatedProperties, style: &Style) -> Option<Node> {
        let stroke_color = style.get("stroke", "transparent");
        if stroke_color == "none" {
            return None;
        }

        let mut brush = self.brush_for(stroke_color, style.color);
        if let Brush::Flat(color) = &mut brush {
            for kf in anim.single("stroke") {
                color.set_keyframe_with(kf.time, kf.values.color(), kf.transition);
            }
        }

        let width = parse_unit(style.get("stroke-width", "1")).unwrap_or(1.0);
        let mut stroke = StrokeStyle::new(brush, width);
        for kf in anim.single("stroke-width") {
            stroke.width.set_keyframe_with(
                kf.time,
                kf.values.vector().first().copied().unwrap_or(width),
                kf.transition,
            );
        }

        stroke.opacity = AnimatedProperty::new(percent_1(style.get("stroke-opacity", "1")));
        for kf in anim.single("stroke-opacity") {
            stroke.opacity.set_keyframe_with(
                kf.time,
                kf.values.vector().first().copied().unwrap_or(1.0),
                kf.transition,
            );
        }

        stroke.cap = match style.get("stroke-linecap", "butt") {
            "round" => LineCap::Round,
            "square" => LineCap::Square,
            _ => LineCap::Butt,
        };
        stroke.join = match style.get("stroke-linejoin", "miter") {
            "round" => LineJoin::Round,
            "bevel" => LineJoin::Bevel,
            _ => LineJoin::Miter,
        };
        stroke.miter_limit = style
            .get("stroke-miterlimit", "4")
            .parse()
            .unwrap_or(4.0);
        let dashes = style.get("stroke-dasharray", "none");
        if dashes != "none" {
            stroke.dashes = split_values(dashes);
        }
        stroke.dash_offset = parse_unit(style.get("stroke-dashoffset", "0")).unwrap_or(0.0);

        Some(Node::new("stroke", NodeKind::Stroke(stroke)))
    }

    fn len_attr(&self, element: XmlNode, name: &str, default: f64) -> f64 {
        element
            .attribute(name)
            .and_then(parse_unit)
            .unwrap_or(default)
    }

    fn parse_rect(&mut self, args: ParseArgs, out: &mut Vec<Node>) {
        let e = args.element;
        let w = self.len_attr(e, "width", 0.0);
        let h = self.len_attr(e, "height", 0.0);
        let mut rect = RectShape {
            position: AnimatedProperty::new(Point::new(
                self.len_attr(e, "x", 0.0) + w / 2.0,
                self.len_attr(e, "y", 0.0) + h / 2.0,
            )),
            size: AnimatedProperty::new(Size::new(w, h)),
            rounded: AnimatedProperty::new(
                self.len_attr(e, "rx", 0.0).max(self.len_attr(e, "ry", 0.0)),
            ),
        };

        let anim = self.animate.parse_animated_properties(e, self.warnings);
        for kf in anim.joined(&["x", "y", "width", "height"]) {
            let v = |i: usize| kf.values[i].vector().first().copied().unwrap_or(0.0);
            rect.position.set_keyframe_with(
                kf.time,
                Point::new(v(0) + v(2) / 2.0, v(1) + v(3) / 2.0),
                kf.transition,
            );
        }
        for kf in anim.joined(&["width", "height"]) {
            let v = |i: usize| kf.values[i].vector().first().copied().unwrap_or(0.0);
            rect.size
                .set_keyframe_with(kf.time, Size::new(v(0), v(1)), kf.transition);
        }
        for kf in anim.joined(&["rx", "ry"]) {
            let v = |i: usize| kf.values[i].vector().first().copied().unwrap_or(0.0);
            rect.rounded
                .set_keyframe_with(kf.time, v(0).max(v(1)), kf.transition);
        }

        let shape = Node::new("rect", NodeKind::Shape(Shape::Rect(rect)));
        self.add_shapes(&args, vec![shape], out);
    }

    fn parse_ellipse(&mut self, args: ParseArgs, out: &mut Vec<Node>) {
        let e = args.element;
        let mut ellipse = EllipseShape {
            position: AnimatedProperty::new(Point::new(
                self.len_attr(e, "cx", 0.0),
                self.len_attr(e, "cy", 0.0),
            )),
            size: AnimatedProperty::new(Size::new(
                self.len_attr(e, "rx", 0.0) * 2.0,
                self.len_attr(e, "ry", 0.0) * 2.0,
            )),
        };

        let anim = self.animate.parse_animated_properties(e, self.warnings);
        for kf in anim.joined(&["cx", "cy"]) {
            let v = |i: usize| kf.values[i].vector().first().copied().unwrap_or(0.0);
            ellipse
                .position
                .set_keyframe_with(kf.time, Point::new(v(0), v(1)), kf.transition);
        }
        for kf in anim.joined(&["rx", "ry"]) {
            let v = |i: usize| kf.values[i].vector().first().copied().unwrap_or(0.0);
            ellipse
                .size
                .set_keyframe_with(kf.time, Size::new(v(0) * 2.0, v(1) * 2.0), kf.transition);
        }

        let shape = Node::new("ellipse", NodeKind::Shape(Shape::Ellipse(ellipse)));
        self.add_shapes(&args, vec![shape], out);
    }

    fn parse_circle(&mut self, args: ParseArgs, out: &mut Vec<Node>) {
        let e = args.element;
        let d = self.len_attr(e, "r", 0.0) * 2.0;
        let mut ellipse = EllipseShape {
            position: AnimatedProperty::new(Point::new(
                self.len_attr(e, "cx", 0.0),
                self.len_attr(e, "cy", 0.0),
            )),
            size: AnimatedProperty::new(Size::new(d, d)),
        };

        let anim = self.animate.parse_animated_properties(e, self.warnings);
        for kf in anim.joined(&["cx", "cy"]) {
            let v = |i: usize| kf.values[i].vector().first().copied().unwrap_or(0.0);
            ellipse
                .position
                .set_keyframe_with(kf.time, Point::new(v(0), v(1)), kf.transition);
        }
        for kf in anim.single("r") {
            let d = kf.values.vector().first().copied().unwrap_or(0.0) * 2.0;
            ellipse
                .size
                .set_keyframe_with(kf.time, Size::new(d, d), kf.transition);
        }

        let shape = Node::new("circle", NodeKind::Shape(Shape::Ellipse(ellipse)));
        self.add_shapes(&args, vec![shape], out);
    }

    fn parse_line(&mut self, args: ParseArgs, out: &mut Vec<Node>) {
        let e = args.element;
        let line = |x1: f64, y1: f64, x2: f64, y2: f64| {
            let mut bez = Bezier::from_point(Point::new(x1, y1));
            bez.line_to(Point::new(x2, y2));
            bez
        };
        let mut path = PathShape {
            shape: AnimatedProperty::new(line(
                self.len_attr(e, "x1", 0.0),
                self.len_attr(e, "y1", 0.0),
                self.len_attr(e, "x2", 0.0),
                self.len_attr(e, "y2", 0.0),
            )),
        };

        let anim = self.animate.parse_animated_properties(e, self.warnings);
        for kf in anim.joined(&["x1", "y1", "x2", "y2"]) {
            let v = |i: usize| kf.values[i].vector().first().copied().unwrap_or(0.0);
            path.shape
                .set_keyframe_with(kf.time, line(v(0), v(1), v(2), v(3)), kf.transition);
        }

        let shape = Node::new("line", NodeKind::Shape(Shape::Path(path)));
        self.add_shapes(&args, vec![shape], out);
    }

    fn build_poly(&mut self, coords: &[f64], close: bool) -> Bezier {
        let mut bez = Bezier::new();
        if coords.len() < 4 {
            if !coords.is_empty() {
                self.warnings
                    .warn("Not enough `points` for `polygon` / `polyline`");
            }
            return bez;
        }
        bez.add_point(Point::new(coords[0], coords[1]), Vec2::ZERO, Vec2::ZERO);
        for pair in coords[2..].chunks_exact(2) {
            bez.line_to(Point::new(pair[0], pair[1]));
        }
        if close {
            bez.close();
        }
        bez
    }

    fn parse_poly(&mut self, args: ParseArgs, out: &mut Vec<Node>, close: bool) {
        let coords = split_values(args.element.attribute("points").unwrap_or(""));
        let bez = self.build_poly(&coords, close);
        let mut path = PathShape {
            shape: AnimatedProperty::new(bez),
        };

        let anim = self
            .animate
            .parse_animated_properties(args.element, self.warnings);
        for kf in anim.single("points") {
            let bez = self.build_poly(kf.values.vector(), close);
            path.shape.set_keyframe_with(kf.time, bez, kf.transition);
        }

        let shape = Node::new(
            if close { "polygon" } else { "polyline" },
            NodeKind::Shape(Shape::Path(path)),
        );
        self.add_shapes(&args, vec![shape], out);
    }

    fn parse_path(&mut self, args: ParseArgs, out: &mut Vec<Node>) {
        if self.parse_star(&args, out) {
            return;
        }
        let d = args.element.attribute("d").unwrap_or("");
        let mbez = PathDParser::new(d).parse();
        if mbez.is_empty() {
            return;
        }

        let mut shapes: Vec<Node> = mbez
            .beziers()
            .iter()
            .map(|bezier| {
                Node::new(
                    "path",
                    NodeKind::Shape(Shape::Path(PathShape {
                        shape: AnimatedProperty::new(bezier.clone()),
                    })),
                )
            })
            .collect();

        let anim = self
            .animate
            .parse_animated_properties(args.element, self.warnings);
        let kfs = anim.single("d");
        if !kfs.is_empty() {
            if shapes.len() == 1 {
                if let Some(Node {
                    kind: NodeKind::Shape(Shape::Path(path)),
                    ..
                }) = shapes.first_mut()
                {
                    for kf in kfs {
                        if let ValueVariant::Bezier(b) = &kf.values
                            && let Some(bez) = b.beziers().first()
                        {
                            path.shape
                                .set_keyframe_with(kf.time, bez.clone(), kf.transition);
                        }
                    }
                }
            } else {
                self.warnings
                    .warn("Can only animate `d` on single-contour paths");
            }
        }

        self.add_shapes(&args, shapes, out);
    }

    /// Inkscape star/polygon metadata takes precedence over the baked `d`.
    fn parse_star(&mut self, args: &ParseArgs, out: &mut Vec<Node>) -> bool {
        let e = args.element;
        if e.attribute((SODIPODI_NS, "type")) != Some("star") {
            return false;
        }
        let num = |ns: &'static str, name: &str| {
            e.attribute((ns, name)).and_then(|v| v.parse::<f64>().ok())
        };
        if num(INKSCAPE_NS, "randomized").unwrap_or(0.0) != 0.0
            || num(INKSCAPE_NS, "rounded").unwrap_or(0.0) != 0.0
        {
            return false;
        }

        let kind = if e.attribute((INKSCAPE_NS, "flatsided")) == Some("true") {
            StarKind::Polygon
        } else {
            StarKind::Star
        };
        let star = StarShape {
            position: AnimatedProperty::new(Point::new(
                num(SODIPODI_NS, "cx").unwrap_or(0.0),
                num(SODIPODI_NS, "cy").unwrap_or(0.0),
            )),
            outer_radius: AnimatedProperty::new(num(SODIPODI_NS, "r1").unwrap_or(0.0)),
            inner_radius: AnimatedProperty::new(num(SODIPODI_NS, "r2").unwrap_or(0.0)),
            angle: AnimatedProperty::new(
                num(SODIPODI_NS, "arg1").unwrap_or(0.0).to_degrees() + 90.0,
            ),
            points: AnimatedProperty::new(num(SODIPODI_NS, "sides").unwrap_or(5.0)),
            kind,
        };

        let shape = Node::new("star", NodeKind::Shape(Shape::Star(star)));
        self.add_shapes(args, vec![shape], out);
        true
    }

    fn parse_use(&mut self, args: ParseArgs, out: &mut Vec<Node>) {
        let Some(id) = href(args.element).and_then(|h| h.strip_prefix('#')) else {
            return;
        };
        let Some(target) = element_by_id(args.element, id) else {
            return;
        };

        let style = self.resolve_style(args.element, &args.parent_style);
        let mut group = Group::default();
        self.parse_shape(
            ParseArgs {
                element: target,
                parent_style: style,
                in_group: true,
                skip_mask: false,
            },
            &mut group.children,
        );

        self.parse_transform(args.element, &mut group.transform);
        let offset = Vec2::new(
            self.len_attr(args.element, "x", 0.0),
            self.len_attr(args.element, "y", 0.0),
        );
        let base = *group.transform.position.value();
        group.transform.position = AnimatedProperty::new(base + offset);

        out.push(Node::new(name_for(args.element), NodeKind::Group(group)));
    }

    fn parse_image(&mut self, args: ParseArgs, out: &mut Vec<Node>) {
        let e = args.element;
        let link = href(e).unwrap_or("");
        let asset_id = format!("image-{}", self.doc.assets.bitmaps.len());

        let bitmap = decode_data_uri(link);
        if bitmap.is_none() {
            self.warnings
                .warn(format!("Could not load image {link:.60}"));
        }
        self.doc.assets.bitmaps.insert(
            asset_id.clone(),
            bitmap.unwrap_or(crate::model::Bitmap {
                width: self.len_attr(e, "width", 0.0) as u32,
                height: self.len_attr(e, "height", 0.0) as u32,
                rgba: Vec::new(),
            }),
        );

        let mut transform = Transform::new();
        if let Some(t) = e.attribute("transform") {
            let parsed = self.svg_transform(t);
            apply_affine(&mut transform, parsed.affine, parsed.anchor);
        }
        let base = *transform.position.value();
        let offset = Vec2::new(self.len_attr(e, "x", 0.0), self.len_attr(e, "y", 0.0));
        transform.position = AnimatedProperty::new(base + offset);

        out.push(Node::new(
            name_for(e),
            NodeKind::Image(ImageShape {
                asset: asset_id,
                transform,
                opacity: AnimatedProperty::new(1.0),
            }),
        ));
    }

    /// Text carries its anchor position but no glyph layout.
    fn parse_text(&mut self, args: ParseArgs, out: &mut Vec<Node>) {
        if !self.text_warned {
            self.text_warned = true;
            self.warnings.warn("Text is imported as positioned groups without layout");
        }
        let mut group = Group::default();
        group.transform.position = AnimatedProperty::new(Point::new(
            self.len_attr(args.element, "x", 0.0),
            self.len_attr(args.element, "y", 0.0),
        ));
        out.push(Node::new(name_for(args.element), NodeKind::Group(group)));
    }

    /// Applies the `transform` attribute plus any `animateTransform`
    /// children to a model transform.
    fn parse_transform(&mut self, element: XmlNode, transform: &mut Transform) {
        if let Some(attr) = element.attribute("transform") {
            let parsed = self.svg_transform(attr);
            apply_affine(transform, parsed.affine, parsed.anchor);
        }

        let anim = self
            .animate
            .parse_animated_transform(element, self.warnings);

        if anim.has("motion") {
            for kf in anim.single("motion") {
                let v = kf.values.vector();
                if v.len() >= 2 {
                    transform.position.set_keyframe_with(
                        kf.time,
                        Point::new(v[0], v[1]),
                        kf.transition,
                    );
                }
            }
        } else {
            for kf in anim.single("translate") {
                let v = kf.values.vector();
                transform.position.set_keyframe_with(
                    kf.time,
                    Point::new(
                        v.first().copied().unwrap_or(0.0),
                        v.get(1).copied().unwrap_or(0.0),
                    ),
                    kf.transition,
                );
            }
        }

        for kf in anim.single("scale") {
            let v = kf.values.vector();
            let x = v.first().copied().unwrap_or(1.0);
            transform.scale.set_keyframe_with(
                kf.time,
                Vec2::new(x, v.get(1).copied().unwrap_or(x)),
                kf.transition,
            );
        }

        for kf in anim.single("rotate") {
            let v = kf.values.vector();
            transform.rotation.set_keyframe_with(
                kf.time,
                v.first().copied().unwrap_or(0.0),
                kf.transition,
            );
            // A three-value rotate pins the pivot for this keyframe.
            if v.len() == 3 {
                let p = Point::new(v[1], v[2]);
                transform.anchor.set_keyframe_with(kf.time, p, kf.transition);
                transform.position.set_keyframe_with(kf.time, p, kf.transition);
            }
        }
    }

    /// Composes transform functions in textual order. A 3-argument
    /// `rotate` records its pivot instead of baking translate pairs.
    fn svg_transform(&mut self, attr: &str) -> ParsedTransform {
        let mut out = ParsedTransform {
            affine: Affine::IDENTITY,
            anchor: None,
        };
        for m in TRANSFORM_RE.captures_iter(attr) {
            let args = split_values(&m[2]);
            if args.is_empty() {
                self.warnings.warn("Missing transformation parameters");
                continue;
            }
            match &m[1] {
                "translate" => {
                    out.affine *= Affine::translate(Vec2::new(
                        args[0],
                        args.get(1).copied().unwrap_or(0.0),
                    ));
                }
                "scale" => {
                    out.affine *= Affine::scale_non_uniform(
                        args[0],
                        args.get(1).copied().unwrap_or(args[0]),
                    );
                }
                "rotate" => {
                    let rotation = Affine::rotate(args[0].to_radians());
                    if args.len() > 2 {
                        let pivot = Vec2::new(args[1], args[2]);
                        out.anchor = Some(pivot.to_point());
                        out.affine = out.affine
                            * Affine::translate(pivot)
                            * rotation
                            * Affine::translate(-pivot);
                    } else {
                        out.affine *= rotation;
                    }
                }
                "skewX" => {
                    out.affine *= Affine::skew(args[0].to_radians().tan(), 0.0);
                }
                "skewY" => {
                    out.affine *= Affine::skew(0.0, args[0].to_radians().tan());
                }
                "matrix" => {
                    if args.len() == 6 {
                        out.affine *= Affine::new([
                            args[0], args[1], args[2], args[3], args[4], args[5],
                        ]);
                    } else {
                        self.warnings.warn("Wrong transformation matrix");
                    }
                }
                other => {
                    self.warnings.warn(format!("Unknown transformation {other}"));
                }
            }
        }
        out
    }
}

fn fix_layer_times(nodes: &mut [Node], end: FrameTime) {
    for node in nodes {
        match &mut node.kind {
            NodeKind::Layer(layer) => {
                if layer.end_time == 0.0 {
                    layer.end_time = end;
                }
                fix_layer_times(&mut layer.group.children, end);
            }
            NodeKind::Group(group) => fix_layer_times(&mut group.children, end),
            _ => {}
        }
    }
}

struct ParsedTransform {
    affine: Affine,
    anchor: Option<Point>,
}

/// Decomposes an affine into the transform's position/rotation/scale
/// properties; residual skew is dropped. A rotate pivot recomputes the
/// anchor so the rotation stays centered after import.
fn apply_affine(transform: &mut Transform, affine: Affine, anchor: Option<Point>) {
    let c = affine.as_coeffs();
    let rotation = c[1].atan2(c[0]).to_degrees();
    let scale_x = c[0].hypot(c[1]);
    let det = c[0] * c[3] - c[1] * c[2];
    let scale_y = if scale_x != 0.0 { det / scale_x } else { 0.0 };

    transform.rotation = AnimatedProperty::new(rotation);
    transform.scale = AnimatedProperty::new(Vec2::new(scale_x, scale_y));
    match anchor {
        Some(a) => {
            transform.anchor = AnimatedProperty::new(a);
            transform.position = AnimatedProperty::new(affine * a);
        }
        None => {
            transform.position = AnimatedProperty::new(Point::new(c[4], c[5]));
        }
    }
}

fn href<'a>(element: XmlNode<'a, '_>) -> Option<&'a str> {
    element
        .attribute((XLINK_NS, "href"))
        .or_else(|| element.attribute("href"))
}

fn name_for(element: XmlNode) -> String {
    element
        .attribute((INKSCAPE_NS, "label"))
        .or_else(|| element.attribute("id"))
        .unwrap_or_else(|| element.tag_name().name())
        .to_owned()
}

fn element_by_id<'a, 'input>(
    context: XmlNode<'a, 'input>,
    id: &str,
) -> Option<XmlNode<'a, 'input>> {
    context
        .document()
        .descendants()
        .find(|n| n.attribute("id") == Some(id))
}

/// Decodes `data:` URIs with base64 payloads into RGBA8 pixels.
/// Attribute-value normalization turns the newlines in line-wrapped URIs
/// into spaces, so whitespace is stripped before decoding.
fn decode_data_uri(link: &str) -> Option<crate::model::Bitmap> {
    let payload = link.strip_prefix("data:")?;
    let (_, data) = payload.split_once(";base64,")?;
    let data: String = data.split_whitespace().collect();
    let bytes = BASE64_STANDARD.decode(&data).ok()?;
    let image = image::load_from_memory(&bytes).ok()?.to_rgba8();
    Some(crate::model::Bitmap {
        width: image.width(),
        height: image.height(),
        rgba: image.into_raw(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(xml: &str) -> (Document, Warnings) {
        let mut warnings = Warnings::new();
        let doc = parse_document(xml, &SvgOptions::default(), &mut warnings).unwrap();
        (doc, warnings)
    }

    fn root_children(doc: &Document) -> &[Node] {
        match &doc.compositions[0].nodes[0].kind {
            NodeKind::Layer(layer) => &layer.group.children,
            _ => panic!("expected root layer"),
        }
    }

    #[test]
    fn rejects_non_svg() {
        let mut warnings = Warnings::new();
        let err = parse_document("<html/>", &SvgOptions::default(), &mut warnings);
        assert!(err.is_err());
    }

    #[test]
    fn rect_is_center_based() {
        let (doc, _) =
            parse(r#"<svg width="100" height="100"><rect x="0" y="0" width="10" height="10"/></svg>"#);
        let children = root_children(&doc);
        let NodeKind::Group(group) = &children[0].kind else {
            panic!("expected shape group");
        };
        let NodeKind::Shape(Shape::Rect(rect)) = &group.children[0].kind else {
            panic!("expected rect");
        };
        assert_eq!(*rect.position.value(), Point::new(5.0, 5.0));
        assert_eq!(*rect.size.value(), Size::new(10.0, 10.0));
        // Default fill black comes from the cascade.
        assert!(matches!(&group.children[1].kind, NodeKind::Fill(_)));
    }

    #[test]
    fn css_cascade_and_inline_style() {
        let (doc, _) = parse(
            r#"<svg width="10" height="10">
                <style>rect { fill: #00ff00; } .hero { fill: #0000ff; }</style>
                <rect class="hero" width="5" height="5" style="stroke: red"/>
            </svg>"#,
        );
        let children = root_children(&doc);
        let NodeKind::Group(group) = &children[0].kind else {
            panic!("expected group");
        };
        let fill = group.children.iter().find_map(|n| match &n.kind {
            NodeKind::Fill(f) => Some(f),
            _ => None,
        });
        let Some(FillStyle {
            brush: Brush::Flat(color),
            ..
        }) = fill
        else {
            panic!("expected flat fill");
        };
        // Class beats tag specificity.
        assert_eq!(*color.value(), Color::new(0, 0, 255, 255));
        assert!(group.children.iter().any(|n| matches!(&n.kind, NodeKind::Stroke(_))));
    }

    #[test]
    fn viewbox_scales_root_layer() {
        let (doc, _) = parse(r#"<svg width="100" height="50" viewBox="0 0 10 10"/>"#);
        let NodeKind::Layer(layer) = &doc.compositions[0].nodes[0].kind else {
            panic!("expected layer");
        };
        assert_eq!(*layer.group.transform.scale.value(), Vec2::new(10.0, 5.0));
    }

    #[test]
    fn animated_rect_joins_attributes() {
        let (doc, _) = parse(
            r#"<svg width="100" height="100">
                <rect x="0" y="0" width="10" height="10">
                  <animate attributeName="width" from="10" to="30" begin="0s" dur="1s"/>
                </rect>
            </svg>"#,
        );
        let children = root_children(&doc);
        let NodeKind::Group(group) = &children[0].kind else {
            panic!("expected group");
        };
        let NodeKind::Shape(Shape::Rect(rect)) = &group.children[0].kind else {
            panic!("expected rect");
        };
        // Position = x + width/2 at each tick even though only width animates.
        assert!(rect.position.animated());
        assert_eq!(rect.position.get_at(0.0), Point::new(5.0, 5.0));
        assert_eq!(rect.position.get_at(60.0), Point::new(15.0, 5.0));
        assert_eq!(rect.size.get_at(60.0), Size::new(30.0, 10.0));
    }

    #[test]
    fn single_stop_gradient_degrades_to_named_color() {
        let (doc, _) = parse(
            r##"<svg width="10" height="10">
                <linearGradient id="g1" x1="0" y1="0" x2="1" y2="1">
                  <stop offset="0" stop-color="#ff0000"/>
                </linearGradient>
                <rect width="5" height="5" fill="url(#g1)"/>
            </svg>"##,
        );
        assert!(doc.assets.colors.contains_key("g1"));
        assert!(doc.assets.gradients.is_empty());
    }

    #[test]
    fn linked_gradient_reuses_stops() {
        let (doc, _) = parse(
            r##"<svg width="10" height="10" xmlns:xlink="http://www.w3.org/1999/xlink">
                <linearGradient id="g2" xlink:href="#base" x1="0" y1="0" x2="5" y2="0"/>
                <linearGradient id="base" x1="0" y1="0" x2="1" y2="1">
                  <stop offset="0" stop-color="#ff0000"/>
                  <stop offset="1" stop-color="#0000ff"/>
                </linearGradient>
            </svg>"##,
        );
        assert_eq!(doc.assets.gradient_colors.len(), 1);
        assert_eq!(doc.assets.gradients.len(), 2);
        let g2 = &doc.assets.gradients["g2"];
        assert_eq!(g2.colors, "base");
        assert_eq!(g2.end, Point::new(5.0, 0.0));
    }

    #[test]
    fn transform_rotate_with_anchor() {
        let (doc, _) = parse(
            r#"<svg width="10" height="10"><g transform="rotate(90 5 5)"><rect width="2" height="2"/></g></svg>"#,
        );
        let children = root_children(&doc);
        let NodeKind::Layer(layer) = &children[0].kind else {
            panic!("expected layer for top-level g");
        };
        let t = &layer.group.transform;
        assert!((t.rotation.get_at(0.0) - 90.0).abs() < 1e-9);
        assert_eq!(*t.anchor.value(), Point::new(5.0, 5.0));
        // Pivot preserved: anchor maps onto itself.
        let affine = t.to_affine(0.0);
        let mapped = affine * Point::new(5.0, 5.0);
        assert!((mapped - Point::new(5.0, 5.0)).hypot() < 1e-9);
    }

    #[test]
    fn clip_path_becomes_mask_layer() {
        let (doc, _) = parse(
            r#"<svg width="10" height="10">
                <defs><clipPath id="c"><circle cx="5" cy="5" r="5"/></clipPath></defs>
                <rect width="10" height="10" clip-path="url(#c)"/>
            </svg>"#,
        );
        let children = root_children(&doc);
        let NodeKind::Layer(layer) = &children[0].kind else {
            panic!("expected mask layer");
        };
        assert!(matches!(layer.mask, Some(Shape::Ellipse(_))));
    }

    #[test]
    fn display_none_hides_node() {
        let (doc, _) = parse(
            r#"<svg width="10" height="10"><rect width="5" height="5" display="none"/></svg>"#,
        );
        let children = root_children(&doc);
        assert!(!children[0].visible);
    }

    #[test]
    fn data_uri_with_wrapped_payload_decodes() {
        let mut png = std::io::Cursor::new(Vec::new());
        image::RgbaImage::from_pixel(1, 1, image::Rgba([10, 20, 30, 255]))
            .write_to(&mut png, image::ImageFormat::Png)
            .unwrap();
        let mut payload = BASE64_STANDARD.encode(png.into_inner());
        // Line-wrapped URIs reach us with the newlines normalized to spaces.
        payload.insert(payload.len() / 2, ' ');

        let bitmap = decode_data_uri(&format!("data:image/png;base64,{payload}")).unwrap();
        assert_eq!((bitmap.width, bitmap.height), (1, 1));
        assert_eq!(bitmap.rgba, vec![10, 20, 30, 255]);
    }
}
