//! SMIL animation support: `animate`, `animateTransform` and
//! `animateMotion` children become keyframe lists on the owning element's
//! attributes, which the DOM walk then merges into model properties.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use roxmltree::Node;

use crate::animation::{FrameTime, Interpolate, KeyframeTransition};
use crate::error::Warnings;
use crate::geometry::MultiBezier;
use crate::model::Color;
use crate::svg::color::parse_color;
use crate::svg::path_d::PathDParser;

use kurbo::Point;

static SEPARATOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*,\s*|\s+").unwrap());
static FRAME_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*;\s*").unwrap());
static CLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:(?P<timecount>[0-9]+(?:\.[0-9]+)?)(?P<unit>h|min|s|ms)$|(?:(?P<hours>[0-9]+):)?(?:(?P<minutes>[0-9]{2}):)?(?P<seconds>[0-9]+(?:\.[0-9]+)?)$)",
    )
    .unwrap()
});

/// One keyframe value, typed by the attribute being animated.
#[derive(Clone, Debug, PartialEq)]
pub enum ValueVariant {
    Vector(Vec<f64>),
    Bezier(MultiBezier),
    String(String),
    Color(Color),
}

impl ValueVariant {
    pub fn vector(&self) -> &[f64] {
        match self {
            ValueVariant::Vector(v) => v,
            _ => &[],
        }
    }

    pub fn color(&self) -> Color {
        match self {
            ValueVariant::Color(c) => *c,
            _ => Color::TRANSPARENT,
        }
    }

    pub fn string(&self) -> &str {
        match self {
            ValueVariant::String(s) => s,
            _ => "",
        }
    }

    pub fn bezier(&self) -> Option<&MultiBezier> {
        match self {
            ValueVariant::Bezier(b) => Some(b),
            _ => None,
        }
    }

    fn compatible(&self, other: &ValueVariant) -> bool {
        match (self, other) {
            (ValueVariant::Vector(a), ValueVariant::Vector(b)) => a.len() == b.len(),
            (ValueVariant::Bezier(_), ValueVariant::Bezier(_)) => true,
            (ValueVariant::String(_), ValueVariant::String(_)) => true,
            (ValueVariant::Color(_), ValueVariant::Color(_)) => true,
            _ => false,
        }
    }

    /// Vectors and colors interpolate; strings and paths hold.
    fn sample(&self, other: &ValueVariant, t: f64) -> ValueVariant {
        match (self, other) {
            (ValueVariant::Vector(a), ValueVariant::Vector(b)) if a.len() == b.len() => {
                ValueVariant::Vector(
                    a.iter()
                        .zip(b)
                        .map(|(x, y)| x + (y - x) * t)
                        .collect(),
                )
            }
            (ValueVariant::Color(a), ValueVariant::Color(b)) => {
                ValueVariant::Color(Color::interpolate(a, b, t))
            }
            _ => self.clone(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ValueType {
    Vector,
    Bezier,
    String,
    Color,
}

fn value_type(attr: &str) -> ValueType {
    match attr {
        "d" => ValueType::Bezier,
        "display" => ValueType::String,
        "fill" | "stroke" | "stop-color" => ValueType::Color,
        _ => ValueType::Vector,
    }
}

#[derive(Clone, Debug)]
pub struct AnimKeyframe {
    pub time: FrameTime,
    pub values: ValueVariant,
    pub transition: KeyframeTransition,
}

#[derive(Clone, Debug)]
pub struct JoinedKeyframe {
    pub time: FrameTime,
    pub values: Vec<ValueVariant>,
    pub transition: KeyframeTransition,
}

#[derive(Clone, Debug, Default)]
struct AnimatedAttr {
    keyframes: Vec<AnimKeyframe>,
    auto_orient: bool,
}

impl AnimatedAttr {
    fn sample(&self, time: FrameTime) -> Option<ValueVariant> {
        let idx = self.keyframes.partition_point(|k| k.time <= time);
        if idx == 0 {
            return self.keyframes.first().map(|k| k.values.clone());
        }
        if idx >= self.keyframes.len() {
            return self.keyframes.last().map(|k| k.values.clone());
        }
        let a = &self.keyframes[idx - 1];
        let b = &self.keyframes[idx];
        let span = b.time - a.time;
        let ratio = if span > 0.0 { (time - a.time) / span } else { 1.0 };
        Some(a.values.sample(&b.values, a.transition.lerp_factor(ratio)))
    }

    fn transition_at(&self, time: FrameTime) -> Option<KeyframeTransition> {
        self.keyframes
            .iter()
            .find(|k| k.time == time)
            .map(|k| k.transition)
    }
}

/// The animatable attributes of one element, ready for `single`/`joined`
/// extraction.
#[derive(Debug, Default)]
pub struct AnimatedProperties {
    properties: HashMap<String, AnimatedAttr>,
    /// Static attribute values from the element, for joining with
    /// animated siblings.
    attrs: HashMap<String, String>,
}

impl AnimatedProperties {
    pub fn has(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    /// Keyframes of one animated attribute, empty when not animated.
    pub fn single(&self, name: &str) -> Vec<AnimKeyframe> {
        self.properties
            .get(name)
            .map(|a| a.keyframes.clone())
            .unwrap_or_default()
    }

    pub fn auto_orient(&self, name: &str) -> bool {
        self.properties.get(name).is_some_and(|a| a.auto_orient)
    }

    /// Joins several attributes into one keyframe stream over the union of
    /// their keyframe times. Attributes without animators contribute their
    /// static value at every tick; if one of those is missing entirely the
    /// join produces nothing.
    pub fn joined(&self, names: &[&str]) -> Vec<JoinedKeyframe> {
        enum Source<'a> {
            Animated(&'a AnimatedAttr),
            Constant(ValueVariant),
        }

        let mut sources = Vec::with_capacity(names.len());
        let mut times: Vec<FrameTime> = Vec::new();
        for name in names {
            match self.properties.get(*name) {
                Some(attr) => {
                    for kf in &attr.keyframes {
                        if !times.contains(&kf.time) {
                            times.push(kf.time);
                        }
                    }
                    sources.push(Source::Animated(attr));
                }
                None => {
                    let Some(raw) = self.attrs.get(*name) else {
                        return Vec::new();
                    };
                    sources.push(Source::Constant(ValueVariant::Vector(split_values(raw))));
                }
            }
        }
        if times.is_empty() {
            return Vec::new();
        }
        times.sort_by(f64::total_cmp);

        times
            .into_iter()
            .map(|time| {
                let mut transition = None;
                let values = sources
                    .iter()
                    .map(|source| match source {
                        Source::Animated(attr) => {
                            if transition.is_none() {
                                transition = attr.transition_at(time);
                            }
                            attr.sample(time)
                                .unwrap_or(ValueVariant::Vector(Vec::new()))
                        }
                        Source::Constant(v) => v.clone(),
                    })
                    .collect();
                JoinedKeyframe {
                    time,
                    values,
                    transition: transition.unwrap_or_else(KeyframeTransition::linear),
                }
            })
            .collect()
    }
}

/// Splits an attribute into numbers. A single token may also be a color,
/// flattened to RGBA components in 0..1.
pub fn split_values(v: &str) -> Vec<f64> {
    let v = v.trim();
    if !SEPARATOR.is_match(v) {
        if let Ok(val) = v.parse::<f64>() {
            return vec![val];
        }
        if let Some(c) = parse_color(v) {
            let [r, g, b, a] = c.components();
            return vec![f64::from(r), f64::from(g), f64::from(b), f64::from(a)];
        }
        return Vec::new();
    }
    SEPARATOR
        .split(v)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().unwrap_or(0.0))
        .collect()
}

/// Collects SMIL animators for elements, including animators stored under
/// `<defs>` that point at their target with `href="#id"`.
pub struct AnimateParser {
    pub fps: f64,
    pub min_kf: FrameTime,
    pub max_kf: FrameTime,
    range_initialized: bool,
    stored: HashMap<String, Vec<StoredAnimate>>,
}

/// A detached animator element, captured as attribute pairs so it outlives
/// the DOM borrow.
#[derive(Clone, Debug)]
struct StoredAnimate {
    tag: String,
    attrs: HashMap<String, String>,
}

impl AnimateParser {
    pub fn new(fps: f64) -> Self {
        Self {
            fps,
            min_kf: 0.0,
            max_kf: 0.0,
            range_initialized: false,
            stored: HashMap::new(),
        }
    }

    /// `1.5s`, `90min`, `01:05:20.5` and friends, scaled to frames.
    pub fn clock_to_frame(&self, clock: &str) -> FrameTime {
        let Some(m) = CLOCK.captures(clock.trim()) else {
            return 0.0;
        };
        let num = |name: &str| {
            m.name(name)
                .and_then(|v| v.as_str().parse::<f64>().ok())
                .unwrap_or(0.0)
        };
        if let Some(unit) = m.name("unit") {
            let scale = match unit.as_str() {
                "ms" => 0.001,
                "min" => 60.0,
                "h" => 3600.0,
                _ => 1.0,
            };
            return num("timecount") * scale * self.fps;
        }
        (num("hours") * 3600.0 + num("minutes") * 60.0 + num("seconds")) * self.fps
    }

    pub fn store_animate(&mut self, target: &str, animate: Node) {
        let stored = StoredAnimate {
            tag: animate.tag_name().name().to_owned(),
            attrs: animate
                .attributes()
                .map(|a| (a.name().to_owned(), a.value().to_owned()))
                .collect(),
        };
        self.stored.entry(target.to_owned()).or_default().push(stored);
    }

    /// `animate` children keyed by `attributeName`, plus `animateMotion`
    /// under the reserved name `motion`.
    pub fn parse_animated_properties(
        &mut self,
        parent: Node,
        warnings: &mut Warnings,
    ) -> AnimatedProperties {
        self.parse_animated_elements(parent, warnings, |tag, attrs| match tag {
            "animate" => attrs.get("attributeName").cloned(),
            "animateMotion" => Some("motion".to_owned()),
            _ => None,
        })
    }

    /// `animateTransform` children keyed by transform `type`.
    pub fn parse_animated_transform(
        &mut self,
        parent: Node,
        warnings: &mut Warnings,
    ) -> AnimatedProperties {
        self.parse_animated_elements(parent, warnings, |tag, attrs| match tag {
            "animateTransform"
                if attrs.get("attributeName").map(String::as_str) == Some("transform") =>
            {
                attrs.get("type").cloned()
            }
            "animateMotion" => Some("motion".to_owned()),
            _ => None,
        })
    }

    fn parse_animated_elements(
        &mut self,
        parent: Node,
        warnings: &mut Warnings,
        key: impl Fn(&str, &HashMap<String, String>) -> Option<String>,
    ) -> AnimatedProperties {
        let mut props = AnimatedProperties::default();
        for attr in parent.attributes() {
            props
                .attrs
                .insert(attr.name().to_owned(), attr.value().to_owned());
        }

        let mut animators: Vec<StoredAnimate> = parent
            .children()
            .filter(|c| c.is_element())
            .map(|c| StoredAnimate {
                tag: c.tag_name().name().to_owned(),
                attrs: c
                    .attributes()
                    .map(|a| (a.name().to_owned(), a.value().to_owned()))
                    .collect(),
            })
            .collect();
        if let Some(id) = parent.attribute("id")
            && let Some(stored) = self.stored.get(id)
        {
            animators.extend(stored.iter().cloned());
        }

        for animate in &animators {
            if let Some(name) = key(&animate.tag, &animate.attrs) {
                let motion = animate.tag == "animateMotion";
                let entry = props.properties.entry(name).or_default();
                self.parse_animate(animate, entry, motion, warnings);
            }
        }
        props.properties.retain(|_, attr| !attr.keyframes.is_empty());
        props
    }

    fn parse_animate(
        &mut self,
        animate: &StoredAnimate,
        prop: &mut AnimatedAttr,
        motion: bool,
        warnings: &mut Warnings,
    ) {
        if !prop.keyframes.is_empty() {
            warnings.warn("Multiple `animate` for the same property");
            return;
        }

        let attr = |name: &str| animate.attrs.get(name).map(String::as_str);

        let start_time = attr("begin").map_or(0.0, |v| self.clock_to_frame(v));
        let end_time = if let Some(dur) = attr("dur") {
            start_time + self.clock_to_frame(dur)
        } else if let Some(end) = attr("end") {
            self.clock_to_frame(end)
        } else {
            0.0
        };
        if start_time >= end_time {
            warnings.warn("Invalid timings in `animate`");
            return;
        }
        self.register_time_range(start_time, end_time);

        let values = if motion {
            let Some(path) = attr("path") else {
                warnings.warn("Missing path for animateMotion");
                return;
            };
            if let Some(rotate) = attr("rotate") {
                if rotate == "auto" || rotate == "auto-reverse" {
                    prop.auto_orient = true;
                } else if rotate.parse::<i64>().map(|d| d % 360) != Ok(0) {
                    warnings
                        .warn("The only supported values for animateMotion.rotate are auto or 0");
                }
            }
            let mbez = PathDParser::new(path).parse();
            mbez.beziers()
                .iter()
                .flat_map(|b| b.points())
                .map(|p| ValueVariant::Vector(vec![p.pos.x, p.pos.y]))
                .collect()
        } else {
            let Some(values) = self.get_values(animate, warnings) else {
                return;
            };
            values
        };
        if values.is_empty() {
            return;
        }

        let times: Vec<FrameTime> = if let Some(key_times) = attr("keyTimes") {
            let ticks: Vec<&str> = FRAME_SEPARATOR
                .split(key_times.trim())
                .filter(|s| !s.is_empty())
                .collect();
            if ticks.len() != values.len() {
                warnings.warn(format!(
                    "`keyTimes` ({}) and `values` ({}) mismatch",
                    ticks.len(),
                    values.len()
                ));
                return;
            }
            ticks
                .iter()
                .map(|s| {
                    let t = s.parse::<f64>().unwrap_or(0.0);
                    start_time + (end_time - start_time) * t
                })
                .collect()
        } else {
            (0..values.len())
                .map(|i| {
                    let t = i as f64 / (values.len() - 1).max(1) as f64;
                    start_time + (end_time - start_time) * t
                })
                .collect()
        };

        let calc = attr("calcMode").unwrap_or("linear");
        let transitions: Vec<KeyframeTransition> = if calc == "spline" {
            let Some(splines) = attr("keySplines") else {
                warnings.warn("Missing `keySplines`");
                return;
            };
            let splines: Vec<&str> = FRAME_SEPARATOR
                .split(splines.trim())
                .filter(|s| !s.is_empty())
                .collect();
            if splines.len() != values.len() - 1 {
                warnings.warn("Wrong number of `keySplines` values");
                return;
            }
            let mut transitions = Vec::with_capacity(values.len());
            for spline in splines {
                let params = split_values(spline);
                if params.len() != 4 {
                    warnings.warn("Invalid value for `keySplines`");
                    return;
                }
                transitions.push(KeyframeTransition::new(
                    Point::new(params[0], params[1]),
                    Point::new(params[2], params[3]),
                ));
            }
            transitions.push(KeyframeTransition::linear());
            transitions
        } else {
            let def = if calc == "discrete" {
                KeyframeTransition::hold()
            } else {
                KeyframeTransition::linear()
            };
            vec![def; values.len()]
        };

        prop.keyframes = times
            .into_iter()
            .zip(values)
            .zip(transitions)
            .map(|((time, values), transition)| AnimKeyframe {
                time,
                values,
                transition,
            })
            .collect();
    }

    fn get_values(
        &self,
        animate: &StoredAnimate,
        warnings: &mut Warnings,
    ) -> Option<Vec<ValueVariant>> {
        let attr_name = animate.attrs.get("attributeName").cloned().unwrap_or_default();
        let ty = value_type(&attr_name);
        let attr = |name: &str| animate.attrs.get(name).map(String::as_str);

        let mut values = Vec::new();
        if let Some(value_list) = attr("values") {
            for val in FRAME_SEPARATOR.split(value_list.trim()).filter(|s| !s.is_empty()) {
                values.push(parse_value(val, ty)?);
            }
            if values.len() < 2 {
                warnings.warn("Not enough values in `animate`");
                return None;
            }
            if values[1..].iter().any(|v| !v.compatible(&values[0])) {
                warnings.warn("Mismatching `values` in `animate`");
                return None;
            }
        } else {
            if let Some(from) = attr("from") {
                values.push(parse_value(from, ty)?);
            } else if attr_name == "transform" {
                warnings.warn("You need to set `values` or `from` in `animateTransform`");
                return None;
            } else if let Some(base) = attr(&attr_name) {
                values.push(parse_value(base, ty)?);
            } else {
                warnings.warn("Missing `from` in `animate`");
                return None;
            }

            if let Some(to) = attr("to") {
                values.push(parse_value(to, ty)?);
            } else if let (ValueType::Vector, Some(by)) = (ty, attr("by")) {
                let by = split_values(by);
                let from = values[0].vector();
                if by.len() != from.len() {
                    warnings.warn("Mismatching `by` and `from` in `animate`");
                    return None;
                }
                let sum: Vec<f64> = from.iter().zip(&by).map(|(a, b)| a + b).collect();
                values.push(ValueVariant::Vector(sum));
            } else {
                warnings.warn("Missing `to` or `by` in `animate`");
                return None;
            }
        }

        if ty == ValueType::Bezier {
            for v in &values {
                if v.bezier().is_none_or(|b| b.beziers().len() != 1) {
                    warnings
                        .warn("Can only load animated `d` if each keyframe has exactly 1 path");
                    return None;
                }
            }
        }

        Some(values)
    }

    fn register_time_range(&mut self, start: FrameTime, end: FrameTime) {
        if !self.range_initialized {
            self.range_initialized = true;
            self.min_kf = start;
            self.max_kf = end;
        } else {
            self.min_kf = self.min_kf.min(start);
            self.max_kf = self.max_kf.max(end);
        }
    }
}

fn parse_value(s: &str, ty: ValueType) -> Option<ValueVariant> {
    let s = s.trim();
    match ty {
        ValueType::Vector => Some(ValueVariant::Vector(split_values(s))),
        ValueType::Bezier => Some(ValueVariant::Bezier(PathDParser::new(s).parse())),
        ValueType::String => Some(ValueVariant::String(s.to_owned())),
        ValueType::Color => parse_color(s).map(ValueVariant::Color),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(xml: &'static str) -> roxmltree::Document<'static> {
        roxmltree::Document::parse(xml).unwrap()
    }

    #[test]
    fn clock_values() {
        let parser = AnimateParser::new(60.0);
        assert_eq!(parser.clock_to_frame("2s"), 120.0);
        assert_eq!(parser.clock_to_frame("500ms"), 30.0);
        assert_eq!(parser.clock_to_frame("1min"), 3600.0);
        assert_eq!(parser.clock_to_frame("0.5h"), 108000.0);
        assert_eq!(parser.clock_to_frame("01:00:01.5"), (3600.0 + 1.5) * 60.0);
        assert_eq!(parser.clock_to_frame("bogus"), 0.0);
    }

    #[test]
    fn split_value_forms() {
        assert_eq!(split_values("5"), vec![5.0]);
        assert_eq!(split_values("1 2, 3"), vec![1.0, 2.0, 3.0]);
        let red = split_values("#ff0000");
        assert_eq!(red.len(), 4);
        assert!((red[0] - 1.0).abs() < 1e-9 && red[3] == 1.0);
        assert!(split_values("junk").is_empty());
    }

    #[test]
    fn from_to_keyframes() {
        let d = doc(
            r#"<rect width="5"><animate attributeName="width" from="0" to="10" begin="0s" dur="1s"/></rect>"#,
        );
        let mut warnings = Warnings::new();
        let mut parser = AnimateParser::new(60.0);
        let props =
            parser.parse_animated_properties(d.root_element(), &mut warnings);
        let kfs = props.single("width");
        assert_eq!(kfs.len(), 2);
        assert_eq!(kfs[0].time, 0.0);
        assert_eq!(kfs[1].time, 60.0);
        assert_eq!(kfs[1].values.vector(), &[10.0]);
        assert_eq!(parser.max_kf, 60.0);
    }

    #[test]
    fn joined_merges_static_and_animated() {
        let d = doc(
            r#"<rect x="1" y="2"><animate attributeName="x" values="0;10;20" begin="0s" dur="2s"/></rect>"#,
        );
        let mut warnings = Warnings::new();
        let mut parser = AnimateParser::new(60.0);
        let props =
            parser.parse_animated_properties(d.root_element(), &mut warnings);
        let joined = props.joined(&["x", "y"]);
        assert_eq!(joined.len(), 3);
        assert_eq!(joined[1].time, 60.0);
        assert_eq!(joined[1].values[0].vector(), &[10.0]);
        assert_eq!(joined[1].values[1].vector(), &[2.0]);
        // Missing attribute entirely: no join.
        assert!(props.joined(&["x", "missing"]).is_empty());
    }

    #[test]
    fn discrete_and_spline_modes() {
        let d = doc(
            r#"<g>
              <rect id="a"><animate attributeName="x" from="0" to="1" begin="0s" dur="1s" calcMode="discrete"/></rect>
              <rect id="b"><animate attributeName="x" from="0" to="1" begin="0s" dur="1s" calcMode="spline" keySplines="0.25 0 0.75 1"/></rect>
            </g>"#,
        );
        let mut warnings = Warnings::new();
        let mut parser = AnimateParser::new(60.0);
        let rects: Vec<_> = d
            .root_element()
            .children()
            .filter(|c| c.is_element())
            .collect();
        let a = parser.parse_animated_properties(rects[0], &mut warnings);
        assert!(a.single("x")[0].transition.hold);
        let b = parser.parse_animated_properties(rects[1], &mut warnings);
        assert!(!b.single("x")[0].transition.hold);
        assert_eq!(b.single("x")[0].transition.before, Point::new(0.25, 0.0));
    }

    #[test]
    fn multiple_animators_warn() {
        let d = doc(
            r#"<rect>
              <animate attributeName="x" from="0" to="1" begin="0s" dur="1s"/>
              <animate attributeName="x" from="5" to="9" begin="0s" dur="1s"/>
            </rect>"#,
        );
        let mut warnings = Warnings::new();
        let mut parser = AnimateParser::new(60.0);
        let props = parser.parse_animated_properties(d.root_element(), &mut warnings);
        assert_eq!(props.single("x")[1].values.vector(), &[1.0]);
        assert!(!warnings.entries().is_empty());
    }
}
