use kurbo::{Point, Size, Vec2};

use crate::geometry::Bezier;

/// Time in frames; fractional values are legal for sub-frame sampling.
pub type FrameTime = f64;

/// Value interpolation between two keyframes.
pub trait Interpolate: Clone {
    fn interpolate(a: &Self, b: &Self, t: f64) -> Self;
}

impl Interpolate for f64 {
    fn interpolate(a: &Self, b: &Self, t: f64) -> Self {
        a + (b - a) * t
    }
}

impl Interpolate for Point {
    fn interpolate(a: &Self, b: &Self, t: f64) -> Self {
        a.lerp(*b, t)
    }
}

impl Interpolate for Vec2 {
    fn interpolate(a: &Self, b: &Self, t: f64) -> Self {
        *a + (*b - *a) * t
    }
}

impl Interpolate for Size {
    fn interpolate(a: &Self, b: &Self, t: f64) -> Self {
        Size::new(
            a.width + (b.width - a.width) * t,
            a.height + (b.height - a.height) * t,
        )
    }
}

impl Interpolate for Bezier {
    fn interpolate(a: &Self, b: &Self, t: f64) -> Self {
        a.lerp(b, t)
    }
}

/// Timing curve between a keyframe and the next one.
///
/// The curve is a cubic bezier in the unit square from (0,0) to (1,1) with
/// the two inner control points stored here; x is the time ratio, y the
/// value ratio. `hold` overrides the curve and keeps the earlier value for
/// the whole interval.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct KeyframeTransition {
    pub before: Point,
    pub after: Point,
    pub hold: bool,
}

impl Default for KeyframeTransition {
    fn default() -> Self {
        Self::linear()
    }
}

impl KeyframeTransition {
    pub fn new(before: Point, after: Point) -> Self {
        Self {
            before: clamp_unit(before),
            after: clamp_unit(after),
            hold: false,
        }
    }

    pub fn linear() -> Self {
        Self::new(Point::new(1.0 / 3.0, 1.0 / 3.0), Point::new(2.0 / 3.0, 2.0 / 3.0))
    }

    /// Smooth ease-in-out.
    pub fn ease() -> Self {
        Self::new(Point::new(0.25, 0.0), Point::new(0.75, 1.0))
    }

    pub fn hold() -> Self {
        Self {
            hold: true,
            ..Self::linear()
        }
    }

    /// Timing curve from ease records as stored in binary project keyframes.
    ///
    /// Influence is a percentage of the time axis covered by each handle;
    /// speed must already be normalized against the segment's average speed,
    /// so a speed of 1 on both sides reproduces the linear curve.
    pub fn from_ease(out_speed: f64, out_influence: f64, in_speed: f64, in_influence: f64) -> Self {
        let out_x = (out_influence / 100.0).clamp(0.0, 1.0);
        let in_x = (in_influence / 100.0).clamp(0.0, 1.0);
        Self::new(
            Point::new(out_x, out_x * out_speed),
            Point::new(1.0 - in_x, 1.0 - in_x * in_speed),
        )
    }

    /// Maps a time ratio in `[0, 1]` through the timing curve.
    ///
    /// Solves the bezier x component for the curve parameter by bisection
    /// (x is monotone for handles inside the unit square), then evaluates y.
    pub fn lerp_factor(&self, ratio: f64) -> f64 {
        let ratio = ratio.clamp(0.0, 1.0);
        if self.hold {
            return if ratio >= 1.0 { 1.0 } else { 0.0 };
        }
        if ratio == 0.0 || ratio == 1.0 {
            return ratio;
        }

        let mut lo = 0.0_f64;
        let mut hi = 1.0_f64;
        let mut t = ratio;
        for _ in 0..32 {
            let x = cubic_component(self.before.x, self.after.x, t);
            if (x - ratio).abs() < 1e-9 {
                break;
            }
            if x < ratio {
                lo = t;
            } else {
                hi = t;
            }
            t = (lo + hi) / 2.0;
        }
        cubic_component(self.before.y, self.after.y, t)
    }
}

/// One component of a unit-square cubic with endpoints 0 and 1.
fn cubic_component(p1: f64, p2: f64, t: f64) -> f64 {
    let m = 1.0 - t;
    3.0 * m * m * t * p1 + 3.0 * m * t * t * p2 + t * t * t
}

fn clamp_unit(p: Point) -> Point {
    Point::new(p.x.clamp(0.0, 1.0), p.y.clamp(0.0, 1.0))
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Keyframe<T> {
    pub time: FrameTime,
    pub value: T,
    /// Transition toward the next keyframe.
    pub transition: KeyframeTransition,
}

/// A value that is either static or driven by keyframes.
///
/// Keyframe times are kept strictly increasing; [`set_keyframe`]
/// (Self::set_keyframe) replaces an existing keyframe at the same time
/// instead of duplicating it.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AnimatedProperty<T> {
    value: T,
    keyframes: Vec<Keyframe<T>>,
}

impl<T: Interpolate> AnimatedProperty<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            keyframes: Vec::new(),
        }
    }

    pub fn animated(&self) -> bool {
        !self.keyframes.is_empty()
    }

    pub fn keyframes(&self) -> &[Keyframe<T>] {
        &self.keyframes
    }

    /// The static value, ignoring keyframes.
    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn set_value(&mut self, value: T) {
        self.value = value;
    }

    pub fn set_keyframe(&mut self, time: FrameTime, value: T) -> &mut Keyframe<T> {
        self.set_keyframe_with(time, value, KeyframeTransition::linear())
    }

    pub fn set_keyframe_with(
        &mut self,
        time: FrameTime,
        value: T,
        transition: KeyframeTransition,
    ) -> &mut Keyframe<T> {
        let idx = self.keyframes.partition_point(|k| k.time < time);
        if idx < self.keyframes.len() && self.keyframes[idx].time == time {
            self.keyframes[idx].value = value;
            self.keyframes[idx].transition = transition;
        } else {
            self.keyframes.insert(
                idx,
                Keyframe {
                    time,
                    value,
                    transition,
                },
            );
        }
        &mut self.keyframes[idx]
    }

    /// Samples the property at `time`. Outside the keyframe range the first
    /// or last value holds; without keyframes the static value is returned.
    pub fn get_at(&self, time: FrameTime) -> T {
        if self.keyframes.is_empty() {
            return self.value.clone();
        }

        let idx = self.keyframes.partition_point(|k| k.time <= time);
        if idx == 0 {
            return self.keyframes[0].value.clone();
        }
        if idx >= self.keyframes.len() {
            return self.keyframes[self.keyframes.len() - 1].value.clone();
        }

        let a = &self.keyframes[idx - 1];
        let b = &self.keyframes[idx];
        let span = b.time - a.time;
        if span <= 0.0 {
            return a.value.clone();
        }
        let ratio = (time - a.time) / span;
        T::interpolate(&a.value, &b.value, a.transition.lerp_factor(ratio))
    }
}

impl<T: Interpolate + Default> Default for AnimatedProperty<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_keys() -> AnimatedProperty<f64> {
        let mut prop = AnimatedProperty::new(0.0);
        prop.set_keyframe(0.0, 0.0);
        prop.set_keyframe(10.0, 100.0);
        prop.set_keyframe(20.0, 50.0);
        prop
    }

    #[test]
    fn static_property_ignores_time() {
        let prop = AnimatedProperty::new(42.0);
        assert_eq!(prop.get_at(0.0), 42.0);
        assert_eq!(prop.get_at(999.0), 42.0);
    }

    #[test]
    fn samples_between_and_outside_keyframes() {
        let prop = three_keys();
        assert_eq!(prop.get_at(-5.0), 0.0);
        assert_eq!(prop.get_at(5.0), 50.0);
        assert_eq!(prop.get_at(15.0), 75.0);
        assert_eq!(prop.get_at(100.0), 50.0);
    }

    #[test]
    fn set_keyframe_replaces_at_equal_time() {
        let mut prop = three_keys();
        prop.set_keyframe(10.0, 80.0);
        assert_eq!(prop.keyframes().len(), 3);
        assert_eq!(prop.get_at(10.0), 80.0);
    }

    #[test]
    fn keyframes_insert_sorted() {
        let mut prop = AnimatedProperty::new(0.0);
        prop.set_keyframe(20.0, 2.0);
        prop.set_keyframe(0.0, 0.0);
        prop.set_keyframe(10.0, 1.0);
        let times: Vec<_> = prop.keyframes().iter().map(|k| k.time).collect();
        assert_eq!(times, vec![0.0, 10.0, 20.0]);
    }

    #[test]
    fn hold_transition_keeps_earlier_value() {
        let mut prop = AnimatedProperty::new(0.0);
        prop.set_keyframe_with(0.0, 1.0, KeyframeTransition::hold());
        prop.set_keyframe(10.0, 2.0);
        assert_eq!(prop.get_at(9.9), 1.0);
        assert_eq!(prop.get_at(10.0), 2.0);
    }

    #[test]
    fn linear_transition_is_identity_curve() {
        let t = KeyframeTransition::linear();
        for ratio in [0.0, 0.2, 0.5, 0.8, 1.0] {
            assert!((t.lerp_factor(ratio) - ratio).abs() < 1e-6);
        }
    }

    #[test]
    fn ease_curve_endpoints_and_midpoint() {
        let t = KeyframeTransition::ease();
        assert_eq!(t.lerp_factor(0.0), 0.0);
        assert_eq!(t.lerp_factor(1.0), 1.0);
        // Symmetric handles cross the midpoint.
        assert!((t.lerp_factor(0.5) - 0.5).abs() < 1e-6);
        // Slow start.
        assert!(t.lerp_factor(0.1) < 0.1);
    }

    #[test]
    fn point_interpolation() {
        let mut prop = AnimatedProperty::new(Point::ZERO);
        prop.set_keyframe(0.0, Point::new(0.0, 0.0));
        prop.set_keyframe(10.0, Point::new(10.0, 20.0));
        assert_eq!(prop.get_at(5.0), Point::new(5.0, 10.0));
    }
}
