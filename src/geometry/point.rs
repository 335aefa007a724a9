use kurbo::{Affine, Point, Vec2};

/// Smoothness tag for a control point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PointType {
    /// Tangents move independently.
    Corner,
    /// Tangents stay collinear but may differ in length.
    Smooth,
    /// Tangents stay collinear with equal lengths.
    Symmetrical,
}

/// A cubic-bezier control point.
///
/// Tangents are stored as absolute positions, never as deltas relative to
/// `pos`, so transforming a point is a plain map of all three coordinates.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BezierPoint {
    pub pos: Point,
    pub tan_in: Point,
    pub tan_out: Point,
    pub kind: PointType,
}

impl BezierPoint {
    /// Corner point with both tangents collapsed onto the position.
    pub fn new(pos: Point) -> Self {
        Self {
            pos,
            tan_in: pos,
            tan_out: pos,
            kind: PointType::Corner,
        }
    }

    /// Builds a point from tangents given relative to the position.
    pub fn from_relative(pos: Point, tan_in: Vec2, tan_out: Vec2, kind: PointType) -> Self {
        Self {
            pos,
            tan_in: pos + tan_in,
            tan_out: pos + tan_out,
            kind,
        }
    }

    /// Builds a smooth point with mirrored relative tangents.
    pub fn smooth(pos: Point, tan_in: Vec2) -> Self {
        Self::from_relative(pos, tan_in, -tan_in, PointType::Smooth)
    }

    pub fn relative_tan_in(&self) -> Vec2 {
        self.tan_in - self.pos
    }

    pub fn relative_tan_out(&self) -> Vec2 {
        self.tan_out - self.pos
    }

    pub fn translated(&self, delta: Vec2) -> Self {
        Self {
            pos: self.pos + delta,
            tan_in: self.tan_in + delta,
            tan_out: self.tan_out + delta,
            kind: self.kind,
        }
    }

    pub fn transformed(&self, t: Affine) -> Self {
        Self {
            pos: t * self.pos,
            tan_in: t * self.tan_in,
            tan_out: t * self.tan_out,
            kind: self.kind,
        }
    }

    /// Same point with the traversal direction flipped.
    pub fn reversed(&self) -> Self {
        Self {
            pos: self.pos,
            tan_in: self.tan_out,
            tan_out: self.tan_in,
            kind: self.kind,
        }
    }

    /// Retags the point, adjusting tangents to satisfy the new type.
    ///
    /// Smooth aligns the out tangent with the in direction while keeping its
    /// length; Symmetrical mirrors the in tangent exactly. Corner leaves the
    /// tangents untouched.
    pub fn with_type(&self, kind: PointType) -> Self {
        let mut out = *self;
        out.kind = kind;
        match kind {
            PointType::Corner => {}
            PointType::Symmetrical => {
                out.tan_out = self.pos - self.relative_tan_in();
            }
            PointType::Smooth => {
                let dir = self.relative_tan_in();
                let len = self.relative_tan_out().length();
                if dir.length() > 0.0 {
                    out.tan_out = self.pos - dir * (len / dir.length());
                }
            }
        }
        out
    }
}

impl From<Point> for BezierPoint {
    fn from(pos: Point) -> Self {
        Self::new(pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tangents_are_stored_absolute() {
        let p = BezierPoint::from_relative(
            Point::new(10.0, 10.0),
            Vec2::new(-2.0, 0.0),
            Vec2::new(2.0, 0.0),
            PointType::Smooth,
        );
        assert_eq!(p.tan_in, Point::new(8.0, 10.0));
        assert_eq!(p.tan_out, Point::new(12.0, 10.0));
        assert_eq!(p.relative_tan_in(), Vec2::new(-2.0, 0.0));
    }

    #[test]
    fn reversed_swaps_tangents() {
        let p = BezierPoint::from_relative(
            Point::new(1.0, 1.0),
            Vec2::new(-1.0, 0.0),
            Vec2::new(0.0, 1.0),
            PointType::Corner,
        );
        let r = p.reversed();
        assert_eq!(r.tan_in, p.tan_out);
        assert_eq!(r.tan_out, p.tan_in);
    }

    #[test]
    fn symmetrical_mirrors_in_tangent() {
        let p = BezierPoint::from_relative(
            Point::new(0.0, 0.0),
            Vec2::new(-3.0, 1.0),
            Vec2::new(10.0, 10.0),
            PointType::Corner,
        );
        let s = p.with_type(PointType::Symmetrical);
        assert_eq!(s.tan_out, Point::new(3.0, -1.0));
    }
}
