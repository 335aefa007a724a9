use std::cell::Cell;
use std::collections::BTreeSet;

use kurbo::{Affine, BezPath, CubicBez, ParamCurve, ParamCurveExtrema, Point, Rect, Vec2};

use super::point::{BezierPoint, PointType};

/// A single cubic-bezier contour.
///
/// Segment `i` runs from point `i` to point `i + 1`, using the start point's
/// out tangent and the end point's in tangent; a closed bezier has an extra
/// implicit segment from the last point back to the first.
///
/// The bounding box is memoized and invalidated by every structural mutation.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Bezier {
    points: Vec<BezierPoint>,
    closed: bool,
    #[serde(skip)]
    bbox: Cell<Option<Option<Rect>>>,
}

impl Default for Bezier {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Bezier {
    fn eq(&self, other: &Self) -> bool {
        self.points == other.points && self.closed == other.closed
    }
}

impl Bezier {
    pub fn new() -> Self {
        Self {
            points: Vec::new(),
            closed: false,
            bbox: Cell::new(None),
        }
    }

    pub fn from_point(initial: impl Into<BezierPoint>) -> Self {
        Self {
            points: vec![initial.into()],
            closed: false,
            bbox: Cell::new(None),
        }
    }

    fn dirty(&mut self) {
        self.bbox.set(None);
    }

    pub fn points(&self) -> &[BezierPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn closed(&self) -> bool {
        self.closed
    }

    pub fn set_closed(&mut self, closed: bool) {
        self.dirty();
        self.closed = closed;
    }

    /// Point access with closed-curve wrap-around.
    pub fn point(&self, index: usize) -> &BezierPoint {
        &self.points[index % self.points.len()]
    }

    pub fn push(&mut self, p: BezierPoint) {
        self.dirty();
        self.points.push(p);
    }

    pub fn clear(&mut self) {
        self.dirty();
        self.points.clear();
        self.closed = false;
    }

    /// Inserts a point, clamping the index into range.
    pub fn insert_point(&mut self, index: usize, p: BezierPoint) -> &mut Self {
        self.dirty();
        let index = index.min(self.points.len());
        self.points.insert(index, p);
        self
    }

    /// Removes a point; out-of-range indices are a no-op.
    pub fn remove_point(&mut self, index: usize) {
        if index < self.points.len() {
            self.dirty();
            self.points.remove(index);
        }
    }

    /// Replaces a point; out-of-range indices are a no-op.
    pub fn set_point(&mut self, index: usize, p: BezierPoint) {
        if index < self.points.len() {
            self.dirty();
            self.points[index] = p;
        }
    }

    /// Appends a point with tangents given relative to the position.
    pub fn add_point(&mut self, pos: Point, tan_in: Vec2, tan_out: Vec2) -> &mut Self {
        self.dirty();
        self.points
            .push(BezierPoint::from_relative(pos, tan_in, tan_out, PointType::Corner));
        self
    }

    /// Appends a point with symmetrical relative tangents.
    pub fn add_smooth_point(&mut self, pos: Point, tan_in: Vec2) -> &mut Self {
        self.dirty();
        self.points.push(BezierPoint::smooth(pos, tan_in));
        self
    }

    /// Straight line from the last point to `pos`.
    pub fn line_to(&mut self, pos: Point) -> &mut Self {
        self.dirty();
        if let Some(last) = self.points.last_mut() {
            last.tan_out = last.pos;
        }
        self.points.push(BezierPoint::new(pos));
        self
    }

    /// Quadratic segment to `dest`, degree-elevated to the equivalent cubic.
    ///
    /// The quadratic handle maps to cubic tangents at 2/3 of the way from each
    /// endpoint toward the handle.
    pub fn quadratic_to(&mut self, handle: Point, dest: Point) -> &mut Self {
        self.dirty();
        if let Some(last) = self.points.last_mut() {
            last.tan_out = last.pos + (handle - last.pos) * (2.0 / 3.0);
        }
        let mut end = BezierPoint::new(dest);
        end.tan_in = dest + (handle - dest) * (2.0 / 3.0);
        self.points.push(end);
        self
    }

    /// Cubic segment to `dest` with absolute handles.
    pub fn cubic_to(&mut self, handle1: Point, handle2: Point, dest: Point) -> &mut Self {
        self.dirty();
        if let Some(last) = self.points.last_mut() {
            last.tan_out = handle1;
        }
        let mut end = BezierPoint::new(dest);
        end.tan_in = handle2;
        self.points.push(end);
        self
    }

    /// Marks the contour closed; the implicit last-to-first segment becomes
    /// part of the curve for rendering and bounds.
    pub fn close(&mut self) -> &mut Self {
        self.dirty();
        self.closed = true;
        self
    }

    pub fn segment_count(&self) -> usize {
        if self.points.len() < 2 {
            0
        } else if self.closed {
            self.points.len()
        } else {
            self.points.len() - 1
        }
    }

    /// The cubic for segment `index`, wrapping to point 0 when closed.
    pub fn segment(&self, index: usize) -> CubicBez {
        let a = self.point(index);
        let b = self.point(index + 1);
        CubicBez::new(a.pos, a.tan_out, b.tan_in, b.pos)
    }

    /// Writes a cubic back over segment `index`.
    pub fn set_segment(&mut self, index: usize, seg: CubicBez) {
        if self.segment_count() == 0 || index >= self.segment_count() {
            return;
        }
        self.dirty();
        let n = self.points.len();
        let i = index % n;
        let j = (index + 1) % n;
        self.points[i].pos = seg.p0;
        self.points[i].tan_out = seg.p1;
        self.points[j].tan_in = seg.p2;
        self.points[j].pos = seg.p3;
    }

    /// Bounding box of the whole contour, computed per segment from the
    /// cubic's analytic extrema and unioned. A bezier with fewer than two
    /// points has no meaningful box and yields `None`.
    pub fn bounding_box(&self) -> Option<Rect> {
        if let Some(cached) = self.bbox.get() {
            return cached;
        }
        let computed = self.compute_bounding_box();
        self.bbox.set(Some(computed));
        computed
    }

    fn compute_bounding_box(&self) -> Option<Rect> {
        if self.points.len() < 2 {
            return None;
        }
        let mut rect: Option<Rect> = None;
        for i in 0..self.segment_count() {
            let b = self.segment(i).bounding_box();
            rect = Some(match rect {
                Some(r) => r.union(b),
                None => b,
            });
        }
        rect
    }

    /// The point that [`split_segment`](Self::split_segment) would insert,
    /// without mutating the contour.
    pub fn split_segment_point(&self, index: isize, factor: f64) -> BezierPoint {
        if self.points.is_empty() {
            return BezierPoint::new(Point::ZERO);
        }
        if index <= 0 || self.points.len() < 2 {
            return duplicate_of(&self.points[0]);
        }
        if index as usize >= self.points.len() {
            return duplicate_of(self.points.last().unwrap_or(&self.points[0]));
        }
        let seg = self.segment(index as usize - 1);
        let t = factor.clamp(0.0, 1.0);
        let left = seg.subsegment(0.0..t);
        let right = seg.subsegment(t..1.0);
        BezierPoint {
            pos: left.p3,
            tan_in: left.p2,
            tan_out: right.p1,
            kind: PointType::Smooth,
        }
    }

    /// De Casteljau subdivision of the segment ending at point `index`, at
    /// parametric `factor` in `[0, 1]`. Grows the point count by one; the new
    /// point lands at `points[index]` with tangent handles recomputed on both
    /// sides so the curve shape is unchanged.
    ///
    /// `index <= 0` duplicates the first point at the start and `index >=
    /// len()` duplicates the last point at the end: degenerate extensions,
    /// not true splits, kept for compatibility with existing content.
    pub fn split_segment(&mut self, index: isize, factor: f64) {
        if self.points.is_empty() {
            return;
        }
        self.dirty();

        if index <= 0 || self.points.len() < 2 {
            let dup = duplicate_of(&self.points[0]);
            self.points.insert(0, dup);
            return;
        }
        let index = index as usize;
        if index >= self.points.len() {
            let dup = duplicate_of(self.points.last().unwrap());
            self.points.push(dup);
            return;
        }

        let seg = self.segment(index - 1);
        let t = factor.clamp(0.0, 1.0);
        let left = seg.subsegment(0.0..t);
        let right = seg.subsegment(t..1.0);

        self.points[index - 1].tan_out = left.p1;
        self.points[index].tan_in = right.p2;
        self.points.insert(
            index,
            BezierPoint {
                pos: left.p3,
                tan_in: left.p2,
                tan_out: right.p1,
                kind: PointType::Smooth,
            },
        );
    }

    /// Linear interpolation toward `other`.
    ///
    /// Position and both tangent deltas interpolate independently. If the two
    /// contours are structurally incompatible (point count or closed flag
    /// differ) the result is `self` unchanged; this silent degrade is
    /// load-bearing for animation playback and must stay.
    pub fn lerp(&self, other: &Bezier, factor: f64) -> Bezier {
        if self.points.len() != other.points.len() || self.closed != other.closed {
            return self.clone();
        }

        let points = self
            .points
            .iter()
            .zip(&other.points)
            .map(|(a, b)| {
                let pos = a.pos.lerp(b.pos, factor);
                BezierPoint {
                    pos,
                    tan_in: pos + lerp_vec(a.relative_tan_in(), b.relative_tan_in(), factor),
                    tan_out: pos + lerp_vec(a.relative_tan_out(), b.relative_tan_out(), factor),
                    kind: a.kind,
                }
            })
            .collect();

        Bezier {
            points,
            closed: self.closed,
            bbox: Cell::new(None),
        }
    }

    /// Reverses point order, swapping in/out tangents per point.
    pub fn reverse(&mut self) {
        self.dirty();
        self.points.reverse();
        for p in &mut self.points {
            *p = p.reversed();
        }
    }

    pub fn apply_transform(&mut self, t: Affine) {
        self.dirty();
        for p in &mut self.points {
            *p = p.transformed(t);
        }
    }

    pub fn transformed(&self, t: Affine) -> Bezier {
        let mut out = self.clone();
        out.apply_transform(t);
        out
    }

    /// A copy with the given point indices removed.
    pub fn removed_points(&self, indices: &BTreeSet<usize>) -> Bezier {
        let points = self
            .points
            .iter()
            .enumerate()
            .filter(|(i, _)| !indices.contains(i))
            .map(|(_, p)| *p)
            .collect();
        Bezier {
            points,
            closed: self.closed,
            bbox: Cell::new(None),
        }
    }

    /// For closed contours, materializes the implicit closing segment by
    /// appending a copy of the first point when it is not already present.
    pub fn add_close_point(&mut self) {
        if !self.closed || self.points.len() < 2 {
            return;
        }
        let first = self.points[0];
        let last = self.points[self.points.len() - 1];
        if first.pos != last.pos {
            self.dirty();
            self.points.push(first);
        }
    }

    /// Appends this contour to a kurbo path.
    pub fn write_to_path(&self, out: &mut BezPath) {
        if self.points.is_empty() {
            return;
        }
        out.move_to(self.points[0].pos);
        for i in 0..self.segment_count() {
            let seg = self.segment(i);
            out.curve_to(seg.p1, seg.p2, seg.p3);
        }
        if self.closed {
            out.close_path();
        }
    }

    pub fn to_bez_path(&self) -> BezPath {
        let mut path = BezPath::new();
        self.write_to_path(&mut path);
        path
    }
}

fn duplicate_of(p: &BezierPoint) -> BezierPoint {
    BezierPoint::new(p.pos)
}

fn lerp_vec(a: Vec2, b: Vec2, t: f64) -> Vec2 {
    a + (b - a) * t
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Bezier {
        let mut b = Bezier::new();
        b.add_point(Point::new(0.0, 0.0), Vec2::ZERO, Vec2::ZERO);
        b.line_to(Point::new(10.0, 0.0));
        b.line_to(Point::new(10.0, 10.0));
        b.line_to(Point::new(0.0, 10.0));
        b.close();
        b
    }

    fn wiggle() -> Bezier {
        let mut b = Bezier::new();
        b.add_point(Point::new(0.0, 0.0), Vec2::ZERO, Vec2::new(5.0, -10.0));
        b.add_point(
            Point::new(20.0, 0.0),
            Vec2::new(-5.0, 10.0),
            Vec2::new(5.0, -10.0),
        );
        b.add_point(Point::new(40.0, 0.0), Vec2::new(-5.0, 10.0), Vec2::ZERO);
        b
    }

    #[test]
    fn empty_and_single_point_have_no_bbox() {
        let b = Bezier::new();
        assert_eq!(b.bounding_box(), None);
        let b = Bezier::from_point(Point::new(3.0, 4.0));
        assert_eq!(b.bounding_box(), None);
    }

    #[test]
    fn bbox_contains_points_and_samples() {
        let b = wiggle();
        let rect = b.bounding_box().unwrap();
        // Rect::contains is half-open; edge points must not grow the box.
        for p in b.points() {
            assert_eq!(rect.union_pt(p.pos), rect);
        }
        for i in 0..b.segment_count() {
            let seg = b.segment(i);
            for t in [0.0, 0.25, 0.5, 0.75, 1.0] {
                let p = seg.eval(t);
                assert_eq!(
                    rect.union_pt(p),
                    rect,
                    "sample {p:?} at t={t} escapes bbox {rect:?}"
                );
            }
        }
    }

    #[test]
    fn bbox_cache_invalidates_on_mutation() {
        let mut b = square();
        let before = b.bounding_box().unwrap();
        b.line_to(Point::new(50.0, 50.0));
        let after = b.bounding_box().unwrap();
        assert!(after.x1 > before.x1);
    }

    #[test]
    fn closed_bbox_includes_implicit_segment() {
        // Curvy closing segment bulging left of every explicit point.
        let mut b = Bezier::new();
        b.add_point(Point::new(0.0, 0.0), Vec2::new(-30.0, 0.0), Vec2::ZERO);
        b.line_to(Point::new(10.0, 0.0));
        b.line_to(Point::new(10.0, 10.0));
        if let Some(last) = b.points().last().copied() {
            let mut p = last;
            p.tan_out = Point::new(-20.0, 10.0);
            b.set_point(b.len() - 1, p);
        }
        b.close();
        let rect = b.bounding_box().unwrap();
        assert!(rect.x0 < 0.0);
    }

    #[test]
    fn quadratic_degree_elevation_uses_two_thirds_rule() {
        let mut b = Bezier::new();
        b.add_point(Point::new(0.0, 0.0), Vec2::ZERO, Vec2::ZERO);
        b.quadratic_to(Point::new(3.0, 6.0), Point::new(6.0, 0.0));
        assert_eq!(b.points()[0].tan_out, Point::new(2.0, 4.0));
        assert_eq!(b.points()[1].tan_in, Point::new(4.0, 4.0));
    }

    #[test]
    fn reverse_roundtrip_is_identity() {
        let original = wiggle();
        let mut b = original.clone();
        b.reverse();
        b.reverse();
        assert_eq!(b, original);
    }

    #[test]
    fn split_preserves_curve_shape() {
        let original = wiggle();
        let mut split = original.clone();
        split.split_segment(1, 0.3);
        assert_eq!(split.len(), original.len() + 1);

        // Global parameter 0.65 of original segment 0 lands in the second of
        // the two split halves at local parameter (0.65-0.3)/0.7.
        let p_orig = original.segment(0).eval(0.65);
        let p_split = split.segment(1).eval((0.65 - 0.3) / 0.7);
        assert!((p_orig - p_split).length() < 1e-9);

        let p_orig = original.segment(0).eval(0.15);
        let p_split = split.segment(0).eval(0.15 / 0.3);
        assert!((p_orig - p_split).length() < 1e-9);
    }

    #[test]
    fn split_edge_indices_duplicate_endpoints() {
        let mut b = wiggle();
        b.split_segment(0, 0.5);
        assert_eq!(b.len(), 4);
        assert_eq!(b.points()[0].pos, b.points()[1].pos);

        let mut b = wiggle();
        b.split_segment(99, 0.5);
        assert_eq!(b.len(), 4);
        assert_eq!(b.points()[2].pos, b.points()[3].pos);
    }

    #[test]
    fn lerp_endpoints_match_operands() {
        let a = wiggle();
        let mut b = wiggle();
        b.apply_transform(Affine::translate((5.0, 7.0)));

        assert_eq!(a.lerp(&b, 0.0), a);
        assert_eq!(a.lerp(&b, 1.0), b);
    }

    #[test]
    fn lerp_mismatch_returns_left_operand() {
        let a = wiggle();
        let b = square();
        assert_eq!(a.lerp(&b, 0.5), a);

        let mut open_square = square();
        open_square.set_closed(false);
        // Same point count, different closed flag.
        let mut closed_wiggle = wiggle();
        closed_wiggle.close();
        let open_wiggle = wiggle();
        assert_eq!(open_wiggle.lerp(&closed_wiggle, 0.5), open_wiggle);
    }

    #[test]
    fn removed_points_drops_requested_indices() {
        let b = wiggle();
        let out = b.removed_points(&BTreeSet::from([1]));
        assert_eq!(out.len(), 2);
        assert_eq!(out.points()[1].pos, Point::new(40.0, 0.0));
    }
}
