use std::cell::Cell;

use kurbo::{Affine, BezPath, PathEl, Point, Rect};

use super::bezier::Bezier;

/// A path made of multiple [`Bezier`] contours, with a pen-style builder
/// interface mirroring the single-contour one.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct MultiBezier {
    beziers: Vec<Bezier>,
    /// Set after `close()`; the next drawing command starts a fresh contour
    /// seeded at the closed contour's last position.
    #[serde(skip)]
    at_end: bool,
    #[serde(skip)]
    bbox: Cell<Option<Option<Rect>>>,
}

impl PartialEq for MultiBezier {
    fn eq(&self, other: &Self) -> bool {
        self.beziers == other.beziers
    }
}

impl MultiBezier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn beziers(&self) -> &[Bezier] {
        &self.beziers
    }

    pub fn is_empty(&self) -> bool {
        self.beziers.iter().all(Bezier::is_empty)
    }

    fn dirty(&mut self) {
        self.bbox.set(None);
    }

    /// Makes sure a drawing command has a live contour to extend: after a
    /// `close()` (or on an empty path) a new contour is opened, seeded with
    /// the previous contour's last on-curve position.
    fn handle_end(&mut self) {
        if self.beziers.is_empty() {
            self.beziers.push(Bezier::new());
            self.at_end = false;
            return;
        }
        if self.at_end {
            let seed = self
                .beziers
                .last()
                .and_then(|b| b.points().last())
                .map(|p| p.pos);
            let mut fresh = Bezier::new();
            if let Some(pos) = seed {
                fresh.push(pos.into());
            }
            self.beziers.push(fresh);
            self.at_end = false;
        }
    }

    fn current(&mut self) -> &mut Bezier {
        self.handle_end();
        self.beziers.last_mut().unwrap()
    }

    /// Starts a new contour at `pos`.
    pub fn move_to(&mut self, pos: Point) -> &mut Self {
        self.dirty();
        self.beziers.push(Bezier::from_point(pos));
        self.at_end = false;
        self
    }

    pub fn line_to(&mut self, pos: Point) -> &mut Self {
        self.dirty();
        self.current().line_to(pos);
        self
    }

    pub fn quadratic_to(&mut self, handle: Point, dest: Point) -> &mut Self {
        self.dirty();
        self.current().quadratic_to(handle, dest);
        self
    }

    pub fn cubic_to(&mut self, handle1: Point, handle2: Point, dest: Point) -> &mut Self {
        self.dirty();
        self.current().cubic_to(handle1, handle2, dest);
        self
    }

    /// Closes the current contour; further drawing opens a new one.
    pub fn close(&mut self) -> &mut Self {
        self.dirty();
        if let Some(last) = self.beziers.last_mut() {
            last.close();
        }
        self.at_end = true;
        self
    }

    pub fn push(&mut self, bezier: Bezier) {
        self.dirty();
        self.beziers.push(bezier);
    }

    /// Appends all contours of `other`.
    pub fn append(&mut self, other: &MultiBezier) {
        self.dirty();
        self.beziers.extend(other.beziers.iter().cloned());
    }

    pub fn bounding_box(&self) -> Option<Rect> {
        if let Some(cached) = self.bbox.get() {
            return cached;
        }
        let mut rect: Option<Rect> = None;
        for b in &self.beziers {
            if let Some(r) = b.bounding_box() {
                rect = Some(match rect {
                    Some(acc) => acc.union(r),
                    None => r,
                });
            }
        }
        self.bbox.set(Some(rect));
        rect
    }

    pub fn apply_transform(&mut self, t: Affine) {
        self.dirty();
        for b in &mut self.beziers {
            b.apply_transform(t);
        }
    }

    pub fn transformed(&self, t: Affine) -> MultiBezier {
        let mut out = self.clone();
        out.apply_transform(t);
        out
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.apply_transform(Affine::translate((dx, dy)));
    }

    /// Reverses every contour.
    pub fn reverse(&mut self) {
        self.dirty();
        for b in &mut self.beziers {
            b.reverse();
        }
    }

    pub fn to_bez_path(&self) -> BezPath {
        let mut path = BezPath::new();
        for b in &self.beziers {
            b.write_to_path(&mut path);
        }
        path
    }

    /// Rebuilds contours from a kurbo path; quadratics are degree-elevated.
    pub fn from_bez_path(path: &BezPath) -> MultiBezier {
        let mut out = MultiBezier::new();
        for el in path.elements() {
            match *el {
                PathEl::MoveTo(p) => {
                    out.move_to(p);
                }
                PathEl::LineTo(p) => {
                    out.line_to(p);
                }
                PathEl::QuadTo(h, p) => {
                    out.quadratic_to(h, p);
                }
                PathEl::CurveTo(h1, h2, p) => {
                    out.cubic_to(h1, h2, p);
                }
                PathEl::ClosePath => {
                    // A path that spells out the closing segment ends on a
                    // copy of the start point; fold it into the start so the
                    // conversion is stable under repeated round trips.
                    if let Some(last) = out.beziers.last_mut()
                        && last.len() > 1
                        && last.points()[last.len() - 1].pos == last.points()[0].pos
                    {
                        let dup = last.points()[last.len() - 1];
                        let mut first = last.points()[0];
                        first.tan_in = dup.tan_in;
                        last.set_point(0, first);
                        last.remove_point(last.len() - 1);
                    }
                    out.close();
                }
            }
        }
        out
    }
}

impl From<Bezier> for MultiBezier {
    fn from(bezier: Bezier) -> Self {
        let mut out = MultiBezier::new();
        out.push(bezier);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drawing_after_close_starts_seeded_contour() {
        let mut mb = MultiBezier::new();
        mb.move_to(Point::new(0.0, 0.0));
        mb.line_to(Point::new(10.0, 0.0));
        mb.close();
        mb.line_to(Point::new(10.0, 10.0));

        assert_eq!(mb.beziers().len(), 2);
        assert!(mb.beziers()[0].closed());
        // New contour is seeded with the previous contour's last position.
        assert_eq!(mb.beziers()[1].points()[0].pos, Point::new(10.0, 0.0));
        assert_eq!(mb.beziers()[1].points()[1].pos, Point::new(10.0, 10.0));
    }

    #[test]
    fn drawing_on_empty_path_opens_contour() {
        let mut mb = MultiBezier::new();
        mb.line_to(Point::new(3.0, 4.0));
        assert_eq!(mb.beziers().len(), 1);
        assert_eq!(mb.beziers()[0].points()[0].pos, Point::new(3.0, 4.0));
    }

    #[test]
    fn bbox_unions_all_contours() {
        let mut mb = MultiBezier::new();
        mb.move_to(Point::new(0.0, 0.0));
        mb.line_to(Point::new(10.0, 10.0));
        mb.move_to(Point::new(50.0, 50.0));
        mb.line_to(Point::new(60.0, 40.0));
        let rect = mb.bounding_box().unwrap();
        assert_eq!(rect, Rect::new(0.0, 0.0, 60.0, 50.0));
    }

    #[test]
    fn bez_path_roundtrip_preserves_contours() {
        let mut mb = MultiBezier::new();
        mb.move_to(Point::new(0.0, 0.0));
        mb.cubic_to(
            Point::new(5.0, -5.0),
            Point::new(15.0, 5.0),
            Point::new(20.0, 0.0),
        );
        mb.close();

        let back = MultiBezier::from_bez_path(&mb.to_bez_path());
        assert_eq!(back, mb);
    }
}
