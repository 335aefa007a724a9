//! SVG path-data (`d` attribute) parser.

use kurbo::{Point, Vec2};

use crate::geometry::MultiBezier;

/// Parses a `d` attribute into contours. Unknown commands or malformed
/// numbers terminate the parse, keeping whatever was read so far, which
/// matches how browsers render broken path data.
pub struct PathDParser<'a> {
    lexer: Lexer<'a>,
    out: MultiBezier,
    pos: Point,
    start: Point,
    last_cubic_handle: Option<Point>,
    last_quad_handle: Option<Point>,
}

impl<'a> PathDParser<'a> {
    pub fn new(data: &'a str) -> Self {
        Self {
            lexer: Lexer::new(data),
            out: MultiBezier::new(),
            pos: Point::ZERO,
            start: Point::ZERO,
            last_cubic_handle: None,
            last_quad_handle: None,
        }
    }

    pub fn parse(mut self) -> MultiBezier {
        let mut implicit: Option<u8> = None;
        loop {
            let cmd = match self.lexer.command() {
                Some(c) => c,
                // Extra coordinates repeat the previous command; after
                // moveto the implicit repeat is lineto.
                None if self.lexer.has_number() => match implicit {
                    Some(b'M') => b'L',
                    Some(b'm') => b'l',
                    // Numbers after closepath consume nothing, so stop.
                    Some(b'Z' | b'z') | None => break,
                    Some(c) => c,
                },
                None => break,
            };
            if !self.apply(cmd) {
                break;
            }
            implicit = Some(cmd);
        }
        self.out
    }

    fn apply(&mut self, cmd: u8) -> bool {
        let relative = cmd.is_ascii_lowercase();
        match cmd.to_ascii_uppercase() {
            b'M' => {
                let Some(p) = self.point(relative) else {
                    return false;
                };
                self.out.move_to(p);
                self.pos = p;
                self.start = p;
                self.reset_handles();
            }
            b'L' => {
                let Some(p) = self.point(relative) else {
                    return false;
                };
                self.line(p);
            }
            b'H' => {
                let Some(x) = self.lexer.number() else {
                    return false;
                };
                let x = if relative { self.pos.x + x } else { x };
                self.line(Point::new(x, self.pos.y));
            }
            b'V' => {
                let Some(y) = self.lexer.number() else {
                    return false;
                };
                let y = if relative { self.pos.y + y } else { y };
                self.line(Point::new(self.pos.x, y));
            }
            b'C' => {
                let (Some(h1), Some(h2), Some(p)) = (
                    self.point(relative),
                    self.point(relative),
                    self.point(relative),
                ) else {
                    return false;
                };
                self.cubic(h1, h2, p);
            }
            b'S' => {
                let (Some(h2), Some(p)) = (self.point(relative), self.point(relative)) else {
                    return false;
                };
                let h1 = self.reflect(self.last_cubic_handle);
                self.cubic(h1, h2, p);
            }
            b'Q' => {
                let (Some(h), Some(p)) = (self.point(relative), self.point(relative)) else {
                    return false;
                };
                self.quadratic(h, p);
            }
            b'T' => {
                let Some(p) = self.point(relative) else {
                    return false;
                };
                let h = self.reflect(self.last_quad_handle);
                self.quadratic(h, p);
            }
            b'A' => {
                let (Some(rx), Some(ry), Some(rot)) =
                    (self.lexer.number(), self.lexer.number(), self.lexer.number())
                else {
                    return false;
                };
                let (Some(large), Some(sweep)) = (self.lexer.flag(), self.lexer.flag()) else {
                    return false;
                };
                let Some(p) = self.point(relative) else {
                    return false;
                };
                self.arc(rx, ry, rot.to_radians(), large, sweep, p);
            }
            b'Z' => {
                self.out.close();
                self.pos = self.start;
                self.reset_handles();
            }
            _ => return false,
        }
        true
    }

    fn point(&mut self, relative: bool) -> Option<Point> {
        let x = self.lexer.number()?;
        let y = self.lexer.number()?;
        let p = Point::new(x, y);
        Some(if relative { self.pos + p.to_vec2() } else { p })
    }

    fn reset_handles(&mut self) {
        self.last_cubic_handle = None;
        self.last_quad_handle = None;
    }

    fn reflect(&self, handle: Option<Point>) -> Point {
        match handle {
            Some(h) => self.pos + (self.pos - h),
            None => self.pos,
        }
    }

    fn line(&mut self, p: Point) {
        self.out.line_to(p);
        self.pos = p;
        self.reset_handles();
    }

    fn cubic(&mut self, h1: Point, h2: Point, p: Point) {
        self.out.cubic_to(h1, h2, p);
        self.pos = p;
        self.last_cubic_handle = Some(h2);
        self.last_quad_handle = None;
    }

    fn quadratic(&mut self, h: Point, p: Point) {
        self.out.quadratic_to(h, p);
        self.pos = p;
        self.last_quad_handle = Some(h);
        self.last_cubic_handle = None;
    }

    /// Endpoint-to-center conversion, then one cubic per arc quadrant.
    fn arc(&mut self, rx: f64, ry: f64, phi: f64, large: bool, sweep: bool, p: Point) {
        let mut rx = rx.abs();
        let mut ry = ry.abs();
        if rx == 0.0 || ry == 0.0 || self.pos == p {
            self.line(p);
            return;
        }

        let (sin_phi, cos_phi) = phi.sin_cos();
        let d = (self.pos - p) / 2.0;
        let x1p = cos_phi * d.x + sin_phi * d.y;
        let y1p = -sin_phi * d.x + cos_phi * d.y;

        // Scale radii up if the endpoints cannot be reached.
        let lambda = x1p * x1p / (rx * rx) + y1p * y1p / (ry * ry);
        if lambda > 1.0 {
            let s = lambda.sqrt();
            rx *= s;
            ry *= s;
        }

        let num = (rx * rx * ry * ry - rx * rx * y1p * y1p - ry * ry * x1p * x1p).max(0.0);
        let den = rx * rx * y1p * y1p + ry * ry * x1p * x1p;
        let mut coef = (num / den).sqrt();
        if large == sweep {
            coef = -coef;
        }
        let cxp = coef * rx * y1p / ry;
        let cyp = -coef * ry * x1p / rx;
        let center = Point::new(
            cos_phi * cxp - sin_phi * cyp + (self.pos.x + p.x) / 2.0,
            sin_phi * cxp + cos_phi * cyp + (self.pos.y + p.y) / 2.0,
        );

        let angle = |v: Vec2| v.y.atan2(v.x);
        let start = angle(Vec2::new((x1p - cxp) / rx, (y1p - cyp) / ry));
        let end = angle(Vec2::new((-x1p - cxp) / rx, (-y1p - cyp) / ry));
        let mut delta = end - start;
        if sweep && delta < 0.0 {
            delta += std::f64::consts::TAU;
        } else if !sweep && delta > 0.0 {
            delta -= std::f64::consts::TAU;
        }

        let segments = (delta.abs() / std::f64::consts::FRAC_PI_2).ceil().max(1.0) as usize;
        let step = delta / segments as f64;
        // Handle length for a cubic approximating a step-sized elliptical arc.
        let k = 4.0 / 3.0 * (step / 4.0).tan();

        let ellipse_point = |theta: f64| {
            let (sin_t, cos_t) = theta.sin_cos();
            Point::new(
                center.x + rx * cos_t * cos_phi - ry * sin_t * sin_phi,
                center.y + rx * cos_t * sin_phi + ry * sin_t * cos_phi,
            )
        };
        let ellipse_tangent = |theta: f64| {
            let (sin_t, cos_t) = theta.sin_cos();
            Vec2::new(
                -rx * sin_t * cos_phi - ry * cos_t * sin_phi,
                -rx * sin_t * sin_phi + ry * cos_t * cos_phi,
            )
        };

        let mut theta = start;
        for i in 0..segments {
            let next = if i + 1 == segments { start + delta } else { theta + step };
            let p0 = ellipse_point(theta);
            let p3 = if i + 1 == segments { p } else { ellipse_point(next) };
            let h1 = p0 + ellipse_tangent(theta) * k;
            let h2 = p3 - ellipse_tangent(next) * k;
            self.cubic(h1, h2, p3);
            theta = next;
        }
        self.pos = p;
        self.reset_handles();
    }
}

struct Lexer<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(data: &'a str) -> Self {
        Self {
            data: data.as_bytes(),
            pos: 0,
        }
    }

    fn skip_separators(&mut self) {
        while self.pos < self.data.len()
            && (self.data[self.pos].is_ascii_whitespace() || self.data[self.pos] == b',')
        {
            self.pos += 1;
        }
    }

    fn command(&mut self) -> Option<u8> {
        self.skip_separators();
        let b = *self.data.get(self.pos)?;
        if b.is_ascii_alphabetic() {
            self.pos += 1;
            Some(b)
        } else {
            None
        }
    }

    fn has_number(&mut self) -> bool {
        self.skip_separators();
        matches!(self.data.get(self.pos), Some(b) if b.is_ascii_digit() || matches!(b, b'-' | b'+' | b'.'))
    }

    fn number(&mut self) -> Option<f64> {
        self.skip_separators();
        let start = self.pos;
        if matches!(self.data.get(self.pos), Some(b'-' | b'+')) {
            self.pos += 1;
        }
        let mut seen_dot = false;
        while let Some(&b) = self.data.get(self.pos) {
            match b {
                b'0'..=b'9' => self.pos += 1,
                b'.' if !seen_dot => {
                    seen_dot = true;
                    self.pos += 1;
                }
                b'e' | b'E' => {
                    self.pos += 1;
                    if matches!(self.data.get(self.pos), Some(b'-' | b'+')) {
                        self.pos += 1;
                    }
                    while matches!(self.data.get(self.pos), Some(b) if b.is_ascii_digit()) {
                        self.pos += 1;
                    }
                    break;
                }
                _ => break,
            }
        }
        if self.pos == start {
            return None;
        }
        std::str::from_utf8(&self.data[start..self.pos])
            .ok()?
            .parse()
            .ok()
    }

    /// Arc flags may be packed without separators (`1 1` or `11`).
    fn flag(&mut self) -> Option<bool> {
        self.skip_separators();
        match self.data.get(self.pos)? {
            b'0' => {
                self.pos += 1;
                Some(false)
            }
            b'1' => {
                self.pos += 1;
                Some(true)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(d: &str) -> MultiBezier {
        PathDParser::new(d).parse()
    }

    #[test]
    fn lines_absolute_and_relative() {
        let path = parse("M 10 10 L 20 10 l 0 10 H 5 V 0 Z");
        let contours = path.beziers();
        assert_eq!(contours.len(), 1);
        let b = &contours[0];
        assert!(b.closed());
        assert_eq!(b.points()[0].pos, Point::new(10.0, 10.0));
        assert_eq!(b.points()[1].pos, Point::new(20.0, 10.0));
        assert_eq!(b.points()[2].pos, Point::new(20.0, 20.0));
        assert_eq!(b.points()[3].pos, Point::new(5.0, 20.0));
        assert_eq!(b.points()[4].pos, Point::new(5.0, 0.0));
    }

    #[test]
    fn implicit_lineto_after_moveto() {
        let path = parse("M 0 0 10 0 10 10");
        let b = &path.beziers()[0];
        assert_eq!(b.len(), 3);
        assert_eq!(b.points()[2].pos, Point::new(10.0, 10.0));
    }

    #[test]
    fn smooth_cubic_reflects_handle() {
        let path = parse("M 0 0 C 0 10 10 10 10 0 S 20 -10 20 0");
        let b = &path.beziers()[0];
        // Reflection of (10, 10) about (10, 0).
        assert_eq!(b.points()[1].tan_out, Point::new(10.0, -10.0));
    }

    #[test]
    fn quadratic_elevates() {
        let path = parse("M 0 0 Q 15 15 30 0");
        let b = &path.beziers()[0];
        assert_eq!(b.points()[0].tan_out, Point::new(10.0, 10.0));
        assert_eq!(b.points()[1].tan_in, Point::new(20.0, 10.0));
    }

    #[test]
    fn arc_endpoints_and_shape() {
        let path = parse("M 0 0 A 10 10 0 0 1 20 0");
        let b = &path.beziers()[0];
        let last = b.points()[b.len() - 1];
        assert_eq!(last.pos, Point::new(20.0, 0.0));
        // Positive sweep from (0,0) to (20,0) passes through (10,-10).
        let bbox = path.bounding_box();
        assert!(bbox.is_some_and(|r| (r.min_y() + 10.0).abs() < 0.01));
    }

    #[test]
    fn multiple_contours() {
        let path = parse("M 0 0 L 10 0 M 20 20 L 30 20");
        assert_eq!(path.beziers().len(), 2);
    }

    #[test]
    fn garbage_keeps_prefix() {
        let path = parse("M 0 0 L 10 0 L nonsense");
        let b = &path.beziers()[0];
        assert_eq!(b.len(), 2);
    }
}
