use kurbo::{ParamCurve, Point, Vec2};
use vetra::Bezier;

fn wavy() -> Bezier {
    let mut b = Bezier::new();
    b.add_point(Point::new(0.0, 0.0), Vec2::ZERO, Vec2::new(10.0, -20.0));
    b.add_point(Point::new(50.0, 0.0), Vec2::new(-10.0, 20.0), Vec2::new(10.0, -20.0));
    b.add_point(Point::new(100.0, 10.0), Vec2::new(-10.0, 20.0), Vec2::ZERO);
    b
}

#[test]
fn bounding_box_contains_anchors_and_samples() {
    let b = wavy();
    let bbox = b.bounding_box().unwrap();
    // Rect::contains is half-open, so edge anchors are checked by union.
    for p in b.points() {
        assert_eq!(bbox.union_pt(p.pos), bbox, "{:?} outside {bbox:?}", p.pos);
    }
    for i in 0..b.segment_count() {
        let seg = b.segment(i);
        for t in [0.0, 0.25, 0.5, 0.75, 1.0] {
            let p = seg.eval(t);
            assert_eq!(
                bbox.union_pt(p),
                bbox,
                "segment {i} at t={t}: {p:?} outside {bbox:?}"
            );
        }
    }
}

#[test]
fn reverse_round_trips() {
    let mut original = wavy();
    original.close();
    let mut twice = original.clone();
    twice.reverse();
    twice.reverse();

    assert_eq!(twice.closed(), original.closed());
    assert_eq!(twice.len(), original.len());
    for (a, b) in original.points().iter().zip(twice.points()) {
        assert_eq!(a.pos, b.pos);
        assert_eq!(a.tan_in, b.tan_in);
        assert_eq!(a.tan_out, b.tan_out);
    }
}

#[test]
fn split_preserves_curve_shape() {
    let original = wavy();
    let factor = 0.3;
    let expected = original.segment(0).eval(factor);

    let mut split = original.clone();
    split.split_segment(1, factor);
    assert_eq!(split.len(), original.len() + 1);
    assert!((split.points()[1].pos - expected).hypot() < 1e-9);

    // Both halves still trace the original curve.
    for t in [0.0, 0.5, 1.0] {
        let left = split.segment(0).eval(t);
        let source = original.segment(0).eval(t * factor);
        assert!((left - source).hypot() < 1e-9);

        let right = split.segment(1).eval(t);
        let source = original.segment(0).eval(factor + t * (1.0 - factor));
        assert!((right - source).hypot() < 1e-9);
    }
}

#[test]
fn lerp_hits_both_endpoints() {
    let a = wavy();
    let mut b = wavy();
    b.set_point(
        1,
        vetra::BezierPoint::new(Point::new(50.0, 40.0)),
    );

    let at_zero = a.lerp(&b, 0.0);
    let at_one = a.lerp(&b, 1.0);
    for i in 0..a.len() {
        assert_eq!(at_zero.points()[i].pos, a.points()[i].pos);
        assert_eq!(at_one.points()[i].pos, b.points()[i].pos);
    }
}

#[test]
fn lerp_mismatch_returns_left_operand() {
    let a = wavy();
    let mut shorter = wavy();
    shorter.remove_point(2);
    let result = a.lerp(&shorter, 0.5);
    assert_eq!(result.len(), a.len());
    for (p, q) in result.points().iter().zip(a.points()) {
        assert_eq!(p.pos, q.pos);
    }

    let mut closed = wavy();
    closed.close();
    let result = a.lerp(&closed, 0.5);
    assert!(!result.closed());
}
