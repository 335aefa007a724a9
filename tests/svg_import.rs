use kurbo::{Point, Size};
use vetra::model::{Color, NodeKind, Shape};
use vetra::svg::color::parse_color;
use vetra::{SvgOptions, Warnings, parse_svg};

fn import(xml: &str) -> vetra::Document {
    let mut warnings = Warnings::new();
    parse_svg(xml, &SvgOptions::default(), &mut warnings).unwrap()
}

fn root_children(doc: &vetra::Document) -> &[vetra::model::Node] {
    match &doc.compositions[0].nodes[0].kind {
        NodeKind::Layer(layer) => &layer.group.children,
        other => panic!("expected root layer, got {other:?}"),
    }
}

#[test]
fn rect_imports_center_based() {
    let doc = import(
        r#"<svg width="100" height="100"><rect x="0" y="0" width="10" height="10"/></svg>"#,
    );
    let NodeKind::Group(group) = &root_children(&doc)[0].kind else {
        panic!("expected shape group");
    };
    let NodeKind::Shape(Shape::Rect(rect)) = &group.children[0].kind else {
        panic!("expected rect shape");
    };
    assert_eq!(*rect.position.value(), Point::new(5.0, 5.0));
    assert_eq!(*rect.size.value(), Size::new(10.0, 10.0));
}

#[test]
fn animated_rect_position_tracks_x_plus_half_width() {
    let doc = import(
        r#"<svg width="100" height="100">
            <rect x="0" y="0" width="10" height="10">
              <animate attributeName="x" from="0" to="20" begin="0s" dur="1s"/>
              <animate attributeName="width" from="10" to="30" begin="0s" dur="1s"/>
            </rect>
        </svg>"#,
    );
    let NodeKind::Group(group) = &root_children(&doc)[0].kind else {
        panic!("expected shape group");
    };
    let NodeKind::Shape(Shape::Rect(rect)) = &group.children[0].kind else {
        panic!("expected rect shape");
    };

    // 60 fps default: the 1s animation ends on frame 60.
    assert_eq!(rect.position.get_at(0.0), Point::new(5.0, 5.0));
    assert_eq!(rect.position.get_at(60.0), Point::new(35.0, 5.0));
    assert_eq!(rect.size.get_at(60.0), Size::new(30.0, 10.0));
    assert_eq!(doc.compositions[0].end_frame, 60.0);
}

#[test]
fn non_svg_root_is_fatal() {
    let mut warnings = Warnings::new();
    assert!(parse_svg("<video/>", &SvgOptions::default(), &mut warnings).is_err());
    assert!(parse_svg("<svg", &SvgOptions::default(), &mut warnings).is_err());
}

#[test]
fn color_forms() {
    assert_eq!(parse_color("#ff0000"), Some(Color::rgb(255, 0, 0)));
    assert_eq!(parse_color("rgb(255,0,0)"), Some(Color::rgb(255, 0, 0)));
    let half = parse_color("rgba(255,0,0,0.5)").unwrap();
    assert_eq!((half.r, half.g, half.b), (255, 0, 0));
    assert!((i32::from(half.a) - 128).abs() <= 1);
    assert_eq!(parse_color("transparent").map(|c| c.a), Some(0));
    assert_eq!(parse_color(""), None);
}

#[test]
fn style_sheet_and_presentation_attrs_cascade() {
    let doc = import(
        r#"<svg width="20" height="20">
            <style>.a { fill: #00ff00; }</style>
            <circle class="a" cx="10" cy="10" r="5" fill-opacity="0.5"/>
        </svg>"#,
    );
    let NodeKind::Group(group) = &root_children(&doc)[0].kind else {
        panic!("expected shape group");
    };
    let fill = group
        .children
        .iter()
        .find_map(|n| match &n.kind {
            NodeKind::Fill(f) => Some(f),
            _ => None,
        })
        .unwrap();
    let vetra::model::Brush::Flat(color) = &fill.brush else {
        panic!("expected flat brush");
    };
    assert_eq!(*color.value(), Color::rgb(0, 255, 0));
    assert_eq!(*fill.opacity.value(), 0.5);
}

#[test]
fn gradient_assets_are_registered() {
    let doc = import(
        r##"<svg width="10" height="10">
            <linearGradient id="g" x1="0" y1="0" x2="10" y2="0">
              <stop offset="0" stop-color="#ff0000"/>
              <stop offset="1" stop-color="#0000ff"/>
            </linearGradient>
            <rect width="10" height="10" fill="url(#g)"/>
        </svg>"##,
    );
    assert!(doc.assets.gradients.contains_key("g"));
    let stops = &doc.assets.gradient_colors["g"].stops;
    assert_eq!(stops.len(), 2);
    assert_eq!(stops[0].color, Color::rgb(255, 0, 0));

    let NodeKind::Group(group) = &root_children(&doc)[0].kind else {
        panic!("expected shape group");
    };
    let fill = group
        .children
        .iter()
        .find_map(|n| match &n.kind {
            NodeKind::Fill(f) => Some(f),
            _ => None,
        })
        .unwrap();
    assert_eq!(fill.brush, vetra::model::Brush::Gradient("g".to_owned()));
}
