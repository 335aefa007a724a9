use vetra::render::Renderer;
use vetra::render::cpu::SoftwareRenderer;
use vetra::render::record::{Command, RecordingRenderer};
use vetra::{SvgOptions, Warnings, parse_svg, render_document};

#[test]
fn nested_layers_balance() {
    let mut r = RecordingRenderer::new();
    r.render_start().unwrap();
    r.layer_start().unwrap();
    r.layer_start().unwrap();
    r.layer_end().unwrap();
    r.layer_end().unwrap();
    r.render_end().unwrap();

    let opens = r
        .commands()
        .iter()
        .filter(|c| matches!(c, Command::LayerStart { .. }))
        .count();
    let closes = r
        .commands()
        .iter()
        .filter(|c| matches!(c, Command::LayerEnd))
        .count();
    assert_eq!(opens, 2);
    assert_eq!(closes, 2);
}

#[test]
fn missing_layer_end_fails_render_end() {
    let mut r = RecordingRenderer::new();
    r.render_start().unwrap();
    r.layer_start().unwrap();
    assert!(r.render_end().is_err());
}

#[test]
fn extra_layer_end_is_an_error() {
    let mut r = RecordingRenderer::new();
    r.render_start().unwrap();
    assert!(r.layer_end().is_err());
    // The imbalance sticks even if the caller balances afterwards.
    r.layer_start().unwrap();
    r.layer_end().unwrap();
    assert!(r.render_end().is_err());
}

#[test]
fn software_renderer_paints_svg_document() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let mut warnings = Warnings::new();
    let doc = parse_svg(
        r##"<svg width="8" height="8"><rect width="8" height="8" fill="#ff0000"/></svg>"##,
        &SvgOptions::default(),
        &mut warnings,
    )
    .unwrap();

    let mut renderer = SoftwareRenderer::new(8, 8).unwrap();
    render_document(&doc, 0.0, &mut renderer).unwrap();

    let pixels = renderer.pixels();
    assert_eq!(pixels.len(), 8 * 8 * 4);
    assert!(pixels.chunks_exact(4).any(|px| px[3] > 0));
    // The fill is solid red, so some pixel must carry red at full coverage.
    assert!(pixels.chunks_exact(4).any(|px| px[0] > 200 && px[3] > 200));
}
