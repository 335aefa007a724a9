use vetra::{Warnings, parse_aep};

fn chunk(tag: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(tag);
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(payload);
    if payload.len() % 2 == 1 {
        out.push(0);
    }
    out
}

fn list(subheader: &[u8; 4], children: &[Vec<u8>]) -> Vec<u8> {
    let mut payload = subheader.to_vec();
    for c in children {
        payload.extend_from_slice(c);
    }
    chunk(b"LIST", &payload)
}

fn rifx(subheader: &[u8; 4], children: &[Vec<u8>]) -> Vec<u8> {
    let mut payload = subheader.to_vec();
    for c in children {
        payload.extend_from_slice(c);
    }
    let mut out = Vec::new();
    out.extend_from_slice(b"RIFX");
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(&payload);
    out
}

/// Item record: type, id and label color at their fixed offsets.
fn idta(item_type: u16, id: u32) -> Vec<u8> {
    let mut payload = vec![0u8; 59];
    payload[0..2].copy_from_slice(&item_type.to_be_bytes());
    payload[16..20].copy_from_slice(&id.to_be_bytes());
    chunk(b"idta", &payload)
}

#[test]
fn wrong_container_signature_is_fatal() {
    let mut warnings = Warnings::new();
    let mut bytes = rifx(b"Egg!", &[]);
    bytes[..4].copy_from_slice(b"RIFF");
    assert!(parse_aep(&bytes, &mut warnings).is_err());
    assert!(parse_aep(b"not a project", &mut warnings).is_err());
}

#[test]
fn wrong_form_type_is_fatal() {
    let mut warnings = Warnings::new();
    let bytes = rifx(b"WAVE", &[]);
    assert!(parse_aep(&bytes, &mut warnings).is_err());
}

#[test]
fn empty_project_parses_to_empty_document() {
    let mut warnings = Warnings::new();
    let bytes = rifx(b"Egg!", &[list(b"Fold", &[])]);
    let doc = parse_aep(&bytes, &mut warnings).unwrap();
    assert!(doc.compositions.is_empty());
    assert!(warnings.is_empty());
}

#[test]
fn composition_missing_data_chunk_warns_and_defaults() {
    let mut warnings = Warnings::new();
    let item = list(b"Item", &[idta(4, 17), chunk(b"Utf8", b"empty comp")]);
    let bytes = rifx(b"Egg!", &[list(b"Fold", &[item])]);

    let doc = parse_aep(&bytes, &mut warnings).unwrap();
    assert_eq!(doc.compositions.len(), 1);
    assert!(
        warnings
            .entries()
            .iter()
            .any(|w| w.contains("composition data"))
    );

    let comp = &doc.compositions[0];
    assert_eq!(comp.name, "empty comp");
    assert_eq!(comp.width, 0.0);
    assert_eq!(comp.height, 0.0);
    // Unusable framerate falls back instead of producing a zero-fps comp.
    assert_eq!(comp.fps, 60.0);
    assert!(comp.nodes.is_empty());
}

#[test]
fn unknown_item_type_warns_but_continues() {
    let mut warnings = Warnings::new();
    let odd = list(b"Item", &[idta(9, 1)]);
    let comp = list(b"Item", &[idta(4, 2), chunk(b"Utf8", b"kept")]);
    let bytes = rifx(b"Egg!", &[list(b"Fold", &[odd, comp])]);

    let doc = parse_aep(&bytes, &mut warnings).unwrap();
    assert_eq!(doc.compositions.len(), 1);
    assert_eq!(doc.compositions[0].name, "kept");
    assert!(!warnings.is_empty());
}
