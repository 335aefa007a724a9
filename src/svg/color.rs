//! CSS color parsing, regex driven.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::Color;

static RGBA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^rgba\s*\(\s*([0-9]+)\s*,\s*([0-9]+)\s*,\s*([0-9]+)\s*,\s*([0-9.eE]+)\s*\)$")
        .unwrap()
});
static RGB: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^rgb\s*\(\s*([0-9]+)\s*,\s*([0-9]+)\s*,\s*([0-9]+)\s*\)$").unwrap()
});
static RGBA_PC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^rgba\s*\(\s*([0-9.eE]+)%\s*,\s*([0-9.eE]+)%\s*,\s*([0-9.eE]+)%\s*,\s*([0-9.eE]+)\s*\)$",
    )
    .unwrap()
});
static RGB_PC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^rgb\s*\(\s*([0-9.eE]+)%\s*,\s*([0-9.eE]+)%\s*,\s*([0-9.eE]+)%\s*\)$").unwrap()
});
static HSL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^hsl\s*\(\s*([0-9.eE]+)\s*,\s*([0-9.eE]+)%\s*,\s*([0-9.eE]+)%\s*\)$").unwrap()
});
static HSLA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^hsla\s*\(\s*([0-9.eE]+)\s*,\s*([0-9.eE]+)%\s*,\s*([0-9.eE]+)%\s*,\s*([0-9.eE]+)\s*\)$",
    )
    .unwrap()
});

fn hex_digit(b: u8) -> Option<u32> {
    (b as char).to_digit(16)
}

/// `#rgb`, `#rgba`, `#rrggbb` and `#rrggbbaa`. Single digits scale by 15,
/// pairs by 255.
fn parse_hex(s: &str) -> Option<Color> {
    let digits = s.as_bytes();
    let component = |start: usize, size: usize| -> Option<u8> {
        if size == 1 {
            let v = hex_digit(digits[start])?;
            Some((v * 255 / 15) as u8)
        } else {
            let v = hex_digit(digits[start])? * 16 + hex_digit(digits[start + 1])?;
            Some(v as u8)
        }
    };
    match digits.len() {
        4 => Some(Color::new(component(1, 1)?, component(2, 1)?, component(3, 1)?, 255)),
        5 => Some(Color::new(
            component(1, 1)?,
            component(2, 1)?,
            component(3, 1)?,
            component(4, 1)?,
        )),
        7 => Some(Color::new(component(1, 2)?, component(3, 2)?, component(5, 2)?, 255)),
        9 => Some(Color::new(
            component(1, 2)?,
            component(3, 2)?,
            component(5, 2)?,
            component(7, 2)?,
        )),
        _ => None,
    }
}

fn unit_to_u8(v: f64) -> u8 {
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}

fn from_hsl(h: f64, s: f64, l: f64, a: f64) -> Color {
    let h = h.rem_euclid(1.0) * 6.0;
    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let x = c * (1.0 - (h % 2.0 - 1.0).abs());
    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = l - c / 2.0;
    Color::new(
        unit_to_u8(r + m),
        unit_to_u8(g + m),
        unit_to_u8(b + m),
        unit_to_u8(a),
    )
}

/// Parses a CSS color string. Empty or malformed input is `None`;
/// `transparent` and `none` are transparent black. `currentColor` is
/// resolved by the caller and yields `None` here.
pub fn parse_color(string: &str) -> Option<Color> {
    if string.is_empty() {
        return None;
    }

    if string.starts_with('#') {
        return parse_hex(string);
    }

    if string == "transparent" || string == "none" {
        return Some(Color::TRANSPARENT);
    }

    let int = |m: &regex::Captures, i: usize| m[i].parse::<i64>().ok().map(|v| v.clamp(0, 255) as u8);
    let num = |m: &regex::Captures, i: usize| m[i].parse::<f64>().ok();

    if let Some(m) = RGBA.captures(string) {
        return Some(Color::new(
            int(&m, 1)?,
            int(&m, 2)?,
            int(&m, 3)?,
            unit_to_u8(num(&m, 4)?),
        ));
    }

    if let Some(m) = RGB.captures(string) {
        return Some(Color::new(int(&m, 1)?, int(&m, 2)?, int(&m, 3)?, 255));
    }

    if let Some(m) = RGBA_PC.captures(string) {
        return Some(Color::new(
            unit_to_u8(num(&m, 1)? / 100.0),
            unit_to_u8(num(&m, 2)? / 100.0),
            unit_to_u8(num(&m, 3)? / 100.0),
            unit_to_u8(num(&m, 4)?),
        ));
    }

    if let Some(m) = RGB_PC.captures(string) {
        return Some(Color::new(
            unit_to_u8(num(&m, 1)? / 100.0),
            unit_to_u8(num(&m, 2)? / 100.0),
            unit_to_u8(num(&m, 3)? / 100.0),
            255,
        ));
    }

    if let Some(m) = HSL.captures(string) {
        return Some(from_hsl(num(&m, 1)? / 360.0, num(&m, 2)? / 100.0, num(&m, 3)? / 100.0, 1.0));
    }

    if let Some(m) = HSLA.captures(string) {
        return Some(from_hsl(
            num(&m, 1)? / 360.0,
            num(&m, 2)? / 100.0,
            num(&m, 3)? / 100.0,
            num(&m, 4)?,
        ));
    }

    named_color(string)
}

/// The CSS named-color table (plus `rebeccapurple`).
fn named_color(name: &str) -> Option<Color> {
    let rgb = |r, g, b| Some(Color::new(r, g, b, 255));
    match name {
        "aliceblue" => rgb(240, 248, 255),
        "antiquewhite" => rgb(250, 235, 215),
        "aqua" | "cyan" => rgb(0, 255, 255),
        "aquamarine" => rgb(127, 255, 212),
        "azure" => rgb(240, 255, 255),
        "beige" => rgb(245, 245, 220),
        "bisque" => rgb(255, 228, 196),
        "black" => rgb(0, 0, 0),
        "blanchedalmond" => rgb(255, 235, 205),
        "blue" => rgb(0, 0, 255),
        "blueviolet" => rgb(138, 43, 226),
        "brown" => rgb(165, 42, 42),
        "burlywood" => rgb(222, 184, 135),
        "cadetblue" => rgb(95, 158, 160),
        "chartreuse" => rgb(127, 255, 0),
        "chocolate" => rgb(210, 105, 30),
        "coral" => rgb(255, 127, 80),
        "cornflowerblue" => rgb(100, 149, 237),
        "cornsilk" => rgb(255, 248, 220),
        "crimson" => rgb(220, 20, 60),
        "darkblue" => rgb(0, 0, 139),
        "darkcyan" => rgb(0, 139, 139),
        "darkgoldenrod" => rgb(184, 134, 11),
        "darkgray" | "darkgrey" => rgb(169, 169, 169),
        "darkgreen" => rgb(0, 100, 0),
        "darkkhaki" => rgb(189, 183, 107),
        "darkmagenta" => rgb(139, 0, 139),
        "darkolivegreen" => rgb(85, 107, 47),
        "darkorange" => rgb(255, 140, 0),
        "darkorchid" => rgb(153, 50, 204),
        "darkred" => rgb(139, 0, 0),
        "darksalmon" => rgb(233, 150, 122),
        "darkseagreen" => rgb(143, 188, 143),
        "darkslateblue" => rgb(72, 61, 139),
        "darkslategray" | "darkslategrey" => rgb(47, 79, 79),
        "darkturquoise" => rgb(0, 206, 209),
        "darkviolet" => rgb(148, 0, 211),
        "deeppink" => rgb(255, 20, 147),
        "deepskyblue" => rgb(0, 191, 255),
        "dimgray" | "dimgrey" => rgb(105, 105, 105),
        "dodgerblue" => rgb(30, 144, 255),
        "firebrick" => rgb(178, 34, 34),
        "floralwhite" => rgb(255, 250, 240),
        "forestgreen" => rgb(34, 139, 34),
        "fuchsia" | "magenta" => rgb(255, 0, 255),
        "gainsboro" => rgb(220, 220, 220),
        "ghostwhite" => rgb(248, 248, 255),
        "gold" => rgb(255, 215, 0),
        "goldenrod" => rgb(218, 165, 32),
        "gray" | "grey" => rgb(128, 128, 128),
        "green" => rgb(0, 128, 0),
        "greenyellow" => rgb(173, 255, 47),
        "honeydew" => rgb(240, 255, 240),
        "hotpink" => rgb(255, 105, 180),
        "indianred" => rgb(205, 92, 92),
        "indigo" => rgb(75, 0, 130),
        "ivory" => rgb(255, 255, 240),
        "khaki" => rgb(240, 230, 140),
        "lavender" => rgb(230, 230, 250),
        "lavenderblush" => rgb(255, 240, 245),
        "lawngreen" => rgb(124, 252, 0),
        "lemonchiffon" => rgb(255, 250, 205),
        "lightblue" => rgb(173, 216, 230),
        "lightcoral" => rgb(240, 128, 128),
        "lightcyan" => rgb(224, 255, 255),
        "lightgoldenrodyellow" => rgb(250, 250, 210),
        "lightgray" | "lightgrey" => rgb(211, 211, 211),
        "lightgreen" => rgb(144, 238, 144),
        "lightpink" => rgb(255, 182, 193),
        "lightsalmon" => rgb(255, 160, 122),
        "lightseagreen" => rgb(32, 178, 170),
        "lightskyblue" => rgb(135, 206, 250),
        "lightslategray" | "lightslategrey" => rgb(119, 136, 153),
        "lightsteelblue" => rgb(176, 196, 222),
        "lightyellow" => rgb(255, 255, 224),
        "lime" => rgb(0, 255, 0),
        "limegreen" => rgb(50, 205, 50),
        "linen" => rgb(250, 240, 230),
        "maroon" => rgb(128, 0, 0),
        "mediumaquamarine" => rgb(102, 205, 170),
        "mediumblue" => rgb(0, 0, 205),
        "mediumorchid" => rgb(186, 85, 211),
        "mediumpurple" => rgb(147, 112, 219),
        "mediumseagreen" => rgb(60, 179, 113),
        "mediumslateblue" => rgb(123, 104, 238),
        "mediumspringgreen" => rgb(0, 250, 154),
        "mediumturquoise" => rgb(72, 209, 204),
        "mediumvioletred" => rgb(199, 21, 133),
        "midnightblue" => rgb(25, 25, 112),
        "mintcream" => rgb(245, 255, 250),
        "mistyrose" => rgb(255, 228, 225),
        "moccasin" => rgb(255, 228, 181),
        "navajowhite" => rgb(255, 222, 173),
        "navy" => rgb(0, 0, 128),
        "oldlace" => rgb(253, 245, 230),
        "olive" => rgb(128, 128, 0),
        "olivedrab" => rgb(107, 142, 35),
        "orange" => rgb(255, 165, 0),
        "orangered" => rgb(255, 69, 0),
        "orchid" => rgb(218, 112, 214),
        "palegoldenrod" => rgb(238, 232, 170),
        "palegreen" => rgb(152, 251, 152),
        "paleturquoise" => rgb(175, 238, 238),
        "palevioletred" => rgb(219, 112, 147),
        "papayawhip" => rgb(255, 239, 213),
        "peachpuff" => rgb(255, 218, 185),
        "peru" => rgb(205, 133, 63),
        "pink" => rgb(255, 192, 203),
        "plum" => rgb(221, 160, 221),
        "powderblue" => rgb(176, 224, 230),
        "purple" => rgb(128, 0, 128),
        "rebeccapurple" => rgb(102, 51, 153),
        "red" => rgb(255, 0, 0),
        "rosybrown" => rgb(188, 143, 143),
        "royalblue" => rgb(65, 105, 225),
        "saddlebrown" => rgb(139, 69, 19),
        "salmon" => rgb(250, 128, 114),
        "sandybrown" => rgb(244, 164, 96),
        "seagreen" => rgb(46, 139, 87),
        "seashell" => rgb(255, 245, 238),
        "sienna" => rgb(160, 82, 45),
        "silver" => rgb(192, 192, 192),
        "skyblue" => rgb(135, 206, 235),
        "slateblue" => rgb(106, 90, 205),
        "slategray" | "slategrey" => rgb(112, 128, 144),
        "snow" => rgb(255, 250, 250),
        "springgreen" => rgb(0, 255, 127),
        "steelblue" => rgb(70, 130, 180),
        "tan" => rgb(210, 180, 140),
        "teal" => rgb(0, 128, 128),
        "thistle" => rgb(216, 191, 216),
        "tomato" => rgb(255, 99, 71),
        "turquoise" => rgb(64, 224, 208),
        "violet" => rgb(238, 130, 238),
        "wheat" => rgb(245, 222, 179),
        "white" => rgb(255, 255, 255),
        "whitesmoke" => rgb(245, 245, 245),
        "yellow" => rgb(255, 255, 0),
        "yellowgreen" => rgb(154, 205, 50),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_forms() {
        assert_eq!(parse_color("#f00"), Some(Color::new(255, 0, 0, 255)));
        assert_eq!(parse_color("#f008"), Some(Color::new(255, 0, 0, 136)));
        assert_eq!(parse_color("#ff0000"), Some(Color::new(255, 0, 0, 255)));
        assert_eq!(parse_color("#ff000080"), Some(Color::new(255, 0, 0, 128)));
        assert_eq!(parse_color("#ff00"), Some(Color::new(255, 255, 0, 0)));
        assert_eq!(parse_color("#zz0000"), None);
        assert_eq!(parse_color("#ff00f"), None);
    }

    #[test]
    fn functional_forms() {
        assert_eq!(parse_color("rgb(255, 0, 0)"), Some(Color::new(255, 0, 0, 255)));
        assert_eq!(parse_color("rgba(255,0,0,0.5)"), Some(Color::new(255, 0, 0, 128)));
        assert_eq!(
            parse_color("rgb(100%, 0%, 50%)"),
            Some(Color::new(255, 0, 128, 255))
        );
        assert_eq!(
            parse_color("rgba(100%, 0%, 0%, 0.5)"),
            Some(Color::new(255, 0, 0, 128))
        );
        assert_eq!(parse_color("hsl(0, 100%, 50%)"), Some(Color::new(255, 0, 0, 255)));
        assert_eq!(
            parse_color("hsla(120, 100%, 50%, 0.5)"),
            Some(Color::new(0, 255, 0, 128))
        );
    }

    #[test]
    fn keywords() {
        assert_eq!(parse_color("transparent"), Some(Color::TRANSPARENT));
        assert_eq!(parse_color("none"), Some(Color::TRANSPARENT));
        assert_eq!(parse_color("red"), Some(Color::new(255, 0, 0, 255)));
        assert_eq!(parse_color("rebeccapurple"), Some(Color::new(102, 51, 153, 255)));
        assert_eq!(parse_color(""), None);
        assert_eq!(parse_color("not-a-color"), None);
    }
}
