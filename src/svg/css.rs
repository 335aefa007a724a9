//! Minimal CSS support: block parsing, selector matching, and the style
//! resolution order used by the markup importer.

use std::collections::{BTreeMap, HashSet};

use crate::model::Color;

/// A compound selector like `rect.hero#main`. Combinators are not
/// supported; rules using them never match.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selector {
    pub tag: Option<String>,
    pub id: Option<String>,
    pub classes: Vec<String>,
    unsupported: bool,
}

impl Selector {
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        let mut sel = Selector::default();
        if text.contains(char::is_whitespace) || text.contains(['>', '+', '~', '[', ':']) {
            sel.unsupported = true;
            return sel;
        }

        let mut rest = text;
        if !rest.starts_with(['.', '#']) {
            let end = rest.find(['.', '#']).unwrap_or(rest.len());
            let tag = &rest[..end];
            if !tag.is_empty() && tag != "*" {
                sel.tag = Some(tag.to_owned());
            }
            rest = &rest[end..];
        }
        while !rest.is_empty() {
            let marker = rest.as_bytes()[0];
            rest = &rest[1..];
            let end = rest.find(['.', '#']).unwrap_or(rest.len());
            let name = rest[..end].to_owned();
            rest = &rest[end..];
            if name.is_empty() {
                sel.unsupported = true;
                return sel;
            }
            match marker {
                b'.' => sel.classes.push(name),
                b'#' => sel.id = Some(name),
                _ => sel.unsupported = true,
            }
        }
        sel
    }

    /// id 100, class 10, tag 1.
    pub fn specificity(&self) -> u32 {
        let mut s = 0;
        if self.id.is_some() {
            s += 100;
        }
        s += 10 * self.classes.len() as u32;
        if self.tag.is_some() {
            s += 1;
        }
        s
    }

    pub fn matches(&self, tag: &str, id: Option<&str>, classes: &HashSet<&str>) -> bool {
        if self.unsupported {
            return false;
        }
        if let Some(t) = &self.tag
            && t != tag
        {
            return false;
        }
        if let Some(sel_id) = &self.id
            && id != Some(sel_id.as_str())
        {
            return false;
        }
        self.classes.iter().all(|c| classes.contains(c.as_str()))
    }
}

#[derive(Clone, Debug, Default)]
pub struct StyleBlock {
    pub selector: Selector,
    pub declarations: BTreeMap<String, String>,
}

/// Parses stylesheet text into blocks, one per selector in a comma
/// separated selector list. `@` rules and comments are skipped.
pub fn parse_css(text: &str, blocks: &mut Vec<StyleBlock>) {
    let text = strip_comments(text);
    let mut cursor = text.as_str();

    while let Some(open) = cursor.find('{') {
        let selector_text = &cursor[..open];
        let Some(close) = cursor[open..].find('}') else {
            break;
        };
        let body = &cursor[open + 1..open + close];
        cursor = &cursor[open + close + 1..];

        if selector_text.trim_start().starts_with('@') {
            continue;
        }

        let declarations = parse_declarations(body);
        if declarations.is_empty() {
            continue;
        }

        for selector in selector_text.split(',') {
            let selector = Selector::parse(selector);
            blocks.push(StyleBlock {
                selector,
                declarations: declarations.clone(),
            });
        }
    }
}

/// Stable sort: later blocks win among equal specificity.
pub fn sort_blocks(blocks: &mut [StyleBlock]) {
    blocks.sort_by_key(|b| b.selector.specificity());
}

fn parse_declarations(body: &str) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for item in body.split(';') {
        if let Some((name, value)) = item.split_once(':') {
            let name = name.trim();
            let value = value.trim();
            if !name.is_empty() && !value.is_empty() {
                out.insert(name.to_owned(), value.to_owned());
            }
        }
    }
    out
}

fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        match rest[start..].find("*/") {
            Some(end) => rest = &rest[start + end + 2..],
            None => return out,
        }
    }
    out.push_str(rest);
    out
}

/// Resolved style of one element: property map plus the inherited
/// `color` value backing `currentColor`.
#[derive(Clone, Debug, Default)]
pub struct Style {
    pub map: BTreeMap<String, String>,
    pub color: Color,
}

impl Style {
    pub fn get<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.map.get(key).map_or(default, String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.map.insert(key.to_owned(), value.to_owned());
    }

    /// Resolves `inherit` entries against the parent style; entries the
    /// parent cannot resolve are dropped.
    pub fn resolve_inherit(&mut self, parent: &Style) {
        self.map.retain(|key, value| {
            if value == "inherit" {
                match parent.map.get(key) {
                    Some(pv) if pv != "inherit" => {
                        *value = pv.clone();
                        true
                    }
                    _ => false,
                }
            } else {
                true
            }
        });
    }
}

/// Attributes that participate in the cascade as presentation attributes.
pub const CSS_ATTRS: &[&str] = &[
    "fill",
    "fill-opacity",
    "fill-rule",
    "stroke",
    "stroke-opacity",
    "stroke-width",
    "stroke-linecap",
    "stroke-linejoin",
    "stroke-miterlimit",
    "stroke-dasharray",
    "stroke-dashoffset",
    "opacity",
    "color",
    "display",
    "visibility",
    "paint-order",
    "stop-color",
    "stop-opacity",
    "font-family",
    "font-size",
    "font-style",
    "font-weight",
    "line-height",
];

#[cfg(test)]
mod tests {
    use super::*;

    fn classes(list: &[&'static str]) -> HashSet<&'static str> {
        list.iter().copied().collect()
    }

    #[test]
    fn selector_parsing_and_matching() {
        let sel = Selector::parse("rect.hero#main");
        assert_eq!(sel.tag.as_deref(), Some("rect"));
        assert_eq!(sel.id.as_deref(), Some("main"));
        assert_eq!(sel.classes, vec!["hero".to_owned()]);
        assert_eq!(sel.specificity(), 111);

        assert!(sel.matches("rect", Some("main"), &classes(&["hero", "other"])));
        assert!(!sel.matches("circle", Some("main"), &classes(&["hero"])));
        assert!(!sel.matches("rect", None, &classes(&["hero"])));

        let universal = Selector::parse("*");
        assert!(universal.matches("anything", None, &classes(&[])));

        let descendant = Selector::parse("g rect");
        assert!(!descendant.matches("rect", None, &classes(&[])));
    }

    #[test]
    fn block_parsing_and_ordering() {
        let mut blocks = Vec::new();
        parse_css(
            "/* note */ .a, rect { fill: red; } #x { fill: blue } @media x { bogus }",
            &mut blocks,
        );
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].declarations["fill"], "red");

        sort_blocks(&mut blocks);
        assert_eq!(blocks.last().map(|b| b.selector.specificity()), Some(100));
    }

    #[test]
    fn inherit_resolution() {
        let mut parent = Style::default();
        parent.set("fill", "green");
        parent.set("stroke", "inherit");

        let mut style = Style::default();
        style.set("fill", "inherit");
        style.set("stroke", "inherit");
        style.set("opacity", "inherit");
        style.resolve_inherit(&parent);

        assert_eq!(style.get("fill", ""), "green");
        assert!(!style.contains("stroke"));
        assert!(!style.contains("opacity"));
    }
}
