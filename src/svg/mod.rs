//! SVG importer: markup plus SMIL animations into the scene model.

pub mod animate;
pub mod color;
pub mod css;
pub mod parser;
pub mod path_d;

pub use parser::SvgOptions;

use crate::error::{VetraResult, Warnings};
use crate::model::Document;

/// Parses SVG markup into a document with a single composition.
///
/// Unsupported constructs degrade gracefully and are reported through
/// `warnings`; only malformed markup is an error.
#[tracing::instrument(skip_all)]
pub fn parse_svg(
    text: &str,
    options: &SvgOptions,
    warnings: &mut Warnings,
) -> VetraResult<Document> {
    parser::parse_document(text, options, warnings)
}
