#![forbid(unsafe_code)]

pub mod aep;
pub mod animation;
pub mod binary;
pub mod error;
pub mod geometry;
pub mod model;
pub mod paint;
pub mod render;
pub mod riff;
pub mod svg;

pub use aep::parse_aep;
pub use animation::{AnimatedProperty, FrameTime, Interpolate, Keyframe, KeyframeTransition};
pub use error::{VetraError, VetraResult, Warnings};
pub use geometry::{Bezier, BezierPoint, MultiBezier};
pub use model::{Composition, Document};
pub use paint::{render_composition, render_document};
pub use render::Renderer;
pub use svg::{SvgOptions, parse_svg};
