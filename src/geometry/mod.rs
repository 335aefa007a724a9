//! Cubic-bezier path algebra built on [`kurbo`] primitives.

mod bezier;
mod multibezier;
mod point;

pub use bezier::Bezier;
pub use multibezier::MultiBezier;
pub use point::{BezierPoint, PointType};
