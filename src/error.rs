pub type VetraResult<T> = Result<T, VetraError>;

#[derive(thiserror::Error, Debug)]
pub enum VetraError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("serialization error: {0}")]
    Serde(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VetraError {
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

/// Collector for recoverable import warnings.
///
/// Parsers push here instead of failing: a missing optional chunk or an
/// unknown element skips the affected item and keeps going. Only a bad root
/// signature aborts an import (as [`VetraError::Parse`]).
#[derive(Debug, Default)]
pub struct Warnings {
    entries: Vec<String>,
}

impl Warnings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        tracing::warn!(target: "vetra::import", "{msg}");
        self.entries.push(msg);
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(VetraError::parse("x").to_string().contains("parse error:"));
        assert!(
            VetraError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(VetraError::render("x").to_string().contains("render error:"));
        assert!(
            VetraError::serde("x")
                .to_string()
                .contains("serialization error:")
        );
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = VetraError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn warnings_accumulate_in_order() {
        let mut w = Warnings::new();
        w.warn("first");
        w.warn("second");
        assert_eq!(w.entries(), ["first", "second"]);
    }
}
