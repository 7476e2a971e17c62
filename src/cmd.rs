use serde::Deserialize;

/// A brush command that a key can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Cmd {
    /// Grows the brush by a third, up to the maximum size.
    #[serde(rename = "GROW")]
    Grow,
    /// Shrinks the brush by a quarter, down to the minimum size.
    #[serde(rename = "SHRINK")]
    Shrink,
    /// Makes the brush more transparent.
    #[serde(rename = "FADE")]
    Fade,
    /// Makes the brush more opaque.
    #[serde(rename = "INTENSIFY")]
    Intensify,
    /// Throws away every stroke on the canvas.
    #[serde(rename = "CLEAR")]
    Clear,
}
