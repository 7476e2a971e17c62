use std::{fs, path::Path};

use anyhow::bail;
use serde::{de::Visitor, Deserialize};

use crate::{
    canvas::{Color, MAX_BRUSH_SIZE, MIN_BRUSH_SIZE, PALETTE},
    input::{Bindings, Key},
};

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub title: String,
    /// Window width in physical pixels.
    pub width: u32,
    /// Window height in physical pixels.
    pub height: u32,
    pub palette: Vec<Color>,
    pub brush: BrushConfig,
    /// Replaces the default key bindings when present.
    #[serde(rename = "bind")]
    pub bindings: Bindings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            title: "Blobilism".into(),
            width: 500,
            height: 500,
            palette: PALETTE.to_vec(),
            brush: BrushConfig::default(),
            bindings: Bindings::default(),
        }
    }
}

/// Initial brush settings.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrushConfig {
    pub size: f32,
    pub alpha: f32,
    pub color: Color,
}

impl Default for BrushConfig {
    fn default() -> Self {
        Self {
            size: 20.0,
            alpha: 1.0,
            color: Color::new(1.0, 0.0, 0.0),
        }
    }
}

impl Config {
    pub fn load<A: AsRef<Path>>(path: A) -> anyhow::Result<Self> {
        Self::load_impl(path.as_ref())
    }

    fn load_impl(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.width == 0 || self.height == 0 {
            bail!(
                "window size must be non-zero (got {}x{})",
                self.width,
                self.height
            );
        }
        if self.palette.is_empty() {
            bail!("`palette` must contain at least one color");
        }
        for color in self.palette.iter().chain([&self.brush.color]) {
            if !color.is_normalized() {
                bail!("color channels must be in range 0-1 (got {color:?})");
            }
        }
        if !(MIN_BRUSH_SIZE..=MAX_BRUSH_SIZE).contains(&self.brush.size) {
            bail!(
                "brush size must be in range {MIN_BRUSH_SIZE}-{MAX_BRUSH_SIZE} (got {})",
                self.brush.size
            );
        }
        if !(0.0..=1.0).contains(&self.brush.alpha) {
            bail!(
                "brush alpha must be in range 0-1 (got {})",
                self.brush.alpha
            );
        }
        Ok(())
    }
}

impl<'a> Deserialize<'a> for Key {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'a>,
    {
        struct FromStrVisitor;

        impl<'de> Visitor<'de> for FromStrVisitor {
            type Value = Key;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("key name")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_str(FromStrVisitor)
    }
}
