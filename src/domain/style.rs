//! Style hints shared by generation and search

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which style hint a value belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleKey {
    Style,
    Ratio,
    Color,
    Scene,
}

impl StyleKey {
    pub const ALL: [StyleKey; 4] = [StyleKey::Style, StyleKey::Ratio, StyleKey::Color, StyleKey::Scene];

    /// Form field name on the service
    pub fn as_str(self) -> &'static str {
        match self {
            StyleKey::Style => "style",
            StyleKey::Ratio => "ratio",
            StyleKey::Color => "color",
            StyleKey::Scene => "scene",
        }
    }
}

impl FromStr for StyleKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StyleKey::ALL
            .into_iter()
            .find(|key| key.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("'{s}' is not one of style, ratio, color, scene"))
    }
}

impl fmt::Display for StyleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional free-text hints, e.g. `style = "persian"`, `ratio = "3:4"`.
/// Blank values count as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleHints {
    pub style: Option<String>,
    pub ratio: Option<String>,
    pub color: Option<String>,
    pub scene: Option<String>,
}

impl StyleHints {
    fn field_mut(&mut self, key: StyleKey) -> &mut Option<String> {
        match key {
            StyleKey::Style => &mut self.style,
            StyleKey::Ratio => &mut self.ratio,
            StyleKey::Color => &mut self.color,
            StyleKey::Scene => &mut self.scene,
        }
    }

    pub fn get(&self, key: StyleKey) -> Option<&str> {
        let value = match key {
            StyleKey::Style => &self.style,
            StyleKey::Ratio => &self.ratio,
            StyleKey::Color => &self.color,
            StyleKey::Scene => &self.scene,
        };
        value.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn set(&mut self, key: StyleKey, value: Option<String>) {
        *self.field_mut(key) = value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
    }

    /// Hints that are set, in form-field order
    pub fn fields(&self) -> impl Iterator<Item = (StyleKey, &str)> + '_ {
        StyleKey::ALL
            .into_iter()
            .filter_map(|key| self.get(key).map(|value| (key, value)))
    }

    pub fn is_empty(&self) -> bool {
        self.fields().next().is_none()
    }
}

impl fmt::Display for StyleHints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("no style hints");
        }
        let parts: Vec<String> = self.fields().map(|(key, value)| format!("{key}={value}")).collect();
        f.write_str(&parts.join(", "))
    }
}
