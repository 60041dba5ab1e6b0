//! Section presentation types and per-id override rules.

use crate::color::Color;
use serde::{Deserialize, Serialize};

/// Horizontal alignment of a section's value inside its width
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Align {
    #[serde(rename = "left")]
    #[default]
    Left,
    #[serde(rename = "right")]
    Right,
    #[serde(rename = "center")]
    Center,
}

impl Align {
    pub fn as_str(&self) -> &'static str {
        match self {
            Align::Left => "left",
            Align::Right => "right",
            Align::Center => "center",
        }
    }
}

/// Health of the data a section is showing.
///
/// Urgency is orthogonal and carried separately on the section.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum State {
    #[serde(rename = "none")]
    #[default]
    NoState,
    #[serde(rename = "unavailable")]
    Unavailable,
    #[serde(rename = "bad")]
    Bad,
    #[serde(rename = "average")]
    Average,
    #[serde(rename = "good")]
    Good,
}

impl State {
    pub fn as_str(&self) -> &'static str {
        match self {
            State::NoState => "none",
            State::Unavailable => "unavailable",
            State::Bad => "bad",
            State::Average => "average",
            State::Good => "good",
        }
    }
}

/// User override for one section id (or bare name), applied at insertion
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SectionOverride {
    /// Never insert this section
    #[serde(default)]
    pub disable: bool,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub label_colour: Option<Color>,
    #[serde(default)]
    pub align: Option<Align>,
    /// Positive: fixed width. Negative: maximum width, shrink to fit.
    #[serde(default)]
    pub max_width: Option<i64>,
}
