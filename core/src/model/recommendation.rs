//! `Recommendation`: a proposed, atomic UI improvement.

use serde::{Deserialize, Serialize};

/// The eight scoring dimensions a vision adapter can critique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    VisualHierarchy,
    Typography,
    ColorContrast,
    Spacing,
    ComponentDesign,
    Animation,
    Accessibility,
    Overall,
}

/// A proposed, atomic UI change emitted by a vision adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Stable identifier, used by `MemoryStore::was_attempted`.
    pub id: String,
    pub dimension: Dimension,
    pub title: String,
    pub description: String,
    /// 1-10.
    pub impact: u8,
    /// 1-10.
    pub effort: u8,
    /// Illustrative snippet; never authoritative over a ChangePlan.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_hint: Option<String>,
    /// File or component name the recommendation targets, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

impl Recommendation {
    /// ROI = impact / effort. `effort` is guaranteed >= 1 by construction of
    /// well-formed recommendations; divide-by-zero is avoided defensively.
    pub fn roi(&self) -> f64 {
        if self.effort == 0 {
            return f64::INFINITY;
        }
        f64::from(self.impact) / f64::from(self.effort)
    }

    /// Normalized title used by fuzzy-match comparisons in
    /// `MemoryStore::was_attempted`.
    pub fn normalized_title(&self) -> String {
        self.title
            .to_lowercase()
            .chars()
            .filter(|c| c.is_alphanumeric() || c.is_whitespace())
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(impact: u8, effort: u8) -> Recommendation {
        Recommendation {
            id: "r1".into(),
            dimension: Dimension::ColorContrast,
            title: "Improve button contrast".into(),
            description: "desc".into(),
            impact,
            effort,
            code_hint: None,
            target: Some("Header.tsx".into()),
        }
    }

    #[test]
    fn roi_is_impact_over_effort() {
        assert_eq!(rec(8, 2).roi(), 4.0);
    }

    #[test]
    fn normalized_title_collapses_case_and_punctuation() {
        let mut r = rec(5, 5);
        r.title = "  Improve  Button-Contrast!! ".into();
        assert_eq!(r.normalized_title(), "improve buttoncontrast");
    }
}
