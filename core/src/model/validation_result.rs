//! `ValidationResult` and violation kinds.

use serde::{Deserialize, Serialize};

/// Which of the three ChangeValidator checks produced a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationKind {
    Scope,
    DesignSystem,
    Interface,
}

/// Interface-compatibility sub-violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InterfaceViolationKind {
    PropRemovedRequired,
    PropTypeChanged,
    ExportShapeChanged,
}

/// A single violation found by one of the three checks, tagged with the
/// check kind and a human-readable message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationViolation {
    pub kind: ValidationKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface_kind: Option<InterfaceViolationKind>,
}

impl ValidationViolation {
    pub fn scope(message: impl Into<String>) -> Self {
        Self {
            kind: ValidationKind::Scope,
            message: message.into(),
            token: None,
            line: None,
            interface_kind: None,
        }
    }

    pub fn design_system(message: impl Into<String>, token: impl Into<String>, line: usize) -> Self {
        Self {
            kind: ValidationKind::DesignSystem,
            message: message.into(),
            token: Some(token.into()),
            line: Some(line),
            interface_kind: None,
        }
    }

    pub fn interface(message: impl Into<String>, kind: InterfaceViolationKind) -> Self {
        Self {
            kind: ValidationKind::Interface,
            message: message.into(),
            token: None,
            line: None,
            interface_kind: Some(kind),
        }
    }
}

/// Boolean outcome + violations + structural deltas, for one (original,
/// modified) file pair. Always returned whole.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub violations: Vec<ValidationViolation>,
    pub line_delta: i64,
    pub growth_percent: f64,
    pub exports_changed: bool,
    pub imports_changed: bool,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            valid: true,
            ..Self::default()
        }
    }

    pub fn push_violation(&mut self, violation: ValidationViolation) {
        self.violations.push(violation);
        self.valid = false;
    }

    /// Combine with another check's result. Structural deltas
    /// (`line_delta`, `growth_percent`) are only ever produced by the scope
    /// check, so the accumulator (`self`) keeps whichever it already has;
    /// only violations and the changed-flags are unioned in.
    pub fn merge(mut self, other: Self) -> Self {
        self.violations.extend(other.violations);
        self.valid &= other.valid;
        self.exports_changed |= other.exports_changed;
        self.imports_changed |= other.imports_changed;
        self
    }
}
