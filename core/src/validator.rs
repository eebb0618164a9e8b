//! C3: ChangeValidator, pre-write scope, design-system, and interface
//! compatibility checks. Runs before any write; never mutates anything.

use std::collections::BTreeSet;
use std::path::Path;

use regex::Regex;
use tracing::instrument;

use crate::config::{Constraints, DesignSystemConfig};
use crate::error::{Error, Result};
use crate::model::{InterfaceViolationKind, ValidationResult};
use crate::paths::Paths;

/// Impact score at or above which a change is treated as "high impact" for
/// the interface-compatibility caller search. The corpus gives no numeric
/// threshold for `impact=high`; 7 is the cutoff used consistently with
/// `Recommendation`'s 1-10 scale (top 40%).
pub const HIGH_IMPACT_THRESHOLD: u8 = 7;

pub struct ChangeValidator {
    constraints: Constraints,
    design_system: DesignSystemConfig,
    paths: Paths,
}

impl ChangeValidator {
    pub fn new(constraints: Constraints, design_system: DesignSystemConfig, paths: Paths) -> Self {
        Self {
            constraints,
            design_system,
            paths,
        }
    }

    /// Check (a): line-delta/growth/effort caps plus import/export
    /// preservation.
    #[instrument(skip(self, original, modified))]
    pub fn validate_scope(&self, original: &str, modified: &str, effort: u8) -> ValidationResult {
        let mut result = ValidationResult::ok();

        let original_lines = effective_line_count(original);
        let modified_lines = effective_line_count(modified);
        let line_delta = modified_lines as i64 - original_lines as i64;
        result.line_delta = line_delta;

        let growth_percent = if original_lines == 0 {
            if modified_lines == 0 {
                0.0
            } else {
                100.0
            }
        } else {
            (modified_lines as f64 - original_lines as f64) / original_lines as f64 * 100.0
        };
        result.growth_percent = growth_percent;

        let abs_delta = line_delta.unsigned_abs() as u32;
        if abs_delta > self.constraints.max_line_delta {
            result.push_violation(crate::model::ValidationViolation::scope(format!(
                "line delta {abs_delta} exceeds maxLineDelta {}",
                self.constraints.max_line_delta
            )));
        }

        let growth_cap = self.constraints.growth_cap_percent(original_lines);
        if growth_percent > growth_cap {
            result.push_violation(crate::model::ValidationViolation::scope(format!(
                "growth {growth_percent:.1}% exceeds size-scaled cap {growth_cap:.1}%"
            )));
        }

        let effort_cap = self.constraints.effort_limits.cap_for_effort(effort);
        if abs_delta > effort_cap {
            result.push_violation(crate::model::ValidationViolation::scope(format!(
                "effort-limit: delta {abs_delta} exceeds cap {effort_cap} for effort {effort}"
            )));
        }

        let original_imports = extract_imports(original);
        let modified_imports = extract_imports(modified);
        result.imports_changed = original_imports != modified_imports;
        if self.constraints.preserve_imports && !original_imports.is_subset(&modified_imports) {
            result.push_violation(crate::model::ValidationViolation::scope(
                "imports shrank: an import present in the original is missing from the modified file",
            ));
        }

        let original_exports = extract_exports(original);
        let modified_exports = extract_exports(modified);
        result.exports_changed = original_exports != modified_exports;
        if self.constraints.preserve_exports && original_exports != modified_exports {
            result.push_violation(crate::model::ValidationViolation::scope(
                "top-level exported symbol set changed",
            ));
        }

        result
    }

    /// Check (b): no newly introduced deny-listed class tokens.
    #[instrument(skip(self, original, modified))]
    pub fn validate_design_system(&self, original: &str, modified: &str) -> ValidationResult {
        let mut result = ValidationResult::ok();
        if self.design_system.deny.is_empty() {
            return result;
        }

        let original_tokens = class_tokens(original);
        for (line_no, line) in modified.lines().enumerate() {
            for token in class_tokens(line) {
                if self.design_system.deny.iter().any(|d| d == &token)
                    && !original_tokens.contains(&token)
                {
                    result.push_violation(crate::model::ValidationViolation::design_system(
                        format!("deny-listed design token introduced: {token}"),
                        token.clone(),
                        line_no + 1,
                    ));
                }
            }
        }
        result
    }

    /// Check (c): interface compatibility, with a project-wide caller
    /// search for high-impact changes.
    #[instrument(skip(self, original, modified))]
    pub async fn validate_interface(
        &self,
        component_name: &str,
        original: &str,
        modified: &str,
        impact: u8,
    ) -> Result<ValidationResult> {
        let mut result = ValidationResult::ok();

        let original_props = extract_props(original);
        let modified_props = extract_props(modified);

        let mut any_violation = false;
        for (name, original_prop) in &original_props {
            match modified_props.get(name) {
                None if !original_prop.optional => {
                    any_violation = true;
                    result.push_violation(crate::model::ValidationViolation::interface(
                        format!("required prop `{name}` was removed"),
                        InterfaceViolationKind::PropRemovedRequired,
                    ));
                }
                Some(modified_prop) if modified_prop.type_name != original_prop.type_name => {
                    any_violation = true;
                    result.push_violation(crate::model::ValidationViolation::interface(
                        format!(
                            "prop `{name}` type changed from `{}` to `{}`",
                            original_prop.type_name, modified_prop.type_name
                        ),
                        InterfaceViolationKind::PropTypeChanged,
                    ));
                }
                _ => {}
            }
        }

        let original_exports = extract_exports(original);
        let modified_exports = extract_exports(modified);
        if original_exports != modified_exports {
            any_violation = true;
            result.push_violation(crate::model::ValidationViolation::interface(
                "exported symbol shape changed",
                InterfaceViolationKind::ExportShapeChanged,
            ));
        }

        if any_violation && impact >= HIGH_IMPACT_THRESHOLD {
            let callers = self.find_callers(component_name).await?;
            if !callers.is_empty() {
                result.valid = false;
                result.push_violation(crate::model::ValidationViolation::interface(
                    format!(
                        "high-impact interface change with {} referencing file(s) ({}): update callers or preserve the prop",
                        callers.len(),
                        callers.join(", ")
                    ),
                    InterfaceViolationKind::PropRemovedRequired,
                ));
            }
        }

        Ok(result)
    }

    /// Run all three checks and merge into one result.
    pub async fn validate(
        &self,
        component_name: &str,
        original: &str,
        modified: &str,
        effort: u8,
        impact: u8,
    ) -> Result<ValidationResult> {
        let result = self.validate_scope(original, modified, effort);
        let result = result.merge(self.validate_design_system(original, modified));
        let result = result.merge(
            self.validate_interface(component_name, original, modified, impact)
                .await?,
        );
        Ok(result)
    }

    async fn find_callers(&self, component_name: &str) -> Result<Vec<String>> {
        let root = self.paths.root().to_path_buf();
        let needle = component_name.to_string();
        tokio::task::spawn_blocking(move || grep_for_component(&root, &needle))
            .await
            .map_err(|e| Error::ValidatorIO(e.to_string()))?
    }
}

fn grep_for_component(root: &Path, component_name: &str) -> Result<Vec<String>> {
    let mut hits = Vec::new();
    for entry in walkdir::WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| !is_excluded(e.path()))
    {
        let entry = entry.map_err(|e| Error::ValidatorIO(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_source = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| matches!(e, "ts" | "tsx" | "js" | "jsx"))
            .unwrap_or(false);
        if !is_source {
            continue;
        }
        let content = match std::fs::read_to_string(entry.path()) {
            Ok(c) => c,
            Err(_) => continue,
        };
        if content.contains(component_name) {
            hits.push(entry.path().display().to_string());
        }
    }
    Ok(hits)
}

fn is_excluded(path: &Path) -> bool {
    path.components().any(|c| {
        matches!(
            c.as_os_str().to_str(),
            Some("node_modules") | Some("target") | Some("dist") | Some("build") | Some(".git")
        )
    })
}

/// Lines that aren't blank and aren't wholly a `//` or `/* ... */` comment.
fn effective_line_count(content: &str) -> usize {
    content
        .lines()
        .filter(|l| {
            let trimmed = l.trim();
            !trimmed.is_empty() && !trimmed.starts_with("//") && !trimmed.starts_with("/*")
                && !trimmed.starts_with('*')
        })
        .count()
}

fn extract_imports(content: &str) -> BTreeSet<String> {
    let re = Regex::new(r#"(?m)^\s*import\s.*?from\s+['"]([^'"]+)['"]"#).unwrap();
    re.captures_iter(content)
        .map(|c| c[1].to_string())
        .collect()
}

/// Names introduced by `export` statements: named, default, and re-exports.
fn extract_exports(content: &str) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    let named = Regex::new(
        r"(?m)^\s*export\s+(?:default\s+)?(?:const|function|class|interface|type|enum)\s+(\w+)",
    )
    .unwrap();
    for c in named.captures_iter(content) {
        names.insert(c[1].to_string());
    }
    let braced = Regex::new(r"(?m)^\s*export\s*\{([^}]+)\}").unwrap();
    for c in braced.captures_iter(content) {
        for item in c[1].split(',') {
            let name = item.split(" as ").next().unwrap_or(item).trim();
            if !name.is_empty() {
                names.insert(name.to_string());
            }
        }
    }
    if Regex::new(r"(?m)^\s*export\s+default\s+function\s*\(")
        .unwrap()
        .is_match(content)
    {
        names.insert("default".to_string());
    }
    names
}

struct PropSignature {
    type_name: String,
    optional: bool,
}

/// Parse a `Props`/`*Props` interface or type-literal body into
/// `name -> (type, optional)`. Best-effort, line-oriented; does not
/// handle nested generics spanning multiple lines.
fn extract_props(content: &str) -> std::collections::BTreeMap<String, PropSignature> {
    let mut props = std::collections::BTreeMap::new();
    let iface_re =
        Regex::new(r"(?s)(?:interface|type)\s+\w*Props\w*\s*(?:=\s*)?\{([^}]*)\}").unwrap();
    let field_re = Regex::new(r"(?m)^\s*(\w+)(\??)\s*:\s*([^;,\n]+)").unwrap();

    if let Some(caps) = iface_re.captures(content) {
        let body = &caps[1];
        for field in field_re.captures_iter(body) {
            let name = field[1].to_string();
            let optional = &field[2] == "?";
            let type_name = field[3].trim().to_string();
            props.insert(name, PropSignature { type_name, optional });
        }
    }
    props
}

/// All `class="..."`/`className="..."` tokens across a blob of content.
fn class_tokens(content: &str) -> BTreeSet<String> {
    let attr_re = Regex::new(r#"class(?:Name)?\s*=\s*"([^"]*)""#).unwrap();
    let mut tokens = BTreeSet::new();
    for caps in attr_re.captures_iter(content) {
        for token in caps[1].split_whitespace() {
            tokens.insert(token.to_string());
        }
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Constraints, DesignSystemConfig};

    fn validator() -> ChangeValidator {
        ChangeValidator::new(
            Constraints::default(),
            DesignSystemConfig::default(),
            Paths::new("/project"),
        )
    }

    #[test]
    fn small_class_swap_passes_scope() {
        let v = validator();
        let original = "export function Header() {\n  return <button class=\"px-2 py-1\">Go</button>;\n}\n";
        let modified = "export function Header() {\n  return <button class=\"px-2 py-1 bg-blue-600\">Go</button>;\n}\n";
        let result = v.validate_scope(original, modified, 1);
        assert!(result.valid);
    }

    #[test]
    fn oversized_growth_is_rejected() {
        let v = validator();
        let mut original = "export function Big() {\n".to_string();
        for i in 0..100 {
            original.push_str(&format!("  const x{i} = {i};\n"));
        }
        original.push_str("  return null;\n}\n");

        let mut modified = original.clone();
        for i in 0..60 {
            modified.push_str(&format!("  const y{i} = {i};\n"));
        }

        let result = v.validate_scope(&original, &modified, 5);
        assert!(!result.valid);
        assert!(result
            .violations
            .iter()
            .any(|v| v.message.contains("growth")));
    }

    #[test]
    fn effort_limit_rejects_oversized_delta_for_low_effort() {
        let v = validator();
        let original = "export function Small() {\n  return null;\n}\n";
        let mut modified = "export function Small() {\n".to_string();
        for i in 0..25 {
            modified.push_str(&format!("  const a{i} = {i};\n"));
        }
        modified.push_str("  return null;\n}\n");

        let result = v.validate_scope(original, modified, 2);
        assert!(!result.valid);
        assert!(result
            .violations
            .iter()
            .any(|v| v.message.contains("effort-limit")));
    }

    #[test]
    fn shrinking_imports_is_rejected() {
        let v = validator();
        let original = "import { useState, useEffect } from 'react';\nexport function A() {}\n";
        let modified = "import { useState } from 'react';\nexport function A() {}\n";
        let result = v.validate_scope(original, modified, 1);
        assert!(!result.valid);
    }

    #[test]
    fn changed_exports_are_rejected() {
        let v = validator();
        let original = "export function A() {}\n";
        let modified = "export function B() {}\n";
        let result = v.validate_scope(original, modified, 1);
        assert!(!result.valid);
        assert!(result.exports_changed);
    }

    #[test]
    fn deny_listed_token_is_rejected() {
        let design_system = DesignSystemConfig {
            allow: vec![],
            deny: vec!["bg-red-500".to_string()],
        };
        let v = ChangeValidator::new(Constraints::default(), design_system, Paths::new("/project"));
        let original = "<div class=\"p-2\">X</div>\n";
        let modified = "<div class=\"p-2 bg-red-500\">X</div>\n";
        let result = v.validate_design_system(original, modified);
        assert!(!result.valid);
        assert_eq!(result.violations[0].token.as_deref(), Some("bg-red-500"));
    }

    #[test]
    fn preexisting_deny_token_is_not_flagged() {
        let design_system = DesignSystemConfig {
            allow: vec![],
            deny: vec!["bg-red-500".to_string()],
        };
        let v = ChangeValidator::new(Constraints::default(), design_system, Paths::new("/project"));
        let original = "<div class=\"p-2 bg-red-500\">X</div>\n";
        let modified = "<div class=\"p-2 bg-red-500\">Y</div>\n";
        let result = v.validate_design_system(original, modified);
        assert!(result.valid);
    }

    #[tokio::test]
    async fn removed_required_prop_without_callers_is_a_soft_violation() {
        let dir = tempfile::tempdir().unwrap();
        let v = ChangeValidator::new(
            Constraints::default(),
            DesignSystemConfig::default(),
            Paths::new(dir.path()),
        );
        let original = "interface ButtonProps {\n  label: string;\n  onClick: () => void;\n}\n";
        let modified = "interface ButtonProps {\n  label: string;\n}\n";
        let result = v
            .validate_interface("Button", original, modified, 3)
            .await
            .unwrap();
        assert!(!result.violations.is_empty());
    }

    #[tokio::test]
    async fn high_impact_change_with_callers_is_hard_rejected() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(
            dir.path().join("App.tsx"),
            "import { Button } from './Button';\nexport function App() { return <Button onClick={x} label=\"go\" />; }\n",
        )
        .await
        .unwrap();

        let v = ChangeValidator::new(
            Constraints::default(),
            DesignSystemConfig::default(),
            Paths::new(dir.path()),
        );
        let original = "interface ButtonProps {\n  label: string;\n  onClick: () => void;\n}\n";
        let modified = "interface ButtonProps {\n  label: string;\n}\n";
        let result = v
            .validate_interface("Button", original, modified, 8)
            .await
            .unwrap();
        assert!(!result.valid);
    }
}
