//! Explicit configuration value threaded through every constructor.
//!
//! `Config` is loaded once, from TOML via `toml` + `serde`, and passed by
//! reference from then on. Nothing in this crate mutates it at runtime;
//! there is no global configuration singleton to reach for.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::model::Dimension;

/// Screenshot capture parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenshotConfig {
    pub width: u32,
    pub height: u32,
    pub full_page: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
}

impl Default for ScreenshotConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 800,
            full_page: false,
            selector: None,
        }
    }
}

/// Vision/metrics composite weights, must sum to 1.0.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub vision: f64,
    pub metrics: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            vision: 0.6,
            metrics: 0.4,
        }
    }
}

impl ScoringWeights {
    pub fn validate(&self) -> Result<()> {
        if (self.vision + self.metrics - 1.0).abs() > 1e-6 {
            return Err(Error::Config(format!(
                "scoringWeights must sum to 1.0, got vision={} + metrics={} = {}",
                self.vision,
                self.metrics,
                self.vision + self.metrics
            )));
        }
        Ok(())
    }
}

/// Per-effort-tier line-delta caps.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct EffortLimits {
    pub low: u32,
    pub medium: u32,
    pub high: u32,
}

impl Default for EffortLimits {
    fn default() -> Self {
        Self {
            low: 10,
            medium: 25,
            high: 50,
        }
    }
}

impl EffortLimits {
    /// effort 1-2 -> low, 3-4 -> medium, >=5 -> high.
    pub fn cap_for_effort(&self, effort: u8) -> u32 {
        match effort {
            0..=2 => self.low,
            3..=4 => self.medium,
            _ => self.high,
        }
    }
}

/// ChangeValidator scope thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Constraints {
    pub max_line_delta: u32,
    pub max_growth_percent: f64,
    pub preserve_exports: bool,
    pub preserve_imports: bool,
    pub effort_limits: EffortLimits,
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            max_line_delta: 100,
            max_growth_percent: 100.0,
            preserve_exports: true,
            preserve_imports: true,
            effort_limits: EffortLimits::default(),
        }
    }
}

impl Constraints {
    /// Size-scaled growth cap: <=30 lines -> 100%, <50 -> 75%, <100 -> 50%,
    /// >=100 -> 30%.
    pub fn growth_cap_percent(&self, original_lines: usize) -> f64 {
        match original_lines {
            0..=30 => 100.0,
            31..=49 => 75.0,
            50..=99 => 50.0,
            _ => 30.0,
        }
    }
}

/// Design-system allow/deny class token lists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DesignSystemConfig {
    pub allow: Vec<String>,
    pub deny: Vec<String>,
}

/// Human-in-the-loop approval policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApprovalPolicy {
    Always,
    FirstIteration,
    HighRisk,
    Never,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApprovalConfig {
    pub policy: ApprovalPolicy,
    pub cost_threshold_cents: u32,
    pub risk_threshold: f64,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            policy: ApprovalPolicy::FirstIteration,
            cost_threshold_cents: 50,
            risk_threshold: 35.0,
        }
    }
}

/// Plateau-detection window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PlateauConfig {
    pub window_iterations: u32,
    pub epsilon: f64,
}

impl Default for PlateauConfig {
    fn default() -> Self {
        Self {
            window_iterations: 3,
            epsilon: 0.1,
        }
    }
}

/// Per-call timeouts for every external adapter, in seconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub screenshot_secs: u64,
    pub vision_secs: u64,
    pub discovery_secs: u64,
    pub execution_secs: u64,
    pub build_secs: u64,
    pub metrics_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            screenshot_secs: 30,
            vision_secs: 120,
            discovery_secs: 120,
            execution_secs: 30,
            build_secs: 300,
            metrics_secs: 60,
        }
    }
}

impl TimeoutConfig {
    pub fn screenshot(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.screenshot_secs)
    }

    pub fn vision(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.vision_secs)
    }

    pub fn discovery(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.discovery_secs)
    }

    pub fn execution(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.execution_secs)
    }

    pub fn build(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.build_secs)
    }

    pub fn metrics(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.metrics_secs)
    }
}

/// Match strategy for `MemoryStore::was_attempted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchStrategy {
    IdEquality,
    FuzzyTitle,
}

/// The full, explicit, immutable configuration value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub project_path: PathBuf,
    pub frontend_url: String,
    pub target_score: f64,
    pub max_iterations: u32,
    pub screenshot: ScreenshotConfig,
    pub scoring_weights: ScoringWeights,
    pub constraints: Constraints,
    pub design_system: DesignSystemConfig,
    pub approval: ApprovalConfig,
    pub output_dir: PathBuf,
    pub plateau: PlateauConfig,
    pub timeouts: TimeoutConfig,
    pub match_strategy: MatchStrategy,
    pub recommendation_roi_threshold: f64,
    pub line_fallback_radius: usize,
    pub regression_threshold: f64,
    pub candidate_extensions: Vec<String>,
    pub max_candidate_file_bytes: u64,
    pub build_command: Vec<String>,
    pub concurrency_cap: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project_path: PathBuf::from("."),
            frontend_url: "http://localhost:3000".to_string(),
            target_score: 8.5,
            max_iterations: 5,
            screenshot: ScreenshotConfig::default(),
            scoring_weights: ScoringWeights::default(),
            constraints: Constraints::default(),
            design_system: DesignSystemConfig::default(),
            approval: ApprovalConfig::default(),
            output_dir: PathBuf::from("viztrtr-output"),
            plateau: PlateauConfig::default(),
            timeouts: TimeoutConfig::default(),
            match_strategy: MatchStrategy::IdEquality,
            recommendation_roi_threshold: 1.5,
            line_fallback_radius: 5,
            regression_threshold: -0.5,
            candidate_extensions: vec![
                "tsx".into(),
                "jsx".into(),
                "ts".into(),
                "js".into(),
                "css".into(),
            ],
            max_candidate_file_bytes: 50 * 1024,
            build_command: vec!["npm".into(), "run".into(), "build".into()],
            concurrency_cap: None,
        }
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(s).map_err(|e| Error::Config(format!("invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.scoring_weights.validate()?;
        if !self.project_path.is_absolute() {
            return Err(Error::Config(format!(
                "projectPath must be absolute, got {}",
                self.project_path.display()
            )));
        }
        if self.max_iterations == 0 {
            return Err(Error::Config("maxIterations must be >= 1".into()));
        }
        Ok(())
    }

    /// Map a `Dimension` to a human label used in prompts/reports.
    pub fn dimension_label(dimension: Dimension) -> &'static str {
        match dimension {
            Dimension::VisualHierarchy => "Visual Hierarchy",
            Dimension::Typography => "Typography",
            Dimension::ColorContrast => "Color & Contrast",
            Dimension::Spacing => "Spacing & Layout",
            Dimension::ComponentDesign => "Component Design",
            Dimension::Animation => "Animation & Interaction",
            Dimension::Accessibility => "Accessibility",
            Dimension::Overall => "Overall",
        }
    }
}
