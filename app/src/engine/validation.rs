//! Multi-factor swing validation.
//!
//! Five independent steps run in order: context, false-positive library,
//! historical consistency, pattern-match quality, device stability. Each
//! yields named factors; a step that fails is logged and contributes
//! nothing.

use std::collections::VecDeque;
use std::sync::Mutex;

use tracing::{debug, warn};

use super::false_positive::FalsePositiveLibrary;
use swingsense::{
    CompletedSwing, FactorSource, PatternMatchResult, ValidationConfig, ValidationContext,
    ValidationFactor, ValidationResult,
};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ValidationStepError {
    #[error("hour of day {0} is out of range")]
    InvalidHour(u8),
    #[error("swing has no samples to compare")]
    NoSamples,
    #[error("pattern match score is not finite")]
    NonFiniteMatch,
    #[error("device signal is not finite")]
    NonFiniteDevice,
}

struct Step {
    factors: Vec<ValidationFactor>,
    recommendations: Vec<String>,
}

impl Step {
    fn neutral() -> Self {
        Self {
            factors: Vec::new(),
            recommendations: Vec::new(),
        }
    }

    fn factor(
        &mut self,
        source: FactorSource,
        name: &str,
        confidence_multiplier: f64,
        risk_delta: f64,
    ) -> &mut Self {
        self.factors.push(ValidationFactor {
            source,
            name: name.into(),
            confidence_multiplier,
            confidence_delta: 0.0,
            risk_delta,
        });
        self
    }

    fn advise(&mut self, text: &str) {
        self.recommendations.push(text.into());
    }
}

pub struct ValidationEngine {
    config: ValidationConfig,
    library: FalsePositiveLibrary,
    /// Adjusted confidences of recent accepted swings, oldest first.
    history: Mutex<VecDeque<f64>>,
}

impl ValidationEngine {
    pub fn new(config: ValidationConfig) -> Self {
        Self {
            library: FalsePositiveLibrary::builtin(config.false_positive_threshold),
            history: Mutex::new(VecDeque::with_capacity(config.history_cap)),
            config,
        }
    }

    pub fn history_len(&self) -> usize {
        self.history.lock().map(|h| h.len()).unwrap_or(0)
    }

    /// Validate a detected swing. Always returns a verdict; confidence and
    /// risk are clamped to [0, 100].
    pub fn validate(
        &self,
        swing: &CompletedSwing,
        context: &ValidationContext,
        pattern: Option<&PatternMatchResult>,
    ) -> ValidationResult {
        let steps: [(&str, Result<Step, ValidationStepError>); 5] = [
            ("context", self.context_step(context)),
            ("false_positive", self.false_positive_step(swing)),
            ("history", self.history_step(swing.confidence)),
            ("pattern_match", Self::pattern_step(pattern)),
            ("device", self.device_step(context)),
        ];

        let mut confidence = swing.confidence;
        let mut risk = 0.0;
        let mut factors = Vec::new();
        let mut recommendations = Vec::new();
        for (name, step) in steps {
            match step {
                Ok(step) => {
                    for f in &step.factors {
                        confidence = confidence * f.confidence_multiplier + f.confidence_delta;
                        risk += f.risk_delta;
                    }
                    factors.extend(step.factors);
                    recommendations.extend(step.recommendations);
                }
                Err(e) => warn!("validation: {name} step skipped: {e}"),
            }
        }

        let adjusted_confidence = clamp_score(confidence);
        let false_positive_risk = clamp_score(risk);
        let is_valid = adjusted_confidence > self.config.min_valid_confidence
            && false_positive_risk < self.config.max_valid_risk;

        if adjusted_confidence > self.config.history_min_confidence {
            self.record(adjusted_confidence);
        }
        debug!(
            "validation: {} factors, confidence {:.1} -> {:.1}, risk {:.1}, valid={is_valid}",
            factors.len(),
            swing.confidence,
            adjusted_confidence,
            false_positive_risk,
        );

        ValidationResult {
            is_valid,
            adjusted_confidence,
            false_positive_risk,
            factors,
            recommendations,
        }
    }

    fn record(&self, confidence: f64) {
        let Ok(mut history) = self.history.lock() else {
            warn!("validation: history lock poisoned, entry dropped");
            return;
        };
        history.push_back(confidence);
        while history.len() > self.config.history_cap {
            history.pop_front();
        }
    }

    // -----------------------------------------------------------------------
    // Steps
    // -----------------------------------------------------------------------

    fn context_step(&self, ctx: &ValidationContext) -> Result<Step, ValidationStepError> {
        if ctx.hour_of_day > 23 {
            return Err(ValidationStepError::InvalidHour(ctx.hour_of_day));
        }
        let mut step = Step::neutral();
        if !ctx.round_active {
            step.factor(FactorSource::Context, "round_inactive", 0.7, 25.0)
                .advise("Start a round so swings are tracked in context.");
        }
        if ctx.activity.walking {
            step.factor(FactorSource::Context, "recent_walking", 0.85, 15.0);
        }
        if ctx.activity.driving {
            step.factor(FactorSource::Context, "recent_driving", 0.6, 35.0);
        }
        if ctx.activity.static_seconds >= self.config.long_static_seconds {
            step.factor(FactorSource::Context, "settled_at_address", 1.1, 0.0);
        }
        let (open, close) = self.config.typical_hours;
        if !(open..=close).contains(&ctx.hour_of_day) {
            step.factor(FactorSource::Context, "atypical_hour", 1.0, 5.0);
        }
        Ok(step)
    }

    fn false_positive_step(&self, swing: &CompletedSwing) -> Result<Step, ValidationStepError> {
        if swing.samples.is_empty() {
            return Err(ValidationStepError::NoSamples);
        }
        let mut step = Step::neutral();
        for m in self.library.evaluate(&swing.samples) {
            step.factors.push(ValidationFactor {
                source: FactorSource::FalsePositive,
                name: m.name.clone(),
                confidence_multiplier: 1.0,
                confidence_delta: -m.penalty,
                risk_delta: 0.8 * m.penalty,
            });
            step.advise(&format!(
                "Motion resembled {} ({:.0}% match).",
                m.name.replace('_', " "),
                m.strength * 100.0
            ));
        }
        Ok(step)
    }

    fn history_step(&self, confidence: f64) -> Result<Step, ValidationStepError> {
        let recent: Vec<f64> = match self.history.lock() {
            Ok(h) => h
                .iter()
                .rev()
                .take(self.config.consistency_window)
                .copied()
                .collect(),
            Err(_) => Vec::new(),
        };
        let mut step = Step::neutral();
        if recent.is_empty() {
            return Ok(step);
        }
        let mean = recent.iter().sum::<f64>() / recent.len() as f64;
        if confidence > 1.5 * mean {
            step.factor(FactorSource::History, "unusually_high_confidence", 0.9, 10.0);
        } else if confidence < 0.5 * mean {
            step.factor(FactorSource::History, "unusually_low_confidence", 0.95, 5.0);
        }
        Ok(step)
    }

    fn pattern_step(pattern: Option<&PatternMatchResult>) -> Result<Step, ValidationStepError> {
        let mut step = Step::neutral();
        let Some(pattern) = pattern else {
            return Ok(step);
        };
        if !pattern.overall_match.is_finite() {
            return Err(ValidationStepError::NonFiniteMatch);
        }
        if pattern.overall_match > 80.0 {
            step.factor(FactorSource::PatternMatch, "strong_template_match", 1.2, 0.0);
        } else if pattern.overall_match < 50.0 {
            step.factor(FactorSource::PatternMatch, "weak_template_match", 0.8, 15.0);
        }
        Ok(step)
    }

    fn device_step(&self, ctx: &ValidationContext) -> Result<Step, ValidationStepError> {
        let device = &ctx.device;
        if !device.signal_quality.is_finite() || !device.accelerometer_variance.is_finite() {
            return Err(ValidationStepError::NonFiniteDevice);
        }
        let mut step = Step::neutral();
        if device.signal_quality < self.config.min_signal_quality {
            step.factor(FactorSource::Device, "poor_signal", 0.85, 15.0)
                .advise("Sensor signal is weak; check the connection.");
        }
        if device.accelerometer_variance > self.config.max_accel_variance {
            step.factor(FactorSource::Device, "unstable_mount", 0.9, 10.0)
                .advise("Sensor is moving on its mount; tighten the strap or clip.");
        }
        Ok(step)
    }
}

fn clamp_score(v: f64) -> f64 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 100.0) }
}
