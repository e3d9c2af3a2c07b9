//! Scores a swing against the template library.
//!
//! overall = 60% metric score + 40% phase score. Within the phase score,
//! critical phases count twice.

use swingsense::{
    ClubType, Deviation, DeviationDirection, DeviationSeverity, MetricKind, MetricRange,
    MotionSample, PatternMatchResult, PhaseExpectation, PhaseMatch, PhaseTag, SwingMetrics,
    SwingPhase, SwingTemplate, find_phase,
};
use tracing::debug;

use super::templates::TemplateLibrary;

const METRICS_WEIGHT: f64 = 0.6;
const PHASE_WEIGHT: f64 = 0.4;
const CRITICAL_PHASE_WEIGHT: f64 = 2.0;
const METRIC_FLOOR: f64 = 80.0;
const PHASE_FLOOR: f64 = 85.0;

/// Score every template (optionally only one club family), best first.
///
/// An empty phase list or non-finite metrics still produce one zero-score
/// result per candidate so callers always get a rankable list.
pub fn match_templates(
    library: &TemplateLibrary,
    metrics: &SwingMetrics,
    phases: &[SwingPhase],
    samples: &[MotionSample],
    club_filter: Option<ClubType>,
) -> Vec<PatternMatchResult> {
    let malformed = phases.is_empty() || !metrics.is_finite();
    if malformed {
        debug!(
            "matcher: unusable window ({} phases, {} samples), scoring zero",
            phases.len(),
            samples.len()
        );
    }

    let mut results: Vec<PatternMatchResult> = library
        .iter()
        .filter(|t| club_filter.is_none_or(|c| t.club == c))
        .map(|t| {
            if malformed {
                zero_result(t)
            } else {
                score_template(t, metrics, phases)
            }
        })
        .collect();
    results.sort_by(|a, b| b.overall_match.total_cmp(&a.overall_match));
    results
}

fn zero_result(template: &SwingTemplate) -> PatternMatchResult {
    PatternMatchResult {
        template_id: template.id.clone(),
        template_name: template.name.clone(),
        club: template.club,
        overall_match: 0.0,
        metrics_match: 0.0,
        phase_match: 0.0,
        phase_matches: Vec::new(),
        deviations: Vec::new(),
        recommendations: vec!["Not enough motion was captured to compare this swing.".into()],
    }
}

/// Compare one swing against one template.
pub fn score_template(
    template: &SwingTemplate,
    metrics: &SwingMetrics,
    phases: &[SwingPhase],
) -> PatternMatchResult {
    let mut deviations = Vec::new();
    let mut metric_total = 0.0;
    for &kind in MetricKind::ALL {
        let expected = kind.value(&template.ideal);
        let actual = kind.value(metrics);
        let score = metric_score(actual, expected, template.tolerances.range(kind));
        metric_total += score;
        if score < METRIC_FLOOR {
            let direction = if actual < expected {
                DeviationDirection::TooLow
            } else {
                DeviationDirection::TooHigh
            };
            deviations.push(Deviation {
                metric: kind,
                expected,
                actual,
                score,
                severity: DeviationSeverity::from_score(score),
                direction,
                impact: impact_note(kind, direction).to_string(),
            });
        }
    }
    let metrics_match = metric_total / MetricKind::ALL.len() as f64;

    let phase_matches: Vec<PhaseMatch> = template
        .phases
        .iter()
        .map(|exp| score_phase(exp, find_phase(phases, exp.tag)))
        .collect();
    let phase_match = weighted_phase_score(&phase_matches);

    let overall_match = match phase_match {
        Some(p) => METRICS_WEIGHT * metrics_match + PHASE_WEIGHT * p,
        None => metrics_match,
    };

    deviations.sort_by(|a, b| a.score.total_cmp(&b.score));
    let recommendations = recommendations(template.club, &deviations);

    PatternMatchResult {
        template_id: template.id.clone(),
        template_name: template.name.clone(),
        club: template.club,
        overall_match: overall_match.clamp(0.0, 100.0),
        metrics_match,
        phase_match: phase_match.unwrap_or(metrics_match),
        phase_matches,
        deviations,
        recommendations,
    }
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// Piecewise metric score: 80-100 inside the tolerance range, decaying to 0
/// over one range width outside it.
pub fn metric_score(actual: f64, ideal: f64, range: MetricRange) -> f64 {
    let width = range.width();
    if width <= 0.0 {
        return if actual == ideal { 100.0 } else { 0.0 };
    }
    if range.contains(actual) {
        let half = width / 2.0;
        (100.0 - 20.0 * (actual - ideal).abs() / half).max(METRIC_FLOOR)
    } else {
        let excess = if actual < range.min {
            range.min - actual
        } else {
            actual - range.max
        };
        (METRIC_FLOOR - METRIC_FLOOR * (excess / width).min(1.0)).max(0.0)
    }
}

/// Same shape as `metric_score` around a symmetric tolerance, with an
/// 85-point line at the tolerance edge.
pub fn phase_value_score(actual: f64, expected: f64, tolerance: f64) -> f64 {
    let deviation = (actual - expected).abs();
    if tolerance <= 0.0 {
        return if deviation == 0.0 { 100.0 } else { 0.0 };
    }
    if deviation <= tolerance {
        (100.0 - (100.0 - PHASE_FLOOR) * deviation / tolerance).max(PHASE_FLOOR)
    } else {
        (PHASE_FLOOR - PHASE_FLOOR * ((deviation - tolerance) / tolerance).min(1.0)).max(0.0)
    }
}

fn score_phase(expected: &PhaseExpectation, actual: Option<&SwingPhase>) -> PhaseMatch {
    let Some(actual) = actual else {
        return PhaseMatch {
            tag: expected.tag,
            duration_score: 0.0,
            acceleration_score: 0.0,
            score: 0.0,
            within_tolerance: false,
            critical: expected.critical,
        };
    };
    let duration = actual.duration() as f64;
    let duration_score = phase_value_score(duration, expected.duration, expected.duration_tolerance);
    let acceleration_score = phase_value_score(
        actual.peak_acceleration,
        expected.acceleration,
        expected.acceleration_tolerance,
    );
    PhaseMatch {
        tag: expected.tag,
        duration_score,
        acceleration_score,
        score: (duration_score + acceleration_score) / 2.0,
        within_tolerance: (duration - expected.duration).abs() <= expected.duration_tolerance
            && (actual.peak_acceleration - expected.acceleration).abs()
                <= expected.acceleration_tolerance,
        critical: expected.critical,
    }
}

fn weighted_phase_score(matches: &[PhaseMatch]) -> Option<f64> {
    if matches.is_empty() {
        return None;
    }
    let (sum, weight) = matches.iter().fold((0.0, 0.0), |(s, w), m| {
        let weight = if m.critical { CRITICAL_PHASE_WEIGHT } else { 1.0 };
        (s + m.score * weight, w + weight)
    });
    Some(sum / weight)
}

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

fn impact_note(kind: MetricKind, direction: DeviationDirection) -> &'static str {
    use DeviationDirection::*;
    use MetricKind::*;
    match (kind, direction) {
        (MaxSpeed, TooLow) | (ClubheadSpeed, TooLow) => "Costs distance.",
        (MaxSpeed, TooHigh) | (ClubheadSpeed, TooHigh) => "Extra speed can cost control.",
        (BackswingAngle, TooLow) => "A short backswing limits power.",
        (BackswingAngle, TooHigh) => "Overswinging makes the club hard to square.",
        (DownswingAngle, TooLow) => "Incomplete rotation through the ball.",
        (DownswingAngle, TooHigh) => "Over-rotation can open the face.",
        (ImpactTiming, TooLow) => "Rushed delivery into impact.",
        (ImpactTiming, TooHigh) => "Late release loses clubhead speed.",
        (FollowThroughAngle, TooLow) => "Decelerating through impact.",
        (FollowThroughAngle, TooHigh) => "Finish is overextended.",
        (SwingTempo, TooLow) => "Quick backswing relative to the downswing.",
        (SwingTempo, TooHigh) => "Slow, hesitant backswing relative to the downswing.",
        (SwingPlane, TooLow) => "Flat plane tends to hooks and thin contact.",
        (SwingPlane, TooHigh) => "Steep plane tends to slices and heavy contact.",
    }
}

fn advice(kind: MetricKind, direction: DeviationDirection) -> String {
    use DeviationDirection::*;
    use MetricKind::*;
    let text = match (kind, direction) {
        (MaxSpeed, TooLow) | (ClubheadSpeed, TooLow) => {
            "Speed is too low: accelerate through the ball instead of at the top."
        }
        (MaxSpeed, TooHigh) | (ClubheadSpeed, TooHigh) => {
            "Speed is too high for this club: swing at 80% and focus on contact."
        }
        (BackswingAngle, TooLow) => "Backswing is too short: turn your shoulders fully.",
        (BackswingAngle, TooHigh) => "Backswing is too long: stop when your lead arm is parallel.",
        (DownswingAngle, TooLow) => "Rotation is too low: keep turning your hips through impact.",
        (DownswingAngle, TooHigh) => "Rotation is too high: let the arms catch up to the body.",
        (ImpactTiming, TooLow) => "Impact comes too early: start the downswing from the ground up.",
        (ImpactTiming, TooHigh) => "Impact comes too late: release the wrists earlier.",
        (FollowThroughAngle, TooLow) => "Follow-through is too short: finish facing the target.",
        (FollowThroughAngle, TooHigh) => "Follow-through is too long: hold a balanced finish.",
        (SwingTempo, TooLow) => "Tempo is too low: slow the takeaway down.",
        (SwingTempo, TooHigh) => "Tempo is too high: start the downswing sooner.",
        (SwingPlane, TooLow) => "Plane is too flat: feel the hands work more upright.",
        (SwingPlane, TooHigh) => "Plane is too steep: shallow the club in transition.",
    };
    text.to_string()
}

fn club_note(club: ClubType) -> &'static str {
    match club {
        ClubType::Driver => "With the driver, tee it forward and sweep up through the ball.",
        ClubType::FairwayWood => "With fairway woods, sweep the ball off the turf.",
        ClubType::Hybrid => "With hybrids, swing like an iron with a shallower divot.",
        ClubType::Iron => "With irons, hit down and take the divot after the ball.",
        ClubType::Wedge => "With wedges, control distance with swing length, not speed.",
        ClubType::Putter => "With the putter, keep the wrists quiet and rock the shoulders.",
    }
}

fn recommendations(club: ClubType, deviations: &[Deviation]) -> Vec<String> {
    let mut out: Vec<String> = deviations
        .iter()
        .map(|d| advice(d.metric, d.direction))
        .collect();
    if deviations
        .iter()
        .any(|d| d.severity == DeviationSeverity::Major)
    {
        out.push(club_note(club).to_string());
    }
    out
}
