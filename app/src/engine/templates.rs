//! Built-in swing template library, one reference swing per club family.

use swingsense::{
    ClubType, MetricKind, MetricRange, MetricTolerances, PhaseExpectation, PhaseTag,
    SwingMetrics, SwingTemplate,
};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TemplateError {
    #[error("template '{0}' already exists")]
    Duplicate(String),
    #[error("template '{id}': {metric} ideal is not finite")]
    NonFiniteIdeal { id: String, metric: MetricKind },
    #[error("template '{id}': {metric} tolerance range is inverted")]
    InvertedRange { id: String, metric: MetricKind },
    #[error("template '{id}': {phase} expectation has a negative tolerance")]
    NegativeTolerance { id: String, phase: PhaseTag },
}

/// Templates are immutable once added; the library only grows.
#[derive(Debug, Clone)]
pub struct TemplateLibrary {
    templates: Vec<SwingTemplate>,
}

impl Default for TemplateLibrary {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TemplateLibrary {
    pub fn empty() -> Self {
        Self {
            templates: Vec::new(),
        }
    }

    pub fn builtin() -> Self {
        Self {
            templates: vec![driver(), fairway_wood(), hybrid(), iron(), wedge(), putter()],
        }
    }

    /// Add a custom template after checking it is well formed.
    pub fn add(&mut self, template: SwingTemplate) -> Result<(), TemplateError> {
        if self.get(&template.id).is_some() {
            return Err(TemplateError::Duplicate(template.id));
        }
        for &metric in MetricKind::ALL {
            if !metric.value(&template.ideal).is_finite() {
                return Err(TemplateError::NonFiniteIdeal {
                    id: template.id,
                    metric,
                });
            }
            if !template.tolerances.range(metric).is_ordered() {
                return Err(TemplateError::InvertedRange {
                    id: template.id,
                    metric,
                });
            }
        }
        if let Some(p) = template
            .phases
            .iter()
            .find(|p| p.duration_tolerance < 0.0 || p.acceleration_tolerance < 0.0)
        {
            return Err(TemplateError::NegativeTolerance {
                id: template.id,
                phase: p.tag,
            });
        }
        tracing::info!("templates: added '{}' ({})", template.id, template.club);
        self.templates.push(template);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&SwingTemplate> {
        self.templates.iter().find(|t| t.id == id)
    }

    pub fn for_club(&self, club: ClubType) -> impl Iterator<Item = &SwingTemplate> {
        self.templates.iter().filter(move |t| t.club == club)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SwingTemplate> {
        self.templates.iter()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Built-ins
// ---------------------------------------------------------------------------

/// Half-widths per metric, in `MetricKind::ALL` order.
fn tolerances(ideal: &SwingMetrics, half: [f64; 8]) -> MetricTolerances {
    let r = |kind: MetricKind, i: usize| MetricRange::around(kind.value(ideal), half[i]);
    MetricTolerances {
        max_speed: r(MetricKind::MaxSpeed, 0),
        backswing_angle: r(MetricKind::BackswingAngle, 1),
        downswing_angle: r(MetricKind::DownswingAngle, 2),
        impact_timing: r(MetricKind::ImpactTiming, 3),
        follow_through_angle: r(MetricKind::FollowThroughAngle, 4),
        swing_tempo: r(MetricKind::SwingTempo, 5),
        swing_plane: r(MetricKind::SwingPlane, 6),
        clubhead_speed: r(MetricKind::ClubheadSpeed, 7),
    }
}

fn phase(
    tag: PhaseTag,
    duration: f64,
    duration_tolerance: f64,
    acceleration: f64,
    acceleration_tolerance: f64,
    critical: bool,
) -> PhaseExpectation {
    PhaseExpectation {
        tag,
        duration,
        duration_tolerance,
        acceleration,
        acceleration_tolerance,
        critical,
    }
}

/// Full-swing phase shape shared by the long clubs, scaled per club.
fn full_swing_phases(backswing: f64, downswing: f64, peak: f64) -> Vec<PhaseExpectation> {
    vec![
        phase(PhaseTag::Address, 400.0, 300.0, 0.5, 1.0, false),
        phase(PhaseTag::Backswing, backswing, backswing * 0.25, peak * 0.4, peak * 0.25, false),
        phase(PhaseTag::Downswing, downswing, downswing * 0.25, peak, peak * 0.25, true),
        phase(PhaseTag::Impact, 40.0, 25.0, peak * 0.9, peak * 0.4, true),
        phase(PhaseTag::FollowThrough, 600.0, 250.0, peak * 0.5, peak * 0.3, false),
    ]
}

fn driver() -> SwingTemplate {
    let ideal = SwingMetrics {
        max_speed: 22.0,
        backswing_angle: 270.0,
        downswing_angle: 230.0,
        impact_timing: 230.0,
        follow_through_angle: 200.0,
        swing_tempo: 3.0,
        swing_plane: 45.0,
        clubhead_speed: 105.0,
    };
    SwingTemplate {
        id: "driver".into(),
        name: "Driver".into(),
        club: ClubType::Driver,
        tolerances: tolerances(&ideal, [5.0, 30.0, 30.0, 50.0, 30.0, 0.5, 8.0, 15.0]),
        phases: full_swing_phases(690.0, 230.0, 22.0),
        ideal,
    }
}

fn fairway_wood() -> SwingTemplate {
    let ideal = SwingMetrics {
        max_speed: 19.0,
        backswing_angle: 255.0,
        downswing_angle: 215.0,
        impact_timing: 240.0,
        follow_through_angle: 190.0,
        swing_tempo: 2.9,
        swing_plane: 50.0,
        clubhead_speed: 95.0,
    };
    SwingTemplate {
        id: "fairway_wood".into(),
        name: "Fairway wood".into(),
        club: ClubType::FairwayWood,
        tolerances: tolerances(&ideal, [4.5, 30.0, 30.0, 50.0, 30.0, 0.45, 8.0, 13.0]),
        phases: full_swing_phases(696.0, 240.0, 19.0),
        ideal,
    }
}

fn hybrid() -> SwingTemplate {
    let ideal = SwingMetrics {
        max_speed: 18.0,
        backswing_angle: 250.0,
        downswing_angle: 210.0,
        impact_timing: 245.0,
        follow_through_angle: 185.0,
        swing_tempo: 2.9,
        swing_plane: 52.0,
        clubhead_speed: 90.0,
    };
    SwingTemplate {
        id: "hybrid".into(),
        name: "Hybrid".into(),
        club: ClubType::Hybrid,
        tolerances: tolerances(&ideal, [4.0, 30.0, 30.0, 50.0, 30.0, 0.45, 8.0, 12.0]),
        phases: full_swing_phases(710.0, 245.0, 18.0),
        ideal,
    }
}

fn iron() -> SwingTemplate {
    let ideal = SwingMetrics {
        max_speed: 16.0,
        backswing_angle: 240.0,
        downswing_angle: 200.0,
        impact_timing: 250.0,
        follow_through_angle: 180.0,
        swing_tempo: 2.8,
        swing_plane: 55.0,
        clubhead_speed: 85.0,
    };
    SwingTemplate {
        id: "iron".into(),
        name: "Iron".into(),
        club: ClubType::Iron,
        tolerances: tolerances(&ideal, [4.0, 30.0, 30.0, 50.0, 30.0, 0.4, 8.0, 12.0]),
        phases: full_swing_phases(700.0, 250.0, 16.0),
        ideal,
    }
}

fn wedge() -> SwingTemplate {
    let ideal = SwingMetrics {
        max_speed: 12.0,
        backswing_angle: 180.0,
        downswing_angle: 160.0,
        impact_timing: 280.0,
        follow_through_angle: 140.0,
        swing_tempo: 2.5,
        swing_plane: 60.0,
        clubhead_speed: 70.0,
    };
    SwingTemplate {
        id: "wedge".into(),
        name: "Wedge".into(),
        club: ClubType::Wedge,
        tolerances: tolerances(&ideal, [3.0, 30.0, 25.0, 60.0, 30.0, 0.4, 8.0, 10.0]),
        phases: full_swing_phases(700.0, 280.0, 12.0),
        ideal,
    }
}

fn putter() -> SwingTemplate {
    let ideal = SwingMetrics {
        max_speed: 3.0,
        backswing_angle: 30.0,
        downswing_angle: 30.0,
        impact_timing: 400.0,
        follow_through_angle: 30.0,
        swing_tempo: 2.0,
        swing_plane: 80.0,
        clubhead_speed: 25.0,
    };
    SwingTemplate {
        id: "putter".into(),
        name: "Putter".into(),
        club: ClubType::Putter,
        tolerances: tolerances(&ideal, [1.5, 15.0, 15.0, 100.0, 15.0, 0.4, 6.0, 10.0]),
        phases: vec![
            phase(PhaseTag::Address, 600.0, 400.0, 0.2, 0.5, false),
            phase(PhaseTag::Backswing, 800.0, 200.0, 1.5, 1.0, false),
            phase(PhaseTag::Downswing, 400.0, 100.0, 3.0, 1.0, true),
            phase(PhaseTag::Impact, 30.0, 20.0, 2.5, 1.5, true),
            phase(PhaseTag::FollowThrough, 500.0, 200.0, 1.5, 1.0, false),
        ],
        ideal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_covers_every_club_family() {
        let lib = TemplateLibrary::builtin();
        for &club in ClubType::ALL {
            assert_eq!(lib.for_club(club).count(), 1, "{club}");
        }
    }

    #[test]
    fn test_builtin_ranges_contain_ideal() {
        for t in TemplateLibrary::builtin().iter() {
            for &kind in MetricKind::ALL {
                let r = t.tolerances.range(kind);
                assert!(r.is_ordered());
                assert!(r.contains(kind.value(&t.ideal)), "{} {kind}", t.id);
            }
        }
    }

    #[test]
    fn test_iron_tempo_matches_expected_phases() {
        let iron = TemplateLibrary::builtin().get("iron").cloned().unwrap();
        let duration = |tag| iron.phases.iter().find(|p| p.tag == tag).unwrap().duration;
        let tempo = duration(PhaseTag::Backswing) / duration(PhaseTag::Downswing);
        assert!((tempo - iron.ideal.swing_tempo).abs() < 1e-9);
    }

    #[test]
    fn test_add_rejects_duplicate_id() {
        let mut lib = TemplateLibrary::builtin();
        let err = lib.add(iron()).unwrap_err();
        assert_eq!(err, TemplateError::Duplicate("iron".into()));
    }

    #[test]
    fn test_add_rejects_bad_ranges() {
        let mut lib = TemplateLibrary::empty();
        let mut t = iron();
        t.id = "custom".into();
        t.tolerances.swing_tempo = MetricRange { min: 3.0, max: 2.0 };
        assert!(matches!(
            lib.add(t),
            Err(TemplateError::InvertedRange {
                metric: MetricKind::SwingTempo,
                ..
            })
        ));

        let mut t = iron();
        t.id = "custom".into();
        t.ideal.max_speed = f64::NAN;
        assert!(matches!(lib.add(t), Err(TemplateError::NonFiniteIdeal { .. })));
        assert!(lib.is_empty());
    }

    #[test]
    fn test_add_custom_template() {
        let mut lib = TemplateLibrary::builtin();
        let mut t = iron();
        t.id = "my_7i".into();
        t.name = "My 7 iron".into();
        lib.add(t).unwrap();
        assert_eq!(lib.len(), 7);
        assert_eq!(lib.for_club(ClubType::Iron).count(), 2);
    }
}
