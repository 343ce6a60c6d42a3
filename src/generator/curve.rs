//! Energy curves: map set progress (0.0–1.0) to a desired energy level (1–10).

use std::collections::HashMap;
use std::f64::consts::PI;
use std::fmt;

use serde::Deserialize;

const MIN_ENERGY: f64 = 1.0;
const MAX_ENERGY: f64 = 10.0;

/// Full sine periods over a set for the `waves` shape, so the sine
/// argument is `progress * 4π`.
const WAVE_CYCLES: f64 = 2.0;
/// Peak deviation of the `waves` shape from its rising base.
const WAVE_AMPLITUDE: f64 = 1.5;

/// Curve used when a request names a curve that does not exist.
pub const FALLBACK_CURVE: &str = "linear_up";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurveShape {
    Linear,
    Constant,
    Waves,
}

impl fmt::Display for CurveShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Linear => "linear",
            Self::Constant => "constant",
            Self::Waves => "waves",
        })
    }
}

/// A named energy profile.
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyCurve {
    pub name: String,
    pub start: f64,
    pub finish: f64,
    pub shape: CurveShape,
}

impl EnergyCurve {
    pub fn new(name: &str, start: f64, finish: f64, shape: CurveShape) -> Self {
        Self {
            name: name.to_string(),
            start,
            finish,
            shape,
        }
    }

    /// Desired energy at `progress` (elapsed / target duration).
    ///
    /// `progress` is not capped: the sequencer may sample slightly past 1.0 on
    /// its last step, and the linear shape extrapolates accordingly.
    pub fn desired_energy(&self, progress: f64) -> f64 {
        match self.shape {
            CurveShape::Constant => self.start,
            CurveShape::Linear => self.base(progress),
            CurveShape::Waves => {
                let wave = (progress * PI * 2.0 * WAVE_CYCLES).sin() * WAVE_AMPLITUDE;
                (self.base(progress) + wave).clamp(MIN_ENERGY, MAX_ENERGY)
            }
        }
    }

    fn base(&self, progress: f64) -> f64 {
        self.start + (self.finish - self.start) * progress
    }
}

/// Config file curve definition (deserialized from TOML).
#[derive(Debug, Deserialize, Clone)]
pub struct CustomCurveConfig {
    pub name: String,
    pub start: f64,
    pub finish: f64,
    pub shape: CurveShape,
}

/// Result of looking a curve up by name.
#[derive(Debug, Clone)]
pub struct ResolvedCurve<'a> {
    pub curve: &'a EnergyCurve,
    /// The name the caller asked for, when it was unknown and the fallback was used.
    pub unknown_name: Option<String>,
}

/// Built-in curves plus any defined in the config file.
#[derive(Debug)]
pub struct CurveRegistry {
    curves: Vec<EnergyCurve>,
    by_name: HashMap<String, usize>,
}

impl Default for CurveRegistry {
    fn default() -> Self {
        Self::new(&[])
    }
}

impl CurveRegistry {
    pub fn new(custom: &[CustomCurveConfig]) -> Self {
        let mut curves = builtin_curves();

        for c in custom {
            let name = c.name.trim().to_lowercase();
            if name.is_empty() || !c.start.is_finite() || !c.finish.is_finite() {
                log::warn!(
                    "Skipping energy curve '{}': needs a name and numeric start/finish",
                    c.name
                );
                continue;
            }
            let start = clamp_energy(&name, "start", c.start);
            let finish = clamp_energy(&name, "finish", c.finish);
            let curve = EnergyCurve::new(&name, start, finish, c.shape);
            match curves.iter_mut().find(|existing| existing.name == name) {
                Some(existing) => *existing = curve,
                None => curves.push(curve),
            }
        }

        let by_name = curves
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.clone(), i))
            .collect();

        Self { curves, by_name }
    }

    pub fn get(&self, name: &str) -> Option<&EnergyCurve> {
        self.by_name
            .get(&name.trim().to_lowercase())
            .map(|&i| &self.curves[i])
    }

    /// Look up a curve by name, falling back to `linear_up` for unknown names.
    pub fn resolve(&self, name: &str) -> ResolvedCurve<'_> {
        if let Some(curve) = self.get(name) {
            return ResolvedCurve {
                curve,
                unknown_name: None,
            };
        }

        log::warn!("Unknown energy curve '{name}', falling back to {FALLBACK_CURVE}");
        let curve = self.get(FALLBACK_CURVE).unwrap_or(&self.curves[0]);
        ResolvedCurve {
            curve,
            unknown_name: Some(name.to_string()),
        }
    }

    pub fn curves(&self) -> &[EnergyCurve] {
        &self.curves
    }
}

/// Clamp a configured curve endpoint into the energy scale.
fn clamp_energy(curve: &str, field: &str, value: f64) -> f64 {
    let clamped = value.clamp(MIN_ENERGY, MAX_ENERGY);
    if clamped != value {
        log::warn!("Energy curve '{curve}': {field} {value} is outside 1-10, using {clamped}");
    }
    clamped
}

fn builtin_curves() -> Vec<EnergyCurve> {
    vec![
        EnergyCurve::new("linear_up", 3.0, 9.0, CurveShape::Linear),
        EnergyCurve::new("constant", 6.0, 6.0, CurveShape::Constant),
        EnergyCurve::new("waves", 4.0, 8.0, CurveShape::Waves),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_constant_ignores_progress() {
        let c = EnergyCurve::new("flat", 6.0, 9.0, CurveShape::Constant);
        assert!(approx(c.desired_energy(0.0), 6.0));
        assert!(approx(c.desired_energy(0.7), 6.0));
        assert!(approx(c.desired_energy(1.2), 6.0));
    }

    #[test]
    fn test_linear_interpolates() {
        let c = EnergyCurve::new("up", 3.0, 9.0, CurveShape::Linear);
        assert!(approx(c.desired_energy(0.0), 3.0));
        assert!(approx(c.desired_energy(0.5), 6.0));
        assert!(approx(c.desired_energy(1.0), 9.0));
        // Not capped past the end of the set
        assert!(approx(c.desired_energy(1.5), 12.0));
    }

    #[test]
    fn test_waves_formula() {
        let c = EnergyCurve::new("waves", 4.0, 8.0, CurveShape::Waves);
        // sin(0) = 0
        assert!(approx(c.desired_energy(0.0), 4.0));
        // progress 0.125 → sin(π/2) = 1 → base 4.5 + 1.5
        assert!(approx(c.desired_energy(0.125), 6.0));
        // progress 0.375 → sin(3π/2) = -1 → base 5.5 - 1.5
        assert!(approx(c.desired_energy(0.375), 4.0));
        // progress 0.5 → sin(2π) ≈ 0
        assert!(approx(c.desired_energy(0.5), 6.0));
        // second period peaks again: 0.625 → sin(5π/2) = 1 → base 6.5 + 1.5
        assert!(approx(c.desired_energy(0.625), 8.0));
    }

    #[test]
    fn test_waves_is_clamped() {
        let low = EnergyCurve::new("low", 1.0, 1.0, CurveShape::Waves);
        assert!(approx(low.desired_energy(0.375), 1.0));

        let high = EnergyCurve::new("high", 10.0, 10.0, CurveShape::Waves);
        assert!(approx(high.desired_energy(0.125), 10.0));
    }

    #[test]
    fn test_registry_builtins() {
        let registry = CurveRegistry::default();
        let names: Vec<&str> = registry.curves().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["linear_up", "constant", "waves"]);
        assert_eq!(registry.get("WAVES").unwrap().shape, CurveShape::Waves);
    }

    #[test]
    fn test_unknown_curve_falls_back_to_linear() {
        let registry = CurveRegistry::default();
        let resolved = registry.resolve("rollercoaster");
        assert_eq!(resolved.curve.name, "linear_up");
        assert_eq!(resolved.curve.shape, CurveShape::Linear);
        assert_eq!(resolved.unknown_name.as_deref(), Some("rollercoaster"));

        let known = registry.resolve("constant");
        assert_eq!(known.curve.name, "constant");
        assert!(known.unknown_name.is_none());
    }

    #[test]
    fn test_custom_curve_out_of_range_is_clamped() {
        let config = crate::config::AppConfig::from_toml(
            r#"
            [[curves]]
            name = "hot"
            start = 15
            finish = 20
            shape = "constant"

            [[curves]]
            name = "dive"
            start = -4
            finish = 12
            shape = "linear"
            "#,
        )
        .unwrap();
        let registry = CurveRegistry::new(&config.curves);

        let hot = registry.resolve("hot");
        assert!(hot.unknown_name.is_none());
        assert!(approx(hot.curve.desired_energy(0.5), 10.0));

        let dive = registry.get("dive").unwrap();
        assert!(approx(dive.start, 1.0));
        assert!(approx(dive.finish, 10.0));
        for step in 0..=10 {
            let e = dive.desired_energy(step as f64 / 10.0);
            assert!((1.0..=10.0).contains(&e), "energy {e} out of range");
        }
    }

    #[test]
    fn test_custom_curve_without_numbers_is_skipped() {
        let registry = CurveRegistry::new(&[
            CustomCurveConfig {
                name: "broken".into(),
                start: f64::NAN,
                finish: 8.0,
                shape: CurveShape::Linear,
            },
            CustomCurveConfig {
                name: "  ".into(),
                start: 4.0,
                finish: 8.0,
                shape: CurveShape::Linear,
            },
        ]);

        assert_eq!(registry.curves().len(), 3);
        assert!(registry.get("broken").is_none());
        assert_eq!(registry.resolve("broken").curve.name, "linear_up");
    }

    #[test]
    fn test_custom_curve_new_and_override() {
        let registry = CurveRegistry::new(&[
            CustomCurveConfig {
                name: "Peak_Time".into(),
                start: 7.0,
                finish: 10.0,
                shape: CurveShape::Waves,
            },
            CustomCurveConfig {
                name: "constant".into(),
                start: 5.0,
                finish: 5.0,
                shape: CurveShape::Constant,
            },
        ]);

        assert_eq!(registry.curves().len(), 4);
        assert!(approx(registry.get("peak_time").unwrap().start, 7.0));
        assert!(approx(registry.get("constant").unwrap().desired_energy(0.3), 5.0));
    }
}
