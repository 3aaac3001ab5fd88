//! Level thresholds derived from accumulated job experience.
use serde::Deserialize;

const DEFAULT_LINEAR_BASE: f64 = 50.0;
const DEFAULT_LINEAR_INCREMENT: f64 = 25.0;
const MIN_LINEAR_BASE: f64 = 0.001;

/// How much experience each level costs.
#[derive(Debug, Clone, PartialEq)]
pub enum LevelCurve {
    /// Going from level `n` to `n + 1` costs `base + increment * n`.
    Linear { base: f64, increment: f64 },
    /// Cumulative experience required for levels 1, 2, 3, ...
    Stepwise { thresholds: Vec<f64> },
}

impl Default for LevelCurve {
    fn default() -> Self {
        Self::Linear {
            base: DEFAULT_LINEAR_BASE,
            increment: DEFAULT_LINEAR_INCREMENT,
        }
    }
}

/// Raw `[leveling]` table from the settings file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RawLeveling {
    pub mode: String,
    pub base: f64,
    pub increment: f64,
    pub thresholds: Vec<f64>,
    pub max_level: Option<u32>,
}

impl Default for RawLeveling {
    fn default() -> Self {
        Self {
            mode: "linear".to_string(),
            base: DEFAULT_LINEAR_BASE,
            increment: DEFAULT_LINEAR_INCREMENT,
            thresholds: Vec::new(),
            max_level: None,
        }
    }
}

/// Level-up policy: a curve plus an optional level cap. `level_for` is the only
/// way levels are derived, so a stored level can always be recomputed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LevelPolicy {
    curve: LevelCurve,
    max_level: Option<u32>,
}

impl LevelPolicy {
    pub fn new(curve: LevelCurve, max_level: Option<u32>) -> Self {
        let curve = match curve {
            LevelCurve::Linear { base, increment } => LevelCurve::Linear {
                base: sanitise(base, DEFAULT_LINEAR_BASE).max(MIN_LINEAR_BASE),
                increment: sanitise(increment, 0.0).max(0.0),
            },
            LevelCurve::Stepwise { mut thresholds } => {
                thresholds.retain(|value| value.is_finite() && *value > 0.0);
                thresholds.sort_by(f64::total_cmp);
                thresholds.dedup();
                LevelCurve::Stepwise { thresholds }
            }
        };
        Self { curve, max_level }
    }

    pub fn curve(&self) -> &LevelCurve {
        &self.curve
    }

    pub fn max_level(&self) -> Option<u32> {
        self.max_level
    }

    /// Cumulative experience needed to reach `level`, or `None` when unreachable.
    pub fn experience_for_level(&self, level: u32) -> Option<f64> {
        if self.max_level.is_some_and(|max| level > max) {
            return None;
        }
        match &self.curve {
            LevelCurve::Linear { base, increment } => {
                let n = f64::from(level);
                Some(base * n + increment * n * (n - 1.0) / 2.0)
            }
            LevelCurve::Stepwise { thresholds } => match level {
                0 => Some(0.0),
                _ => thresholds.get(level as usize - 1).copied(),
            },
        }
    }

    /// Highest level whose cumulative threshold does not exceed `experience`.
    /// Thresholds always come from `experience_for_level`, so the two agree.
    pub fn level_for(&self, experience: f64) -> u32 {
        let experience = sanitise(experience, 0.0).max(0.0);
        let cap = self.max_level.unwrap_or(u32::MAX);
        let level = match &self.curve {
            LevelCurve::Linear { base, increment } => {
                self.settle(linear_estimate(*base, *increment, experience), experience, cap)
            }
            LevelCurve::Stepwise { thresholds } => {
                let reached = thresholds
                    .iter()
                    .take_while(|threshold| **threshold <= experience)
                    .count();
                u32::try_from(reached).unwrap_or(u32::MAX)
            }
        };
        level.min(cap)
    }

    /// Moves an estimated level onto the exact boundary of the threshold
    /// function. The estimate is within a few levels, so this terminates fast.
    fn settle(&self, estimate: f64, experience: f64, cap: u32) -> u32 {
        // Saturating float-to-int conversion.
        let mut level = estimate.floor().clamp(0.0, f64::from(cap)) as u32;
        while level > 0
            && self
                .experience_for_level(level)
                .is_none_or(|required| required > experience)
        {
            level -= 1;
        }
        while level < cap
            && self
                .experience_for_level(level + 1)
                .is_some_and(|required| required <= experience)
        {
            level += 1;
        }
        level
    }
}

/// Solves `base * n + increment * n * (n - 1) / 2 = experience` for `n`.
fn linear_estimate(base: f64, increment: f64, experience: f64) -> f64 {
    if increment <= 0.0 {
        return experience / base;
    }
    let linear = base - increment / 2.0;
    let discriminant = linear * linear + 2.0 * increment * experience;
    (discriminant.sqrt() - linear) / increment
}

impl From<RawLeveling> for LevelPolicy {
    fn from(value: RawLeveling) -> Self {
        let curve = if value.mode.eq_ignore_ascii_case("stepwise") {
            LevelCurve::Stepwise {
                thresholds: value.thresholds,
            }
        } else {
            LevelCurve::Linear {
                base: value.base,
                increment: value.increment,
            }
        };
        Self::new(curve, value.max_level)
    }
}

fn sanitise(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}
