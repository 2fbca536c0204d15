//! Speed modifier suggestions: which multiplier brings a song closest to
//! a preferred scroll speed.

use std::fmt;

use serde::Serialize;

use crate::bpm::BpmRange;
use crate::math::{round_dp, round_half_up};

/// The multipliers a cabinet offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MultiplierSet {
    /// A through A3 with a network connection.
    #[default]
    Online,
    /// A through A3 offline.
    Offline,
    World,
}

impl MultiplierSet {
    pub fn multipliers(self) -> Vec<f64> {
        match self {
            Self::Online => {
                let mut all = stepped(0.25, 4.0, 0.25);
                all.extend(stepped(4.5, 8.0, 0.5));
                all
            }
            Self::Offline => stepped(0.5, 8.0, 0.5),
            Self::World => stepped(0.05, 8.0, 0.05)
                .into_iter()
                .map(|m| round_dp(m, 2))
                .collect(),
        }
    }
}

/// `start, start + step, ..` up to `end`, computed by index so the
/// values don't drift.
fn stepped(start: f64, end: f64, step: f64) -> Vec<f64> {
    let len = ((end - start) / step).floor() as usize + 1;
    (0..len).map(|i| start + i as f64 * step).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Up => "up",
            Self::Down => "down",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeChoice {
    pub modifier: f64,
    pub min_speed: f64,
    pub max_speed: f64,
    pub is_range: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RangeRecommendation {
    pub primary: RangeChoice,
    pub alternative: Option<RangeChoice>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CoreChoice {
    pub modifier: f64,
    pub speed: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CoreRecommendation {
    pub primary: CoreChoice,
    pub alternative: Option<CoreChoice>,
}

/// Index of the multiplier nearest `ideal`; the earlier one on a tie.
fn closest_index(multipliers: &[f64], ideal: f64) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, &m) in multipliers.iter().enumerate() {
        if best.is_none_or(|b| (m - ideal).abs() < (multipliers[b] - ideal).abs()) {
            best = Some(i);
        }
    }
    best
}

/// The neighbour on the far side of the target: one step down if the
/// primary overshoots, otherwise one step up.
fn neighbour(multipliers: &[f64], index: usize, overshoots: bool) -> Option<f64> {
    if overshoots {
        index.checked_sub(1).map(|i| multipliers[i])
    } else {
        multipliers.get(index + 1).copied()
    }
}

#[inline]
fn direction_of(alt_speed: f64, primary_speed: f64) -> Direction {
    if alt_speed > primary_speed {
        Direction::Up
    } else {
        Direction::Down
    }
}

/// Suggests a multiplier for a song whose tempo spans `range`, aiming the
/// top speed at `target`.
pub fn recommend_for_range(
    range: BpmRange,
    target: f64,
    set: MultiplierSet,
) -> Option<RangeRecommendation> {
    if range.max == 0.0 || !target.is_finite() {
        return None;
    }
    let multipliers = set.multipliers();
    let index = closest_index(&multipliers, target / range.max)?;
    let modifier = multipliers[index];
    let primary_speed = range.max * modifier;

    let choice = |modifier: f64, direction: Option<Direction>| RangeChoice {
        modifier,
        min_speed: round_half_up(range.min * modifier),
        max_speed: round_half_up(range.max * modifier),
        is_range: range.is_range(),
        direction,
    };

    let primary = choice(modifier, None);
    let alternative = neighbour(&multipliers, index, primary_speed > target)
        .map(|alt| choice(alt, Some(direction_of(range.max * alt, primary_speed))))
        .filter(|alt| alt.max_speed != primary.max_speed);

    Some(RangeRecommendation {
        primary,
        alternative,
    })
}

/// Suggests a multiplier that puts the song's core tempo at `target`.
pub fn recommend_for_core(
    core_bpm: f64,
    target: f64,
    set: MultiplierSet,
) -> Option<CoreRecommendation> {
    if core_bpm <= 0.0 || !target.is_finite() {
        return None;
    }
    let multipliers = set.multipliers();
    let index = closest_index(&multipliers, target / core_bpm)?;
    let modifier = multipliers[index];
    let primary_speed = core_bpm * modifier;

    let primary = CoreChoice {
        modifier,
        speed: round_half_up(primary_speed),
        direction: None,
    };
    let alternative = neighbour(&multipliers, index, primary_speed > target)
        .map(|alt| CoreChoice {
            modifier: alt,
            speed: round_half_up(core_bpm * alt),
            direction: Some(direction_of(core_bpm * alt, primary_speed)),
        })
        .filter(|alt| alt.speed != primary.speed);

    Some(CoreRecommendation {
        primary,
        alternative,
    })
}
