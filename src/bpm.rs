use log::warn;
use serde::Serialize;

use crate::math::round_half_up;

/// A constant-tempo span in measure offsets. `end_offset` of the last
/// segment is `None` (runs to the end of the song).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BpmSegment {
    pub start_offset: f64,
    pub end_offset: Option<f64>,
    pub bpm: f64,
}

/// A pause of `duration` seconds at a measure offset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stop {
    pub offset: f64,
    pub duration: f64,
}

/// Tempo at a point in song time, for plotting BPM against seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BpmPoint {
    pub seconds: f64,
    pub bpm: f64,
}

/// Parses a `beat=value,beat=value` timing list in file order.
/// Entries without `=` or with non-numeric halves are skipped.
pub fn parse_timing_pairs(raw: &str) -> Vec<(f64, f64)> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|entry| {
            let parsed = entry.split_once('=').and_then(|(left, right)| {
                let beat = left.trim().parse::<f64>().ok()?;
                let value = right.trim().parse::<f64>().ok()?;
                Some((beat, value))
            });
            if parsed.is_none() {
                warn!("Malformed timing entry '{entry}', skipping.");
            }
            parsed
        })
        .collect()
}

/// Tempo changes from a `#BPMS` value, one segment per entry. Beats are
/// converted to measures and shifted left by the leading empty measures
/// the note data dropped, so segment offsets line up with arrow offsets.
pub fn tempo_segments(raw: &str, measures_skipped: usize) -> Vec<BpmSegment> {
    let shift = measures_skipped as f64;
    let pairs = parse_timing_pairs(raw);
    pairs
        .iter()
        .enumerate()
        .map(|(i, &(beat, bpm))| BpmSegment {
            start_offset: beat * 0.25 - shift,
            end_offset: pairs.get(i + 1).map(|&(next_beat, _)| next_beat * 0.25 - shift),
            bpm,
        })
        .collect()
}

/// [`tempo_segments`] with similar neighbouring tempos merged.
pub fn parse_bpms(raw: &str, measures_skipped: usize) -> Vec<BpmSegment> {
    merge_similar_bpm_ranges(&tempo_segments(raw, measures_skipped))
}

/// Builds stops from a `#STOPS` value, shifted like [`parse_bpms`].
pub fn parse_stops(raw: &str, measures_skipped: usize) -> Vec<Stop> {
    let shift = measures_skipped as f64;
    parse_timing_pairs(raw)
        .into_iter()
        .map(|(beat, duration)| Stop {
            offset: beat * 0.25 - shift,
            duration,
        })
        .collect()
}

#[inline]
fn similar_bpm(a: &BpmSegment, b: &BpmSegment) -> bool {
    (a.bpm - b.bpm).abs() < 1.0
}

/// Collapses neighbouring segments less than 1 BPM apart.
///
/// The first segment of a run of similar tempos is kept and stretched to
/// the end of the run; the rest of the run is dropped.
pub fn merge_similar_bpm_ranges(segments: &[BpmSegment]) -> Vec<BpmSegment> {
    let mut merged = Vec::with_capacity(segments.len());
    for (i, segment) in segments.iter().enumerate() {
        if i > 0 && similar_bpm(&segments[i - 1], segment) {
            continue;
        }
        let mut end_offset = segment.end_offset;
        let mut j = i;
        while j + 1 < segments.len() && similar_bpm(&segments[j], &segments[j + 1]) {
            j += 1;
            end_offset = segments[j].end_offset;
        }
        merged.push(BpmSegment {
            end_offset,
            ..*segment
        });
    }
    merged
}

/// Formats the tempo range of a song: `"150"`, `"100-200"` or `"N/A"`.
/// Ranges narrower than 2 BPM show the rounded minimum only.
pub fn display_bpm(bpms: &[f64]) -> String {
    if bpms.is_empty() {
        return "N/A".to_string();
    }
    let (min, max) = bpms
        .iter()
        .fold((f64::MAX, f64::MIN), |(min, max), &bpm| (min.min(bpm), max.max(bpm)));
    let (min_rounded, max_rounded) = (round_half_up(min), round_half_up(max));
    if (min - max).abs() < 2.0 {
        format!("{min_rounded}")
    } else {
        format!("{min_rounded}-{max_rounded}")
    }
}

/// The tempo the song spends the most time at, ignoring stops.
///
/// Expects unmerged [`tempo_segments`], so tempos a fraction of a BPM
/// apart are timed separately. `last_offset` closes the final, open-ended
/// segment. Durations of equal
/// BPM values are summed; ties go to the value seen first.
pub fn core_bpm(segments: &[BpmSegment], last_offset: f64) -> Option<f64> {
    match segments {
        [] => return None,
        [only] => return Some(only.bpm),
        _ => {}
    }

    let mut durations: Vec<(f64, f64)> = Vec::new();
    for segment in segments {
        let end = segment.end_offset.unwrap_or(last_offset);
        let beats = (end - segment.start_offset) * 4.0;
        if segment.bpm <= 0.0 || beats <= 0.0 {
            continue;
        }
        let seconds = beats / segment.bpm * 60.0;
        match durations.iter_mut().find(|(bpm, _)| *bpm == segment.bpm) {
            Some((_, total)) => *total += seconds,
            None => durations.push((segment.bpm, seconds)),
        }
    }

    let mut best: Option<(f64, f64)> = None;
    for &(bpm, seconds) in &durations {
        if best.is_none_or(|(_, longest)| seconds > longest) {
            best = Some((bpm, seconds));
        }
    }
    best.map(|(bpm, _)| bpm)
}

/// Step-shaped tempo curve: one point where each tempo starts and ends,
/// in seconds from the first segment, ignoring stops.
pub fn bpm_timeline(segments: &[BpmSegment], last_offset: f64) -> Vec<BpmPoint> {
    let Some(first) = segments.first() else {
        return Vec::new();
    };

    let mut points = vec![BpmPoint {
        seconds: 0.0,
        bpm: first.bpm,
    }];
    let mut seconds = 0.0;
    let mut current = *first;

    for &next in &segments[1..] {
        let beats = (next.start_offset - current.start_offset) * 4.0;
        if current.bpm > 0.0 {
            seconds += beats / current.bpm * 60.0;
        }
        points.push(BpmPoint { seconds, bpm: current.bpm });
        points.push(BpmPoint { seconds, bpm: next.bpm });
        current = next;
    }

    let beats_remaining = (last_offset - current.start_offset) * 4.0;
    if current.bpm > 0.0 && beats_remaining > 0.0 {
        seconds += beats_remaining / current.bpm * 60.0;
    }
    points.push(BpmPoint { seconds, bpm: current.bpm });
    points
}

/// Numeric bounds of a display BPM string.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BpmRange {
    pub min: f64,
    pub max: f64,
}

impl BpmRange {
    /// Reads `"150"` or `"100-200"`; `"N/A"` and garbage give `None`.
    pub fn from_display(display: &str) -> Option<Self> {
        let parts: Vec<f64> = display
            .split('-')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .ok()?;
        let min = parts.iter().copied().reduce(f64::min)?;
        let max = parts.iter().copied().reduce(f64::max)?;
        Some(Self { min, max })
    }

    pub fn is_range(&self) -> bool {
        self.min != self.max
    }
}
