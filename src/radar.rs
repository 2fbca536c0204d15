//! Groove radar values and the chart statistics they are built from.
//!
//! Every value is a piecewise-linear curve of one density figure: a
//! low-range scale up to a breakpoint, then a separately calibrated
//! high-range scale for each play mode.

use serde::Serialize;

use crate::bpm::core_bpm;
use crate::difficulty::Mode;
use crate::math::{floor_i64, nonzero_or_one, round_dp, round_half_up};
use crate::simfile::ChartDetail;
use crate::timing::{first_note_seconds, last_beat, last_offset, song_seconds};

/// `floor((x + add) * mul / div)`
#[derive(Debug, Clone, Copy)]
struct Rescale {
    add: f64,
    mul: f64,
    div: f64,
}

impl Rescale {
    const fn divide(div: f64) -> Self {
        Self { add: 0.0, mul: 1.0, div }
    }

    fn apply(self, x: f64) -> i64 {
        floor_i64((x + self.add) * self.mul / self.div)
    }
}

#[derive(Debug, Clone, Copy)]
struct Curve {
    breakpoint: f64,
    low: Rescale,
    single: Rescale,
    double: Rescale,
}

impl Curve {
    fn apply(&self, x: f64, mode: Mode) -> i64 {
        if x <= self.breakpoint {
            self.low.apply(x)
        } else {
            match mode {
                Mode::Single => self.single.apply(x),
                Mode::Double => self.double.apply(x),
            }
        }
    }
}

const STREAM_CURVE: Curve = Curve {
    breakpoint: 300.0,
    low: Rescale::divide(3.0),
    single: Rescale { add: -139.0, mul: 100.0, div: 161.0 },
    double: Rescale { add: -183.0, mul: 100.0, div: 117.0 },
};

const AIR_CURVE: Curve = Curve {
    breakpoint: 55.0,
    low: Rescale { add: 0.0, mul: 20.0, div: 11.0 },
    single: Rescale { add: 36.0, mul: 100.0, div: 91.0 },
    double: Rescale { add: 35.0, mul: 10.0, div: 9.0 },
};

// Voltage has one high-range scale for both modes.
const VOLTAGE_CURVE: Curve = Curve {
    breakpoint: 600.0,
    low: Rescale::divide(6.0),
    single: Rescale { add: 594.0, mul: 100.0, div: 1194.0 },
    double: Rescale { add: 594.0, mul: 100.0, div: 1194.0 },
};

const FREEZE_CURVE: Curve = Curve {
    breakpoint: 3500.0,
    low: Rescale::divide(35.0),
    single: Rescale { add: 2484.0, mul: 100.0, div: 5984.0 },
    double: Rescale { add: 2246.0, mul: 100.0, div: 5746.0 },
};

const CHAOS_CURVE: Curve = Curve {
    breakpoint: 2000.0,
    low: Rescale::divide(20.0),
    single: Rescale { add: 21605.0, mul: 100.0, div: 23605.0 },
    double: Rescale { add: 16628.0, mul: 100.0, div: 18628.0 },
};

/// Grid resolution used by voltage and chaos.
pub const ROWS_PER_MEASURE: usize = 192;
const ROWS_PER_BEAT: usize = ROWS_PER_MEASURE / 4;
const VOLTAGE_WINDOW_ROWS: usize = ROWS_PER_MEASURE;
const VOLTAGE_STRIDE_ROWS: usize = ROWS_PER_BEAT;

const FREEZE_START_DECIMALS: usize = 6;
const CHAOS_TEMPO_SCALE: f64 = 1500.0;
const CHAOS_SHOCK_WEIGHT_SINGLE: f64 = 4.0;
const CHAOS_SHOCK_WEIGHT_DOUBLE: f64 = 8.0;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetricsOptions {
    /// Measured audio length in seconds. A positive value replaces the
    /// length computed from the chart's timing for every metric.
    pub audio_length_override: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GrooveRadar {
    pub stream: i64,
    pub voltage: i64,
    pub air: i64,
    pub freeze: i64,
    pub chaos: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMetrics {
    pub steps: u32,
    pub shock_events: u32,
    pub jumps: u32,
    pub first_note_seconds: f64,
    /// Effective song length: the override when given, else computed.
    pub song_seconds: f64,
    pub song_beats: f64,
    pub core_bpm: Option<f64>,
    pub radar: GrooveRadar,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct RowCounts {
    taps: u32,
    mines: u32,
}

#[inline]
fn count_row(row: &str) -> RowCounts {
    row.bytes().fold(RowCounts::default(), |mut acc, b| {
        match b {
            b'1' | b'2' | b'4' => acc.taps += 1,
            b'M' => acc.mines += 1,
            _ => {}
        }
        acc
    })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct NoteCounts {
    steps: u32,
    shock_events: u32,
    jumps: u32,
}

fn note_counts(chart: &ChartDetail) -> NoteCounts {
    chart
        .arrows
        .iter()
        .map(|a| count_row(&a.direction))
        .fold(NoteCounts::default(), |mut acc, row| {
            acc.steps += row.taps;
            acc.shock_events += u32::from(row.mines > 0);
            acc.jumps += u32::from(row.taps >= 2);
            acc
        })
}

/// Events per minute, floored.
#[inline]
fn per_minute(events: u32, seconds: f64) -> f64 {
    (60.0 * f64::from(events) / nonzero_or_one(seconds)).floor()
}

/// Song length used by the metrics.
pub fn effective_seconds(chart: &ChartDetail, options: &MetricsOptions) -> f64 {
    match options.audio_length_override {
        Some(len) if len > 0.0 => len,
        _ => song_seconds(chart),
    }
}

/// Tap density: every tap lane plus one per row holding a mine.
pub fn stream(chart: &ChartDetail, mode: Mode, seconds: f64) -> i64 {
    let counts = note_counts(chart);
    let density = per_minute(counts.steps + counts.shock_events, seconds);
    STREAM_CURVE.apply(density, mode)
}

/// Jump density: rows with two or more taps, plus rows with a mine.
pub fn air(chart: &ChartDetail, mode: Mode, seconds: f64) -> i64 {
    let counts = note_counts(chart);
    let density = per_minute(counts.jumps + counts.shock_events, seconds);
    AIR_CURVE.apply(density, mode)
}

/// Tap plus mine lanes per row of the note text, each measure stretched
/// to [`ROWS_PER_MEASURE`] rows.
///
/// Every native row is followed by `192 / rows - 1` empty rows, so
/// measures that do not divide 192 are padded at the end rather than
/// spaced exactly; measures over 192 rows are cut short. Measures with no
/// rows are dropped.
pub fn rasterize_notes(notes: &str, lanes: usize) -> Vec<u32> {
    let mut grid = Vec::new();
    let mut measure: Vec<u32> = Vec::new();

    for line in notes.split('\n').map(str::trim) {
        if line.is_empty() || line.starts_with("//") {
            continue;
        }
        if line.starts_with(',') {
            push_measure(&mut grid, &mut measure);
            continue;
        }
        let row: String = line.chars().take(lanes).collect();
        let counts = count_row(&row);
        measure.push(counts.taps + counts.mines);
    }
    push_measure(&mut grid, &mut measure);
    grid
}

fn push_measure(grid: &mut Vec<u32>, measure: &mut Vec<u32>) {
    if measure.is_empty() {
        return;
    }
    let gap = (ROWS_PER_MEASURE / measure.len()).saturating_sub(1);
    let start = grid.len();
    for &weight in measure.iter() {
        grid.push(weight);
        grid.extend(std::iter::repeat_n(0, gap));
    }
    grid.resize(start + ROWS_PER_MEASURE, 0);
    measure.clear();
}

/// Largest sum over any 4-beat window, windows starting every beat.
fn peak_window(grid: &[u32]) -> u32 {
    let mut prefix = Vec::with_capacity(grid.len() + 1);
    prefix.push(0u32);
    for &w in grid {
        prefix.push(prefix[prefix.len() - 1] + w);
    }
    (0..grid.len())
        .step_by(VOLTAGE_STRIDE_ROWS)
        .map(|start| {
            let end = (start + VOLTAGE_WINDOW_ROWS).min(grid.len());
            prefix[end] - prefix[start]
        })
        .max()
        .unwrap_or(0)
}

/// Peak density: the busiest 4-beat window scaled by the song's average
/// tempo.
pub fn voltage(chart: &ChartDetail, mode: Mode, seconds: f64) -> i64 {
    let avg_bpm = 60.0 * last_beat(chart) / nonzero_or_one(seconds);
    let peak = peak_window(&rasterize_notes(&chart.notes, mode.lanes()));
    let avg_peak_density = (avg_bpm * f64::from(peak) / 4.0).floor();
    VOLTAGE_CURVE.apply(avg_peak_density, mode)
}

/// Share of the song spent holding freezes. Freezes starting together
/// count once, by the longest.
pub fn freeze(chart: &ChartDetail, mode: Mode) -> i64 {
    let mut groups: Vec<(f64, f64)> = Vec::new();
    for f in &chart.freezes {
        let start = round_dp(f.start_offset, FREEZE_START_DECIMALS);
        let end = [f.end_offset, f.start_offset]
            .into_iter()
            .find(|v| *v != 0.0 && !v.is_nan())
            .unwrap_or(0.0);
        match groups.iter_mut().find(|(s, _)| *s == start) {
            Some((_, longest)) => {
                if end > *longest {
                    *longest = end;
                }
            }
            None => groups.push((start, end)),
        }
    }

    let total_beats: f64 = groups.iter().map(|(start, end)| (end - start) * 4.0).sum();
    let fa_rate = 10000.0 * total_beats / nonzero_or_one(last_beat(chart));
    FREEZE_CURVE.apply(fa_rate, mode)
}

#[inline]
fn color_weight(row: i64) -> f64 {
    let r = row.rem_euclid(ROWS_PER_MEASURE as i64);
    if r % 48 == 0 {
        0.0
    } else if r % 24 == 0 {
        2.0
    } else if r % 12 == 0 {
        4.0
    } else {
        5.0
    }
}

#[inline]
fn arrow_weight(counts: RowCounts, mode: Mode) -> f64 {
    if counts.mines > 0 {
        match mode {
            Mode::Single => CHAOS_SHOCK_WEIGHT_SINGLE,
            Mode::Double => CHAOS_SHOCK_WEIGHT_DOUBLE,
        }
    } else if counts.taps >= 2 {
        2.0
    } else if counts.taps == 1 {
        1.0
    } else {
        0.0
    }
}

/// Arrows collapsed onto the 192nd grid. Arrows landing on the same row
/// are merged.
fn grid_rows(chart: &ChartDetail) -> Vec<(i64, RowCounts)> {
    let mut rows: Vec<(i64, RowCounts)> = Vec::with_capacity(chart.arrows.len());
    for arrow in &chart.arrows {
        let row = round_half_up(arrow.offset * ROWS_PER_MEASURE as f64) as i64;
        let counts = count_row(&arrow.direction);
        match rows.last_mut() {
            Some((last, merged)) if *last == row => {
                merged.taps += counts.taps;
                merged.mines += counts.mines;
            }
            _ => rows.push((row, counts)),
        }
    }
    rows
}

/// Irregular-rhythm volume: off-beat notes weighted by how close they
/// follow the previous row.
fn irregular_beat_volume(chart: &ChartDetail, mode: Mode) -> f64 {
    grid_rows(chart)
        .windows(2)
        .map(|pair| {
            let (prev, _) = pair[0];
            let (row, counts) = pair[1];
            let interval = (row - prev) as f64 / ROWS_PER_BEAT as f64;
            if interval <= 0.0 {
                return 0.0;
            }
            arrow_weight(counts, mode) * color_weight(row) / interval
        })
        .sum()
}

/// Tempo movement: every BPM jump plus the tempo in effect at each stop.
fn tempo_change_volume(chart: &ChartDetail) -> f64 {
    let jumps: f64 = chart
        .bpm
        .windows(2)
        .map(|pair| (pair[1].bpm - pair[0].bpm).abs())
        .sum();
    let at_stops: f64 = chart
        .stops
        .iter()
        .map(|stop| {
            chart
                .bpm
                .iter()
                .rev()
                .find(|seg| seg.start_offset <= stop.offset)
                .or_else(|| chart.bpm.first())
                .map_or(0.0, |seg| seg.bpm)
        })
        .sum();
    jumps + at_stops
}

/// Rhythmic and tempo irregularity.
pub fn chaos(chart: &ChartDetail, mode: Mode, seconds: f64) -> i64 {
    let seconds = nonzero_or_one(seconds);
    let ibv = irregular_beat_volume(chart, mode);
    let x = 60.0 * tempo_change_volume(chart) / seconds;
    let s = ibv * (1.0 + x / CHAOS_TEMPO_SCALE);
    let unit_chaos = round_half_up(100.0 * s / seconds);
    CHAOS_CURVE.apply(unit_chaos, mode)
}

pub fn compute_radar(chart: &ChartDetail, mode: Mode, seconds: f64) -> GrooveRadar {
    GrooveRadar {
        stream: stream(chart, mode, seconds),
        voltage: voltage(chart, mode, seconds),
        air: air(chart, mode, seconds),
        freeze: freeze(chart, mode),
        chaos: chaos(chart, mode, seconds),
    }
}

pub fn compute_chart_metrics(
    chart: &ChartDetail,
    mode: Mode,
    options: &MetricsOptions,
) -> ChartMetrics {
    let counts = note_counts(chart);
    let seconds = effective_seconds(chart, options);
    ChartMetrics {
        steps: counts.steps,
        shock_events: counts.shock_events,
        jumps: counts.jumps,
        first_note_seconds: first_note_seconds(chart),
        song_seconds: seconds,
        song_beats: last_beat(chart),
        core_bpm: core_bpm(&chart.tempo_changes, last_offset(chart)),
        radar: compute_radar(chart, mode, seconds),
    }
}
