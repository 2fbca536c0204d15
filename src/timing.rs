use crate::bpm::{BpmSegment, Stop};
use crate::simfile::ChartDetail;

/// Seconds elapsed from the start of the first BPM segment to `target`
/// (in measures).
///
/// Each segment contributes `beats / bpm * 60` for the part of it that
/// lies before `target`; a non-positive BPM contributes nothing. Stops
/// whose offset falls inside an overlapped span add their duration once.
pub fn time_at_offset(segments: &[BpmSegment], stops: &[Stop], target: f64) -> f64 {
    if segments.is_empty() {
        return 0.0;
    }
    let mut sorted = segments.to_vec();
    sorted.sort_by(|a, b| a.start_offset.total_cmp(&b.start_offset));

    let mut time = 0.0;
    let mut pos = sorted[0].start_offset;

    for seg in &sorted {
        let start = pos.max(seg.start_offset);
        let end = target.min(seg.end_offset.unwrap_or(target));
        if end <= start {
            if seg.end_offset.unwrap_or(f64::INFINITY) > target {
                break;
            }
            pos = seg.end_offset.unwrap_or(pos);
            continue;
        }

        let beats = (end - start) * 4.0;
        if seg.bpm > 0.0 {
            time += beats / seg.bpm * 60.0;
        }
        time += stops
            .iter()
            .filter(|s| s.offset >= start && s.offset < end)
            .map(|s| if s.duration.is_finite() { s.duration } else { 0.0 })
            .sum::<f64>();

        pos = end;
        if pos >= target {
            break;
        }
    }
    time
}

/// Offset (measures) where the chart's last event ends: a quarter measure
/// past the last arrow, or the end of the last freeze, whichever is later.
pub fn last_offset(chart: &ChartDetail) -> f64 {
    let last_arrow = chart.arrows.last().map_or(0.0, |a| a.offset + 0.25);
    let last_freeze = chart.freezes.last().map_or(0.0, |f| f.end_offset);
    last_arrow.max(last_freeze)
}

/// [`last_offset`] in beats.
pub fn last_beat(chart: &ChartDetail) -> f64 {
    last_offset(chart) * 4.0
}

/// Length of the chart in seconds, from the first BPM segment to the end
/// of its last event.
pub fn song_seconds(chart: &ChartDetail) -> f64 {
    time_at_offset(&chart.bpm, &chart.stops, last_offset(chart))
}

/// Seconds until the first arrow; 0 for a chart without arrows.
pub fn first_note_seconds(chart: &ChartDetail) -> f64 {
    chart
        .arrows
        .first()
        .map_or(0.0, |a| time_at_offset(&chart.bpm, &chart.stops, a.offset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notes::{Arrow, Freeze};

    fn seg(start: f64, end: Option<f64>, bpm: f64) -> BpmSegment {
        BpmSegment {
            start_offset: start,
            end_offset: end,
            bpm,
        }
    }

    fn arrow(offset: f64) -> Arrow {
        Arrow {
            beat: 4,
            offset,
            direction: "1000".to_string(),
        }
    }

    fn chart(arrows: Vec<Arrow>, freezes: Vec<Freeze>, bpm: Vec<BpmSegment>) -> ChartDetail {
        ChartDetail {
            arrows,
            freezes,
            tempo_changes: bpm.clone(),
            bpm,
            stops: Vec::new(),
            notes: String::new(),
        }
    }

    #[test]
    fn constant_tempo() {
        let t = time_at_offset(&[seg(0.0, None, 150.0)], &[], 16.0);
        assert!((t - 25.6).abs() < 1e-9);
    }

    #[test]
    fn no_segments_is_zero() {
        assert_eq!(time_at_offset(&[], &[], 10.0), 0.0);
    }

    #[test]
    fn tempo_change_and_stop() {
        let segments = [seg(0.0, Some(1.0), 120.0), seg(1.0, None, 240.0)];
        let stops = [Stop { offset: 1.5, duration: 0.5 }, Stop { offset: 3.0, duration: 9.0 }];
        // 4 beats at 120 = 2s, 4 beats at 240 = 1s, one stop inside the span
        let t = time_at_offset(&segments, &stops, 2.0);
        assert!((t - 3.5).abs() < 1e-9);
    }

    #[test]
    fn stop_at_target_is_excluded() {
        let stops = [Stop { offset: 2.0, duration: 1.0 }];
        let t = time_at_offset(&[seg(0.0, None, 60.0)], &stops, 2.0);
        assert!((t - 8.0).abs() < 1e-9);
    }

    #[test]
    fn unsorted_segments_are_sorted() {
        let segments = [seg(1.0, None, 240.0), seg(0.0, Some(1.0), 120.0)];
        let t = time_at_offset(&segments, &[], 2.0);
        assert!((t - 3.0).abs() < 1e-9);
    }

    #[test]
    fn zero_bpm_span_keeps_its_stops() {
        let segments = [seg(0.0, Some(1.0), 0.0), seg(1.0, None, 60.0)];
        let stops = [Stop { offset: 0.5, duration: 2.0 }];
        let t = time_at_offset(&segments, &stops, 2.0);
        assert!((t - 6.0).abs() < 1e-9);
    }

    #[test]
    fn last_beat_uses_later_of_arrow_and_freeze() {
        let c = chart(
            vec![arrow(0.0), arrow(3.5)],
            vec![Freeze { direction: 0, start_offset: 3.0, end_offset: 4.5 }],
            vec![seg(0.0, None, 120.0)],
        );
        assert_eq!(last_offset(&c), 4.5);
        assert_eq!(last_beat(&c), 18.0);
        assert!((song_seconds(&c) - 9.0).abs() < 1e-9);
    }

    #[test]
    fn first_note_time() {
        let c = chart(vec![arrow(1.0), arrow(2.0)], Vec::new(), vec![seg(0.0, None, 120.0)]);
        assert!((first_note_seconds(&c) - 2.0).abs() < 1e-9);
        assert_eq!(first_note_seconds(&chart(Vec::new(), Vec::new(), Vec::new())), 0.0);
    }
}
