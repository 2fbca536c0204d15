//! Note body walking: arrows with exact offsets and freeze extraction.
//!
//! A note body is the part of a `#NOTES` value after its header fields:
//! rows of one character per lane, measures separated by `,` lines.
//! Offsets are measured from the first measure holding anything other than
//! rest rows.

use std::convert::Infallible;

use log::warn;
use serde::Serialize;

use crate::difficulty::Mode;
use crate::error::ParseError;
use crate::fraction::{Fraction, determine_beat};

/// One non-rest row. Tails (`3`) are blanked to `0` in `direction`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Arrow {
    pub beat: u32,
    pub offset: f64,
    pub direction: String,
}

/// A hold, from the row of its `2` head to a quarter measure past the row
/// of its `3` tail.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Freeze {
    pub direction: usize,
    pub start_offset: f64,
    pub end_offset: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoteBody {
    pub arrows: Vec<Arrow>,
    pub freezes: Vec<Freeze>,
    /// Leading measures with only rest rows. Timing tags are authored
    /// against the unshifted measures and must be moved by this much.
    pub measures_skipped: usize,
}

/// Names the chart in diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct ChartLabel<'a> {
    pub title: &'a str,
    pub mode: &'a str,
    pub difficulty: &'a str,
}

#[inline]
pub(crate) fn concludes_note_tag(line: &str) -> bool {
    line.starts_with(';') || line.starts_with(",;")
}

#[inline]
fn is_ignored(line: &str) -> bool {
    line.is_empty() || line.starts_with("//")
}

#[inline]
fn is_measure_break(line: &str) -> bool {
    line.starts_with(',')
}

/// First `lanes` characters of a row.
#[inline]
fn trim_note_line(line: &str, lanes: usize) -> &str {
    match line.char_indices().nth(lanes) {
        Some((idx, _)) => &line[..idx],
        None => line,
    }
}

#[inline]
fn is_rest(row: &str) -> bool {
    row.bytes().all(|b| b == b'0')
}

/// Counts the rows of the measure starting at `start`.
fn measure_length(lines: &[&str], start: usize) -> usize {
    lines
        .iter()
        .skip(start)
        .take_while(|line| !concludes_note_tag(line) && !is_measure_break(line))
        .filter(|line| !is_ignored(line))
        .count()
}

/// Index of the first line of the first measure with a non-rest row, and
/// how many measures came before it.
pub fn find_first_non_empty_measure(lines: &[&str], lanes: usize) -> Option<(usize, usize)> {
    let mut measures_skipped = 0;
    let mut measure_index = 0;
    for (i, &line) in lines.iter().enumerate() {
        if concludes_note_tag(line) {
            break;
        }
        if is_ignored(line) {
            continue;
        }
        if is_measure_break(line) {
            measure_index = i + 1;
            measures_skipped += 1;
            continue;
        }
        if !is_rest(trim_note_line(line, lanes)) {
            return Some((measure_index, measures_skipped));
        }
    }
    None
}

/// Walks rows from `start`, calling `visit` with each row and its exact
/// offset. The offset advances by `1/rows` of the current measure per row.
fn walk_rows<E, F>(lines: &[&str], start: usize, mut visit: F) -> Result<(), E>
where
    F: FnMut(&str, Fraction) -> Result<(), E>,
{
    let mut offset = Fraction::ZERO;
    let mut step = Fraction::recip_of(measure_length(lines, start));

    for (i, &line) in lines.iter().enumerate().skip(start) {
        if concludes_note_tag(line) {
            break;
        }
        if is_ignored(line) {
            continue;
        }
        if is_measure_break(line) {
            step = Fraction::recip_of(measure_length(lines, i + 1));
            continue;
        }
        visit(line, offset)?;
        offset += step;
    }
    Ok(())
}

/// Collects every row from `start` on that still has a note once tails
/// are blanked.
pub fn parse_arrows(lines: &[&str], start: usize, lanes: usize) -> Vec<Arrow> {
    let mut arrows = Vec::new();
    let Ok(()) = walk_rows(lines, start, |line, offset| -> Result<(), Infallible> {
        let direction = trim_note_line(line, lanes).replace('3', "0");
        if !is_rest(&direction) {
            arrows.push(Arrow {
                beat: determine_beat(offset),
                offset: offset.as_f64(),
                direction,
            });
        }
        Ok(())
    });
    arrows
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Lane {
    Idle,
    Holding { start_offset: f64 },
}

/// Pairs each `2` head with the next `3` tail in its lane.
///
/// A head on a lane that is already holding is an error. A tail on an idle
/// lane is logged and ignored.
pub fn parse_freezes(
    lines: &[&str],
    start: usize,
    lanes: usize,
    label: ChartLabel<'_>,
) -> Result<Vec<Freeze>, ParseError> {
    let mut freezes = Vec::new();
    let mut state = vec![Lane::Idle; lanes];

    walk_rows(lines, start, |line, offset| {
        let row = trim_note_line(line, lanes);
        if !row.contains(['2', '3']) {
            return Ok(());
        }
        let offset = offset.as_f64();
        for (lane, ch) in row.chars().enumerate() {
            match (ch, state[lane]) {
                ('2', Lane::Holding { .. }) => {
                    return Err(ParseError::FreezeReopened {
                        title: label.title.to_string(),
                        mode: label.mode.to_string(),
                        difficulty: label.difficulty.to_string(),
                        lane,
                    });
                }
                ('2', Lane::Idle) => {
                    state[lane] = Lane::Holding { start_offset: offset };
                }
                ('3', Lane::Holding { start_offset }) => {
                    freezes.push(Freeze {
                        direction: lane,
                        start_offset,
                        end_offset: offset + 0.25,
                    });
                    state[lane] = Lane::Idle;
                }
                ('3', Lane::Idle) => {
                    warn!(
                        "{}, {}, {} -- error parsing freezes, needed to close a freeze that never opened. Line: {}",
                        label.title, label.mode, label.difficulty, line
                    );
                }
                _ => {}
            }
        }
        Ok(())
    })?;

    Ok(freezes)
}

/// Parses a chart's trimmed note lines into arrows and freezes.
pub fn parse_chart_notes(
    lines: &[&str],
    mode: Mode,
    label: ChartLabel<'_>,
) -> Result<NoteBody, ParseError> {
    let lanes = mode.lanes();
    let Some((start, measures_skipped)) = find_first_non_empty_measure(lines, lanes) else {
        return Ok(NoteBody::default());
    };

    Ok(NoteBody {
        arrows: parse_arrows(lines, start, lanes),
        freezes: parse_freezes(lines, start, lanes, label)?,
        measures_skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LABEL: ChartLabel<'static> = ChartLabel {
        title: "Test",
        mode: "single",
        difficulty: "expert",
    };

    fn lines(body: &str) -> Vec<&str> {
        body.lines().map(str::trim).collect()
    }

    #[test]
    fn skips_leading_rest_measures() {
        let body = "0000\n0000\n,\n0000\n0000\n0000\n0000\n,\n1000\n0000\n0100\n0000\n";
        let l = lines(body);
        assert_eq!(find_first_non_empty_measure(&l, 4), Some((8, 2)));

        let parsed = parse_chart_notes(&l, Mode::Single, LABEL).unwrap();
        assert_eq!(parsed.measures_skipped, 2);
        assert_eq!(parsed.arrows.len(), 2);
        assert_eq!(parsed.arrows[0].offset, 0.0);
        assert_eq!(parsed.arrows[1].offset, 0.5);
        assert_eq!(parsed.arrows[1].direction, "0100");
    }

    #[test]
    fn all_rest_body_yields_nothing() {
        let l = lines("0000\n,\n0000\n");
        let parsed = parse_chart_notes(&l, Mode::Single, LABEL).unwrap();
        assert_eq!(parsed, NoteBody::default());
    }

    #[test]
    fn beat_tags_follow_subdivision() {
        // 8 rows then 12 rows
        let body = "1000\n1000\n0000\n0000\n0000\n0000\n0000\n0000\n,\n\
                    0001\n0001\n0000\n0000\n0000\n0000\n0000\n0000\n0000\n0000\n0000\n0000\n";
        let parsed = parse_chart_notes(&lines(body), Mode::Single, LABEL).unwrap();
        let beats: Vec<u32> = parsed.arrows.iter().map(|a| a.beat).collect();
        assert_eq!(beats, vec![4, 8, 4, 12]);
        assert_eq!(parsed.arrows[2].offset, 1.0);
        assert!((parsed.arrows[3].offset - (1.0 + 1.0 / 12.0)).abs() < 1e-12);
    }

    #[test]
    fn rows_are_trimmed_to_lane_width_and_tails_blanked() {
        let body = "2000 // hold\n0000\n3000\n0000\n";
        let parsed = parse_chart_notes(&lines(body), Mode::Single, LABEL).unwrap();
        assert_eq!(parsed.arrows.len(), 1);
        assert_eq!(parsed.arrows[0].direction, "2000");
        assert_eq!(parsed.freezes.len(), 1);
    }

    #[test]
    fn comment_lines_are_not_rows() {
        let body = "// measure 1\n1000\n0000\n0000\n0000\n";
        let parsed = parse_chart_notes(&lines(body), Mode::Single, LABEL).unwrap();
        assert_eq!(parsed.arrows.len(), 1);
        assert_eq!(parsed.arrows[0].offset, 0.0);
    }

    #[test]
    fn freezes_pair_heads_with_tails() {
        let body = "2002\n0000\n3000\n0003\n,\n0200\n0300\n0000\n0000\n";
        let parsed = parse_chart_notes(&lines(body), Mode::Single, LABEL).unwrap();
        assert_eq!(
            parsed.freezes,
            vec![
                Freeze { direction: 0, start_offset: 0.0, end_offset: 0.75 },
                Freeze { direction: 3, start_offset: 0.0, end_offset: 1.0 },
                Freeze { direction: 1, start_offset: 1.0, end_offset: 1.5 },
            ]
        );
    }

    #[test]
    fn reopening_a_held_lane_is_fatal() {
        let body = "2000\n2000\n3000\n0000\n";
        let err = parse_chart_notes(&lines(body), Mode::Single, LABEL).unwrap_err();
        assert!(matches!(err, ParseError::FreezeReopened { lane: 0, .. }));
    }

    #[test]
    fn stray_tail_is_skipped() {
        let body = "1000\n0300\n0000\n0000\n";
        let parsed = parse_chart_notes(&lines(body), Mode::Single, LABEL).unwrap();
        assert!(parsed.freezes.is_empty());
        assert_eq!(parsed.arrows.len(), 1);
    }

    #[test]
    fn double_rows_use_eight_lanes() {
        let body = "00001000\n00000000\n00000000\n00000002\n,\n00000003\n00000000\n00000000\n00000000\n";
        let parsed = parse_chart_notes(&lines(body), Mode::Double, LABEL).unwrap();
        assert_eq!(parsed.arrows.len(), 2);
        assert!(parsed.arrows.iter().all(|a| a.direction.len() == 8));
        assert_eq!(
            parsed.freezes,
            vec![Freeze { direction: 7, start_offset: 0.75, end_offset: 1.25 }]
        );
    }

    #[test]
    fn offsets_stay_exact_over_many_measures() {
        let mut body = String::new();
        for _ in 0..100 {
            for _ in 0..12 {
                body.push_str("1000\n");
            }
            body.push_str(",\n");
        }
        let parsed = parse_chart_notes(&lines(&body), Mode::Single, LABEL).unwrap();
        assert_eq!(parsed.arrows.len(), 1200);
        for (i, arrow) in parsed.arrows.iter().enumerate() {
            let expected = Fraction::from((i / 12) as i64) + Fraction::new((i % 12) as i64, 12);
            assert_eq!(arrow.offset, expected.as_f64());
        }
        assert_eq!(parsed.arrows[1200 - 12].offset, 99.0);
    }
}
