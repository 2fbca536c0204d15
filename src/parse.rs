//! Tag-level scanning of `.sm` and `.ssc` text.
//!
//! This layer only finds tag values and note bodies. Chart contents are
//! interpreted by [`crate::notes`] and [`crate::bpm`].

use std::borrow::Cow;

use log::debug;

use crate::difficulty::{Difficulty, Mode, normalize_difficulty};
use crate::error::ParseError;
use crate::notes::concludes_note_tag;

const CP1252_MAP: [u16; 32] = [
    0x20AC, 0xFFFD, 0x201A, 0x0192, 0x201E, 0x2026, 0x2020, 0x2021, 0x02C6, 0x2030, 0x0160, 0x2039,
    0x0152, 0xFFFD, 0x017D, 0xFFFD, 0xFFFD, 0x2018, 0x2019, 0x201C, 0x201D, 0x2022, 0x2013, 0x2014,
    0x02DC, 0x2122, 0x0161, 0x203A, 0x0153, 0xFFFD, 0x017E, 0x0178,
];

fn decode_cp1252(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| match b {
            0x00..=0x7F => b as char,
            0x80..=0x9F => {
                char::from_u32(u32::from(CP1252_MAP[(b - 0x80) as usize])).unwrap_or('\u{FFFD}')
            }
            _ => char::from(b),
        })
        .collect()
}

/// Simfiles from older mixes are often Windows-1252; anything that is not
/// valid UTF-8 is read that way.
pub fn decode_bytes(bytes: &[u8]) -> Cow<'_, str> {
    std::str::from_utf8(bytes)
        .map(Cow::Borrowed)
        .unwrap_or_else(|_| Cow::Owned(decode_cp1252(bytes)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Sm,
    Ssc,
}

pub fn detect_format(text: &str) -> Format {
    if text.contains("#NOTEDATA") {
        Format::Ssc
    } else {
        Format::Sm
    }
}

/// One playable chart as found in the file, before its notes are walked.
#[derive(Debug, Clone, PartialEq)]
pub struct RawChart {
    pub mode: Mode,
    pub difficulty: Difficulty,
    pub feet: u32,
    pub bpms: String,
    pub stops: String,
    /// Note body text as stored on the chart.
    pub notes: String,
}

impl RawChart {
    /// Trimmed body lines, the unit every note walk works on.
    pub fn note_lines(&self) -> Vec<&str> {
        self.notes.split('\n').map(str::trim).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSimfile {
    pub title: String,
    pub title_translit: String,
    pub artist: String,
    pub banner: Option<String>,
    pub music: Option<String>,
    pub charts: Vec<RawChart>,
}

/// Scans simfile text in whichever format it is written in.
pub fn scan(text: &str) -> Result<RawSimfile, ParseError> {
    match detect_format(text) {
        Format::Ssc => Ok(scan_ssc(text)),
        Format::Sm => scan_sm(text),
    }
}

#[inline]
fn starts_with_ci(slice: &[u8], tag: &[u8]) -> bool {
    slice.len() >= tag.len()
        && slice
            .iter()
            .zip(tag)
            .all(|(a, b)| a.eq_ignore_ascii_case(b))
}

/// Byte positions of every case-insensitive occurrence of `needle`.
fn find_all_ci<'a>(haystack: &'a str, needle: &'a str) -> impl Iterator<Item = usize> + 'a {
    let hay = haystack.as_bytes();
    let pat = needle.as_bytes();
    (0..hay.len().saturating_sub(pat.len()) + 1)
        .filter(move |&i| !pat.is_empty() && starts_with_ci(&hay[i..], pat))
}

/// Value of the first `#TAG:value;` whose value is non-empty, trimmed.
/// Matching ignores case; the value may span lines.
pub fn tag_value<'a>(content: &'a str, tag: &str) -> Option<&'a str> {
    let needle = format!("#{tag}:");
    find_all_ci(content, &needle).find_map(|pos| {
        let rest = &content[pos + needle.len()..];
        match rest.find(';') {
            Some(end) if end > 0 => Some(rest[..end].trim()),
            _ => None,
        }
    })
}

fn tag_value_owned(content: &str, tag: &str) -> String {
    tag_value(content, tag).unwrap_or_default().to_string()
}

/// Splits on every case-insensitive `#NOTEDATA:;`, dropping the header.
fn notedata_blocks(text: &str) -> Vec<&str> {
    const MARKER: &str = "#NOTEDATA:;";
    let starts: Vec<usize> = find_all_ci(text, MARKER).collect();
    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(text.len());
            &text[start + MARKER.len()..end]
        })
        .collect()
}

/// Text of a block's `#NOTES:` up to the next `;`, surrounding
/// whitespace trimmed.
fn ssc_notes(block: &str) -> &str {
    find_all_ci(block, "#NOTES:")
        .find_map(|pos| {
            let rest = block[pos + "#NOTES:".len()..].trim_start();
            rest.find(';').map(|end| rest[..end].trim_end())
        })
        .unwrap_or_default()
}

fn scan_ssc(text: &str) -> RawSimfile {
    let header = text.split("#NOTEDATA").next().unwrap_or_default();
    let global_bpms = tag_value_owned(header, "BPMS");
    let global_stops = tag_value_owned(header, "STOPS");

    let mut sim = RawSimfile {
        title: tag_value_owned(header, "TITLE"),
        title_translit: tag_value_owned(header, "TITLETRANSLIT"),
        artist: tag_value_owned(header, "ARTIST"),
        banner: tag_value(header, "BANNER").map(str::to_string),
        music: tag_value(header, "MUSIC").map(str::to_string),
        charts: Vec::new(),
    };

    for block in notedata_blocks(text) {
        let Some(steps_type) = tag_value(block, "STEPSTYPE") else {
            continue;
        };
        let Some(mode) = Mode::from_steps_type(steps_type) else {
            debug!("{}: skipping {steps_type} chart", sim.title);
            continue;
        };
        let Some(raw_difficulty) = tag_value(block, "DIFFICULTY") else {
            continue;
        };
        let Some(difficulty) = normalize_difficulty(raw_difficulty) else {
            debug!("{}: skipping unknown difficulty {raw_difficulty}", sim.title);
            continue;
        };

        let feet = tag_value(block, "METER")
            .and_then(|m| m.parse().ok())
            .unwrap_or(0);
        let bpms = tag_value(block, "BPMS").map_or_else(|| global_bpms.clone(), str::to_string);
        let stops = tag_value(block, "STOPS").map_or_else(|| global_stops.clone(), str::to_string);

        sim.charts.push(RawChart {
            mode,
            difficulty,
            feet,
            bpms,
            stops,
            notes: ssc_notes(block).to_string(),
        });
    }
    sim
}

/// First `#LETTERS:value` on a line. The value runs to `;` or end of line
/// and is not trimmed.
fn line_tag(line: &str) -> Option<(&str, &str)> {
    line.match_indices('#').find_map(|(pos, _)| {
        let rest = &line[pos + 1..];
        let name_len = rest
            .bytes()
            .take_while(u8::is_ascii_alphabetic)
            .count();
        if name_len == 0 || rest.as_bytes().get(name_len) != Some(&b':') {
            return None;
        }
        let value = &rest[name_len + 1..];
        let value = value.split_once(';').map_or(value, |(v, _)| v);
        Some((&rest[..name_len], value))
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NotesHeader<'a> {
    steps_type: &'a str,
    difficulty: &'a str,
    feet: &'a str,
}

/// Reads the five positional header fields that follow a `#NOTES:` line
/// (steps type, description, difficulty, meter, radar values), skipping
/// blank lines. Returns the fields and the index of the first body line.
fn notes_header<'a>(lines: &[&'a str], from: usize) -> Result<(NotesHeader<'a>, usize), ParseError> {
    let mut fields = [""; 5];
    let mut taken = 0;
    let mut i = from;
    while taken < fields.len() {
        let line = lines.get(i).ok_or(ParseError::TruncatedNotesHeader)?;
        if !line.is_empty() {
            fields[taken] = *line;
            taken += 1;
        }
        i += 1;
    }
    Ok((
        NotesHeader {
            steps_type: fields[0],
            difficulty: fields[2],
            feet: fields[3],
        },
        i,
    ))
}

fn strip_field(field: &str) -> String {
    field.replacen(':', "", 1)
}

fn scan_sm(text: &str) -> Result<RawSimfile, ParseError> {
    let lines: Vec<&str> = text.split('\n').map(str::trim).collect();
    let mut sim = RawSimfile::default();
    let mut bpms: Option<&str> = None;
    let mut stops: Option<&str> = None;

    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        if !line.starts_with('#') {
            i += 1;
            continue;
        }
        let Some((tag, value)) = line_tag(line) else {
            i += 1;
            continue;
        };

        match tag.to_ascii_lowercase().as_str() {
            "title" => sim.title = value.to_string(),
            "titletranslit" => sim.title_translit = value.to_string(),
            "artist" => sim.artist = value.to_string(),
            "banner" => sim.banner = Some(value.to_string()),
            "music" => sim.music = Some(value.to_string()),
            "bpms" => bpms = Some(value),
            "stops" => stops = Some(value),
            "notes" => {
                let bpms = bpms.filter(|b| !b.is_empty()).ok_or(ParseError::MissingBpms)?;
                let (header, body_start) = notes_header(&lines, i + 1)?;
                let body_len = lines[body_start..]
                    .iter()
                    .take_while(|l| !concludes_note_tag(l))
                    .count();
                i = body_start + body_len + 1;

                let mode = Mode::from_steps_type(&strip_field(header.steps_type));
                let difficulty = normalize_difficulty(&strip_field(header.difficulty));
                let (Some(mode), Some(difficulty)) = (mode, difficulty) else {
                    debug!(
                        "{}: skipping {} {} chart",
                        sim.title, header.steps_type, header.difficulty
                    );
                    continue;
                };

                sim.charts.push(RawChart {
                    mode,
                    difficulty,
                    feet: strip_field(header.feet).trim().parse().unwrap_or(0),
                    bpms: bpms.to_string(),
                    stops: stops.unwrap_or_default().to_string(),
                    notes: lines[body_start..body_start + body_len].join("\n"),
                });
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    Ok(sim)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_value_is_case_insensitive_and_skips_empty() {
        let text = "#banner:;\n#TITLE:  Butterfly ;\n#BANNER:bn.png;";
        assert_eq!(tag_value(text, "TITLE"), Some("Butterfly"));
        assert_eq!(tag_value(text, "banner"), Some("bn.png"));
        assert_eq!(tag_value(text, "ARTIST"), None);
        assert_eq!(tag_value("#TITLE:x", "TITLE"), None);
    }

    #[test]
    fn line_tag_keeps_raw_value() {
        assert_eq!(line_tag("#TITLE:Abc ;"), Some(("TITLE", "Abc ")));
        assert_eq!(line_tag("#BPMS:0.000=150.000"), Some(("BPMS", "0.000=150.000")));
        assert_eq!(line_tag("#1:x;"), None);
        assert_eq!(line_tag("#NOTES:"), Some(("NOTES", "")));
    }

    #[test]
    fn detects_ssc_by_notedata() {
        assert_eq!(detect_format("#TITLE:a;\n#NOTEDATA:;"), Format::Ssc);
        assert_eq!(detect_format("#TITLE:a;\n#NOTES:"), Format::Sm);
    }

    #[test]
    fn sm_charts_and_skips() {
        let text = "#TITLE:Song;\n#BPMS:0.000=120.000;\n\
            #NOTES:\n     dance-couple:\n     :\n     Hard:\n     5:\n     0,0,0,0,0:\n00000000\n;\n\
            #NOTES:\n     dance-single:\n     :\n     Hard:\n     7:\n     0,0,0,0,0:\n1000\n0000\n0000\n0000\n;\n";
        let sim = scan(text).unwrap();
        assert_eq!(sim.title, "Song");
        assert_eq!(sim.charts.len(), 1);
        let chart = &sim.charts[0];
        assert_eq!(chart.mode, Mode::Single);
        assert_eq!(chart.difficulty, Difficulty::Expert);
        assert_eq!(chart.feet, 7);
        assert_eq!(chart.bpms, "0.000=120.000");
        assert_eq!(chart.notes, "1000\n0000\n0000\n0000");
    }

    #[test]
    fn sm_notes_before_bpms_fail() {
        let text = "#TITLE:Song;\n#NOTES:\ndance-single:\n:\nHard:\n5:\n0:\n1000\n;\n";
        assert!(matches!(scan(text), Err(ParseError::MissingBpms)));
    }

    #[test]
    fn sm_truncated_header_fails() {
        let text = "#BPMS:0=120;\n#NOTES:\ndance-single:\n:\n";
        assert!(matches!(scan(text), Err(ParseError::TruncatedNotesHeader)));
    }

    #[test]
    fn ssc_blocks_fall_back_to_global_timing() {
        let text = "#TITLE:Song;\n#BPMS:0.000=150.000;\n#STOPS:;\n\
            #NOTEDATA:;\n#STEPSTYPE:dance-single;\n#DIFFICULTY:Challenge;\n#METER:12;\n#NOTES:\n1000\n0000\n0000\n0000\n;\n\
            #notedata:;\n#STEPSTYPE:dance-double;\n#DIFFICULTY:Easy;\n#METER:3;\n#BPMS:0.000=75.000;\n#NOTES:\n10000000  \r\n;\n";
        let sim = scan(text).unwrap();
        assert_eq!(sim.title, "Song");
        assert_eq!(sim.charts.len(), 2);
        assert_eq!(sim.charts[0].bpms, "0.000=150.000");
        assert_eq!(sim.charts[0].difficulty, Difficulty::Challenge);
        assert_eq!(sim.charts[0].feet, 12);
        assert_eq!(sim.charts[0].notes, "1000\n0000\n0000\n0000");
        assert_eq!(sim.charts[1].notes, "10000000");
        assert_eq!(sim.charts[1].mode, Mode::Double);
        assert_eq!(sim.charts[1].bpms, "0.000=75.000");
        assert_eq!(sim.charts[1].difficulty, Difficulty::Basic);
    }

    #[test]
    fn decodes_cp1252_fallback() {
        let bytes = b"caf\xe9 \x93q\x94";
        assert_eq!(decode_bytes(bytes), "caf\u{e9} \u{201c}q\u{201d}");
        assert!(matches!(decode_bytes(b"plain"), Cow::Borrowed("plain")));
    }
}
