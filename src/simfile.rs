use std::fs;
use std::io;
use std::path::Path;

use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};

use crate::bpm::{BpmSegment, Stop, display_bpm, parse_bpms, parse_stops, tempo_segments};
use crate::difficulty::{Difficulty, Mode, chart_slug};
use crate::error::{ParseError, SimfileError};
use crate::notes::{Arrow, ChartLabel, Freeze, parse_chart_notes};
use crate::parse::{decode_bytes, scan};

/// Identifies one chart of a song.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartType {
    pub slug: String,
    pub mode: Mode,
    pub difficulty: Difficulty,
    pub feet: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartDetail {
    pub arrows: Vec<Arrow>,
    pub freezes: Vec<Freeze>,
    pub bpm: Vec<BpmSegment>,
    /// Tempo changes as listed, before similar tempos are merged.
    #[serde(skip)]
    pub tempo_changes: Vec<BpmSegment>,
    pub stops: Vec<Stop>,
    /// Note body as written in the file. Voltage is computed from this.
    pub notes: String,
}

/// Charts keyed by slug, in the order they first appeared in the file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChartMap {
    entries: Vec<(String, ChartDetail)>,
}

impl ChartMap {
    pub fn get(&self, slug: &str) -> Option<&ChartDetail> {
        self.entries
            .iter()
            .find(|(key, _)| key == slug)
            .map(|(_, detail)| detail)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ChartDetail)> {
        self.entries.iter().map(|(key, detail)| (key.as_str(), detail))
    }

    /// Inserts or replaces in place. Returns whether the slug was new.
    fn upsert(&mut self, slug: &str, detail: ChartDetail) -> bool {
        if let Some(slot) = self.entries.iter_mut().find(|(key, _)| key == slug) {
            slot.1 = detail;
            false
        } else {
            self.entries.push((slug.to_string(), detail));
            true
        }
    }
}

impl Serialize for ChartMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (slug, detail) in &self.entries {
            map.serialize_entry(slug, detail)?;
        }
        map.end()
    }
}

/// A parsed simfile: song metadata plus every single/double chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartModel {
    pub title: String,
    pub title_translit: String,
    pub artist: String,
    pub banner: Option<String>,
    pub music_file: Option<String>,
    pub display_bpm: String,
    pub available_types: Vec<ChartType>,
    pub charts: ChartMap,
}

impl ChartModel {
    pub fn chart(&self, slug: &str) -> Option<&ChartDetail> {
        self.charts.get(slug)
    }

    /// Every chart next to its type, in file order.
    pub fn charts_with_types(&self) -> impl Iterator<Item = (&ChartType, &ChartDetail)> {
        self.available_types
            .iter()
            .filter_map(|ty| self.charts.get(&ty.slug).map(|detail| (ty, detail)))
    }

    /// A later chart with the same slug replaces the earlier one but keeps
    /// its position.
    fn insert(&mut self, ty: ChartType, detail: ChartDetail) {
        if self.charts.upsert(&ty.slug, detail) {
            self.available_types.push(ty);
        } else if let Some(existing) = self.available_types.iter_mut().find(|t| t.slug == ty.slug) {
            *existing = ty;
        }
    }

    fn all_bpms(&self) -> Vec<f64> {
        self.charts
            .iter()
            .flat_map(|(_, detail)| detail.bpm.iter().map(|seg| seg.bpm))
            .collect()
    }
}

/// Parses `.sm` or `.ssc` text. Any failure is reported with the start of
/// the input attached.
pub fn parse(text: &str) -> Result<ChartModel, SimfileError> {
    build_model(text).map_err(|source| SimfileError::new(source, text))
}

fn build_model(text: &str) -> Result<ChartModel, ParseError> {
    let raw = scan(text)?;
    let mut model = ChartModel {
        title: raw.title,
        title_translit: raw.title_translit,
        artist: raw.artist,
        banner: raw.banner,
        music_file: raw.music,
        display_bpm: String::new(),
        available_types: Vec::with_capacity(raw.charts.len()),
        charts: ChartMap::default(),
    };

    for chart in &raw.charts {
        let lines = chart.note_lines();
        let label = ChartLabel {
            title: &model.title,
            mode: chart.mode.as_str(),
            difficulty: chart.difficulty.as_str(),
        };
        let body = parse_chart_notes(&lines, chart.mode, label)?;

        let detail = ChartDetail {
            arrows: body.arrows,
            freezes: body.freezes,
            bpm: parse_bpms(&chart.bpms, body.measures_skipped),
            tempo_changes: tempo_segments(&chart.bpms, body.measures_skipped),
            stops: parse_stops(&chart.stops, body.measures_skipped),
            notes: chart.notes.clone(),
        };
        let ty = ChartType {
            slug: chart_slug(chart.mode, chart.difficulty),
            mode: chart.mode,
            difficulty: chart.difficulty,
            feet: chart.feet,
        };
        model.insert(ty, detail);
    }

    model.display_bpm = display_bpm(&model.all_bpms());
    Ok(model)
}

fn check_extension(path: &Path) -> io::Result<()> {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "Missing file extension (must be .sm or .ssc)",
        ));
    };
    if ext.eq_ignore_ascii_case("sm") || ext.eq_ignore_ascii_case("ssc") {
        Ok(())
    } else {
        Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "Unsupported file extension (must be .sm or .ssc)",
        ))
    }
}

/// Reads the text of a `.sm` or `.ssc` file.
pub fn read_text(path: impl AsRef<Path>) -> Result<String, ParseError> {
    let path = path.as_ref();
    check_extension(path)?;
    let data = fs::read(path)?;
    Ok(decode_bytes(&data).into_owned())
}

/// Reads and parses a `.sm` or `.ssc` file.
pub fn open(path: impl AsRef<Path>) -> Result<ChartModel, SimfileError> {
    let path = path.as_ref();
    let text = read_text(path)
        .map_err(|source| SimfileError::new(source, &path.display().to_string()))?;
    parse(&text)
}
