//! Flat records derived from parsed simfiles, shaped for the JSON tables a
//! song browser loads.

use serde::Serialize;

use crate::bpm::BpmRange;
use crate::difficulty::{Difficulty, Mode};
use crate::math::{round_dp, round_half_up};
use crate::radar::{MetricsOptions, compute_chart_metrics};
use crate::simfile::ChartModel;
use crate::speed::{
    CoreRecommendation, MultiplierSet, RangeRecommendation, recommend_for_core,
    recommend_for_range,
};
use crate::timing::last_offset;

/// What the batch tool prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Groove radar table keyed by [`radar_key`].
    #[default]
    Radar,
    /// One [`SongMeta`] per song.
    Meta,
    /// Full parsed chart models.
    Charts,
    /// Speed modifier suggestions per song.
    Speed,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RadarRecord {
    pub steps: u32,
    pub first_note_seconds: f64,
    pub song_seconds: f64,
    pub song_beats: f64,
    pub stream: i64,
    pub voltage: i64,
    pub air: i64,
    pub freeze: i64,
    pub chaos: i64,
}

pub fn radar_key(title: &str, mode: Mode, difficulty: Difficulty) -> String {
    format!("{title}||{mode}||{difficulty}")
}

/// One radar record per chart, in chart order.
pub fn radar_records(model: &ChartModel, options: &MetricsOptions) -> Vec<(String, RadarRecord)> {
    model
        .charts_with_types()
        .map(|(ty, chart)| {
            let m = compute_chart_metrics(chart, ty.mode, options);
            let record = RadarRecord {
                steps: m.steps,
                first_note_seconds: round_dp(m.first_note_seconds, 3),
                song_seconds: round_dp(m.song_seconds, 3),
                song_beats: round_half_up(m.song_beats),
                stream: m.radar.stream,
                voltage: m.radar.voltage,
                air: m.radar.air,
                freeze: m.radar.freeze,
                chaos: m.radar.chaos,
            };
            (radar_key(&model.title, ty.mode, ty.difficulty), record)
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DifficultyEntry {
    pub mode: Mode,
    pub difficulty: Difficulty,
    pub feet: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SongMeta {
    pub path: String,
    pub title: String,
    pub title_translit: String,
    pub artist: String,
    pub game: String,
    pub bpm_min: f64,
    pub bpm_max: f64,
    pub has_multiple_bpms: bool,
    pub difficulties: Vec<DifficultyEntry>,
}

/// The mix folder of a `sm/<Mix>/<Song>.sm` style path.
pub fn game_from_path(rel_path: &str) -> String {
    rel_path
        .split('/')
        .nth(1)
        .filter(|s| !s.is_empty())
        .unwrap_or("Unknown")
        .to_string()
}

/// Distinct positive BPM values across every chart, ascending.
fn distinct_positive_bpms(model: &ChartModel) -> Vec<f64> {
    let mut bpms: Vec<f64> = model
        .charts
        .iter()
        .flat_map(|(_, chart)| chart.bpm.iter().map(|seg| seg.bpm))
        .filter(|&bpm| bpm > 0.0)
        .collect();
    bpms.sort_by(f64::total_cmp);
    bpms.dedup();
    bpms
}

pub fn song_meta(rel_path: &str, model: &ChartModel) -> SongMeta {
    let bpms = distinct_positive_bpms(model);
    SongMeta {
        path: rel_path.to_string(),
        title: model.title.clone(),
        title_translit: model.title_translit.clone(),
        artist: model.artist.clone(),
        game: game_from_path(rel_path),
        bpm_min: bpms.first().copied().unwrap_or(0.0),
        bpm_max: bpms.last().copied().unwrap_or(0.0),
        has_multiple_bpms: bpms.len() > 1,
        difficulties: model
            .available_types
            .iter()
            .map(|ty| DifficultyEntry {
                mode: ty.mode,
                difficulty: ty.difficulty,
                feet: ty.feet,
            })
            .collect(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeedRecord {
    pub path: String,
    pub title: String,
    pub display_bpm: String,
    pub core_bpm: Option<f64>,
    pub range: Option<RangeRecommendation>,
    pub core: Option<CoreRecommendation>,
}

/// Speed suggestions for a song. The core tempo is taken from the first
/// chart; charts of one song share their timing in practice.
pub fn speed_record(rel_path: &str, model: &ChartModel, target: f64, set: MultiplierSet) -> SpeedRecord {
    let core_bpm = model
        .charts_with_types()
        .next()
        .and_then(|(_, chart)| crate::bpm::core_bpm(&chart.tempo_changes, last_offset(chart)));
    SpeedRecord {
        path: rel_path.to_string(),
        title: model.title.clone(),
        display_bpm: model.display_bpm.clone(),
        core_bpm,
        range: BpmRange::from_display(&model.display_bpm)
            .and_then(|range| recommend_for_range(range, target, set)),
        core: core_bpm.and_then(|bpm| recommend_for_core(bpm, target, set)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simfile::parse;

    const SM: &str = "#TITLE:Meta Song;\n#TITLETRANSLIT:Meta;\n#ARTIST:Band;\n\
        #BPMS:0.000=0.000,4.000=150.000,8.000=300.000;\n\
        #NOTES:\ndance-single:\n:\nChallenge:\n14:\n0:\n1000\n0100\n0010\n0001\n,\n1000\n0000\n0000\n0000\n;\n\
        #NOTES:\ndance-double:\n:\nBasic:\n4:\n0:\n10000000\n00000000\n00000000\n00000000\n;\n";

    #[test]
    fn meta_ignores_zero_bpm() {
        let model = parse(SM).unwrap();
        let meta = song_meta("sm/DDR A20/Meta Song.sm", &model);
        assert_eq!(meta.game, "DDR A20");
        assert_eq!(meta.bpm_min, 150.0);
        assert_eq!(meta.bpm_max, 300.0);
        assert!(meta.has_multiple_bpms);
        assert_eq!(meta.difficulties.len(), 2);
        assert_eq!(meta.difficulties[1].mode, Mode::Double);
        assert_eq!(meta.difficulties[1].feet, 4);
    }

    #[test]
    fn game_falls_back_to_unknown() {
        assert_eq!(game_from_path("song.sm"), "Unknown");
    }

    #[test]
    fn radar_records_are_keyed_per_chart() {
        let model = parse(SM).unwrap();
        let records = radar_records(&model, &MetricsOptions::default());
        let keys: Vec<&str> = records.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["Meta Song||single||challenge", "Meta Song||double||basic"]);
        assert_eq!(records[0].1.steps, 5);
        assert_eq!(records[0].1.song_beats, 5.0);

        let json = serde_json::to_value(records[0].1).unwrap();
        assert!(json.get("firstNoteSeconds").is_some());
        assert!(json.get("songBeats").is_some());
    }

    #[test]
    fn speed_record_uses_display_range() {
        let model = parse(SM).unwrap();
        let record = speed_record("sm/X/Meta Song.sm", &model, 600.0, MultiplierSet::Online);
        let range = record.range.unwrap();
        assert_eq!(range.primary.modifier, 2.0);
        assert!(range.primary.is_range);
    }

    #[test]
    fn speed_record_times_tempos_before_merging() {
        let sm = "#TITLE:Drift;\n#BPMS:0=150,16=150.5,32=200;\n\
            #NOTES:\ndance-single:\n:\nHard:\n9:\n0:\n\
            1000\n0000\n0000\n0000\n,\n0000\n,\n0000\n,\n0000\n0000\n0000\n0001\n;\n";
        let model = parse(sm).unwrap();
        assert_eq!(model.chart("single-expert").unwrap().bpm.len(), 2);
        let record = speed_record("sm/X/Drift.sm", &model, 600.0, MultiplierSet::Online);
        assert_eq!(record.core_bpm, Some(200.0));
    }
}
