use std::fmt;

use serde::Serialize;

/// Play style of a chart. Determines the lane count of every note row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Single,
    Double,
}

impl Mode {
    /// Parses a `#STEPSTYPE` / `#NOTES` style string such as `dance-single`.
    /// Only the first `dance-` is stripped; anything other than single or
    /// double (couple, solo, lights-cabinet, pump-*) yields `None`.
    pub fn from_steps_type(raw: &str) -> Option<Self> {
        let stripped = raw.replacen("dance-", "", 1);
        match stripped.trim() {
            "single" => Some(Self::Single),
            "double" => Some(Self::Double),
            _ => None,
        }
    }

    pub const fn lanes(self) -> usize {
        match self {
            Self::Single => 4,
            Self::Double => 8,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Double => "double",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical difficulty tier shared by every game version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Basic,
    Difficult,
    Expert,
    Challenge,
    Edit,
}

impl Difficulty {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Basic => "basic",
            Self::Difficult => "difficult",
            Self::Expert => "expert",
            Self::Challenge => "challenge",
            Self::Edit => "edit",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Labels seen across mixes, lowercase. Note that a raw "difficult" is the
// old name of the 4th tier and maps to expert, not difficult.
static DIFFICULTY_ALIASES: &[(&str, Difficulty)] = &[
    ("beginner", Difficulty::Beginner),
    ("easy", Difficulty::Basic),
    ("basic", Difficulty::Basic),
    ("light", Difficulty::Basic),
    ("trick", Difficulty::Difficult),
    ("another", Difficulty::Difficult),
    ("medium", Difficulty::Difficult),
    ("standard", Difficulty::Difficult),
    ("difficult", Difficulty::Expert),
    ("expert", Difficulty::Expert),
    ("maniac", Difficulty::Expert),
    ("ssr", Difficulty::Expert),
    ("hard", Difficulty::Expert),
    ("heavy", Difficulty::Expert),
    ("challenge", Difficulty::Challenge),
    ("smaniac", Difficulty::Challenge),
    ("oni", Difficulty::Challenge),
    ("edit", Difficulty::Edit),
];

/// Maps a raw difficulty label onto its tier, ignoring case and
/// surrounding whitespace. Unknown labels give `None`; such charts are dropped.
pub fn normalize_difficulty(raw: &str) -> Option<Difficulty> {
    let key = raw.trim().to_ascii_lowercase();
    DIFFICULTY_ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|&(_, difficulty)| difficulty)
}

/// The `"{mode}-{difficulty}"` key of a chart.
pub fn chart_slug(mode: Mode, difficulty: Difficulty) -> String {
    format!("{mode}-{difficulty}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_known_labels_case_insensitively() {
        assert_eq!(normalize_difficulty("SMANIAC"), Some(Difficulty::Challenge));
        assert_eq!(normalize_difficulty("smaniac"), Some(Difficulty::Challenge));
        assert_eq!(normalize_difficulty("Another"), Some(Difficulty::Difficult));
        assert_eq!(normalize_difficulty("Hard"), Some(Difficulty::Expert));
        assert_eq!(normalize_difficulty("Difficult"), Some(Difficulty::Expert));
        assert_eq!(normalize_difficulty(" Beginner "), Some(Difficulty::Beginner));
        assert_eq!(normalize_difficulty("Edit"), Some(Difficulty::Edit));
    }

    #[test]
    fn unknown_labels_are_dropped() {
        assert_eq!(normalize_difficulty("foobar"), None);
        assert_eq!(normalize_difficulty(""), None);
    }

    #[test]
    fn mode_from_steps_type() {
        assert_eq!(Mode::from_steps_type("dance-single"), Some(Mode::Single));
        assert_eq!(Mode::from_steps_type("dance-double"), Some(Mode::Double));
        assert_eq!(Mode::from_steps_type("single"), Some(Mode::Single));
        assert_eq!(Mode::from_steps_type("dance-couple"), None);
        assert_eq!(Mode::from_steps_type("pump-single"), None);
        assert_eq!(Mode::Double.lanes(), 8);
    }

    #[test]
    fn slug_format() {
        assert_eq!(chart_slug(Mode::Double, Difficulty::Challenge), "double-challenge");
    }
}
