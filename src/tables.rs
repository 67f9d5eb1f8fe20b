//! Fixed lookup tables: MEI attribute values → notation symbols.

use serde::Serialize;

use crate::error::{ConvertError, Result};

// ─── Durations ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationCode {
    Breve,
    Whole,
    Half,
    Quarter,
    Eighth,
    #[serde(rename = "16th")]
    Sixteenth,
    #[serde(rename = "32nd")]
    ThirtySecond,
    #[serde(rename = "64th")]
    SixtyFourth,
}

impl DurationCode {
    pub fn from_mei(value: &str) -> Result<Self> {
        Ok(match value.trim() {
            "breve" => DurationCode::Breve,
            "1" => DurationCode::Whole,
            "2" => DurationCode::Half,
            "4" => DurationCode::Quarter,
            "8" => DurationCode::Eighth,
            "16" => DurationCode::Sixteenth,
            "32" => DurationCode::ThirtySecond,
            "64" => DurationCode::SixtyFourth,
            other => return Err(ConvertError::value("duration", other)),
        })
    }

    /// Length relative to a whole note.
    pub fn whole_fraction(self) -> f64 {
        match self {
            DurationCode::Breve => 2.0,
            DurationCode::Whole => 1.0,
            DurationCode::Half => 0.5,
            DurationCode::Quarter => 0.25,
            DurationCode::Eighth => 0.125,
            DurationCode::Sixteenth => 0.0625,
            DurationCode::ThirtySecond => 0.03125,
            DurationCode::SixtyFourth => 0.015625,
        }
    }

    /// Number of beams/flags the duration carries.
    pub fn flag_count(self) -> u8 {
        match self {
            DurationCode::Eighth => 1,
            DurationCode::Sixteenth => 2,
            DurationCode::ThirtySecond => 3,
            DurationCode::SixtyFourth => 4,
            _ => 0,
        }
    }

    pub fn has_stem(self) -> bool {
        !matches!(self, DurationCode::Breve | DurationCode::Whole)
    }

    pub fn filled_head(self) -> bool {
        !matches!(
            self,
            DurationCode::Breve | DurationCode::Whole | DurationCode::Half
        )
    }
}

/// Multiplier applied by `dots` augmentation dots (1 → 1.5, 2 → 1.75).
pub fn dots_factor(dots: u8) -> f64 {
    2.0 - 0.5f64.powi(dots as i32)
}

// ─── Accidentals ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Accidental {
    Sharp,
    Flat,
    Natural,
    DoubleSharp,
    DoubleFlat,
}

impl Accidental {
    pub fn from_mei(value: &str) -> Result<Self> {
        Ok(match value.trim() {
            "s" => Accidental::Sharp,
            "f" => Accidental::Flat,
            "n" => Accidental::Natural,
            "ss" | "x" => Accidental::DoubleSharp,
            "ff" => Accidental::DoubleFlat,
            other => return Err(ConvertError::value("accidental", other)),
        })
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Accidental::Sharp => "\u{266F}",
            Accidental::Flat => "\u{266D}",
            Accidental::Natural => "\u{266E}",
            Accidental::DoubleSharp => "\u{1D12A}",
            Accidental::DoubleFlat => "\u{1D12B}",
        }
    }
}

// ─── Barlines ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum BarlineKind {
    #[default]
    Single,
    Double,
    End,
    RepeatStart,
    RepeatEnd,
    RepeatBoth,
    Invisible,
}

impl BarlineKind {
    pub fn from_mei(value: &str) -> Result<Self> {
        Ok(match value.trim() {
            "single" | "dashed" | "dotted" => BarlineKind::Single,
            "dbl" => BarlineKind::Double,
            "end" => BarlineKind::End,
            "rptstart" => BarlineKind::RepeatStart,
            "rptend" => BarlineKind::RepeatEnd,
            "rptboth" => BarlineKind::RepeatBoth,
            "invis" => BarlineKind::Invisible,
            other => return Err(ConvertError::value("barline", other)),
        })
    }
}

// ─── Key signatures ──────────────────────────────────────────────────

const MAJOR_KEYS: [&str; 15] = [
    "Cb", "Gb", "Db", "Ab", "Eb", "Bb", "F", "C", "G", "D", "A", "E", "B", "F#", "C#",
];

/// Major key name for a number of fifths (-7..=7).
pub fn major_key_name(fifths: i8) -> Option<&'static str> {
    let idx = fifths as i32 + 7;
    if (0..15).contains(&idx) {
        Some(MAJOR_KEYS[idx as usize])
    } else {
        None
    }
}

/// Parse MEI `@key.sig` ("0", "3s", "2f") into a fifths count.
pub fn parse_key_sig(value: &str) -> Result<i8> {
    let v = value.trim();
    if v == "0" {
        return Ok(0);
    }
    let (count, sign) = if let Some(count) = v.strip_suffix('s') {
        (count, 1)
    } else if let Some(count) = v.strip_suffix('f') {
        (count, -1)
    } else {
        return Err(ConvertError::value("key signature", value));
    };
    let n: i8 = count
        .parse()
        .map_err(|_| ConvertError::value("key signature", value))?;
    if !(0..=7).contains(&n) {
        return Err(ConvertError::value("key signature", value));
    }
    Ok(sign * n)
}

// ─── Articulations ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Articulation {
    Staccato,
    Staccatissimo,
    Tenuto,
    Accent,
    Marcato,
    Spiccato,
}

impl Articulation {
    pub fn from_mei(value: &str) -> Result<Self> {
        Ok(match value.trim() {
            "stacc" => Articulation::Staccato,
            "stacciss" => Articulation::Staccatissimo,
            "ten" => Articulation::Tenuto,
            "acc" => Articulation::Accent,
            "marc" => Articulation::Marcato,
            "spicc" => Articulation::Spiccato,
            other => return Err(ConvertError::value("articulation", other)),
        })
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Articulation::Staccato => "\u{00B7}",
            Articulation::Staccatissimo => "\u{02C8}",
            Articulation::Tenuto => "\u{2013}",
            Articulation::Accent => ">",
            Articulation::Marcato => "^",
            Articulation::Spiccato => "\u{25BE}",
        }
    }
}

/// Diatonic index of a pitch name (c = 0 … b = 6).
pub fn step_index(pname: &str) -> Result<i32> {
    Ok(match pname.trim().to_ascii_lowercase().as_str() {
        "c" => 0,
        "d" => 1,
        "e" => 2,
        "f" => 3,
        "g" => 4,
        "a" => 5,
        "b" => 6,
        other => return Err(ConvertError::value("pitch name", other)),
    })
}
