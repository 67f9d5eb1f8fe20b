//! Renderer-agnostic layout model produced by the converter.
//!
//! Everything a drawing backend needs: stave descriptors, voices of
//! tickables, beam and tuplet groupings, resolved curve and hairpin
//! segments, and positioned text. All coordinates are in page units.

use serde::Serialize;

use crate::config::FontSpec;
use crate::staff_info::{Clef, KeySignature, Meter};
use crate::system::System;
use crate::tables::{Accidental, Articulation, BarlineKind, DurationCode};

/// The complete result of a conversion.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreLayout {
    pub page_width: f64,
    /// Bottom of the last system plus the top margin
    pub height: f64,
    pub systems: Vec<System>,
    /// Ties and slurs, possibly split at system breaks
    pub curves: Vec<CurveSegment>,
    pub hairpins: Vec<HairpinSegment>,
    pub texts: Vec<TextDescriptor>,
    pub hyphens: Vec<HyphenDescriptor>,
}

impl ScoreLayout {
    pub fn measure_count(&self) -> usize {
        self.systems.iter().map(|s| s.measures.len()).sum()
    }

    /// Texts of one kind, in emission order.
    pub fn texts_of(&self, kind: TextKind) -> impl Iterator<Item = &TextDescriptor> {
        self.texts.iter().filter(move |t| t.kind == kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

// ─── Staves ──────────────────────────────────────────────────────────

/// One staff within one measure.
#[derive(Debug, Clone, Serialize)]
pub struct Stave {
    pub staff_n: u32,
    pub x: f64,
    /// Y of the top stave line
    pub y: f64,
    pub width: f64,
    pub line_spacing: f64,
    /// Clef, key and meter in force
    pub clef: Clef,
    pub key: KeySignature,
    pub meter: Meter,
    /// Modifiers drawn at the start of this stave
    pub show_clef: bool,
    pub show_keysig: bool,
    pub show_timesig: bool,
    pub left_barline: BarlineKind,
    pub right_barline: BarlineKind,
    /// Horizontal range available to notes once modifiers are placed
    pub note_start_x: f64,
    pub note_end_x: f64,
}

impl Stave {
    /// Y of a diatonic position (octave * 7 + step) under this stave's clef.
    pub fn y_for_position(&self, position: i32) -> f64 {
        let steps_below_top = self.clef.top_line_position() - position;
        self.y + steps_below_top as f64 * self.line_spacing / 2.0
    }

    /// Diatonic position of the middle line.
    pub fn middle_position(&self) -> i32 {
        self.clef.top_line_position() - 4
    }

    pub fn bottom_y(&self) -> f64 {
        self.y + 4.0 * self.line_spacing
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorKind {
    /// Thin line joining all staves at the system start
    Single,
    Brace,
    Bracket,
}

#[derive(Debug, Clone, Serialize)]
pub struct StaveConnector {
    pub kind: ConnectorKind,
    pub first_staff: u32,
    pub last_staff: u32,
    /// Barlines run through the group
    pub bar_thru: bool,
}

// ─── Tickables ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TickableKind {
    Note,
    Chord,
    Rest,
    MeasureRest,
    /// Invisible, occupies time only
    Space,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StemDirection {
    Up,
    Down,
}

impl StemDirection {
    pub fn opposite(self) -> Self {
        match self {
            StemDirection::Up => StemDirection::Down,
            StemDirection::Down => StemDirection::Up,
        }
    }
}

/// One notehead of a note or chord.
#[derive(Debug, Clone, Serialize)]
pub struct NoteKey {
    /// Id of the `<note>` element carrying this pitch
    pub id: String,
    pub pname: String,
    pub oct: i32,
    /// Diatonic position (octave * 7 + step)
    pub position: i32,
    pub accid: Option<Accidental>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WordPos {
    /// Initial syllable
    I,
    /// Medial syllable
    M,
    /// Terminal syllable
    T,
}

#[derive(Debug, Clone, Serialize)]
pub struct Syllable {
    pub verse: u32,
    pub text: String,
    pub wordpos: Option<WordPos>,
}

/// A note, chord, rest or space placed in a voice.
#[derive(Debug, Clone, Serialize)]
pub struct Tickable {
    pub id: String,
    pub kind: TickableKind,
    pub duration: DurationCode,
    pub dots: u8,
    /// Effective length in beats of the meter unit (tuplets applied)
    pub beats: f64,
    /// Start within the measure, in beats from 0
    pub onset: f64,
    /// Staff the tickable is drawn on (differs from the voice for
    /// cross-staff notes)
    pub staff_n: u32,
    pub keys: Vec<NoteKey>,
    pub stem: StemDirection,
    pub x: f64,
    /// One y per key; rests and spaces carry a single y
    pub ys: Vec<f64>,
    pub articulations: Vec<Articulation>,
    pub syllables: Vec<Syllable>,
    /// Index of the beam group containing this tickable
    pub beam: Option<usize>,
}

impl Tickable {
    pub fn is_pitched(&self) -> bool {
        matches!(self.kind, TickableKind::Note | TickableKind::Chord)
    }

    /// Y of the notehead furthest in the given direction.
    pub fn extreme_y(&self, direction: StemDirection) -> f64 {
        let ys = self.ys.iter().copied();
        match direction {
            StemDirection::Up => ys.fold(f64::INFINITY, f64::min),
            StemDirection::Down => ys.fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BeamGroup {
    /// Indices into the voice's tickables
    pub tickables: Vec<usize>,
    pub stem: StemDirection,
}

#[derive(Debug, Clone, Serialize)]
pub struct TupletGroup {
    pub num: u32,
    pub numbase: u32,
    pub tickables: Vec<usize>,
}

/// One `<layer>` of one `<staff>` in one measure.
#[derive(Debug, Clone, Serialize)]
pub struct Voice {
    pub staff_n: u32,
    pub layer_n: u32,
    pub tickables: Vec<Tickable>,
    pub beams: Vec<BeamGroup>,
    pub tuplets: Vec<TupletGroup>,
}

impl Voice {
    pub fn new(staff_n: u32, layer_n: u32) -> Self {
        Self {
            staff_n,
            layer_n,
            tickables: Vec::new(),
            beams: Vec::new(),
            tuplets: Vec::new(),
        }
    }

    /// Sum of tickable durations.
    pub fn total_beats(&self) -> f64 {
        self.tickables.iter().map(|t| t.beats).sum()
    }
}

/// Text anchored to a beat position of a staff (`<anchoredText>`).
#[derive(Debug, Clone, Serialize)]
pub struct AnchoredText {
    pub staff_n: u32,
    pub onset: f64,
    pub text: String,
    pub place: Place,
}

// ─── Links ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Place {
    Above,
    Below,
}

impl Place {
    pub fn from_mei(value: Option<&str>, default: Place) -> Place {
        match value {
            Some("above") => Place::Above,
            Some("below") => Place::Below,
            _ => default,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CurveKind {
    Tie,
    Slur,
}

/// Which part of a link a segment draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SegmentPart {
    /// Both ends on notes in the same system
    Whole,
    /// Leaves the first note and runs off the right edge of its system
    Start,
    /// Enters from the left edge and ends on the last note
    End,
}

#[derive(Debug, Clone, Serialize)]
pub struct CurveSegment {
    pub kind: CurveKind,
    /// Id of the `<tie>`/`<slur>` element, when the link came from one
    pub element_id: Option<String>,
    pub first_note: Option<String>,
    pub last_note: Option<String>,
    pub system: usize,
    pub part: SegmentPart,
    pub start: Point,
    pub end: Point,
    /// Side of the noteheads the curve bulges towards
    pub direction: Place,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HairpinForm {
    Crescendo,
    Diminuendo,
}

#[derive(Debug, Clone, Serialize)]
pub struct HairpinSegment {
    pub form: HairpinForm,
    pub place: Place,
    pub system: usize,
    pub part: SegmentPart,
    pub start_x: f64,
    pub end_x: f64,
    pub y: f64,
}

// ─── Text ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextKind {
    Directive,
    Dynamic,
    Tempo,
    AnchoredText,
    Lyric,
    StaffLabel,
    MeasureNumber,
    Ending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAnchor {
    Start,
    Middle,
    End,
}

#[derive(Debug, Clone, Serialize)]
pub struct TextDescriptor {
    pub kind: TextKind,
    pub system: usize,
    pub x: f64,
    pub y: f64,
    pub text: String,
    pub font: FontSpec,
    pub anchor: TextAnchor,
}

#[derive(Debug, Clone, Serialize)]
pub struct HyphenDescriptor {
    pub system: usize,
    pub start_x: f64,
    pub end_x: f64,
    pub y: f64,
}
