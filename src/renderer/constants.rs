//! Drawing constants for the renderer backends (page units).

// ── Note dimensions ─────────────────────────────────────────────────
pub(super) const NOTEHEAD_RX: f64 = 5.5; // notehead ellipse x-radius
pub(super) const NOTEHEAD_RY: f64 = 4.0; // notehead ellipse y-radius
pub(super) const STEM_LENGTH: f64 = 30.0;
pub(super) const STEM_WIDTH: f64 = 1.2;
pub(super) const BEAM_THICKNESS: f64 = 4.0;
pub(super) const BEAM_SPACING: f64 = 7.0;
pub(super) const BARLINE_WIDTH: f64 = 1.0;
pub(super) const THICK_BARLINE_WIDTH: f64 = 4.0;
pub(super) const STAFF_LINE_WIDTH: f64 = 0.8;
pub(super) const LEDGER_LINE_WIDTH: f64 = 0.8;
pub(super) const LEDGER_LINE_EXTEND: f64 = 5.0;
pub(super) const DOT_RADIUS: f64 = 1.8;
pub(super) const ACCIDENTAL_OFFSET: f64 = 13.0;
pub(super) const ARTICULATION_GAP: f64 = 10.0;

// ── Glyph sizes ─────────────────────────────────────────────────────
pub(super) const CLEF_GLYPH_SIZE: f64 = 38.0;
pub(super) const ACCIDENTAL_GLYPH_SIZE: f64 = 20.0;
pub(super) const REST_GLYPH_SIZE: f64 = 30.0;
pub(super) const ARTICULATION_GLYPH_SIZE: f64 = 16.0;
pub(super) const TIME_SIG_FONT_SIZE: f64 = 22.0;
pub(super) const TUPLET_FONT_SIZE: f64 = 12.0;

// ── Connectors ──────────────────────────────────────────────────────
pub(super) const BRACE_WIDTH: f64 = 10.0;
pub(super) const BRACKET_WIDTH: f64 = 4.0;

// ── Curves & hairpins ───────────────────────────────────────────────
pub(super) const SLUR_ENDPOINT_THICKNESS: f64 = 0.5;
pub(super) const SLUR_MID_THICKNESS: f64 = 1.5;
pub(super) const SLUR_HEIGHT_FACTOR: f64 = 0.15;
pub(super) const SLUR_MIN_HEIGHT: f64 = 5.0;
pub(super) const SLUR_MAX_HEIGHT: f64 = 25.0;
pub(super) const TIE_HEIGHT_FACTOR: f64 = 0.1;
pub(super) const TIE_MIN_HEIGHT: f64 = 3.0;
pub(super) const TIE_MAX_HEIGHT: f64 = 10.0;
pub(super) const HAIRPIN_HEIGHT: f64 = 10.0;
pub(super) const HYPHEN_LENGTH: f64 = 6.0;

// ── Colors ──────────────────────────────────────────────────────────
pub(super) const NOTE_COLOR: &str = "#1a1a1a";
pub(super) const STAFF_COLOR: &str = "#555555";
pub(super) const TEXT_COLOR: &str = "#1a1a1a";
