//! Layout metrics shared by the converter and the formatter (page units).

// ── Stave modifiers ─────────────────────────────────────────────────
pub(crate) const CLEF_SPACE: f64 = 32.0;
pub(crate) const KEY_SIG_ACCIDENTAL_SPACE: f64 = 10.0;
pub(crate) const TIME_SIG_SPACE: f64 = 24.0;
/// Gap between the stave start (or last modifier) and the first note
pub(crate) const NOTE_PADDING_LEFT: f64 = 12.0;

// ── Text ────────────────────────────────────────────────────────────
/// Average glyph width as a fraction of the font size
pub(crate) const TEXT_CHAR_WIDTH_FACTOR: f64 = 0.55;
pub(crate) const LABEL_PADDING: f64 = 10.0;
pub(crate) const LYRICS_OFFSET_BELOW_STAVE: f64 = 30.0;
pub(crate) const LYRICS_LINE_FACTOR: f64 = 1.2;
pub(crate) const ANNOTATION_OFFSET: f64 = 15.0;
pub(crate) const HAIRPIN_OFFSET: f64 = 25.0;
pub(crate) const MEASURE_NUMBER_OFFSET: f64 = 8.0;

// ── Curves ──────────────────────────────────────────────────────────
/// Vertical gap between a notehead and a tie/slur end
pub(crate) const CURVE_NOTEHEAD_OFFSET: f64 = 5.0;
/// Horizontal inset of a tie end from the notehead centre
pub(crate) const TIE_X_INSET: f64 = 6.0;

/// Estimate the rendered width of a text string for a given font size.
pub(crate) fn estimate_text_width(text: &str, font_size: f64) -> f64 {
    text.chars().count() as f64 * font_size * TEXT_CHAR_WIDTH_FACTOR
}
