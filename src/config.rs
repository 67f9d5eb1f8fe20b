//! Conversion options.
//!
//! All values are plain configuration with documented defaults. They can be
//! built in code (`Options::default()` plus field updates) or loaded from a
//! JSON object where every field is optional.

use serde::{Deserialize, Serialize};

use crate::error::{ConvertError, Result};

/// How staff labels are printed at the start of each system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LabelMode {
    /// No labels
    #[default]
    Off,
    /// `@label` on the first system, `@label.abbr` afterwards
    Full,
    /// `@label.abbr` on every system
    Abbreviated,
}

/// Font used for a family of text annotations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontSpec {
    pub family: String,
    pub size: f64,
    /// "normal" or "bold"
    pub weight: String,
    /// "normal" or "italic"
    pub style: String,
}

impl FontSpec {
    pub fn new(family: &str, size: f64, weight: &str, style: &str) -> Self {
        Self {
            family: family.to_string(),
            size,
            weight: weight.to_string(),
            style: style.to_string(),
        }
    }
}

impl Default for FontSpec {
    fn default() -> Self {
        FontSpec::new("Times", 15.0, "normal", "normal")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    // ── Page ────────────────────────────────────────────────────────
    pub page_width: f64,
    pub page_margin_top: f64,
    pub page_margin_left: f64,
    pub page_margin_right: f64,

    // ── Staves ──────────────────────────────────────────────────────
    /// Distance between two stave lines
    pub stave_line_spacing: f64,
    /// Distance from the top to the bottom stave line
    pub stave_height: f64,
    /// Vertical gap between the last stave of a system and the next system
    pub system_spacing: f64,
    /// Gap between the bottom line of one staff and the top line of the
    /// next within a system (a staffDef `@spacing` overrides it)
    pub staff_spacing: f64,
    pub measure_padding_right: f64,

    // ── Optional draw steps ─────────────────────────────────────────
    pub label_mode: LabelMode,
    pub auto_stave_connector: bool,
    pub auto_measure_numbers: bool,

    // ── Text ────────────────────────────────────────────────────────
    pub lyrics_font: FontSpec,
    pub annotation_font: FontSpec,
    pub dynamics_font: FontSpec,
    pub staff_label_font: FontSpec,
    pub tempo_font: FontSpec,
    pub max_hyphen_distance: f64,

    /// Trace the document walk through `log::debug!`
    pub verbose: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            page_width: 800.0,
            page_margin_top: 60.0,
            page_margin_left: 20.0,
            page_margin_right: 20.0,
            stave_line_spacing: 10.0,
            stave_height: 40.0,
            system_spacing: 90.0,
            staff_spacing: 60.0,
            measure_padding_right: 10.0,
            label_mode: LabelMode::Off,
            auto_stave_connector: true,
            auto_measure_numbers: false,
            lyrics_font: FontSpec::new("Times", 15.0, "normal", "normal"),
            annotation_font: FontSpec::new("Times", 15.0, "normal", "normal"),
            dynamics_font: FontSpec::new("Times", 18.0, "bold", "italic"),
            staff_label_font: FontSpec::new("Times", 16.0, "normal", "normal"),
            tempo_font: FontSpec::new("Times", 17.0, "bold", "normal"),
            max_hyphen_distance: 75.0,
            verbose: false,
        }
    }
}

impl Options {
    /// Load options from a JSON object. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Options> {
        let options: Options =
            serde_json::from_str(json).map_err(|e| ConvertError::InvalidOptions(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_width <= self.page_margin_left + self.page_margin_right {
            return Err(ConvertError::InvalidOptions(format!(
                "page_width {} leaves no printable space",
                self.page_width
            )));
        }
        if self.stave_line_spacing <= 0.0 || self.stave_height <= 0.0 {
            return Err(ConvertError::InvalidOptions(
                "stave dimensions must be positive".to_string(),
            ));
        }
        if self.max_hyphen_distance <= 0.0 {
            return Err(ConvertError::InvalidOptions(
                "max_hyphen_distance must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Printable width between the page margins.
    pub fn print_width(&self) -> f64 {
        self.page_width - self.page_margin_left - self.page_margin_right
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let options =
            Options::from_json(r#"{ "page_width": 1000, "label_mode": "abbreviated" }"#).unwrap();
        assert_eq!(options.page_width, 1000.0);
        assert_eq!(options.label_mode, LabelMode::Abbreviated);
        assert_eq!(options.system_spacing, 90.0);
        assert!(options.auto_stave_connector);
        assert_eq!(options.print_width(), 960.0);
    }

    #[test]
    fn rejects_unusable_page() {
        let err = Options::from_json(r#"{ "page_width": 30 }"#).unwrap_err();
        assert_eq!(err.code(), "invalid-options");
    }
}
