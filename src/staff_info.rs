//! Per-staff rendering state derived from `staffDef`/`scoreDef` attributes.
//!
//! A [`StaffInfo`] lives for the whole piece. Later `staffDef`s for the same
//! staff number update it in place, and whichever of clef, key signature and
//! time signature actually changed is scheduled to be shown on the next
//! stave. Checking a pending flag clears it.

use serde::Serialize;

use crate::error::{ConvertError, Result};
use crate::mei::AttributeMap;
use crate::tables::{major_key_name, parse_key_sig};

// ─── Clef ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Clef {
    Treble,
    Bass,
    Alto,
    Tenor,
    /// Treble clef sounding an octave lower (G clef with an 8 below)
    OctaveTreble,
}

impl Clef {
    /// Decision table over shape, line and octave displacement.
    pub fn from_attributes(
        shape: &str,
        line: &str,
        dis: Option<&str>,
        dis_place: Option<&str>,
    ) -> Result<Clef> {
        let line: u32 = line
            .trim()
            .parse()
            .map_err(|_| ConvertError::value("clef line", line))?;
        let clef = match (shape.trim(), line, dis, dis_place) {
            ("G", 2, None, _) => Clef::Treble,
            ("G", 2, Some("8"), Some("below")) => Clef::OctaveTreble,
            ("F", 4, None, _) => Clef::Bass,
            ("C", 3, None, _) => Clef::Alto,
            ("C", 4, None, _) => Clef::Tenor,
            _ => {
                let desc = match dis {
                    Some(d) => format!("{shape}{line} dis {d} {}", dis_place.unwrap_or("")),
                    None => format!("{shape}{line}"),
                };
                return Err(ConvertError::value("clef", desc.trim()));
            }
        };
        Ok(clef)
    }

    /// Diatonic position (octave * 7 + step) of the top stave line.
    pub fn top_line_position(self) -> i32 {
        match self {
            Clef::Treble => 5 * 7 + 3,       // F5
            Clef::OctaveTreble => 4 * 7 + 3, // F4
            Clef::Bass => 3 * 7 + 5,         // A3
            Clef::Alto => 4 * 7 + 4,         // G4
            Clef::Tenor => 4 * 7 + 2,        // E4
        }
    }

    /// Staff steps (half line-spacings) below the top line at which the
    /// accidentals of a key signature sit, in order of appearance.
    pub fn key_signature_steps(self, fifths: i8) -> Vec<i32> {
        // Treble positions; other clefs move them by whole octaves
        const SHARPS: [i32; 7] = [38, 35, 39, 36, 33, 37, 34];
        const FLATS: [i32; 7] = [34, 37, 33, 36, 32, 35, 31];
        let treble_top = Clef::Treble.top_line_position();
        let top = self.top_line_position();
        let shift = ((treble_top - top) as f64 / 7.0).round() as i32 * 7;
        let table = if fifths >= 0 { SHARPS } else { FLATS };
        table
            .iter()
            .take(fifths.unsigned_abs() as usize)
            .map(|p| top - (p - shift))
            .collect()
    }
}

// ─── Key signature & meter ──────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeySignature {
    /// Number of sharps (positive) or flats (negative)
    pub fifths: i8,
    pub mode: Option<String>,
}

impl KeySignature {
    /// Major key name, e.g. "Bb".
    pub fn name(&self) -> &'static str {
        major_key_name(self.fifths).unwrap_or("C")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Meter {
    pub count: u32,
    pub unit: u32,
    /// "common" or "cut"
    pub sym: Option<String>,
}

impl Meter {
    /// Beats (in units of `unit`) that fill one measure.
    pub fn measure_beats(&self) -> f64 {
        self.count as f64
    }
}

impl Default for Meter {
    fn default() -> Self {
        Self {
            count: 4,
            unit: 4,
            sym: None,
        }
    }
}

// ─── StaffInfo ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct RenderWith {
    clef: bool,
    keysig: bool,
    timesig: bool,
}

#[derive(Debug, Clone)]
pub struct StaffInfo {
    staff_n: u32,
    atts: AttributeMap,
    clef: Clef,
    key: KeySignature,
    meter: Meter,
    spacing: Option<f64>,
    label: Option<String>,
    label_abbr: Option<String>,
    render_with: RenderWith,
}

impl StaffInfo {
    /// First sighting of a staff: every modifier is pending.
    pub fn new(staff_n: u32, atts: AttributeMap) -> Result<Self> {
        let mut info = StaffInfo {
            staff_n,
            atts,
            clef: Clef::Treble,
            key: KeySignature {
                fifths: 0,
                mode: None,
            },
            meter: Meter::default(),
            spacing: None,
            label: None,
            label_abbr: None,
            render_with: RenderWith {
                clef: true,
                keysig: true,
                timesig: true,
            },
        };
        info.derive()?;
        Ok(info)
    }

    /// Merge a later definition into this one. Categories whose attribute
    /// values differ from the stored ones are forced to show again; the
    /// other pending flags are left as they were.
    pub fn update_def(&mut self, new_atts: AttributeMap) -> Result<()> {
        let mut changed = RenderWith::default();
        for (name, value) in &new_atts {
            if self.atts.get(name) == Some(value) {
                continue;
            }
            match attribute_category(name) {
                Some(Category::Clef) => changed.clef = true,
                Some(Category::Key) => changed.keysig = true,
                Some(Category::Meter) => changed.timesig = true,
                None => {}
            }
        }
        self.atts.extend(new_atts);
        self.derive()?;

        self.render_with.clef |= changed.clef;
        self.render_with.keysig |= changed.keysig;
        self.render_with.timesig |= changed.timesig;
        Ok(())
    }

    fn derive(&mut self) -> Result<()> {
        let a = &self.atts;
        self.clef = Clef::from_attributes(
            a.get("clef.shape").map_or("G", String::as_str),
            a.get("clef.line").map_or("2", String::as_str),
            a.get("clef.dis").map(String::as_str),
            a.get("clef.dis.place").map(String::as_str),
        )?;
        self.key = KeySignature {
            fifths: parse_key_sig(a.get("key.sig").map_or("0", String::as_str))?,
            mode: a.get("key.mode").cloned(),
        };
        self.meter = Meter {
            count: parse_meter_number(a, "meter.count", 4)?,
            unit: parse_meter_number(a, "meter.unit", 4)?,
            sym: a.get("meter.sym").cloned(),
        };
        self.spacing = match a.get("spacing") {
            Some(s) => Some(parse_spacing(s)?),
            None => None,
        };
        self.label = a.get("label").cloned();
        self.label_abbr = a.get("label.abbr").cloned();
        Ok(())
    }

    /// New section: clef, key and time all reappear.
    pub fn force_section_start_info(&mut self) {
        self.render_with = RenderWith {
            clef: true,
            keysig: true,
            timesig: true,
        };
    }

    /// New system: clef and key reappear, time stays as it was.
    pub fn force_stave_start_info(&mut self) {
        self.render_with.clef = true;
        self.render_with.keysig = true;
    }

    /// True when the clef has to be drawn on the stave being created.
    /// Clears the pending flag.
    pub fn show_clef_check(&mut self) -> bool {
        let pending = std::mem::take(&mut self.render_with.clef);
        pending && self.visible("clef.visible")
    }

    pub fn show_keysig_check(&mut self) -> bool {
        let pending = std::mem::take(&mut self.render_with.keysig);
        pending && self.visible("key.sig.show")
    }

    pub fn show_timesig_check(&mut self) -> bool {
        let pending = std::mem::take(&mut self.render_with.timesig);
        pending
            && self.visible("meter.visible")
            && self.atts.get("meter.rend").map(String::as_str) != Some("invis")
    }

    fn visible(&self, attribute: &str) -> bool {
        self.atts.get(attribute).map(String::as_str) != Some("false")
    }

    pub fn staff_n(&self) -> u32 {
        self.staff_n
    }

    pub fn clef(&self) -> Clef {
        self.clef
    }

    pub fn key(&self) -> &KeySignature {
        &self.key
    }

    pub fn meter(&self) -> &Meter {
        &self.meter
    }

    pub fn spacing(&self) -> Option<f64> {
        self.spacing
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn label_abbr(&self) -> Option<&str> {
        self.label_abbr.as_deref()
    }
}

enum Category {
    Clef,
    Key,
    Meter,
}

fn attribute_category(name: &str) -> Option<Category> {
    match name {
        "clef.shape" | "clef.line" | "clef.dis" | "clef.dis.place" => Some(Category::Clef),
        "key.sig.show" => None,
        n if n.starts_with("key.") => Some(Category::Key),
        "meter.visible" | "meter.rend" => None,
        n if n.starts_with("meter.") => Some(Category::Meter),
        _ => None,
    }
}

fn parse_meter_number(atts: &AttributeMap, name: &str, default: u32) -> Result<u32> {
    match atts.get(name) {
        None => Ok(default),
        Some(v) => match v.trim().parse::<u32>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(ConvertError::value("meter", v)),
        },
    }
}

fn parse_spacing(value: &str) -> Result<f64> {
    value
        .trim()
        .trim_end_matches("vu")
        .parse()
        .map_err(|_| ConvertError::value("staff spacing", value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atts(pairs: &[(&str, &str)]) -> AttributeMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn treble_c_44() -> StaffInfo {
        StaffInfo::new(
            1,
            atts(&[
                ("n", "1"),
                ("clef.shape", "G"),
                ("clef.line", "2"),
                ("key.sig", "0"),
                ("meter.count", "4"),
                ("meter.unit", "4"),
            ]),
        )
        .unwrap()
    }

    #[test]
    fn clef_table() {
        assert_eq!(Clef::from_attributes("G", "2", None, None).unwrap(), Clef::Treble);
        assert_eq!(Clef::from_attributes("F", "4", None, None).unwrap(), Clef::Bass);
        assert_eq!(Clef::from_attributes("C", "3", None, None).unwrap(), Clef::Alto);
        assert_eq!(Clef::from_attributes("C", "4", None, None).unwrap(), Clef::Tenor);
        assert_eq!(
            Clef::from_attributes("G", "2", Some("8"), Some("below")).unwrap(),
            Clef::OctaveTreble
        );
        let err = Clef::from_attributes("F", "3", None, None).unwrap_err();
        assert_eq!(err.code(), "unsupported-value");
    }

    #[test]
    fn show_clef_check_is_destructive() {
        let mut info = treble_c_44();
        assert!(info.show_clef_check());
        assert!(!info.show_clef_check());

        info.force_section_start_info();
        assert!(info.show_clef_check());
        assert!(!info.show_clef_check());
        assert!(!info.show_clef_check());
    }

    #[test]
    fn stave_start_leaves_time_hidden() {
        let mut info = treble_c_44();
        info.show_clef_check();
        info.show_keysig_check();
        info.show_timesig_check();

        info.force_stave_start_info();
        assert!(info.show_clef_check());
        assert!(info.show_keysig_check());
        assert!(!info.show_timesig_check());
    }

    #[test]
    fn meter_count_change_forces_only_timesig() {
        let mut info = treble_c_44();
        info.show_clef_check();
        info.show_keysig_check();
        info.show_timesig_check();

        info.update_def(atts(&[("n", "1"), ("meter.count", "3")])).unwrap();
        assert_eq!(info.meter().count, 3);
        assert_eq!(info.meter().unit, 4);
        assert!(!info.show_clef_check());
        assert!(!info.show_keysig_check());
        assert!(info.show_timesig_check());
    }

    #[test]
    fn unchanged_redefinition_schedules_nothing() {
        let mut info = treble_c_44();
        info.show_clef_check();
        info.show_keysig_check();
        info.show_timesig_check();

        info.update_def(atts(&[("clef.shape", "G"), ("clef.line", "2"), ("key.sig", "0")]))
            .unwrap();
        assert!(!info.show_clef_check());
        assert!(!info.show_keysig_check());

        info.update_def(atts(&[("clef.shape", "F"), ("clef.line", "4")])).unwrap();
        assert_eq!(info.clef(), Clef::Bass);
        assert!(info.show_clef_check());
    }

    #[test]
    fn visibility_override_suppresses_pending_clef() {
        let mut info = StaffInfo::new(1, atts(&[("clef.visible", "false")])).unwrap();
        assert!(!info.show_clef_check());
        assert!(info.show_keysig_check());
    }

    #[test]
    fn key_and_labels() {
        let info = StaffInfo::new(
            2,
            atts(&[("key.sig", "2f"), ("label", "Violin"), ("label.abbr", "Vln.")]),
        )
        .unwrap();
        assert_eq!(info.key().fifths, -2);
        assert_eq!(info.key().name(), "Bb");
        assert_eq!(info.label(), Some("Violin"));
        assert_eq!(info.label_abbr(), Some("Vln."));
        assert_eq!(info.staff_n(), 2);
    }
}
