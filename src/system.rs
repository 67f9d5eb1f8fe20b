//! A system: one line of measures sharing a left margin and staff Ys.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::Options;
use crate::measure::Measure;
use crate::model::StaveConnector;

/// Label printed left of a staff at the start of a system.
#[derive(Debug, Clone, Serialize)]
pub struct StaffLabel {
    pub staff_n: u32,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct System {
    pub index: usize,
    /// Left edge of the printable area
    pub x: f64,
    /// Printable width (page width minus page margins)
    pub width: f64,
    /// Space reserved for staff labels
    pub left_margin: f64,
    /// Top line Y of every staff in this system
    pub staff_ys: BTreeMap<u32, f64>,
    pub measures: Vec<Measure>,
    pub labels: Vec<StaffLabel>,
    pub connectors: Vec<StaveConnector>,
}

impl System {
    pub fn new(
        index: usize,
        x: f64,
        width: f64,
        left_margin: f64,
        staff_ys: BTreeMap<u32, f64>,
    ) -> Self {
        Self {
            index,
            x,
            width,
            left_margin,
            staff_ys,
            measures: Vec::new(),
            labels: Vec::new(),
            connectors: Vec::new(),
        }
    }

    pub fn add_measure(&mut self, measure: Measure) -> usize {
        self.measures.push(measure);
        self.measures.len() - 1
    }

    pub fn staff_y(&self, staff_n: u32) -> Option<f64> {
        self.staff_ys.get(&staff_n).copied()
    }

    /// Widths of all measures per the allocation rule.
    pub fn measure_widths(&self) -> Vec<f64> {
        let explicit: Vec<Option<f64>> = self.measures.iter().map(|m| m.explicit_width).collect();
        allocate_widths(&explicit, self.width, self.left_margin)
    }

    /// Allocate widths and place measures left to right from the end of the
    /// left margin.
    pub fn format(&mut self, options: &Options) {
        let widths = self.measure_widths();
        let mut x = self.x + self.left_margin;
        for (measure, w) in self.measures.iter_mut().zip(widths) {
            measure.format(x, w, options);
            x += w;
        }
    }

    /// X where notes of the first measure start (left edge for curves
    /// entering the system).
    pub fn content_start_x(&self) -> f64 {
        self.measures
            .first()
            .and_then(|m| m.staves.values().next())
            .map_or(self.x + self.left_margin, |s| s.note_start_x)
    }

    /// Right edge of the last measure.
    pub fn content_end_x(&self) -> f64 {
        self.measures
            .last()
            .map_or(self.x + self.width, |m| m.x + m.width)
    }

    /// Y of the lowest stave line in the system.
    pub fn bottom_y(&self, options: &Options) -> f64 {
        self.staff_ys
            .values()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max)
            .max(0.0)
            + options.stave_height
    }
}

/// Measures with an explicit width keep it. The width left over after the
/// left margin and the explicit widths is split evenly (floored) among the
/// others. With no unspecified measures nothing is divided.
pub fn allocate_widths(explicit: &[Option<f64>], print_width: f64, left_margin: f64) -> Vec<f64> {
    let specified: f64 = explicit.iter().flatten().sum();
    let unspecified = explicit.iter().filter(|w| w.is_none()).count();

    let single = if unspecified > 0 {
        ((print_width - left_margin - specified) / unspecified as f64).floor()
    } else {
        0.0
    };

    explicit.iter().map(|w| w.unwrap_or(single)).collect()
}
