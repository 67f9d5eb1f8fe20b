//! Per-measure aggregation: staves indexed by staff number plus the voices
//! drawn on them.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::Options;
use crate::constants::*;
use crate::model::{AnchoredText, Stave, TickableKind, Voice};

#[derive(Debug, Clone, Serialize)]
pub struct Measure {
    /// Measure number used for deferred link keys
    pub n: u32,
    /// `@n` as written, when present
    pub label: Option<String>,
    /// `@width` from the encoding
    pub explicit_width: Option<f64>,
    pub x: f64,
    pub width: f64,
    pub staves: BTreeMap<u32, Stave>,
    pub voices: StaveVoices,
    pub anchored_texts: Vec<AnchoredText>,
    /// Volta label, on the first measure of an `<ending>`
    pub ending: Option<String>,
}

impl Measure {
    pub fn new(
        n: u32,
        label: Option<String>,
        explicit_width: Option<f64>,
        ending: Option<String>,
    ) -> Self {
        Self {
            n,
            label,
            explicit_width,
            x: 0.0,
            width: 0.0,
            staves: BTreeMap::new(),
            voices: StaveVoices::default(),
            anchored_texts: Vec::new(),
            ending,
        }
    }

    pub fn add_stave(&mut self, stave: Stave) {
        self.staves.insert(stave.staff_n, stave);
    }

    pub fn stave(&self, staff_n: u32) -> Option<&Stave> {
        self.staves.get(&staff_n)
    }

    /// Beats the measure spans: the meter, or the longest voice if that
    /// overflows it.
    pub fn measure_beats(&self) -> f64 {
        let meter_beats = self
            .staves
            .values()
            .map(|s| s.meter.measure_beats())
            .fold(0.0, f64::max);
        let longest_voice = self
            .voices
            .voices
            .iter()
            .map(Voice::total_beats)
            .fold(0.0, f64::max);
        meter_beats.max(longest_voice)
    }

    /// Place the measure at `x` with the given width, then lay out staves
    /// and voices inside it.
    pub fn format(&mut self, x: f64, width: f64, options: &Options) {
        self.x = x;
        self.width = width;

        let mut common_start = x;
        for stave in self.staves.values_mut() {
            stave.x = x;
            stave.width = width;
            stave.note_start_x = x + modifier_width(stave) + NOTE_PADDING_LEFT;
            stave.note_end_x = x + width - options.measure_padding_right;
            common_start = common_start.max(stave.note_start_x);
        }
        // Notes line up across staves even when only some show modifiers
        for stave in self.staves.values_mut() {
            stave.note_start_x = common_start;
        }

        let beats = self.measure_beats();
        self.voices.format(&self.staves, beats);
    }

    /// X of a beat position inside this measure.
    pub fn x_at_onset(&self, onset: f64) -> f64 {
        self.voices.x_at_onset(onset).unwrap_or_else(|| {
            self.staves
                .values()
                .next()
                .map_or(self.x, |s| s.note_start_x)
        })
    }
}

/// Horizontal space taken by the modifiers shown at the start of a stave.
pub fn modifier_width(stave: &Stave) -> f64 {
    let mut w = 0.0;
    if stave.show_clef {
        w += CLEF_SPACE;
    }
    if stave.show_keysig {
        w += stave.key.fifths.unsigned_abs() as f64 * KEY_SIG_ACCIDENTAL_SPACE;
    }
    if stave.show_timesig {
        w += TIME_SIG_SPACE;
    }
    w
}

/// All voices of a measure, formatted together so simultaneous events line
/// up across layers and staves.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StaveVoices {
    pub voices: Vec<Voice>,
    /// Sorted (onset, x) pairs of every distinct onset
    #[serde(skip)]
    onset_x: Vec<(f64, f64)>,
}

impl StaveVoices {
    /// Append a voice, returning its index.
    pub fn add_voice(&mut self, voice: Voice) -> usize {
        self.voices.push(voice);
        self.voices.len() - 1
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    /// Build the shared onset → x map and position every tickable on it.
    pub fn format(&mut self, staves: &BTreeMap<u32, Stave>, measure_beats: f64) {
        let Some(first) = staves.values().next() else {
            return;
        };
        let start = first.note_start_x;
        let end = staves
            .values()
            .map(|s| s.note_end_x)
            .fold(f64::INFINITY, f64::min);
        let usable = (end - start).max(0.0);
        let total = measure_beats.max(0.001);

        let mut onsets: Vec<f64> = Vec::new();
        for voice in &self.voices {
            for t in &voice.tickables {
                if !onsets.iter().any(|&o| (o - t.onset).abs() < 0.001) {
                    onsets.push(t.onset);
                }
            }
        }
        onsets.sort_by(|a, b| a.total_cmp(b));

        self.onset_x = onsets
            .iter()
            .map(|&o| (o, start + (o / total) * usable))
            .collect();

        for voice in &mut self.voices {
            for t in &mut voice.tickables {
                t.x = if t.kind == TickableKind::MeasureRest {
                    start + usable / 2.0
                } else {
                    start + (t.onset / total) * usable
                };
            }
        }
    }

    /// X for a beat position: exact onset when one exists, otherwise linear
    /// interpolation between neighbouring onsets.
    pub fn x_at_onset(&self, onset: f64) -> Option<f64> {
        let first = self.onset_x.first()?;
        if onset <= first.0 {
            return Some(first.1);
        }
        for pair in self.onset_x.windows(2) {
            let (o0, x0) = pair[0];
            let (o1, x1) = pair[1];
            if onset <= o1 {
                let t = if o1 > o0 { (onset - o0) / (o1 - o0) } else { 0.0 };
                return Some(x0 + t * (x1 - x0));
            }
        }
        self.onset_x.last().map(|&(_, x)| x)
    }

    /// Voices in drawing order: by staff, then by layer.
    pub fn draw_order(&self) -> Vec<&Voice> {
        let mut ordered: Vec<&Voice> = self.voices.iter().collect();
        ordered.sort_by_key(|v| (v.staff_n, v.layer_n));
        ordered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{StemDirection, Tickable};
    use crate::staff_info::{Clef, KeySignature, Meter};
    use crate::tables::{BarlineKind, DurationCode};

    fn stave(staff_n: u32, show_clef: bool) -> Stave {
        Stave {
            staff_n,
            x: 0.0,
            y: 0.0,
            width: 0.0,
            line_spacing: 10.0,
            clef: Clef::Treble,
            key: KeySignature { fifths: 2, mode: None },
            meter: Meter::default(),
            show_clef,
            show_keysig: show_clef,
            show_timesig: false,
            left_barline: BarlineKind::Single,
            right_barline: BarlineKind::Single,
            note_start_x: 0.0,
            note_end_x: 0.0,
        }
    }

    fn quarter(onset: f64) -> Tickable {
        Tickable {
            id: format!("q{onset}"),
            kind: TickableKind::Note,
            duration: DurationCode::Quarter,
            dots: 0,
            beats: 1.0,
            onset,
            staff_n: 1,
            keys: Vec::new(),
            stem: StemDirection::Up,
            x: 0.0,
            ys: vec![0.0],
            articulations: Vec::new(),
            syllables: Vec::new(),
            beam: None,
        }
    }

    #[test]
    fn note_area_is_shared_across_staves() {
        let mut m = Measure::new(1, None, None, None);
        m.add_stave(stave(1, true));
        m.add_stave(stave(2, false));
        m.format(100.0, 200.0, &Options::default());

        let expected_start = 100.0 + CLEF_SPACE + 2.0 * KEY_SIG_ACCIDENTAL_SPACE + NOTE_PADDING_LEFT;
        assert_eq!(m.stave(1).unwrap().note_start_x, expected_start);
        assert_eq!(m.stave(2).unwrap().note_start_x, expected_start);
        assert_eq!(m.stave(2).unwrap().note_end_x, 290.0);
    }

    #[test]
    fn onsets_map_proportionally() {
        let mut m = Measure::new(1, None, None, None);
        m.add_stave(stave(1, false));
        let mut v = Voice::new(1, 1);
        for i in 0..4 {
            v.tickables.push(quarter(i as f64));
        }
        m.voices.add_voice(v);
        m.format(0.0, 112.0, &Options::default());

        // note area 12..102, four beats
        let xs: Vec<f64> = m.voices.voices[0].tickables.iter().map(|t| t.x).collect();
        assert_eq!(xs, vec![12.0, 34.5, 57.0, 79.5]);
        assert_eq!(m.x_at_onset(0.5), 23.25);
    }
}
