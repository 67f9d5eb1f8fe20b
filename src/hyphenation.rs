//! Lyric placement and hyphens between the syllables of a word.
//!
//! Syllables are tracked per `(staff, layer, verse)`. A syllable whose
//! `@wordpos` is `i` or `m` leaves a hyphen open; the next syllable on the
//! same line closes it. When the two syllables sit in different systems the
//! hyphen is split at the system edges.

use std::collections::HashMap;

use crate::config::Options;
use crate::constants::*;
use crate::model::{HyphenDescriptor, TextAnchor, TextDescriptor, TextKind, WordPos};
use crate::system::System;

/// Lyric texts and hyphens, in document order.
#[derive(Debug, Default)]
pub struct LyricLayout {
    pub texts: Vec<TextDescriptor>,
    pub hyphens: Vec<HyphenDescriptor>,
}

/// Right edge of a syllable still waiting for its continuation.
#[derive(Debug, Clone, Copy)]
struct OpenHyphen {
    system: usize,
    x: f64,
    y: f64,
}

pub fn collect_lyrics(systems: &[System], options: &Options) -> LyricLayout {
    let font = &options.lyrics_font;
    let mut layout = LyricLayout::default();
    let mut open: HashMap<(u32, u32, u32), OpenHyphen> = HashMap::new();

    for system in systems {
        for measure in &system.measures {
            for voice in measure.voices.draw_order() {
                let Some(stave) = measure.stave(voice.staff_n) else {
                    continue;
                };
                for tickable in &voice.tickables {
                    for syl in &tickable.syllables {
                        let y = stave.bottom_y()
                            + LYRICS_OFFSET_BELOW_STAVE
                            + syl.verse.saturating_sub(1) as f64 * font.size * LYRICS_LINE_FACTOR;
                        let half = estimate_text_width(&syl.text, font.size) / 2.0;
                        let key = (voice.staff_n, voice.layer_n, syl.verse);
                        let hyphen_y = y - font.size * 0.3;

                        if let Some(prev) = open.remove(&key) {
                            let here = OpenHyphen {
                                system: system.index,
                                x: tickable.x - half,
                                y: hyphen_y,
                            };
                            close_hyphen(prev, here, systems, &mut layout.hyphens);
                        }

                        layout.texts.push(TextDescriptor {
                            kind: TextKind::Lyric,
                            system: system.index,
                            x: tickable.x,
                            y,
                            text: syl.text.clone(),
                            font: font.clone(),
                            anchor: TextAnchor::Middle,
                        });

                        if matches!(syl.wordpos, Some(WordPos::I) | Some(WordPos::M)) {
                            open.insert(
                                key,
                                OpenHyphen {
                                    system: system.index,
                                    x: tickable.x + half,
                                    y: hyphen_y,
                                },
                            );
                        }
                    }
                }
            }
        }
    }

    if !open.is_empty() {
        log::debug!("{} word(s) end without a terminal syllable", open.len());
    }
    layout
}

fn close_hyphen(
    from: OpenHyphen,
    to: OpenHyphen,
    systems: &[System],
    out: &mut Vec<HyphenDescriptor>,
) {
    if from.system == to.system {
        out.push(HyphenDescriptor {
            system: from.system,
            start_x: from.x,
            end_x: to.x,
            y: from.y,
        });
        return;
    }
    if let Some(first) = systems.get(from.system) {
        out.push(HyphenDescriptor {
            system: from.system,
            start_x: from.x,
            end_x: first.content_end_x(),
            y: from.y,
        });
    }
    if let Some(second) = systems.get(to.system) {
        out.push(HyphenDescriptor {
            system: to.system,
            start_x: second.content_start_x(),
            end_x: to.x,
            y: to.y,
        });
    }
}

/// How many dashes a hyphen of the given span gets: one per
/// `max_distance`, at least one.
pub fn dash_count(span: f64, max_distance: f64) -> usize {
    if span <= 0.0 || max_distance <= 0.0 {
        return 1;
    }
    ((span / max_distance).floor() as usize).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dash_count_has_a_floor_of_one() {
        assert_eq!(dash_count(10.0, 75.0), 1);
        assert_eq!(dash_count(160.0, 75.0), 2);
        assert_eq!(dash_count(-3.0, 75.0), 1);
    }
}
