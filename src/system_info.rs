//! Score-wide staff state and system geometry.
//!
//! `SystemInfo` owns one [`StaffInfo`] per staff number for the whole piece,
//! the staff groups declared in `scoreDef`, and the running vertical
//! position. Every new system asks it for staff Ys, a left margin wide
//! enough for the labels, and the connectors to draw.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::{LabelMode, Options};
use crate::constants::*;
use crate::error::Result;
use crate::mei::AttributeMap;
use crate::model::{ConnectorKind, StaveConnector};
use crate::staff_info::StaffInfo;
use crate::system::{StaffLabel, System};

/// A `<staffGrp>` with the staves it encloses.
#[derive(Debug, Clone, Serialize)]
pub struct StaffGroup {
    pub symbol: Option<ConnectorKind>,
    pub bar_thru: bool,
    pub staves: Vec<u32>,
}

impl StaffGroup {
    /// Map `@symbol` ("brace", "bracket", "line", "none").
    pub fn symbol_from_mei(value: Option<&str>) -> Option<ConnectorKind> {
        match value {
            Some("brace") => Some(ConnectorKind::Brace),
            Some("bracket") | Some("bracketsq") => Some(ConnectorKind::Bracket),
            Some("line") => Some(ConnectorKind::Single),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct SystemInfo {
    staff_infos: BTreeMap<u32, StaffInfo>,
    /// `clef.*`, `key.*` and `meter.*` given on `scoreDef`
    score_atts: AttributeMap,
    groups: Vec<StaffGroup>,
    next_system_y: f64,
}

impl SystemInfo {
    pub fn new(options: &Options) -> Self {
        Self {
            staff_infos: BTreeMap::new(),
            score_atts: AttributeMap::new(),
            groups: Vec::new(),
            next_system_y: options.page_margin_top,
        }
    }

    /// Apply the staff-related attributes of a `scoreDef` to every known
    /// staff and remember them as defaults for staves defined later.
    pub fn process_score_def(&mut self, atts: &AttributeMap) -> Result<()> {
        let shared: AttributeMap = atts
            .iter()
            .filter(|(k, _)| is_shared_attribute(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if shared.is_empty() {
            return Ok(());
        }
        for info in self.staff_infos.values_mut() {
            info.update_def(shared.clone())?;
        }
        self.score_atts.extend(shared);
        Ok(())
    }

    /// First `staffDef` for a number creates its info on top of the
    /// score-level defaults; later ones update it.
    pub fn process_staff_def(&mut self, staff_n: u32, atts: AttributeMap) -> Result<()> {
        match self.staff_infos.get_mut(&staff_n) {
            Some(info) => info.update_def(atts),
            None => {
                let mut merged = self.score_atts.clone();
                merged.extend(atts);
                self.staff_infos.insert(staff_n, StaffInfo::new(staff_n, merged)?);
                Ok(())
            }
        }
    }

    pub fn add_group(&mut self, group: StaffGroup) {
        self.groups.push(group);
    }

    pub fn staff_info(&self, staff_n: u32) -> Option<&StaffInfo> {
        self.staff_infos.get(&staff_n)
    }

    pub fn staff_info_mut(&mut self, staff_n: u32) -> Option<&mut StaffInfo> {
        self.staff_infos.get_mut(&staff_n)
    }

    pub fn force_section_start(&mut self) {
        for info in self.staff_infos.values_mut() {
            info.force_section_start_info();
        }
    }

    pub fn force_system_start(&mut self) {
        for info in self.staff_infos.values_mut() {
            info.force_stave_start_info();
        }
    }

    /// Open a new system below the previous one.
    pub fn start_system(&mut self, index: usize, options: &Options) -> System {
        let labels = self.labels_for(index, options.label_mode);
        let left_margin = labels
            .iter()
            .map(|l| estimate_text_width(&l.text, options.staff_label_font.size))
            .fold(None, |acc: Option<f64>, w| Some(acc.map_or(w, |a| a.max(w))))
            .map_or(0.0, |w| w + LABEL_PADDING);

        let mut staff_ys = BTreeMap::new();
        let mut y = self.next_system_y;
        for (i, (&n, info)) in self.staff_infos.iter().enumerate() {
            if i > 0 {
                y += options.stave_height + info.spacing().unwrap_or(options.staff_spacing);
            }
            staff_ys.insert(n, y);
        }
        let bottom = if staff_ys.is_empty() {
            y
        } else {
            y + options.stave_height
        };
        self.next_system_y = bottom + options.system_spacing;

        let mut system = System::new(
            index,
            options.page_margin_left,
            options.print_width(),
            left_margin,
            staff_ys,
        );
        system.labels = labels;
        system.connectors = self.connectors(options);
        system
    }

    /// Y where the next system would start.
    pub fn next_system_y(&self) -> f64 {
        self.next_system_y
    }

    fn labels_for(&self, system_index: usize, mode: LabelMode) -> Vec<StaffLabel> {
        self.staff_infos
            .values()
            .filter_map(|info| {
                let text = match mode {
                    LabelMode::Off => None,
                    LabelMode::Full if system_index == 0 => info.label().or(info.label_abbr()),
                    LabelMode::Full | LabelMode::Abbreviated => info.label_abbr(),
                }?;
                Some(StaffLabel {
                    staff_n: info.staff_n(),
                    text: text.to_string(),
                })
            })
            .collect()
    }

    fn connectors(&self, options: &Options) -> Vec<StaveConnector> {
        let mut connectors = Vec::new();
        let (Some(&first), Some(&last)) = (
            self.staff_infos.keys().next(),
            self.staff_infos.keys().next_back(),
        ) else {
            return connectors;
        };

        if options.auto_stave_connector && first != last {
            connectors.push(StaveConnector {
                kind: ConnectorKind::Single,
                first_staff: first,
                last_staff: last,
                bar_thru: false,
            });
        }
        for group in &self.groups {
            let (Some(kind), Some(&lo), Some(&hi)) =
                (group.symbol, group.staves.iter().min(), group.staves.iter().max())
            else {
                continue;
            };
            connectors.push(StaveConnector {
                kind,
                first_staff: lo,
                last_staff: hi,
                bar_thru: group.bar_thru,
            });
        }
        connectors
    }
}

fn is_shared_attribute(name: &str) -> bool {
    name.starts_with("clef.") || name.starts_with("key.") || name.starts_with("meter.")
}
