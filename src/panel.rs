//! Speaker panel: the chat-adjacent list of everyone currently talking

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::indicator::{display_name, Color};
use crate::presence::ParticipantKey;
use crate::roster::{EntitySnapshotCache, Roster, Team};

/// Text shown while the panel has no speakers
pub const EMPTY_PANEL_TEXT: &str = "Nobody is talking yet";

/// One speaker row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakerLine {
    pub key: ParticipantKey,
    pub number: u32,
    pub name: String,
    pub team: Team,
    pub color: Color,
    /// Distance to the local viewer, rounded to one decimal
    pub distance: f32,
}

impl SpeakerLine {
    /// `#12 Name - 3.4m`
    pub fn text(&self) -> String {
        format!("#{} {} - {:.1}m", self.number, self.name, self.distance)
    }

    /// Row wrapped in a rich-text color tag
    pub fn markup(&self) -> String {
        format!("<color={}>{}</color>", self.color.to_hex(), self.text())
    }
}

/// Panel content for one tick
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PanelView {
    pub visible: bool,
    pub lines: Vec<SpeakerLine>,
}

impl PanelView {
    /// Build the panel from the active set
    ///
    /// Speakers that do not resolve to a live entity are left out.
    pub fn compose(
        active: &BTreeSet<ParticipantKey>,
        snapshots: &EntitySnapshotCache,
        roster: &dyn Roster,
    ) -> Self {
        let viewer = roster.viewer_position();
        let lines: Vec<SpeakerLine> = active
            .iter()
            .filter_map(|key| snapshots.resolve_live(*key, roster))
            .map(|entity| {
                let distance = match (entity.body, viewer) {
                    (Some(body), Some(viewer)) => round_tenth(body.distance(&viewer)),
                    _ => 0.0,
                };
                SpeakerLine {
                    key: entity.key,
                    number: entity.number,
                    name: display_name(&entity).to_string(),
                    team: entity.team,
                    color: Color::for_team(entity.team),
                    distance,
                }
            })
            .collect();

        Self {
            visible: !lines.is_empty(),
            lines,
        }
    }

    /// Plain text body, one speaker per line
    pub fn text(&self) -> String {
        if self.lines.is_empty() {
            return EMPTY_PANEL_TEXT.to_string();
        }
        self.lines
            .iter()
            .map(SpeakerLine::text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn round_tenth(value: f32) -> f32 {
    (value * 10.0).round() / 10.0
}
