//! Indicator module: per-participant speaking badges
//!
//! Defines the renderer collaborator contract and the style payload passed
//! through it, plus the pieces that decide what each badge looks like:
//! - `animation`: the "is talking..." frame cycle for text badges
//! - `mode`: configured display mode resolved against asset availability
//! - `reconciler`: the per-tick diff between speakers and rendered badges
//! - `broadcast`: a renderer that forwards draw commands to IPC subscribers

mod animation;
mod broadcast;
mod mode;
mod reconciler;

use serde::{Deserialize, Serialize};

use crate::presence::ParticipantKey;
use crate::roster::{EntityInfo, Team};

pub use animation::{TalkingAnimation, DEFAULT_FRAME_INTERVAL, TALKING_FRAMES};
pub use broadcast::BroadcastRenderer;
pub use mode::{probe_image_asset, DisplayMode, IndicatorMode, ModePolicy};
pub use reconciler::{IndicatorReconciler, IndicatorRecord, TickContext, TickReport};

/// Opaque handle to a visual object created by the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RenderHandle(pub u64);

impl std::fmt::Display for RenderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// RGB color with components in `0.0..=1.0`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const RED: Color = Color::rgb(1.0, 0.2, 0.2);
    pub const BLUE: Color = Color::rgb(0.2, 0.5, 1.0);
    pub const GREY: Color = Color::rgb(0.7, 0.7, 0.7);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Badge color for a team; unknown teams are white
    pub fn for_team(team: Team) -> Self {
        match team {
            Team::Red => Self::RED,
            Team::Blue => Self::BLUE,
            Team::Spectator => Self::GREY,
            Team::None => Self::WHITE,
        }
    }

    /// `#RRGGBB` form used in rich-text markup
    pub fn to_hex(&self) -> String {
        let channel = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        format!(
            "#{:02X}{:02X}{:02X}",
            channel(self.r),
            channel(self.g),
            channel(self.b)
        )
    }
}

/// Which part of the entity the badge is parented to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachPoint {
    /// The spawned player body
    Body,
    /// The player root, used while no body exists
    Root,
}

/// User-tunable placement, passed through to style payloads
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Appearance {
    /// Height above the attach point
    pub height: f32,
    /// Size multiplier
    pub size: f32,
}

/// Everything the renderer needs to draw or refresh one badge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorStyle {
    /// Text badge label; `None` for image badges
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f32>,
    pub color: Color,
    pub attach: AttachPoint,
    pub height: f32,
    pub scale: f32,
}

impl IndicatorStyle {
    /// Style for a badge of `mode` bound to `entity`
    ///
    /// `frame` selects the animation frame and is ignored for image badges.
    pub fn build(
        mode: DisplayMode,
        entity: &EntityInfo,
        frame: usize,
        appearance: Appearance,
    ) -> Self {
        let attach = if entity.body.is_some() {
            AttachPoint::Body
        } else {
            AttachPoint::Root
        };
        let color = Color::for_team(entity.team);

        match mode {
            DisplayMode::Text => Self {
                label: Some(TalkingAnimation::label(display_name(entity), frame)),
                font_size: Some(0.8 * appearance.size),
                color,
                attach,
                height: appearance.height,
                scale: 1.0,
            },
            DisplayMode::Image => Self {
                label: None,
                font_size: None,
                color,
                attach,
                height: appearance.height,
                scale: appearance.size,
            },
        }
    }
}

/// Name shown for an entity, falling back to "Player"
pub fn display_name(entity: &EntityInfo) -> &str {
    let name = entity.name.trim();
    if name.is_empty() {
        "Player"
    } else {
        name
    }
}

/// Errors reported by a renderer collaborator
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    #[error("renderer does not know handle {0}")]
    UnknownHandle(RenderHandle),

    #[error("renderer rejected request: {0}")]
    Rejected(String),

    #[error("renderer is disconnected")]
    Disconnected,
}

/// Renderer collaborator driven by the reconciler
///
/// Calls are fire-and-forget from the engine's point of view: an error
/// means the handle should be treated as gone.
pub trait Renderer {
    fn create_indicator(
        &mut self,
        key: ParticipantKey,
        mode: DisplayMode,
        style: &IndicatorStyle,
    ) -> Result<RenderHandle, RenderError>;

    fn update_indicator(
        &mut self,
        handle: RenderHandle,
        style: &IndicatorStyle,
    ) -> Result<(), RenderError>;

    fn destroy_indicator(&mut self, handle: RenderHandle) -> Result<(), RenderError>;
}
