//! # Viewer Wire Messages
//!
//! Line-framed JSON, tagged by a `type` field on both directions. Field
//! names are wire-fixed (camelCase where the viewer expects it) and
//! pinned by tests.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `{x, y, z}` as positions travel on the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WireVec3 {
    /// X component.
    pub x: f32,
    /// Y component.
    pub y: f32,
    /// Z component.
    pub z: f32,
}

impl From<WireVec3> for Vec3 {
    fn from(v: WireVec3) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

/// Messages a viewer sends the server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Headset pose update; quaternion is `[x, y, z, w]`.
    SyncPlayer {
        /// Raw headset position.
        position: WireVec3,
        /// Raw headset orientation, `[x, y, z, w]`.
        quaternion: [f32; 4],
    },
    /// The viewer entered VR presentation.
    EnterVr,
    /// The viewer claims a wand.
    ControllerSelect {
        /// Controller slot to claim.
        id: u32,
    },
}

/// Messages the server sends a viewer.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Reply to `enter_vr`: which avatar is yours.
    Init {
        /// The viewer's avatar id.
        #[serde(rename = "playerId")]
        player_id: String,
    },
    /// Current wand roster; re-sent on every assignment change.
    ControllerList {
        /// One entry per known wand.
        list: Vec<ControllerEntry>,
    },
    /// Diff of every entity property that changed since the last flush.
    Sync {
        /// entity id -> `{_t, ...changedProps}`.
        sync: Map<String, Value>,
    },
}

/// One wand in a [`ServerMessage::ControllerList`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ControllerEntry {
    /// Controller slot.
    pub id: u32,
    /// LED tint.
    #[serde(rename = "colorValue")]
    pub color_value: u32,
    /// Holding avatar, if any.
    #[serde(rename = "playerId")]
    pub player_id: Option<String>,
}
