//! # Wand Telemetry Parsing
//!
//! The tracking daemon streams one whitespace-separated line per wand
//! update:
//!
//! ```text
//! move_update <id> <x> <y> <z> <qw> <qx> <qy> <qz> <buttons> <trigger> <colorValue>
//! ```
//!
//! Note the field order: the daemon reports the quaternion scalar-first,
//! the rest of the system stores `[x, y, z, w]`.
//!
//! A bad line never reaches the world - it parses completely or not at
//! all.

use std::str::FromStr;

use glam::{Quat, Vec3};
use thiserror::Error;

/// One parsed wand update.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MoveUpdate {
    /// Controller slot.
    pub controller: u32,
    /// Raw rig position.
    pub position: Vec3,
    /// Raw IMU orientation.
    pub orientation: Quat,
    /// Button bitmask.
    pub buttons: u32,
    /// Analog trigger value, 0-255.
    pub trigger: u8,
    /// LED tint, `0xRRGGBB`.
    pub color_value: u32,
}

/// Telemetry lines that could not be turned into a [`MoveUpdate`].
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TelemetryError {
    /// First token was not a known message kind.
    #[error("unknown telemetry message: {0:?}")]
    UnknownKind(String),
    /// The line ended before all fields arrived.
    #[error("telemetry line truncated at field {0:?}")]
    Truncated(&'static str),
    /// A field failed numeric parsing.
    #[error("bad telemetry value for {field:?}: {value:?}")]
    BadNumber {
        /// Which field.
        field: &'static str,
        /// The offending token.
        value: String,
    },
}

fn field<T: FromStr>(
    tokens: &mut std::str::SplitWhitespace<'_>,
    name: &'static str,
) -> Result<T, TelemetryError> {
    let token = tokens.next().ok_or(TelemetryError::Truncated(name))?;
    token.parse().map_err(|_| TelemetryError::BadNumber {
        field: name,
        value: token.to_owned(),
    })
}

/// Parses one telemetry line.
///
/// # Errors
///
/// See [`TelemetryError`]; callers log and drop, the next line
/// supersedes.
pub fn parse_line(line: &str) -> Result<MoveUpdate, TelemetryError> {
    let mut tokens = line.split_whitespace();
    let kind = tokens.next().unwrap_or("");
    if kind != "move_update" {
        return Err(TelemetryError::UnknownKind(kind.to_owned()));
    }

    let controller = field(&mut tokens, "id")?;
    let x = field(&mut tokens, "x")?;
    let y = field(&mut tokens, "y")?;
    let z = field(&mut tokens, "z")?;
    let qw = field(&mut tokens, "qw")?;
    let qx = field(&mut tokens, "qx")?;
    let qy = field(&mut tokens, "qy")?;
    let qz = field(&mut tokens, "qz")?;
    let buttons = field(&mut tokens, "buttons")?;
    let trigger = field(&mut tokens, "trigger")?;
    let color_value = field(&mut tokens, "colorValue")?;

    Ok(MoveUpdate {
        controller,
        position: Vec3::new(x, y, z),
        orientation: Quat::from_xyzw(qx, qy, qz, qw),
        buttons,
        trigger,
        color_value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_good_line() {
        let update = parse_line(
            "move_update 2 0.5 1.25 -0.75 1.0 0.0 0.0 0.0 2048 128 16729343",
        )
        .unwrap();
        assert_eq!(update.controller, 2);
        assert!((update.position - Vec3::new(0.5, 1.25, -0.75)).length() < 1e-6);
        assert_eq!(update.orientation, Quat::from_xyzw(0.0, 0.0, 0.0, 1.0));
        assert_eq!(update.buttons, 2048);
        assert_eq!(update.trigger, 128);
        assert_eq!(update.color_value, 16_729_343);
    }

    #[test]
    fn test_quaternion_is_scalar_first_on_the_wire() {
        let update = parse_line(
            "move_update 0 0 0 0 0.8 0.1 0.2 0.3 0 0 0",
        )
        .unwrap();
        assert_eq!(update.orientation, Quat::from_xyzw(0.1, 0.2, 0.3, 0.8));
    }

    #[test]
    fn test_unknown_kind() {
        assert_eq!(
            parse_line("pose_reset 1"),
            Err(TelemetryError::UnknownKind("pose_reset".into()))
        );
        assert_eq!(
            parse_line(""),
            Err(TelemetryError::UnknownKind(String::new()))
        );
    }

    #[test]
    fn test_truncated_line() {
        assert_eq!(
            parse_line("move_update 0 0.5 1.0"),
            Err(TelemetryError::Truncated("z"))
        );
    }

    #[test]
    fn test_bad_number() {
        let err = parse_line(
            "move_update 0 0 oops 0 1 0 0 0 0 0 0",
        )
        .unwrap_err();
        assert_eq!(
            err,
            TelemetryError::BadNumber {
                field: "y",
                value: "oops".into(),
            }
        );
    }
}
