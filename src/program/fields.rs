//! Typed field access for program nodes.
//!
//! Each accessor turns a raw, optional [`FieldValue`] into the type the
//! interpreter needs, or a [`NodeError`] naming the block and field.

use std::time::Duration;

use crate::error::NodeError;
use crate::hardware::{Direction, MAX_SPEED};
use crate::program::node::FieldValue;

/// Shortest wait a block may request, in seconds.
pub const MIN_WAIT_SECS: f64 = 0.1;
/// Longest wait a block may request, in seconds.
pub const MAX_WAIT_SECS: f64 = 10.0;

fn required<'a>(
    kind: &'static str,
    field: &'static str,
    value: Option<&'a FieldValue>,
) -> Result<&'a FieldValue, NodeError> {
    value.ok_or(NodeError::MissingField { kind, field })
}

fn number(kind: &'static str, field: &'static str, value: &FieldValue) -> Result<f64, NodeError> {
    value
        .as_number()
        .filter(|n| n.is_finite())
        .ok_or_else(|| NodeError::InvalidLiteral {
            kind,
            field,
            value: value.to_text(),
        })
}

fn integer(kind: &'static str, field: &'static str, value: &FieldValue) -> Result<f64, NodeError> {
    let n = number(kind, field, value)?;
    if n.fract() != 0.0 {
        return Err(NodeError::InvalidLiteral {
            kind,
            field,
            value: value.to_text(),
        });
    }
    Ok(n)
}

/// Move direction; must be one of the four direction names.
pub fn direction(kind: &'static str, value: Option<&FieldValue>) -> Result<Direction, NodeError> {
    let value = required(kind, "direction", value)?;
    match value {
        FieldValue::Text(s) => s.parse().map_err(|_| NodeError::InvalidLiteral {
            kind,
            field: "direction",
            value: s.clone(),
        }),
        FieldValue::Number(_) | FieldValue::Other(_) => Err(NodeError::InvalidLiteral {
            kind,
            field: "direction",
            value: value.to_text(),
        }),
    }
}

/// Wait duration, within [`MIN_WAIT_SECS`, `MAX_WAIT_SECS`].
pub fn wait_duration(kind: &'static str, value: Option<&FieldValue>) -> Result<Duration, NodeError> {
    let value = required(kind, "seconds", value)?;
    let seconds = number(kind, "seconds", value)?;
    if !(MIN_WAIT_SECS..=MAX_WAIT_SECS).contains(&seconds) {
        return Err(NodeError::OutOfRange {
            kind,
            field: "seconds",
            value: seconds,
            min: MIN_WAIT_SECS,
            max: MAX_WAIT_SECS,
        });
    }
    Ok(Duration::from_secs_f64(seconds))
}

/// Motor speed, an integer within `0..=MAX_SPEED`.
pub fn speed(kind: &'static str, value: Option<&FieldValue>) -> Result<u16, NodeError> {
    let value = required(kind, "speed", value)?;
    let speed = integer(kind, "speed", value)?;
    if !(0.0..=f64::from(MAX_SPEED)).contains(&speed) {
        return Err(NodeError::OutOfRange {
            kind,
            field: "speed",
            value: speed,
            min: 0.0,
            max: f64::from(MAX_SPEED),
        });
    }
    Ok(speed as u16)
}

/// Loop count, an integer of at least one.
///
/// `default` is used when the field is absent; `None` makes the field required.
pub fn repeat_count(
    kind: &'static str,
    value: Option<&FieldValue>,
    default: Option<u32>,
) -> Result<u32, NodeError> {
    let value = match (value, default) {
        (Some(value), _) => value,
        (None, Some(default)) => return Ok(default),
        (None, None) => return Err(NodeError::MissingField { kind, field: "times" }),
    };
    let times = integer(kind, "times", value)?;
    if times < 1.0 {
        return Err(NodeError::BelowMinimum {
            kind,
            field: "times",
            value: times,
            min: 1.0,
        });
    }
    Ok(times.min(f64::from(u32::MAX)) as u32)
}

/// Message text; numbers are shown as written.
pub fn message(kind: &'static str, value: Option<&FieldValue>) -> Result<String, NodeError> {
    match required(kind, "message", value)? {
        FieldValue::Other(other) => Err(NodeError::InvalidLiteral {
            kind,
            field: "message",
            value: other.to_string(),
        }),
        value => Ok(value.to_text()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_requires_known_text() {
        assert_eq!(
            direction("Move", Some(&FieldValue::from("backward"))),
            Ok(Direction::Backward)
        );
        assert_eq!(
            direction("Move", None),
            Err(NodeError::MissingField {
                kind: "Move",
                field: "direction"
            })
        );
        assert!(matches!(
            direction("Move", Some(&FieldValue::from("up"))),
            Err(NodeError::InvalidLiteral { .. })
        ));
        assert!(matches!(
            direction("Move", Some(&FieldValue::from(1.0))),
            Err(NodeError::InvalidLiteral { .. })
        ));
    }

    #[test]
    fn wait_duration_is_bounded() {
        assert_eq!(
            wait_duration("Wait", Some(&FieldValue::from(0.5))),
            Ok(Duration::from_millis(500))
        );
        assert_eq!(
            wait_duration("Wait", Some(&FieldValue::from("10"))),
            Ok(Duration::from_secs(10))
        );
        assert!(matches!(
            wait_duration("Wait", Some(&FieldValue::from(0.05))),
            Err(NodeError::OutOfRange { .. })
        ));
        assert!(matches!(
            wait_duration("Wait", Some(&FieldValue::from(11.0))),
            Err(NodeError::OutOfRange { .. })
        ));
        assert!(matches!(
            wait_duration("Wait", Some(&FieldValue::from("soon"))),
            Err(NodeError::InvalidLiteral { .. })
        ));
    }

    #[test]
    fn speed_must_be_an_integer_in_range() {
        assert_eq!(speed("Speed", Some(&FieldValue::from(0u16))), Ok(0));
        assert_eq!(speed("Speed", Some(&FieldValue::from("1023"))), Ok(1023));
        assert!(matches!(
            speed("Speed", Some(&FieldValue::from(1024.0))),
            Err(NodeError::OutOfRange { .. })
        ));
        assert!(matches!(
            speed("Speed", Some(&FieldValue::from(-1.0))),
            Err(NodeError::OutOfRange { .. })
        ));
        assert!(matches!(
            speed("Speed", Some(&FieldValue::from(12.5))),
            Err(NodeError::InvalidLiteral { .. })
        ));
    }

    #[test]
    fn repeat_count_defaults_only_when_allowed() {
        assert_eq!(repeat_count("Repeat", Some(&FieldValue::from(4u32)), None), Ok(4));
        assert_eq!(repeat_count("Repeat", None, Some(1)), Ok(1));
        assert!(matches!(
            repeat_count("Repeat", None, None),
            Err(NodeError::MissingField { field: "times", .. })
        ));
        assert!(matches!(
            repeat_count("Repeat", Some(&FieldValue::from(0u32)), Some(1)),
            Err(NodeError::BelowMinimum { .. })
        ));
        assert!(matches!(
            repeat_count("Repeat", Some(&FieldValue::from(2.5)), None),
            Err(NodeError::InvalidLiteral { .. })
        ));
    }

    #[test]
    fn message_accepts_numbers_as_text() {
        assert_eq!(message("Print", Some(&FieldValue::from(7u32))), Ok("7".to_string()));
        assert!(message("Print", None).is_err());
    }

    #[test]
    fn non_scalar_json_is_an_invalid_literal() {
        let other = FieldValue::Other(serde_json::json!({ "nested": true }));
        for result in [
            direction("Move", Some(&other)).map(|_| ()),
            wait_duration("Wait", Some(&other)).map(|_| ()),
            speed("Speed", Some(&other)).map(|_| ()),
            repeat_count("Repeat", Some(&other), Some(1)).map(|_| ()),
            message("Print", Some(&other)).map(|_| ()),
        ] {
            assert!(matches!(result, Err(NodeError::InvalidLiteral { .. })), "{result:?}");
        }
    }
}
