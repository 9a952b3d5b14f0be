//! Parsing of the `xdevices.json?cmd=10` status document.

use ipxbridge_app::ports::Readings;
use ipxbridge_domain::channel::ChannelKind;
use serde_json::Value;

use crate::error::Ipx800Error;

/// Split a status key such as `OUT7` or `IN12` into kind and id.
///
/// Returns `None` for every other key (`product`, `AN1`, `C1`, …).
#[must_use]
pub fn parse_key(key: &str) -> Option<(ChannelKind, u16)> {
    let (kind, digits) = if let Some(rest) = key.strip_prefix(ChannelKind::Output.wire_prefix()) {
        (ChannelKind::Output, rest)
    } else if let Some(rest) = key.strip_prefix(ChannelKind::Input.wire_prefix()) {
        (ChannelKind::Input, rest)
    } else {
        return None;
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().filter(|id| *id > 0).map(|id| (kind, id))
}

fn parse_value(key: &str, value: &Value) -> Result<bool, Ipx800Error> {
    let raw = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    match raw {
        Some(0) => Ok(false),
        Some(1) => Ok(true),
        _ => Err(Ipx800Error::Malformed(format!("{key} = {value}"))),
    }
}

/// Extract every relay and digital input from a status document.
///
/// # Errors
///
/// Returns [`Ipx800Error::Malformed`] when the body is not a JSON object or
/// a channel value is neither `0` nor `1`.
pub fn parse_status(body: &str) -> Result<Readings, Ipx800Error> {
    let document: Value =
        serde_json::from_str(body).map_err(|err| Ipx800Error::Malformed(err.to_string()))?;
    let Value::Object(fields) = document else {
        return Err(Ipx800Error::Malformed("expected a JSON object".to_string()));
    };

    let mut readings = Readings::new();
    for (key, value) in &fields {
        if let Some(channel) = parse_key(key) {
            readings.insert(channel, parse_value(key, value)?);
        }
    }
    Ok(readings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_channel_keys() {
        assert_eq!(parse_key("OUT7"), Some((ChannelKind::Output, 7)));
        assert_eq!(parse_key("IN12"), Some((ChannelKind::Input, 12)));
        assert_eq!(parse_key("AN1"), None);
        assert_eq!(parse_key("OUT"), None);
        assert_eq!(parse_key("OUT0"), None);
        assert_eq!(parse_key("IN1x"), None);
        assert_eq!(parse_key("product"), None);
    }

    #[test]
    fn should_parse_status_document() {
        let body = r#"{
            "product": "IPX800_V3",
            "OUT1": 1, "OUT2": 0, "OUT7": "1",
            "IN1": "0", "IN2": 1,
            "AN1": 512, "C1": 42
        }"#;

        let readings = parse_status(body).unwrap();

        assert_eq!(readings.len(), 5);
        assert!(readings[&(ChannelKind::Output, 1)]);
        assert!(!readings[&(ChannelKind::Output, 2)]);
        assert!(readings[&(ChannelKind::Output, 7)]);
        assert!(!readings[&(ChannelKind::Input, 1)]);
        assert!(readings[&(ChannelKind::Input, 2)]);
    }

    #[test]
    fn should_reject_non_object_body() {
        assert!(matches!(parse_status("[1, 2]"), Err(Ipx800Error::Malformed(_))));
        assert!(matches!(parse_status("<html>"), Err(Ipx800Error::Malformed(_))));
    }

    #[test]
    fn should_reject_out_of_range_value() {
        assert!(matches!(
            parse_status(r#"{"OUT1": 2}"#),
            Err(Ipx800Error::Malformed(_))
        ));
    }
}
