//! Connectivity notifications.
//!
//! A notification is a JSON object such as
//! `{"asset": "prt.inf", "reason": "connection lost"}`. Only notifications
//! about the `prt.inf` asset are handled; they trigger one reading per
//! event point.

use std::fmt;

use serde_json::Value;

use crate::error::{NotificationError, RenderError};
use crate::point::PointInfo;
use crate::sink::SinkAdapter;
use crate::template::ReadingTemplate;

/// The only asset name notifications are accepted for.
pub const NOTIFICATION_ASSET: &str = "prt.inf";

const ASSET: &str = "asset";
const REASON: &str = "reason";

/// Connection state announced by a notification.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Connectivity {
    Connected,
    Disconnected,
}

impl Connectivity {
    /// Maps a notification reason. `"disconnected"` is accepted as an alias
    /// of `"connection lost"`.
    #[must_use]
    pub fn from_reason(reason: &str) -> Option<Self> {
        match reason {
            "connected" => Some(Self::Connected),
            "connection lost" | "disconnected" => Some(Self::Disconnected),
            _ => None,
        }
    }

    /// Reading value of the state: "on" when connected.
    #[must_use]
    pub const fn is_on(self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for Connectivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected => f.write_str("connected"),
            Self::Disconnected => f.write_str("connection lost"),
        }
    }
}

/// Result of reading a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interpretation {
    /// A connectivity change to broadcast.
    Connectivity(Connectivity),
    /// Not addressed to this emitter. Carries the reason for debug logs.
    Ignored(&'static str),
}

/// Reads a notification.
///
/// # Errors
///
/// Fails on malformed JSON and on a `prt.inf` notification whose reason is
/// missing, not a string or not in the connectivity table.
pub fn interpret(raw: &str) -> Result<Interpretation, NotificationError> {
    let document: Value = serde_json::from_str(raw).map_err(|e| NotificationError::Parse {
        message: e.to_string(),
    })?;

    let asset = match document.get(ASSET) {
        None => return Ok(Interpretation::Ignored("no 'asset' attribute")),
        Some(Value::String(asset)) => asset,
        Some(_) => return Ok(Interpretation::Ignored("unknown 'asset' type")),
    };
    if asset != NOTIFICATION_ASSET {
        return Ok(Interpretation::Ignored("unhandled 'asset' value"));
    }

    let reason = document
        .get(REASON)
        .and_then(Value::as_str)
        .ok_or(NotificationError::MissingField { field: REASON })?;

    Connectivity::from_reason(reason)
        .map(Interpretation::Connectivity)
        .ok_or_else(|| NotificationError::UnhandledReason {
            reason: reason.to_string(),
        })
}

/// Emits the state of every event point, all stamped with `timestamp_ms`.
///
/// Stops at the first point that cannot be rendered; readings emitted
/// before it are not recalled. Returns the number of readings rendered.
///
/// # Errors
///
/// Returns the [`RenderError`] of the first unrenderable point.
pub fn broadcast(
    points: &[PointInfo],
    template: &ReadingTemplate,
    sink: &SinkAdapter,
    state: Connectivity,
    timestamp_ms: i64,
) -> Result<usize, RenderError> {
    for point in points {
        let payload = template.fill(point, timestamp_ms, state.is_on())?;
        sink.emit(&point.asset_name, payload);
    }
    Ok(points.len())
}
