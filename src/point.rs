//! Status point definitions.
//!
//! A status point is identified by its pivot id, carries one of the two
//! supported pivot kinds, and is emitted under an asset name (the datapoint
//! label). Points are grouped by emission [`Policy`].

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

/// Emission policy a status point can participate in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Policy {
    /// Heartbeat emission: one recurring timer per point.
    Periodic,
    /// Emission in reaction to a connectivity notification.
    Event,
}

impl Policy {
    /// All known policies, in registry order.
    pub const ALL: [Self; 2] = [Self::Periodic, Self::Event];

    /// The subtype tag selecting this policy in the exchanged data.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Periodic => "acces",
            Self::Event => "prt.inf",
        }
    }

    /// Matches a subtype tag against the known policies.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == tag)
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Policy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_tag(s).ok_or_else(|| s.to_string())
    }
}

impl Serialize for Policy {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Pivot value encoding of a status point.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PivotType {
    /// Single-bit status, value encoded as integer 1/0.
    Sps,
    /// Double-bit status, value encoded as string "on"/"off".
    Dps,
    /// Any other kind. Never produced by configuration import; only reachable
    /// through [`crate::Registry::add_entry`], and never renderable.
    Unsupported(String),
}

impl PivotType {
    /// Pivot type name of single-bit status points.
    pub const SPS: &'static str = "SpsTyp";
    /// Pivot type name of double-bit status points.
    pub const DPS: &'static str = "DpsTyp";

    /// Parses one of the two supported kinds, `None` for anything else.
    #[must_use]
    pub fn parse_supported(name: &str) -> Option<Self> {
        match name {
            Self::SPS => Some(Self::Sps),
            Self::DPS => Some(Self::Dps),
            _ => None,
        }
    }

    /// The pivot type name, as used in the reading payload.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Sps => Self::SPS,
            Self::Dps => Self::DPS,
            Self::Unsupported(name) => name,
        }
    }

    /// False for [`PivotType::Unsupported`].
    #[must_use]
    pub const fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported(_))
    }
}

impl From<&str> for PivotType {
    fn from(name: &str) -> Self {
        Self::parse_supported(name).unwrap_or_else(|| Self::Unsupported(name.to_string()))
    }
}

impl fmt::Display for PivotType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for PivotType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A monitored status point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PointInfo {
    /// Pivot identifier, rendered as `GTIS.Identifier`.
    pub pivot_id: String,
    /// Value encoding, also the name of the `GTIS` value member.
    pub pivot_type: PivotType,
    /// Datapoint label, used as the asset name of emitted readings.
    pub asset_name: String,
    /// Set on event points whose subtypes also request the transient tag.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub transient: bool,
}

impl PointInfo {
    /// Creates a non-transient point.
    #[must_use]
    pub fn new(pivot_id: impl Into<String>, pivot_type: impl Into<PivotType>, asset_name: impl Into<String>) -> Self {
        Self {
            pivot_id: pivot_id.into(),
            pivot_type: pivot_type.into(),
            asset_name: asset_name.into(),
            transient: false,
        }
    }

    /// Marks the point as transient.
    #[must_use]
    pub fn with_transient(mut self, transient: bool) -> Self {
        self.transient = transient;
        self
    }
}

/// A status point emitted periodically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CyclicPointInfo {
    #[serde(flatten)]
    pub point: PointInfo,
    /// Emission period in seconds.
    pub period_secs: u32,
}

impl CyclicPointInfo {
    /// Creates a periodic point emitted every `period_secs` seconds.
    #[must_use]
    pub fn new(
        pivot_id: impl Into<String>,
        pivot_type: impl Into<PivotType>,
        asset_name: impl Into<String>,
        period_secs: u32,
    ) -> Self {
        Self {
            point: PointInfo::new(pivot_id, pivot_type, asset_name),
            period_secs,
        }
    }

    /// Emission period as a duration.
    #[must_use]
    pub const fn period(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.period_secs as u64)
    }
}

impl std::ops::Deref for CyclicPointInfo {
    type Target = PointInfo;

    fn deref(&self) -> &Self::Target {
        &self.point
    }
}
