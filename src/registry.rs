//! Configuration registry.
//!
//! The registry holds the status points of the active configuration, keyed
//! by emission policy. It is rebuilt from scratch on every import of the
//! exchanged data:
//!
//! ```json
//! {"exchanged_data": {"datapoints": [
//!     {"label": "TS-1", "pivot_id": "M_2367_3_15_4", "pivot_type": "SpsTyp",
//!      "pivot_subtypes": ["acces"], "ts_syst_cycle": 30}
//! ]}}
//! ```
//!
//! # Invariants
//!
//! - Every [`Policy`] has a bucket, possibly empty, after any (re)build
//! - A fatal import error leaves every bucket empty; the previous
//!   configuration is not kept
//! - A bad datapoint only skips that datapoint

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, error};

use crate::error::{ConfigError, DescriptorError};
use crate::point::{CyclicPointInfo, PivotType, Policy, PointInfo};

/// JSON member names of the exchanged data document.
#[allow(missing_docs)]
pub mod keys {
    pub const EXCHANGED_DATA: &str = "exchanged_data";
    pub const DATAPOINTS: &str = "datapoints";
    pub const PIVOT_TYPE: &str = "pivot_type";
    pub const PIVOT_ID: &str = "pivot_id";
    pub const PIVOT_SUBTYPES: &str = "pivot_subtypes";
    pub const LABEL: &str = "label";
    pub const TS_SYST_CYCLE: &str = "ts_syst_cycle";
    pub const TRANSIENT: &str = "transient";
}

/// An entry appended directly to a registry bucket.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEntry {
    Periodic(CyclicPointInfo),
    Event(PointInfo),
}

impl RegistryEntry {
    /// The bucket this entry belongs to.
    #[must_use]
    pub const fn policy(&self) -> Policy {
        match self {
            Self::Periodic(_) => Policy::Periodic,
            Self::Event(_) => Policy::Event,
        }
    }

    /// The point carried by the entry.
    #[must_use]
    pub fn point(&self) -> &PointInfo {
        match self {
            Self::Periodic(cyclic) => &cyclic.point,
            Self::Event(point) => point,
        }
    }
}

/// Outcome of a successful import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Bucket entries created (a point in two buckets counts twice).
    pub entries: usize,
    /// Datapoints ignored because their pivot type is not a status type.
    pub filtered: usize,
    /// Datapoints, or policy tags of a datapoint, rejected with an error.
    pub skipped: Vec<DescriptorError>,
}

/// Policy-keyed collection of status points.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Registry {
    #[serde(rename = "acces")]
    periodic: Vec<CyclicPointInfo>,
    #[serde(rename = "prt.inf")]
    event: Vec<PointInfo>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from exchanged data, falling back to an empty one.
    ///
    /// Errors are logged by [`Registry::import`].
    #[must_use]
    pub fn import_or_empty(raw: &str) -> Self {
        let mut registry = Self::new();
        if let Err(err) = registry.import(raw) {
            debug!(error = %err, "Falling back to an empty registry");
        }
        registry
    }

    /// Replaces the content of the registry with the given exchanged data.
    ///
    /// The registry is reset first, so on error it is left empty.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the document cannot be parsed or does
    /// not have the `exchanged_data.datapoints` array.
    pub fn import(&mut self, raw: &str) -> Result<ImportReport, ConfigError> {
        self.reset();
        self.import_document(raw).map_err(|err| {
            error!(error = %err, "Failed to import exchanged data, configuration cleared");
            err
        })
    }

    fn import_document(&mut self, raw: &str) -> Result<ImportReport, ConfigError> {
        let document: Value = serde_json::from_str(raw).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;

        let root = document.as_object().ok_or(ConfigError::RootNotObject)?;

        let exchanged = root
            .get(keys::EXCHANGED_DATA)
            .and_then(Value::as_object)
            .ok_or(ConfigError::MissingSection {
                section: keys::EXCHANGED_DATA,
                parent: "root object",
                expected: "an object",
            })?;

        let datapoints = exchanged
            .get(keys::DATAPOINTS)
            .and_then(Value::as_array)
            .ok_or(ConfigError::MissingSection {
                section: keys::DATAPOINTS,
                parent: keys::EXCHANGED_DATA,
                expected: "an array",
            })?;

        let mut report = ImportReport::default();
        for datapoint in datapoints {
            self.import_datapoint(datapoint, &mut report);
        }

        debug!(
            periodic = self.periodic.len(),
            event = self.event.len(),
            skipped = report.skipped.len(),
            "Exchanged data imported"
        );
        Ok(report)
    }

    fn import_datapoint(&mut self, datapoint: &Value, report: &mut ImportReport) {
        let descriptor = match Descriptor::parse(datapoint) {
            Ok(Some(descriptor)) => descriptor,
            Ok(None) => {
                report.filtered += 1;
                return;
            }
            Err(err) => {
                error!(error = %err, "Datapoint skipped");
                report.skipped.push(err);
                return;
            }
        };

        for policy in &descriptor.policies {
            match policy {
                Policy::Periodic => match descriptor.cyclic_point() {
                    Ok(point) => {
                        debug!(
                            label = %point.asset_name,
                            pivot_id = %point.pivot_id,
                            pivot_type = %point.pivot_type,
                            period_secs = point.period_secs,
                            "Configuration acces"
                        );
                        self.periodic.push(point);
                        report.entries += 1;
                    }
                    Err(err) => {
                        error!(error = %err, "Periodic emission not configured");
                        report.skipped.push(err);
                    }
                },
                Policy::Event => {
                    let point = descriptor.event_point();
                    debug!(
                        label = %point.asset_name,
                        pivot_id = %point.pivot_id,
                        pivot_type = %point.pivot_type,
                        transient = point.transient,
                        "Configuration prt.inf"
                    );
                    self.event.push(point);
                    report.entries += 1;
                }
            }
        }
    }

    /// Clears every bucket.
    pub fn reset(&mut self) {
        self.periodic.clear();
        self.event.clear();
    }

    /// Tells whether the named bucket holds a point with the given pivot id.
    ///
    /// An unknown policy name is logged and answers `false`.
    #[must_use]
    pub fn has_entry(&self, policy: &str, pivot_id: &str) -> bool {
        match policy.parse::<Policy>() {
            Ok(policy) => self.contains(policy, pivot_id),
            Err(data_type) => {
                error!(data_type = %data_type, "Invalid dataType");
                false
            }
        }
    }

    /// Typed variant of [`Registry::has_entry`].
    #[must_use]
    pub fn contains(&self, policy: Policy, pivot_id: &str) -> bool {
        self.points(policy).iter().any(|p| p.pivot_id == pivot_id)
    }

    /// Appends an entry to its bucket without any validation.
    pub fn add_entry(&mut self, entry: RegistryEntry) {
        match entry {
            RegistryEntry::Periodic(point) => self.periodic.push(point),
            RegistryEntry::Event(point) => self.event.push(point),
        }
    }

    /// The known policies; each one always has a bucket.
    #[must_use]
    pub const fn policies(&self) -> &'static [Policy] {
        &Policy::ALL
    }

    /// The periodic bucket, in insertion order.
    #[must_use]
    pub fn periodic(&self) -> &[CyclicPointInfo] {
        &self.periodic
    }

    /// The event bucket, in insertion order.
    #[must_use]
    pub fn event(&self) -> &[PointInfo] {
        &self.event
    }

    /// The points of one bucket, in insertion order.
    #[must_use]
    pub fn points(&self, policy: Policy) -> Vec<&PointInfo> {
        match policy {
            Policy::Periodic => self.periodic.iter().map(|c| &c.point).collect(),
            Policy::Event => self.event.iter().collect(),
        }
    }

    /// Number of entries in one bucket.
    #[must_use]
    pub fn len(&self, policy: Policy) -> usize {
        match policy {
            Policy::Periodic => self.periodic.len(),
            Policy::Event => self.event.len(),
        }
    }

    /// True when every bucket is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.periodic.is_empty() && self.event.is_empty()
    }
}

/// A status datapoint that passed the type filter.
struct Descriptor<'a> {
    pivot_id: String,
    pivot_type: PivotType,
    label: String,
    policies: BTreeSet<Policy>,
    transient: bool,
    raw: &'a Map<String, Value>,
}

impl<'a> Descriptor<'a> {
    /// `Ok(None)` means the datapoint is not a status point, or requests no
    /// policy at all.
    fn parse(datapoint: &'a Value) -> Result<Option<Self>, DescriptorError> {
        let raw = datapoint.as_object().ok_or(DescriptorError::NotAnObject)?;

        let Some(pivot_type) = raw
            .get(keys::PIVOT_TYPE)
            .and_then(Value::as_str)
            .and_then(PivotType::parse_supported)
        else {
            return Ok(None);
        };

        let pivot_id = string_field(raw, keys::PIVOT_ID)?;

        let Some(subtypes) = raw.get(keys::PIVOT_SUBTYPES).and_then(Value::as_array) else {
            return Ok(None);
        };

        let label = string_field(raw, keys::LABEL)?;

        let tags: BTreeSet<&str> = subtypes.iter().filter_map(Value::as_str).collect();
        let policies: BTreeSet<Policy> = tags.iter().filter_map(|t| Policy::from_tag(t)).collect();
        let transient = tags.contains(keys::TRANSIENT);

        Ok(Some(Self {
            pivot_id,
            pivot_type,
            label,
            policies,
            transient,
            raw,
        }))
    }

    fn cyclic_point(&self) -> Result<CyclicPointInfo, DescriptorError> {
        let cycle = self
            .raw
            .get(keys::TS_SYST_CYCLE)
            .and_then(Value::as_i64)
            .ok_or_else(|| DescriptorError::MissingCycle {
                label: self.label.clone(),
                field: keys::TS_SYST_CYCLE,
            })?;

        let period_secs = u32::try_from(cycle)
            .ok()
            .filter(|p| *p > 0)
            .ok_or_else(|| DescriptorError::InvalidCycle {
                label: self.label.clone(),
                field: keys::TS_SYST_CYCLE,
                value: cycle,
            })?;

        Ok(CyclicPointInfo::new(
            self.pivot_id.clone(),
            self.pivot_type.clone(),
            self.label.clone(),
            period_secs,
        ))
    }

    fn event_point(&self) -> PointInfo {
        PointInfo::new(self.pivot_id.clone(), self.pivot_type.clone(), self.label.clone())
            .with_transient(self.transient)
    }
}

fn string_field(raw: &Map<String, Value>, field: &'static str) -> Result<String, DescriptorError> {
    raw.get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(DescriptorError::MissingField { field })
}
