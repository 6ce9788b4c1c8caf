//! Pivot reading templates.
//!
//! Both emission policies share one reading shape. The template is kept as a
//! JSON tree holding placeholder strings, and filling it walks the tree and
//! swaps each placeholder for its typed value, so identifiers never need
//! escaping.

use serde_json::{json, Map, Value};
use tracing::error;

use crate::error::RenderError;
use crate::point::{PivotType, Policy, PointInfo};
use crate::time::PivotTimestamp;

const PIVOT_ID: &str = "<pivot_id>";
const PIVOT_TYPE: &str = "<pivot_type>";
const VALUE: &str = "<value>";
const TIMESTAMP_SEC: &str = "<timestamp_sec>";
const TIMESTAMP_SUB_SEC: &str = "<timestamp_sub_sec>";

/// Root datapoint name of every emitted reading.
pub const PIVOT_ROOT: &str = "PIVOT";

/// Reading template of one emission policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadingTemplate {
    policy: Policy,
    skeleton: Value,
}

impl ReadingTemplate {
    /// Looks up the template of a policy by its tag.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::UnknownPolicy`] for anything but `acces` and
    /// `prt.inf`.
    pub fn for_policy(policy: &str) -> Result<Self, RenderError> {
        policy.parse::<Policy>().map(Self::new).map_err(|policy| {
            let err = RenderError::UnknownPolicy { policy };
            error!(error = %err, "No reading template");
            err
        })
    }

    /// The template of a known policy.
    #[must_use]
    pub fn new(policy: Policy) -> Self {
        Self {
            policy,
            skeleton: skeleton(),
        }
    }

    /// The policy this template renders for.
    #[must_use]
    pub const fn policy(&self) -> Policy {
        self.policy
    }

    /// The unfilled template, placeholders included.
    #[must_use]
    pub const fn skeleton(&self) -> &Value {
        &self.skeleton
    }

    /// Renders the reading payload of a point.
    ///
    /// `SpsTyp` encodes the state as `1`/`0`, `DpsTyp` as `"on"`/`"off"`.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::UnsupportedPivotType`] for any other pivot
    /// type. Nothing must be emitted in that case.
    pub fn fill(&self, point: &PointInfo, timestamp_ms: i64, on: bool) -> Result<Value, RenderError> {
        let value = match &point.pivot_type {
            PivotType::Sps => json!(i64::from(on)),
            PivotType::Dps => json!(if on { "on" } else { "off" }),
            PivotType::Unsupported(name) => {
                let err = RenderError::UnsupportedPivotType {
                    pivot_type: name.clone(),
                };
                error!(asset = %point.asset_name, error = %err, "Reading not rendered");
                return Err(err);
            }
        };

        let fields = Fields {
            pivot_id: &point.pivot_id,
            pivot_type: point.pivot_type.as_str(),
            value,
            timestamp: PivotTimestamp::from_millis(timestamp_ms),
        };

        let mut payload = self.skeleton.clone();
        fields.apply(&mut payload);
        Ok(payload)
    }
}

fn skeleton() -> Value {
    json!({
        PIVOT_ROOT: {
            "GTIS": {
                "Identifier": PIVOT_ID,
                "Cause": { "stVal": 3 },
                PIVOT_TYPE: {
                    "stVal": VALUE,
                    "q": { "Source": "substituted" },
                    "t": {
                        "SecondSinceEpoch": TIMESTAMP_SEC,
                        "FractionOfSecond": TIMESTAMP_SUB_SEC
                    }
                },
                "TmOrg": { "stVal": "substituted" }
            }
        }
    })
}

struct Fields<'a> {
    pivot_id: &'a str,
    pivot_type: &'a str,
    value: Value,
    timestamp: PivotTimestamp,
}

impl Fields<'_> {
    fn apply(&self, node: &mut Value) {
        match node {
            Value::Object(map) => {
                self.rename_type_key(map);
                for child in map.values_mut() {
                    self.apply(child);
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.apply(item);
                }
            }
            Value::String(text) => {
                if let Some(filled) = self.lookup(text) {
                    *node = filled;
                }
            }
            _ => {}
        }
    }

    fn rename_type_key(&self, map: &mut Map<String, Value>) {
        if let Some(inner) = map.remove(PIVOT_TYPE) {
            map.insert(self.pivot_type.to_string(), inner);
        }
    }

    fn lookup(&self, placeholder: &str) -> Option<Value> {
        match placeholder {
            PIVOT_ID => Some(json!(self.pivot_id)),
            VALUE => Some(self.value.clone()),
            TIMESTAMP_SEC => Some(json!(self.timestamp.second_since_epoch)),
            TIMESTAMP_SUB_SEC => Some(json!(self.timestamp.fraction_of_second)),
            _ => None,
        }
    }
}
