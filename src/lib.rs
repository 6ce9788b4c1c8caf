//! # systemsp - System Status Point Emitter
//!
//! systemsp publishes the health of a data-acquisition gateway as synthetic
//! pivot readings. It sends a periodic "I am alive" reading for every
//! heartbeat point, and an on/off reading for every connectivity point
//! whenever the host reports that the upstream connection was established or
//! lost.
//!
//! ## Core Concepts
//!
//! - **Status point**: a configured datapoint (pivot id, pivot type, label)
//! - **Policy**: `acces` points are emitted periodically, `prt.inf` points
//!   on connectivity notifications
//! - **Registry**: the policy-keyed set of points built from exchanged data
//! - **Reading**: an asset name plus a rendered `PIVOT.GTIS` payload handed
//!   to the registered sink
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use systemsp::{ChannelSink, PluginConfig, SystemStatusNotifier};
//!
//! let notifier = SystemStatusNotifier::new();
//! let (sink, readings) = ChannelSink::new();
//! notifier.register_sink(Arc::new(sink));
//!
//! notifier.reconfigure(&PluginConfig::enabled(true).with_exchanged_data(exchanged_json))?;
//! notifier.notify(r#"{"asset": "prt.inf", "reason": "connection lost"}"#);
//!
//! while let Some(reading) = readings.try_recv() {
//!     println!("{} {}", reading.asset_name, reading.payload);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod error;
pub mod point;
pub mod time;

// Configuration
pub mod config;
pub mod registry;

// Emission
pub mod gate;
pub mod notification;
pub mod scheduler;
pub mod sink;
pub mod template;

pub mod notifier;

// Re-export primary types at crate root for convenience
pub use config::{PluginConfig, SchedulerConfig};
pub use error::{
    ConfigError, DescriptorError, NotificationError, RenderError, SpResult, SystemSpError,
};
pub use gate::EnableGate;
pub use notification::Connectivity;
pub use notifier::SystemStatusNotifier;
pub use point::{CyclicPointInfo, PivotType, PointInfo, Policy};
pub use registry::{ImportReport, Registry, RegistryEntry};
pub use scheduler::{CyclicScheduler, CycleTimer, SchedulerState};
pub use sink::{ChannelSink, Reading, ReadingSink, ReadingStream, SinkAdapter};
pub use template::ReadingTemplate;
pub use time::PivotTimestamp;
