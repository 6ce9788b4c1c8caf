//! The system status point emitter.
//!
//! [`SystemStatusNotifier`] ties the registry, the periodic scheduler, the
//! notification handling and the sink together behind the entry points the
//! host calls: configuration, notifications, the enable switch and sink
//! registration.
//!
//! Locking:
//! - the registry is replaced wholesale behind an `RwLock<Arc<_>>`, readers
//!   keep their snapshot
//! - a config mutex serialises reconfiguration against notifications
//! - the sink has its own mutex, taken for every emission
//!
//! No lock is held across a task sleep.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::{debug, error, info};

use crate::config::{PluginConfig, SchedulerConfig};
use crate::error::{SpResult, SystemSpError};
use crate::gate::EnableGate;
use crate::notification::{self, Interpretation};
use crate::point::Policy;
use crate::registry::{ImportReport, Registry, RegistryEntry};
use crate::scheduler::{CyclicScheduler, SchedulerState};
use crate::sink::{ReadingSink, SinkAdapter};
use crate::template::ReadingTemplate;
use crate::time::now_millis;

/// Emitter of system status point readings.
///
/// Starts disabled, with an empty configuration and no sink. Dropping the
/// notifier stops and joins every periodic task.
#[derive(Debug)]
pub struct SystemStatusNotifier {
    gate: EnableGate,
    sink: Arc<SinkAdapter>,
    registry: RwLock<Arc<Registry>>,
    config_lock: Mutex<()>,
    scheduler: CyclicScheduler,
}

impl Default for SystemStatusNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemStatusNotifier {
    /// Creates a notifier with the default task timing.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    /// Creates a notifier with the given task timing.
    #[must_use]
    pub fn with_config(cfg: SchedulerConfig) -> Self {
        let gate = EnableGate::default();
        let sink = Arc::new(SinkAdapter::new());
        let scheduler = CyclicScheduler::new(cfg, gate.clone(), Arc::clone(&sink));
        Self {
            gate,
            sink,
            registry: RwLock::new(Arc::new(Registry::new())),
            config_lock: Mutex::new(()),
            scheduler,
        }
    }

    /// Applies a plugin category: `enable` first, then `exchanged_data`.
    ///
    /// # Errors
    ///
    /// See [`SystemStatusNotifier::set_json_config`]. The enable switch is
    /// already applied when the exchanged data fails.
    pub fn reconfigure(&self, config: &PluginConfig) -> SpResult<Option<ImportReport>> {
        let _guard = self.config_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(enable) = config.enable {
            info!(enable, "Emission switch reconfigured");
            self.gate.set(enable);
        }
        config
            .exchanged_data
            .as_deref()
            .map(|raw| self.apply_exchanged_data(raw))
            .transpose()
    }

    /// Parses a plugin category document and applies it.
    ///
    /// # Errors
    ///
    /// A malformed category is rejected before anything is applied.
    pub fn reconfigure_json(&self, raw: &str) -> SpResult<Option<ImportReport>> {
        let config = PluginConfig::from_json(raw).map_err(|err| {
            error!(error = %err, "Plugin configuration rejected");
            err
        })?;
        self.reconfigure(&config)
    }

    /// Replaces the configuration with new exchanged data and restarts the
    /// periodic tasks.
    ///
    /// # Errors
    ///
    /// Returns the import error, in which case the configuration is now
    /// empty and no periodic task runs, or an internal error when a task
    /// thread cannot be spawned.
    pub fn set_json_config(&self, raw: &str) -> SpResult<ImportReport> {
        let _guard = self.config_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.apply_exchanged_data(raw)
    }

    fn apply_exchanged_data(&self, raw: &str) -> SpResult<ImportReport> {
        let mut registry = Registry::new();
        let imported = registry.import(raw);
        self.replace_registry(registry);
        self.restart_cycles()?;
        imported.map_err(SystemSpError::from)
    }

    fn restart_cycles(&self) -> SpResult<usize> {
        let registry = self.registry();
        self.scheduler.start(registry.periodic())
    }

    fn replace_registry(&self, registry: Registry) {
        debug!(
            periodic = registry.len(Policy::Periodic),
            event = registry.len(Policy::Event),
            "Configuration replaced"
        );
        *self.registry.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(registry);
    }

    /// Snapshot of the active configuration.
    #[must_use]
    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Appends one point to the configuration without validation.
    ///
    /// A periodic point only starts emitting at the next
    /// [`SystemStatusNotifier::start_cycles`].
    pub fn add_entry(&self, entry: RegistryEntry) {
        let _guard = self.config_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        Arc::make_mut(&mut registry).add_entry(entry);
    }

    /// (Re)starts one periodic task per periodic point of the configuration.
    ///
    /// # Errors
    ///
    /// Returns an internal error when a task thread cannot be spawned.
    pub fn start_cycles(&self) -> SpResult<usize> {
        let _guard = self.config_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.restart_cycles()
    }

    /// Stops and joins every periodic task.
    pub fn stop_cycles(&self) {
        self.scheduler.stop();
    }

    /// Lifecycle state of the periodic tasks.
    #[must_use]
    pub fn scheduler_state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    /// Number of running periodic tasks.
    #[must_use]
    pub fn cycle_count(&self) -> usize {
        self.scheduler.task_count()
    }

    /// Opens or closes the emission switch. Periodic tasks pause while it
    /// is closed and notifications are rejected.
    pub fn set_enabled(&self, enabled: bool) {
        self.gate.set(enabled);
    }

    /// State of the emission switch.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.gate.is_enabled()
    }

    /// Installs the sink readings are delivered to, replacing any previous one.
    pub fn register_sink(&self, sink: Arc<dyn ReadingSink>) {
        self.sink.register(sink);
    }

    /// Handles a connectivity notification.
    ///
    /// Returns true when the notification was a handled connectivity change
    /// and every event point was emitted. Returns false when disabled, for
    /// notifications about other assets, for malformed notifications and
    /// when a point could not be rendered.
    pub fn notify(&self, raw: &str) -> bool {
        let _guard = self.config_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.gate.is_enabled() {
            return false;
        }

        match notification::interpret(raw) {
            Ok(Interpretation::Connectivity(state)) => {
                let registry = self.registry();
                let template = ReadingTemplate::new(Policy::Event);
                match notification::broadcast(registry.event(), &template, &self.sink, state, now_millis()) {
                    Ok(sent) => {
                        debug!(state = %state, readings = sent, "Connectivity broadcast");
                        true
                    }
                    Err(_) => false,
                }
            }
            Ok(Interpretation::Ignored(why)) => {
                debug!(notification = raw, why, "Notification ignored");
                false
            }
            Err(err) => {
                error!(notification = raw, error = %err, "Notification rejected");
                false
            }
        }
    }
}
