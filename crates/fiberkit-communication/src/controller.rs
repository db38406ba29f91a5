//! Machine controller
//!
//! The surface the operator side talks to: connection management, the
//! run lifecycle (start, pause, resume, stop), geometry preview checks,
//! and syringe maintenance. A run executes on one dedicated thread that
//! holds the transport for its whole duration; every other entry point is
//! safe to call from any thread while it runs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;

use fiberkit_core::event_bus::{
    event_bus, AppEvent, ConnectionEvent, EventBus, RunEvent, SyringeEvent,
};
use fiberkit_core::run::DEFAULT_PAUSE_POLL;
use fiberkit_core::{ConfigStore, Error, Rect, Result, RunControl, RunError, RunOutcome, RunState};
use fiberkit_planner as planner;

use crate::communication::{Clock, LineChannel, SystemClock};
use crate::firmware::marlin::commands;
use crate::firmware::marlin::{
    FilamentState, ProtocolHandler, DEFAULT_COMMAND_TIMEOUT, DEFAULT_CONNECT_TIMEOUT,
};
use crate::sequencer::{self, Sequencer};

/// Extruder positions of the 1 to 5 ml syringe marks.
pub const SYRINGE_MARKS: [(u8, u32); 5] = [(1, 20), (2, 53), (3, 86), (4, 119), (5, 152)];

/// Upper bound on plunger homing steps.
pub const MAX_HOME_STEPS: u32 = 400;

/// Default wait after opening a port, for boards that reset on open.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Timing used by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerSettings {
    /// Deadline for the homing handshake on connect
    pub connect_timeout: Duration,
    /// Deadline for each run command
    pub command_timeout: Duration,
    /// Wait between opening the channel and the handshake
    pub settle_delay: Duration,
    /// Sleep between checks while paused
    pub pause_poll: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            settle_delay: DEFAULT_SETTLE_DELAY,
            pause_poll: DEFAULT_PAUSE_POLL,
        }
    }
}

/// Connection, run lifecycle and syringe maintenance for one printer
pub struct MachineController {
    store: Arc<ConfigStore>,
    control: Arc<RunControl>,
    transport: Arc<Mutex<Option<ProtocolHandler>>>,
    connected: AtomicBool,
    port: Mutex<Option<String>>,
    worker: Mutex<Option<JoinHandle<Result<u64>>>>,
    bus: Arc<EventBus>,
    clock: Arc<dyn Clock>,
    settings: ControllerSettings,
}

impl MachineController {
    /// Create a controller publishing on the process-wide event bus
    pub fn new(store: Arc<ConfigStore>, settings: ControllerSettings) -> Self {
        Self::with_event_bus(store, settings, event_bus())
    }

    /// Create a controller publishing on `bus`
    pub fn with_event_bus(
        store: Arc<ConfigStore>,
        settings: ControllerSettings,
        bus: Arc<EventBus>,
    ) -> Self {
        let control =
            Arc::new(RunControl::with_pause_poll(settings.pause_poll).with_event_bus(bus.clone()));
        Self {
            store,
            control,
            transport: Arc::new(Mutex::new(None)),
            connected: AtomicBool::new(false),
            port: Mutex::new(None),
            worker: Mutex::new(None),
            bus,
            clock: Arc::new(SystemClock::new()),
            settings,
        }
    }

    /// Time protocol deadlines on `clock` instead of the system clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Live configuration
    pub fn store(&self) -> &Arc<ConfigStore> {
        &self.store
    }

    /// Run-state controller
    pub fn run_control(&self) -> &Arc<RunControl> {
        &self.control
    }

    /// Current run state
    pub fn state(&self) -> RunState {
        self.control.state()
    }

    /// Whether a homed channel is attached
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    // ---------- connection ----------

    /// Attach `channel`, wait for the board to settle and home it.
    ///
    /// The channel is only kept if `G28` is acknowledged within the connect
    /// timeout.
    pub fn connect(&self, channel: Box<dyn LineChannel>) -> Result<()> {
        if self.control.is_active() {
            return Err(RunError::AlreadyRunning.into());
        }
        if self.is_connected() {
            self.disconnect()?;
        }

        let port = channel.name();
        self.publish(AppEvent::Connection(ConnectionEvent::Connecting {
            port: port.clone(),
        }));

        let mut protocol = ProtocolHandler::with_clock(channel, self.clock.clone())
            .with_command_timeout(self.settings.command_timeout)
            .with_event_bus(self.bus.clone());

        thread::sleep(self.settings.settle_delay);
        if let Err(e) = protocol.clear_buffers() {
            tracing::warn!("Could not clear buffers on {}: {}", port, e);
        }

        tracing::info!("Homing printer...");
        let home = commands::home_all();
        match protocol.send_and_await(home.text(), self.settings.connect_timeout) {
            Ok(()) => {
                *self.transport.lock() = Some(protocol);
                *self.port.lock() = Some(port.clone());
                self.connected.store(true, Ordering::Release);
                tracing::info!("Connected to the printer on {}", port);
                self.publish(AppEvent::Connection(ConnectionEvent::Connected { port }));
                Ok(())
            }
            Err(e) => {
                tracing::error!("Could not connect: {}", e);
                self.publish(AppEvent::Connection(ConnectionEvent::ConnectionFailed {
                    port,
                    error: e.to_string(),
                }));
                Err(e)
            }
        }
    }

    /// Stop any run, wait for it to drain and release the channel
    pub fn disconnect(&self) -> Result<()> {
        self.control.stop();
        if let Err(e) = self.wait() {
            if !e.is_cancelled() {
                tracing::debug!("Run ended with an error before disconnect: {}", e);
            }
        }

        let released = self.transport.lock().take();
        self.connected.store(false, Ordering::Release);
        if released.is_some() {
            let port = self.port.lock().take().unwrap_or_default();
            tracing::info!("Disconnected from the printer");
            self.publish(AppEvent::Connection(ConnectionEvent::Disconnected { port }));
        }
        Ok(())
    }

    // ---------- run lifecycle ----------

    /// Start a run on the executor thread.
    ///
    /// Fails without side effects with `NotConnected`, `AlreadyRunning`, or
    /// a geometry error for the current parameters. The mode is latched here.
    pub fn start(&self) -> Result<()> {
        if !self.is_connected() {
            return Err(RunError::NotConnected.into());
        }
        if self.control.state() != RunState::Idle {
            return Err(RunError::AlreadyRunning.into());
        }

        let mode = self.store.mode();
        sequencer::preflight(&self.store, mode)?;

        // A finished run leaves its handle behind.
        let _ = self.wait();
        self.control.start()?;

        let store = self.store.clone();
        let control = self.control.clone();
        let transport = self.transport.clone();
        let bus = self.bus.clone();

        tracing::info!("Starting {} run", mode);
        let spawned = thread::Builder::new()
            .name("fiberkit-run".to_string())
            .spawn(move || execute(store, control, transport, bus, mode));

        match spawned {
            Ok(handle) => {
                *self.worker.lock() = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.control.complete(RunOutcome::Failed);
                Err(Error::Io(e))
            }
        }
    }

    /// Hold the run before its next command. No-op without a run.
    pub fn pause(&self) -> bool {
        self.control.pause()
    }

    /// Continue a paused run. No-op without a run.
    pub fn resume(&self) -> bool {
        self.control.resume()
    }

    /// Pause when running, resume when paused
    pub fn toggle_pause(&self) -> bool {
        self.control.toggle_pause()
    }

    /// Request a stop. No-op without a run.
    pub fn stop(&self) -> bool {
        self.control.stop()
    }

    /// Clear a failed run so the next one may start
    pub fn acknowledge_failure(&self) -> bool {
        self.control.acknowledge_failure()
    }

    /// Block until the executor thread exits and return its result.
    ///
    /// Returns `Ok(0)` when no run was started.
    pub fn wait(&self) -> Result<u64> {
        let handle = self.worker.lock().take();
        match handle {
            Some(handle) => handle
                .join()
                .unwrap_or_else(|_| Err(Error::other("run executor panicked"))),
            None => Ok(0),
        }
    }

    // ---------- geometry preview ----------

    /// Validated anchored work rectangle for the current parameters
    pub fn get_draw_rectangle(&self) -> Result<Rect> {
        Ok(planner::draw_rectangle(self.store.as_ref())?)
    }

    /// Whether the current anchored geometry passes validation
    pub fn draw_rectangle_is_valid(&self) -> bool {
        planner::draw_rectangle_is_valid(self.store.as_ref())
    }

    // ---------- syringe ----------

    /// Move the plunger to a millilitre mark (1 to 5)
    pub fn syringe_goto_ml(&self, mark: u8) -> Result<()> {
        let position = SYRINGE_MARKS
            .iter()
            .find(|(m, _)| *m == mark)
            .map(|(_, pos)| *pos)
            .ok_or_else(|| Error::invalid_parameter(format!("invalid syringe mark {}", mark)))?;

        self.with_idle_transport(|protocol| {
            protocol.dispatch(&commands::allow_cold_extrusion_unacknowledged())?;
            protocol.dispatch(&commands::plunger_to(position))
        })?;

        self.store.reset_syringe(f64::from(position));
        tracing::info!("Go to {} ml", mark);
        self.publish(AppEvent::Syringe(SyringeEvent::MovedToMark { mark }));
        Ok(())
    }

    /// Draw in `syringe_droplet_units` of material
    pub fn syringe_intake(&self) -> Result<()> {
        let units = self.store.syringe_droplet_units();
        self.with_idle_transport(|protocol| {
            protocol.dispatch(&commands::MachineCommand::unacknowledged("G91"))?;
            protocol.dispatch(&commands::allow_cold_extrusion_unacknowledged())?;
            protocol.dispatch(&commands::plunger_to(units))?;
            protocol.dispatch(&commands::MachineCommand::unacknowledged("G90"))
        })?;

        self.store.adjust_syringe(f64::from(units));
        tracing::info!("Intake {} units", units);
        self.publish(AppEvent::Syringe(SyringeEvent::Intake { units }));
        Ok(())
    }

    /// Back the plunger off until the filament sensor opens, then zero it
    pub fn syringe_home(&self) -> Result<()> {
        let store = self.store.clone();
        let timeout = self.settings.command_timeout;
        let result = self.with_idle_transport(|protocol| {
            if let Err(e) = protocol.clear_buffers() {
                tracing::warn!("Could not clear buffers before homing the syringe: {}", e);
            }
            let send = |protocol: &mut ProtocolHandler, command: commands::MachineCommand| {
                protocol.send_and_await(command.text(), timeout)
            };

            send(protocol, commands::disable_cold_extrusion_check())?;
            send(protocol, commands::cold_extrusion_report())?;
            let mut status = protocol.query_filament()?;
            send(protocol, commands::relative_extruder_origin())?;

            let mut steps = 0;
            while status == Some(FilamentState::Triggered) && steps < MAX_HOME_STEPS {
                send(protocol, commands::plunger_home_step())?;
                status = protocol.query_filament()?;
                if status == Some(FilamentState::Open) {
                    send(protocol, commands::zero_extruder())?;
                    store.reset_syringe(0.0);
                }
                steps += 1;
            }

            send(protocol, commands::zero_extruder())?;
            send(protocol, commands::absolute_positioning())
        });

        match result {
            Ok(()) => {
                tracing::info!("Syringe homed");
                self.publish(AppEvent::Syringe(SyringeEvent::Homed));
                Ok(())
            }
            Err(e) => {
                tracing::error!("Syringe home error: {}", e);
                self.publish(AppEvent::error(format!("Syringe home error: {}", e)));
                Err(e)
            }
        }
    }

    fn with_idle_transport<T>(
        &self,
        f: impl FnOnce(&mut ProtocolHandler) -> Result<T>,
    ) -> Result<T> {
        if self.control.is_active() {
            return Err(RunError::AlreadyRunning.into());
        }
        let mut guard = self.transport.lock();
        match guard.as_mut() {
            Some(protocol) => f(protocol),
            None => Err(RunError::NotConnected.into()),
        }
    }

    fn publish(&self, event: AppEvent) {
        let _ = self.bus.publish(event);
    }
}

impl Drop for MachineController {
    fn drop(&mut self) {
        self.control.stop();
        let _ = self.wait();
    }
}

impl std::fmt::Debug for MachineController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MachineController")
            .field("connected", &self.is_connected())
            .field("state", &self.state())
            .field("settings", &self.settings)
            .finish()
    }
}

/// Executor thread body
fn execute(
    store: Arc<ConfigStore>,
    control: Arc<RunControl>,
    transport: Arc<Mutex<Option<ProtocolHandler>>>,
    bus: Arc<EventBus>,
    mode: fiberkit_core::Mode,
) -> Result<u64> {
    let result = {
        let mut guard = transport.lock();
        match guard.as_mut() {
            Some(protocol) => {
                if let Err(e) = protocol.clear_buffers() {
                    tracing::warn!("Could not clear buffers before the run: {}", e);
                }
                Sequencer::new(&store, &control, protocol)
                    .with_event_bus(bus.clone())
                    .run(mode)
            }
            None => Err(RunError::NotConnected.into()),
        }
    };

    let outcome = match &result {
        Ok(_) => RunOutcome::Succeeded,
        Err(e) if e.is_cancelled() => RunOutcome::Cancelled,
        Err(_) => RunOutcome::Failed,
    };
    let settled = control.complete(outcome);
    tracing::debug!("Run settled to {}", settled);

    let event = match &result {
        Ok(commands) => RunEvent::Finished {
            commands: *commands,
        },
        Err(e) if e.is_cancelled() => {
            tracing::info!("Run stopped");
            RunEvent::Cancelled
        }
        Err(e) => {
            tracing::error!("Error during run: {}", e);
            RunEvent::Failed {
                error: e.to_string(),
            }
        }
    };
    let _ = bus.publish(AppEvent::Run(event));
    result
}
