//! The simulator: owns a system and its root context and advances them in time.

use hf_framework::{Context, Event, EventKind, System};
use nalgebra::DVector;
use tracing::{debug, trace, warn};

use crate::config::SimulatorConfig;
use crate::error::{SimError, SimResult};
use crate::integrator::ContinuousModel;
use crate::pacing::{PaceOutcome, Pacer};
use crate::schedule::EventSchedule;

/// Lifecycle of a simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulatorState {
    Idle,
    Initialized,
    Running,
    Stopped,
    Faulted,
}

/// Counters accumulated over the simulator's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulatorStats {
    /// Integration substeps taken.
    pub integration_steps: u64,
    /// Committed intervals (one per event time or `t_final`).
    pub intervals: u64,
    pub discrete_updates: u64,
    pub publishes: u64,
    pub pacing_sleeps: u64,
    /// Pacing calls that found the wall clock already ahead.
    pub pacing_overruns: u64,
}

pub struct Simulator {
    system: System,
    context: Context,
    config: SimulatorConfig,
    schedule: EventSchedule,
    pacer: Box<dyn Pacer>,
    state: SimulatorState,
    stats: SimulatorStats,
}

impl Simulator {
    /// Simulator over the system's default context and default config.
    pub fn new(system: System) -> Self {
        let context = system.create_default_context();
        let config = SimulatorConfig::default();
        let pacer = config.pacer();
        let schedule = EventSchedule::new(system.periodic_events());
        Self {
            system,
            context,
            config,
            schedule,
            pacer,
            state: SimulatorState::Idle,
            stats: SimulatorStats::default(),
        }
    }

    pub fn with_config(system: System, config: SimulatorConfig) -> SimResult<Self> {
        let mut sim = Self::new(system);
        sim.set_config(config)?;
        Ok(sim)
    }

    /// Use an existing context, e.g. one with initial conditions already set.
    pub fn with_context(system: System, context: Context, config: SimulatorConfig) -> SimResult<Self> {
        if context.num_records() != system.record_count() {
            return Err(SimError::InvalidArg {
                what: "context was not created for this system",
            });
        }
        let mut sim = Self::with_config(system, config)?;
        sim.context = context;
        Ok(sim)
    }

    pub fn set_config(&mut self, config: SimulatorConfig) -> SimResult<()> {
        config.validate()?;
        self.pacer = config.pacer();
        self.config = config;
        Ok(())
    }

    pub fn set_target_realtime_rate(&mut self, rate: f64) -> SimResult<()> {
        let config = SimulatorConfig {
            target_realtime_rate: rate,
            ..self.config.clone()
        };
        self.set_config(config)
    }

    /// Replace the pacing policy without touching the rest of the config.
    pub fn set_pacer(&mut self, pacer: Box<dyn Pacer>) {
        self.pacer = pacer;
    }

    pub fn system(&self) -> &System {
        &self.system
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Mutable root context, for setting initial conditions or fixed inputs.
    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    /// Split borrow of the system and its context.
    pub fn system_and_context_mut(&mut self) -> (&System, &mut Context) {
        (&self.system, &mut self.context)
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn state(&self) -> SimulatorState {
        self.state
    }

    pub fn stats(&self) -> &SimulatorStats {
        &self.stats
    }

    pub fn time(&self) -> f64 {
        self.context.time()
    }

    pub fn into_parts(self) -> (System, Context) {
        (self.system, self.context)
    }

    /// Run initialization hooks, then every event due at the current time.
    pub fn initialize(&mut self) -> SimResult<()> {
        match self.try_initialize() {
            Ok(()) => {
                self.state = SimulatorState::Initialized;
                Ok(())
            }
            Err(e) => {
                warn!(t = self.context.time(), error = %e, "initialization failed");
                self.state = SimulatorState::Faulted;
                Err(e)
            }
        }
    }

    fn try_initialize(&mut self) -> SimResult<()> {
        let t0 = self.context.time();
        if !t0.is_finite() {
            return Err(SimError::InvalidArg {
                what: "initial time must be finite",
            });
        }
        let mut next = self.context.clone();
        for (record, update) in self.system.initialize(&next)? {
            next.apply_discrete_update(record, update)?;
        }
        let events = self.schedule.initial_events(t0);
        debug!(t0, events = events.len(), "initializing");
        self.commit_instant(next, &events)?;
        self.pacer.reset(t0);
        Ok(())
    }

    /// Advance the root context to `t_final`.
    ///
    /// On error the context stays at the last committed event time and the
    /// simulator is `Faulted` until `initialize()` is called again.
    pub fn advance_to(&mut self, t_final: f64) -> SimResult<()> {
        if !t_final.is_finite() {
            return Err(SimError::InvalidArg {
                what: "t_final must be finite",
            });
        }
        match self.state {
            SimulatorState::Faulted => return Err(SimError::Faulted),
            SimulatorState::Idle => self.initialize()?,
            _ => {}
        }
        if t_final < self.context.time() {
            return Err(SimError::InvalidArg {
                what: "t_final is before the current time",
            });
        }

        self.state = SimulatorState::Running;
        match self.run_until(t_final) {
            Ok(()) => {
                self.state = SimulatorState::Stopped;
                Ok(())
            }
            Err(e) => {
                warn!(t = self.context.time(), error = %e, "simulation faulted");
                self.state = SimulatorState::Faulted;
                Err(e)
            }
        }
    }

    fn run_until(&mut self, t_final: f64) -> SimResult<()> {
        while self.context.time() < t_final {
            let t = self.context.time();
            let t_event = self
                .schedule
                .next_event_time(t)
                .map_or(t_final, |te| te.min(t_final));

            let mut next = self.context.clone();
            self.integrate(&mut next, t, t_event)?;
            let events = self.schedule.events_at(t, t_event);
            trace!(t, t_event, events = events.len(), "interval");
            self.commit_instant(next, &events)?;
            self.stats.intervals += 1;

            // Per-step publishes only see committed state, so they follow
            // intervals rather than integration substeps.
            if self.config.publish_every_time_step {
                self.publish_per_step()?;
            }
        }
        Ok(())
    }

    /// Integrate continuous state of `next` from `t0` to `t1` in substeps no
    /// longer than the configured maximum, pacing after each substep.
    fn integrate(&mut self, next: &mut Context, t0: f64, t1: f64) -> SimResult<()> {
        if next.continuous_state_size() == 0 || t1 <= t0 {
            next.set_time(t1);
            record_pace(&mut self.stats, self.pacer.pace(t1));
            return Ok(());
        }

        let span = t1 - t0;
        let steps = (span / self.config.max_step_size).ceil().max(1.0) as u64;
        let dt = span / steps as f64;
        let mut x = next.continuous_state();
        let integrator = self.config.integrator;
        let mut model = DiagramDynamics {
            system: &self.system,
            context: next,
        };
        for k in 0..steps {
            let t = t0 + k as f64 * dt;
            x = integrator.step(&mut model, t, &x, dt)?;
            if x.iter().any(|v| !v.is_finite()) {
                return Err(SimError::NonFiniteState { time: t + dt });
            }
            self.stats.integration_steps += 1;
            let t_next = if k + 1 == steps { t1 } else { t + dt };
            record_pace(&mut self.stats, self.pacer.pace(t_next));
        }

        next.set_time(t1);
        next.set_continuous_state(&x)?;
        Ok(())
    }

    /// Apply all discrete updates due at `next.time()` from one snapshot,
    /// commit, then publish.
    fn commit_instant(&mut self, mut next: Context, events: &[Event]) -> SimResult<()> {
        let split = events
            .iter()
            .position(|e| e.kind == EventKind::Publish)
            .unwrap_or(events.len());
        let (updates, publishes) = events.split_at(split);

        if !updates.is_empty() {
            for (record, update) in self.system.compute_discrete_updates(&next, updates)? {
                next.apply_discrete_update(record, update)?;
            }
            self.stats.discrete_updates += updates.len() as u64;
        }
        self.context = next;

        if !publishes.is_empty() {
            self.system.publish_events(&self.context, publishes)?;
            self.stats.publishes += publishes.len() as u64;
        }
        if !events.is_empty() {
            debug!(
                t = self.context.time(),
                updates = updates.len(),
                publishes = publishes.len(),
                "dispatched events"
            );
        }
        Ok(())
    }

    fn publish_per_step(&mut self) -> SimResult<()> {
        let t = self.context.time();
        let events: Vec<Event> = self
            .system
            .leaves()
            .iter()
            .map(|(record, _)| Event::per_step_publish(*record, t))
            .collect();
        self.system.publish_events(&self.context, &events)?;
        self.stats.publishes += events.len() as u64;
        Ok(())
    }
}

fn record_pace(stats: &mut SimulatorStats, outcome: PaceOutcome) {
    stats.pacing_sleeps += u64::from(outcome.sleeps);
    if outcome.behind {
        stats.pacing_overruns += 1;
    }
}

/// Derivatives of a system evaluated on a scratch context.
struct DiagramDynamics<'a> {
    system: &'a System,
    context: &'a mut Context,
}

impl ContinuousModel for DiagramDynamics<'_> {
    fn derivatives(&mut self, t: f64, x: &DVector<f64>) -> SimResult<DVector<f64>> {
        self.context.set_time(t);
        self.context.set_continuous_state(x)?;
        Ok(self.system.compute_time_derivatives(self.context)?)
    }
}
