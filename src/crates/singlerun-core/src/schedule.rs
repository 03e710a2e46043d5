//! Periodic triggers for registered plans
//!
//! A [`Schedule`] is a fixed rate. [`spawn_trigger`] runs a plan registered
//! with a [`LocalEngine`] every period until the returned [`TriggerHandle`] is
//! stopped. The first run happens one period after the trigger starts.
//!
//! ```rust,no_run
//! use singlerun_core::schedule::{spawn_trigger, Schedule};
//! use singlerun_core::LocalEngine;
//! use singlerun_state::InMemoryStateStore;
//! use std::sync::Arc;
//!
//! # async fn example() -> singlerun_core::Result<()> {
//! let engine = LocalEngine::new(Arc::new(InMemoryStateStore::new()));
//! // ... finalize "deploy-hooks" against the engine ...
//! let schedule: Schedule = "rate(5 minutes)".parse()?;
//! let handle = spawn_trigger(engine, "deploy-hooks", schedule);
//! // later
//! handle.stop().await;
//! # Ok(())
//! # }
//! ```

use crate::engine::LocalEngine;
use crate::error::{PlanError, Result};
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

/// Longest accepted period
pub const MAX_RATE: Duration = Duration::from_secs(365 * DAY);

/// Fixed-rate schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Schedule {
    every: Duration,
}

impl Schedule {
    /// Run every `every`
    ///
    /// # Errors
    ///
    /// [`PlanError::Configuration`] if the period is shorter than one second
    /// or longer than [`MAX_RATE`].
    pub fn rate(every: Duration) -> Result<Self> {
        if every.as_secs() == 0 {
            return Err(PlanError::Configuration(
                "schedule rate must be at least one second".to_string(),
            ));
        }
        if every > MAX_RATE {
            return Err(PlanError::Configuration(format!(
                "schedule rate must be at most {}",
                Self { every: MAX_RATE }
            )));
        }
        Ok(Self { every })
    }

    /// Run every `minutes` minutes
    pub fn minutes(minutes: u64) -> Result<Self> {
        Self::scaled(minutes, MINUTE)
    }

    fn scaled(value: u64, unit_secs: u64) -> Result<Self> {
        let secs = value.checked_mul(unit_secs).ok_or_else(|| {
            PlanError::Configuration(format!("schedule rate of {} is out of range", value))
        })?;
        Self::rate(Duration::from_secs(secs))
    }

    /// Period between runs
    pub fn every(&self) -> Duration {
        self.every
    }

    /// Rate expression, e.g. `rate(5 minutes)`
    ///
    /// The largest unit dividing the period evenly is used.
    ///
    /// ```rust
    /// use singlerun_core::schedule::Schedule;
    ///
    /// assert_eq!(Schedule::minutes(1)?.expression(), "rate(1 minute)");
    /// assert_eq!(Schedule::minutes(90)?.expression(), "rate(90 minutes)");
    /// assert_eq!(Schedule::minutes(120)?.expression(), "rate(2 hours)");
    /// # Ok::<(), singlerun_core::PlanError>(())
    /// ```
    pub fn expression(&self) -> String {
        let secs = self.every.as_secs();
        let (value, unit) = if secs % DAY == 0 {
            (secs / DAY, "day")
        } else if secs % HOUR == 0 {
            (secs / HOUR, "hour")
        } else if secs % MINUTE == 0 {
            (secs / MINUTE, "minute")
        } else {
            (secs, "second")
        };
        let plural = if value == 1 { "" } else { "s" };
        format!("rate({} {}{})", value, unit, plural)
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression())
    }
}

fn rate_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^rate\(\s*(\d+)\s+(second|minute|hour|day)s?\s*\)$")
            .expect("rate pattern is valid")
    })
}

impl FromStr for Schedule {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self> {
        let captures = rate_pattern().captures(s.trim()).ok_or_else(|| {
            PlanError::Configuration(format!("invalid schedule expression: '{}'", s))
        })?;

        let value: u64 = captures[1]
            .parse()
            .map_err(|e| PlanError::Configuration(format!("invalid rate '{}': {}", &captures[1], e)))?;
        let unit = match &captures[2] {
            "second" => 1,
            "minute" => MINUTE,
            "hour" => HOUR,
            _ => DAY,
        };

        Self::scaled(value, unit)
    }
}

#[derive(Default)]
struct TriggerCounters {
    runs: AtomicU64,
    failures: AtomicU64,
}

/// Handle to a running trigger
pub struct TriggerHandle {
    plan: String,
    stop: Arc<Notify>,
    counters: Arc<TriggerCounters>,
    task: JoinHandle<()>,
}

impl fmt::Debug for TriggerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriggerHandle")
            .field("plan", &self.plan)
            .field("runs", &self.runs())
            .field("failures", &self.failures())
            .finish()
    }
}

impl TriggerHandle {
    /// Plan the trigger runs
    pub fn plan(&self) -> &str {
        &self.plan
    }

    /// Completed runs
    pub fn runs(&self) -> u64 {
        self.counters.runs.load(Ordering::SeqCst)
    }

    /// Failed runs
    pub fn failures(&self) -> u64 {
        self.counters.failures.load(Ordering::SeqCst)
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the trigger and wait for an in-flight run to finish
    ///
    /// Dropping the handle without calling this leaves the trigger running.
    pub async fn stop(self) {
        let Self {
            plan,
            stop,
            counters,
            task,
        } = self;

        stop.notify_one();
        if let Err(e) = task.await {
            warn!(plan = %plan, error = %e, "trigger task ended abnormally");
        }
        info!(
            plan = %plan,
            runs = counters.runs.load(Ordering::SeqCst),
            failures = counters.failures.load(Ordering::SeqCst),
            "trigger stopped"
        );
    }
}

/// Run `plan` on `engine` every period of `schedule`
///
/// Failed runs are logged and counted; the trigger keeps ticking. Ticks
/// missed while a run is in flight are skipped, so runs never overlap.
pub fn spawn_trigger(engine: LocalEngine, plan: impl Into<String>, schedule: Schedule) -> TriggerHandle {
    let plan = plan.into();
    let stop = Arc::new(Notify::new());
    let counters = Arc::new(TriggerCounters::default());

    info!(plan = %plan, schedule = %schedule, "starting trigger");

    let task = {
        let plan = plan.clone();
        let stop = Arc::clone(&stop);
        let counters = Arc::clone(&counters);
        tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + schedule.every(), schedule.every());
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = stop.notified() => break,
                    _ = ticks.tick() => {
                        debug!(plan = %plan, "trigger fired");
                        match engine.execute(&plan).await {
                            Ok(report) => {
                                counters.runs.fetch_add(1, Ordering::SeqCst);
                                info!("{}", report.summary());
                            }
                            Err(e) => {
                                counters.failures.fetch_add(1, Ordering::SeqCst);
                                warn!(plan = %plan, error = %e, "scheduled run failed");
                            }
                        }
                    }
                }
            }
        })
    };

    TriggerHandle {
        plan,
        stop,
        counters,
        task,
    }
}
