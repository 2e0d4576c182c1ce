use crate::balance::{DailyBalance, MassBalance, ResultSeries};
use crate::daily_inputs::DailyInputs;
use crate::error::{BalanceError, Result};
use crate::soil_profile::SoilProfile;
use crate::water_balance::WaterBalanceEngine;
use approx::abs_diff_eq;
use log::{info, warn};

// Where a simulator is in its run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimulationState {
    Configured, // Nothing simulated yet
    Running,    // Some but not all days simulated
    Completed,  // All configured days simulated
}

// Drives the engine over a fixed number of days, keeping every daily record
#[derive(Clone, Debug)]
pub struct Simulator {
    profile: SoilProfile,
    forcing: DailyInputs,
    engine: WaterBalanceEngine,
    days: usize, // Configured run length [days]
    results: ResultSeries,
    initial_storage: f64, // Profile water before day 0 [mm]
}

impl Simulator {
    pub fn new(
        profile: SoilProfile,
        forcing: DailyInputs,
        engine: WaterBalanceEngine,
        days: usize,
    ) -> Self {
        let results = ResultSeries::with_capacity(days, profile.len());
        let initial_storage = profile.total_water();
        Simulator {
            profile,
            forcing,
            engine,
            days,
            results,
            initial_storage,
        }
    }

    pub fn state(&self) -> SimulationState {
        let done = self.results.len();
        if done >= self.days {
            SimulationState::Completed
        } else if done == 0 {
            SimulationState::Configured
        } else {
            SimulationState::Running
        }
    }

    pub fn days(&self) -> usize {
        self.days
    }

    pub fn days_completed(&self) -> usize {
        self.results.len()
    }

    pub fn profile(&self) -> &SoilProfile {
        &self.profile
    }

    pub fn results(&self) -> &ResultSeries {
        &self.results
    }

    pub fn into_results(self) -> ResultSeries {
        self.results
    }

    /// Simulate the next day.
    ///
    /// Nothing changes if the call fails: the day is either fully applied and
    /// recorded, or not at all.
    pub fn step(&mut self) -> Result<&DailyBalance> {
        let day = self.results.len();
        if day >= self.days {
            return Err(BalanceError::OutOfRange {
                day: day + 1,
                days: self.days,
            });
        }
        let forcing = self
            .forcing
            .get(day)
            .ok_or(BalanceError::InsufficientForcing {
                requested: day + 1,
                available: self.forcing.len(),
            })?;

        let record = self.engine.step(&mut self.profile, forcing, day)?;
        self.results.push(record);
        Ok(&self.results.records()[day])
    }

    /// Simulate the next `n` days in order.
    ///
    /// The run length and forcing coverage are checked before any day is
    /// simulated, so an impossible request leaves the simulator as it was.
    pub fn run(&mut self, n: usize) -> Result<&ResultSeries> {
        let done = self.results.len();
        let target = done + n;
        if target > self.days {
            return Err(BalanceError::OutOfRange {
                day: target,
                days: self.days,
            });
        }
        if self.forcing.len() < target {
            return Err(BalanceError::InsufficientForcing {
                requested: target,
                available: self.forcing.len(),
            });
        }

        info!(
            "simulating days {} to {} of {} ({} layers)",
            done + 1,
            target,
            self.days,
            self.profile.len()
        );
        for _ in 0..n {
            self.step()?;
        }

        let balance = self.mass_balance();
        let scale = (balance.inputs + balance.outputs).max(1.0);
        if !abs_diff_eq!(balance.residual, 0.0, epsilon = self.engine.config().tolerance * scale) {
            warn!(
                "cumulative mass-balance residual {:.3e} mm after {} days",
                balance.residual, target
            );
        }
        info!(
            "storage {:.2} -> {:.2} mm, inputs {:.2} mm, outputs {:.2} mm",
            balance.initial_storage, balance.final_storage, balance.inputs, balance.outputs
        );
        Ok(&self.results)
    }

    // Simulate every remaining configured day
    pub fn run_to_end(&mut self) -> Result<&ResultSeries> {
        let remaining = self.days - self.results.len().min(self.days);
        self.run(remaining)
    }

    // Cumulative balance from the start of the run to now
    pub fn mass_balance(&self) -> MassBalance {
        let totals = self.results.totals();
        let final_storage = self.profile.total_water();
        let inputs = totals.infiltration + totals.capillary_rise;
        let outputs = totals.drainage + totals.actual_et;
        MassBalance {
            initial_storage: self.initial_storage,
            final_storage,
            inputs,
            outputs,
            residual: (final_storage - self.initial_storage) - (inputs - outputs),
        }
    }
}
