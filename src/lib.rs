mod balance;
mod boundary_cond;
mod config;
mod daily_inputs;
mod error;
mod output;
mod plot;
mod root_uptake;
mod runoff;
mod simulator;
mod soil_hydra;
mod soil_profile;
mod water_balance;

pub use balance::{BalanceTotals, DailyBalance, MassBalance, ResultSeries};
pub use boundary_cond::{BottomBoundary, InfiltrationCap};
pub use config::{
    EngineInput, InfiltrationInput, LayerInput, ModelInput, RootsInput, SimulationInput,
};
pub use daily_inputs::{ColumnLayout, DailyForcing, DailyInputs};
pub use error::{BalanceError, Result};
pub use output::{write_results, write_results_file};
pub use plot::{ChartSeries, PlotMode, chart_series, write_series};
pub use root_uptake::{
    ExtractionOrder, RootGrowth, RootZone, evaporation_factor, plan_extraction, root_fractions,
};
pub use runoff::{curve_number, curve_number_runoff};
pub use simulator::{SimulationState, Simulator};
pub use soil_hydra::{SoilLayer, SoilParams, Texture};
pub use soil_profile::{InfiltrationOutcome, RedistributionOutcome, SoilProfile, UptakeOutcome};
pub use water_balance::{EngineConfig, WaterBalanceEngine};
