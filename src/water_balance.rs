use crate::balance::DailyBalance;
use crate::boundary_cond::{BottomBoundary, InfiltrationCap};
use crate::daily_inputs::DailyForcing;
use crate::error::{BalanceError, Result};
use crate::root_uptake::{ExtractionOrder, RootGrowth, evaporation_factor, plan_extraction};
use crate::soil_profile::SoilProfile;
use approx::abs_diff_eq;
use log::{debug, warn};
use nalgebra::DVector;

// Engine settings
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngineConfig {
    pub extraction: ExtractionOrder,     // Order of evapotranspiration extraction
    pub infiltration: InfiltrationCap,   // Surface runoff / infiltration split
    pub bottom: BottomBoundary,          // Bottom boundary condition
    pub water_stress: bool,              // Reduce demand when the root zone dries out
    pub root_growth: Option<RootGrowth>, // Deepen roots every day
    pub tolerance: f64,                  // Relative mass-balance tolerance [-]
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            extraction: ExtractionOrder::TopDown,
            infiltration: InfiltrationCap::TopLayerKsat,
            bottom: BottomBoundary::SpillOver,
            water_stress: false,
            root_growth: None,
            tolerance: 1e-6,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        self.infiltration.validate()?;
        self.bottom.validate()?;
        if let Some(growth) = self.root_growth {
            if !growth.rate.is_finite() || growth.rate < 0.0 {
                return Err(BalanceError::Config(format!(
                    "root growth rate must be non-negative, got {}",
                    growth.rate
                )));
            }
        }
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(BalanceError::Config(format!(
                "mass-balance tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }
}

// Tipping-bucket water balance for one day at a time
#[derive(Clone, Debug, Default)]
pub struct WaterBalanceEngine {
    config: EngineConfig,
}

impl WaterBalanceEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(WaterBalanceEngine { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Advance the profile by one day.
    ///
    /// Runoff is split off first, then the infiltration cascade, gravitational
    /// redistribution, capillary rise and evapotranspiration extraction run
    /// in that order. Fails only on malformed forcing, in which case the
    /// profile is left untouched.
    pub fn step(
        &self,
        profile: &mut SoilProfile,
        forcing: &DailyForcing,
        day: usize,
    ) -> Result<DailyBalance> {
        forcing.validate_day(day)?;

        let storage_before = profile.total_water();

        if let Some(growth) = self.config.root_growth {
            let depth = growth.grow(profile.root_depth(), profile.depth());
            profile.set_root_depth(depth);
            profile.redistribute_roots();
        }

        // surface partition
        let gross_input = forcing.gross_input();
        let interception = forcing.interception();
        let surface_water = forcing.net_rainfall() + forcing.irrigation;
        let top_ksat = profile.layers()[0].params().ksat();
        let runoff = self.config.infiltration.runoff(surface_water, top_ksat);
        let infiltration = surface_water - runoff;

        // cascade, then drainage between bucket tips
        let cascade = profile.apply_infiltration(infiltration)?;
        let redistribution = profile.apply_drainage_and_redistribution(&self.config.bottom);
        let capillary_rise = profile.apply_capillary_rise(self.config.bottom.capillary_rise());
        let drainage = cascade.drainage + redistribution.drainage;

        // soil evaporation leaves the top layer, transpiration the rooted ones
        let potential_transpiration = forcing.potential_transpiration();
        let potential_evaporation = forcing.soil_evaporation;
        let potential_et = potential_transpiration + potential_evaporation;
        let crop_factor = if self.config.water_stress {
            profile.root_zone().stress_factor()
        } else {
            1.0
        };
        let mut evaporation_plan = DVector::zeros(profile.len());
        let top = &profile.layers()[0];
        evaporation_plan[0] = (potential_evaporation
            * evaporation_factor(top.theta(), top.params().theta_sat()))
        .min(top.extractable());

        let evaporated = profile.apply_uptake(&evaporation_plan)?;
        let evaporation = evaporated.extracted.sum();
        let plan = plan_extraction(
            profile,
            potential_transpiration * crop_factor,
            self.config.extraction,
        );
        let uptake = profile.apply_uptake(&plan)?;
        let transpiration = uptake.extracted.sum();
        let actual_et = evaporation + transpiration;
        let unmet_et = (potential_et - actual_et).max(0.0);

        let storage = profile.total_water();
        let storage_change = storage - storage_before;
        let residual = storage_change - (infiltration + capillary_rise - drainage - actual_et);
        let scale = (infiltration + capillary_rise + drainage + actual_et).max(1.0);
        if !abs_diff_eq!(residual, 0.0, epsilon = self.config.tolerance * scale) {
            warn!(
                "day {}: mass-balance residual {:.3e} mm exceeds tolerance",
                day + 1,
                residual
            );
        }

        debug!(
            "day {}: in={:.3} runoff={:.3} drain={:.3} t={:.3} e={:.3} pet={:.3} storage={:.3}",
            day + 1,
            infiltration,
            runoff,
            drainage,
            transpiration,
            evaporation,
            potential_et,
            storage
        );

        Ok(DailyBalance {
            day,
            rainfall: forcing.rainfall,
            gross_input,
            interception,
            runoff,
            infiltration,
            capillary_rise,
            drainage,
            potential_et,
            actual_et,
            unmet_et,
            transpiration,
            evaporation,
            layer_inflow: cascade.gains,
            percolation: redistribution.percolation,
            uptake: uptake.extracted,
            layer_evaporation: evaporated.extracted,
            theta: profile.thetas(),
            water: profile.layer_water(),
            storage,
            storage_change,
            root_depth: profile.root_depth(),
            root_zone_water: profile.root_zone().water,
            residual,
        })
    }
}
