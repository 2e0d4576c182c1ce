use crate::error::{BalanceError, Result};
use crate::runoff::curve_number_runoff;
use serde::Deserialize;

// How much of the daily water input can enter the soil surface
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InfiltrationCap {
    #[default]
    TopLayerKsat, // Capped at K_sat of the top layer over one day
    Fixed {
        rate: f64, // Infiltration capacity [mm/day]
    },
    CurveNumber {
        cn: f64, // NRCS curve number (0, 100]
    },
}

impl InfiltrationCap {
    pub fn validate(&self) -> Result<()> {
        match *self {
            InfiltrationCap::TopLayerKsat => Ok(()),
            InfiltrationCap::Fixed { rate } if rate.is_finite() && rate >= 0.0 => Ok(()),
            InfiltrationCap::Fixed { rate } => Err(BalanceError::Config(format!(
                "infiltration capacity must be non-negative, got {rate}"
            ))),
            InfiltrationCap::CurveNumber { cn } if cn > 0.0 && cn <= 100.0 => Ok(()),
            InfiltrationCap::CurveNumber { cn } => Err(BalanceError::Config(format!(
                "curve number must lie in (0, 100], got {cn}"
            ))),
        }
    }

    // Surface runoff [mm] from the water reaching the ground, never more than the input
    pub fn runoff(&self, water_input: f64, top_ksat: f64) -> f64 {
        if water_input <= 0.0 {
            return 0.0;
        }
        let runoff = match *self {
            InfiltrationCap::TopLayerKsat => water_input - top_ksat,
            InfiltrationCap::Fixed { rate } => water_input - rate,
            InfiltrationCap::CurveNumber { cn } => curve_number_runoff(water_input, cn),
        };
        runoff.clamp(0.0, water_input)
    }
}

// Bottom boundary condition types
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BottomBoundary {
    #[default]
    SpillOver, // Deep drainage only when the cascade overflows the deepest layer
    FreeDrainage, // Deepest layer also drains its excess above field capacity
    WaterTable {
        capillary_rise: f64, // Upward supply into the deepest layer [mm/day]
    },
}

impl BottomBoundary {
    pub fn validate(&self) -> Result<()> {
        match *self {
            BottomBoundary::WaterTable { capillary_rise }
                if !capillary_rise.is_finite() || capillary_rise < 0.0 =>
            {
                Err(BalanceError::Config(format!(
                    "capillary rise must be non-negative, got {capillary_rise}"
                )))
            }
            _ => Ok(()),
        }
    }

    pub fn capillary_rise(&self) -> f64 {
        match *self {
            BottomBoundary::WaterTable { capillary_rise } => capillary_rise,
            _ => 0.0,
        }
    }
}
