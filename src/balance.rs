//! Daily balance records and the retained result series.
//!
//! `DailyBalance` is one simulated day; `ResultSeries` keeps every day in
//! order so writers and chart layers can query the whole run, per-layer
//! water content history included, without re-running the model.

use nalgebra::{DMatrix, DVector};

// Water balance for one simulated day, all amounts in mm
#[derive(Clone, Debug, PartialEq)]
pub struct DailyBalance {
    pub day: usize,                      // Day index, 0 for the first simulated day
    pub rainfall: f64,                   // Rain above the canopy
    pub gross_input: f64,                // Rainfall + irrigation
    pub interception: f64,               // Rain held on the canopy
    pub runoff: f64,                     // Input the surface could not take in
    pub infiltration: f64,               // Water entering the top layer
    pub capillary_rise: f64,             // Supply from the water table
    pub drainage: f64,                   // Water leaving the profile base
    pub potential_et: f64,               // Transpiration + soil evaporation demand
    pub actual_et: f64,                  // Demand actually met
    pub unmet_et: f64,                   // potential_et - actual_et
    pub transpiration: f64,              // Part of actual_et drawn by roots
    pub evaporation: f64,                // Part of actual_et lost from the soil surface
    pub layer_inflow: DVector<f64>,      // Water stored by each layer during infiltration
    pub percolation: DVector<f64>,       // Redistribution out of each layer's bottom
    pub uptake: DVector<f64>,            // Transpiration drawn from each layer
    pub layer_evaporation: DVector<f64>, // Soil evaporation from each layer
    pub theta: DVector<f64>,             // Water content after the day [m³/m³]
    pub water: DVector<f64>,             // Water held by each layer after the day
    pub storage: f64,                    // Profile water after the day
    pub storage_change: f64,             // storage minus storage at the start of the day
    pub root_depth: f64,                 // Rooting depth after the day
    pub root_zone_water: f64,            // Water in the root zone after the day
    pub residual: f64,                   // Mass-balance residual
}

impl DailyBalance {
    // Inputs minus outputs that crossed the profile boundary [mm]
    pub fn net_flux(&self) -> f64 {
        self.infiltration + self.capillary_rise - self.drainage - self.actual_et
    }
}

// Cumulative mass balance over a run [mm]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MassBalance {
    pub initial_storage: f64,
    pub final_storage: f64,
    pub inputs: f64,   // Infiltration + capillary rise
    pub outputs: f64,  // Drainage + actual ET
    pub residual: f64, // (final - initial) - (inputs - outputs)
}

// Totals of the daily flows over a run [mm]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BalanceTotals {
    pub gross_input: f64,
    pub interception: f64,
    pub runoff: f64,
    pub infiltration: f64,
    pub capillary_rise: f64,
    pub drainage: f64,
    pub potential_et: f64,
    pub actual_et: f64,
    pub unmet_et: f64,
    pub transpiration: f64,
    pub evaporation: f64,
}

// Every day of a run, in day order
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResultSeries {
    records: Vec<DailyBalance>,
    n_layers: usize,
}

impl ResultSeries {
    pub fn with_capacity(n: usize, n_layers: usize) -> Self {
        ResultSeries {
            records: Vec::with_capacity(n),
            n_layers,
        }
    }

    pub(crate) fn push(&mut self, record: DailyBalance) {
        debug_assert_eq!(record.theta.len(), self.n_layers);
        debug_assert_eq!(record.day, self.records.len());
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn n_layers(&self) -> usize {
        self.n_layers
    }

    pub fn records(&self) -> &[DailyBalance] {
        &self.records
    }

    pub fn get(&self, day: usize) -> Option<&DailyBalance> {
        self.records.get(day)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DailyBalance> {
        self.records.iter()
    }

    pub fn last(&self) -> Option<&DailyBalance> {
        self.records.last()
    }

    // Water content per day (rows) and layer (columns) [m³/m³]
    pub fn theta_history(&self) -> DMatrix<f64> {
        DMatrix::from_fn(self.records.len(), self.n_layers, |day, layer| {
            self.records[day].theta[layer]
        })
    }

    // Profile storage at the end of each day [mm]
    pub fn storage(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.storage).collect()
    }

    // Pick one daily field across the run
    pub fn series<F>(&self, field: F) -> Vec<f64>
    where
        F: Fn(&DailyBalance) -> f64,
    {
        self.records.iter().map(field).collect()
    }

    pub fn totals(&self) -> BalanceTotals {
        self.records
            .iter()
            .fold(BalanceTotals::default(), |mut t, r| {
                t.gross_input += r.gross_input;
                t.interception += r.interception;
                t.runoff += r.runoff;
                t.infiltration += r.infiltration;
                t.capillary_rise += r.capillary_rise;
                t.drainage += r.drainage;
                t.potential_et += r.potential_et;
                t.actual_et += r.actual_et;
                t.unmet_et += r.unmet_et;
                t.transpiration += r.transpiration;
                t.evaporation += r.evaporation;
                t
            })
    }

    // Largest absolute daily residual [mm]
    pub fn max_abs_residual(&self) -> f64 {
        self.records
            .iter()
            .map(|r| r.residual.abs())
            .fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(day: usize, theta: &[f64], drainage: f64) -> DailyBalance {
        DailyBalance {
            day,
            rainfall: 10.0,
            gross_input: 10.0,
            interception: 0.0,
            runoff: 1.0,
            infiltration: 9.0,
            capillary_rise: 0.0,
            drainage,
            potential_et: 3.0,
            actual_et: 2.0,
            unmet_et: 1.0,
            transpiration: 1.5,
            evaporation: 0.5,
            layer_inflow: DVector::zeros(theta.len()),
            percolation: DVector::zeros(theta.len()),
            uptake: DVector::zeros(theta.len()),
            layer_evaporation: DVector::zeros(theta.len()),
            theta: DVector::from_column_slice(theta),
            water: DVector::from_column_slice(theta) * 100.0,
            storage: 100.0,
            storage_change: 9.0 - drainage - 2.0,
            root_depth: 0.0,
            root_zone_water: 0.0,
            residual: -1e-12 * day as f64,
        }
    }

    #[test]
    fn theta_history_is_days_by_layers() {
        let mut series = ResultSeries::with_capacity(2, 3);
        series.push(record(0, &[0.1, 0.2, 0.3], 0.0));
        series.push(record(1, &[0.4, 0.5, 0.6], 0.0));
        let h = series.theta_history();
        assert_eq!(h.shape(), (2, 3));
        assert_eq!(h[(1, 0)], 0.4);
        assert_eq!(h[(0, 2)], 0.3);
    }

    #[test]
    fn totals_and_residuals() {
        let mut series = ResultSeries::with_capacity(2, 1);
        series.push(record(0, &[0.3], 1.0));
        series.push(record(1, &[0.3], 2.0));
        let t = series.totals();
        assert_eq!(t.infiltration, 18.0);
        assert_eq!(t.drainage, 3.0);
        assert_eq!(t.unmet_et, 2.0);
        assert_eq!(t.transpiration + t.evaporation, t.actual_et);
        assert_eq!(series.max_abs_residual(), 1e-12);
        assert_eq!(series.series(|r| r.drainage), vec![1.0, 2.0]);
        assert_eq!(series.get(0).unwrap().net_flux(), 6.0);
    }
}
