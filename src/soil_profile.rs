use crate::boundary_cond::BottomBoundary;
use crate::error::{BalanceError, Result};
use crate::root_uptake::{RootZone, root_fractions};
use crate::soil_hydra::SoilLayer;
use log::warn;
use nalgebra::DVector;

// Clamped residuals above this are worth a warning [mm]
const CLAMP_NOTICE: f64 = 1e-9;

// Result of the top-down infiltration cascade
#[derive(Clone, Debug, PartialEq)]
pub struct InfiltrationOutcome {
    pub gains: DVector<f64>, // Water stored by each layer [mm]
    pub drainage: f64,       // Spill past the deepest layer [mm]
}

// Result of gravitational redistribution
#[derive(Clone, Debug, PartialEq)]
pub struct RedistributionOutcome {
    pub percolation: DVector<f64>, // Flow out of the bottom of each layer [mm]
    pub drainage: f64,             // Part of that flow leaving the profile [mm]
}

// Result of root uptake / evaporative extraction
#[derive(Clone, Debug, PartialEq)]
pub struct UptakeOutcome {
    pub extracted: DVector<f64>, // Water removed from each layer [mm]
    pub shortfall: f64,          // Requested but not available [mm]
}

// Layered soil column, index 0 at the surface
#[derive(Clone, Debug)]
pub struct SoilProfile {
    layers: Vec<SoilLayer>,
    root_depth: f64, // Current rooting depth [mm]
}

impl SoilProfile {
    pub fn new(layers: Vec<SoilLayer>) -> Result<Self> {
        if layers.is_empty() {
            return Err(BalanceError::InvalidProfile(
                "a profile needs at least one layer".to_string(),
            ));
        }
        let root_total: f64 = layers.iter().map(|l| l.root_fraction()).sum();
        if root_total > 1.0 + 1e-6 {
            return Err(BalanceError::InvalidProfile(format!(
                "root fractions sum to {root_total}, more than 1"
            )));
        }

        // roots reach down to the bottom of the deepest rooted layer
        let mut bottom = 0.0;
        let mut root_depth = 0.0;
        for layer in &layers {
            bottom += layer.thickness();
            if layer.root_fraction() > 0.0 {
                root_depth = bottom;
            }
        }

        Ok(SoilProfile { layers, root_depth })
    }

    pub fn with_root_depth(mut self, root_depth: f64) -> Result<Self> {
        if !root_depth.is_finite() || root_depth < 0.0 {
            return Err(BalanceError::InvalidProfile(format!(
                "rooting depth must be non-negative, got {root_depth}"
            )));
        }
        self.root_depth = root_depth.min(self.depth());
        Ok(self)
    }

    pub fn layers(&self) -> &[SoilLayer] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    // Total soil depth [mm]
    pub fn depth(&self) -> f64 {
        self.layers.iter().map(|l| l.thickness()).sum()
    }

    pub fn root_depth(&self) -> f64 {
        self.root_depth
    }

    // Total water held in the profile [mm]
    pub fn total_water(&self) -> f64 {
        self.layers.iter().map(|l| l.water()).sum()
    }

    // Total gravitational water above field capacity [mm]
    pub fn drainable_excess(&self) -> f64 {
        self.layers.iter().map(|l| l.drainable()).sum()
    }

    // Total room left before the whole column saturates [mm]
    pub fn storage_capacity(&self) -> f64 {
        self.layers.iter().map(|l| l.storage_capacity()).sum()
    }

    // Extractable water of each rooted layer [mm]
    pub fn uptake_capacity(&self) -> DVector<f64> {
        DVector::from_iterator(
            self.len(),
            self.layers.iter().map(|l| {
                if l.root_fraction() > 0.0 {
                    l.extractable()
                } else {
                    0.0
                }
            }),
        )
    }

    pub fn thetas(&self) -> DVector<f64> {
        DVector::from_iterator(self.len(), self.layers.iter().map(|l| l.theta()))
    }

    // Water held by each layer [mm]
    pub fn layer_water(&self) -> DVector<f64> {
        DVector::from_iterator(self.len(), self.layers.iter().map(|l| l.water()))
    }

    pub fn root_zone(&self) -> RootZone {
        RootZone::from_profile(self)
    }

    pub(crate) fn set_root_depth(&mut self, root_depth: f64) {
        self.root_depth = root_depth.clamp(0.0, self.depth());
    }

    // Reassign layer root fractions from the current rooting depth
    pub(crate) fn redistribute_roots(&mut self) {
        let fractions = root_fractions(self.layers.iter().map(|l| l.thickness()), self.root_depth);
        for (layer, fraction) in self.layers.iter_mut().zip(fractions) {
            layer.set_root_fraction(fraction);
        }
    }

    /// Route incoming water through the column, top to bottom.
    ///
    /// Each layer fills to saturation before the surplus tips into the layer
    /// below; whatever passes the deepest layer is deep drainage.
    pub fn apply_infiltration(&mut self, depth: f64) -> Result<InfiltrationOutcome> {
        if !depth.is_finite() || depth < 0.0 {
            return Err(BalanceError::InvalidInput(format!(
                "infiltration depth must be a non-negative number, got {depth}"
            )));
        }

        let mut gains = DVector::zeros(self.len());
        let mut incoming = depth;
        for (i, layer) in self.layers.iter_mut().enumerate() {
            if incoming <= 0.0 {
                break;
            }
            let take = incoming.min(layer.storage_capacity());
            let stored = shift_water(layer, take);
            gains[i] = stored;
            incoming -= stored;
        }

        Ok(InfiltrationOutcome {
            gains,
            drainage: incoming.max(0.0),
        })
    }

    /// Let water above field capacity drain to the layer below.
    ///
    /// One top-down pass. A layer passes at most its excess over field
    /// capacity, at most K_sat for the day, and no more than the layer below
    /// can hold. What the deepest layer does with its excess depends on the
    /// bottom boundary.
    pub fn apply_drainage_and_redistribution(
        &mut self,
        bottom: &BottomBoundary,
    ) -> RedistributionOutcome {
        let n = self.len();
        let mut percolation = DVector::zeros(n);
        let mut drainage = 0.0;

        for i in 0..n {
            let excess = self.layers[i].drainable();
            if excess <= 0.0 {
                continue;
            }
            let rate_limit = self.layers[i].params().ksat();

            if i + 1 < n {
                let (upper, lower) = self.layers.split_at_mut(i + 1);
                let (from, to) = (&mut upper[i], &mut lower[0]);
                let flux = excess.min(rate_limit).min(to.storage_capacity());
                if flux <= 0.0 {
                    continue;
                }
                let released = -shift_water(from, -flux);
                let received = shift_water(to, released);
                // anything the lower layer could not take stays put
                if released > received {
                    shift_water(from, released - received);
                }
                percolation[i] = received;
            } else if matches!(bottom, BottomBoundary::FreeDrainage) {
                let flux = excess.min(rate_limit);
                let released = -shift_water(&mut self.layers[i], -flux);
                percolation[i] = released;
                drainage += released;
            }
        }

        RedistributionOutcome {
            percolation,
            drainage,
        }
    }

    // Refill the deepest layer from a water table, up to field capacity [mm]
    pub fn apply_capillary_rise(&mut self, rate: f64) -> f64 {
        let Some(last) = self.layers.last_mut() else {
            return 0.0;
        };
        let amount = rate.max(0.0).min(last.deficit_below_fc());
        if amount <= 0.0 {
            return 0.0;
        }
        shift_water(last, amount)
    }

    /// Remove water from each layer, never going below wilting point.
    ///
    /// `amounts` holds one request per layer [mm]. Requests beyond a layer's
    /// extractable water are cut back and the total cut reported as the
    /// shortfall.
    pub fn apply_uptake(&mut self, amounts: &DVector<f64>) -> Result<UptakeOutcome> {
        if amounts.len() != self.len() {
            return Err(BalanceError::InvalidInput(format!(
                "expected {} uptake amounts, got {}",
                self.len(),
                amounts.len()
            )));
        }
        if amounts.iter().any(|a| !a.is_finite() || *a < 0.0) {
            return Err(BalanceError::InvalidInput(
                "uptake amounts must be non-negative numbers".to_string(),
            ));
        }

        let mut extracted = DVector::zeros(self.len());
        for (i, layer) in self.layers.iter_mut().enumerate() {
            let take = amounts[i].min(layer.extractable());
            if take > 0.0 {
                extracted[i] = -shift_water(layer, -take);
            }
        }
        let shortfall = (amounts.sum() - extracted.sum()).max(0.0);

        Ok(UptakeOutcome {
            extracted,
            shortfall,
        })
    }
}

// Add (or with a negative amount remove) water, returning the actual change [mm]
fn shift_water(layer: &mut SoilLayer, amount: f64) -> f64 {
    if amount == 0.0 {
        return 0.0;
    }
    let before = layer.water();
    let residual = layer.set_water(before + amount);
    if residual.abs() > CLAMP_NOTICE {
        warn!(
            "layer '{}' clamped to its bounds, {:.6} mm not applied",
            layer.name, residual
        );
    }
    layer.water() - before
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soil_hydra::SoilParams;
    use approx::assert_relative_eq;

    fn params(ksat: f64) -> SoilParams {
        SoilParams::new(0.45, 0.30, 0.10, ksat).unwrap()
    }

    fn layer(theta: f64) -> SoilLayer {
        SoilLayer::new(200.0, params(1000.0), theta, 0.0).unwrap()
    }

    #[test]
    fn rejects_empty_profile() {
        assert!(matches!(
            SoilProfile::new(vec![]),
            Err(BalanceError::InvalidProfile(_))
        ));
    }

    #[test]
    fn rejects_too_many_roots() {
        let a = SoilLayer::new(100.0, params(10.0), 0.3, 0.7).unwrap();
        let b = SoilLayer::new(100.0, params(10.0), 0.3, 0.7).unwrap();
        assert!(SoilProfile::new(vec![a, b]).is_err());
    }

    #[test]
    fn root_depth_defaults_to_deepest_rooted_layer() {
        let a = SoilLayer::new(100.0, params(10.0), 0.3, 0.6).unwrap();
        let b = SoilLayer::new(150.0, params(10.0), 0.3, 0.4).unwrap();
        let c = SoilLayer::new(200.0, params(10.0), 0.3, 0.0).unwrap();
        let p = SoilProfile::new(vec![a, b, c]).unwrap();
        assert_relative_eq!(p.root_depth(), 250.0);
        assert_relative_eq!(p.depth(), 450.0);
    }

    #[test]
    fn single_layer_fills_then_drains() {
        let mut p = SoilProfile::new(vec![layer(0.30)]).unwrap();
        let out = p.apply_infiltration(50.0).unwrap();
        assert_relative_eq!(out.gains[0], 30.0, epsilon = 1e-9);
        assert_relative_eq!(out.drainage, 20.0, epsilon = 1e-9);
        assert_relative_eq!(p.layers()[0].theta(), 0.45, epsilon = 1e-12);
    }

    #[test]
    fn saturated_top_passes_everything_down() {
        let mut p = SoilProfile::new(vec![layer(0.45), layer(0.30)]).unwrap();
        let out = p.apply_infiltration(10.0).unwrap();
        assert_eq!(out.gains[0], 0.0);
        assert_relative_eq!(out.gains[1], 10.0, epsilon = 1e-9);
        assert_eq!(out.drainage, 0.0);
        assert_eq!(p.layers()[0].theta(), 0.45);
        assert_relative_eq!(p.layers()[1].theta(), 0.35, epsilon = 1e-12);
    }

    #[test]
    fn infiltration_rejects_negative_depth() {
        let mut p = SoilProfile::new(vec![layer(0.30)]).unwrap();
        assert!(p.apply_infiltration(-1.0).is_err());
        assert!(p.apply_infiltration(f64::NAN).is_err());
        assert_eq!(p.layers()[0].theta(), 0.30);
    }

    #[test]
    fn redistribution_moves_excess_down() {
        // 20 mm above field capacity on top, 30 mm of room below
        let mut p = SoilProfile::new(vec![layer(0.40), layer(0.30)]).unwrap();
        let out = p.apply_drainage_and_redistribution(&BottomBoundary::SpillOver);
        assert_relative_eq!(out.percolation[0], 20.0, epsilon = 1e-9);
        assert_eq!(out.drainage, 0.0);
        assert_relative_eq!(p.layers()[0].theta(), 0.30, epsilon = 1e-12);
        assert_relative_eq!(p.layers()[1].theta(), 0.40, epsilon = 1e-12);
    }

    #[test]
    fn redistribution_respects_ksat() {
        let top = SoilLayer::new(200.0, params(5.0), 0.40, 0.0).unwrap();
        let mut p = SoilProfile::new(vec![top, layer(0.30)]).unwrap();
        let out = p.apply_drainage_and_redistribution(&BottomBoundary::SpillOver);
        assert_relative_eq!(out.percolation[0], 5.0, epsilon = 1e-9);
    }

    #[test]
    fn redistribution_leaves_dry_layers_alone() {
        let mut p = SoilProfile::new(vec![layer(0.25), layer(0.20)]).unwrap();
        let before = p.thetas();
        let out = p.apply_drainage_and_redistribution(&BottomBoundary::FreeDrainage);
        assert_eq!(out.percolation.sum(), 0.0);
        assert_eq!(p.thetas(), before);
    }

    #[test]
    fn free_drainage_empties_bottom_to_field_capacity() {
        let mut p = SoilProfile::new(vec![layer(0.30), layer(0.45)]).unwrap();
        let out = p.apply_drainage_and_redistribution(&BottomBoundary::FreeDrainage);
        assert_relative_eq!(out.drainage, 30.0, epsilon = 1e-9);
        assert_relative_eq!(p.layers()[1].theta(), 0.30, epsilon = 1e-12);

        let mut q = SoilProfile::new(vec![layer(0.30), layer(0.45)]).unwrap();
        let out = q.apply_drainage_and_redistribution(&BottomBoundary::SpillOver);
        assert_eq!(out.drainage, 0.0);
        assert_eq!(q.layers()[1].theta(), 0.45);
    }

    #[test]
    fn capillary_rise_stops_at_field_capacity() {
        let mut p = SoilProfile::new(vec![layer(0.30), layer(0.29)]).unwrap();
        let risen = p.apply_capillary_rise(5.0);
        assert_relative_eq!(risen, 2.0, epsilon = 1e-9);
        assert_relative_eq!(p.layers()[1].theta(), 0.30, epsilon = 1e-12);
        assert!(p.apply_capillary_rise(5.0) < 1e-9);
    }

    #[test]
    fn uptake_stops_at_wilting_point() {
        // 4 mm above wilting point
        let mut p = SoilProfile::new(vec![layer(0.12)]).unwrap();
        let out = p.apply_uptake(&DVector::from_vec(vec![6.0])).unwrap();
        assert_relative_eq!(out.extracted[0], 4.0, epsilon = 1e-9);
        assert_relative_eq!(out.shortfall, 2.0, epsilon = 1e-9);
        assert_relative_eq!(p.layers()[0].theta(), 0.10, epsilon = 1e-12);
    }

    #[test]
    fn uptake_validates_before_mutating() {
        let mut p = SoilProfile::new(vec![layer(0.30), layer(0.30)]).unwrap();
        assert!(p.apply_uptake(&DVector::from_vec(vec![1.0])).is_err());
        assert!(p.apply_uptake(&DVector::from_vec(vec![1.0, -1.0])).is_err());
        assert_relative_eq!(p.total_water(), 120.0, epsilon = 1e-9);
    }

    #[test]
    fn profile_aggregates() {
        let p = SoilProfile::new(vec![layer(0.40), layer(0.20)]).unwrap();
        assert_relative_eq!(p.total_water(), 120.0, epsilon = 1e-9);
        assert_relative_eq!(p.drainable_excess(), 20.0, epsilon = 1e-9);
        assert_relative_eq!(p.storage_capacity(), 60.0, epsilon = 1e-9);
    }

    #[test]
    fn roots_follow_rooting_depth() {
        let mut p = SoilProfile::new(vec![layer(0.30), layer(0.30), layer(0.30)])
            .unwrap()
            .with_root_depth(300.0)
            .unwrap();
        p.redistribute_roots();
        let total: f64 = p.layers().iter().map(|l| l.root_fraction()).sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-12);
        assert_eq!(p.layers()[2].root_fraction(), 0.0);
    }
}
