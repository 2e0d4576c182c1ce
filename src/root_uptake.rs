use crate::soil_profile::SoilProfile;
use nalgebra::DVector;
use serde::Deserialize;

// Below this a layer or demand is treated as exhausted [mm]
const EXHAUSTED: f64 = 1e-12;

// Stress factor once the root zone is at or below wilting point [-]
const MIN_STRESS_FACTOR: f64 = 0.01;

// Order in which evapotranspiration demand is drawn from the layers
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionOrder {
    #[default]
    TopDown, // Shallowest layer first, down to wilting point, then the next
    RootWeighted, // Shared in proportion to each layer's root fraction
}

// Daily deepening of the root system
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
pub struct RootGrowth {
    pub rate: f64, // Root elongation [mm/day]
}

impl Default for RootGrowth {
    fn default() -> Self {
        RootGrowth { rate: 8.0 }
    }
}

impl RootGrowth {
    // New rooting depth, limited by the soil depth [mm]
    pub fn grow(&self, root_depth: f64, soil_depth: f64) -> f64 {
        (root_depth + self.rate.max(0.0)).min(soil_depth)
    }
}

// Water held in the rooted part of the profile
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RootZone {
    pub depth: f64,    // Rooting depth [mm]
    pub water: f64,    // Water content [mm]
    pub vwc: f64,      // Water content [m³/m³]
    pub sat: f64,      // Saturation point [m³/m³]
    pub fc: f64,       // Field capacity [m³/m³]
    pub pwp: f64,      // Permanent wilting point [m³/m³]
    pub critical: f64, // Content below which the crop is stressed [m³/m³]
}

impl RootZone {
    // Thickness-weighted average over the top `root_depth` mm of the layers
    pub(crate) fn from_profile(profile: &SoilProfile) -> Self {
        let root_depth = profile.root_depth();
        if root_depth <= 0.0 {
            return RootZone::default();
        }

        let mut zone = RootZone::default();
        let mut top = 0.0;
        for layer in profile.layers() {
            let rooted = (root_depth - top).clamp(0.0, layer.thickness());
            if rooted <= 0.0 {
                break;
            }
            let params = layer.params();
            zone.water += layer.theta() * rooted;
            zone.sat += params.theta_sat() * rooted;
            zone.fc += params.theta_fc() * rooted;
            zone.pwp += params.theta_pwp() * rooted;
            zone.depth += rooted;
            top += layer.thickness();
        }

        zone.vwc = zone.water / zone.depth;
        zone.sat /= zone.depth;
        zone.fc /= zone.depth;
        zone.pwp /= zone.depth;
        zone.critical = zone.pwp + 0.5 * (zone.sat - zone.pwp);
        zone
    }

    /// Reduction applied to the evapotranspiration demand.
    ///
    /// 1 means no stress. Between the wilting point and the critical content
    /// the factor falls linearly; at or below wilting point it bottoms out
    /// at 0.01.
    pub fn stress_factor(&self) -> f64 {
        if self.depth <= 0.0 || self.vwc >= self.critical {
            1.0
        } else if self.vwc > self.pwp {
            (self.vwc - self.pwp) / (self.critical - self.pwp)
        } else {
            MIN_STRESS_FACTOR
        }
    }
}

// Cumulative root distribution: share of roots above relative depth c
fn cumulative_roots(c: f64) -> f64 {
    1.8 * c - 0.8 * c.powi(2)
}

/// Share of the root system in each layer for a given rooting depth.
///
/// Denser near the surface, tapering with depth; layers entirely below the
/// rooting depth get nothing. The shares sum to one whenever the roots end
/// inside the profile.
pub fn root_fractions<I>(thicknesses: I, root_depth: f64) -> Vec<f64>
where
    I: IntoIterator<Item = f64>,
{
    let mut bottom = 0.0;
    let mut above = 0.0;
    thicknesses
        .into_iter()
        .map(|thick| {
            if root_depth <= 0.0 {
                return 0.0;
            }
            bottom += thick;
            let cum = cumulative_roots((bottom / root_depth).min(1.0));
            let share = cum - above;
            above = cum;
            share.max(0.0)
        })
        .collect()
}

/// Reduction of bare-soil evaporation as the top layer dries [-].
///
/// Close to 1 near saturation, 0.5 at about 28% of saturation and falling
/// steeply below that.
pub fn evaporation_factor(theta: f64, theta_sat: f64) -> f64 {
    if theta <= 0.0 || theta_sat <= 0.0 {
        return 0.0;
    }
    1.0 / (1.0 + (3.6073 * theta / theta_sat).powf(-9.3172))
}

/// Split a transpiration demand [mm] across the rooted layers.
///
/// Layers without roots are never drawn on, and no layer is asked for more
/// than its water above wilting point, so the plan total is the amount that
/// can actually be met.
pub fn plan_extraction(profile: &SoilProfile, demand: f64, order: ExtractionOrder) -> DVector<f64> {
    let n = profile.len();
    let mut plan = DVector::zeros(n);
    if demand <= 0.0 {
        return plan;
    }
    let available = profile.uptake_capacity();

    match order {
        ExtractionOrder::TopDown => {
            let mut remaining = demand;
            for i in 0..n {
                if remaining <= EXHAUSTED {
                    break;
                }
                let take = remaining.min(available[i]);
                plan[i] = take;
                remaining -= take;
            }
        }
        ExtractionOrder::RootWeighted => {
            let weights: Vec<f64> = profile.layers().iter().map(|l| l.root_fraction()).collect();
            let mut active: Vec<usize> = (0..n)
                .filter(|&i| weights[i] > 0.0 && available[i] > EXHAUSTED)
                .collect();
            let mut remaining = demand;

            // every pass either meets the demand or exhausts at least one layer
            for _ in 0..=n {
                if remaining <= EXHAUSTED || active.is_empty() {
                    break;
                }
                let total_weight: f64 = active.iter().map(|&i| weights[i]).sum();
                let mut taken = 0.0;
                for &i in &active {
                    let share = remaining * weights[i] / total_weight;
                    let take = share.min(available[i] - plan[i]);
                    plan[i] += take;
                    taken += take;
                }
                remaining -= taken;
                active.retain(|&i| available[i] - plan[i] > EXHAUSTED);
            }
        }
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soil_hydra::{SoilLayer, SoilParams};
    use approx::assert_relative_eq;

    fn params() -> SoilParams {
        SoilParams::new(0.45, 0.30, 0.10, 100.0).unwrap()
    }

    fn profile(thetas: &[f64], roots: &[f64]) -> SoilProfile {
        let layers = thetas
            .iter()
            .zip(roots)
            .map(|(&t, &r)| SoilLayer::new(100.0, params(), t, r).unwrap())
            .collect();
        SoilProfile::new(layers).unwrap()
    }

    #[test]
    fn fractions_sum_to_one_inside_profile() {
        let f = root_fractions([100.0, 100.0, 100.0, 100.0], 300.0);
        assert_relative_eq!(f.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        assert!(f[0] > f[1] && f[1] > f[2]);
        assert_eq!(f[3], 0.0);
    }

    #[test]
    fn no_roots_no_fractions() {
        let f = root_fractions([100.0, 100.0], 0.0);
        assert_eq!(f, vec![0.0, 0.0]);
    }

    #[test]
    fn growth_is_limited_by_soil_depth() {
        let g = RootGrowth::default();
        assert_relative_eq!(g.grow(100.0, 500.0), 108.0);
        assert_relative_eq!(g.grow(495.0, 500.0), 500.0);
    }

    #[test]
    fn top_down_takes_shallow_water_first() {
        // 5 mm extractable in the top layer, 20 mm below
        let p = profile(&[0.15, 0.30], &[0.5, 0.5]);
        let plan = plan_extraction(&p, 10.0, ExtractionOrder::TopDown);
        assert_relative_eq!(plan[0], 5.0, epsilon = 1e-9);
        assert_relative_eq!(plan[1], 5.0, epsilon = 1e-9);
    }

    #[test]
    fn top_down_skips_rootless_layers() {
        // only the deep layer holds water, and it has no roots
        let p = profile(&[0.10, 0.30], &[1.0, 0.0]);
        assert_eq!(p.uptake_capacity().sum(), 0.0);
        let plan = plan_extraction(&p, 5.0, ExtractionOrder::TopDown);
        assert_eq!(plan.sum(), 0.0);

        let p = profile(&[0.13, 0.30], &[1.0, 0.0]);
        let plan = plan_extraction(&p, 5.0, ExtractionOrder::TopDown);
        assert_relative_eq!(plan[0], 3.0, epsilon = 1e-9);
        assert_eq!(plan[1], 0.0);
    }

    #[test]
    fn evaporation_slows_as_topsoil_dries() {
        assert!(evaporation_factor(0.45, 0.45) > 0.999);
        assert_relative_eq!(evaporation_factor(0.45 / 3.6073, 0.45), 0.5, epsilon = 1e-12);
        assert!(evaporation_factor(0.05, 0.45) < 0.01);
        assert_eq!(evaporation_factor(0.0, 0.45), 0.0);
    }

    #[test]
    fn root_weighted_reallocates_shortfall() {
        let p = profile(&[0.12, 0.30], &[0.8, 0.2]);
        let plan = plan_extraction(&p, 10.0, ExtractionOrder::RootWeighted);
        // top layer only holds 2 mm above wilting point
        assert_relative_eq!(plan[0], 2.0, epsilon = 1e-9);
        assert_relative_eq!(plan[1], 8.0, epsilon = 1e-9);
    }

    #[test]
    fn root_weighted_ignores_rootless_layers() {
        let p = profile(&[0.30, 0.30], &[1.0, 0.0]);
        let plan = plan_extraction(&p, 25.0, ExtractionOrder::RootWeighted);
        assert_relative_eq!(plan[0], 20.0, epsilon = 1e-9);
        assert_eq!(plan[1], 0.0);
    }

    #[test]
    fn stress_factor_ranges() {
        let wet = profile(&[0.40, 0.40], &[0.5, 0.5]);
        assert_eq!(wet.root_zone().stress_factor(), 1.0);

        // critical = 0.1 + 0.5 * 0.35 = 0.275
        let mid = profile(&[0.20, 0.20], &[0.5, 0.5]);
        let zone = mid.root_zone();
        assert_relative_eq!(zone.critical, 0.275, epsilon = 1e-12);
        assert_relative_eq!(zone.stress_factor(), 0.1 / 0.175, epsilon = 1e-9);

        let dry = profile(&[0.10, 0.10], &[0.5, 0.5]);
        assert_eq!(dry.root_zone().stress_factor(), MIN_STRESS_FACTOR);
    }
}
