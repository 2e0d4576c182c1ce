use crate::error::{BalanceError, Result};
use serde::Deserialize;

// Soil texture [%]
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
pub struct Texture {
    pub clay: f64, // Clay content [%]
    pub sand: f64, // Sand content [%]
    pub om: f64,   // Organic matter [%]
}

// Soil hydraulic parameters for the tipping-bucket model
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SoilParams {
    pub(crate) theta_sat: f64, // Saturated water content [m³/m³]
    pub(crate) theta_fc: f64,  // Field capacity [m³/m³]
    pub(crate) theta_pwp: f64, // Permanent wilting point [m³/m³]
    pub(crate) ksat: f64,      // Saturated hydraulic conductivity [mm/day]
}

impl SoilParams {
    pub fn new(theta_sat: f64, theta_fc: f64, theta_pwp: f64, ksat: f64) -> Result<Self> {
        let params = SoilParams {
            theta_sat,
            theta_fc,
            theta_pwp,
            ksat,
        };
        params.validate()?;
        Ok(params)
    }

    /// Derive hydraulic parameters from texture.
    ///
    /// Saxton & Rawls (2008) pedotransfer equations for the 1500 kPa, 33 kPa
    /// and saturated water contents, followed by the calibration for tropical
    /// (Malaysian) soils. K_sat comes from the pore size distribution index.
    pub fn from_texture(texture: Texture) -> Result<Self> {
        let Texture { clay, sand, om } = texture;
        let in_range = |v: f64| v.is_finite() && (0.0..=100.0).contains(&v);
        if !in_range(clay) || !in_range(sand) || clay + sand > 100.0 {
            return Err(BalanceError::InvalidProfile(format!(
                "texture clay={clay}%, sand={sand}% is not a valid composition"
            )));
        }
        if !om.is_finite() || om < 0.0 {
            return Err(BalanceError::InvalidProfile(format!(
                "organic matter must be non-negative, got {om}%"
            )));
        }

        // sand and clay as fractions, organic matter stays in %
        let s = sand / 100.0;
        let c = clay / 100.0;

        let t1500 = -0.024 * s + 0.487 * c + 0.006 * om + 0.005 * (s * om) - 0.013 * (c * om)
            + 0.068 * (s * c)
            + 0.031;
        let theta1500 = t1500 + (0.14 * t1500 - 0.02);

        let t33 = -0.251 * s + 0.195 * c + 0.011 * om + 0.006 * (s * om) - 0.027 * (c * om)
            + 0.452 * (s * c)
            + 0.299;
        let theta33 = t33 + (1.283 * t33.powi(2) - 0.374 * t33 - 0.015);

        let ts33 = 0.278 * s + 0.034 * c + 0.022 * om
            - 0.018 * (s * om)
            - 0.027 * (c * om)
            - 0.584 * (s * c)
            + 0.078;
        let theta_s33 = ts33 + 0.636 * ts33 - 0.107;
        let theta0 = theta33 + theta_s33 - 0.097 * s + 0.043;

        if theta1500 <= 0.0 || theta33 <= theta1500 {
            return Err(BalanceError::InvalidProfile(format!(
                "texture clay={clay}%, sand={sand}%, om={om}% gives no usable retention curve"
            )));
        }

        // pore size distribution index
        let b = (1500f64.ln() - 33f64.ln()) / (theta33.ln() - theta1500.ln());
        let psd = 1.0 / b;
        let awc = theta0 - theta33;
        let ksat_mm_hour = 1930.0 * awc.max(0.0).powf(3.0 - psd);

        Self::new(
            2.225 * theta0 * (1.0 - theta0),
            1.605 * theta33 * (1.0 - theta33),
            1.528 * theta1500 * (1.0 - theta1500),
            ksat_mm_hour * 24.0,
        )
    }

    fn validate(&self) -> Result<()> {
        let SoilParams {
            theta_sat,
            theta_fc,
            theta_pwp,
            ksat,
        } = *self;
        if ![theta_sat, theta_fc, theta_pwp, ksat]
            .iter()
            .all(|v| v.is_finite())
        {
            return Err(BalanceError::InvalidProfile(
                "hydraulic parameters must be finite".to_string(),
            ));
        }
        if !(0.0 <= theta_pwp && theta_pwp <= theta_fc && theta_fc <= theta_sat && theta_sat <= 1.0)
        {
            return Err(BalanceError::InvalidProfile(format!(
                "expected 0 <= pwp <= fc <= sat <= 1, got pwp={theta_pwp}, fc={theta_fc}, sat={theta_sat}"
            )));
        }
        if ksat < 0.0 {
            return Err(BalanceError::InvalidProfile(format!(
                "saturated conductivity must be non-negative, got {ksat}"
            )));
        }
        Ok(())
    }

    pub fn theta_sat(&self) -> f64 {
        self.theta_sat
    }

    pub fn theta_fc(&self) -> f64 {
        self.theta_fc
    }

    pub fn theta_pwp(&self) -> f64 {
        self.theta_pwp
    }

    pub fn ksat(&self) -> f64 {
        self.ksat
    }

    /// Resolve a negative moisture code into a volumetric water content.
    ///
    /// -1, -2 and -3 stand for saturation, field capacity and wilting point.
    /// Codes in between interpolate linearly (-1.5 is halfway between SAT and
    /// FC); any other negative code means field capacity. Non-negative values
    /// are returned unchanged.
    pub fn resolve_moisture_code(&self, code: f64) -> f64 {
        if code >= 0.0 {
            return code;
        }
        let v = -code;
        if (1.0..=2.0).contains(&v) {
            self.theta_sat - (v - 1.0) * (self.theta_sat - self.theta_fc)
        } else if v > 2.0 && v <= 3.0 {
            self.theta_fc - (v - 2.0) * (self.theta_fc - self.theta_pwp)
        } else {
            self.theta_fc
        }
    }
}

// A single soil bucket
#[derive(Clone, Debug)]
pub struct SoilLayer {
    thickness: f64,     // Layer thickness [mm]
    params: SoilParams, // Hydraulic parameters
    theta: f64,         // Current water content [m³/m³]
    root_fraction: f64, // Share of the root system in this layer [-]
    pub name: String,   // Horizon name like "A" or "Bt1"
}

impl SoilLayer {
    pub fn new(thickness: f64, params: SoilParams, theta: f64, root_fraction: f64) -> Result<Self> {
        params.validate()?;
        if !thickness.is_finite() || thickness <= 0.0 {
            return Err(BalanceError::InvalidProfile(format!(
                "layer thickness must be positive, got {thickness}"
            )));
        }
        if !theta.is_finite() || theta < params.theta_pwp || theta > params.theta_sat {
            return Err(BalanceError::InvalidProfile(format!(
                "initial water content {theta} outside [{}, {}]",
                params.theta_pwp, params.theta_sat
            )));
        }
        if !root_fraction.is_finite() || !(0.0..=1.0).contains(&root_fraction) {
            return Err(BalanceError::InvalidProfile(format!(
                "root fraction must lie in [0, 1], got {root_fraction}"
            )));
        }
        Ok(SoilLayer {
            thickness,
            params,
            theta,
            root_fraction,
            name: String::new(),
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn thickness(&self) -> f64 {
        self.thickness
    }

    pub fn params(&self) -> &SoilParams {
        &self.params
    }

    pub fn theta(&self) -> f64 {
        self.theta
    }

    pub fn root_fraction(&self) -> f64 {
        self.root_fraction
    }

    // Stored water [mm]
    pub fn water(&self) -> f64 {
        self.theta * self.thickness
    }

    // Room left before saturation [mm]
    pub fn storage_capacity(&self) -> f64 {
        ((self.params.theta_sat - self.theta) * self.thickness).max(0.0)
    }

    // Water needed to bring the layer back to field capacity [mm]
    pub fn deficit_below_fc(&self) -> f64 {
        ((self.params.theta_fc - self.theta) * self.thickness).max(0.0)
    }

    // Water roots can still pull out [mm]
    pub fn extractable(&self) -> f64 {
        ((self.theta - self.params.theta_pwp) * self.thickness).max(0.0)
    }

    // Gravitational water above field capacity [mm]
    pub fn drainable(&self) -> f64 {
        ((self.theta - self.params.theta_fc) * self.thickness).max(0.0)
    }

    /// Set the stored water [mm], clamping into [θ_pwp, θ_sat].
    ///
    /// Returns the clamped residual in mm: positive for water above
    /// saturation that could not be stored, negative for a deficit below
    /// the wilting point that had to be filled in.
    pub(crate) fn set_water(&mut self, water: f64) -> f64 {
        let lo = self.params.theta_pwp * self.thickness;
        let hi = self.params.theta_sat * self.thickness;
        let clamped = water.clamp(lo, hi);
        self.theta = (clamped / self.thickness).clamp(self.params.theta_pwp, self.params.theta_sat);
        water - clamped
    }

    pub(crate) fn set_root_fraction(&mut self, fraction: f64) {
        self.root_fraction = fraction.clamp(0.0, 1.0);
    }
}
