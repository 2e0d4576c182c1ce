/*!
TOML model input.

A run is described by one file:

```toml
[simulation]
days = 120
forcing_file = "weather.csv"   # relative to this file
forcing_columns = "standard"   # or "crop_soil": rain, lai, crop pet, soil pet
cycle_forcing = false

[engine]
extraction = "top_down"        # or "root_weighted"
water_stress = true

[engine.infiltration]
kind = "curve_number"
soil_group = "B"
land_use = "row crops good"

[engine.bottom]
kind = "spill_over"            # or "free_drainage", "water_table"

[roots]
depth = 300.0
growth_rate = 8.0

[[layers]]
name = "Ap"
thickness = 200.0
theta = -2.0                   # field capacity
texture = { clay = 20.0, sand = 40.0, om = 2.5 }
```

Daily forcing may also be given inline as `forcing = """..."""` in the
`[simulation]` table, using the same text format as a forcing file.
*/
use crate::boundary_cond::{BottomBoundary, InfiltrationCap};
use crate::daily_inputs::{ColumnLayout, DailyInputs};
use crate::error::{BalanceError, Result};
use crate::root_uptake::{ExtractionOrder, RootGrowth, root_fractions};
use crate::runoff::curve_number;
use crate::simulator::Simulator;
use crate::soil_hydra::{SoilLayer, SoilParams, Texture};
use crate::soil_profile::SoilProfile;
use crate::water_balance::{EngineConfig, WaterBalanceEngine};
use log::info;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

// Field capacity, used when a layer gives no initial water content
const DEFAULT_MOISTURE_CODE: f64 = -2.0;

#[derive(Clone, Debug, Deserialize)]
pub struct SimulationInput {
    pub days: usize,
    pub forcing_file: Option<PathBuf>,
    pub forcing: Option<String>,
    #[serde(default)]
    pub forcing_columns: ColumnLayout,
    #[serde(default)]
    pub cycle_forcing: bool,
}

// Infiltration settings as written in the file
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InfiltrationInput {
    #[default]
    TopLayerKsat,
    Fixed {
        rate: f64,
    },
    CurveNumber {
        cn: Option<f64>,
        soil_group: Option<String>,
        land_use: Option<String>,
    },
}

impl InfiltrationInput {
    pub fn resolve(&self) -> Result<InfiltrationCap> {
        let cap = match self {
            InfiltrationInput::TopLayerKsat => InfiltrationCap::TopLayerKsat,
            InfiltrationInput::Fixed { rate } => InfiltrationCap::Fixed { rate: *rate },
            InfiltrationInput::CurveNumber { cn: Some(cn), .. } => {
                InfiltrationCap::CurveNumber { cn: *cn }
            }
            InfiltrationInput::CurveNumber {
                cn: None,
                soil_group: Some(group),
                land_use: Some(land_use),
            } => InfiltrationCap::CurveNumber {
                cn: curve_number(group, land_use)?,
            },
            InfiltrationInput::CurveNumber { .. } => {
                return Err(BalanceError::Config(
                    "curve_number infiltration needs `cn` or both `soil_group` and `land_use`"
                        .to_string(),
                ));
            }
        };
        cap.validate()?;
        Ok(cap)
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct EngineInput {
    #[serde(default)]
    pub extraction: ExtractionOrder,
    #[serde(default)]
    pub water_stress: bool,
    pub tolerance: Option<f64>,
    #[serde(default)]
    pub infiltration: InfiltrationInput,
    #[serde(default)]
    pub bottom: BottomBoundary,
}

#[derive(Clone, Copy, Debug, Default, Deserialize)]
pub struct RootsInput {
    pub depth: Option<f64>,       // Initial rooting depth [mm]
    pub growth_rate: Option<f64>, // Enables daily root growth [mm/day]
}

#[derive(Clone, Debug, Deserialize)]
pub struct LayerInput {
    pub name: Option<String>,
    pub thickness: f64,
    pub theta: Option<f64>, // m³/m³, or -1 / -2 / -3 for SAT / FC / PWP
    pub root_fraction: Option<f64>,
    pub theta_sat: Option<f64>,
    pub theta_fc: Option<f64>,
    pub theta_pwp: Option<f64>,
    pub ksat: Option<f64>, // mm/day
    pub texture: Option<Texture>,
}

impl LayerInput {
    // Explicit values win over texture-derived ones
    fn params(&self, index: usize) -> Result<SoilParams> {
        let derived = self.texture.map(SoilParams::from_texture).transpose()?;
        let pick = |explicit: Option<f64>, from_texture: Option<f64>, what: &str| {
            explicit.or(from_texture).ok_or_else(|| {
                BalanceError::Config(format!(
                    "layer {}: `{what}` is missing and no texture was given",
                    index + 1
                ))
            })
        };
        SoilParams::new(
            pick(self.theta_sat, derived.map(|p| p.theta_sat()), "theta_sat")?,
            pick(self.theta_fc, derived.map(|p| p.theta_fc()), "theta_fc")?,
            pick(self.theta_pwp, derived.map(|p| p.theta_pwp()), "theta_pwp")?,
            pick(self.ksat, derived.map(|p| p.ksat()), "ksat")?,
        )
    }

    fn build(&self, index: usize, root_fraction: f64) -> Result<SoilLayer> {
        let params = self.params(index)?;
        let theta = params.resolve_moisture_code(self.theta.unwrap_or(DEFAULT_MOISTURE_CODE));
        SoilLayer::new(self.thickness, params, theta, root_fraction)
    }
}

// Everything needed to set up one run
#[derive(Clone, Debug, Deserialize)]
pub struct ModelInput {
    pub simulation: SimulationInput,
    #[serde(default)]
    pub engine: EngineInput,
    #[serde(default)]
    pub roots: RootsInput,
    pub layers: Vec<LayerInput>,
    #[serde(skip)]
    base_dir: PathBuf,
}

impl ModelInput {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    // Relative paths inside the file resolve against its directory
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut input = Self::from_toml_str(&fs::read_to_string(path)?)?;
        input.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(input)
    }

    pub fn build_profile(&self) -> Result<SoilProfile> {
        let derive_roots = self.roots.depth.is_some()
            && self.layers.iter().all(|l| l.root_fraction.is_none());
        let fractions = match self.roots.depth {
            Some(depth) if derive_roots => {
                root_fractions(self.layers.iter().map(|l| l.thickness), depth)
            }
            _ => self
                .layers
                .iter()
                .map(|l| l.root_fraction.unwrap_or(0.0))
                .collect(),
        };

        let mut layers = Vec::with_capacity(self.layers.len());
        for (index, (input, fraction)) in self.layers.iter().zip(fractions).enumerate() {
            let layer = input.build(index, fraction).map_err(|e| match e {
                BalanceError::InvalidProfile(msg) => {
                    BalanceError::InvalidProfile(format!("layer {}: {msg}", index + 1))
                }
                other => other,
            })?;
            layers.push(match &input.name {
                Some(name) => layer.with_name(name.clone()),
                None => layer,
            });
        }

        let profile = SoilProfile::new(layers)?;
        match self.roots.depth {
            Some(depth) => profile.with_root_depth(depth),
            None => Ok(profile),
        }
    }

    pub fn engine_config(&self) -> Result<EngineConfig> {
        let defaults = EngineConfig::default();
        let config = EngineConfig {
            extraction: self.engine.extraction,
            infiltration: self.engine.infiltration.resolve()?,
            bottom: self.engine.bottom,
            water_stress: self.engine.water_stress,
            root_growth: self.roots.growth_rate.map(|rate| RootGrowth { rate }),
            tolerance: self.engine.tolerance.unwrap_or(defaults.tolerance),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn load_forcing(&self) -> Result<DailyInputs> {
        match (&self.simulation.forcing_file, &self.simulation.forcing) {
            (Some(_), Some(_)) => Err(BalanceError::Config(
                "give either `forcing_file` or `forcing`, not both".to_string(),
            )),
            (Some(file), None) => {
                DailyInputs::from_file(self.base_dir.join(file), self.simulation.forcing_columns)
            }
            (None, Some(text)) => {
                DailyInputs::from_text_with_layout(text, self.simulation.forcing_columns)
            }
            (None, None) => Err(BalanceError::Config(
                "no daily forcing: set `forcing_file` or `forcing`".to_string(),
            )),
        }
    }

    /// Assemble a ready-to-run simulator.
    ///
    /// `days` overrides the run length from the file. With `cycle_forcing`
    /// a short forcing series is repeated to cover the run; otherwise a short
    /// series is reported when the run reaches its end.
    pub fn build_simulator(&self, days: Option<usize>) -> Result<Simulator> {
        let days = days.unwrap_or(self.simulation.days);
        let profile = self.build_profile()?;
        let engine = WaterBalanceEngine::new(self.engine_config()?)?;
        let mut forcing = self.load_forcing()?;
        if self.simulation.cycle_forcing && forcing.len() < days {
            info!("repeating {} forcing days to cover {days}", forcing.len());
            forcing = forcing.cycled(days);
        }
        Ok(Simulator::new(profile, forcing, engine, days))
    }
}
