use crate::error::{BalanceError, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

// Lower bound on the fraction of rain that gets through the canopy [-]
const MIN_THROUGHFALL: f64 = 0.8;

// Throughfall gained per unit leaf area index [-]
const THROUGHFALL_PER_LAI: f64 = 0.267;

// Atmospheric and crop forcing for one day
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DailyForcing {
    pub rainfall: f64,         // Rainfall [mm/day]
    pub irrigation: f64,       // Irrigation [mm/day]
    pub pet: f64,              // Potential evapotranspiration [mm/day]
    pub crop_coefficient: f64, // Growth-stage multiplier on pet [-]
    pub soil_evaporation: f64, // Potential evaporation from bare soil [mm/day]
    pub lai: Option<f64>,      // Leaf area index [m²/m²], enables interception
}

impl DailyForcing {
    pub fn new(rainfall: f64, pet: f64) -> Self {
        DailyForcing {
            rainfall,
            irrigation: 0.0,
            pet,
            crop_coefficient: 1.0,
            soil_evaporation: 0.0,
            lai: None,
        }
    }

    pub fn with_irrigation(mut self, irrigation: f64) -> Self {
        self.irrigation = irrigation;
        self
    }

    pub fn with_crop_coefficient(mut self, crop_coefficient: f64) -> Self {
        self.crop_coefficient = crop_coefficient;
        self
    }

    pub fn with_soil_evaporation(mut self, soil_evaporation: f64) -> Self {
        self.soil_evaporation = soil_evaporation;
        self
    }

    pub fn with_lai(mut self, lai: f64) -> Self {
        self.lai = Some(lai);
        self
    }

    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("rainfall", self.rainfall),
            ("irrigation", self.irrigation),
            ("pet", self.pet),
            ("crop coefficient", self.crop_coefficient),
            ("soil evaporation", self.soil_evaporation),
            ("leaf area index", self.lai.unwrap_or(0.0)),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(BalanceError::InvalidInput(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }

    // Same as `validate`, naming the 0-based `day` as a 1-based day number
    pub(crate) fn validate_day(&self, day: usize) -> Result<()> {
        self.validate().map_err(|e| match e {
            BalanceError::InvalidInput(msg) => {
                BalanceError::InvalidInput(format!("day {}: {msg}", day + 1))
            }
            other => other,
        })
    }

    // Rainfall plus irrigation [mm]
    pub fn gross_input(&self) -> f64 {
        self.rainfall + self.irrigation
    }

    // Rainfall that gets through the canopy [mm]
    pub fn net_rainfall(&self) -> f64 {
        match self.lai {
            Some(lai) => {
                let throughfall = (THROUGHFALL_PER_LAI * lai).max(MIN_THROUGHFALL).min(1.0);
                throughfall * self.rainfall
            }
            None => self.rainfall,
        }
    }

    // Rainfall held on the canopy [mm]
    pub fn interception(&self) -> f64 {
        (self.rainfall - self.net_rainfall()).max(0.0)
    }

    // Crop-adjusted transpiration demand [mm]
    pub fn potential_transpiration(&self) -> f64 {
        self.pet * self.crop_coefficient
    }

    // Transpiration plus soil evaporation demand [mm]
    pub fn potential_et(&self) -> f64 {
        self.potential_transpiration() + self.soil_evaporation
    }
}

// Column order of a plain-text forcing file
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ColumnLayout {
    #[default]
    Standard, // rain, pet[, irrigation[, crop_coefficient[, lai]]]
    CropSoil, // rain, lai, crop pet, soil evaporation
}

impl ColumnLayout {
    fn widths(self) -> std::ops::RangeInclusive<usize> {
        match self {
            ColumnLayout::Standard => 2..=5,
            ColumnLayout::CropSoil => 4..=4,
        }
    }

    fn forcing(self, values: &[f64]) -> DailyForcing {
        match self {
            ColumnLayout::Standard => {
                let mut forcing = DailyForcing::new(values[0], values[1]);
                if let Some(&irrigation) = values.get(2) {
                    forcing = forcing.with_irrigation(irrigation);
                }
                if let Some(&kc) = values.get(3) {
                    forcing = forcing.with_crop_coefficient(kc);
                }
                if let Some(&lai) = values.get(4) {
                    forcing = forcing.with_lai(lai);
                }
                forcing
            }
            ColumnLayout::CropSoil => DailyForcing::new(values[0], values[2])
                .with_lai(values[1])
                .with_soil_evaporation(values[3]),
        }
    }
}

// Day-indexed forcing series, day 0 first
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DailyInputs {
    days: Vec<DailyForcing>,
}

impl DailyInputs {
    pub fn new(days: Vec<DailyForcing>) -> Result<Self> {
        for (day, forcing) in days.iter().enumerate() {
            forcing.validate_day(day)?;
        }
        Ok(DailyInputs { days })
    }

    /// Parse plain-text daily data in the standard column layout.
    ///
    /// One day per line, values separated by commas:
    /// `rain, pet[, irrigation[, crop_coefficient[, lai]]]`. Blank lines and
    /// lines starting with `#` are skipped. Every line must carry the same
    /// number of values.
    pub fn from_text(text: &str) -> Result<Self> {
        Self::from_text_with_layout(text, ColumnLayout::Standard)
    }

    pub fn from_text_with_layout(text: &str, layout: ColumnLayout) -> Result<Self> {
        let mut days = Vec::new();
        let mut width = None;
        let widths = layout.widths();

        for (idx, raw) in text.lines().enumerate() {
            let line = idx + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let values = trimmed
                .split(',')
                .map(|item| {
                    item.trim().parse::<f64>().map_err(|e| BalanceError::Parse {
                        line,
                        message: format!("'{}': {e}", item.trim()),
                    })
                })
                .collect::<Result<Vec<f64>>>()?;

            if !widths.contains(&values.len()) {
                return Err(BalanceError::Parse {
                    line,
                    message: format!(
                        "expected {} to {} values, found {}",
                        widths.start(),
                        widths.end(),
                        values.len()
                    ),
                });
            }
            match width {
                None => width = Some(values.len()),
                Some(w) if w != values.len() => {
                    return Err(BalanceError::Parse {
                        line,
                        message: format!(
                            "inconsistent number of values: {} here, {w} on earlier lines",
                            values.len()
                        ),
                    });
                }
                Some(_) => {}
            }

            let forcing = layout.forcing(&values);
            forcing.validate().map_err(|e| BalanceError::Parse {
                line,
                message: e.to_string(),
            })?;
            days.push(forcing);
        }

        Ok(DailyInputs { days })
    }

    pub fn from_file(path: impl AsRef<Path>, layout: ColumnLayout) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_text_with_layout(&text, layout)
    }

    // Repeat the series from its start until it covers `n` days
    pub fn cycled(&self, n: usize) -> Self {
        if self.days.is_empty() {
            return self.clone();
        }
        DailyInputs {
            days: self.days.iter().cycle().take(n).copied().collect(),
        }
    }

    pub fn get(&self, day: usize) -> Option<&DailyForcing> {
        self.days.get(day)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DailyForcing> {
        self.days.iter()
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rejects_negative_and_nan() {
        assert!(DailyForcing::new(-1.0, 2.0).validate().is_err());
        assert!(DailyForcing::new(1.0, f64::NAN).validate().is_err());
        assert!(DailyForcing::new(1.0, 2.0).with_lai(-0.5).validate().is_err());
        assert!(DailyForcing::new(0.0, 0.0).validate().is_ok());
    }

    #[test]
    fn new_reports_offending_day() {
        let days = vec![DailyForcing::new(1.0, 1.0), DailyForcing::new(1.0, -3.0)];
        let err = DailyInputs::new(days).unwrap_err();
        assert!(err.to_string().contains("day 2"));
    }

    #[test]
    fn interception_grows_with_lai() {
        let sparse = DailyForcing::new(10.0, 0.0).with_lai(1.0);
        assert_relative_eq!(sparse.net_rainfall(), 8.0);
        assert_relative_eq!(sparse.interception(), 2.0);

        let dense = DailyForcing::new(10.0, 0.0).with_lai(5.0);
        assert_relative_eq!(dense.net_rainfall(), 10.0);
        assert_eq!(dense.interception(), 0.0);

        let bare = DailyForcing::new(10.0, 0.0);
        assert_eq!(bare.interception(), 0.0);
    }

    #[test]
    fn crop_coefficient_scales_demand() {
        let f = DailyForcing::new(0.0, 4.0).with_crop_coefficient(1.25);
        assert_relative_eq!(f.potential_et(), 5.0);
    }

    #[test]
    fn parses_text() {
        let text = "# rain, pet, irrigation\n12.0, 4.0, 0.0\n\n0.0, 5.5, 3.0\n";
        let inputs = DailyInputs::from_text(text).unwrap();
        assert_eq!(inputs.len(), 2);
        let day2 = inputs.get(1).unwrap();
        assert_eq!(day2.pet, 5.5);
        assert_eq!(day2.irrigation, 3.0);
        assert_eq!(day2.crop_coefficient, 1.0);
    }

    #[test]
    fn rejects_ragged_lines() {
        let err = DailyInputs::from_text("1.0, 2.0\n1.0, 2.0, 3.0\n").unwrap_err();
        assert!(matches!(err, BalanceError::Parse { line: 2, .. }));
    }

    #[test]
    fn rejects_bad_numbers() {
        let err = DailyInputs::from_text("1.0, abc\n").unwrap_err();
        assert!(matches!(err, BalanceError::Parse { line: 1, .. }));
        let err = DailyInputs::from_text("1.0\n").unwrap_err();
        assert!(matches!(err, BalanceError::Parse { line: 1, .. }));
        let err = DailyInputs::from_text("1.0, -2.0\n").unwrap_err();
        assert!(matches!(err, BalanceError::Parse { line: 1, .. }));
    }

    #[test]
    fn crop_soil_layout_splits_demand() {
        let text = "12.0, 1.5, 4.0, 1.2\n0.0, 2.0, 5.0, 0.8\n";
        let inputs = DailyInputs::from_text_with_layout(text, ColumnLayout::CropSoil).unwrap();
        let day1 = inputs.get(0).unwrap();
        assert_eq!(day1.rainfall, 12.0);
        assert_eq!(day1.lai, Some(1.5));
        assert_eq!(day1.potential_transpiration(), 4.0);
        assert_eq!(day1.soil_evaporation, 1.2);
        assert_relative_eq!(day1.potential_et(), 5.2);

        // the same file read as the standard layout means something else
        let standard = DailyInputs::from_text(text).unwrap();
        assert_eq!(standard.get(0).unwrap().pet, 1.5);

        let err = DailyInputs::from_text_with_layout("1.0, 2.0, 3.0\n", ColumnLayout::CropSoil)
            .unwrap_err();
        assert!(matches!(err, BalanceError::Parse { line: 1, .. }));
    }

    #[test]
    fn cycling_rewinds_to_start() {
        let inputs = DailyInputs::from_text("1.0, 0.0\n2.0, 0.0\n3.0, 0.0\n").unwrap();
        let long = inputs.cycled(7);
        let rain: Vec<f64> = long.iter().map(|f| f.rainfall).collect();
        assert_eq!(rain, vec![1.0, 2.0, 3.0, 1.0, 2.0, 3.0, 1.0]);
        assert!(DailyInputs::default().cycled(5).is_empty());
    }
}
