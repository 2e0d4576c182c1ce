//! Named daily series for charting a finished run.

use crate::balance::ResultSeries;
use crate::error::Result;
use clap::ValueEnum;
use std::io::Write;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum PlotMode {
    #[default]
    Basic, // Profile-level flows and storage
    Detailed, // Adds water content, uptake and percolation for every layer
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChartSeries {
    pub label: String,
    pub values: Vec<f64>,
}

impl ChartSeries {
    fn new(label: impl Into<String>, values: Vec<f64>) -> Self {
        ChartSeries {
            label: label.into(),
            values,
        }
    }
}

pub fn chart_series(results: &ResultSeries, mode: PlotMode) -> Vec<ChartSeries> {
    let mut series = vec![
        ChartSeries::new("rainfall", results.series(|r| r.rainfall)),
        ChartSeries::new("runoff", results.series(|r| r.runoff)),
        ChartSeries::new("drainage", results.series(|r| r.drainage)),
        ChartSeries::new("actual_et", results.series(|r| r.actual_et)),
        ChartSeries::new("storage", results.storage()),
        ChartSeries::new("root_zone_water", results.series(|r| r.root_zone_water)),
    ];

    if mode == PlotMode::Detailed {
        let history = results.theta_history();
        for layer in 0..results.n_layers() {
            let n = layer + 1;
            series.push(ChartSeries::new(
                format!("theta_{n}"),
                history.column(layer).iter().copied().collect(),
            ));
            series.push(ChartSeries::new(
                format!("uptake_{n}"),
                results.series(|r| r.uptake[layer]),
            ));
            series.push(ChartSeries::new(
                format!("percolation_{n}"),
                results.series(|r| r.percolation[layer]),
            ));
        }
    }
    series
}

// One column per series, one row per day
pub fn write_series<W: Write>(writer: &mut W, series: &[ChartSeries]) -> Result<()> {
    let labels: Vec<&str> = series.iter().map(|s| s.label.as_str()).collect();
    writeln!(writer, "day,{}", labels.join(","))?;

    let days = series.iter().map(|s| s.values.len()).max().unwrap_or(0);
    for day in 0..days {
        let row: Vec<String> = series
            .iter()
            .map(|s| s.values.get(day).map(|v| format!("{v:.4}")).unwrap_or_default())
            .collect();
        writeln!(writer, "{},{}", day + 1, row.join(","))?;
    }
    Ok(())
}
