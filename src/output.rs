use crate::balance::{DailyBalance, ResultSeries};
use crate::error::Result;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

// Column width for every value
const WIDTH: usize = 10;

// Daily totals, in column order
const TOTALS: [&str; 15] = [
    "input", "intercept", "runoff", "infilt", "cap_rise", "drainage", "pet", "aet", "transp",
    "evap", "unmet_et", "storage", "d_storage", "root_depth", "rz_water",
];

fn totals(r: &DailyBalance) -> [f64; 15] {
    [
        r.gross_input,
        r.interception,
        r.runoff,
        r.infiltration,
        r.capillary_rise,
        r.drainage,
        r.potential_et,
        r.actual_et,
        r.transpiration,
        r.evaporation,
        r.unmet_et,
        r.storage,
        r.storage_change,
        r.root_depth,
        r.root_zone_water,
    ]
}

fn header(n_layers: usize) -> String {
    let mut cols = vec![format!("{:>5}", "day")];
    cols.extend(TOTALS.iter().map(|name| format!("{name:>WIDTH$}")));
    for layer in 1..=n_layers {
        for what in ["theta", "water", "transp", "evap", "perc"] {
            cols.push(format!("{:>WIDTH$}", format!("{what}_{layer}")));
        }
    }
    cols.join(",")
}

/// Write one line per simulated day, after a header line.
///
/// Day numbers start at 1. Each line carries the day's totals followed by
/// water content, water depth, transpiration, evaporation and percolation
/// for every layer, all in fixed-width columns.
pub fn write_results<W: Write>(writer: &mut W, results: &ResultSeries) -> Result<()> {
    writeln!(writer, "{}", header(results.n_layers()))?;

    for record in results.iter() {
        let mut line = format!("{:>5}", record.day + 1);
        for value in totals(record) {
            line.push_str(&format!(",{value:>WIDTH$.3}"));
        }
        for layer in 0..results.n_layers() {
            line.push_str(&format!(
                ",{:>WIDTH$.4},{:>WIDTH$.3},{:>WIDTH$.3},{:>WIDTH$.3},{:>WIDTH$.3}",
                record.theta[layer],
                record.water[layer],
                record.uptake[layer],
                record.layer_evaporation[layer],
                record.percolation[layer]
            ));
        }
        writeln!(writer, "{line}")?;
    }
    Ok(())
}

pub fn write_results_file(path: impl AsRef<Path>, results: &ResultSeries) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_results(&mut writer, results)?;
    writer.flush()?;
    Ok(())
}
