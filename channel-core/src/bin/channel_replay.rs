// channel-core/src/bin/channel_replay.rs
// Liest PivotRecords als JSON-Lines von stdin und gibt den Endzustand als JSON aus.
//
//   channel_replay [config.toml] < records.jsonl

use anyhow::{Context, Result};
use channel_core::data::PivotRecord;
use channel_core::{ChannelDetector, ChannelSettings, DetectorSnapshot, Line};
use serde::Serialize;
use std::io::{self, BufRead};

#[derive(Serialize)]
struct ReplayReport<'a> {
    records: usize,
    pivots: usize,
    snapshot: DetectorSnapshot,
    upper_lines: &'a [Line],
    lower_lines: &'a [Line],
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => ChannelSettings::from_file(&path)
            .with_context(|| format!("loading settings from {}", path))?,
        None => ChannelSettings::new().context("loading settings")?,
    };
    let mut detector = ChannelDetector::new(config)?;

    let mut records = 0;
    let mut pivots = 0;
    for (n, line) in io::stdin().lock().lines().enumerate() {
        let line = line.context("reading stdin")?;
        if line.trim().is_empty() {
            continue;
        }
        let record = PivotRecord::from_json_line(&line)
            .with_context(|| format!("record on line {}", n + 1))?;
        records += 1;
        if detector.add_pivot(&record).is_some() {
            pivots += 1;
        }
    }

    let report = ReplayReport {
        records,
        pivots,
        snapshot: detector.snapshot(),
        upper_lines: detector.upper_lines(),
        lower_lines: detector.lower_lines(),
    };
    log::info!(
        "Replayed {} records ({} pivots): {} upper / {} lower lines",
        records,
        pivots,
        report.snapshot.num_upper_lines,
        report.snapshot.num_lower_lines
    );
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
