// crates/pollen-cli/src/commands/schedule.rs
//
// `pollen schedule`: validate an issuance schedule and evaluate its supply
// ceiling at each segment boundary and at an optional probe time.
//
// The file is a JSON array of segments:
//   [{"max_time": ..., "offset_x": ..., "offset_y": ..., "rate": ...}, ...]

use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use crate::output::{format_json, format_table, format_time, format_units, OutputFormat};
use pollen_economics::issuance::{IssuanceSchedule, IssuanceSegment};

/// Arguments for the schedule command.
#[derive(Debug, Args)]
pub struct ScheduleCmd {
    /// Path to the JSON segment list.
    #[arg(long)]
    file: String,

    /// Probe time (unix seconds).
    #[arg(long)]
    at: Option<u64>,

    /// Amount already issued, in base units, for the headroom column.
    #[arg(long, default_value_t = 0)]
    issued: u128,
}

#[derive(Debug, Serialize, Tabled)]
struct CurvePoint {
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "Time")]
    time: u64,
    #[tabled(rename = "UTC")]
    #[serde(skip)]
    utc: String,
    #[tabled(rename = "Segment")]
    segment: usize,
    #[tabled(rename = "Max supply")]
    #[serde(skip)]
    max_supply_display: String,
    #[tabled(skip)]
    max_supply: u128,
    #[tabled(rename = "Headroom")]
    #[serde(skip)]
    headroom_display: String,
    #[tabled(skip)]
    headroom: u128,
}

/// Run the schedule command.
pub async fn run(cmd: &ScheduleCmd, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let contents = tokio::fs::read_to_string(&cmd.file).await?;
    let segments: Vec<IssuanceSegment> = serde_json::from_str(&contents)?;

    let mut schedule = IssuanceSchedule::new();
    schedule.initialize(segments.clone())?;

    let mut probes: Vec<(String, u64)> = segments
        .iter()
        .enumerate()
        .map(|(i, segment)| (format!("end of segment {}", i), segment.max_time))
        .collect();
    if let Some(at) = cmd.at {
        probes.push(("probe".to_string(), at));
    }

    let mut points = Vec::with_capacity(probes.len());
    for (label, time) in probes {
        let segment = schedule.segments().partition_point(|s| s.max_time <= time);
        let max_supply = schedule.max_supply(time)?;
        let headroom = schedule.max_allocation(time, cmd.issued)?;
        points.push(CurvePoint {
            label,
            time,
            utc: format_time(time),
            segment: segment.min(segments.len() - 1),
            max_supply_display: format_units(max_supply),
            max_supply,
            headroom_display: format_units(headroom),
            headroom,
        });
    }

    match format {
        OutputFormat::Json => println!("{}", format_json(&points)),
        OutputFormat::Table => {
            println!("Issuance schedule: {} segments", segments.len());
            println!("{}", format_table(&points));
        }
    }
    Ok(())
}
