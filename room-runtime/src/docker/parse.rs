//! Parsers for `docker inspect` and `docker stats` JSON output.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Utc};
use serde::Deserialize;

use crate::error::{Result, RuntimeError};
use crate::types::{ResourceLimits, UnitDetails, UnitStats, UnitSummary};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectEntry {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    created: String,
    #[serde(default)]
    state: InspectState,
    #[serde(default)]
    config: InspectConfig,
    #[serde(default)]
    host_config: InspectHostConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectState {
    #[serde(default)]
    status: String,
    #[serde(default)]
    running: bool,
    #[serde(default)]
    started_at: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectConfig {
    #[serde(default)]
    image: String,
    #[serde(default)]
    env: Option<Vec<String>>,
    #[serde(default)]
    labels: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectHostConfig {
    #[serde(default)]
    network_mode: String,
    #[serde(default)]
    cap_add: Option<Vec<String>>,
    #[serde(default)]
    shm_size: i64,
    #[serde(default)]
    cpu_shares: i64,
    #[serde(default)]
    nano_cpus: i64,
    #[serde(default)]
    memory: i64,
}

/// Docker reports unset timestamps as `0001-01-01T00:00:00Z`.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
        .filter(|dt| dt.year() > 1)
}

impl From<InspectEntry> for UnitDetails {
    fn from(entry: InspectEntry) -> Self {
        UnitDetails {
            summary: UnitSummary {
                id: entry.id,
                name: entry.name.trim_start_matches('/').to_string(),
                image: entry.config.image,
                labels: entry.config.labels.unwrap_or_default(),
                running: entry.state.running,
                status: entry.state.status,
                created: parse_timestamp(&entry.created),
            },
            env: entry.config.env.unwrap_or_default(),
            resources: ResourceLimits {
                cpu_shares: entry.host_config.cpu_shares,
                nano_cpus: entry.host_config.nano_cpus,
                memory: entry.host_config.memory,
                shm_size: entry.host_config.shm_size,
            },
            network: entry.host_config.network_mode,
            cap_add: entry.host_config.cap_add.unwrap_or_default(),
            started_at: parse_timestamp(&entry.state.started_at),
        }
    }
}

/// Parses the JSON array printed by `docker inspect`.
pub fn parse_inspect(output: &str) -> Result<Vec<UnitDetails>> {
    let entries: Vec<InspectEntry> = serde_json::from_str(output)?;
    Ok(entries.into_iter().map(UnitDetails::from).collect())
}

#[derive(Debug, Deserialize)]
struct StatsLine {
    #[serde(rename = "CPUPerc", default)]
    cpu_perc: String,
    #[serde(rename = "MemUsage", default)]
    mem_usage: String,
    #[serde(rename = "PIDs", default)]
    pids: String,
}

/// Parses one `docker stats --format '{{json .}}'` line.
pub fn parse_stats(output: &str) -> Result<UnitStats> {
    let line = output
        .lines()
        .find(|l| !l.trim().is_empty())
        .ok_or_else(|| RuntimeError::Parse("empty stats output".to_string()))?;
    let stats: StatsLine = serde_json::from_str(line)?;

    let cpu_percent = stats
        .cpu_perc
        .trim()
        .trim_end_matches('%')
        .parse::<f64>()
        .unwrap_or(0.0);

    let (usage, limit) = stats
        .mem_usage
        .split_once('/')
        .unwrap_or((stats.mem_usage.as_str(), ""));

    Ok(UnitStats {
        cpu_percent,
        memory_usage: parse_size(usage).unwrap_or(0),
        memory_limit: parse_size(limit).unwrap_or(0),
        pids: stats.pids.trim().parse().unwrap_or(0),
    })
}

/// Parses docker's human sizes ("21.5MiB", "1.2GB", "512B") into bytes.
pub fn parse_size(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    let split = raw.find(|c: char| c.is_ascii_alphabetic())?;
    let (number, unit) = raw.split_at(split);
    let number: f64 = number.trim().parse().ok()?;

    let multiplier = match unit {
        "B" => 1.0,
        "kB" | "KB" => 1e3,
        "MB" => 1e6,
        "GB" => 1e9,
        "TB" => 1e12,
        "KiB" => 1024.0,
        "MiB" => 1024.0 * 1024.0,
        "GiB" => 1024.0 * 1024.0 * 1024.0,
        "TiB" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        _ => return None,
    };

    Some((number * multiplier).round() as u64)
}
