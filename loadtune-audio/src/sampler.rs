//! Host telemetry sampling.
//!
//! Produces one [`TelemetrySnapshot`] per call: CPU utilization from
//! `/proc/stat` deltas, RAM from `/proc/meminfo`, and GPU/VRAM from a
//! rate-limited `nvidia-smi` query with a hard timeout. Every source
//! degrades gracefully; a machine with no GPU tooling simply reports
//! zeros there and the music leans on CPU and RAM instead.

use std::fs;
use std::io::Read;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};

use loadtune_types::TelemetrySnapshot;

/// Minimum interval between external GPU queries.
const GPU_POLL_INTERVAL: Duration = Duration::from_millis(1200);

/// Hard deadline for a single GPU query; the child is killed on expiry.
const GPU_QUERY_TIMEOUT: Duration = Duration::from_millis(350);

/// Raw jiffy counters from the aggregate `cpu` line of `/proc/stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CpuCounters {
    total: u64,
    idle: u64,
}

/// Stateful telemetry source.
///
/// Holds the previous CPU counter pair for delta computation and the last
/// successful GPU reading, which is reused between polls and whenever a
/// query fails.
pub struct TelemetrySampler {
    cpu_counters: Option<CpuCounters>,
    gpu_cache: (f32, f32),
    last_gpu_poll: Option<Instant>,
    gpu_command: String,
}

impl Default for TelemetrySampler {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetrySampler {
    pub fn new() -> Self {
        Self {
            cpu_counters: read_cpu_counters(),
            gpu_cache: (0.0, 0.0),
            last_gpu_poll: None,
            gpu_command: "nvidia-smi".to_string(),
        }
    }

    /// Override the GPU query command (tests substitute a stub script).
    #[cfg(test)]
    fn with_gpu_command(command: &str) -> Self {
        Self {
            cpu_counters: None,
            gpu_cache: (0.0, 0.0),
            last_gpu_poll: None,
            gpu_command: command.to_string(),
        }
    }

    /// Take one reading of all four utilization percentages.
    pub fn sample(&mut self) -> TelemetrySnapshot {
        let cpu = self.sample_cpu();
        let ram = read_ram_pct();
        let (gpu, vram) = self.sample_gpu();
        TelemetrySnapshot::new(cpu, ram, gpu, vram)
    }

    fn sample_cpu(&mut self) -> f32 {
        if let Some(prev) = self.cpu_counters {
            if let Some(next) = read_cpu_counters() {
                self.cpu_counters = Some(next);
                return cpu_pct_from_counters(prev, next);
            }
            self.cpu_counters = None;
        }
        cpu_pct_fallback()
    }

    fn sample_gpu(&mut self) -> (f32, f32) {
        let due = match self.last_gpu_poll {
            Some(at) => at.elapsed() > GPU_POLL_INTERVAL,
            None => true,
        };
        if due {
            if let Some(reading) = query_gpu(&self.gpu_command) {
                self.gpu_cache = reading;
            }
            self.last_gpu_poll = Some(Instant::now());
        }
        self.gpu_cache
    }
}

fn read_cpu_counters() -> Option<CpuCounters> {
    let stat = fs::read_to_string("/proc/stat").ok()?;
    parse_cpu_counters(stat.lines().next()?)
}

fn parse_cpu_counters(line: &str) -> Option<CpuCounters> {
    let mut fields = line.split_whitespace();
    if fields.next() != Some("cpu") {
        return None;
    }
    let values: Vec<u64> = fields.filter_map(|f| f.parse().ok()).collect();
    if values.len() < 5 {
        return None;
    }
    Some(CpuCounters {
        total: values.iter().sum(),
        // idle + iowait both count as not-working time
        idle: values[3] + values[4],
    })
}

fn cpu_pct_from_counters(prev: CpuCounters, next: CpuCounters) -> f32 {
    let dt = next.total.saturating_sub(prev.total).max(1);
    let idle = next.idle.saturating_sub(prev.idle).min(dt);
    100.0 * (dt - idle) as f32 / dt as f32
}

/// Used when `/proc/stat` is unavailable: sum of per-process CPU from `ps`,
/// then 1-minute load average, then zero.
fn cpu_pct_fallback() -> f32 {
    let cores = thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1) as f32;

    if let Ok(output) = Command::new("ps")
        .args(["-A", "-o", "%cpu"])
        .stderr(Stdio::null())
        .output()
    {
        if output.status.success() {
            let text = String::from_utf8_lossy(&output.stdout);
            let sum: f32 = text
                .lines()
                .skip(1)
                .filter_map(|l| l.trim().parse::<f32>().ok())
                .sum();
            return (sum / cores).clamp(0.0, 100.0);
        }
    }

    if let Ok(loadavg) = fs::read_to_string("/proc/loadavg") {
        if let Some(one_min) = loadavg
            .split_whitespace()
            .next()
            .and_then(|f| f.parse::<f32>().ok())
        {
            return (one_min / cores * 100.0).clamp(0.0, 100.0);
        }
    }

    0.0
}

fn read_ram_pct() -> f32 {
    match fs::read_to_string("/proc/meminfo") {
        Ok(text) => parse_meminfo(&text),
        Err(_) => 0.0,
    }
}

fn parse_meminfo(text: &str) -> f32 {
    let mut total: u64 = 1;
    let mut available: u64 = 0;
    for line in text.lines() {
        if let Some(rest) = line.strip_prefix("MemTotal:") {
            total = parse_kb(rest).unwrap_or(1);
        } else if let Some(rest) = line.strip_prefix("MemAvailable:") {
            available = parse_kb(rest).unwrap_or(0);
        }
    }
    100.0 * total.saturating_sub(available) as f32 / total.max(1) as f32
}

fn parse_kb(rest: &str) -> Option<u64> {
    rest.split_whitespace().next()?.parse().ok()
}

/// Run one bounded GPU query. Returns `None` (keeping the cached reading) on
/// spawn failure, timeout, non-zero exit, or unparseable output.
fn query_gpu(command: &str) -> Option<(f32, f32)> {
    let mut child = Command::new(command)
        .args([
            "--query-gpu=utilization.gpu,memory.used,memory.total",
            "--format=csv,noheader,nounits",
        ])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .ok()?;

    let started = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                if !status.success() {
                    return None;
                }
                break;
            }
            Ok(None) => {
                if started.elapsed() > GPU_QUERY_TIMEOUT {
                    warn!("GPU query exceeded {:?}, killing it", GPU_QUERY_TIMEOUT);
                    let _ = child.kill();
                    let _ = child.wait();
                    return None;
                }
                thread::sleep(Duration::from_millis(10));
            }
            Err(e) => {
                debug!("GPU query wait failed: {e}");
                let _ = child.kill();
                let _ = child.wait();
                return None;
            }
        }
    }

    let mut text = String::new();
    child.stdout.take()?.read_to_string(&mut text).ok()?;
    parse_gpu_csv(&text)
}

fn parse_gpu_csv(text: &str) -> Option<(f32, f32)> {
    let line = text.trim().lines().next()?;
    let mut fields = line.split(',').map(str::trim);
    let gpu: f32 = fields.next()?.parse().ok()?;
    let used: f32 = fields.next()?.parse().ok()?;
    let total: f32 = fields.next()?.parse().ok()?;
    let vram = 100.0 * used / total.max(1.0);
    Some((gpu, vram))
}
