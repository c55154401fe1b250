//! Light system statistics for the heartbeat, read from /proc, and the
//! health verdict derived from them

use serde::Serialize;
use std::time::Instant;
use tracing::debug;

const LOADAVG_PATH: &str = "/proc/loadavg";
const MEMINFO_PATH: &str = "/proc/meminfo";

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStats {
    /// 1-minute load as a percentage of available cores
    pub cpu: f64,
    /// Used memory in MB
    pub memory: u64,
    pub memory_percent: f64,
    /// Agent uptime in seconds
    pub uptime: u64,
}

const CPU_ERROR_PERCENT: f64 = 90.0;
const CPU_WARN_PERCENT: f64 = 70.0;
const MEMORY_ERROR_PERCENT: f64 = 90.0;
const MEMORY_WARN_PERCENT: f64 = 75.0;

/// Threshold verdict over one stats sample
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HealthReport {
    pub healthy: bool,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl SystemStats {
    /// Unhealthy only when an error threshold is crossed
    pub fn health(&self) -> HealthReport {
        let mut report = HealthReport::default();

        if self.cpu > CPU_ERROR_PERCENT {
            report.errors.push(format!("High CPU usage: {}%", self.cpu));
        } else if self.cpu > CPU_WARN_PERCENT {
            report.warnings.push(format!("Elevated CPU usage: {}%", self.cpu));
        }

        if self.memory_percent > MEMORY_ERROR_PERCENT {
            report
                .errors
                .push(format!("High memory usage: {}%", self.memory_percent));
        } else if self.memory_percent > MEMORY_WARN_PERCENT {
            report
                .warnings
                .push(format!("Elevated memory usage: {}%", self.memory_percent));
        }

        report.healthy = report.errors.is_empty();
        report
    }
}

pub struct SystemMonitor {
    started: Instant,
    cores: usize,
}

impl Default for SystemMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemMonitor {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            cores: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    /// Sample current stats; unreadable sources report zero
    pub async fn light_stats(&self) -> SystemStats {
        let mut stats = SystemStats {
            uptime: self.uptime_secs(),
            ..Default::default()
        };

        match tokio::fs::read_to_string(LOADAVG_PATH).await {
            Ok(text) => {
                if let Some(load) = parse_loadavg(&text) {
                    stats.cpu = round2((load / self.cores as f64 * 100.0).min(100.0));
                }
            }
            Err(e) => debug!("[SYSTEM] Cannot read {}: {}", LOADAVG_PATH, e),
        }

        match tokio::fs::read_to_string(MEMINFO_PATH).await {
            Ok(text) => {
                if let Some((used_kb, total_kb)) = parse_meminfo(&text) {
                    stats.memory = used_kb / 1024;
                    stats.memory_percent = round2(used_kb as f64 / total_kb as f64 * 100.0);
                }
            }
            Err(e) => debug!("[SYSTEM] Cannot read {}: {}", MEMINFO_PATH, e),
        }

        stats
    }

    /// Sample and apply the CPU and memory thresholds
    pub async fn check_health(&self) -> HealthReport {
        self.light_stats().await.health()
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// 1-minute load average
fn parse_loadavg(text: &str) -> Option<f64> {
    text.split_whitespace().next()?.parse().ok()
}

/// (used kB, total kB), with used = total - available
fn parse_meminfo(text: &str) -> Option<(u64, u64)> {
    let field = |name: &str| -> Option<u64> {
        text.lines()
            .find_map(|line| line.strip_prefix(name)?.strip_prefix(':'))
            .and_then(|rest| rest.split_whitespace().next())
            .and_then(|v| v.parse().ok())
    };

    let total = field("MemTotal").filter(|t| *t > 0)?;
    let available = field("MemAvailable").or_else(|| field("MemFree"))?;
    Some((total.saturating_sub(available), total))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(cpu: f64, memory_percent: f64) -> SystemStats {
        SystemStats {
            cpu,
            memory_percent,
            ..Default::default()
        }
    }

    #[test]
    fn test_health_thresholds() {
        assert_eq!(stats(10.0, 40.0).health(), HealthReport {
            healthy: true,
            ..Default::default()
        });

        let warned = stats(70.5, 75.5).health();
        assert!(warned.healthy);
        assert_eq!(
            warned.warnings,
            vec!["Elevated CPU usage: 70.5%", "Elevated memory usage: 75.5%"]
        );

        let failing = stats(95.0, 80.0).health();
        assert!(!failing.healthy);
        assert_eq!(failing.errors, vec!["High CPU usage: 95%"]);
        assert_eq!(failing.warnings, vec!["Elevated memory usage: 80%"]);

        // Boundaries are exclusive
        let edge = stats(90.0, 90.0).health();
        assert!(edge.healthy);
        assert_eq!(edge.warnings.len(), 2);
    }

    #[test]
    fn test_parse_loadavg() {
        assert_eq!(parse_loadavg("0.52 0.58 0.59 1/467 12345\n"), Some(0.52));
        assert_eq!(parse_loadavg(""), None);
    }

    #[test]
    fn test_parse_meminfo() {
        let text = "MemTotal:        8000000 kB\nMemFree:          500000 kB\nMemAvailable:    6000000 kB\n";
        assert_eq!(parse_meminfo(text), Some((2_000_000, 8_000_000)));

        let no_available = "MemTotal: 1000 kB\nMemFree: 250 kB\n";
        assert_eq!(parse_meminfo(no_available), Some((750, 1000)));

        assert_eq!(parse_meminfo("garbage"), None);
    }

    #[tokio::test]
    async fn test_light_stats_never_fails() {
        let stats = SystemMonitor::new().light_stats().await;
        assert!(stats.cpu >= 0.0 && stats.cpu <= 100.0);
        assert!(stats.memory_percent >= 0.0);
    }
}
