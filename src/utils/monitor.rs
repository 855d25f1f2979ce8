#[cfg(feature = "cli")]
use std::sync::Mutex;
#[cfg(feature = "cli")]
use std::time::{Duration, Instant};
#[cfg(feature = "cli")]
use sysinfo::{Pid, ProcessesToUpdate, System};

/// Host load snapshot taken between stages.
#[cfg(feature = "cli")]
#[derive(Debug, Clone)]
pub struct HostStats {
    pub global_cpu_percent: f32,
    pub used_memory_mb: u64,
    pub total_memory_mb: u64,
    pub driver_memory_mb: u64,
    pub elapsed: Duration,
}

#[cfg(feature = "cli")]
pub struct StageMonitor {
    system: Mutex<System>,
    pid: Option<Pid>,
    started: Instant,
    enabled: bool,
}

#[cfg(feature = "cli")]
impl StageMonitor {
    pub fn new(enabled: bool) -> Self {
        let mut system = System::new();
        if enabled {
            system.refresh_memory();
            system.refresh_cpu_usage();
        }

        Self {
            system: Mutex::new(system),
            pid: sysinfo::get_current_pid().ok(),
            started: Instant::now(),
            enabled,
        }
    }

    pub fn snapshot(&self) -> Option<HostStats> {
        if !self.enabled {
            return None;
        }

        let mut system = self.system.lock().ok()?;
        system.refresh_memory();
        system.refresh_cpu_usage();

        // External stages run as child processes, so the host view matters
        // more than the driver's own footprint.
        let driver_memory_mb = match self.pid {
            Some(pid) => {
                system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
                system.process(pid).map(|p| p.memory() / 1024 / 1024).unwrap_or(0)
            }
            None => 0,
        };

        Some(HostStats {
            global_cpu_percent: system.global_cpu_usage(),
            used_memory_mb: system.used_memory() / 1024 / 1024,
            total_memory_mb: system.total_memory() / 1024 / 1024,
            driver_memory_mb,
            elapsed: self.started.elapsed(),
        })
    }

    pub fn log_stage(&self, stage: &str) {
        if let Some(stats) = self.snapshot() {
            tracing::info!(
                stage,
                cpu = format!("{:.1}%", stats.global_cpu_percent),
                used_mb = stats.used_memory_mb,
                total_mb = stats.total_memory_mb,
                driver_mb = stats.driver_memory_mb,
                "📊 host load after stage ({:?} since start)",
                stats.elapsed
            );
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

#[cfg(feature = "cli")]
impl Default for StageMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(not(feature = "cli"))]
#[derive(Default)]
pub struct StageMonitor;

#[cfg(not(feature = "cli"))]
impl StageMonitor {
    pub fn new(_enabled: bool) -> Self {
        Self
    }

    pub fn log_stage(&self, _stage: &str) {}

    pub fn is_enabled(&self) -> bool {
        false
    }
}

#[cfg(all(test, feature = "cli"))]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_monitor_reports_nothing() {
        let monitor = StageMonitor::new(false);
        assert!(!monitor.is_enabled());
        assert!(monitor.snapshot().is_none());
    }

    #[test]
    fn test_enabled_monitor_reports_memory() {
        let monitor = StageMonitor::new(true);
        let stats = monitor.snapshot().expect("enabled monitor should report");
        assert!(stats.total_memory_mb >= stats.used_memory_mb);
    }
}
