#[cfg(feature = "cli")]
use std::time::{Duration, Instant};
#[cfg(feature = "cli")]
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

#[cfg(feature = "cli")]
#[derive(Debug, Clone)]
pub struct PhaseStats {
    pub memory_usage_mb: u64,
    pub peak_memory_mb: u64,
    pub phase_time: Duration,
    pub elapsed_time: Duration,
}

/// 轉換各階段的耗時與記憶體統計
#[cfg(feature = "cli")]
pub struct ConversionMonitor {
    system: System,
    pid: Option<Pid>,
    start_time: Instant,
    phase_start: Instant,
    peak_memory: u64,
    enabled: bool,
}

#[cfg(feature = "cli")]
impl ConversionMonitor {
    pub fn new(enabled: bool) -> Self {
        let pid = if enabled {
            sysinfo::get_current_pid().ok()
        } else {
            None
        };
        let now = Instant::now();

        Self {
            system: System::new(),
            pid,
            start_time: now,
            phase_start: now,
            peak_memory: 0,
            enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn sample(&mut self) -> Option<PhaseStats> {
        if !self.enabled {
            return None;
        }

        let memory_mb = match self.pid {
            Some(pid) => {
                self.system.refresh_processes_specifics(
                    ProcessesToUpdate::Some(&[pid]),
                    true,
                    ProcessRefreshKind::nothing().with_memory(),
                );
                self.system
                    .process(pid)
                    .map(|process| process.memory() / 1024 / 1024)
                    .unwrap_or(0)
            }
            None => 0,
        };

        self.peak_memory = self.peak_memory.max(memory_mb);
        let now = Instant::now();
        let stats = PhaseStats {
            memory_usage_mb: memory_mb,
            peak_memory_mb: self.peak_memory,
            phase_time: now.duration_since(self.phase_start),
            elapsed_time: now.duration_since(self.start_time),
        };
        self.phase_start = now;
        Some(stats)
    }

    pub fn log_phase(&mut self, phase: &str) {
        if let Some(stats) = self.sample() {
            tracing::info!(
                "📊 {} - took {:?}, Memory: {}MB, Peak: {}MB",
                phase,
                stats.phase_time,
                stats.memory_usage_mb,
                stats.peak_memory_mb
            );
        }
    }

    pub fn log_final_stats(&mut self) {
        if let Some(stats) = self.sample() {
            tracing::info!(
                "📊 Final Stats - Total Time: {:?}, Peak Memory: {}MB",
                stats.elapsed_time,
                stats.peak_memory_mb
            );
        }
    }
}

#[cfg(feature = "cli")]
impl Default for ConversionMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}

// 非 CLI 環境的空實現
#[cfg(not(feature = "cli"))]
#[derive(Default)]
pub struct ConversionMonitor;

#[cfg(not(feature = "cli"))]
impl ConversionMonitor {
    pub fn new(_enabled: bool) -> Self {
        Self
    }

    pub fn is_enabled(&self) -> bool {
        false
    }

    pub fn log_phase(&mut self, _phase: &str) {}

    pub fn log_final_stats(&mut self) {}
}
