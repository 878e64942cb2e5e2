use serde::Serialize;
use std::time::Instant;
use sysinfo::{Pid, System};

/// Measurements captured around one node invocation.
#[derive(Debug, Clone, Serialize)]
pub struct NodeProfile {
    pub node_id: String,
    pub duration_ms: u64,
    pub rss_before_bytes: u64,
    pub rss_after_bytes: u64,
    pub rss_delta_bytes: i64,
    pub cpu_usage_percent: f32,
}

/// Samples this process's RSS and CPU around node invocations.
///
/// Refreshing system info is not free, so the engine only constructs a
/// profiler for runs that enable profiling.
pub struct NodeProfiler {
    system: System,
    pid: Pid,
}

pub struct ProfileSample {
    started: Instant,
    rss_before: u64,
}

impl NodeProfiler {
    pub fn new() -> Self {
        Self {
            system: System::new_all(),
            pid: Pid::from_u32(std::process::id()),
        }
    }

    pub fn begin(&mut self) -> ProfileSample {
        self.system.refresh_all();
        let rss_before = self
            .system
            .process(self.pid)
            .map(|p| p.memory())
            .unwrap_or(0);
        ProfileSample {
            started: Instant::now(),
            rss_before,
        }
    }

    pub fn finish(&mut self, node_id: &str, sample: ProfileSample) -> NodeProfile {
        self.system.refresh_all();
        let (rss_after, cpu_usage) = self
            .system
            .process(self.pid)
            .map(|p| (p.memory(), p.cpu_usage()))
            .unwrap_or((0, 0.0));

        NodeProfile {
            node_id: node_id.to_string(),
            duration_ms: sample.started.elapsed().as_millis() as u64,
            rss_before_bytes: sample.rss_before,
            rss_after_bytes: rss_after,
            rss_delta_bytes: rss_after as i64 - sample.rss_before as i64,
            cpu_usage_percent: cpu_usage,
        }
    }
}

impl Default for NodeProfiler {
    fn default() -> Self {
        Self::new()
    }
}
