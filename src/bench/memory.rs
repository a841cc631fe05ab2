//! Best-effort memory probe for the current process.

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

/// Reads the resident memory of this process
///
/// Resident memory is coarse: requests that reuse already-mapped pages report
/// zero growth. Treat the numbers as indicative, not as allocator counts.
pub struct MemoryProbe {
    system: System,
    pid: Option<Pid>,
}

impl MemoryProbe {
    pub fn new() -> Self {
        let pid = sysinfo::get_current_pid().ok();
        if pid.is_none() {
            tracing::warn!("Current process id unavailable; memory diagnostics disabled");
        }

        Self {
            system: System::new(),
            pid,
        }
    }

    /// Current resident memory in bytes, if it can be read
    pub fn resident_bytes(&mut self) -> Option<u64> {
        let pid = self.pid?;
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::new().with_memory(),
        );
        self.system.process(pid).map(|process| process.memory())
    }
}

impl Default for MemoryProbe {
    fn default() -> Self {
        Self::new()
    }
}

/// Growth between two readings; shrinkage counts as zero
pub fn growth(before: Option<u64>, after: Option<u64>) -> Option<u64> {
    match (before, after) {
        (Some(before), Some(after)) => Some(after.saturating_sub(before)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_growth() {
        assert_eq!(growth(Some(100), Some(150)), Some(50));
        assert_eq!(growth(Some(150), Some(100)), Some(0));
        assert_eq!(growth(None, Some(100)), None);
        assert_eq!(growth(Some(100), None), None);
    }

    #[test]
    fn test_reads_own_process_memory() {
        let mut probe = MemoryProbe::new();
        if let Some(bytes) = probe.resident_bytes() {
            assert!(bytes > 0);
        }
    }
}
