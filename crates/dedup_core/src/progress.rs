/// Highest value reported while a job is still running; 100 is reserved for
/// the moment the result becomes retrievable.
pub const MAX_RUNNING_PERCENT: u8 = 99;

/// Share of the bar given to each write phase.
const WRITE_PHASE_SHARE: u8 = 12;

/// Maps read and write milestones of one job onto `0..=99`.
///
/// The read phase is weighted by input bytes. When the total input size is
/// unknown the estimate stays at 0 until the read phase finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressPlan {
    total_bytes: Option<u64>,
    write_phases: u8,
}

impl ProgressPlan {
    pub fn new(total_bytes: Option<u64>, write_phases: u8) -> Self {
        Self {
            total_bytes,
            write_phases: write_phases.min(MAX_RUNNING_PERCENT / WRITE_PHASE_SHARE),
        }
    }

    fn read_ceiling(&self) -> u8 {
        MAX_RUNNING_PERCENT - WRITE_PHASE_SHARE * self.write_phases
    }

    pub fn read_percent(&self, bytes_read: u64) -> u8 {
        let ceiling = u64::from(self.read_ceiling());
        match self.total_bytes {
            Some(0) | None => 0,
            Some(total) => {
                let done = bytes_read.min(total);
                (done * ceiling / total) as u8
            }
        }
    }

    pub fn read_done(&self) -> u8 {
        self.read_ceiling()
    }

    /// Percentage after `phases_done` write phases have finished.
    pub fn write_percent(&self, phases_done: u8) -> u8 {
        let done = phases_done.min(self.write_phases);
        self.read_ceiling() + WRITE_PHASE_SHARE * done
    }
}
