/// Running counts of activity outcomes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeCounts {
    pub parsed: usize,
    pub reconciled: usize,
    pub skipped_empty_path: usize,
    pub skipped_parse_failure: usize,
}

impl OutcomeCounts {
    pub fn recorded(&self) -> usize {
        self.parsed + self.reconciled
    }

    pub fn skipped(&self) -> usize {
        self.skipped_empty_path + self.skipped_parse_failure
    }

    pub fn total(&self) -> usize {
        self.recorded() + self.skipped()
    }
}

#[derive(Debug, Clone, Default)]
pub struct WorkerStatus {
    pub progress: f32,
    pub hic_id: u32,
    pub counts: OutcomeCounts,
}

impl WorkerStatus {
    pub fn new(progress: f32, hic_id: u32, counts: OutcomeCounts) -> Self {
        Self {
            progress,
            hic_id,
            counts,
        }
    }
}
