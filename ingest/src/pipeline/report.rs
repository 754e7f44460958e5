use crate::types::RunStats;

/// Stats of every table of a pipeline run, in job file order.
#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    pub runs: Vec<RunStats>,
}

impl PipelineReport {
    pub fn failed(&self) -> usize {
        self.runs.iter().filter(|stats| !stats.is_successful()).count()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed() == 0
    }

    pub fn get(&self, alias: &str) -> Option<&RunStats> {
        self.runs.iter().find(|stats| stats.identity.alias == alias)
    }
}
