use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::common::arraydef::IntArray;
use crate::common::error::invalid_input;
use crate::common::memory::MemoryAmount;
use crate::splitter::CommandGroup;

pub const DEFAULT_TIME_LIMIT: Duration = Duration::from_secs(12 * 3600);
pub const DEFAULT_JOB_NAME: &str = "commandlist";

/// Resource requests shared by every task of the array job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Walltime of a single task.
    pub time_limit: Duration,
    /// Memory requested per task.
    pub memory: MemoryAmount,
    /// Project the job is billed to. `None` leaves the decision to Slurm.
    pub project: Option<String>,
    /// Limit on simultaneously running tasks (`--array=...%N`).
    pub max_running: Option<u32>,
    pub job_name: String,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        ResourceConfig {
            time_limit: DEFAULT_TIME_LIMIT,
            memory: MemoryAmount::from_gigabytes(8),
            project: None,
            max_running: None,
            job_name: DEFAULT_JOB_NAME.to_string(),
        }
    }
}

/// Describes one array job before and after submission.
///
/// Slurm array task ids are 1-based while groups are indexed from 0;
/// task `i` always executes group `i - 1`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArraySubmission {
    group_sizes: Vec<u32>,
    resources: ResourceConfig,
}

impl ArraySubmission {
    pub fn new(
        groups: &[CommandGroup],
        resources: ResourceConfig,
    ) -> crate::Result<ArraySubmission> {
        if groups.is_empty() {
            return invalid_input(
                "Cannot build an array job without any command groups".to_string(),
            );
        }
        debug_assert!(groups.iter().all(|group| !group.is_empty()));
        Ok(ArraySubmission {
            group_sizes: groups.iter().map(|group| group.len() as u32).collect(),
            resources,
        })
    }

    pub fn group_count(&self) -> u32 {
        self.group_sizes.len() as u32
    }

    pub fn group_sizes(&self) -> &[u32] {
        &self.group_sizes
    }

    pub fn command_count(&self) -> u32 {
        self.group_sizes.iter().sum()
    }

    pub fn resources(&self) -> &ResourceConfig {
        &self.resources
    }

    /// All task ids of the array job, rendered as `1-N` for sbatch.
    pub fn task_ids(&self) -> IntArray {
        IntArray::from_range(1, self.group_count())
    }

    pub fn task_id_for_group(&self, group_index: u32) -> u32 {
        debug_assert!(group_index < self.group_count());
        group_index + 1
    }

    pub fn group_for_task(&self, task_id: u32) -> Option<u32> {
        if task_id >= 1 && task_id <= self.group_count() {
            Some(task_id - 1)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::splitter::CommandGroup;
    use crate::submission::{ArraySubmission, ResourceConfig};

    fn groups(sizes: &[usize]) -> Vec<CommandGroup> {
        sizes
            .iter()
            .map(|size| CommandGroup {
                commands: vec!["echo x".to_string(); *size],
            })
            .collect()
    }

    fn submission(sizes: &[usize]) -> ArraySubmission {
        ArraySubmission::new(&groups(sizes), ResourceConfig::default()).unwrap()
    }

    #[test]
    fn task_mapping_is_a_bijection() {
        let submission = submission(&[3, 3, 2, 2, 2, 2, 2]);
        assert_eq!(submission.group_count(), 7);
        for group_index in 0..submission.group_count() {
            let task_id = submission.task_id_for_group(group_index);
            assert_eq!(submission.group_for_task(task_id), Some(group_index));
        }
        assert_eq!(submission.group_for_task(0), None);
        assert_eq!(submission.group_for_task(8), None);
    }

    #[test]
    fn task_ids_render_as_slurm_range() {
        assert_eq!(submission(&[2, 2, 1]).task_ids().to_string(), "1-3");
        assert_eq!(submission(&[5]).task_ids().to_string(), "1");
    }

    #[test]
    fn counts_commands_across_groups() {
        let submission = submission(&[3, 2, 2]);
        assert_eq!(submission.command_count(), 7);
        assert_eq!(submission.group_sizes(), &[3, 2, 2]);
    }

    #[test]
    fn rejects_empty_group_list() {
        assert!(ArraySubmission::new(&[], ResourceConfig::default()).is_err());
    }
}
