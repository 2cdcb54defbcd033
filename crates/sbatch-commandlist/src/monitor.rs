use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::time::sleep;

use crate::submission::ArraySubmission;

/// How many times in a row a status query may fail before monitoring gives up.
const MAX_CONSECUTIVE_QUERY_FAILURES: u32 = 3;

/// State of one command group, derived from the state of its array task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupState {
    /// The task waits in the queue or is otherwise not running yet.
    Pending,
    Running,
    Completed,
    Failed,
}

impl GroupState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, GroupState::Completed | GroupState::Failed)
    }
}

/// Task states keyed by 1-based array task id.
pub type TaskStateMap = HashMap<u32, GroupState>;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GroupCounters {
    pub pending: u32,
    pub running: u32,
    pub completed: u32,
    pub failed: u32,
}

impl GroupCounters {
    pub fn finished(&self) -> u32 {
        self.completed + self.failed
    }
}

/// One observation of the whole array job; `states()[i]` belongs to group `i`.
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    states: Vec<GroupState>,
}

impl StatusSnapshot {
    /// Tasks missing from `task_states` are treated as still pending;
    /// Slurm omits tasks that have not been scheduled yet from some listings.
    pub fn from_task_states(submission: &ArraySubmission, task_states: &TaskStateMap) -> Self {
        let states = (0..submission.group_count())
            .map(|group_index| {
                let task_id = submission.task_id_for_group(group_index);
                task_states
                    .get(&task_id)
                    .copied()
                    .unwrap_or(GroupState::Pending)
            })
            .collect();
        StatusSnapshot { states }
    }

    pub fn states(&self) -> &[GroupState] {
        &self.states
    }

    pub fn counters(&self) -> GroupCounters {
        let mut counters = GroupCounters::default();
        for state in &self.states {
            match state {
                GroupState::Pending => counters.pending += 1,
                GroupState::Running => counters.running += 1,
                GroupState::Completed => counters.completed += 1,
                GroupState::Failed => counters.failed += 1,
            }
        }
        counters
    }

    pub fn is_terminal(&self) -> bool {
        self.states.iter().all(|state| state.is_terminal())
    }

    pub fn failed_group_indexes(&self) -> Vec<u32> {
        self.states
            .iter()
            .enumerate()
            .filter(|(_, state)| **state == GroupState::Failed)
            .map(|(index, _)| index as u32)
            .collect()
    }
}

/// Source of array task states, normally backed by `scontrol`/`sacct`.
pub trait StatusSource {
    /// Returns the current state of each array task, keyed by 1-based task id.
    fn query(&mut self) -> Pin<Box<dyn Future<Output = crate::Result<TaskStateMap>> + '_>>;
}

/// Polls `source` until every group of the submission reaches a terminal state.
///
/// Every successfully queried snapshot is passed to `observe`, including the
/// final one, so the observer runs at least once even when the job is already
/// finished when monitoring starts. Transient query failures are logged and
/// retried; only several failures in a row abort the watch.
pub async fn monitor_submission<S: StatusSource, F: FnMut(&StatusSnapshot)>(
    submission: &ArraySubmission,
    source: &mut S,
    poll_interval: Duration,
    mut observe: F,
) -> crate::Result<StatusSnapshot> {
    let mut consecutive_failures = 0;
    loop {
        match source.query().await {
            Ok(task_states) => {
                consecutive_failures = 0;
                let snapshot = StatusSnapshot::from_task_states(submission, &task_states);
                observe(&snapshot);
                if snapshot.is_terminal() {
                    return Ok(snapshot);
                }
            }
            Err(error) => {
                consecutive_failures += 1;
                if consecutive_failures >= MAX_CONSECUTIVE_QUERY_FAILURES {
                    return Err(error);
                }
                log::warn!("Cannot query the status of the array job: {error:?}");
            }
        }
        sleep(poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::future::Future;
    use std::pin::Pin;
    use std::time::Duration;

    use crate::common::error::SbatchError;
    use crate::monitor::{
        GroupState, StatusSnapshot, StatusSource, TaskStateMap, monitor_submission,
    };
    use crate::splitter::CommandGroup;
    use crate::submission::{ArraySubmission, ResourceConfig};

    fn submission(group_count: usize) -> ArraySubmission {
        let groups: Vec<CommandGroup> = (0..group_count)
            .map(|_| CommandGroup {
                commands: vec!["echo x".to_string()],
            })
            .collect();
        ArraySubmission::new(&groups, ResourceConfig::default()).unwrap()
    }

    fn states(pairs: &[(u32, GroupState)]) -> TaskStateMap {
        pairs.iter().copied().collect()
    }

    /// Replays a fixed sequence of query results.
    struct ScriptedSource {
        responses: VecDeque<crate::Result<TaskStateMap>>,
        queries: u32,
    }

    impl ScriptedSource {
        fn new(responses: Vec<crate::Result<TaskStateMap>>) -> Self {
            ScriptedSource {
                responses: responses.into(),
                queries: 0,
            }
        }
    }

    impl StatusSource for ScriptedSource {
        fn query(&mut self) -> Pin<Box<dyn Future<Output = crate::Result<TaskStateMap>> + '_>> {
            Box::pin(async move {
                self.queries += 1;
                self.responses
                    .pop_front()
                    .expect("the monitor queried more often than scripted")
            })
        }
    }

    #[tokio::test]
    async fn monitor_observes_already_finished_job() {
        let submission = submission(2);
        let mut source = ScriptedSource::new(vec![Ok(states(&[
            (1, GroupState::Completed),
            (2, GroupState::Completed),
        ]))]);

        let mut observed = 0;
        let snapshot = monitor_submission(&submission, &mut source, Duration::ZERO, |_| {
            observed += 1
        })
        .await
        .unwrap();

        assert_eq!(observed, 1);
        assert_eq!(source.queries, 1);
        assert_eq!(snapshot.counters().completed, 2);
        assert_eq!(snapshot.counters().failed, 0);
    }

    #[tokio::test]
    async fn monitor_polls_until_terminal() {
        let submission = submission(3);
        let mut source = ScriptedSource::new(vec![
            Ok(states(&[(1, GroupState::Running)])),
            Ok(states(&[
                (1, GroupState::Completed),
                (2, GroupState::Running),
                (3, GroupState::Running),
            ])),
            Ok(states(&[
                (1, GroupState::Completed),
                (2, GroupState::Completed),
                (3, GroupState::Failed),
            ])),
        ]);

        let mut snapshots: Vec<StatusSnapshot> = Vec::new();
        let snapshot = monitor_submission(&submission, &mut source, Duration::ZERO, |snapshot| {
            snapshots.push(snapshot.clone())
        })
        .await
        .unwrap();

        assert_eq!(snapshots.len(), 3);
        // Tasks that Slurm does not report yet count as pending
        assert_eq!(snapshots[0].counters().pending, 2);
        assert_eq!(snapshots[0].counters().running, 1);
        assert_eq!(snapshot.counters().completed, 2);
        assert_eq!(snapshot.counters().failed, 1);
        assert_eq!(snapshot.failed_group_indexes(), vec![2]);
    }

    #[tokio::test]
    async fn monitor_tolerates_transient_query_failures() {
        let submission = submission(1);
        let mut source = ScriptedSource::new(vec![
            Err(SbatchError::SchedulerQuery("scontrol timed out".into())),
            Err(SbatchError::SchedulerQuery("scontrol timed out".into())),
            Ok(states(&[(1, GroupState::Completed)])),
        ]);

        let snapshot = monitor_submission(&submission, &mut source, Duration::ZERO, |_| {})
            .await
            .unwrap();
        assert_eq!(source.queries, 3);
        assert!(snapshot.is_terminal());
    }

    #[tokio::test]
    async fn monitor_gives_up_after_repeated_failures() {
        let submission = submission(1);
        let mut source = ScriptedSource::new(vec![
            Err(SbatchError::SchedulerQuery("no response".into())),
            Err(SbatchError::SchedulerQuery("no response".into())),
            Err(SbatchError::SchedulerQuery("no response".into())),
        ]);

        let result = monitor_submission(&submission, &mut source, Duration::ZERO, |_| {}).await;
        assert!(matches!(result, Err(SbatchError::SchedulerQuery(_))));
        assert_eq!(source.queries, 3);
    }
}
