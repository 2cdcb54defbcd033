use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::str::FromStr;

use anyhow::Context;
use bstr::ByteSlice;

use crate::common::arraydef::IntArray;
use crate::common::error::SbatchError;
use crate::monitor::{GroupState, StatusSource, TaskStateMap};
use crate::slurm::{check_command_output, create_command};

/// Printed by `scontrol` once a finished job ages out of the controller
/// memory (`MinJobAge`). The accounting database has to be asked instead.
const INVALID_JOB_ID_MARKER: &str = "Invalid job id specified";

/// Parse <key>=<value> pairs from the output of `scontrol show job <job-id>`.
fn get_scontrol_items(output: &str) -> HashMap<&str, &str> {
    let mut map = HashMap::new();
    for line in output.lines() {
        for item in line.trim().split(' ') {
            let iter: Vec<_> = item.split('=').take(2).collect();
            if iter.len() < 2 {
                continue;
            }
            let (key, value) = (iter[0], iter[1]);
            map.insert(key, value);
        }
    }
    map
}

/// Maps a Slurm job state to the state of the command group behind the task.
fn parse_task_state(state: &str) -> anyhow::Result<GroupState> {
    // sacct reports cancellations as e.g. `CANCELLED by 18432`
    let state = state.split_whitespace().next().unwrap_or("");
    Ok(match state {
        "PENDING" | "CONFIGURING" | "REQUEUED" | "SUSPENDED" | "RESIZING" => GroupState::Pending,
        "RUNNING" | "COMPLETING" | "STAGE_OUT" => GroupState::Running,
        "COMPLETED" => GroupState::Completed,
        "FAILED" | "CANCELLED" | "TIMEOUT" | "OUT_OF_MEMORY" | "NODE_FAIL" | "BOOT_FAIL"
        | "DEADLINE" | "PREEMPTED" | "REVOKED" => GroupState::Failed,
        _ => anyhow::bail!("Unknown Slurm job state {}", state),
    })
}

/// `ArrayTaskId` of a pending meta-record can be a range (`12-200`) and may
/// carry a throttle suffix (`12-200%20`).
fn parse_array_task_ids(value: &str) -> anyhow::Result<IntArray> {
    let ids = match value.split_once('%') {
        Some((ids, _)) => ids,
        None => value,
    };
    IntArray::from_str(ids).with_context(|| format!("Cannot parse ArrayTaskId {value}"))
}

/// Parses the output of `scontrol show job <id>`.
///
/// Scontrol prints one record per array task, separated by blank lines.
/// Tasks that were not scheduled yet are collapsed into a single pending
/// record whose `ArrayTaskId` holds the whole remaining range.
pub fn parse_scontrol_output(output: &str) -> anyhow::Result<TaskStateMap> {
    let mut states = TaskStateMap::new();
    for record in output.split("\n\n") {
        let record = record.trim();
        if record.is_empty() {
            continue;
        }
        let items = get_scontrol_items(record);
        let Some(task_ids) = items.get("ArrayTaskId") else {
            log::debug!("Skipping scontrol record without ArrayTaskId");
            continue;
        };
        let state = items
            .get("JobState")
            .ok_or_else(|| anyhow::anyhow!("Missing key JobState in scontrol output"))?;
        let state = parse_task_state(state)?;
        for task_id in parse_array_task_ids(task_ids)?.iter() {
            states.insert(task_id, state);
        }
    }
    Ok(states)
}

/// Parses `sacct -j <id> --parsable2 --noheader --format=JobID,State` output.
///
/// Job step entries (`<id>_<task>.batch`, `.extern`) are skipped; tasks that
/// never started are reported in a single bracketed range (`<id>_[5-200]`).
pub fn parse_sacct_output(output: &str, job_id: u64) -> anyhow::Result<TaskStateMap> {
    let prefix = format!("{job_id}_");
    let mut states = TaskStateMap::new();
    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut fields = line.split('|');
        let (Some(id), Some(state)) = (fields.next(), fields.next()) else {
            anyhow::bail!("Malformed sacct line: {line}");
        };
        if id.contains('.') {
            continue;
        }
        let Some(task_part) = id.strip_prefix(&prefix) else {
            log::debug!("Skipping sacct entry of another job: {id}");
            continue;
        };
        let task_part = task_part.trim_start_matches('[').trim_end_matches(']');
        let state = parse_task_state(state)?;
        for task_id in parse_array_task_ids(task_part)?.iter() {
            states.insert(task_id, state);
        }
    }
    Ok(states)
}

/// Live status source backed by the Slurm CLI tools.
///
/// `scontrol` is asked first because it sees the current queue with low
/// overhead. Once the finished job disappears from the controller memory,
/// the source permanently switches to `sacct`.
pub struct SlurmStatusSource {
    job_id: u64,
    workdir: PathBuf,
    use_sacct: bool,
}

impl SlurmStatusSource {
    pub fn new(job_id: u64, workdir: PathBuf) -> Self {
        SlurmStatusSource {
            job_id,
            workdir,
            use_sacct: false,
        }
    }

    /// Returns `None` when the job has aged out of the controller memory.
    async fn query_scontrol(&self) -> anyhow::Result<Option<TaskStateMap>> {
        let job_id = self.job_id.to_string();
        let arguments = vec!["scontrol", "show", "job", &job_id];
        log::debug!("Running Slurm command `{}`", arguments.join(" "));

        let mut command = create_command(arguments, &self.workdir);
        let output = command.output().await.context("scontrol start failed")?;
        if !output.status.success() && output.stderr.to_str_lossy().contains(INVALID_JOB_ID_MARKER)
        {
            return Ok(None);
        }
        let output = check_command_output(output).context("scontrol execution failed")?;
        let stdout = output
            .stdout
            .to_str()
            .map_err(|err| anyhow::anyhow!("Invalid UTF-8 in scontrol output: {:?}", err))?;
        Ok(Some(parse_scontrol_output(stdout)?))
    }

    async fn query_sacct(&self) -> anyhow::Result<TaskStateMap> {
        let job_id = self.job_id.to_string();
        let arguments = vec![
            "sacct",
            "-j",
            &job_id,
            "--parsable2",
            "--noheader",
            "--format=JobID,State",
        ];
        log::debug!("Running Slurm command `{}`", arguments.join(" "));

        let mut command = create_command(arguments, &self.workdir);
        let output = command.output().await.context("sacct start failed")?;
        let output = check_command_output(output).context("sacct execution failed")?;
        let stdout = output
            .stdout
            .to_str()
            .map_err(|err| anyhow::anyhow!("Invalid UTF-8 in sacct output: {:?}", err))?;
        parse_sacct_output(stdout, self.job_id)
    }
}

impl StatusSource for SlurmStatusSource {
    fn query(&mut self) -> Pin<Box<dyn Future<Output = crate::Result<TaskStateMap>> + '_>> {
        Box::pin(async move {
            if !self.use_sacct {
                match self.query_scontrol().await {
                    Ok(Some(states)) => return Ok(states),
                    Ok(None) => {
                        log::debug!(
                            "Job {} is no longer known to scontrol, switching to sacct",
                            self.job_id
                        );
                        self.use_sacct = true;
                    }
                    Err(error) => {
                        return Err(SbatchError::SchedulerQuery(format!("{error:#}")));
                    }
                }
            }
            self.query_sacct()
                .await
                .map_err(|error| SbatchError::SchedulerQuery(format!("{error:#}")))
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::monitor::GroupState;
    use crate::slurm::status::{parse_sacct_output, parse_scontrol_output, parse_task_state};

    #[test]
    fn scontrol_array_records() {
        let output = "JobId=123457 ArrayJobId=123456 ArrayTaskId=1 JobName=commandlist
   UserId=user(1000) GroupId=users(1000) MCS_label=N/A
   Priority=4294 Nice=0 Account=project_2001234 QOS=normal
   JobState=RUNNING Reason=None Dependency=(null)
   RunTime=00:01:34 TimeLimit=12:00:00 TimeMin=N/A
   WorkDir=/scratch/project_2001234/run1

JobId=123458 ArrayJobId=123456 ArrayTaskId=2 JobName=commandlist
   JobState=COMPLETED Reason=None Dependency=(null)
   ExitCode=0:0

JobId=123456 ArrayJobId=123456 ArrayTaskId=3-6%2 JobName=commandlist
   JobState=PENDING Reason=Priority Dependency=(null)";

        let states = parse_scontrol_output(output).unwrap();
        assert_eq!(states.len(), 6);
        assert_eq!(states[&1], GroupState::Running);
        assert_eq!(states[&2], GroupState::Completed);
        for task_id in 3..=6 {
            assert_eq!(states[&task_id], GroupState::Pending);
        }
    }

    #[test]
    fn scontrol_skips_records_without_array_task_id() {
        let output = "JobId=4641914 JobName=bash
   JobState=RUNNING Reason=None Dependency=(null)
   RunTime=00:01:34 TimeLimit=00:15:00 TimeMin=N/A";
        let states = parse_scontrol_output(output).unwrap();
        assert!(states.is_empty());
    }

    #[test]
    fn scontrol_unknown_state_is_an_error() {
        let output = "JobId=1 ArrayJobId=1 ArrayTaskId=1 JobState=EXPLODED";
        assert!(parse_scontrol_output(output).is_err());
    }

    #[test]
    fn sacct_records() {
        let output = "123456_1|COMPLETED
123456_1.batch|COMPLETED
123456_1.extern|COMPLETED
123456_2|FAILED
123456_2.batch|FAILED
123456_3|CANCELLED by 18432
123456_4|RUNNING
123456_[5-8%2]|PENDING
";
        let states = parse_sacct_output(output, 123456).unwrap();
        assert_eq!(states.len(), 8);
        assert_eq!(states[&1], GroupState::Completed);
        assert_eq!(states[&2], GroupState::Failed);
        assert_eq!(states[&3], GroupState::Failed);
        assert_eq!(states[&4], GroupState::Running);
        for task_id in 5..=8 {
            assert_eq!(states[&task_id], GroupState::Pending);
        }
    }

    #[test]
    fn sacct_skips_entries_of_other_jobs() {
        let states = parse_sacct_output("999999_1|COMPLETED\n", 123456).unwrap();
        assert!(states.is_empty());
    }

    #[test]
    fn sacct_malformed_line_is_an_error() {
        assert!(parse_sacct_output("no-separator-here\n", 1).is_err());
    }

    #[test]
    fn task_state_classes() {
        assert_eq!(parse_task_state("PENDING").unwrap(), GroupState::Pending);
        assert_eq!(parse_task_state("REQUEUED").unwrap(), GroupState::Pending);
        assert_eq!(parse_task_state("RUNNING").unwrap(), GroupState::Running);
        assert_eq!(parse_task_state("COMPLETING").unwrap(), GroupState::Running);
        assert_eq!(parse_task_state("COMPLETED").unwrap(), GroupState::Completed);
        assert_eq!(parse_task_state("TIMEOUT").unwrap(), GroupState::Failed);
        assert_eq!(parse_task_state("OUT_OF_MEMORY").unwrap(), GroupState::Failed);
        assert_eq!(
            parse_task_state("CANCELLED by 18432").unwrap(),
            GroupState::Failed
        );
        assert!(parse_task_state("SOMETHING_ELSE").is_err());
        assert!(parse_task_state("").is_err());
    }
}
