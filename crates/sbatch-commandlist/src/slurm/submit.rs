use std::fmt::Write;
use std::path::{Path, PathBuf};

use bstr::ByteSlice;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::error::SbatchError;
use crate::slurm::{check_command_output, create_command, format_slurm_duration};
use crate::splitter::CommandGroup;
use crate::submission::ArraySubmission;

/// Name of the generated job script.
const SUBMIT_SCRIPT_NAME: &str = "commandlist-submit.sh";

/// Name of a file that will store the job id of the submitted array job.
const JOBID_FILE_NAME: &str = "jobid";

/// Directory with one command file per array task.
pub const CHUNK_DIR_NAME: &str = "chunks";

/// Directory where the array tasks write their stdout/stderr.
pub const LOG_DIR_NAME: &str = "logs";

/// Manifest describing the submitted array job.
const MANIFEST_FILE_NAME: &str = "submission.json";

/// Array job accepted by Slurm. Also serialized into `submission.json` in the
/// working directory so that the run can be inspected later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmittedArray {
    pub job_id: u64,
    pub submitted_at: DateTime<Utc>,
    pub workdir: PathBuf,
    pub submission: ArraySubmission,
}

fn chunk_file_name(task_id: u32) -> String {
    format!("chunk_{task_id}")
}

/// Writes one `chunks/chunk_<task-id>` file per group.
///
/// Concatenating the files in task id order reproduces the input command list.
pub fn write_chunk_files(
    workdir: &Path,
    submission: &ArraySubmission,
    groups: &[CommandGroup],
) -> crate::Result<()> {
    debug_assert_eq!(submission.group_count() as usize, groups.len());
    let chunk_dir = workdir.join(CHUNK_DIR_NAME);
    std::fs::create_dir_all(&chunk_dir)?;
    for (group_index, group) in groups.iter().enumerate() {
        let task_id = submission.task_id_for_group(group_index as u32);
        let mut content = group.commands.join("\n");
        content.push('\n');
        std::fs::write(chunk_dir.join(chunk_file_name(task_id)), content)?;
    }
    Ok(())
}

/// Renders the job script executed by every array task.
///
/// The task reads its own chunk file, runs the commands in it one after
/// another and fails if any of them fails. A failing command does not stop
/// the remaining commands of the chunk.
pub fn render_submit_script(submission: &ArraySubmission, workdir: &Path) -> String {
    let resources = submission.resources();
    let log_dir = workdir.join(LOG_DIR_NAME);

    let mut array = submission.task_ids().to_string();
    if let Some(max_running) = resources.max_running {
        write!(array, "%{max_running}").unwrap();
    }

    let mut script = format!(
        r##"#!/bin/bash
#SBATCH --job-name={name}
#SBATCH --output={log_dir}/{name}_%A_%a.out
#SBATCH --error={log_dir}/{name}_%A_%a.err
#SBATCH --time={walltime}
#SBATCH --mem={memory}
"##,
        name = resources.job_name,
        log_dir = log_dir.display(),
        walltime = format_slurm_duration(&resources.time_limit),
        memory = resources.memory,
    );
    if let Some(project) = &resources.project {
        writeln!(script, "#SBATCH --account={project}").unwrap();
    }
    writeln!(script, "#SBATCH --array={array}").unwrap();

    // The inner bash must not inherit the chunk file on stdin, a command that
    // reads stdin would otherwise swallow the rest of the chunk.
    write!(
        script,
        r##"
CHUNK_FILE="{chunk_dir}/{chunk_prefix}${{SLURM_ARRAY_TASK_ID}}"

status=0
while IFS= read -r command; do
    bash -c "$command" </dev/null || status=1
done < "$CHUNK_FILE"
exit $status
"##,
        chunk_dir = workdir.join(CHUNK_DIR_NAME).display(),
        chunk_prefix = "chunk_",
    )
    .unwrap();
    script
}

fn parse_sbatch_job_id(output: &str) -> anyhow::Result<u64> {
    output
        .lines()
        .map(|line| line.trim())
        .find(|line| line.to_lowercase().starts_with("submitted batch job"))
        .and_then(|line| line.split(' ').nth(3))
        .and_then(|id| id.parse::<u64>().ok())
        .ok_or_else(|| anyhow::anyhow!("Missing job id in sbatch output\n{output}"))
}

async fn run_sbatch(workdir: &Path, script_path: &Path) -> anyhow::Result<u64> {
    let script_path = script_path.to_str().unwrap();
    let arguments = vec!["sbatch", script_path];
    log::debug!("Running command `{}`", arguments.join(" "));

    let mut command = create_command(arguments, workdir);
    let output = command.output().await?;
    let output = check_command_output(output)?;
    let output = output
        .stdout
        .to_str()
        .map_err(|e| anyhow::anyhow!("Invalid UTF-8 in sbatch output: {:?}", e))?
        .trim();
    log::debug!("Sbatch output: {output}");
    parse_sbatch_job_id(output)
}

/// Materializes the chunk files and the job script in `workdir` and submits
/// the array job with `sbatch`. On success the job id and a `submission.json`
/// manifest are written next to the script.
pub async fn submit_array(
    workdir: &Path,
    groups: &[CommandGroup],
    submission: ArraySubmission,
) -> crate::Result<SubmittedArray> {
    std::fs::create_dir_all(workdir.join(LOG_DIR_NAME))?;
    write_chunk_files(workdir, &submission, groups)?;

    let script = render_submit_script(&submission, workdir);
    let script_path = workdir.join(SUBMIT_SCRIPT_NAME);
    std::fs::write(&script_path, script)?;

    let job_id = run_sbatch(workdir, &script_path)
        .await
        .map_err(|error| SbatchError::SchedulerRejected(format!("{error:#}")))?;

    std::fs::write(workdir.join(JOBID_FILE_NAME), job_id.to_string())?;

    let submitted = SubmittedArray {
        job_id,
        submitted_at: Utc::now(),
        workdir: workdir.to_path_buf(),
        submission,
    };
    std::fs::write(
        workdir.join(MANIFEST_FILE_NAME),
        serde_json::to_string_pretty(&submitted)?,
    )?;
    Ok(submitted)
}
