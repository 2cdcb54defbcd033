use std::time::{Duration, Instant};

use anyhow::Context;
use cli_table::ColorChoice;

use crate::client::output::{
    print_detach_hint, print_final_summary, print_progress_line, print_submitted,
};
use crate::common::cli::SubmitOpts;
use crate::common::memory::MemoryAmount;
use crate::common::utils::fs::{absolute_path, get_current_dir};
use crate::common::utils::str::pluralize;
use crate::monitor::monitor_submission;
use crate::slurm::infer_project_from_path;
use crate::slurm::status::SlurmStatusSource;
use crate::slurm::submit::{SubmittedArray, submit_array};
use crate::splitter::{
    CommandList, DEFAULT_MIN_GROUP_DURATION, PackingHint, SplitOptions, split_commands,
};
use crate::submission::{ArraySubmission, DEFAULT_TIME_LIMIT, ResourceConfig};

const STATUS_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Splits the command list, submits it as a Slurm array job and, unless
/// disabled, watches the job until it finishes.
pub async fn command_submit(opts: SubmitOpts, color_policy: ColorChoice) -> anyhow::Result<()> {
    which::which("sbatch")
        .context("Cannot find `sbatch` binary. Make sure that Slurm is installed.")?;

    let workdir = absolute_path(opts.workdir.unwrap_or_else(get_current_dir));
    let commands_path = absolute_path(opts.commands);
    let list = CommandList::load(&commands_path)?;
    log::info!(
        "Loaded {} {} from {}",
        list.len(),
        pluralize("command", list.len()),
        commands_path.display()
    );

    let project = opts.project.or_else(|| {
        let inferred = infer_project_from_path(&workdir);
        if let Some(project) = &inferred {
            log::info!("Inferred billing project {project} from the working directory");
        }
        inferred
    });
    let resources = ResourceConfig {
        time_limit: opts
            .time
            .map(|time| time.unpack())
            .unwrap_or(DEFAULT_TIME_LIMIT),
        memory: opts
            .mem
            .unwrap_or_else(|| MemoryAmount::from_gigabytes(8)),
        project,
        max_running: opts.max_running,
        job_name: opts.name,
    };

    if opts.min_group_time.is_some() && opts.cmd_time.is_none() {
        log::warn!("`--min_group_time` has no effect without `--cmd_time`");
    }
    let options = SplitOptions {
        max_groups: opts.max_jobs,
        packing: opts.cmd_time.map(|command_duration| PackingHint {
            command_duration: command_duration.unpack(),
            min_group_duration: opts
                .min_group_time
                .map(|time| time.unpack())
                .unwrap_or(DEFAULT_MIN_GROUP_DURATION),
        }),
    };

    let groups = split_commands(&list, &options)?;
    log::debug!(
        "Split {} commands into groups of sizes {:?}",
        list.len(),
        groups.iter().map(|group| group.len()).collect::<Vec<_>>()
    );

    let submission = ArraySubmission::new(&groups, resources)?;
    let array = submit_array(&workdir, &groups, submission).await?;
    print_submitted(&array);

    if opts.no_monitor {
        return Ok(());
    }
    watch_submission(&array, color_policy).await
}

/// Polls Slurm until the array finishes and keeps a single status line
/// updated. Ctrl-C detaches from the job without cancelling it.
async fn watch_submission(array: &SubmittedArray, color_policy: ColorChoice) -> anyhow::Result<()> {
    let mut source = SlurmStatusSource::new(array.job_id, array.workdir.clone());
    let started = Instant::now();

    let monitor = monitor_submission(
        &array.submission,
        &mut source,
        STATUS_POLL_INTERVAL,
        |snapshot| print_progress_line(snapshot, &array.submission),
    );

    tokio::select! {
        result = monitor => {
            let snapshot = result?;
            print_final_summary(&snapshot, array, started.elapsed(), color_policy);
            let failed = snapshot.counters().failed;
            if failed > 0 {
                anyhow::bail!(
                    "{} of {} groups failed",
                    failed,
                    array.submission.group_count()
                );
            }
        }
        _ = tokio::signal::ctrl_c() => {
            print_detach_hint(array.job_id);
        }
    }
    Ok(())
}
