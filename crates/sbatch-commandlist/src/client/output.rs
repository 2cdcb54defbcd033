use std::io::Write;
use std::time::Duration;

use cli_table::format::Separator;
use cli_table::{Cell, CellStruct, ColorChoice, Style, Table, print_stdout};
use colored::Color as Colorization;
use colored::Colorize;

use crate::common::format::human_duration;
use crate::common::utils::str::pluralize;
use crate::monitor::{GroupCounters, StatusSnapshot};
use crate::slurm::submit::{LOG_DIR_NAME, SubmittedArray};
use crate::submission::ArraySubmission;

pub const GROUP_COLOR_FAILED: Colorization = Colorization::Red;
pub const GROUP_COLOR_FINISHED: Colorization = Colorization::Green;
pub const GROUP_COLOR_RUNNING: Colorization = Colorization::Yellow;
pub const GROUP_COLOR_PENDING: Colorization = Colorization::Cyan;

const PROGRESS_BAR_WIDTH: usize = 40;

/// Renders a fixed-width progress bar of the array job.
///
/// Worst states come first, failures stay visible on the left even when the
/// counts fluctuate between polls.
pub fn group_progress_bar(counters: GroupCounters, group_count: u32, width: usize) -> String {
    let mut buffer = String::from("[");

    let parts = vec![
        (counters.failed, GROUP_COLOR_FAILED),
        (counters.completed, GROUP_COLOR_FINISHED),
        (counters.running, GROUP_COLOR_RUNNING),
    ];

    let chars = |count: u32| {
        let ratio = count as f64 / group_count as f64;
        (ratio * width as f64).ceil() as usize
    };

    let mut total_char_count: usize = 0;
    for (count, color) in parts {
        let char_count = std::cmp::min(width - total_char_count, chars(count));
        buffer.push_str(&"#".repeat(char_count).color(color).to_string());
        total_char_count += char_count;
    }
    buffer.push_str(&".".repeat(width.saturating_sub(total_char_count)));

    buffer.push(']');
    buffer
}

/// Prints the submission receipt together with the follow-up Slurm commands.
pub fn print_submitted(array: &SubmittedArray) {
    let submission = &array.submission;
    let command_count = submission.command_count();
    let group_count = submission.group_count();
    println!(
        "Submitted batch job {}: {} {} in {} {}",
        array.job_id.to_string().bold(),
        command_count,
        pluralize("command", command_count as usize),
        group_count,
        pluralize("group", group_count as usize),
    );
    println!(
        "Check the job with `squeue --job {}`, cancel it with `scancel {}`",
        array.job_id, array.job_id
    );
}

/// Rewrites the current terminal line with the momentary state of the array.
pub fn print_progress_line(snapshot: &StatusSnapshot, submission: &ArraySubmission) {
    let group_count = submission.group_count();
    let counters = snapshot.counters();

    let mut statuses = vec![];
    let mut add_count = |count: u32, name: &str, color| {
        if count > 0 {
            let text = format!("{count} {name}").color(color);
            statuses.push(text.to_string());
        }
    };
    add_count(counters.running, "RUNNING", GROUP_COLOR_RUNNING);
    add_count(counters.pending, "PENDING", GROUP_COLOR_PENDING);
    add_count(counters.failed, "FAILED", GROUP_COLOR_FAILED);
    add_count(counters.completed, "COMPLETED", GROUP_COLOR_FINISHED);
    let statuses = statuses.join(", ");

    print!(
        "\r\x1b[2K{} {}/{} {} ({statuses})",
        group_progress_bar(counters, group_count, PROGRESS_BAR_WIDTH),
        counters.finished(),
        group_count,
        pluralize("group", group_count as usize),
    );
    std::io::stdout().flush().unwrap();
}

/// Printed when the user interrupts monitoring. The array itself keeps
/// running, only the watching stops.
pub fn print_detach_hint(job_id: u64) {
    println!();
    println!(
        "Monitoring stopped, job {job_id} keeps running. Check it with `squeue --job {job_id}`, \
        cancel it with `scancel {job_id}`"
    );
}

/// Prints the closing report once the array reaches a terminal state.
pub fn print_final_summary(
    snapshot: &StatusSnapshot,
    array: &SubmittedArray,
    elapsed: Duration,
    color_policy: ColorChoice,
) {
    // Terminate the in-place progress line
    println!();

    let submission = &array.submission;
    let counters = snapshot.counters();
    let group_count = submission.group_count();
    let elapsed =
        human_duration(chrono::Duration::from_std(elapsed).unwrap_or(chrono::Duration::MAX));

    if counters.failed == 0 {
        println!(
            "{} {} finished successfully after {elapsed}",
            group_count,
            pluralize("group", group_count as usize),
        );
        return;
    }

    println!(
        "{} of {} {} {} after {elapsed}",
        counters.failed,
        group_count,
        pluralize("group", group_count as usize),
        "FAILED".color(GROUP_COLOR_FAILED),
    );

    let rows: Vec<Vec<CellStruct>> = snapshot
        .failed_group_indexes()
        .into_iter()
        .map(|group_index| {
            let task_id = submission.task_id_for_group(group_index);
            vec![
                task_id.cell(),
                submission.group_sizes()[group_index as usize].cell(),
                format!(
                    "{}/{}_{}_{}.err",
                    LOG_DIR_NAME,
                    submission.resources().job_name,
                    array.job_id,
                    task_id
                )
                .cell(),
            ]
        })
        .collect();
    print_horizontal_table(
        rows,
        vec![
            "Task".cell().bold(true),
            "Commands".cell().bold(true),
            "Stderr".cell().bold(true),
        ],
        color_policy,
    );
}

fn print_horizontal_table(
    rows: Vec<Vec<CellStruct>>,
    header: Vec<CellStruct>,
    color_policy: ColorChoice,
) {
    let table = rows
        .table()
        .separator(
            Separator::builder()
                .title(Some(Default::default()))
                .column(Some(Default::default()))
                .build(),
        )
        .title(header)
        .color_choice(color_policy);
    if let Err(error) = print_stdout(table) {
        log::error!("Cannot print table to stdout: {error:?}");
    }
}
