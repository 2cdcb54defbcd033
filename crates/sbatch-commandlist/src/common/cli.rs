use std::path::PathBuf;

use clap::Parser;

use crate::common::memory::MemoryAmount;
use crate::common::utils::time::ExtendedArgDuration;

#[derive(clap::ValueEnum, Clone)]
pub enum ColorPolicy {
    /// Use colors if the stdout is detected to be a terminal.
    Auto,
    /// Always use colors.
    Always,
    /// Never use colors.
    Never,
}

// Common CLI options
#[derive(Parser)]
pub struct CommonOpts {
    /// Sets console color policy
    #[arg(
        long,
        default_value_t = ColorPolicy::Auto,
        value_enum,
        global = true,
        help_heading("GLOBAL OPTIONS"),
        hide_short_help(true)
    )]
    pub colors: ColorPolicy,

    /// Enables more detailed log output
    #[arg(
        long,
        env = "SBATCH_COMMANDLIST_DEBUG",
        global = true,
        help_heading("GLOBAL OPTIONS"),
        hide_short_help(true)
    )]
    pub debug: bool,
}

// Root CLI options
#[derive(Parser)]
#[command(
    author,
    about,
    version(crate::SBATCH_COMMANDLIST_VERSION),
    help_expected(true)
)]
pub struct RootOptions {
    #[clap(flatten)]
    pub common: CommonOpts,

    #[clap(flatten)]
    pub submit: SubmitOpts,
}

#[derive(Parser)]
pub struct SubmitOpts {
    /// Path to a file with one shell command per line
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub commands: PathBuf,

    /// Walltime of each array task, in `HH:MM:SS` or humantime format (2h30m)
    /// [default: 12:00:00]
    #[arg(long, short('t'))]
    pub time: Option<ExtendedArgDuration>,

    /// Memory requested for each array task (e.g. `8G`, `512M`)
    /// [default: 8G]
    #[arg(long)]
    pub mem: Option<MemoryAmount>,

    /// Project the job is billed to.
    /// When omitted, an attempt is made to infer it from the working directory.
    #[arg(long)]
    pub project: Option<String>,

    /// Upper limit on the number of array tasks that the command list
    /// is split into
    #[arg(long = "max_jobs", default_value_t = crate::splitter::DEFAULT_MAX_GROUPS)]
    pub max_jobs: u32,

    /// Estimated duration of a single command.
    /// When given, enough commands are packed into each task to make it run
    /// for at least `--min_group_time`.
    #[arg(long = "cmd_time")]
    pub cmd_time: Option<ExtendedArgDuration>,

    /// Shortest array task duration that is still worth scheduling.
    /// Only used together with `--cmd_time`
    /// [default: 30m]
    #[arg(long = "min_group_time")]
    pub min_group_time: Option<ExtendedArgDuration>,

    /// Limit how many array tasks may run at the same time
    #[arg(long = "max_running")]
    pub max_running: Option<u32>,

    /// Name of the array job
    #[arg(long, default_value = "commandlist")]
    pub name: String,

    /// Directory where chunk files, task logs and the job script are created
    /// [default: current directory]
    #[arg(long, value_hint = clap::ValueHint::DirPath)]
    pub workdir: Option<PathBuf>,

    /// Only submit the array job, do not wait for it to finish
    #[arg(long = "no_monitor")]
    pub no_monitor: bool,
}

/// Long options that were historically accepted with a single dash
/// (`-commands FILE`, `-mem 8G`).
const LEGACY_LONG_FLAGS: [&str; 11] = [
    "commands",
    "time",
    "mem",
    "project",
    "max_jobs",
    "cmd_time",
    "min_group_time",
    "max_running",
    "name",
    "workdir",
    "no_monitor",
];

/// Rewrites single-dash long options to the double-dash form accepted by clap.
/// Everything else (short flags, values, `--` options) is passed through untouched.
pub fn normalize_legacy_args(args: impl IntoIterator<Item = String>) -> Vec<String> {
    args.into_iter()
        .map(|arg| match arg.strip_prefix('-') {
            Some(rest) if !rest.starts_with('-') => {
                let name = rest.split_once('=').map(|(name, _)| name).unwrap_or(rest);
                if LEGACY_LONG_FLAGS.contains(&name) {
                    format!("-{arg}")
                } else {
                    arg
                }
            }
            _ => arg,
        })
        .collect()
}
