pub mod status;
pub mod submit;

use std::path::{Component, Path};
use std::process::Output;
use std::time::Duration;

use bstr::ByteSlice;
use tokio::process::Command;

pub fn create_command(arguments: Vec<&str>, workdir: &Path) -> Command {
    let mut command = Command::new(arguments[0]);
    command.args(&arguments[1..]);
    command.current_dir(workdir);
    command
}

pub fn check_command_output(output: Output) -> anyhow::Result<Output> {
    let status = output.status;
    if !status.success() {
        return Err(anyhow::anyhow!(
            "Exit code: {}\nStderr: {}\nStdout: {}",
            status.code().unwrap_or(-1),
            output.stderr.to_str_lossy().trim(),
            output.stdout.to_str_lossy().trim()
        ));
    }
    Ok(output)
}

/// Format a duration as a Slurm time string, e.g. 01:05:02
pub fn format_slurm_duration(duration: &Duration) -> String {
    let mut seconds = duration.as_secs();
    let hours = seconds / 3600;
    seconds %= 3600;
    let minutes = seconds / 60;
    seconds %= 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// Tries to guess the billing project from a storage path such as
/// `/scratch/<project>/...` or `/projappl/<project>/...`.
///
/// Only the top-level storage mounts name a project; a `scratch` directory
/// nested deeper in the tree is just a directory.
pub fn infer_project_from_path(path: &Path) -> Option<String> {
    let mut components = path.components();
    if components.next() != Some(Component::RootDir) {
        return None;
    }
    let mount = match components.next() {
        Some(Component::Normal(name)) => name.to_str()?,
        _ => return None,
    };
    if mount != "scratch" && mount != "projappl" {
        return None;
    }
    match components.next() {
        Some(Component::Normal(project)) => Some(project.to_string_lossy().into_owned()),
        _ => None,
    }
}
