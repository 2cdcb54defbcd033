use std::path::Path;
use std::time::Duration;

use crate::common::error::{SbatchError, invalid_input};

pub const DEFAULT_MAX_GROUPS: u32 = 200;
pub const DEFAULT_MIN_GROUP_DURATION: Duration = Duration::from_secs(30 * 60);

/// Commands read from the input file, one per non-empty line.
#[derive(Debug, Clone)]
pub struct CommandList {
    commands: Vec<String>,
}

impl CommandList {
    pub fn load(path: &Path) -> crate::Result<CommandList> {
        let content = std::fs::read_to_string(path).map_err(|error| {
            SbatchError::InvalidInput(format!(
                "Cannot read command list {}: {}",
                path.display(),
                error
            ))
        })?;
        let list = CommandList::from_lines(content.lines());
        if list.is_empty() {
            return invalid_input(format!(
                "Command list {} contains no commands",
                path.display()
            ));
        }
        Ok(list)
    }

    /// Blank and whitespace-only lines are skipped, everything else is kept
    /// verbatim and later executed with `bash -c`.
    pub fn from_lines<'a>(lines: impl Iterator<Item = &'a str>) -> CommandList {
        let commands = lines
            .map(|line| line.trim_end())
            .filter(|line| !line.is_empty())
            .map(|line| line.to_string())
            .collect();
        CommandList { commands }
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Contiguous run of commands executed sequentially by one array task.
#[derive(Debug, Clone)]
pub struct CommandGroup {
    pub commands: Vec<String>,
}

impl CommandGroup {
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Packs enough commands into each group to make the group run for at least
/// `min_group_duration`, assuming every command takes `command_duration`.
#[derive(Debug, Clone, Copy)]
pub struct PackingHint {
    pub command_duration: Duration,
    pub min_group_duration: Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct SplitOptions {
    pub max_groups: u32,
    pub packing: Option<PackingHint>,
}

impl Default for SplitOptions {
    fn default() -> Self {
        SplitOptions {
            max_groups: DEFAULT_MAX_GROUPS,
            packing: None,
        }
    }
}

/// Splits the command list into at most `max_groups` contiguous groups.
///
/// The commands keep their input order, group sizes differ by at most one and
/// the larger groups come first.
pub fn split_commands(
    list: &CommandList,
    options: &SplitOptions,
) -> crate::Result<Vec<CommandGroup>> {
    if list.is_empty() {
        return invalid_input("Cannot split an empty command list".to_string());
    }
    if options.max_groups == 0 {
        return invalid_input("The maximum number of groups has to be at least 1".to_string());
    }
    let len = u32::try_from(list.len()).map_err(|_| {
        SbatchError::InvalidInput("The command list has too many commands".to_string())
    })?;

    let mut count = options.max_groups.min(len);
    if let Some(packing) = &options.packing {
        count = count.min(packed_group_count(len, packing)?);
    }

    let base = len / count;
    let remainder = len % count;

    let mut groups = Vec::with_capacity(count as usize);
    let mut offset = 0;
    for index in 0..count {
        let size = (base + u32::from(index < remainder)) as usize;
        groups.push(CommandGroup {
            commands: list.commands[offset..offset + size].to_vec(),
        });
        offset += size;
    }
    debug_assert_eq!(offset, list.len());
    Ok(groups)
}

/// The largest group count for which the estimated duration of every group
/// still reaches the configured floor.
fn packed_group_count(command_count: u32, packing: &PackingHint) -> crate::Result<u32> {
    if packing.command_duration.is_zero() {
        return invalid_input("The command duration estimate has to be positive".to_string());
    }
    let commands_per_group = packing
        .min_group_duration
        .as_millis()
        .div_ceil(packing.command_duration.as_millis())
        .max(1);
    let count = command_count as u128 / commands_per_group;
    Ok(count.max(1) as u32)
}
