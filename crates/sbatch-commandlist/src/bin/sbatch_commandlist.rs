use std::io::IsTerminal;

use clap::Parser;
use cli_table::ColorChoice;

use sbatch_commandlist::client::submit::command_submit;
use sbatch_commandlist::common::cli::{ColorPolicy, RootOptions, normalize_legacy_args};
use sbatch_commandlist::common::setup::setup_logging;

#[tokio::main(flavor = "current_thread")]
async fn main() -> sbatch_commandlist::Result<()> {
    let args = normalize_legacy_args(std::env::args());
    let opts = RootOptions::parse_from(args);

    setup_logging(opts.common.debug);

    let color_policy = match opts.common.colors {
        ColorPolicy::Always => ColorChoice::AlwaysAnsi,
        ColorPolicy::Auto => {
            if std::io::stdout().is_terminal() {
                ColorChoice::Auto
            } else {
                ColorChoice::Never
            }
        }
        ColorPolicy::Never => ColorChoice::Never,
    };
    match color_policy {
        ColorChoice::Always | ColorChoice::AlwaysAnsi => colored::control::set_override(true),
        ColorChoice::Never => colored::control::set_override(false),
        _ => {}
    }

    if let Err(error) = command_submit(opts.submit, color_policy).await {
        eprintln!("{error:?}");
        std::process::exit(1);
    }

    Ok(())
}
