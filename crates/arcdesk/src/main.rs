mod cli;
mod commands;
mod context;
mod frame_loop;
mod paths;
mod run;
mod sensor;

use anyhow::Result;

use crate::cli::Command;

fn main() -> Result<()> {
    let cli = cli::parse();
    match cli.command {
        Some(Command::Config(command)) => run::config_command(command.action, &cli.run),
        None => run::run(cli.run),
    }
}
