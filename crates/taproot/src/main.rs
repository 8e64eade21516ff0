mod cli;
mod commands;
mod format;

use clap::Parser;

use cli::{Cli, Command, ProbesSubcommand};
use commands::Context;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let env_filter = tracing_subscriber::EnvFilter::try_new(&cli.log_level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let ctx = Context::from_cli(&cli);

    match &cli.command {
        Command::Prepare => commands::rotate::prepare(&ctx),
        Command::Advance { to } => commands::rotate::advance(&ctx, to),
        Command::Status => commands::rotate::status(&ctx),
        Command::Rollback => commands::rotate::rollback_cmd(&ctx),
        Command::Run => commands::rotate::run_all(&ctx),
        Command::Probes(probes_cmd) => match &probes_cmd.command {
            ProbesSubcommand::Start => commands::probes::start(&ctx),
            ProbesSubcommand::Status => commands::probes::status(&ctx),
            ProbesSubcommand::ResetLog => commands::probes::reset_log(&ctx),
            ProbesSubcommand::Verify { label } => commands::probes::verify(&ctx, label),
            ProbesSubcommand::Stop => commands::probes::stop(&ctx),
        },
    }
}
