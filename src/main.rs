use anyhow::Result;
use clap::Parser;
use fieldrec::cli::{
    handle_photos_command, handle_play_command, handle_record_command, handle_sessions_command,
    handle_show_command, Cli, CliCommand,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = if cli.verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match cli.command {
        CliCommand::Version => {
            println!("fieldrec {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        CliCommand::Record(args) => handle_record_command(args).await,
        CliCommand::Sessions(args) => handle_sessions_command(args).await,
        CliCommand::Show(args) => handle_show_command(args).await,
        CliCommand::Play(args) => handle_play_command(args).await,
        CliCommand::Photos(args) => handle_photos_command(args).await,
    }
}
