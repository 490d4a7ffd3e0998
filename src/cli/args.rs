use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "fieldrec")]
#[command(about = "Record field sessions: audio, photos and notes tied to a project", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Start an interactive recording session
    Record(RecordCliArgs),
    /// List stored sessions, newest first
    Sessions(SessionsCliArgs),
    /// Show one stored session in detail
    Show(ShowCliArgs),
    /// Play back the audio of a stored session
    Play(PlayCliArgs),
    /// Browse the photos of a stored session
    Photos(PhotosCliArgs),
    /// Print version information
    Version,
}

#[derive(ClapArgs, Debug)]
pub struct RecordCliArgs {
    /// Project the session belongs to
    #[arg(short, long)]
    pub project: String,
}

#[derive(ClapArgs, Debug)]
pub struct SessionsCliArgs {
    /// Maximum number of sessions to show
    #[arg(short, long, default_value = "20")]
    pub limit: usize,
}

#[derive(ClapArgs, Debug)]
pub struct ShowCliArgs {
    /// Session ID
    pub id: String,
    /// Print the session as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(ClapArgs, Debug)]
pub struct PlayCliArgs {
    /// Session ID
    pub id: String,
}

#[derive(ClapArgs, Debug)]
pub struct PhotosCliArgs {
    /// Session ID
    pub id: String,
    /// Open a single photo (0-based) instead of listing all
    #[arg(short, long)]
    pub index: Option<usize>,
}
