use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "ihc-pipeline")]
#[command(about = "Customer journey attribution pipeline", long_about = None)]
pub struct Cli {
    /// Path to the SQLite database (overrides configuration)
    #[arg(long, global = true)]
    pub db: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Build journeys, score them, and export the channel report
    Run(RunArgs),
    /// Create any missing database tables
    InitDb,
    /// Print configuration values
    PrintConfig,
    /// Clear attribution and channel reporting tables
    TruncateDb,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Directory to save output files
    #[arg(long)]
    pub output: Option<String>,

    /// Start date in format YYYY-MM-DD
    #[arg(long)]
    pub start_date: Option<String>,

    /// End date in format YYYY-MM-DD
    #[arg(long)]
    pub end_date: Option<String>,

    /// Call the scoring service instead of the local heuristic
    #[arg(long)]
    pub prod: bool,

    /// API token for the scoring service
    #[arg(long, env = "IHC_API_TOKEN")]
    pub api_token: Option<String>,

    /// URL for the scoring service
    #[arg(long)]
    pub api_url: Option<String>,

    /// Maximum conversions per scoring request
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Conversion type identifier sent with each request
    #[arg(long)]
    pub conv_type_id: Option<String>,
}
