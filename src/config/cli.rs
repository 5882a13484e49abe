use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Clone, Parser)]
#[command(name = "lcr-reports")]
#[command(about = "Download LCR quarterly reports and build attendance analytics")]
pub struct CliConfig {
    /// Path to the TOML profile
    #[arg(short, long, default_value = "profile.toml", global = true)]
    pub profile: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log as JSON lines instead of the compact format
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Download the quarterly history of every unit and write the table and chart data (default)
    Download {
        /// Override analytics.start_year for the charts
        #[arg(long)]
        start_year: Option<i32>,

        /// Override load.output_path
        #[arg(long)]
        output: Option<String>,

        /// Skip periods whose report cannot be fetched instead of aborting
        #[arg(long)]
        skip_failed: bool,

        /// Show what would be downloaded without logging in
        #[arg(long)]
        dry_run: bool,
    },

    /// Rebuild metrics and chart data from a downloaded CSV
    Analyze {
        /// CSV to analyze; defaults to the profile's output file
        input: Option<String>,

        /// Override analytics.start_year
        #[arg(long)]
        start_year: Option<i32>,
    },

    /// Fetch one portal endpoint and print its JSON
    Fetch {
        #[arg(value_enum)]
        endpoint: Endpoint,

        /// Month for the birthday list (defaults to the current month)
        #[arg(long)]
        month: Option<u32>,

        /// Number of months for the birthday list and move reports
        #[arg(long, default_value = "1")]
        months: u32,

        /// Ministering organization filter: EQ or RS
        #[arg(long)]
        organization: Option<String>,

        /// Unit number for the quarters and quarterly-report endpoints
        #[arg(long)]
        unit: Option<u32>,

        /// Period for the quarterly-report endpoint, e.g. 2024-Q1
        #[arg(long)]
        period: Option<String>,

        /// Member id for the photo endpoint
        #[arg(long)]
        member_id: Option<u64>,

        /// Where to save the photo
        #[arg(long, default_value = "photo.jpg")]
        out: String,
    },
}

impl Default for Command {
    fn default() -> Self {
        Command::Download {
            start_year: None,
            output: None,
            skip_failed: false,
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Endpoint {
    BirthdayList,
    MovedIn,
    MovedOut,
    MemberList,
    Callings,
    Ministering,
    AccessTable,
    RecommendStatus,
    Quarters,
    QuarterlyReport,
    Photo,
}
