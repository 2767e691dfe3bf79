use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(version, about = "Timecard time-tracking client")]
pub struct Cli {
    /// Backend base URL, overriding config and TIMECARD_API_URL.
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Render attribute colors for a dark terminal.
    #[arg(long, global = true)]
    pub dark: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Sign in and remember the token pair.
    Login(CredentialArgs),
    /// Create an account.
    Register(CredentialArgs),
    /// Forget the session.
    Logout,
    /// Show session state and the remembered date window.
    Status,
    /// Time records in the current date window.
    #[command(subcommand)]
    Records(RecordCommands),
    /// Domain / category / title hierarchy.
    #[command(subcommand)]
    Attributes(AttributeCommands),
    /// Hours per domain and category for the current window.
    Report(ReportArgs),
    /// Issue-tracker integration.
    #[command(subcommand)]
    Jira(JiraCommands),
    /// Show or change ~/.timecard.json.
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[arg(long)]
    pub set_api_url: Option<String>,
    #[arg(long)]
    pub set_log_level: Option<String>,
    #[arg(long)]
    pub set_dark_mode: Option<bool>,
}

#[derive(Debug, Args)]
pub struct CredentialArgs {
    #[arg(long, short)]
    pub username: String,
    #[arg(long, short)]
    pub password: String,
}

#[derive(Debug, Args)]
pub struct WindowArgs {
    /// First day, YYYY-MM-DD.
    #[arg(long)]
    pub start: Option<String>,
    /// Last day, YYYY-MM-DD.
    #[arg(long)]
    pub end: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum RecordCommands {
    List {
        #[command(flatten)]
        window: WindowArgs,
        /// Refetch even when the window is already cached.
        #[arg(long)]
        force: bool,
    },
    Add {
        #[arg(long)]
        domain: i64,
        #[arg(long)]
        category: i64,
        #[arg(long)]
        title: i64,
        /// Clock-in, YYYY-MM-DDTHH:MM[:SS] local or RFC 3339. Defaults to now.
        #[arg(long)]
        time_in: Option<String>,
        /// Clock-out; omit to leave the record running.
        #[arg(long)]
        time_out: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        link: Option<String>,
        #[arg(long)]
        jira: Option<String>,
    },
    Edit {
        id: i64,
        #[arg(long)]
        time_in: Option<String>,
        #[arg(long)]
        time_out: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        link: Option<String>,
        #[arg(long)]
        jira: Option<String>,
    },
    /// Clock out the running record.
    Stop,
    Delete {
        id: i64,
    },
}

#[derive(Debug, Subcommand)]
pub enum AttributeCommands {
    List,
    /// Report attributes whose level does not match their parent.
    Check,
    /// Set an attribute's color (#rrggbb).
    Color {
        id: i64,
        color: String,
    },
}

#[derive(Debug, Args)]
pub struct ReportArgs {
    /// Count running records up to now.
    #[arg(long)]
    pub include_open: bool,
    /// Also print per-day totals.
    #[arg(long)]
    pub daily: bool,
}

#[derive(Debug, Subcommand)]
pub enum JiraCommands {
    Connections,
    Connect {
        #[arg(long)]
        url: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        token: String,
    },
    UpdateConnection {
        id: i64,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        token: Option<String>,
        #[arg(long)]
        active: Option<bool>,
    },
    Disconnect {
        id: i64,
    },
    Test {
        id: i64,
    },
    Search {
        query: String,
    },
    Issue {
        key: String,
    },
    Assigned,
    Sync {
        record_id: i64,
    },
    BulkSync {
        #[arg(required = true)]
        record_ids: Vec<i64>,
    },
    History {
        #[arg(long)]
        failed: bool,
        #[arg(long)]
        succeeded: bool,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long)]
        record: Option<i64>,
    },
    Unsync {
        record_id: i64,
    },
}
