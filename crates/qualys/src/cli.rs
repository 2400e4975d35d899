//! Clap derive structures for the `qualys` CLI.
//!
//! Defines the command tree, global flags, and shared value enums. Kept
//! free of workspace crates so `build.rs` can include it for man pages.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// qualys -- call any Qualys API endpoint from the command line
#[derive(Debug, Parser)]
#[command(
    name = "qualys",
    version,
    about = "Call Qualys platform APIs from the command line",
    long_about = "A thin client over the Qualys endpoint registry.\n\n\
        Every registered (module, endpoint) pair can be called directly;\n\
        rate limits, token refresh and pagination are handled for you.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Configuration profile to use
    #[arg(long, short = 'p', env = "QUALYS_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Shared platform code, e.g. qg1, eu2 (overrides profile)
    #[arg(long, env = "QUALYS_PLATFORM", global = true)]
    pub platform: Option<String>,

    /// Base URL for every request, for private platforms and proxies
    /// (overrides --platform)
    #[arg(long, env = "QUALYS_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Account username (overrides profile)
    #[arg(long, short = 'u', env = "QUALYS_USERNAME", global = true)]
    pub username: Option<String>,

    /// Authentication flavor (overrides profile)
    #[arg(long, value_enum, global = true)]
    pub auth: Option<AuthArg>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "QUALYS_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output, including rate-limit and paging notices
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept invalid TLS certificates
    #[arg(long, short = 'k', env = "QUALYS_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "QUALYS_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Value Enums ──────────────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Raw body, or one identifier per line
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AuthArg {
    /// HTTP Basic on every request
    Basic,
    /// Gateway bearer token
    Bearer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MethodArg {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List registered endpoints
    #[command(alias = "ls")]
    Endpoints(EndpointsArgs),

    /// Call one endpoint
    Call(CallArgs),

    /// Check basic credentials and show the rate-limit budget
    About,

    /// Issue a gateway bearer token
    Token(TokenArgs),

    /// Inspect CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Endpoints ────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct EndpointsArgs {
    /// Only list endpoints of this module
    #[arg(long, short = 'm')]
    pub module: Option<String>,
}

// ── Call ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CallArgs {
    /// Module name, e.g. vmdr
    pub module: String,

    /// Endpoint name, e.g. get_host_list
    pub endpoint: String,

    /// Query parameter (repeatable)
    #[arg(long = "param", short = 'P', value_name = "KEY=VALUE")]
    pub params: Vec<String>,

    /// Body field (repeatable)
    #[arg(long = "body", short = 'B', value_name = "KEY=VALUE")]
    pub body: Vec<String>,

    /// Path placeholder value (repeatable)
    #[arg(long = "path", value_name = "KEY=VALUE")]
    pub path: Vec<String>,

    /// Send this file as the raw XML request body
    #[arg(long, conflicts_with = "json")]
    pub xml_file: Option<PathBuf>,

    /// Send this JSON document as the request body
    #[arg(long)]
    pub json: Option<String>,

    /// HTTP method override
    #[arg(long, short = 'X', value_enum)]
    pub method: Option<MethodArg>,

    /// Give up if a rate-limit wait would run past this many seconds
    #[arg(long)]
    pub deadline: Option<u64>,

    /// Follow pagination and print the collected records
    #[arg(long, requires = "records")]
    pub all: bool,

    /// Where the records are: a JSON pointer for JSON endpoints
    /// (`/data`), a slash path for XML endpoints
    /// (`HOST_LIST_OUTPUT/RESPONSE/HOST_LIST/HOST`)
    #[arg(long)]
    pub records: Option<String>,

    /// Record field holding the id, for last-id paging (`/assetId` or `ID`)
    #[arg(long)]
    pub id_field: Option<String>,

    /// Stop after this many pages
    #[arg(long)]
    pub max_pages: Option<u32>,

    /// Page size to request
    #[arg(long)]
    pub page_size: Option<u32>,
}

// ── Token ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct TokenArgs {
    /// Print the token itself
    #[arg(long)]
    pub show: bool,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the loaded configuration (passwords masked)
    Show,

    /// Print the config file path
    Path,

    /// Store a profile's password in the system keyring (read from stdin)
    SetPassword,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
