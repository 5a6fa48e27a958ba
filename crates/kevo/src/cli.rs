//! Clap derive structures for the `kevo` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// kevo -- lock, unlock, and watch Kevo smart locks
#[derive(Debug, Parser)]
#[command(
    name = "kevo",
    version,
    about = "Control Kevo smart locks from the command line",
    long_about = "Talks to the Kevo web portal on your behalf: logs in with your \
        account credentials,\nsends lock/unlock commands, and streams bolt-state \
        changes from the push channel.",
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
    /// Account profile to use
    #[arg(long, short = 'p', env = "KEVO_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Portal username (overrides profile)
    #[arg(long, short = 'u', env = "KEVO_USERNAME", global = true)]
    pub username: Option<String>,

    /// Portal base URL (overrides profile)
    #[arg(long, env = "KEVO_BASE_URL", global = true)]
    pub base_url: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "KEVO_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept invalid TLS certificates
    #[arg(long, short = 'k', env = "KEVO_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "KEVO_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show a lock's current state
    #[command(alias = "status")]
    Show(LockArgs),

    /// Lock the bolt
    Lock(LockArgs),

    /// Unlock the bolt
    Unlock(LockArgs),

    /// Stream bolt-state changes from the push channel
    Watch(WatchArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Lock commands ────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct LockArgs {
    /// Lock ID (defaults to the profile's lock_id)
    pub lock_id: Option<String>,
}

// ── Watch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Reconnect with backoff after abnormal closures
    #[arg(long)]
    pub reconnect: bool,

    /// Exit after this many messages
    #[arg(long, short = 'n')]
    pub count: Option<usize>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file path
    Path,

    /// Show the resolved configuration (passwords redacted)
    Show,

    /// Create or replace a profile
    Init(ConfigInitArgs),
}

#[derive(Debug, Args)]
pub struct ConfigInitArgs {
    /// Profile name
    #[arg(long, default_value = "default")]
    pub name: String,

    /// Portal username (email address)
    #[arg(long)]
    pub user: String,

    /// Environment variable holding the password
    #[arg(long)]
    pub password_env: Option<String>,

    /// Default lock ID for show/lock/unlock
    #[arg(long)]
    pub lock_id: Option<String>,

    /// Portal base URL override
    #[arg(long)]
    pub url: Option<String>,

    /// Make this the default profile
    #[arg(long)]
    pub set_default: bool,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
