use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tagflow", about = concat!("tagflow v", env!("CARGO_PKG_VERSION"), " - backlink lists by tag, kept in your notes"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Run against a different vault directory
    #[arg(short = 'C', long = "vault-dir", global = true)]
    pub vault_dir: Option<String>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Make the current directory a tagflow vault
    Init(InitArgs),
    /// List every tag used in the vault
    Tags,
    /// Show list declarations (all, or those hosted by one note)
    Lists(ListsArgs),
    /// Attach a new list to a note
    New(NewArgs),
    /// Remove a list from a note
    Delete(DeleteArgs),
    /// Bring the lists in the given notes up to date
    Sync(SyncArgs),
    /// Dump the tag index (note -> tags)
    Index,
    /// Watch the vault and keep the active note's lists current
    Watch(WatchArgs),
    /// View the recovery log
    Recovery(RecoveryArgs),
}

#[derive(Args)]
pub struct InitArgs {
    /// Overwrite an existing .tagflow/config.toml
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct ListsArgs {
    /// Only lists hosted by this note
    pub note: Option<String>,
}

#[derive(Args)]
pub struct NewArgs {
    /// Note that hosts the list
    pub note: String,
    /// Tag to list (picker when neither --tag nor --from-title is given)
    #[arg(long, conflicts_with = "from_title")]
    pub tag: Option<String>,
    /// Use the note's title as the tag
    #[arg(long)]
    pub from_title: bool,
    /// Insert before this 1-based line (default: end of note)
    #[arg(long)]
    pub line: Option<usize>,
}

#[derive(Args)]
pub struct DeleteArgs {
    /// Note that hosts the list
    pub note: String,
    /// Tag of the list (picker when omitted)
    #[arg(long, requires = "id")]
    pub tag: Option<String>,
    /// Id of the list
    #[arg(long, requires = "tag")]
    pub id: Option<i64>,
}

#[derive(Args)]
pub struct SyncArgs {
    /// Notes to sync (default: every note hosting a list)
    pub notes: Vec<String>,
}

#[derive(Args)]
pub struct WatchArgs {
    /// Keep this note active instead of following the last edited note
    #[arg(long)]
    pub note: Option<String>,
}

#[derive(Args)]
pub struct RecoveryArgs {
    /// Maximum number of entries to show (default: 10)
    #[arg(long)]
    pub limit: Option<usize>,
    /// Print the absolute path to the recovery log
    #[arg(long)]
    pub path: bool,
}
