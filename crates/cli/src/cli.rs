//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use docsync_core::SyncRequest;

/// docsync - keep local mirrors of documentation sites and wikis
#[derive(Parser, Debug)]
#[command(name = "docsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Fetch, update or inspect the local copy of a documentation source
    ///
    /// Without flags the source is fetched only if no local copy exists.
    ///
    /// Examples:
    ///   docsync sync opencode             # Fetch if missing
    ///   docsync sync opencode --update    # Bring an existing copy up to date
    ///   docsync sync tmux --force         # Discard and re-download
    ///   docsync sync tmux --list          # Show what is stored
    Sync(SyncArgs),

    /// List configured documentation sources
    Sources {
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct SyncArgs {
    /// Source name, see `docsync sources`
    pub source: String,

    /// Update an existing copy from its remote
    #[arg(short, long)]
    pub update: bool,

    /// Re-download, replacing any existing copy
    #[arg(short, long)]
    pub force: bool,

    /// List stored documents
    #[arg(short, long)]
    pub list: bool,

    /// Print the store location and exit
    #[arg(short = 'p', long)]
    pub get_path: bool,

    /// Store directory, overriding the configured location
    #[arg(long, value_name = "DIR")]
    pub path: Option<PathBuf>,

    /// Output as JSON for scripting
    #[arg(long)]
    pub json: bool,
}

impl SyncArgs {
    pub fn request(&self) -> SyncRequest {
        SyncRequest::from_flags(self.update, self.force, self.list, self.get_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sync_args(args: &[&str]) -> SyncArgs {
        let cli = Cli::try_parse_from(["docsync", "sync"].iter().chain(args)).unwrap();
        match cli.command {
            Commands::Sync(args) => args,
            other => panic!("expected sync, got {other:?}"),
        }
    }

    #[test]
    fn test_sync_defaults_to_ensure() {
        let args = sync_args(&["opencode"]);
        assert_eq!(args.source, "opencode");
        assert_eq!(args.request(), SyncRequest::Ensure);
        assert_eq!(args.path, None);
        assert!(!args.json);
    }

    #[test]
    fn test_flag_precedence() {
        assert_eq!(sync_args(&["tmux", "--update", "--force"]).request(), SyncRequest::Force);
        assert_eq!(sync_args(&["tmux", "-u", "-l"]).request(), SyncRequest::Update);
        assert_eq!(sync_args(&["tmux", "--list", "--get-path"]).request(), SyncRequest::List);
        assert_eq!(sync_args(&["tmux", "-p"]).request(), SyncRequest::GetPath);
    }

    #[test]
    fn test_path_override() {
        let args = sync_args(&["tmux", "--path", "/tmp/wiki", "--json"]);
        assert_eq!(args.path, Some(PathBuf::from("/tmp/wiki")));
        assert!(args.json);
    }

    #[test]
    fn test_verbose_is_global() {
        let cli = Cli::try_parse_from(["docsync", "sources", "-v"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.command, Commands::Sources { json: false });
    }

    #[test]
    fn test_sync_requires_source() {
        assert!(Cli::try_parse_from(["docsync", "sync"]).is_err());
    }
}
