use clap::{Parser, Subcommand, ValueEnum};
use poast_sync::storage::KvStore;

use crate::config::{LogFormat, PoastConfig};

#[derive(Parser)]
#[command(name = "poast")]
#[command(about = "A live message board on a synced local replica")]
pub struct Cli {
    /// Board server origin, used for login
    #[arg(long, global = true)]
    pub server: Option<String>,

    /// Replica storage: mem, idb or sqlite:<path>
    #[arg(long, global = true)]
    pub kv_store: Option<KvStore>,

    /// Bearer token to act with (overrides the stored session)
    #[arg(long, global = true)]
    pub jwt: Option<String>,

    /// Log output format
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormat>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Flags win over the environment.
    pub fn apply(&self, config: &mut PoastConfig) {
        if let Some(server) = &self.server {
            config.server = server.clone();
        }
        if let Some(kv_store) = &self.kv_store {
            config.kv_store = kv_store.clone();
        }
        if let Some(jwt) = &self.jwt {
            config.jwt = Some(jwt.clone());
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum WatchAction {
    #[default]
    Add,
    Remove,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show messages, newest first
    Feed {
        /// Only messages from this user (name or id)
        #[arg(long)]
        from: Option<String>,

        /// Only messages whose body contains this text
        #[arg(long)]
        contains: Option<String>,
    },

    /// Show top-level posts with their replies
    Threads,

    /// Post random threads
    Add {
        #[arg(default_value_t = 1)]
        count: usize,
    },

    /// Delete random messages
    Remove {
        #[arg(default_value_t = 1)]
        count: usize,

        /// Try even when not logged in
        #[arg(long)]
        force: bool,
    },

    /// Grow or shrink the board to SIZE top-level posts
    Resize {
        #[arg(value_parser = clap::value_parser!(u16).range(0..=50))]
        size: u16,
    },

    /// Replace a message's body
    Edit {
        id: String,
        body: String,

        /// Try even when not the sender
        #[arg(long)]
        force: bool,
    },

    /// Show the acting identity
    Whoami,

    /// Fetch a session token from the server
    Login,

    /// Forget the stored session token
    Logout,

    /// Repeat an action on a timer and stream the message count
    Watch {
        #[arg(long, value_enum, default_value_t = WatchAction::Add)]
        action: WatchAction,

        /// Number of repetitions
        #[arg(long, default_value_t = 30)]
        ticks: u32,

        /// Delay between repetitions
        #[arg(long, default_value_t = 16)]
        every_ms: u64,

        /// Remove even when not logged in
        #[arg(long)]
        force: bool,
    },
}
