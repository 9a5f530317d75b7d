//! Command dispatch. Each command opens the board, syncs once so the replica
//! is complete, acts, syncs again and prints the resulting view.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use poast_sync::mutate::{MutationOutcome, MutationReceipt};
use poast_sync::sync::SyncResult;

use crate::actions::{self, Guarded};
use crate::board::Board;
use crate::cli::{Command, WatchAction};
use crate::config::PoastConfig;
use crate::error::Result;
use crate::feed::{self, FeedFilter};
use crate::login::Session;

fn session(config: &PoastConfig) -> Result<Session> {
    match &config.jwt {
        Some(token) => Ok(Session::with_token(&config.token_file, Some(token.clone()))),
        None => Session::load(&config.token_file),
    }
}

pub async fn run(command: Command, config: &PoastConfig, out: &mut impl Write) -> Result<()> {
    let mut session = session(config)?;

    match command {
        Command::Login => {
            let http = reqwest::Client::new();
            session.login(&http, &config.server).await?;
            writeln!(out, "Logged in as {}", session.user_id())?;
            return Ok(());
        }
        Command::Logout => {
            session.logout()?;
            writeln!(out, "Logged out")?;
            return Ok(());
        }
        _ => {}
    }

    let board = Board::open(&session, config.kv_store.clone(), Some(config.server.clone()))?;
    board.sync().await;
    let mut rng = rand::rng();

    match command {
        Command::Feed { from, contains } => {
            let from = from.map(|f| board.resolve_sender(&f)).transpose()?;
            print_view(out, board.render_feed(&FeedFilter { from, contains })?)?;
        }
        Command::Threads => print_view(out, board.render_threads()?)?,
        Command::Add { count } => {
            let (users, mediums) = (board.users()?, board.mediums()?);
            let mut receipts = Vec::new();
            for _ in 0..count {
                receipts.extend(actions::add_random_thread(board.client(), &mut rng, &users, &mediums)?);
            }
            finish(out, &board, receipts).await?;
        }
        Command::Remove { count, force } => {
            let mut receipts = Vec::new();
            for _ in 0..count {
                let messages = board.messages()?;
                match actions::remove_random_message(board.client(), &mut rng, &messages, force)? {
                    Guarded::Warned(warning) => {
                        writeln!(out, "{warning}")?;
                        break;
                    }
                    Guarded::Done(Some(receipt)) => receipts.push(receipt),
                    Guarded::Done(None) => break,
                }
            }
            finish(out, &board, receipts).await?;
        }
        Command::Resize { size } => {
            let receipts = actions::resize(
                board.client(),
                &mut rng,
                &board.posts()?,
                usize::from(size),
                &board.users()?,
                &board.mediums()?,
            )?;
            finish(out, &board, receipts).await?;
        }
        Command::Edit { id, body, force } => {
            let message = board.message(&id)?;
            match actions::edit_message(board.client(), &message, &body, force)? {
                Guarded::Warned(warning) => writeln!(out, "{warning}")?,
                Guarded::Done(receipt) => finish(out, &board, vec![receipt]).await?,
            }
        }
        Command::Whoami => {
            let name = board.display_name()?;
            if board.client().is_anonymous() {
                writeln!(out, "Not logged in")?;
            } else {
                writeln!(out, "Logged in as {name}")?;
            }
        }
        Command::Watch {
            action,
            ticks,
            every_ms,
            force,
        } => watch(out, &board, config, action, ticks, every_ms, force).await?,
        Command::Login | Command::Logout => {}
    }
    Ok(())
}

fn print_view(out: &mut impl Write, view: Option<String>) -> Result<()> {
    if let Some(text) = view {
        write!(out, "{text}")?;
    }
    Ok(())
}

/// Sync, report rejections, then show the feed.
async fn finish(out: &mut impl Write, board: &Board, receipts: Vec<MutationReceipt>) -> Result<()> {
    let result: SyncResult = board.sync().await;
    for mut receipt in receipts {
        if let Some(MutationOutcome::Rejected { reason }) = receipt.try_outcome() {
            writeln!(out, "rejected: {reason}")?;
        }
    }
    if !result.is_ok() && result.rejected == 0 {
        writeln!(out, "sync incomplete; {} error(s)", result.errors.len())?;
    }
    print_view(out, board.render_feed(&FeedFilter::default())?)
}

/// Repeat `action` every `every_ms` while background sync runs, printing the
/// summary line each time the message count changes.
async fn watch(
    out: &mut impl Write,
    board: &Board,
    config: &PoastConfig,
    action: WatchAction,
    ticks: u32,
    every_ms: u64,
    force: bool,
) -> Result<()> {
    let lines: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&lines);
    let _subscription = board.client().observe(
        feed::all_messages_query(board.client().query()),
        move |snapshot| {
            let mut lines = sink.lock();
            let line = feed::summary_line(snapshot.len(), snapshot.len(), false);
            if lines.last() != Some(&line) {
                lines.push(line);
            }
        },
    )?;

    let handle = board.client().spawn_sync(config.sync_interval);
    let (users, mediums) = (board.users()?, board.mediums()?);
    let mut rng = rand::rng();
    let mut interval = tokio::time::interval(Duration::from_millis(every_ms.max(1)));

    for _ in 0..ticks {
        interval.tick().await;
        let keep_going = match action {
            WatchAction::Add => {
                !actions::add_random_thread(board.client(), &mut rng, &users, &mediums)?.is_empty()
            }
            WatchAction::Remove => {
                let messages = board.messages()?;
                match actions::remove_random_message(board.client(), &mut rng, &messages, force)? {
                    Guarded::Warned(warning) => {
                        writeln!(out, "{warning}")?;
                        false
                    }
                    Guarded::Done(receipt) => receipt.is_some(),
                }
            }
        };
        for line in lines.lock().drain(..) {
            writeln!(out, "{line}")?;
        }
        if !keep_going {
            break;
        }
    }

    handle.stop();
    board.sync().await;
    for line in lines.lock().drain(..) {
        writeln!(out, "{line}")?;
    }
    Ok(())
}
