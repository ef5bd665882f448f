//! Server list editing: `list`, `search`, `add`, `remove`, `replace`.
//!
//! Edits go straight to the list files; a running daemon picks them up on its
//! next connect.

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use colored::Colorize;

use rotator_core::{JsonFileStore, ListFiles, ListId};

use super::home;

#[derive(Subcommand, Debug)]
pub enum ListCommand {
    /// Print a server list, numbered.
    List {
        /// A or B.
        list: ListId,
    },

    /// Case-insensitive substring search within a list.
    Search {
        /// A or B.
        list: ListId,
        pattern: String,
    },

    /// Append a server to a list.
    Add {
        /// A or B.
        list: ListId,
        server: String,
    },

    /// Remove the first matching server from a list.
    Remove {
        /// A or B.
        list: ListId,
        server: String,
    },

    /// Replace text throughout a list file.
    Replace {
        /// A or B.
        list: ListId,
        #[arg(allow_hyphen_values = true)]
        find: String,
        #[arg(allow_hyphen_values = true)]
        replace: String,
    },
}

pub fn run(command: ListCommand) -> Result<()> {
    let home = home()?;
    let files = ListFiles::at(&home);
    match command {
        ListCommand::List { list } => print_list(&home, &files, list),
        ListCommand::Search { list, pattern } => search(&files, list, &pattern),
        ListCommand::Add { list, server } => add(&files, list, &server),
        ListCommand::Remove { list, server } => remove(&files, list, &server),
        ListCommand::Replace {
            list,
            find,
            replace,
        } => replace_text(&files, list, &find, &replace),
    }
}

fn read(files: &ListFiles, list: ListId) -> Result<Vec<String>> {
    files
        .read(list)
        .with_context(|| format!("failed to read list {list}"))
}

fn print_list(home: &Path, files: &ListFiles, list: ListId) -> Result<()> {
    let servers = read(files, list)?;
    if servers.is_empty() {
        println!("List {list} is empty.");
        println!("Run: pvpn-rotator add {list} <server>");
        return Ok(());
    }

    // Mark the next server when this is the active list.
    let next = next_position(home, list, servers.len());
    println!("List {list} ({} servers):", servers.len());
    for (i, server) in servers.iter().enumerate() {
        let marker = if next == Some(i) { "▶" } else { " " };
        println!("{} {:>3}. {server}", marker.green().bold(), i + 1);
    }
    Ok(())
}

fn next_position(home: &Path, list: ListId, len: usize) -> Option<usize> {
    let snapshot = JsonFileStore::at(home).read().ok().flatten()?;
    (snapshot.active_list == list).then(|| snapshot.cursor().position(len))
}

fn search(files: &ListFiles, list: ListId, pattern: &str) -> Result<()> {
    let matches = files
        .search(list, pattern)
        .with_context(|| format!("failed to search list {list}"))?;
    if matches.is_empty() {
        println!("No servers in list {list} match '{pattern}'.");
        return Ok(());
    }
    for server in matches {
        println!("{server}");
    }
    Ok(())
}

fn add(files: &ListFiles, list: ListId, server: &str) -> Result<()> {
    if server.trim().is_empty() {
        bail!("server name must not be empty");
    }
    files
        .add(list, server)
        .with_context(|| format!("failed to add '{server}' to list {list}"))?;
    println!("{} Added '{}' to list {list}", "✓".green(), server.trim());
    Ok(())
}

fn remove(files: &ListFiles, list: ListId, server: &str) -> Result<()> {
    let removed = files
        .remove(list, server)
        .with_context(|| format!("failed to remove '{server}' from list {list}"))?;
    if removed {
        println!("{} Removed '{}' from list {list}", "✓".green(), server.trim());
    } else {
        println!("'{}' not found in list {list}", server.trim());
    }
    Ok(())
}

fn replace_text(files: &ListFiles, list: ListId, find: &str, replace: &str) -> Result<()> {
    let changed = files
        .replace(list, find, replace)
        .with_context(|| format!("failed to update list {list}"))?;
    if changed {
        println!("{} Replaced '{find}' with '{replace}' in list {list}", "✓".green());
    } else {
        println!("No occurrences of '{find}' in list {list}");
    }
    Ok(())
}
