//! Domain types shared by the daemon and the control CLI.
//!
//! The persisted [`Snapshot`] keeps the JSON field names the rotator has always
//! written (`active_list`, `switch_interval_minutes`, ...), so older config files
//! keep loading.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

pub const MIN_INTERVAL_MINUTES: u32 = 1;
pub const MAX_INTERVAL_MINUTES: u32 = 1440;
pub const DEFAULT_INTERVAL_MINUTES: u32 = 10;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// One of the two server lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ListId {
    #[default]
    A,
    B,
}

impl ListId {
    pub fn as_str(self) -> &'static str {
        match self {
            ListId::A => "A",
            ListId::B => "B",
        }
    }
}

impl fmt::Display for ListId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ListId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(ListId::A),
            "B" => Ok(ListId::B),
            _ => Err(CoreError::UnknownList(s.to_string())),
        }
    }
}

/// Lifecycle of one daemon run. Exactly one holds at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RotationState {
    #[default]
    Stopped,
    Running,
    Paused,
}

impl fmt::Display for RotationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RotationState::Stopped => write!(f, "STOPPED"),
            RotationState::Running => write!(f, "RUNNING"),
            RotationState::Paused => write!(f, "PAUSED"),
        }
    }
}

/// A control message carried over the command channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Stop,
    Pause,
    Resume,
    SwitchList(ListId),
    SetInterval(u32),
    Skip,
    Status,
}

impl Command {
    /// Parse one wire line: `<action>[ <arg>...]`.
    ///
    /// The action is case-insensitive and surplus arguments are ignored.
    /// Unknown actions, missing arguments and malformed arguments yield `None`.
    /// Range checks on the interval are left to the state machine.
    pub fn parse(line: &str) -> Option<Command> {
        let mut parts = line.split_whitespace();
        let action = parts.next()?.to_ascii_lowercase();
        match action.as_str() {
            "stop" => Some(Command::Stop),
            "pause" => Some(Command::Pause),
            "resume" => Some(Command::Resume),
            "skip" => Some(Command::Skip),
            "status" => Some(Command::Status),
            "switch" => parts.next()?.parse().ok().map(Command::SwitchList),
            "interval" => parts.next()?.parse().ok().map(Command::SetInterval),
            _ => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Stop => write!(f, "stop"),
            Command::Pause => write!(f, "pause"),
            Command::Resume => write!(f, "resume"),
            Command::SwitchList(list) => write!(f, "switch {list}"),
            Command::SetInterval(minutes) => write!(f, "interval {minutes}"),
            Command::Skip => write!(f, "skip"),
            Command::Status => write!(f, "status"),
        }
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// The (list, index) pair naming the next server to connect to.
///
/// `index` may be stale relative to the list on disk; always go through
/// [`RotationCursor::position`] to read it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationCursor {
    pub list: ListId,
    pub index: usize,
}

impl RotationCursor {
    /// Index reduced into `0..max(1, len)`.
    pub fn position(&self, len: usize) -> usize {
        self.index % len.max(1)
    }

    /// Position following the current one, wrapping at `len`.
    pub fn next_position(&self, len: usize) -> usize {
        (self.position(len) + 1) % len.max(1)
    }
}

/// Persisted daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub active_list: ListId,
    pub switch_interval_minutes: u32,
    pub current_index: usize,
    pub running: bool,
    pub paused: bool,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            active_list: ListId::A,
            switch_interval_minutes: DEFAULT_INTERVAL_MINUTES,
            current_index: 0,
            running: false,
            paused: false,
        }
    }
}

impl Snapshot {
    pub fn cursor(&self) -> RotationCursor {
        RotationCursor {
            list: self.active_list,
            index: self.current_index,
        }
    }

    /// Returns a description of the first violated invariant, if any.
    pub fn violation(&self) -> Option<String> {
        if !interval_in_range(self.switch_interval_minutes) {
            return Some(format!(
                "switch_interval_minutes {} outside {MIN_INTERVAL_MINUTES}..={MAX_INTERVAL_MINUTES}",
                self.switch_interval_minutes
            ));
        }
        None
    }
}

pub fn interval_in_range(minutes: u32) -> bool {
    (MIN_INTERVAL_MINUTES..=MAX_INTERVAL_MINUTES).contains(&minutes)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
