//! Rotation state machine.
//!
//! Pure bookkeeping: it owns the authoritative [`Snapshot`], the
//! [`RotationState`] and the current connection identity, and tells the
//! scheduler which side effects a transition needs through [`Effects`]. It never
//! touches the backend, the store or the clock itself.

use rotator_core::{interval_in_range, Command, ListId, RotationCursor, RotationState, Snapshot};

/// Side effects the caller must carry out after a transition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Effects {
    /// Drop the backend connection.
    pub disconnect: bool,
    /// Write the snapshot through to the store.
    pub persist: bool,
    /// Emit a status report.
    pub report_status: bool,
    /// The cursor was moved by a command; a dwell in progress must not advance it.
    pub repositioned: bool,
}

impl Effects {
    fn persist() -> Self {
        Self {
            persist: true,
            ..Self::default()
        }
    }
}

/// The server picked for one connection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub list: ListId,
    pub position: usize,
    pub len: usize,
    pub server: String,
}

#[derive(Debug, Clone)]
pub struct RotationMachine {
    snapshot: Snapshot,
    state: RotationState,
    connection: Option<String>,
}

impl RotationMachine {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            snapshot,
            state: RotationState::Stopped,
            connection: None,
        }
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn state(&self) -> RotationState {
        self.state
    }

    pub fn connection(&self) -> Option<&str> {
        self.connection.as_deref()
    }

    pub fn cursor(&self) -> RotationCursor {
        self.snapshot.cursor()
    }

    pub fn is_stopped(&self) -> bool {
        self.state == RotationState::Stopped
    }

    /// Begin a run. A persisted `paused` flag is honoured, so the run starts in
    /// `Paused` when the previous one was paused.
    pub fn start(&mut self) -> Effects {
        if self.state != RotationState::Stopped {
            return Effects::default();
        }
        self.state = if self.snapshot.paused {
            RotationState::Paused
        } else {
            RotationState::Running
        };
        self.snapshot.running = true;
        Effects::persist()
    }

    /// Apply one command. `list_len` is the current length of the active list;
    /// only `Skip` reads it.
    pub fn apply(&mut self, command: Command, list_len: usize) -> Effects {
        match command {
            Command::Stop => {
                self.state = RotationState::Stopped;
                self.snapshot.running = false;
                self.connection = None;
                Effects {
                    disconnect: true,
                    persist: true,
                    ..Effects::default()
                }
            }
            Command::Pause => {
                if self.state != RotationState::Running {
                    return Effects::default();
                }
                self.state = RotationState::Paused;
                self.snapshot.paused = true;
                Effects::persist()
            }
            Command::Resume => {
                if self.state != RotationState::Paused {
                    return Effects::default();
                }
                self.state = RotationState::Running;
                self.snapshot.paused = false;
                Effects::persist()
            }
            Command::SwitchList(list) => {
                self.snapshot.active_list = list;
                self.snapshot.current_index = 0;
                Effects {
                    persist: true,
                    repositioned: true,
                    ..Effects::default()
                }
            }
            Command::SetInterval(minutes) => {
                if !interval_in_range(minutes) {
                    tracing::warn!(minutes, "ignoring out-of-range interval");
                    return Effects::default();
                }
                self.snapshot.switch_interval_minutes = minutes;
                Effects::persist()
            }
            Command::Skip => {
                if self.state != RotationState::Running {
                    return Effects::default();
                }
                self.snapshot.current_index = self.cursor().next_position(list_len);
                self.connection = None;
                Effects {
                    disconnect: true,
                    persist: true,
                    repositioned: true,
                    ..Effects::default()
                }
            }
            Command::Status => Effects {
                report_status: true,
                ..Effects::default()
            },
        }
    }

    /// End the run without a `stop` command (signal shutdown). The backend
    /// connection is left as it is.
    pub fn halt(&mut self) -> Effects {
        self.state = RotationState::Stopped;
        self.snapshot.running = false;
        Effects::persist()
    }

    /// Pick `servers[index mod len]`, or `None` for an empty list.
    pub fn select(&self, servers: &[String]) -> Option<Selection> {
        if servers.is_empty() {
            return None;
        }
        let position = self.cursor().position(servers.len());
        Some(Selection {
            list: self.snapshot.active_list,
            position,
            len: servers.len(),
            server: servers[position].clone(),
        })
    }

    pub fn record_connected(&mut self, identity: String) {
        self.connection = Some(identity);
    }

    pub fn clear_connection(&mut self) {
        self.connection = None;
    }

    /// Move past `selection`. Ignored if the active list changed since the
    /// selection was made.
    pub fn advance_past(&mut self, selection: &Selection) -> Effects {
        if self.snapshot.active_list != selection.list {
            return Effects::default();
        }
        self.snapshot.current_index = (selection.position + 1) % selection.len.max(1);
        Effects::persist()
    }

    /// A connection attempt on `selection` failed.
    pub fn record_failure(&mut self, selection: &Selection) -> Effects {
        self.connection = None;
        self.advance_past(selection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn servers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn running() -> RotationMachine {
        let mut machine = RotationMachine::new(Snapshot::default());
        machine.start();
        machine
    }

    fn paused() -> RotationMachine {
        let mut machine = running();
        machine.apply(Command::Pause, 3);
        machine
    }

    #[test]
    fn start_enters_running_and_persists() {
        let mut machine = RotationMachine::new(Snapshot::default());
        let effects = machine.start();
        assert_eq!(machine.state(), RotationState::Running);
        assert!(machine.snapshot().running);
        assert!(effects.persist);
    }

    #[test]
    fn start_honours_persisted_pause() {
        let mut machine = RotationMachine::new(Snapshot {
            paused: true,
            ..Snapshot::default()
        });
        machine.start();
        assert_eq!(machine.state(), RotationState::Paused);
    }

    #[rstest]
    #[case::from_running(running())]
    #[case::from_paused(paused())]
    #[case::from_stopped(RotationMachine::new(Snapshot::default()))]
    fn stop_disconnects_once_from_any_state(#[case] mut machine: RotationMachine) {
        machine.record_connected("US#1".to_string());
        let effects = machine.apply(Command::Stop, 3);
        assert_eq!(machine.state(), RotationState::Stopped);
        assert!(effects.disconnect);
        assert!(effects.persist);
        assert!(!machine.snapshot().running);
        assert_eq!(machine.connection(), None);
    }

    #[test]
    fn pause_keeps_connection_and_never_disconnects() {
        let mut machine = running();
        machine.record_connected("CA#5".to_string());
        let effects = machine.apply(Command::Pause, 3);
        assert_eq!(machine.state(), RotationState::Paused);
        assert!(!effects.disconnect);
        assert!(machine.snapshot().paused);
        assert_eq!(machine.connection(), Some("CA#5"));
    }

    #[test]
    fn pause_and_resume_are_idempotent() {
        let mut machine = paused();
        assert_eq!(machine.apply(Command::Pause, 3), Effects::default());
        assert_eq!(machine.state(), RotationState::Paused);

        assert!(machine.apply(Command::Resume, 3).persist);
        assert_eq!(machine.state(), RotationState::Running);
        assert!(!machine.snapshot().paused);
        assert_eq!(machine.apply(Command::Resume, 3), Effects::default());
    }

    #[rstest]
    #[case::running(running())]
    #[case::paused(paused())]
    fn switch_list_resets_index(#[case] mut machine: RotationMachine) {
        machine.apply(Command::Skip, 3);
        let before = machine.state();
        let effects = machine.apply(Command::SwitchList(ListId::B), 3);
        assert_eq!(machine.snapshot().active_list, ListId::B);
        assert_eq!(machine.snapshot().current_index, 0);
        assert_eq!(machine.state(), before);
        assert!(effects.persist && effects.repositioned);
        assert!(!effects.disconnect);
    }

    #[rstest]
    #[case(1, true)]
    #[case(15, true)]
    #[case(1440, true)]
    #[case(0, false)]
    #[case(1441, false)]
    #[case(5000, false)]
    fn set_interval_only_within_bounds(#[case] minutes: u32, #[case] accepted: bool) {
        let mut machine = running();
        let effects = machine.apply(Command::SetInterval(minutes), 3);
        assert_eq!(effects.persist, accepted);
        let expected = if accepted { minutes } else { 10 };
        assert_eq!(machine.snapshot().switch_interval_minutes, expected);
    }

    #[rstest]
    #[case(0, 3, 1)]
    #[case(1, 3, 2)]
    #[case(2, 3, 0)]
    #[case(7, 3, 2)]
    #[case(0, 1, 0)]
    #[case(4, 0, 0)]
    fn skip_advances_by_one_modulo_length(
        #[case] index: usize,
        #[case] len: usize,
        #[case] expected: usize,
    ) {
        let mut machine = RotationMachine::new(Snapshot {
            current_index: index,
            ..Snapshot::default()
        });
        machine.start();
        let effects = machine.apply(Command::Skip, len);
        assert_eq!(machine.snapshot().current_index, expected);
        assert!(effects.disconnect);
        assert!(machine.snapshot().current_index < len.max(1));
    }

    #[test]
    fn skip_is_ignored_unless_running() {
        let mut machine = paused();
        assert_eq!(machine.apply(Command::Skip, 3), Effects::default());
        assert_eq!(machine.snapshot().current_index, 0);
    }

    #[test]
    fn status_changes_nothing() {
        let mut machine = running();
        let before = machine.snapshot().clone();
        let effects = machine.apply(Command::Status, 3);
        assert!(effects.report_status);
        assert!(!effects.persist);
        assert_eq!(machine.snapshot(), &before);
    }

    #[test]
    fn select_reduces_stale_index() {
        let machine = RotationMachine::new(Snapshot {
            current_index: 5,
            ..Snapshot::default()
        });
        let selection = machine
            .select(&servers(&["US#1", "CA#5", "NL#1"]))
            .expect("selection");
        assert_eq!(selection.position, 2);
        assert_eq!(selection.server, "NL#1");
        assert!(machine.select(&[]).is_none());
    }

    #[test]
    fn failure_clears_identity_and_advances() {
        let mut machine = running();
        machine.record_connected("US#1".to_string());
        let selection = machine
            .select(&servers(&["US#1", "CA#5"]))
            .expect("selection");
        let effects = machine.record_failure(&selection);
        assert!(effects.persist);
        assert_eq!(machine.connection(), None);
        assert_eq!(machine.snapshot().current_index, 1);
    }

    #[test]
    fn advance_ignores_selection_from_previous_list() {
        let mut machine = running();
        let selection = machine
            .select(&servers(&["US#1", "CA#5"]))
            .expect("selection");
        machine.apply(Command::SwitchList(ListId::B), 2);
        assert_eq!(machine.advance_past(&selection), Effects::default());
        assert_eq!(machine.snapshot().current_index, 0);
    }

    #[test]
    fn index_stays_in_bounds_across_command_sequences() {
        let lens = [3usize, 1, 0, 5, 2];
        let commands = [
            Command::Skip,
            Command::Pause,
            Command::Skip,
            Command::Resume,
            Command::SwitchList(ListId::B),
            Command::Skip,
            Command::Skip,
            Command::SetInterval(0),
            Command::Skip,
        ];
        for &len in &lens {
            let mut machine = running();
            for command in commands {
                machine.apply(command, len);
                assert!(machine.cursor().position(len) < len.max(1));
                assert!(machine.snapshot().current_index < len.max(1));
            }
        }
    }
}
