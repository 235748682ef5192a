use std::time::Duration;

use core_types::{DrawerState, DrawerTuning};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrawerEvent {
    Toggle,
    ChooseArchive,
    ChooseDelete,
    Cancel,
    Confirm,
    ExternalClose,
}

/// Which commit callback a confirm resolves to. The machine does not know
/// what either one means for the note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Commit {
    Archive,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DrawerError {
    #[error("drawer event {event:?} is not allowed in state {from:?}")]
    InvalidTransition {
        from: DrawerState,
        event: DrawerEvent,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerDirective {
    /// Replace any pending auto-dismiss with one that expires after `after`.
    Arm { generation: u64, after: Duration },
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: DrawerState,
    pub to: DrawerState,
    pub commit: Option<Commit>,
    pub timer: TimerDirective,
}

/// Per-card drawer state.
///
/// The auto-dismiss timer is re-armed on every transition that lands on an
/// open state and cancelled on every transition to `Closed`. Each directive
/// bumps the generation so an expiry from an older arming is ignored.
#[derive(Debug, Clone)]
pub struct DrawerStateMachine {
    state: DrawerState,
    auto_dismiss: Duration,
    generation: u64,
    armed: bool,
}

impl DrawerStateMachine {
    pub fn new(tuning: DrawerTuning) -> Self {
        Self {
            state: DrawerState::Closed,
            auto_dismiss: tuning.auto_dismiss(),
            generation: 0,
            armed: false,
        }
    }

    pub fn state(&self) -> DrawerState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == DrawerState::Closed
    }

    pub fn timer_armed(&self) -> bool {
        self.armed
    }

    pub fn apply(&mut self, event: DrawerEvent) -> Result<Transition, DrawerError> {
        use DrawerEvent as E;
        use DrawerState as S;

        let (to, commit) = match (self.state, event) {
            (_, E::ExternalClose) => (S::Closed, None),
            (S::Closed, E::Toggle) => (S::Menu, None),
            (S::Menu, E::Toggle) => (S::Closed, None),
            (S::Menu, E::ChooseArchive) => (S::ArchiveConfirm, None),
            (S::Menu, E::ChooseDelete) => (S::DeleteConfirm, None),
            (S::ArchiveConfirm | S::DeleteConfirm, E::Cancel) => (S::Menu, None),
            (S::ArchiveConfirm, E::Confirm) => (S::Closed, Some(Commit::Archive)),
            (S::DeleteConfirm, E::Confirm) => (S::Closed, Some(Commit::Delete)),
            (from, event) => return Err(DrawerError::InvalidTransition { from, event }),
        };

        Ok(self.enter(to, commit))
    }

    /// Fires `ExternalClose` when `generation` belongs to the pending timer.
    pub fn expire(&mut self, generation: u64) -> Option<Transition> {
        if !self.armed || generation != self.generation {
            return None;
        }
        Some(self.enter(DrawerState::Closed, None))
    }

    fn enter(&mut self, to: DrawerState, commit: Option<Commit>) -> Transition {
        let from = self.state;
        self.state = to;
        self.generation += 1;
        self.armed = to.is_open();
        let timer = if self.armed {
            TimerDirective::Arm {
                generation: self.generation,
                after: self.auto_dismiss,
            }
        } else {
            TimerDirective::Cancel
        };
        Transition {
            from,
            to,
            commit,
            timer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_EVENTS: [DrawerEvent; 6] = [
        DrawerEvent::Toggle,
        DrawerEvent::ChooseArchive,
        DrawerEvent::ChooseDelete,
        DrawerEvent::Cancel,
        DrawerEvent::Confirm,
        DrawerEvent::ExternalClose,
    ];

    fn machine() -> DrawerStateMachine {
        DrawerStateMachine::new(DrawerTuning::default())
    }

    fn armed_generation(transition: &Transition) -> u64 {
        match transition.timer {
            TimerDirective::Arm { generation, .. } => generation,
            TimerDirective::Cancel => panic!("expected armed timer"),
        }
    }

    #[test]
    fn toggle_pair_returns_to_closed_without_commit() {
        let mut drawer = machine();
        let open = drawer.apply(DrawerEvent::Toggle).expect("open");
        assert_eq!(open.to, DrawerState::Menu);
        let close = drawer.apply(DrawerEvent::Toggle).expect("close");
        assert_eq!(close.to, DrawerState::Closed);
        assert_eq!(open.commit, None);
        assert_eq!(close.commit, None);
        assert_eq!(close.timer, TimerDirective::Cancel);
    }

    #[test]
    fn confirm_states_only_reachable_from_menu() {
        let mut drawer = machine();
        assert!(drawer.apply(DrawerEvent::ChooseArchive).is_err());
        assert!(drawer.apply(DrawerEvent::ChooseDelete).is_err());
        assert_eq!(drawer.state(), DrawerState::Closed);

        drawer.apply(DrawerEvent::Toggle).expect("menu");
        drawer.apply(DrawerEvent::ChooseDelete).expect("delete confirm");
        assert_eq!(drawer.state(), DrawerState::DeleteConfirm);
    }

    #[test]
    fn toggle_is_rejected_in_confirm_states() {
        let mut drawer = machine();
        drawer.apply(DrawerEvent::Toggle).expect("menu");
        drawer.apply(DrawerEvent::ChooseArchive).expect("archive confirm");
        let err = drawer.apply(DrawerEvent::Toggle).expect_err("toggle blocked");
        assert_eq!(
            err,
            DrawerError::InvalidTransition {
                from: DrawerState::ArchiveConfirm,
                event: DrawerEvent::Toggle,
            }
        );
        assert_eq!(drawer.state(), DrawerState::ArchiveConfirm);
    }

    #[test]
    fn confirm_closes_and_emits_matching_commit() {
        let mut drawer = machine();
        drawer.apply(DrawerEvent::Toggle).expect("menu");
        drawer.apply(DrawerEvent::ChooseArchive).expect("confirm state");
        let done = drawer.apply(DrawerEvent::Confirm).expect("confirm");
        assert_eq!(done.to, DrawerState::Closed);
        assert_eq!(done.commit, Some(Commit::Archive));

        drawer.apply(DrawerEvent::Toggle).expect("menu");
        drawer.apply(DrawerEvent::ChooseDelete).expect("confirm state");
        let cancelled = drawer.apply(DrawerEvent::Cancel).expect("cancel");
        assert_eq!(cancelled.to, DrawerState::Menu);
        drawer.apply(DrawerEvent::ChooseDelete).expect("confirm state");
        let done = drawer.apply(DrawerEvent::Confirm).expect("confirm");
        assert_eq!(done.commit, Some(Commit::Delete));
    }

    #[test]
    fn external_close_works_from_every_state() {
        for path in [
            &[][..],
            &[DrawerEvent::Toggle][..],
            &[DrawerEvent::Toggle, DrawerEvent::ChooseArchive][..],
            &[DrawerEvent::Toggle, DrawerEvent::ChooseDelete][..],
        ] {
            let mut drawer = machine();
            for event in path {
                drawer.apply(*event).expect("setup");
            }
            let closed = drawer.apply(DrawerEvent::ExternalClose).expect("close");
            assert_eq!(closed.to, DrawerState::Closed);
            assert_eq!(closed.commit, None);
            assert!(!drawer.timer_armed());
        }
    }

    #[test]
    fn exhaustive_event_sequences_keep_invariants() {
        // Breadth-first over every sequence of up to five events.
        let mut frontier = vec![machine()];
        for _ in 0..5 {
            let mut next = Vec::new();
            for drawer in &frontier {
                for event in ALL_EVENTS {
                    let mut candidate = drawer.clone();
                    let before = candidate.state();
                    match candidate.apply(event) {
                        Ok(transition) => {
                            assert_eq!(transition.from, before);
                            if transition.to.is_confirm() {
                                assert_eq!(before, DrawerState::Menu);
                            }
                            assert_eq!(candidate.timer_armed(), transition.to.is_open());
                            next.push(candidate);
                        }
                        Err(_) => assert_eq!(candidate.state(), before),
                    }
                }
            }
            frontier = next;
        }
    }

    #[test]
    fn stale_expiry_is_ignored() {
        let mut drawer = machine();
        let opened = drawer.apply(DrawerEvent::Toggle).expect("menu");
        let first = armed_generation(&opened);
        let moved = drawer.apply(DrawerEvent::ChooseArchive).expect("confirm");
        let second = armed_generation(&moved);

        assert!(drawer.expire(first).is_none());
        assert_eq!(drawer.state(), DrawerState::ArchiveConfirm);

        let expired = drawer.expire(second).expect("current timer fires");
        assert_eq!(expired.to, DrawerState::Closed);
        assert_eq!(expired.commit, None);
        assert!(drawer.expire(second).is_none());
    }
}
