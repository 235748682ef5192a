//! Framework-independent interaction engine for a swipeable stack of note
//! cards: flip gestures, the per-card drawer, entry/removal lifecycle and the
//! list that owns one controller per note.

pub mod card;
pub mod drawer;
pub mod gesture;
pub mod list;

pub use card::{
    ArchivedCallback, CardCallbacks, CardLifecycleController, CardOptions, CardSnapshot,
    CommitOutcome, DeleteCallback,
};
pub use drawer::{Commit, DrawerError, DrawerEvent, DrawerStateMachine, TimerDirective, Transition};
pub use gesture::{DragUpdate, GestureRecognizer, Point, resting_rotation};
pub use list::{CardListController, ListCallbacks, NoteCallback, SyncReport};
