use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use core_types::{
    AnimatedProperty, Animator, CardTuning, DrawerState, Easing, MenuAction, NoteId, NoteStore,
};
use parking_lot::Mutex;
use rand::Rng;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::drawer::{Commit, DrawerEvent, DrawerStateMachine, TimerDirective, Transition};
use crate::gesture::{DragUpdate, GestureRecognizer, Point, resting_rotation};

pub type ArchivedCallback = Arc<dyn Fn() + Send + Sync>;
pub type DeleteCallback = Arc<dyn Fn(&NoteId) + Send + Sync>;

/// Optional listeners notified after a confirmed, successful mutation.
#[derive(Clone, Default)]
pub struct CardCallbacks {
    pub on_archived: Option<ArchivedCallback>,
    pub on_delete: Option<DeleteCallback>,
}

impl CardCallbacks {
    pub fn on_archived(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_archived = Some(Arc::new(callback));
        self
    }

    pub fn on_delete(mut self, callback: impl Fn(&NoteId) + Send + Sync + 'static) -> Self {
        self.on_delete = Some(Arc::new(callback));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CardOptions {
    /// The card is shown in the archive view, where delete is permanent.
    pub archive_mode: bool,
    pub skip_entry_animation: bool,
    pub card_width: f32,
    pub tuning: CardTuning,
}

impl Default for CardOptions {
    fn default() -> Self {
        Self {
            archive_mode: false,
            skip_entry_animation: false,
            card_width: 320.0,
            tuning: CardTuning::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Archived,
    Deleted,
    /// The store reported failure. The drawer is closed, no callback fired.
    Failed,
    /// Nothing was dispatched: no confirm state, a commit already in flight,
    /// or the card is leaving.
    Ignored,
}

/// What the presentation layer renders for one card.
#[derive(Debug, Clone, PartialEq)]
pub struct CardSnapshot {
    pub note_id: NoteId,
    pub drawer: DrawerState,
    pub menu_action: MenuAction,
    pub is_flipped: bool,
    pub rotation_deg: f32,
    pub is_removing: bool,
    pub is_animated_in: bool,
    pub commit_in_flight: bool,
}

#[derive(Debug, Clone, Copy)]
enum Mutation {
    Archive,
    PermanentDelete,
}

type AnimationRequest = (AnimatedProperty, f32, Duration, Easing);

struct CardState {
    drawer: DrawerStateMachine,
    gesture: GestureRecognizer,
    is_flipped: bool,
    rotation_deg: f32,
    is_removing: bool,
    is_animated_in: bool,
    commit_in_flight: bool,
    alive: bool,
    timer_task: Option<AbortHandle>,
    entry_task: Option<AbortHandle>,
}

impl CardState {
    fn stop_tasks(&mut self) {
        if let Some(task) = self.timer_task.take() {
            task.abort();
        }
        if let Some(task) = self.entry_task.take() {
            task.abort();
        }
    }
}

struct CardShared {
    note_id: NoteId,
    archive_mode: bool,
    tuning: CardTuning,
    skip_entry_animation: bool,
    store: Arc<dyn NoteStore>,
    animator: Arc<dyn Animator>,
    callbacks: CardCallbacks,
    runtime: Option<Handle>,
    state: Mutex<CardState>,
}

impl Drop for CardShared {
    fn drop(&mut self) {
        self.state.get_mut().stop_tasks();
    }
}

/// Ties gesture and drawer state for one note to the store and to the
/// entry/removal animations. Clones share the same card.
#[derive(Clone)]
pub struct CardLifecycleController {
    shared: Arc<CardShared>,
}

impl CardLifecycleController {
    pub fn new(
        note_id: NoteId,
        store: Arc<dyn NoteStore>,
        animator: Arc<dyn Animator>,
        callbacks: CardCallbacks,
        options: CardOptions,
    ) -> Self {
        let state = CardState {
            drawer: DrawerStateMachine::new(options.tuning.drawer),
            gesture: GestureRecognizer::new(options.tuning.gesture, options.card_width),
            is_flipped: false,
            rotation_deg: 0.0,
            is_removing: false,
            is_animated_in: false,
            commit_in_flight: false,
            alive: true,
            timer_task: None,
            entry_task: None,
        };
        Self {
            shared: Arc::new(CardShared {
                note_id,
                archive_mode: options.archive_mode,
                tuning: options.tuning,
                skip_entry_animation: options.skip_entry_animation,
                store,
                animator,
                callbacks,
                runtime: Handle::try_current().ok(),
                state: Mutex::new(state),
            }),
        }
    }

    pub fn note_id(&self) -> &NoteId {
        &self.shared.note_id
    }

    pub fn archive_mode(&self) -> bool {
        self.shared.archive_mode
    }

    pub fn menu_action(&self) -> MenuAction {
        MenuAction::for_mode(self.shared.archive_mode)
    }

    pub fn drawer_state(&self) -> DrawerState {
        self.shared.state.lock().drawer.state()
    }

    pub fn is_flipped(&self) -> bool {
        self.shared.state.lock().is_flipped
    }

    pub fn is_removing(&self) -> bool {
        self.shared.state.lock().is_removing
    }

    pub fn is_animated_in(&self) -> bool {
        self.shared.state.lock().is_animated_in
    }

    pub fn snapshot(&self) -> CardSnapshot {
        let state = self.shared.state.lock();
        CardSnapshot {
            note_id: self.shared.note_id.clone(),
            drawer: state.drawer.state(),
            menu_action: self.menu_action(),
            is_flipped: state.is_flipped,
            rotation_deg: state.rotation_deg,
            is_removing: state.is_removing,
            is_animated_in: state.is_animated_in,
            commit_in_flight: state.commit_in_flight,
        }
    }

    pub fn set_card_width(&self, card_width: f32) {
        self.shared.state.lock().gesture.set_card_width(card_width);
    }

    /// Starts the entry animation. Cards that enter together get a random
    /// stagger so they do not pop in at once.
    pub fn mount(&self) {
        let mut state = self.shared.state.lock();
        if !state.alive || state.is_animated_in || state.entry_task.is_some() {
            return;
        }

        let max_delay = self.shared.tuning.animation.entry_stagger_max_ms;
        if self.shared.skip_entry_animation || max_delay == 0 {
            state.is_animated_in = true;
            return;
        }

        let delay = Duration::from_millis(rand::thread_rng().gen_range(0..max_delay));
        let weak = Arc::downgrade(&self.shared);
        let task = self.shared.spawn_after(delay, move || {
            if let Some(shared) = weak.upgrade() {
                shared.finish_entry();
            }
        });
        match task {
            Some(task) => state.entry_task = Some(task),
            None => {
                warn!(note_id = %self.shared.note_id, "no async runtime; entry shown without stagger");
                state.is_animated_in = true;
            }
        }
    }

    pub fn on_touch_start(&self, position: Point, at: Instant) -> bool {
        let mut state = self.shared.state.lock();
        if !state.alive || state.is_removing || !state.drawer.is_closed() {
            return false;
        }
        state.gesture.start(position, at)
    }

    pub fn on_touch_move(&self, position: Point) -> DragUpdate {
        let update = {
            let mut state = self.shared.state.lock();
            if !state.drawer.is_closed() {
                state.gesture.cancel();
                return DragUpdate::Ignored;
            }
            let resting = resting_rotation(state.is_flipped);
            let update = state.gesture.update(position, resting);
            if let DragUpdate::Horizontal { rotation_deg, .. } = update {
                state.rotation_deg = rotation_deg;
            }
            update
        };

        if let DragUpdate::Horizontal { rotation_deg, .. } = update {
            self.shared.run_animations(vec![(
                AnimatedProperty::Rotation,
                rotation_deg,
                Duration::ZERO,
                Easing::Linear,
            )]);
        }
        update
    }

    /// Returns whether the released drag flipped the card.
    pub fn on_touch_end(&self, position: Point, at: Instant) -> bool {
        let (flipped, settle) = {
            let mut state = self.shared.state.lock();
            if !state.drawer.is_closed() {
                state.gesture.cancel();
                return false;
            }
            let was_tracking = state.gesture.is_active();
            let flipped = state.gesture.end(position, at);
            if flipped {
                state.is_flipped = !state.is_flipped;
            }
            let resting = resting_rotation(state.is_flipped);
            let settle = (flipped || (was_tracking && state.rotation_deg != resting))
                .then_some(resting);
            state.rotation_deg = resting;
            (flipped, settle)
        };

        if flipped {
            debug!(note_id = %self.shared.note_id, "card flipped by gesture");
        }
        if let Some(resting) = settle {
            self.shared.run_animations(vec![self.shared.flip_animation(resting)]);
        }
        flipped
    }

    /// Programmatic flip; suppressed while the drawer is open.
    pub fn toggle_flip(&self) -> bool {
        let resting = {
            let mut state = self.shared.state.lock();
            if !state.alive || state.is_removing || !state.drawer.is_closed() {
                return false;
            }
            state.gesture.cancel();
            state.is_flipped = !state.is_flipped;
            state.rotation_deg = resting_rotation(state.is_flipped);
            state.rotation_deg
        };
        self.shared.run_animations(vec![self.shared.flip_animation(resting)]);
        true
    }

    /// The control button. Ignored while a commit is in flight so an
    /// optimistic close cannot be reopened into a second confirm.
    pub fn toggle_drawer(&self) -> bool {
        self.shared.dispatch(DrawerEvent::Toggle)
    }

    pub fn request_archive(&self) -> bool {
        self.shared.dispatch(DrawerEvent::ChooseArchive)
    }

    pub fn request_delete(&self) -> bool {
        self.shared.dispatch(DrawerEvent::ChooseDelete)
    }

    /// Picks whichever destructive entry the current mode offers.
    pub fn request_menu_action(&self) -> bool {
        match self.menu_action() {
            MenuAction::Archive => self.request_archive(),
            MenuAction::Delete => self.request_delete(),
        }
    }

    pub fn cancel_confirm(&self) -> bool {
        self.shared.dispatch(DrawerEvent::Cancel)
    }

    pub fn close_drawer(&self) -> bool {
        self.shared.dispatch(DrawerEvent::ExternalClose)
    }

    /// Confirms the pending archive/delete. The drawer closes before the
    /// store is awaited; store failures come back as `Failed`, never as an
    /// error.
    pub async fn confirm(&self) -> CommitOutcome {
        let shared = &self.shared;
        let (commit, transition) = {
            let mut state = shared.state.lock();
            if !state.alive || state.is_removing || state.commit_in_flight {
                return CommitOutcome::Ignored;
            }
            let transition = match state.drawer.apply(DrawerEvent::Confirm) {
                Ok(transition) => transition,
                Err(err) => {
                    debug!(note_id = %shared.note_id, error = %err, "confirm ignored");
                    return CommitOutcome::Ignored;
                }
            };
            let Some(commit) = transition.commit else {
                return CommitOutcome::Ignored;
            };
            state.commit_in_flight = true;
            shared.schedule_timer(&mut state, transition.timer);
            (commit, transition)
        };
        shared.run_animations(shared.drawer_animations(&transition));

        let mutation = match commit {
            Commit::Archive => Mutation::Archive,
            Commit::Delete if shared.archive_mode => Mutation::PermanentDelete,
            // Outside the archive view "delete" is a soft delete.
            Commit::Delete => Mutation::Archive,
        };

        let result = match mutation {
            Mutation::Archive => shared.store.archive_note(&shared.note_id).await,
            Mutation::PermanentDelete => shared.store.delete_note(&shared.note_id).await,
        };
        let succeeded = match result {
            Ok(true) => true,
            Ok(false) => {
                warn!(note_id = %shared.note_id, ?mutation, "note store rejected mutation");
                false
            }
            Err(err) => {
                warn!(note_id = %shared.note_id, ?mutation, error = %err, "note store mutation failed");
                false
            }
        };

        let removal = {
            let mut state = shared.state.lock();
            state.commit_in_flight = false;
            if succeeded {
                state.is_removing = true;
                state.gesture.cancel();
            }
            succeeded && state.alive
        };

        if !succeeded {
            return CommitOutcome::Failed;
        }

        let outcome = match mutation {
            Mutation::Archive => {
                info!(note_id = %shared.note_id, "note archived");
                if let Some(callback) = &shared.callbacks.on_archived {
                    callback();
                }
                CommitOutcome::Archived
            }
            Mutation::PermanentDelete => {
                info!(note_id = %shared.note_id, "note deleted");
                if let Some(callback) = &shared.callbacks.on_delete {
                    callback(&shared.note_id);
                }
                CommitOutcome::Deleted
            }
        };

        if removal {
            let removal_ms = Duration::from_millis(shared.tuning.animation.removal_ms);
            shared.run_animations(vec![
                (AnimatedProperty::Opacity, 0.0, removal_ms, Easing::EaseInOutQuad),
                (AnimatedProperty::Scale, 0.95, removal_ms, Easing::EaseInOutQuad),
            ]);
        }
        outcome
    }

    /// Stops timers and pending entry work. Later timer expiries are no-ops.
    pub fn teardown(&self) {
        let mut state = self.shared.state.lock();
        state.alive = false;
        state.gesture.cancel();
        state.stop_tasks();
    }
}

impl CardShared {
    fn dispatch(self: &Arc<Self>, event: DrawerEvent) -> bool {
        let mut requests = Vec::new();
        let transition = {
            let mut state = self.state.lock();
            if !state.alive || state.is_removing || state.commit_in_flight {
                return false;
            }
            match state.drawer.apply(event) {
                Ok(transition) => {
                    self.schedule_timer(&mut state, transition.timer);
                    if transition.to.is_open() && state.gesture.is_active() {
                        state.gesture.cancel();
                        let resting = resting_rotation(state.is_flipped);
                        if state.rotation_deg != resting {
                            state.rotation_deg = resting;
                            requests.push(self.flip_animation(resting));
                        }
                    }
                    transition
                }
                Err(err) => {
                    debug!(note_id = %self.note_id, error = %err, "drawer event ignored");
                    return false;
                }
            }
        };
        debug!(note_id = %self.note_id, from = ?transition.from, to = ?transition.to, "drawer transition");
        requests.extend(self.drawer_animations(&transition));
        self.run_animations(requests);
        true
    }

    fn schedule_timer(self: &Arc<Self>, state: &mut CardState, directive: TimerDirective) {
        if let Some(task) = state.timer_task.take() {
            task.abort();
        }
        let TimerDirective::Arm { generation, after } = directive else {
            return;
        };
        let weak: Weak<Self> = Arc::downgrade(self);
        state.timer_task = self.spawn_after(after, move || {
            if let Some(shared) = weak.upgrade() {
                shared.expire_timer(generation);
            }
        });
        if state.timer_task.is_none() {
            warn!(note_id = %self.note_id, "no async runtime; drawer auto-dismiss not armed");
        }
    }

    /// Runs `fire` after `after` on the runtime the card was built in, or the
    /// caller's runtime. Returns `None` when neither exists.
    fn spawn_after<F>(&self, after: Duration, fire: F) -> Option<AbortHandle>
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = self
            .runtime
            .clone()
            .or_else(|| Handle::try_current().ok())?;
        let _entered = handle.enter();
        // Deadline is fixed now, not when the task is first polled.
        let deadline = tokio::time::Instant::now() + after;
        let task = handle.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            fire();
        });
        Some(task.abort_handle())
    }

    fn expire_timer(self: &Arc<Self>, generation: u64) {
        let transition = {
            let mut state = self.state.lock();
            if !state.alive {
                return;
            }
            let Some(transition) = state.drawer.expire(generation) else {
                return;
            };
            state.timer_task = None;
            transition
        };
        debug!(note_id = %self.note_id, from = ?transition.from, "drawer auto-dismissed");
        self.run_animations(self.drawer_animations(&transition));
    }

    fn finish_entry(&self) {
        {
            let mut state = self.state.lock();
            if !state.alive {
                return;
            }
            state.is_animated_in = true;
            state.entry_task = None;
        }
        let duration = Duration::from_millis(self.tuning.animation.flip_ms);
        self.run_animations(vec![(
            AnimatedProperty::Opacity,
            1.0,
            duration,
            Easing::EaseOutCubic,
        )]);
    }

    fn drawer_animations(&self, transition: &Transition) -> Vec<AnimationRequest> {
        if transition.from.is_open() == transition.to.is_open() {
            return Vec::new();
        }
        let extent = if transition.to.is_open() { 1.0 } else { 0.0 };
        vec![(
            AnimatedProperty::DrawerExtent,
            extent,
            Duration::from_millis(self.tuning.animation.drawer_ms),
            Easing::EaseInOutQuad,
        )]
    }

    fn flip_animation(&self, rotation_deg: f32) -> AnimationRequest {
        (
            AnimatedProperty::Rotation,
            rotation_deg,
            Duration::from_millis(self.tuning.animation.flip_ms),
            Easing::EaseOutCubic,
        )
    }

    /// Hands requests to the animator outside the state lock. Completion
    /// signals are dropped; the card never waits on the presentation layer.
    fn run_animations(&self, requests: Vec<AnimationRequest>) {
        for (property, value, duration, easing) in requests {
            let _ = self.animator.animate_to(property, value, duration, easing);
        }
    }
}
