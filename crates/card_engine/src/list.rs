use std::sync::Arc;

use core_types::{Animator, Note, NoteId, NoteStore};
use indexmap::IndexMap;
use tracing::debug;

use crate::card::{CardCallbacks, CardLifecycleController, CardOptions};

pub type NoteCallback = Arc<dyn Fn(&NoteId) + Send + Sync>;

/// List-level listeners. Unlike the per-card callbacks these receive the id.
#[derive(Clone, Default)]
pub struct ListCallbacks {
    pub on_archived: Option<NoteCallback>,
    pub on_delete: Option<NoteCallback>,
}

impl ListCallbacks {
    pub fn on_archived(mut self, callback: impl Fn(&NoteId) + Send + Sync + 'static) -> Self {
        self.on_archived = Some(Arc::new(callback));
        self
    }

    pub fn on_delete(mut self, callback: impl Fn(&NoteId) + Send + Sync + 'static) -> Self {
        self.on_delete = Some(Arc::new(callback));
        self
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub added: Vec<NoteId>,
    pub dropped: Vec<NoteId>,
}

struct CardEntry {
    note: Note,
    card: CardLifecycleController,
}

/// Owns one card controller per visible note, in render order.
pub struct CardListController {
    store: Arc<dyn NoteStore>,
    animator: Arc<dyn Animator>,
    options: CardOptions,
    callbacks: ListCallbacks,
    cards: IndexMap<NoteId, CardEntry>,
    loaded: bool,
}

impl CardListController {
    pub fn new(
        store: Arc<dyn NoteStore>,
        animator: Arc<dyn Animator>,
        options: CardOptions,
        callbacks: ListCallbacks,
    ) -> Self {
        Self {
            store,
            animator,
            options,
            callbacks,
            cards: IndexMap::new(),
            loaded: false,
        }
    }

    pub fn archive_mode(&self) -> bool {
        self.options.archive_mode
    }

    /// Reconciles the cards with the notes the caller currently shows.
    ///
    /// Cards in the first page appear together; later arrivals get the
    /// staggered entry animation. Cards whose note is gone are torn down.
    /// Duplicate ids keep the first occurrence.
    pub fn sync(&mut self, notes: impl IntoIterator<Item = Note>) -> SyncReport {
        let first_page = !self.loaded;
        self.loaded = true;

        let mut previous = std::mem::take(&mut self.cards);
        let mut report = SyncReport::default();

        for note in notes {
            if self.cards.contains_key(&note.id) {
                continue;
            }
            let card = match previous.shift_remove(&note.id) {
                Some(entry) => entry.card,
                None => {
                    let card = self.build_card(&note.id, first_page);
                    card.mount();
                    report.added.push(note.id.clone());
                    card
                }
            };
            self.cards.insert(note.id.clone(), CardEntry { note, card });
        }

        for (id, entry) in previous {
            entry.card.teardown();
            report.dropped.push(id);
        }

        debug!(
            added = report.added.len(),
            dropped = report.dropped.len(),
            total = self.cards.len(),
            "card list synced"
        );
        report
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &NoteId> {
        self.cards.keys()
    }

    pub fn notes(&self) -> impl Iterator<Item = &Note> {
        self.cards.values().map(|entry| &entry.note)
    }

    pub fn note(&self, id: &NoteId) -> Option<&Note> {
        self.cards.get(id).map(|entry| &entry.note)
    }

    pub fn card(&self, id: &NoteId) -> Option<&CardLifecycleController> {
        self.cards.get(id).map(|entry| &entry.card)
    }

    /// Nested notes, resolved through the child's parent link.
    pub fn children_of(&self, parent: &NoteId) -> Vec<&Note> {
        self.notes()
            .filter(|note| note.parent_id.as_ref() == Some(parent))
            .collect()
    }

    /// Cards playing their exit animation until the next `sync` drops them.
    pub fn removing_ids(&self) -> Vec<NoteId> {
        self.cards
            .values()
            .filter(|entry| entry.card.is_removing())
            .map(|entry| entry.note.id.clone())
            .collect()
    }

    pub fn teardown(&mut self) {
        for (_, entry) in self.cards.drain(..) {
            entry.card.teardown();
        }
    }

    fn build_card(&self, id: &NoteId, first_page: bool) -> CardLifecycleController {
        let mut callbacks = CardCallbacks::default();
        if let Some(on_archived) = self.callbacks.on_archived.clone() {
            let id = id.clone();
            callbacks = callbacks.on_archived(move || on_archived(&id));
        }
        if let Some(on_delete) = self.callbacks.on_delete.clone() {
            callbacks = callbacks.on_delete(move |id| on_delete(id));
        }

        let options = CardOptions {
            skip_entry_animation: self.options.skip_entry_animation || first_page,
            ..self.options
        };
        CardLifecycleController::new(
            id.clone(),
            self.store.clone(),
            self.animator.clone(),
            callbacks,
            options,
        )
    }
}

impl Drop for CardListController {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use anyhow::Result;
    use async_trait::async_trait;
    use core_types::NoopAnimator;
    use parking_lot::Mutex;

    use super::*;

    struct AcceptingStore;

    #[async_trait]
    impl NoteStore for AcceptingStore {
        async fn archive_note(&self, _id: &NoteId) -> Result<bool> {
            Ok(true)
        }

        async fn delete_note(&self, _id: &NoteId) -> Result<bool> {
            Ok(true)
        }
    }

    fn note(id: &str) -> Note {
        let mut note = Note::new(format!("title {id}"), "body");
        note.id = NoteId::new(id);
        note
    }

    fn list(archive_mode: bool, callbacks: ListCallbacks) -> CardListController {
        CardListController::new(
            Arc::new(AcceptingStore),
            Arc::new(NoopAnimator),
            CardOptions {
                archive_mode,
                ..CardOptions::default()
            },
            callbacks,
        )
    }

    #[tokio::test]
    async fn sync_keeps_existing_cards_and_drops_missing() {
        let mut cards = list(false, ListCallbacks::default());
        let report = cards.sync([note("a"), note("b"), note("c")]);
        assert_eq!(report.added.len(), 3);
        assert!(report.dropped.is_empty());

        cards.card(&NoteId::new("b")).expect("b").toggle_flip();

        let report = cards.sync([note("b"), note("d")]);
        assert_eq!(report.added, vec![NoteId::new("d")]);
        assert_eq!(report.dropped, vec![NoteId::new("a"), NoteId::new("c")]);
        assert_eq!(
            cards.ids().cloned().collect::<Vec<_>>(),
            vec![NoteId::new("b"), NoteId::new("d")]
        );
        assert!(cards.card(&NoteId::new("b")).expect("b").is_flipped());
    }

    #[tokio::test]
    async fn duplicate_ids_keep_first_occurrence() {
        let mut cards = list(false, ListCallbacks::default());
        let mut second = note("a");
        second.title = "second".into();
        cards.sync([note("a"), second]);
        assert_eq!(cards.len(), 1);
        assert_eq!(cards.note(&NoteId::new("a")).expect("a").title, "title a");
    }

    #[tokio::test(start_paused = true)]
    async fn first_page_appears_at_once_and_later_cards_stagger() {
        let mut cards = list(false, ListCallbacks::default());
        cards.sync([note("a")]);
        assert!(cards.card(&NoteId::new("a")).expect("a").is_animated_in());

        cards.sync([note("a"), note("b")]);
        let late = cards.card(&NoteId::new("b")).expect("b").clone();
        assert!(!late.is_animated_in());

        tokio::time::advance(Duration::from_millis(200)).await;
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
        assert!(late.is_animated_in());
    }

    #[tokio::test]
    async fn children_resolve_through_parent_link() {
        let mut cards = list(false, ListCallbacks::default());
        let parent = note("p");
        let child = note("c").with_parent(NoteId::new("p"));
        let orphan = note("o").with_parent(NoteId::new("gone"));
        cards.sync([parent, child, orphan]);

        let children = cards.children_of(&NoteId::new("p"));
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].id.as_str(), "c");
        assert!(cards.children_of(&NoteId::new("c")).is_empty());
    }

    #[tokio::test]
    async fn archived_card_is_removing_until_next_sync() {
        let archived = Arc::new(Mutex::new(Vec::new()));
        let sink = archived.clone();
        let mut cards = list(
            false,
            ListCallbacks::default().on_archived(move |id| sink.lock().push(id.clone())),
        );
        cards.sync([note("a"), note("b")]);

        let card = cards.card(&NoteId::new("a")).expect("a").clone();
        card.toggle_drawer();
        card.request_archive();
        card.confirm().await;

        assert_eq!(archived.lock().clone(), vec![NoteId::new("a")]);
        assert_eq!(cards.removing_ids(), vec![NoteId::new("a")]);

        cards.sync([note("b")]);
        assert!(cards.removing_ids().is_empty());
        assert!(cards.card(&NoteId::new("a")).is_none());
    }

    #[tokio::test]
    async fn archive_view_reports_permanent_deletes() {
        let deleted = Arc::new(Mutex::new(Vec::new()));
        let sink = deleted.clone();
        let mut cards = list(
            true,
            ListCallbacks::default().on_delete(move |id| sink.lock().push(id.clone())),
        );
        cards.sync([note("x")]);

        let card = cards.card(&NoteId::new("x")).expect("x").clone();
        card.toggle_drawer();
        card.request_menu_action();
        card.confirm().await;
        assert_eq!(deleted.lock().clone(), vec![NoteId::new("x")]);
    }
}
