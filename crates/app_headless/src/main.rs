use std::sync::Arc;
use std::time::{Duration, Instant};
use std::{fs, path::Path};

use anyhow::{Context, Result};
use card_engine::{CardListController, CardOptions, CommitOutcome, ListCallbacks, Point};
use config::{AppConfig, ConfigStore};
use core_types::{
    AnimatedProperty, AnimationCompletion, Animator, DrawerState, Easing, Note, NoteId, NoteStore,
    SyncStatus,
};
use futures::FutureExt;
use i18n::I18n;
use storage_sqlite::{ArchiveFilter, SqliteNoteStore};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

/// Stands in for a render layer: logs each request and completes after the
/// requested duration.
struct TracingAnimator;

impl Animator for TracingAnimator {
    fn animate_to(
        &self,
        property: AnimatedProperty,
        value: f32,
        duration: Duration,
        easing: Easing,
    ) -> AnimationCompletion {
        debug!(
            ?property,
            value,
            duration_ms = duration.as_millis() as u64,
            ?easing,
            "animate"
        );
        tokio::time::sleep(duration).boxed()
    }
}

fn main() {
    let mut data_dir = dirs::data_local_dir().unwrap_or_else(|| std::path::PathBuf::from("."));
    data_dir.push("cardnote");
    if let Err(err) = fs::create_dir_all(&data_dir) {
        eprintln!("failed to prepare data dir: {err}");
    }
    let _log_guard = init_local_logger(&data_dir.join("logs"));

    let config_store = ConfigStore::from_dir(data_dir.join("config"));
    let config = match config_store.load_or_init() {
        Ok(cfg) => cfg,
        Err(err) => {
            error!("failed to load config: {err}");
            AppConfig::default()
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(err) => {
            eprintln!("failed to create tokio runtime: {err}");
            return;
        }
    };

    if let Err(err) = runtime.block_on(run(&data_dir, config)) {
        error!("scenario failed: {err:#}");
        eprintln!("cardnote: {err:#}");
    }
}

async fn run(data_dir: &Path, config: AppConfig) -> Result<()> {
    let store = SqliteNoteStore::connect(data_dir.join("cardnote.db"))
        .await
        .context("failed to open note store")?;
    seed_mock_notes(&store).await?;

    let i18n = I18n::new(config.language);
    let shared_store: Arc<dyn NoteStore> = Arc::new(store.clone());
    let animator: Arc<dyn Animator> = Arc::new(TracingAnimator);
    let options = CardOptions {
        archive_mode: false,
        skip_entry_animation: false,
        card_width: config.display.card_width,
        tuning: config.tuning,
    };

    println!("== {} / {}", i18n.t("app.title"), i18n.t("view.active"));
    let mut active = CardListController::new(
        shared_store.clone(),
        animator.clone(),
        options,
        ListCallbacks::default().on_archived(|id| info!(note_id = %id, "archived from stack")),
    );
    active.sync(store.list_notes(ArchiveFilter::Active).await?);
    print_stack(&active, &i18n);

    let ids: Vec<NoteId> = active.ids().cloned().collect();
    if let Some(card) = ids.first().and_then(|id| active.card(id)) {
        let t0 = Instant::now();
        let width = config.display.card_width;
        card.on_touch_start(Point::new(width * 0.8, 40.0), t0);
        card.on_touch_move(Point::new(width * 0.4, 44.0));
        let flipped = card.on_touch_end(
            Point::new(width * 0.2, 46.0),
            t0 + Duration::from_millis(180),
        );
        println!("swipe on `{}` flipped: {flipped}", card.note_id());
    }

    if let Some(card) = ids.get(1).and_then(|id| active.card(id)) {
        card.toggle_drawer();
        print_drawer(&i18n, card.snapshot().drawer);
        card.request_menu_action();
        print_drawer(&i18n, card.snapshot().drawer);
        let outcome = card.confirm().await;
        println!("{} `{}`: {outcome:?}", i18n.menu_label(card.menu_action()), card.note_id());
    }
    print_stack(&active, &i18n);

    tokio::time::sleep(Duration::from_millis(config.tuning.animation.removal_ms)).await;
    active.sync(store.list_notes(ArchiveFilter::Active).await?);
    print_stack(&active, &i18n);

    println!("== {} / {}", i18n.t("app.title"), i18n.t("view.archive"));
    let mut archive = CardListController::new(
        shared_store,
        animator,
        CardOptions {
            archive_mode: true,
            ..options
        },
        ListCallbacks::default().on_delete(|id| info!(note_id = %id, "deleted from archive")),
    );
    archive.sync(store.list_notes(ArchiveFilter::Archived).await?);
    print_stack(&archive, &i18n);

    let first_archived = archive.ids().next().cloned();
    if let Some(card) = first_archived.as_ref().and_then(|id| archive.card(id)) {
        card.toggle_drawer();
        card.request_menu_action();
        print_drawer(&i18n, card.snapshot().drawer);
        if card.confirm().await == CommitOutcome::Deleted {
            println!("{} `{}`", i18n.menu_label(card.menu_action()), card.note_id());
        }
    }
    archive.sync(store.list_notes(ArchiveFilter::Archived).await?);
    print_stack(&archive, &i18n);

    active.teardown();
    archive.teardown();
    Ok(())
}

async fn seed_mock_notes(store: &SqliteNoteStore) -> Result<()> {
    if !store.list_notes(ArchiveFilter::All).await?.is_empty() {
        return Ok(());
    }

    let mut welcome = Note::new("Welcome", "Swipe a card sideways to see its **back**.");
    welcome.sync_status = Some(SyncStatus::Synced);
    let mut groceries = Note::new("Groceries", "- oat milk\n- apples");
    groceries.sync_status = Some(SyncStatus::Offline);
    let bakery = Note::new("Bakery", "Sourdough, *not* sliced").with_parent(groceries.id.clone());
    let ideas = Note::new("Ideas", "# Someday\n\nA card that flips itself.");

    for note in [&welcome, &groceries, &bakery, &ideas] {
        store.put_note(note).await?;
    }
    info!(count = 4, "seeded mock notes");
    Ok(())
}

fn print_stack(list: &CardListController, i18n: &I18n) {
    for note in list.notes() {
        let Some(card) = list.card(&note.id) else {
            continue;
        };
        let snapshot = card.snapshot();
        let sync = note
            .sync_status
            .map(|status| i18n.sync_label(status))
            .unwrap_or("-");
        let nested = list.children_of(&note.id).len();
        let removing = if snapshot.is_removing {
            i18n.t("card.removing")
        } else {
            ""
        };
        println!(
            "  [{:>5.1}°] {:<12} sync={:<8} children={} {}",
            snapshot.rotation_deg, note.title, sync, nested, removing
        );
    }
}

fn print_drawer(i18n: &I18n, state: DrawerState) {
    if let Some(prompt) = i18n.drawer_prompt(state) {
        println!("  drawer: {prompt} [{} / {}]", i18n.t("card.confirm"), i18n.t("card.cancel"));
    }
}

fn init_local_logger(log_dir: &Path) -> tracing_appender::non_blocking::WorkerGuard {
    if let Err(err) = fs::create_dir_all(log_dir) {
        eprintln!("failed to create log dir `{}`: {err}", log_dir.display());
    }
    let file_appender = tracing_appender::rolling::daily(log_dir, "cardnote.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,card_engine=debug,app_headless=debug"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .json()
        .with_writer(writer)
        .init();

    guard
}
