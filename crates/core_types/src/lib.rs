use std::fmt;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

pub type AnimationCompletion = BoxFuture<'static, ()>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UiLanguage {
    ZhCn,
    EnUs,
}

/// Opaque note identity. The core never validates it; an empty id is passed
/// through to the store, which decides whether to reject it.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Hash, PartialOrd, Ord, Default)]
#[serde(transparent)]
pub struct NoteId(String);

impl NoteId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NoteId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for NoteId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Offline,
    Synced,
    Conflict,
    Syncing,
}

impl SyncStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Synced => "synced",
            Self::Conflict => "conflict",
            Self::Syncing => "syncing",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "offline" => Some(Self::Offline),
            "synced" => Some(Self::Synced),
            "conflict" => Some(Self::Conflict),
            "syncing" => Some(Self::Syncing),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Note {
    pub id: NoteId,
    pub title: String,
    /// Markdown source.
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub is_archived: bool,
    /// Weak back-reference used only for lookup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<NoteId>,
    /// Parent link remembered while the note sits in the archive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_parent_id: Option<NoteId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_status: Option<SyncStatus>,
}

impl Note {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: NoteId::generate(),
            title: title.into(),
            content: content.into(),
            created_at: now,
            updated_at: now,
            is_archived: false,
            parent_id: None,
            original_parent_id: None,
            sync_status: None,
        }
    }

    pub fn with_parent(mut self, parent: NoteId) -> Self {
        self.parent_id = Some(parent);
        self
    }

    pub fn is_child(&self) -> bool {
        self.parent_id.is_some()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DrawerState {
    #[default]
    Closed,
    Menu,
    ArchiveConfirm,
    DeleteConfirm,
}

impl DrawerState {
    pub fn is_open(self) -> bool {
        self != Self::Closed
    }

    pub fn is_confirm(self) -> bool {
        matches!(self, Self::ArchiveConfirm | Self::DeleteConfirm)
    }
}

/// The destructive entry the menu offers. Outside the archive view it is a
/// soft archive; inside it, a permanent delete.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MenuAction {
    Archive,
    Delete,
}

impl MenuAction {
    pub fn for_mode(archive_mode: bool) -> Self {
        if archive_mode {
            Self::Delete
        } else {
            Self::Archive
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GestureTuning {
    /// Minimum horizontal travel before a drag counts as horizontal.
    pub horizontal_slop_px: f32,
    /// Fraction of the card width that maps to full progress.
    pub half_width_factor: f32,
    pub progress_threshold: f32,
    /// px per ms.
    pub velocity_threshold: f32,
}

impl Default for GestureTuning {
    fn default() -> Self {
        Self {
            horizontal_slop_px: 10.0,
            half_width_factor: 0.5,
            progress_threshold: 0.3,
            velocity_threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DrawerTuning {
    pub auto_dismiss_ms: u64,
}

impl Default for DrawerTuning {
    fn default() -> Self {
        Self {
            auto_dismiss_ms: 10_000,
        }
    }
}

impl DrawerTuning {
    pub fn auto_dismiss(&self) -> Duration {
        Duration::from_millis(self.auto_dismiss_ms)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AnimationTuning {
    pub flip_ms: u64,
    pub drawer_ms: u64,
    pub removal_ms: u64,
    /// Exclusive upper bound of the random entry delay.
    pub entry_stagger_max_ms: u64,
}

impl Default for AnimationTuning {
    fn default() -> Self {
        Self {
            flip_ms: 300,
            drawer_ms: 200,
            removal_ms: 300,
            entry_stagger_max_ms: 200,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct CardTuning {
    pub gesture: GestureTuning,
    pub drawer: DrawerTuning,
    pub animation: AnimationTuning,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AnimatedProperty {
    /// Y-axis rotation in degrees.
    Rotation,
    /// 0.0 fully collapsed, 1.0 fully open.
    DrawerExtent,
    Opacity,
    Scale,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    Linear,
    EaseOutCubic,
    EaseInOutQuad,
}

impl Easing {
    /// Maps linear progress `t` in `[0, 1]` onto the curve.
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::EaseOutCubic => 1.0 - (1.0 - t).powi(3),
            Self::EaseInOutQuad => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
                }
            }
        }
    }
}

/// Schedules visual transitions. A zero duration means "jump", which is what
/// live dragging uses so the animation never fights the finger.
pub trait Animator: Send + Sync {
    fn animate_to(
        &self,
        property: AnimatedProperty,
        value: f32,
        duration: Duration,
        easing: Easing,
    ) -> AnimationCompletion;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAnimator;

impl Animator for NoopAnimator {
    fn animate_to(
        &self,
        _property: AnimatedProperty,
        _value: f32,
        _duration: Duration,
        _easing: Easing,
    ) -> AnimationCompletion {
        futures::future::ready(()).boxed()
    }
}

/// Note mutations the card engine requests. `Ok(false)` and `Err(_)` are both
/// failures from the caller's point of view.
#[async_trait]
pub trait NoteStore: Send + Sync {
    async fn archive_note(&self, id: &NoteId) -> Result<bool>;
    async fn delete_note(&self, id: &NoteId) -> Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn easing_hits_endpoints() {
        for easing in [Easing::Linear, Easing::EaseOutCubic, Easing::EaseInOutQuad] {
            assert_eq!(easing.apply(0.0), 0.0);
            assert_eq!(easing.apply(1.0), 1.0);
            assert_eq!(easing.apply(2.0), 1.0);
        }
        assert!(Easing::EaseOutCubic.apply(0.5) > 0.5);
    }

    #[test]
    fn sync_status_uses_lowercase_wire_names() {
        let json = serde_json::to_string(&SyncStatus::Conflict).expect("serialize");
        assert_eq!(json, "\"conflict\"");
        assert_eq!(SyncStatus::parse("syncing"), Some(SyncStatus::Syncing));
        assert_eq!(SyncStatus::parse("bogus"), None);
    }

    #[test]
    fn note_without_optional_fields_deserializes() {
        let raw = r##"{
            "id": "n1",
            "title": "t",
            "content": "# hi",
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        }"##;
        let note: Note = serde_json::from_str(raw).expect("parse");
        assert_eq!(note.id.as_str(), "n1");
        assert!(!note.is_archived);
        assert!(!note.is_child());
        assert_eq!(note.sync_status, None);
    }

    #[test]
    fn menu_action_follows_archive_mode() {
        assert_eq!(MenuAction::for_mode(false), MenuAction::Archive);
        assert_eq!(MenuAction::for_mode(true), MenuAction::Delete);
    }
}
