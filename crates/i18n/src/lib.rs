use std::collections::BTreeMap;

use core_types::{DrawerState, MenuAction, SyncStatus, UiLanguage};

#[derive(Debug, Clone)]
pub struct I18n {
    lang: UiLanguage,
    zh_cn: BTreeMap<&'static str, &'static str>,
    en_us: BTreeMap<&'static str, &'static str>,
}

impl I18n {
    pub fn new(lang: UiLanguage) -> Self {
        Self {
            lang,
            zh_cn: zh_cn_map(),
            en_us: en_us_map(),
        }
    }

    pub fn set_language(&mut self, lang: UiLanguage) {
        self.lang = lang;
    }

    pub fn language(&self) -> UiLanguage {
        self.lang
    }

    pub fn t<'a>(&'a self, key: &'a str) -> &'a str {
        match self.lang {
            UiLanguage::ZhCn => self
                .zh_cn
                .get(key)
                .copied()
                .or_else(|| self.en_us.get(key).copied())
                .unwrap_or(key),
            UiLanguage::EnUs => self
                .en_us
                .get(key)
                .copied()
                .or_else(|| self.zh_cn.get(key).copied())
                .unwrap_or(key),
        }
    }

    pub fn menu_label(&self, action: MenuAction) -> &str {
        match action {
            MenuAction::Archive => self.t("card.menu.archive"),
            MenuAction::Delete => self.t("card.menu.delete"),
        }
    }

    /// Prompt shown in the drawer for the given state; `None` when closed.
    pub fn drawer_prompt(&self, state: DrawerState) -> Option<&str> {
        match state {
            DrawerState::Closed => None,
            DrawerState::Menu => Some(self.t("card.menu.title")),
            DrawerState::ArchiveConfirm => Some(self.t("card.confirm.archive")),
            DrawerState::DeleteConfirm => Some(self.t("card.confirm.delete")),
        }
    }

    pub fn sync_label(&self, status: SyncStatus) -> &str {
        match status {
            SyncStatus::Offline => self.t("sync.offline"),
            SyncStatus::Synced => self.t("sync.synced"),
            SyncStatus::Conflict => self.t("sync.conflict"),
            SyncStatus::Syncing => self.t("sync.syncing"),
        }
    }
}

fn zh_cn_map() -> BTreeMap<&'static str, &'static str> {
    BTreeMap::from([
        ("app.title", "卡片笔记"),
        ("view.active", "笔记"),
        ("view.archive", "归档"),
        ("card.menu.title", "操作"),
        ("card.menu.archive", "归档"),
        ("card.menu.delete", "删除"),
        ("card.confirm.archive", "确定归档这条笔记？"),
        ("card.confirm.delete", "永久删除这条笔记？此操作无法撤销"),
        ("card.confirm", "确定"),
        ("card.cancel", "取消"),
        ("card.removing", "正在移除"),
        ("sync.offline", "离线"),
        ("sync.synced", "已同步"),
        ("sync.conflict", "冲突"),
        ("sync.syncing", "同步中"),
    ])
}

fn en_us_map() -> BTreeMap<&'static str, &'static str> {
    BTreeMap::from([
        ("app.title", "Cardnote"),
        ("view.active", "Notes"),
        ("view.archive", "Archive"),
        ("card.menu.title", "Actions"),
        ("card.menu.archive", "Archive"),
        ("card.menu.delete", "Delete"),
        ("card.confirm.archive", "Archive this note?"),
        (
            "card.confirm.delete",
            "Delete this note forever? This cannot be undone",
        ),
        ("card.confirm", "Confirm"),
        ("card.cancel", "Cancel"),
        ("card.removing", "Removing"),
        ("sync.offline", "Offline"),
        ("sync.synced", "Synced"),
        ("sync.conflict", "Conflict"),
        ("sync.syncing", "Syncing"),
    ])
}
