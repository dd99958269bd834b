//! Dated news items, also offered to side panels.

use std::sync::Arc;

use crate::domain::ports::RecordStore;
use crate::domain::{
    Action, DataModule, FieldSpec, FieldType, PasswordStorage, Rights, Role, SortKey, TableSpec,
};

/// Registered name.
pub const NAME: &str = "News";

/// Field specification of the `news` table.
#[must_use]
pub fn spec() -> TableSpec {
    TableSpec {
        table: "news",
        key: "news_id",
        referer: None,
        owner: Some("author"),
        title: "title",
        sort: vec![SortKey::desc("date"), SortKey::desc("news_id")],
        fields: vec![
            FieldSpec::new("title", "Title", FieldType::String { max_len: Some(255) }).required(),
            FieldSpec::new("date", "Date", FieldType::Date).required(),
            FieldSpec::new("content", "Text", FieldType::Text).required(),
        ],
        derivations: Vec::new(),
        columns: vec!["date", "title"],
        layout: vec!["title", "date", "content"],
    }
}

/// Public reading, writes by content administrators.
#[must_use]
pub fn rights() -> Rights {
    Rights::new()
        .allow(&[Action::List, Action::View], &[Role::ANYONE])
        .allow(
            &[
                Action::Add,
                Action::Insert,
                Action::Edit,
                Action::Update,
                Action::Remove,
                Action::Delete,
            ],
            &[Role::CONTENT_ADMIN],
        )
}

/// The module instance.
#[must_use]
pub fn module(store: Arc<dyn RecordStore>, passwords: Arc<dyn PasswordStorage>) -> DataModule {
    DataModule::new(NAME, "News", spec(), rights(), store, passwords)
        .panelized(vec![SortKey::desc("date"), SortKey::desc("news_id")])
}
