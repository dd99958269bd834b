//! Side panel definitions, edited by content administrators.

use std::sync::Arc;

use crate::domain::ports::RecordStore;
use crate::domain::{
    Action, DataModule, Editable, FieldSpec, FieldType, PasswordStorage, Rights, Role, SortKey,
    TableSpec,
};

/// Registered name.
pub const NAME: &str = "Panels";

/// Field specification of the `panels` table.
#[must_use]
pub fn spec() -> TableSpec {
    TableSpec {
        table: "panels",
        key: "panel_id",
        referer: None,
        owner: None,
        title: "title",
        sort: vec![SortKey::asc("lang"), SortKey::asc("ord")],
        fields: vec![
            FieldSpec::new("lang", "Language", FieldType::String { max_len: Some(2) })
                .required()
                .editable(Editable::OnInsert),
            FieldSpec::new("title", "Title", FieldType::String { max_len: Some(255) }),
            FieldSpec::new("ord", "Order", FieldType::Integer),
            FieldSpec::new("mapping_id", "Module", FieldType::Integer),
            FieldSpec::new("size", "Items count", FieldType::Integer),
            FieldSpec::new("content", "Content", FieldType::Text),
            FieldSpec::new("published", "Published", FieldType::Boolean),
        ],
        derivations: Vec::new(),
        columns: vec!["title", "lang", "ord", "size", "published"],
        layout: vec![
            "lang",
            "title",
            "ord",
            "mapping_id",
            "size",
            "content",
            "published",
        ],
    }
}

/// Content administrators only.
#[must_use]
pub fn rights() -> Rights {
    Rights::new().allow(&Action::ALL, &[Role::CONTENT_ADMIN])
}

/// The module instance.
#[must_use]
pub fn module(store: Arc<dyn RecordStore>, passwords: Arc<dyn PasswordStorage>) -> DataModule {
    DataModule::new(NAME, "Panels", spec(), rights(), store, passwords)
}
