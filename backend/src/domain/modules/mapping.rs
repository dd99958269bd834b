//! Mapping of URI identifiers to modules, edited by content administrators.

use std::sync::{Arc, OnceLock};

use crate::domain::ports::RecordStore;
use crate::domain::{
    Action, DataModule, Editable, FieldSpec, FieldType, IntegrityMatchers, PasswordStorage, Rights,
    Role, SortKey, TableSpec,
};

/// Registered name.
pub const NAME: &str = "Mapping";

static MATCHERS: OnceLock<IntegrityMatchers> = OnceLock::new();

fn matchers() -> IntegrityMatchers {
    MATCHERS
        .get_or_init(|| {
            IntegrityMatchers::default()
                .with_rule(
                    "_mapping_unique_tree_(?P<id>ord)er",
                    "Duplicate menu order on this tree level.",
                )
                .unwrap_or_else(|error| panic!("mapping matcher failed to compile: {error}"))
        })
        .clone()
}

/// Field specification of the `mapping` table.
#[must_use]
pub fn spec() -> TableSpec {
    TableSpec {
        table: "mapping",
        key: "mapping_id",
        referer: Some("identifier"),
        owner: None,
        title: "identifier",
        sort: vec![SortKey::asc("tree_order")],
        fields: vec![
            FieldSpec::new("identifier", "Identifier", FieldType::String { max_len: Some(32) })
                .required(),
            FieldSpec::new("modname", "Module", FieldType::String { max_len: Some(64) })
                .required(),
            FieldSpec::new("parent", "Parent item", FieldType::Integer),
            FieldSpec::new("ord", "Menu order", FieldType::Integer),
            FieldSpec::new("published", "Published", FieldType::Boolean),
            FieldSpec::new("private", "Private", FieldType::Boolean),
            FieldSpec::new("tree_order", "Tree order", FieldType::Text)
                .editable(Editable::Never),
        ],
        derivations: Vec::new(),
        columns: vec!["identifier", "modname", "ord", "published"],
        layout: vec![
            "identifier",
            "modname",
            "parent",
            "ord",
            "published",
            "private",
            "tree_order",
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
    DataModule::new(NAME, "Menu and Mapping", spec(), rights(), store, passwords)
        .with_matchers(matchers())
}
