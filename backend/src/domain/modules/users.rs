//! User accounts.

use std::sync::Arc;

use serde_json::Value;

use crate::domain::ports::RecordStore;
use crate::domain::{
    Action, DataModule, Derivation, Editable, FieldSpec, FieldType, PasswordStorage, Rights, Role,
    Row, SortKey, TableSpec,
};

/// Registered name.
pub const NAME: &str = "Users";

fn fullname(row: &Row) -> Value {
    let parts: Vec<&str> = ["firstname", "surname"]
        .into_iter()
        .filter_map(|column| row.get_str(column))
        .filter(|part| !part.is_empty())
        .collect();
    if parts.is_empty() {
        row.get("login").cloned().unwrap_or(Value::Null)
    } else {
        Value::String(parts.join(" "))
    }
}

/// Field specification of the `users` table.
#[must_use]
pub fn spec() -> TableSpec {
    TableSpec {
        table: "users",
        key: "uid",
        referer: Some("login"),
        owner: Some("uid"),
        title: "fullname",
        sort: vec![SortKey::asc("login")],
        fields: vec![
            FieldSpec::new("login", "Login name", FieldType::String { max_len: Some(64) })
                .required()
                .editable(Editable::OnInsert),
            FieldSpec::new("password", "Password", FieldType::Password).required(),
            FieldSpec::new("firstname", "First name", FieldType::String { max_len: None }),
            FieldSpec::new("surname", "Surname", FieldType::String { max_len: None }),
            FieldSpec::new("email", "E-mail", FieldType::Email).required(),
            FieldSpec::new("lang", "Preferred language", FieldType::String { max_len: Some(2) }),
        ],
        derivations: vec![Derivation {
            id: "fullname",
            label: "Full name",
            depends: &["firstname", "surname", "login"],
            compute: fullname,
        }],
        columns: vec!["login", "fullname", "email"],
        layout: vec![
            "login",
            "password",
            "fullname",
            "firstname",
            "surname",
            "email",
            "lang",
        ],
    }
}

/// Anybody may register; accounts are managed by their owners and by user
/// administrators.
#[must_use]
pub fn rights() -> Rights {
    Rights::new()
        .allow(&[Action::List, Action::View], &[Role::USER])
        .allow(&[Action::View], &[Role::OWNER])
        .allow(&[Action::Add, Action::Insert], &[Role::ANYONE])
        .allow(
            &[Action::Edit, Action::Update],
            &[Role::USER_ADMIN, Role::OWNER],
        )
        .allow(&[Action::Remove, Action::Delete], &[Role::USER_ADMIN])
}

/// The module instance.
#[must_use]
pub fn module(store: Arc<dyn RecordStore>, passwords: Arc<dyn PasswordStorage>) -> DataModule {
    DataModule::new(NAME, "User Management", spec(), rights(), store, passwords)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Row::new().with("login", "joe").with("firstname", "Joe").with("surname", "Doe"), "Joe Doe")]
    #[case(Row::new().with("login", "joe").with("surname", "Doe"), "Doe")]
    #[case(Row::new().with("login", "joe").with("firstname", ""), "joe")]
    fn fullname_falls_back_to_the_login(#[case] row: Row, #[case] expected: &str) {
        assert_eq!(spec().value(&row, "fullname"), Value::from(expected));
    }

    #[rstest]
    fn registration_is_open_to_anyone() {
        let rights = rights();
        assert!(rights.permits(Action::Insert, None, None));
        assert!(!rights.permits(Action::List, None, None));
        assert!(!rights.permits(Action::Delete, None, None));
    }
}
