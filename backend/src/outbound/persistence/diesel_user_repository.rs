//! PostgreSQL-backed `UserRepository`.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::domain::ports::{UserRepository, UserRepositoryError};
use crate::domain::{AccountState, Login, UserAccount, UserId};

use super::diesel_helpers::{map_diesel_error, map_pool_error};
use super::models::UserRow;
use super::pool::DbPool;
use super::schema::users;

/// Diesel implementation of the `UserRepository` port.
#[derive(Clone)]
pub struct DieselUserRepository {
    pool: DbPool,
}

impl DieselUserRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn display_name(row: &UserRow) -> String {
    let parts: Vec<&str> = [row.firstname.as_deref(), row.surname.as_deref()]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect();
    if parts.is_empty() {
        row.login.clone()
    } else {
        parts.join(" ")
    }
}

fn row_to_account(row: UserRow) -> Result<UserAccount, UserRepositoryError> {
    let login = Login::new(&row.login).map_err(|err| {
        UserRepositoryError::query(format!("stored login of user {} is invalid: {err}", row.uid))
    })?;
    Ok(UserAccount {
        uid: UserId::new(row.uid),
        name: display_name(&row),
        state: AccountState::from_column(&row.state),
        login,
        email: row.email,
        password: row.password,
        password_expiration: row.password_expiration,
        lang: row.lang,
    })
}

#[async_trait]
impl UserRepository for DieselUserRepository {
    async fn find_by_login(
        &self,
        login: &Login,
    ) -> Result<Option<UserAccount>, UserRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<UserRow> = users::table
            .filter(users::login.eq(login.as_str()))
            .select(UserRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(row_to_account).transpose()
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use rstest::rstest;

    fn row(firstname: Option<&str>, surname: Option<&str>) -> UserRow {
        UserRow {
            uid: 3,
            login: "joe".to_owned(),
            password: "plain:x".to_owned(),
            firstname: firstname.map(str::to_owned),
            surname: surname.map(str::to_owned),
            email: None,
            state: "enabled".to_owned(),
            password_expiration: None,
            lang: Some("cs".to_owned()),
        }
    }

    #[rstest]
    #[case(Some("Joe"), Some("Doe"), "Joe Doe")]
    #[case(None, Some("Doe"), "Doe")]
    #[case(Some(""), None, "joe")]
    fn names_fall_back_to_the_login(
        #[case] firstname: Option<&str>,
        #[case] surname: Option<&str>,
        #[case] expected: &str,
    ) {
        assert_eq!(display_name(&row(firstname, surname)), expected);
    }

    #[rstest]
    fn rows_become_accounts() {
        let account = row_to_account(row(Some("Joe"), None)).expect("account");
        assert_eq!(account.uid, UserId::new(3));
        assert_eq!(account.state, AccountState::Enabled);
        assert_eq!(account.lang.as_deref(), Some("cs"));
    }

    #[rstest]
    fn invalid_stored_logins_are_query_errors() {
        let mut bad = row(None, None);
        bad.login = String::new();
        assert!(matches!(
            row_to_account(bad),
            Err(UserRepositoryError::Query { .. })
        ));
    }
}
