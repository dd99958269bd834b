//! Internal Diesel row structs for database operations.
//!
//! These types are implementation details of the persistence layer and must
//! never be exposed to the domain.

use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;

use super::schema::{mapping, panels, role_sets, sessions, titles, users};

/// Row struct for reading from the mapping table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = mapping)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct MappingRow {
    pub mapping_id: i64,
    pub parent: Option<i64>,
    pub identifier: String,
    pub modname: String,
    pub ord: Option<i32>,
    pub tree_order: String,
    pub published: bool,
    pub private: bool,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = titles)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct TitleRow {
    pub mapping_id: i64,
    pub lang: String,
    pub title: String,
    pub description: Option<String>,
}

/// Panel row joined with the optional mapping item it is bound to.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = panels)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct PanelRow {
    pub panel_id: i64,
    pub lang: String,
    pub title: Option<String>,
    pub ord: Option<i32>,
    pub mapping_id: Option<i64>,
    pub size: Option<i32>,
    pub content: Option<String>,
    pub published: bool,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct UserRow {
    pub uid: i64,
    pub login: String,
    pub password: String,
    pub firstname: Option<String>,
    pub surname: Option<String>,
    pub email: Option<String>,
    pub state: String,
    pub password_expiration: Option<NaiveDate>,
    pub lang: Option<String>,
}

/// Insertable struct for opening a session.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = sessions)]
pub(crate) struct NewSessionRow<'a> {
    pub uid: i64,
    pub session_key: &'a str,
    pub last_access: DateTime<Utc>,
}

/// Insertable struct for a role containment pair.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = role_sets)]
pub(crate) struct NewRoleSetRow<'a> {
    pub role_id: &'a str,
    pub member_role_id: &'a str,
}
