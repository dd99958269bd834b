//! Diesel table definitions for the tables the dispatch core reads directly.
//!
//! Module tables (news, users as a record table, mapping as a record table)
//! go through the dynamic record store instead; only the columns queried
//! with the typed DSL are declared here.

diesel::table! {
    /// Menu and URI mapping items.
    mapping (mapping_id) {
        mapping_id -> Int8,
        parent -> Nullable<Int8>,
        identifier -> Varchar,
        modname -> Varchar,
        /// Menu order, `NULL` hides the item.
        ord -> Nullable<Int4>,
        tree_order -> Text,
        published -> Bool,
        private -> Bool,
    }
}

diesel::table! {
    /// Per-language titles of mapping items.
    titles (mapping_id, lang) {
        mapping_id -> Int8,
        lang -> Varchar,
        title -> Varchar,
        description -> Nullable<Text>,
    }
}

diesel::table! {
    panels (panel_id) {
        panel_id -> Int8,
        lang -> Varchar,
        title -> Nullable<Varchar>,
        ord -> Nullable<Int4>,
        mapping_id -> Nullable<Int8>,
        size -> Nullable<Int4>,
        content -> Nullable<Text>,
        published -> Bool,
    }
}

diesel::table! {
    users (uid) {
        uid -> Int8,
        login -> Varchar,
        password -> Varchar,
        firstname -> Nullable<Varchar>,
        surname -> Nullable<Varchar>,
        email -> Nullable<Varchar>,
        /// `new`, `unapproved`, `enabled` or `blocked`.
        state -> Varchar,
        password_expiration -> Nullable<Date>,
        lang -> Nullable<Varchar>,
    }
}

diesel::table! {
    /// Explicit role membership of users.
    role_members (role_member_id) {
        role_member_id -> Int8,
        role_id -> Varchar,
        uid -> Int8,
    }
}

diesel::table! {
    /// Role containment pairs: `role_id` contains `member_role_id`.
    role_sets (role_set_id) {
        role_set_id -> Int8,
        role_id -> Varchar,
        member_role_id -> Varchar,
    }
}

diesel::table! {
    sessions (session_id) {
        session_id -> Int8,
        uid -> Int8,
        session_key -> Text,
        last_access -> Timestamptz,
    }
}

diesel::table! {
    /// Version counters bumped by triggers on every table change.
    cached_tables (object_schema, object_name) {
        object_schema -> Varchar,
        object_name -> Varchar,
        version -> Int8,
    }
}

diesel::joinable!(titles -> mapping (mapping_id));
diesel::joinable!(panels -> mapping (mapping_id));
diesel::joinable!(role_members -> users (uid));
diesel::joinable!(sessions -> users (uid));

diesel::allow_tables_to_appear_in_same_query!(
    mapping,
    titles,
    panels,
    users,
    role_members,
    role_sets,
    sessions,
    cached_tables,
);
