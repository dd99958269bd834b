//! CRUD action state machine.
//!
//! Form actions (`add`, `edit`, `remove`) render a form whose submission
//! targets the matching write action (`insert`, `update`, `delete`). A
//! successful write moves on to a display action; a failed one goes back to
//! its form with the errors.

use std::fmt;

/// Module action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Action {
    /// Record listing.
    List,
    /// Single record display.
    View,
    /// Form for a new record.
    Add,
    /// Store a new record.
    Insert,
    /// Form editing an existing record.
    Edit,
    /// Store changes of an existing record.
    Update,
    /// Removal confirmation.
    Remove,
    /// Delete the record.
    Delete,
}

impl Action {
    /// Every action, in display order.
    pub const ALL: [Self; 8] = [
        Self::List,
        Self::View,
        Self::Add,
        Self::Insert,
        Self::Edit,
        Self::Update,
        Self::Remove,
        Self::Delete,
    ];

    /// Parse the `action` parameter value.
    ///
    /// `show` is accepted as an alias of `view`.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "show" => Some(Self::View),
            _ => Self::ALL.into_iter().find(|action| action.name() == name),
        }
    }

    /// Parameter value.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::List => "list",
            Self::View => "view",
            Self::Add => "add",
            Self::Insert => "insert",
            Self::Edit => "edit",
            Self::Update => "update",
            Self::Remove => "remove",
            Self::Delete => "delete",
        }
    }

    /// Whether the action addresses an existing record.
    #[must_use]
    pub const fn needs_record(self) -> bool {
        matches!(
            self,
            Self::View | Self::Edit | Self::Update | Self::Remove | Self::Delete
        )
    }

    /// Whether the action writes to storage.
    #[must_use]
    pub const fn is_write(self) -> bool {
        matches!(self, Self::Insert | Self::Update | Self::Delete)
    }

    /// Action a form rendered by `self` submits to.
    #[must_use]
    pub const fn submit_target(self) -> Option<Self> {
        match self {
            Self::Add => Some(Self::Insert),
            Self::Edit => Some(Self::Update),
            Self::Remove => Some(Self::Delete),
            _ => None,
        }
    }

    /// Action shown after `self` succeeded.
    #[must_use]
    pub const fn on_success(self) -> Option<Self> {
        match self {
            Self::Insert | Self::Delete => Some(Self::List),
            Self::Update => Some(Self::View),
            _ => None,
        }
    }

    /// Form re-rendered when `self` failed.
    #[must_use]
    pub const fn on_failure(self) -> Option<Self> {
        match self {
            Self::Insert => Some(Self::Add),
            Self::Update => Some(Self::Edit),
            Self::Delete => Some(Self::Remove),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
