//! Per-action access rights of a module.

use std::collections::BTreeMap;

use super::{Action, Role, User, UserId};

/// Rights table: action → roles allowed to perform it.
///
/// Fails closed: an action without an entry is denied to everybody.
///
/// # Examples
/// ```
/// use wiking::domain::{Action, Rights, Role};
///
/// let rights = Rights::new().allow(&[Action::List], &[Role::ANYONE]);
/// assert!(rights.permits(Action::List, None, None));
/// assert!(!rights.permits(Action::Delete, None, None));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rights(BTreeMap<Action, Vec<Role>>);

impl Rights {
    /// Empty table denying everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant `actions` to `roles`.
    #[must_use]
    pub fn allow(mut self, actions: &[Action], roles: &[Role]) -> Self {
        for action in actions {
            let entry = self.0.entry(*action).or_default();
            for role in roles {
                if !entry.contains(role) {
                    entry.push(role.clone());
                }
            }
        }
        self
    }

    /// Roles allowed to perform `action`.
    #[must_use]
    pub fn roles(&self, action: Action) -> &[Role] {
        self.0.get(&action).map_or(&[], Vec::as_slice)
    }

    /// Whether `user` may perform `action`.
    ///
    /// `owner` is the value of the record's owner column, if the module has
    /// one and a record is at hand; [`Role::OWNER`] is satisfied when it
    /// equals the user's id.
    #[must_use]
    pub fn permits(&self, action: Action, user: Option<&User>, owner: Option<UserId>) -> bool {
        self.roles(action).iter().any(|role| {
            if *role == Role::ANYONE {
                return true;
            }
            let Some(user) = user else {
                return false;
            };
            if *role == Role::OWNER {
                return owner.is_some_and(|uid| uid == user.uid());
            }
            user.roles().contains(role)
        })
    }
}
