//! User roles and role containment.
//!
//! Roles may contain other roles. The containment graph must stay acyclic:
//! every pair goes through [`RoleContainment::add`], both when a new pair is
//! entered and when stored tables are loaded with [`RoleContainment::load`].
//! Expansion is a breadth-first closure that never revisits a role.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

/// A named role.
///
/// # Examples
/// ```
/// use wiking::domain::Role;
///
/// assert_eq!(Role::ADMIN.id(), "cms-admin");
/// assert_eq!(Role::new("editors"), Role::new("editors"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Role(Cow<'static, str>);

impl Role {
    /// Anyone, including anonymous visitors.
    pub const ANYONE: Self = Self(Cow::Borrowed("anyone"));
    /// Any logged-in user.
    pub const AUTHENTICATED: Self = Self(Cow::Borrowed("authenticated"));
    /// Logged-in user whose account is enabled.
    pub const USER: Self = Self(Cow::Borrowed("user"));
    /// User who completed registration, enabled or not.
    pub const REGISTERED: Self = Self(Cow::Borrowed("registered"));
    /// Matches when the acting user owns the record at hand.
    pub const OWNER: Self = Self(Cow::Borrowed("owner"));
    /// Manages user accounts.
    pub const USER_ADMIN: Self = Self(Cow::Borrowed("cms-user-admin"));
    /// Manages content, may use preview mode.
    pub const CONTENT_ADMIN: Self = Self(Cow::Borrowed("cms-content-admin"));
    /// Manages site settings.
    pub const SETTINGS_ADMIN: Self = Self(Cow::Borrowed("cms-settings-admin"));
    /// Container of all administration roles.
    pub const ADMIN: Self = Self(Cow::Borrowed("cms-admin"));

    /// A role identified by an arbitrary (application defined) id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(Cow::Owned(id.into()))
    }

    /// Unique identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.0
    }

    /// Roles whose membership is computed, never assigned explicitly.
    #[must_use]
    pub fn is_special(&self) -> bool {
        [
            Self::ANYONE,
            Self::AUTHENTICATED,
            Self::USER,
            Self::REGISTERED,
            Self::OWNER,
        ]
        .contains(self)
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<Role> for String {
    fn from(value: Role) -> Self {
        value.0.into_owned()
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// A set of roles, normally already expanded through containment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleSet(BTreeSet<Role>);

impl RoleSet {
    /// Whether `role` is a member.
    #[must_use]
    pub fn contains(&self, role: &Role) -> bool {
        self.0.contains(role)
    }

    /// Whether any of `roles` is a member.
    #[must_use]
    pub fn contains_any(&self, roles: &[Role]) -> bool {
        roles.iter().any(|role| self.contains(role))
    }

    /// Iterate members in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = &Role> {
        self.0.iter()
    }
}

impl FromIterator<Role> for RoleSet {
    fn from_iter<T: IntoIterator<Item = Role>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Error raised when a containment pair would close a cycle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("role {container} may not contain {member}: containment would be cyclic")]
pub struct RoleCycleError {
    /// The containing role.
    pub container: Role,
    /// The role that would be contained.
    pub member: Role,
}

/// Role containment table: each role maps to the roles it directly contains.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleContainment {
    members: BTreeMap<Role, Vec<Role>>,
}

impl RoleContainment {
    /// Build from `(container, member)` pairs as stored.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (Role, Role)>,
    {
        let mut members: BTreeMap<Role, Vec<Role>> = BTreeMap::new();
        for (container, member) in pairs {
            let entry = members.entry(container).or_default();
            if !entry.contains(&member) {
                entry.push(member);
            }
        }
        Self { members }
    }

    /// Containment installed with a fresh site: `ADMIN` holds the other
    /// administration roles.
    #[must_use]
    pub fn standard() -> Self {
        Self::from_pairs([
            (Role::ADMIN, Role::USER_ADMIN),
            (Role::ADMIN, Role::CONTENT_ADMIN),
            (Role::ADMIN, Role::SETTINGS_ADMIN),
        ])
    }

    /// Roles included in `role`, the role itself first.
    ///
    /// # Examples
    /// ```
    /// use wiking::domain::{Role, RoleContainment};
    ///
    /// let table = RoleContainment::standard();
    /// let included = table.included_roles(&Role::ADMIN);
    /// assert_eq!(included.first(), Some(&Role::ADMIN));
    /// assert!(included.contains(&Role::CONTENT_ADMIN));
    /// ```
    #[must_use]
    pub fn included_roles(&self, role: &Role) -> Vec<Role> {
        let mut seen = Vec::new();
        let mut queue = VecDeque::from([role.clone()]);
        while let Some(current) = queue.pop_front() {
            if seen.contains(&current) {
                continue;
            }
            if let Some(members) = self.members.get(&current) {
                queue.extend(members.iter().cloned());
            }
            seen.push(current);
        }
        seen
    }

    /// Expand a set of directly held roles to everything they include.
    pub fn expand<I>(&self, roles: I) -> RoleSet
    where
        I: IntoIterator<Item = Role>,
    {
        roles
            .into_iter()
            .flat_map(|role| self.included_roles(&role))
            .collect()
    }

    /// Whether storing `container ⊇ member` keeps the graph acyclic.
    ///
    /// A role may not contain itself, nor any role that already includes it.
    #[must_use]
    pub fn can_contain(&self, container: &Role, member: &Role) -> bool {
        container != member && !self.included_roles(member).contains(container)
    }

    /// The standard table extended by stored `(container, member)` pairs.
    ///
    /// Pairs are added in order through [`Self::add`]; those that would
    /// close a cycle are left out and returned.
    ///
    /// # Examples
    /// ```
    /// use wiking::domain::{Role, RoleContainment};
    ///
    /// let (table, rejected) = RoleContainment::load([
    ///     (Role::new("editors"), Role::new("authors")),
    ///     (Role::new("authors"), Role::new("editors")),
    /// ]);
    /// assert_eq!(rejected.len(), 1);
    /// assert!(table.included_roles(&Role::new("editors")).contains(&Role::new("authors")));
    /// ```
    pub fn load<I>(pairs: I) -> (Self, Vec<RoleCycleError>)
    where
        I: IntoIterator<Item = (Role, Role)>,
    {
        let mut table = Self::standard();
        let rejected = pairs
            .into_iter()
            .filter_map(|(container, member)| table.add(container, member).err())
            .collect();
        (table, rejected)
    }

    /// Add a pair, refusing ones that would close a cycle.
    ///
    /// # Errors
    /// [`RoleCycleError`] when [`Self::can_contain`] is false.
    pub fn add(&mut self, container: Role, member: Role) -> Result<(), RoleCycleError> {
        if !self.can_contain(&container, &member) {
            return Err(RoleCycleError { container, member });
        }
        let entry = self.members.entry(container).or_default();
        if !entry.contains(&member) {
            entry.push(member);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    fn role(id: &str) -> Role {
        Role::new(id)
    }

    #[fixture]
    fn chain() -> RoleContainment {
        // foo ⊇ bar ⊇ baz
        RoleContainment::from_pairs([(role("foo"), role("bar")), (role("bar"), role("baz"))])
    }

    #[rstest]
    fn included_roles_is_transitive_and_starts_with_self(chain: RoleContainment) {
        assert_eq!(
            chain.included_roles(&role("foo")),
            vec![role("foo"), role("bar"), role("baz")]
        );
        assert_eq!(chain.included_roles(&role("baz")), vec![role("baz")]);
    }

    #[rstest]
    #[case("foo", "foo")]
    #[case("baz", "foo")]
    #[case("baz", "bar")]
    #[case("bar", "foo")]
    fn cyclic_pairs_are_rejected(chain: RoleContainment, #[case] container: &str, #[case] member: &str) {
        assert!(!chain.can_contain(&role(container), &role(member)));
        let mut table = chain;
        assert!(table.add(role(container), role(member)).is_err());
    }

    #[rstest]
    #[case("foo", "qux")]
    #[case("foo", "baz")]
    #[case("qux", "foo")]
    fn acyclic_pairs_are_accepted(chain: RoleContainment, #[case] container: &str, #[case] member: &str) {
        let mut table = chain;
        assert!(table.add(role(container), role(member)).is_ok());
        assert!(table.included_roles(&role(container)).contains(&role(member)));
    }

    #[rstest]
    fn expansion_terminates_on_a_corrupted_table() {
        let table = RoleContainment::from_pairs([
            (role("a"), role("b")),
            (role("b"), role("c")),
            (role("c"), role("a")),
        ]);
        let expanded = table.expand([role("a")]);
        assert_eq!(expanded.iter().count(), 3);
    }

    #[rstest]
    fn loading_leaves_out_pairs_closing_a_cycle() {
        let (table, rejected) = RoleContainment::load([
            (role("a"), role("b")),
            (role("b"), role("c")),
            (role("c"), role("a")),
            (Role::CONTENT_ADMIN, Role::ADMIN),
            (role("c"), role("d")),
        ]);
        assert_eq!(
            rejected,
            vec![
                RoleCycleError {
                    container: role("c"),
                    member: role("a"),
                },
                RoleCycleError {
                    container: Role::CONTENT_ADMIN,
                    member: Role::ADMIN,
                },
            ]
        );
        assert_eq!(
            table.included_roles(&role("a")),
            vec![role("a"), role("b"), role("c"), role("d")]
        );
        assert!(table.expand([Role::ADMIN]).contains(&Role::CONTENT_ADMIN));
    }

    #[rstest]
    fn standard_admin_contains_every_admin_role() {
        let roles = RoleContainment::standard().expand([Role::ADMIN]);
        assert!(roles.contains(&Role::USER_ADMIN));
        assert!(roles.contains(&Role::CONTENT_ADMIN));
        assert!(roles.contains(&Role::SETTINGS_ADMIN));
        assert!(!roles.contains(&Role::OWNER));
    }
}
