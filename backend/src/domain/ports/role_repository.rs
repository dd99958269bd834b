//! Port for role assignments and role containment.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::domain::{Role, RoleContainment, RoleCycleError, UserId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by role repository adapters.
    pub enum RoleRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "role repository connection failed: {message}",
        /// Query failed during execution.
        Query { message: String } => "role repository query failed: {message}",
        /// The pair would make containment cyclic and was not stored.
        Cyclic { container: String, member: String } =>
            "role {container} may not contain {member}: containment would be cyclic",
    }
}

/// Access to `role_sets` and `role_members`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RoleRepository: Send + Sync {
    /// Stored `(container, member)` containment pairs.
    async fn containment_pairs(&self) -> Result<Vec<(Role, Role)>, RoleRepositoryError>;

    /// Store `container ⊇ member` unless it would close a cycle with the
    /// standard and the stored pairs.
    async fn add_containment(
        &self,
        container: &Role,
        member: &Role,
    ) -> Result<(), RoleRepositoryError>;

    /// Roles explicitly assigned to `uid`.
    async fn member_roles(&self, uid: UserId) -> Result<Vec<Role>, RoleRepositoryError>;
}

/// Check `container ⊇ member` against the table built from `stored`.
///
/// # Errors
/// [`RoleRepositoryError::Cyclic`] when the pair would close a cycle.
pub fn check_containment(
    stored: Vec<(Role, Role)>,
    container: &Role,
    member: &Role,
) -> Result<(), RoleRepositoryError> {
    let (mut table, _) = RoleContainment::load(stored);
    table
        .add(container.clone(), member.clone())
        .map_err(|RoleCycleError { container, member }| {
            RoleRepositoryError::cyclic(container.id(), member.id())
        })
}

/// In-memory role tables.
#[derive(Debug, Default)]
pub struct FixtureRoleRepository {
    pairs: Mutex<Vec<(Role, Role)>>,
    members: BTreeMap<UserId, Vec<Role>>,
}

impl FixtureRoleRepository {
    /// Add a containment pair as stored, without any check.
    #[must_use]
    pub fn with_pair(self, container: Role, member: Role) -> Self {
        let mut pairs = self.pairs.into_inner().unwrap_or_else(|e| e.into_inner());
        pairs.push((container, member));
        Self {
            pairs: Mutex::new(pairs),
            members: self.members,
        }
    }

    /// Assign `role` to `uid`.
    #[must_use]
    pub fn with_member(mut self, uid: UserId, role: Role) -> Self {
        self.members.entry(uid).or_default().push(role);
        self
    }

    fn pairs(&self) -> Result<MutexGuard<'_, Vec<(Role, Role)>>, RoleRepositoryError> {
        self.pairs
            .lock()
            .map_err(|_| RoleRepositoryError::query("role store poisoned"))
    }
}

#[async_trait]
impl RoleRepository for FixtureRoleRepository {
    async fn containment_pairs(&self) -> Result<Vec<(Role, Role)>, RoleRepositoryError> {
        Ok(self.pairs()?.clone())
    }

    async fn add_containment(
        &self,
        container: &Role,
        member: &Role,
    ) -> Result<(), RoleRepositoryError> {
        let mut pairs = self.pairs()?;
        check_containment(pairs.clone(), container, member)?;
        pairs.push((container.clone(), member.clone()));
        Ok(())
    }

    async fn member_roles(&self, uid: UserId) -> Result<Vec<Role>, RoleRepositoryError> {
        Ok(self.members.get(&uid).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn role(id: &str) -> Role {
        Role::new(id)
    }

    #[rstest]
    #[tokio::test]
    async fn cyclic_pairs_are_refused_before_storing() {
        let repo = FixtureRoleRepository::default().with_pair(role("editors"), role("authors"));

        let err = repo
            .add_containment(&role("authors"), &role("editors"))
            .await
            .expect_err("cycle");
        assert_eq!(err, RoleRepositoryError::cyclic("authors", "editors"));

        let err = repo
            .add_containment(&Role::USER_ADMIN, &Role::ADMIN)
            .await
            .expect_err("cycle through the standard table");
        assert!(matches!(err, RoleRepositoryError::Cyclic { .. }));

        repo.add_containment(&role("authors"), &role("readers"))
            .await
            .expect("acyclic pair");
        assert_eq!(
            repo.containment_pairs().await.expect("pairs"),
            vec![
                (role("editors"), role("authors")),
                (role("authors"), role("readers")),
            ]
        );
    }
}
