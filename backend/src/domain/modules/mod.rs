//! Standard modules and the registry wiring them up.

pub mod documentation;
pub mod management;
pub mod mapping;
pub mod news;
pub mod pages;
pub mod panels;
pub mod registration;
pub mod role_sets;
pub mod site_map;
pub mod users;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use super::ports::{RecordStore, RoleRepository};
use super::{Module, ModuleRegistry, PasswordStorage};

pub use documentation::Documentation;
pub use management::ManagementInterface;
pub use pages::Pages;
pub use registration::Registration;
pub use role_sets::RoleSets;
pub use site_map::SiteMap;

/// Shared dependencies of the standard modules.
#[derive(Clone)]
pub struct ModuleDeps {
    /// Generic record storage behind the data modules.
    pub store: Arc<dyn RecordStore>,
    /// Password storage used when writing password fields.
    pub passwords: Arc<dyn PasswordStorage>,
    /// Role containment storage edited by `RoleSets`.
    pub roles: Arc<dyn RoleRepository>,
    /// Documentation directories keyed by component.
    pub doc_dirs: BTreeMap<String, PathBuf>,
}

/// Registry holding every standard module.
#[must_use]
pub fn standard_registry(deps: &ModuleDeps) -> ModuleRegistry {
    let data = |build: fn(Arc<dyn RecordStore>, Arc<dyn PasswordStorage>) -> super::DataModule| {
        let store = Arc::clone(&deps.store);
        let passwords = Arc::clone(&deps.passwords);
        move || Arc::new(build(Arc::clone(&store), Arc::clone(&passwords))) as Arc<dyn Module>
    };
    let doc_dirs = deps.doc_dirs.clone();
    let (store, passwords) = (Arc::clone(&deps.store), Arc::clone(&deps.passwords));
    let roles = Arc::clone(&deps.roles);
    ModuleRegistry::new()
        .register(users::NAME, data(users::module))
        .register(news::NAME, data(news::module))
        .register(mapping::NAME, data(mapping::module))
        .register(panels::NAME, data(panels::module))
        .register(pages::NAME, move || {
            Arc::new(Pages::new(Arc::clone(&store), Arc::clone(&passwords))) as Arc<dyn Module>
        })
        .register(role_sets::NAME, move || {
            Arc::new(RoleSets::new(Arc::clone(&roles))) as Arc<dyn Module>
        })
        .register(documentation::NAME, move || {
            Arc::new(Documentation::new(doc_dirs.clone())) as Arc<dyn Module>
        })
        .register(registration::NAME, || {
            Arc::new(Registration) as Arc<dyn Module>
        })
        .register(site_map::NAME, || Arc::new(SiteMap) as Arc<dyn Module>)
        .register(management::NAME, || {
            Arc::new(ManagementInterface) as Arc<dyn Module>
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PlainTextPasswordStorage;
    use crate::domain::ports::{FixtureRoleRepository, InMemoryRecordStore};
    use rstest::rstest;

    #[rstest]
    fn every_standard_module_is_registered() {
        let registry = standard_registry(&ModuleDeps {
            store: Arc::new(InMemoryRecordStore::default()),
            passwords: Arc::new(PlainTextPasswordStorage),
            roles: Arc::new(FixtureRoleRepository::default()),
            doc_dirs: BTreeMap::new(),
        });
        for name in [
            users::NAME,
            news::NAME,
            mapping::NAME,
            panels::NAME,
            pages::NAME,
            role_sets::NAME,
            documentation::NAME,
            registration::NAME,
            site_map::NAME,
            management::NAME,
        ] {
            let module = registry.module(name).expect("registered");
            assert_eq!(module.name(), name);
        }
        assert!(
            registry
                .module(news::NAME)
                .expect("news")
                .panelizable()
                .is_some()
        );
    }
}
