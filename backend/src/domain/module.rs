//! Request handling modules and their registry.
//!
//! Modules are looked up by name through an explicit [`ModuleRegistry`] of
//! constructor closures. Instances are created on first use and cached for
//! the lifetime of the registry; capabilities such as [`Panelizable`] are
//! exposed by the module itself rather than inherited.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::debug;

use super::{Content, Document, Error, MenuItem, Request, SiteSettings};

/// What a module handler produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A document rendered by the exporter.
    Document(Document),
    /// Redirect to another URI.
    Redirect(String),
    /// Raw data served as is.
    Data {
        /// MIME type.
        content_type: String,
        /// Payload.
        body: Vec<u8>,
    },
}

/// Request-scoped view of the application handed to modules.
#[derive(Clone, Copy)]
pub struct ModuleContext<'a> {
    /// Registry, for modules forwarding to other modules.
    pub modules: &'a ModuleRegistry,
    /// Site configuration.
    pub settings: &'a SiteSettings,
    /// Menu built for this request.
    pub menu: &'a [MenuItem],
}

/// A named request handler.
#[async_trait]
pub trait Module: Send + Sync {
    /// Registered name.
    fn name(&self) -> &str;

    /// Human readable title.
    fn title(&self) -> &str;

    /// Serve the request; the path up to this module is already consumed.
    async fn handle(&self, req: &mut Request, ctx: &ModuleContext<'_>) -> Result<Outcome, Error>;

    /// The panel capability, if the module has it.
    fn panelizable(&self) -> Option<&dyn Panelizable> {
        None
    }
}

/// Capability of modules able to fill a side panel.
#[async_trait]
pub trait Panelizable: Send + Sync {
    /// Content listing up to `count` recent items; links point below
    /// `base_uri`.
    async fn panelize(
        &self,
        req: &Request,
        base_uri: &str,
        count: usize,
    ) -> Result<Vec<Content>, Error>;
}

/// Constructor closure registered for one module name.
pub type ModuleConstructor = Box<dyn Fn() -> Arc<dyn Module> + Send + Sync>;

/// Name → module registry with a lazily filled instance cache.
///
/// Concurrent first uses may both construct an instance; the last one
/// stored wins, which is harmless as modules hold no per-instance state.
pub struct ModuleRegistry {
    constructors: BTreeMap<String, ModuleConstructor>,
    instances: RwLock<BTreeMap<String, Arc<dyn Module>>>,
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.constructors.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl ModuleRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            constructors: BTreeMap::new(),
            instances: RwLock::new(BTreeMap::new()),
        }
    }

    /// Register `constructor` under `name`, replacing earlier registrations.
    #[must_use]
    pub fn register<F>(mut self, name: &str, constructor: F) -> Self
    where
        F: Fn() -> Arc<dyn Module> + Send + Sync + 'static,
    {
        self.constructors
            .insert(name.to_owned(), Box::new(constructor));
        self
    }

    /// Whether `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Registered names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    /// The instance of module `name`, constructing it on first use.
    ///
    /// # Errors
    /// [`Error::internal`] for unknown names or a poisoned cache.
    pub fn module(&self, name: &str) -> Result<Arc<dyn Module>, Error> {
        {
            let instances = self
                .instances
                .read()
                .map_err(|_| Error::internal("module cache poisoned"))?;
            if let Some(module) = instances.get(name) {
                return Ok(Arc::clone(module));
            }
        }
        let constructor = self
            .constructors
            .get(name)
            .ok_or_else(|| Error::internal(format!("unknown module: {name}")))?;
        debug!(module = name, "instantiating module");
        let module = constructor();
        self.instances
            .write()
            .map_err(|_| Error::internal("module cache poisoned"))?
            .insert(name.to_owned(), Arc::clone(&module));
        Ok(module)
    }
}
