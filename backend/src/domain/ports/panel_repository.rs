//! Port for reading side panel definitions.

use async_trait::async_trait;

use crate::domain::PanelEntry;

use super::define_port_error;

define_port_error! {
    /// Errors raised by panel repository adapters.
    pub enum PanelRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "panel repository connection failed: {message}",
        /// Query failed during execution.
        Query { message: String } => "panel repository query failed: {message}",
    }
}

/// Read access to the panels table.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PanelRepository: Send + Sync {
    /// Panels defined for `lang`, published or not.
    async fn panels(&self, lang: &str) -> Result<Vec<PanelEntry>, PanelRepositoryError>;
}

/// In-memory panels.
#[derive(Debug, Default, Clone)]
pub struct FixturePanelRepository {
    panels: Vec<PanelEntry>,
}

impl FixturePanelRepository {
    /// Serve `panels`.
    #[must_use]
    pub fn new(panels: Vec<PanelEntry>) -> Self {
        Self { panels }
    }
}

#[async_trait]
impl PanelRepository for FixturePanelRepository {
    async fn panels(&self, lang: &str) -> Result<Vec<PanelEntry>, PanelRepositoryError> {
        Ok(self
            .panels
            .iter()
            .filter(|panel| panel.lang == lang)
            .cloned()
            .collect())
    }
}
