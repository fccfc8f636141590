use crate::app::domain::config::Config;
use crate::app::domain::theme::Theme;

/// Read-only inputs every session renders against. Owned by the app and
/// lent to the tab manager; sessions never keep a copy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionContext {
    pub config: Config,
    pub theme: Theme,
}

impl SessionContext {
    pub fn new(config: Config, theme: Theme) -> Self {
        Self { config, theme }
    }
}
