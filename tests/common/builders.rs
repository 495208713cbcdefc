//! Test data builders for creating test objects

use viewbar::config::ViewBarConfig;
use viewbar::pipeline::{PipelineEvent, PipelineMachine};
use viewbar::session::SerializedStage;
use viewbar::stage::{GrammarRegistry, StageKind};

/// Builder for test configurations
pub struct ConfigBuilder {
    config: ViewBarConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ViewBarConfig::default(),
        }
    }

    pub fn sync_timeout_ms(mut self, ms: u64) -> Self {
        self.config.session.sync_timeout_ms = ms;
        self
    }

    pub fn attach_timeout_ms(mut self, ms: u64) -> Self {
        self.config.session.attach_timeout_ms = ms;
        self
    }

    pub fn default_kind(mut self, kind: StageKind) -> Self {
        self.config.editor.default_kind = kind;
        self
    }

    pub fn bar_focused(mut self, focused: bool) -> Self {
        self.config.editor.bar_focused_on_start = focused;
        self
    }

    pub fn build(self) -> ViewBarConfig {
        self.config
    }
}

/// Serialize stage texts the way a persistence layer would store them
pub fn serialized(texts: &[&str]) -> Vec<SerializedStage> {
    let grammar = GrammarRegistry::new();
    texts
        .iter()
        .map(|text| {
            let (kind, params) = grammar.parse(text, StageKind::Match).unwrap();
            SerializedStage::new(kind, &params)
        })
        .collect()
}

/// Type `text` into the focused slot and commit it
pub fn enter(machine: &mut PipelineMachine, text: &str) {
    machine.handle(PipelineEvent::Input(text.to_string()));
    machine.handle(PipelineEvent::CommitFocused);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .sync_timeout_ms(50)
            .default_kind(StageKind::Limit)
            .bar_focused(false)
            .build();

        assert_eq!(config.session.sync_timeout_ms, 50);
        assert_eq!(config.editor.default_kind, StageKind::Limit);
        assert!(!config.editor.bar_focused_on_start);
    }
}
