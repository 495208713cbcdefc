//! Tests for the ambient pieces: configuration, key map and errors

mod common;

use common::builders::ConfigBuilder;
use common::mock_helpers::scripted_channel;
use viewbar::config::{Keymap, ViewBarConfig, CONFIG_FILE};
use viewbar::error::{ResultExt, ViewBarError};
use viewbar::pipeline::{KeyAction, KeyChord, PipelineError, PipelineMachine};
use viewbar::stage::StageKind;
use viewbar::types::DatasetId;

#[test]
fn test_infrastructure_setup() {
    let config = ConfigBuilder::new().attach_timeout_ms(10).build();
    assert_eq!(config.session.attach_timeout_ms, 10);

    let (channel, script) = scripted_channel();
    let mut machine = PipelineMachine::new(Box::new(channel), &config);
    machine.attach(DatasetId::new("quickstart")).unwrap();
    assert_eq!(script.requests().len(), 1);
}

#[test]
fn test_keymap_section_replaces_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(CONFIG_FILE);
    std::fs::write(
        &path,
        "[keymap]\n\"Tab\" = \"navigate_right\"\n\"Shift+Tab\" = \"navigate_left\"\n\"Ctrl+Enter\" = \"commit\"\n",
    )
    .unwrap();

    let config = ViewBarConfig::load_from(&path).unwrap();
    assert_eq!(config.keymap.len(), 3);
    assert_eq!(
        config.keymap.resolve(&KeyChord::new("tab").shift()),
        Some(KeyAction::NavigateLeft)
    );
    assert_eq!(
        config.keymap.resolve(&"Ctrl+Enter".parse().unwrap()),
        Some(KeyAction::Commit)
    );
    assert_eq!(config.keymap.resolve(&KeyChord::new("Enter")), None);
}

#[test]
fn test_custom_keymap_drives_machine() {
    let mut config = ViewBarConfig::default();
    let mut keymap = Keymap::empty();
    keymap.bind(KeyChord::new("j"), KeyAction::Commit);
    config.keymap = keymap;

    let (channel, script) = scripted_channel();
    let mut machine = PipelineMachine::new(Box::new(channel), &config);
    machine.attach(DatasetId::new("quickstart")).unwrap();
    script.attach_ok(12);
    machine.poll();

    machine.handle(viewbar::PipelineEvent::Input("limit: 2".to_string()));
    machine.key(&KeyChord::new("Enter"));
    assert!(!machine.list().get(0).unwrap().is_valid());
    machine.key(&KeyChord::new("J"));
    assert!(machine.list().get(0).unwrap().is_valid());
}

#[test]
fn test_invalid_keymap_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(CONFIG_FILE);
    std::fs::write(&path, "[keymap]\n\"Meta+\" = \"commit\"\n").unwrap();
    assert!(matches!(
        ViewBarConfig::load_from(&path),
        Err(ViewBarError::Config(_))
    ));
}

#[test]
fn test_config_roundtrip_keeps_editor_settings() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a").join("b").join(CONFIG_FILE);
    let config = ConfigBuilder::new()
        .default_kind(StageKind::MatchTag)
        .bar_focused(false)
        .build();
    config.save_to(&path).unwrap();
    assert_eq!(ViewBarConfig::load_from(&path).unwrap(), config);
}

#[test]
fn test_error_context_chain() {
    let result: viewbar::Result<()> = Err(PipelineError::NotActive.into());
    let err = result.context("Loading pipeline").unwrap_err();
    assert_eq!(err.to_string(), "Loading pipeline: Pipeline error: Pipeline not active");

    let err = Err::<(), _>(ViewBarError::Timeout("sync 3".into()))
        .with_context(|| format!("Session {}", "quickstart"))
        .unwrap_err();
    assert!(matches!(err, ViewBarError::WithContext { .. }));
}
