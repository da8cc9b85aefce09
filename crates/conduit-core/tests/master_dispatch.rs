//! Master dispatch: process selection, tool filtering and per-client outcomes.

mod support;

use conduit_core::actions::SlaveActions;
use conduit_core::config::RegisteredSlaveClient;
use conduit_core::error::ConduitError;
use conduit_core::master::MasterDispatch;
use conduit_core::plugin::PluginRegistry;

use support::{TestEnv, deliveries, outbox, register_sender};

const EVENT: &str = "Ticket_CloseDuplicate";

fn args(master: &str, slave: &str) -> Vec<String> {
    vec![
        "--master-ticket".to_string(),
        master.to_string(),
        "--slave-ticket".to_string(),
        slave.to_string(),
    ]
}

fn expected_actions() -> SlaveActions {
    SlaveActions::new().with("TicketTracker", "Ticket_RejectDuplicate", ["123", "456"])
}

#[test]
fn test_delivers_relevant_actions_and_skips_others() {
    let env = TestEnv::new();
    let sent = outbox();
    let mut registry = PluginRegistry::with_builtins();
    register_sender(&mut registry, "Recorder", &sent);

    let clients = vec![
        RegisteredSlaveClient::new("tickets", "Recorder", ["TicketTracker"])
            .with_param("url", "http://a"),
        RegisteredSlaveClient::new("wiki", "Recorder", ["Wiki"]),
        RegisteredSlaveClient::new("everything", "Recorder", ["*"]),
    ];
    let dispatch = MasterDispatch::new(&registry, &env.app, clients);

    let report = dispatch.execute(EVENT, "jane", &args("123", "456")).unwrap();
    assert_eq!(report.event, EVENT);
    assert_eq!(report.actions, 1);
    assert_eq!(report.delivered, vec!["tickets", "everything"]);
    assert_eq!(report.skipped, vec!["wiki"]);
    assert!(report.failed.is_empty());

    let sent = deliveries(&sent);
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].user, "jane");
    assert_eq!(sent[0].actions, expected_actions());
    assert_eq!(sent[0].params.get("url").map(String::as_str), Some("http://a"));
}

#[test]
fn test_one_failing_client_does_not_stop_the_others() {
    let env = TestEnv::new();
    let sent = outbox();
    let mut registry = PluginRegistry::with_builtins();
    register_sender(&mut registry, "Recorder", &sent);

    let clients = vec![
        RegisteredSlaveClient::new("down", "Recorder", ["*"]).with_param("fail", "http://down"),
        RegisteredSlaveClient::new("up", "Recorder", ["*"]),
    ];
    let dispatch = MasterDispatch::new(&registry, &env.app, clients);

    let err = dispatch.execute(EVENT, "jane", &args("123", "456")).unwrap_err();
    match &err {
        ConduitError::ClientsFailed { failures, report } => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].client, "down");
            assert!(matches!(*failures[0].error, ConduitError::Transport { .. }));
            assert_eq!(report.delivered, vec!["up"]);
            assert_eq!(report.failed, vec!["down"]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.exit_code(), 11);
    assert_eq!(deliveries(&sent).len(), 1);
}

#[test]
fn test_unknown_sender_fails_only_its_client() {
    let env = TestEnv::new();
    let sent = outbox();
    let mut registry = PluginRegistry::with_builtins();
    register_sender(&mut registry, "Recorder", &sent);

    let clients = vec![
        RegisteredSlaveClient::new("pigeon", "CarrierPigeon", ["*"]),
        RegisteredSlaveClient::new("up", "Recorder", ["*"]),
    ];
    let dispatch = MasterDispatch::new(&registry, &env.app, clients);

    let err = dispatch.execute(EVENT, "jane", &args("1", "2")).unwrap_err();
    match err {
        ConduitError::ClientsFailed { failures, report } => {
            assert_eq!(failures[0].client, "pigeon");
            assert!(matches!(*failures[0].error, ConduitError::PluginLoad(_)));
            assert_eq!(report.delivered, vec!["up"]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_no_clients_is_not_an_error() {
    let env = TestEnv::new();
    let registry = PluginRegistry::with_builtins();
    let dispatch = MasterDispatch::new(&registry, &env.app, Vec::new());

    let report = dispatch.execute(EVENT, "jane", &args("1", "2")).unwrap();
    assert_eq!(report.actions, 1);
    assert!(report.delivered.is_empty());
}

#[test]
fn test_unknown_event() {
    let env = TestEnv::new();
    let registry = PluginRegistry::with_builtins();
    let dispatch = MasterDispatch::new(&registry, &env.app, Vec::new());

    let err = dispatch.execute("Wiki_Rename", "jane", &[]).unwrap_err();
    match err {
        ConduitError::UnknownProcess { event } => assert_eq!(event, "Wiki_Rename"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_missing_process_option_is_reported_before_delivery() {
    let env = TestEnv::new();
    let sent = outbox();
    let mut registry = PluginRegistry::with_builtins();
    register_sender(&mut registry, "Recorder", &sent);
    let clients = vec![RegisteredSlaveClient::new("up", "Recorder", ["*"])];
    let dispatch = MasterDispatch::new(&registry, &env.app, clients);

    let err = dispatch
        .execute(EVENT, "jane", &["--master-ticket".to_string(), "1".to_string()])
        .unwrap_err();
    match err {
        ConduitError::CommandLine { message, .. } => {
            assert!(message.contains("--slave-ticket"), "{message}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(deliveries(&sent).is_empty());
}

#[test]
fn test_empty_user_is_rejected() {
    let env = TestEnv::new();
    let registry = PluginRegistry::with_builtins();
    let dispatch = MasterDispatch::new(&registry, &env.app, Vec::new());

    let err = dispatch.execute(EVENT, "  ", &args("1", "2")).unwrap_err();
    assert!(matches!(err, ConduitError::CommandLine { .. }), "{err:?}");
}

#[test]
fn test_process_failure() {
    let env = TestEnv::new();
    let registry = PluginRegistry::with_builtins();
    let dispatch = MasterDispatch::new(&registry, &env.app, Vec::new());

    let err = dispatch.execute(EVENT, "jane", &args("abc", "2")).unwrap_err();
    match err {
        ConduitError::ProcessFailed { event, source } => {
            assert_eq!(event, EVENT);
            assert!(source.to_string().contains("--master-ticket"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_manifest_process_receives_positional_args() {
    let env = TestEnv::new();
    env.write_manifest(
        "process/Wiki_Rename.toml",
        r#"
description = "Rename a wiki page on every slave"

[[option]]
name = "page"
mandatory = true

[[emit]]
tool = "Wiki"
action = "Page_Rename"
params = ["{page}", "{0}"]
"#,
    );
    let sent = outbox();
    let mut registry = env.app.plugin_registry();
    register_sender(&mut registry, "Recorder", &sent);
    let clients = vec![RegisteredSlaveClient::new("wiki", "Recorder", ["Wiki"])];
    let dispatch = MasterDispatch::new(&registry, &env.app, clients);

    let args = ["--page", "Home", "Start"].map(String::from);
    let report = dispatch.execute("Wiki_Rename", "jane", &args).unwrap();
    assert_eq!(report.delivered, vec!["wiki"]);
    assert_eq!(
        deliveries(&sent)[0].actions,
        SlaveActions::new().with("Wiki", "Page_Rename", ["Home", "Start"])
    );
}

#[test]
fn test_from_config_reads_slave_clients() {
    let env = TestEnv::new();
    let config_path = env.app.config_store().config_path().to_path_buf();
    std::fs::create_dir_all(config_path.parent().unwrap()).unwrap();
    std::fs::write(
        &config_path,
        r#"
[[slave]]
type = "Local"
tools = ["*"]

[[slave]]
name = "remote"
type = "ExternalCGIPost"
tools = ["TicketTracker"]

[slave.params]
url = "http://slave.example.org/cgi-bin/conduit-slave.cgi"
timeout_secs = 5
"#,
    )
    .unwrap();
    let registry = PluginRegistry::with_builtins();

    let dispatch = MasterDispatch::from_config(&registry, &env.app).unwrap();
    let clients = dispatch.clients();
    assert_eq!(clients.len(), 2);
    assert_eq!(clients[0].name, "Local#1");
    assert_eq!(clients[1].name, "remote");
    assert_eq!(
        clients[1].params.get("timeout_secs").map(String::as_str),
        Some("5")
    );
}
