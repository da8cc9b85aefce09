//! Plugin discovery: built-ins, manifests and code registrations.

mod support;

use conduit_core::install::installable_components;
use conduit_core::plugin::{PluginDescriptor, PluginRegistry, PluginVars, VarKind};
use conduit_core::types::Category;

use support::{TestEnv, journal, register_adapter, version};

const ADAPTER: &str = r#"
description = "Reject a duplicate ticket"
author = "Jane Doe"
version = "1.2.0"
command = "trac-action"

[[option]]
name = "trac_env"
mandatory = true
help = "Path of the Trac environment"

[[option]]
name = "verbose"
kind = "flag"
short = "V"
"#;

#[test]
fn test_manifest_adapter_is_discovered() {
    let env = TestEnv::new();
    env.write_manifest("adapter/Trac/TicketTracker/Ticket_RejectDuplicate.toml", ADAPTER);

    let registry = env.app.plugin_registry();
    let descriptor = registry
        .descriptor(Category::Adapter, "Trac/TicketTracker/Ticket_RejectDuplicate")
        .unwrap()
        .expect("adapter registered");

    assert_eq!(descriptor.author, "Jane Doe");
    assert_eq!(descriptor.version, semver::Version::new(1, 2, 0));
    assert_eq!(descriptor.options.len(), 2);
    assert_eq!(descriptor.options[0].long, "trac-env");
    assert!(descriptor.options[0].mandatory);
    assert_eq!(descriptor.options[1].kind, VarKind::Flag);
    assert_eq!(descriptor.options[1].short, Some('V'));
}

#[test]
fn test_adapter_manifest_must_be_a_triple() {
    let env = TestEnv::new();
    env.write_manifest("adapter/Trac/Ticket_RejectDuplicate.toml", ADAPTER);
    env.write_manifest("adapter/Trac/TicketTracker/Nested/Too_Deep.toml", ADAPTER);

    let registry = env.app.plugin_registry();
    assert!(registry.ids(Category::Adapter).is_empty());
}

#[test]
fn test_process_manifests_are_flat() {
    let env = TestEnv::new();
    env.write_manifest(
        "process/Wiki_Rename.toml",
        "[[emit]]\ntool = \"Wiki\"\naction = \"Page_Rename\"\n",
    );
    env.write_manifest(
        "process/nested/Ignored.toml",
        "[[emit]]\ntool = \"Wiki\"\naction = \"Page_Rename\"\n",
    );

    let registry = env.app.plugin_registry();
    let ids = registry.ids(Category::Process);
    assert!(ids.contains(&"Wiki_Rename".to_string()));
    assert!(!ids.iter().any(|id| id.contains("Ignored")));
    assert!(ids.contains(&"Ticket_CloseDuplicate".to_string()));
}

#[test]
fn test_broken_manifest_is_listed_by_id_but_fails_to_load() {
    let env = TestEnv::new();
    env.write_manifest("adapter/Trac/TicketTracker/Ticket_Close.toml", "command = [");
    env.write_manifest("adapter/Trac/TicketTracker/Ticket_RejectDuplicate.toml", ADAPTER);

    let registry = env.app.plugin_registry();
    assert_eq!(registry.ids(Category::Adapter).len(), 2);

    let listed: Vec<String> = registry
        .list(Category::Adapter)
        .into_iter()
        .map(|d| d.id)
        .collect();
    assert_eq!(listed, vec!["Trac/TicketTracker/Ticket_RejectDuplicate"]);

    let err = registry
        .load(
            Category::Adapter,
            "Trac/TicketTracker/Ticket_Close",
            &PluginVars::new(),
            &env.app,
        )
        .unwrap_err();
    assert_eq!(err.category, Category::Adapter);
    assert_eq!(err.id, "Trac/TicketTracker/Ticket_Close");
}

#[test]
fn test_manifest_cannot_shadow_a_builtin() {
    let env = TestEnv::new();
    env.write_manifest(
        "process/Ticket_CloseDuplicate.toml",
        "description = \"impostor\"\n",
    );

    let registry = env.app.plugin_registry();
    let descriptor = registry
        .descriptor(Category::Process, "Ticket_CloseDuplicate")
        .unwrap()
        .unwrap();
    assert_ne!(descriptor.description, "impostor");
}

#[test]
fn test_register_rejects_duplicates_and_invalid_descriptors() {
    let log = journal();
    let mut registry = PluginRegistry::with_builtins();
    register_adapter(&mut registry, "Trac/TicketTracker/Ticket_Close", &log);

    let again = registry.register(
        Category::Adapter,
        PluginDescriptor::new("Trac/TicketTracker/Ticket_Close", version()),
        conduit_core::plugin::builtin::factory(|_| anyhow::bail!("never built")),
    );
    assert!(again.is_err());

    let invalid = registry.register(
        Category::Adapter,
        PluginDescriptor::new("  ", version()),
        conduit_core::plugin::builtin::factory(|_| anyhow::bail!("never built")),
    );
    assert!(invalid.is_err());
}

#[test]
fn test_load_with_wrong_category_is_rejected() {
    let env = TestEnv::new();
    let registry = PluginRegistry::with_builtins();
    assert!(registry.load_sender("Ticket_CloseDuplicate", &env.app).is_err());
    assert!(
        registry
            .load_process("Ticket_CloseDuplicate", &PluginVars::new(), &env.app)
            .is_err(),
        "mandatory variables are missing"
    );
}

#[test]
fn test_installable_components_cover_installable_categories() {
    let registry = PluginRegistry::with_builtins();
    let groups = installable_components(&registry);
    let categories: Vec<Category> = groups.iter().map(|(c, _)| *c).collect();

    assert!(categories.contains(&Category::Server));
    assert!(categories.contains(&Category::Adapter));
    assert!(categories.contains(&Category::Listener));
    assert!(categories.contains(&Category::Provider));
    assert!(!categories.contains(&Category::Process));
    assert!(!categories.contains(&Category::Sender));

    let servers: Vec<String> = groups
        .iter()
        .find(|(c, _)| *c == Category::Server)
        .map(|(_, d)| d.iter().map(|d| d.id.clone()).collect())
        .unwrap();
    assert_eq!(servers, vec!["Master", "Slave"]);
}
