//! Composition of plugin variables into a single command-line parser.
//!
//! Each plugin declares its variables independently. The composer merges the
//! declarations of every plugin taking part in one invocation (a component and
//! its provider, or a single process) into one `clap::Command`, binding every
//! flag back to the plugin that declared it. Two plugins claiming the same flag
//! is a configuration error reported at composition time.

use std::collections::BTreeMap;

use clap::{Arg, ArgAction, ArgMatches, Command};
use serde::{Deserialize, Serialize};

use crate::error::ConduitError;
use crate::plugin::descriptor::{PluginDescriptor, VarKind, VarOption};

const POSITIONAL_ID: &str = "__positional";

/// A value bound to a plugin variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VarValue {
    Flag(bool),
    Text(String),
    List(Vec<String>),
}

/// Variables bound for one plugin instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PluginVars {
    values: BTreeMap<String, VarValue>,
}

impl PluginVars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: VarValue) {
        self.values.insert(name.into(), value);
    }

    /// Builder-style insert of a text value.
    pub fn with_text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, VarValue::Text(value.into()));
        self
    }

    pub fn get(&self, name: &str) -> Option<&VarValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(VarValue::Text(value)) => Some(value),
            Some(VarValue::List(values)) => values.last().map(String::as_str),
            _ => None,
        }
    }

    pub fn flag(&self, name: &str) -> bool {
        matches!(self.values.get(name), Some(VarValue::Flag(true)))
    }

    pub fn list(&self, name: &str) -> Vec<String> {
        match self.values.get(name) {
            Some(VarValue::List(values)) => values.clone(),
            Some(VarValue::Text(value)) => vec![value.clone()],
            _ => Vec::new(),
        }
    }

    /// Text value of a variable the plugin cannot work without.
    pub fn require_text(&self, name: &str) -> anyhow::Result<&str> {
        self.text(name)
            .ok_or_else(|| anyhow::anyhow!("variable '{}' is not bound", name))
    }

    /// Render a variable for template substitution.
    pub fn render(&self, name: &str) -> Option<String> {
        match self.values.get(name)? {
            VarValue::Flag(value) => Some(value.to_string()),
            VarValue::Text(value) => Some(value.clone()),
            VarValue::List(values) => Some(values.join(",")),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &VarValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Mandatory options of `descriptor` that have no bound value.
    pub fn missing<'a>(&self, descriptor: &'a PluginDescriptor) -> Vec<&'a VarOption> {
        descriptor
            .mandatory_options()
            .filter(|option| !self.contains(&option.name))
            .collect()
    }
}

/// Builds a [`ComposedOptions`] parser from plugin descriptors.
#[derive(Debug, Clone)]
pub struct OptionComposer {
    name: String,
    reserved_long: BTreeMap<String, String>,
    reserved_short: BTreeMap<char, String>,
    positional: bool,
}

impl OptionComposer {
    pub fn new(name: impl Into<String>) -> Self {
        let mut composer = Self {
            name: name.into(),
            reserved_long: BTreeMap::new(),
            reserved_short: BTreeMap::new(),
            positional: false,
        };
        composer = composer.reserve("help", Some('h'), "the help flag");
        composer
    }

    /// Reserve a flag owned by the host command so no plugin can claim it.
    pub fn reserve(mut self, long: &str, short: Option<char>, owner: &str) -> Self {
        self.reserved_long.insert(long.to_string(), owner.to_string());
        if let Some(short) = short {
            self.reserved_short.insert(short, owner.to_string());
        }
        self
    }

    /// Collect arguments no option claims as positional arguments.
    pub fn allow_positional(mut self) -> Self {
        self.positional = true;
        self
    }

    pub fn compose(&self, descriptors: &[&PluginDescriptor]) -> Result<ComposedOptions, ConduitError> {
        let mut long_owners = self.reserved_long.clone();
        let mut short_owners = self.reserved_short.clone();
        let mut command = Command::new(self.name.clone())
            .no_binary_name(true)
            .disable_version_flag(true);
        let mut bindings = Vec::new();

        for descriptor in descriptors {
            let owner = format!("plugin '{}'", descriptor.id);
            for option in &descriptor.options {
                if let Some(first) = long_owners.get(&option.long) {
                    return Err(collision(&format!("--{}", option.long), first, &owner));
                }
                long_owners.insert(option.long.clone(), owner.clone());
                if let Some(short) = option.short {
                    if let Some(first) = short_owners.get(&short) {
                        return Err(collision(&format!("-{}", short), first, &owner));
                    }
                    short_owners.insert(short, owner.clone());
                }

                let arg_id = format!("{}::{}", descriptor.id, option.name);
                command = command.arg(build_arg(&arg_id, &descriptor.id, option));
                bindings.push(Binding {
                    plugin: descriptor.id.clone(),
                    option: option.clone(),
                    arg_id,
                });
            }
        }

        if self.positional {
            command = command.arg(
                Arg::new(POSITIONAL_ID)
                    .value_name("ARGS")
                    .num_args(0..)
                    .trailing_var_arg(true)
                    .allow_hyphen_values(true)
                    .action(ArgAction::Append),
            );
        }

        Ok(ComposedOptions {
            command,
            bindings,
            descriptors: descriptors.iter().map(|d| (*d).clone()).collect(),
        })
    }
}

fn collision(flag: &str, first: &str, second: &str) -> ConduitError {
    ConduitError::Config(anyhow::anyhow!(
        "flag {} is claimed by both {} and {}",
        flag,
        first,
        second
    ))
}

fn build_arg(arg_id: &str, plugin: &str, option: &VarOption) -> Arg {
    let mut help = if option.help.is_empty() {
        format!("[{}]", plugin)
    } else {
        format!("[{}] {}", plugin, option.help)
    };
    if option.mandatory {
        help.push_str(" (mandatory)");
    }

    let mut arg = Arg::new(arg_id.to_string())
        .long(option.long.clone())
        .help(help);
    if let Some(short) = option.short {
        arg = arg.short(short);
    }
    match option.kind {
        VarKind::Flag => arg.action(ArgAction::SetTrue),
        VarKind::Value => arg
            .action(ArgAction::Set)
            .value_name(option.name.to_uppercase()),
        VarKind::List => arg
            .action(ArgAction::Append)
            .value_name(option.name.to_uppercase()),
    }
}

#[derive(Debug, Clone)]
struct Binding {
    plugin: String,
    option: VarOption,
    arg_id: String,
}

/// A merged parser for the variables of several plugins.
#[derive(Debug, Clone)]
pub struct ComposedOptions {
    command: Command,
    bindings: Vec<Binding>,
    descriptors: Vec<PluginDescriptor>,
}

/// Result of parsing arguments with a [`ComposedOptions`].
#[derive(Debug, Clone, Default)]
pub struct ParsedOptions {
    vars: BTreeMap<String, PluginVars>,
    positional: Vec<String>,
}

impl ParsedOptions {
    /// Variables bound for `plugin`; empty when it declared none.
    pub fn vars_for(&self, plugin: &str) -> PluginVars {
        self.vars.get(plugin).cloned().unwrap_or_default()
    }

    pub fn positional(&self) -> &[String] {
        &self.positional
    }
}

impl ComposedOptions {
    /// Help text listing every composed flag.
    pub fn usage(&self) -> String {
        self.command.clone().render_help().to_string()
    }

    /// Parse `args`, applying declared defaults to absent variables.
    pub fn parse<I, S>(&self, args: I) -> Result<ParsedOptions, ConduitError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        let matches = self
            .command
            .clone()
            .try_get_matches_from(args)
            .map_err(|err| ConduitError::CommandLine {
                message: err.to_string().trim_end().to_string(),
                usage: Some(self.usage()),
            })?;

        let mut parsed = ParsedOptions::default();
        for descriptor in &self.descriptors {
            parsed.vars.entry(descriptor.id.clone()).or_default();
        }
        for binding in &self.bindings {
            if let Some(value) = bound_value(&matches, binding) {
                parsed
                    .vars
                    .entry(binding.plugin.clone())
                    .or_default()
                    .insert(binding.option.name.clone(), value);
            }
        }
        if let Ok(Some(values)) = matches.try_get_many::<String>(POSITIONAL_ID) {
            parsed.positional = values.cloned().collect();
        }
        Ok(parsed)
    }

    /// Fail with every unbound mandatory flag across all composed plugins.
    pub fn check_mandatory(&self, parsed: &ParsedOptions) -> Result<(), ConduitError> {
        let missing: Vec<String> = self
            .descriptors
            .iter()
            .flat_map(|descriptor| {
                let vars = parsed.vars.get(&descriptor.id);
                descriptor
                    .mandatory_options()
                    .filter(move |option| !vars.is_some_and(|v| v.contains(&option.name)))
                    .map(|option| option.flag_display())
            })
            .collect();

        if missing.is_empty() {
            return Ok(());
        }
        Err(ConduitError::CommandLine {
            message: format!("missing mandatory option(s): {}", missing.join(", ")),
            usage: Some(self.usage()),
        })
    }
}

fn bound_value(matches: &ArgMatches, binding: &Binding) -> Option<VarValue> {
    let id = binding.arg_id.as_str();
    let option = &binding.option;
    match option.kind {
        VarKind::Flag => matches.get_flag(id).then_some(VarValue::Flag(true)),
        VarKind::Value => matches
            .get_one::<String>(id)
            .cloned()
            .or_else(|| option.default.clone())
            .map(VarValue::Text),
        VarKind::List => {
            let values: Vec<String> = matches
                .get_many::<String>(id)
                .map(|values| values.cloned().collect())
                .unwrap_or_default();
            if !values.is_empty() {
                Some(VarValue::List(values))
            } else {
                option.default.clone().map(|d| VarValue::List(vec![d]))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> PluginDescriptor {
        PluginDescriptor::new("Local", semver::Version::new(1, 0, 0))
            .with_option(VarOption::value("persistent_dir", "state directory").with_default("/var/lib/conduit"))
            .with_option(VarOption::value("cgi_url", "base URL"))
    }

    fn adapter() -> PluginDescriptor {
        PluginDescriptor::new("Trac/TicketTracker/Ticket_RejectDuplicate", semver::Version::new(1, 0, 0))
            .with_option(VarOption::value("database", "database file").mandatory())
            .with_option(VarOption::list("tag", "extra tag"))
            .with_option(VarOption::flag("dry_run", "do nothing"))
    }

    #[test]
    fn test_compose_binds_flags_per_plugin() {
        let provider = provider();
        let adapter = adapter();
        let composed = OptionComposer::new("install")
            .compose(&[&adapter, &provider])
            .unwrap();

        let parsed = composed
            .parse(["--database", "/srv/trac.db", "--tag", "a", "--tag", "b", "--dry-run"])
            .unwrap();
        let vars = parsed.vars_for(&adapter.id);
        assert_eq!(vars.text("database"), Some("/srv/trac.db"));
        assert_eq!(vars.list("tag"), vec!["a", "b"]);
        assert!(vars.flag("dry_run"));

        let provider_vars = parsed.vars_for("Local");
        assert_eq!(provider_vars.text("persistent_dir"), Some("/var/lib/conduit"));
        assert!(!provider_vars.contains("cgi_url"));
    }

    #[test]
    fn test_compose_rejects_colliding_flags() {
        let first = provider();
        let second = PluginDescriptor::new("Other", semver::Version::new(1, 0, 0))
            .with_option(VarOption::value("url", "").with_long("cgi-url"));
        let err = OptionComposer::new("install")
            .compose(&[&first, &second])
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("--cgi-url"), "{msg}");
        assert!(msg.contains("Local") && msg.contains("Other"), "{msg}");
    }

    #[test]
    fn test_compose_rejects_reserved_host_flag() {
        let plugin = PluginDescriptor::new("Greedy", semver::Version::new(1, 0, 0))
            .with_option(VarOption::flag("force", "").with_short('f'));
        let result = OptionComposer::new("install")
            .reserve("force", Some('f'), "conduit-install")
            .compose(&[&plugin]);
        assert!(result.is_err());
    }

    #[test]
    fn test_check_mandatory_lists_missing_flags() {
        let adapter = adapter();
        let composed = OptionComposer::new("install").compose(&[&adapter]).unwrap();
        let parsed = composed.parse(Vec::<String>::new()).unwrap();
        let err = composed.check_mandatory(&parsed).unwrap_err();
        match err {
            ConduitError::CommandLine { message, usage } => {
                assert!(message.contains("--database"));
                assert!(usage.is_some());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_flag_is_a_command_line_error() {
        let adapter = adapter();
        let composed = OptionComposer::new("install").compose(&[&adapter]).unwrap();
        let err = composed.parse(["--nope"]).unwrap_err();
        assert!(matches!(err, ConduitError::CommandLine { .. }));
    }

    #[test]
    fn test_positional_leftovers_are_collected() {
        let process = PluginDescriptor::new("Ticket_CloseDuplicate", semver::Version::new(1, 0, 0))
            .with_option(VarOption::value("master_ticket", "").mandatory());
        let composed = OptionComposer::new("dispatch")
            .allow_positional()
            .compose(&[&process])
            .unwrap();
        let parsed = composed
            .parse(["--master-ticket", "123", "extra", "more"])
            .unwrap();
        assert_eq!(parsed.vars_for("Ticket_CloseDuplicate").text("master_ticket"), Some("123"));
        assert_eq!(parsed.positional(), ["extra".to_string(), "more".to_string()]);
    }

    #[test]
    fn test_plugin_vars_serialize_as_plain_map() {
        let mut vars = PluginVars::new().with_text("database", "/srv/trac.db");
        vars.insert("dry_run", VarValue::Flag(true));
        vars.insert("tag", VarValue::List(vec!["a".into()]));
        let json = serde_json::to_value(&vars).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"database": "/srv/trac.db", "dry_run": true, "tag": ["a"]})
        );
        let back: PluginVars = serde_json::from_value(json).unwrap();
        assert_eq!(back, vars);
    }
}
