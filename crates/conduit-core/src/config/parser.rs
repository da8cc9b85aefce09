//! Reading and writing `conduit.toml`.

use super::schema::ConduitConfig;
use anyhow::{Context, Result};
use std::path::Path;

/// Parse `conduit.toml` at `path`.
pub fn parse_conduit_toml(path: &Path) -> Result<ConduitConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_conduit_toml_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse conduit.toml content from string
pub fn parse_conduit_toml_str(content: &str) -> Result<ConduitConfig> {
    let config: ConduitConfig =
        toml::from_str(content).map_err(|e| toml_error(e, content))?;

    config.validate()?;

    Ok(config)
}

/// Turn a TOML decode error into a message quoting the offending lines.
pub(crate) fn toml_error(error: toml::de::Error, content: &str) -> anyhow::Error {
    let Some(span) = error.span() else {
        return anyhow::anyhow!("TOML parsing error: {}", error.message());
    };
    let offset = span.start.min(content.len());
    let line = content[..offset].matches('\n').count() + 1;
    anyhow::anyhow!(
        "TOML parsing error at line {}:\n{}\n\n{}",
        line,
        excerpt(content, line),
        error.message()
    )
}

/// The error line with one line of context on each side, `>` marking the culprit.
fn excerpt(content: &str, line: usize) -> String {
    let first = line.saturating_sub(1).max(1);
    content
        .lines()
        .enumerate()
        .map(|(idx, text)| (idx + 1, text))
        .skip_while(|(num, _)| *num < first)
        .take_while(|(num, _)| *num <= line + 1)
        .map(|(num, text)| {
            let mark = if num == line { '>' } else { ' ' };
            format!("{mark} {num:>4} | {text}")
        })
        .collect::<Vec<_>>()
        .join("\n")
}
