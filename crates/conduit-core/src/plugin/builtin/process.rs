use anyhow::{Context, bail};

use crate::actions::SlaveActions;
use crate::plugin::{PluginVars, Process};

pub const TICKET_TRACKER: &str = "TicketTracker";
pub const REJECT_DUPLICATE: &str = "Ticket_RejectDuplicate";

/// A ticket closed as duplicate on the master closes its slave counterpart.
#[derive(Debug, Clone)]
pub struct CloseDuplicate {
    master_ticket: String,
    slave_ticket: String,
}

impl CloseDuplicate {
    pub fn from_vars(vars: &PluginVars) -> anyhow::Result<Self> {
        Ok(Self {
            master_ticket: vars.require_text("master_ticket")?.to_string(),
            slave_ticket: vars.require_text("slave_ticket")?.to_string(),
        })
    }
}

fn ticket_number(flag: &str, value: &str) -> anyhow::Result<u64> {
    let number: u64 = value
        .trim()
        .parse()
        .with_context(|| format!("--{} must be a ticket number, got '{}'", flag, value))?;
    if number == 0 {
        bail!("--{} must be a positive ticket number", flag);
    }
    Ok(number)
}

impl Process for CloseDuplicate {
    fn run(&self, _args: &[String]) -> anyhow::Result<SlaveActions> {
        let master = ticket_number("master-ticket", &self.master_ticket)?;
        let slave = ticket_number("slave-ticket", &self.slave_ticket)?;
        Ok(SlaveActions::new().with(
            TICKET_TRACKER,
            REJECT_DUPLICATE,
            [master.to_string(), slave.to_string()],
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn process(master: &str, slave: &str) -> CloseDuplicate {
        let vars = PluginVars::new()
            .with_text("master_ticket", master)
            .with_text("slave_ticket", slave);
        CloseDuplicate::from_vars(&vars).unwrap()
    }

    #[test]
    fn test_emits_reject_duplicate() {
        let actions = process("123", "456").run(&[]).unwrap();
        assert_eq!(
            serde_json::to_value(&actions).unwrap(),
            serde_json::json!({"TicketTracker": {"Ticket_RejectDuplicate": [["123", "456"]]}})
        );
    }

    #[test]
    fn test_rejects_non_positive_tickets() {
        assert!(process("0", "456").run(&[]).is_err());
        assert!(process("12a", "456").run(&[]).is_err());
        assert!(process("123", "-4").run(&[]).is_err());
    }
}
