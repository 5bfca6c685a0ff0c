// src/gcode.rs
// Extended command dispatch (`NAME KEY=VALUE ...`).

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use log::debug;
use parking_lot::RwLock;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct CommandError(pub String);

/// A parsed extended command. Parameter names are stored uppercase.
#[derive(Debug, Clone, PartialEq)]
pub struct GCodeCommand {
    pub command: String,
    pub params: HashMap<String, String>,
}

impl GCodeCommand {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params.get(&name.to_uppercase()).map(String::as_str)
    }

    fn get_int_opt(&self, name: &str) -> Result<Option<i64>, CommandError> {
        match self.get(name) {
            None => Ok(None),
            Some(raw) => raw.parse::<i64>().map(Some).map_err(|_| {
                self.error(&format!("Unable to parse '{}' as an integer for {}", raw, name.to_uppercase()))
            }),
        }
    }

    pub fn get_int(&self, name: &str, default: Option<i64>) -> Result<i64, CommandError> {
        self.get_int_opt(name)?
            .or(default)
            .ok_or_else(|| self.error(&format!("missing {}", name.to_uppercase())))
    }

    pub fn error(&self, msg: &str) -> CommandError {
        CommandError(format!("Error on '{}': {}", self.command, msg))
    }
}

pub type GCodeHandler = Box<dyn Fn(&GCodeCommand) -> Result<String, CommandError> + Send + Sync>;

type SharedHandler = Arc<dyn Fn(&GCodeCommand) -> Result<String, CommandError> + Send + Sync>;

struct RegisteredCommand {
    handler: SharedHandler,
    description: Option<String>,
}

#[derive(Default)]
pub struct GCodeDispatcher {
    commands: RwLock<BTreeMap<String, RegisteredCommand>>,
}

impl GCodeDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_command(&self, command: &str, handler: GCodeHandler, description: Option<&str>) {
        let entry = RegisteredCommand {
            handler: Arc::from(handler),
            description: description.map(str::to_string),
        };
        self.commands.write().insert(command.to_uppercase(), entry);
    }

    pub fn help(&self) -> Vec<(String, String)> {
        self.commands
            .read()
            .iter()
            .map(|(name, entry)| (name.clone(), entry.description.clone().unwrap_or_default()))
            .collect()
    }

    /// Splits a line into command and parameters. Blank and comment-only
    /// lines yield `None`.
    pub fn parse_line(line: &str) -> Result<Option<GCodeCommand>, CommandError> {
        let line = line.split(|c: char| c == ';' || c == '#').next().unwrap_or("").trim();
        let mut parts = line.split_whitespace();
        let command = match parts.next() {
            Some(c) => c.to_uppercase(),
            None => return Ok(None),
        };
        let mut params = HashMap::new();
        for part in parts {
            match part.split_once('=') {
                Some((key, value)) if !key.is_empty() => {
                    params.insert(key.to_uppercase(), value.to_string());
                }
                _ => return Err(CommandError(format!("Malformed command '{}'", line))),
            }
        }
        Ok(Some(GCodeCommand { command, params }))
    }

    /// Runs one line and returns the text to show the user.
    pub fn run_script_line(&self, line: &str) -> Result<Option<String>, CommandError> {
        let gcmd = match Self::parse_line(line)? {
            Some(gcmd) => gcmd,
            None => return Ok(None),
        };
        // Release the table before running: handlers may block for a while.
        let handler = self
            .commands
            .read()
            .get(&gcmd.command)
            .map(|entry| Arc::clone(&entry.handler))
            .ok_or_else(|| CommandError(format!("Unknown command: \"{}\"", gcmd.command)))?;
        debug!("dispatching {:?}", gcmd);
        handler(&gcmd).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_extended_command() {
        let gcmd = GCodeDispatcher::parse_line("oams_follower enable=1 Direction=0 ; comment")
            .unwrap()
            .unwrap();
        assert_eq!(gcmd.command, "OAMS_FOLLOWER");
        assert_eq!(gcmd.get("ENABLE"), Some("1"));
        assert_eq!(gcmd.get_int("direction", None), Ok(0));
        assert_eq!(gcmd.get_int_opt("SPOOL"), Ok(None));
        assert_eq!(
            gcmd.get_int("SPOOL", None),
            Err(CommandError("Error on 'OAMS_FOLLOWER': missing SPOOL".to_string()))
        );
    }

    #[test]
    fn parse_blank_and_malformed() {
        assert_eq!(GCodeDispatcher::parse_line("   # just a comment"), Ok(None));
        assert!(GCodeDispatcher::parse_line("OAMS_LOAD_SPOOL 2").is_err());
        let gcmd = GCodeDispatcher::parse_line("OAMS_LOAD_SPOOL SPOOL=two").unwrap().unwrap();
        assert!(gcmd.get_int_opt("SPOOL").is_err());
    }

    #[test]
    fn dispatch_to_registered_handler() {
        let dispatcher = GCodeDispatcher::new();
        dispatcher.register_command(
            "echo_spool",
            Box::new(|gcmd: &GCodeCommand| Ok(format!("spool {}", gcmd.get_int("SPOOL", Some(0))?))),
            Some("Echo the spool index"),
        );
        assert_eq!(dispatcher.run_script_line("ECHO_SPOOL SPOOL=3"), Ok(Some("spool 3".to_string())));
        assert_eq!(dispatcher.run_script_line("echo_spool"), Ok(Some("spool 0".to_string())));
        assert_eq!(dispatcher.run_script_line(""), Ok(None));
        assert!(dispatcher.run_script_line("NOPE").is_err());
        assert_eq!(
            dispatcher.help(),
            vec![("ECHO_SPOOL".to_string(), "Echo the spool index".to_string())]
        );
    }
}
