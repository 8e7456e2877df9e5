//! The command-line source: `-D key[=value]` pairs scanned out of argv.

use crate::error::ConfError;
use crate::props::Properties;

/// A captured argv, scanned for the configured option flag (default `-D`).
/// Each occurrence consumes the following argument as a `key[=value]` pair;
/// a pair without `=value` sets `true`.
pub struct CommandArgs {
    option: String,
    args: Vec<String>,
}

impl CommandArgs {
    pub(crate) fn new() -> Self {
        CommandArgs {
            option: "-D".to_string(),
            args: std::env::args().skip(1).collect(),
        }
    }

    /// Replace the option flag that marks a property argument.
    pub fn set_option(&mut self, option: &str) {
        self.option = option.to_string();
    }

    /// Replace the captured argv; tests feed synthetic arguments here.
    pub fn reset(&mut self, args: Vec<String>) {
        self.args = args;
    }

    pub(crate) fn copy_to(&self, out: &mut Properties) -> Result<(), ConfError> {
        for (i, arg) in self.args.iter().enumerate() {
            if *arg != self.option {
                continue;
            }
            let Some(pair) = self.args.get(i + 1) else {
                return Err(ConfError::OptionNeedsArg {
                    option: self.option.clone(),
                });
            };
            let (key, value) = match pair.split_once('=') {
                Some((key, value)) => (key, value),
                None => (pair.as_str(), "true"),
            };
            out.set(key, value)?;
        }
        Ok(())
    }
}
