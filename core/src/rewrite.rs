//! Mutations over a [`ParsedCommand`].
//!
//! Every operation edits the token list, renders it back to arguments and
//! reparses the whole command. The command is only replaced once the final
//! reparse succeeds, so a failed mutation leaves it as it was.

use std::collections::BTreeSet;

use tracing::debug;

use crate::command::{OptionToken, ParsedCommand, Token, ValueStyle};
use crate::error::CommandError;

impl ParsedCommand {
    /// Replaces every occurrence of the option `flag` refers to with a
    /// single occurrence placed right after the sub-command path.
    ///
    /// `value` is required for options that take one. For valueless options
    /// it is written as `--flag=value`.
    ///
    /// # Errors
    ///
    /// Fails if the flag is ambiguous or unknown (in strict mode), if a
    /// required value is missing, or if the resulting command no longer
    /// parses.
    pub fn set_option(&mut self, flag: &str, value: Option<&str>) -> Result<(), CommandError> {
        let mut next = self.clone();
        next.remove_option(flag)?;
        next.insert_option(flag, value)?;
        debug!(flag, ?value, "Set option");
        *self = next;
        Ok(())
    }

    pub fn set_option_str(&mut self, flag: &str, value: &str) -> Result<(), CommandError> {
        self.set_option(flag, Some(value))
    }

    /// Sets a boolean flag: a bare flag for `true`, `--flag=false` for
    /// `false`.
    pub fn set_option_bool(&mut self, flag: &str, value: bool) -> Result<(), CommandError> {
        if value {
            self.set_option(flag, None)
        } else {
            self.set_option(flag, Some("false"))
        }
    }

    /// Adds one occurrence right after the sub-command path, keeping any
    /// existing ones.
    pub fn insert_option(&mut self, flag: &str, value: Option<&str>) -> Result<(), CommandError> {
        let descriptor = self.resolver().resolve(self.final_topic_id(), flag)?;

        let takes_value = descriptor.as_ref().is_some_and(|d| d.has_value());
        let token = match value {
            None if takes_value => {
                return Err(CommandError::MalformedInvocation(format!(
                    "option '{flag}' requires a value"
                )));
            }
            None => OptionToken::bare(flag, descriptor),
            Some(value) if takes_value => OptionToken {
                flag: flag.to_string(),
                value: Some(value.to_string()),
                style: ValueStyle::Separate,
                descriptor,
            },
            Some(value) => {
                // A value on a valueless flag only survives reparsing as
                // `--long=value`.
                let spelling = descriptor
                    .as_ref()
                    .map_or(flag, |d| d.canonical_flag())
                    .to_string();
                if !spelling.starts_with("--") {
                    return Err(CommandError::MalformedInvocation(format!(
                        "option '{flag}' does not take a value"
                    )));
                }
                OptionToken {
                    flag: spelling,
                    value: Some(value.to_string()),
                    style: ValueStyle::Attached,
                    descriptor,
                }
            }
        };

        let mut tokens = self.tokens.clone();
        tokens.insert(self.subcommand_token_index(), Token::Option(token));
        self.apply(tokens)
    }

    /// Removes every occurrence of the option `flag` refers to, under any of
    /// its synonyms. Returns whether anything was removed.
    pub fn remove_option(&mut self, flag: &str) -> Result<bool, CommandError> {
        let synonyms = match self.resolver().allow_unknown(true).resolve(self.final_topic_id(), flag)? {
            Some(descriptor) => descriptor.flags().to_vec(),
            None => vec![flag.to_string()],
        };

        let doomed: BTreeSet<usize> = synonyms
            .iter()
            .flat_map(|synonym| self.option_token_indices(synonym).iter().copied())
            .collect();
        if doomed.is_empty() {
            return Ok(false);
        }

        let tokens = self
            .tokens
            .iter()
            .enumerate()
            .filter(|(idx, _)| !doomed.contains(idx))
            .map(|(_, token)| token.clone())
            .collect();
        self.apply(tokens)?;
        Ok(true)
    }

    /// Removes a boolean flag and reports its value, `None` if absent.
    pub fn take_option_bool(&mut self, flag: &str) -> Result<Option<bool>, CommandError> {
        let value = self.get_option_bool(flag)?;
        if value.is_some() {
            self.remove_option(flag)?;
        }
        Ok(value)
    }

    /// Removes an option and returns the value of its last occurrence.
    pub fn take_option_str(&mut self, flag: &str) -> Result<Option<String>, CommandError> {
        let value = self.get_option_str(flag).map(String::from);
        self.remove_option(flag)?;
        Ok(value)
    }

    fn apply(&mut self, tokens: Vec<Token>) -> Result<(), CommandError> {
        let mut args = Vec::with_capacity(tokens.len());
        for token in &tokens {
            token.push_args(&mut args);
        }
        self.reparse(&args)
    }
}
