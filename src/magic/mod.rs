//! `%block` and `%blockrun` line magics
//!
//! `%block <name> [-t SECONDS]` waits until the named function returns true,
//! the named value control changes, or the named button is clicked, then
//! replays the cells queued meanwhile.
//!
//! `%blockrun <button> [-t SECONDS]` waits for a click and discards the
//! queued cells. The click itself asks the front end to run every cell
//! below, so a "run all" naturally continues past the button once clicked.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use thiserror::Error;

use crate::capture::CaptureError;
use crate::condition::{
    block_until, parse_timeout, BreakCondition, ClassificationError, TimeoutError, WaitOptions,
    WaitOutcome,
};
use crate::kernel::Engine;
use crate::namespace::{Namespace, UserObject};
use crate::widgets::ControlId;

#[derive(Debug, Error)]
pub enum MagicError {
    #[error("{0}")]
    Usage(#[from] clap::Error),
    #[error("Unknown magic: %{0}")]
    UnknownCommand(String),
    #[error("Name '{0}' is not defined")]
    UnknownName(String),
    #[error("%blockrun expects a button, but '{name}' is a {found}")]
    NotAButton { name: String, found: &'static str },
    #[error(transparent)]
    Classification(#[from] ClassificationError),
    #[error(transparent)]
    Timeout(#[from] TimeoutError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
}

/// Arguments of `%block`
#[derive(Debug, Parser)]
#[command(name = "%block", no_binary_name = true)]
pub struct BlockArgs {
    /// Value control, button, or function that ends the wait
    pub break_value: String,
    /// Timeout in seconds to stop capturing
    #[arg(short, long)]
    pub timeout: Option<String>,
}

/// Arguments of `%blockrun`
#[derive(Debug, Parser)]
#[command(name = "%blockrun", no_binary_name = true)]
pub struct BlockRunArgs {
    /// Button to block on; clicking it runs the cells below
    pub button_control: String,
    /// Timeout in seconds to stop capturing
    #[arg(short, long)]
    pub timeout: Option<String>,
}

pub struct CaptureMagic {
    options: WaitOptions,
    /// Buttons already wired for `%blockrun`, with their clicked flag
    armed: HashMap<ControlId, Arc<AtomicBool>>,
}

impl CaptureMagic {
    /// `options.timeout` is the default used when `-t` is not given
    pub fn new(options: WaitOptions) -> Self {
        Self {
            options,
            armed: HashMap::new(),
        }
    }

    pub fn options(&self) -> &WaitOptions {
        &self.options
    }

    /// Run a magic line such as `%block slider -t 10`.
    ///
    /// Returns `None` when `%blockrun` found its button already clicked.
    pub fn run_line<E: Engine>(
        &mut self,
        engine: &mut E,
        namespace: &Namespace,
        line: &str,
    ) -> Result<Option<WaitOutcome>, MagicError> {
        let line = line.trim();
        let line = line.strip_prefix('%').unwrap_or(line);
        let (command, args) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        match command {
            "block" => self.block(engine, namespace, args).map(Some),
            "blockrun" => self.blockrun(engine, namespace, args),
            other => Err(MagicError::UnknownCommand(other.to_string())),
        }
    }

    pub fn block<E: Engine>(
        &self,
        engine: &mut E,
        namespace: &Namespace,
        args: &str,
    ) -> Result<WaitOutcome, MagicError> {
        let args = BlockArgs::try_parse_from(args.split_whitespace())?;
        let timeout = self.timeout(args.timeout.as_deref())?;
        let object = lookup(namespace, &args.break_value)?;
        let condition = BreakCondition::try_from(object)?;
        let options = self.options.with_timeout(timeout).with_replay(true);
        Ok(block_until(engine, &condition, &options)?)
    }

    pub fn blockrun<E: Engine>(
        &mut self,
        engine: &mut E,
        namespace: &Namespace,
        args: &str,
    ) -> Result<Option<WaitOutcome>, MagicError> {
        let args = BlockRunArgs::try_parse_from(args.split_whitespace())?;
        let timeout = self.timeout(args.timeout.as_deref())?;
        let button = match lookup(namespace, &args.button_control)? {
            UserObject::Button(button) => button,
            other => {
                return Err(MagicError::NotAButton {
                    name: args.button_control,
                    found: other.type_name(),
                })
            }
        };

        let clicked = self
            .armed
            .entry(button.id().clone())
            .or_insert_with(|| {
                let clicked = Arc::new(AtomicBool::new(false));
                let flag = clicked.clone();
                let front_end = engine.front_end();
                button.on_click(move |_| {
                    flag.store(true, Ordering::SeqCst);
                    front_end.execute_cells_below();
                });
                clicked
            })
            .clone();

        if clicked.load(Ordering::SeqCst) {
            tracing::debug!(button = %button.id(), "Button already clicked, not blocking");
            return Ok(None);
        }

        let condition = BreakCondition::predicate(move || clicked.load(Ordering::SeqCst));
        let options = self.options.with_timeout(timeout).with_replay(false);
        Ok(Some(block_until(engine, &condition, &options)?))
    }

    /// Whether `%blockrun` has seen a click on this button
    pub fn has_been_clicked(&self, id: &ControlId) -> bool {
        self.armed
            .get(id)
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    fn timeout(&self, raw: Option<&str>) -> Result<Option<std::time::Duration>, TimeoutError> {
        match raw {
            Some(raw) => parse_timeout(raw).map(Some),
            None => Ok(self.options.timeout),
        }
    }
}

impl Default for CaptureMagic {
    fn default() -> Self {
        Self::new(WaitOptions::default())
    }
}

fn lookup<'a>(namespace: &'a Namespace, name: &str) -> Result<&'a UserObject, MagicError> {
    namespace
        .get(name)
        .ok_or_else(|| MagicError::UnknownName(name.to_string()))
}
