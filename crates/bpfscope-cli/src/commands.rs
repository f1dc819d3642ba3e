//! Command execution over any [`Kernel`] backend.
//!
//! [`App`] is the composition root: it owns the services and the pin
//! scanner for one invocation and turns each command into rendered text.

use std::path::Path;
use std::sync::Arc;

use bpfscope_core::{InspectError, MapRef, ProgramRef};
use bpfscope_inspect::{MapService, PinScanner, ProgramService};
use bpfscope_sys::Kernel;

use crate::args::{keyed_target, map_selector, program_selector, Command, MapCommand, ProgCommand};
use crate::config::Config;
use crate::output::Renderer;
use crate::report::CliError;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Services and settings for one invocation.
pub struct App<K: Kernel> {
    programs: ProgramService<K>,
    maps: MapService<K>,
    pins: PinScanner<K>,
    config: Config,
    renderer: Renderer,
}

impl<K: Kernel> App<K> {
    pub fn new(kernel: Arc<K>, config: Config) -> Self {
        App {
            programs: ProgramService::new(kernel.clone()),
            maps: MapService::new(kernel.clone()),
            pins: PinScanner::new(kernel, config.pin_root.clone()),
            renderer: Renderer::new(config.output),
            config,
        }
    }

    /// Runs `command` and returns its rendered output.
    pub fn execute(&self, command: &Command) -> Result<String, CliError> {
        match command {
            Command::Prog {
                command: ProgCommand::Show { selector },
            } => self.show_programs(program_selector(selector)?),
            Command::Map { command } => self.map_command(command),
            Command::Version => Ok(self.renderer.version(VERSION)?),
        }
    }

    fn show_programs(&self, selector: Option<ProgramRef>) -> Result<String, CliError> {
        let pinned = match &selector {
            Some(ProgramRef::Pinned(path)) => Some(path.as_path()),
            _ => None,
        };
        let mut records = match &selector {
            None => empty_if_none_loaded(self.programs.list())?,
            Some(reference) => self
                .programs
                .show(reference)
                .map_err(|e| self.explain(e, pinned))?,
        };
        if self.config.show_pins {
            self.programs.attach_pins(&mut records, &self.pins);
        }
        Ok(self.renderer.programs(&records)?)
    }

    fn map_command(&self, command: &MapCommand) -> Result<String, CliError> {
        match command {
            MapCommand::Show { selector } => {
                let selector = map_selector(selector)?;
                let pinned = match &selector {
                    Some(MapRef::Pinned(path)) => Some(path.as_path()),
                    _ => None,
                };
                let mut records = match &selector {
                    None => empty_if_none_loaded(self.maps.list())?,
                    Some(reference) => self
                        .maps
                        .show(reference)
                        .map_err(|e| self.explain(e, pinned))?,
                };
                if self.config.show_pins {
                    self.maps.attach_pins(&mut records, &self.pins);
                }
                Ok(self.renderer.maps(&records)?)
            }
            MapCommand::Dump { selector } => {
                let reference = map_selector(selector)?
                    .ok_or_else(|| InspectError::invalid_input("map selector required"))?;
                let record = self.resolve(&reference)?;
                let entries = self.maps.dump(record.id)?;
                Ok(self.renderer.entries(&entries)?)
            }
            MapCommand::Lookup { words } => {
                let target = keyed_target(words, true)?;
                let record = self.resolve(&target.map)?;
                let key = target.key.unwrap_or_default();
                let value = self.maps.lookup(record.id, &key)?;
                Ok(self.renderer.entry(&key, &value)?)
            }
            MapCommand::Getnext { words } => {
                let target = keyed_target(words, false)?;
                let record = self.resolve(&target.map)?;
                let next = self.maps.get_next_key(record.id, target.key.as_deref())?;
                Ok(self.renderer.next_key(target.key.as_deref(), &next)?)
            }
        }
    }

    fn resolve(&self, reference: &MapRef) -> Result<bpfscope_core::MapRecord, CliError> {
        let pinned = match reference {
            MapRef::Pinned(path) => Some(path.as_path()),
            _ => None,
        };
        self.maps
            .resolve(reference)
            .map_err(|e| self.explain(e, pinned))
    }

    /// A pinned path under the pin root that is not found because the root
    /// itself is absent means bpffs is not mounted.
    fn explain(&self, err: InspectError, pinned: Option<&Path>) -> CliError {
        let root = &self.config.pin_root;
        let unmounted = pinned.is_some_and(|path| path.starts_with(root)) && !root.exists();
        if unmounted && matches!(err, InspectError::NotFound { .. }) {
            return CliError::BpffsNotMounted {
                root: self.config.pin_root.clone(),
            };
        }
        CliError::Inspect(err)
    }
}

/// Listing an empty ID space shows nothing rather than failing.
fn empty_if_none_loaded<T>(listed: Result<Vec<T>, InspectError>) -> Result<Vec<T>, InspectError> {
    match listed {
        Err(InspectError::NotFound { .. }) => Ok(Vec::new()),
        other => other,
    }
}
