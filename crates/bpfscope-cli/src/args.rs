//! Command-line surface of the `bpfscope` binary.
//!
//! Objects are selected bpftool-style with a `<kind> <value>` word pair
//! after the subcommand (`prog show id 12`, `map dump name counters`), and
//! keys follow as separate hex byte words (`key 0a 0b 0c 0d`).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use bpfscope_core::{InspectError, MapRef, ProgramRef};

use crate::config::{DEFAULT_PIN_ROOT, PIN_ROOT_ENV};
use crate::hex::parse_hex_bytes;

/// Tool for inspection of eBPF programs and maps.
#[derive(Debug, Parser)]
#[command(name = "bpfscope", version, about = "Tool for inspection of eBPF programs and maps")]
pub struct Cli {
    /// Output in JSON format.
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Output in pretty-printed JSON format (implies --json).
    #[arg(short, long, global = true)]
    pub pretty: bool,

    /// Show the paths objects are pinned at.
    #[arg(short = 'f', long, global = true)]
    pub bpffs: bool,

    /// Mount point of the BPF filesystem.
    #[arg(long, global = true, env = PIN_ROOT_ENV, default_value = DEFAULT_PIN_ROOT)]
    pub pin_root: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Inspect loaded programs.
    Prog {
        #[command(subcommand)]
        command: ProgCommand,
    },
    /// Inspect maps and their contents.
    Map {
        #[command(subcommand)]
        command: MapCommand,
    },
    /// Display version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ProgCommand {
    /// Show all programs, or those matching `id N | tag HEX | name NAME | pinned PATH`.
    #[command(visible_alias = "list")]
    Show {
        #[arg(value_name = "SELECTOR", num_args = 0..=2)]
        selector: Vec<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum MapCommand {
    /// Show all maps, or those matching `id N | name NAME | pinned PATH`.
    #[command(visible_alias = "list")]
    Show {
        #[arg(value_name = "SELECTOR", num_args = 0..=2)]
        selector: Vec<String>,
    },
    /// Dump every entry of a map.
    Dump {
        #[arg(value_name = "SELECTOR", num_args = 2, required = true)]
        selector: Vec<String>,
    },
    /// Look up the value stored under a key: `<selector> key BYTE...`.
    Lookup {
        #[arg(value_name = "ARGS", num_args = 2.., required = true)]
        words: Vec<String>,
    },
    /// Get the first key, or the key after `key BYTE...`.
    Getnext {
        #[arg(value_name = "ARGS", num_args = 2.., required = true)]
        words: Vec<String>,
    },
}

/// A map selector followed by an optional key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyedTarget {
    pub map: MapRef,
    pub key: Option<Vec<u8>>,
}

/// Parses an optional `<kind> <value>` program selector.
pub fn program_selector(words: &[String]) -> Result<Option<ProgramRef>, InspectError> {
    match words {
        [] => Ok(None),
        [kind, value] => ProgramRef::parse(kind, value).map(Some),
        _ => Err(incomplete_selector(words)),
    }
}

/// Parses an optional `<kind> <value>` map selector.
pub fn map_selector(words: &[String]) -> Result<Option<MapRef>, InspectError> {
    match words {
        [] => Ok(None),
        [kind, value] => MapRef::parse(kind, value).map(Some),
        _ => Err(incomplete_selector(words)),
    }
}

/// Parses `<kind> <value> [key BYTE...]`.
///
/// `key` with no bytes counts as no key. With `key_required`, a missing key
/// is rejected.
pub fn keyed_target(words: &[String], key_required: bool) -> Result<KeyedTarget, InspectError> {
    let (selector, rest) = words.split_at(words.len().min(2));
    let map = map_selector(selector)?
        .ok_or_else(|| InspectError::invalid_input("map selector required"))?;

    let key = match rest.split_first() {
        None => None,
        Some((word, bytes)) if word == "key" => {
            Some(parse_hex_bytes(&bytes.join(" "))?).filter(|k| !k.is_empty())
        }
        Some((word, _)) => {
            return Err(InspectError::invalid_input(format!(
                "expected 'key', found '{}'",
                word
            )))
        }
    };
    if key_required && key.is_none() {
        return Err(InspectError::invalid_input("key required: key BYTE..."));
    }
    Ok(KeyedTarget { map, key })
}

fn incomplete_selector(words: &[String]) -> InspectError {
    InspectError::invalid_input(format!(
        "incomplete selector '{}', expected '<kind> <value>'",
        words.join(" ")
    ))
}
