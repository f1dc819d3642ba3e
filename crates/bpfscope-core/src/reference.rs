//! References a caller uses to name a program or map.
//!
//! Both parse from the `<kind> <value>` pair used on the command line
//! (`id 12`, `tag f0055c08993fea1e`, `name counters`, `pinned /sys/fs/bpf/x`).
//! Malformed values are rejected here, before any kernel call.

use std::fmt;
use std::path::PathBuf;

use crate::error::InspectError;
use crate::id::{MapId, ProgramId};
use crate::record::TAG_LEN;

/// How a program is identified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramRef {
    Id(ProgramId),
    Tag([u8; TAG_LEN]),
    Name(String),
    Pinned(PathBuf),
}

/// How a map is identified. Maps have no tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapRef {
    Id(MapId),
    Name(String),
    Pinned(PathBuf),
}

impl ProgramRef {
    pub fn parse(kind: &str, value: &str) -> Result<Self, InspectError> {
        match kind {
            "id" => parse_id(value, "program").map(|id| ProgramRef::Id(ProgramId(id))),
            "tag" => parse_tag(value).map(ProgramRef::Tag),
            "name" => parse_name(value).map(ProgramRef::Name),
            "pinned" => parse_path(value).map(ProgramRef::Pinned),
            other => Err(InspectError::invalid_input(format!(
                "invalid program identifier '{}', expected 'id', 'tag', 'name' or 'pinned'",
                other
            ))),
        }
    }
}

impl MapRef {
    pub fn parse(kind: &str, value: &str) -> Result<Self, InspectError> {
        match kind {
            "id" => parse_id(value, "map").map(|id| MapRef::Id(MapId(id))),
            "name" => parse_name(value).map(MapRef::Name),
            "pinned" => parse_path(value).map(MapRef::Pinned),
            other => Err(InspectError::invalid_input(format!(
                "invalid map identifier '{}', expected 'id', 'name' or 'pinned'",
                other
            ))),
        }
    }
}

impl fmt::Display for ProgramRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgramRef::Id(id) => write!(f, "program {}", id),
            ProgramRef::Tag(tag) => write!(f, "program with tag {}", hex::encode(tag)),
            ProgramRef::Name(name) => write!(f, "program named {}", name),
            ProgramRef::Pinned(path) => write!(f, "program pinned at {}", path.display()),
        }
    }
}

impl fmt::Display for MapRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapRef::Id(id) => write!(f, "map {}", id),
            MapRef::Name(name) => write!(f, "map named {}", name),
            MapRef::Pinned(path) => write!(f, "map pinned at {}", path.display()),
        }
    }
}

fn parse_id(value: &str, what: &str) -> Result<u32, InspectError> {
    value
        .parse::<u32>()
        .map_err(|_| InspectError::invalid_input(format!("invalid {} ID: {}", what, value)))
}

fn parse_tag(value: &str) -> Result<[u8; TAG_LEN], InspectError> {
    let bytes = hex::decode(value)
        .map_err(|e| InspectError::invalid_input(format!("invalid tag '{}': {}", value, e)))?;
    <[u8; TAG_LEN]>::try_from(bytes.as_slice()).map_err(|_| {
        InspectError::invalid_input(format!(
            "invalid tag '{}': expected {} bytes, got {}",
            value,
            TAG_LEN,
            bytes.len()
        ))
    })
}

fn parse_name(value: &str) -> Result<String, InspectError> {
    if value.is_empty() {
        return Err(InspectError::invalid_input("name must not be empty"));
    }
    Ok(value.to_string())
}

fn parse_path(value: &str) -> Result<PathBuf, InspectError> {
    if value.is_empty() {
        return Err(InspectError::invalid_input("pinned path must not be empty"));
    }
    Ok(PathBuf::from(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_program_references() {
        assert_eq!(
            ProgramRef::parse("id", "123").unwrap(),
            ProgramRef::Id(ProgramId(123))
        );
        assert_eq!(
            ProgramRef::parse("tag", "f0055c08993fea1e").unwrap(),
            ProgramRef::Tag([0xf0, 0x05, 0x5c, 0x08, 0x99, 0x3f, 0xea, 0x1e])
        );
        assert_eq!(
            ProgramRef::parse("name", "my_prog").unwrap(),
            ProgramRef::Name("my_prog".into())
        );
        assert_eq!(
            ProgramRef::parse("pinned", "/sys/fs/bpf/p").unwrap(),
            ProgramRef::Pinned(PathBuf::from("/sys/fs/bpf/p"))
        );
    }

    #[test]
    fn uppercase_tag_is_accepted() {
        let parsed = ProgramRef::parse("tag", "F0055C08993FEA1E").unwrap();
        assert_eq!(parsed.to_string(), "program with tag f0055c08993fea1e");
    }

    #[test]
    fn rejects_bad_program_input() {
        for (kind, value) in [
            ("id", "abc"),
            ("id", "-1"),
            ("id", "4294967296"),
            ("tag", "f0055c"),
            ("tag", "zz055c08993fea1e"),
            ("name", ""),
            ("pinned", ""),
            ("label", "x"),
        ] {
            let err = ProgramRef::parse(kind, value).unwrap_err();
            assert!(
                matches!(err, InspectError::InvalidInput { .. }),
                "{} {} gave {:?}",
                kind,
                value,
                err
            );
        }
    }

    #[test]
    fn maps_have_no_tag() {
        let err = MapRef::parse("tag", "f0055c08993fea1e").unwrap_err();
        assert!(matches!(err, InspectError::InvalidInput { .. }));
        assert_eq!(MapRef::parse("id", "9").unwrap(), MapRef::Id(MapId(9)));
    }

    #[test]
    fn display_names_the_subject() {
        assert_eq!(MapRef::Id(MapId(4)).to_string(), "map 4");
        assert_eq!(
            MapRef::Pinned(PathBuf::from("/sys/fs/bpf/m")).to_string(),
            "map pinned at /sys/fs/bpf/m"
        );
    }

    proptest::proptest! {
        #[test]
        fn any_u32_parses_as_map_id(raw in proptest::prelude::any::<u32>()) {
            let parsed = MapRef::parse("id", &raw.to_string()).unwrap();
            proptest::prop_assert_eq!(parsed, MapRef::Id(MapId(raw)));
        }

        #[test]
        fn any_tag_bytes_roundtrip(bytes in proptest::prelude::any::<[u8; 8]>()) {
            let parsed = ProgramRef::parse("tag", &hex::encode(bytes)).unwrap();
            proptest::prop_assert_eq!(parsed, ProgramRef::Tag(bytes));
        }
    }
}
