//! Commands end to end: parse argv, execute against the in-memory kernel,
//! check the rendered text.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use clap::Parser;

use bpfscope_cli::report::{render_error, Stream};
use bpfscope_cli::{App, Cli, CliError, Config};
use bpfscope_core::InspectError;
use bpfscope_sys::{FakeMap, FakeProgram, InMemoryKernel};

fn run(kernel: &Arc<InMemoryKernel>, argv: &[&str]) -> Result<String, CliError> {
    let cli = Cli::try_parse_from(std::iter::once("bpfscope").chain(argv.iter().copied()))
        .expect("argv should parse");
    let config = Config::from_cli(&cli);
    App::new(kernel.clone(), config).execute(&cli.command)
}

fn pin_root_args(root: &Path) -> Vec<String> {
    vec!["--pin-root".to_string(), root.display().to_string()]
}

fn kernel_with_counters() -> (Arc<InMemoryKernel>, u32) {
    let kernel = Arc::new(InMemoryKernel::new());
    let id = kernel.add_map(FakeMap::hash("counters", 4, 4, 16));
    kernel
        .insert_entry(id, &[0, 1, 2, 3], &[0x10, 0x11, 0x12, 0x13])
        .unwrap();
    kernel
        .insert_entry(id, &[4, 5, 6, 7], &[0x20, 0x21, 0x22, 0x23])
        .unwrap();
    (kernel, id.0)
}

#[test]
fn prog_list_plain() {
    let kernel = Arc::new(InMemoryKernel::new());
    let mut prog = FakeProgram::new(6, "xdp_main");
    prog.tag = [0xf0, 0x05, 0x5c, 0x08, 0x99, 0x3f, 0xea, 0x1e];
    prog.gpl_compatible = true;
    prog.xlated_len = 96;
    prog.jited_len = 64;
    prog.memlock = Some(4096);
    kernel.add_program(prog);

    let out = run(&kernel, &["prog", "list"]).unwrap();
    assert_eq!(
        out,
        "1: xdp  name xdp_main  tag f0055c08993fea1e  gpl\n\
         \tuid 0\n\
         \txlated 96B  jited 64B  memlock 4096B"
    );
}

#[test]
fn empty_system_lists_nothing() {
    let kernel = Arc::new(InMemoryKernel::new());
    assert_eq!(run(&kernel, &["prog", "show"]).unwrap(), "");
    assert_eq!(run(&kernel, &["-j", "map", "list"]).unwrap(), r#"{"maps":[]}"#);
}

#[test]
fn unmatched_tag_prints_nothing() {
    let kernel = Arc::new(InMemoryKernel::new());
    kernel.add_program(FakeProgram::new(6, "p"));
    assert_eq!(
        run(&kernel, &["prog", "show", "tag", "0011223344556677"]).unwrap(),
        ""
    );
    assert_eq!(run(&kernel, &["prog", "show", "name", "nope"]).unwrap(), "");
}

#[test]
fn map_dump_lookup_getnext() {
    let (kernel, id) = kernel_with_counters();
    let id = id.to_string();

    assert_eq!(
        run(&kernel, &["map", "dump", "id", &id]).unwrap(),
        "key: 00 01 02 03  value: 10 11 12 13\n\
         key: 04 05 06 07  value: 20 21 22 23\n\
         Found 2 elements"
    );
    assert_eq!(
        run(&kernel, &["map", "lookup", "name", "counters", "key", "0", "1", "2", "3"]).unwrap(),
        "key: 00 01 02 03 value: 10 11 12 13"
    );
    assert_eq!(
        run(&kernel, &["map", "getnext", "id", &id]).unwrap(),
        "next key:\n00 01 02 03"
    );
    assert_eq!(
        run(&kernel, &["map", "getnext", "id", &id, "key", "00", "01", "02", "03"]).unwrap(),
        "key:\n00 01 02 03\nnext key:\n04 05 06 07"
    );
}

#[test]
fn key_walk_errors() {
    let (kernel, id) = kernel_with_counters();
    let id = id.to_string();

    let err = run(&kernel, &["map", "getnext", "id", &id, "key", "04", "05", "06", "07"])
        .unwrap_err();
    assert!(matches!(err, CliError::Inspect(InspectError::NoMoreKeys)));

    let err = run(&kernel, &["map", "lookup", "id", &id, "key", "ff", "ff", "ff", "ff"])
        .unwrap_err();
    assert_eq!(
        render_error(&err, bpfscope_cli::output::OutputMode::Plain),
        (Stream::Stderr, "Error: key not found in map".to_string())
    );

    let empty = kernel.add_map(FakeMap::hash("empty", 4, 4, 16)).0.to_string();
    let err = run(&kernel, &["map", "getnext", "id", &empty]).unwrap_err();
    assert!(matches!(err, CliError::Inspect(InspectError::MapEmpty)));
}

#[test]
fn dump_by_unknown_name_fails() {
    let (kernel, _) = kernel_with_counters();
    let err = run(&kernel, &["map", "dump", "name", "missing"]).unwrap_err();
    assert!(matches!(
        err,
        CliError::Inspect(InspectError::NotFound { .. })
    ));
}

#[test]
fn json_dump() {
    let (kernel, id) = kernel_with_counters();
    let out = run(&kernel, &["--json", "map", "dump", "id", &id.to_string()]).unwrap();
    let v: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(v["count"], 2);
    assert_eq!(v["entries"][1]["key"][3], "0x07");
}

#[test]
fn bpffs_flag_fills_pins() {
    let dir = tempfile::tempdir().unwrap();
    let pinned = dir.path().join("counters");
    fs::write(&pinned, b"").unwrap();
    let (kernel, id) = kernel_with_counters();
    kernel.pin_map(&pinned, bpfscope_core::MapId(id));

    let root = pin_root_args(dir.path());
    let mut argv: Vec<&str> = root.iter().map(String::as_str).collect();
    argv.extend(["-f", "map", "show", "id"]);
    let id = id.to_string();
    argv.push(&id);

    let out = run(&kernel, &argv).unwrap();
    assert!(out.ends_with(&format!("\n\tpinned {}", pinned.display())));
}

#[test]
fn pinned_reference_without_bpffs() {
    let dir = tempfile::tempdir().unwrap();
    let missing_root = dir.path().join("not-mounted");
    let (kernel, _) = kernel_with_counters();

    let root = pin_root_args(&missing_root);
    let target = missing_root.join("counters").display().to_string();
    let mut argv: Vec<&str> = root.iter().map(String::as_str).collect();
    argv.extend(["map", "dump", "pinned", target.as_str()]);

    let err = run(&kernel, &argv).unwrap_err();
    assert!(matches!(err, CliError::BpffsNotMounted { .. }));
}

#[test]
fn pinned_path_outside_missing_root_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let missing_root = dir.path().join("not-mounted");
    let (kernel, _) = kernel_with_counters();

    let root = pin_root_args(&missing_root);
    let target = dir.path().join("elsewhere").join("counters").display().to_string();
    let mut argv: Vec<&str> = root.iter().map(String::as_str).collect();
    argv.extend(["map", "show", "pinned", target.as_str()]);

    let err = run(&kernel, &argv).unwrap_err();
    assert!(matches!(
        err,
        CliError::Inspect(InspectError::NotFound { .. })
    ));
}

#[test]
fn permission_denied() {
    let kernel = Arc::new(InMemoryKernel::new());
    kernel.add_program(FakeProgram::new(6, "p"));
    kernel.deny_access(true);
    let err = run(&kernel, &["prog", "show"]).unwrap_err();
    assert!(matches!(
        err,
        CliError::Inspect(InspectError::PermissionDenied { .. })
    ));
}

#[test]
fn invalid_selector_kind() {
    let kernel = Arc::new(InMemoryKernel::new());
    let err = run(&kernel, &["map", "show", "tag", "00"]).unwrap_err();
    assert!(matches!(
        err,
        CliError::Inspect(InspectError::InvalidInput { .. })
    ));
}
