//! [`SyscallKernel`]: the live backend, speaking `bpf(2)` directly.
//!
//! Every attribute block below mirrors the kernel's `union bpf_attr` member
//! for one command. Info structs are passed zero-filled with their full
//! length; a kernel that knows fewer fields leaves the tail at zero, which
//! is why the engines treat those fields as best-effort.

use std::ffi::{c_int, c_long, c_uint, c_void, CString};
use std::fs;
use std::io;
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::time::Duration;

use chrono::Utc;

use bpfscope_core::kind::is_per_cpu_map;
use bpfscope_core::{MapId, ProgramId};

use crate::error::{KernelError, ObjectKind};
use crate::traits::{
    ClockSample, Kernel, MapHandle, ProgramHandle, RawMapInfo, RawProgramInfo,
};

const BPF_MAP_LOOKUP_ELEM: c_int = 1;
const BPF_MAP_GET_NEXT_KEY: c_int = 4;
const BPF_OBJ_GET: c_int = 7;
const BPF_PROG_GET_NEXT_ID: c_int = 11;
const BPF_MAP_GET_NEXT_ID: c_int = 12;
const BPF_PROG_GET_FD_BY_ID: c_int = 13;
const BPF_MAP_GET_FD_BY_ID: c_int = 14;
const BPF_OBJ_GET_INFO_BY_FD: c_int = 15;

const BPF_OBJ_NAME_LEN: usize = 16;
const POSSIBLE_CPUS_PATH: &str = "/sys/devices/system/cpu/possible";

/// Attributes of the `*_GET_NEXT_ID` and `*_GET_FD_BY_ID` commands. The
/// by-ID commands read the ID from `start_id`'s slot.
#[repr(C)]
#[derive(Debug, Default)]
struct IdAttr {
    start_id: u32,
    next_id: u32,
    open_flags: u32,
}

#[repr(C)]
#[derive(Debug, Default)]
struct ObjGetAttr {
    pathname: u64,
    bpf_fd: u32,
    file_flags: u32,
}

#[repr(C)]
#[derive(Debug, Default)]
struct InfoAttr {
    bpf_fd: u32,
    info_len: u32,
    info: u64,
}

/// Shared by lookup (`value`) and next-key (`value` holds `next_key`).
#[repr(C)]
#[derive(Debug, Default)]
struct ElemAttr {
    map_fd: u32,
    _pad: u32,
    key: u64,
    value: u64,
    flags: u64,
}

/// `struct bpf_prog_info`, up to `netns_ino`.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
struct ProgInfo {
    prog_type: u32,
    id: u32,
    tag: [u8; 8],
    jited_prog_len: u32,
    xlated_prog_len: u32,
    jited_prog_insns: u64,
    xlated_prog_insns: u64,
    load_time: u64,
    created_by_uid: u32,
    nr_map_ids: u32,
    map_ids: u64,
    name: [u8; BPF_OBJ_NAME_LEN],
    ifindex: u32,
    /// `gpl_compatible:1` bitfield.
    flag_bits: u32,
    netns_dev: u64,
    netns_ino: u64,
}

/// `struct bpf_map_info`, up to `netns_ino`.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
struct MapInfo {
    map_type: u32,
    id: u32,
    key_size: u32,
    value_size: u32,
    max_entries: u32,
    map_flags: u32,
    name: [u8; BPF_OBJ_NAME_LEN],
    ifindex: u32,
    btf_vmlinux_value_type_id: u32,
    netns_dev: u64,
    netns_ino: u64,
}

fn sys_bpf<T>(cmd: c_int, attr: &mut T) -> Result<c_long, i32> {
    // SAFETY: `attr` is a live, properly sized `repr(C)` attribute block and
    // every pointer stored in it outlives the call.
    let ret = unsafe {
        libc::syscall(
            libc::SYS_bpf,
            cmd as c_long,
            attr as *mut T as *mut c_void,
            mem::size_of::<T>() as c_uint,
        )
    };
    if ret < 0 {
        return Err(io::Error::last_os_error()
            .raw_os_error()
            .unwrap_or(libc::EINVAL));
    }
    Ok(ret)
}

fn fd_from_ret(ret: c_long) -> OwnedFd {
    // SAFETY: fd-returning bpf commands hand back a fresh descriptor the
    // caller owns.
    unsafe { OwnedFd::from_raw_fd(ret as RawFd) }
}

fn fd_u32(fd: &OwnedFd) -> u32 {
    fd.as_raw_fd() as u32
}

fn object_info<T>(fd: &OwnedFd, info: &mut T) -> Result<(), KernelError> {
    let mut attr = InfoAttr {
        bpf_fd: fd_u32(fd),
        info_len: mem::size_of::<T>() as u32,
        info: info as *mut T as u64,
    };
    sys_bpf(BPF_OBJ_GET_INFO_BY_FD, &mut attr).map_err(KernelError::from_access_errno)?;
    Ok(())
}

fn next_id(cmd: c_int, after: u32) -> Result<u32, KernelError> {
    let mut attr = IdAttr {
        start_id: after,
        ..IdAttr::default()
    };
    sys_bpf(cmd, &mut attr).map_err(KernelError::from_walk_errno)?;
    Ok(attr.next_id)
}

fn fd_by_id(cmd: c_int, id: u32) -> Result<OwnedFd, KernelError> {
    let mut attr = IdAttr {
        start_id: id,
        ..IdAttr::default()
    };
    let ret = sys_bpf(cmd, &mut attr).map_err(KernelError::from_access_errno)?;
    Ok(fd_from_ret(ret))
}

fn obj_get(path: &Path) -> Result<OwnedFd, KernelError> {
    let pathname = CString::new(path.as_os_str().as_bytes()).map_err(|_| KernelError::Other {
        errno: libc::EINVAL,
    })?;
    let mut attr = ObjGetAttr {
        pathname: pathname.as_ptr() as u64,
        ..ObjGetAttr::default()
    };
    let ret = sys_bpf(BPF_OBJ_GET, &mut attr).map_err(KernelError::from_access_errno)?;
    Ok(fd_from_ret(ret))
}

/// Reads what kind of BPF object `fd` refers to from its anon-inode name.
fn object_kind(fd: &OwnedFd) -> Option<ObjectKind> {
    let target = fs::read_link(format!("/proc/self/fd/{}", fd.as_raw_fd())).ok()?;
    Some(kind_from_link(&target.to_string_lossy()))
}

fn kind_from_link(target: &str) -> ObjectKind {
    match target {
        "anon_inode:bpf-prog" => ObjectKind::Program,
        "anon_inode:bpf-map" => ObjectKind::Map,
        _ => ObjectKind::Other,
    }
}

fn expect_kind(fd: &OwnedFd, expected: ObjectKind) -> Result<(), KernelError> {
    match object_kind(fd) {
        Some(found) if found != expected => Err(KernelError::WrongObjectType { expected, found }),
        Some(_) => Ok(()),
        None => {
            tracing::debug!(fd = fd.as_raw_fd(), "cannot read object kind; trusting info call");
            Ok(())
        }
    }
}

fn memlock(fd: &OwnedFd) -> Option<u64> {
    let fdinfo = fs::read_to_string(format!("/proc/self/fdinfo/{}", fd.as_raw_fd())).ok()?;
    parse_fdinfo_memlock(&fdinfo)
}

/// Extracts the `memlock:` field of a `/proc/<pid>/fdinfo/<fd>` listing.
fn parse_fdinfo_memlock(fdinfo: &str) -> Option<u64> {
    fdinfo
        .lines()
        .find_map(|line| line.strip_prefix("memlock:"))
        .and_then(|v| v.trim().parse().ok())
}

/// Counts the CPUs in a kernel CPU list such as `0-3,8`.
fn parse_cpu_list(list: &str) -> Option<usize> {
    let list = list.trim();
    if list.is_empty() {
        return None;
    }
    let mut count = 0usize;
    for range in list.split(',') {
        match range.split_once('-') {
            Some((lo, hi)) => {
                let lo: usize = lo.trim().parse().ok()?;
                let hi: usize = hi.trim().parse().ok()?;
                if hi < lo {
                    return None;
                }
                count += hi - lo + 1;
            }
            None => {
                range.trim().parse::<usize>().ok()?;
                count += 1;
            }
        }
    }
    Some(count)
}

fn c_name(raw: &[u8; BPF_OBJ_NAME_LEN]) -> String {
    let end = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

fn gpl_bit(flag_bits: u32) -> bool {
    if cfg!(target_endian = "little") {
        flag_bits & 1 != 0
    } else {
        flag_bits >> 31 != 0
    }
}

fn some_nonzero<T: Default + PartialEq>(v: T) -> Option<T> {
    (v != T::default()).then_some(v)
}

fn boot_time() -> Option<Duration> {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // SAFETY: `ts` is a valid out-parameter for the duration of the call.
    let ret = unsafe { libc::clock_gettime(libc::CLOCK_BOOTTIME, &mut ts) };
    if ret != 0 {
        return None;
    }
    Some(Duration::new(ts.tv_sec as u64, ts.tv_nsec as u32))
}

/// An open program file descriptor.
#[derive(Debug)]
pub struct SyscallProgram {
    fd: OwnedFd,
}

impl ProgramHandle for SyscallProgram {
    fn info(&self) -> Result<RawProgramInfo, KernelError> {
        let mut info = ProgInfo::default();
        object_info(&self.fd, &mut info)?;

        let mut map_ids = Vec::new();
        if info.nr_map_ids > 0 {
            let mut ids = vec![0u32; info.nr_map_ids as usize];
            let mut second = ProgInfo {
                nr_map_ids: info.nr_map_ids,
                map_ids: ids.as_mut_ptr() as u64,
                ..ProgInfo::default()
            };
            match object_info(&self.fd, &mut second) {
                Ok(()) => {
                    ids.truncate(second.nr_map_ids.min(info.nr_map_ids) as usize);
                    map_ids = ids;
                }
                Err(e) => tracing::debug!(error = %e, "map ID query failed"),
            }
        }

        Ok(RawProgramInfo {
            prog_type: info.prog_type,
            id: info.id,
            tag: info.tag,
            name: c_name(&info.name),
            gpl_compatible: Some(gpl_bit(info.flag_bits)),
            load_time: some_nonzero(info.load_time).map(Duration::from_nanos),
            created_by_uid: Some(info.created_by_uid),
            xlated_len: Some(info.xlated_prog_len),
            jited_len: Some(info.jited_prog_len),
            memlock: memlock(&self.fd),
            map_ids,
        })
    }
}

/// An open map file descriptor with its buffer geometry.
#[derive(Debug)]
pub struct SyscallMap {
    fd: OwnedFd,
    key_len: usize,
    value_len: usize,
}

impl SyscallMap {
    fn raw_info(fd: &OwnedFd) -> Result<MapInfo, KernelError> {
        let mut info = MapInfo::default();
        object_info(fd, &mut info)?;
        Ok(info)
    }
}

impl MapHandle for SyscallMap {
    fn info(&self) -> Result<RawMapInfo, KernelError> {
        let info = Self::raw_info(&self.fd)?;
        Ok(RawMapInfo {
            map_type: info.map_type,
            id: info.id,
            key_size: info.key_size,
            value_size: info.value_size,
            max_entries: info.max_entries,
            flags: info.map_flags,
            name: c_name(&info.name),
            memlock: memlock(&self.fd),
        })
    }

    fn key_len(&self) -> usize {
        self.key_len
    }

    fn value_len(&self) -> usize {
        self.value_len
    }

    fn lookup(&self, key: &[u8], value: &mut [u8]) -> Result<(), KernelError> {
        // The kernel writes exactly value_len bytes; short buffers would be
        // overrun.
        if key.len() != self.key_len || value.len() != self.value_len {
            return Err(KernelError::Other {
                errno: libc::EINVAL,
            });
        }
        let mut attr = ElemAttr {
            map_fd: fd_u32(&self.fd),
            key: key.as_ptr() as u64,
            value: value.as_mut_ptr() as u64,
            ..ElemAttr::default()
        };
        sys_bpf(BPF_MAP_LOOKUP_ELEM, &mut attr).map_err(KernelError::from_access_errno)?;
        Ok(())
    }

    fn next_key(&self, key: Option<&[u8]>, next: &mut [u8]) -> Result<(), KernelError> {
        if next.len() != self.key_len || key.is_some_and(|k| k.len() != self.key_len) {
            return Err(KernelError::Other {
                errno: libc::EINVAL,
            });
        }
        let mut attr = ElemAttr {
            map_fd: fd_u32(&self.fd),
            key: key.map_or(0, |k| k.as_ptr() as u64),
            value: next.as_mut_ptr() as u64,
            ..ElemAttr::default()
        };
        sys_bpf(BPF_MAP_GET_NEXT_KEY, &mut attr).map_err(KernelError::from_walk_errno)?;
        Ok(())
    }
}

/// Live backend over `bpf(2)`.
#[derive(Debug)]
pub struct SyscallKernel {
    /// `None` when the possible-CPU list could not be read; per-CPU maps
    /// cannot be opened then.
    possible_cpus: Option<usize>,
}

impl SyscallKernel {
    pub fn new() -> Self {
        let possible_cpus = fs::read_to_string(POSSIBLE_CPUS_PATH)
            .ok()
            .and_then(|list| parse_cpu_list(&list));
        if possible_cpus.is_none() {
            tracing::warn!(path = POSSIBLE_CPUS_PATH, "cannot determine possible CPUs");
        }
        SyscallKernel { possible_cpus }
    }

    fn map_from_fd(&self, fd: OwnedFd) -> Result<SyscallMap, KernelError> {
        let info = SyscallMap::raw_info(&fd)?;
        let value_len = if is_per_cpu_map(info.map_type) {
            let cpus = self.possible_cpus.ok_or(KernelError::Other {
                errno: libc::ENOSYS,
            })?;
            ((info.value_size as usize + 7) & !7) * cpus
        } else {
            info.value_size as usize
        };
        Ok(SyscallMap {
            fd,
            key_len: info.key_size as usize,
            value_len,
        })
    }
}

impl Default for SyscallKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl Kernel for SyscallKernel {
    type Program = SyscallProgram;
    type Map = SyscallMap;

    fn next_program_id(&self, after: ProgramId) -> Result<ProgramId, KernelError> {
        next_id(BPF_PROG_GET_NEXT_ID, after.0).map(ProgramId)
    }

    fn next_map_id(&self, after: MapId) -> Result<MapId, KernelError> {
        next_id(BPF_MAP_GET_NEXT_ID, after.0).map(MapId)
    }

    fn open_program(&self, id: ProgramId) -> Result<SyscallProgram, KernelError> {
        let fd = fd_by_id(BPF_PROG_GET_FD_BY_ID, id.0)?;
        Ok(SyscallProgram { fd })
    }

    fn open_pinned_program(&self, path: &Path) -> Result<SyscallProgram, KernelError> {
        let fd = obj_get(path)?;
        expect_kind(&fd, ObjectKind::Program)?;
        Ok(SyscallProgram { fd })
    }

    fn open_map(&self, id: MapId) -> Result<SyscallMap, KernelError> {
        let fd = fd_by_id(BPF_MAP_GET_FD_BY_ID, id.0)?;
        self.map_from_fd(fd)
    }

    fn open_pinned_map(&self, path: &Path) -> Result<SyscallMap, KernelError> {
        let fd = obj_get(path)?;
        expect_kind(&fd, ObjectKind::Map)?;
        self.map_from_fd(fd)
    }

    fn sample_clock(&self) -> ClockSample {
        let since_boot = boot_time();
        if since_boot.is_none() {
            tracing::warn!("CLOCK_BOOTTIME unreadable; program load times will be omitted");
        }
        ClockSample {
            wall: Utc::now(),
            since_boot,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info_layouts_match_kernel() {
        assert_eq!(mem::size_of::<ProgInfo>(), 104);
        assert_eq!(mem::size_of::<MapInfo>(), 64);
        assert_eq!(mem::size_of::<ElemAttr>(), 32);
        assert_eq!(mem::size_of::<InfoAttr>(), 16);
        assert_eq!(mem::size_of::<ObjGetAttr>(), 16);
        assert_eq!(mem::size_of::<IdAttr>(), 12);
    }

    #[test]
    fn memlock_from_fdinfo() {
        let fdinfo = "pos:\t0\nflags:\t02000002\nmnt_id:\t15\nmap_type:\t1\nmemlock:\t4096\nmap_id:\t9\n";
        assert_eq!(parse_fdinfo_memlock(fdinfo), Some(4096));
        assert_eq!(parse_fdinfo_memlock("pos:\t0\n"), None);
        assert_eq!(parse_fdinfo_memlock("memlock:\tlots\n"), None);
    }

    #[test]
    fn cpu_lists() {
        assert_eq!(parse_cpu_list("0-3\n"), Some(4));
        assert_eq!(parse_cpu_list("0"), Some(1));
        assert_eq!(parse_cpu_list("0,2-5,7"), Some(6));
        assert_eq!(parse_cpu_list(""), None);
        assert_eq!(parse_cpu_list("3-1"), None);
        assert_eq!(parse_cpu_list("x"), None);
    }

    #[test]
    fn names_stop_at_nul() {
        let mut raw = [0u8; BPF_OBJ_NAME_LEN];
        raw[..4].copy_from_slice(b"xdp1");
        assert_eq!(c_name(&raw), "xdp1");
        assert_eq!(c_name(&[b'a'; BPF_OBJ_NAME_LEN]), "a".repeat(16));
    }

    #[test]
    fn anon_inode_kinds() {
        assert_eq!(kind_from_link("anon_inode:bpf-prog"), ObjectKind::Program);
        assert_eq!(kind_from_link("anon_inode:bpf-map"), ObjectKind::Map);
        assert_eq!(kind_from_link("anon_inode:bpf_link"), ObjectKind::Other);
    }

    #[test]
    fn gpl_flag_is_first_bitfield_bit() {
        let set = if cfg!(target_endian = "little") { 1 } else { 1 << 31 };
        assert!(gpl_bit(set));
        assert!(!gpl_bit(0));
    }
}
