//! Kernel type enumerators and their lowercase tags.
//!
//! Indices follow `enum bpf_prog_type` and `enum bpf_map_type` from the
//! kernel UAPI header; tags follow bpftool's spelling.

const PROGRAM_TYPES: &[&str] = &[
    "unspec",
    "socket_filter",
    "kprobe",
    "sched_cls",
    "sched_act",
    "tracepoint",
    "xdp",
    "perf_event",
    "cgroup_skb",
    "cgroup_sock",
    "lwt_in",
    "lwt_out",
    "lwt_xmit",
    "sock_ops",
    "sk_skb",
    "cgroup_device",
    "sk_msg",
    "raw_tracepoint",
    "cgroup_sock_addr",
    "lwt_seg6local",
    "lirc_mode2",
    "sk_reuseport",
    "flow_dissector",
    "cgroup_sysctl",
    "raw_tracepoint_writable",
    "cgroup_sockopt",
    "tracing",
    "struct_ops",
    "ext",
    "lsm",
    "sk_lookup",
    "syscall",
    "netfilter",
];

const MAP_TYPES: &[&str] = &[
    "unspec",
    "hash",
    "array",
    "prog_array",
    "perf_event_array",
    "percpu_hash",
    "percpu_array",
    "stack_trace",
    "cgroup_array",
    "lru_hash",
    "lru_percpu_hash",
    "lpm_trie",
    "array_of_maps",
    "hash_of_maps",
    "devmap",
    "sockmap",
    "cpumap",
    "xskmap",
    "sockhash",
    "cgroup_storage",
    "reuseport_sockarray",
    "percpu_cgroup_storage",
    "queue",
    "stack",
    "sk_storage",
    "devmap_hash",
    "struct_ops",
    "ringbuf",
    "inode_storage",
    "task_storage",
    "bloom_filter",
    "user_ringbuf",
    "cgrp_storage",
    "arena",
];

/// `BPF_MAP_TYPE_PERCPU_HASH`.
pub const MAP_TYPE_PERCPU_HASH: u32 = 5;
/// `BPF_MAP_TYPE_PERCPU_ARRAY`.
pub const MAP_TYPE_PERCPU_ARRAY: u32 = 6;
/// `BPF_MAP_TYPE_LRU_PERCPU_HASH`.
pub const MAP_TYPE_LRU_PERCPU_HASH: u32 = 10;
/// `BPF_MAP_TYPE_PERCPU_CGROUP_STORAGE`.
pub const MAP_TYPE_PERCPU_CGROUP_STORAGE: u32 = 21;

/// Lowercase tag for a `bpf_prog_type` enumerator, `type <n>` when unknown.
pub fn program_type_name(raw: u32) -> String {
    lookup(PROGRAM_TYPES, raw)
}

/// Lowercase tag for a `bpf_map_type` enumerator, `type <n>` when unknown.
pub fn map_type_name(raw: u32) -> String {
    lookup(MAP_TYPES, raw)
}

/// Whether lookups on this map type return one value slot per possible CPU.
pub fn is_per_cpu_map(raw: u32) -> bool {
    matches!(
        raw,
        MAP_TYPE_PERCPU_HASH
            | MAP_TYPE_PERCPU_ARRAY
            | MAP_TYPE_LRU_PERCPU_HASH
            | MAP_TYPE_PERCPU_CGROUP_STORAGE
    )
}

fn lookup(table: &[&str], raw: u32) -> String {
    table
        .get(raw as usize)
        .map(|name| (*name).to_string())
        .unwrap_or_else(|| format!("type {}", raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_program_types() {
        assert_eq!(program_type_name(1), "socket_filter");
        assert_eq!(program_type_name(3), "sched_cls");
        assert_eq!(program_type_name(6), "xdp");
        assert_eq!(program_type_name(26), "tracing");
    }

    #[test]
    fn known_map_types() {
        assert_eq!(map_type_name(1), "hash");
        assert_eq!(map_type_name(2), "array");
        assert_eq!(map_type_name(27), "ringbuf");
    }

    #[test]
    fn unknown_enumerators_render_numerically() {
        assert_eq!(program_type_name(4096), "type 4096");
        assert_eq!(map_type_name(999), "type 999");
    }

    #[test]
    fn per_cpu_detection() {
        assert!(is_per_cpu_map(MAP_TYPE_PERCPU_HASH));
        assert!(is_per_cpu_map(MAP_TYPE_LRU_PERCPU_HASH));
        assert!(!is_per_cpu_map(1));
        assert!(!is_per_cpu_map(2));
    }
}
