//! Static knowledge about the zonecfg resource grammar.
//!
//! These tables are compiled in and never change at runtime. They tell the
//! report parser which top-level keys open a resource block and tell the
//! script generator which resource properties are scalars (`set key=value`)
//! rather than sub-entries (`add key value`).

/// Resource types that appear as blocks in `zonecfg info` output.
pub const INFO_RESOURCES: &[&str] = &[
    "rctl",
    "net",
    "fs",
    "device",
    "dedicated-cpu",
    "dataset",
    "attr",
];

/// Resource types that zonecfg derives from other settings. They are shown
/// (in brackets or as plain blocks) but only reported when explicitly asked for.
pub const CALCULATED_RESOURCES: &[&str] = &["capped-cpu", "capped-memory"];

/// Properties that are assigned with `set` for each resource type.
pub const RESOURCE_SETTERS: &[(&str, &[&str])] = &[
    ("fs", &["dir", "special", "raw", "type", "options"]),
    (
        "net",
        &[
            "address",
            "allowed-address",
            "global-nic",
            "mac-addr",
            "physical",
            "property",
            "vlan-id",
            "defrouter",
        ],
    ),
    ("device", &["match", "property"]),
    ("rctl", &["name", "value"]),
    ("attr", &["name", "type", "value"]),
    ("dataset", &["name"]),
    ("dedicated-cpu", &["ncpus", "importance"]),
    ("capped-cpu", &["ncpus"]),
    ("capped-memory", &["physical", "swap", "locked"]),
    ("admin", &["user", "auths"]),
];

pub fn is_info_resource(name: &str) -> bool {
    INFO_RESOURCES.contains(&name)
}

pub fn is_calculated_resource(name: &str) -> bool {
    CALCULATED_RESOURCES.contains(&name)
}

/// Setter keys for a resource type. Unknown types have none.
pub fn setters(resource_type: &str) -> &'static [&'static str] {
    RESOURCE_SETTERS
        .iter()
        .find(|(kind, _)| *kind == resource_type)
        .map(|(_, keys)| *keys)
        .unwrap_or(&[])
}

pub fn is_setter(resource_type: &str, key: &str) -> bool {
    setters(resource_type).contains(&key)
}
