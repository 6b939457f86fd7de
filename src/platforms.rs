//! Platform command table.
//!
//! Maps platform identifiers (e.g. `"juniper_junos"`) to the commands that
//! retrieve a device's running configuration and to whether the platform
//! uses a candidate/commit workflow. Consulted by the broker's get-config
//! path when the caller passes no explicit commands.

/// Per-platform command knowledge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    /// Commands that dump the running configuration, in order.
    pub get_config_commands: &'static [&'static str],

    /// Whether configuration changes require an explicit commit.
    pub supports_commit: bool,
}

const fn show_running() -> Platform {
    Platform {
        get_config_commands: &["show running-config"],
        supports_commit: false,
    }
}

const fn committing(commands: &'static [&'static str]) -> Platform {
    Platform {
        get_config_commands: commands,
        supports_commit: true,
    }
}

const fn simple(commands: &'static [&'static str]) -> Platform {
    Platform {
        get_config_commands: commands,
        supports_commit: false,
    }
}

static PLATFORMS: &[(&str, Platform)] = &[
    ("a10", show_running()),
    ("adtran_os", show_running()),
    ("alcatel_aos", simple(&["show configuration snapshot"])),
    ("alcatel_sros", committing(&["admin display-config"])),
    ("arista_eos", show_running()),
    ("aruba_os", show_running()),
    ("brocade_fastiron", show_running()),
    ("brocade_fos", simple(&["configshow"])),
    ("brocade_vyos", committing(&["show configuration"])),
    ("checkpoint_gaia", committing(&["show configuration"])),
    ("ciena_saos", committing(&["configuration show"])),
    ("cisco_asa", show_running()),
    ("cisco_ios", show_running()),
    ("cisco_iosxe", show_running()),
    ("cisco_iosxr", committing(&["show running-config"])),
    ("cisco_nxos", show_running()),
    ("cisco_wlc", show_running()),
    ("cisco_xe", show_running()),
    ("cisco_xr", committing(&["show running-config"])),
    ("cumulus_linux", simple(&["net show configuration"])),
    ("dell_isilon", simple(&["isi config"])),
    ("dell_os10", show_running()),
    ("dell_sonic", simple(&["show runningconfiguration all"])),
    ("extreme", simple(&["show configuration"])),
    ("extreme_exos", simple(&["show configuration"])),
    ("f5_linux", simple(&["tmsh list"])),
    ("f5_ltm", simple(&["tmsh list ltm"])),
    ("f5_tmsh", simple(&["list"])),
    ("fortinet", simple(&["show full-configuration"])),
    ("generic", show_running()),
    ("h3c_comware", simple(&["display current-configuration"])),
    ("hp_comware", simple(&["display current-configuration"])),
    ("hp_procurve", show_running()),
    ("huawei", simple(&["display current-configuration"])),
    ("huawei_vrp", simple(&["display current-configuration"])),
    ("juniper", committing(&["show configuration"])),
    ("juniper_junos", committing(&["show configuration"])),
    ("juniper_screenos", simple(&["get config"])),
    ("linux", simple(&["cat /etc/network/interfaces"])),
    ("mellanox", show_running()),
    ("mikrotik_routeros", simple(&["/export"])),
    ("mikrotik_switchos", simple(&["/export"])),
    ("netapp_cdot", simple(&["vserver show", "network interface show"])),
    ("netscaler", show_running()),
    ("nokia_srl", committing(&["info from state"])),
    ("nokia_sros", committing(&["admin display-config"])),
    ("ovs_linux", simple(&["ovs-vsctl show"])),
    ("paloalto_panos", simple(&["show config running"])),
    ("ruckus_fastiron", show_running()),
    ("ubiquiti_edge", committing(&["show configuration"])),
    ("ubiquiti_edgerouter", committing(&["show configuration"])),
    ("ubiquiti_edgeswitch", show_running()),
    ("vyatta_vyos", committing(&["show configuration"])),
    ("vyos", committing(&["show configuration"])),
    ("zyxel_os", show_running()),
];

/// Looks up a platform by identifier.
///
/// Names are normalized before lookup: surrounding whitespace is trimmed,
/// letters are lowercased, and `-`/space become `_`, so `"Juniper-JunOS"`
/// and `"juniper_junos"` resolve identically.
pub fn lookup(name: &str) -> Option<&'static Platform> {
    let normalized: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '-' | ' ' => '_',
            other => other.to_ascii_lowercase(),
        })
        .collect();
    PLATFORMS
        .iter()
        .find(|(key, _)| *key == normalized)
        .map(|(_, platform)| platform)
}

/// All known platform identifiers, sorted.
pub fn names() -> Vec<&'static str> {
    PLATFORMS.iter().map(|(key, _)| *key).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_exact() {
        let platform = lookup("cisco_ios").unwrap();
        assert_eq!(platform.get_config_commands, ["show running-config"]);
        assert!(!platform.supports_commit);
    }

    #[test]
    fn test_lookup_normalizes() {
        assert_eq!(lookup("Juniper-JunOS"), lookup("juniper_junos"));
        assert_eq!(lookup("  nokia sros  "), lookup("nokia_sros"));
        assert!(lookup("juniper_junos").unwrap().supports_commit);
    }

    #[test]
    fn test_lookup_unknown() {
        assert!(lookup("msdos").is_none());
    }

    #[test]
    fn test_multi_command_platform() {
        let platform = lookup("netapp_cdot").unwrap();
        assert_eq!(platform.get_config_commands.len(), 2);
    }
}
