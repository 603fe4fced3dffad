//! Whether any usable network transport is up right now.

use std::{
    fmt::Debug,
    fs,
    path::{Path, PathBuf},
};

use tracing::debug;

/// Link-layer kind of a network interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Wifi,
    Cellular,
    Ethernet,
    /// Loopback, VPN tunnels, bridges and anything else.
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Connected,
    Connecting,
    Down,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInterface {
    pub name: String,
    pub transport: Transport,
    pub status: LinkStatus,
}

impl NetworkInterface {
    pub fn is_usable(&self) -> bool {
        matches!(self.transport, Transport::Wifi | Transport::Cellular | Transport::Ethernet)
            && matches!(self.status, LinkStatus::Connected | LinkStatus::Connecting)
    }
}

/// Source of the currently active network interface.
pub trait ConnectivityProbe: Send + Sync + Debug {
    fn active_interface(&self) -> Option<NetworkInterface>;
}

/// True when the active interface is Wi-Fi, cellular or Ethernet and is
/// connected or connecting. No interface at all means false.
pub fn is_network_available(probe: &dyn ConnectivityProbe) -> bool {
    let available = probe.active_interface().is_some_and(|iface| iface.is_usable());
    debug!(available, "connectivity checked");
    available
}

/// A probe with a fixed answer.
#[derive(Debug, Clone, Default)]
pub struct StaticProbe {
    interface: Option<NetworkInterface>,
}

impl StaticProbe {
    pub fn online() -> Self {
        Self::with_interface(NetworkInterface {
            name: "static0".to_string(),
            transport: Transport::Ethernet,
            status: LinkStatus::Connected,
        })
    }

    pub fn offline() -> Self {
        Self { interface: None }
    }

    pub fn with_interface(interface: NetworkInterface) -> Self {
        Self { interface: Some(interface) }
    }
}

impl ConnectivityProbe for StaticProbe {
    fn active_interface(&self) -> Option<NetworkInterface> {
        self.interface.clone()
    }
}

// ARPHRD_* values from <linux/if_arp.h>.
const ARPHRD_ETHER: u32 = 1;
const ARPHRD_RAWIP: u32 = 519;
const ARPHRD_LOOPBACK: u32 = 772;

/// Reads interface state from Linux sysfs (`<root>/class/net`).
#[derive(Debug, Clone)]
pub struct SysfsProbe {
    root: PathBuf,
}

impl Default for SysfsProbe {
    fn default() -> Self {
        Self::new("/sys")
    }
}

impl SysfsProbe {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn interfaces(&self) -> Vec<NetworkInterface> {
        let dir = self.root.join("class").join("net");
        let Ok(entries) = fs::read_dir(&dir) else {
            debug!(path = %dir.display(), "no sysfs network directory");
            return Vec::new();
        };

        let mut found: Vec<NetworkInterface> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| read_interface(&entry.path()))
            .collect();

        // read_dir order is unspecified.
        found.sort_by(|a, b| a.name.cmp(&b.name));
        found
    }
}

impl ConnectivityProbe for SysfsProbe {
    /// The first usable interface, or else the first non-loopback one.
    fn active_interface(&self) -> Option<NetworkInterface> {
        let interfaces = self.interfaces();
        let usable = interfaces.iter().position(NetworkInterface::is_usable);
        match usable {
            Some(idx) => interfaces.into_iter().nth(idx),
            None => interfaces.into_iter().next(),
        }
    }
}

fn read_interface(path: &Path) -> Option<NetworkInterface> {
    let name = path.file_name()?.to_string_lossy().into_owned();
    let arp_type = read_trimmed(&path.join("type")).and_then(|s| s.parse::<u32>().ok());

    if name == "lo" || arp_type == Some(ARPHRD_LOOPBACK) {
        return None;
    }

    let transport = if path.join("wireless").exists() || path.join("phy80211").exists() {
        Transport::Wifi
    } else if name.starts_with("wwan") || name.starts_with("rmnet") || arp_type == Some(ARPHRD_RAWIP)
    {
        Transport::Cellular
    } else if arp_type == Some(ARPHRD_ETHER) && is_physical(path) {
        Transport::Ethernet
    } else {
        Transport::Other
    };

    let status = match read_trimmed(&path.join("operstate")).as_deref() {
        Some("up") => LinkStatus::Connected,
        Some("dormant") => LinkStatus::Connecting,
        _ => LinkStatus::Down,
    };

    Some(NetworkInterface { name, transport, status })
}

/// Bridges and virtual links (veth, docker0) have no backing `device`.
fn is_physical(path: &Path) -> bool {
    !path.join("bridge").exists() && path.join("device").exists()
}

fn read_trimmed(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok().map(|s| s.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn add_virtual_iface(root: &Path, name: &str, arp_type: u32, operstate: &str) -> PathBuf {
        let dir = root.join("class").join("net").join(name);
        fs::create_dir_all(&dir).expect("create iface dir");
        fs::write(dir.join("type"), format!("{arp_type}\n")).expect("write type");
        fs::write(dir.join("operstate"), format!("{operstate}\n")).expect("write operstate");
        dir
    }

    fn add_iface(root: &Path, name: &str, arp_type: u32, operstate: &str) -> PathBuf {
        let dir = add_virtual_iface(root, name, arp_type, operstate);
        fs::create_dir_all(dir.join("device")).expect("device dir");
        dir
    }

    #[test]
    fn usable_transports() {
        for transport in [Transport::Wifi, Transport::Cellular, Transport::Ethernet] {
            for status in [LinkStatus::Connected, LinkStatus::Connecting] {
                let iface = NetworkInterface { name: "x".into(), transport, status };
                assert!(is_network_available(&StaticProbe::with_interface(iface)));
            }
        }

        let vpn = NetworkInterface {
            name: "tun0".into(),
            transport: Transport::Other,
            status: LinkStatus::Connected,
        };
        assert!(!is_network_available(&StaticProbe::with_interface(vpn)));

        let down = NetworkInterface {
            name: "eth0".into(),
            transport: Transport::Ethernet,
            status: LinkStatus::Down,
        };
        assert!(!is_network_available(&StaticProbe::with_interface(down)));
    }

    #[test]
    fn no_interface_means_offline() {
        assert!(!is_network_available(&StaticProbe::offline()));
        assert!(is_network_available(&StaticProbe::online()));
    }

    #[test]
    fn sysfs_probe_skips_loopback_and_picks_usable() {
        let tmp = TempDir::new().expect("tempdir");
        add_iface(tmp.path(), "lo", ARPHRD_LOOPBACK, "unknown");
        add_iface(tmp.path(), "eth0", ARPHRD_ETHER, "down");
        let wlan = add_iface(tmp.path(), "wlan0", ARPHRD_ETHER, "up");
        fs::create_dir_all(wlan.join("wireless")).expect("wireless dir");

        let probe = SysfsProbe::new(tmp.path());
        let iface = probe.active_interface().expect("interface");

        assert_eq!(iface.name, "wlan0");
        assert_eq!(iface.transport, Transport::Wifi);
        assert_eq!(iface.status, LinkStatus::Connected);
        assert!(is_network_available(&probe));
    }

    #[test]
    fn sysfs_probe_reports_down_links_as_unavailable() {
        let tmp = TempDir::new().expect("tempdir");
        add_iface(tmp.path(), "eth0", ARPHRD_ETHER, "down");

        let probe = SysfsProbe::new(tmp.path());
        assert_eq!(probe.active_interface().map(|i| i.status), Some(LinkStatus::Down));
        assert!(!is_network_available(&probe));
    }

    #[test]
    fn sysfs_probe_detects_cellular_and_dormant() {
        let tmp = TempDir::new().expect("tempdir");
        add_iface(tmp.path(), "wwan0", ARPHRD_RAWIP, "dormant");

        let iface = SysfsProbe::new(tmp.path()).active_interface().expect("interface");
        assert_eq!(iface.transport, Transport::Cellular);
        assert_eq!(iface.status, LinkStatus::Connecting);
        assert!(iface.is_usable());
    }

    #[test]
    fn sysfs_probe_treats_bridge_as_other() {
        let tmp = TempDir::new().expect("tempdir");
        let docker = add_virtual_iface(tmp.path(), "docker0", ARPHRD_ETHER, "up");
        fs::create_dir_all(docker.join("bridge")).expect("bridge dir");

        let probe = SysfsProbe::new(tmp.path());
        let iface = probe.active_interface().expect("interface");
        assert_eq!(iface.name, "docker0");
        assert_eq!(iface.transport, Transport::Other);
        assert!(!is_network_available(&probe));
    }

    #[test]
    fn sysfs_probe_treats_bridge_with_device_as_other() {
        let tmp = TempDir::new().expect("tempdir");
        let br = add_iface(tmp.path(), "br0", ARPHRD_ETHER, "up");
        fs::create_dir_all(br.join("bridge")).expect("bridge dir");

        let iface = SysfsProbe::new(tmp.path()).active_interface().expect("interface");
        assert_eq!(iface.transport, Transport::Other);
    }

    #[test]
    fn sysfs_probe_treats_deviceless_link_as_other() {
        let tmp = TempDir::new().expect("tempdir");
        add_virtual_iface(tmp.path(), "veth1a2b", ARPHRD_ETHER, "up");

        let probe = SysfsProbe::new(tmp.path());
        assert_eq!(probe.active_interface().map(|i| i.transport), Some(Transport::Other));
        assert!(!is_network_available(&probe));
    }

    #[test]
    fn sysfs_probe_prefers_physical_link_over_bridge() {
        let tmp = TempDir::new().expect("tempdir");
        let docker = add_virtual_iface(tmp.path(), "docker0", ARPHRD_ETHER, "up");
        fs::create_dir_all(docker.join("bridge")).expect("bridge dir");
        add_iface(tmp.path(), "enp3s0", ARPHRD_ETHER, "up");

        let iface = SysfsProbe::new(tmp.path()).active_interface().expect("interface");
        assert_eq!(iface.name, "enp3s0");
        assert_eq!(iface.transport, Transport::Ethernet);
    }

    #[test]
    fn missing_sysfs_is_offline() {
        let tmp = TempDir::new().expect("tempdir");
        assert!(!is_network_available(&SysfsProbe::new(tmp.path().join("nope"))));
    }
}
