//! Local network discovery: hardware address and outbound IPv4.
//!
//! The handshake advertises the client's MAC address and the IPv4 address it
//! uses to reach the outside world.  Neither is required: when discovery
//! fails the corresponding HELLO/PING field is simply left empty.
//!
//! # Hardware address
//!
//! On Linux the interfaces are read from sysfs
//! (`/sys/class/net/<iface>/address` and `.../flags`).  Interfaces that are
//! down, have an all-zero address (loopback), or carry a locally-administered
//! address (bridges, veth pairs, most virtual NICs) are skipped.  The first
//! qualifying interface in name order wins.
//!
//! On Windows the adapters come from `GetAdaptersAddresses` in the order the
//! system reports them, with the same filtering: the adapter must be
//! operationally up and carry a six-byte, globally-administered address.
//!
//! Other platforms report no address.
//!
//! # Outbound IPv4
//!
//! A UDP socket is "connected" to a well-known external host.  No packet is
//! sent; the kernel only picks a route, and the socket's local address is the
//! one that route would use.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::path::PathBuf;

use autoconnect_core::MacAddress;
use tracing::{debug, warn};

/// Default host used to select the outbound route.
pub const DEFAULT_PROBE_TARGET: &str = "8.8.8.8:80";

/// Default sysfs directory listing network interfaces.
pub const SYSFS_NET_DIR: &str = "/sys/class/net";

/// `IFF_UP` from `<linux/if.h>`.
#[cfg(target_os = "linux")]
const IFF_UP: u32 = 0x1;

/// Source of the local identity fields sent during the handshake.
///
/// Both lookups are infallible from the caller's point of view: `None` means
/// "not found" and the handshake proceeds without the field.
#[cfg_attr(test, mockall::automock)]
pub trait NetworkInfo: Send + Sync {
    /// First active, globally-administered hardware address.
    fn hardware_address(&self) -> Option<MacAddress>;

    /// Local IPv4 address used to reach an external host.
    fn external_ipv4(&self) -> Option<Ipv4Addr>;
}

/// [`NetworkInfo`] backed by the operating system.
#[derive(Debug, Clone)]
pub struct SystemNetworkInfo {
    probe_target: String,
    #[cfg_attr(not(target_os = "linux"), allow(dead_code))]
    sysfs_root: PathBuf,
}

impl Default for SystemNetworkInfo {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_TARGET)
    }
}

impl SystemNetworkInfo {
    pub fn new(probe_target: impl Into<String>) -> Self {
        Self {
            probe_target: probe_target.into(),
            sysfs_root: PathBuf::from(SYSFS_NET_DIR),
        }
    }

    /// Reads interfaces from `root` instead of `/sys/class/net`.
    pub fn with_sysfs_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.sysfs_root = root.into();
        self
    }

    #[cfg(target_os = "linux")]
    fn scan_interfaces(&self) -> std::io::Result<Option<MacAddress>> {
        let mut names: Vec<String> = std::fs::read_dir(&self.sysfs_root)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        names.sort();

        let candidates = names.into_iter().filter_map(|name| {
            let dir = self.sysfs_root.join(&name);
            let flags = std::fs::read_to_string(dir.join("flags")).ok()?;
            let address = std::fs::read_to_string(dir.join("address"))
                .ok()
                .and_then(|raw| raw.trim().parse::<MacAddress>().ok());
            Some(InterfaceCandidate {
                up: parse_flags(&flags).is_some_and(|f| f & IFF_UP != 0),
                name,
                address,
            })
        });
        Ok(first_usable(candidates))
    }

    #[cfg(target_os = "windows")]
    fn scan_interfaces(&self) -> std::io::Result<Option<MacAddress>> {
        Ok(first_usable(adapters::list()?))
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    fn scan_interfaces(&self) -> std::io::Result<Option<MacAddress>> {
        Ok(None)
    }
}

/// One interface as the OS reports it, before filtering.
#[cfg_attr(not(any(target_os = "linux", target_os = "windows")), allow(dead_code))]
#[derive(Debug, Clone, PartialEq, Eq)]
struct InterfaceCandidate {
    name: String,
    up: bool,
    /// `None` when the interface has no Ethernet-style address.
    address: Option<MacAddress>,
}

/// First candidate that is up and has a non-zero, globally-administered
/// address.
#[cfg_attr(not(any(target_os = "linux", target_os = "windows")), allow(dead_code))]
fn first_usable(candidates: impl IntoIterator<Item = InterfaceCandidate>) -> Option<MacAddress> {
    for candidate in candidates {
        let name = &candidate.name;
        if !candidate.up {
            debug!("interface {name} is down, skipping");
            continue;
        }
        let Some(mac) = candidate.address else {
            debug!("interface {name} has no Ethernet-style address, skipping");
            continue;
        };
        if mac.is_unset() || mac.is_locally_administered() {
            debug!("interface {name} address {mac} is not usable, skipping");
            continue;
        }

        debug!("using hardware address {mac} of interface {name}");
        return Some(mac);
    }
    None
}

/// Adapter enumeration through the IP Helper API.
#[cfg(target_os = "windows")]
mod adapters {
    use std::io;

    use autoconnect_core::MacAddress;
    use windows::Win32::Foundation::{ERROR_BUFFER_OVERFLOW, ERROR_SUCCESS};
    use windows::Win32::NetworkManagement::IpHelper::{
        GetAdaptersAddresses, GAA_FLAG_SKIP_ANYCAST, GAA_FLAG_SKIP_DNS_SERVER,
        GAA_FLAG_SKIP_MULTICAST, GAA_FLAG_SKIP_UNICAST, IP_ADAPTER_ADDRESSES_LH,
    };
    use windows::Win32::NetworkManagement::Ndis::IfOperStatusUp;
    use windows::Win32::Networking::WinSock::AF_UNSPEC;

    use super::InterfaceCandidate;

    /// Starting buffer size recommended by the IP Helper documentation.
    const INITIAL_BUFFER_BYTES: u32 = 15 * 1024;

    /// The adapter list can grow between the sizing call and the real one.
    const MAX_TRIES: usize = 3;

    pub(super) fn list() -> io::Result<Vec<InterfaceCandidate>> {
        let flags = GAA_FLAG_SKIP_UNICAST
            | GAA_FLAG_SKIP_ANYCAST
            | GAA_FLAG_SKIP_MULTICAST
            | GAA_FLAG_SKIP_DNS_SERVER;
        let mut size = INITIAL_BUFFER_BYTES;

        for _ in 0..MAX_TRIES {
            // u64 words keep the buffer aligned for IP_ADAPTER_ADDRESSES_LH.
            let mut buf = vec![0u64; (size as usize).div_ceil(8)];
            let head = buf.as_mut_ptr().cast::<IP_ADAPTER_ADDRESSES_LH>();

            // SAFETY: `head` points to at least `size` writable, aligned bytes
            // owned by `buf`, which outlives the call.
            let ret = unsafe {
                GetAdaptersAddresses(AF_UNSPEC.0 as u32, flags, None, Some(head), &mut size)
            };
            if ret == ERROR_BUFFER_OVERFLOW.0 {
                continue;
            }
            if ret != ERROR_SUCCESS.0 {
                return Err(io::Error::from_raw_os_error(ret as i32));
            }

            let mut candidates = Vec::new();
            let mut cursor = head.cast_const();
            while !cursor.is_null() {
                // SAFETY: on success the list lives inside `buf`, and every
                // `Next` pointer is either null or another node in it.
                let adapter = unsafe { &*cursor };
                candidates.push(candidate(adapter));
                cursor = adapter.Next.cast_const();
            }
            return Ok(candidates);
        }
        Err(io::Error::new(
            io::ErrorKind::Other,
            "adapter list kept growing while it was being read",
        ))
    }

    pub(super) fn candidate(adapter: &IP_ADAPTER_ADDRESSES_LH) -> InterfaceCandidate {
        let address = (adapter.PhysicalAddressLength == 6).then(|| {
            let mut octets = [0u8; 6];
            octets.copy_from_slice(&adapter.PhysicalAddress[..6]);
            MacAddress::new(octets)
        });
        let name = if adapter.AdapterName.is_null() {
            String::new()
        } else {
            // SAFETY: a non-null AdapterName is a NUL-terminated string owned
            // by the adapter list.
            unsafe { adapter.AdapterName.to_string() }.unwrap_or_default()
        };
        InterfaceCandidate {
            name,
            up: adapter.OperStatus == IfOperStatusUp,
            address,
        }
    }
}

impl NetworkInfo for SystemNetworkInfo {
    fn hardware_address(&self) -> Option<MacAddress> {
        match self.scan_interfaces() {
            Ok(Some(mac)) => Some(mac),
            Ok(None) => {
                warn!("no active interface with a global hardware address");
                None
            }
            Err(e) => {
                warn!("could not enumerate network interfaces: {e}");
                None
            }
        }
    }

    fn external_ipv4(&self) -> Option<Ipv4Addr> {
        match probe_local_addr(&self.probe_target) {
            Ok(SocketAddr::V4(addr)) => Some(*addr.ip()),
            Ok(SocketAddr::V6(addr)) => match addr.ip().to_ipv4_mapped() {
                Some(v4) => Some(v4),
                None => {
                    warn!("outbound address {} is not IPv4", addr.ip());
                    None
                }
            },
            Err(e) => {
                warn!("could not determine outbound IPv4 via {}: {e}", self.probe_target);
                None
            }
        }
    }
}

fn probe_local_addr(target: &str) -> std::io::Result<SocketAddr> {
    let socket = UdpSocket::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0))?;
    socket.connect(target)?;
    socket.local_addr()
}

/// Parses the sysfs `flags` file, e.g. `"0x1003\n"`.
#[cfg(target_os = "linux")]
fn parse_flags(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    let hex = raw.strip_prefix("0x").unwrap_or(raw);
    u32::from_str_radix(hex, 16).ok()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
