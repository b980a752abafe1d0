//! Device descriptors: which transport to open and where.

/// Transport family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    Serial,
    Tcp,
    Udp,
    Bluetooth,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportKind::Serial => write!(f, "serial"),
            TransportKind::Tcp => write!(f, "tcp"),
            TransportKind::Udp => write!(f, "udp"),
            TransportKind::Bluetooth => write!(f, "bluetooth"),
        }
    }
}

/// A host and port.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// Host name or address; empty means any local address.
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// `host:port`, with an empty host mapped to the unspecified address.
    pub fn socket_addr_string(&self) -> String {
        let host = if self.host.is_empty() {
            "0.0.0.0"
        } else {
            self.host.as_str()
        };
        if host.contains(':') && !host.starts_with('[') {
            format!("[{}]:{}", host, self.port)
        } else {
            format!("{}:{}", host, self.port)
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Where and how to reach the flight controller.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DeviceDescriptor {
    /// Serial port at a baud rate.
    Serial { path: String, baud: u32 },
    /// TCP client connection.
    Tcp(Endpoint),
    /// UDP socket. With no `remote` the peer is learned from the first
    /// datagram received.
    Udp {
        local: Option<Endpoint>,
        remote: Option<Endpoint>,
    },
    /// Bluetooth RFCOMM, by `AA:BB:CC:DD:EE:FF` address.
    Bluetooth { address: String },
}

impl DeviceDescriptor {
    pub fn kind(&self) -> TransportKind {
        match self {
            DeviceDescriptor::Serial { .. } => TransportKind::Serial,
            DeviceDescriptor::Tcp(_) => TransportKind::Tcp,
            DeviceDescriptor::Udp { .. } => TransportKind::Udp,
            DeviceDescriptor::Bluetooth { .. } => TransportKind::Bluetooth,
        }
    }
}

impl std::fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceDescriptor::Serial { path, baud } => write!(f, "{}@{}", path, baud),
            DeviceDescriptor::Tcp(endpoint) => write!(f, "tcp://{}", endpoint),
            DeviceDescriptor::Udp { local, remote } => {
                write!(f, "udp://")?;
                match (local, remote) {
                    (Some(local), Some(remote)) => write!(f, "{}/{}", local, remote),
                    (Some(local), None) => write!(f, "{}", local),
                    (None, Some(remote)) => write!(f, "{}", remote),
                    (None, None) => Ok(()),
                }
            }
            DeviceDescriptor::Bluetooth { address } => write!(f, "bt://{}", address),
        }
    }
}

/// Parse a colon-separated 6-octet Bluetooth address.
pub fn parse_bdaddr(address: &str) -> Option<[u8; 6]> {
    let mut octets = [0u8; 6];
    let mut parts = address.split(':');
    for octet in octets.iter_mut() {
        let part = parts.next()?;
        if part.len() != 2 {
            return None;
        }
        *octet = u8::from_str_radix(part, 16).ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(octets)
}
