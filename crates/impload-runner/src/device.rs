//! Device strings and serial port discovery.
//!
//! | device string                         | transport                            |
//! |---------------------------------------|--------------------------------------|
//! | `AA:BB:CC:DD:EE:FF`                   | Bluetooth RFCOMM                     |
//! | `tcp://host:port`                     | TCP                                  |
//! | `udp://host:port`                     | UDP to a fixed peer                  |
//! | `udp://:port`                         | UDP, peer learned from first datagram|
//! | `udp://lhost:lport/rhost:rport`       | UDP, fixed local port and peer       |
//! | `udp://rhost:rport?bind=lport`        | UDP, fixed local port and peer       |
//! | `/dev/ttyACM0[@baud]`                 | serial                               |
//!
//! The host `__MWP_SERIAL_HOST` is replaced by the value of the
//! `MWP_SERIAL_HOST` environment variable.

use std::path::Path;

use impload_link::{parse_bdaddr, DeviceDescriptor, Endpoint};
use serialport::SerialPortType;
use tracing::{debug, info};

use crate::error::RunnerError;

/// Placeholder host resolved from [`SERIAL_HOST_ENV`].
pub const SERIAL_HOST_PLACEHOLDER: &str = "__MWP_SERIAL_HOST";
/// Environment variable naming the serial bridge host.
pub const SERIAL_HOST_ENV: &str = "MWP_SERIAL_HOST";

/// USB VID:PID pairs of common flight controllers (STM32 VCP, FTDI).
const FLIGHT_CONTROLLER_USB_IDS: &[(u16, u16)] = &[(0x0483, 0x5740), (0x0403, 0x6001)];

/// Serial ports tried when nothing better is found.
const FALLBACK_PORTS: &[&str] = &["/dev/ttyACM0", "/dev/ttyUSB0"];

/// Parse a device string. `baud` applies to serial devices without `@baud`.
pub fn parse_device(device: &str, baud: u32) -> Result<DeviceDescriptor, RunnerError> {
    if parse_bdaddr(device).is_some() {
        return Ok(DeviceDescriptor::Bluetooth {
            address: device.to_string(),
        });
    }

    if let Some(rest) = device.strip_prefix("tcp://") {
        let endpoint = parse_endpoint(device, rest.trim_end_matches('/'))?;
        if endpoint.host.is_empty() {
            return Err(RunnerError::invalid_device(device, "tcp needs a host"));
        }
        return Ok(DeviceDescriptor::Tcp(endpoint));
    }

    if let Some(rest) = device.strip_prefix("udp://") {
        return parse_udp(device, rest);
    }

    if device.contains("://") {
        return Err(RunnerError::invalid_device(device, "unknown scheme"));
    }

    let (path, baud) = match device.rsplit_once('@') {
        Some((path, rate)) => {
            let rate = rate
                .parse()
                .map_err(|_| RunnerError::invalid_device(device, "bad baud rate"))?;
            (path, rate)
        }
        None => (device, baud),
    };
    if path.is_empty() {
        return Err(RunnerError::invalid_device(device, "empty serial path"));
    }
    Ok(DeviceDescriptor::Serial {
        path: path.to_string(),
        baud,
    })
}

fn parse_udp(device: &str, rest: &str) -> Result<DeviceDescriptor, RunnerError> {
    // udp://rhost:rport?bind=lport
    if let Some((remote, query)) = rest.split_once('?') {
        let bind = query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == "bind")
            .map(|(_, value)| value)
            .ok_or_else(|| RunnerError::invalid_device(device, "expected ?bind=port"))?;
        let port = bind
            .parse()
            .map_err(|_| RunnerError::invalid_device(device, "bad bind port"))?;
        return Ok(DeviceDescriptor::Udp {
            local: Some(Endpoint::new("", port)),
            remote: Some(parse_endpoint(device, remote)?),
        });
    }

    // udp://lhost:lport/rhost:rport
    if let Some((local, remote)) = rest.split_once('/') {
        if !remote.is_empty() {
            return Ok(DeviceDescriptor::Udp {
                local: Some(parse_endpoint(device, local)?),
                remote: Some(parse_endpoint(device, remote)?),
            });
        }
    }

    let endpoint = parse_endpoint(device, rest.trim_end_matches('/'))?;
    if endpoint.host.is_empty() {
        Ok(DeviceDescriptor::Udp {
            local: Some(endpoint),
            remote: None,
        })
    } else {
        Ok(DeviceDescriptor::Udp {
            local: None,
            remote: Some(endpoint),
        })
    }
}

/// Parse `host:port` or `[v6]:port`, resolving the serial-host placeholder.
fn parse_endpoint(device: &str, hostport: &str) -> Result<Endpoint, RunnerError> {
    let (host, port) = hostport
        .rsplit_once(':')
        .ok_or_else(|| RunnerError::invalid_device(device, "expected host:port"))?;
    let port = port
        .parse()
        .map_err(|_| RunnerError::invalid_device(device, "bad port"))?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    let host = if host == SERIAL_HOST_PLACEHOLDER {
        std::env::var(SERIAL_HOST_ENV)
            .ok()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| {
                RunnerError::invalid_device(device, format!("{} is not set", SERIAL_HOST_ENV))
            })?
    } else {
        host.to_string()
    };
    Ok(Endpoint::new(host, port))
}

/// First USB serial port that looks like a flight controller.
pub fn detect_usb_port() -> Option<String> {
    let ports = match serialport::available_ports() {
        Ok(ports) => ports,
        Err(e) => {
            debug!(error = %e, "cannot enumerate serial ports");
            return None;
        }
    };
    ports.into_iter().find_map(|port| match port.port_type {
        SerialPortType::UsbPort(usb)
            if FLIGHT_CONTROLLER_USB_IDS.contains(&(usb.vid, usb.pid)) =>
        {
            Some(port.port_name)
        }
        _ => None,
    })
}

/// Device to use: the given string, else a detected USB flight controller,
/// else the first fallback port that exists.
pub fn resolve_device(device: Option<&str>, baud: u32) -> Result<DeviceDescriptor, RunnerError> {
    let descriptor = match device.filter(|d| !d.is_empty()) {
        Some(device) => parse_device(device, baud)?,
        None => {
            let path = detect_usb_port()
                .or_else(|| {
                    FALLBACK_PORTS
                        .iter()
                        .find(|p| Path::new(p).exists())
                        .map(|p| p.to_string())
                })
                .ok_or(RunnerError::NoDevice)?;
            DeviceDescriptor::Serial { path, baud }
        }
    };
    info!("Using device [{}]", descriptor);
    Ok(descriptor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn udp(local: Option<(&str, u16)>, remote: Option<(&str, u16)>) -> DeviceDescriptor {
        DeviceDescriptor::Udp {
            local: local.map(|(h, p)| Endpoint::new(h, p)),
            remote: remote.map(|(h, p)| Endpoint::new(h, p)),
        }
    }

    #[test]
    fn test_bluetooth() {
        assert_eq!(
            parse_device("00:1A:7D:DA:71:13", 115200).unwrap(),
            DeviceDescriptor::Bluetooth {
                address: "00:1A:7D:DA:71:13".into()
            }
        );
    }

    #[test]
    fn test_serial() {
        assert_eq!(
            parse_device("/dev/ttyACM0", 115200).unwrap(),
            DeviceDescriptor::Serial {
                path: "/dev/ttyACM0".into(),
                baud: 115200
            }
        );
        assert_eq!(
            parse_device("/dev/ttyUSB1@57600", 115200).unwrap(),
            DeviceDescriptor::Serial {
                path: "/dev/ttyUSB1".into(),
                baud: 57600
            }
        );
        assert!(parse_device("/dev/ttyUSB1@fast", 115200).is_err());
    }

    #[test]
    fn test_tcp() {
        assert_eq!(
            parse_device("tcp://localhost:5760", 115200).unwrap(),
            DeviceDescriptor::Tcp(Endpoint::new("localhost", 5760))
        );
        assert_eq!(
            parse_device("tcp://[::1]:5760", 115200).unwrap(),
            DeviceDescriptor::Tcp(Endpoint::new("::1", 5760))
        );
        assert!(parse_device("tcp://:5760", 115200).is_err());
        assert!(parse_device("tcp://localhost", 115200).is_err());
    }

    #[test]
    fn test_udp_shapes() {
        assert_eq!(
            parse_device("udp://192.168.4.1:14014", 0).unwrap(),
            udp(None, Some(("192.168.4.1", 14014)))
        );
        assert_eq!(
            parse_device("udp://:14014", 0).unwrap(),
            udp(Some(("", 14014)), None)
        );
        assert_eq!(
            parse_device("udp://localhost:14015/192.168.4.1:14014", 0).unwrap(),
            udp(Some(("localhost", 14015)), Some(("192.168.4.1", 14014)))
        );
        assert_eq!(
            parse_device("udp://192.168.4.1:14014?bind=14015", 0).unwrap(),
            udp(Some(("", 14015)), Some(("192.168.4.1", 14014)))
        );
        assert!(parse_device("udp://192.168.4.1:14014?port=1", 0).is_err());
    }

    #[test]
    fn test_unknown_scheme() {
        assert!(matches!(
            parse_device("ws://host:80", 0),
            Err(RunnerError::InvalidDevice { .. })
        ));
    }

    #[test]
    #[serial]
    fn test_serial_host_placeholder() {
        std::env::set_var(SERIAL_HOST_ENV, "10.0.0.1");
        let parsed = parse_device("tcp://__MWP_SERIAL_HOST:5760", 0);
        std::env::remove_var(SERIAL_HOST_ENV);
        assert_eq!(
            parsed.unwrap(),
            DeviceDescriptor::Tcp(Endpoint::new("10.0.0.1", 5760))
        );

        assert!(parse_device("tcp://__MWP_SERIAL_HOST:5760", 0).is_err());
    }

    #[test]
    fn test_explicit_device_wins() {
        assert_eq!(
            resolve_device(Some("tcp://fc:5760"), 115200).unwrap(),
            DeviceDescriptor::Tcp(Endpoint::new("fc", 5760))
        );
    }
}
