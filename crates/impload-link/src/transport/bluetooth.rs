//! Bluetooth RFCOMM transport.
//!
//! Linux only: the socket is opened directly through `libc` and then used as
//! an ordinary file descriptor.

use std::time::Duration;

#[cfg(target_os = "linux")]
pub use linux::BluetoothTransport;

#[cfg(not(target_os = "linux"))]
pub use unsupported::BluetoothTransport;

#[cfg(target_os = "linux")]
mod linux {
    use std::fs::File;
    use std::io::{self, Read, Write};
    use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

    use tracing::debug;

    use super::Duration;
    use crate::device::{parse_bdaddr, TransportKind};
    use crate::error::LinkError;
    use crate::transport::Transport;

    const BTPROTO_RFCOMM: libc::c_int = 3;

    /// `struct sockaddr_rc` from `<bluetooth/rfcomm.h>`.
    #[repr(C)]
    struct SockaddrRc {
        rc_family: libc::sa_family_t,
        /// Address octets, least significant first.
        rc_bdaddr: [u8; 6],
        rc_channel: u8,
    }

    /// RFCOMM stream socket.
    pub struct BluetoothTransport {
        file: File,
        address: String,
    }

    impl BluetoothTransport {
        /// Connect to `address` (`AA:BB:CC:DD:EE:FF`) on `channel`.
        pub fn connect(address: &str, channel: u8, read_timeout: Duration) -> Result<Self, LinkError> {
            let mut bdaddr = parse_bdaddr(address)
                .ok_or_else(|| LinkError::InvalidAddress(address.to_string()))?;
            bdaddr.reverse();

            // SAFETY: plain socket(2) call; the result is checked before use.
            let fd = unsafe {
                libc::socket(
                    libc::AF_BLUETOOTH,
                    libc::SOCK_STREAM | libc::SOCK_CLOEXEC,
                    BTPROTO_RFCOMM,
                )
            };
            if fd < 0 {
                return Err(io::Error::last_os_error().into());
            }
            // SAFETY: fd is a freshly created descriptor owned by nobody else.
            let fd = unsafe { OwnedFd::from_raw_fd(fd) };

            let addr = SockaddrRc {
                rc_family: libc::AF_BLUETOOTH as libc::sa_family_t,
                rc_bdaddr: bdaddr,
                rc_channel: channel,
            };
            // SAFETY: addr is a valid sockaddr_rc and the length matches it.
            let rc = unsafe {
                libc::connect(
                    fd.as_raw_fd(),
                    &addr as *const SockaddrRc as *const libc::sockaddr,
                    std::mem::size_of::<SockaddrRc>() as libc::socklen_t,
                )
            };
            if rc < 0 {
                return Err(io::Error::last_os_error().into());
            }

            set_read_timeout(&fd, read_timeout)?;
            debug!(address, channel, "rfcomm connected");
            Ok(Self {
                file: File::from(fd),
                address: address.to_string(),
            })
        }
    }

    fn set_read_timeout(fd: &OwnedFd, timeout: Duration) -> io::Result<()> {
        let tv = libc::timeval {
            tv_sec: timeout.as_secs() as libc::time_t,
            tv_usec: timeout.subsec_micros() as libc::suseconds_t,
        };
        // SAFETY: tv outlives the call and the length matches it.
        let rc = unsafe {
            libc::setsockopt(
                fd.as_raw_fd(),
                libc::SOL_SOCKET,
                libc::SO_RCVTIMEO,
                &tv as *const libc::timeval as *const libc::c_void,
                std::mem::size_of::<libc::timeval>() as libc::socklen_t,
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    impl Read for BluetoothTransport {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.file.read(buf)
        }
    }

    impl Write for BluetoothTransport {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.file.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Transport for BluetoothTransport {
        fn kind(&self) -> TransportKind {
            TransportKind::Bluetooth
        }

        fn close(&mut self) -> io::Result<()> {
            // SAFETY: the descriptor stays open until self is dropped.
            let rc = unsafe { libc::shutdown(self.file.as_raw_fd(), libc::SHUT_RDWR) };
            if rc < 0 {
                let err = io::Error::last_os_error();
                if err.kind() != io::ErrorKind::NotConnected {
                    return Err(err);
                }
            }
            debug!(address = %self.address, "rfcomm closed");
            Ok(())
        }

        fn try_clone(&self) -> io::Result<Box<dyn Transport>> {
            Ok(Box::new(BluetoothTransport {
                file: self.file.try_clone()?,
                address: self.address.clone(),
            }))
        }
    }
}

#[cfg(not(target_os = "linux"))]
mod unsupported {
    use std::io::{self, Read, Write};

    use super::Duration;
    use crate::device::TransportKind;
    use crate::error::LinkError;
    use crate::transport::Transport;

    /// Placeholder; RFCOMM sockets are only available on Linux.
    pub enum BluetoothTransport {}

    impl BluetoothTransport {
        pub fn connect(address: &str, _channel: u8, _read_timeout: Duration) -> Result<Self, LinkError> {
            Err(LinkError::UnsupportedTransport(format!(
                "bluetooth ({}) is only supported on Linux",
                address
            )))
        }
    }

    impl Read for BluetoothTransport {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            match *self {}
        }
    }

    impl Write for BluetoothTransport {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            match *self {}
        }

        fn flush(&mut self) -> io::Result<()> {
            match *self {}
        }
    }

    impl Transport for BluetoothTransport {
        fn kind(&self) -> TransportKind {
            match *self {}
        }

        fn close(&mut self) -> io::Result<()> {
            match *self {}
        }

        fn try_clone(&self) -> io::Result<Box<dyn Transport>> {
            match *self {}
        }
    }
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;
    use crate::error::LinkError;

    #[test]
    fn test_rejects_malformed_address() {
        assert!(matches!(
            BluetoothTransport::connect("not-a-mac", 1, Duration::from_millis(100)),
            Err(LinkError::InvalidAddress(_))
        ));
    }
}
