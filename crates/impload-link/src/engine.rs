//! Transaction engine.
//!
//! The engine owns the write side of the transport and the consuming end of
//! the receiver's frame channel. Requests are strictly sequential: a request
//! is written, then frames are taken off the channel until one answers the
//! same command or the timeout expires. Frames answering anything else are
//! dropped.
//!
//! Negotiated state (dialect, waypoint capacity, identification) lives here
//! and is filled in by [`Engine::handshake`](crate::Engine::handshake).

use std::io::Write;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::RecvTimeoutError;
use msp_protocol::{
    Dialect, Direction, Frame, FrameCodec, MSP2_COMMON_SETTING, MSP2_COMMON_SET_SETTING,
    MSP_EEPROM_WRITE,
};
use tracing::{debug, info, warn};

use crate::config::LinkConfig;
use crate::device::DeviceDescriptor;
use crate::error::LinkError;
use crate::handshake::FcInfo;
use crate::receiver::{spawn_receiver, ReceiverEvent, ReceiverHandle};
use crate::telemetry::metric_defs;
use crate::transport::{self, Transport};

const READY_POLL: Duration = Duration::from_millis(10);

/// A connection to one flight controller.
pub struct Engine {
    transport: Box<dyn Transport>,
    receiver: ReceiverHandle,
    pub(crate) config: LinkConfig,
    pub(crate) dialect: Dialect,
    pub(crate) capacity: usize,
    pub(crate) info: FcInfo,
    /// Set once the mission has been restored from storage this session.
    pub(crate) restored: bool,
    /// Why the connection went away, once it has.
    closed: Option<String>,
    shut_down: bool,
}

impl Engine {
    /// Open `device` and start the frame receiver. No requests are sent.
    pub fn open(device: &DeviceDescriptor, config: LinkConfig) -> Result<Self, LinkError> {
        let transport = transport::open(device, &config)?;
        Self::with_transport(transport, config)
    }

    /// Open `device`, start the receiver and run the handshake.
    ///
    /// With `restore` the mission is reloaded from persistent storage before
    /// the waypoint summary is read.
    pub fn connect(device: &DeviceDescriptor, config: LinkConfig, restore: bool) -> Result<Self, LinkError> {
        let mut engine = Self::open(device, config)?;
        engine.handshake(restore)?;
        Ok(engine)
    }

    /// Run over an already-open transport.
    pub fn with_transport(transport: Box<dyn Transport>, config: LinkConfig) -> Result<Self, LinkError> {
        let reader = transport.try_clone()?;
        let receiver = spawn_receiver(reader)?;
        Ok(Self {
            transport,
            receiver,
            capacity: config.default_capacity,
            config,
            dialect: Dialect::V1,
            info: FcInfo::default(),
            restored: false,
            closed: None,
            shut_down: false,
        })
    }

    /// Dialect used for commands that fit the legacy framing.
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Waypoint capacity used for validation.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Identification gathered by the handshake.
    pub fn fc_info(&self) -> &FcInfo {
        &self.info
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Encode and write a request without waiting for a reply.
    pub fn send(&mut self, command: u16, payload: &[u8]) -> Result<(), LinkError> {
        if let Some(reason) = &self.closed {
            return Err(LinkError::Disconnected(reason.clone()));
        }
        self.wait_until_ready()?;
        let dialect = self.dialect.for_command(command);
        let bytes = FrameCodec::encode(dialect, command, payload)?;
        self.transport.write_all(&bytes)?;
        self.transport.flush()?;
        debug!(command, %dialect, len = payload.len(), "request sent");
        metrics::counter!(
            metric_defs::REQUESTS_SENT.name,
            metric_defs::REQUESTS_SENT.labels[0] => dialect.to_string()
        )
        .increment(1);
        Ok(())
    }

    /// Hold writes until the transport has a peer, for at most the request
    /// timeout.
    fn wait_until_ready(&mut self) -> Result<(), LinkError> {
        if self.transport.is_ready() {
            return Ok(());
        }
        let timeout = self.config.request_timeout();
        info!("Waiting for the peer to send first");
        let deadline = Instant::now() + timeout;
        while !self.transport.is_ready() {
            if self.receiver.is_finished() {
                let reason = "frame receiver stopped".to_string();
                self.closed = Some(reason.clone());
                return Err(LinkError::Disconnected(reason));
            }
            if Instant::now() >= deadline {
                return Err(LinkError::NoPeer(timeout));
            }
            thread::sleep(READY_POLL);
        }
        debug!("peer known");
        Ok(())
    }

    /// Send a request and wait for its reply using the configured timeout.
    ///
    /// Error replies are returned as frames; callers decide what a rejection
    /// means for them.
    pub fn request(&mut self, command: u16, payload: &[u8]) -> Result<Frame, LinkError> {
        let timeout = self.config.request_timeout();
        self.request_with_timeout(command, payload, timeout)
    }

    /// Send a request and wait up to `timeout` for its reply.
    pub fn request_with_timeout(
        &mut self,
        command: u16,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<Frame, LinkError> {
        let started = Instant::now();
        self.send(command, payload)?;
        let deadline = started + timeout;

        loop {
            match self.receiver.events().recv_deadline(deadline) {
                Ok(ReceiverEvent::Frame(frame))
                    if frame.command == command && frame.direction != Direction::Request =>
                {
                    metrics::histogram!(metric_defs::REQUEST_LATENCY.name)
                        .record(started.elapsed().as_secs_f64());
                    return Ok(frame);
                }
                Ok(ReceiverEvent::Frame(frame)) => {
                    debug!(
                        expected = command,
                        received = frame.command,
                        "discarding unrelated frame"
                    );
                    metrics::counter!(metric_defs::FRAMES_DISCARDED.name).increment(1);
                }
                Ok(ReceiverEvent::Closed(reason)) => {
                    self.closed = Some(reason.clone());
                    return Err(LinkError::Disconnected(reason));
                }
                Err(RecvTimeoutError::Timeout) => {
                    metrics::counter!(metric_defs::REQUEST_TIMEOUTS.name).increment(1);
                    return Err(LinkError::Timeout { command });
                }
                Err(RecvTimeoutError::Disconnected) => {
                    let reason = "frame receiver stopped".to_string();
                    self.closed = Some(reason.clone());
                    return Err(LinkError::Disconnected(reason));
                }
            }
        }
    }

    /// Like [`request`](Self::request), but an error reply becomes
    /// [`LinkError::Rejected`].
    pub(crate) fn request_ok(&mut self, command: u16, payload: &[u8]) -> Result<Frame, LinkError> {
        let frame = self.request(command, payload)?;
        if frame.is_error() {
            return Err(LinkError::Rejected { command });
        }
        Ok(frame)
    }

    /// Read a named firmware setting as raw bytes.
    pub fn get_setting(&mut self, name: &str) -> Result<Vec<u8>, LinkError> {
        let frame = self.request_ok(MSP2_COMMON_SETTING, &setting_name(name))?;
        Ok(frame.payload)
    }

    /// Set a named firmware setting from raw bytes.
    pub fn set_setting(&mut self, name: &str, value: &[u8]) -> Result<(), LinkError> {
        let mut payload = setting_name(name);
        payload.extend_from_slice(value);
        self.request_ok(MSP2_COMMON_SET_SETTING, &payload)?;
        info!(name, "setting updated");
        Ok(())
    }

    /// Persist the configuration to EEPROM.
    pub fn eeprom_write(&mut self) -> Result<(), LinkError> {
        self.request_ok(MSP_EEPROM_WRITE, &[])?;
        Ok(())
    }

    /// Stop the receiver and close the transport.
    pub fn close(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        self.receiver.signal_stop();
        if let Err(e) = self.transport.close() {
            warn!(error = %e, "error closing transport");
        }
        self.receiver.stop();
        debug!("connection closed");
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.close();
    }
}

fn setting_name(name: &str) -> Vec<u8> {
    let mut payload = Vec::with_capacity(name.len() + 1);
    payload.extend_from_slice(name.as_bytes());
    payload.push(0);
    payload
}
