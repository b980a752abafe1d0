//! In-process simulated flight controller.
//!
//! [`SimulatedFc`] answers the identification, waypoint and settings
//! commands from an in-memory table and records every request it sees. Its
//! [`transport`](SimulatedFc::transport) plugs into
//! [`Engine::with_transport`](crate::Engine::with_transport) in place of a
//! real device.
//!
//! ```rust
//! use impload_link::{sim::SimulatedFc, Engine, LinkConfig};
//! use impload_mission::{MissionItem, MultiMission};
//!
//! let fc = SimulatedFc::new();
//! let mut engine = Engine::with_transport(fc.transport(), LinkConfig::default()).unwrap();
//! engine.handshake(false).unwrap();
//!
//! let mission = MultiMission::from_items(vec![MissionItem::waypoint(54.1, -4.6, 30)]);
//! let report = engine.upload(&mission, false).unwrap();
//! assert_eq!(report.device.count, 1);
//! assert_eq!(fc.waypoints().len(), 1);
//! ```

use std::collections::{HashMap, HashSet, VecDeque};
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use impload_mission::{decode_record, MissionItem, FLAG_LAST};
use msp_protocol::*;
use tracing::trace;

use crate::device::TransportKind;
use crate::transport::Transport;

const READ_TIMEOUT: Duration = Duration::from_millis(50);

struct SimState {
    api: ApiVersion,
    variant: FcVariant,
    version: FcVersion,
    build: BuildInfo,
    board: BoardInfo,
    name: CraftName,
    capacity: u8,
    /// Working mission, raw records in slot order.
    waypoints: Vec<Vec<u8>>,
    /// Mission in persistent storage.
    stored: Vec<Vec<u8>>,
    settings: HashMap<String, Vec<u8>>,
    requests: Vec<(Dialect, u16)>,
    reject_waypoints: HashSet<u16>,
    ignored: HashSet<u16>,
    corrupt_remaining: usize,
    unsolicited: VecDeque<Vec<u8>>,
    saves: usize,
    loads: usize,
    eeprom_writes: usize,
}

impl Default for SimState {
    fn default() -> Self {
        Self {
            api: ApiVersion {
                protocol: 0,
                major: 2,
                minor: 5,
            },
            variant: FcVariant("INAV".into()),
            version: FcVersion {
                major: 7,
                minor: 1,
                patch: 0,
            },
            build: BuildInfo {
                date: "Jan 10 2024".into(),
                time: "12:00:00".into(),
                git_revision: "a1b2c3d".into(),
            },
            board: BoardInfo {
                identifier: "SITL".into(),
                hardware_revision: 0,
                name: Some("SITL".into()),
            },
            name: CraftName("impload".into()),
            capacity: 120,
            waypoints: Vec::new(),
            stored: Vec::new(),
            settings: HashMap::new(),
            requests: Vec::new(),
            reject_waypoints: HashSet::new(),
            ignored: HashSet::new(),
            corrupt_remaining: 0,
            unsolicited: VecDeque::new(),
            saves: 0,
            loads: 0,
            eeprom_writes: 0,
        }
    }
}

impl SimState {
    fn wp_info(&self) -> WpInfo {
        WpInfo {
            max: self.capacity,
            valid: self
                .waypoints
                .last()
                .map_or(false, |record| record.last() == Some(&FLAG_LAST)),
            count: self.waypoints.len() as u8,
        }
    }

    /// Reply for one request: `None` for no reply, otherwise direction and payload.
    fn handle(&mut self, frame: &Frame) -> Option<(Direction, Vec<u8>)> {
        self.requests.push((frame.dialect, frame.command));
        if self.ignored.contains(&frame.command) {
            return None;
        }

        let ok = |payload: Vec<u8>| Some((Direction::Response, payload));
        let err = || Some((Direction::Error, Vec::new()));

        match frame.command {
            MSP_API_VERSION => ok(self.api.encode()),
            MSP_FC_VARIANT => ok(self.variant.encode()),
            MSP_FC_VERSION => ok(self.version.encode()),
            MSP_BUILD_INFO => ok(self.build.encode()),
            MSP_BOARD_INFO => ok(self.board.encode()),
            MSP_NAME => ok(self.name.encode()),
            MSP_WP_GETINFO => ok(self.wp_info().encode()),
            MSP_WP => {
                let index = frame.payload.first().copied().unwrap_or(0) as usize;
                match index.checked_sub(1).and_then(|i| self.waypoints.get(i)) {
                    Some(record) => ok(record.clone()),
                    None => err(),
                }
            }
            MSP_SET_WP => {
                let Ok(item) = decode_record(&frame.payload) else {
                    return err();
                };
                if item.number == 0
                    || item.number > self.capacity as u16
                    || self.reject_waypoints.contains(&item.number)
                {
                    return err();
                }
                // Writing slot n discards everything from n on.
                self.waypoints.truncate(item.number as usize - 1);
                self.waypoints.push(frame.payload.clone());
                ok(Vec::new())
            }
            MSP_WP_MISSION_LOAD => {
                self.loads += 1;
                self.waypoints = self.stored.clone();
                ok(Vec::new())
            }
            MSP_WP_MISSION_SAVE => {
                if !self.wp_info().valid {
                    return err();
                }
                self.saves += 1;
                self.stored = self.waypoints.clone();
                ok(Vec::new())
            }
            MSP_EEPROM_WRITE => {
                self.eeprom_writes += 1;
                ok(Vec::new())
            }
            MSP2_COMMON_SETTING => {
                let name = setting_name(&frame.payload)?;
                match self.settings.get(&name) {
                    Some(value) => ok(value.clone()),
                    None => err(),
                }
            }
            MSP2_COMMON_SET_SETTING => {
                let name = setting_name(&frame.payload)?;
                let value = frame.payload[name.len() + 1..].to_vec();
                self.settings.insert(name, value);
                ok(Vec::new())
            }
            _ => err(),
        }
    }
}

fn setting_name(payload: &[u8]) -> Option<String> {
    let end = payload.iter().position(|&b| b == 0)?;
    Some(String::from_utf8_lossy(&payload[..end]).into_owned())
}

/// A scripted flight controller.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct SimulatedFc {
    state: Arc<Mutex<SimState>>,
}

impl Default for SimulatedFc {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedFc {
    /// INAV 7.1 with API 2.5, an empty mission and capacity 120.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState::default())),
        }
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with_api_major(self, major: u8) -> Self {
        self.state().api.major = major;
        self
    }

    pub fn with_capacity(self, capacity: u8) -> Self {
        self.state().capacity = capacity;
        self
    }

    pub fn with_craft_name(self, name: &str) -> Self {
        self.state().name = CraftName(name.into());
        self
    }

    /// Preload the working mission. Items are stored as given.
    pub fn with_waypoints(self, items: &[MissionItem]) -> Self {
        self.state().waypoints = items.iter().map(impload_mission::encode_record).collect();
        self
    }

    /// Preload persistent storage.
    pub fn with_stored_waypoints(self, items: &[MissionItem]) -> Self {
        self.state().stored = items.iter().map(impload_mission::encode_record).collect();
        self
    }

    pub fn with_setting(self, name: &str, value: &[u8]) -> Self {
        self.state().settings.insert(name.into(), value.to_vec());
        self
    }

    /// Answer SET_WP for 1-based slot `number` with an error.
    pub fn reject_waypoint(self, number: u16) -> Self {
        self.state().reject_waypoints.insert(number);
        self
    }

    /// Never answer `command`.
    pub fn ignore_command(self, command: u16) -> Self {
        self.state().ignored.insert(command);
        self
    }

    /// Precede each of the next `count` replies with a copy whose checksum
    /// is wrong.
    pub fn corrupt_replies(self, count: usize) -> Self {
        self.state().corrupt_remaining = count;
        self
    }

    /// Send a response frame for `command` ahead of the next reply.
    pub fn inject_unsolicited(self, command: u16, payload: &[u8]) -> Self {
        if let Ok(bytes) = FrameCodec::encode_frame(Dialect::V1, Direction::Response, command, payload) {
            self.state().unsolicited.push_back(bytes);
        }
        self
    }

    /// A new connection to this flight controller.
    pub fn transport(&self) -> Box<dyn Transport> {
        let (replies_tx, replies_rx) = crossbeam_channel::unbounded();
        Box::new(SimTransport {
            fc: self.clone(),
            replies_tx,
            replies_rx,
            decoder: Decoder::new(),
            pending: VecDeque::new(),
        })
    }

    /// Every request received, in order.
    pub fn requests(&self) -> Vec<(Dialect, u16)> {
        self.state().requests.clone()
    }

    /// Command ids of every request received, in order.
    pub fn commands(&self) -> Vec<u16> {
        self.state().requests.iter().map(|(_, c)| *c).collect()
    }

    /// Working mission.
    pub fn waypoints(&self) -> Vec<MissionItem> {
        decode_all(&self.state().waypoints)
    }

    /// Mission in persistent storage.
    pub fn stored_waypoints(&self) -> Vec<MissionItem> {
        decode_all(&self.state().stored)
    }

    pub fn setting(&self, name: &str) -> Option<Vec<u8>> {
        self.state().settings.get(name).cloned()
    }

    /// Number of successful WP_MISSION_SAVE requests.
    pub fn saves(&self) -> usize {
        self.state().saves
    }

    /// Number of WP_MISSION_LOAD requests.
    pub fn loads(&self) -> usize {
        self.state().loads
    }

    pub fn eeprom_writes(&self) -> usize {
        self.state().eeprom_writes
    }

    /// Handle one request, returning the byte chunks to send back.
    fn receive(&self, frame: &Frame) -> Vec<Vec<u8>> {
        let mut state = self.state();
        let reply = state.handle(frame);
        trace!(command = frame.command, replied = reply.is_some(), "sim request");
        let Some((direction, payload)) = reply else {
            return Vec::new();
        };
        let Ok(bytes) = FrameCodec::encode_frame(frame.dialect, direction, frame.command, &payload) else {
            return Vec::new();
        };

        let mut chunks: Vec<Vec<u8>> = state.unsolicited.drain(..).collect();
        if state.corrupt_remaining > 0 {
            state.corrupt_remaining -= 1;
            let mut bad = bytes.clone();
            if let Some(checksum) = bad.last_mut() {
                *checksum ^= 0xFF;
            }
            chunks.push(bad);
        }
        chunks.push(bytes);
        chunks
    }
}

fn decode_all(records: &[Vec<u8>]) -> Vec<MissionItem> {
    records
        .iter()
        .filter_map(|record| decode_record(record).ok())
        .collect()
}

/// Transport end of a [`SimulatedFc`]. Clones share the reply channel.
struct SimTransport {
    fc: SimulatedFc,
    replies_tx: Sender<Vec<u8>>,
    replies_rx: Receiver<Vec<u8>>,
    decoder: Decoder,
    pending: VecDeque<u8>,
}

impl Read for SimTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() {
            match self.replies_rx.recv_timeout(READ_TIMEOUT) {
                // An empty chunk is the close marker.
                Ok(chunk) if chunk.is_empty() => return Ok(0),
                Ok(chunk) => self.pending.extend(chunk),
                Err(RecvTimeoutError::Timeout) => return Err(io::ErrorKind::TimedOut.into()),
                Err(RecvTimeoutError::Disconnected) => return Ok(0),
            }
        }
        let n = buf.len().min(self.pending.len());
        for (dst, src) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }
}

impl Write for SimTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for frame in self.decoder.feed(buf) {
            if frame.direction == Direction::Request {
                for chunk in self.fc.receive(&frame) {
                    let _ = self.replies_tx.send(chunk);
                }
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for SimTransport {
    fn kind(&self) -> TransportKind {
        // Behaves like a serial line.
        TransportKind::Serial
    }

    fn close(&mut self) -> io::Result<()> {
        let _ = self.replies_tx.send(Vec::new());
        Ok(())
    }

    fn try_clone(&self) -> io::Result<Box<dyn Transport>> {
        Ok(Box::new(SimTransport {
            fc: self.fc.clone(),
            replies_tx: self.replies_tx.clone(),
            replies_rx: self.replies_rx.clone(),
            decoder: Decoder::new(),
            pending: VecDeque::new(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(transport: &mut Box<dyn Transport>, dialect: Dialect, command: u16, payload: &[u8]) {
        let bytes = FrameCodec::encode(dialect, command, payload).unwrap();
        transport.write_all(&bytes).unwrap();
    }

    fn read_frame(transport: &mut Box<dyn Transport>) -> Frame {
        let mut decoder = Decoder::new();
        let mut buf = [0u8; 64];
        loop {
            let n = transport.read(&mut buf).unwrap();
            if let Some(frame) = decoder.feed(&buf[..n]).into_iter().next() {
                return frame;
            }
        }
    }

    #[test]
    fn test_replies_in_request_dialect() {
        let fc = SimulatedFc::new();
        let mut transport = fc.transport();
        request(&mut transport, Dialect::V2, MSP_API_VERSION, &[]);
        let frame = read_frame(&mut transport);
        assert_eq!(frame.dialect, Dialect::V2);
        assert_eq!(ApiVersion::decode(&frame.payload).unwrap().major, 2);
        assert_eq!(fc.requests(), vec![(Dialect::V2, MSP_API_VERSION)]);
    }

    #[test]
    fn test_set_wp_truncates_from_slot() {
        let items: Vec<_> = (0..3).map(|i| MissionItem::waypoint(50.0 + i as f64, 1.0, 10)).collect();
        let fc = SimulatedFc::new().with_waypoints(&items);
        let mut transport = fc.transport();

        let mut replacement = MissionItem::waypoint(1.0, 2.0, 3);
        replacement.number = 2;
        replacement.flag = FLAG_LAST;
        request(
            &mut transport,
            Dialect::V1,
            MSP_SET_WP,
            &impload_mission::encode_record(&replacement),
        );
        assert!(!read_frame(&mut transport).is_error());

        let stored = fc.waypoints();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[1].lat, 1.0);
    }

    #[test]
    fn test_unknown_command_is_error() {
        let fc = SimulatedFc::new();
        let mut transport = fc.transport();
        request(&mut transport, Dialect::V1, 99, &[]);
        assert!(read_frame(&mut transport).is_error());
    }

    #[test]
    fn test_close_ends_stream() {
        let fc = SimulatedFc::new();
        let mut transport = fc.transport();
        let mut reader = transport.try_clone().unwrap();
        transport.close().unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }
}
