//! Frame receiver thread.
//!
//! One receiver runs for the lifetime of a connection. It reads from its own
//! clone of the transport, pushes every byte through a [`Decoder`], and
//! publishes each checksum-valid frame on an unbounded channel with a single
//! consumer, the engine. A read error or end of stream ends the thread after
//! publishing [`ReceiverEvent::Closed`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use msp_protocol::{Decoder, Frame};
use tracing::{debug, error};

use crate::telemetry::metric_defs;
use crate::transport::{is_idle_error, Transport};

const READ_BUF_SIZE: usize = 512;

/// Messages from the receiver thread to the engine.
#[derive(Debug)]
pub enum ReceiverEvent {
    /// A checksum-valid frame.
    Frame(Frame),
    /// The transport failed or reached end of stream. No further events follow.
    Closed(String),
}

/// Handle to a running receiver thread.
pub struct ReceiverHandle {
    events: Receiver<ReceiverEvent>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ReceiverHandle {
    /// Event channel. Only the engine reads it.
    pub fn events(&self) -> &Receiver<ReceiverEvent> {
        &self.events
    }

    /// Whether the thread has exited.
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Ask the thread to stop without waiting.
    pub fn signal_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Ask the thread to stop and wait for it.
    ///
    /// The thread notices the request after its current read returns, so
    /// the transport's read timeout bounds how long this blocks.
    pub fn stop(&mut self) {
        self.signal_stop();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("frame receiver panicked");
            }
        }
    }
}

impl Drop for ReceiverHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Spawn the receiver on `transport`.
pub fn spawn_receiver(transport: Box<dyn Transport>) -> std::io::Result<ReceiverHandle> {
    let (tx, rx) = crossbeam_channel::unbounded();
    let stop = Arc::new(AtomicBool::new(false));
    let thread_stop = Arc::clone(&stop);

    let thread = thread::Builder::new()
        .name("msp-receiver".into())
        .spawn(move || receiver_main(transport, tx, thread_stop))?;

    Ok(ReceiverHandle {
        events: rx,
        stop,
        thread: Some(thread),
    })
}

fn receiver_main(mut transport: Box<dyn Transport>, tx: Sender<ReceiverEvent>, stop: Arc<AtomicBool>) {
    let kind = transport.kind().to_string();
    let mut decoder = Decoder::new();
    let mut buf = [0u8; READ_BUF_SIZE];
    debug!(transport = %kind, "frame receiver started");

    let reason = loop {
        if stop.load(Ordering::Acquire) {
            break None;
        }
        let n = match transport.read(&mut buf) {
            Ok(0) => break Some("end of stream".to_string()),
            Ok(n) => n,
            Err(e) if is_idle_error(&e) => continue,
            Err(e) => break Some(format!("read failed: {}", e)),
        };

        let errors_before = decoder.checksum_errors();
        let frames = decoder.feed(&buf[..n]);
        let new_errors = decoder.checksum_errors() - errors_before;
        if new_errors > 0 {
            metrics::counter!(
                metric_defs::CHECKSUM_ERRORS.name,
                metric_defs::CHECKSUM_ERRORS.labels[0] => kind.clone()
            )
            .increment(new_errors);
        }

        for frame in frames {
            debug!(
                command = frame.command,
                direction = ?frame.direction,
                len = frame.payload.len(),
                "frame received"
            );
            metrics::counter!(
                metric_defs::FRAMES_RECEIVED.name,
                metric_defs::FRAMES_RECEIVED.labels[0] => kind.clone()
            )
            .increment(1);
            if tx.send(ReceiverEvent::Frame(frame)).is_err() {
                // Engine gone; nobody left to deliver to.
                return;
            }
        }
    };

    let frames = decoder.frames_decoded();
    match reason {
        Some(reason) => {
            // A stop request racing a transport shutdown is not a failure.
            if stop.load(Ordering::Acquire) {
                debug!(transport = %kind, frames, "frame receiver stopped");
            } else {
                error!(transport = %kind, frames, %reason, "frame receiver terminated");
            }
            let _ = transport.close();
            let _ = tx.send(ReceiverEvent::Closed(reason));
        }
        None => debug!(transport = %kind, frames, "frame receiver stopped"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::TransportKind;
    use msp_protocol::{Dialect, FrameCodec, MSP_API_VERSION, MSP_NAME};
    use std::collections::VecDeque;
    use std::io::{self, Read, Write};
    use std::time::Duration;

    /// Replays scripted reads, then reports end of stream.
    struct Scripted {
        reads: VecDeque<io::Result<Vec<u8>>>,
    }

    impl Read for Scripted {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.reads.pop_front() {
                Some(Ok(data)) => {
                    buf[..data.len()].copy_from_slice(&data);
                    Ok(data.len())
                }
                Some(Err(e)) => Err(e),
                None => Ok(0),
            }
        }
    }

    impl Write for Scripted {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Transport for Scripted {
        fn kind(&self) -> TransportKind {
            TransportKind::Tcp
        }

        fn close(&mut self) -> io::Result<()> {
            Ok(())
        }

        fn try_clone(&self) -> io::Result<Box<dyn Transport>> {
            Err(io::ErrorKind::Unsupported.into())
        }
    }

    fn response(command: u16, payload: &[u8]) -> Vec<u8> {
        FrameCodec::encode_frame(Dialect::V1, msp_protocol::Direction::Response, command, payload)
            .unwrap()
    }

    #[test]
    fn test_publishes_frames_then_closed() {
        let reply = response(MSP_API_VERSION, &[0, 2, 5]);
        let (head, tail) = reply.split_at(3);
        let reads = VecDeque::from(vec![
            Ok(head.to_vec()),
            Err(io::ErrorKind::TimedOut.into()),
            Ok(tail.to_vec()),
            Ok(response(MSP_NAME, b"quad")),
        ]);
        let handle = spawn_receiver(Box::new(Scripted { reads })).unwrap();
        let timeout = Duration::from_secs(2);

        match handle.events().recv_timeout(timeout).unwrap() {
            ReceiverEvent::Frame(frame) => {
                assert_eq!(frame.command, MSP_API_VERSION);
                assert_eq!(frame.payload, vec![0, 2, 5]);
            }
            other => panic!("unexpected {:?}", other),
        }
        match handle.events().recv_timeout(timeout).unwrap() {
            ReceiverEvent::Frame(frame) => assert_eq!(frame.payload, b"quad"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            handle.events().recv_timeout(timeout).unwrap(),
            ReceiverEvent::Closed(_)
        ));
    }

    #[test]
    fn test_read_error_closes() {
        let reads = VecDeque::from(vec![Err(io::ErrorKind::BrokenPipe.into())]);
        let handle = spawn_receiver(Box::new(Scripted { reads })).unwrap();
        match handle.events().recv_timeout(Duration::from_secs(2)).unwrap() {
            ReceiverEvent::Closed(reason) => assert!(reason.contains("read failed")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_corrupt_frame_not_published() {
        let mut bad = response(MSP_NAME, b"abc");
        let last = bad.len() - 1;
        bad[last] ^= 0xFF;
        let reads = VecDeque::from(vec![Ok(bad), Ok(response(MSP_API_VERSION, &[0, 1, 42]))]);
        let handle = spawn_receiver(Box::new(Scripted { reads })).unwrap();
        match handle.events().recv_timeout(Duration::from_secs(2)).unwrap() {
            ReceiverEvent::Frame(frame) => assert_eq!(frame.command, MSP_API_VERSION),
            other => panic!("unexpected {:?}", other),
        }
    }
}
