//! Serial link transport
//!
//! Both halves are generic over `embedded-io-async` streams, a [`Clock`] and
//! an async delay, so the firmware runs them on the UART and the tests on
//! in-memory mocks.
//!
//! - [`TransportRx`] reads with a bounded timeout, feeds the frame decoder,
//!   parses payloads into [`Message`]s and stamps the [`LinkMonitor`] on
//!   every valid one.
//! - [`TransportTx`] encodes a message, waits out the minimum spacing since
//!   the previous send and writes it under a timeout. There is no retry.

use embassy_futures::select::{select, Either};
use embedded_hal_async::delay::DelayNs;
use embedded_io_async::{Error as _, ErrorKind, Read, Write};
use recliner_protocol::{encode_to_vec, FrameDecoder, FrameError, Message, MAX_MESSAGE_LEN};

use crate::config::LinkConfig;
use crate::safety::LinkMonitor;
use crate::traits::Clock;

/// Bytes pulled from the reader per poll
pub const RX_CHUNK_LEN: usize = 32;

/// Worst-case encoded size of one message
pub const TX_FRAME_LEN: usize = 2 + 2 * MAX_MESSAGE_LEN;

/// Errors returned to the sender
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// Write did not complete within the write timeout
    Timeout,
    /// Underlying stream failed
    Io(ErrorKind),
    /// Message could not be framed
    Encode(FrameError),
}

/// Receive-side counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxStats {
    /// Frames that parsed into a message
    pub messages: u32,
    /// Frames dropped for a schema error
    pub schema_errors: u32,
    /// Failed reads
    pub io_errors: u32,
}

/// Receive half of the link
pub struct TransportRx<'a, R, C, D> {
    reader: R,
    clock: C,
    delay: D,
    link: &'a LinkMonitor,
    decoder: FrameDecoder,
    read_timeout_ms: u32,
    stats: RxStats,
}

impl<'a, R: Read, C: Clock, D: DelayNs> TransportRx<'a, R, C, D> {
    pub fn new(reader: R, clock: C, delay: D, link: &'a LinkMonitor, config: &LinkConfig) -> Self {
        Self {
            reader,
            clock,
            delay,
            link,
            decoder: FrameDecoder::new(),
            read_timeout_ms: config.read_timeout_ms.max(1),
            stats: RxStats::default(),
        }
    }

    /// Read whatever arrives within the read timeout and dispatch every
    /// complete message
    ///
    /// Returns the number of bytes consumed; 0 means the read timed out.
    pub async fn poll(&mut self, mut dispatch: impl FnMut(Message)) -> Result<usize, TransportError> {
        let mut buf = [0u8; RX_CHUNK_LEN];

        let read = select(
            self.reader.read(&mut buf),
            self.delay.delay_ms(self.read_timeout_ms),
        )
        .await;

        let n = match read {
            Either::First(Ok(n)) => n,
            Either::First(Err(e)) => {
                self.stats.io_errors = self.stats.io_errors.wrapping_add(1);
                return Err(TransportError::Io(e.kind()));
            }
            Either::Second(()) => return Ok(0),
        };

        trace!("link rx: {} bytes", n);
        let now = self.clock.now_ms();
        for &byte in &buf[..n] {
            if let Some(payload) = self.decoder.feed(byte) {
                match Message::from_payload(payload) {
                    Ok(message) => {
                        self.link.frame_received(now);
                        self.stats.messages = self.stats.messages.wrapping_add(1);
                        dispatch(message);
                    }
                    Err(e) => {
                        self.stats.schema_errors = self.stats.schema_errors.wrapping_add(1);
                        warn!("link rx: dropped frame: {}", e);
                    }
                }
            }
        }

        Ok(n)
    }

    pub fn stats(&self) -> RxStats {
        self.stats
    }

    /// Frame-level counters from the decoder
    pub fn decoder(&self) -> &FrameDecoder {
        &self.decoder
    }
}

/// Send half of the link
///
/// Exclusive by `&mut`; tasks that share it wrap it in an async mutex so
/// frames never interleave.
pub struct TransportTx<W, C, D> {
    writer: W,
    clock: C,
    delay: D,
    min_spacing_ms: u32,
    write_timeout_ms: u32,
    last_send_ms: Option<u32>,
}

impl<W: Write, C: Clock, D: DelayNs> TransportTx<W, C, D> {
    pub fn new(writer: W, clock: C, delay: D, config: &LinkConfig) -> Self {
        Self {
            writer,
            clock,
            delay,
            min_spacing_ms: config.min_send_spacing_ms,
            write_timeout_ms: config.write_timeout_ms,
            last_send_ms: None,
        }
    }

    /// Frame and send one message
    pub async fn send(&mut self, message: &Message) -> Result<(), TransportError> {
        let frame = encode_to_vec::<TX_FRAME_LEN>(&message.to_payload())
            .map_err(TransportError::Encode)?;

        if let Some(last) = self.last_send_ms {
            let since = self.clock.now_ms().wrapping_sub(last);
            if since < self.min_spacing_ms {
                self.delay.delay_ms(self.min_spacing_ms - since).await;
            }
        }
        self.last_send_ms = Some(self.clock.now_ms());

        let writer = &mut self.writer;
        let write = async move {
            writer.write_all(&frame).await?;
            writer.flush().await
        };

        match select(write, self.delay.delay_ms(self.write_timeout_ms)).await {
            Either::First(Ok(())) => Ok(()),
            Either::First(Err(e)) => {
                warn!("link tx: write failed");
                Err(TransportError::Io(e.kind()))
            }
            Either::Second(()) => {
                warn!("link tx: write timed out after {} ms", self.write_timeout_ms);
                Err(TransportError::Timeout)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;
    use core::future::pending;
    use embassy_futures::block_on;
    use embedded_io_async::ErrorType;
    use recliner_protocol::{encode, MotorCommandPair, Telemetry, TelemetryId};
    use std::collections::VecDeque;
    use std::rc::Rc;
    use std::vec::Vec;

    #[derive(Clone, Default)]
    struct MockClock(Rc<Cell<u32>>);

    impl Clock for MockClock {
        fn now_ms(&self) -> u32 {
            self.0.get()
        }
    }

    /// Completes at once, advancing the shared clock
    struct MockDelay(Rc<Cell<u32>>);

    impl DelayNs for MockDelay {
        async fn delay_ns(&mut self, ns: u32) {
            self.0.set(self.0.get() + ns / 1_000_000);
        }

        async fn delay_ms(&mut self, ms: u32) {
            self.0.set(self.0.get() + ms);
        }
    }

    /// Hands out queued chunks, then blocks forever
    struct MockRx {
        chunks: VecDeque<Result<Vec<u8>, ErrorKind>>,
    }

    impl ErrorType for MockRx {
        type Error = ErrorKind;
    }

    impl Read for MockRx {
        async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ErrorKind> {
            match self.chunks.pop_front() {
                Some(Ok(chunk)) => {
                    buf[..chunk.len()].copy_from_slice(&chunk);
                    Ok(chunk.len())
                }
                Some(Err(e)) => Err(e),
                None => pending().await,
            }
        }
    }

    /// Records each write with the time it started
    struct MockTx {
        clock: MockClock,
        writes: Vec<(u32, Vec<u8>)>,
        stall: bool,
    }

    impl ErrorType for MockTx {
        type Error = ErrorKind;
    }

    impl Write for MockTx {
        async fn write(&mut self, buf: &[u8]) -> Result<usize, ErrorKind> {
            if self.stall {
                return pending().await;
            }
            self.writes.push((self.clock.now_ms(), buf.to_vec()));
            Ok(buf.len())
        }

        async fn flush(&mut self) -> Result<(), ErrorKind> {
            Ok(())
        }
    }

    /// Timestamp bytes collide with every marker
    fn command() -> Message {
        Message::Telemetry(Telemetry::new(0xAABB_CC01, TelemetryId::LeftCurrent, 1.5))
    }

    fn framed(message: &Message) -> Vec<u8> {
        let mut buf = [0u8; TX_FRAME_LEN];
        let len = encode(&message.to_payload(), &mut buf).unwrap();
        buf[..len].to_vec()
    }

    fn rx_with<'a>(
        chunks: Vec<Result<Vec<u8>, ErrorKind>>,
        time: &Rc<Cell<u32>>,
        link: &'a LinkMonitor,
    ) -> TransportRx<'a, MockRx, MockClock, MockDelay> {
        TransportRx::new(
            MockRx {
                chunks: chunks.into_iter().collect(),
            },
            MockClock(time.clone()),
            MockDelay(time.clone()),
            link,
            &LinkConfig::default(),
        )
    }

    #[test]
    fn test_rx_dispatches_and_refreshes_link() {
        let time = Rc::new(Cell::new(1000));
        let link = LinkMonitor::new();
        let status = Message::Status(MotorCommandPair::idle());

        // Two frames split across reads
        let mut bytes = framed(&status);
        bytes.extend(framed(&status));
        let (a, b) = bytes.split_at(5);
        let mut rx = rx_with(std::vec![Ok(a.to_vec()), Ok(b.to_vec())], &time, &link);

        let mut got = Vec::new();
        block_on(rx.poll(|m| got.push(m))).unwrap();
        assert!(got.is_empty());
        assert_eq!(link.last_frame_ms(), None);

        block_on(rx.poll(|m| got.push(m))).unwrap();
        assert_eq!(got, [status, status]);
        assert_eq!(link.last_frame_ms(), Some(1000));
        assert_eq!(rx.stats().messages, 2);
    }

    #[test]
    fn test_rx_counts_schema_errors() {
        let time = Rc::new(Cell::new(0));
        let link = LinkMonitor::new();

        // Unknown protocol version
        let mut buf = [0u8; 16];
        let len = encode(&[9, 0x01, 0, 0, 0, 0], &mut buf).unwrap();
        let mut rx = rx_with(std::vec![Ok(buf[..len].to_vec())], &time, &link);

        let mut got = Vec::new();
        block_on(rx.poll(|m| got.push(m))).unwrap();
        assert!(got.is_empty());
        assert_eq!(rx.stats().schema_errors, 1);
        assert_eq!(link.last_frame_ms(), None);
    }

    #[test]
    fn test_rx_read_timeout() {
        let time = Rc::new(Cell::new(0));
        let link = LinkMonitor::new();
        let mut rx = rx_with(Vec::new(), &time, &link);

        assert_eq!(block_on(rx.poll(|_| {})), Ok(0));
        assert_eq!(time.get(), LinkConfig::default().read_timeout_ms);
    }

    #[test]
    fn test_rx_io_error() {
        let time = Rc::new(Cell::new(0));
        let link = LinkMonitor::new();
        let mut rx = rx_with(std::vec![Err(ErrorKind::BrokenPipe)], &time, &link);

        assert_eq!(
            block_on(rx.poll(|_| {})),
            Err(TransportError::Io(ErrorKind::BrokenPipe))
        );
        assert_eq!(rx.stats().io_errors, 1);
    }

    fn tx(time: &Rc<Cell<u32>>, stall: bool) -> TransportTx<MockTx, MockClock, MockDelay> {
        TransportTx::new(
            MockTx {
                clock: MockClock(time.clone()),
                writes: Vec::new(),
                stall,
            },
            MockClock(time.clone()),
            MockDelay(time.clone()),
            &LinkConfig::default(),
        )
    }

    #[test]
    fn test_tx_writes_escaped_frame() {
        let time = Rc::new(Cell::new(0));
        let mut tx = tx(&time, false);
        let message = command();

        block_on(tx.send(&message)).unwrap();
        assert_eq!(tx.writer.writes.len(), 1);
        assert_eq!(tx.writer.writes[0].1, framed(&message));
    }

    #[test]
    fn test_tx_enforces_spacing() {
        let time = Rc::new(Cell::new(100));
        let mut tx = tx(&time, false);
        let message = command();

        block_on(tx.send(&message)).unwrap();
        time.set(120);
        block_on(tx.send(&message)).unwrap();
        time.set(400);
        block_on(tx.send(&message)).unwrap();

        let starts: Vec<u32> = tx.writer.writes.iter().map(|(t, _)| *t).collect();
        assert_eq!(starts, [100, 150, 400]);
    }

    #[test]
    fn test_tx_timeout() {
        let time = Rc::new(Cell::new(0));
        let mut tx = tx(&time, true);

        assert_eq!(block_on(tx.send(&command())), Err(TransportError::Timeout));
        assert_eq!(time.get(), LinkConfig::default().write_timeout_ms);
    }
}
