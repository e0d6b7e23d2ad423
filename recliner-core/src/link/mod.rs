//! Serial link to the input board

pub mod transport;

pub use transport::{RxStats, TransportError, TransportRx, TransportTx, RX_CHUNK_LEN, TX_FRAME_LEN};
