//! Chain layer: node transport, ABI decoding, and supervised reading.
//!
//! The [`reader::ChainReader`] is the single point of contact with the
//! node, built on an injected [`transport::ChainTransport`]. The
//! [`supervisor::Supervisor`] owns its lifecycle: it reconnects with
//! capped backoff and replays missed block ranges so event coverage has
//! no gaps.

pub mod abi;
pub mod reader;
pub mod rpc;
pub mod supervisor;
pub mod transport;

pub use reader::{ChainReader, ContractMap, ReaderSignal};
pub use rpc::RpcTransport;
pub use supervisor::{Backoff, Supervisor, SupervisorConfig};
pub use transport::{ChainTransport, RawLog, TransportSignal};
