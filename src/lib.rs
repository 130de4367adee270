//! # marketsync
//!
//! Blockchain state-synchronization service for the skins marketplace
//! dApp. Keeps an off-chain Mirror Store consistent with on-chain ledger
//! truth and orchestrates client-side write transactions.
//!
//! The smart contracts, the CRUD API, and the UI are external
//! collaborators — this crate owns only the synchronization core.
//!
//! ## Architecture
//!
//! ```text
//! Ethereum node (WebSocket JSON-RPC)
//!     │
//!     ├── ChainTransport / ChainReader (chain/)
//!     ├── Supervisor: backoff + replay (chain/)
//!     │        │ bounded event queue
//!     ├── Reconciler: per-entity lanes (reconcile/)
//!     │        │
//!     ├── MirrorStore + dedup ledger + checkpoints (store/)
//!     │
//!     ├── TxSubmitter + TransactionHandle (submit/)
//!     │
//!     └── EventBus → /health /status /ws (domain/, api/, ws/)
//! ```

pub mod api;
pub mod app_state;
pub mod chain;
pub mod config;
pub mod domain;
pub mod error;
pub mod reconcile;
pub mod store;
pub mod submit;
pub mod ws;
