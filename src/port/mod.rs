//! Trait definitions (hexagonal ports). Depend only on domain.
//!
//! Ports are the seams where the reconciliation core meets the outside
//! world. Adapters implement them against real systems; the `testkit`
//! module implements them in memory.
//!
//! # Architecture
//!
//! ```text
//!                    ┌─────────────────────────┐
//!                    │      Application        │
//!                    │  controllers, machines, │
//!     ┌──────────────┤  admins, settings       ├──────────────┐
//!     │              └─────────────────────────┘              │
//!     │                         │                             │
//!     ▼                         ▼                             ▼
//! ┌─────────┐            ┌─────────────┐              ┌───────────┐
//! │Container│            │  CLI tools  │              │ Settings  │
//! │ engine  │            │  kubeconfig │              │  channel  │
//! └─────────┘            └─────────────┘              └───────────┘
//! ```

pub mod outbound;
