//! # pulse-gateway
//!
//! Server-Sent Events fan-out for server-originated state changes.
//!
//! Request handlers anywhere in the process publish events into named
//! channels; every open subscriber stream on that channel receives them.
//! One registry, one publisher and one stream lifecycle serve every
//! channel family (broadcast, mapping updates, contacts, docs, WebEx).
//!
//! ## Architecture
//!
//! ```text
//! Subscribers (GET /events/{family})      Request handlers
//!     │                                       │
//!     ├── SSE Handler (sse/)                  ├── REST Handlers (api/)
//!     ├── StreamHandler (sse/)                ├── Publisher (service/)
//!     │                                       │
//!     └──────────────► Registry (domain/) ◄───┘
//! ```
//!
//! Delivery is best-effort and in-memory: an event reaches only the
//! subscribers connected to this process when it is published.

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod server;
pub mod service;
pub mod sse;
