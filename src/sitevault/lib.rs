//! # Sitevault Architecture
//!
//! Sitevault is the durable record store behind a small content-managed site:
//! team members, services, jobs, testimonials and the rest live in a single
//! JSON document that is validated, backed up and replaced atomically.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  CLI (main.rs, args.rs)                                     │
//! │  - Parses arguments, prints results, owns exit codes        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  API Layer (api.rs)                                         │
//! │  - Thin facade over commands, feeds the sync queue          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Command Layer (commands/*.rs)                              │
//! │  - Read, merge, stamp, persist; returns CmdResult           │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Storage Layer (store/)                                     │
//! │  - DocumentStore trait                                      │
//! │  - ChecksumStore (file), MemoryStore, DualModeStore         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Pure helpers sit beside the layers: [`merge`] (field-level merge with
//! preserved fields), [`drift`] (snapshot comparison), [`normalize`]
//! (ingestion cleanup). [`bootstrap`] runs once at startup and [`sync`]
//! carries changes to a second copy off the request path.
//!
//! ## Failure Model
//!
//! Availability over strict consistency: a corrupt document falls back to
//! its backup, and to an empty default if the backup is gone too. Reads never
//! fail. Writes either replace the whole document or leave it untouched.
//!
//! ## Module Overview
//!
//! - [`api`]: entry point for all operations
//! - [`commands`]: business logic per operation
//! - [`store`]: persistence
//! - [`model`]: `Document`, `Record`, `Settings`, `Collection`
//! - [`config`]: configuration file and environment overrides
//! - [`error`]: error types

pub mod api;
pub mod bootstrap;
pub mod commands;
pub mod config;
pub mod drift;
pub mod error;
pub mod merge;
pub mod model;
pub mod normalize;
pub mod store;
pub mod sync;
