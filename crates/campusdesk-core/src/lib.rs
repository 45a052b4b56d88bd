//! CampusDesk Core - Domain types, ports and configuration
//!
//! This crate contains the hexagonal architecture core of the upload client:
//! - **Domain values** - `CredentialPair`, `UploadFile`, `UploadRequest`, `UploadResult`
//! - **Upload state machine** - `UploadState` / `UploadAttempt`
//! - **Port definitions** - `ICredentialProvider`, `ISessionListener`
//! - **Configuration** - YAML-backed `Config` with validation and a builder
//!
//! # Architecture
//!
//! The domain module holds plain values with no I/O. Ports define the trait
//! interfaces the host application implements (credential storage, session
//! expiry handling). The HTTP adapters live in `campusdesk-api`.

pub mod config;
pub mod domain;
pub mod ports;
