// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! School Portal - role-based school management service
//!
//! REST API for students, teachers and administrators. Every request is
//! checked against the caller's role and class assignment before anything
//! is read or written.
//!
//! ## Modules
//!
//! - `access` - Authorization rules and visibility scopes
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - JWT sessions and password hashing
//! - `storage` - JSON document store with a redb unique index
//! - `seed` - First-run administrator account

pub mod access;
pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod seed;
pub mod state;
pub mod storage;
