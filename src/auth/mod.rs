// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Password login with self-issued JWT access tokens.
//!
//! ## Auth Flow
//!
//! 1. Client posts email + password to `/api/auth/login`
//! 2. Server verifies the Argon2id hash and issues an HS256 token carrying
//!    `sub` (user id), `role` and `reg` (registration id)
//! 3. Client sends `Authorization: Bearer <token>` on every other call
//! 4. Server verifies signature and expiry, then re-reads the account and
//!    role profile before any authorization decision
//!
//! ## Security
//!
//! - Clock skew tolerance is 60 seconds
//! - Password reset tokens are random, stored only as SHA-256 hashes
//! - Unknown email and wrong password produce the same error

pub mod claims;
pub mod error;
pub mod extractor;
pub mod jwt;
pub mod password;
pub mod roles;

pub use claims::{AuthenticatedUser, Claims};
pub use error::AuthError;
pub use extractor::{current_account, AdminOnly, Auth};
pub use jwt::{generate_access_token, validate_token, JwtConfig};
pub use roles::Role;
