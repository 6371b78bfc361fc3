//! # Custodia
//!
//! Administrative authentication and session management core.
//!
//! `custodia` is the authentication layer an admin HTTP API builds on: it
//! turns a username/password pair into either an authenticated session with
//! an access/refresh token pair, or a correctly classified failure, while
//! enforcing progressive lockout and writing an auditable activity trail.
//! The HTTP layer itself (routing, validation, rate limiting) is a consumer
//! of this crate, not part of it.
//!
//! ## Components
//!
//! - [`AuthService`] — the orchestrator: `login`, `logout`,
//!   `verify_session`, `refresh`, and the per-request `authenticate`.
//! - [`store::AuthStore`] — typed one-method-per-operation store contract;
//!   [`store::PgAuthStore`] runs each mutation as a single atomic SQL
//!   statement, [`store::MemoryAuthStore`] is the in-process test double.
//! - [`token::TokenIssuer`] — stateless HS256 access/refresh tokens with
//!   distinct secrets and lifetimes.
//! - [`password`] — bcrypt credential hashing and verification.
//!
//! ## Security posture
//!
//! Unknown identifier and wrong password are deliberately merged into one
//! `InvalidCredentials` outcome (with a timing-equalizing dummy hash
//! comparison for unknown identifiers); locked and inactive accounts are
//! disclosed distinctly, matching the original system's tradeoff. Session
//! verification re-fetches the account on every call, so role changes and
//! deactivation never wait for token expiry.

pub mod config;
pub mod error;
pub mod models;
pub mod password;
pub mod service;
pub mod store;
pub mod token;

pub use config::AuthConfig;
pub use error::AuthError;
pub use models::{
    Account, ActivityEntry, ActivityKind, ActivityLevel, ClientInfo, LockoutState, LoginSession,
    RefreshedSession, Role, Session, SessionPrincipal,
};
pub use service::AuthService;
pub use store::{AuthStore, MemoryAuthStore, PgAuthStore};
pub use token::{Claims, TokenIssuer, TokenKind, TokenPair};
