//! # ikev2-token
//!
//! The cryptographic token contract consumed by the IKEv2 packet codec.
//!
//! The interface is deliberately PKCS#11-shaped: sessions are opaque
//! handles, keys are object handles owned by the token, and every
//! operation is an `*_init` followed by a single-part call. A production
//! deployment backs [`Token`] with a hardware provider; [`soft::SoftToken`]
//! is the in-process software backend used otherwise and by every test.
//!
//! Idle sessions are recycled through [`pool::SessionPool`] and are never
//! closed while the process runs, because closing a PKCS#11 session
//! destroys every object that session created.

#![warn(missing_docs, clippy::unwrap_used, clippy::expect_used)]

pub mod mech;
pub mod pool;
pub mod soft;
pub mod token;

pub use mech::{MechKind, MechParams, Mechanism};
pub use pool::{PooledSession, SessionPool};
pub use token::{ObjectHandle, SessionHandle, Token, TokenError};
