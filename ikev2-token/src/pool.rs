//! Process-wide recycling of idle token sessions
//!
//! PKCS#11 tokens destroy every object a session created when that
//! session closes. Since the negotiated IKE keys live as session objects,
//! an idle session must never be closed while the daemon runs; instead it
//! goes back on a free list for the next packet that needs one.

use std::sync::{Arc, Mutex, MutexGuard};

use log::{error, warn};

use crate::mech::Mechanism;
use crate::token::{ObjectHandle, SessionHandle, Token, TokenError};

/// A shared pool of idle sessions over a [`Token`]
///
/// Acquiring a session pops the free list or opens a fresh one; dropping
/// the returned [`PooledSession`] pushes the handle back. The free list
/// grows with the usual amortized doubling; if growth fails under memory
/// pressure the handle is leaked rather than closed, because leaking an
/// idle session is strictly better than destroying live keys.
pub struct SessionPool {
    token: Arc<dyn Token>,
    idle: Mutex<Vec<SessionHandle>>,
}

impl SessionPool {
    /// Create an empty pool over `token`.
    pub fn new(token: Arc<dyn Token>) -> Self {
        Self {
            token,
            idle: Mutex::new(Vec::new()),
        }
    }

    /// Access the underlying token.
    pub fn token(&self) -> &dyn Token {
        &*self.token
    }

    /// Acquire a session, reusing an idle one when available.
    pub fn session(&self) -> Result<PooledSession<'_>, TokenError> {
        let reused = self.idle_list().pop();
        let handle = match reused {
            Some(h) => h,
            None => self.token.open_session()?,
        };
        Ok(PooledSession { pool: self, handle })
    }

    /// Destroy a key object with a descriptive log line on failure.
    ///
    /// The handle is cleared only when destruction succeeded, so a caller
    /// retrying later still knows which object it was holding.
    pub fn destroy_key(&self, name: &str, object: &mut Option<ObjectHandle>) {
        let Some(obj) = *object else {
            return;
        };
        let session = match self.session() {
            Ok(s) => s,
            Err(err) => {
                error!("no session to destroy key object {name}: {err}");
                return;
            }
        };
        match self.token.destroy_object(session.handle(), obj) {
            Ok(()) => *object = None,
            Err(err) => error!("failed to destroy key object {name}: {err}"),
        }
    }

    fn idle_list(&self) -> MutexGuard<'_, Vec<SessionHandle>> {
        match self.idle.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn release(&self, handle: SessionHandle) {
        let mut idle = self.idle_list();
        if idle.try_reserve(1).is_ok() {
            idle.push(handle);
        } else {
            warn!("session free list cannot grow, leaking idle session {handle}");
        }
    }
}

impl Drop for SessionPool {
    fn drop(&mut self) {
        // Shutdown is the one time closing is safe.
        for handle in self.idle_list().drain(..) {
            if let Err(err) = self.token.close_session(handle) {
                error!("failed to close token session {handle}: {err}");
            }
        }
    }
}

/// A session checked out of a [`SessionPool`]
///
/// Forwards the token operations under its own handle and returns the
/// handle to the pool on drop.
pub struct PooledSession<'p> {
    pool: &'p SessionPool,
    handle: SessionHandle,
}

impl PooledSession<'_> {
    /// The raw session handle.
    pub fn handle(&self) -> SessionHandle {
        self.handle
    }

    /// Import secret key material into the token.
    pub fn create_key(&self, material: &[u8]) -> Result<ObjectHandle, TokenError> {
        self.pool.token.create_key(self.handle, material)
    }

    /// See [`Token::encrypt_init`].
    pub fn encrypt_init(&self, mech: &Mechanism, key: ObjectHandle) -> Result<(), TokenError> {
        self.pool.token.encrypt_init(self.handle, mech, key)
    }

    /// See [`Token::encrypt`].
    pub fn encrypt(&self, data: &mut [u8], tag_out: &mut [u8]) -> Result<(), TokenError> {
        self.pool.token.encrypt(self.handle, data, tag_out)
    }

    /// See [`Token::decrypt_init`].
    pub fn decrypt_init(&self, mech: &Mechanism, key: ObjectHandle) -> Result<(), TokenError> {
        self.pool.token.decrypt_init(self.handle, mech, key)
    }

    /// See [`Token::decrypt`].
    pub fn decrypt(&self, data: &mut [u8], tag: &[u8]) -> Result<(), TokenError> {
        self.pool.token.decrypt(self.handle, data, tag)
    }

    /// See [`Token::sign_init`].
    pub fn sign_init(&self, mech: &Mechanism, key: ObjectHandle) -> Result<(), TokenError> {
        self.pool.token.sign_init(self.handle, mech, key)
    }

    /// See [`Token::sign`].
    pub fn sign(&self, data: &[u8], mac_out: &mut [u8]) -> Result<(), TokenError> {
        self.pool.token.sign(self.handle, data, mac_out)
    }

    /// See [`Token::verify_init`].
    pub fn verify_init(&self, mech: &Mechanism, key: ObjectHandle) -> Result<(), TokenError> {
        self.pool.token.verify_init(self.handle, mech, key)
    }

    /// See [`Token::verify`].
    pub fn verify(&self, data: &[u8], mac: &[u8]) -> Result<(), TokenError> {
        self.pool.token.verify(self.handle, data, mac)
    }
}

impl Drop for PooledSession<'_> {
    fn drop(&mut self) {
        self.pool.release(self.handle);
    }
}
