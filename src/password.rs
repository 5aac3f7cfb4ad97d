use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{
        PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString, rand_core::OsRng,
    },
};

use crate::error::Error;

/// PasswordHasher
///
/// Salted, slow, one-way hashing for stored credentials, built on Argon2id.
/// The default parameters are tuned so a verify costs well over the 50 ms
/// floor required to blunt offline guessing; tests construct the hasher with
/// reduced parameters instead of waiting that out.
///
/// Verification goes through the argon2 crate's own comparison, which carries
/// the constant-time semantics the login path relies on.
#[derive(Clone)]
pub struct PasswordHasher {
    params: Params,
}

impl PasswordHasher {
    /// OWASP minimum recommended memory cost: 19 MiB.
    const MEMORY_COST: u32 = 19_456;
    const TIME_COST: u32 = 2;
    const PARALLELISM: u32 = 1;
    const OUTPUT_LEN: usize = 32;

    pub fn new() -> Self {
        let params = Params::new(
            Self::MEMORY_COST,
            Self::TIME_COST,
            Self::PARALLELISM,
            Some(Self::OUTPUT_LEN),
        )
        .expect("Argon2 parameters are compile-time constants");

        Self { params }
    }

    /// Constructs a hasher with custom cost parameters. Used by the test
    /// suite to keep hashing fast.
    pub fn with_params(memory_cost: u32, time_cost: u32, parallelism: u32) -> Self {
        let params = Params::new(memory_cost, time_cost, parallelism, Some(Self::OUTPUT_LEN))
            .expect("invalid Argon2 parameters");

        Self { params }
    }

    /// Hashes a password into PHC string format. Runs on the blocking thread
    /// pool so the deliberately slow hash does not stall the async runtime.
    pub async fn hash(&self, password: String) -> Result<String, Error> {
        let params = self.params.clone();
        tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
            argon2
                .hash_password(password.as_bytes(), &salt)
                .map(|h| h.to_string())
        })
        .await
        .map_err(|e| {
            tracing::error!("password hash task panicked: {}", e);
            Error::Hash
        })?
        .map_err(|e| {
            tracing::error!("failed to hash password: {}", e);
            Error::Hash
        })
    }

    /// Verifies a password against a stored PHC-format hash.
    pub async fn verify(&self, password: String, stored_hash: String) -> Result<bool, Error> {
        tokio::task::spawn_blocking(move || {
            let parsed = PasswordHash::new(&stored_hash).map_err(|e| {
                tracing::error!("failed to parse stored password hash: {}", e);
                Error::Hash
            })?;

            // Cost parameters are read back out of the stored hash itself.
            Ok(Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok())
        })
        .await
        .map_err(|e| {
            tracing::error!("password verify task panicked: {}", e);
            Error::Hash
        })?
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new()
    }
}
