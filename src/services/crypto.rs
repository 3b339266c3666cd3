use anyhow::{anyhow, Result};
use base64::{engine::general_purpose, Engine as _};
use ring::{
    pbkdf2,
    rand::{SecureRandom, SystemRandom},
};
use std::num::NonZeroU32;

const PBKDF2_ITERATIONS: u32 = 100_000;
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;
const PREFIX: &str = "pbkdf2";

pub struct CryptoService;

impl CryptoService {
    /// Hashes a role password into `pbkdf2:<salt>:<hash>` for the settings store.
    pub fn hash_password(password: &str) -> Result<String> {
        let rng = SystemRandom::new();
        let mut salt = [0u8; SALT_LEN];
        rng.fill(&mut salt)
            .map_err(|_| anyhow!("Failed to generate salt"))?;

        let mut hash = [0u8; HASH_LEN];
        pbkdf2::derive(
            pbkdf2::PBKDF2_HMAC_SHA256,
            iterations()?,
            &salt,
            password.as_bytes(),
            &mut hash,
        );

        Ok(format!(
            "{}:{}:{}",
            PREFIX,
            general_purpose::STANDARD.encode(salt),
            general_purpose::STANDARD.encode(hash)
        ))
    }

    /// Constant-time check of `password` against a stored hash. A malformed
    /// stored value never verifies.
    pub fn verify_password(password: &str, stored: &str) -> bool {
        match Self::decode(stored) {
            Ok((salt, hash)) => match iterations() {
                Ok(iterations) => pbkdf2::verify(
                    pbkdf2::PBKDF2_HMAC_SHA256,
                    iterations,
                    &salt,
                    password.as_bytes(),
                    &hash,
                )
                .is_ok(),
                Err(_) => false,
            },
            Err(_) => false,
        }
    }

    fn decode(stored: &str) -> Result<(Vec<u8>, Vec<u8>)> {
        let parts: Vec<&str> = stored.split(':').collect();
        if parts.len() != 3 || parts[0] != PREFIX {
            return Err(anyhow!("Invalid password hash"));
        }
        let salt = general_purpose::STANDARD
            .decode(parts[1])
            .map_err(|e| anyhow!("Decode salt: {}", e))?;
        let hash = general_purpose::STANDARD
            .decode(parts[2])
            .map_err(|e| anyhow!("Decode hash: {}", e))?;
        if hash.len() != HASH_LEN {
            return Err(anyhow!("Invalid hash length"));
        }
        Ok((salt, hash))
    }
}

fn iterations() -> Result<NonZeroU32> {
    NonZeroU32::new(PBKDF2_ITERATIONS).ok_or_else(|| anyhow!("Invalid iterations"))
}
