use constant_time_eq::constant_time_eq;
use rand::RngCore;
use sha3::{Digest, Sha3_256};

const SALT_LEN: usize = 16;

fn sha3_256_hex(salt: &str, data: &str) -> String {
    let mut hasher = Sha3_256::default();
    hasher.update(salt.as_bytes());
    hasher.update(data.as_bytes());
    format!("{:X}", hasher.finalize())
}

/// Returns `<salt>$<digest>` with a fresh random salt.
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let salt: String = salt.iter().map(|b| format!("{:02X}", b)).collect();
    let digest = sha3_256_hex(&salt, password);
    format!("{salt}${digest}")
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    match stored.split_once('$') {
        Some((salt, digest)) => {
            let candidate = sha3_256_hex(salt, password);
            constant_time_eq(candidate.as_bytes(), digest.as_bytes())
        }
        None => false,
    }
}
