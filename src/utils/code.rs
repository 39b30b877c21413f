// src/utils/code.rs

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::error::AppError;

/// Length of the plaintext confirmation code mailed at signup.
pub const CONFIRMATION_CODE_LENGTH: usize = 7;

/// Generates a fresh plaintext confirmation code.
///
/// The decimal rendering of a random v4 UUID, cut to
/// `CONFIRMATION_CODE_LENGTH` digits.
pub fn generate_code() -> String {
    let mut code = uuid::Uuid::new_v4().as_u128().to_string();
    code.truncate(CONFIRMATION_CODE_LENGTH);
    code
}

/// One-way digest of a confirmation code. Only this value is persisted.
pub fn hash_code(code: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);

    let argon2 = Argon2::default();

    let code_hash = argon2
        .hash_password(code.as_bytes(), &salt)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .to_string();

    Ok(code_hash)
}

/// Checks a submitted code against the stored digest.
///
/// An empty digest means no code is outstanding and never matches.
pub fn verify_code(code: &str, code_hash: &str) -> Result<bool, AppError> {
    if code_hash.is_empty() {
        return Ok(false);
    }

    let parsed_hash = PasswordHash::new(code_hash)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    let result = Argon2::default().verify_password(code.as_bytes(), &parsed_hash);

    match result {
        Ok(_) => Ok(true),
        Err(_) => Ok(false),
    }
}
