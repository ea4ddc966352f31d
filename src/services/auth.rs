use anyhow::Context;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::models::User;

const BCRYPT_COST: u32 = 10;
const MIN_AGE: i64 = 16;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

pub fn issue_token(secret: &str, user_id: &str, ttl_hours: i64) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id.to_string(),
        exp: (Utc::now() + Duration::hours(ttl_hours)).timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .context("failed to encode token")
}

/// Returns the user id the token was issued to.
pub fn verify_token(secret: &str, token: &str) -> Option<String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .ok()
    .map(|data| data.claims.sub)
}

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    bcrypt::hash(password, BCRYPT_COST).context("failed to hash password")
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn looks_like_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
        && !email.contains(char::is_whitespace)
}

#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub first_name: String,
    pub last_name: String,
    pub age: i64,
    pub email: String,
    pub phone: String,
    pub password: String,
    pub next_of_kin_name: String,
    pub next_of_kin_phone: String,
}

impl Registration {
    /// Validates the form and builds the user record, hashing the password.
    pub fn into_user(self) -> Result<User, String> {
        let email = normalize_email(&self.email);
        if !looks_like_email(&email) {
            return Err("please enter a valid email".to_string());
        }
        if self.age < MIN_AGE {
            return Err(format!("you must be at least {MIN_AGE} years old to register"));
        }

        let required = [
            ("first name", &self.first_name),
            ("last name", &self.last_name),
            ("phone", &self.phone),
            ("next of kin name", &self.next_of_kin_name),
            ("next of kin phone", &self.next_of_kin_phone),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(format!("{field} is required"));
            }
        }
        if self.password.is_empty() {
            return Err("password is required".to_string());
        }

        let password_hash = hash_password(&self.password).map_err(|e| e.to_string())?;

        Ok(User {
            id: uuid::Uuid::new_v4().to_string(),
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            age: self.age,
            email,
            phone: self.phone.trim().to_string(),
            password_hash,
            next_of_kin_name: self.next_of_kin_name.trim().to_string(),
            next_of_kin_phone: self.next_of_kin_phone.trim().to_string(),
            registered_at: Utc::now(),
        })
    }
}
