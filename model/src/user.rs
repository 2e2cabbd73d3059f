/// An authenticated user account.
///
/// `password_hash` is an argon2 PHC string, never the plaintext password;
/// see the `server` crate's auth module for the hashing/verification path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Database identity, also the JWT `sub` claim.
    pub id: uuid::Uuid,
    /// Display name.
    pub full_name: String,
    /// Unique login identifier.
    pub phone: String,
    /// Argon2 password hash.
    pub password_hash: String,
    /// Account creation timestamp.
    pub created_at: chrono::NaiveDateTime,
}
