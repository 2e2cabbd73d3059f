use crate::error::{ConversionError, IntoDomainModel};
use crate::schema::users;
use chrono::Utc;
use diesel::prelude::*;
use diesel::OptionalExtension;
use model::database::{UserRead, UserWrite};
use model::User;
use std::error::Error;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::error;
use uuid::Uuid;

/// Database worker for user account operations.
pub struct UserDB {
    pub connection: Arc<Mutex<SqliteConnection>>,
}

impl std::fmt::Debug for UserDB {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserDB")
            .field("connection", &"Arc<Mutex<SqliteConnection>>")
            .finish()
    }
}

impl UserRead for UserDB {
    fn for_id(&mut self, id: Uuid) -> Result<User, Box<dyn Error + Send + Sync>> {
        let connection: &mut SqliteConnection = &mut self.connection.lock().unwrap_or_else(|e| {
            eprintln!("Failed to acquire connection lock: {e}");
            std::process::exit(1);
        });
        users::table
            .filter(users::id.eq(id.to_string()))
            .first::<UserSQLite>(connection)
            .map_err(|error| {
                error!("Error reading user {}: {:?}", id, error);
                error
            })?
            .into_domain_model()
    }

    fn for_phone(&mut self, phone: &str) -> Result<Option<User>, Box<dyn Error + Send + Sync>> {
        let connection: &mut SqliteConnection = &mut self.connection.lock().unwrap_or_else(|e| {
            eprintln!("Failed to acquire connection lock: {e}");
            std::process::exit(1);
        });
        users::table
            .filter(users::phone.eq(phone))
            .first::<UserSQLite>(connection)
            .optional()
            .map_err(|error| {
                error!("Error resolving user for phone {}: {:?}", phone, error);
                error
            })?
            .map(IntoDomainModel::into_domain_model)
            .transpose()
    }
}

impl UserWrite for UserDB {
    fn create(
        &mut self,
        full_name: &str,
        phone: &str,
        password_hash: &str,
    ) -> Result<User, Box<dyn Error + Send + Sync>> {
        let row = UserSQLite {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now().naive_utc(),
            full_name: full_name.to_string(),
            phone: phone.to_string(),
            password_hash: password_hash.to_string(),
        };
        let connection: &mut SqliteConnection = &mut self.connection.lock().unwrap_or_else(|e| {
            eprintln!("Failed to acquire connection lock: {e}");
            std::process::exit(1);
        });
        diesel::insert_into(users::table)
            .values(&row)
            .execute(connection)
            .map_err(|error| {
                error!("Error creating user: {:?}", error);
                error
            })?;
        row.into_domain_model()
    }
}

#[derive(Debug, Queryable, Identifiable, AsChangeset, Insertable)]
#[diesel(table_name = users)]
struct UserSQLite {
    id: String,
    created_at: chrono::NaiveDateTime,
    full_name: String,
    phone: String,
    password_hash: String,
}

impl TryFrom<UserSQLite> for User {
    type Error = ConversionError;

    fn try_from(value: UserSQLite) -> Result<Self, Self::Error> {
        Ok(User {
            id: Uuid::from_str(&value.id).map_err(|_| ConversionError::new("id", "invalid uuid"))?,
            full_name: value.full_name,
            phone: value.phone,
            password_hash: value.password_hash,
            created_at: value.created_at,
        })
    }
}

impl IntoDomainModel<User> for UserSQLite {
    fn into_domain_model(self) -> Result<User, Box<dyn Error + Send + Sync>> {
        self.try_into().map_err(Into::into)
    }
}
