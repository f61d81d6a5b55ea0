//! PostgreSQL-backed `UserRepository` implementation using Diesel ORM.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::domain::ports::{UserRepository, UserRepositoryError};
use crate::domain::{EmailAddress, User, UserId, UserMetadata};

use super::error_mapping::{
    counter_from_db, counter_to_db, is_unique_violation, map_diesel_error, map_pool_error,
};
use super::models::{NewUserRow, UserRow, UserUpdate};
use super::pool::{DbPool, PoolError};
use super::schema::users;

const EMAIL_CONSTRAINT: &str = "users_email_key";

/// Diesel-backed implementation of the [`UserRepository`] port.
#[derive(Clone)]
pub struct DieselUserRepository {
    pool: DbPool,
}

impl DieselUserRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn pool_error(error: PoolError) -> UserRepositoryError {
    map_pool_error(error, UserRepositoryError::connection)
}

fn diesel_error(error: diesel::result::Error) -> UserRepositoryError {
    map_diesel_error(
        error,
        UserRepositoryError::query,
        UserRepositoryError::connection,
    )
}

fn row_to_user(row: UserRow) -> Result<User, UserRepositoryError> {
    let email = EmailAddress::new(&row.email)
        .map_err(|err| UserRepositoryError::query(format!("stored email invalid: {err}")))?;
    let role = row
        .role
        .parse()
        .map_err(|err| UserRepositoryError::query(format!("stored role invalid: {err}")))?;
    let persona = row
        .persona
        .as_deref()
        .map(str::parse)
        .transpose()
        .map_err(|err| UserRepositoryError::query(format!("stored persona invalid: {err}")))?;

    Ok(User {
        id: UserId::from_uuid(row.id),
        name: row.name,
        email,
        image: row.image,
        email_verified: row.email_verified,
        role,
        persona,
        password_hash: row.password_hash,
        metadata: UserMetadata {
            last_login: row.last_login,
            login_count: counter_from_db(row.login_count),
            query_count: counter_from_db(row.query_count),
        },
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn user_update(user: &User) -> UserUpdate<'_> {
    UserUpdate {
        name: &user.name,
        email: user.email.as_str(),
        image: user.image.as_deref(),
        email_verified: user.email_verified,
        role: user.role.as_str(),
        persona: user.persona.map(|persona| persona.as_str()),
        password_hash: user.password_hash.as_deref(),
        last_login: user.metadata.last_login,
        login_count: counter_to_db(user.metadata.login_count),
        query_count: counter_to_db(user.metadata.query_count),
        updated_at: user.updated_at,
    }
}

#[async_trait]
impl UserRepository for DieselUserRepository {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, UserRepositoryError> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        let row: Option<UserRow> = users::table
            .filter(users::id.eq(id.as_uuid()))
            .select(UserRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(diesel_error)?;
        row.map(row_to_user).transpose()
    }

    async fn find_by_email(
        &self,
        email: &EmailAddress,
    ) -> Result<Option<User>, UserRepositoryError> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        let row: Option<UserRow> = users::table
            .filter(users::email.eq(email.as_str()))
            .select(UserRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(diesel_error)?;
        row.map(row_to_user).transpose()
    }

    async fn insert(&self, user: &User) -> Result<(), UserRepositoryError> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        let values = user_update(user);
        let row = NewUserRow {
            id: *user.id.as_uuid(),
            name: values.name,
            email: values.email,
            image: values.image,
            email_verified: values.email_verified,
            role: values.role,
            persona: values.persona,
            password_hash: values.password_hash,
            last_login: values.last_login,
            login_count: values.login_count,
            query_count: values.query_count,
            created_at: user.created_at,
            updated_at: user.updated_at,
        };

        diesel::insert_into(users::table)
            .values(&row)
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(|err| {
                if is_unique_violation(&err, EMAIL_CONSTRAINT) {
                    UserRepositoryError::duplicate_email(user.email.as_str())
                } else {
                    diesel_error(err)
                }
            })
    }

    async fn update(&self, user: &User) -> Result<(), UserRepositoryError> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        let updated = diesel::update(users::table.filter(users::id.eq(user.id.as_uuid())))
            .set(&user_update(user))
            .execute(&mut conn)
            .await
            .map_err(|err| {
                if is_unique_violation(&err, EMAIL_CONSTRAINT) {
                    UserRepositoryError::duplicate_email(user.email.as_str())
                } else {
                    diesel_error(err)
                }
            })?;

        if updated == 0 {
            return Err(UserRepositoryError::query("user not found for update"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AccessRole, Persona};
    use crate::test_support::fixture_timestamp;
    use rstest::{fixture, rstest};
    use uuid::Uuid;

    #[fixture]
    fn row() -> UserRow {
        let now = fixture_timestamp();
        UserRow {
            id: Uuid::nil(),
            name: "Ada".to_owned(),
            email: "ada@example.org".to_owned(),
            image: None,
            email_verified: Some(now),
            role: "admin".to_owned(),
            persona: Some("teacher".to_owned()),
            password_hash: None,
            last_login: Some(now),
            login_count: 3,
            query_count: -1,
            created_at: now,
            updated_at: now,
        }
    }

    #[rstest]
    fn converts_rows_into_users(row: UserRow) {
        let user = row_to_user(row).expect("valid row");
        assert_eq!(user.role, AccessRole::Admin);
        assert_eq!(user.persona, Some(Persona::Teacher));
        assert_eq!(user.metadata.login_count, 3);
        assert_eq!(user.metadata.query_count, 0);
        assert!(user.onboarded());
    }

    #[rstest]
    #[case::role(|row: &mut UserRow| row.role = "owner".to_owned(), "stored role invalid")]
    #[case::persona(|row: &mut UserRow| row.persona = Some("pilot".to_owned()), "stored persona invalid")]
    #[case::email(|row: &mut UserRow| row.email = "nope".to_owned(), "stored email invalid")]
    fn rejects_corrupt_rows(
        mut row: UserRow,
        #[case] corrupt: fn(&mut UserRow),
        #[case] expected: &str,
    ) {
        corrupt(&mut row);
        let err = row_to_user(row).expect_err("corrupt row");
        assert!(err.to_string().contains(expected), "{err}");
    }

    #[rstest]
    fn update_changeset_mirrors_the_user(row: UserRow) {
        let user = row_to_user(row).expect("valid row");
        let update = user_update(&user);
        assert_eq!(update.role, "admin");
        assert_eq!(update.persona, Some("teacher"));
        assert_eq!(update.email, "ada@example.org");
        assert_eq!(update.login_count, 3);
    }
}
