use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use profitboard_shared::{Profile, Role};

use crate::columns;
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{ProfileUpdate, UserSummary};

const PROFILE_COLUMNS: &str = "id, name, discord, avatar_url, role, created_at";

impl Database {
    /// Create the profile on first save, otherwise update the owner-editable
    /// fields. `role` and `created_at` are never touched by an update.
    pub fn upsert_profile(
        &self,
        id: Uuid,
        update: &ProfileUpdate,
        now: DateTime<Utc>,
    ) -> Result<Profile> {
        let profile = self.conn().query_row(
            &format!(
                "INSERT INTO profiles (id, name, discord, avatar_url, role, created_at)
                 VALUES (?1, ?2, ?3, ?4, 'user', ?5)
                 ON CONFLICT(id) DO UPDATE SET
                     name = excluded.name,
                     discord = excluded.discord,
                     avatar_url = COALESCE(excluded.avatar_url, profiles.avatar_url)
                 RETURNING {PROFILE_COLUMNS}"
            ),
            params![
                id.to_string(),
                update.name,
                update.discord,
                update.avatar_url,
                columns::fmt_ts(&now),
            ],
            row_to_profile,
        )?;
        tracing::debug!(id = %id, "profile saved");
        Ok(profile)
    }

    pub fn find_profile(&self, id: Uuid) -> Result<Option<Profile>> {
        self.conn()
            .query_row(
                &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = ?1"),
                params![id.to_string()],
                row_to_profile,
            )
            .optional()
            .map_err(StoreError::Sqlite)
    }

    pub fn get_profile(&self, id: Uuid) -> Result<Profile> {
        self.find_profile(id)?.ok_or(StoreError::NotFound)
    }

    /// Newest first.
    pub fn list_profiles(&self) -> Result<Vec<Profile>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles ORDER BY created_at DESC, id ASC"
        ))?;
        let rows = stmt.query_map([], row_to_profile)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    /// Every profile with its count of approved submissions, newest first.
    pub fn list_profiles_with_approved_counts(&self) -> Result<Vec<UserSummary>> {
        let mut stmt = self.conn().prepare(
            "SELECT p.id, p.name, p.discord, p.avatar_url, p.role, p.created_at,
                    (SELECT COUNT(*) FROM submissions s
                     WHERE s.user_id = p.id AND s.status = 'approved') AS submission_count
             FROM profiles p
             ORDER BY p.created_at DESC, p.id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(UserSummary {
                profile: row_to_profile(row)?,
                submission_count: row.get("submission_count")?,
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    pub fn count_admins(&self) -> Result<i64> {
        Ok(admin_count(self.conn())?)
    }

    /// Change a profile's role.
    ///
    /// Fails with [`StoreError::LastAdmin`] when the change would leave no
    /// admin at all. The check and the write share one transaction.
    pub fn set_role(&mut self, id: Uuid, role: Role) -> Result<Profile> {
        let tx = self.conn_mut().transaction()?;

        let current: Role = tx
            .query_row(
                "SELECT role FROM profiles WHERE id = ?1",
                params![id.to_string()],
                |row| columns::parsed(row, "role"),
            )
            .map_err(StoreError::from_query)?;

        if current == Role::Admin && role != Role::Admin {
            if admin_count(&tx)? <= 1 {
                return Err(StoreError::LastAdmin);
            }
        }

        let profile = tx.query_row(
            &format!("UPDATE profiles SET role = ?2 WHERE id = ?1 RETURNING {PROFILE_COLUMNS}"),
            params![id.to_string(), role.as_str()],
            row_to_profile,
        )?;
        tx.commit()?;

        tracing::info!(id = %id, from = %current, to = %role, "role changed");
        Ok(profile)
    }
}

fn admin_count(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM profiles WHERE role = 'admin'",
        [],
        |row| row.get(0),
    )
}

pub(crate) fn row_to_profile(row: &rusqlite::Row<'_>) -> rusqlite::Result<Profile> {
    Ok(Profile {
        id: columns::uuid(row, "id")?,
        name: row.get("name")?,
        discord: row.get("discord")?,
        avatar_url: row.get("avatar_url")?,
        role: columns::parsed(row, "role")?,
        created_at: columns::ts(row, "created_at")?,
    })
}
