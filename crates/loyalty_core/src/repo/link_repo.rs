//! Allow-listed reads over linked entities for atom interpolation.
//!
//! # Responsibility
//! - Resolve `{{T,…}}` atom lookups against the current member/activity link
//!   context.
//! - Keep every table and column identifier on a fixed allow-list; request
//!   input is matched against the list, never spliced into SQL.
//!
//! # Invariants
//! - Missing link context or an unlisted entity/column resolves to `None`,
//!   never to an error the interpolation caller would have to handle.
//! - Connectivity failures still surface as `RepoError::Db`.

use crate::model::molecule::TenantId;
use crate::repo::catalog_repo::RepoResult;
use rusqlite::types::Value;
use rusqlite::{params, Connection, OptionalExtension};

/// Linkable entities usable as the `T` atom source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkedEntity {
    Member,
    Activity,
}

const MEMBER_COLUMNS: &[&str] = &[
    "member_number",
    "first_name",
    "last_name",
    "email",
    "city",
    "points_balance",
];

const ACTIVITY_COLUMNS: &[&str] = &["activity_type", "activity_date", "points", "description"];

/// Parses an atom identifier against the linkable-entity allow-list.
pub fn parse_entity(identifier: &str) -> Option<LinkedEntity> {
    match identifier.trim().to_ascii_lowercase().as_str() {
        "member" => Some(LinkedEntity::Member),
        "activity" => Some(LinkedEntity::Activity),
        _ => None,
    }
}

/// Pre-established link context carried by one inbound request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkContext {
    pub member_id: Option<i64>,
    pub activity_id: Option<i64>,
}

/// Field source contract consumed by the atom interpolation engine.
pub trait LinkSource {
    /// Returns the stringified column value for the linked entity row, or
    /// `None` when context is missing or the column is not allow-listed.
    fn linked_field(&self, entity: LinkedEntity, column: &str) -> RepoResult<Option<String>>;
}

/// SQLite-backed link repository bound to one request's context.
pub struct SqliteLinkRepository<'conn> {
    conn: &'conn Connection,
    ctx: LinkContext,
}

impl<'conn> SqliteLinkRepository<'conn> {
    pub fn new(conn: &'conn Connection, ctx: LinkContext) -> Self {
        Self { conn, ctx }
    }

    /// Inserts a member row; admin/test authoring path.
    pub fn create_member(
        &self,
        tenant: TenantId,
        member_number: &str,
        first_name: &str,
        last_name: &str,
    ) -> RepoResult<i64> {
        self.conn.execute(
            "INSERT INTO members (tenant_id, member_number, first_name, last_name)
             VALUES (?1, ?2, ?3, ?4);",
            params![tenant.to_string(), member_number, first_name, last_name],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Inserts an activity row; admin/test authoring path.
    pub fn create_activity(
        &self,
        tenant: TenantId,
        member_id: i64,
        activity_type: &str,
        activity_date: &str,
        points: i64,
    ) -> RepoResult<i64> {
        self.conn.execute(
            "INSERT INTO activities (tenant_id, member_id, activity_type, activity_date, points)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                tenant.to_string(),
                member_id,
                activity_type,
                activity_date,
                points
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }
}

impl LinkSource for SqliteLinkRepository<'_> {
    fn linked_field(&self, entity: LinkedEntity, column: &str) -> RepoResult<Option<String>> {
        let (table, columns, row_id) = match entity {
            LinkedEntity::Member => ("members", MEMBER_COLUMNS, self.ctx.member_id),
            LinkedEntity::Activity => ("activities", ACTIVITY_COLUMNS, self.ctx.activity_id),
        };

        // Resolve the request-supplied name to its static allow-list entry;
        // only that static string reaches the SQL text.
        let requested = column.trim().to_ascii_lowercase();
        let Some(safe_column) = columns.iter().find(|candidate| **candidate == requested) else {
            return Ok(None);
        };
        let Some(row_id) = row_id else {
            return Ok(None);
        };

        let value = self
            .conn
            .query_row(
                &format!("SELECT {safe_column} FROM {table} WHERE id = ?1;"),
                params![row_id],
                |row| row.get::<_, Value>(0),
            )
            .optional()?;

        Ok(value.and_then(stringify))
    }
}

fn stringify(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Integer(number) => Some(number.to_string()),
        Value::Real(number) => Some(number.to_string()),
        Value::Text(text) => Some(text),
        Value::Blob(_) => None,
    }
}
