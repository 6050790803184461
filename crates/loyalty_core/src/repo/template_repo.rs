//! Stored-template reads for the request surface.
//!
//! # Responsibility
//! - Fetch template rows by tenant and optional activity-type scope.
//! - Keep template bodies opaque; parsing happens in `template::parser`.

use crate::model::molecule::TenantId;
use crate::model::template::TemplateRecord;
use crate::repo::catalog_repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

const TEMPLATE_SELECT_SQL: &str = "SELECT
    id,
    tenant_id,
    name,
    activity_type,
    body
FROM templates";

/// Repository interface for stored templates.
pub trait TemplateRepository {
    /// Lists templates for a tenant, optionally scoped to one activity type.
    fn list(&self, tenant: TenantId, activity_type: Option<&str>)
        -> RepoResult<Vec<TemplateRecord>>;
    fn get(&self, tenant: TenantId, id: i64) -> RepoResult<Option<TemplateRecord>>;
}

/// SQLite-backed template repository.
pub struct SqliteTemplateRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTemplateRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Inserts a template row; admin authoring path.
    pub fn create(
        &self,
        tenant: TenantId,
        name: &str,
        activity_type: Option<&str>,
        body: &str,
    ) -> RepoResult<i64> {
        self.conn.execute(
            "INSERT INTO templates (tenant_id, name, activity_type, body)
             VALUES (?1, ?2, ?3, ?4);",
            params![tenant.to_string(), name, activity_type, body],
        )?;
        Ok(self.conn.last_insert_rowid())
    }
}

impl TemplateRepository for SqliteTemplateRepository<'_> {
    fn list(
        &self,
        tenant: TenantId,
        activity_type: Option<&str>,
    ) -> RepoResult<Vec<TemplateRecord>> {
        let mut sql = format!("{TEMPLATE_SELECT_SQL} WHERE tenant_id = ?1");
        if activity_type.is_some() {
            sql.push_str(" AND (activity_type IS NULL OR activity_type = ?2)");
        }
        sql.push_str(" ORDER BY name ASC;");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut records = Vec::new();
        match activity_type {
            Some(scope) => {
                let mut rows = stmt.query(params![tenant.to_string(), scope])?;
                while let Some(row) = rows.next()? {
                    records.push(parse_template_row(row)?);
                }
            }
            None => {
                let mut rows = stmt.query(params![tenant.to_string()])?;
                while let Some(row) = rows.next()? {
                    records.push(parse_template_row(row)?);
                }
            }
        }
        Ok(records)
    }

    fn get(&self, tenant: TenantId, id: i64) -> RepoResult<Option<TemplateRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TEMPLATE_SELECT_SQL} WHERE id = ?1 AND tenant_id = ?2;"))?;
        let mut rows = stmt.query(params![id, tenant.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_template_row(row)?));
        }
        Ok(None)
    }
}

fn parse_template_row(row: &Row<'_>) -> RepoResult<TemplateRecord> {
    let tenant_text: String = row.get("tenant_id")?;
    let tenant_id = Uuid::parse_str(&tenant_text).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid tenant id `{tenant_text}` in templates.tenant_id"
        ))
    })?;

    Ok(TemplateRecord {
        id: row.get("id")?,
        tenant_id,
        name: row.get("name")?,
        activity_type: row.get("activity_type")?,
        body: row.get("body")?,
    })
}
