//! Catalog repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide tenant-scoped reads over molecule definitions and values.
//! - Provide the one bounded write of the resolution path: insert-if-absent
//!   for dictionary-encoding (`intern_value`).
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - `intern_value` is race-safe: the unique constraint on
//!   `(molecule_id, category, normalized_label)` turns a concurrent duplicate
//!   insert into a no-op, and the read-back returns the surviving row.
//! - Lookup-binding identifiers are validated against a fixed allow-list
//!   before being spliced into SQL.

use crate::db::DbError;
use crate::model::molecule::{
    code_slug, input_type_to_db, normalize_label, parse_input_type, parse_scalar_type,
    parse_value_kind, scalar_type_to_db, value_kind_to_db, LookupBinding, MoleculeConfig,
    MoleculeDefinition, MoleculeValue, ResolvedItem, ScalarType, TenantId, ValueKind,
};
use chrono::NaiveDate;
use log::info;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const DEFINITION_SELECT_SQL: &str = "SELECT
    id,
    tenant_id,
    molecule_key,
    label,
    value_kind,
    scalar_type,
    constant_value,
    generator,
    input_type,
    display_width,
    contextual,
    historized,
    filter_by
FROM molecule_definitions";

const VALUE_SELECT_SQL: &str = "SELECT
    id,
    molecule_id,
    code,
    label,
    category,
    parent_code,
    sort_order
FROM molecule_values";

/// External tables a Lookup molecule may bind to, with their usable columns.
const LOOKUP_TABLE_ALLOW_LIST: &[(&str, &[&str])] =
    &[("activity_types", &["code", "name"]), ("members", &["member_number", "first_name", "last_name"])];

pub type RepoResult<T> = Result<T, RepoError>;

/// Generic repository error for catalog persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    InvalidData(String),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    /// A table or column identifier failed allow-list validation.
    UnsafeIdentifier(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted catalog data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection has schema version {actual_version}, expected {expected_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "required table is missing: {table}")
            }
            Self::UnsafeIdentifier(identifier) => {
                write!(f, "identifier is not allow-listed: {identifier}")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Read-side contract consumed by the resolver and templating layers.
pub trait CatalogRepository {
    fn definition(&self, tenant: TenantId, key: &str) -> RepoResult<Option<MoleculeDefinition>>;
    /// Definition merged with its value rows or lookup descriptor.
    fn config(&self, tenant: TenantId, key: &str) -> RepoResult<Option<MoleculeConfig>>;
    fn list_values(&self, molecule_id: i64) -> RepoResult<Vec<MoleculeValue>>;
    /// Value rows scoped to a parent value code (cascading reload).
    fn values_for_parent(
        &self,
        molecule_id: i64,
        parent_code: Option<&str>,
    ) -> RepoResult<Vec<MoleculeValue>>;
    fn value_by_id(&self, molecule_id: i64, value_id: i64) -> RepoResult<Option<MoleculeValue>>;
    fn value_by_label(
        &self,
        molecule_id: i64,
        category: &str,
        normalized_label: &str,
    ) -> RepoResult<Option<MoleculeValue>>;
    fn value_by_code(&self, molecule_id: i64, code: &str) -> RepoResult<Option<MoleculeValue>>;
    /// Returns the existing row for `label` or inserts one (dictionary encode).
    fn intern_value(
        &self,
        molecule_id: i64,
        category: &str,
        label: &str,
    ) -> RepoResult<MoleculeValue>;
    /// Point-in-time attribute value: greatest `effective_date <= as_of`,
    /// ties broken by the most recently written record.
    fn history_value_as_of(
        &self,
        molecule_id: i64,
        member_id: i64,
        as_of: NaiveDate,
    ) -> RepoResult<Option<String>>;
    /// Rows of an external lookup table, validated against the allow-list.
    fn lookup_rows(
        &self,
        binding: &LookupBinding,
        tenant: TenantId,
    ) -> RepoResult<Vec<ResolvedItem>>;
}

/// Authoring payload for a new molecule definition (admin surface).
#[derive(Debug, Clone)]
pub struct NewDefinition {
    pub tenant_id: TenantId,
    pub molecule_key: String,
    pub label: String,
    pub value_kind: ValueKind,
    pub scalar_type: Option<ScalarType>,
    pub constant_value: Option<String>,
    pub generator: Option<String>,
    pub input_type: Option<crate::model::molecule::InputType>,
    pub display_width: Option<u32>,
    pub contextual: bool,
    pub historized: bool,
    pub filter_by: Option<String>,
}

impl NewDefinition {
    pub fn new(
        tenant_id: TenantId,
        molecule_key: impl Into<String>,
        label: impl Into<String>,
        value_kind: ValueKind,
    ) -> Self {
        Self {
            tenant_id,
            molecule_key: molecule_key.into(),
            label: label.into(),
            value_kind,
            scalar_type: None,
            constant_value: None,
            generator: None,
            input_type: None,
            display_width: None,
            contextual: false,
            historized: false,
            filter_by: None,
        }
    }
}

/// Authoring payload for a new molecule value row (admin surface).
#[derive(Debug, Clone)]
pub struct NewValue {
    pub code: String,
    pub label: String,
    pub category: String,
    pub parent_code: Option<String>,
    pub sort_order: i64,
}

impl NewValue {
    pub fn new(code: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            label: label.into(),
            category: String::new(),
            parent_code: None,
            sort_order: 0,
        }
    }
}

/// SQLite-backed catalog repository.
pub struct SqliteCatalogRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCatalogRepository<'conn> {
    /// Wraps a bootstrapped connection, rejecting unmigrated databases.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        let actual_version =
            conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
        let expected_version = crate::db::migrations::latest_version();
        if actual_version == 0 {
            return Err(RepoError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }

        for table in ["molecule_definitions", "molecule_values"] {
            if !table_exists(conn, table)? {
                return Err(RepoError::MissingRequiredTable(table));
            }
        }

        Ok(Self { conn })
    }

    /// Inserts a molecule definition; admin authoring path.
    pub fn create_definition(&self, definition: &NewDefinition) -> RepoResult<i64> {
        self.conn.execute(
            "INSERT INTO molecule_definitions (
                tenant_id,
                molecule_key,
                label,
                value_kind,
                scalar_type,
                constant_value,
                generator,
                input_type,
                display_width,
                contextual,
                historized,
                filter_by
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12);",
            params![
                definition.tenant_id.to_string(),
                definition.molecule_key,
                definition.label,
                value_kind_to_db(definition.value_kind),
                definition.scalar_type.map(scalar_type_to_db),
                definition.constant_value.as_deref(),
                definition.generator.as_deref(),
                definition.input_type.map(input_type_to_db),
                definition.display_width,
                bool_to_int(definition.contextual),
                bool_to_int(definition.historized),
                definition.filter_by.as_deref(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Inserts a value row; admin authoring path.
    pub fn create_value(&self, molecule_id: i64, value: &NewValue) -> RepoResult<i64> {
        self.conn.execute(
            "INSERT INTO molecule_values (
                molecule_id,
                code,
                label,
                normalized_label,
                category,
                parent_code,
                sort_order
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                molecule_id,
                value.code,
                value.label,
                normalize_label(&value.label),
                value.category,
                value.parent_code.as_deref(),
                value.sort_order,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Binds a Lookup molecule to an external table; admin authoring path.
    pub fn bind_lookup(&self, binding: &LookupBinding) -> RepoResult<()> {
        validate_binding(binding)?;
        self.conn.execute(
            "INSERT INTO lookup_bindings (molecule_id, table_name, code_column, name_column)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (molecule_id) DO UPDATE SET
                table_name = excluded.table_name,
                code_column = excluded.code_column,
                name_column = excluded.name_column;",
            params![
                binding.molecule_id,
                binding.table_name,
                binding.code_column,
                binding.name_column,
            ],
        )?;
        Ok(())
    }

    /// Records one historized attribute value for a member.
    pub fn record_history(
        &self,
        molecule_id: i64,
        member_id: i64,
        value: &str,
        effective_date: NaiveDate,
        recorded_at_ms: i64,
    ) -> RepoResult<i64> {
        self.conn.execute(
            "INSERT INTO member_attribute_history (
                molecule_id,
                member_id,
                value,
                effective_date,
                recorded_at
            ) VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                molecule_id,
                member_id,
                value,
                effective_date.format("%Y-%m-%d").to_string(),
                recorded_at_ms,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Seeds one activity-type row; reference data for Lookup bindings.
    pub fn create_activity_type(
        &self,
        tenant: TenantId,
        code: &str,
        name: &str,
    ) -> RepoResult<i64> {
        self.conn.execute(
            "INSERT INTO activity_types (tenant_id, code, name) VALUES (?1, ?2, ?3);",
            params![tenant.to_string(), code, name],
        )?;
        Ok(self.conn.last_insert_rowid())
    }
}

impl CatalogRepository for SqliteCatalogRepository<'_> {
    fn definition(&self, tenant: TenantId, key: &str) -> RepoResult<Option<MoleculeDefinition>> {
        let mut stmt = self.conn.prepare(&format!(
            "{DEFINITION_SELECT_SQL} WHERE tenant_id = ?1 AND molecule_key = ?2;"
        ))?;
        let mut rows = stmt.query(params![tenant.to_string(), key])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_definition_row(row)?));
        }
        Ok(None)
    }

    fn config(&self, tenant: TenantId, key: &str) -> RepoResult<Option<MoleculeConfig>> {
        let Some(definition) = self.definition(tenant, key)? else {
            return Ok(None);
        };

        let values = if definition.value_kind.is_encodable() {
            self.list_values(definition.id)?
        } else {
            Vec::new()
        };

        let lookup = if definition.value_kind == ValueKind::Lookup {
            self.lookup_binding(definition.id)?
        } else {
            None
        };

        Ok(Some(MoleculeConfig {
            definition,
            values,
            lookup,
        }))
    }

    fn list_values(&self, molecule_id: i64) -> RepoResult<Vec<MoleculeValue>> {
        let mut stmt = self.conn.prepare(&format!(
            "{VALUE_SELECT_SQL} WHERE molecule_id = ?1 ORDER BY sort_order ASC, id ASC;"
        ))?;
        let mut rows = stmt.query(params![molecule_id])?;
        let mut values = Vec::new();
        while let Some(row) = rows.next()? {
            values.push(parse_value_row(row)?);
        }
        Ok(values)
    }

    fn values_for_parent(
        &self,
        molecule_id: i64,
        parent_code: Option<&str>,
    ) -> RepoResult<Vec<MoleculeValue>> {
        let Some(parent) = parent_code else {
            return self.list_values(molecule_id);
        };

        let mut stmt = self.conn.prepare(&format!(
            "{VALUE_SELECT_SQL}
             WHERE molecule_id = ?1 AND parent_code = ?2
             ORDER BY sort_order ASC, id ASC;"
        ))?;
        let mut rows = stmt.query(params![molecule_id, parent])?;
        let mut values = Vec::new();
        while let Some(row) = rows.next()? {
            values.push(parse_value_row(row)?);
        }
        Ok(values)
    }

    fn value_by_id(&self, molecule_id: i64, value_id: i64) -> RepoResult<Option<MoleculeValue>> {
        let mut stmt = self.conn.prepare(&format!(
            "{VALUE_SELECT_SQL} WHERE id = ?1 AND molecule_id = ?2;"
        ))?;
        let mut rows = stmt.query(params![value_id, molecule_id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_value_row(row)?));
        }
        Ok(None)
    }

    fn value_by_label(
        &self,
        molecule_id: i64,
        category: &str,
        normalized_label: &str,
    ) -> RepoResult<Option<MoleculeValue>> {
        let mut stmt = self.conn.prepare(&format!(
            "{VALUE_SELECT_SQL}
             WHERE molecule_id = ?1 AND category = ?2 AND normalized_label = ?3;"
        ))?;
        let mut rows = stmt.query(params![molecule_id, category, normalized_label])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_value_row(row)?));
        }
        Ok(None)
    }

    fn value_by_code(&self, molecule_id: i64, code: &str) -> RepoResult<Option<MoleculeValue>> {
        let mut stmt = self.conn.prepare(&format!(
            "{VALUE_SELECT_SQL} WHERE molecule_id = ?1 AND code = ?2;"
        ))?;
        let mut rows = stmt.query(params![molecule_id, code])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_value_row(row)?));
        }
        Ok(None)
    }

    fn intern_value(
        &self,
        molecule_id: i64,
        category: &str,
        label: &str,
    ) -> RepoResult<MoleculeValue> {
        let normalized = normalize_label(label);
        if let Some(existing) = self.value_by_label(molecule_id, category, &normalized)? {
            return Ok(existing);
        }

        let code = self.free_code_slug(molecule_id, label)?;

        // Two concurrent encodes for the same new text can both reach this
        // insert; the unique constraint on normalized_label makes the loser a
        // no-op and the read-back below returns the surviving row.
        self.conn.execute(
            "INSERT INTO molecule_values (
                molecule_id,
                code,
                label,
                normalized_label,
                category,
                sort_order
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5,
                (SELECT COALESCE(MAX(sort_order), 0) + 1
                 FROM molecule_values WHERE molecule_id = ?1)
            )
            ON CONFLICT (molecule_id, category, normalized_label) DO NOTHING;",
            params![molecule_id, code, label.trim(), normalized, category],
        )?;

        match self.value_by_label(molecule_id, category, &normalized)? {
            Some(value) => {
                info!(
                    "event=value_interned module=catalog molecule_id={} value_id={}",
                    molecule_id, value.id
                );
                Ok(value)
            }
            None => Err(RepoError::InvalidData(format!(
                "interned value vanished for molecule {molecule_id}, label `{normalized}`"
            ))),
        }
    }

    fn history_value_as_of(
        &self,
        molecule_id: i64,
        member_id: i64,
        as_of: NaiveDate,
    ) -> RepoResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM member_attribute_history
                 WHERE molecule_id = ?1 AND member_id = ?2 AND effective_date <= ?3
                 ORDER BY effective_date DESC, recorded_at DESC, id DESC
                 LIMIT 1;",
                params![
                    molecule_id,
                    member_id,
                    as_of.format("%Y-%m-%d").to_string()
                ],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn lookup_rows(
        &self,
        binding: &LookupBinding,
        tenant: TenantId,
    ) -> RepoResult<Vec<ResolvedItem>> {
        let (table, code_column, name_column) = validate_binding(binding)?;

        let mut stmt = self.conn.prepare(&format!(
            "SELECT {code_column}, {name_column} FROM {table}
             WHERE tenant_id = ?1
             ORDER BY {name_column} ASC;"
        ))?;
        let mut rows = stmt.query(params![tenant.to_string()])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(ResolvedItem {
                code: row.get(0)?,
                label: row.get(1)?,
                category: String::new(),
            });
        }
        Ok(items)
    }
}

impl SqliteCatalogRepository<'_> {
    fn lookup_binding(&self, molecule_id: i64) -> RepoResult<Option<LookupBinding>> {
        let binding = self
            .conn
            .query_row(
                "SELECT molecule_id, table_name, code_column, name_column
                 FROM lookup_bindings WHERE molecule_id = ?1;",
                params![molecule_id],
                |row| {
                    Ok(LookupBinding {
                        molecule_id: row.get(0)?,
                        table_name: row.get(1)?,
                        code_column: row.get(2)?,
                        name_column: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(binding)
    }

    /// Picks a code slug not yet taken within the molecule.
    fn free_code_slug(&self, molecule_id: i64, label: &str) -> RepoResult<String> {
        let base = code_slug(label);
        if self.value_by_code(molecule_id, &base)?.is_none() {
            return Ok(base);
        }
        for suffix in 2..1000 {
            let candidate = format!("{base}_{suffix}");
            if self.value_by_code(molecule_id, &candidate)?.is_none() {
                return Ok(candidate);
            }
        }
        Err(RepoError::InvalidData(format!(
            "could not derive a free code slug from `{label}` for molecule {molecule_id}"
        )))
    }
}

/// Resolves a binding against the allow-list, returning the static
/// identifiers that may be spliced into SQL.
fn validate_binding(
    binding: &LookupBinding,
) -> RepoResult<(&'static str, &'static str, &'static str)> {
    let Some((table, columns)) = LOOKUP_TABLE_ALLOW_LIST
        .iter()
        .find(|(table, _)| *table == binding.table_name)
    else {
        return Err(RepoError::UnsafeIdentifier(binding.table_name.clone()));
    };

    let code_column = columns
        .iter()
        .find(|column| **column == binding.code_column)
        .ok_or_else(|| RepoError::UnsafeIdentifier(binding.code_column.clone()))?;
    let name_column = columns
        .iter()
        .find(|column| **column == binding.name_column)
        .ok_or_else(|| RepoError::UnsafeIdentifier(binding.name_column.clone()))?;

    Ok((table, code_column, name_column))
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1;",
        params![table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn parse_definition_row(row: &Row<'_>) -> RepoResult<MoleculeDefinition> {
    let tenant_text: String = row.get("tenant_id")?;
    let tenant_id = Uuid::parse_str(&tenant_text).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid tenant id `{tenant_text}` in molecule_definitions.tenant_id"
        ))
    })?;

    let kind_text: String = row.get("value_kind")?;
    let value_kind = parse_value_kind(&kind_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid value kind `{kind_text}` in molecule_definitions.value_kind"
        ))
    })?;

    let scalar_type = match row.get::<_, Option<String>>("scalar_type")? {
        Some(value) => Some(parse_scalar_type(&value).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid scalar type `{value}` in molecule_definitions.scalar_type"
            ))
        })?),
        None => None,
    };

    let input_type = match row.get::<_, Option<String>>("input_type")? {
        Some(value) => Some(parse_input_type(&value).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid input type `{value}` in molecule_definitions.input_type"
            ))
        })?),
        None => None,
    };

    Ok(MoleculeDefinition {
        id: row.get("id")?,
        tenant_id,
        molecule_key: row.get("molecule_key")?,
        label: row.get("label")?,
        value_kind,
        scalar_type,
        constant_value: row.get("constant_value")?,
        generator: row.get("generator")?,
        input_type,
        display_width: row.get("display_width")?,
        contextual: int_to_bool(row.get("contextual")?, "contextual")?,
        historized: int_to_bool(row.get("historized")?, "historized")?,
        filter_by: row.get("filter_by")?,
    })
}

fn parse_value_row(row: &Row<'_>) -> RepoResult<MoleculeValue> {
    Ok(MoleculeValue {
        id: row.get("id")?,
        molecule_id: row.get("molecule_id")?,
        code: row.get("code")?,
        label: row.get("label")?,
        category: row.get("category")?,
        parent_code: row.get("parent_code")?,
        sort_order: row.get("sort_order")?,
    })
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

fn int_to_bool(value: i64, column: &str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid flag value `{other}` in molecule_definitions.{column}"
        ))),
    }
}
