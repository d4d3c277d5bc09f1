//! Introspected table metadata.
//!
//! A [`TableSchema`] is produced by a connection's introspector and held by the
//! schema cache. Column data types are kept exactly as the engine reports them;
//! [`DataCategory`] is the engine-neutral view used for operator checks and
//! value coercion.

use serde::{Deserialize, Serialize};

/// Engine-neutral classification of a column's native data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataCategory {
    Numeric,
    Text,
    Temporal,
    Boolean,
    /// UUIDs, SQL Server `uniqueidentifier`, Cassandra `timeuuid`, MongoDB `objectId`.
    Identifier,
    Json,
    Binary,
    Other,
}

impl DataCategory {
    /// Classify a native type name (`character varying(255)`, `NUMBER`, `datetime2`, ...).
    pub fn classify(data_type: &str) -> Self {
        let lowered = data_type.trim().to_ascii_lowercase();
        let base = lowered
            .split('(')
            .next()
            .unwrap_or_default()
            .trim()
            .trim_end_matches(" unsigned");

        match base {
            "smallint" | "integer" | "int" | "int2" | "int4" | "int8" | "bigint" | "tinyint"
            | "mediumint" | "serial" | "bigserial" | "smallserial" | "decimal" | "numeric"
            | "dec" | "real" | "float" | "float4" | "float8" | "double" | "double precision"
            | "number" | "money" | "smallmoney" | "binary_float" | "binary_double"
            | "decfloat" | "counter" | "varint" | "long" | "int32" | "int64" | "decimal128" => {
                DataCategory::Numeric
            }
            "boolean" | "bool" | "bit" => DataCategory::Boolean,
            "uuid" | "uniqueidentifier" | "timeuuid" | "objectid" => DataCategory::Identifier,
            "json" | "jsonb" | "object" | "array" | "map" | "list" | "set<text>" | "xml" => {
                DataCategory::Json
            }
            "bytea" | "blob" | "tinyblob" | "mediumblob" | "longblob" | "binary" | "varbinary"
            | "raw" | "long raw" | "image" | "bindata" => DataCategory::Binary,
            "char" | "character" | "varchar" | "character varying" | "text" | "nchar"
            | "nvarchar" | "ntext" | "tinytext" | "mediumtext" | "longtext" | "varchar2"
            | "nvarchar2" | "clob" | "nclob" | "string" | "ascii" | "citext" | "enum" | "name"
            | "graphic" | "vargraphic" | "dbclob" => DataCategory::Text,
            "date" | "datetime" | "datetime2" | "smalldatetime" | "datetimeoffset" | "year" => {
                DataCategory::Temporal
            }
            other if other.starts_with("timestamp") || other.starts_with("time") => {
                DataCategory::Temporal
            }
            other if other.starts_with("set") || other.starts_with("frozen") => DataCategory::Json,
            _ => DataCategory::Other,
        }
    }

    /// Whether `contain`/`startswith`/`endswith` apply without a cast.
    pub fn is_text_like(self) -> bool {
        matches!(self, DataCategory::Text)
    }

    /// Whether range comparisons (`gt`, `lt`, ...) are meaningful.
    pub fn is_ordered(self) -> bool {
        matches!(self, DataCategory::Numeric | DataCategory::Temporal)
    }
}

/// Metadata for a single column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    /// Column name as stored by the engine.
    pub name: String,

    /// Native data type name as reported by introspection.
    pub data_type: String,

    /// Whether the column accepts NULL (or may be missing, for document stores).
    #[serde(default = "default_true")]
    pub nullable: bool,

    #[serde(default)]
    pub is_primary_key: bool,

    #[serde(default)]
    pub is_auto_increment: bool,

    /// Character length limit, when the engine reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,

    /// Column default expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            is_primary_key: false,
            is_auto_increment: false,
            max_length: None,
            default: None,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self.nullable = false;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.is_auto_increment = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn category(&self) -> DataCategory {
        DataCategory::classify(&self.data_type)
    }
}

/// A single-column foreign key reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyRef {
    pub column_name: String,
    pub referenced_table: String,
    pub referenced_column: String,
    pub constraint_name: String,
}

/// Introspected metadata for one table of one connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,

    /// Namespace the table lives in (Postgres schema, MySQL database, Cassandra keyspace).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Columns in ordinal order.
    pub columns: Vec<ColumnSchema>,

    /// Primary key column names in key order.
    #[serde(default)]
    pub primary_key: Vec<String>,

    #[serde(default)]
    pub foreign_keys: Vec<ForeignKeyRef>,

    /// Cassandra clustering columns in clustering order. The remaining
    /// primary key columns form the partition key.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clustering_key: Vec<String>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: None,
            columns: Vec::new(),
            primary_key: Vec::new(),
            foreign_keys: Vec::new(),
            clustering_key: Vec::new(),
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn with_clustering_key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.clustering_key = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Primary key columns that are not clustering columns.
    pub fn partition_key(&self) -> impl Iterator<Item = &str> {
        self.primary_key
            .iter()
            .filter(|c| !self.clustering_key.contains(c))
            .map(String::as_str)
    }

    /// Append a column, recording it in the primary key when flagged.
    pub fn with_column(mut self, column: ColumnSchema) -> Self {
        if column.is_primary_key && !self.primary_key.contains(&column.name) {
            self.primary_key.push(column.name.clone());
        }
        self.columns.push(column);
        self
    }

    pub fn with_foreign_key(mut self, fk: ForeignKeyRef) -> Self {
        self.foreign_keys.push(fk);
        self
    }

    pub fn get_column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.get_column(name).is_some()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn is_primary_key(&self, column: &str) -> bool {
        self.primary_key.iter().any(|pk| pk == column)
    }

    /// Primary key columns in key order.
    pub fn primary_columns(&self) -> Vec<&ColumnSchema> {
        self.primary_key
            .iter()
            .filter_map(|pk| self.get_column(pk))
            .collect()
    }

    /// Rows can only be addressed for edit/delete when a primary key is known.
    pub fn is_identifiable(&self) -> bool {
        !self.primary_key.is_empty()
    }
}

fn default_true() -> bool {
    true
}
