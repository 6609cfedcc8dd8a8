use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a catalog object, as reported by `sqlite_master`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectKind {
    Table,
    View,
    Trigger,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKind::Table => write!(f, "table"),
            ObjectKind::View => write!(f, "view"),
            ObjectKind::Trigger => write!(f, "trigger"),
        }
    }
}

/// A schema object listed by the source catalog, in catalog order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogObject {
    /// Object kind
    pub kind: ObjectKind,
    /// Object name
    pub name: String,
    /// Defining statement (`CREATE TABLE ...`, `CREATE VIEW ...`, ...)
    pub sql: String,
}

/// A schema object tagged with its emission rank
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DumpItem {
    /// Position in emission order
    pub rank: usize,
    /// Object kind
    pub kind: ObjectKind,
    /// Object name
    pub name: String,
    /// Defining statement
    pub sql: String,
}

/// Source table description built once from the catalog scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDescriptor {
    /// Table name
    pub name: String,
    /// Columns in declaration order
    pub columns: Vec<ColumnDescriptor>,
    /// Primary key columns ordered by key position
    pub primary_key: Vec<String>,
    /// Foreign keys owned by this table
    pub foreign_keys: Vec<ForeignKeyDescriptor>,
    /// Indexes defined on this table
    pub indexes: Vec<IndexDescriptor>,
}

impl TableDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            foreign_keys: Vec::new(),
            indexes: Vec::new(),
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Source column description
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name
    pub name: String,
    /// Declared type as written in the source schema
    pub declared_type: String,
    /// Classified source type
    pub source_type: SourceType,
    /// Whether the column accepts NULL
    pub nullable: bool,
    /// Default value as SQL text
    pub default_value: Option<String>,
    /// Whether the column is part of the primary key
    pub is_primary_key: bool,
    /// Longest text value observed (0 when unknown)
    pub max_text_length: u64,
    /// Largest signed magnitude observed, `-v - 1` for negatives (0 when unknown)
    pub max_int_magnitude: u64,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        let declared_type = declared_type.into();
        Self {
            name: name.into(),
            source_type: SourceType::from_declared(&declared_type),
            declared_type,
            nullable: true,
            default_value: None,
            is_primary_key: false,
            max_text_length: 0,
            max_int_magnitude: 0,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self.nullable = false;
        self
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default_value = Some(default.into());
        self
    }
}

/// Foreign key owned by a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKeyDescriptor {
    /// Owning columns, in key order
    pub columns: Vec<String>,
    /// Referenced table name
    pub referenced_table: String,
    /// Referenced columns, in key order
    pub referenced_columns: Vec<String>,
    /// ON DELETE action
    pub on_delete: String,
    /// ON UPDATE action
    pub on_update: String,
}

impl ForeignKeyDescriptor {
    pub fn new(
        column: impl Into<String>,
        referenced_table: impl Into<String>,
        referenced_column: impl Into<String>,
    ) -> Self {
        Self {
            columns: vec![column.into()],
            referenced_table: referenced_table.into(),
            referenced_columns: vec![referenced_column.into()],
            on_delete: "NO ACTION".to_string(),
            on_update: "NO ACTION".to_string(),
        }
    }
}

/// Where an index came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexOrigin {
    /// `CREATE INDEX`
    Created,
    /// Implied by a UNIQUE constraint
    UniqueConstraint,
    /// Implied by the PRIMARY KEY
    PrimaryKey,
}

impl IndexOrigin {
    pub fn from_code(code: &str) -> Self {
        match code {
            "u" => IndexOrigin::UniqueConstraint,
            "pk" => IndexOrigin::PrimaryKey,
            _ => IndexOrigin::Created,
        }
    }
}

/// Index defined on a source table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexDescriptor {
    /// Index name
    pub name: String,
    /// Whether index is unique
    pub unique: bool,
    /// Indexed columns; `None` entries are expressions
    pub columns: Vec<Option<String>>,
    /// Index origin
    pub origin: IndexOrigin,
    /// Whether the index has a WHERE predicate
    pub partial: bool,
}

impl IndexDescriptor {
    pub fn new(name: impl Into<String>, unique: bool, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            unique,
            columns: columns.iter().map(|c| Some(c.to_string())).collect(),
            origin: IndexOrigin::Created,
            partial: false,
        }
    }

    pub fn is_auto_generated(&self) -> bool {
        self.name.starts_with("sqlite_autoindex")
    }
}

/// Classified source column type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceType {
    Text,
    Integer,
    Real,
    Blob,
    Numeric,
    Boolean,
    /// DATE, DATETIME, TIME or TIMESTAMP (normalized upper-case name)
    Temporal(String),
    /// Anything else, carried through as declared (upper-cased)
    Other(String),
}

impl SourceType {
    /// Classify a declared column type. A missing type is treated as text.
    pub fn from_declared(declared: &str) -> Self {
        let upper = declared.trim().to_uppercase();
        if upper.is_empty() {
            return SourceType::Text;
        }
        let base = upper
            .split('(')
            .next()
            .unwrap_or_default()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        match base.as_str() {
            "INTEGER" | "INT" | "BIGINT" | "SMALLINT" | "TINYINT" | "MEDIUMINT" | "INT2"
            | "INT8" | "UNSIGNED BIG INT" => SourceType::Integer,
            "TEXT" | "CLOB" | "VARCHAR" | "CHAR" | "NCHAR" | "NVARCHAR" | "CHARACTER"
            | "VARYING CHARACTER" | "NATIVE CHARACTER" => SourceType::Text,
            "REAL" | "DOUBLE" | "DOUBLE PRECISION" | "FLOAT" => SourceType::Real,
            "BLOB" => SourceType::Blob,
            "NUMERIC" | "DECIMAL" => SourceType::Numeric,
            "BOOLEAN" | "BOOL" => SourceType::Boolean,
            "DATE" | "DATETIME" | "TIME" | "TIMESTAMP" => SourceType::Temporal(base),
            _ => SourceType::Other(upper),
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, SourceType::Text)
    }

    /// Types whose literal defaults are written as quoted strings
    pub fn quotes_defaults(&self) -> bool {
        matches!(self, SourceType::Text | SourceType::Temporal(_))
    }
}

/// MySQL column types produced by the type mapper
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MySqlType {
    /// Variable character with width
    Varchar(u32),
    /// Up to 64 KiB of text
    Text,
    /// Up to 4 GiB of text
    LongText,
    /// 4-byte integer
    Int,
    /// 8-byte integer
    BigInt,
    Double,
    LongBlob,
    /// Fixed precision and scale
    Decimal(u32, u32),
    Boolean,
    /// Type name carried through unchanged
    Raw(String),
}

impl MySqlType {
    pub fn to_sql(&self) -> String {
        match self {
            MySqlType::Varchar(width) => format!("VARCHAR({})", width),
            MySqlType::Text => "TEXT".to_string(),
            MySqlType::LongText => "LONGTEXT".to_string(),
            MySqlType::Int => "INT".to_string(),
            MySqlType::BigInt => "BIGINT".to_string(),
            MySqlType::Double => "DOUBLE".to_string(),
            MySqlType::LongBlob => "LONGBLOB".to_string(),
            MySqlType::Decimal(p, s) => format!("DECIMAL({},{})", p, s),
            MySqlType::Boolean => "BOOLEAN".to_string(),
            MySqlType::Raw(name) => name.clone(),
        }
    }
}
