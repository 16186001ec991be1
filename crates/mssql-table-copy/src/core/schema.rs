//! Column metadata types shared by the export and import phases.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::typemap::TypeSpec;

/// Nullability and key clause of a column.
///
/// The string forms are exactly what appears in the third snapshot header
/// record and in the `CREATE TABLE` column clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Nullability {
    /// `NULL`
    Null,
    /// `NOT NULL`
    NotNull,
    /// `NOT NULL PRIMARY KEY`
    NotNullPrimaryKey,
}

impl Nullability {
    /// Resolve from the catalog's `IS_NULLABLE` flag and primary-key membership.
    pub fn from_catalog(is_nullable: &str, is_primary_key: bool) -> Self {
        if is_primary_key {
            Nullability::NotNullPrimaryKey
        } else if is_nullable.trim().eq_ignore_ascii_case("YES") {
            Nullability::Null
        } else {
            Nullability::NotNull
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Nullability::Null => "NULL",
            Nullability::NotNull => "NOT NULL",
            Nullability::NotNullPrimaryKey => "NOT NULL PRIMARY KEY",
        }
    }

    pub fn is_primary_key(&self) -> bool {
        matches!(self, Nullability::NotNullPrimaryKey)
    }

    pub fn allows_null(&self) -> bool {
        matches!(self, Nullability::Null)
    }
}

impl fmt::Display for Nullability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Nullability {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ");
        match normalized.to_ascii_uppercase().as_str() {
            "NULL" => Ok(Nullability::Null),
            "NOT NULL" => Ok(Nullability::NotNull),
            "NOT NULL PRIMARY KEY" => Ok(Nullability::NotNullPrimaryKey),
            _ => Err(format!("invalid nullability clause {:?}", s)),
        }
    }
}

/// One column of the copied table.
///
/// Built once by the catalog reader during export, or rebuilt from the three
/// snapshot header records during import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name.
    pub name: String,

    /// Source catalog type name (e.g. "varchar").
    pub raw_type: String,

    /// Type clause including size parameters (e.g. "varchar(50)").
    pub decorated_type: String,

    /// Nullability and primary key clause.
    pub nullability: Nullability,
}

impl ColumnDescriptor {
    pub fn new(
        name: impl Into<String>,
        raw_type: impl Into<String>,
        decorated_type: impl Into<String>,
        nullability: Nullability,
    ) -> Self {
        Self {
            name: name.into(),
            raw_type: raw_type.into(),
            decorated_type: decorated_type.into(),
            nullability,
        }
    }

    /// Rebuild a descriptor from its snapshot form, recovering the raw type
    /// from the decorated type's base name.
    pub fn from_decorated(
        name: impl Into<String>,
        decorated_type: &str,
        nullability: Nullability,
    ) -> std::result::Result<Self, String> {
        let spec = TypeSpec::parse(decorated_type)?;
        Ok(Self::new(name, spec.base, decorated_type, nullability))
    }

    pub fn is_primary_key(&self) -> bool {
        self.nullability.is_primary_key()
    }

    /// Whether values of this column are character data.
    pub fn is_textual(&self) -> bool {
        crate::typemap::is_textual(&self.decorated_type)
    }

    /// Whether this column must be exported through its WKT representation.
    pub fn is_spatial(&self) -> bool {
        crate::typemap::is_spatial(&self.raw_type)
    }
}

/// One raw row of the source catalog query, before type formatting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogColumn {
    pub column_name: String,
    pub data_type: String,
    pub character_maximum_length: Option<i32>,
    pub numeric_precision: Option<i32>,
    pub numeric_precision_radix: Option<i32>,
    pub numeric_scale: Option<i32>,
    pub datetime_precision: Option<i32>,
    pub character_octet_length: Option<i32>,
    pub is_nullable: String,
    pub constraint_name: Option<String>,
    pub constraint_type: Option<String>,
}

impl CatalogColumn {
    /// Whether this catalog row marks the column as part of the primary key.
    ///
    /// The constraint type decides when the catalog reports it; otherwise the
    /// constraint name is searched for `pk_marker`.
    pub fn marks_primary_key(&self, pk_marker: &str) -> bool {
        match (&self.constraint_type, &self.constraint_name) {
            (Some(kind), _) => kind.trim().eq_ignore_ascii_case("PRIMARY KEY"),
            (None, Some(name)) => !pk_marker.is_empty() && name.contains(pk_marker),
            (None, None) => false,
        }
    }
}
