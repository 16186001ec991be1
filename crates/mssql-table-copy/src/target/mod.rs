//! Destination table operations: DDL and row inserts.

pub mod rows;

pub use rows::{insert_rows, InsertBuilder, InsertStatement, RowFailure, RowStats};

use tracing::{debug, info};

use crate::core::identifier::{qualify_mssql, quote_literal, quote_mssql, validate_type_fragment};
use crate::core::{ColumnDescriptor, Nullability};
use crate::drivers::SqlConnection;
use crate::error::{CopyError, Result};

/// Statement dropping `schema.table` when it exists.
pub fn build_drop_table(schema: &str, table: &str) -> Result<String> {
    let qualified = qualify_mssql(schema, table)?;
    Ok(format!(
        "IF OBJECT_ID({}, N'U') IS NOT NULL DROP TABLE {}",
        quote_literal(&qualified, true),
        qualified
    ))
}

/// `CREATE TABLE` statement for `schema.table` with one clause per column,
/// in descriptor order.
///
/// A single primary-key column keeps its inline `NOT NULL PRIMARY KEY`
/// clause. With several, each is declared `NOT NULL` and a table-level
/// `PRIMARY KEY (...)` constraint lists them in column order.
pub fn build_create_table(
    schema: &str,
    table: &str,
    columns: &[ColumnDescriptor],
) -> Result<String> {
    if columns.is_empty() {
        return Err(CopyError::schema_create(
            format!("{}.{}", schema, table),
            "no columns to create",
        ));
    }

    let pk_columns: Vec<&ColumnDescriptor> =
        columns.iter().filter(|c| c.is_primary_key()).collect();
    let composite_pk = pk_columns.len() > 1;

    let mut clauses = columns
        .iter()
        .map(|c| {
            validate_type_fragment(&c.decorated_type)?;
            let nullability = if composite_pk && c.is_primary_key() {
                Nullability::NotNull
            } else {
                c.nullability
            };
            Ok(format!(
                "{} {} {}",
                quote_mssql(&c.name)?,
                c.decorated_type,
                nullability
            ))
        })
        .collect::<Result<Vec<_>>>()?;

    if composite_pk {
        let key = pk_columns
            .iter()
            .map(|c| quote_mssql(&c.name))
            .collect::<Result<Vec<_>>>()?
            .join(", ");
        clauses.push(format!("PRIMARY KEY ({})", key));
    }

    Ok(format!(
        "CREATE TABLE {} (\n    {}\n)",
        qualify_mssql(schema, table)?,
        clauses.join(",\n    ")
    ))
}

/// Replace `schema.table` with an empty table shaped by `columns`.
///
/// Any failure, including of the drop, is reported as
/// [`CopyError::SchemaCreate`].
pub async fn create_table(
    conn: &mut dyn SqlConnection,
    schema: &str,
    table: &str,
    columns: &[ColumnDescriptor],
) -> Result<()> {
    let full_name = format!("{}.{}", schema, table);
    let drop = build_drop_table(schema, table)?;
    let create = build_create_table(schema, table, columns)?;

    for sql in [&drop, &create] {
        debug!("DDL: {}", sql);
        conn.execute(sql, &[])
            .await
            .map_err(|e| e.classify_driver(|m| CopyError::schema_create(&full_name, m)))?;
    }

    info!("Created table {} ({} columns)", full_name, columns.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::mock::MockConnector;
    use crate::drivers::Connector;

    fn employees() -> Vec<ColumnDescriptor> {
        vec![
            ColumnDescriptor::new("id", "int", "int", Nullability::NotNullPrimaryKey),
            ColumnDescriptor::new("name", "varchar", "varchar(50)", Nullability::Null),
        ]
    }

    #[test]
    fn test_build_drop_table() {
        assert_eq!(
            build_drop_table("dbo", "Employees").unwrap(),
            "IF OBJECT_ID(N'[dbo].[Employees]', N'U') IS NOT NULL DROP TABLE [dbo].[Employees]"
        );
        assert_eq!(
            build_drop_table("dbo", "O'Neil").unwrap(),
            "IF OBJECT_ID(N'[dbo].[O''Neil]', N'U') IS NOT NULL DROP TABLE [dbo].[O'Neil]"
        );
    }

    #[test]
    fn test_build_create_table_employees() {
        let ddl = build_create_table("dbo", "Employees", &employees()).unwrap();
        assert_eq!(
            ddl,
            "CREATE TABLE [dbo].[Employees] (\n    [id] int NOT NULL PRIMARY KEY,\n    [name] varchar(50) NULL\n)"
        );
    }

    #[test]
    fn test_build_create_table_composite_key() {
        let columns = vec![
            ColumnDescriptor::new("order_id", "int", "int", Nullability::NotNullPrimaryKey),
            ColumnDescriptor::new("line", "smallint", "smallint", Nullability::NotNullPrimaryKey),
            ColumnDescriptor::new("qty", "decimal", "decimal(9,3)", Nullability::NotNull),
        ];
        let ddl = build_create_table("sales", "Lines", &columns).unwrap();
        assert!(ddl.contains("[order_id] int NOT NULL,"));
        assert!(ddl.contains("[line] smallint NOT NULL,"));
        assert!(ddl.contains("PRIMARY KEY ([order_id], [line])"));
        assert_eq!(ddl.matches("PRIMARY KEY").count(), 1);
    }

    #[test]
    fn test_build_create_table_rejects_bad_type() {
        let columns = vec![ColumnDescriptor::new(
            "x",
            "int",
            "int) ; DROP TABLE y; --",
            Nullability::Null,
        )];
        assert!(build_create_table("dbo", "t", &columns).is_err());
    }

    #[tokio::test]
    async fn test_create_table_failure_is_schema_error() {
        let connector = MockConnector::new().fail_when("CREATE TABLE", "permission denied");
        let mut conn = connector.connect("dst").await.unwrap();

        let err = create_table(conn.as_mut(), "dbo", "Employees", &employees())
            .await
            .unwrap_err();
        assert!(matches!(err, CopyError::SchemaCreate { .. }));
        assert_eq!(err.exit_code(), crate::error::EXIT_SCHEMA_ERROR);

        let sql = connector.sql();
        assert_eq!(sql.len(), 2);
        assert!(sql[0].starts_with("IF OBJECT_ID"));
    }
}
