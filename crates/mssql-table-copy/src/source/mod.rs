//! Source table operations: catalog metadata and row extraction.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::core::identifier::{qualify_mssql, quote_mssql};
use crate::core::{CatalogColumn, ColumnDescriptor, Nullability};
use crate::drivers::{RowSink, SqlConnection, TextRow};
use crate::error::{CopyError, Result};
use crate::typemap::format_type;

/// Column metadata for one table, joined to the constraints each column
/// takes part in. A column in several constraints appears once per
/// constraint.
pub const CATALOG_QUERY: &str = r#"
    SELECT
        c.COLUMN_NAME,
        c.DATA_TYPE,
        c.CHARACTER_MAXIMUM_LENGTH,
        c.NUMERIC_PRECISION,
        c.NUMERIC_PRECISION_RADIX,
        c.NUMERIC_SCALE,
        c.DATETIME_PRECISION,
        c.CHARACTER_OCTET_LENGTH,
        c.IS_NULLABLE,
        ccu.CONSTRAINT_NAME,
        tc.CONSTRAINT_TYPE
    FROM INFORMATION_SCHEMA.COLUMNS c
    LEFT JOIN INFORMATION_SCHEMA.CONSTRAINT_COLUMN_USAGE ccu
        ON ccu.TABLE_SCHEMA = c.TABLE_SCHEMA
        AND ccu.TABLE_NAME = c.TABLE_NAME
        AND ccu.COLUMN_NAME = c.COLUMN_NAME
    LEFT JOIN INFORMATION_SCHEMA.TABLE_CONSTRAINTS tc
        ON tc.CONSTRAINT_SCHEMA = ccu.CONSTRAINT_SCHEMA
        AND tc.CONSTRAINT_NAME = ccu.CONSTRAINT_NAME
    WHERE c.TABLE_SCHEMA = @P1 AND c.TABLE_NAME = @P2
    ORDER BY c.ORDINAL_POSITION
"#;

/// Number of fields in a [`CATALOG_QUERY`] row.
const CATALOG_FIELDS: usize = 11;

/// Read the ordered column descriptors of `schema.table`.
///
/// Fails with [`CopyError::CatalogUnavailable`] when the catalog query fails
/// or the table has no columns (including when it does not exist).
pub async fn read_columns(
    conn: &mut dyn SqlConnection,
    schema: &str,
    table: &str,
    pk_marker: &str,
) -> Result<Vec<ColumnDescriptor>> {
    let full_name = format!("{}.{}", schema, table);

    let rows = conn
        .query(CATALOG_QUERY, &[schema, table])
        .await
        .map_err(|e| e.classify_driver(|m| CopyError::catalog(&full_name, m)))?;

    let catalog = rows
        .iter()
        .map(|row| parse_catalog_row(row).map_err(|m| CopyError::catalog(&full_name, m)))
        .collect::<Result<Vec<_>>>()?;

    let columns = descriptors_from_catalog(&catalog, pk_marker);
    if columns.is_empty() {
        return Err(CopyError::catalog(
            &full_name,
            "table not found or has no columns",
        ));
    }

    info!(
        "Read {} columns for {} ({} primary key)",
        columns.len(),
        full_name,
        columns.iter().filter(|c| c.is_primary_key()).count()
    );
    Ok(columns)
}

/// Turn catalog rows into descriptors, one per column, in catalog order.
///
/// Repeated rows for the same column (one per constraint) collapse into the
/// first; the column is a primary key if any of its rows says so.
pub fn descriptors_from_catalog(
    catalog: &[CatalogColumn],
    pk_marker: &str,
) -> Vec<ColumnDescriptor> {
    let mut columns: Vec<ColumnDescriptor> = Vec::with_capacity(catalog.len());
    let mut positions: HashMap<&str, usize> = HashMap::new();

    for row in catalog {
        let is_pk = row.marks_primary_key(pk_marker);

        if let Some(&pos) = positions.get(row.column_name.as_str()) {
            if is_pk {
                columns[pos].nullability = Nullability::NotNullPrimaryKey;
            }
            continue;
        }

        let decorated = format_type(
            &row.data_type,
            row.character_maximum_length,
            row.numeric_precision,
            row.numeric_scale,
            row.datetime_precision,
        );
        debug!(
            "Column {}: {} -> {}{}",
            row.column_name,
            row.data_type,
            decorated,
            if is_pk { " (primary key)" } else { "" }
        );

        positions.insert(&row.column_name, columns.len());
        columns.push(ColumnDescriptor::new(
            &row.column_name,
            &row.data_type,
            decorated,
            Nullability::from_catalog(&row.is_nullable, is_pk),
        ));
    }

    columns
}

fn parse_catalog_row(row: &TextRow) -> std::result::Result<CatalogColumn, String> {
    if row.len() != CATALOG_FIELDS {
        return Err(format!(
            "catalog row has {} fields, expected {}",
            row.len(),
            CATALOG_FIELDS
        ));
    }

    let text = |i: usize| row[i].clone();
    let number = |i: usize| -> std::result::Result<Option<i32>, String> {
        row[i]
            .as_deref()
            .map(|v| {
                v.trim()
                    .parse::<i32>()
                    .map_err(|_| format!("non-numeric catalog value {:?}", v))
            })
            .transpose()
    };

    let column_name = text(0).ok_or("catalog row without COLUMN_NAME")?;
    let data_type = text(1).ok_or("catalog row without DATA_TYPE")?;

    Ok(CatalogColumn {
        column_name,
        data_type,
        character_maximum_length: number(2)?,
        numeric_precision: number(3)?,
        numeric_precision_radix: number(4)?,
        numeric_scale: number(5)?,
        datetime_precision: number(6)?,
        character_octet_length: number(7)?,
        is_nullable: text(8).unwrap_or_else(|| "YES".to_string()),
        constraint_name: text(9),
        constraint_type: text(10),
    })
}

/// Build the row-selection query for `schema.table`.
///
/// Every column is listed explicitly so the select-list order matches the
/// descriptors. Spatial columns are selected as their WKT text.
pub fn build_select_query(
    schema: &str,
    table: &str,
    columns: &[ColumnDescriptor],
) -> Result<String> {
    let select_list = columns
        .iter()
        .map(|col| {
            let quoted = quote_mssql(&col.name)?;
            Ok(if col.is_spatial() {
                format!("{}.STAsText() AS {}", quoted, quoted)
            } else {
                quoted
            })
        })
        .collect::<Result<Vec<_>>>()?
        .join(", ");

    Ok(format!(
        "SELECT {} FROM {}",
        select_list,
        qualify_mssql(schema, table)?
    ))
}

/// Stream every row of `schema.table` into `sink`.
///
/// Driver failures become [`CopyError::Query`]; errors raised by the sink
/// pass through unchanged.
pub async fn read_rows(
    conn: &mut dyn SqlConnection,
    schema: &str,
    table: &str,
    columns: &[ColumnDescriptor],
    sink: &mut RowSink<'_>,
) -> Result<u64> {
    let full_name = format!("{}.{}", schema, table);
    let sql = build_select_query(schema, table, columns)?;
    debug!("Row query: {}", sql);

    let rows = conn
        .for_each_row(&sql, &[], sink)
        .await
        .map_err(|e| e.classify_driver(|m| CopyError::query(&full_name, m)))?;

    if rows == 0 {
        warn!("{} has no rows, snapshot will hold headers only", full_name);
    }
    Ok(rows)
}
