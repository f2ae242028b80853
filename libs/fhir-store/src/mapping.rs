//! Catalog type to SQL table mapping
//!
//! Every composite type gets one table keyed by a text `id`. Single-valued
//! primitives become scalar columns, single-valued composites become a text
//! column referencing the child table, and lists (or nested resources) are
//! stored as JSON. A choice field contributes one column per allowed type.

use dstu2_models::{is_primitive_code, FieldSchema, SchemaCatalog};

use crate::dialect::{quote_ident, Dialect};
use crate::error::Result;

/// Storage class of a scalar column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    Boolean,
    Integer,
    Decimal,
    Text,
}

impl ScalarType {
    pub fn for_code(code: &str) -> Self {
        match code {
            "boolean" => ScalarType::Boolean,
            "integer" | "unsignedInt" | "positiveInt" => ScalarType::Integer,
            "decimal" => ScalarType::Decimal,
            // dates stay textual to keep partial precision
            _ => ScalarType::Text,
        }
    }

    fn sql_type(&self, dialect: Dialect) -> &'static str {
        match self {
            ScalarType::Boolean => dialect.boolean_type(),
            ScalarType::Integer => dialect.integer_type(),
            ScalarType::Decimal => dialect.decimal_type(),
            ScalarType::Text => dialect.text_type(),
        }
    }
}

/// How a column stores its field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnKind {
    /// The table's primary key
    Id,
    Scalar(ScalarType),
    /// Id of a row in another table
    Composite { type_name: String, table: String },
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name, equal to the JSON property name
    pub name: String,
    /// Type code of the value stored here
    pub type_code: String,
    pub kind: ColumnKind,
    /// Emit a `REFERENCES` clause for composite columns
    pub foreign_key: bool,
}

impl Column {
    /// Referenced table, when a foreign key is emitted
    pub fn references(&self) -> Option<&str> {
        match &self.kind {
            ColumnKind::Composite { table, .. } if self.foreign_key => Some(table),
            _ => None,
        }
    }

    fn definition(&self, dialect: Dialect) -> String {
        let name = quote_ident(&self.name);
        match &self.kind {
            ColumnKind::Id => format!("{name} {} PRIMARY KEY", dialect.text_type()),
            ColumnKind::Scalar(scalar) => format!("{name} {}", scalar.sql_type(dialect)),
            ColumnKind::Json => format!("{name} {}", dialect.json_type()),
            ColumnKind::Composite { table, .. } => {
                if self.foreign_key {
                    format!(
                        "{name} {} REFERENCES {} (\"id\")",
                        dialect.text_type(),
                        quote_ident(table)
                    )
                } else {
                    format!("{name} {}", dialect.text_type())
                }
            }
        }
    }
}

/// Table layout of one catalog type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMapping {
    pub type_name: String,
    pub table: String,
    pub columns: Vec<Column>,
}

impl TableMapping {
    /// Build the table layout of `type_name` from its resolved fields
    pub fn for_type(catalog: &SchemaCatalog, type_name: &str) -> Result<Self> {
        let resolved = catalog.resolve(type_name)?;

        let mut columns = vec![Column {
            name: "id".to_string(),
            type_code: "id".to_string(),
            kind: ColumnKind::Id,
            foreign_key: false,
        }];

        for field in resolved.fields.iter().filter(|f| f.name != "id") {
            if field.cardinality.is_array() {
                columns.push(Column {
                    name: field.choice_base().to_string(),
                    type_code: field.type_code().unwrap_or_default().to_string(),
                    kind: ColumnKind::Json,
                    foreign_key: false,
                });
                continue;
            }
            for (name, code) in single_columns(field) {
                columns.push(column_for(catalog, name, code)?);
            }
        }

        Ok(Self {
            type_name: resolved.name.clone(),
            table: resolved.table.clone(),
            columns,
        })
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub(crate) fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    /// Columns that emit a foreign key
    pub fn foreign_keys(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.references().is_some())
    }

    pub fn create_table_sql(&self, dialect: Dialect) -> String {
        let mut sql = format!("CREATE TABLE IF NOT EXISTS {} (\n", quote_ident(&self.table));
        let definitions: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("    {}", c.definition(dialect)))
            .collect();
        sql.push_str(&definitions.join(",\n"));
        sql.push_str("\n);");
        sql
    }

    pub fn drop_table_sql(&self, _dialect: Dialect) -> String {
        format!("DROP TABLE IF EXISTS {};", quote_ident(&self.table))
    }
}

/// `(column name, type code)` pairs of a single-valued field
fn single_columns(field: &FieldSchema) -> Vec<(String, &str)> {
    if field.is_choice() {
        field
            .json_names()
            .into_iter()
            .zip(field.types.iter().map(String::as_str))
            .collect()
    } else {
        vec![(field.name.clone(), field.type_code().unwrap_or_default())]
    }
}

fn column_for(catalog: &SchemaCatalog, name: String, code: &str) -> Result<Column> {
    let kind = if is_primitive_code(code) {
        ColumnKind::Scalar(ScalarType::for_code(code))
    } else if code == "Resource" || !catalog.contains(code) {
        ColumnKind::Json
    } else {
        let child = catalog.resolve(code)?;
        ColumnKind::Composite {
            type_name: child.name.clone(),
            table: child.table.clone(),
        }
    };
    let foreign_key = matches!(kind, ColumnKind::Composite { .. });
    Ok(Column {
        name,
        type_code: code.to_string(),
        kind,
        foreign_key,
    })
}
