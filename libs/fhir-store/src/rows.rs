//! Flattening elements into table rows
//!
//! [`RowPlanner::plan`] turns an element tree into one [`Row`] per composite,
//! children before parents so foreign keys are satisfied in insertion order.
//! Nested composites without an `id` get a generated UUID v4.

use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use dstu2_models::{Element, FieldValue, SchemaCatalog};

use crate::dialect::{quote_ident, Dialect};
use crate::error::{Error, Result};
use crate::mapping::{ColumnKind, ScalarType, TableMapping};

/// Bind values for parameterised statements.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Decimal(Decimal),
    Text(String),
    Json(Value),
}

fn push_bind(bind_params: &mut Vec<BindValue>, value: BindValue) -> usize {
    bind_params.push(value);
    bind_params.len()
}

/// One row destined for a table
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub table: String,
    pub type_name: String,
    pub id: String,
    /// `(column, value)` in table column order, `id` first
    pub values: Vec<(String, BindValue)>,
}

/// A rendered statement and its bind parameters
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub sql: String,
    pub params: Vec<BindValue>,
}

impl Row {
    pub fn get(&self, column: &str) -> Option<&BindValue> {
        self.values
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn insert_sql(&self, dialect: Dialect) -> InsertStatement {
        let mut params = Vec::with_capacity(self.values.len());
        let mut columns = Vec::with_capacity(self.values.len());
        let mut placeholders = Vec::with_capacity(self.values.len());

        for (column, value) in &self.values {
            let idx = push_bind(&mut params, value.clone());
            columns.push(quote_ident(column));
            placeholders.push(dialect.placeholder(idx));
        }

        InsertStatement {
            sql: format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote_ident(&self.table),
                columns.join(", "),
                placeholders.join(", ")
            ),
            params,
        }
    }
}

/// Plans rows for elements of one catalog
#[derive(Debug, Clone)]
pub struct RowPlanner {
    catalog: Arc<SchemaCatalog>,
}

impl RowPlanner {
    pub fn new(catalog: Arc<SchemaCatalog>) -> Self {
        Self { catalog }
    }

    /// Flatten `element` and every nested single-valued composite
    pub fn plan(&self, element: &Element) -> Result<Vec<Row>> {
        let mut mappings = HashMap::new();
        let mut rows = Vec::new();
        self.flatten(element, &mut mappings, &mut rows)?;
        Ok(rows)
    }

    fn flatten(
        &self,
        element: &Element,
        mappings: &mut HashMap<String, Arc<TableMapping>>,
        rows: &mut Vec<Row>,
    ) -> Result<String> {
        if element.resolved_type().is_abstract {
            return Err(Error::UnmappedType(element.type_name().to_string()));
        }
        let mapping = match mappings.get(element.type_name()) {
            Some(mapping) => Arc::clone(mapping),
            None => {
                let mapping = Arc::new(TableMapping::for_type(&self.catalog, element.type_name())?);
                mappings.insert(element.type_name().to_string(), Arc::clone(&mapping));
                mapping
            }
        };

        let id = element
            .id()
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut values = vec![("id".to_string(), BindValue::Text(id.clone()))];
        for column in &mapping.columns {
            let Some(value) = element.get(&column.name) else {
                continue;
            };
            let bound = match &column.kind {
                ColumnKind::Id => continue,
                ColumnKind::Composite { .. } => match value {
                    FieldValue::Element(child) => {
                        BindValue::Text(self.flatten(child, mappings, rows)?)
                    }
                    other => BindValue::Json(other.to_json()),
                },
                ColumnKind::Scalar(scalar) => scalar_bind(*scalar, value),
                ColumnKind::Json => BindValue::Json(value.to_json()),
            };
            values.push((column.name.clone(), bound));
        }

        if !element.extras().is_empty() {
            debug!(
                type_name = element.type_name(),
                extras = element.extras().len(),
                "Extra properties are not persisted"
            );
        }

        rows.push(Row {
            table: mapping.table.clone(),
            type_name: mapping.type_name.clone(),
            id: id.clone(),
            values,
        });
        Ok(id)
    }
}

fn scalar_bind(scalar: ScalarType, value: &FieldValue) -> BindValue {
    match (scalar, value) {
        (ScalarType::Boolean, FieldValue::Boolean(b)) => BindValue::Boolean(*b),
        (ScalarType::Integer, FieldValue::Integer(i)) => BindValue::Integer(*i),
        (ScalarType::Decimal, FieldValue::Decimal(d)) => BindValue::Decimal(*d),
        (ScalarType::Decimal, FieldValue::Integer(i)) => BindValue::Decimal(Decimal::from(*i)),
        (_, FieldValue::String(s)) => BindValue::Text(s.clone()),
        (_, FieldValue::Date(d)) => BindValue::Text(d.as_str().to_string()),
        (_, FieldValue::Time(t)) => BindValue::Text(t.as_str().to_string()),
        (_, FieldValue::Json(Value::Null)) => BindValue::Null,
        (_, other) => BindValue::Text(other.to_json().to_string()),
    }
}
