//! Translation of filter `where` / `order` clauses into SQLite SQL.
//!
//! Records are stored as JSON text in a `doc` column, so every field other
//! than `id` is addressed through `json_extract(doc, '$.field')`. JSON paths
//! and operands are always bound, never spliced into the SQL text.

use crate::models::{
    document::Document,
    filter::{Direction, OrderTerm},
};
use crate::services::memory_store::{StoreError, StoreResult};
use serde_json::Value;
use sqlx::{QueryBuilder, Sqlite};

/// Append a boolean SQL expression for `clause`. An empty clause matches
/// every row.
pub fn push_where<'args>(
    builder: &mut QueryBuilder<'args, Sqlite>,
    clause: &Document,
) -> StoreResult<()> {
    if clause.is_empty() {
        builder.push("1 = 1");
        return Ok(());
    }

    builder.push("(");
    for (i, (key, value)) in clause.iter().enumerate() {
        if i > 0 {
            builder.push(" AND ");
        }
        match key.as_str() {
            "and" => push_group(builder, " AND ", value)?,
            "or" => push_group(builder, " OR ", value)?,
            field => push_condition(builder, field, value)?,
        }
    }
    builder.push(")");
    Ok(())
}

/// Append ` ORDER BY …`, always ending with `id` so results are stable.
pub fn push_order<'args>(
    builder: &mut QueryBuilder<'args, Sqlite>,
    terms: &[OrderTerm],
) -> StoreResult<()> {
    builder.push(" ORDER BY ");
    for term in terms {
        push_field(builder, &term.field)?;
        builder.push(match term.direction {
            Direction::Asc => " ASC, ",
            Direction::Desc => " DESC, ",
        });
    }
    builder.push("id ASC");
    Ok(())
}

/// Field names are dotted identifiers such as `name` or `data.quux`.
pub fn ensure_field_name_safe(field: &str) -> StoreResult<()> {
    let valid = !field.is_empty()
        && field.split('.').all(|segment| {
            let mut chars = segment.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        });
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidQuery(format!(
            "invalid field name `{}`",
            field
        )))
    }
}

fn push_group<'args>(
    builder: &mut QueryBuilder<'args, Sqlite>,
    joiner: &'static str,
    value: &Value,
) -> StoreResult<()> {
    let items = value.as_array().ok_or_else(|| {
        StoreError::InvalidQuery("`and` / `or` expect an array of clauses".into())
    })?;

    if items.is_empty() {
        builder.push(if joiner == " AND " { "1 = 1" } else { "1 = 0" });
        return Ok(());
    }

    builder.push("(");
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            builder.push(joiner);
        }
        let clause = item.as_object().ok_or_else(|| {
            StoreError::InvalidQuery("`and` / `or` items must be objects".into())
        })?;
        push_where(builder, clause)?;
    }
    builder.push(")");
    Ok(())
}

fn push_condition<'args>(
    builder: &mut QueryBuilder<'args, Sqlite>,
    field: &str,
    value: &Value,
) -> StoreResult<()> {
    match value {
        Value::Object(ops) if !ops.is_empty() => {
            builder.push("(");
            for (i, (op, operand)) in ops.iter().enumerate() {
                if i > 0 {
                    builder.push(" AND ");
                }
                push_operator(builder, field, op, operand)?;
            }
            builder.push(")");
            Ok(())
        }
        Value::Null => {
            push_field(builder, field)?;
            builder.push(" IS NULL");
            Ok(())
        }
        scalar => {
            push_field(builder, field)?;
            builder.push(" = ");
            push_scalar(builder, scalar)
        }
    }
}

fn push_operator<'args>(
    builder: &mut QueryBuilder<'args, Sqlite>,
    field: &str,
    op: &str,
    operand: &Value,
) -> StoreResult<()> {
    match op {
        "gt" | "gte" | "lt" | "lte" => {
            let sql = match op {
                "gt" => " > ",
                "gte" => " >= ",
                "lt" => " < ",
                _ => " <= ",
            };
            push_field(builder, field)?;
            builder.push(sql);
            push_scalar(builder, operand)
        }
        "neq" => {
            if operand.is_null() {
                push_field(builder, field)?;
                builder.push(" IS NOT NULL");
                return Ok(());
            }
            // a missing field is "not equal" as well
            builder.push("(");
            push_field(builder, field)?;
            builder.push(" != ");
            push_scalar(builder, operand)?;
            builder.push(" OR ");
            push_field(builder, field)?;
            builder.push(" IS NULL)");
            Ok(())
        }
        "inq" | "nin" => {
            let items = operand.as_array().ok_or_else(|| {
                StoreError::InvalidQuery(format!("`{}` expects an array", op))
            })?;
            let negate = op == "nin";
            if items.is_empty() {
                builder.push(if negate { "1 = 1" } else { "1 = 0" });
                return Ok(());
            }
            builder.push("(");
            push_field(builder, field)?;
            builder.push(if negate { " NOT IN (" } else { " IN (" });
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    builder.push(", ");
                }
                push_scalar(builder, item)?;
            }
            builder.push(")");
            if negate {
                builder.push(" OR ");
                push_field(builder, field)?;
                builder.push(" IS NULL");
            }
            builder.push(")");
            Ok(())
        }
        "like" | "nlike" => {
            let pattern = operand.as_str().ok_or_else(|| {
                StoreError::InvalidQuery(format!("`{}` expects a string", op))
            })?;
            push_field(builder, field)?;
            builder.push(if op == "like" { " LIKE " } else { " NOT LIKE " });
            builder.push_bind(pattern.to_string());
            Ok(())
        }
        "between" => {
            let bounds = operand
                .as_array()
                .filter(|b| b.len() == 2)
                .ok_or_else(|| {
                    StoreError::InvalidQuery("`between` expects two bounds".into())
                })?;
            push_field(builder, field)?;
            builder.push(" BETWEEN ");
            push_scalar(builder, &bounds[0])?;
            builder.push(" AND ");
            push_scalar(builder, &bounds[1])
        }
        other => Err(StoreError::InvalidQuery(format!(
            "unknown operator `{}`",
            other
        ))),
    }
}

fn push_field<'args>(builder: &mut QueryBuilder<'args, Sqlite>, field: &str) -> StoreResult<()> {
    ensure_field_name_safe(field)?;
    if field == "id" {
        builder.push("id");
    } else {
        builder.push("json_extract(doc, ");
        builder.push_bind(format!("$.{}", field));
        builder.push(")");
    }
    Ok(())
}

/// Bind a scalar operand. Booleans bind as 1/0, matching what
/// `json_extract` yields for JSON `true`/`false`.
fn push_scalar<'args>(builder: &mut QueryBuilder<'args, Sqlite>, value: &Value) -> StoreResult<()> {
    match value {
        Value::String(s) => {
            builder.push_bind(s.clone());
        }
        Value::Bool(b) => {
            builder.push_bind(i64::from(*b));
        }
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => {
                builder.push_bind(i);
            }
            (None, Some(f)) => {
                builder.push_bind(f);
            }
            _ => {
                return Err(StoreError::InvalidQuery(format!(
                    "unsupported number `{}`",
                    n
                )));
            }
        },
        other => {
            return Err(StoreError::InvalidQuery(format!(
                "`{}` is not a scalar operand",
                other
            )));
        }
    }
    Ok(())
}
