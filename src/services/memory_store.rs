//! ModelStore: CRUD over JSON documents in the Memory datasource.
//!
//! Each model owns one table of `(id INTEGER PRIMARY KEY AUTOINCREMENT,
//! doc TEXT)`. Incoming documents are decoded into the model type (which
//! enforces field types and requiredness), run through the model's hooks
//! and validation, and stored re-serialized without their `id`.

use crate::models::{document::Document, filter::Filter};
use crate::services::where_clause::{push_order, push_where};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use sqlx::{QueryBuilder, SqlitePool, sqlite::Sqlite};
use std::{marker::PhantomData, sync::Arc};
use thiserror::Error;
use tracing::debug;

/// A model persisted through [`ModelStore`].
pub trait Model: Serialize + DeserializeOwned + Send + Sync + Unpin + 'static {
    /// Singular model name used in messages.
    const NAME: &'static str;

    /// Backing table.
    const TABLE: &'static str;

    /// Checks beyond what deserialization already enforces.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }

    /// Called before every write.
    fn before_save(&mut self, _is_new: bool) {}
}

/// A model instance together with its datastore id.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Record<T> {
    pub id: i64,

    #[serde(flatten)]
    pub data: T,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{model} with id {id} not found")]
    NotFound { model: &'static str, id: i64 },
    #[error("{model} with id {id} already exists")]
    Duplicate { model: &'static str, id: i64 },
    #[error("{model} is invalid: {reason}")]
    Validation { model: &'static str, reason: String },
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Typed access to one model's table.
pub struct ModelStore<T> {
    db: Arc<SqlitePool>,
    _model: PhantomData<fn() -> T>,
}

impl<T> Clone for ModelStore<T> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            _model: PhantomData,
        }
    }
}

impl<T: Model> ModelStore<T> {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self {
            db,
            _model: PhantomData,
        }
    }

    /// Insert a new record. An explicit integer `id` is honoured; reusing
    /// one fails with `Duplicate`.
    pub async fn create(&self, mut doc: Document) -> StoreResult<Record<T>> {
        let explicit_id = take_id::<T>(&mut doc)?;
        let (data, text) = prepare::<T>(doc, true)?;

        let id = match explicit_id {
            Some(id) => {
                let sql = format!("INSERT INTO {} (id, doc) VALUES (?, ?)", T::TABLE);
                match sqlx::query(&sql).bind(id).bind(&text).execute(&*self.db).await {
                    Ok(_) => id,
                    Err(err) if is_id_conflict::<T>(&err) => {
                        return Err(StoreError::Duplicate { model: T::NAME, id });
                    }
                    Err(err) => return Err(StoreError::Sqlx(err)),
                }
            }
            None => {
                let sql = format!("INSERT INTO {} (doc) VALUES (?) RETURNING id", T::TABLE);
                sqlx::query_scalar::<_, i64>(&sql)
                    .bind(&text)
                    .fetch_one(&*self.db)
                    .await?
            }
        };

        debug!("created {} {}", T::NAME, id);
        Ok(Record { id, data })
    }

    /// Records matching `filter`, ordered by the filter's `order` then id.
    pub async fn find(&self, filter: &Filter) -> StoreResult<Vec<Record<T>>> {
        let order = filter.order_terms().map_err(StoreError::InvalidQuery)?;

        let mut builder =
            QueryBuilder::<Sqlite>::new(format!("SELECT id, doc FROM {} WHERE ", T::TABLE));
        push_where(&mut builder, filter.where_clause.as_ref().unwrap_or(&Document::new()))?;
        push_order(&mut builder, &order)?;

        match (filter.limit, filter.skip) {
            (None, None) => {}
            (limit, skip) => {
                builder.push(" LIMIT ");
                builder.push_bind(limit.map_or(-1, clamp_i64));
                if let Some(skip) = skip {
                    builder.push(" OFFSET ");
                    builder.push_bind(clamp_i64(skip));
                }
            }
        }

        let rows: Vec<(i64, String)> = builder.build_query_as().fetch_all(&*self.db).await?;
        rows.into_iter()
            .map(|(id, doc)| decode::<T>(id, &doc))
            .collect()
    }

    /// First record matching `filter`.
    pub async fn find_one(&self, filter: &Filter) -> StoreResult<Option<Record<T>>> {
        let mut first = filter.clone();
        first.limit = Some(1);
        Ok(self.find(&first).await?.into_iter().next())
    }

    pub async fn find_by_id(&self, id: i64) -> StoreResult<Option<Record<T>>> {
        let sql = format!("SELECT id, doc FROM {} WHERE id = ?", T::TABLE);
        let row: Option<(i64, String)> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&*self.db)
            .await?;
        row.map(|(id, doc)| decode::<T>(id, &doc)).transpose()
    }

    /// Like [`find_by_id`](Self::find_by_id) but a missing record is an error.
    pub async fn get(&self, id: i64) -> StoreResult<Record<T>> {
        self.find_by_id(id)
            .await?
            .ok_or(StoreError::NotFound { model: T::NAME, id })
    }

    pub async fn count(&self, where_clause: Option<&Document>) -> StoreResult<u64> {
        let mut builder =
            QueryBuilder::<Sqlite>::new(format!("SELECT COUNT(*) FROM {} WHERE ", T::TABLE));
        push_where(&mut builder, where_clause.unwrap_or(&Document::new()))?;
        let count: i64 = builder.build_query_scalar().fetch_one(&*self.db).await?;
        Ok(count.max(0) as u64)
    }

    pub async fn exists(&self, id: i64) -> StoreResult<bool> {
        let sql = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?)", T::TABLE);
        let exists: i64 = sqlx::query_scalar(&sql)
            .bind(id)
            .fetch_one(&*self.db)
            .await?;
        Ok(exists != 0)
    }

    /// Merge `patch` over the stored record. Keys set to `null` clear
    /// optional fields; `id` in the patch is ignored.
    pub async fn update_attributes(&self, id: i64, patch: Document) -> StoreResult<Record<T>> {
        let sql = format!("SELECT doc FROM {} WHERE id = ?", T::TABLE);
        let stored: Option<String> = sqlx::query_scalar(&sql)
            .bind(id)
            .fetch_optional(&*self.db)
            .await?;
        let stored = stored.ok_or(StoreError::NotFound { model: T::NAME, id })?;

        let mut merged: Document = serde_json::from_str(&stored)?;
        for (key, value) in patch {
            if key != "id" {
                merged.insert(key, value);
            }
        }

        let (data, text) = prepare::<T>(merged, false)?;
        let sql = format!("UPDATE {} SET doc = ? WHERE id = ?", T::TABLE);
        let result = sqlx::query(&sql)
            .bind(&text)
            .bind(id)
            .execute(&*self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { model: T::NAME, id });
        }

        debug!("updated {} {}", T::NAME, id);
        Ok(Record { id, data })
    }

    /// Update when the document names an existing id, create otherwise.
    pub async fn upsert(&self, doc: Document) -> StoreResult<Record<T>> {
        match id_of::<T>(&doc)? {
            Some(id) if self.exists(id).await? => self.update_attributes(id, doc).await,
            _ => self.create(doc).await,
        }
    }

    /// Delete one record; returns how many rows went away (0 or 1).
    pub async fn delete_by_id(&self, id: i64) -> StoreResult<u64> {
        let sql = format!("DELETE FROM {} WHERE id = ?", T::TABLE);
        let result = sqlx::query(&sql).bind(id).execute(&*self.db).await?;
        Ok(result.rows_affected())
    }

    /// Delete every record matching `where_clause` (all when `None`).
    pub async fn destroy_all(&self, where_clause: Option<&Document>) -> StoreResult<u64> {
        let mut builder =
            QueryBuilder::<Sqlite>::new(format!("DELETE FROM {} WHERE ", T::TABLE));
        push_where(&mut builder, where_clause.unwrap_or(&Document::new()))?;
        let result = builder.build().execute(&*self.db).await?;
        debug!("destroyed {} {} record(s)", result.rows_affected(), T::NAME);
        Ok(result.rows_affected())
    }
}

/// Decode, hook and validate a document; returns the model and the JSON
/// text to store.
fn prepare<T: Model>(doc: Document, is_new: bool) -> StoreResult<(T, String)> {
    let mut data: T =
        serde_json::from_value(Value::Object(doc)).map_err(|err| StoreError::Validation {
            model: T::NAME,
            reason: err.to_string(),
        })?;
    data.before_save(is_new);
    data.validate().map_err(|reason| StoreError::Validation {
        model: T::NAME,
        reason,
    })?;
    let text = serde_json::to_string(&data)?;
    Ok((data, text))
}

fn decode<T: Model>(id: i64, doc: &str) -> StoreResult<Record<T>> {
    Ok(Record {
        id,
        data: serde_json::from_str(doc)?,
    })
}

fn take_id<T: Model>(doc: &mut Document) -> StoreResult<Option<i64>> {
    let id = id_of::<T>(doc)?;
    doc.remove("id");
    Ok(id)
}

/// Read an optional `id` key: an integer, a numeric string, or null.
fn id_of<T: Model>(doc: &Document) -> StoreResult<Option<i64>> {
    match doc.get("id") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) if n.is_i64() => Ok(n.as_i64()),
        Some(Value::String(s)) if s.parse::<i64>().is_ok() => Ok(s.parse().ok()),
        Some(other) => Err(StoreError::Validation {
            model: T::NAME,
            reason: format!("`id` must be an integer, got {}", other),
        }),
    }
}

fn clamp_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Return true if SQLx error indicates a unique constraint violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().to_ascii_lowercase().contains("unique")
    )
}

/// SQLite reports a primary key clash as `UNIQUE constraint failed: <table>.id`;
/// unique indexes on document fields name the index instead.
fn is_id_conflict<T: Model>(err: &sqlx::Error) -> bool {
    is_unique_violation(err)
        && matches!(
            err,
            sqlx::Error::Database(db_err) if db_err.message().contains(&format!("{}.id", T::TABLE))
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::widget::Widget;
    use crate::services::datasource;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    fn filter(value: Value) -> Filter {
        Filter::from_document(doc(value)).unwrap()
    }

    async fn store_with(widgets: &[Value]) -> ModelStore<Widget> {
        let store = ModelStore::<Widget>::new(datasource::memory().await);
        for w in widgets {
            store.create(doc(w.clone())).await.unwrap();
        }
        store
    }

    fn names(records: &[Record<Widget>]) -> Vec<&str> {
        records.iter().map(|r| r.data.name.as_str()).collect()
    }

    #[tokio::test]
    async fn create_assigns_increasing_ids_and_round_trips_data() {
        let store = store_with(&[]).await;
        let foo = store
            .create(doc(json!({"name": "Foo", "bars": 0, "data": {"quux": true}})))
            .await
            .unwrap();
        let bar = store.create(doc(json!({"name": "Bar", "bars": 1}))).await.unwrap();
        assert!(bar.id > foo.id);

        let loaded = store.get(foo.id).await.unwrap();
        assert_eq!(
            serde_json::to_value(&loaded).unwrap(),
            json!({"id": foo.id, "name": "Foo", "bars": 0, "data": {"quux": true}})
        );
    }

    #[tokio::test]
    async fn create_rejects_invalid_documents() {
        let store = store_with(&[]).await;
        for bad in [json!({"bars": 1}), json!({"name": "  "}), json!({"name": 5})] {
            let err = store.create(doc(bad)).await.unwrap_err();
            assert!(matches!(err, StoreError::Validation { model: "widget", .. }));
        }
        assert_eq!(store.count(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn explicit_ids_are_honoured_once() {
        let store = store_with(&[]).await;
        let rec = store.create(doc(json!({"id": 40, "name": "A"}))).await.unwrap();
        assert_eq!(rec.id, 40);
        let err = store.create(doc(json!({"id": "40", "name": "B"}))).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { id: 40, .. }));
    }

    #[tokio::test]
    async fn find_applies_where_order_limit_and_skip() {
        let store = store_with(&[
            json!({"name": "a", "bars": 3}),
            json!({"name": "b", "bars": 1}),
            json!({"name": "c", "bars": 2, "data": {"on": true}}),
            json!({"name": "d"}),
        ])
        .await;

        let all = store.find(&Filter::default()).await.unwrap();
        assert_eq!(names(&all), ["a", "b", "c", "d"]);

        let gt = store.find(&filter(json!({"where": {"bars": {"gte": 2}}}))).await.unwrap();
        assert_eq!(names(&gt), ["a", "c"]);

        let ordered = store
            .find(&filter(json!({"where": {"bars": {"neq": null}}, "order": "bars DESC"})))
            .await
            .unwrap();
        assert_eq!(names(&ordered), ["a", "c", "b"]);

        let page = store
            .find(&filter(json!({"order": "name DESC", "limit": 2, "skip": 1})))
            .await
            .unwrap();
        assert_eq!(names(&page), ["c", "b"]);

        let skipped = store.find(&filter(json!({"offset": 3}))).await.unwrap();
        assert_eq!(names(&skipped), ["d"]);

        let nested = store
            .find(&filter(json!({"where": {"data.on": true}})))
            .await
            .unwrap();
        assert_eq!(names(&nested), ["c"]);

        let either = store
            .find(&filter(json!({"where": {"or": [{"name": "a"}, {"bars": null}]}})))
            .await
            .unwrap();
        assert_eq!(names(&either), ["a", "d"]);

        let neq = store
            .find(&filter(json!({"where": {"bars": {"neq": 1}}})))
            .await
            .unwrap();
        assert_eq!(names(&neq), ["a", "c", "d"]);

        let listed = store
            .find(&filter(json!({"where": {"name": {"inq": ["b", "d", "zz"]}}})))
            .await
            .unwrap();
        assert_eq!(names(&listed), ["b", "d"]);
    }

    #[tokio::test]
    async fn find_one_count_and_exists() {
        let store = store_with(&[json!({"name": "Foo"}), json!({"name": "Bar", "bars": 1})]).await;

        let bar = store
            .find_one(&filter(json!({"where": {"name": "Bar"}})))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(bar.data.bars, Some(1.into()));
        assert!(store.find_one(&filter(json!({"where": {"name": "Baz"}}))).await.unwrap().is_none());

        assert_eq!(store.count(None).await.unwrap(), 2);
        assert_eq!(store.count(Some(&doc(json!({"name": "Foo"})))).await.unwrap(), 1);
        assert!(store.exists(bar.id).await.unwrap());
        assert!(!store.exists(999).await.unwrap());
    }

    #[tokio::test]
    async fn update_attributes_merges_and_validates() {
        let store = store_with(&[json!({"name": "Bar", "bars": 1})]).await;
        let id = store.find(&Filter::default()).await.unwrap()[0].id;

        let updated = store
            .update_attributes(id, doc(json!({"id": 99, "name": "Barfoo"})))
            .await
            .unwrap();
        assert_eq!(updated.id, id);
        assert_eq!(updated.data.name, "Barfoo");
        assert_eq!(updated.data.bars, Some(1.into()));

        let cleared = store.update_attributes(id, doc(json!({"bars": null}))).await.unwrap();
        assert_eq!(cleared.data.bars, None);

        let err = store
            .update_attributes(id, doc(json!({"name": null})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation { .. }));
        assert_eq!(store.get(id).await.unwrap().data.name, "Barfoo");

        let missing = store.update_attributes(404, Document::new()).await.unwrap_err();
        assert!(matches!(missing, StoreError::NotFound { id: 404, .. }));
    }

    #[tokio::test]
    async fn upsert_updates_existing_and_creates_new() {
        let store = store_with(&[json!({"name": "A"})]).await;
        let id = store.find(&Filter::default()).await.unwrap()[0].id;

        let updated = store.upsert(doc(json!({"id": id, "bars": 5}))).await.unwrap();
        assert_eq!((updated.id, updated.data.name.as_str()), (id, "A"));

        let created = store.upsert(doc(json!({"name": "B"}))).await.unwrap();
        assert_ne!(created.id, id);
        assert_eq!(store.count(None).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn delete_and_destroy_all() {
        let store = store_with(&[json!({"name": "a"}), json!({"name": "b"}), json!({"name": "c"})])
            .await;
        let first = store.find(&Filter::default()).await.unwrap()[0].id;

        assert_eq!(store.delete_by_id(first).await.unwrap(), 1);
        assert_eq!(store.delete_by_id(first).await.unwrap(), 0);
        assert_eq!(
            store.destroy_all(Some(&doc(json!({"name": "b"})))).await.unwrap(),
            1
        );
        assert_eq!(store.destroy_all(None).await.unwrap(), 1);
        assert_eq!(store.count(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn malformed_filters_are_query_errors() {
        let store = store_with(&[]).await;
        let err = store
            .find(&filter(json!({"where": {"name": {"regexp": "^a"}}})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidQuery(_)));
        let err = store.find(&filter(json!({"order": "name up"}))).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidQuery(_)));
    }
}
