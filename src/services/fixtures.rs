//! Startup data for the Memory datasource.

use crate::models::{document::Document, widget::Widget};
use crate::services::memory_store::{ModelStore, Record, StoreResult};
use serde_json::json;
use tracing::info;

/// Replace every widget with the two known fixtures, `Foo` then `Bar`.
pub async fn seed_widgets(widgets: &ModelStore<Widget>) -> StoreResult<Vec<Record<Widget>>> {
    let removed = widgets.destroy_all(None).await?;

    let mut seeded = Vec::with_capacity(2);
    for fixture in [
        json!({"name": "Foo", "bars": 0, "data": {"quux": true}}),
        json!({"name": "Bar", "bars": 1}),
    ] {
        let doc: Document = fixture.as_object().cloned().unwrap_or_default();
        seeded.push(widgets.create(doc).await?);
    }

    info!("seeded {} widgets (removed {})", seeded.len(), removed);
    Ok(seeded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::filter::Filter;
    use crate::services::datasource;

    #[tokio::test]
    async fn seeding_replaces_existing_widgets() {
        let widgets = ModelStore::<Widget>::new(datasource::memory().await);
        widgets
            .create(json!({"name": "Stale"}).as_object().cloned().unwrap())
            .await
            .unwrap();

        seed_widgets(&widgets).await.unwrap();
        let all = widgets.find(&Filter::default()).await.unwrap();
        let names: Vec<_> = all.iter().map(|w| w.data.name.as_str()).collect();
        assert_eq!(names, ["Foo", "Bar"]);

        let foo = serde_json::to_value(&all[0]).unwrap();
        assert_eq!(foo["bars"], 0);
        assert_eq!(foo["data"]["quux"], true);
        assert!(serde_json::to_value(&all[1]).unwrap().get("data").is_none());
    }

    #[tokio::test]
    async fn fresh_datastore_gets_ids_one_and_two() {
        let widgets = ModelStore::<Widget>::new(datasource::memory().await);
        let seeded = seed_widgets(&widgets).await.unwrap();
        assert_eq!(seeded.iter().map(|w| w.id).collect::<Vec<_>>(), [1, 2]);
    }
}
