use std::sync::Arc;

use location_core::testing::{RecordingLauncher, ScriptedLocationProvider, StubGeocoder};
use location_core::{
    AddOutcome, Coordinates, DeleteOutcome, EntryForm, Field, FormError, LoadOutcome,
    LocationStore, Services, SqliteLocationStore, ViewModel,
};

async fn sqlite_model(dir: &tempfile::TempDir) -> (ViewModel, Arc<SqliteLocationStore>) {
    let store = Arc::new(
        SqliteLocationStore::open(dir.path().join("locations.db"))
            .await
            .unwrap(),
    );
    let model = ViewModel::new(Services {
        store: store.clone(),
        locator: Arc::new(ScriptedLocationProvider::granted()),
        geocoder: Arc::new(StubGeocoder::unavailable()),
        launcher: Arc::new(RecordingLauncher::default()),
    });
    (model, store)
}

#[tokio::test]
async fn add_cafe_then_delete_against_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let (model, store) = sqlite_model(&dir).await;
    let mut changes = model.subscribe();

    // 1. Fill the form with comma decimals
    model.set_new_name("Cafe");
    model.set_new_latitude("-33,9248");
    model.set_new_longitude("18,4241");

    // 2. Add saves and reloads from the store
    let outcome = model.add_location().await;
    assert_eq!(outcome, AddOutcome::Added { name: "Cafe".into() });

    let state = model.snapshot();
    assert_eq!(state.saved_locations.len(), 1);
    let head = &state.saved_locations[0];
    assert_eq!(head.name, "Cafe");
    assert_eq!(head.coordinates, Coordinates::new(-33.9248, 18.4241));
    assert!(head.id.0 > 0);
    assert!(head.timestamp.0 > 0);
    assert_eq!(state.new_entry, EntryForm::default());
    assert_eq!(state.status_message.as_deref(), Some("Added 'Cafe' successfully."));

    // 3. The list mirrors the store
    assert_eq!(store.list_all().await.unwrap(), state.saved_locations);

    let mut seen = Vec::new();
    while let Ok(set) = changes.try_recv() {
        seen.extend_from_slice(set.fields());
    }
    assert!(seen.contains(&Field::SavedLocations));
    assert!(seen.contains(&Field::NewEntryName));
    assert!(seen.contains(&Field::StatusMessage));

    // 4. Delete removes it from both
    let record = state.saved_locations[0].clone();
    assert_eq!(model.delete_location(Some(&record)).await, DeleteOutcome::Deleted);
    assert!(model.snapshot().saved_locations.is_empty());
    assert!(store.list_all().await.unwrap().is_empty());
    assert_eq!(
        model.snapshot().status_message.as_deref(),
        Some("Deleted 'Cafe'.")
    );
}

#[tokio::test]
async fn newest_entry_heads_the_list_after_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let (model, _store) = sqlite_model(&dir).await;
        for (name, lat, lon) in [("Harbour", "-33.90", "18.42"), ("Beach", "-34.10", "18.47")] {
            model.set_new_name(name);
            model.set_new_latitude(lat);
            model.set_new_longitude(lon);
            assert!(matches!(model.add_location().await, AddOutcome::Added { .. }));
        }
    }

    // A fresh model over the same file starts empty until it loads
    let (model, _store) = sqlite_model(&dir).await;
    assert!(model.snapshot().saved_locations.is_empty());
    assert_eq!(model.load_locations().await, LoadOutcome::Loaded { count: 2 });

    let names: Vec<_> = model
        .snapshot()
        .saved_locations
        .iter()
        .map(|r| r.name.clone())
        .collect();
    assert_eq!(names, ["Beach", "Harbour"]);
}

#[tokio::test]
async fn invalid_entry_never_reaches_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let (model, store) = sqlite_model(&dir).await;

    model.set_new_name("   ");
    model.set_new_latitude("1");
    model.set_new_longitude("2");
    assert_eq!(
        model.add_location().await,
        AddOutcome::Rejected(FormError::MissingName)
    );

    model.set_new_name("Somewhere");
    model.set_new_longitude("east");
    assert_eq!(
        model.add_location().await,
        AddOutcome::Rejected(FormError::InvalidLongitudeFormat)
    );

    assert!(store.list_all().await.unwrap().is_empty());
    assert_eq!(model.snapshot().new_entry.name, "Somewhere");
}
