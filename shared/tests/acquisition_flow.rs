use std::sync::Arc;
use std::time::Duration;

use location_core::capabilities::{AzureMapsGeocoder, ReverseGeocoder};
use location_core::points::{CAPE_POINT, TABLE_MOUNTAIN};
use location_core::testing::{RecordingLauncher, ScriptedLocationProvider};
use location_core::{
    AcquireOutcome, AppConfig, Command, Coordinates, ErrorKind, GeocoderConfig,
    InMemoryLocationStore, PermissionStatus, ProviderError, RouteOutcome, Services, ViewModel,
};
use serde_json::json;
use wiremock::matchers::{method, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const HERE: Coordinates = Coordinates::new(-33.9249, 18.4241);

async fn geocoder_server(address: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("query", "-33.9249,18.4241"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "addresses": [{ "address": { "freeformAddress": address } }]
        })))
        .mount(&server)
        .await;
    server
}

fn model_with(
    provider: Arc<ScriptedLocationProvider>,
    geocoder: Arc<dyn ReverseGeocoder>,
    launcher: Arc<RecordingLauncher>,
) -> ViewModel {
    ViewModel::new(Services {
        store: Arc::new(InMemoryLocationStore::new()),
        locator: provider,
        geocoder,
        launcher,
    })
}

#[tokio::test]
async fn acquire_then_route_with_http_geocoder() {
    let server = geocoder_server("Adderley Street, Cape Town").await;
    let geocoder = AzureMapsGeocoder::new(&GeocoderConfig::new(
        format!("{}/search/address/reverse/json", server.uri()),
        "integration-key",
    ))
    .unwrap();
    let provider = Arc::new(ScriptedLocationProvider::granted().with_current(Ok(Some(HERE))));
    let launcher = Arc::new(RecordingLauncher::default());
    let model = model_with(provider.clone(), Arc::new(geocoder), launcher.clone());

    // 1. Nothing acquired yet
    assert_eq!(model.display_text(), "Tap 'My Location' to fetch.");
    assert!(model.can_execute(Command::AcquireLocation));

    // 2. Acquire resolves the address over HTTP
    let outcome = model.acquire_location().await;
    assert_eq!(
        outcome,
        AcquireOutcome::Acquired {
            coordinates: HERE,
            address: Some("Adderley Street, Cape Town".into()),
        }
    );
    assert_eq!(
        model.display_text(),
        "Adderley Street, Cape Town\n(-33.9249, 18.4241)"
    );

    // 3. Routing reuses the fix
    let uri = match model.route_to_point(&TABLE_MOUNTAIN).await {
        RouteOutcome::Launched(uri) => uri,
        other => panic!("expected launch, got {other:?}"),
    };
    assert_eq!(
        uri.as_str(),
        "https://www.google.com/maps/dir/?api=1&origin=-33.9249,18.4241&destination=-33.9648,18.4031&travelmode=driving"
    );
    assert_eq!(launcher.opened(), vec![uri]);
    assert_eq!(provider.current_calls(), 1);
}

#[tokio::test]
async fn geocoder_outage_does_not_fail_acquisition() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let geocoder = AzureMapsGeocoder::new(&GeocoderConfig::new(server.uri(), "k")).unwrap();
    let provider = Arc::new(ScriptedLocationProvider::granted().with_current(Ok(Some(HERE))));
    let model = model_with(provider, Arc::new(geocoder), Arc::new(RecordingLauncher::default()));

    let outcome = model.acquire_location().await;

    assert_eq!(
        outcome,
        AcquireOutcome::Acquired {
            coordinates: HERE,
            address: None,
        }
    );
    let state = model.snapshot();
    assert_eq!(state.status_message, None);
    assert_eq!(model.display_text(), "(-33.9249, 18.4241)");
}

#[tokio::test]
async fn denied_permission_blocks_routing() {
    let provider = Arc::new(
        ScriptedLocationProvider::new(PermissionStatus::NotDetermined, PermissionStatus::Denied)
            .with_current(Ok(Some(HERE))),
    );
    let launcher = Arc::new(RecordingLauncher::default());
    let model = model_with(
        provider.clone(),
        Arc::new(location_core::testing::StubGeocoder::unavailable()),
        launcher.clone(),
    );

    // 1. Acquisition asks once and gives up
    assert_eq!(
        model.acquire_location().await,
        AcquireOutcome::Failed(ErrorKind::LocationPermissionDenied)
    );
    assert_eq!(provider.permission_requests(), 1);
    assert!(!model.snapshot().is_busy);

    // 2. Routing tries again, then reports no origin
    assert_eq!(
        model.route_to_point(&CAPE_POINT).await,
        RouteOutcome::NoLocation
    );
    assert_eq!(
        model.display_text(),
        "Unable to determine current location."
    );
    assert!(launcher.opened().is_empty());
}

#[tokio::test(start_paused = true)]
async fn slow_fix_falls_back_to_cached_position() {
    let cached = Coordinates::new(-33.95, 18.45);
    let provider = Arc::new(
        ScriptedLocationProvider::granted()
            .with_current(Ok(Some(HERE)))
            .with_current_delay(Duration::from_secs(30))
            .with_last_known(Ok(Some(cached))),
    );
    let model = model_with(
        provider.clone(),
        Arc::new(location_core::testing::StubGeocoder::unavailable()),
        Arc::new(RecordingLauncher::default()),
    )
    .with_fix_timeout(Duration::from_secs(5));

    let outcome = model.acquire_location().await;

    assert!(matches!(
        outcome,
        AcquireOutcome::Acquired { coordinates, .. } if coordinates == cached
    ));
    assert_eq!(provider.last_known_calls(), 1);
    assert_eq!(model.snapshot().status_message, None);
}

#[tokio::test]
async fn disabled_services_without_cache_report_disabled() {
    let provider = Arc::new(
        ScriptedLocationProvider::granted().with_current(Err(ProviderError::FeatureNotEnabled)),
    );
    let model = model_with(
        provider,
        Arc::new(location_core::testing::StubGeocoder::unavailable()),
        Arc::new(RecordingLauncher::default()),
    );

    assert_eq!(
        model.acquire_location().await,
        AcquireOutcome::Failed(ErrorKind::LocationServicesDisabled)
    );
    assert_eq!(model.display_text(), "Location services disabled.");
}

#[tokio::test]
async fn from_config_wires_sqlite_and_http_geocoder() {
    let dir = tempfile::tempdir().unwrap();
    let server = geocoder_server("Long Street").await;
    let config = AppConfig {
        database_path: dir.path().join("configured.db"),
        location_timeout_secs: 3,
        geocoder: GeocoderConfig::new(server.uri(), "from-config"),
    };
    let provider = Arc::new(ScriptedLocationProvider::granted().with_current(Ok(Some(HERE))));

    let model = ViewModel::from_config(&config, provider, Arc::new(RecordingLauncher::default()))
        .await
        .unwrap();

    assert!(dir.path().join("configured.db").exists());
    assert!(matches!(
        model.acquire_location().await,
        AcquireOutcome::Acquired { address: Some(ref a), .. } if a == "Long Street"
    ));
}

#[tokio::test]
async fn from_config_without_key_acquires_without_address() {
    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig {
        database_path: dir.path().join("keyless.db"),
        ..AppConfig::default()
    };
    let provider = Arc::new(ScriptedLocationProvider::granted().with_current(Ok(Some(HERE))));

    let model = ViewModel::from_config(&config, provider, Arc::new(RecordingLauncher::default()))
        .await
        .unwrap();

    assert!(dir.path().join("keyless.db").exists());
    assert_eq!(
        model.acquire_location().await,
        AcquireOutcome::Acquired {
            coordinates: HERE,
            address: None,
        }
    );
    assert_eq!(model.display_text(), "(-33.9249, 18.4241)");
}
