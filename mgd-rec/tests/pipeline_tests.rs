//! End-to-end tests of the recommendation pipeline over an in-memory catalog

mod helpers;

use helpers::{
    generate_wav_bytes, seed_entries, synthetic_entry, CountingObserver, SlowScanCatalog,
    ToneConfig,
};
use mgd_rec::audio::ContainerFormat;
use mgd_rec::features::FEATURE_DIM;
use mgd_rec::{
    Catalog, ContentFingerprinter, MemoryCatalog, PipelineConfig, RecommendError,
    RecommendRequest, RecommendationPipeline, StoredEntry, TrackMetadata,
};
use std::sync::Arc;
use std::time::Duration;

fn pipeline_with(catalog: Arc<MemoryCatalog>) -> (RecommendationPipeline, Arc<CountingObserver>) {
    let observer = Arc::new(CountingObserver::default());
    let pipeline = RecommendationPipeline::new(catalog).with_observer(observer.clone());
    (pipeline, observer)
}

fn tone_bytes(frequency: f64) -> Vec<u8> {
    generate_wav_bytes(&ToneConfig::tone(frequency)).unwrap()
}

fn request(bytes: &[u8], title: &str) -> RecommendRequest {
    RecommendRequest::new(bytes.to_vec()).with_metadata(TrackMetadata::new(title, "Tester"))
}

#[tokio::test]
async fn test_first_upload_to_empty_catalog() {
    let catalog = Arc::new(MemoryCatalog::new());
    let (pipeline, observer) = pipeline_with(catalog.clone());

    let results = pipeline.recommend(request(&tone_bytes(440.0), "A440")).await.unwrap();

    // Nothing else to recommend, but the upload is catalogued
    assert!(results.is_empty());
    assert_eq!(catalog.len().await, 1);
    assert_eq!(observer.extractions(), 1);
    assert_eq!(observer.stores(), 1);
    assert_eq!(observer.cache_misses(), 1);
}

#[tokio::test]
async fn test_duplicate_upload_reuses_stored_features() {
    let catalog = Arc::new(MemoryCatalog::new());
    seed_entries(catalog.as_ref(), 5).await;
    let (pipeline, observer) = pipeline_with(catalog.clone());
    let bytes = tone_bytes(330.0);

    let first = pipeline.recommend(request(&bytes, "E330")).await.unwrap();
    let second = pipeline.recommend(request(&bytes, "E330")).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.len(), 5);
    assert_eq!(observer.extractions(), 1, "second call must not re-extract");
    assert_eq!(observer.cache_hits(), 1);
    assert_eq!(catalog.len().await, 6);
}

#[tokio::test]
async fn test_query_never_recommends_itself() {
    let catalog = Arc::new(MemoryCatalog::new());
    let (pipeline, _) = pipeline_with(catalog.clone());

    for (frequency, title) in [(220.0, "A220"), (440.0, "A440"), (880.0, "A880")] {
        pipeline
            .recommend(request(&tone_bytes(frequency), title))
            .await
            .unwrap();
    }

    let results = pipeline
        .recommend(request(&tone_bytes(440.0), "A440"))
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.title != "A440"));
}

#[tokio::test]
async fn test_results_limited_to_k_and_sorted() {
    let catalog = Arc::new(MemoryCatalog::new());
    seed_entries(catalog.as_ref(), 15).await;
    let (pipeline, _) = pipeline_with(catalog.clone());
    let bytes = tone_bytes(523.25);

    let top5 = pipeline.recommend(request(&bytes, "C5").with_k(5)).await.unwrap();
    assert_eq!(top5.len(), 5);
    assert!(top5.windows(2).all(|w| w[0].score >= w[1].score));
    assert!(top5.iter().all(|r| (-1.0 - 1e-9..=1.0 + 1e-9).contains(&r.score)));

    let default_k = pipeline.recommend(request(&bytes, "C5")).await.unwrap();
    assert_eq!(default_k.len(), 10);
    assert_eq!(&default_k[..5], &top5[..]);

    let none = pipeline.recommend(request(&bytes, "C5").with_k(0)).await.unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_chunk_size_does_not_change_recommendations() {
    let catalog = Arc::new(MemoryCatalog::new());
    seed_entries(catalog.as_ref(), 30).await;
    let bytes = tone_bytes(392.0);

    let mut outputs = Vec::new();
    for chunk_size in [1, 20, 31] {
        let pipeline = RecommendationPipeline::new(catalog.clone()).with_config(PipelineConfig {
            chunk_size,
            default_k: 10,
            ..Default::default()
        });
        outputs.push(pipeline.recommend(request(&bytes, "G4")).await.unwrap());
    }

    assert_eq!(outputs[0].len(), 10);
    assert_eq!(outputs[0], outputs[1]);
    assert_eq!(outputs[1], outputs[2]);
}

#[tokio::test]
async fn test_corrupt_entry_is_skipped_with_one_warning() {
    let catalog = Arc::new(MemoryCatalog::new());
    seed_entries(catalog.as_ref(), 4).await;
    catalog
        .insert_raw(StoredEntry {
            fingerprint: ContentFingerprinter::fingerprint(b"corrupt"),
            metadata: TrackMetadata::new("Broken", "Nobody"),
            features: vec![0.5; FEATURE_DIM + 1],
            created_at: None,
        })
        .await;
    let (pipeline, observer) = pipeline_with(catalog.clone());

    let results = pipeline
        .recommend(request(&tone_bytes(440.0), "A440"))
        .await
        .unwrap();

    assert_eq!(results.len(), 4);
    assert!(results.iter().all(|r| r.title != "Broken"));
    assert_eq!(observer.corrupt_skipped(), 1);
}

#[tokio::test]
async fn test_corrupt_cached_entry_is_re_extracted_not_overwritten() {
    let catalog = Arc::new(MemoryCatalog::new());
    seed_entries(catalog.as_ref(), 3).await;
    let bytes = tone_bytes(440.0);
    catalog
        .insert_raw(StoredEntry {
            fingerprint: ContentFingerprinter::fingerprint(&bytes),
            metadata: TrackMetadata::new("Stale", "Nobody"),
            features: vec![1.0; 7],
            created_at: None,
        })
        .await;
    let (pipeline, observer) = pipeline_with(catalog.clone());

    let results = pipeline.recommend(request(&bytes, "A440")).await.unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(observer.cache_hits(), 1);
    assert_eq!(observer.extractions(), 1);
    assert_eq!(observer.stores(), 0);
    assert_eq!(observer.corrupt_skipped(), 1);
    assert_eq!(catalog.len().await, 4);
}

#[tokio::test]
async fn test_unsupported_format_is_rejected_before_cataloguing() {
    let catalog = Arc::new(MemoryCatalog::new());
    let (pipeline, observer) = pipeline_with(catalog.clone());

    let png = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
    let err = pipeline.recommend(RecommendRequest::new(png)).await.unwrap_err();

    assert!(matches!(err, RecommendError::UnsupportedFormat(_)));
    assert!(catalog.is_empty().await);
    assert_eq!(observer.extractions(), 0);
}

#[tokio::test]
async fn test_declared_format_does_not_override_non_audio_bytes() {
    let catalog = Arc::new(MemoryCatalog::new());
    let (pipeline, observer) = pipeline_with(catalog.clone());

    let mut png = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    png.extend_from_slice(&[0u8; 32]);
    let err = pipeline
        .recommend(RecommendRequest::new(png).with_declared_format(ContainerFormat::Mp3))
        .await
        .unwrap_err();

    match err {
        RecommendError::UnsupportedFormat(msg) => assert!(msg.contains("image/png"), "{}", msg),
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(catalog.is_empty().await);
    assert_eq!(observer.extractions(), 0);
}

#[tokio::test]
async fn test_silent_upload_fails_extraction() {
    let catalog = Arc::new(MemoryCatalog::new());
    let (pipeline, _) = pipeline_with(catalog.clone());

    let bytes = generate_wav_bytes(&ToneConfig::silent()).unwrap();
    let err = pipeline.recommend(RecommendRequest::new(bytes)).await.unwrap_err();

    assert!(matches!(err, RecommendError::FeatureExtraction(_)));
    assert!(catalog.is_empty().await);
}

#[tokio::test]
async fn test_unavailable_catalog_is_transient_error() {
    let catalog = Arc::new(MemoryCatalog::new());
    catalog.set_unavailable(true);
    let (pipeline, _) = pipeline_with(catalog.clone());

    let err = pipeline
        .recommend(RecommendRequest::new(tone_bytes(440.0)))
        .await
        .unwrap_err();

    assert!(matches!(err, RecommendError::CatalogUnavailable(_)));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_slow_catalog_times_out() {
    let catalog = Arc::new(MemoryCatalog::new());
    catalog.set_latency(Some(Duration::from_millis(500))).await;
    let pipeline = RecommendationPipeline::new(catalog.clone()).with_config(PipelineConfig {
        catalog_timeout: Duration::from_millis(25),
        ..Default::default()
    });

    let err = pipeline
        .recommend(RecommendRequest::new(tone_bytes(440.0)))
        .await
        .unwrap_err();

    assert!(err.is_transient(), "unexpected error: {}", err);
    assert_eq!(
        err.to_string(),
        "Catalog unavailable: catalog lookup timed out after 25 ms"
    );
}

#[tokio::test]
async fn test_slow_but_live_scan_is_not_cut_off() {
    let inner = MemoryCatalog::new();
    seed_entries(&inner, 20).await;
    let catalog = Arc::new(SlowScanCatalog::new(inner, Duration::from_millis(20)));
    let pipeline = RecommendationPipeline::new(catalog.clone()).with_config(PipelineConfig {
        catalog_timeout: Duration::from_millis(100),
        ..Default::default()
    });
    let bytes = tone_bytes(440.0);

    // The whole scan takes far longer than the timeout; no single row does
    for _ in 0..2 {
        let results = pipeline.recommend(request(&bytes, "A440")).await.unwrap();
        assert_eq!(results.len(), 10);
    }
    assert_eq!(catalog.inner().len().await, 21);
}

#[tokio::test]
async fn test_missing_metadata_defaults_to_unknown() {
    let catalog = Arc::new(MemoryCatalog::new());
    let (pipeline, _) = pipeline_with(catalog.clone());
    let bytes = tone_bytes(440.0);

    pipeline.recommend(RecommendRequest::new(bytes.clone())).await.unwrap();

    let stored = catalog
        .find_by_fingerprint(&ContentFingerprinter::fingerprint(&bytes))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.metadata, TrackMetadata::default());
    assert_eq!(stored.features.len(), FEATURE_DIM);
}

#[tokio::test]
async fn test_nearest_tone_ranks_first() {
    let catalog = Arc::new(MemoryCatalog::new());
    let (pipeline, _) = pipeline_with(catalog.clone());

    for (frequency, title) in [(440.0, "A440"), (3520.0, "A3520"), (110.0, "A110")] {
        pipeline
            .recommend(request(&tone_bytes(frequency), title))
            .await
            .unwrap();
    }

    // A slightly detuned A4 sits closest to the catalogued A4
    let results = pipeline
        .recommend(request(&tone_bytes(445.0), "A445"))
        .await
        .unwrap();
    assert_eq!(results[0].title, "A440");
}

#[tokio::test]
async fn test_concurrent_duplicate_uploads_store_once() {
    let catalog = Arc::new(MemoryCatalog::new());
    catalog.insert(&synthetic_entry("seed", 1)).await.unwrap();
    let pipeline = Arc::new(RecommendationPipeline::new(catalog.clone()));
    let bytes = tone_bytes(440.0);

    let (a, b) = tokio::join!(
        pipeline.recommend(request(&bytes, "A440")),
        pipeline.recommend(request(&bytes, "A440"))
    );

    assert_eq!(a.unwrap(), b.unwrap());
    assert_eq!(catalog.len().await, 2);
}
