//! End-to-end tests through the studio and the loader factory.

use cantor_abstraction::AudioClip;
use cantor_models::audio;
use cantor_models::{
    CacheConfig, CustomVoiceJob, ExpressiveJob, Job, LoaderFactory, ModelFamily, NarrationJob,
    SlotCache, Studio, VoiceDesignJob,
};
use std::sync::Arc;
use tempfile::TempDir;

fn studio_in(dir: &TempDir, model_dir: Option<std::path::PathBuf>) -> Studio {
    let loader = LoaderFactory::create_from_str("mock", model_dir).unwrap();
    let cache = SlotCache::new(CacheConfig::default(), loader).unwrap();
    Studio::new(Arc::new(cache), dir.path().join("out"))
}

#[tokio::test]
async fn test_written_file_matches_reported_metadata() {
    let dir = TempDir::new().unwrap();
    let studio = studio_in(&dir, None);

    let out = studio
        .custom_voice(CustomVoiceJob {
            text: "The quick brown fox.".to_string(),
            speaker: "Vivian".to_string(),
            language: "Auto".to_string(),
            instruct: Some("Cheerful".to_string()),
            size: "1.7B".to_string(),
        })
        .await
        .unwrap();

    let clip = audio::read_wav(&out.path).unwrap();
    assert_eq!(clip.sample_rate, out.sample_rate);
    assert!((clip.duration().as_secs_f64() - out.duration_secs).abs() < 1e-3);
    assert!(out.path.file_name().unwrap().to_string_lossy().starts_with("custom_voice_"));
}

#[tokio::test]
async fn test_switching_between_families_via_jobs() {
    let dir = TempDir::new().unwrap();
    let studio = studio_in(&dir, None);
    let jobs = vec![
        Job::Design(VoiceDesignJob {
            text: "Hello.".to_string(),
            description: "Deep, slow narrator".to_string(),
            language: "English".to_string(),
        }),
        Job::Expressive(ExpressiveJob {
            text: "That was funny [laugh].".to_string(),
            model: ModelFamily::Turbo,
            reference: None,
            language: None,
            parameters: Default::default(),
        }),
        Job::Narrate(NarrationJob {
            text: "First. Second! Third?".to_string(),
            reference: None,
            parameters: Default::default(),
            min_chars: 3,
            max_chars: None,
        }),
    ];

    let mut keys = Vec::new();
    for job in jobs {
        let out = studio.run(job).await.unwrap();
        let resident = studio.resident_keys().await;
        assert_eq!(resident.len(), 1);
        assert!(resident.contains(&out.key));
        keys.push(out.key.to_string());
    }

    assert_eq!(keys, vec!["VoiceDesign_1.7B", "Turbo_350M", "Standard_500M"]);
    assert_eq!(studio.stats().await.total_evictions, 2);
}

#[tokio::test]
async fn test_missing_snapshot_is_a_load_error() {
    let dir = TempDir::new().unwrap();
    let models = dir.path().join("models");
    std::fs::create_dir_all(models.join("chatterbox-turbo")).unwrap();
    let studio = studio_in(&dir, Some(models));

    let turbo = ExpressiveJob {
        text: "Hi there.".to_string(),
        model: ModelFamily::Turbo,
        reference: None,
        language: None,
        parameters: Default::default(),
    };
    assert!(studio.expressive(turbo).await.is_ok());

    let standard = ExpressiveJob {
        text: "Hi there.".to_string(),
        model: ModelFamily::Standard,
        reference: None,
        language: None,
        parameters: Default::default(),
    };
    let err = studio.expressive(standard).await.unwrap_err();
    assert_eq!(err.kind(), "model_load");
    assert!(err.to_string().contains("ResembleAI/chatterbox"));
}

#[tokio::test]
async fn test_narration_with_reference_voice() {
    let dir = TempDir::new().unwrap();
    let studio = studio_in(&dir, None);
    let reference = dir.path().join("voice.wav");
    audio::write_wav(&reference, &AudioClip::new(vec![0.25; 4800], 48_000)).unwrap();

    let story = "It was late.\nThe rain kept falling, and nobody came home. ... Then, a knock!";
    let out = studio
        .narrate(
            NarrationJob {
                text: story.to_string(),
                reference: Some(reference),
                parameters: Default::default(),
                min_chars: 3,
                max_chars: Some(20),
            },
            |_| {},
        )
        .await
        .unwrap();

    assert!(out.segments >= 4);
    assert!(out.path.exists());
}
