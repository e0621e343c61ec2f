use spell_infer::hub::{default_cache_dir, Hub, DEFAULT_ENDPOINT};
use spell_infer::InferError;
use std::fs;
use std::path::PathBuf;

// Nothing listens on the discard port, so any request that slips through
// fails fast instead of reaching the real hub.
const OFFLINE: &str = "http://127.0.0.1:9";

fn scratch_cache(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("spell-hub-{}-{}", std::process::id(), tag));
    let _ = fs::remove_dir_all(&dir);
    dir
}

#[test]
fn test_repo_dir_layout() {
    let hub = Hub::new("/cache").with_revision("v2");
    assert_eq!(
        hub.repo_dir("aegrif/gpt2_spell_gen"),
        PathBuf::from("/cache/aegrif--gpt2_spell_gen/v2")
    );
}

#[test]
fn test_file_url() {
    let hub = Hub::new("/cache");
    assert_eq!(
        hub.file_url("aegrif/gpt2_spell_gen", "config.json"),
        format!("{}/aegrif/gpt2_spell_gen/resolve/main/config.json", DEFAULT_ENDPOINT)
    );

    let hub = Hub::new("/cache").with_endpoint("http://mirror.local/");
    assert_eq!(
        hub.file_url("a/b", "vocab.json"),
        "http://mirror.local/a/b/resolve/main/vocab.json"
    );
}

#[test]
fn test_default_cache_dir_is_namespaced() {
    assert!(default_cache_dir().ends_with("spellgen"));
}

#[tokio::test]
async fn test_fetch_reuses_cached_file() {
    let cache = scratch_cache("cached");
    let hub = Hub::new(&cache).with_endpoint(OFFLINE);
    let dir = hub.repo_dir("owner/model");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("config.json"), "{}").unwrap();

    let path = hub.fetch("owner/model", "config.json", true).await.unwrap();
    assert_eq!(path, Some(dir.join("config.json")));

    fs::remove_dir_all(&cache).ok();
}

#[tokio::test]
async fn test_snapshot_uses_fully_cached_repo() {
    let cache = scratch_cache("snapshot");
    let hub = Hub::new(&cache).with_endpoint(OFFLINE);
    let dir = hub.repo_dir("owner/model");
    fs::create_dir_all(&dir).unwrap();
    for file in ["config.json", "tokenizer.json", "model.safetensors"] {
        fs::write(dir.join(file), "x").unwrap();
    }

    assert_eq!(hub.snapshot("owner/model").await.unwrap(), dir);

    fs::remove_dir_all(&cache).ok();
}

#[tokio::test]
async fn test_fetch_unreachable_hub_is_download_error() {
    let cache = scratch_cache("offline");
    let hub = Hub::new(&cache).with_endpoint(OFFLINE);

    let err = hub.fetch("owner/model", "config.json", true).await.unwrap_err();
    assert!(matches!(err, InferError::Download(_)), "got {err}");
    assert!(err.is_resource_error());
    assert!(!hub.repo_dir("owner/model").join("config.json").exists());

    fs::remove_dir_all(&cache).ok();
}

#[tokio::test]
async fn test_snapshot_rejects_bad_repo_id() {
    let hub = Hub::new(scratch_cache("badid")).with_endpoint(OFFLINE);
    assert!(matches!(
        hub.snapshot("not-a-repo").await,
        Err(InferError::Config(_))
    ));
}
