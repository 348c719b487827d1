use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
    middleware,
    routing::any,
};
use metrics_util::debugging::DebuggingRecorder;
use rfpl::cache::{
    CacheConfig, CacheKey, CacheState, RequestIdentity, respond_first_layer,
};
use rfpl::infra::telemetry;
use tempfile::TempDir;
use tower::ServiceExt;

#[tokio::test]
async fn cache_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");
    telemetry::describe_metrics();

    let dir = TempDir::new().expect("tempdir");
    let state = CacheState::new(CacheConfig::at(dir.path())).expect("cache opens");
    let root = state.store.root().to_path_buf();

    // Back-dated entries for the stale paths.
    let stale = seed_stale(&root, "/stale");
    let broken = seed_stale(&root, "/broken");
    let blocked = broken.parent().unwrap().to_path_buf();

    let app = Router::new()
        .route(
            "/broken",
            any(move || {
                let blocked = blocked.clone();
                async move {
                    // Occupy the fan-out directory so the refresh write fails.
                    std::fs::remove_dir_all(&blocked).unwrap();
                    std::fs::write(&blocked, b"").unwrap();
                    (StatusCode::OK, "fresh body")
                }
            }),
        )
        .route("/{*path}", any(|| async { (StatusCode::OK, "fresh body") }))
        .layer(middleware::from_fn_with_state(state, respond_first_layer));

    // miss, fresh hit, stale hit, failed refresh, bypass
    for (method, uri) in [
        (Method::GET, "/page"),
        (Method::GET, "/page"),
        (Method::GET, "/stale"),
        (Method::GET, "/broken"),
        (Method::POST, "/page"),
    ] {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::HOST, "example.com")
            .body(Body::empty())
            .expect("request should build");
        let response = app
            .clone()
            .oneshot(request)
            .await
            .expect("router should respond");
        assert_eq!(response.status(), StatusCode::OK);
    }

    let metric_names = || -> HashSet<String> {
        snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
            .collect()
    };

    // Let both background refreshes finish.
    let mut names = metric_names();
    for _ in 0..200 {
        let refreshed = std::fs::read(&stale).unwrap() == b"fresh body";
        if refreshed && names.contains("rfpl_cache_store_error_total") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        names = metric_names();
    }

    let expected = [
        "rfpl_cache_hit_total",
        "rfpl_cache_miss_total",
        "rfpl_cache_store_total",
        "rfpl_cache_store_error_total",
        "rfpl_cache_bypass_total",
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}

fn seed_stale(root: &Path, path_and_query: &str) -> PathBuf {
    let key = CacheKey::derive(&RequestIdentity::new("example.com", path_and_query));
    let path = root.join(key.relative_path());
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, b"old").unwrap();
    std::fs::File::options()
        .write(true)
        .open(&path)
        .unwrap()
        .set_modified(SystemTime::now() - Duration::from_secs(3600))
        .unwrap();
    path
}
