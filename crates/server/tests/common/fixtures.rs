//! Test fixtures for provider releases and mock origins.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use bytes::Bytes;
use depot_core::{Platform, Provider, Sha256Digest};
use depot_storage::MirrorStorage;
use httpmock::Method::GET;
use httpmock::MockServer;
use serde_json::{Value, json};
use tower::ServiceExt;

use super::server::ORIGIN_HOST;

/// `registry.test/abbeylabs/abbey`
#[allow(dead_code)]
pub fn abbey() -> Provider {
    Provider::new(ORIGIN_HOST, "abbeylabs", "abbey")
}

/// Deterministic archive contents for a release file.
#[allow(dead_code)]
pub fn archive_bytes(file_name: &str) -> Bytes {
    Bytes::from(format!("zip contents of {file_name}"))
}

/// A SHA256SUMS body with the real digests of [`archive_bytes`].
#[allow(dead_code)]
pub fn manifest_of(provider: &Provider, platforms: &[Platform]) -> String {
    platforms
        .iter()
        .map(|p| {
            let file = provider
                .with_platform(&p.os, &p.arch)
                .archive_file_name()
                .unwrap();
            format!("{}  {file}\n", Sha256Digest::compute(&archive_bytes(&file)))
        })
        .collect()
}

/// Serve `version` of `abbey` on `platforms` from `server`: the version
/// listing, the per-platform download documents, the manifest and the
/// release files.
#[allow(dead_code)]
pub fn mock_release(server: &MockServer, version: &str, platforms: &[Platform]) {
    let provider = abbey().with_version(version);
    let listing: Vec<Value> = platforms
        .iter()
        .map(|p| json!({"os": p.os, "arch": p.arch}))
        .collect();

    server.mock(|when, then| {
        when.method(GET).path("/v1/providers/abbeylabs/abbey/versions");
        then.status(200).json_body(json!({
            "versions": [{"version": version, "protocols": ["5.0"], "platforms": listing}]
        }));
    });

    let manifest_name = provider.shasums_file_name().unwrap();
    let manifest = manifest_of(&provider, platforms);
    server.mock(|when, then| {
        when.method(GET).path(format!("/releases/{manifest_name}"));
        then.status(200).body(manifest.clone());
    });

    for p in platforms {
        let build = provider.with_platform(&p.os, &p.arch);
        let file = build.archive_file_name().unwrap();
        let digest = Sha256Digest::compute(&archive_bytes(&file));

        server.mock(|when, then| {
            when.method(GET).path(format!(
                "/v1/providers/abbeylabs/abbey/{version}/download/{}/{}",
                p.os, p.arch
            ));
            then.status(200).json_body(json!({
                "protocols": ["5.0"],
                "os": p.os,
                "arch": p.arch,
                "filename": file,
                "download_url": format!("/releases/{file}"),
                "shasums_url": format!("/releases/{manifest_name}"),
                "shasums_signature_url": "",
                "shasum": digest.to_hex(),
                "signing_keys": {"gpg_public_keys": [{
                    "key_id": "34365D9472D7468F",
                    "ascii_armor": "-----BEGIN PGP PUBLIC KEY BLOCK-----"
                }]}
            }));
        });

        let bytes = archive_bytes(&file);
        server.mock(|when, then| {
            when.method(GET).path(format!("/releases/{file}"));
            then.status(200).body(bytes.to_vec());
        });
    }
}

/// Mirror `version` of `abbey` on `platforms`, the way a finished copy
/// leaves it.
#[allow(dead_code)]
pub async fn seed_mirror(storage: &dyn MirrorStorage, version: &str, platforms: &[Platform]) {
    let provider = abbey().with_version(version);
    storage
        .upload_mirrored_file(
            &provider,
            &provider.shasums_file_name().unwrap(),
            Bytes::from(manifest_of(&provider, platforms)),
        )
        .await
        .unwrap();
    for p in platforms {
        let build = provider.with_platform(&p.os, &p.arch);
        let file = build.archive_file_name().unwrap();
        storage
            .upload_mirrored_file(&build, &file, archive_bytes(&file))
            .await
            .unwrap();
    }
}

/// A base URL nothing listens on.
#[allow(dead_code)]
pub fn unreachable_origin() -> String {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    format!("http://127.0.0.1:{port}/v1/providers/")
}

/// Response of a GET request, with the body kept raw.
#[allow(dead_code)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Bytes,
}

#[allow(dead_code)]
impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Send a GET request through the router.
#[allow(dead_code)]
pub async fn get(router: &axum::Router, uri: &str) -> TestResponse {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();

    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    TestResponse {
        status,
        headers,
        body,
    }
}
