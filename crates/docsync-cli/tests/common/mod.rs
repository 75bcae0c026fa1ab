#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use assert_cmd::Command;
use base64::{Engine, engine::general_purpose::STANDARD};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[allow(dead_code)]
pub const CMD_TIMEOUT: Duration = Duration::from_secs(15);

/// Empty config file so a developer's own config never leaks into tests.
fn empty_config() -> &'static Path {
    static CONFIG: OnceLock<(TempDir, PathBuf)> = OnceLock::new();
    let (_, path) = CONFIG.get_or_init(|| {
        let dir = tempfile::tempdir().expect("failed to create config dir for tests");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "").expect("failed to write test config");
        (dir, path)
    });
    path
}

/// Create a configured `docsync` command suitable for integration tests.
#[allow(dead_code)]
pub fn docsync_cmd() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("docsync"));
    cmd.timeout(CMD_TIMEOUT);
    cmd.env("DOCSYNC_CONFIG", empty_config());
    cmd.env_remove("DOCSYNC_CACHE_DIR");
    cmd.env_remove("DOCSYNC_API_URL");
    cmd.env_remove("DOCSYNC_GITHUB_TOKEN");
    cmd.env_remove("GITHUB_TOKEN");
    cmd.env_remove("DOCSYNC_OUTPUT_FORMAT");
    cmd.env("NO_COLOR", "1");
    cmd
}

/// Serve `body` as `owner/repo/<file>` at ref `main` through the contents API.
#[allow(dead_code)]
pub async fn mount_file(server: &MockServer, file: &str, body: &str, sha: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/api/v3/repos/bem/bem-method/contents/{file}")))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("etag", format!("\"{sha}-etag\""))
                .set_body_json(json!({
                    "type": "file",
                    "sha": sha,
                    "size": body.len(),
                    "encoding": "base64",
                    "content": STANDARD.encode(body),
                })),
        )
        .mount(server)
        .await;
}

/// Browser URL of a file served by [`mount_file`].
#[allow(dead_code)]
pub fn source_url(server: &MockServer, file: &str) -> String {
    format!("{}/bem/bem-method/tree/main/{file}", server.uri())
}
