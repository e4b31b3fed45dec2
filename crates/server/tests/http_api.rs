//! HTTP API integration tests.
//!
//! Each test boots the full router on an ephemeral port and talks to it
//! with reqwest:
//! - Session gate and account flow
//! - Upload, list, preview, delete
//! - Duplicate check and paste conflict protocol
//! - Downloads and settings

use std::fs;
use std::io::Cursor;
use std::path::PathBuf;

use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE, COOKIE, SET_COOKIE};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use server::config::Config;
use tempfile::TempDir;

struct TestApp {
    base: String,
    client: Client,
    root: PathBuf,
    temp_dir: TempDir,
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn register(&self, username: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/register"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .unwrap()
    }

    async fn login(&self, username: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/login"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .unwrap()
    }

    /// Register the admin account and return a session cookie.
    async fn signed_in(&self) -> String {
        assert_eq!(
            self.register("admin", "secret1").await.status(),
            StatusCode::CREATED
        );
        let response = self.login("admin", "secret1").await;
        assert_eq!(response.status(), StatusCode::OK);
        session_cookie(&response)
    }

    async fn get(&self, cookie: &str, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .header(COOKIE, cookie)
            .send()
            .await
            .unwrap()
    }

    async fn post(&self, cookie: &str, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .header(COOKIE, cookie)
            .json(&body)
            .send()
            .await
            .unwrap()
    }
}

fn session_cookie(response: &reqwest::Response) -> String {
    let header = response
        .headers()
        .get(SET_COOKIE)
        .expect("login sets a cookie")
        .to_str()
        .unwrap();
    header.split(';').next().unwrap().to_string()
}

async fn spawn_app() -> TestApp {
    spawn_app_with(|_| {}).await
}

async fn spawn_app_with(adjust: impl FnOnce(&mut server::AppState)) -> TestApp {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("root");
    fs::create_dir_all(&root).unwrap();

    let mut config = Config::default();
    config.files.root_path = root.clone();
    config.files.max_upload_size = 1024;
    config.archive.scratch_dir = temp_dir.path().join("scratch");

    let mut state =
        server::build_state(&config, Some(temp_dir.path().join("config.toml"))).unwrap();
    adjust(&mut state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, server::router(state)).await.unwrap();
    });

    TestApp {
        base: format!("http://{addr}"),
        client: Client::new(),
        root,
        temp_dir,
    }
}

// =============================================================================
// Session gate
// =============================================================================

#[tokio::test]
async fn test_api_requires_session() {
    let app = spawn_app().await;

    let health = app.client.get(app.url("/health")).send().await.unwrap();
    assert_eq!(health.status(), StatusCode::OK);

    let response = app.client.get(app.url("/api/files")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let forged = app.get("filedeck_session=deadbeef", "/api/files").await;
    assert_eq!(forged.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_login_logout() {
    let app = spawn_app().await;

    assert_eq!(
        app.login("admin", "secret1").await.status(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        app.register("admin", "123").await.status(),
        StatusCode::BAD_REQUEST
    );

    let cookie = app.signed_in().await;
    assert_eq!(
        app.register("intruder", "secret2").await.status(),
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        app.login("admin", "wrong-password").await.status(),
        StatusCode::UNAUTHORIZED
    );

    let me: Value = app.get(&cookie, "/api/session").await.json().await.unwrap();
    assert_eq!(me["username"], "admin");

    let logout = app
        .client
        .post(app.url("/logout"))
        .header(COOKIE, &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(logout.status(), StatusCode::OK);
    assert_eq!(
        app.get(&cookie, "/api/files").await.status(),
        StatusCode::UNAUTHORIZED
    );
}

// =============================================================================
// Files
// =============================================================================

#[tokio::test]
async fn test_upload_list_preview_delete() {
    let app = spawn_app().await;
    let cookie = app.signed_in().await;

    let form = Form::new()
        .text("path", "docs")
        .part("files", Part::bytes(b"hello".to_vec()).file_name("notes.txt"))
        .part("files", Part::bytes("привет".as_bytes().to_vec()).file_name("заметки.md"));
    let response = app
        .client
        .post(app.url("/api/files/upload"))
        .header(COOKIE, &cookie)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["uploaded"], json!(["notes.txt", "заметки.md"]));

    let entries: Value = app
        .get(&cookie, "/api/files?path=docs")
        .await
        .json()
        .await
        .unwrap();
    let names: Vec<_> = entries
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["notes.txt", "заметки.md"]);
    assert_eq!(entries[0]["path"], "docs/notes.txt");
    assert_eq!(entries[0]["previewable"], true);

    let preview: Value = app
        .get(&cookie, "/api/files/preview?path=docs/notes.txt")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(preview["content"], "hello");

    let deleted = app
        .post(&cookie, "/api/files/delete", json!({ "paths": ["docs/notes.txt"] }))
        .await;
    assert_eq!(deleted.status(), StatusCode::OK);
    assert!(!app.root.join("docs/notes.txt").exists());
}

#[tokio::test]
async fn test_partial_failures_are_206() {
    let app = spawn_app().await;
    let cookie = app.signed_in().await;
    fs::write(app.root.join("real.txt"), "r").unwrap();

    let response = app
        .post(
            &cookie,
            "/api/files/delete",
            json!({ "paths": ["real.txt", "ghost.txt"] }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["deleted"], json!(["real.txt"]));
    assert_eq!(body["failed"], json!(["ghost.txt"]));

    let form = Form::new()
        .text("path", "")
        .part("files", Part::bytes(vec![0u8; 2048]).file_name("big.bin"))
        .part("files", Part::bytes(b"ok".to_vec()).file_name("small.txt"));
    let upload = app
        .client
        .post(app.url("/api/files/upload"))
        .header(COOKIE, &cookie)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(upload.status(), StatusCode::PARTIAL_CONTENT);
    let body: Value = upload.json().await.unwrap();
    assert_eq!(body["uploaded"], json!(["small.txt"]));
    assert_eq!(body["failed"], json!(["big.bin"]));
}

#[tokio::test]
async fn test_oversized_upload_body_is_413() {
    let app = spawn_app_with(|state| state.upload_body_limit = 256).await;
    let cookie = app.signed_in().await;

    let form = Form::new()
        .text("path", "")
        .part("files", Part::bytes(vec![b'a'; 200]).file_name("one.txt"))
        .part("files", Part::bytes(vec![b'b'; 200]).file_name("two.txt"));
    let response = app
        .client
        .post(app.url("/api/files/upload"))
        .header(COOKIE, &cookie)
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(!app.root.join("one.txt").exists());
}

#[tokio::test]
async fn test_bad_input_is_400() {
    let app = spawn_app().await;
    let cookie = app.signed_in().await;

    let escape = app.get(&cookie, "/api/files?path=../../etc").await;
    assert_eq!(escape.status(), StatusCode::BAD_REQUEST);
    let body: Value = escape.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("invalid path"));

    let empty = app.post(&cookie, "/api/files/delete", json!({ "paths": [] })).await;
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

    fs::write(app.root.join("a.txt"), "a").unwrap();
    let no_operation = app
        .post(
            &cookie,
            "/api/files/paste",
            json!({ "targetPath": "", "files": [{ "path": "a.txt" }] }),
        )
        .await;
    assert_eq!(no_operation.status(), StatusCode::BAD_REQUEST);

    let missing = app.get(&cookie, "/api/files?path=nowhere").await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_paste_conflict_protocol() {
    let app = spawn_app().await;
    let cookie = app.signed_in().await;
    fs::create_dir_all(app.root.join("target")).unwrap();
    fs::write(app.root.join("a.txt"), "new").unwrap();
    fs::write(app.root.join("target/a.txt"), "old").unwrap();

    let files = json!([{ "name": "a.txt", "path": "a.txt", "isDirectory": false }]);

    let check = app
        .post(
            &cookie,
            "/api/files/check_duplicates",
            json!({ "targetPath": "target", "files": files }),
        )
        .await;
    assert_eq!(check.status(), StatusCode::CONFLICT);
    let body: Value = check.json().await.unwrap();
    assert_eq!(body["duplicate_files"], json!(["a.txt"]));

    let halted = app
        .post(
            &cookie,
            "/api/files/paste",
            json!({ "targetPath": "target", "files": files, "operation": "copy" }),
        )
        .await;
    assert_eq!(halted.status(), StatusCode::CONFLICT);
    assert_eq!(
        fs::read_to_string(app.root.join("target/a.txt")).unwrap(),
        "old"
    );

    let renamed = app
        .post(
            &cookie,
            "/api/files/paste",
            json!({
                "targetPath": "target",
                "files": files,
                "operation": "copy",
                "fileAction": "rename",
            }),
        )
        .await;
    assert_eq!(renamed.status(), StatusCode::OK);
    let body: Value = renamed.json().await.unwrap();
    assert_eq!(body["pasted"], json!(["a(1).txt"]));

    let clear = app
        .post(
            &cookie,
            "/api/files/check_duplicates",
            json!({ "targetPath": "target", "files": [{ "path": "other.txt" }] }),
        )
        .await;
    assert_eq!(clear.status(), StatusCode::OK);
}

// =============================================================================
// Downloads
// =============================================================================

#[tokio::test]
async fn test_download_headers() {
    let app = spawn_app().await;
    let cookie = app.signed_in().await;
    fs::create_dir_all(app.root.join("photos")).unwrap();
    fs::write(app.root.join("photos/cat.jpg"), "meow").unwrap();
    fs::write(app.root.join("readme.txt"), "read me").unwrap();

    let file = app.get(&cookie, "/api/files/download?path=readme.txt").await;
    assert_eq!(file.status(), StatusCode::OK);
    assert!(file.headers()[CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
    assert!(file.headers()[CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .starts_with("attachment; filename=\"readme.txt\""));
    assert_eq!(file.text().await.unwrap(), "read me");

    let dir = app.get(&cookie, "/api/files/download?path=photos").await;
    assert_eq!(dir.status(), StatusCode::OK);
    assert_eq!(dir.headers()[CONTENT_TYPE], "application/zip");
    assert!(dir.headers()[CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .contains("photos.zip"));
    let bytes = dir.bytes().await.unwrap();
    let archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
    let mut names: Vec<_> = archive.file_names().map(str::to_string).collect();
    names.sort();
    assert_eq!(names, vec!["photos/", "photos/cat.jpg"]);

    let missing = app.get(&cookie, "/api/files/download?path=nope.txt").await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_download_multiple() {
    let app = spawn_app().await;
    let cookie = app.signed_in().await;
    fs::write(app.root.join("one.txt"), "1").unwrap();
    fs::write(app.root.join("two.txt"), "2").unwrap();

    let response = app
        .post(
            &cookie,
            "/api/files/download_multiple",
            json!({ "paths": ["one.txt", "two.txt"] }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .contains("download.zip"));
    let bytes = response.bytes().await.unwrap();
    let archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
    assert_eq!(archive.len(), 2);

    // Archives are unlinked once streamed
    let scratch = app.temp_dir.path().join("scratch");
    assert_eq!(fs::read_dir(scratch).unwrap().count(), 0);

    let overlapping = app
        .post(
            &cookie,
            "/api/files/download_multiple",
            json!({ "paths": ["one.txt", "one.txt"] }),
        )
        .await;
    assert_eq!(overlapping.status(), StatusCode::OK);
    let bytes = overlapping.bytes().await.unwrap();
    let archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
    assert_eq!(archive.len(), 1);

    let empty = app
        .post(&cookie, "/api/files/download_multiple", json!({ "paths": [] }))
        .await;
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Settings
// =============================================================================

#[tokio::test]
async fn test_settings_root_change() {
    let app = spawn_app().await;
    let cookie = app.signed_in().await;
    let other = app.temp_dir.path().join("other");
    fs::create_dir_all(&other).unwrap();
    fs::write(other.join("elsewhere.txt"), "x").unwrap();

    let bad = app
        .post(
            &cookie,
            "/api/settings/update_root_path",
            json!({ "path": app.temp_dir.path().join("missing") }),
        )
        .await;
    assert_eq!(bad.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = bad.json().await.unwrap();
    assert_eq!(body["success"], false);

    let check = app
        .post(
            &cookie,
            "/api/settings/check_directory_access",
            json!({ "path": other }),
        )
        .await;
    assert_eq!(check.status(), StatusCode::OK);

    let ok = app
        .post(
            &cookie,
            "/api/settings/update_root_path",
            json!({ "path": other }),
        )
        .await;
    assert_eq!(ok.status(), StatusCode::OK);

    let settings: Value = app.get(&cookie, "/api/settings").await.json().await.unwrap();
    assert_eq!(settings["root_path"], json!(other));

    let entries: Value = app.get(&cookie, "/api/files").await.json().await.unwrap();
    assert_eq!(entries[0]["name"], "elsewhere.txt");

    let saved = Config::load(app.temp_dir.path().join("config.toml")).unwrap();
    assert_eq!(saved.files.root_path, other);
}

#[tokio::test]
async fn test_update_password_ends_sessions() {
    let app = spawn_app().await;
    let cookie = app.signed_in().await;

    let short = app
        .post(
            &cookie,
            "/api/settings/update_password",
            json!({ "password": "123" }),
        )
        .await;
    assert_eq!(short.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let changed = app
        .post(
            &cookie,
            "/api/settings/update_password",
            json!({ "password": "better-secret" }),
        )
        .await;
    assert_eq!(changed.status(), StatusCode::OK);

    assert_eq!(
        app.get(&cookie, "/api/files").await.status(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        app.login("admin", "secret1").await.status(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        app.login("admin", "better-secret").await.status(),
        StatusCode::OK
    );
}
