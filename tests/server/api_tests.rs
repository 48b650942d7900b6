//! HTTP API tests: listing, writes, uploads, deletes, exec, build, logs

use reqwest::{multipart, StatusCode};
use serde_json::{json, Value};

use crate::common::{base_url, start_server, TestProject};
use genesys_devserver::DirectoryListing;

fn names(entries: &[genesys_devserver::FileEntry]) -> Vec<&str> {
    entries.iter().map(|e| e.relative_path.as_str()).collect()
}

// ============================================================================
// GET /api/files
// ============================================================================

#[tokio::test]
async fn test_list_root() {
    let project = TestProject::with_game_layout();
    let server = start_server(&project).await;

    let listing: DirectoryListing = reqwest::get(format!("{}/api/files", base_url(&server)))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let mut dirs = names(&listing.directories);
    dirs.sort();
    let mut files = names(&listing.files);
    files.sort();
    assert_eq!(dirs, vec!["assets", "prefabs"]);
    assert_eq!(files, vec!["default.scene.json", "game.ts"]);

    server.stop().await;
}

#[tokio::test]
async fn test_listing_order_is_stable() {
    let project = TestProject::with_game_layout();
    let server = start_server(&project).await;
    let client = reqwest::Client::new();
    let url = format!("{}/api/files", base_url(&server));

    let mut orders = Vec::new();
    for _ in 0..2 {
        let listing: DirectoryListing = client
            .get(&url)
            .query(&[("recursive", "true")])
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let order: Vec<String> = listing
            .directories
            .iter()
            .chain(listing.files.iter())
            .map(|e| e.relative_path.clone())
            .collect();
        orders.push(order);
    }
    assert_eq!(orders[0], orders[1]);

    server.stop().await;
}

#[tokio::test]
async fn test_list_recursive_counts() {
    let project = TestProject::with_game_layout();
    let server = start_server(&project).await;

    let listing: DirectoryListing = reqwest::Client::new()
        .get(format!("{}/api/files", base_url(&server)))
        .query(&[("recursive", "true")])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(listing.directories.len(), 4);
    assert_eq!(listing.files.len(), 5);
    assert!(listing.files.iter().all(|f| f.name != ".DS_Store"));

    let glb = listing
        .files
        .iter()
        .find(|f| f.name == "tree.glb")
        .expect("tree.glb listed");
    assert_eq!(glb.relative_path, "assets/models/tree.glb");
    assert_eq!(glb.size_bytes, 3);
    assert_eq!(glb.absolute_path, project.join("assets/models/tree.glb"));

    server.stop().await;
}

#[tokio::test]
async fn test_list_subdirectory_and_missing() {
    let project = TestProject::with_game_layout();
    let server = start_server(&project).await;
    let client = reqwest::Client::new();
    let url = format!("{}/api/files", base_url(&server));

    let listing: DirectoryListing = client
        .get(&url)
        .query(&[("path", "assets")])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let mut dirs = names(&listing.directories);
    dirs.sort();
    assert_eq!(dirs, vec!["assets/models", "assets/textures"]);
    assert!(listing.files.is_empty());

    let missing: DirectoryListing = client
        .get(&url)
        .query(&[("path", "does/not/exist")])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(missing.is_empty());

    server.stop().await;
}

#[tokio::test]
async fn test_list_file_path_is_bad_request() {
    let project = TestProject::with_game_layout();
    let server = start_server(&project).await;

    let response = reqwest::Client::new()
        .get(format!("{}/api/files", base_url(&server)))
        .query(&[("path", "game.ts")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    server.stop().await;
}

#[tokio::test]
async fn test_parent_segments_rejected() {
    let project = TestProject::with_game_layout();
    let server = start_server(&project).await;
    let client = reqwest::Client::new();
    let url = format!("{}/api/files", base_url(&server));

    let list = client
        .get(&url)
        .query(&[("path", "../")])
        .send()
        .await
        .unwrap();
    assert_eq!(list.status(), StatusCode::BAD_REQUEST);

    let write = client
        .post(&url)
        .json(&json!({ "path": "assets/../../outside.txt", "content": "x" }))
        .send()
        .await
        .unwrap();
    assert_eq!(write.status(), StatusCode::BAD_REQUEST);
    assert!(!project.path().parent().unwrap().join("outside.txt").exists());

    let delete = client
        .delete(&url)
        .query(&[("path", "../game.ts")])
        .send()
        .await
        .unwrap();
    assert_eq!(delete.status(), StatusCode::BAD_REQUEST);
    assert!(project.exists("game.ts"));

    server.stop().await;
}

// ============================================================================
// POST /api/files
// ============================================================================

#[tokio::test]
async fn test_write_then_read_back() {
    let project = TestProject::new();
    let server = start_server(&project).await;
    let base = base_url(&server);
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/files", base))
        .json(&json!({ "path": "scenes/level1.json", "content": "{\"actors\":[]}" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "success": true, "path": "scenes/level1.json" }));

    // Overwrite, then read back through static serving
    client
        .post(format!("{}/api/files", base))
        .json(&json!({ "path": "scenes/level1.json", "content": "v2" }))
        .send()
        .await
        .unwrap();
    let served = reqwest::get(format!("{}/scenes/level1.json", base))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(served, "v2");
    assert_eq!(project.read("scenes/level1.json"), "v2");

    server.stop().await;
}

#[tokio::test]
async fn test_write_defaults_to_empty_content() {
    let project = TestProject::new();
    let server = start_server(&project).await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/files", base_url(&server)))
        .json(&json!({ "path": "notes.md" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(project.read("notes.md"), "");

    server.stop().await;
}

#[tokio::test]
async fn test_write_without_path() {
    let project = TestProject::new();
    let server = start_server(&project).await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/files", base_url(&server)))
        .json(&json!({ "path": "", "content": "x" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "File path is required");

    server.stop().await;
}

#[tokio::test]
async fn test_static_serving_includes_dotfiles() {
    let project = TestProject::new();
    project.add_file(".genesys/settings.json", "{}");
    let server = start_server(&project).await;

    let response = reqwest::get(format!("{}/.genesys/settings.json", base_url(&server)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "{}");

    server.stop().await;
}

#[tokio::test]
async fn test_cors_is_permissive() {
    let project = TestProject::with_game_layout();
    let server = start_server(&project).await;

    let response = reqwest::Client::new()
        .get(format!("{}/api/files", base_url(&server)))
        .header("origin", "http://localhost:5173")
        .send()
        .await
        .unwrap();
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );

    server.stop().await;
}

// ============================================================================
// POST /api/files/upload
// ============================================================================

#[tokio::test]
async fn test_upload_into_header_directory() {
    let project = TestProject::new();
    let server = start_server(&project).await;

    let part = multipart::Part::bytes(b"binary-mesh".to_vec()).file_name("rock.glb");
    let form = multipart::Form::new().part("file", part);
    let response = reqwest::Client::new()
        .post(format!("{}/api/files/upload", base_url(&server)))
        .header("x-upload-path", "assets/models")
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body,
        json!({ "success": true, "filename": "rock.glb", "path": "assets/models/rock.glb" })
    );
    assert_eq!(project.read("assets/models/rock.glb"), "binary-mesh");

    server.stop().await;
}

#[tokio::test]
async fn test_upload_without_file() {
    let project = TestProject::new();
    let server = start_server(&project).await;

    let form = multipart::Form::new().text("note", "no file here");
    let response = reqwest::Client::new()
        .post(format!("{}/api/files/upload", base_url(&server)))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "No file uploaded");

    server.stop().await;
}

// ============================================================================
// DELETE /api/files
// ============================================================================

#[tokio::test]
async fn test_delete_semantics() {
    let project = TestProject::with_game_layout();
    let server = start_server(&project).await;
    let client = reqwest::Client::new();
    let url = format!("{}/api/files", base_url(&server));

    let missing = client
        .delete(&url)
        .query(&[("path", "nope.txt")])
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    let body: Value = missing.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("not found"));

    let dir = client
        .delete(&url)
        .query(&[("path", "assets")])
        .send()
        .await
        .unwrap();
    assert_eq!(dir.status(), StatusCode::OK);
    assert!(!project.exists("assets"));

    let file = client
        .delete(&url)
        .query(&[("path", "game.ts")])
        .send()
        .await
        .unwrap();
    assert_eq!(file.status(), StatusCode::OK);
    let body: Value = file.json().await.unwrap();
    assert_eq!(body, json!({ "success": true, "path": "game.ts" }));
    assert!(!project.exists("game.ts"));
    assert!(project.exists("default.scene.json"));
    assert!(project.exists("prefabs"));

    let no_path = client.delete(&url).send().await.unwrap();
    assert_eq!(no_path.status(), StatusCode::BAD_REQUEST);

    server.stop().await;
}

// ============================================================================
// POST /api/exec, /api/build-project, GET /api/logs
// ============================================================================

#[cfg(unix)]
#[tokio::test]
async fn test_exec_success_and_failure() {
    let project = TestProject::new();
    let server = start_server(&project).await;
    let client = reqwest::Client::new();
    let url = format!("{}/api/exec", base_url(&server));

    let ok = client
        .post(&url)
        .json(&json!({ "command": "true" }))
        .send()
        .await
        .unwrap();
    assert_eq!(ok.status(), StatusCode::OK);
    let body: Value = ok.json().await.unwrap();
    assert_eq!(body, json!({ "success": true, "command": "true" }));

    let failed = client
        .post(&url)
        .json(&json!({ "command": "exit 7" }))
        .send()
        .await
        .unwrap();
    assert_eq!(failed.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = failed.json().await.unwrap();
    assert!(body["error"].is_string());

    let missing = client.post(&url).json(&json!({})).send().await.unwrap();
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

    server.stop().await;
}

#[tokio::test]
async fn test_build_reports_missing_game_file() {
    let project = TestProject::new();
    project.add_file("default.scene.json", "{}");
    let server = start_server(&project).await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/build-project", base_url(&server)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains("game.ts"));

    server.stop().await;
}

#[tokio::test]
async fn test_logs_include_startup() {
    let project = TestProject::new();
    let server = start_server(&project).await;

    let entries: Vec<Value> = reqwest::get(format!("{}/api/logs", base_url(&server)))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(entries.iter().any(|e| e["message"]
        .as_str()
        .unwrap()
        .starts_with("File server started on port")));

    server.stop().await;
}
