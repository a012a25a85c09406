use gitload_fake::{router, FakeConfig, FakeState};

async fn start(config: FakeConfig) -> (String, FakeState) {
    let state = FakeState::new(config);
    let app = router(state.clone());
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap(); });
    (format!("http://{}:{}/repos/octo/scratch/git", addr.ip(), addr.port()), state)
}

fn authed(client: &reqwest::Client, url: String) -> reqwest::RequestBuilder {
    client
        .post(url)
        .header("Authorization", "Bearer test-token")
        .header("X-GitHub-Api-Version", "2022-11-28")
}

#[tokio::test]
async fn blob_tree_commit_chain() {
    let (base, state) = start(FakeConfig::default()).await;
    let client = reqwest::Client::new();

    let r = authed(&client, format!("{}/blobs", base))
        .json(&serde_json::json!({"content": "hello\n"}))
        .send()
        .await
        .unwrap();
    assert_eq!(r.status(), 201);
    let blob: serde_json::Value = r.json().await.unwrap();
    assert_eq!(blob["sha"], "ce013625030ba8dba906f756967f9e9ca394464a");

    let tree_body = serde_json::json!({"tree": [
        {"path": "file-0.txt", "mode": "100644", "type": "blob", "sha": blob["sha"]}
    ]});
    let r = authed(&client, format!("{}/trees", base)).json(&tree_body).send().await.unwrap();
    assert_eq!(r.status(), 201);
    let tree: serde_json::Value = r.json().await.unwrap();

    let r = authed(&client, format!("{}/commits", base))
        .json(&serde_json::json!({"message": "m", "tree": tree["sha"]}))
        .send()
        .await
        .unwrap();
    assert_eq!(r.status(), 201);
    let commit: serde_json::Value = r.json().await.unwrap();
    assert!(commit["url"].as_str().unwrap().ends_with(commit["sha"].as_str().unwrap()));

    assert_eq!(state.blob_count(), 1);
    assert_eq!(state.trees().len(), 1);
    assert_eq!(state.commits(), vec![("m".to_string(), tree["sha"].as_str().unwrap().to_string())]);
}

#[tokio::test]
async fn rejects_missing_auth_and_unknown_references() {
    let (base, state) = start(FakeConfig::default()).await;
    let client = reqwest::Client::new();

    let r = client
        .post(format!("{}/blobs", base))
        .json(&serde_json::json!({"content": "x"}))
        .send()
        .await
        .unwrap();
    assert_eq!(r.status(), 401);

    let tree_body = serde_json::json!({"tree": [
        {"path": "file-0.txt", "mode": "100644", "type": "blob", "sha": "0000000000000000000000000000000000000000"}
    ]});
    let r = authed(&client, format!("{}/trees", base)).json(&tree_body).send().await.unwrap();
    assert_eq!(r.status(), 422);

    let r = authed(&client, format!("{}/commits", base))
        .json(&serde_json::json!({"message": "m", "tree": "feed"}))
        .send()
        .await
        .unwrap();
    assert_eq!(r.status(), 422);
    assert!(state.trees().is_empty());
}

#[tokio::test]
async fn injected_failures_and_metrics() {
    let (base, state) = start(FakeConfig { fail_first_blobs: 2, malformed_trees: true }).await;
    let client = reqwest::Client::new();

    let mut statuses = Vec::new();
    for i in 0..3 {
        let r = authed(&client, format!("{}/blobs", base))
            .json(&serde_json::json!({"content": format!("{}\n", i)}))
            .send()
            .await
            .unwrap();
        statuses.push(r.status().as_u16());
    }
    assert_eq!(statuses, vec![500, 500, 201]);
    assert_eq!(state.blob_requests(), 3);

    let r = authed(&client, format!("{}/trees", base))
        .json(&serde_json::json!({"tree": []}))
        .send()
        .await
        .unwrap();
    assert_eq!(r.status(), 201);
    assert!(r.text().await.unwrap().starts_with("<html>"));

    let root = base.trim_end_matches("/repos/octo/scratch/git");
    let text = client.get(format!("{}/metrics", root)).send().await.unwrap().text().await.unwrap();
    assert!(text.contains("fake_git_requests_total"));
    assert!(text.contains("status=\"500\""));
}
