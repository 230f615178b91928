use std::fs;
use std::path::PathBuf;

use serde_json::{Value, json};
use tokio::net::TcpListener;

async fn start_sink(storage: PathBuf) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind sink");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        synthehr_sink::serve_listener(listener, storage)
            .await
            .expect("serve sink");
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn answers_the_intake_contract() {
    let storage = temp_dir("contract");
    let base_url = start_sink(storage.clone()).await;
    let client = reqwest::Client::new();

    let health = client
        .get(format!("{base_url}/definition/template/adl1.4"))
        .send()
        .await
        .expect("health request");
    assert_eq!(health.status().as_u16(), 200);

    let upload = client
        .post(format!("{base_url}/definition/template/adl1.4"))
        .header("Content-Type", "application/xml")
        .body("<template/>")
        .send()
        .await
        .expect("template upload");
    assert!(upload.status().is_success());

    let created: Value = client
        .post(format!("{base_url}/ehr"))
        .send()
        .await
        .expect("create ehr")
        .json()
        .await
        .expect("ehr body");
    let ehr_id = created["ehr_id"]["value"]
        .as_str()
        .expect("ehr id")
        .to_string();
    assert!(uuid::Uuid::parse_str(&ehr_id).is_ok());

    let composition = json!({"_type": "COMPOSITION", "name": {"_type": "DV_TEXT", "value": "Blood gas"}});
    let stored: Value = client
        .post(format!("{base_url}/ehr/{ehr_id}/composition"))
        .json(&composition)
        .send()
        .await
        .expect("post composition")
        .json()
        .await
        .expect("composition body");
    assert_eq!(stored["status"], json!("success"));

    let file = stored["file"].as_str().expect("file name");
    assert!(file.starts_with(&ehr_id));
    let written: Value =
        serde_json::from_str(&fs::read_to_string(storage.join(file)).expect("read stored file"))
            .expect("parse stored file");
    assert_eq!(written, composition);
}

#[tokio::test]
async fn concurrent_compositions_never_overwrite() {
    let storage = temp_dir("concurrent");
    let base_url = start_sink(storage.clone()).await;
    let client = reqwest::Client::new();

    let mut handles = Vec::new();
    for idx in 0..20 {
        let client = client.clone();
        let url = format!("{base_url}/ehr/same-ehr/composition");
        handles.push(tokio::spawn(async move {
            client
                .post(url)
                .json(&json!({"idx": idx}))
                .send()
                .await
                .expect("post composition")
                .status()
                .is_success()
        }));
    }
    for handle in handles {
        assert!(handle.await.expect("join"));
    }

    let stored = fs::read_dir(&storage).expect("read storage").count();
    assert_eq!(stored, 20);
}

fn temp_dir(label: &str) -> PathBuf {
    let mut dir = std::env::temp_dir();
    dir.push(format!("synthehr_sink_{label}_{}", uuid::Uuid::new_v4()));
    fs::create_dir_all(&dir).expect("create temp dir");
    dir
}
