use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{Value, json};

use synthehr_core::Template;
use synthehr_generate::{
    CodedTextTable, Destination, DispatchError, DispatchOptions, Dispatcher, DistributionPolicy,
    LexiconAnalyzer, TemplateCounts, VariationEngine, VariationOptions,
};

fn engine() -> Arc<VariationEngine> {
    Arc::new(VariationEngine::new(
        Arc::new(LexiconAnalyzer::default()),
        CodedTextTable::clinical(),
    ))
}

fn sample_templates() -> Vec<Template> {
    vec![
        Template::new(
            "blood_gas.json",
            json!({
                "_type": "COMPOSITION",
                "name": {"_type": "DV_TEXT", "value": "Arterial blood gas"},
                "content": {
                    "_type": "OBSERVATION",
                    "data": {
                        "_type": "ITEM_TABLE",
                        "rows": {"_type": "ELEMENT", "value": {"_type": "DV_QUANTITY", "magnitude": "7.41", "units": "1"}}
                    }
                }
            }),
        ),
        Template::new(
            "vital_signs.json",
            json!({
                "_type": "COMPOSITION",
                "name": {"_type": "DV_TEXT", "value": "Vital signs"},
                "context": {"start_time": {"_type": "DV_DATE_TIME", "value": "2024-01-15T10:30:00Z"}},
                "content": []
            }),
        ),
    ]
}

fn temp_dir(label: &str) -> PathBuf {
    let mut dir = std::env::temp_dir();
    dir.push(format!("synthehr_dispatch_{label}_{}", uuid::Uuid::new_v4()));
    dir
}

fn files_with_prefix(dir: &PathBuf, prefix: &str) -> usize {
    fs::read_dir(dir)
        .expect("read output dir")
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(prefix))
        .count()
}

#[tokio::test]
async fn writes_one_file_per_variant() {
    let out_dir = temp_dir("files");
    let templates = sample_templates();
    let canonical: Vec<Value> = templates.iter().map(|t| t.document().clone()).collect();

    let dispatcher = Dispatcher::new(
        engine(),
        Destination::Files {
            out_dir: out_dir.clone(),
        },
        DispatchOptions {
            total: 10,
            concurrency: 3,
            seed: Some(2024),
            ..DispatchOptions::default()
        },
    );
    let report = dispatcher.run(&templates).await.expect("run");

    assert_eq!(report.mode, "file");
    assert_eq!(report.requested, 10);
    assert_eq!(report.attempted, 10);
    assert_eq!(report.succeeded, 10);
    assert_eq!(report.failed, 0);
    assert_eq!(report.unaccounted(), 0);
    assert!(report.peak_in_flight <= 3);
    assert_eq!(
        report.templates.get("blood_gas.json"),
        Some(&TemplateCounts {
            planned: 5,
            attempted: 5,
            succeeded: 5
        })
    );

    assert_eq!(fs::read_dir(&out_dir).expect("read output").count(), 10);
    assert_eq!(files_with_prefix(&out_dir, "blood_gas_"), 5);
    assert_eq!(files_with_prefix(&out_dir, "vital_signs_"), 5);

    let variant: Value = serde_json::from_str(
        &fs::read_to_string(out_dir.join("blood_gas_0.json")).expect("read variant"),
    )
    .expect("parse variant");
    let items = variant["content"][0]["data"]["items"]
        .as_array()
        .expect("items sequence");
    assert_eq!(items.len(), 1);
    assert!(items[0]["value"]["magnitude"].is_number());

    let after: Vec<Value> = templates.iter().map(|t| t.document().clone()).collect();
    assert_eq!(canonical, after);
}

#[tokio::test]
async fn template_without_share_stays_in_report() {
    let out_dir = temp_dir("zero_share");
    let dispatcher = Dispatcher::new(
        engine(),
        Destination::Files {
            out_dir: out_dir.clone(),
        },
        DispatchOptions {
            total: 1,
            seed: Some(1),
            ..DispatchOptions::default()
        },
    );
    let report = dispatcher.run(&sample_templates()).await.expect("run");

    assert_eq!(report.succeeded, 1);
    assert_eq!(
        report.templates.get("vital_signs.json"),
        Some(&TemplateCounts::default())
    );
}

#[tokio::test]
async fn rejected_plan_writes_nothing() {
    let out_dir = temp_dir("rejected");
    let dispatcher = Dispatcher::new(
        engine(),
        Destination::Files {
            out_dir: out_dir.clone(),
        },
        DispatchOptions {
            total: 2,
            policy: DistributionPolicy::RandomPartition,
            ..DispatchOptions::default()
        },
    );

    let err = dispatcher.run(&sample_templates()).await.unwrap_err();
    assert!(matches!(
        err,
        DispatchError::PartitionTooSmall {
            total: 2,
            templates: 2
        }
    ));
    assert!(!out_dir.exists());
}

#[tokio::test]
async fn empty_template_set_is_an_error() {
    let dispatcher = Dispatcher::new(
        engine(),
        Destination::Files {
            out_dir: temp_dir("empty"),
        },
        DispatchOptions {
            total: 5,
            ..DispatchOptions::default()
        },
    );
    let err = dispatcher.run(&[]).await.unwrap_err();
    assert!(matches!(err, DispatchError::NoTemplates));
}

#[tokio::test]
async fn same_seed_same_files() {
    let first = temp_dir("seed_a");
    let second = temp_dir("seed_b");
    for out_dir in [&first, &second] {
        let dispatcher = Dispatcher::new(
            engine(),
            Destination::Files {
                out_dir: out_dir.clone(),
            },
            DispatchOptions {
                total: 4,
                seed: Some(77),
                ..DispatchOptions::default()
            },
        );
        dispatcher.run(&sample_templates()).await.expect("run");
    }

    let read = |dir: &PathBuf| -> Value {
        serde_json::from_str(&fs::read_to_string(dir.join("blood_gas_1.json")).expect("read"))
            .expect("parse")
    };
    assert_eq!(read(&first), read(&second));
}

#[tokio::test]
async fn extreme_variation_options_never_lose_units() {
    let out_dir = temp_dir("extreme");
    let engine = Arc::new(
        VariationEngine::new(Arc::new(LexiconAnalyzer::default()), CodedTextTable::clinical())
            .with_options(VariationOptions {
                quantity_jitter: f64::NAN,
                date_window_days: 1_000_000_000,
                ..VariationOptions::default()
            }),
    );
    let dispatcher = Dispatcher::new(
        engine,
        Destination::Files {
            out_dir: out_dir.clone(),
        },
        DispatchOptions {
            total: 4,
            seed: Some(3),
            ..DispatchOptions::default()
        },
    );

    let report = dispatcher.run(&sample_templates()).await.expect("run");
    assert_eq!(report.attempted, 4);
    assert_eq!(report.succeeded, 4);
    assert_eq!(fs::read_dir(&out_dir).expect("read output").count(), 4);
}
