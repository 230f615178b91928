use std::io;
use std::path::{Path, PathBuf};

use serde_json::Value;

use synthehr_core::Template;

/// `<template stem>_<index>.json`
pub fn variant_file_name(template: &Template, index: usize) -> String {
    format!("{}_{index}.json", template.stem())
}

/// Write one variant as pretty-printed JSON under `out_dir`.
pub async fn write_variant(
    out_dir: &Path,
    template: &Template,
    index: usize,
    document: &Value,
) -> io::Result<PathBuf> {
    let path = out_dir.join(variant_file_name(template, index));
    let mut bytes = serde_json::to_vec_pretty(document)?;
    bytes.push(b'\n');
    tokio::fs::write(&path, bytes).await?;
    Ok(path)
}
