use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::render::QaPair;

pub async fn read_file_to_string_async(path: &Path) -> Result<String> {
    let data = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading file: {}", path.display()))?;
    Ok(data)
}

/// Write text content to a file asynchronously, creating parent directories.
pub async fn write_file_async(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating directory: {}", parent.display()))?;
    }

    tokio::fs::write(path, content)
        .await
        .with_context(|| format!("writing file: {}", path.display()))?;
    Ok(())
}

pub fn filename_only(path: &Path) -> String {
    path.file_name()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string()
}

pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string()
}

/// Replace anything outside alphanumerics, space, underscore and dash with
/// an underscore, so sheet names and model output never break a filename.
pub fn sanitize_filename_component(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == ' ' || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Collect files under `dir` (non-recursive) whose extension is in
/// `extensions` (lowercase, without dot). Results are sorted by name so
/// batch runs are deterministic.
pub async fn scan_folder_for_extensions(dir: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("reading directory: {}", dir.display()))?;
    let mut found = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .with_context(|| format!("listing directory: {}", dir.display()))?
    {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase())
            .unwrap_or_default();
        if extensions.contains(&ext.as_str()) {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}

pub fn content_digest(text: &str) -> String {
    format!("{:x}", md5::compute(text.as_bytes()))
}

/// Batch-mode skip: a source whose digest matches the recorded one has
/// already been processed with identical content.
pub async fn digest_matches(digest_path: &Path, digest: &str) -> bool {
    match tokio::fs::read_to_string(digest_path).await {
        Ok(recorded) => recorded.trim() == digest,
        Err(_) => false,
    }
}

pub async fn record_digest(digest_path: &Path, digest: &str) -> Result<()> {
    write_file_async(digest_path, digest).await
}

pub fn qna_output_path(output_dir: &Path, source: &Path) -> PathBuf {
    let stem = sanitize_filename_component(&file_stem(source));
    output_dir.join(format!("{}_QnA.txt", stem))
}

pub fn digest_path_for(output_dir: &Path, source: &Path) -> PathBuf {
    let stem = sanitize_filename_component(&file_stem(source));
    output_dir.join(format!("{}_QnA.md5", stem))
}

pub fn summary_output_path(output_dir: &Path, source: &Path, sheet: &str) -> PathBuf {
    let base = sanitize_filename_component(&file_stem(source));
    let sheet = sanitize_filename_component(sheet);
    output_dir.join(format!("{}_{}_summary.txt", base, sheet))
}

pub fn narrative_output_path(output_dir: &Path, source: &Path, sheet: &str) -> PathBuf {
    let base = sanitize_filename_component(&file_stem(source));
    let sheet = sanitize_filename_component(sheet);
    output_dir.join(format!("{}_{}_narrative.txt", base, sheet))
}

pub fn render_qna_file(source_name: &str, pairs: &[QaPair]) -> String {
    let mut out = String::new();
    out.push_str(&format!("Questions & Answers for {}\n", source_name));
    out.push_str(&format!(
        "Generated: {}\n",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    ));
    out.push_str(&"=".repeat(60));
    out.push('\n');
    for (i, pair) in pairs.iter().enumerate() {
        out.push_str(&format!("\nQ{}: {}\n", i + 1, pair.question));
        out.push_str(&format!("A{}: {}\n", i + 1, pair.answer));
    }
    out
}

pub fn render_summary_file(source_name: &str, sheet: &str, summary: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!("Summary for {} [{}]\n", source_name, sheet));
    out.push_str(&format!(
        "Generated: {}\n",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    ));
    out.push_str(&"=".repeat(60));
    out.push('\n');
    out.push('\n');
    out.push_str(summary.trim());
    out.push('\n');
    out
}
