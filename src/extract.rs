use anyhow::{bail, Context, Result};
use std::path::Path;

use crate::chunker::{ArtifactRef, Page};

/// Split already-extracted document text into trimmed pages on form-feed.
/// Text without form-feeds is a single page. Page indices are positional,
/// so blank pages keep their slot.
pub fn pages_from_text(text: &str) -> Vec<Page> {
    text.split('\u{0C}')
        .enumerate()
        .map(|(i, t)| Page::new(i, t.trim()))
        .collect()
}

/// Render CSV content as one page of row sentences. The header row names
/// the columns; every data row becomes `"col: value, col: value."` so the
/// sentence splitter has boundaries to work with.
pub fn page_from_csv(text: &str) -> Page {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let header: Vec<String> = match lines.next() {
        Some(h) => h.split(',').map(|c| c.trim().to_string()).collect(),
        None => return Page::new(0, ""),
    };

    let mut sentences: Vec<String> = Vec::new();
    for line in lines {
        let cells: Vec<&str> = line.split(',').map(str::trim).collect();
        let mut parts: Vec<String> = Vec::new();
        for (i, cell) in cells.iter().enumerate() {
            if cell.is_empty() {
                continue;
            }
            let name = header
                .get(i)
                .map(String::as_str)
                .filter(|h| !h.is_empty())
                .unwrap_or("column");
            parts.push(format!("{}: {}", name, cell));
        }
        if !parts.is_empty() {
            sentences.push(format!("{}.", parts.join(", ")));
        }
    }
    Page::new(0, sentences.join(" "))
}

/// Column names of a CSV, for prompt context.
pub fn csv_columns(text: &str) -> Vec<String> {
    text.lines()
        .find(|l| !l.trim().is_empty())
        .map(|h| h.split(',').map(|c| c.trim().to_string()).collect())
        .unwrap_or_default()
}

/// Data rows of a CSV as (column, value) pairs, empty cells dropped.
pub fn csv_rows(text: &str) -> Vec<Vec<(String, String)>> {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let header: Vec<String> = match lines.next() {
        Some(h) => h.split(',').map(|c| c.trim().to_string()).collect(),
        None => return Vec::new(),
    };
    lines
        .map(|line| {
            line.split(',')
                .map(str::trim)
                .enumerate()
                .filter(|(_, cell)| !cell.is_empty())
                .map(|(i, cell)| {
                    let name = header
                        .get(i)
                        .map(String::as_str)
                        .filter(|h| !h.is_empty())
                        .unwrap_or("column");
                    (name.to_string(), cell.to_string())
                })
                .collect()
        })
        .filter(|row: &Vec<(String, String)>| !row.is_empty())
        .collect()
}

/// Render CSV content as a markdown table for prompt embedding.
pub fn csv_to_markdown(text: &str) -> String {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let header: Vec<&str> = match lines.next() {
        Some(h) => h.split(',').map(str::trim).collect(),
        None => return String::new(),
    };
    let mut out = String::new();
    out.push_str(&format!("| {} |\n", header.join(" | ")));
    out.push_str(&format!(
        "| {} |\n",
        header.iter().map(|_| "---").collect::<Vec<_>>().join(" | ")
    ));
    for line in lines {
        let cells: Vec<&str> = line.split(',').map(str::trim).collect();
        out.push_str(&format!("| {} |\n", cells.join(" | ")));
    }
    out
}

/// Guess what kind of data a sheet holds from its column names, to steer
/// the analyst prompt.
pub fn infer_context_clues(columns: &[String]) -> Vec<String> {
    let joined = columns.join(" ").to_lowercase();
    let mut clues = Vec::new();
    if ["amount", "price", "cost", "revenue", "total", "balance"]
        .iter()
        .any(|k| joined.contains(k))
    {
        clues.push("financial figures".to_string());
    }
    if ["date", "month", "year", "quarter", "week"]
        .iter()
        .any(|k| joined.contains(k))
    {
        clues.push("a time dimension".to_string());
    }
    if ["name", "customer", "client", "employee", "vendor"]
        .iter()
        .any(|k| joined.contains(k))
    {
        clues.push("named entities".to_string());
    }
    if ["qty", "quantity", "count", "units", "stock"]
        .iter()
        .any(|k| joined.contains(k))
    {
        clues.push("quantities".to_string());
    }
    clues
}

/// Load a document into pages by extension. Unknown extensions fail.
pub async fn extract_pages(path: &Path) -> Result<Vec<Page>> {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => {
            let text = pdf_extract::extract_text(path)
                .with_context(|| format!("extracting pdf text: {}", path.display()))?;
            Ok(pages_from_text(&text))
        }
        "txt" | "md" => {
            let text = crate::io::read_file_to_string_async(path).await?;
            Ok(pages_from_text(&text))
        }
        "csv" => {
            let text = crate::io::read_file_to_string_async(path).await?;
            Ok(vec![page_from_csv(&text)])
        }
        other => bail!("unsupported document extension: '{}'", other),
    }
}

/// Attach sidecar images named `page_<i>_img_<k>.<ext>` from `images_dir`
/// to their pages, in filename order. Files that do not match the naming
/// scheme are ignored.
pub fn attach_sidecar_images(pages: &mut [Page], images_dir: &Path) -> Result<()> {
    let mut names: Vec<String> = Vec::new();
    let entries = std::fs::read_dir(images_dir)
        .with_context(|| format!("reading images dir: {}", images_dir.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("listing {}", images_dir.display()))?;
        if entry.path().is_file() {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
    }
    names.sort();

    for name in names {
        if let Some(page_index) = parse_sidecar_page_index(&name) {
            if let Some(page) = pages.iter_mut().find(|p| p.index == page_index) {
                let full = images_dir.join(&name);
                page.artifacts
                    .push(ArtifactRef(full.to_string_lossy().into_owned()));
            }
        }
    }
    Ok(())
}

fn parse_sidecar_page_index(name: &str) -> Option<usize> {
    let rest = name.strip_prefix("page_")?;
    let (digits, rest) = rest.split_at(rest.find(|c: char| !c.is_ascii_digit())?);
    if digits.is_empty() || !rest.starts_with("_img_") {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_feed_splits_pages_and_trims() {
        let pages = pages_from_text("First page. \u{0C} Second page.\u{0C}");
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0].text, "First page.");
        assert_eq!(pages[1].text, "Second page.");
        assert_eq!(pages[2].text, "");
        assert_eq!(pages[1].index, 1);
    }

    #[test]
    fn text_without_form_feed_is_one_page() {
        let pages = pages_from_text("All of it on one page.");
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].index, 0);
    }

    #[test]
    fn csv_rows_become_labelled_sentences() {
        let page = page_from_csv("name,amount,date\nwidget,30,2024-01-01\nbolt,,2024-02-01\n");
        assert_eq!(
            page.text,
            "name: widget, amount: 30, date: 2024-01-01. name: bolt, date: 2024-02-01."
        );
    }

    #[test]
    fn csv_without_rows_is_an_empty_page() {
        assert_eq!(page_from_csv("only,a,header\n").text, "");
        assert_eq!(page_from_csv("").text, "");
    }

    #[test]
    fn csv_rows_helper_drops_empty_cells() {
        let rows = csv_rows("a,b\n1,\n,2\n");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec![("a".to_string(), "1".to_string())]);
        assert_eq!(rows[1], vec![("b".to_string(), "2".to_string())]);
    }

    #[test]
    fn markdown_table_has_separator_row() {
        let md = csv_to_markdown("a,b\n1,2\n");
        assert_eq!(md, "| a | b |\n| --- | --- |\n| 1 | 2 |\n");
    }

    #[test]
    fn context_clues_match_column_keywords() {
        let cols = vec!["Customer Name".to_string(), "Amount".to_string(), "Date".to_string()];
        let clues = infer_context_clues(&cols);
        assert!(clues.contains(&"financial figures".to_string()));
        assert!(clues.contains(&"a time dimension".to_string()));
        assert!(clues.contains(&"named entities".to_string()));
        assert!(infer_context_clues(&["widget".to_string()]).is_empty());
    }

    #[test]
    fn sidecar_names_parse_to_page_indices() {
        assert_eq!(parse_sidecar_page_index("page_0_img_0.png"), Some(0));
        assert_eq!(parse_sidecar_page_index("page_12_img_3.jpeg"), Some(12));
        assert_eq!(parse_sidecar_page_index("page_x_img_0.png"), None);
        assert_eq!(parse_sidecar_page_index("cover.png"), None);
        assert_eq!(parse_sidecar_page_index("page_1_thumb.png"), None);
    }

    #[test]
    fn sidecars_attach_in_filename_order() {
        let temp = tempfile::tempdir().unwrap();
        for name in ["page_0_img_1.png", "page_0_img_0.png", "page_1_img_0.png", "note.txt"] {
            std::fs::write(temp.path().join(name), b"x").unwrap();
        }
        let mut pages = vec![Page::new(0, "alpha"), Page::new(1, "beta")];
        attach_sidecar_images(&mut pages, temp.path()).unwrap();
        let first: Vec<&str> = pages[0].artifacts.iter().map(|a| a.0.as_str()).collect();
        assert_eq!(first.len(), 2);
        assert!(first[0].ends_with("page_0_img_0.png"));
        assert!(first[1].ends_with("page_0_img_1.png"));
        assert_eq!(pages[1].artifacts.len(), 1);
    }

    #[tokio::test]
    async fn unknown_extension_is_rejected() {
        let err = extract_pages(Path::new("doc.docx")).await.unwrap_err();
        assert!(err.to_string().contains("unsupported document extension"));
    }
}
