use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::ConvertArgs;
use crate::sources::SourceParsers;

pub fn run(args: ConvertArgs) -> Result<()> {
    let parsers = SourceParsers::new()?;

    if args.target.is_dir() {
        let mut paths = Vec::new();
        let entries = fs::read_dir(&args.target)
            .with_context(|| format!("failed to read {}", args.target.display()))?;
        for entry in entries {
            let entry = entry
                .with_context(|| format!("failed to read entry in {}", args.target.display()))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let name = path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or_default()
                .to_ascii_lowercase();
            if !name.ends_with(".csv") || name.contains("zone.identifier") {
                continue;
            }
            paths.push(path);
        }
        paths.sort();

        let mut converted = 0_usize;
        for path in paths {
            if convert_file(&parsers, &path)? {
                converted += 1;
            }
        }
        info!(converted, target = %args.target.display(), "conversion completed");
        return Ok(());
    }

    convert_file(&parsers, &args.target)?;
    Ok(())
}

/// Rewrites one annotation export as the bullet-list text form next to
/// the source file. Returns false when nothing was written.
fn convert_file(parsers: &SourceParsers, path: &Path) -> Result<bool> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "cannot read source file");
            return Ok(false);
        }
    };

    let parsed = parsers.parse_annotation_csv(&text);
    if parsed.rows.is_empty() {
        info!(path = %path.display(), "no highlight rows, skipping");
        return Ok(false);
    }

    let mut out = String::new();
    out.push_str(parsed.title.as_deref().unwrap_or(""));
    out.push('\n');
    if let Some(author) = &parsed.author {
        out.push_str("by ");
        out.push_str(author);
    }
    out.push('\n');
    for row in &parsed.rows {
        out.push_str("- ");
        out.push_str(&capitalize_first(row.text.trim()));
        out.push('\n');
    }

    let out_path = path.with_extension("txt");
    fs::write(&out_path, out)
        .with_context(|| format!("failed to write {}", out_path.display()))?;
    info!(path = %out_path.display(), rows = parsed.rows.len(), "wrote bullet list");
    Ok(true)
}

fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::{capitalize_first, convert_file, run};
    use crate::cli::ConvertArgs;
    use crate::sources::SourceParsers;

    const EXPORT: &str = concat!(
        "\"Your Kindle Notes For:\",,,\n",
        "\"Dune\",,,\n",
        "\"by Frank Herbert\",,,\n",
        "\"Annotation Type\",\"Location\",\"Starred?\",\"Annotation\"\n",
        "\"Highlight (Yellow)\",\"Location 837\",\"\",\"fear is the mind-killer.\"\n",
        "\"Highlight (Blue)\",\"Location 901\",\"\",\"I must not fear.\"\n",
    );

    fn parsers() -> SourceParsers {
        SourceParsers::new().expect("parsers should compile")
    }

    #[test]
    fn converts_annotation_export_to_bullet_list() {
        let dir = tempfile::tempdir().expect("tempdir");
        let csv_path = dir.path().join("dune.csv");
        fs::write(&csv_path, EXPORT).expect("write export");

        let written = convert_file(&parsers(), &csv_path).expect("convert should succeed");
        assert!(written);

        let text = fs::read_to_string(dir.path().join("dune.txt")).expect("txt written");
        assert_eq!(
            text,
            "Dune\nby Frank Herbert\n- Fear is the mind-killer.\n- I must not fear.\n"
        );
    }

    #[test]
    fn export_without_highlights_writes_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let csv_path = dir.path().join("empty.csv");
        fs::write(&csv_path, "\"Dune\",,,\n\"by Frank Herbert\",,,\n").expect("write export");

        let written = convert_file(&parsers(), &csv_path).expect("convert should succeed");
        assert!(!written);
        assert!(!dir.path().join("empty.txt").exists());
    }

    #[test]
    fn directory_mode_converts_only_csv_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("dune.csv"), EXPORT).expect("write export");
        fs::write(dir.path().join("notes.txt"), "not a csv").expect("write other");
        fs::write(dir.path().join("dune.csv.Zone.Identifier"), "").expect("write artifact");

        run(ConvertArgs {
            target: dir.path().to_path_buf(),
        })
        .expect("run should succeed");

        assert!(dir.path().join("dune.txt").exists());
        assert!(!dir.path().join("notes.csv").exists());
    }

    #[test]
    fn capitalize_first_handles_unicode_and_empty_input() {
        assert_eq!(capitalize_first("fear"), "Fear");
        assert_eq!(capitalize_first("émile"), "Émile");
        assert_eq!(capitalize_first(""), "");
    }
}
