// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Alexander Minges

//! Snapshot the working tree into a dated ZIP archive.
//!
//! Responsibilities:
//! - Name the archive `<prefix>-<YYYY-MM-DD>.zip` inside the scratch directory.
//! - Walk the source tree deterministically, pruning excluded paths.
//! - Fingerprint the result so the upload can be checked against it.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use time::{Date, macros::format_description};
use tracing::{debug, info};
use zip::{CompressionMethod, ZipWriter, write::FileOptions};

use crate::utils::digest_file;

/// Paths never shipped in a release archive: VCS metadata, caches, earlier
/// archives, generated website output, scratch space and logs.
pub const DEFAULT_EXCLUDES: [&str; 10] = [
    "./.github",
    "./.git",
    "./.ruff_cache",
    "*.zip",
    "*.tar.gz",
    "./resources",
    "./www",
    "./tmp",
    "*.log",
    "forecasts_temp",
];

/// One exclusion rule, in the `tar --exclude` dialect the list above uses.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExcludePattern {
    /// `./a/b`: the path relative to the source root starts with these components.
    Anchored(Vec<String>),
    /// `*.ext`: some component ends with the suffix.
    Suffix(String),
    /// `name`: some component is exactly this name.
    Component(String),
}

impl ExcludePattern {
    pub fn parse(raw: &str) -> Self {
        if let Some(anchored) = raw.strip_prefix("./") {
            Self::Anchored(
                anchored
                    .split('/')
                    .filter(|c| !c.is_empty())
                    .map(str::to_string)
                    .collect(),
            )
        } else if let Some(suffix) = raw.strip_prefix('*') {
            Self::Suffix(suffix.to_string())
        } else {
            Self::Component(raw.trim_matches('/').to_string())
        }
    }

    /// Test a path given as components relative to the source root.
    pub fn matches(&self, components: &[String]) -> bool {
        match self {
            Self::Anchored(prefix) => {
                !prefix.is_empty() && components.starts_with(prefix.as_slice())
            }
            Self::Suffix(suffix) => components.iter().any(|c| c.ends_with(suffix.as_str())),
            Self::Component(name) => components.iter().any(|c| c == name),
        }
    }
}

/// The default exclusion list, parsed.
pub fn default_excludes() -> Vec<ExcludePattern> {
    DEFAULT_EXCLUDES
        .iter()
        .map(|raw| ExcludePattern::parse(raw))
        .collect()
}

/// A finished archive on disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Archive {
    pub path: PathBuf,
    pub file_name: String,
    pub size: u64,
    pub sha256: String,
    /// Number of regular files stored.
    pub file_count: usize,
}

/// `<prefix>-<YYYY-MM-DD>.zip`.
pub fn archive_name(prefix: &str, date: Date) -> Result<String> {
    let stamp = date
        .format(format_description!("[year]-[month]-[day]"))
        .map_err(|err| anyhow::anyhow!("Failed to format archive date: {}", err))?;
    Ok(format!("{prefix}-{stamp}.zip"))
}

/// Compress `source` into `output_dir`, skipping everything `excludes` matches.
///
/// Parent directories for the archive are created if missing. Symbolic links
/// are skipped and the archive never contains itself. A partially written
/// archive is removed when any step fails.
pub fn build_archive(
    source: &Path,
    output_dir: &Path,
    prefix: &str,
    date: Date,
    excludes: &[ExcludePattern],
) -> Result<Archive> {
    if !source.is_dir() {
        bail!("Source directory {:?} does not exist", source);
    }
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create archive directory {:?}", output_dir))?;

    let file_name = archive_name(prefix, date)?;
    let output = output_dir.join(&file_name);
    info!("Creating archive {}", file_name);
    info!("Using directory {}", output_dir.display());

    let file_count = match write_zip(source, &output, excludes) {
        Ok(count) => count,
        Err(err) => {
            let _ = fs::remove_file(&output);
            return Err(err);
        }
    };

    let digest = digest_file(&output)?;
    info!(
        "Archive created: {} ({} bytes, {} files, sha256 {})",
        output.display(),
        digest.size,
        file_count,
        digest.sha256
    );

    Ok(Archive {
        path: output,
        file_name,
        size: digest.size,
        sha256: digest.sha256,
        file_count,
    })
}

struct TreeWriter<'a> {
    zip: ZipWriter<File>,
    options: FileOptions<'static, ()>,
    excludes: &'a [ExcludePattern],
    output: PathBuf,
    file_count: usize,
}

fn write_zip(source: &Path, output: &Path, excludes: &[ExcludePattern]) -> Result<usize> {
    let file = File::create(output)
        .with_context(|| format!("Failed to write archive file {:?}", output))?;
    // Compare canonical paths so the archive is skipped even when it lives in `source`.
    let output = fs::canonicalize(output)
        .with_context(|| format!("Failed to resolve archive path {:?}", output))?;

    let mut writer = TreeWriter {
        zip: ZipWriter::new(file),
        options: FileOptions::default().compression_method(CompressionMethod::Deflated),
        excludes,
        output,
        file_count: 0,
    };
    writer.add_dir(source, &mut Vec::new())?;

    let TreeWriter { zip, file_count, .. } = writer;
    zip.finish().context("Failed to finalize archive")?;
    Ok(file_count)
}

impl TreeWriter<'_> {
    fn add_dir(&mut self, dir: &Path, rel: &mut Vec<String>) -> Result<()> {
        let mut entries = fs::read_dir(dir)
            .with_context(|| format!("Failed to list directory {:?}", dir))?
            .collect::<io::Result<Vec<_>>>()
            .with_context(|| format!("Failed to read entry in {:?}", dir))?;
        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            let name = entry.file_name().to_string_lossy().into_owned();
            rel.push(name);
            let result = self.add_entry(&entry.path(), rel);
            rel.pop();
            result?;
        }
        Ok(())
    }

    fn add_entry(&mut self, path: &Path, rel: &mut Vec<String>) -> Result<()> {
        let archive_path = rel.join("/");
        if self.excludes.iter().any(|pattern| pattern.matches(rel)) {
            debug!("Excluding {}", archive_path);
            return Ok(());
        }

        let meta = fs::symlink_metadata(path)
            .with_context(|| format!("Failed to stat {:?}", path))?;

        if meta.file_type().is_symlink() {
            debug!("Skipping symlink {}", archive_path);
            return Ok(());
        }

        if meta.is_dir() {
            self.zip
                .add_directory(format!("{archive_path}/"), self.options)
                .with_context(|| format!("Failed to add directory {} to archive", archive_path))?;
            return self.add_dir(path, rel);
        }

        if !meta.is_file() {
            debug!("Skipping special file {}", archive_path);
            return Ok(());
        }

        if fs::canonicalize(path).is_ok_and(|p| p == self.output) {
            return Ok(());
        }

        let options = self.options.large_file(meta.len() >= u64::from(u32::MAX));
        self.zip
            .start_file(archive_path.clone(), options)
            .with_context(|| format!("Failed to add file {} to archive", archive_path))?;
        let mut reader =
            File::open(path).with_context(|| format!("Failed to read {:?}", path))?;
        io::copy(&mut reader, &mut self.zip)
            .with_context(|| format!("Failed to write {} into archive", archive_path))?;
        self.file_count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs::{self, File};
    use std::io::Read;
    use std::path::Path;

    use tempfile::TempDir;
    use time::macros::date;
    use zip::ZipArchive;

    use super::{
        DEFAULT_EXCLUDES, ExcludePattern, archive_name, build_archive, default_excludes,
    };

    fn components(path: &str) -> Vec<String> {
        path.split('/').map(str::to_string).collect()
    }

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn listing(path: &Path) -> Vec<String> {
        let archive = ZipArchive::new(File::open(path).unwrap()).unwrap();
        let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
        names.sort();
        names
    }

    #[test]
    fn parse_recognizes_the_three_pattern_forms() {
        assert_eq!(
            ExcludePattern::parse("./.git"),
            ExcludePattern::Anchored(vec![".git".into()])
        );
        assert_eq!(
            ExcludePattern::parse("*.tar.gz"),
            ExcludePattern::Suffix(".tar.gz".into())
        );
        assert_eq!(
            ExcludePattern::parse("forecasts_temp"),
            ExcludePattern::Component("forecasts_temp".into())
        );
    }

    #[test]
    fn anchored_patterns_only_match_at_the_root() {
        let www = ExcludePattern::parse("./www");
        assert!(www.matches(&components("www")));
        assert!(www.matches(&components("www/index.html")));
        assert!(!www.matches(&components("docs/www")));
        assert!(!www.matches(&components("wwwroot")));
    }

    #[test]
    fn suffix_and_component_patterns_match_anywhere() {
        let log = ExcludePattern::parse("*.log");
        assert!(log.matches(&components("run.log")));
        assert!(log.matches(&components("models/fit.log")));
        assert!(!log.matches(&components("catalog.csv")));

        let temp = ExcludePattern::parse("forecasts_temp");
        assert!(temp.matches(&components("a/forecasts_temp/b.csv")));
        assert!(!temp.matches(&components("a/forecasts_temp2/b.csv")));
    }

    #[test]
    fn archive_name_embeds_date() {
        assert_eq!(
            archive_name("portal-forecasts", date!(2025 - 03 - 07)).unwrap(),
            "portal-forecasts-2025-03-07.zip"
        );
    }

    #[test]
    fn build_archive_excludes_every_default_pattern() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let root = src.path();

        write(root, "README.md", "readme");
        write(root, "forecasts/2025-03-07.csv", "a,b\n1,2\n");
        write(root, "models/fit.R", "fit()");
        write(root, "docs/www/keep.html", "nested www is not anchored");
        // Everything below must be pruned.
        write(root, ".git/HEAD", "ref: refs/heads/main");
        write(root, ".github/workflows/ci.yml", "on: push");
        write(root, ".ruff_cache/x", "");
        write(root, "old.zip", "PK");
        write(root, "backup.tar.gz", "gz");
        write(root, "resources/big.bin", "bin");
        write(root, "www/index.html", "<html>");
        write(root, "tmp/scratch.txt", "tmp");
        write(root, "logs/run.log", "log");
        write(root, "forecasts/forecasts_temp/part.csv", "tmp");

        let archive = build_archive(
            root,
            out.path(),
            "portal-forecasts",
            date!(2025 - 03 - 07),
            &default_excludes(),
        )
        .unwrap();

        assert_eq!(archive.file_name, "portal-forecasts-2025-03-07.zip");
        assert_eq!(archive.path, out.path().join(&archive.file_name));
        assert_eq!(archive.file_count, 4);
        assert_eq!(archive.size, fs::metadata(&archive.path).unwrap().len());
        assert_eq!(archive.sha256.len(), 64);

        let names = listing(&archive.path);
        assert_eq!(
            names,
            vec![
                "README.md",
                "docs/",
                "docs/www/",
                "docs/www/keep.html",
                "forecasts/",
                "forecasts/2025-03-07.csv",
                "logs/",
                "models/",
                "models/fit.R",
            ]
        );
        for raw in DEFAULT_EXCLUDES {
            let pattern = ExcludePattern::parse(raw);
            for name in &names {
                let parts: Vec<String> = name
                    .trim_end_matches('/')
                    .split('/')
                    .map(str::to_string)
                    .collect();
                assert!(!pattern.matches(&parts), "{name} matches {raw}");
            }
        }
    }

    #[test]
    fn build_archive_round_trips_file_contents() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        write(src.path(), "data/counts.csv", "species,count\nDM,12\n");

        let archive = build_archive(
            src.path(),
            out.path(),
            "p",
            date!(2025 - 01 - 01),
            &default_excludes(),
        )
        .unwrap();

        let mut zip = ZipArchive::new(File::open(&archive.path).unwrap()).unwrap();
        let mut contents = String::new();
        zip.by_name("data/counts.csv")
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, "species,count\nDM,12\n");
    }

    #[test]
    fn build_archive_skips_itself_when_written_inside_source() {
        let src = TempDir::new().unwrap();
        write(src.path(), "a.txt", "a");

        // No patterns at all, so only the self-check keeps the archive out.
        let archive =
            build_archive(src.path(), src.path(), "self", date!(2025 - 01 - 01), &[]).unwrap();

        assert_eq!(listing(&archive.path), vec!["a.txt"]);
    }

    #[test]
    fn build_archive_fails_for_missing_source() {
        let out = TempDir::new().unwrap();
        let missing = out.path().join("nope");

        let result = build_archive(
            &missing,
            out.path(),
            "p",
            date!(2025 - 01 - 01),
            &default_excludes(),
        );

        assert!(result.is_err());
        assert!(!out.path().join("p-2025-01-01.zip").exists());
    }

    #[test]
    fn build_archive_creates_missing_output_directory() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        write(src.path(), "a.txt", "a");
        let nested = out.path().join("scratch/archives");

        let archive = build_archive(src.path(), &nested, "p", date!(2025 - 01 - 01), &[]).unwrap();
        assert!(archive.path.starts_with(&nested));
        assert!(archive.path.exists());
    }
}
