use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::Command;

use anyhow::Context as _;
use serde::Serialize;

use crate::workspace::{NovelWorkspace, create_dir};

pub const DEFAULT_CONVERTER: &str = "wkhtmltopdf";

#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub out_dir: PathBuf,
    pub converter: String,
    pub starting_bucket: u32,
    pub first: u32,
    pub last: u32,
}

impl ConvertOptions {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            converter: DEFAULT_CONVERTER.to_owned(),
            starting_bucket: 0,
            first: 1,
            last: 100_000,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConvertSummary {
    pub converted: usize,
    pub failed: usize,
}

/// Converts each clean, complete chapter of the workspace into
/// `{out}/{novel}/{bucket}/{stem}.pdf`. A converter exiting non-zero is
/// logged and skipped; a converter that cannot be started aborts.
pub fn convert(
    workspace: &NovelWorkspace,
    options: &ConvertOptions,
) -> anyhow::Result<ConvertSummary> {
    let novel_out = options.out_dir.join(workspace.novel());
    let mut summary = ConvertSummary::default();

    for chapter in workspace.chapter_files().context("list chapters")? {
        if chapter.raw || chapter.short || chapter.bucket < options.starting_bucket {
            continue;
        }
        let Some(number) = chapter.number else {
            tracing::debug!(file = %chapter.file_name, "skip file without chapter number");
            continue;
        };
        if number < options.first || number > options.last {
            continue;
        }

        let bucket_out = novel_out.join(format!("{:05}", chapter.bucket));
        create_dir(&bucket_out)?;
        let target = bucket_out.join(format!("{}.pdf", chapter.stem()));

        let args = [OsString::from(&chapter.path), OsString::from(&target)];
        let output = match Command::new(&options.converter).args(&args).output() {
            Ok(output) => output,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                anyhow::bail!("converter not found: {}", options.converter);
            }
            Err(err) => {
                return Err(err).with_context(|| format!("run converter: {}", options.converter));
            }
        };

        if output.status.success() {
            tracing::info!(chapter = number, out = %target.display(), "converted chapter");
            summary.converted += 1;
        } else {
            tracing::warn!(
                chapter = number,
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr),
                "converter failed"
            );
            summary.failed += 1;
        }
    }

    tracing::info!(
        converted = summary.converted,
        failed = summary.failed,
        "conversion finished"
    );
    Ok(summary)
}
