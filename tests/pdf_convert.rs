#![cfg(unix)]

use std::fs;

use novelreader::convert::{ConvertOptions, convert};
use novelreader::workspace::NovelWorkspace;

fn seeded_workspace(dest: &std::path::Path) -> anyhow::Result<NovelWorkspace> {
    let workspace = NovelWorkspace::open(dest, "apotheosis")?;
    let low = workspace.bucket_dir("00000")?;
    fs::write(low.join("Chapter_00001_dawn.html"), "<p>dawn</p>")?;
    fs::write(low.join("Chapter_00001_dawn(raw).html"), "<p>raw</p>")?;
    fs::write(
        low.join("Chapter_00002_00012_(short)   Storm.html"),
        "<p>preview</p>",
    )?;
    fs::write(low.join("notes.html"), "<p>no number</p>")?;
    let high = workspace.bucket_dir("00100")?;
    fs::write(high.join("Chapter_00150_gate.html"), "<p>gate</p>")?;
    Ok(workspace)
}

#[test]
fn only_clean_complete_chapters_in_range_are_converted() -> anyhow::Result<()> {
    let temp = tempfile::tempdir()?;
    let workspace = seeded_workspace(&temp.path().join("novels"))?;
    let out = temp.path().join("pdf");

    let mut options = ConvertOptions::new(&out);
    options.converter = "cp".to_owned();
    options.last = 100;
    let summary = convert(&workspace, &options)?;

    assert_eq!(summary.converted, 1);
    assert_eq!(summary.failed, 0);
    let novel_out = out.join("apotheosis");
    let converted = novel_out.join("00000").join("Chapter_00001_dawn.pdf");
    assert_eq!(fs::read_to_string(converted)?, "<p>dawn</p>");
    assert!(!novel_out.join("00100").exists());
    Ok(())
}

#[test]
fn starting_bucket_skips_lower_buckets() -> anyhow::Result<()> {
    let temp = tempfile::tempdir()?;
    let workspace = seeded_workspace(&temp.path().join("novels"))?;
    let out = temp.path().join("pdf");

    let mut options = ConvertOptions::new(&out);
    options.converter = "cp".to_owned();
    options.starting_bucket = 100;
    let summary = convert(&workspace, &options)?;

    assert_eq!(summary.converted, 1);
    let converted = out.join("apotheosis").join("00100");
    assert!(converted.join("Chapter_00150_gate.pdf").is_file());
    Ok(())
}

#[test]
fn failing_converter_is_counted_and_skipped() -> anyhow::Result<()> {
    let temp = tempfile::tempdir()?;
    let workspace = seeded_workspace(&temp.path().join("novels"))?;

    let mut options = ConvertOptions::new(temp.path().join("pdf"));
    options.converter = "false".to_owned();
    let summary = convert(&workspace, &options)?;

    assert_eq!(summary.converted, 0);
    assert_eq!(summary.failed, 2);
    Ok(())
}

#[test]
fn missing_converter_aborts() -> anyhow::Result<()> {
    let temp = tempfile::tempdir()?;
    let workspace = seeded_workspace(&temp.path().join("novels"))?;

    let mut options = ConvertOptions::new(temp.path().join("pdf"));
    options.converter = "novelreader-no-such-converter".to_owned();
    let err = convert(&workspace, &options).unwrap_err();

    assert!(err.to_string().contains("converter not found"), "{err:#}");
    Ok(())
}
