use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

#[test]
fn version_prints_package_version() {
    cargo_bin_cmd!("pdf-viewer")
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn help_lists_subcommands() {
    cargo_bin_cmd!("pdf-viewer")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("info"))
        .stdout(predicate::str::contains("load"))
        .stdout(predicate::str::contains("page"));
}

#[test]
fn missing_file_fails_for_every_document_command() {
    for command in ["info", "load", "page"] {
        cargo_bin_cmd!("pdf-viewer")
            .arg(command)
            .arg("does-not-exist.pdf")
            .assert()
            .failure()
            .stderr(predicate::str::contains("file does not exist"));
    }
}

#[test]
fn directory_is_not_a_document() {
    let dir = tempfile::tempdir().expect("temp dir");

    cargo_bin_cmd!("pdf-viewer")
        .arg("load")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("path is not a file"));
}

#[test]
fn page_numbers_are_one_based() {
    let file = tempfile::NamedTempFile::new().expect("temp file");

    cargo_bin_cmd!("pdf-viewer")
        .arg("page")
        .arg(file.path())
        .args(["--page", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("1-based"));
}

#[test]
fn invalid_environment_is_rejected() {
    let file = tempfile::NamedTempFile::new().expect("temp file");

    cargo_bin_cmd!("pdf-viewer")
        .arg("load")
        .arg(file.path())
        .env("PDF_VIEWER_DPI", "zero")
        .assert()
        .failure()
        .stderr(predicate::str::contains("PDF_VIEWER_"));
}
