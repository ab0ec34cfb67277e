//! CLI Tests
//!
//! Runs the binary for cases that never reach the network.

#[cfg(test)]
mod tests {
    use assert_cmd::Command;
    use predicates::prelude::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn unpackr() -> Command {
        let mut cmd = Command::cargo_bin("unpackr").unwrap();
        cmd.env_remove("UNPACKR_CONFIG")
            .env_remove("RUST_LOG")
            .env_remove("UNPACKR_LOG_LEVEL")
            .env("AWS_REGION", "us-east-1")
            .env("AWS_ACCESS_KEY_ID", "test-access")
            .env("AWS_SECRET_ACCESS_KEY", "test-secret")
            .env("AWS_EC2_METADATA_DISABLED", "true");
        cmd
    }

    #[test]
    fn test_help_lists_subcommands() {
        unpackr()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("serve"))
            .stdout(predicate::str::contains("extract"));
    }

    /// Unsupported suffixes are rejected before any S3 call
    #[test]
    fn test_extract_unsupported_suffix() {
        unpackr()
            .args([
                "extract",
                "--source",
                "s3://src/archive.7z",
                "--destination",
                "s3://dest/out/",
            ])
            .assert()
            .failure()
            .stdout(predicate::str::contains("\"errorType\": \"UnsupportedFormatError\""))
            .stdout(predicate::str::contains("Error processing request"));
    }

    #[test]
    fn test_extract_malformed_locator() {
        unpackr()
            .args(["extract", "--source", "archive.zip", "--destination", "s3://dest/"])
            .assert()
            .failure()
            .stdout(predicate::str::contains("MalformedLocatorError"));
    }

    #[test]
    fn test_invalid_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "extract:\n  part_size: 1024").unwrap();

        unpackr()
            .arg("--config")
            .arg(file.path())
            .args(["extract", "--source", "s3://src/a.zip", "--destination", "s3://dest/"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("below the S3 minimum"));
    }

    #[test]
    fn test_print_metrics() {
        unpackr()
            .args([
                "extract",
                "--source",
                "s3://src/a.txt",
                "--destination",
                "s3://dest/",
                "--print-metrics",
            ])
            .assert()
            .failure()
            .stdout(predicate::str::contains("unpackr_errors_total"));
    }
}
