//! CLI integration tests for the schemaline binary.
//!
//! Each test runs the binary with a cleared environment and an isolated temp
//! directory as its working directory. Nothing here needs a running database.

#![allow(deprecated)] // Command::cargo_bin deprecation only affects custom build dirs

use assert_cmd::Command;
use assert_fs::TempDir;
use assert_fs::prelude::*;
use predicates::prelude::*;
use serde_json::Value;

// Nothing listens here; used where a URL must be present but is never dialed.
const UNUSED_DATABASE_URL: &str = "postgres://postgres@127.0.0.1:1/app";

struct TestContext {
    temp_dir: TempDir,
}

impl TestContext {
    fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("schemaline").expect("failed to find binary");
        cmd.env_clear()
            .env("NO_COLOR", "1")
            .current_dir(self.temp_dir.path());
        cmd
    }

    fn resolve(&self, env: &[(&str, &str)], args: &[&str]) -> String {
        let mut cmd = self.cmd();
        cmd.arg("resolve");
        for (key, value) in env {
            cmd.env(key, value);
        }
        let output = cmd.args(args).output().expect("failed to run command");
        assert!(output.status.success(), "resolve failed: {output:?}");
        String::from_utf8(output.stdout)
            .expect("stdout not UTF-8")
            .trim()
            .to_string()
    }

    fn write_migration(&self, name: &str, sql: &str) {
        self.temp_dir
            .child("migrations")
            .child(name)
            .write_str(sql)
            .expect("failed to write migration");
    }
}

#[test]
fn test_resolve_defaults_to_public() {
    let ctx = TestContext::new();
    assert_eq!(ctx.resolve(&[], &[]), "public");
}

#[test]
fn test_resolve_override_wins() {
    let ctx = TestContext::new();
    let env = [
        ("DB_SCHEMA", "public"),
        ("VERCEL_GIT_PULL_REQUEST_ID", "42"),
        ("VERCEL_GIT_COMMIT_REF", "feature/x"),
    ];
    assert_eq!(ctx.resolve(&env, &[]), "public");
}

#[test]
fn test_resolve_pull_request_beats_branch() {
    let ctx = TestContext::new();
    let env = [
        ("VERCEL_GIT_PULL_REQUEST_ID", "42"),
        ("VERCEL_GIT_COMMIT_REF", "feature/x"),
    ];
    assert_eq!(ctx.resolve(&env, &[]), "pr_42");
}

#[test]
fn test_resolve_sanitizes_branch() {
    let ctx = TestContext::new();
    let env = [("GITHUB_HEAD_REF", "Feature/Add-Auth!!")];
    assert_eq!(ctx.resolve(&env, &[]), "feature_add_auth");
}

#[test]
fn test_resolve_empty_pull_request_is_absent() {
    let ctx = TestContext::new();
    let env = [
        ("VERCEL_GIT_PULL_REQUEST_ID", ""),
        ("VERCEL_GIT_COMMIT_REF", "main"),
    ];
    assert_eq!(ctx.resolve(&env, &[]), "main");
}

#[test]
fn test_resolve_flags_override_environment() {
    let ctx = TestContext::new();
    let env = [("VERCEL_GIT_PULL_REQUEST_ID", "42")];
    assert_eq!(ctx.resolve(&env, &["--pr", "7"]), "pr_7");
    assert_eq!(ctx.resolve(&env, &["--schema", "staging"]), "staging");
}

#[test]
fn test_resolve_json_reports_source() {
    let ctx = TestContext::new();
    let output = ctx.resolve(&[("PR_NUMBER", "12")], &["--json"]);
    let json: Value = serde_json::from_str(&output).expect("failed to parse JSON");
    assert_eq!(json["namespace"], "pr_12");
    assert_eq!(json["source"], "pull_request");
}

#[test]
fn test_resolve_reads_config_file() {
    let ctx = TestContext::new();
    ctx.temp_dir
        .child("schemaline.toml")
        .write_str("[signals]\npull_request_vars = [\"CI_MERGE_REQUEST_IID\"]\n")
        .unwrap();
    let env = [("CI_MERGE_REQUEST_IID", "5"), ("PR_NUMBER", "6")];
    assert_eq!(ctx.resolve(&env, &[]), "pr_5");
}

#[test]
fn test_resolve_rejects_broken_config_file() {
    let ctx = TestContext::new();
    ctx.cmd()
        .args(["resolve", "--config", "missing.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing.toml"));
}

#[test]
fn test_migrate_requires_database_url() {
    let ctx = TestContext::new();
    ctx.write_migration("0001_create_todos.sql", "CREATE TABLE todos (id int);");
    ctx.cmd()
        .args(["migrate", "--pr", "7"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("DATABASE_URL"));
}

#[test]
fn test_migrate_logs_resolved_schema_on_early_failure() {
    let ctx = TestContext::new();
    ctx.write_migration("0001_create_todos.sql", "CREATE TABLE todos (id int);");
    ctx.cmd()
        .env("VERCEL_GIT_PULL_REQUEST_ID", "7")
        .arg("migrate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Resolved schema pr_7"))
        .stderr(predicate::str::contains(
            "Schema pr_7: read configuration failed",
        ));
}

#[test]
fn test_migrate_rejects_malformed_url() {
    let ctx = TestContext::new();
    ctx.write_migration("0001_create_todos.sql", "CREATE TABLE todos (id int);");
    ctx.cmd()
        .env("DATABASE_URL", "not a url")
        .args(["migrate", "--pr", "7"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("malformed database url"));
}

#[test]
fn test_migrate_requires_migrations_dir() {
    let ctx = TestContext::new();
    ctx.cmd()
        .env("DATABASE_URL", UNUSED_DATABASE_URL)
        .args(["migrate", "--migrations-dir", "nowhere"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("migrations directory not found"))
        .stderr(predicate::str::contains(
            "Schema public: load migrations failed",
        ));
}

#[test]
fn test_migrate_rejects_invalid_override() {
    let ctx = TestContext::new();
    ctx.write_migration("0001_create_todos.sql", "CREATE TABLE todos (id int);");
    ctx.cmd()
        .env("DATABASE_URL", UNUSED_DATABASE_URL)
        .args(["migrate", "--schema", "x\"; DROP SCHEMA public; --"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid schema name"));
}

#[test]
fn test_teardown_requires_target() {
    let ctx = TestContext::new();
    ctx.cmd()
        .env("DATABASE_URL", UNUSED_DATABASE_URL)
        .arg("teardown")
        .assert()
        .failure();
}

#[test]
fn test_teardown_requires_database_url() {
    let ctx = TestContext::new();
    ctx.cmd()
        .args(["teardown", "--pr", "7"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("DATABASE_URL"));
}

#[test]
fn test_teardown_refuses_public() {
    let ctx = TestContext::new();
    ctx.cmd()
        .env("DATABASE_URL", UNUSED_DATABASE_URL)
        .args(["teardown", "--schema", "public"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be dropped"))
        .stderr(predicate::str::contains("Schema public: drop schema failed"));
}
