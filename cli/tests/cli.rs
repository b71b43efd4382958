use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn cst(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_cst"))
        .arg("--no-color")
        .args(args)
        .output()
        .expect("failed to run cst")
}

fn path_arg(path: &Path) -> &str {
    path.to_str().expect("utf-8 temp path")
}

fn workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("servers.csv"), "web,10.0.0.1\ndb,10.0.0.2\n").unwrap();
    fs::write(dir.path().join("vars.csv"), "domain,example.org\n").unwrap();
    fs::write(
        dir.path().join("source.txt"),
        "(store;source:vars.csv)\n\
         (block-start;type:foreach;source:servers.csv)\n\
         {0}.{{domain}} {1}\n\
         (block-end)\n",
    )
    .unwrap();
    dir
}

#[test]
fn renders_without_subcommand() {
    let dir = workspace();
    let input = dir.path().join("source.txt");
    let output = dir.path().join("hosts.txt");

    let result = cst(&["-i", path_arg(&input), "-o", path_arg(&output)]);
    assert!(result.status.success(), "{}", String::from_utf8_lossy(&result.stderr));
    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        "web.example.org 10.0.0.1\ndb.example.org 10.0.0.2\n"
    );
}

#[test]
fn renders_to_stdout() {
    let dir = workspace();
    let input = dir.path().join("source.txt");

    let result = cst(&["render", "-i", path_arg(&input), "-o", "-"]);
    assert!(result.status.success());
    assert_eq!(
        String::from_utf8_lossy(&result.stdout),
        "web.example.org 10.0.0.1\ndb.example.org 10.0.0.2\n"
    );
}

#[test]
fn store_flag_preloads_values() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("flags.csv"), "env,staging\n").unwrap();
    let input = dir.path().join("t.txt");
    fs::write(&input, "deploy to {{env}}\n").unwrap();
    let flags = dir.path().join("flags.csv");

    let result = cst(&["-i", path_arg(&input), "-o", "-", "-k", path_arg(&flags)]);
    assert!(result.status.success());
    assert_eq!(String::from_utf8_lossy(&result.stdout), "deploy to staging\n");
}

#[test]
fn parse_errors_exit_nonzero() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("bad.txt");
    fs::write(&input, "(block-start;type:string)\nunclosed\n").unwrap();

    let result = cst(&["-i", path_arg(&input), "-o", "-"]);
    assert_eq!(result.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&result.stderr).contains("never closed"));
}

#[test]
fn render_errors_exit_nonzero() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("t.txt");
    fs::write(&input, "kept\n(store;source:gone.csv)\n").unwrap();
    let output = dir.path().join("out.txt");

    let result = cst(&["-i", path_arg(&input), "-o", path_arg(&output)]);
    assert_eq!(result.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&result.stderr).contains("cannot read source"));
    assert_eq!(fs::read_to_string(&output).unwrap(), "kept\n");
}

#[test]
fn check_prints_blocks_as_json() {
    let dir = workspace();
    let input = dir.path().join("source.txt");

    let result = cst(&["check", path_arg(&input), "--json"]);
    assert!(result.status.success(), "{}", String::from_utf8_lossy(&result.stderr));

    let json: serde_json::Value = serde_json::from_slice(&result.stdout).unwrap();
    let blocks = json["blocks"].as_array().unwrap();
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0]["kind"], "store");
    assert_eq!(blocks[1]["kind"], "foreach");
    assert_eq!(blocks[1]["source"], "servers.csv");
}

#[test]
fn check_reports_every_problem() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("t.txt");
    fs::write(
        &input,
        "(store;source:gone.csv)\n(block-start;type:table)\nx\n(block-end)\n",
    )
    .unwrap();

    let result = cst(&["check", path_arg(&input)]);
    assert_eq!(result.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("cannot read source"), "{}", stderr);
    assert!(stderr.contains("unsupported block type 'table'"), "{}", stderr);
    assert!(stderr.contains("2 error(s)"), "{}", stderr);
}

#[test]
fn fixture_suite_passes() {
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures");
    let result = cst(&["test", path_arg(&fixtures)]);
    assert!(
        result.status.success(),
        "{}",
        String::from_utf8_lossy(&result.stderr)
    );
}

#[test]
fn fixture_categories_can_be_selected() {
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures");
    let result = cst(&["test", path_arg(&fixtures), "-c", "errors"]);
    assert!(result.status.success());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("errors"));
    assert!(!stderr.contains("basics"));
}
