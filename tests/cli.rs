use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn vlab_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("vlab");
    path
}

fn write_config(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("vectorlab.toml");
    fs::write(&path, body).unwrap();
    path
}

fn run(config: &Path, args: &[&str]) -> std::process::Output {
    Command::new(vlab_binary())
        .arg("--config")
        .arg(config)
        .args(args)
        .env_remove("DATABASE_URL")
        .env("RUST_LOG", "off")
        .output()
        .expect("failed to run vlab")
}

const TENANTS: &str = r#"
[embedding]
provider = "ollama"
model_repo = "nomic-embed-text"

[[tenants]]
id = 1
name = "acme"
table = "acme_docs"
embedding_dim = 768
embedding_provider = "openai"

[[tenants]]
id = 2
name = "globex"
table = "globex_docs"
embedding_dim = 384
"#;

#[test]
fn test_tenants_lists_resolved_models() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path(), TENANTS);

    let output = run(&config, &["tenants"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let line = |name: &str| {
        stdout
            .lines()
            .find(|l| l.split_whitespace().nth(1) == Some(name))
            .unwrap_or_else(|| panic!("no row for {name}: {stdout}"))
            .to_string()
    };

    let acme = line("acme");
    assert!(acme.contains("acme_docs"));
    assert!(acme.contains("openai"));
    assert!(acme.contains("nomic-embed-text"));

    // No provider of its own: inherits the [embedding] default.
    let globex = line("globex");
    assert!(globex.contains("ollama"));
    assert!(globex.contains("384"));
}

#[test]
fn test_invalid_table_name_rejected() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(
        tmp.path(),
        "[[tenants]]\nid = 1\nname = \"acme\"\ntable = \"acme-docs\"\nembedding_dim = 3\n",
    );

    let output = run(&config, &["tenants"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid vector store identifier"));
}

#[test]
fn test_database_commands_require_url() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path(), TENANTS);

    let output = run(&config, &["count", "acme"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("missing configuration"));
}

#[test]
fn test_missing_config_file() {
    let tmp = TempDir::new().unwrap();
    let output = run(&tmp.path().join("nope.toml"), &["tenants"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to read config file"));
}
