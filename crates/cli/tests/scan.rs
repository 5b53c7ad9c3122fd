use assert_cmd::prelude::*;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;
use zip::write::FileOptions;
use zip::ZipWriter;

const CLASS_BYTES: [u8; 8] = [0xCA, 0xFE, 0xBA, 0xBE, 0x00, 0x00, 0x00, 0x34];

fn jar(entries: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in entries {
        writer.start_file(*name, FileOptions::default()).unwrap();
        writer.write_all(body).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn plugin(manifest: &str, extra: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut entries = vec![
        ("META-INF/MANIFEST.MF", format!("Manifest-Version: 1.0\n{manifest}").into_bytes()),
        ("pkg/Main.class", CLASS_BYTES.to_vec()),
    ];
    entries.extend(extra.iter().cloned());
    jar(&entries)
}

fn nestloader(home: &Path) -> Result<Command, Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("nestloader")?;
    cmd.env("HOME", home)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("NESTLOADER_THREADS")
        .env_remove("NESTLOADER_DISCOVERY_TIMEOUT");
    Ok(cmd)
}

#[test]
fn scan_reports_activated_and_disabled_plugins() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempdir()?;
    let plugins = tmp.path().join("plugins");
    fs::create_dir(&plugins)?;
    fs::write(plugins.join("foo-old.jar"), plugin("Plugin-Id: foo\nPlugin-Version: 1.0.0\n", &[]))?;
    fs::write(plugins.join("foo-new.jar"), plugin("Plugin-Id: foo\nPlugin-Version: 1.2.0\n", &[]))?;

    nestloader(tmp.path())?
        .arg("scan")
        .arg(&plugins)
        .assert()
        .success()
        .stdout(
            contains("[PLUGIN] foo 1.2.0")
                .and(contains("[DISABLED] foo-old.jar"))
                .and(contains("1 activated, 1 disabled")),
        )
        .stderr(contains("Discovery started").and(contains("Discovery completed")));
    Ok(())
}

#[test]
fn json_report_lists_nested_archives_and_libraries() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempdir()?;
    let plugins = tmp.path().join("plugins");
    fs::create_dir(&plugins)?;
    let lib = jar(&[
        ("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\n".to_vec()),
        ("data.txt", b"x".to_vec()),
    ]);
    fs::write(
        plugins.join("outer.jar"),
        plugin(
            "Plugin-Id: outer\nNested-Archives: META-INF/libs/lib-2.0.0.jar\n",
            &[("META-INF/libs/lib-2.0.0.jar", lib)],
        ),
    )?;

    let output = nestloader(tmp.path())?
        .arg("scan")
        .arg(&plugins)
        .arg("--format")
        .arg("json")
        .arg("--quiet")
        .output()?;
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout)?;

    let activated = report["activated"].as_array().unwrap();
    assert_eq!(activated.len(), 2);
    let lib = activated.iter().find(|c| c["id"] == "lib-2.0.0.jar").unwrap();
    assert_eq!(lib["version"], "2.0.0");
    assert_eq!(lib["nest_level"], 1);
    assert_eq!(lib["parents"][0], "outer.jar");
    assert_eq!(report["libraries"].as_array().unwrap().len(), 1);
    assert_eq!(report["stats"]["nested_tasks_created"], 1);
    assert!(plugins.join(".nested").is_dir());
    Ok(())
}

#[test]
fn quiet_flag_hides_logs() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempdir()?;
    let plugins = tmp.path().join("plugins");
    fs::create_dir(&plugins)?;

    nestloader(tmp.path())?
        .arg("scan")
        .arg(&plugins)
        .arg("--quiet")
        .assert()
        .success()
        .stderr(contains("Discovery started").not().and(contains("NESTLOADER").not()));
    Ok(())
}

#[test]
fn bootstrap_lists_core_plugins() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempdir()?;
    let plugins = tmp.path().join("plugins");
    fs::create_dir(&plugins)?;
    fs::write(
        plugins.join("core.jar"),
        plugin(
            "Core-Plugin: org.example.Core\nAccess-List: core_at.cfg\n",
            &[("META-INF/core_at.cfg", b"public a.B".to_vec())],
        ),
    )?;
    fs::write(plugins.join("plain.jar"), plugin("Plugin-Id: plain\n", &[]))?;

    nestloader(tmp.path())?
        .arg("bootstrap")
        .arg(&plugins)
        .assert()
        .success()
        .stdout(
            contains("core plugin org.example.Core")
                .and(contains("[ACCESS] core.jar!META-INF/core_at.cfg"))
                .and(contains("1 of 2 archives activated early")),
        );
    Ok(())
}

#[test]
fn strict_flag_fails_on_ambiguous_duplicates() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempdir()?;
    let plugins = tmp.path().join("plugins");
    fs::create_dir(&plugins)?;
    fs::write(plugins.join("a.jar"), plugin("Plugin-Id: foo\nPlugin-Version: 1.0.0\n", &[]))?;
    fs::write(plugins.join("b.jar"), plugin("Plugin-Id: foo\nPlugin-Version: 1.0.0\n", &[]))?;

    nestloader(tmp.path())?
        .arg("scan")
        .arg(&plugins)
        .arg("--strict")
        .assert()
        .failure()
        .stderr(contains("discovery failed").and(contains("cannot choose between a.jar, b.jar")));
    Ok(())
}

#[test]
fn extracted_archive_directory_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempdir()?;
    let plugins = tmp.path().join("plugins");
    fs::create_dir_all(plugins.join("unpacked").join("META-INF"))?;

    nestloader(tmp.path())?
        .arg("scan")
        .arg(&plugins)
        .assert()
        .failure()
        .stderr(contains("is an extracted archive"));
    Ok(())
}

#[test]
fn config_file_is_loaded_and_validated() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempdir()?;
    let plugins = tmp.path().join("plugins");
    fs::create_dir(&plugins)?;
    fs::write(plugins.join("a.zip"), plugin("Plugin-Id: zipped\n", &[]))?;
    let good = tmp.path().join("good.toml");
    fs::write(&good, "archive_extension = \"zip\"\nthreads = 2\n")?;
    let bad = tmp.path().join("bad.toml");
    fs::write(&bad, "threads = [not valid")?;

    nestloader(tmp.path())?
        .arg("scan")
        .arg(&plugins)
        .arg("--config")
        .arg(&good)
        .assert()
        .success()
        .stdout(contains("[PLUGIN] zipped"));

    nestloader(tmp.path())?
        .arg("scan")
        .arg(&plugins)
        .arg("--config")
        .arg(&bad)
        .assert()
        .failure()
        .stderr(contains("failed to parse"));
    Ok(())
}

#[test]
fn zero_threads_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempdir()?;
    nestloader(tmp.path())?
        .arg("scan")
        .arg(tmp.path())
        .arg("--threads")
        .arg("0")
        .assert()
        .failure()
        .stderr(contains("threads must be greater than 0"));
    Ok(())
}
