#![allow(dead_code)]

use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use engine::DiscoveryConfig;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const CLASS_BYTES: [u8; 8] = [0xCA, 0xFE, 0xBA, 0xBE, 0x00, 0x00, 0x00, 0x34];

pub fn manifest(attrs: &[(&str, &str)]) -> Vec<u8> {
    let mut text = String::from("Manifest-Version: 1.0\n");
    for (key, value) in attrs {
        text.push_str(&format!("{key}: {value}\n"));
    }
    text.into_bytes()
}

pub fn zip_bytes(entries: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in entries {
        writer.start_file(*name, FileOptions::default()).unwrap();
        writer.write_all(body).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Archive with a manifest carrying `attrs` and one valid class entry.
pub fn plugin_bytes(attrs: &[(&str, &str)], extra: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut entries = vec![
        ("META-INF/MANIFEST.MF", manifest(attrs)),
        ("pkg/Main.class", CLASS_BYTES.to_vec()),
    ];
    entries.extend(extra.iter().map(|(n, b)| (*n, b.clone())));
    zip_bytes(&entries)
}

/// Plugin archive whose stored manifest no longer matches its checksum, so
/// reading it fails with an I/O error.
pub fn checksum_mismatch_bytes(id: &str) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let stored = FileOptions::default().compression_method(CompressionMethod::Stored);
    writer.start_file("META-INF/MANIFEST.MF", stored).unwrap();
    writer.write_all(&manifest(&[("Plugin-Id", id)])).unwrap();
    writer.start_file("pkg/Main.class", stored).unwrap();
    writer.write_all(&CLASS_BYTES).unwrap();
    let mut bytes = writer.finish().unwrap().into_inner();

    let needle = format!("Plugin-Id: {id}").into_bytes();
    let at = bytes
        .windows(needle.len())
        .position(|w| w == needle.as_slice())
        .unwrap();
    bytes[at + needle.len() - 1] ^= 0x20;
    bytes
}

pub fn write(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, bytes).unwrap();
    path
}

pub fn config(plugin_dir: &Path) -> DiscoveryConfig {
    DiscoveryConfig {
        plugin_dir: plugin_dir.to_path_buf(),
        threads: Some(4),
        discovery_timeout_secs: Some(30),
        ..DiscoveryConfig::default()
    }
}

/// Files in `dir`, temporary partial files excluded.
pub fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| !n.ends_with(".partial"))
        .collect();
    names.sort();
    names
}
