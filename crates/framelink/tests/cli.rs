#![cfg(feature = "cli")]

use std::path::PathBuf;
use std::process::{Command, Output};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "framelink-cli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn framelink(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_framelink"))
        .args(["--log-level", "error", "--format", "json"])
        .args(args)
        .output()
        .expect("framelink should run")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn version_prints_package_version() {
    let output = framelink(&["version"]);
    assert!(output.status.success());
    assert_eq!(
        stdout(&output).trim(),
        format!("framelink {}", env!("CARGO_PKG_VERSION"))
    );
}

#[test]
fn encode_escapes_control_looking_payload() {
    let output = framelink(&[
        "encode",
        "--service",
        "0",
        "--subfunction",
        "1",
        "--data",
        "C1",
        "--big-endian",
    ]);
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("\"frame\":\"F8 01 20 C1 41 E8\""), "{out}");
    assert!(out.contains("\"byte_order\":\"big\""));
}

#[test]
fn decode_prints_every_packet() {
    let output = framelink(&["decode", "00 F8 01 20 C1 41 E8 F0 00 21 E0"]);
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("\"payload\":\"C1\""), "{out}");
    assert!(out.contains("\"service\":1"), "{out}");
    assert!(out.contains("\"byte_order\":\"little\""), "{out}");
}

#[test]
fn decode_reads_raw_file() {
    let dir = unique_temp_dir("decode");
    let path = dir.join("wire.bin");
    std::fs::write(&path, [0xF0, 0x00, 0x32, 0xE0]).expect("write wire file");

    let output = framelink(&["decode", "--file", path.to_str().expect("utf-8 path")]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("\"status\":\"positive\""));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn decode_without_frames_returns_60() {
    let output = framelink(&["decode", "01 02 03"]);
    assert_eq!(output.status.code(), Some(60));
}

#[test]
fn encode_rejects_bad_service_with_64() {
    let output = framelink(&["encode", "--service", "9"]);
    assert_eq!(output.status.code(), Some(64));
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid service"));
}

#[test]
fn loopback_reads_word_through_handshake() {
    let dir = unique_temp_dir("loopback");
    let image = dir.join("mem.bin");
    std::fs::write(&image, [0x0D, 0xF0, 0xAD, 0x0B, 0xC0]).expect("write image");
    let image = image.to_str().expect("utf-8 path");

    for extra in [&[][..], &["--crc", "--big-endian", "--chunk", "1"][..]] {
        let mut args = vec![
            "loopback",
            "--image",
            image,
            "--base",
            "0x1000",
            "--address",
            "0x1001",
        ];
        args.extend_from_slice(extra);
        let output = framelink(&args);
        assert!(output.status.success(), "{:?}", output);
        let out = stdout(&output);
        assert!(out.contains("\"success\":true"), "{out}");
        assert!(out.contains("\"payload\":\"F0 AD 0B C0\""), "{out}");
        assert!(out.contains("\"responder_state\":\"Listening\""), "{out}");
    }

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn loopback_unsupported_subfunction_is_negative() {
    let dir = unique_temp_dir("loopback-neg");
    let image = dir.join("mem.bin");
    std::fs::write(&image, [0x01, 0x02, 0x03, 0x04]).expect("write image");

    let output = framelink(&[
        "loopback",
        "--image",
        image.to_str().expect("utf-8 path"),
        "--address",
        "0",
        "--subfunction",
        "3",
    ]);
    assert_eq!(output.status.code(), Some(1));
    let out = stdout(&output);
    assert!(out.contains("\"success\":false"), "{out}");
    assert!(out.contains("\"payload\":\"\""), "{out}");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn loopback_invalid_config_returns_64() {
    let dir = unique_temp_dir("loopback-config");
    let image = dir.join("mem.bin");
    let config = dir.join("endpoint.json");
    std::fs::write(&image, [0u8; 4]).expect("write image");
    std::fs::write(&config, r#"{"event_stack_capacity": 1}"#).expect("write config");

    let output = framelink(&[
        "loopback",
        "--image",
        image.to_str().expect("utf-8 path"),
        "--address",
        "0",
        "--config",
        config.to_str().expect("utf-8 path"),
    ]);
    assert_eq!(output.status.code(), Some(64));

    let _ = std::fs::remove_dir_all(&dir);
}
