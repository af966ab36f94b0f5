//! CLI end-to-end tests
//!
//! Drives the reelbox binary against a minimal single-track file.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

#[allow(deprecated)]
fn reelbox_cmd() -> Command {
    Command::cargo_bin("reelbox").unwrap()
}

fn leaf(tag: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut b = Vec::with_capacity(8 + payload.len());
    b.extend_from_slice(&((8 + payload.len()) as u32).to_be_bytes());
    b.extend_from_slice(tag);
    b.extend_from_slice(payload);
    b
}

fn container(tag: &[u8; 4], parts: &[Vec<u8>]) -> Vec<u8> {
    let inner: usize = parts.iter().map(Vec::len).sum();
    let mut b = Vec::with_capacity(8 + inner);
    b.extend_from_slice(&((8 + inner) as u32).to_be_bytes());
    b.extend_from_slice(tag);
    for p in parts {
        b.extend_from_slice(p);
    }
    b
}

fn put_u32(buf: &mut [u8], at: usize, v: u32) {
    buf[at..at + 4].copy_from_slice(&v.to_be_bytes());
}

/// Video-only container: 2 samples of 2 bytes, 1 s apart, data right
/// after a 16-byte ftyp and the mdat header.
fn tiny_mp4() -> Vec<u8> {
    let mut file = leaf(b"ftyp", b"isom\x00\x00\x02\x00");
    file.extend(leaf(b"mdat", &[0xAA, 0xAA, 0xBB, 0xBB]));

    let mvhd = {
        let mut p = vec![0u8; 100];
        put_u32(&mut p, 12, 1000);
        put_u32(&mut p, 16, 2000);
        p
    };
    let tkhd = {
        let mut p = vec![0u8; 84];
        put_u32(&mut p, 12, 1);
        put_u32(&mut p, 20, 2000);
        put_u32(&mut p, 76, 320 << 16);
        put_u32(&mut p, 80, 240 << 16);
        p
    };
    let mdhd = {
        let mut p = vec![0u8; 24];
        put_u32(&mut p, 12, 1000);
        put_u32(&mut p, 16, 2000);
        p
    };
    let hdlr = {
        let mut p = vec![0u8; 24];
        p[8..12].copy_from_slice(b"vide");
        p.push(0);
        p
    };
    let stsd = {
        // One bare avc1 entry, no codec config child
        let mut p = vec![0u8; 8];
        put_u32(&mut p, 4, 1);
        p.extend_from_slice(&86u32.to_be_bytes());
        p.extend_from_slice(b"avc1");
        p.extend_from_slice(&[0u8; 78]);
        p
    };
    let stts = {
        let mut p = vec![0u8; 8];
        put_u32(&mut p, 4, 1);
        p.extend_from_slice(&2u32.to_be_bytes());
        p.extend_from_slice(&1000u32.to_be_bytes());
        p
    };
    let stsc = {
        let mut p = vec![0u8; 8];
        put_u32(&mut p, 4, 1);
        for v in [1u32, 2, 1] {
            p.extend_from_slice(&v.to_be_bytes());
        }
        p
    };
    let stsz = {
        let mut p = vec![0u8; 12];
        put_u32(&mut p, 8, 2);
        p.extend_from_slice(&2u32.to_be_bytes());
        p.extend_from_slice(&2u32.to_be_bytes());
        p
    };
    let stco = {
        let mut p = vec![0u8; 8];
        put_u32(&mut p, 4, 1);
        p.extend_from_slice(&24u32.to_be_bytes());
        p
    };

    let stbl = container(
        b"stbl",
        &[
            leaf(b"stsd", &stsd),
            leaf(b"stts", &stts),
            leaf(b"stsc", &stsc),
            leaf(b"stsz", &stsz),
            leaf(b"stco", &stco),
        ],
    );
    let minf = container(b"minf", &[stbl]);
    let mdia = container(b"mdia", &[leaf(b"mdhd", &mdhd), leaf(b"hdlr", &hdlr), minf]);
    let trak = container(b"trak", &[leaf(b"tkhd", &tkhd), mdia]);
    file.extend(container(b"moov", &[leaf(b"mvhd", &mvhd), trak]));
    file
}

#[test]
fn no_args_shows_usage() {
    let mut cmd = reelbox_cmd();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn version_flag() {
    let mut cmd = reelbox_cmd();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("reelbox"));
}

#[test]
fn info_on_missing_file_fails() {
    let mut cmd = reelbox_cmd();
    cmd.args(["info", "/nonexistent/reelbox.mp4"])
        .assert()
        .failure();
}

#[test]
fn dump_on_garbage_reports_corruption() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("garbage.mp4");
    fs::write(&path, b"not a container").unwrap();

    let mut cmd = reelbox_cmd();
    cmd.arg("dump")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid MP4"));
}

#[test]
fn info_and_dump_on_valid_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tiny.mp4");
    fs::write(&path, tiny_mp4()).unwrap();

    let mut cmd = reelbox_cmd();
    cmd.arg("info")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("duration: 2.000s"))
        .stdout(predicate::str::contains("320x240"));

    let mut cmd = reelbox_cmd();
    cmd.arg("dump")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("moov\n  mvhd\n  trak"));
}

#[test]
fn remux_produces_a_parsable_file() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.mp4");
    let output = dir.path().join("out.mp4");
    fs::write(&input, tiny_mp4()).unwrap();

    let mut cmd = reelbox_cmd();
    cmd.arg("remux")
        .arg(&input)
        .arg(&output)
        .assert()
        .success();

    let mut cmd = reelbox_cmd();
    cmd.arg("info")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("duration: 2.000s"));
}
