use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

const SIDE: u32 = 200;
const MARKS: [(f64, f64); 4] = [(50.0, 50.0), (150.0, 50.0), (150.0, 150.0), (50.0, 150.0)];

fn render_png(path: &Path, spot: (f64, f64)) {
    let mut buf = vec![0u8; (SIDE * SIDE) as usize];
    for y in 0..SIDE {
        for x in 0..SIDE {
            let mut v = 0.0f64;
            for (mx, my) in MARKS {
                let d = ((x as f64 - mx).powi(2) + (y as f64 - my).powi(2)).sqrt();
                v += 255.0 * (-(d - 5.0).powi(2) / 2.0).exp();
            }
            let d2 = (x as f64 - spot.0).powi(2) + (y as f64 - spot.1).powi(2);
            v += 255.0 * (-d2 / 12.5).exp();
            buf[(y * SIDE + x) as usize] = v.min(255.0).round() as u8;
        }
    }
    image::GrayImage::from_raw(SIDE, SIDE, buf)
        .expect("buffer size")
        .save(path)
        .expect("save frame");
}

fn write_templates(path: &Path) {
    let json = r#"[
        {"id": "Spot", "center": [100.0, 100.0], "half_size": 8},
        {"id": "Mark1", "center": [50.0, 50.0], "half_size": 8},
        {"id": "Mark2", "center": [150.0, 50.0], "half_size": 8},
        {"id": "Mark3", "center": [150.0, 150.0], "half_size": 8},
        {"id": "Mark4", "center": [50.0, 150.0], "half_size": 8}
    ]"#;
    fs::write(path, json).expect("write templates");
}

#[test]
fn tracks_a_folder_and_prints_one_row_per_frame() {
    let dir = tempfile::tempdir().expect("tempdir");
    let frames = dir.path().join("frames");
    fs::create_dir(&frames).expect("mkdir");
    render_png(&frames.join("frame_000.png"), (100.0, 100.0));
    render_png(&frames.join("frame_001.png"), (110.0, 100.0));
    render_png(&frames.join("frame_002.png"), (115.0, 100.0));
    let templates = dir.path().join("templates.json");
    write_templates(&templates);
    let json_out = dir.path().join("records.json");

    Command::cargo_bin("spot-track")
        .expect("binary")
        .arg(&frames)
        .arg("--templates")
        .arg(&templates)
        .arg("--radius")
        .arg("16")
        .arg("--mark-dist")
        .arg("100")
        .arg("--json")
        .arg(&json_out)
        .assert()
        .success()
        .stdout(predicate::function(|out: &str| {
            let lines: Vec<&str> = out.trim().lines().collect();
            lines.len() == 4 && lines[0].starts_with("index,seconds,x_abs,y_abs,dL")
        }));

    let records: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&json_out).expect("read json"))
            .expect("parse json");
    let records = records.as_array().expect("array");
    assert_eq!(records.len(), 3);
    let last_dl = records[2]["dl"].as_f64().expect("dl");
    assert!((last_dl - 15.0).abs() < 1.0, "dL {last_dl} not near 15");
}

#[test]
fn missing_template_file_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let frames = dir.path().join("frames");
    fs::create_dir(&frames).expect("mkdir");
    render_png(&frames.join("frame_000.png"), (100.0, 100.0));

    Command::cargo_bin("spot-track")
        .expect("binary")
        .arg(&frames)
        .arg("--templates")
        .arg(dir.path().join("absent.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("absent.json"));
}

#[test]
fn empty_folder_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let frames = dir.path().join("frames");
    fs::create_dir(&frames).expect("mkdir");
    let templates = dir.path().join("templates.json");
    write_templates(&templates);

    Command::cargo_bin("spot-track")
        .expect("binary")
        .arg(&frames)
        .arg("--templates")
        .arg(&templates)
        .assert()
        .failure()
        .stderr(predicate::str::contains("no frames"));
}
