use std::path::{Path, PathBuf};

fn exe() -> PathBuf {
    std::env::var_os("CARGO_BIN_EXE_showreel")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let mut p = PathBuf::from("target").join("debug");
            p.push(if cfg!(windows) {
                "showreel.exe"
            } else {
                "showreel"
            });
            p
        })
}

fn fixture_dir(name: &str) -> PathBuf {
    let dir = PathBuf::from("target").join("cli_smoke").join(name);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn arg(p: &Path) -> String {
    p.to_string_lossy().to_string()
}

fn write_png(path: &Path, w: u32, h: u32) {
    let img = image::RgbaImage::from_fn(w, h, |x, y| {
        image::Rgba([(x * 255 / w) as u8, (y * 255 / h) as u8, 128, 255])
    });
    image::save_buffer_with_format(
        path,
        img.as_raw(),
        w,
        h,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .unwrap();
}

#[test]
fn cli_simulate_writes_trace() {
    let dir = fixture_dir("simulate");
    let script_path = dir.join("script.json");
    let out_path = dir.join("trace.json");
    let _ = std::fs::remove_file(&out_path);

    let script = serde_json::json!({
        "viewport": { "width": 400, "height": 800 },
        "steps": [
            { "event": { "type": "scroll", "y": 800 }, "wait_ms": 50 },
            { "event": { "type": "key", "key": "arrow_down" }, "wait_ms": 1000 },
            { "event": { "type": "scroll", "y": 5000 }, "wait_ms": 16 }
        ]
    });
    std::fs::write(&script_path, serde_json::to_vec_pretty(&script).unwrap()).unwrap();

    let status = std::process::Command::new(exe())
        .args(["simulate", "--script"])
        .arg(arg(&script_path))
        .arg("--out")
        .arg(arg(&out_path))
        .status()
        .unwrap();
    assert!(status.success());

    let trace: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&out_path).unwrap()).unwrap();
    let steps = trace.as_array().unwrap();
    assert_eq!(steps.len(), 3);
    assert_eq!(steps[0]["scroll_y"], 800.0);
    assert_eq!(steps[1]["index"], 1);
    // gallery incomplete: the page cannot leave it
    assert_eq!(steps[2]["scroll_y"], 800.0);
}

#[test]
fn cli_magnify_and_spotlight_write_pngs() {
    let dir = fixture_dir("effects");
    let input = dir.join("in.png");
    write_png(&input, 48, 32);

    for (cmd, extra) in [
        ("magnify", vec!["--zoom", "1"]),
        ("spotlight", vec![]),
    ] {
        let out = dir.join(format!("{cmd}.png"));
        let _ = std::fs::remove_file(&out);
        let status = std::process::Command::new(exe())
            .args([cmd, "--image"])
            .arg(arg(&input))
            .args(["--pointer", "0.25,0.5"])
            .args(extra)
            .arg("--out")
            .arg(arg(&out))
            .status()
            .unwrap();
        assert!(status.success(), "{cmd} failed");

        let img = image::open(&out).unwrap().to_rgba8();
        assert_eq!(img.dimensions(), (48, 32));
    }
}

#[test]
fn cli_rejects_bad_pointer() {
    let dir = fixture_dir("bad_pointer");
    let input = dir.join("in.png");
    write_png(&input, 8, 8);
    let status = std::process::Command::new(exe())
        .args(["spotlight", "--image"])
        .arg(arg(&input))
        .args(["--pointer", "half", "--out"])
        .arg(arg(&dir.join("out.png")))
        .status()
        .unwrap();
    assert!(!status.success());
}
