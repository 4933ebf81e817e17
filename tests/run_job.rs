use image::{Rgb, RgbImage};
use retypeset::{Config, run};
use serde_json::Value;

#[test]
fn job_writes_image_and_report() {
    let dir = tempfile::tempdir().unwrap();
    let image_path = dir.path().join("sign.png");
    RgbImage::from_fn(160, 60, |x, y| {
        if (30..130).contains(&x) && (20..40).contains(&y) && x % 7 < 3 {
            Rgb([20, 20, 20])
        } else {
            Rgb([250, 240, 200])
        }
    })
    .save(&image_path)
    .unwrap();

    let regions_path = dir.path().join("regions.json");
    std::fs::write(
        &regions_path,
        r#"[
            {"box": [[25, 15], [135, 15], [135, 45], [25, 45]], "text": "欢迎光临"},
            {"box": [[0, 0], [10, 0], [10, 10], [0, 10]], "text": ""}
        ]"#,
    )
    .unwrap();
    let translations_path = dir.path().join("translations.json");
    std::fs::write(&translations_path, r#"["Welcome"]"#).unwrap();
    let report_path = dir.path().join("report.json");

    let stdout = run(Config {
        image: image_path.clone(),
        regions: regions_path,
        translations: Some(translations_path),
        report: Some(report_path.clone()),
        solid_background: true,
        settings_home: Some(dir.path().join("home")),
        ..Config::default()
    })
    .unwrap();
    assert!(stdout.is_empty());

    let output = image::open(dir.path().join("sign_translated.png")).unwrap();
    assert_eq!((output.width(), output.height()), (160, 60));

    let report: Value =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(report["source_lang"], "zh");
    let regions = report["regions"].as_array().unwrap();
    assert_eq!(regions.len(), 1);
    assert_eq!(regions[0]["text"], "欢迎光临");
    assert_eq!(regions[0]["translated_text"], "Welcome");
    assert_eq!(regions[0]["box"][1], serde_json::json!([135.0, 15.0]));
    assert!(regions[0]["style"]["font_size"].as_u64().unwrap() >= 12);
}

#[test]
fn report_goes_to_stdout_without_a_path() {
    let dir = tempfile::tempdir().unwrap();
    let image_path = dir.path().join("blank.png");
    RgbImage::from_pixel(40, 40, Rgb([255, 255, 255]))
        .save(&image_path)
        .unwrap();
    let regions_path = dir.path().join("regions.json");
    std::fs::write(&regions_path, "[]").unwrap();
    let output_path = dir.path().join("out.png");

    let stdout = run(Config {
        image: image_path,
        regions: regions_path,
        output: Some(output_path.clone()),
        source_lang: Some("ja".to_string()),
        settings_home: Some(dir.path().join("home")),
        ..Config::default()
    })
    .unwrap();
    let report: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["source_lang"], "ja");
    assert!(report["regions"].as_array().unwrap().is_empty());
    assert!(output_path.exists());
}

#[test]
fn missing_regions_file_names_the_path() {
    let dir = tempfile::tempdir().unwrap();
    let image_path = dir.path().join("blank.png");
    RgbImage::from_pixel(8, 8, Rgb([255, 255, 255]))
        .save(&image_path)
        .unwrap();
    let err = run(Config {
        image: image_path,
        regions: dir.path().join("absent.json"),
        settings_home: Some(dir.path().join("home")),
        ..Config::default()
    })
    .unwrap_err();
    assert!(format!("{:#}", err).contains("absent.json"));
}

#[test]
fn translations_line_up_with_the_regions_file() {
    let dir = tempfile::tempdir().unwrap();
    let image_path = dir.path().join("door.png");
    RgbImage::from_pixel(160, 60, Rgb([255, 255, 255]))
        .save(&image_path)
        .unwrap();
    let regions_path = dir.path().join("regions.json");
    std::fs::write(
        &regions_path,
        r#"[
            {"box": [[0, 0], [10, 0], [10, 10], [0, 10]], "text": ""},
            {"box": [[25, 15], [135, 15], [135, 45], [25, 45]], "text": "欢迎光临"}
        ]"#,
    )
    .unwrap();
    let translations_path = dir.path().join("translations.json");
    std::fs::write(&translations_path, r#"["", "Welcome"]"#).unwrap();
    let home = dir.path().join("home");

    let stdout = run(Config {
        image: image_path,
        regions: regions_path,
        translations: Some(translations_path),
        output: Some(dir.path().join("out.png")),
        settings_home: Some(home.clone()),
        ..Config::default()
    })
    .unwrap();
    let report: Value = serde_json::from_str(&stdout).unwrap();
    let regions = report["regions"].as_array().unwrap();
    assert_eq!(regions.len(), 1);
    assert_eq!(regions[0]["text"], "欢迎光临");
    assert_eq!(regions[0]["translated_text"], "Welcome");
    assert!(home.join("settings.toml").exists());
}
