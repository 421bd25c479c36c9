use airgen::config::{AirQualitySource, PipelineConfig, MERGED_CSV_NAME};
use airgen::pipeline;
use airgen::PipelineError;
use polars::prelude::*;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_power_csv(dir: &Path) -> PathBuf {
    let mut text = String::from("month,2020,2021\n");
    for month in 1..=12 {
        let a = 50_000 + ((month * 53) % 17) * 100 + month * 10;
        let b = 52_000 + ((month * 29) % 13) * 150 + month * 12;
        text.push_str(&format!("{},{},{}\n", month, a, b));
    }
    let path = dir.join("power.csv");
    fs::write(&path, text).unwrap();
    path
}

fn air_frame() -> DataFrame {
    let mut year = Vec::new();
    let mut month = Vec::new();
    let mut pm10 = Vec::new();
    let mut no2 = Vec::new();
    for (i, (y, m)) in [2020, 2021]
        .iter()
        .flat_map(|y| (1..=12).map(move |m| (*y, m)))
        .enumerate()
    {
        year.push(y);
        month.push(m);
        pm10.push(40.0 + m as f64 + ((i * 37) % 11) as f64 * 0.7);
        no2.push(20.0 + ((i * 19) % 7) as f64);
    }
    df!(
        "year" => year,
        "month" => month,
        "national_avg_PM10" => pm10,
        "national_avg_NO2" => no2
    )
    .unwrap()
}

fn write_air_csv(dir: &Path) -> PathBuf {
    let path = dir.join("air.csv");
    let mut file = File::create(&path).unwrap();
    CsvWriter::new(&mut file).finish(&mut air_frame()).unwrap();
    path
}

fn config(dir: &TempDir, air: AirQualitySource) -> PipelineConfig {
    let power = write_power_csv(dir.path());
    PipelineConfig::new(air, power, dir.path().join("out"))
}

#[test]
fn two_years_merge_to_24_rows_and_23_regression_rows() {
    let dir = TempDir::new().unwrap();
    let air = write_air_csv(dir.path());
    let config = config(&dir, AirQualitySource::Csv(air));

    let merged = pipeline::prepare_data(&config).unwrap();
    assert_eq!(merged.height(), 24);

    let (frame, results) = pipeline::fit_model(&merged, &config).unwrap();
    assert_eq!(frame.total_rows, 24);
    assert_eq!(frame.n_obs(), 23);
    assert_eq!(results.n_obs, 23);
    assert_eq!(frame.sample_range().unwrap(), Some(((2020, 2), (2021, 12))));
    assert_eq!(results.sample.as_deref(), Some("2020-02 - 2021-12"));

    // const + lag + trend + 11 month dummies
    assert_eq!(results.coefficients.len(), 14);
    assert_eq!(results.df_resid, 23 - 14);
    assert!(results.coefficient("generation_lag1").is_some());
    assert!(results.coefficient("month_1").is_none());
    assert!(results.coefficient("month_12").is_some());
}

#[test]
fn merge_run_writes_bom_csv() {
    let dir = TempDir::new().unwrap();
    let air = write_air_csv(dir.path());
    let config = config(&dir, AirQualitySource::Csv(air));

    let report = pipeline::run_merge(&config).unwrap();
    assert_eq!(report.rows, 24);
    assert_eq!(report.path, dir.path().join("out").join(MERGED_CSV_NAME));

    let bytes = fs::read(&report.path).unwrap();
    assert_eq!(&bytes[..3], b"\xEF\xBB\xBF");
    let text = String::from_utf8_lossy(&bytes[3..]).to_string();
    let header = text.lines().next().unwrap();
    assert_eq!(
        header,
        "date,year,month,national_avg_PM10,national_avg_NO2,generation"
    );
    assert_eq!(text.lines().count(), 25);
    assert!(text.lines().nth(24).unwrap().starts_with("2021-12-01,2021,12,"));
}

#[test]
fn parquet_partitions_feed_the_same_pipeline() {
    let dir = TempDir::new().unwrap();
    let parts = dir.path().join("parts");
    fs::create_dir_all(&parts).unwrap();

    let air = air_frame();
    for (i, year) in [2020, 2021].iter().enumerate() {
        let mut part = air
            .clone()
            .lazy()
            .filter(col("year").eq(lit(*year)))
            .collect()
            .unwrap();
        let file = File::create(parts.join(format!("part-{i:05}.parquet"))).unwrap();
        ParquetWriter::new(file).finish(&mut part).unwrap();
    }

    let config = config(&dir, AirQualitySource::ParquetDir(parts));
    let merged = pipeline::prepare_data(&config).unwrap();
    assert_eq!(merged.height(), 24);
}

#[test]
fn partial_months_are_dropped_by_the_join() {
    let dir = TempDir::new().unwrap();
    let air_path = dir.path().join("air.csv");
    let mut only_2021 = air_frame()
        .lazy()
        .filter(col("year").eq(lit(2021)))
        .collect()
        .unwrap();
    CsvWriter::new(&mut File::create(&air_path).unwrap())
        .finish(&mut only_2021)
        .unwrap();

    let config = config(&dir, AirQualitySource::Csv(air_path));
    let merged = pipeline::prepare_data(&config).unwrap();
    assert_eq!(merged.height(), 12);

    let matrix = pipeline::correlations(&merged).unwrap();
    assert_eq!(
        matrix.labels,
        vec!["national_avg_PM10", "national_avg_NO2", "generation"]
    );
}

#[test]
fn missing_input_aborts_the_run() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir, AirQualitySource::Csv(dir.path().join("missing.csv")));

    let err = pipeline::run_merge(&config).unwrap_err();
    assert!(matches!(err, PipelineError::FileNotFound(_)));
    assert!(!dir.path().join("out").join(MERGED_CSV_NAME).exists());
}

#[test]
fn regression_outputs_are_written_as_text_and_json() {
    let dir = TempDir::new().unwrap();
    let air = write_air_csv(dir.path());
    let config = config(&dir, AirQualitySource::Csv(air));
    fs::create_dir_all(config.output_dir()).unwrap();

    let merged = pipeline::prepare_data(&config).unwrap();
    let (_, results) = pipeline::fit_model(&merged, &config).unwrap();
    let (summary_path, json_path) = pipeline::write_regression_outputs(&results, &config).unwrap();

    assert_eq!(summary_path, config.output_dir().join("regression_summary_PM10.txt"));
    let summary = fs::read_to_string(&summary_path).unwrap();
    assert!(summary.contains("generation_lag1"));
    assert!(summary.contains("national_avg_PM10"));

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(json["n_obs"], 23);
    assert_eq!(json["coefficients"].as_array().unwrap().len(), 14);
    assert_eq!(json["coefficients"][0]["name"], "const");
}

#[test]
fn regression_outputs_survive_a_heatmap_failure() {
    let dir = TempDir::new().unwrap();
    let air = write_air_csv(dir.path());
    let config = config(&dir, AirQualitySource::Csv(air));
    // A directory in place of the PNG makes the chart step fail.
    fs::create_dir_all(config.heatmap_path()).unwrap();

    assert!(pipeline::run_analysis(&config).is_err());
    assert!(config.summary_path().is_file());
    assert!(config.coefficients_path().is_file());
}
