//! Synthetic Quality-Control Dataset Generator
//!
//! Writes a sensor CSV (timestamp, temperature, pressure, vibration, speed,
//! quality) suitable for ingestion and splitting.
//!
//! Usage:
//!   cargo run --release --bin dataset_generate -- --rows 2000 --pass-rate 80
//!   cargo run --release --bin dataset_generate -- --rows 500 --days 7 --seed 7 -o line7.csv

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::Parser;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::f64::consts::PI;
use std::path::{Path, PathBuf};

const MIN_ROWS: usize = 10;

#[derive(Parser, Debug)]
#[command(name = "dataset_generate")]
#[command(about = "Generate a synthetic manufacturing quality-control CSV")]
struct Cli {
    /// Number of rows (minimum 10)
    #[arg(short, long, default_value = "1000")]
    rows: usize,

    /// Time span in days (default: one day per 25 rows)
    #[arg(short, long)]
    days: Option<u32>,

    /// Target pass rate in percent
    #[arg(short, long, default_value = "80")]
    pass_rate: f64,

    /// RNG seed
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Output file
    #[arg(short, long, default_value = "manufacturing_data.csv")]
    output: PathBuf,

    /// Overwrite an existing output file
    #[arg(long)]
    force: bool,
}

#[derive(Debug, Clone, Copy)]
enum FailureMode {
    Overheat,
    Pressure,
    Vibration,
    Speed,
    Multiple,
}

impl FailureMode {
    const ALL: [FailureMode; 5] = [
        FailureMode::Overheat,
        FailureMode::Pressure,
        FailureMode::Vibration,
        FailureMode::Speed,
        FailureMode::Multiple,
    ];

    /// (mean, std) for temperature, pressure, vibration, speed.
    fn profile(self) -> [(f64, f64); 4] {
        match self {
            FailureMode::Overheat => [(85.0, 3.0), (1.3, 0.2), (0.2, 0.05), (1480.0, 50.0)],
            FailureMode::Pressure => [(74.0, 2.0), (2.2, 0.3), (0.15, 0.04), (1520.0, 60.0)],
            FailureMode::Vibration => [(73.0, 2.0), (1.4, 0.2), (0.55, 0.15), (1460.0, 50.0)],
            FailureMode::Speed => [(75.0, 2.0), (1.35, 0.2), (0.18, 0.05), (1680.0, 80.0)],
            FailureMode::Multiple => [(88.0, 4.0), (2.4, 0.4), (0.65, 0.2), (1650.0, 100.0)],
        }
    }
}

const NOMINAL_PROFILE: [(f64, f64); 4] = [(72.0, 2.5), (1.25, 0.15), (0.12, 0.03), (1450.0, 40.0)];

#[derive(Debug, Clone)]
struct Reading {
    timestamp: DateTime<Utc>,
    temperature: f64,
    pressure: f64,
    vibration: f64,
    speed: u32,
    pass: bool,
}

/// Sample from normal distribution using Box-Muller transform.
fn sample_normal(rng: &mut ChaCha8Rng, mean: f64, std: f64) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
    mean + std * z
}

fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}

fn generate(rows: usize, days: u32, pass_rate: f64, seed: u64, end: DateTime<Utc>) -> Vec<Reading> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let start = end - Duration::days(days as i64);
    let span_secs = days as f64 * 86_400.0;
    let fail_rate = (100.0 - pass_rate) / 100.0;

    let mut readings = Vec::with_capacity(rows);
    for i in 0..rows {
        // Offsets may run up to a day past `end`
        let offset = rng.gen_range(0.0..span_secs + 86_400.0);
        let timestamp = start + Duration::seconds(offset as i64);

        let stressed = rng.gen_bool(fail_rate.clamp(0.0, 1.0));
        let (profile, pass) = if stressed {
            let mode = FailureMode::ALL[rng.gen_range(0..FailureMode::ALL.len())];
            (mode.profile(), rng.gen_bool(0.1))
        } else {
            (NOMINAL_PROFILE, !rng.gen_bool(0.02))
        };

        let [t, p, v, s] = profile;
        let mut reading = Reading {
            timestamp,
            temperature: sample_normal(&mut rng, t.0, t.1).clamp(60.0, 95.0),
            pressure: sample_normal(&mut rng, p.0, p.1).clamp(0.5, 3.5),
            vibration: sample_normal(&mut rng, v.0, v.1).clamp(0.05, 1.0),
            speed: sample_normal(&mut rng, s.0, s.1).clamp(1200.0, 1800.0) as u32,
            pass,
        };

        // Every 50th row may be an extreme case
        if i > 0 && i % 50 == 0 && rng.gen_bool(0.3) {
            if rng.gen_bool(0.5) {
                reading.temperature = rng.gen_range(70.0..73.0);
                reading.pressure = rng.gen_range(1.15..1.35);
                reading.vibration = rng.gen_range(0.08..0.12);
                reading.speed = rng.gen_range(1430..1470);
                reading.pass = true;
            } else {
                reading.temperature = rng.gen_range(90.0..95.0);
                reading.pressure = rng.gen_range(2.8..3.5);
                reading.vibration = rng.gen_range(0.8..1.0);
                reading.speed = rng.gen_range(1700..1800);
                reading.pass = false;
            }
        }

        readings.push(reading);
    }

    readings.sort_by_key(|r| r.timestamp);
    readings
}

fn write_csv(path: &Path, readings: &[Reading]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    writer.write_record(["timestamp", "temperature", "pressure", "vibration", "speed", "quality"])?;
    for r in readings {
        writer.write_record([
            r.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            format!("{:.1}", round_to(r.temperature, 1)),
            format!("{:.2}", round_to(r.pressure, 2)),
            format!("{:.2}", round_to(r.vibration, 2)),
            r.speed.to_string(),
            if r.pass { "pass" } else { "fail" }.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn print_stats(path: &Path, readings: &[Reading]) {
    let total = readings.len();
    let passes = readings.iter().filter(|r| r.pass).count();
    let pass_pct = passes as f64 / total as f64 * 100.0;

    let range = |f: fn(&Reading) -> f64| {
        readings.iter().map(f).fold((f64::MAX, f64::MIN), |(lo, hi), x| {
            (lo.min(x), hi.max(x))
        })
    };
    let temp = range(|r| r.temperature);
    let pressure = range(|r| r.pressure);
    let vibration = range(|r| r.vibration);
    let speed = range(|r| r.speed as f64);

    println!("=== Dataset Generated ===\n");
    println!("File:        {}", path.display());
    println!("Rows:        {}", total);
    println!("Pass:        {} ({:.1}%)", passes, pass_pct);
    println!("Fail:        {} ({:.1}%)", total - passes, 100.0 - pass_pct);
    if let (Some(first), Some(last)) = (readings.first(), readings.last()) {
        println!("Date range:  {} to {}", first.timestamp, last.timestamp);
    }
    println!();
    println!("Temperature: {:.1} - {:.1}", temp.0, temp.1);
    println!("Pressure:    {:.2} - {:.2}", pressure.0, pressure.1);
    println!("Vibration:   {:.2} - {:.2}", vibration.0, vibration.1);
    println!("Speed:       {:.0} - {:.0} RPM", speed.0, speed.1);
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.rows < MIN_ROWS {
        bail!("need at least {} rows, got {}", MIN_ROWS, cli.rows);
    }
    if !(0.0..=100.0).contains(&cli.pass_rate) {
        bail!("pass rate must be between 0 and 100, got {}", cli.pass_rate);
    }
    let days = cli.days.unwrap_or((cli.rows / 25).max(1) as u32);
    if days == 0 {
        bail!("time span must be at least one day");
    }

    let mut output = cli.output;
    if output.extension().and_then(|e| e.to_str()) != Some("csv") {
        output.set_extension("csv");
    }
    if output.exists() && !cli.force {
        bail!("{} exists; pass --force to overwrite", output.display());
    }

    let readings = generate(cli.rows, days, cli.pass_rate, cli.seed, Utc::now());
    write_csv(&output, &readings)?;
    print_stats(&output, &readings);

    Ok(())
}
