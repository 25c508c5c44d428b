//! adb-ocr CLI - Command-line interface for ADB device control and screen text
//!
//! Usage:
//!     adb-ocr [OPTIONS] <COMMAND>
//!
//! Environment Variables:
//!     ADB_OCR_PORT: Device port (default: 5555)
//!     ADB_OCR_HOST: Device host (default: localhost)
//!     ADB_OCR_LANG: OCR language (default: ch)
//!     ADB_OCR_ADB_PATH: adb binary (default: adb)
//!     ADB_OCR_MODEL_DIR: PaddleOCR model root (default: models)

use adb_ocr::{
    list_supported_languages, BoundingBox, DeviceSession, LoadOptions, ScreenshotSaver,
    DEFAULT_CONFIDENCE, DEFAULT_HOST, DEFAULT_LANGUAGE, SETTINGS,
};
use anyhow::{anyhow, bail, Result};
use base64::{engine::general_purpose, Engine as _};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// ADB OCR - Android device control and on-screen text location
#[derive(Parser, Debug)]
#[command(name = "adb-ocr")]
#[command(about = "ADB OCR - Android device control and on-screen text location")]
#[command(after_help = r#"Examples:
    # Connect (scanning local ports if 5555 is not an adb device) and show status
    adb-ocr status

    # Connect to a specific emulator port without scanning
    adb-ocr --port 16384 --no-scan status

    # Tap, swipe, go back
    adb-ocr tap 540 1200
    adb-ocr swipe 540 1600 540 400 --duration 300
    adb-ocr back

    # Read all text on screen as JSON
    adb-ocr text --json

    # Read text in a region with a lower threshold
    adb-ocr text --area 0,0,1080,400 --confidence 0.6

    # Tap the first text containing "Start"
    adb-ocr --lang en click-text Start
"#)]
struct Cli {
    /// Device port
    #[arg(short = 'p', long, env = "ADB_OCR_PORT", default_value = "5555")]
    port: u16,

    /// Device host
    #[arg(long, env = "ADB_OCR_HOST", default_value = DEFAULT_HOST)]
    host: String,

    /// Do not scan local ports when the connection fails
    #[arg(long)]
    no_scan: bool,

    /// OCR language (ch, en, japan, korean, ...)
    #[arg(short = 'l', long, env = "ADB_OCR_LANG", default_value = DEFAULT_LANGUAGE)]
    lang: String,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show connection status and device properties
    Status,
    /// Print the screen size
    ScreenSize,
    /// Override the screen size
    SetScreenSize { width: u32, height: u32 },
    /// Restore the physical screen size
    ResetScreenSize,
    /// Print the screen density
    Density,
    /// Override the screen density
    SetDensity { density: u32 },
    /// Restore the physical screen density
    ResetDensity,
    /// Print total memory in MB
    Memory,
    /// Tap at a point
    Tap { x: i32, y: i32 },
    /// Swipe between two points
    Swipe {
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
        /// Duration in ms (random 60-120 ms if omitted)
        #[arg(long)]
        duration: Option<u32>,
    },
    /// Press the back key
    Back,
    /// Capture the screen
    Screenshot {
        /// Directory to save into (a timestamped subdirectory is created)
        #[arg(long, env = "ADB_OCR_SCREENSHOT_DIR")]
        dir: Option<PathBuf>,
        /// Print the PNG as base64 instead of saving it
        #[arg(long)]
        base64: bool,
    },
    /// Recognize text on screen
    Text {
        /// Region to read, as x,y,width,height
        #[arg(long, value_parser = parse_area)]
        area: Option<BoundingBox>,
        /// Minimum confidence (exclusive)
        #[arg(long, default_value_t = DEFAULT_CONFIDENCE)]
        confidence: f32,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Tap the first on-screen text containing NEEDLE
    ClickText {
        needle: String,
        /// Region to search, as x,y,width,height
        #[arg(long, value_parser = parse_area)]
        area: Option<BoundingBox>,
        /// Minimum confidence (exclusive)
        #[arg(long, default_value_t = DEFAULT_CONFIDENCE)]
        confidence: f32,
    },
    /// List supported OCR languages and exit
    Languages,
}

impl Commands {
    /// Whether the command needs a connected device
    fn needs_device(&self) -> bool {
        !matches!(self, Commands::Languages)
    }
}

/// Parse `x,y,width,height`
fn parse_area(s: &str) -> std::result::Result<BoundingBox, String> {
    let parts: Vec<i32> = s
        .split(',')
        .map(|p| p.trim().parse::<i32>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| format!("invalid area '{}': {}", s, e))?;

    match parts.as_slice() {
        [x, y, w, h] if *w >= 0 && *h >= 0 => Ok(BoundingBox::new(*x, *y, *w, *h)),
        [_, _, _, _] => Err(format!("area '{}' has a negative size", s)),
        _ => Err(format!("area '{}' must be x,y,width,height", s)),
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Check that the adb client is installed and runs
async fn check_adb_installed() -> bool {
    let adb = &SETTINGS.adb.adb_path;

    if which::which(adb).is_err() {
        eprintln!("\u{274C} adb is not installed or not in PATH ({}).", adb);
        eprintln!("   Install it:");
        eprintln!("     - macOS: brew install android-platform-tools");
        eprintln!("     - Linux: sudo apt install android-tools-adb");
        eprintln!(
            "     - Windows: Download from https://developer.android.com/studio/releases/platform-tools"
        );
        eprintln!("   Or point ADB_OCR_ADB_PATH at the binary.");
        return false;
    }

    match tokio::time::timeout(Duration::from_secs(10), Command::new(adb).arg("version").output())
        .await
    {
        Ok(Ok(output)) if output.status.success() => true,
        Ok(Ok(_)) => {
            eprintln!("\u{274C} adb command failed to run.");
            false
        }
        Ok(Err(e)) => {
            eprintln!("\u{274C} adb could not be started: {}", e);
            false
        }
        Err(_) => {
            eprintln!("\u{274C} adb version timed out.");
            false
        }
    }
}

/// Print supported OCR languages
fn print_languages() {
    println!("Supported OCR languages:");
    let mut languages = list_supported_languages();
    languages.sort();
    for language in languages {
        println!("  - {}", language);
    }
}

async fn print_status(session: &DeviceSession) {
    println!("{}", "=".repeat(50));
    println!(
        "Device: {}",
        session.device_serial().unwrap_or("(not connected)")
    );
    println!(
        "OCR engine: {}",
        if session.has_ocr_engine() {
            "loaded"
        } else {
            "unavailable"
        }
    );

    if let Some(size) = session.get_screen_size().await {
        println!("Screen size: {}", size);
    }
    if let Some(density) = session.get_screen_density().await {
        println!("Density: {} dpi", density);
    }
    if let Some(memory) = session.get_memory().await {
        println!("Memory: {} MB", memory);
    }
    println!("{}", "=".repeat(50));
}

async fn run_command(session: &DeviceSession, command: Commands) -> Result<()> {
    match command {
        Commands::Status => print_status(session).await,
        Commands::ScreenSize => {
            let size = session
                .get_screen_size()
                .await
                .ok_or_else(|| anyhow!("could not read the screen size"))?;
            println!("{}", size);
        }
        Commands::SetScreenSize { width, height } => {
            session.set_screen_size(width, height).await?;
        }
        Commands::ResetScreenSize => session.reset_screen_size().await?,
        Commands::Density => {
            let density = session
                .get_screen_density()
                .await
                .ok_or_else(|| anyhow!("could not read the screen density"))?;
            println!("{}", density);
        }
        Commands::SetDensity { density } => session.set_screen_density(density).await?,
        Commands::ResetDensity => session.reset_screen_density().await?,
        Commands::Memory => {
            let memory = session
                .get_memory()
                .await
                .ok_or_else(|| anyhow!("could not read the device memory"))?;
            println!("{} MB", memory);
        }
        Commands::Tap { x, y } => session.click(x, y).await?,
        Commands::Swipe {
            x1,
            y1,
            x2,
            y2,
            duration,
        } => session.swipe(x1, y1, x2, y2, duration).await?,
        Commands::Back => session.go_back().await?,
        Commands::Screenshot { dir, base64 } => {
            if base64 {
                let screen = session
                    .get_screen()
                    .await
                    .ok_or_else(|| anyhow!("screen capture failed"))?;
                let png = adb_ocr::adb::encode_png(&screen)?;
                println!("{}", general_purpose::STANDARD.encode(png));
            } else {
                let dir = dir.unwrap_or_else(|| PathBuf::from("screenshots"));
                let mut saver = ScreenshotSaver::new(&dir).await?;
                match session.save_screen(&mut saver).await? {
                    Some(path) => println!("Saved {}", path.display()),
                    None => bail!("screen capture failed"),
                }
            }
        }
        Commands::Text {
            area,
            confidence,
            json,
        } => {
            let results = session.get_screen_text(area, confidence).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&results.unwrap_or_default())?);
            } else {
                match results {
                    Some(results) => {
                        for r in results {
                            println!("[{}] {}", r.bounding_box, r.text);
                        }
                    }
                    None => println!("No text found."),
                }
            }
        }
        Commands::ClickText {
            needle,
            area,
            confidence,
        } => {
            if session.click_text(&needle, area, confidence).await? {
                println!("Tapped '{}'", needle);
            } else {
                bail!("'{}' not found on screen", needle);
            }
        }
        Commands::Languages => print_languages(),
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.verbose);

    if !args.command.needs_device() {
        return run_command(&DeviceSession::new(), args.command).await;
    }

    if !check_adb_installed().await {
        std::process::exit(1);
    }

    let mut session = DeviceSession::new();
    let options = LoadOptions::new()
        .with_host(&args.host)
        .with_scan_if_fail(!args.no_scan)
        .with_language(&args.lang);
    debug!("Loading session on port {} with {:?}", args.port, options);
    session.load(args.port, options).await;

    if !session.is_connected() {
        eprintln!(
            "\u{274C} Could not connect to {}:{}. Make sure ADB is enabled on the device or emulator.",
            args.host, args.port
        );
        std::process::exit(1);
    }

    run_command(&session, args.command).await
}
