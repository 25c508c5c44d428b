//! Shell command lines sent to the device and parsing of their output

use lazy_static::lazy_static;
use regex::Regex;

use crate::geometry::ScreenSize;

pub const SCREEN_SIZE_COMMAND: &str = "wm size | awk 'END{print $3}'";
pub const SCREEN_DENSITY_COMMAND: &str = "wm density | awk 'END{print $3}'";
pub const RESET_SCREEN_SIZE_COMMAND: &str = "wm size reset";
pub const RESET_SCREEN_DENSITY_COMMAND: &str = "wm density reset";
pub const MEMORY_COMMAND: &str = "grep MemTotal /proc/meminfo";
pub const BACK_COMMAND: &str = "input keyevent 4";
pub const SCREENCAP_COMMAND: &str = "screencap -p";

lazy_static! {
    static ref SIZE_RE: Regex = Regex::new(r"(\d+)x(\d+)").unwrap();
    static ref NUMBER_RE: Regex = Regex::new(r"\d+").unwrap();
}

/// `input swipe` with identical endpoints is how taps are issued too
pub fn swipe_command(x1: i32, y1: i32, x2: i32, y2: i32, duration_ms: u32) -> String {
    format!("input swipe {} {} {} {} {}", x1, y1, x2, y2, duration_ms)
}

pub fn set_screen_size_command(width: u32, height: u32) -> String {
    format!("wm size {}x{}", width, height)
}

pub fn set_screen_density_command(density: u32) -> String {
    format!("wm density {}", density)
}

/// Last non-empty line of shell output
fn trailing_line(output: &str) -> Option<&str> {
    output.lines().map(str::trim).filter(|l| !l.is_empty()).last()
}

/// First integer on the last non-empty line
pub fn parse_trailing_number(output: &str) -> Option<u64> {
    let line = trailing_line(output)?;
    NUMBER_RE.find(line)?.as_str().parse().ok()
}

/// `1080x1920` on the last non-empty line
pub fn parse_screen_size(output: &str) -> Option<ScreenSize> {
    let caps = SIZE_RE.captures(trailing_line(output)?)?;
    Some(ScreenSize {
        width: caps[1].parse().ok()?,
        height: caps[2].parse().ok()?,
    })
}

/// `MemTotal: <n> kB` -> megabytes, floor
pub fn parse_memory_mb(output: &str) -> Option<u64> {
    parse_trailing_number(output).map(|kb| kb / 1024)
}
