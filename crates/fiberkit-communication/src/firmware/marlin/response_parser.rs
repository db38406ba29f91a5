//! Marlin response parser
//!
//! Classifies single response lines. Matching is case-insensitive: a line
//! that starts with `ok` acknowledges, and `busy` or `error` anywhere in a
//! line marks it as a busy or error report.

/// Filament sensor state reported by `M119`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilamentState {
    /// `filament: open`: the plunger is clear of the sensor
    Open,
    /// `filament: TRIGGERED`: the plunger still presses the sensor
    Triggered,
}

/// Parsed Marlin response
#[derive(Debug, Clone, PartialEq)]
pub enum MarlinResponse {
    /// Command acknowledged (`ok`, `ok T:...`)
    Ok,
    /// Still processing (`echo:busy: processing`)
    Busy(String),
    /// Error report with the full line
    Error(String),
    /// Filament sensor line from an endstop report
    Filament(FilamentState),
    /// Anything else (echo lines, endstop states, start banner)
    Raw(String),
}

/// Parser for Marlin response lines
#[derive(Debug, Clone, Default)]
pub struct MarlinResponseParser;

impl MarlinResponseParser {
    /// Create a new response parser
    pub fn new() -> Self {
        Self
    }

    /// Parse a single line. Blank lines yield `None`.
    pub fn parse_line(&self, line: &str) -> Option<MarlinResponse> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        match line {
            "filament: open" => return Some(MarlinResponse::Filament(FilamentState::Open)),
            "filament: TRIGGERED" => {
                return Some(MarlinResponse::Filament(FilamentState::Triggered))
            }
            _ => {}
        }

        let low = line.to_lowercase();
        if low.starts_with("ok") {
            Some(MarlinResponse::Ok)
        } else if low.contains("busy") {
            Some(MarlinResponse::Busy(line.to_string()))
        } else if low.contains("error") {
            Some(MarlinResponse::Error(line.to_string()))
        } else {
            Some(MarlinResponse::Raw(line.to_string()))
        }
    }
}
