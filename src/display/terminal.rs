// src/display/terminal.rs
//! Terminal live chart

use crate::{
    config::MonitorConfig,
    error::Result,
    telemetry::{SharedState, TelemetryState},
};
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    execute, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType, DisableLineWrap, EnableLineWrap},
};
use std::{
    io::{self, Write},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::time::sleep;

/// Distance band used to color readings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    Danger,
    Near,
    Clear,
    Far,
}

impl Band {
    pub fn color(&self) -> Color {
        match self {
            Band::Danger => Color::Red,
            Band::Near => Color::Yellow,
            Band::Clear => Color::Green,
            Band::Far => Color::Blue,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChartSettings {
    pub max_cm: f64,
    pub safe_cm: f64,
    pub low_cm: f64,
    pub high_cm: f64,
    pub width: usize,
    pub height: usize,
}

impl ChartSettings {
    pub fn from_config(config: &MonitorConfig) -> Self {
        Self {
            max_cm: config.max_distance_cm,
            safe_cm: config.safe_distance_cm,
            low_cm: config.low_threshold_cm,
            high_cm: config.high_threshold_cm,
            ..Self::default()
        }
    }

    pub fn band(&self, cm: f64) -> Band {
        if cm < self.safe_cm {
            Band::Danger
        } else if cm < self.low_cm {
            Band::Near
        } else if cm < self.high_cm {
            Band::Clear
        } else {
            Band::Far
        }
    }

    /// Bar height in rows for one reading
    pub fn bar_height(&self, cm: f64) -> usize {
        let ratio = (cm / self.max_cm).clamp(0.0, 1.0);
        (ratio * self.height as f64).round() as usize
    }

    /// Row level (1 = bottom) where the safe-distance marker is drawn
    pub fn safe_level(&self) -> usize {
        self.bar_height(self.safe_cm).max(1)
    }
}

impl Default for ChartSettings {
    fn default() -> Self {
        Self {
            max_cm: 200.0,
            safe_cm: 15.0,
            low_cm: 25.0,
            high_cm: 100.0,
            width: 60,
            height: 12,
        }
    }
}

/// One chart row as (glyph, band) cells, top row first
pub fn chart_rows(values: &[f64], settings: &ChartSettings) -> Vec<Vec<(char, Option<Band>)>> {
    let heights: Vec<usize> = values.iter().map(|&v| settings.bar_height(v)).collect();
    let safe = settings.safe_level();

    (1..=settings.height)
        .rev()
        .map(|level| {
            heights
                .iter()
                .zip(values)
                .map(|(&h, &v)| {
                    if h >= level {
                        ('█', Some(settings.band(v)))
                    } else if level == safe {
                        ('-', None)
                    } else {
                        (' ', None)
                    }
                })
                .collect()
        })
        .collect()
}

pub struct TerminalDisplay {
    chart: ChartSettings,
    refresh: Duration,
}

impl TerminalDisplay {
    pub fn new(chart: ChartSettings, refresh: Duration) -> Self {
        Self { chart, refresh }
    }

    /// Start the terminal display loop
    pub async fn run(&self, state: SharedState, running: Arc<AtomicBool>) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(stdout, Hide, DisableLineWrap)?;

        // Set up Ctrl+C handler
        let running_clone = Arc::clone(&running);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                running_clone.store(false, Ordering::Relaxed);
            }
        });

        while running.load(Ordering::Relaxed) {
            queue!(stdout, Clear(ClearType::All), MoveTo(0, 0))?;

            let snapshot = state.snapshot();
            self.render_display(&mut stdout, &snapshot)?;

            stdout.flush()?;
            sleep(self.refresh).await;
        }

        execute!(stdout, Show, EnableLineWrap)?;
        println!("\nShutting down...");
        Ok(())
    }

    /// Render the telemetry state to the terminal
    pub fn render_display(&self, out: &mut impl Write, state: &TelemetryState) -> Result<()> {
        queue!(
            out,
            SetForegroundColor(Color::Green),
            Print("=".repeat(60)),
            Print("\n"),
            Print("Telemetry Monitor - Live Distance & GPS"),
            Print("\n"),
            Print("=".repeat(60)),
            Print("\n"),
            ResetColor
        )?;

        let timestamp_str = match state.timestamp {
            Some(ts) => ts.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            None => "No data received".to_string(),
        };
        let source_str = state.source.as_deref().unwrap_or("Unknown");
        let (status, status_color) = if state.is_recent() {
            ("LIVE", Color::Green)
        } else {
            ("STALE", Color::Red)
        };
        queue!(
            out,
            Print("Status: "),
            SetForegroundColor(status_color),
            Print(status),
            ResetColor,
            Print("\n"),
            Print(format!("Last Update: {} ({})\n", timestamp_str, source_str)),
            Print(format!("Lines: {} accepted, {} rejected\n\n", state.accepted, state.rejected))
        )?;

        if state.has_fix() {
            self.render_position_section(out, state)?;
        }
        if !state.readings.is_empty() {
            self.render_distance_section(out, state)?;
        }
        self.render_raw_data_section(out, state)?;

        queue!(
            out,
            SetForegroundColor(Color::Green),
            Print("=".repeat(60)),
            Print("\n"),
            Print("Press Ctrl+C to exit"),
            Print("\n"),
            ResetColor
        )?;

        Ok(())
    }

    fn render_position_section(&self, out: &mut impl Write, state: &TelemetryState) -> Result<()> {
        let latest = state.latest.as_ref();

        queue!(
            out,
            SetForegroundColor(Color::Yellow),
            Print("POSITION:\n"),
            ResetColor,
            Print(format!(
                "  Latitude:   {}\n",
                TelemetryState::format_coordinate(latest.map(|s| s.latitude))
            )),
            Print(format!(
                "  Longitude:  {}\n",
                TelemetryState::format_coordinate(latest.map(|s| s.longitude))
            )),
            Print(format!(
                "  Altitude:   {}\n",
                TelemetryState::format_value(latest.and_then(|s| s.altitude), "m")
            )),
            Print(format!(
                "  Satellites: {}\n\n",
                TelemetryState::format_value(latest.map(|s| s.satellites), "")
            ))
        )?;

        queue!(
            out,
            SetForegroundColor(Color::Cyan),
            Print("MOVEMENT:\n"),
            ResetColor,
            Print(format!(
                "  Speed:      {}\n",
                TelemetryState::format_value(latest.map(|s| format!("{:.2}", s.speed_kmh)), "km/h")
            )),
            Print(format!(
                "  Distance:   {}\n",
                TelemetryState::format_value(Some(format!("{:.1}", state.total_distance_m)), "m")
            )),
            Print(format!("  Path:       {:>12} points\n\n", state.path.len()))
        )?;

        Ok(())
    }

    fn render_distance_section(&self, out: &mut impl Write, state: &TelemetryState) -> Result<()> {
        let latest = state.latest_reading().map(|r| r.distance_cm);

        queue!(
            out,
            SetForegroundColor(Color::Magenta),
            Print("DISTANCE:\n"),
            ResetColor,
            Print(format!(
                "  Latest:     {}   (safe: {} cm)\n",
                TelemetryState::format_value(latest, "cm"),
                self.chart.safe_cm
            ))
        )?;

        if let Some(cm) = latest {
            let band = self.chart.band(cm);
            if band == Band::Danger {
                queue!(
                    out,
                    SetForegroundColor(band.color()),
                    Print("  !! Obstacle inside safe distance !!\n"),
                    ResetColor
                )?;
            }
        }

        let values: Vec<f64> = state
            .readings
            .recent(self.chart.width)
            .map(|r| r.distance_cm)
            .collect();

        for row in chart_rows(&values, &self.chart) {
            queue!(out, Print("  |"))?;
            for (glyph, band) in row {
                match band {
                    Some(band) => queue!(out, SetForegroundColor(band.color()), Print(glyph), ResetColor)?,
                    None => queue!(out, Print(glyph))?,
                }
            }
            queue!(out, Print("\n"))?;
        }
        queue!(out, Print(format!("  +{}\n\n", "-".repeat(values.len()))))?;

        Ok(())
    }

    fn render_raw_data_section(&self, out: &mut impl Write, state: &TelemetryState) -> Result<()> {
        queue!(out, SetForegroundColor(Color::Blue), Print("RAW DATA:\n"), ResetColor)?;

        if state.raw_history.is_empty() {
            queue!(out, Print("  No data\n\n"))?;
            return Ok(());
        }

        // Oldest first, newest highlighted
        let last = state.raw_history.len() - 1;
        for (i, line) in state.raw_history.iter().enumerate() {
            if i == last {
                queue!(out, SetForegroundColor(Color::White), Print(format!("> {}\n", line)), ResetColor)?;
            } else {
                queue!(out, Print(format!("  {}\n", line)))?;
            }
        }
        queue!(out, Print("\n"))?;

        Ok(())
    }
}

impl Default for TerminalDisplay {
    fn default() -> Self {
        Self::new(ChartSettings::default(), Duration::from_millis(100))
    }
}
