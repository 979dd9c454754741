use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use kpiwidget::{Kpi, Payload, Render, RenderSink, SelectionController, SelectionEvent, WriterSink};
use serde_json::Value as JsonValue;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "kpi",
    version,
    about = "Compute, compare & format single-value KPIs with selection replay"
)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a payload, then replay selection events (one per line).
    Render(RenderArgs),
    /// List the supported KPI names.
    Kpis,
}

#[derive(ValueEnum, Clone, Debug, PartialEq)]
enum OutFormat {
    Text,
    Json,
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// Payload JSON file ({"data": [...], "settings": {...}, ...}).
    #[arg(short, long)]
    payload: PathBuf,
    /// Selection events, one JSON value per line: {"value":[1,2]}, [1,2], or null.
    #[arg(short, long)]
    events: Option<PathBuf>,
    /// Output format: the display string only, or one JSON object per render.
    #[arg(long, value_enum, default_value_t = OutFormat::Text)]
    format: OutFormat,
    /// Override the KPI (sum, mean, count, distinctCount, duplicates, min, max).
    #[arg(long)]
    kpi: Option<String>,
    /// Override the comparison mode (none, ratio, share).
    #[arg(long)]
    comparison: Option<String>,
    #[arg(long)]
    prefix: Option<String>,
    #[arg(long)]
    suffix: Option<String>,
    /// Digit grouping separator (default: a single space).
    #[arg(long)]
    big_mark: Option<String>,
    #[arg(long)]
    decimals: Option<u32>,
    /// Locale tag for separators (en, de, fr, es, it, pt, nl).
    #[arg(long)]
    locale: Option<String>,
    /// Only accept events for this filter group.
    #[arg(long)]
    group: Option<String>,
}

impl RenderArgs {
    fn apply_overrides(&self, payload: &mut Payload) {
        let text = |v: &String| JsonValue::String(v.clone());
        let s = &mut payload.settings;
        if let Some(k) = &self.kpi {
            s.kpi = text(k);
        }
        if let Some(c) = &self.comparison {
            s.comparison = text(c);
        }
        if let Some(p) = &self.prefix {
            s.prefix = text(p);
        }
        if let Some(x) = &self.suffix {
            s.suffix = text(x);
        }
        if let Some(m) = &self.big_mark {
            s.big_mark = text(m);
        }
        if let Some(d) = self.decimals {
            s.decimals = JsonValue::from(d);
        }
        if let Some(l) = &self.locale {
            s.locale = text(l);
        }
        if let Some(g) = &self.group {
            s.crosstalk_group = text(g);
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Kpis => {
            for k in Kpi::ALL {
                println!("{k}");
            }
            Ok(())
        }
    }
}

fn read_events(path: &Path) -> Result<Vec<SelectionEvent>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading events from {}", path.display()))?;
    let mut events = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match SelectionEvent::from_json(line) {
            Ok(ev) => events.push(ev),
            Err(e) => log::error!("{}:{}: {e}; event skipped", path.display(), lineno + 1),
        }
    }
    Ok(events)
}

fn replay<S: RenderSink>(
    widget: &mut SelectionController<S>,
    payload: Payload,
    events: &[SelectionEvent],
    mut emit: impl FnMut(&Render) -> Result<()>,
) -> Result<()> {
    emit(&widget.initialize(payload))?;
    for ev in events {
        if let Some(render) = widget.on_selection_event(ev) {
            emit(&render)?;
        }
    }
    Ok(())
}

fn cmd_render(args: RenderArgs) -> Result<()> {
    let text = std::fs::read_to_string(&args.payload)
        .with_context(|| format!("reading payload from {}", args.payload.display()))?;
    let mut payload = Payload::from_json(&text)
        .with_context(|| format!("parsing payload {}", args.payload.display()))?;
    args.apply_overrides(&mut payload);

    let events = match &args.events {
        Some(path) => read_events(path)?,
        None => Vec::new(),
    };

    match args.format {
        OutFormat::Text => {
            let mut widget = SelectionController::new(WriterSink::new(io::stdout()));
            replay(&mut widget, payload, &events, |_| Ok(()))
        }
        OutFormat::Json => {
            // Each render is written as JSON below; the display line is discarded.
            let mut widget = SelectionController::new(WriterSink::new(io::sink()));
            let stdout = io::stdout();
            replay(&mut widget, payload, &events, |render| {
                let mut out = stdout.lock();
                serde_json::to_writer(&mut out, render)?;
                writeln!(out)?;
                Ok(())
            })
        }
    }
}
