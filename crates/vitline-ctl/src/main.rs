//! vitline-ctl — encode, display, export and scan visual transfers from a terminal.

mod devices;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde_json::Value;
use tokio::sync::broadcast;

use vitline_core::config::VitlineConfig;
use vitline_core::{ActionContext, ActionType, Envelope, PayloadKind};
use vitline_services::{
    Encoded, Encoder, FrameScheduler, ReplayGuard, ScanEvent, ScanOutcome, Scanner, VideoExporter,
};

use devices::{ReelCapture, StdinCamera, TerminalCanvas};

// ── Options ───────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Options {
    action: Option<ActionType>,
    action_id: Option<serde_json::Number>,
    out: Option<PathBuf>,
    still: Option<PathBuf>,
}

fn parse_action(value: &str) -> Result<ActionType> {
    match value {
        "delete_item" => Ok(ActionType::DeleteItem),
        "clear_inventory" => Ok(ActionType::ClearInventory),
        other => bail!("unknown action: {other} (expected delete_item or clear_inventory)"),
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn load_envelope(kind: &str, file: &str, opts: &Options) -> Result<Envelope> {
    let kind = PayloadKind::parse(kind)
        .with_context(|| format!("unknown payload type: {kind} (expected domain, inventory, item, ability or xp)"))?;
    let text = std::fs::read_to_string(file).with_context(|| format!("failed to read {file}"))?;
    let payload: Value =
        serde_json::from_str(&text).with_context(|| format!("{file} is not valid JSON"))?;

    let mut envelope = Envelope::new(kind, payload);
    if let Some(action_type) = opts.action {
        envelope = envelope.with_action(ActionContext {
            id: opts.action_id.clone(),
            action_type,
        });
    } else if opts.action_id.is_some() {
        bail!("--action-id requires --action");
    }
    Ok(envelope)
}

fn encode(config: &VitlineConfig, envelope: &Envelope) -> Result<Encoded> {
    let encoded = Encoder::new(config.codec.clone())
        .encode(envelope)
        .context("encoding failed")?;
    for line in warning_lines(&encoded) {
        eprintln!("{line}");
    }
    Ok(encoded)
}

fn warning_lines(encoded: &Encoded) -> Vec<String> {
    encoded.warnings.iter().map(ToString::to_string).collect()
}

fn write_artifact(dir: &Path, name: &str, data: &[u8]) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join(name);
    std::fs::write(&path, data).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

/// Broadcast shutdown on Ctrl-C.
fn shutdown_on_ctrl_c() -> broadcast::Sender<()> {
    let (tx, _) = broadcast::channel(1);
    let signal = tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = signal.send(());
        }
    });
    tx
}

// ── Subcommand handlers ───────────────────────────────────────────────────────

async fn cmd_encode(config: &VitlineConfig, kind: &str, file: &str, opts: &Options) -> Result<()> {
    let envelope = load_envelope(kind, file, opts)?;
    let encoded = encode(config, &envelope)?;
    for frame in &encoded.frames {
        println!("{frame}");
    }
    Ok(())
}

async fn cmd_show(config: &VitlineConfig, kind: &str, file: &str, opts: &Options) -> Result<()> {
    let envelope = load_envelope(kind, file, opts)?;
    let encoded = encode(config, &envelope)?;

    let shutdown = shutdown_on_ctrl_c();
    let mut scheduler = FrameScheduler::new(encoded.frames, &config.display);
    let mut canvas = TerminalCanvas::default();
    eprintln!(
        "Showing {} frame(s) every {} ms, Ctrl-C to stop",
        scheduler.total(),
        scheduler.interval().as_millis()
    );
    scheduler.run(&mut canvas, shutdown.subscribe()).await?;

    if let Some(dir) = &opts.still {
        let still = scheduler.export_still(&canvas, envelope.kind)?;
        let path = write_artifact(dir, &still.file_name, &still.data)?;
        println!("Saved frame {}/{} to {}", still.index + 1, still.total, path.display());
    }
    Ok(())
}

async fn cmd_export(config: &VitlineConfig, kind: &str, file: &str, opts: &Options) -> Result<()> {
    let envelope = load_envelope(kind, file, opts)?;
    let encoded = encode(config, &envelope)?;

    let exporter = VideoExporter::new();
    let mut capture = ReelCapture::default();
    let artifact = exporter
        .export(&encoded.frames, &mut capture, envelope.kind, &config.display)
        .await?;

    // The terminal capture records a text reel, not video.
    let name = Path::new(&artifact.file_name).with_extension("reel");
    let dir = opts.out.clone().unwrap_or_else(|| PathBuf::from("."));
    let path = write_artifact(&dir, &name.to_string_lossy(), &artifact.data)?;
    println!("Exported {} frame(s) to {}", artifact.frames, path.display());
    Ok(())
}

async fn cmd_scan(config: &VitlineConfig) -> Result<()> {
    let guard = ReplayGuard::with_persistence(config.replay.store_path.clone());
    let (events_tx, mut events_rx) = tokio::sync::mpsc::unbounded_channel();
    let mut scanner = Scanner::new(guard, &config.scanner).with_events(events_tx);

    tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            match event {
                ScanEvent::Progress { transfer_id, received, total } => {
                    eprintln!("transfer {transfer_id}: {received}/{total}");
                }
                ScanEvent::AssemblyFailed { transfer_id } => {
                    eprintln!("transfer {transfer_id}: failed to assemble, rescan the code");
                }
                ScanEvent::Noise => {}
            }
        }
    });

    let shutdown = shutdown_on_ctrl_c();
    let mut camera = StdinCamera::new();
    match scanner.run(&mut camera, shutdown.subscribe()).await? {
        ScanOutcome::Received(envelope) => {
            println!("{}", serde_json::to_string_pretty(&envelope)?);
            Ok(())
        }
        ScanOutcome::Cancelled => {
            eprintln!("Scan cancelled");
            Ok(())
        }
        ScanOutcome::StreamEnded => bail!("input ended before a complete code was scanned"),
    }
}

fn cmd_config() -> Result<()> {
    let path = VitlineConfig::write_default_if_missing()?;
    let config = VitlineConfig::load()?;
    println!("# {}", path.display());
    print!("{}", toml::to_string_pretty(&config).context("failed to render config")?);
    Ok(())
}

fn print_usage() {
    println!("Usage: vitline-ctl <command> [options]");
    println!();
    println!("Commands:");
    println!("  encode <type> <file.json>   Print the frames for a payload, one per line");
    println!("  show <type> <file.json>     Rotate frames on the terminal until Ctrl-C");
    println!("  export <type> <file.json>   Record every frame once into a reel file");
    println!("  scan                        Read camera strings from stdin and print the payload");
    println!("  config                      Write the default config if missing and print it");
    println!();
    println!("Types: domain, inventory, item, ability, xp");
    println!();
    println!("Options:");
    println!("  --action <delete_item|clear_inventory>   Attach an action context");
    println!("  --action-id <n>                          Id the action refers to");
    println!("  --out <dir>                              Export directory (default: .)");
    println!("  --still <dir>                            After show, save the visible frame");
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = VitlineConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        VitlineConfig::default()
    });

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut opts = Options::default();
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--action" => {
                i += 1;
                opts.action = Some(parse_action(args.get(i).context("--action requires a value")?)?);
            }
            "--action-id" => {
                i += 1;
                let raw = args.get(i).context("--action-id requires a value")?;
                opts.action_id = Some(
                    serde_json::from_str::<serde_json::Number>(raw)
                        .context("--action-id must be a number")?,
                );
            }
            "--out" => {
                i += 1;
                opts.out = Some(PathBuf::from(args.get(i).context("--out requires a value")?));
            }
            "--still" => {
                i += 1;
                opts.still = Some(PathBuf::from(args.get(i).context("--still requires a value")?));
            }
            _ => remaining.push(&args[i]),
        }
        i += 1;
    }

    match remaining.as_slice() {
        ["encode", kind, file]          => cmd_encode(&config, kind, file, &opts).await,
        ["show", kind, file]            => cmd_show(&config, kind, file, &opts).await,
        ["export", kind, file]          => cmd_export(&config, kind, file, &opts).await,
        ["scan"]                        => cmd_scan(&config).await,
        ["config"]                      => cmd_config(),
        ["help"] | ["--help"] | ["-h"] | [] => { print_usage(); Ok(()) }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
