use clap::{Parser, Subcommand};
use fragvault::backup::{create_backup, BackupOptions};
use fragvault::block::Secret;
use fragvault::config::Config;
use fragvault::layout;
use fragvault::logging::init_logging;
use fragvault::recovery::{check_hint, classify, AuxiliaryTargets, ScanItem};
use fragvault::service::{RestoreService, ServiceError};
use serde_json::json;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "fragvault", about = "Split encrypted secret backups into scannable fragments")]
struct Cli {
    /// TOML config file (defaults apply when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// More output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    /// Errors only
    #[arg(short, long, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt secrets into one block and split it into fragments
    Create {
        /// Secret message; repeat once per secret
        #[arg(short, long = "secret", required = true)]
        secrets: Vec<String>,
        /// Passphrase for the secret at the same position
        #[arg(short, long = "passphrase", required = true)]
        passphrases: Vec<String>,
        /// Restore target address to print alongside the fragments
        #[arg(short, long = "target")]
        targets: Vec<String>,
        /// Free-text hint stored next to the fragments
        #[arg(long)]
        hint: Option<String>,
        /// Number of fragments (overrides the config file)
        #[arg(short = 'n', long)]
        fragments: Option<u32>,
        /// Write the JSON report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Classify one decoded scan
    Classify {
        decoded: String,
    },
    /// Rebuild a secret from files of decoded scans (one scan per line)
    Restore {
        #[arg(required = true, num_args = 1..)]
        scans: Vec<PathBuf>,
        #[arg(short, long)]
        passphrase: String,
        #[arg(short = 'n', long)]
        fragments: Option<u32>,
    },
    /// Compose pre-rendered fragment code PNGs into one printable image
    Compose {
        /// Fragment code images, in fragment order
        #[arg(required = true, num_args = 1..)]
        codes: Vec<PathBuf>,
        /// Target-list code image
        #[arg(short, long)]
        targets: Option<PathBuf>,
        #[arg(short, long)]
        label: Option<String>,
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);
    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {

        // ── Create ───────────────────────────────────────────────────────────
        Commands::Create { secrets, passphrases, targets, hint, fragments, output } => {
            if secrets.len() != passphrases.len() {
                return Err(format!(
                    "{} secrets but {} passphrases; give one passphrase per secret",
                    secrets.len(), passphrases.len()
                ).into());
            }
            if let Some(n) = fragments { config.fragment_count = n; }
            config.validate()?;

            let secrets: Vec<Secret> = secrets.into_iter()
                .zip(passphrases)
                .map(|(m, p)| Secret::new(m, p))
                .collect();
            let targets = AuxiliaryTargets::parse(&targets)?;
            if let Some(h) = &hint {
                check_hint(h).map_err(|_| format!("hint {h:?} would scan back as data, not text"))?;
            }
            let opts: BackupOptions = config.backup_options();
            let backup = create_backup(&secrets, &config.kdf(), &opts)?;

            let report = json!({
                "fingerprint": backup.fingerprint(),
                "capacity":    backup.capacity,
                "fragments":   backup.wire_fragments(),
                "targets":     targets.to_wire(),
                "hint":        hint.unwrap_or_default(),
            });
            let text = serde_json::to_string_pretty(&report)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, text)?;
                    println!("Backup {} → {}", backup.fingerprint(), path.display());
                }
                None => println!("{text}"),
            }
        }

        // ── Classify ─────────────────────────────────────────────────────────
        Commands::Classify { decoded } => {
            match classify(&decoded)? {
                ScanItem::Fragment(f) => {
                    println!("fragment  order={}  {} chars", f.order, f.payload.chars().count());
                }
                ScanItem::TargetList(t) if t.is_empty() => println!("target-list  (skip)"),
                ScanItem::TargetList(t) => {
                    println!("target-list  {} address(es)", t.len());
                    for url in t.as_slice() {
                        println!("  {url}");
                    }
                }
                ScanItem::TextHint(h) => println!("text-hint  {h}"),
            }
        }

        // ── Restore ──────────────────────────────────────────────────────────
        Commands::Restore { scans, passphrase, fragments } => {
            if let Some(n) = fragments { config.fragment_count = n; }
            config.validate()?;

            let service = RestoreService::new(config.fragment_count)?;
            let token = service.start_session()?;
            for path in &scans {
                feed_scans(&service, token, path)?;
            }

            let restored = match service.restore(token, &passphrase, &config.kdf()) {
                Err(ServiceError::MissingFragments { have, need }) => {
                    let missing = service.progress(token)?.missing();
                    return Err(format!(
                        "only {have} of {need} fragments scanned; missing {missing:?}"
                    ).into());
                }
                other => other?,
            };
            service.end_session(token)?;

            println!("── Restored backup {} ──────────────────────────", restored.fingerprint);
            println!("  Secret   {}", restored.secret);
            if !restored.hint.is_empty() {
                println!("  Hint     {}", restored.hint);
            }
            for url in restored.targets.as_slice() {
                println!("  Target   {url}");
            }
        }

        // ── Compose ──────────────────────────────────────────────────────────
        Commands::Compose { codes, targets, label, output } => {
            let fragments = codes.iter()
                .map(|p| Ok(image::open(p)?.to_rgba8()))
                .collect::<Result<Vec<_>, image::ImageError>>()?;
            let aux = targets.map(|p| image::open(p).map(|i| i.to_rgba8())).transpose()?;
            let canvas = layout::compose(&fragments, aux.as_ref(), label.as_deref(), &config.layout)?;
            canvas.save(&output)?;
            println!("Composed {} code(s) → {} ({}x{})",
                fragments.len(), output.display(), canvas.width(), canvas.height());
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

/// Submit every non-blank line of `path` as one scan.  Unreadable scans are
/// reported and skipped.
fn feed_scans(service: &RestoreService, token: uuid::Uuid, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)?;
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() { continue; }
        match service.submit_scan(token, line) {
            Ok(r) => log::debug!("{}:{}: {} ({}/{})", path.display(), lineno + 1, r.kind, r.collected, r.needed),
            Err(ServiceError::Classify(e)) => {
                eprintln!("  skipped {}:{}: {e}", path.display(), lineno + 1);
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
