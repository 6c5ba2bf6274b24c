use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use time::OffsetDateTime;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use i2p_newsfeed::config::{load_settings, Settings};
use i2p_newsfeed::{run_build, sign_build_dir, BuildOptions, NewsSigningKey, SignedSu3, Su3VerifyingKey};

#[derive(Debug, Parser)]
#[command(name = "newsfeed")]
#[command(about = "Build and sign the I2P router news feed")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build Atom feeds for every configured platform, channel and locale.
    Build(BuildArgs),
    /// Wrap every built feed in a signed .su3 file.
    Sign(SignArgs),
    /// Check an .su3 file against a public key.
    Verify(VerifyArgs),
}

#[derive(Debug, Args)]
struct BuildArgs {
    /// Settings file (defaults to ./newsfeed.toml when present).
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    datadir: Option<PathBuf>,
    #[arg(long)]
    builddir: Option<PathBuf>,
    #[arg(long)]
    releasejson: Option<PathBuf>,
    #[arg(long)]
    blocklist: Option<PathBuf>,
    #[arg(long)]
    translationsdir: Option<PathBuf>,
    /// One of mac, mac-arm64, win, android, ios (or linux for the default tree).
    #[arg(long)]
    platform: Option<String>,
    /// One of stable, beta, rc, alpha.
    #[arg(long)]
    channel: Option<String>,
    #[arg(long)]
    feedtitle: Option<String>,
    #[arg(long)]
    feedsubtitle: Option<String>,
    #[arg(long)]
    feedsite: Option<String>,
    #[arg(long)]
    feedmain: Option<String>,
    #[arg(long)]
    feedbackup: Option<String>,
    /// Fixed feed UUID; a fresh one is generated per feed when unset.
    #[arg(long)]
    feeduid: Option<String>,
}

#[derive(Debug, Args)]
struct SignArgs {
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    builddir: Option<PathBuf>,
    /// Signer id embedded in every .su3, usually an email-style address.
    #[arg(long)]
    signerid: Option<String>,
    /// PEM private key (PKCS#8, PKCS#1 or SEC1), or a hex Ed25519 seed.
    #[arg(long)]
    signingkey: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct VerifyArgs {
    #[arg(long)]
    su3: PathBuf,
    /// SPKI PEM public key.
    #[arg(long)]
    publickey: PathBuf,
    /// Write the verified content here.
    #[arg(long)]
    extract: Option<PathBuf>,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Command::Build(args) => build(args),
        Command::Sign(args) => sign(args),
        Command::Verify(args) => verify(args),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn apply_build_flags(settings: &mut Settings, args: BuildArgs) {
    fn set<T>(slot: &mut T, value: Option<T>) {
        if let Some(value) = value {
            *slot = value;
        }
    }

    set(&mut settings.data_dir, args.datadir);
    set(&mut settings.build_dir, args.builddir);
    set(&mut settings.platform, args.platform);
    set(&mut settings.channel, args.channel);
    set(&mut settings.title, args.feedtitle);
    set(&mut settings.subtitle, args.feedsubtitle);
    set(&mut settings.site_url, args.feedsite);
    set(&mut settings.main_feed_url, args.feedmain);
    if args.releasejson.is_some() {
        settings.release_json = args.releasejson;
    }
    if args.blocklist.is_some() {
        settings.blocklist = args.blocklist;
    }
    if args.translationsdir.is_some() {
        settings.translations_dir = args.translationsdir;
    }
    if let Some(backup) = args.feedbackup {
        settings.backup_feed_url = Some(backup).filter(|url| !url.is_empty());
    }
    if let Some(uid) = args.feeduid {
        settings.urn_id = Some(uid).filter(|id| !id.is_empty());
    }
}

fn build(args: BuildArgs) -> Result<()> {
    let mut settings = load_settings(args.config.as_deref())?;
    apply_build_flags(&mut settings, args);

    let options = BuildOptions {
        layout: settings.source_layout(),
        build_dir: settings.build_dir.clone(),
        targets: settings.targets()?,
        metadata: settings.feed_metadata(),
        generation_time: OffsetDateTime::now_utc(),
    };
    info!(
        data_dir = %options.layout.data_dir.display(),
        build_dir = %options.build_dir.display(),
        targets = options.targets.len(),
        "building news feeds"
    );

    let summary = run_build(&options)
        .with_context(|| format!("building feeds into '{}'", options.build_dir.display()))?;
    for (target, reason) in &summary.skipped {
        info!(target = %target, reason = %reason, "target skipped");
    }
    if summary.written.is_empty() {
        warn!("no feeds were written");
    }
    Ok(())
}

fn sign(args: SignArgs) -> Result<()> {
    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(dir) = args.builddir {
        settings.build_dir = dir;
    }
    if args.signerid.is_some() {
        settings.signer_id = args.signerid;
    }
    if args.signingkey.is_some() {
        settings.signing_key = args.signingkey;
    }

    let (signer_id, key_path) = settings.signing_inputs()?;
    let key = NewsSigningKey::from_file(key_path)
        .with_context(|| format!("loading signing key '{}'", key_path.display()))?;
    info!(key = ?key, signer_id, dir = %settings.build_dir.display(), "signing feeds");

    let report = sign_build_dir(&settings.build_dir, &key, signer_id);
    if report.all_failed() {
        bail!(
            "every feed under '{}' failed to sign ({} failures)",
            settings.build_dir.display(),
            report.failed.len()
        );
    }
    Ok(())
}

fn verify(args: VerifyArgs) -> Result<()> {
    let bytes = fs::read(&args.su3).with_context(|| format!("reading '{}'", args.su3.display()))?;
    let parsed = SignedSu3::parse(&bytes).with_context(|| format!("parsing '{}'", args.su3.display()))?;
    let key = Su3VerifyingKey::from_file(&args.publickey)
        .with_context(|| format!("loading public key '{}'", args.publickey.display()))?;
    parsed
        .verify(&key)
        .with_context(|| format!("verifying '{}'", args.su3.display()))?;

    info!(
        path = %args.su3.display(),
        signer_id = %parsed.file.signer_id,
        version = %parsed.file.version,
        signature_type = %parsed.file.signature_type,
        content_bytes = parsed.file.content.len(),
        "signature valid"
    );

    if let Some(out) = args.extract {
        fs::write(&out, &parsed.file.content)
            .with_context(|| format!("writing extracted content '{}'", out.display()))?;
        info!(path = %out.display(), "content extracted");
    }
    Ok(())
}
