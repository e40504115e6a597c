use std::{
    fs,
    io::{Write, stderr, stdout},
    path::{Path, PathBuf},
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering},
    },
    time::Instant,
};

use clap::{
    ArgAction, ArgGroup, Args, ColorChoice, CommandFactory, FromArgMatches, Parser, Subcommand,
    builder::styling::{AnsiColor, Color, Style, Styles},
};
use log::{debug, info};
use rayon::{ThreadPoolBuilder, prelude::*};
use regex::Regex;
use serde::Deserialize;

use mzripper::{
    CV_TABLE, CvTable, EmptyLevels, GroupedResult, IntensityMode, RipperConfig, RtUnits,
    hashing::{Splash, hash_spectra},
    rip_path,
};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

const VERSION: &str = env!("CARGO_PKG_VERSION");

const ANSI_RESET: &str = "\x1b[0m";
const ANSI_GREEN: &str = "\x1b[1;32m";
const ANSI_YELLOW: &str = "\x1b[1;33m";
const ANSI_RED: &str = "\x1b[1;31m";

const AFTER_HELP: &str = "
\x1b[1;33mQUICK REFERENCE\x1b[0m (full flags are in `mzripper convert --help` / `mzripper cat --help`)

\x1b[1;32mUSAGE:\x1b[0m
  \x1b[96mmzripper convert\x1b[0m -i, --input-path FILE|DIR
                   -o, --output-path DIR
                   [--relative] [--omit-empty-levels] [--threshold N] [--splash]
                   [--rt-seconds] [--config FILE] [--cv-table FILE]
                   [--pattern S | --pattern-exact S | --regex R]
                   [--cores N] [--overwrite]

  \x1b[96mmzripper cat\x1b[0m PATH [same ripping flags as convert]

\x1b[1;32mOPTIONS:\x1b[0m
  \x1b[96m-h\x1b[0m, \x1b[96m--help\x1b[0m
  \x1b[96m-v\x1b[0m, \x1b[96m--version\x1b[0m

\x1b[1;32mLOGGING:\x1b[0m
  RUST_LOG=debug shows every located scan, RUST_LOG=warn only skipped scans.

\x1b[1;32mEXAMPLES:\x1b[0m
  \x1b[96mmzripper convert\x1b[0m -i crates/parser/data/mzml -o out/json
  \x1b[96mmzripper convert\x1b[0m --relative --threshold 1000 -i run.mzML -o out/json
  \x1b[96mmzripper cat\x1b[0m crates/parser/data/mzml/tiny.mzML --relative
";

fn cli_styles() -> Styles {
    Styles::styled().literal(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Cyan))))
}

#[derive(Parser)]
#[command(
    name = "mzripper",
    version = VERSION,
    arg_required_else_help = true,
    disable_help_subcommand = true,
    disable_version_flag = true
)]
struct Cli {
    #[arg(short = 'v', long = "version", action = ArgAction::SetTrue, global = true)]
    version: bool,

    #[command(subcommand)]
    cmd: Option<Cmd>,
}

#[derive(Subcommand)]
enum Cmd {
    /// Rip every .mzML under INPUT into one JSON file each
    Convert(ConvertArgs),
    /// Print the JSON of a single .mzML file
    Cat(CatArgs),
}

#[derive(Args)]
#[command(group(
    ArgGroup::new("pattern_mode")
        .args(["pattern", "pattern_exact", "regex"])
        .multiple(false)
))]
struct ConvertArgs {
    #[arg(short = 'i', long = "input-path", required = true)]
    input_path: PathBuf,

    #[arg(short = 'o', long = "output-path", required = true)]
    output_path: PathBuf,

    #[command(flatten)]
    rip: RipArgs,

    #[arg(long, default_value_t = false, action = ArgAction::SetTrue)]
    overwrite: bool,

    #[arg(long = "pattern")]
    pattern: Option<String>,

    #[arg(long = "pattern-exact")]
    pattern_exact: Option<String>,

    #[arg(long = "regex")]
    regex: Option<String>,

    #[arg(
        long = "cores",
        default_value_t = 1u16,
        value_parser = clap::value_parser!(u16).range(1..=1024)
    )]
    cores: u16,
}

#[derive(Args)]
struct RipArgs {
    /// Intensities as percent of the base peak
    #[arg(long = "relative", action = ArgAction::SetTrue)]
    relative: bool,

    /// Add a SPLASH key to every spectrum
    #[arg(long = "splash", action = ArgAction::SetTrue)]
    splash: bool,

    /// Scan start times are in seconds; write them as minutes
    #[arg(long = "rt-seconds", action = ArgAction::SetTrue)]
    rt_seconds: bool,

    /// Also drop levels that ended up with no spectra
    #[arg(long = "omit-empty-levels", action = ArgAction::SetTrue)]
    omit_empty_levels: bool,

    /// MS1 peaks must exceed N; MSn peaks must exceed 5% of N
    #[arg(long = "threshold", value_name = "N")]
    threshold: Option<f64>,

    /// TOML file with intensity_mode, empty_levels, intensity_threshold, rt_units, splash
    #[arg(long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// JSON accession table replacing the bundled one
    #[arg(long = "cv-table", value_name = "FILE")]
    cv_table: Option<PathBuf>,
}

#[derive(Args)]
struct CatArgs {
    #[arg(value_name = "PATH")]
    file_path: PathBuf,

    #[command(flatten)]
    rip: RipArgs,
}

/// Contents of the `--config` file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    #[serde(flatten)]
    ripper: RipperConfig,
    splash: bool,
}

/// Everything one rip needs, after the config file and flags are merged.
struct RipSettings {
    config: RipperConfig,
    splash: bool,
    custom_table: Option<CvTable>,
}

impl RipSettings {
    fn from_args(args: &RipArgs) -> Result<Self, String> {
        let file_config = load_file_config(args.config.as_deref())?;
        let mut config = file_config.ripper;
        if args.relative {
            config.intensity_mode = IntensityMode::Relative;
        }
        if args.omit_empty_levels {
            config.empty_levels = EmptyLevels::Omit;
        }
        if args.threshold.is_some() {
            config.intensity_threshold = args.threshold;
        }
        if args.rt_seconds {
            config.rt_units = RtUnits::Seconds;
        }
        Ok(RipSettings {
            config,
            splash: args.splash || file_config.splash,
            custom_table: load_cv_table(args.cv_table.as_deref())?,
        })
    }

    fn table(&self) -> &CvTable {
        self.custom_table.as_ref().unwrap_or(&CV_TABLE)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut cmd = Cli::command();
    cmd = cmd
        .styles(cli_styles())
        .color(ColorChoice::Auto)
        .after_help(AFTER_HELP);

    let matches = cmd.get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    if cli.version {
        println!("{VERSION}");
        return Ok(());
    }

    match cli.cmd {
        Some(Cmd::Convert(cmd)) => convert(cmd).map_err(|e| e.into()),
        Some(Cmd::Cat(cmd)) => cat(cmd).map_err(|e| e.into()),
        None => Ok(()),
    }
}

fn load_file_config(path: Option<&Path>) -> Result<FileConfig, String> {
    let Some(path) = path else {
        return Ok(FileConfig::default());
    };
    let text = fs::read_to_string(path)
        .map_err(|e| format!("read config {} failed: {e}", path.display()))?;
    let cfg: FileConfig =
        toml::from_str(&text).map_err(|e| format!("invalid config {}: {e}", path.display()))?;
    debug!("loaded config {}: {cfg:?}", path.display());
    Ok(cfg)
}

fn load_cv_table(path: Option<&Path>) -> Result<Option<CvTable>, String> {
    let Some(path) = path else {
        return Ok(None);
    };
    let text = fs::read_to_string(path)
        .map_err(|e| format!("read cv table {} failed: {e}", path.display()))?;
    CvTable::from_json(&text)
        .map(Some)
        .map_err(|e| format!("{}: {e}", path.display()))
}

fn rip_to_json(path: &Path, settings: &RipSettings) -> Result<(String, usize), String> {
    let extraction =
        rip_path(path, &settings.config, settings.table()).map_err(|e| e.to_string())?;
    let result: GroupedResult = if settings.splash {
        hash_spectra(extraction.result, &Splash).map_err(|e| e.to_string())?
    } else {
        extraction.result
    };
    let json = result.to_json_pretty().map_err(|e| e.to_string())?;
    Ok((json, extraction.skipped.len()))
}

fn cat(cmd: CatArgs) -> Result<(), String> {
    let cwd = std::env::current_dir().map_err(|e| format!("get current dir failed: {e}"))?;
    let file_path = resolve_user_path(&cwd, &cmd.file_path);

    let settings = RipSettings::from_args(&cmd.rip)?;

    let (json, _) = rip_to_json(&file_path, &settings)?;
    println!("{json}");
    Ok(())
}

fn file_ext_lower(path: &Path) -> String {
    path.extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

fn out_name_for_mzml_file(path: &Path) -> Option<String> {
    if file_ext_lower(path) != "mzml" {
        return None;
    }
    let stem = path.file_stem()?.to_string_lossy();
    Some(format!("{stem}.json"))
}

fn build_name_filter(
    pattern: Option<&str>,
    pattern_exact: Option<&str>,
    regex: Option<&str>,
) -> Result<Option<Box<dyn Fn(&str) -> bool + Sync>>, String> {
    if let Some(p) = pattern {
        let needle = p.to_lowercase();
        return Ok(Some(Box::new(move |name: &str| {
            name.to_lowercase().contains(&needle)
        })));
    }

    if let Some(p) = pattern_exact {
        let needle = p.to_string();
        return Ok(Some(Box::new(move |name: &str| name.contains(&needle))));
    }

    if let Some(r) = regex {
        let re = Regex::new(r).map_err(|e| format!("invalid regex: {e}"))?;
        return Ok(Some(Box::new(move |name: &str| re.is_match(name))));
    }

    Ok(None)
}

fn passes_filter(path: &Path, name_filter: Option<&(dyn Fn(&str) -> bool + Sync)>) -> bool {
    let Some(f) = name_filter else {
        return true;
    };
    let name = path.file_name().and_then(|s| s.to_str()).unwrap_or("");
    f(name)
}

fn collect_mzml_files(
    input_root: &Path,
    name_filter: Option<&(dyn Fn(&str) -> bool + Sync)>,
) -> Result<Vec<PathBuf>, String> {
    let mut out = Vec::new();
    let mut stack = vec![input_root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let entries = fs::read_dir(&dir).map_err(|e| format!("read dir failed: {e}"))?;
        for entry in entries {
            let entry = entry.map_err(|e| format!("read dir entry failed: {e}"))?;
            let p = entry.path();
            if p.is_dir() {
                stack.push(p);
                continue;
            }
            if !p.is_file() || file_ext_lower(&p) != "mzml" {
                continue;
            }
            if passes_filter(&p, name_filter) {
                out.push(p);
            }
        }
    }

    out.sort();
    Ok(out)
}

/// Shared counters and the print lock for one `convert` run.
#[derive(Default)]
struct Progress {
    total: usize,
    print_lock: Mutex<()>,
    done: AtomicUsize,
    ok: AtomicU32,
    failed: AtomicU32,
    skipped: AtomicU32,
    scans_skipped: AtomicUsize,
    had_failed: AtomicBool,
}

impl Progress {
    fn new(total: usize) -> Self {
        Progress {
            total,
            ..Default::default()
        }
    }

    fn fail(&self, name: &str, msg: &str) {
        self.had_failed.store(true, Ordering::Relaxed);
        self.failed.fetch_add(1, Ordering::Relaxed);
        let n = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        let _g = self.print_lock.lock().unwrap_or_else(|e| e.into_inner());
        eprintln!(
            "{ANSI_RED}[error]{ANSI_RESET} [{}/{}] {}: {msg}",
            n, self.total, name
        );
        let _ = stderr().flush();
    }

    fn skip(&self, name: &str, why: &str) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
        let n = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        let _g = self.print_lock.lock().unwrap_or_else(|e| e.into_inner());
        println!(
            "{ANSI_YELLOW}[skip]{ANSI_RESET} [{}/{}] {}  {why}",
            n, self.total, name
        );
        let _ = stdout().flush();
    }

    fn ok(&self, name: &str, in_mb: f64, out_mb: f64, scans_skipped: usize, elapsed_s: f64) {
        self.ok.fetch_add(1, Ordering::Relaxed);
        self.scans_skipped
            .fetch_add(scans_skipped, Ordering::Relaxed);
        let n = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        let _g = self.print_lock.lock().unwrap_or_else(|e| e.into_inner());
        println!(
            "{ANSI_GREEN}[ok]{ANSI_RESET} [{}/{}] output: {}  input={:.2} MB, output={:.2} MB, skipped_scans={}, time={:.3}s",
            n, self.total, name, in_mb, out_mb, scans_skipped, elapsed_s
        );
        let _ = stdout().flush();
    }
}

fn convert(cmd: ConvertArgs) -> Result<(), String> {
    let cwd = std::env::current_dir().map_err(|e| format!("get current dir failed: {e}"))?;

    let input = resolve_user_path(&cwd, &cmd.input_path);
    let output_root = resolve_user_path(&cwd, &cmd.output_path);

    let settings = RipSettings::from_args(&cmd.rip)?;

    let filter = build_name_filter(
        cmd.pattern.as_deref(),
        cmd.pattern_exact.as_deref(),
        cmd.regex.as_deref(),
    )?;

    let (input_root, files) = if input.is_file() {
        let root = input.parent().map(Path::to_path_buf).unwrap_or_default();
        let wanted = file_ext_lower(&input) == "mzml" && passes_filter(&input, filter.as_deref());
        let files = if wanted {
            vec![input.clone()]
        } else {
            Vec::new()
        };
        (root, files)
    } else {
        let files = collect_mzml_files(&input, filter.as_deref())?;
        (input.clone(), files)
    };
    if files.is_empty() {
        return Err(format!(
            "no matching .mzML files found under {}",
            input.display()
        ));
    }

    fs::create_dir_all(&output_root).map_err(|e| format!("create output dir failed: {e}"))?;

    const MB: f64 = 1024.0 * 1024.0;

    let pool = ThreadPoolBuilder::new()
        .num_threads(cmd.cores as usize)
        .build()
        .map_err(|e| format!("rayon thread pool init failed: {e}"))?;

    info!(
        "ripping {} file(s) on {} thread(s), mode={:?}",
        files.len(),
        cmd.cores,
        settings.config.intensity_mode
    );

    let t_all = Instant::now();
    let progress = Progress::new(files.len());

    pool.install(|| {
        files.par_iter().for_each(|in_path| {
            let name = basename(in_path);

            let Ok(rel) = in_path.strip_prefix(&input_root) else {
                progress.fail(&name, "cannot make relative path");
                return;
            };
            let Some(out_name) = out_name_for_mzml_file(in_path) else {
                progress.skip(&name, "not an .mzML file");
                return;
            };

            let parent_rel = rel.parent().unwrap_or_else(|| Path::new(""));
            let out_dir = output_root.join(parent_rel);
            let out_path = out_dir.join(out_name);

            if !cmd.overwrite {
                if let Ok(m) = fs::metadata(&out_path) {
                    if m.is_file() && m.len() > 0 {
                        progress.skip(&basename(&out_path), "output exists");
                        return;
                    }
                }
            }

            let t0 = Instant::now();

            let (json, scans_skipped) = match rip_to_json(in_path, &settings) {
                Ok(v) => v,
                Err(e) => {
                    progress.fail(&name, &e);
                    return;
                }
            };

            if let Err(e) = fs::create_dir_all(&out_dir) {
                progress.fail(&basename(&out_dir), &format!("create output dir failed: {e}"));
                return;
            }
            if let Err(e) = fs::write(&out_path, json.as_bytes()) {
                progress.fail(&basename(&out_path), &format!("write failed: {e}"));
                return;
            }

            let in_mb = fs::metadata(in_path)
                .map(|m| m.len() as f64 / MB)
                .unwrap_or(0.0);
            let out_mb = json.len() as f64 / MB;
            progress.ok(
                &basename(&out_path),
                in_mb,
                out_mb,
                scans_skipped,
                t0.elapsed().as_secs_f64(),
            );
        })
    });

    let ok = progress.ok.load(Ordering::Relaxed);
    let failed = progress.failed.load(Ordering::Relaxed);
    let skipped = progress.skipped.load(Ordering::Relaxed);
    let scans_skipped = progress.scans_skipped.load(Ordering::Relaxed);

    let total_secs = t_all.elapsed().as_secs();
    let h = total_secs / 3600;
    let m = (total_secs % 3600) / 60;
    let s = total_secs % 60;

    println!(
        "ripped_ok={ok} ripped_failed={failed} ripped_skipped={skipped} scans_skipped={scans_skipped} total_time={:02}:{:02}:{:02}",
        h, m, s
    );

    if progress.had_failed.load(Ordering::Relaxed) {
        return Err("some files failed".to_string());
    }
    Ok(())
}

fn resolve_user_path(cwd: &Path, p: &Path) -> PathBuf {
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        cwd.join(p)
    }
}

#[inline]
fn basename(p: &Path) -> String {
    p.file_name()
        .unwrap_or_else(|| p.as_os_str())
        .to_string_lossy()
        .into_owned()
}
