use std::path::{Path, PathBuf};
use std::thread;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use itertools::Itertools;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use multirank::multiset::Multiset;
use multirank::presets::Preset;
use multirank::ranker::MultisetRanker;
use multirank::table::{is_gzip, KeyStyle, Table, TableFormat};

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli) {
        eprintln!("error: {err}");
        for cause in err.chain().skip(1) {
            eprintln!("  caused by: {cause}");
        }
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[derive(Parser, Debug)]
#[command(
    name = "multirank",
    version,
    about = "Rank, unrank and tabulate the distinct permutations of a multiset."
)]
struct Cli {
    /// Log debug events (RUST_LOG overrides this).
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write one permutation -> rank table per configured multiset.
    Generate(GenerateArgs),
    /// Print the rank of a permutation key.
    Rank {
        #[command(flatten)]
        target: Target,
        /// Permutation written in the target's key style, e.g. `1,2,0`.
        permutation: String,
    },
    /// Print the permutation key at a rank.
    Unrank {
        #[command(flatten)]
        target: Target,
        index: u64,
    },
    /// Look a key up in a stored table (`.gz` files are decompressed).
    Lookup {
        /// Table file.
        #[arg(long, value_name = "FILE")]
        table: PathBuf,
        /// Table format (defaults to the file extension).
        #[arg(long, value_enum)]
        format: Option<FormatArg>,
        key: String,
    },
    /// Check a stored table entry by entry against the ranker (`.gz` files
    /// are decompressed).
    Verify {
        /// Table file.
        #[arg(long, value_name = "FILE")]
        table: PathBuf,
        /// Table format (defaults to the file extension).
        #[arg(long, value_enum)]
        format: Option<FormatArg>,
        #[command(flatten)]
        target: Target,
    },
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Preset to generate, may be repeated. Without --preset and --labels all
    /// presets are generated.
    #[arg(long = "preset", value_enum)]
    presets: Vec<PresetArg>,
    /// Comma separated labels of an additional custom multiset, e.g. `0,0,1`.
    #[arg(long, value_delimiter = ',')]
    labels: Option<Vec<u8>>,
    /// File stem of the custom table.
    #[arg(long, requires = "labels")]
    name: Option<String>,
    /// Key delimiter for the custom table; `none` writes labels back to back.
    #[arg(long, requires = "labels")]
    delimiter: Option<String>,
    /// Directory receiving the tables.
    #[arg(long, value_name = "DIR", default_value = "tables")]
    out_dir: PathBuf,
    #[arg(long, value_enum, default_value_t = FormatArg::Json)]
    format: FormatArg,
    /// Rank every permutation and compare with its position while building.
    #[arg(long)]
    check: bool,
    /// Gzip the tables, appending `.gz` to the file names.
    #[arg(long)]
    gzip: bool,
}

/// The multiset a single-table command works on.
#[derive(Args, Debug)]
struct Target {
    /// One of the cube presets.
    #[arg(long, value_enum, required_unless_present = "labels", conflicts_with = "labels")]
    preset: Option<PresetArg>,
    /// Comma separated labels of a custom multiset, e.g. `0,0,1`.
    #[arg(long, value_delimiter = ',')]
    labels: Option<Vec<u8>>,
    /// Key delimiter; `none` writes labels back to back. Defaults to the
    /// preset's convention, or `,` for custom labels.
    #[arg(long)]
    delimiter: Option<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum PresetArg {
    Corners,
    Edges1,
    Edges2,
}

impl From<PresetArg> for Preset {
    fn from(arg: PresetArg) -> Self {
        match arg {
            PresetArg::Corners => Preset::Corners,
            PresetArg::Edges1 => Preset::Edges1,
            PresetArg::Edges2 => Preset::Edges2,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum FormatArg {
    Json,
    CompactJson,
    Bincode,
}

impl From<FormatArg> for TableFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Json => TableFormat::Json,
            FormatArg::CompactJson => TableFormat::CompactJson,
            FormatArg::Bincode => TableFormat::Bincode,
        }
    }
}

/// A multiset together with how its table is named and keyed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Job {
    name: String,
    stem: String,
    multiset: Multiset<u8>,
    style: KeyStyle,
}

impl Job {
    fn preset(preset: Preset) -> Self {
        Job {
            name: preset.name().to_owned(),
            stem: preset.file_stem().to_owned(),
            multiset: preset.multiset(),
            style: preset.key_style(),
        }
    }

    fn custom(labels: &[u8], name: Option<&str>, delimiter: Option<&str>) -> Result<Self> {
        let name = name.unwrap_or("custom_permutations");
        Ok(Job {
            name: name.to_owned(),
            stem: name.to_owned(),
            multiset: Multiset::new(labels.iter().copied()),
            style: parse_delimiter(delimiter)?.unwrap_or_default(),
        })
    }

    fn ranker(&self) -> Result<MultisetRanker<u8>> {
        MultisetRanker::new(self.multiset.clone())
            .with_context(|| format!("cannot rank the permutations of {}", self.name))
    }
}

impl Target {
    fn job(&self) -> Result<Job> {
        match (&self.preset, &self.labels) {
            (Some(preset), _) => {
                let mut job = Job::preset((*preset).into());
                if let Some(style) = parse_delimiter(self.delimiter.as_deref())? {
                    job.style = style;
                }
                Ok(job)
            }
            (None, Some(labels)) => Job::custom(labels, None, self.delimiter.as_deref()),
            (None, None) => bail!("either --preset or --labels is required"),
        }
    }
}

fn parse_delimiter(delimiter: Option<&str>) -> Result<Option<KeyStyle>> {
    let Some(delimiter) = delimiter else {
        return Ok(None);
    };
    if delimiter.is_empty() || delimiter == "none" {
        return Ok(Some(KeyStyle::Compact));
    }
    let mut chars = delimiter.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(Some(KeyStyle::Delimited(c))),
        _ => bail!("delimiter must be a single character or `none`, got {delimiter:?}"),
    }
}

/// Explicit format, else guessed from the extension under any `.gz`.
fn format_for(path: &Path, format: Option<FormatArg>) -> TableFormat {
    let inner = match path.file_stem() {
        Some(stem) if is_gzip(path) => Path::new(stem),
        _ => path,
    };
    match format {
        Some(format) => format.into(),
        None if inner.extension().is_some_and(|ext| ext == "bin") => TableFormat::Bincode,
        None => TableFormat::Json,
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Generate(args) => generate(&args).map(drop),
        Command::Rank {
            target,
            permutation,
        } => {
            let job = target.job()?;
            let labels: Vec<u8> = job.style.decode(&permutation)?;
            let rank = job
                .ranker()?
                .rank(&labels)
                .with_context(|| format!("cannot rank {permutation:?}"))?;
            println!("{rank}");
            Ok(())
        }
        Command::Unrank { target, index } => {
            let job = target.job()?;
            let permutation = job.ranker()?.unrank(index)?;
            println!("{}", job.style.encode(&permutation)?);
            Ok(())
        }
        Command::Lookup { table, format, key } => {
            let format = format_for(&table, format);
            let loaded = Table::load(&table, format)
                .with_context(|| format!("failed to load table {}", table.display()))?;
            let rank = loaded
                .get(&key)
                .ok_or_else(|| anyhow!("key {key:?} is not in {}", table.display()))?;
            println!("{rank}");
            Ok(())
        }
        Command::Verify {
            table,
            format,
            target,
        } => {
            let job = target.job()?;
            let format = format_for(&table, format);
            let loaded = Table::load(&table, format)
                .with_context(|| format!("failed to load table {}", table.display()))?;
            loaded.validate()?;
            loaded
                .validate_against(&job.ranker()?, job.style)
                .with_context(|| format!("{} does not match {}", table.display(), job.name))?;
            println!("{}: {} entries verified", table.display(), loaded.len());
            Ok(())
        }
    }
}

/// The tables `generate` writes. Repeated jobs are dropped, and distinct jobs
/// sharing a file stem are rejected before anything is written.
fn plan(args: &GenerateArgs) -> Result<Vec<Job>> {
    let mut jobs: Vec<Job> = args
        .presets
        .iter()
        .map(|&preset| Job::preset(preset.into()))
        .collect();
    if let Some(labels) = &args.labels {
        jobs.push(Job::custom(
            labels,
            args.name.as_deref(),
            args.delimiter.as_deref(),
        )?);
    }
    if jobs.is_empty() {
        jobs = Preset::ALL.into_iter().map(Job::preset).collect();
    }

    let jobs: Vec<Job> = jobs.into_iter().unique().collect();
    if let Some(stem) = jobs.iter().map(|job| &job.stem).duplicates().next() {
        let names = jobs
            .iter()
            .filter(|job| &job.stem == stem)
            .map(|job| &job.name)
            .join(", ");
        bail!("tables {names} would all be written to {stem}");
    }
    Ok(jobs)
}

fn generate(args: &GenerateArgs) -> Result<Vec<PathBuf>> {
    let jobs = plan(args)?;

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("failed to create {}", args.out_dir.display()))?;

    let format: TableFormat = args.format.into();
    debug!(jobs = jobs.len(), %format, "generating tables");

    // tables share nothing, one thread each
    let results: Vec<(String, Result<(PathBuf, usize)>)> = thread::scope(|scope| {
        let handles: Vec<_> = jobs
            .iter()
            .map(|job| {
                (
                    job.name.clone(),
                    scope.spawn(move || generate_one(job, args)),
                )
            })
            .collect();
        handles
            .into_iter()
            .map(|(name, handle)| {
                let result = handle
                    .join()
                    .unwrap_or_else(|_| Err(anyhow!("table generation panicked")));
                (name, result)
            })
            .collect()
    });

    let mut failed = 0;
    let mut written = Vec::with_capacity(results.len());
    for (name, result) in results {
        match result {
            Ok((path, entries)) => {
                println!("{name}: {entries} entries -> {}", path.display());
                written.push(path);
            }
            Err(err) => {
                failed += 1;
                eprintln!("{name}: {err:#}");
            }
        }
    }
    if failed > 0 {
        bail!("{failed} table(s) could not be generated");
    }
    Ok(written)
}

fn generate_one(job: &Job, args: &GenerateArgs) -> Result<(PathBuf, usize)> {
    let format: TableFormat = args.format.into();
    let ranker = job.ranker()?;
    info!(name = %job.name, multiset = %job.multiset, count = ranker.count(), "building table");

    let table = if args.check {
        Table::build_checked(&ranker, job.style)
    } else {
        Table::build(&ranker, job.style)
    }
    .with_context(|| format!("failed to build the {} table", job.name))?;
    table.validate()?;

    let mut file_name = format!("{}.{}", job.stem, format.extension());
    if args.gzip {
        file_name.push_str(".gz");
    }
    let path = args.out_dir.join(file_name);
    table
        .persist(&path, format)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok((path, table.len()))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        static NEXT: AtomicUsize = AtomicUsize::new(0);
        std::env::temp_dir().join(format!(
            "multirank-cli-{}-{}-{name}",
            std::process::id(),
            NEXT.fetch_add(1, Ordering::Relaxed)
        ))
    }

    fn generate_args(args: &[&str]) -> GenerateArgs {
        let argv = ["multirank", "generate"].iter().chain(args);
        match Cli::parse_from(argv).command {
            Command::Generate(args) => args,
            other => panic!("expected generate, got {other:?}"),
        }
    }

    #[test]
    fn repeated_presets_are_generated_once() {
        let dir = scratch_dir("repeat");
        let out_dir = dir.to_str().unwrap();
        let args = generate_args(&[
            "--preset", "corners", "--preset", "corners", "--out-dir", out_dir,
        ]);
        assert_eq!(plan(&args).unwrap().len(), 1);

        let written = generate(&args).unwrap();
        assert_eq!(written, vec![dir.join("corner_permutations.json")]);
        let table = Table::load(&written[0], TableFormat::Json).unwrap();
        assert_eq!(table.len(), 40320);
        assert!(!dir.join("corner_permutations.json.partial").exists());

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn colliding_stems_are_rejected_before_writing() {
        let dir = scratch_dir("collide");
        let out_dir = dir.to_str().unwrap();
        let args = generate_args(&[
            "--preset",
            "corners",
            "--labels",
            "0,0,1",
            "--name",
            "corner_permutations",
            "--out-dir",
            out_dir,
        ]);
        let err = plan(&args).unwrap_err();
        assert_eq!(
            err.to_string(),
            "tables corners, corner_permutations would all be written to corner_permutations"
        );
        assert!(generate(&args).is_err());
        assert!(!dir.exists());
    }

    #[test]
    fn generated_gzip_table_verifies() {
        let dir = scratch_dir("gzip");
        let out_dir = dir.to_str().unwrap();
        let args = generate_args(&[
            "--labels", "0,0,1,2", "--name", "tiny", "--format", "bincode", "--gzip", "--check",
            "--out-dir", out_dir,
        ]);
        let result = generate(&args);
        if cfg!(not(feature = "bincode")) {
            assert!(result.is_err());
            std::fs::remove_dir_all(dir).unwrap();
            return;
        }
        let written = result.unwrap();
        assert_eq!(written, vec![dir.join("tiny.bin.gz")]);

        let format = format_for(&written[0], None);
        assert_eq!(format, TableFormat::Bincode);
        let table = Table::load(&written[0], format).unwrap();
        let job = Job::custom(&[0, 0, 1, 2], Some("tiny"), None).unwrap();
        table
            .validate_against(&job.ranker().unwrap(), job.style)
            .unwrap();
        assert_eq!(table.get("2,1,0,0"), Some(11));

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn delimiter_parsing() {
        assert_eq!(parse_delimiter(None).unwrap(), None);
        assert_eq!(
            parse_delimiter(Some("none")).unwrap(),
            Some(KeyStyle::Compact)
        );
        assert_eq!(
            parse_delimiter(Some(";")).unwrap(),
            Some(KeyStyle::Delimited(';'))
        );
        assert!(parse_delimiter(Some(",,")).is_err());
    }

    #[test]
    fn preset_target_keeps_its_convention() {
        let cli = Cli::parse_from(["multirank", "unrank", "--preset", "corners", "5"]);
        let Command::Unrank { target, index } = cli.command else {
            panic!("expected unrank");
        };
        assert_eq!(index, 5);
        let job = target.job().unwrap();
        assert_eq!(job.style, KeyStyle::Compact);
        assert_eq!(job.multiset.len(), 8);
    }

    #[test]
    fn custom_labels_default_to_commas() {
        let cli = Cli::parse_from(["multirank", "rank", "--labels", "0,0,1", "1,0,0"]);
        let Command::Rank { target, .. } = cli.command else {
            panic!("expected rank");
        };
        let job = target.job().unwrap();
        assert_eq!(job.style, KeyStyle::Delimited(','));
        assert_eq!(job.ranker().unwrap().rank(&[1, 0, 0]).unwrap(), 2);
    }

    #[test]
    fn preset_and_labels_conflict() {
        let parsed = Cli::try_parse_from([
            "multirank",
            "rank",
            "--preset",
            "corners",
            "--labels",
            "0,1",
            "01",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(format_for(Path::new("t.bin"), None), TableFormat::Bincode);
        assert_eq!(format_for(Path::new("t.json"), None), TableFormat::Json);
        assert_eq!(format_for(Path::new("t.bin.gz"), None), TableFormat::Bincode);
        assert_eq!(format_for(Path::new("t.json.gz"), None), TableFormat::Json);
        assert_eq!(
            format_for(Path::new("t.bin"), Some(FormatArg::CompactJson)),
            TableFormat::CompactJson
        );
    }
}
