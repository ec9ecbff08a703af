use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use workbase::database::{self, BuildOptions};
use workbase::media::FileAnalyzer;
use workbase::{config, description, output};

#[derive(Parser)]
#[command(name = "workbase")]
#[command(about = "Build a JSON database of works from their description files")]
#[command(long_about = "\
Build a JSON database of works from their description files

Each directory of the database is a work, described by a description.md:
a YAML header, then markdown, optionally split into languages.

  database/
  ├── workbase.toml                # Config (optional)
  ├── 2021-lamp/                   # Work \"2021-lamp\"
  │   ├── description.md
  │   └── front.jpg                # Media referenced by the description
  └── 2022-chair/
      └── .workbase/               # Scattered mode (--scattered)
          └── description.md

description.md:

  ---
  tags: [furniture]
  layout: [[m1, m2], p1]
  ---
  :: en
  # Chair
  ![Front view](front.jpg)
  ![Spinning~>](spin.mp4)          # ~ loop, > autoplay, = no controls

Run 'workbase gen-config' to generate a documented workbase.toml.")]
#[command(version)]
struct Cli {
    /// Config file (default: <DATABASE>/workbase.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log debug details (overrides RUST_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the database
    Build(BuildArgs),
    /// Parse a single description file and print it as JSON
    Parse {
        /// Description file
        file: PathBuf,
    },
    /// Print a stock workbase.toml with all options documented
    GenConfig,
}

#[derive(clap::Args)]
struct BuildArgs {
    /// Database directory: one subdirectory per work
    database: PathBuf,

    /// Output file, or - for stdout
    output: PathBuf,

    /// Only rebuild works whose id matches this glob
    #[arg(long, short)]
    include: Option<String>,

    /// Read descriptions from each work's scattered-mode folder
    #[arg(long)]
    scattered: bool,

    /// Write minified JSON
    #[arg(long)]
    minified: bool,

    /// Disable the analysis cache: analyze every media file again
    #[arg(long)]
    no_cache: bool,

    /// Do not print progress
    #[arg(long, short)]
    silent: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Build(args) => {
            let config = config::load_config(&args.database, cli.config.as_deref())?;
            let options = BuildOptions {
                include: args.include,
                scattered: args.scattered,
                minified: args.minified,
                no_cache: args.no_cache,
                id_seed: None,
            };
            let analyzer = FileAnalyzer::new(config.extract_colors.enabled);
            let to_stdout = args.output == Path::new(database::STDOUT);

            let (tx, printer) = if args.silent {
                (None, None)
            } else {
                let (tx, rx) = std::sync::mpsc::channel();
                let printer = std::thread::spawn(move || {
                    for event in rx {
                        for line in output::format_build_event(&event) {
                            if to_stdout {
                                eprintln!("{}", line);
                            } else {
                                println!("{}", line);
                            }
                        }
                    }
                });
                (Some(tx), Some(printer))
            };

            let result = database::build(
                &args.database,
                &args.output,
                &config,
                &options,
                &analyzer,
                tx,
            );
            if let Some(printer) = printer {
                printer
                    .join()
                    .map_err(|_| "progress printer thread panicked")?;
            }
            let summary = result?;
            if !args.silent {
                output::print_build_summary(&summary, &args.output);
            }
        }
        Command::Parse { file } => {
            // Run from the database directory to pick up its workbase.toml
            let config = config::load_config(Path::new("."), cli.config.as_deref())?;
            let raw = std::fs::read_to_string(&file)?;
            let parsed = description::parse_description(&raw, &config.default_language);
            println!("{}", serde_json::to_string_pretty(&parsed)?);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// `--verbose` selects `debug`; otherwise `RUST_LOG`, defaulting to `warn`.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
