use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use spechist::data::{QueriesData, ResultSet};
use spechist::graph::render_png;
use spechist::ir::{LegendState, TransformOutput};
use spechist::query::build_query;
use spechist::{csv_reader, transform_chart, FormData, OutputFormat, RenderOptions};

#[derive(Parser, Debug)]
#[command(name = "spechist")]
#[command(about = "Histogram series with specification-limit overlays", long_about = None)]
struct Cli {
    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the main/spec query pair built from form data
    Query {
        #[arg(long)]
        form: PathBuf,
    },

    /// Turn fetched rows into a series model
    Transform {
        #[command(flatten)]
        input: InputArgs,
    },

    /// Print the tooltip table for one bin
    Tooltip {
        #[command(flatten)]
        input: InputArgs,

        /// Bin index on the x axis
        #[arg(long)]
        index: usize,

        /// Series index to mark as focused
        #[arg(long)]
        focus: Option<usize>,
    },

    /// Draw the series model
    Render {
        #[command(flatten)]
        input: InputArgs,

        /// Output path; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long, default_value_t = 800)]
        width: u32,

        #[arg(long, default_value_t = 600)]
        height: u32,

        /// Emit the model as JSON instead of PNG
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
struct InputArgs {
    /// Form data JSON (query fields and chart options)
    #[arg(long)]
    form: PathBuf,

    /// Main result set (.csv or .json); CSV on stdin when omitted
    #[arg(long)]
    main: Option<PathBuf>,

    /// Spec result set (.csv or .json)
    #[arg(long)]
    spec: Option<PathBuf>,

    /// Both result sets as one `[{"data": [...]}, ...]` JSON payload
    #[arg(long, conflicts_with_all = ["main", "spec"])]
    queries: Option<PathBuf>,

    /// Legend state JSON object (series name -> visible)
    #[arg(long)]
    legend: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Commands::Query { form } => {
            let form = FormData::from_path(&form)?;
            let context = build_query(&form.query);
            write_json(&context)
        }
        Commands::Transform { input } => {
            let output = run_transform(&input)?;
            write_json(&output)
        }
        Commands::Tooltip { input, index, focus } => {
            let mut output = run_transform(&input)?;
            output.model.tooltip.on_focused_series(focus);
            let table = output
                .model
                .tooltip_at(index, &output.legend_state)
                .with_context(|| format!("Bin index {} is past the last bin", index))?;
            write_bytes(None, format!("{}\n", table.to_html()).as_bytes())
        }
        Commands::Render { input, output: out_path, width, height, json } => {
            let output = run_transform(&input)?;
            let options = RenderOptions {
                width,
                height,
                format: if json { OutputFormat::Json } else { OutputFormat::Png },
            };
            let bytes = match options.format {
                OutputFormat::Json => {
                    let mut text = serde_json::to_vec_pretty(&output.model)
                        .context("Failed to serialize series model")?;
                    text.push(b'\n');
                    text
                }
                OutputFormat::Png => render_png(&output.model, &output.legend_state, &options)
                    .context("Failed to render chart")?,
            };
            write_bytes(out_path.as_deref(), &bytes)
        }
    }
}

fn run_transform(input: &InputArgs) -> Result<TransformOutput> {
    // 1. Form data
    let form = FormData::from_path(&input.form)?;

    // 2. Result sets
    let queries = match &input.queries {
        Some(path) => read_queries(path)?,
        None => {
            let main = match &input.main {
                Some(path) => ResultSet::from_path(path)?,
                None => {
                    let csv = csv_reader::read_csv_from_stdin().context("Failed to read CSV from stdin")?;
                    ResultSet::from_csv(csv)
                }
            };
            let spec = input.spec.as_deref().map(ResultSet::from_path).transpose()?;
            QueriesData::new(main, spec)
        }
    };

    // 3. Legend state
    let legend_state = match &input.legend {
        Some(path) => read_legend(path)?,
        None => LegendState::new(),
    };

    Ok(transform_chart(&form, &queries, legend_state))
}

fn read_queries(path: &Path) -> Result<QueriesData> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read queries data {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse queries data {}", path.display()))?;
    QueriesData::from_json(&value)
}

fn read_legend(path: &Path) -> Result<LegendState> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read legend state {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse legend state {}", path.display()))
}

fn write_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let mut text = serde_json::to_vec_pretty(value).context("Failed to serialize output")?;
    text.push(b'\n');
    write_bytes(None, &text)
}

fn write_bytes(path: Option<&Path>, bytes: &[u8]) -> Result<()> {
    if let Some(path) = path {
        return std::fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()));
    }
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle.write_all(bytes).context("Failed to write to stdout")?;
    handle.flush().context("Failed to flush stdout")?;
    Ok(())
}
