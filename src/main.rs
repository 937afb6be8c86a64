use allochart::{read_dataset, render_to_json, InputFormat, RenderOptions};
use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, Write};

#[derive(Parser, Debug)]
#[command(name = "allochart")]
#[command(about = "Build chart specifications from patient data using a small chart DSL", long_about = None)]
struct Args {
    /// Chart command (e.g., 'stacked(x: "Age Group", stack: "Main Diagnosis", normalize: true)')
    dsl: String,

    /// Format of the data read from stdin (csv or json)
    #[arg(long, default_value = "csv")]
    input: InputFormat,

    /// Chart width in pixels, overrides size(...)
    #[arg(long)]
    width: Option<u32>,

    /// Chart height in pixels, overrides size(...)
    #[arg(long)]
    height: Option<u32>,

    /// Write the chart as single-line JSON
    #[arg(long)]
    compact: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let data = read_dataset(io::stdin().lock(), args.input)
        .context("Failed to read data from stdin")?;

    let options = RenderOptions {
        width: args.width,
        height: args.height,
        format: args.input,
        pretty: !args.compact,
    };
    let (json, chart) = render_to_json(&args.dsl, &data, &options).context("Failed to build chart")?;

    for warning in &chart.warnings {
        eprintln!("Warning: {}", warning);
    }

    // Write JSON to stdout
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{}", json).context("Failed to write chart to stdout")?;
    handle.flush().context("Failed to flush stdout")?;

    Ok(())
}
