// mnist_cli/src/bin/dump.rs
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use mnist_cli::{init_tracing, parse_args};
use mnist_mlp::dump::write_tensor_text;
use mnist_mlp::{read_single_image, read_single_label};
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mode {
    Image,
    Label,
}

/// Dump one sample of an IDX file as a text tensor (rank, shape, values).
#[derive(Parser, Debug)]
#[command(name = "mnist-dump", version)]
struct Cli {
    mode: Mode,
    input: PathBuf,
    output: PathBuf,
    index: usize,
}

fn main() -> Result<()> {
    init_tracing();
    let cli: Cli = parse_args();

    match cli.mode {
        Mode::Image => {
            let image = read_single_image(&cli.input, cli.index)
                .with_context(|| format!("reading image {} of {}", cli.index, cli.input.display()))?;
            write_tensor_text(&image, &cli.output)?;
            println!("Wrote image {} to {}", cli.index, cli.output.display());
        }
        Mode::Label => {
            let label = read_single_label(&cli.input, cli.index)
                .with_context(|| format!("reading label {} of {}", cli.index, cli.input.display()))?;
            write_tensor_text(&label, &cli.output)?;
            println!("Wrote label {} (one-hot) to {}", cli.index, cli.output.display());
        }
    }
    Ok(())
}
