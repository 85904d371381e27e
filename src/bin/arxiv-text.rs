use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use arxiv_text::{logging, ArxivText, ArxivTextConfig, Split};

/// Join ogbn-arxiv node labels with paper titles and abstracts.
#[derive(Parser, Debug)]
#[command(name = "arxiv-text", version)]
struct Cli {
    /// Directory holding (or receiving) `ogbn_arxiv/`.
    #[arg(long, default_value = "arxiv")]
    root: PathBuf,

    /// Headerless `paper id <TAB> title <TAB> abstract` file [default: <ROOT>/titleabs.tsv].
    #[arg(long)]
    text: Option<PathBuf>,

    /// Override for `mapping/nodeidx2paperid.csv.gz`.
    #[arg(long)]
    mapping: Option<PathBuf>,

    /// Download the dataset and the text file when missing.
    #[arg(long)]
    download: bool,

    /// Write `train.parquet`, `valid.parquet`, `test.parquet` here.
    #[arg(long)]
    output: Option<PathBuf>,
}

impl From<Cli> for ArxivTextConfig {
    fn from(cli: Cli) -> Self {
        let mut config = ArxivTextConfig::new(&cli.root).with_download(cli.download);
        if let Some(text) = cli.text {
            config = config.with_text_path(text);
        }
        if let Some(mapping) = cli.mapping {
            config = config.with_mapping_path(mapping);
        }
        config
    }
}

// cargo run --release -- --root arxiv --download --output arxiv/processed
fn main() -> Result<()> {
    logging::init();

    let cli = Cli::parse();
    let output = cli.output.clone();
    let config = ArxivTextConfig::from(cli);

    let data = ArxivText::load(&config)?;
    for split in Split::ALL {
        println!("{:5}: {} nodes", split.name(), data.get(split).height());
    }
    if let Some(output) = output {
        data.write_parquet(output)?;
    }
    Ok(())
}
