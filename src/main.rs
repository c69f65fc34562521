use anyhow::{Result, bail};
use clap::Parser;
use log::info;
use std::path::PathBuf;
use timelapse_assembler::component::timelapse_generator::{
    GenerationContext, TimelapseGenerator, print_summary,
};
use timelapse_assembler::config::{Config, DEFAULT_CONFIG_FILE};
use timelapse_assembler::init;
use timelapse_assembler::tools::validate_directory_exists;

#[derive(Parser)]
#[command(name = "timelapse", version, about = "依排程將拍攝的影像組合成縮時影片")]
struct Cli {
    /// 設定檔路徑
    #[arg(long, short, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// 只執行指定名稱的產生設定，可重複指定
    #[arg(long = "only", value_name = "NAME")]
    only: Vec<String>,
}

fn main() -> Result<()> {
    init::init();
    let cli = Cli::parse();

    let config = Config::load(&cli.config)?;
    validate_directory_exists(&config.images_dir)?;

    let generations = config.select_generations(&cli.only)?;
    let registry = config.build_registry();

    info!("使用設定檔: {}", cli.config.display());

    let generator = TimelapseGenerator::new(GenerationContext::from(&config), registry.as_ref());
    let summary = generator.run(&generations)?;

    print_summary(&summary);

    if summary.failed() > 0 {
        bail!("{} 個產生設定失敗", summary.failed());
    }

    Ok(())
}
