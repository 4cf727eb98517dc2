use anyhow::{Context, Result};
use clap::Parser;
use cohort_cube::{CubeConfig, MissingTilePolicy, PeriodSelector};
use rayon::ThreadPoolBuilder;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 入力GeoTIFFタイルのディレクトリ
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// 出力NetCDFファイル
    #[arg(short, long, value_name = "FILE")]
    output: PathBuf,

    /// 対象年（省略時は最新の年）
    #[arg(long)]
    year: Option<String>,

    /// 入力ファイルの拡張子
    #[arg(long, default_value = "tif")]
    ext: String,

    /// 出力変数名
    #[arg(long, default_value = "population")]
    variable: String,

    /// 出力変数の単位
    #[arg(long, default_value = "people")]
    units: String,

    /// 空間方向のチャンクサイズ（ピクセル）
    #[arg(long, default_value_t = cohort_cube::config::DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// deflate圧縮レベル（0-9、0は無圧縮）
    #[arg(long, default_value_t = cohort_cube::config::DEFAULT_COMPRESSION_LEVEL)]
    compression: i32,

    /// 欠損タイルを0ではなくNoData値で埋める
    #[arg(long)]
    fill_missing_with_nodata: bool,

    /// 並列処理スレッド数（デフォルト: CPUコア数）
    #[arg(short, long)]
    threads: Option<usize>,
}

impl Args {
    fn into_config(self) -> CubeConfig {
        let mut config = CubeConfig::new(self.input, self.output)
            .with_period(PeriodSelector::from_option(self.year))
            .with_chunk_size(self.chunk_size);
        config.extension = self.ext;
        config.variable_name = self.variable;
        config.units = self.units;
        config.compression_level = self.compression;
        if self.fill_missing_with_nodata {
            config = config.with_missing_policy(MissingTilePolicy::Nodata);
        }
        config
    }
}

fn main() -> Result<()> {
    // ログの初期化
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // CLI引数の解析
    let args = Args::parse();

    // 処理開始時間を記録
    let start_time = std::time::Instant::now();

    // スレッドプールの設定
    if let Some(threads) = args.threads {
        ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to build thread pool")?;
    }

    let config = args.into_config();
    let summary = cohort_cube::run(&config)
        .with_context(|| format!("Failed to build cube from {:?}", config.input_dir))?;

    if !summary.unparsed.is_empty() {
        warn!("{} files skipped (name did not match)", summary.unparsed.len());
    }
    if !summary.missing.is_empty() {
        warn!("{} gender/age combinations were filled", summary.missing.len());
    }
    info!(
        "Cube year={} shape={:?} written to {:?}",
        summary.year, summary.shape, summary.output_path
    );

    // 処理時間を表示
    let elapsed = start_time.elapsed();
    info!("Total processing time: {:?}", elapsed);

    Ok(())
}
