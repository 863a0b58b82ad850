// 回放抓取的原始 PS 码流，统计重组结果

use anyhow::{Context, Result};
use clap::Parser;
use hiksdk_ps::{
    DemuxError, DemuxerConfig, MetricsSnapshot, PacketReceiver, StreamReceiver, TailPolicy,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// 原始码流文件（设备回调数据的抓包）
    input: PathBuf,

    /// 每次投递的字节数，模拟设备回调的分块
    #[arg(long, default_value_t = 4096)]
    chunk_size: usize,

    /// 解封装器配置文件（TOML）
    #[arg(long)]
    config: Option<PathBuf>,

    /// 等待下一个起始码再输出末尾的包
    #[arg(long)]
    hold_tail: bool,

    /// 将重组后的包按顺序写入文件
    #[arg(long)]
    output: Option<PathBuf>,

    /// 额外输出 Prometheus 文本格式指标
    #[arg(long)]
    metrics: bool,
}

#[derive(Debug, Default, Serialize)]
struct Summary {
    input_bytes: usize,
    chunks: usize,
    overflows: usize,
    packets: BTreeMap<&'static str, u64>,
    output_bytes: u64,
    metrics: MetricsSnapshot,
}

fn load_config(args: &Args) -> Result<DemuxerConfig> {
    let mut config = match &args.config {
        Some(path) => DemuxerConfig::load(path)
            .with_context(|| format!("Failed to load config file: {:?}", path))?,
        None => DemuxerConfig::default(),
    };

    if args.hold_tail {
        config.tail_policy = TailPolicy::Hold;
    }

    Ok(config)
}

/// 消费端：按起始码分类计数，可选写出
async fn consume(
    mut rx: PacketReceiver,
    output: Option<PathBuf>,
) -> Result<(BTreeMap<&'static str, u64>, u64)> {
    let mut file = match &output {
        Some(path) => Some(
            tokio::fs::File::create(path)
                .await
                .with_context(|| format!("Failed to create output file: {:?}", path))?,
        ),
        None => None,
    };

    let mut counts = BTreeMap::new();
    let mut written = 0u64;

    while let Some(packet) = rx.recv().await {
        *counts.entry(packet.start_code().name()).or_insert(0) += 1;

        if let Some(file) = file.as_mut() {
            file.write_all(packet.data()).await?;
            written += packet.len() as u64;
        }
    }

    if let Some(mut file) = file {
        file.flush().await?;
    }

    Ok((counts, written))
}

async fn replay(
    input: &Path,
    chunk_size: usize,
    config: &DemuxerConfig,
    output: Option<PathBuf>,
) -> Result<(Summary, Arc<StreamReceiver>)> {
    if chunk_size == 0 {
        anyhow::bail!("chunk_size must be greater than 0");
    }

    let data = tokio::fs::read(input)
        .await
        .with_context(|| format!("Failed to read input file: {:?}", input))?;

    let receiver = Arc::new(StreamReceiver::new()?);
    let rx = receiver.start(config)?;
    let consumer = tokio::spawn(consume(rx, output));

    let mut summary = Summary {
        input_bytes: data.len(),
        ..Default::default()
    };

    for chunk in data.chunks(chunk_size) {
        summary.chunks += 1;
        match receiver.submit(chunk) {
            Ok(_) => {}
            Err(DemuxError::Overflow { size, limit }) => {
                tracing::warn!(
                    "Buffer overflow at chunk {} ({} > {})",
                    summary.chunks,
                    size,
                    limit
                );
                summary.overflows += 1;
            }
            Err(e) => return Err(e.into()),
        }
        tokio::task::yield_now().await;
    }

    receiver.stop();

    let (packets, output_bytes) = consumer.await??;
    summary.packets = packets;
    summary.output_bytes = output_bytes;
    summary.metrics = receiver.metrics().snapshot();

    Ok((summary, receiver))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    tracing::info!("Replaying {:?} in {} byte chunks", args.input, args.chunk_size);

    let (summary, receiver) =
        replay(&args.input, args.chunk_size, &config, args.output.clone()).await?;

    println!("{}", serde_json::to_string_pretty(&summary)?);

    if args.metrics {
        println!("{}", receiver.metrics().encode_text()?);
    }

    Ok(())
}
