//! 视频模板匹配统计
//!
//! 每个模板算一个类别, 统计数组每模板一列
use anyhow::{Context, Result};
use clap::Parser;
use image::GrayImage;
use mimalloc::MiMalloc;

use mario_vision::input::read_video_frames;
use mario_vision::template::{load_template, threshold_matches};
use mario_vision::{MatchMethod, RunMetrics};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser, Debug)]
#[command(author, version, about = "count template matches per frame over a video")]
struct Args {
    /// 输入视频路径
    #[arg(long, default_value = "data/mario.mp4")]
    source: String,

    /// 灰度模板图, 可多次给出, 每个模板统计一列
    #[arg(long = "template", required = true)]
    templates: Vec<String>,

    /// 比较方法 (TM_CCOEFF / TM_CCOEFF_NORMED / TM_CCORR / TM_CCORR_NORMED / TM_SQDIFF / TM_SQDIFF_NORMED)
    #[arg(long, default_value = "TM_CCOEFF_NORMED")]
    method: MatchMethod,

    /// 匹配阈值 (相似度方法保留 ≥, 差异方法保留 ≤)
    #[arg(long, default_value_t = 0.9)]
    threshold: f32,

    /// 统计结果输出目录
    #[arg(long, default_value = "runs")]
    output_dir: String,
}

fn template_name(path: &str) -> String {
    std::path::Path::new(path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let templates: Vec<(String, GrayImage)> = args
        .templates
        .iter()
        .map(|path| Ok((template_name(path), load_template(path)?)))
        .collect::<Result<_>>()
        .context("failed to load templates")?;

    // 整段视频先解码进内存, 统计数组按已知总帧数预分配
    let frames = read_video_frames(&args.source)?;
    let total_frames = frames.len();
    println!("Loaded {total_frames} frames from the video stream");

    let mut metrics = RunMetrics::new(total_frames, templates.len());
    for (n, frame) in frames.iter().enumerate() {
        let t = std::time::Instant::now();
        let gray = image::imageops::grayscale(frame);

        let mut counts = Vec::with_capacity(templates.len());
        for (name, template) in &templates {
            let scores = args.method.score_map(&gray, template);
            let hits = threshold_matches(&scores, args.method, args.threshold);
            println!("{} {} detected at frame {}", hits.len(), name, n);
            counts.push(hits.len() as u32);
        }
        metrics.record(n, counts, t.elapsed());
    }

    metrics.save(&args.output_dir)?;
    println!("Total frames: {total_frames}");
    Ok(())
}
