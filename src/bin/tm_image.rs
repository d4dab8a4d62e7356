//! 单张图片模板匹配
//!
//! 位置参数: <image> <template> [<method-name>] [<threshold>]
//! 命中框画在原图上, 保存为 runs/tm_result.png
use anyhow::{Context, Result};
use clap::Parser;

use mario_vision::annotate::draw_matches;
use mario_vision::template::{load_template, threshold_matches};
use mario_vision::MatchMethod;

#[derive(Parser, Debug)]
#[command(author, version, about = "match a template against a single image")]
struct Args {
    /// 源图像路径
    image: String,

    /// 灰度模板路径
    template: String,

    /// 比较方法
    #[arg(default_value = "TM_CCOEFF_NORMED")]
    method: MatchMethod,

    /// 匹配阈值
    #[arg(default_value_t = 0.8)]
    threshold: f32,

    /// 输出目录
    #[arg(long, default_value = "runs")]
    output_dir: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut img = image::open(&args.image)
        .with_context(|| format!("image not found: {}", args.image))?
        .to_rgb8();
    let template = load_template(&args.template)?;
    let gray = image::imageops::grayscale(&img);

    let scores = args.method.score_map(&gray, &template);
    let hits = threshold_matches(&scores, args.method, args.threshold);

    let (tw, th) = template.dimensions();
    draw_matches(&mut img, &hits, tw, th);

    println!(
        "{} objects detected using method {} with a threshold of {}",
        hits.len(),
        args.method,
        args.threshold
    );

    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("failed to create output dir: {}", args.output_dir))?;
    let out_path = format!("{}/tm_result.png", args.output_dir);
    img.save(&out_path)
        .with_context(|| format!("failed to write {out_path}"))?;
    println!("Result saved to {out_path}");
    Ok(())
}
