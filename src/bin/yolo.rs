//! 视频目标检测统计
//!
//! 流程: 载入类别表 → 解码整段视频 → 逐帧检测 → 统计落盘
use anyhow::Result;
use clap::Parser;
use mimalloc::MiMalloc;

use mario_vision::annotate;
use mario_vision::input::read_video_frames;
use mario_vision::{gen_time_string, load_class_list, Args, RunMetrics, YOLOv5};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() -> Result<()> {
    let args = Args::parse();

    let class_list = load_class_list(&args.classes)?;
    println!("This network can detect the following objects:");
    for name in &class_list {
        println!("  {name}");
    }

    let font = match &args.font {
        Some(path) => Some(annotate::load_font(path)?),
        None => None,
    };

    // 整段视频先解码进内存, 统计数组按已知总帧数预分配
    let frames = read_video_frames(&args.source)?;
    let total_frames = frames.len();
    println!("Loaded {total_frames} frames from the video stream");

    let mut model = YOLOv5::new(&args, class_list.clone())?;
    model.summary();

    let mut metrics = RunMetrics::new(total_frames, class_list.len());
    for (n, frame) in frames.iter().enumerate() {
        let t = std::time::Instant::now();
        let boxes = model.detect(frame)?;
        let elapsed = t.elapsed();

        let mut counts = vec![0u32; class_list.len()];
        for b in &boxes {
            counts[b.id()] += 1;
        }
        metrics.record(n, counts, elapsed);
        println!("total {} identified objects in frame {}", boxes.len(), n);

        if args.annotate && n == 0 {
            let mut annotated = frame.clone();
            annotate::draw_detections(&mut annotated, &boxes, &class_list, font.as_ref());
            std::fs::create_dir_all(&args.output_dir)?;
            let path = format!("{}/{}.png", args.output_dir, gen_time_string("-"));
            annotated.save(&path)?;
            println!("Annotated frame saved to {path}");
        }
    }

    metrics.save(&args.output_dir)?;
    println!("Completed processing, total frames: {total_frames}");
    Ok(())
}
