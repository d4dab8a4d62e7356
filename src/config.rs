//! 运行配置参数
use anyhow::{ensure, Context, Result};
use clap::Parser;

use crate::models::BoxEncoding;

/// 视频目标检测统计参数
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "count platformer objects per frame with a YOLOv5 detector")]
pub struct Args {
    /// ONNX 模型路径
    #[arg(long, default_value = "network/yolov5s_mario.onnx")]
    pub model: String,

    /// 输入视频路径
    #[arg(long, default_value = "data/mario.mp4")]
    pub source: String,

    /// 类别名称列表 (每行一个, 行号即类别 id)
    #[arg(long, default_value = "network/classes_mario.txt")]
    pub classes: String,

    /// objectness 阈值
    #[arg(long, default_value_t = 0.4)]
    pub conf: f32,

    /// 类别分数阈值
    #[arg(long, default_value_t = 0.25)]
    pub score_threshold: f32,

    /// NMS IoU 阈值
    #[arg(long, default_value_t = 0.45)]
    pub iou: f32,

    /// 模型输出的框编码方式
    #[arg(long, value_enum, default_value_t = BoxEncoding::CenterSize)]
    pub encoding: BoxEncoding,

    /// 模型输入边长 (letterbox 后的正方形)
    #[arg(long, default_value_t = 640)]
    pub input_size: u32,

    /// 使用 CUDA 推理
    #[arg(long)]
    pub cuda: bool,

    /// 使用 TensorRT 推理
    #[arg(long)]
    pub trt: bool,

    /// GPU 设备 id
    #[arg(long, default_value_t = 0)]
    pub device_id: i32,

    /// TensorRT 下启用 FP16
    #[arg(long)]
    pub fp16: bool,

    /// 打印各阶段耗时
    #[arg(long)]
    pub profile: bool,

    /// 统计结果输出目录
    #[arg(long, default_value = "runs")]
    pub output_dir: String,

    /// 保存首帧的检测叠加图
    #[arg(long)]
    pub annotate: bool,

    /// 标签字体文件 (缺省只画框不写字)
    #[arg(long)]
    pub font: Option<String>,
}

/// 读取类别名称列表, 行号即类别 id
pub fn load_class_list(path: &str) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("class list not found: {path}"))?;
    let names: Vec<String> = content
        .lines()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect();
    ensure!(!names.is_empty(), "class list is empty: {path}");
    Ok(names)
}
