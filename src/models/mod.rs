//! 模型接口与检测结果类型
//!
//! ## 架构说明
//!
//! - **YOLOv5**: 完整模型实现 (加载 → 预处理 → 推理 → 后处理), 文件: `yolov5.rs`
//! - **Bbox**: 检测框, 坐标始终为源图像像素坐标系
//! - **BoxEncoding**: 模型输出的框编码方式 (中心点+宽高 / 对角点)

/// 模型输出的框编码方式
///
/// 训练导出的 ONNX 模型存在两种输出约定, 必须显式配置, 不能从数据推断:
/// - `CenterSize`: 每行为 [cx, cy, w, h, objectness, class_scores...]
/// - `CornerPair`: 每行为 [x1, y1, x2, y2, objectness, class_scores...]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum BoxEncoding {
    #[default]
    CenterSize,
    CornerPair,
}

/// 检测框 (Detection bounding box)
///
/// (x, y) 为左上角, 单位是源图像像素
#[derive(Clone, PartialEq, Default, Debug)]
pub struct Bbox {
    x: f32,
    y: f32,
    w: f32,
    h: f32,
    id: usize,
    confidence: f32,
}

impl Bbox {
    pub fn new(x: f32, y: f32, w: f32, h: f32, id: usize, confidence: f32) -> Self {
        Self {
            x,
            y,
            w,
            h,
            id,
            confidence,
        }
    }

    pub fn xmin(&self) -> f32 {
        self.x
    }

    pub fn ymin(&self) -> f32 {
        self.y
    }

    pub fn xmax(&self) -> f32 {
        self.x + self.w
    }

    pub fn ymax(&self) -> f32 {
        self.y + self.h
    }

    pub fn width(&self) -> f32 {
        self.w
    }

    pub fn height(&self) -> f32 {
        self.h
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn area(&self) -> f32 {
        self.w * self.h
    }

    /// 交并比, 退化框 (面积为 0) 的 IoU 定义为 0
    pub fn iou(&self, other: &Bbox) -> f32 {
        let x1 = self.xmin().max(other.xmin());
        let y1 = self.ymin().max(other.ymin());
        let x2 = self.xmax().min(other.xmax());
        let y2 = self.ymax().min(other.ymax());

        if x2 <= x1 || y2 <= y1 {
            return 0.0;
        }

        let intersection = (x2 - x1) * (y2 - y1);
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            return 0.0;
        }
        intersection / union
    }
}

pub mod yolov5;

pub use yolov5::{decode_predictions, YOLOv5};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iou_partial_overlap() {
        let a = Bbox::new(0.0, 0.0, 10.0, 10.0, 0, 0.9);
        let b = Bbox::new(5.0, 5.0, 10.0, 10.0, 0, 0.8);
        // 交 25, 并 175
        let iou = a.iou(&b);
        assert!((iou - 25.0 / 175.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_disjoint_is_zero() {
        let a = Bbox::new(0.0, 0.0, 10.0, 10.0, 0, 0.9);
        let b = Bbox::new(20.0, 20.0, 10.0, 10.0, 0, 0.8);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn test_iou_identical_is_one() {
        let a = Bbox::new(3.0, 4.0, 7.0, 8.0, 1, 0.5);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_zero_area_is_zero() {
        let a = Bbox::new(5.0, 5.0, 0.0, 0.0, 0, 0.9);
        let b = Bbox::new(0.0, 0.0, 10.0, 10.0, 0, 0.8);
        assert_eq!(a.iou(&b), 0.0);
        assert_eq!(a.iou(&a), 0.0);
    }
}
