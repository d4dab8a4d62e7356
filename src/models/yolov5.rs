//! YOLOv5 完整模型实现
//!
//! 包含: 模型加载、letterbox 预处理、推理、后处理 (解码 → NMS → 坐标还原)
use anyhow::{ensure, Result};
use image::{imageops, RgbImage};
use ndarray::{s, Array, ArrayView2, Axis, Ix3, IxDyn};

use crate::{non_max_suppression, Args, Bbox, BoxEncoding, OrtBackend, OrtConfig, OrtEP};

pub struct YOLOv5 {
    engine: OrtBackend,
    nc: usize,
    height: u32,
    width: u32,
    conf: f32,
    score_threshold: f32,
    iou: f32,
    encoding: BoxEncoding,
    names: Vec<String>,
    profile: bool,
}

impl YOLOv5 {
    pub fn new(args: &Args, names: Vec<String>) -> Result<Self> {
        // execution provider
        let ep = if args.trt {
            OrtEP::Trt(args.device_id)
        } else if args.cuda {
            OrtEP::CUDA(args.device_id)
        } else {
            OrtEP::CPU
        };

        // build ort engine
        let engine = OrtBackend::build(OrtConfig {
            f: args.model.clone(),
            ep,
            trt_fp16: args.fp16,
            image_size: (args.input_size, args.input_size),
        })?;

        ensure!(!names.is_empty(), "class list is empty");
        Ok(Self {
            nc: names.len(),
            height: engine.height(),
            width: engine.width(),
            conf: args.conf,
            score_threshold: args.score_threshold,
            iou: args.iou,
            encoding: args.encoding,
            names,
            profile: args.profile,
            engine,
        })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// 左上角对齐补零成正方形 (与训练时的 letterbox 一致), 返回边长
    fn make_square(frame: &RgbImage) -> (RgbImage, u32) {
        let (w, h) = frame.dimensions();
        let size = w.max(h);
        let mut square = RgbImage::new(size, size);
        imageops::replace(&mut square, frame, 0, 0);
        (square, size)
    }

    /// 预处理: 帧 → NCHW f32 张量, 返回 (张量, 统一缩放因子)
    ///
    /// 缩放因子 = max(w, h) / 模型输入边长, 横纵共用 (letterbox 为正方形)
    pub fn preprocess(&self, frame: &RgbImage) -> (Array<f32, IxDyn>, f32) {
        let (square, size) = Self::make_square(frame);
        let resized = imageops::resize(
            &square,
            self.width,
            self.height,
            imageops::FilterType::Triangle,
        );

        let mut ys =
            Array::zeros((1, 3, self.height as usize, self.width as usize)).into_dyn();
        for (x, y, rgb) in resized.enumerate_pixels() {
            let [r, g, b] = rgb.0;
            ys[[0, 0, y as usize, x as usize]] = r as f32 / 255.0;
            ys[[0, 1, y as usize, x as usize]] = g as f32 / 255.0;
            ys[[0, 2, y as usize, x as usize]] = b as f32 / 255.0;
        }

        (ys, size as f32 / self.width as f32)
    }

    /// 单帧检测: 预处理 → 推理 → 后处理
    pub fn detect(&mut self, frame: &RgbImage) -> Result<Vec<Bbox>> {
        let t_pre = std::time::Instant::now();
        let (xs, scale) = self.preprocess(frame);
        if self.profile {
            println!("[Model Preprocess]: {:?}", t_pre.elapsed());
        }

        let ys = self.engine.run(xs, self.profile)?;

        let t_post = std::time::Instant::now();
        let (w, h) = frame.dimensions();
        let boxes = self.postprocess(ys, w, h, scale)?;
        if self.profile {
            println!("[Model Postprocess]: {:?}", t_post.elapsed());
        }
        Ok(boxes)
    }

    /// 后处理: 原始输出 [1, rows, 5+nc] → 源图像素坐标下的检测框
    pub fn postprocess(
        &self,
        ys: Array<f32, IxDyn>,
        frame_w: u32,
        frame_h: u32,
        scale: f32,
    ) -> Result<Vec<Bbox>> {
        let preds = ys
            .into_dimensionality::<Ix3>()
            .map_err(|_| anyhow::anyhow!("unexpected output rank, expected [batch, rows, dims]"))?;
        let preds = preds.index_axis_move(Axis(0), 0);
        ensure!(
            preds.shape()[1] == 5 + self.nc,
            "model output has {} columns but class list implies {} (5 + {})",
            preds.shape()[1],
            5 + self.nc,
            self.nc
        );

        let mut boxes = decode_predictions(
            &preds.view(),
            self.encoding,
            self.conf,
            self.score_threshold,
            scale,
            frame_w as f32,
            frame_h as f32,
        );
        non_max_suppression(&mut boxes, self.iou);
        Ok(boxes)
    }

    pub fn summary(&self) {
        println!(
            "\nSummary:\n\
            > EP: {:?}\n\
            > Input: {}x{}\n\
            > Encoding: {:?}\n\
            > Classes: {}\n\
            > conf: {} score: {} iou: {}\n",
            self.engine.ep(),
            self.width,
            self.height,
            self.encoding,
            self.nc,
            self.conf,
            self.score_threshold,
            self.iou,
        );
    }
}

/// 决策层: 原始预测行 → 阈值筛选 → 解码 → 坐标还原
///
/// 每行为 [box(4), objectness, class_scores...], 框编码由 `encoding` 显式给定.
/// 返回框的置信度取 objectness, 坐标约束在 [0, frame_w] × [0, frame_h] 内.
pub fn decode_predictions(
    preds: &ArrayView2<f32>,
    encoding: BoxEncoding,
    obj_threshold: f32,
    cls_threshold: f32,
    scale: f32,
    frame_w: f32,
    frame_h: f32,
) -> Vec<Bbox> {
    let mut out = Vec::new();
    for row in preds.axis_iter(Axis(0)) {
        let objectness = row[4];
        if objectness < obj_threshold {
            continue;
        }

        let clss = row.slice(s![5..]);
        let Some((id, &score)) = clss
            .into_iter()
            .enumerate()
            .reduce(|max, x| if x.1 > max.1 { x } else { max })
        else {
            continue;
        };
        if score <= cls_threshold {
            continue;
        }

        let (x, y, w, h) = match encoding {
            BoxEncoding::CenterSize => {
                let (cx, cy, bw, bh) = (row[0], row[1], row[2], row[3]);
                (cx - 0.5 * bw, cy - 0.5 * bh, bw, bh)
            }
            BoxEncoding::CornerPair => {
                let (x1, y1, x2, y2) = (row[0], row[1], row[2], row[3]);
                (x1, y1, x2 - x1, y2 - y1)
            }
        };

        // 统一缩放因子还原到源图像素, 并约束在图像范围内
        let x = (x * scale).clamp(0.0, frame_w);
        let y = (y * scale).clamp(0.0, frame_h);
        let w = (w * scale).clamp(0.0, frame_w - x);
        let h = (h * scale).clamp(0.0, frame_h - y);

        out.push(Bbox::new(x, y, w, h, id, objectness));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    const OBJ: f32 = 0.4;
    const CLS: f32 = 0.25;

    fn rows(data: Vec<Vec<f32>>) -> Array2<f32> {
        let cols = data[0].len();
        let flat: Vec<f32> = data.into_iter().flatten().collect();
        Array2::from_shape_vec((flat.len() / cols, cols), flat).unwrap()
    }

    #[test]
    fn test_all_objectness_below_threshold_yields_empty_list() {
        let preds = rows(vec![
            vec![320.0, 320.0, 64.0, 64.0, 0.39, 0.9, 0.1],
            vec![100.0, 100.0, 32.0, 32.0, 0.1, 0.8, 0.2],
        ]);
        let boxes = decode_predictions(
            &preds.view(),
            BoxEncoding::CenterSize,
            OBJ,
            CLS,
            1.0,
            640.0,
            640.0,
        );
        assert!(boxes.is_empty());
    }

    #[test]
    fn test_class_score_at_threshold_is_discarded() {
        // 类别分数必须严格大于阈值
        let preds = rows(vec![vec![320.0, 320.0, 64.0, 64.0, 0.9, 0.25, 0.1]]);
        let boxes = decode_predictions(
            &preds.view(),
            BoxEncoding::CenterSize,
            OBJ,
            CLS,
            1.0,
            640.0,
            640.0,
        );
        assert!(boxes.is_empty());
    }

    #[test]
    fn test_center_size_decoding_and_uniform_rescale() {
        // 源图 320×240 → 正方形 320 → 输入 640, scale = 0.5
        let preds = rows(vec![vec![320.0, 320.0, 64.0, 64.0, 0.9, 0.1, 0.8]]);
        let boxes = decode_predictions(
            &preds.view(),
            BoxEncoding::CenterSize,
            OBJ,
            CLS,
            0.5,
            320.0,
            240.0,
        );
        assert_eq!(boxes.len(), 1);
        let b = &boxes[0];
        assert_eq!(b.id(), 1);
        assert_eq!(b.confidence(), 0.9);
        assert!((b.xmin() - 144.0).abs() < 1e-4);
        assert!((b.ymin() - 144.0).abs() < 1e-4);
        assert!((b.width() - 32.0).abs() < 1e-4);
        assert!((b.height() - 32.0).abs() < 1e-4);
    }

    #[test]
    fn test_corner_pair_decoding_and_uniform_rescale() {
        let preds = rows(vec![vec![288.0, 288.0, 352.0, 352.0, 0.9, 0.1, 0.8]]);
        let boxes = decode_predictions(
            &preds.view(),
            BoxEncoding::CornerPair,
            OBJ,
            CLS,
            0.5,
            320.0,
            240.0,
        );
        assert_eq!(boxes.len(), 1);
        let b = &boxes[0];
        assert!((b.xmin() - 144.0).abs() < 1e-4);
        assert!((b.ymin() - 144.0).abs() < 1e-4);
        assert!((b.width() - 32.0).abs() < 1e-4);
        assert!((b.height() - 32.0).abs() < 1e-4);
    }

    #[test]
    fn test_boxes_are_clamped_into_frame() {
        // 框伸出图像右下角
        let preds = rows(vec![vec![630.0, 630.0, 100.0, 100.0, 0.9, 0.1, 0.8]]);
        let boxes = decode_predictions(
            &preds.view(),
            BoxEncoding::CenterSize,
            OBJ,
            CLS,
            1.0,
            640.0,
            480.0,
        );
        assert_eq!(boxes.len(), 1);
        let b = &boxes[0];
        assert!(b.xmin() >= 0.0 && b.ymin() >= 0.0);
        assert!(b.xmax() <= 640.0);
        assert!(b.ymax() <= 480.0);
    }

    #[test]
    fn test_negative_corner_is_clamped_to_origin() {
        let preds = rows(vec![vec![10.0, 10.0, 100.0, 100.0, 0.9, 0.1, 0.8]]);
        let boxes = decode_predictions(
            &preds.view(),
            BoxEncoding::CenterSize,
            OBJ,
            CLS,
            1.0,
            640.0,
            480.0,
        );
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].xmin(), 0.0);
        assert_eq!(boxes[0].ymin(), 0.0);
    }

    #[test]
    fn test_returned_detections_satisfy_thresholds() {
        let preds = rows(vec![
            vec![100.0, 100.0, 50.0, 50.0, 0.95, 0.7, 0.2],
            vec![300.0, 300.0, 50.0, 50.0, 0.45, 0.1, 0.3],
            vec![500.0, 500.0, 50.0, 50.0, 0.39, 0.9, 0.1],
            vec![200.0, 400.0, 50.0, 50.0, 0.8, 0.2, 0.24],
        ]);
        let boxes = decode_predictions(
            &preds.view(),
            BoxEncoding::CenterSize,
            OBJ,
            CLS,
            1.0,
            640.0,
            640.0,
        );
        assert_eq!(boxes.len(), 2);
        for b in &boxes {
            assert!(b.confidence() >= OBJ);
        }
    }

    #[test]
    fn test_argmax_picks_best_class() {
        let preds = rows(vec![vec![100.0, 100.0, 50.0, 50.0, 0.9, 0.1, 0.3, 0.85, 0.2]]);
        let boxes = decode_predictions(
            &preds.view(),
            BoxEncoding::CenterSize,
            OBJ,
            CLS,
            1.0,
            640.0,
            640.0,
        );
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].id(), 2);
    }

    #[test]
    fn test_overlapping_same_class_pair_keeps_higher_confidence() {
        // 两个高度重叠的候选框 (IoU ≈ 0.9), NMS 阈值 0.45 → 只留置信度高者
        let preds = rows(vec![
            vec![100.0, 100.0, 100.0, 100.0, 0.95, 0.9, 0.1],
            vec![102.0, 100.0, 100.0, 100.0, 0.80, 0.9, 0.1],
        ]);
        let mut boxes = decode_predictions(
            &preds.view(),
            BoxEncoding::CenterSize,
            OBJ,
            CLS,
            1.0,
            640.0,
            640.0,
        );
        crate::non_max_suppression(&mut boxes, 0.45);
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].confidence(), 0.95);
    }
}
