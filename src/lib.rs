pub mod annotate; // 结果叠加绘制
pub mod config; // 运行配置参数
pub mod input; // 视频输入
pub mod metrics; // 逐帧统计
pub mod models; // 模型接口与具体实现
pub mod template; // 模板匹配

pub mod ort_backend;

pub use crate::config::{load_class_list, Args};
pub use crate::metrics::RunMetrics;
pub use crate::models::{Bbox, BoxEncoding, YOLOv5};
pub use crate::ort_backend::{OrtBackend, OrtConfig, OrtEP};
pub use crate::template::{MatchMethod, Polarity};

/// 贪心非极大值抑制: 按置信度降序排序, 保留最高者并剔除与其 IoU 超过阈值的候选框
pub fn non_max_suppression(xs: &mut Vec<Bbox>, iou_threshold: f32) {
    xs.sort_by(|b1, b2| b2.confidence().partial_cmp(&b1.confidence()).unwrap());

    let mut current_index = 0;
    for index in 0..xs.len() {
        let mut drop = false;
        for prev_index in 0..current_index {
            let iou = xs[prev_index].iou(&xs[index]);
            if iou > iou_threshold {
                drop = true;
                break;
            }
        }
        if !drop {
            xs.swap(current_index, index);
            current_index += 1;
        }
    }
    xs.truncate(current_index);
}

pub fn gen_time_string(delimiter: &str) -> String {
    let offset = chrono::FixedOffset::east_opt(8 * 60 * 60).unwrap(); // Beijing
    let t_now = chrono::Utc::now().with_timezone(&offset);
    let fmt = format!(
        "%Y{}%m{}%d{}%H{}%M{}%S{}%f",
        delimiter, delimiter, delimiter, delimiter, delimiter, delimiter
    );
    t_now.format(&fmt).to_string()
}
