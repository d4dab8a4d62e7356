//! 模板匹配
//!
//! 六种比较方法, 与 OpenCV 的 TM_* 常量一一对应:
//! TM_CCOEFF, TM_CCOEFF_NORMED, TM_CCORR, TM_CCORR_NORMED, TM_SQDIFF, TM_SQDIFF_NORMED
//! 各方法的差异可参考:
//! https://docs.opencv.org/master/d4/dc6/tutorial_py_template_matching.html
//!
//! CCORR/SQDIFF 系列直接由 imageproc 计算; CCOEFF 系列在 CCORR 分数图上
//! 用积分图减去窗口均值项得到.
use anyhow::{bail, Context, Result};
use image::{GrayImage, ImageBuffer, Luma};
use imageproc::integral_image::{integral_image, integral_squared_image, sum_image_pixels};
use imageproc::template_matching::{match_template, MatchTemplateMethod};

/// 分数图: 每个候选对齐位置一个分数
pub type ScoreMap = ImageBuffer<Luma<f32>, Vec<f32>>;

/// 阈值极性: 相似度方法越大越好, 差异方法越小越好
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Maximize,
    Minimize,
}

/// 比较方法 (封闭枚举, 极性随变体确定, 不从数据推断)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMethod {
    Ccoeff,
    CcoeffNormed,
    Ccorr,
    CcorrNormed,
    Sqdiff,
    SqdiffNormed,
}

impl MatchMethod {
    pub fn polarity(&self) -> Polarity {
        match self {
            MatchMethod::Sqdiff | MatchMethod::SqdiffNormed => Polarity::Minimize,
            _ => Polarity::Maximize,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MatchMethod::Ccoeff => "TM_CCOEFF",
            MatchMethod::CcoeffNormed => "TM_CCOEFF_NORMED",
            MatchMethod::Ccorr => "TM_CCORR",
            MatchMethod::CcorrNormed => "TM_CCORR_NORMED",
            MatchMethod::Sqdiff => "TM_SQDIFF",
            MatchMethod::SqdiffNormed => "TM_SQDIFF_NORMED",
        }
    }

    /// 计算分数图, 模板在任一维度大于图像时由底层断言失败
    pub fn score_map(&self, image: &GrayImage, template: &GrayImage) -> ScoreMap {
        match self {
            MatchMethod::Ccorr => {
                match_template(image, template, MatchTemplateMethod::CrossCorrelation)
            }
            MatchMethod::CcorrNormed => {
                match_template(image, template, MatchTemplateMethod::CrossCorrelationNormalized)
            }
            MatchMethod::Sqdiff => {
                match_template(image, template, MatchTemplateMethod::SumOfSquaredErrors)
            }
            MatchMethod::SqdiffNormed => {
                match_template(image, template, MatchTemplateMethod::SumOfSquaredErrorsNormalized)
            }
            MatchMethod::Ccoeff => ccoeff_map(image, template, false),
            MatchMethod::CcoeffNormed => ccoeff_map(image, template, true),
        }
    }
}

impl std::fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for MatchMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.to_ascii_uppercase().replace('-', "_");
        let normalized = normalized.strip_prefix("TM_").unwrap_or(&normalized);
        Ok(match normalized {
            "CCOEFF" => MatchMethod::Ccoeff,
            "CCOEFF_NORMED" => MatchMethod::CcoeffNormed,
            "CCORR" => MatchMethod::Ccorr,
            "CCORR_NORMED" => MatchMethod::CcorrNormed,
            "SQDIFF" => MatchMethod::Sqdiff,
            "SQDIFF_NORMED" => MatchMethod::SqdiffNormed,
            _ => bail!(
                "unknown method {s:?}, expected one of TM_CCOEFF, TM_CCOEFF_NORMED, \
                 TM_CCORR, TM_CCORR_NORMED, TM_SQDIFF, TM_SQDIFF_NORMED"
            ),
        })
    }
}

/// CCOEFF = CCORR − ΣI·T̄ (均值中心化的互相关)
///
/// 归一化形式除以 sqrt((ΣI²−N·Ī²)·Σ(T−T̄)²), 分母接近 0 时分数取 0
fn ccoeff_map(image: &GrayImage, template: &GrayImage, normalize: bool) -> ScoreMap {
    let ccorr = match_template(image, template, MatchTemplateMethod::CrossCorrelation);
    let (tw, th) = template.dimensions();
    let n = (tw as f64) * (th as f64);

    let t_sum: f64 = template.iter().map(|&p| p as f64).sum();
    let t_mean = t_sum / n;
    let t_sq_sum: f64 = template.iter().map(|&p| p as f64 * p as f64).sum();
    let t_var = t_sq_sum - n * t_mean * t_mean; // Σ(T−T̄)²

    let integral: ImageBuffer<Luma<u64>, Vec<u64>> = integral_image(image);
    let integral_sq: ImageBuffer<Luma<u64>, Vec<u64>> = integral_squared_image(image);

    let mut out = ScoreMap::new(ccorr.width(), ccorr.height());
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let win_sum = sum_image_pixels(&integral, x, y, x + tw - 1, y + th - 1)[0] as f64;
        let ccoeff = ccorr.get_pixel(x, y)[0] as f64 - win_sum * t_mean;
        let score = if normalize {
            let win_sq = sum_image_pixels(&integral_sq, x, y, x + tw - 1, y + th - 1)[0] as f64;
            let win_var = win_sq - win_sum * win_sum / n; // ΣI² − N·Ī²
            let denom = (win_var * t_var).sqrt();
            if denom > f64::EPSILON {
                ccoeff / denom
            } else {
                0.0
            }
        } else {
            ccoeff
        };
        *pixel = Luma([score as f32]);
    }
    out
}

/// 决策层: 按极性对分数图做阈值筛选, 返回行优先的命中位置列表
///
/// 相邻命中不做聚类去重, 一个目标可能报告多个重叠位置 (已知限制)
pub fn threshold_matches(scores: &ScoreMap, method: MatchMethod, threshold: f32) -> Vec<(u32, u32)> {
    let mut out = Vec::new();
    for (x, y, pixel) in scores.enumerate_pixels() {
        let keep = match method.polarity() {
            Polarity::Maximize => pixel[0] >= threshold,
            Polarity::Minimize => pixel[0] <= threshold,
        };
        if keep {
            out.push((x, y));
        }
    }
    out
}

/// 加载灰度模板, 运行期间只读
pub fn load_template(path: &str) -> Result<GrayImage> {
    let img = image::open(path).with_context(|| format!("template not found: {path}"))?;
    Ok(img.to_luma8())
}
