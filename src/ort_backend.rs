//! ONNX Runtime 推理引擎封装
//!
//! 职责: 会话构建 (CPU / CUDA / TensorRT) 与前向推理, 输出统一转为 f32 张量
use anyhow::{anyhow, ensure, Context, Result};
use half::f16;
use ndarray::{Array, IxDyn};
use ort::execution_providers::{CUDAExecutionProvider, TensorRTExecutionProvider};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};

/// 执行后端 (Execution Provider)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrtEP {
    CPU,
    CUDA(i32),
    Trt(i32),
}

/// 引擎构建参数
#[derive(Debug, Clone)]
pub struct OrtConfig {
    /// ONNX 模型文件路径
    pub f: String,
    pub ep: OrtEP,
    /// TensorRT 下启用 FP16
    pub trt_fp16: bool,
    /// 模型输入尺寸 (height, width)
    pub image_size: (u32, u32),
}

pub struct OrtBackend {
    session: Session,
    ep: OrtEP,
    height: u32,
    width: u32,
    input_name: String,
    output_name: String,
}

impl OrtBackend {
    pub fn build(config: OrtConfig) -> Result<Self> {
        ensure!(
            std::path::Path::new(&config.f).exists(),
            "model file not found: {}",
            config.f
        );

        let builder = Session::builder()?.with_optimization_level(GraphOptimizationLevel::Level3)?;

        let (builder, ep) = match config.ep {
            OrtEP::CUDA(id) => {
                let provider = CUDAExecutionProvider::default().with_device_id(id);
                match builder
                    .clone()
                    .with_execution_providers([provider.build()])
                {
                    Ok(b) => (b, config.ep),
                    Err(e) => {
                        eprintln!("CUDA unavailable ({e}), falling back to CPU");
                        (builder, OrtEP::CPU)
                    }
                }
            }
            OrtEP::Trt(id) => {
                let mut provider = TensorRTExecutionProvider::default().with_device_id(id);
                if config.trt_fp16 {
                    provider = provider.with_fp16(true);
                }
                match builder
                    .clone()
                    .with_execution_providers([provider.build()])
                {
                    Ok(b) => (b, config.ep),
                    Err(e) => {
                        eprintln!("TensorRT unavailable ({e}), falling back to CPU");
                        (builder, OrtEP::CPU)
                    }
                }
            }
            OrtEP::CPU => (builder, OrtEP::CPU),
        };

        let session = builder
            .commit_from_file(&config.f)
            .with_context(|| format!("failed to load model: {}", config.f))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .ok_or_else(|| anyhow!("model has no inputs: {}", config.f))?;
        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| anyhow!("model has no outputs: {}", config.f))?;

        let (height, width) = config.image_size;
        Ok(Self {
            session,
            ep,
            height,
            width,
            input_name,
            output_name,
        })
    }

    /// 前向推理: NCHW f32 张量 → f32 输出张量 (f16 模型输出自动转 f32)
    pub fn run(&mut self, xs: Array<f32, IxDyn>, profile: bool) -> Result<Array<f32, IxDyn>> {
        let t = std::time::Instant::now();

        let shape: Vec<usize> = xs.shape().to_vec();
        let (data, _offset) = xs.into_raw_vec_and_offset();
        let input = Tensor::from_array((shape, data.into_boxed_slice()))
            .map(Value::from)
            .context("failed to create input tensor")?;

        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input])
            .context("inference failed")?;
        let output = outputs
            .get(self.output_name.as_str())
            .ok_or_else(|| anyhow!("model returned no output named {:?}", self.output_name))?;

        let ys = extract_f32(output)?;
        if profile {
            println!("[Ort Inference]: {:?}", t.elapsed());
        }
        Ok(ys)
    }

    pub fn ep(&self) -> OrtEP {
        self.ep
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn input_name(&self) -> &str {
        &self.input_name
    }

    pub fn output_name(&self) -> &str {
        &self.output_name
    }
}

/// 提取输出张量, f16 输出转为 f32
fn extract_f32(output: &Value) -> Result<Array<f32, IxDyn>> {
    if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
        let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
        return Array::from_shape_vec(IxDyn(&dims), data.to_vec())
            .context("output shape mismatch");
    }
    let (shape, data) = output
        .try_extract_tensor::<f16>()
        .context("unsupported output dtype, expected f32 or f16")?;
    let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
    let data: Vec<f32> = data.iter().map(|&v| f32::from(v)).collect();
    Array::from_shape_vec(IxDyn(&dims), data).context("output shape mismatch")
}
