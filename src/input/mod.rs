//! 视频输入
//!
//! 把整个视频一次性解码进内存, 得到按序排列的 RGB 帧.
//! 离线统计场景帧数已知且有限, 预先载入可以在处理循环开始前确定总帧数.
use anyhow::{ensure, Context, Result};
use crossbeam_channel::{unbounded, Sender};
use ez_ffmpeg::core::context::null_output::create_null_output;
use ez_ffmpeg::filter::frame_filter::FrameFilter;
use ez_ffmpeg::filter::frame_filter_context::FrameFilterContext;
use ez_ffmpeg::filter::frame_pipeline_builder::FramePipelineBuilder;
use ez_ffmpeg::{AVMediaType, FfmpegContext, Frame, Input};
use image::RgbImage;

/// 解码过滤器: rgb24 帧 → 通道
struct CollectFilter {
    sender: Sender<RgbImage>,
    total_frames: usize,
    dropped_frames: usize,
}

impl CollectFilter {
    fn drop_frame(&mut self, reason: &str) {
        self.dropped_frames += 1;
        eprintln!(
            "dropped frame #{} ({}), {} dropped so far",
            self.total_frames, reason, self.dropped_frames
        );
    }
}

impl FrameFilter for CollectFilter {
    fn media_type(&self) -> AVMediaType {
        AVMediaType::AVMEDIA_TYPE_VIDEO
    }

    fn init(&mut self, _ctx: &FrameFilterContext) -> Result<(), String> {
        Ok(())
    }

    fn filter_frame(
        &mut self,
        frame: Frame,
        _ctx: &FrameFilterContext,
    ) -> Result<Option<Frame>, String> {
        unsafe {
            self.total_frames += 1;

            // 空帧或损坏帧直接丢弃
            if frame.as_ptr().is_null() || frame.is_empty() || frame.is_corrupt() {
                self.drop_frame("empty or corrupt");
                return Ok(None);
            }

            let w = (*frame.as_ptr()).width as u32;
            let h = (*frame.as_ptr()).height as u32;
            if w == 0 || h == 0 {
                self.drop_frame("invalid resolution");
                return Ok(None);
            }

            // format=rgb24 过滤器之后数据在 data[0], 每像素 3 字节
            let data = (*frame.as_ptr()).data[0];
            let stride = (*frame.as_ptr()).linesize[0] as usize;
            let row_len = w as usize * 3;
            if data.is_null() || stride < row_len {
                self.drop_frame("bad plane layout");
                return Ok(None);
            }

            let mut buf = vec![0u8; row_len * h as usize];
            for y in 0..h as usize {
                let src = std::slice::from_raw_parts(data.add(y * stride), row_len);
                buf[y * row_len..(y + 1) * row_len].copy_from_slice(src);
            }

            if let Some(img) = RgbImage::from_raw(w, h, buf) {
                // 接收端先于解码端退出时结束解码即可
                let _ = self.sender.send(img);
            }
        }
        Ok(None)
    }
}

/// 解码视频文件的全部帧
///
/// 中途解码失败按流结束处理: 已解出的帧照常返回.
/// 一帧都解不出来与文件不存在是两种不同的错误.
pub fn read_video_frames(path: &str) -> Result<Vec<RgbImage>> {
    ensure!(
        std::path::Path::new(path).exists(),
        "video file not found: {path}"
    );

    let (tx, rx) = unbounded();
    let filter = CollectFilter {
        sender: tx,
        total_frames: 0,
        dropped_frames: 0,
    };

    let pipe: FramePipelineBuilder = AVMediaType::AVMEDIA_TYPE_VIDEO.into();
    let pipe = pipe.filter("collect", Box::new(filter));
    let out = create_null_output().add_frame_pipeline(pipe);

    let ctx = FfmpegContext::builder()
        .input(Input::new(path))
        .filter_descs(["format=rgb24"].into())
        .output(out)
        .build()
        .with_context(|| format!("failed to open video: {path}"))?;

    let sch = ctx
        .start()
        .with_context(|| format!("failed to start decoding: {path}"))?;
    if let Err(e) = sch.wait() {
        // 中途出错按流结束处理, 保留已解出的帧
        eprintln!("decoding stopped early: {e}");
    }

    let frames: Vec<RgbImage> = rx.try_iter().collect();
    ensure!(!frames.is_empty(), "no decodable frames in video: {path}");
    Ok(frames)
}
