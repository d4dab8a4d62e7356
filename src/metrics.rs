//! 逐帧统计
//!
//! 累加器按总帧数预分配, 每帧写入一次, 运行结束时一次性落盘.
//! 中途崩溃丢弃全部统计 (离线批处理场景可接受).
use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize)]
pub struct RunMetrics {
    /// 每帧耗时 (秒)
    frame_time: Vec<f64>,
    /// 每帧每类检测数
    objects_count: Vec<Vec<u32>>,
}

impl RunMetrics {
    pub fn new(total_frames: usize, num_classes: usize) -> Self {
        Self {
            frame_time: vec![0.0; total_frames],
            objects_count: vec![vec![0; num_classes]; total_frames],
        }
    }

    pub fn total_frames(&self) -> usize {
        self.frame_time.len()
    }

    /// 写入一帧的统计, 帧索引越界或类数不符属于调用方错误
    pub fn record(&mut self, frame_index: usize, counts: Vec<u32>, elapsed: Duration) {
        debug_assert_eq!(counts.len(), self.objects_count[frame_index].len());
        self.frame_time[frame_index] = elapsed.as_secs_f64();
        self.objects_count[frame_index] = counts;
    }

    /// 某帧的检测总数 (跨类求和)
    pub fn detections_in(&self, frame_index: usize) -> u32 {
        self.objects_count[frame_index].iter().sum()
    }

    /// 落盘: 两个并行数组文件 + 逐帧文本日志
    pub fn save(&self, dir: &str) -> Result<()> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create output dir: {dir}"))?;

        let frame_time_path = Path::new(dir).join("frame_time.json");
        std::fs::write(&frame_time_path, serde_json::to_string(&self.frame_time)?)
            .with_context(|| format!("failed to write {}", frame_time_path.display()))?;

        let counts_path = Path::new(dir).join("objects_count.json");
        std::fs::write(&counts_path, serde_json::to_string(&self.objects_count)?)
            .with_context(|| format!("failed to write {}", counts_path.display()))?;

        let data_path = Path::new(dir).join("data.txt");
        let mut data = std::fs::File::create(&data_path)
            .with_context(|| format!("failed to write {}", data_path.display()))?;
        for n in 0..self.total_frames() {
            writeln!(
                data,
                "{}\tidentified objects in frame\t{}\tusing\t{}\tμs",
                self.detections_in(n),
                n,
                (self.frame_time[n] * 1e6) as u64
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presized_to_total_frames() {
        let m = RunMetrics::new(120, 4);
        assert_eq!(m.total_frames(), 120);
        assert_eq!(m.detections_in(0), 0);
        assert_eq!(m.detections_in(119), 0);
    }

    #[test]
    fn test_record_and_sum() {
        let mut m = RunMetrics::new(3, 2);
        m.record(1, vec![2, 3], Duration::from_millis(15));
        assert_eq!(m.detections_in(1), 5);
        // 其余帧保持 0
        assert_eq!(m.detections_in(0), 0);
        assert_eq!(m.detections_in(2), 0);
    }

    #[test]
    fn test_zero_detections_recorded_as_zero() {
        let mut m = RunMetrics::new(2, 3);
        m.record(0, vec![0, 0, 0], Duration::from_millis(1));
        assert_eq!(m.detections_in(0), 0);
    }

    #[test]
    fn test_save_writes_parallel_arrays() {
        let dir = std::env::temp_dir().join(format!("mv-metrics-{}", std::process::id()));
        let dir = dir.to_str().unwrap().to_string();

        let mut m = RunMetrics::new(2, 2);
        m.record(0, vec![1, 0], Duration::from_millis(10));
        m.record(1, vec![0, 2], Duration::from_millis(20));
        m.save(&dir).unwrap();

        let frame_time: Vec<f64> = serde_json::from_str(
            &std::fs::read_to_string(Path::new(&dir).join("frame_time.json")).unwrap(),
        )
        .unwrap();
        let counts: Vec<Vec<u32>> = serde_json::from_str(
            &std::fs::read_to_string(Path::new(&dir).join("objects_count.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(frame_time.len(), 2);
        assert!((frame_time[0] - 0.010).abs() < 1e-9);
        assert_eq!(counts, vec![vec![1, 0], vec![0, 2]]);

        let log = std::fs::read_to_string(Path::new(&dir).join("data.txt")).unwrap();
        assert_eq!(log.lines().count(), 2);
        assert!(log.lines().next().unwrap().starts_with('1'));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
