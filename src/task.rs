// 该文件是 Daolu （道路） 项目的一部分。
// src/task.rs - 本地推理任务
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::{
  io::BufRead,
  sync::mpsc::{self, Receiver},
  thread,
  time::{Duration, Instant},
};

use tracing::{info, warn};

use crate::{
  frame::Frame,
  fusion::{FusionResult, Pipeline, duration_ms},
  model::{Detector, Segmenter},
  output::{Render, draw::Draw},
};

pub trait Task<I, D, S, O>: Sized {
  type Error;
  fn run_task(self, input: I, pipeline: &Pipeline<D, S>, output: O) -> Result<(), Self::Error>;
}

/// 处理单帧后退出
pub struct OneShotTask;

impl<E, I, D, S, O, RE> Task<I, D, S, O> for OneShotTask
where
  E: std::error::Error + Send + Sync + 'static,
  RE: std::error::Error + Send + Sync + 'static,
  I: Iterator<Item = Result<Frame, E>>,
  D: Detector,
  S: Segmenter,
  O: Render<FusionResult, Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, pipeline: &Pipeline<D, S>, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))??;
    info!("输入帧获取成功，开始推理...");
    let result = pipeline.process(&frame)?;
    info!(
      "推理完成，耗时: {:.2}ms，检测到 {} 个目标",
      result.latency_ms,
      result.detections.len()
    );
    for detection in &result.detections {
      info!(
        "  {} {:.2} [{:.1}, {:.1}, {:.1}, {:.1}]",
        detection.label,
        detection.confidence,
        detection.bbox[0],
        detection.bbox[1],
        detection.bbox[2],
        detection.bbox[3]
      );
    }
    output.render_result(&frame, &result)?;
    info!("渲染完成");

    Ok(())
  }
}

/// 连续处理输入帧，在帧上叠加帧率与延迟后输出
///
/// 收到 Ctrl-C、在标准输入键入 `q` 回车、达到指定帧数或输入结束时退出。
#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
  quit_on_stdin: bool,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  pub fn with_quit_key(mut self, enabled: bool) -> Self {
    self.quit_on_stdin = enabled;
    self
  }
}

/// 用流水线自身的计时在标注帧上叠加帧率与延迟
fn overlay_metrics(draw: &Draw, result: &mut FusionResult) {
  draw.draw_metrics(&mut result.annotated_frame, result.fps, result.latency_ms);
}

fn is_quit_command(line: &str) -> bool {
  line.trim().eq_ignore_ascii_case("q")
}

fn stop_signal(quit_on_stdin: bool) -> anyhow::Result<Receiver<()>> {
  let (tx, rx) = mpsc::channel();

  let ctrlc_tx = tx.clone();
  ctrlc::set_handler(move || {
    info!("收到中断信号，准备退出...");
    let _ = ctrlc_tx.send(());
    thread::spawn(|| {
      thread::sleep(Duration::from_secs(30));
      warn!("强制退出程序");
      std::process::exit(1);
    });
  })?;

  if quit_on_stdin {
    thread::spawn(move || {
      let stdin = std::io::stdin();
      for line in stdin.lock().lines() {
        match line {
          Ok(line) if is_quit_command(&line) => {
            info!("收到退出指令");
            let _ = tx.send(());
            break;
          }
          Ok(_) => {}
          Err(_) => break,
        }
      }
    });
  }

  Ok(rx)
}

impl<E, I, D, S, O, RE> Task<I, D, S, O> for ContinuousTask
where
  E: std::error::Error + Send + Sync + 'static,
  RE: std::error::Error + Send + Sync + 'static,
  I: Iterator<Item = Result<Frame, E>>,
  D: Detector,
  S: Segmenter,
  O: Render<FusionResult, Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, pipeline: &Pipeline<D, S>, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let rx = stop_signal(self.quit_on_stdin)?;

    let mut frame_index: usize = 0;
    for frame in input {
      let frame = frame?;
      frame_index = frame_index.wrapping_add(1);

      let now = Instant::now();
      let mut result = pipeline.process(&frame)?;
      overlay_metrics(pipeline.draw(), &mut result);
      output.render_result(&frame, &result)?;

      info!(
        "第 {} 帧: {} 个目标, {:.1}ms / 渲染后 {:.1}ms",
        frame_index,
        result.detections.len(),
        result.latency_ms,
        duration_ms(now.elapsed())
      );

      if self.frame_number.is_some_and(|n| frame_index >= n) {
        info!("达到指定帧数 {}, 退出任务循环", frame_index);
        break;
      }
      if rx.try_recv().is_ok() {
        warn!("退出信号接收，退出任务循环");
        break;
      }
    }

    info!("任务完成，退出");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  use crate::frame::SegmentationMask;

  fn result_with_metrics(fps: f64, latency_ms: f64) -> FusionResult {
    FusionResult {
      annotated_frame: Frame::new(320, 80),
      detections: Vec::new(),
      drivable_mask: SegmentationMask::empty(320, 80),
      latency_ms,
      fps,
    }
  }

  #[test]
  fn metrics_overlay_uses_pipeline_timing() {
    let draw = Draw::default();
    let mut result = result_with_metrics(25.0, 40.0);
    overlay_metrics(&draw, &mut result);

    let mut expected = Frame::new(320, 80);
    draw.draw_metrics(&mut expected, 25.0, 40.0);
    assert_eq!(result.annotated_frame, expected);

    let mut other = Frame::new(320, 80);
    draw.draw_metrics(&mut other, 500.0, 2.0);
    assert_ne!(result.annotated_frame, other);
  }

  #[test]
  fn quit_command_accepts_q_only() {
    assert!(is_quit_command("q"));
    assert!(is_quit_command(" Q \n"));
    assert!(!is_quit_command("quit"));
    assert!(!is_quit_command(""));
  }
}
