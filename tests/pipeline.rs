// 该文件是 Daolu （道路） 项目的一部分。
// tests/pipeline.rs - 融合流水线测试
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

mod common;

use common::*;
use daolu::{
  fusion::{Pipeline, PipelineConfig, PipelineError, fps_from_latency},
  output::draw::{DEFAULT_BOX_COLOR, label_color},
};
use ab_glyph::{FontArc, PxScale};
use image::Rgb;
use imageproc::drawing::text_size;

const LABEL_FONT_SIZE: f32 = 16.0;

#[test]
fn annotated_frame_and_mask_match_input_dimensions() {
  let pipeline = Pipeline::new(StubDetector(vec![car()]), StubSegmenter::full());
  let frame = gray_frame(120, 80);

  let result = pipeline.process(&frame).unwrap();
  assert_eq!(result.annotated_frame.dimensions(), (120, 80));
  assert_eq!(result.drivable_mask.dimensions(), (120, 80));
  assert_eq!(result.drivable_mask.count_on(), 120 * 80);
}

#[test]
fn detections_pass_through_unchanged() {
  let detections = vec![
    car(),
    detection("person", 0, [60.0, 5.0, 90.0, 70.0], 0.55),
  ];
  let pipeline = Pipeline::new(StubDetector(detections.clone()), StubSegmenter::empty());

  let result = pipeline.process(&gray_frame(100, 100)).unwrap();
  assert_eq!(result.detections, detections);
}

#[test]
fn drivable_pixels_blend_and_others_stay() {
  let pipeline = Pipeline::new(StubDetector(Vec::new()), LeftHalfSegmenter);
  let frame = gray_frame(64, 32);

  let result = pipeline.process(&frame).unwrap();
  assert_eq!(*result.annotated_frame.get_pixel(5, 10), Rgb([90, 166, 90]));
  assert_eq!(*result.annotated_frame.get_pixel(50, 10), Rgb([GRAY, GRAY, GRAY]));
  assert!(result.drivable_mask.is_on(20, 0));
  assert!(!result.drivable_mask.is_on(45, 0));
}

/// 标签文字占据的区域，含 1 像素抗锯齿余量
fn label_region(text: &str, x: u32, y: u32) -> (u32, u32, u32, u32) {
  let font = FontArc::try_from_slice(include_bytes!("../assets/DejaVuSans.ttf")).unwrap();
  let (width, _) = text_size(PxScale::from(LABEL_FONT_SIZE), &font, text);
  (x.saturating_sub(1), y, x + width + 1, y + LABEL_FONT_SIZE as u32 + 1)
}

#[test]
fn gray_frame_with_one_car_end_to_end() {
  let pipeline = Pipeline::new(StubDetector(vec![car()]), StubSegmenter::empty());
  let frame = gray_frame(100, 100);

  let result = pipeline.process(&frame).unwrap();
  let annotated = &result.annotated_frame;
  let blue = Rgb([0, 0, 255]);

  assert_eq!(result.detections.len(), 1);
  assert_eq!(result.drivable_mask.count_on(), 0);
  assert_eq!(annotated.dimensions(), frame.dimensions());

  // 边框左右两侧与底边
  assert_eq!(*annotated.get_pixel(10, 40), blue);
  assert_eq!(*annotated.get_pixel(11, 40), blue);
  assert_eq!(*annotated.get_pixel(50, 40), blue);
  assert_eq!(*annotated.get_pixel(30, 50), blue);

  // 边框 [10, 50] 内外各 1 像素宽，标签在边框上方，夹到第 0 行
  let in_outline = |x: u32, y: u32| {
    (10..=50).contains(&x)
      && (10..=50).contains(&y)
      && (x <= 11 || x >= 49 || y <= 11 || y >= 49)
  };
  let (lx0, ly0, lx1, ly1) = label_region("car 0.90", 10, 0);
  let in_label = |x: u32, y: u32| (lx0..=lx1).contains(&x) && (ly0..=ly1).contains(&y);

  let mut changed = 0;
  for (x, y, pixel) in annotated.enumerate_pixels() {
    if pixel == frame.get_pixel(x, y) {
      continue;
    }
    changed += 1;
    assert!(
      in_outline(x, y) || in_label(x, y),
      "pixel ({x}, {y}) changed outside the box and its label"
    );
  }
  assert!(changed > 0);

  for y in 12..=48 {
    for x in 12..=48 {
      assert_eq!(annotated.get_pixel(x, y), frame.get_pixel(x, y));
    }
  }
}

#[test]
fn unknown_label_uses_default_color() {
  let pipeline = Pipeline::new(
    StubDetector(vec![detection("bicycle", 1, [20.0, 40.0, 60.0, 80.0], 0.7)]),
    StubSegmenter::empty(),
  );

  let result = pipeline.process(&gray_frame(100, 100)).unwrap();
  assert_eq!(label_color("bicycle"), DEFAULT_BOX_COLOR);
  assert_eq!(*result.annotated_frame.get_pixel(20, 60), Rgb(DEFAULT_BOX_COLOR));
}

#[test]
fn box_outside_frame_is_clipped() {
  let pipeline = Pipeline::new(
    StubDetector(vec![detection("truck", 7, [-20.0, 60.0, 140.0, 130.0], 0.8)]),
    StubSegmenter::empty(),
  );

  let result = pipeline.process(&gray_frame(100, 100)).unwrap();
  assert_eq!(result.annotated_frame.dimensions(), (100, 100));
  assert_eq!(*result.annotated_frame.get_pixel(98, 60), Rgb([255, 165, 0]));
}

#[test]
fn fps_follows_latency() {
  let pipeline = Pipeline::new(StubDetector(vec![car()]), StubSegmenter::full());
  let result = pipeline.process(&gray_frame(100, 100)).unwrap();

  assert!(result.latency_ms >= 0.0);
  assert_eq!(result.fps, fps_from_latency(result.latency_ms));
  if result.latency_ms > 0.0 {
    assert!((result.fps * result.latency_ms - 1000.0).abs() < 1e-6);
  }
}

#[test]
fn sequential_and_concurrent_agree() {
  let frame = gray_frame(100, 100);
  let concurrent = Pipeline::new(StubDetector(vec![car()]), LeftHalfSegmenter);
  let sequential = Pipeline::with_config(
    StubDetector(vec![car()]),
    LeftHalfSegmenter,
    PipelineConfig { concurrent: false },
  );

  let a = concurrent.process(&frame).unwrap();
  let b = sequential.process(&frame).unwrap();
  assert_eq!(a.annotated_frame, b.annotated_frame);
  assert_eq!(a.drivable_mask, b.drivable_mask);
  assert_eq!(a.detections, b.detections);
}

#[test]
fn adapter_failures_surface_as_pipeline_errors() {
  let frame = gray_frame(32, 32);

  for concurrent in [true, false] {
    let config = PipelineConfig { concurrent };
    let pipeline = Pipeline::with_config(FailingDetector, StubSegmenter::full(), config.clone());
    assert!(matches!(
      pipeline.process(&frame),
      Err(PipelineError::DetectionFailed(_))
    ));

    let pipeline = Pipeline::with_config(StubDetector(vec![car()]), FailingSegmenter, config);
    assert!(matches!(
      pipeline.process(&frame),
      Err(PipelineError::SegmentationFailed(_))
    ));
  }
}
