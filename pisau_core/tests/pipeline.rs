use std::time::{Duration, Instant};

use image::{Rgb, RgbImage};
use pisau_core::pipeline::{TEXT_CLEAR, TEXT_HAND, TEXT_MOTION_INNER, TEXT_MOTION_OUTER};
use pisau_core::{
    DetectionCfg, FrameMode, IntrusionKind, IntrusionPipeline, Point, ZoneCfg, ZoneDetector,
};
use rstest::rstest;

const BG: Rgb<u8> = Rgb([90, 90, 90]);
const SKIN: Rgb<u8> = Rgb([220, 170, 140]);

fn frame() -> RgbImage {
    RgbImage::from_pixel(640, 480, BG)
}

fn with_block(cx: u32, cy: u32, w: u32, h: u32, color: Rgb<u8>) -> RgbImage {
    let mut f = frame();
    for y in cy - h / 2..cy - h / 2 + h {
        for x in cx - w / 2..cx - w / 2 + w {
            f.put_pixel(x, y, color);
        }
    }
    f
}

fn setup() -> (IntrusionPipeline, ZoneDetector, Instant) {
    (
        IntrusionPipeline::new(DetectionCfg::default()),
        ZoneDetector::new(ZoneCfg::default()),
        Instant::now(),
    )
}

// An 80x50 block traces a contour of area 79*49 = 3871; 50x40 gives 1911.
#[rstest]
#[case(80, 50, true)]
#[case(50, 40, false)]
fn hand_needs_minimum_skin_area(#[case] w: u32, #[case] h: u32, #[case] hand: bool) {
    let (mut p, mut z, t0) = setup();
    let r = p.process(with_block(320, 240, w, h, SKIN), &mut z, t0);
    assert_eq!(r.mode, FrameMode::Full);
    match r.event {
        Some(ev) if hand => {
            assert_eq!(ev.kind, IntrusionKind::Hand);
            assert_eq!(ev.centroid, Point::new(320, 240));
            assert_eq!(r.status_text, TEXT_HAND);
            assert!(r.warning_active);
            assert!(r.flash_on);
        }
        None if !hand => {
            assert_eq!(r.status_text, TEXT_CLEAR);
            assert!(!r.warning_active);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[test]
fn hand_outside_inner_zone_is_ignored() {
    let (mut p, mut z, t0) = setup();
    // inside the outer zone, below the inner one
    let r = p.process(with_block(320, 365, 80, 40, SKIN), &mut z, t0);
    assert!(r.event.is_none());
}

#[test]
fn light_frames_skip_detection() {
    let (mut p, mut z, t0) = setup();
    let hand = with_block(320, 240, 80, 50, SKIN);
    let modes: Vec<_> = (0..4)
        .map(|i| {
            let r = p.process(hand.clone(), &mut z, t0 + Duration::from_secs(10 * i));
            (r.mode, r.event.is_some())
        })
        .collect();
    assert_eq!(
        modes,
        vec![
            (FrameMode::Full, true),
            (FrameMode::Light, false),
            (FrameMode::Full, true),
            (FrameMode::Light, false),
        ]
    );
}

#[test]
fn first_full_frame_has_no_motion_reference() {
    let (mut p, mut z, t0) = setup();
    let r = p.process(with_block(320, 240, 100, 100, Rgb([20, 20, 200])), &mut z, t0);
    assert!(r.event.is_none());
}

#[rstest]
#[case(320, 240, 100, 100, Rgb([20, 20, 200]), Some(IntrusionKind::MotionInner), TEXT_MOTION_INNER)]
#[case(180, 370, 40, 30, Rgb([30, 30, 30]), Some(IntrusionKind::MotionOuter), TEXT_MOTION_OUTER)]
#[case(40, 40, 40, 40, Rgb([30, 30, 30]), None, TEXT_CLEAR)]
fn motion_is_classified_by_zone(
    #[case] cx: u32,
    #[case] cy: u32,
    #[case] w: u32,
    #[case] h: u32,
    #[case] color: Rgb<u8>,
    #[case] kind: Option<IntrusionKind>,
    #[case] text: &str,
) {
    let (mut p, mut z, t0) = setup();
    p.process(frame(), &mut z, t0); // FULL: reference
    p.process(frame(), &mut z, t0); // LIGHT
    let r = p.process(with_block(cx, cy, w, h, color), &mut z, t0);
    assert_eq!(r.mode, FrameMode::Full);
    assert_eq!(r.event.map(|e| e.kind), kind);
    assert_eq!(r.status_text, text);
    if let Some(ev) = r.event {
        assert!((ev.centroid.x - cx as i32).abs() <= 4, "{:?}", ev.centroid);
        assert!((ev.centroid.y - cy as i32).abs() <= 4, "{:?}", ev.centroid);
    }
}

#[test]
fn motion_box_is_annotated_even_outside_zones() {
    let (mut p, mut z, t0) = setup();
    p.process(frame(), &mut z, t0);
    p.process(frame(), &mut z, t0);
    let r = p.process(with_block(40, 40, 40, 40, Rgb([30, 30, 30])), &mut z, t0);
    assert!(r.event.is_none());
    // some white box pixel in the block neighbourhood that is not hatch
    let white = (0..100)
        .flat_map(|y| (0..100).map(move |x| (x, y)))
        .filter(|&(x, y)| (x as i32 - y as i32) % 20 != 0)
        .any(|(x, y)| *r.annotated.get_pixel(x, y) == Rgb([255, 255, 255]));
    assert!(white);
}

#[test]
fn reference_frame_is_replaced_every_full_frame() {
    let (mut p, mut z, t0) = setup();
    let moved = with_block(320, 240, 100, 100, Rgb([20, 20, 200]));
    p.process(frame(), &mut z, t0);
    p.process(frame(), &mut z, t0);
    assert!(p.process(moved.clone(), &mut z, t0).event.is_some());
    p.process(moved.clone(), &mut z, t0);
    // unchanged scene since the last FULL frame
    assert!(p.process(moved, &mut z, t0).event.is_none());
}

#[test]
fn warning_window_outlasts_the_event() {
    let (mut p, mut z, t0) = setup();
    p.process(with_block(320, 240, 80, 50, SKIN), &mut z, t0);
    let r = p.process(frame(), &mut z, t0 + Duration::from_secs(3)); // LIGHT
    assert!(r.event.is_none());
    assert!(r.warning_active);
    assert_eq!(r.status_text, TEXT_HAND);
    assert!(!p.warning_active(t0 + Duration::from_millis(3001)));
}

#[test]
fn warning_clears_after_window() {
    let (mut p, mut z, t0) = setup();
    p.process(with_block(320, 240, 80, 50, SKIN), &mut z, t0);
    let r = p.process(frame(), &mut z, t0 + Duration::from_millis(3500));
    assert!(!r.warning_active);
    assert_eq!(r.status_text, TEXT_CLEAR);
}

#[test]
fn overlay_is_composited_on_light_frames() {
    let (mut p, mut z, t0) = setup();
    p.process(frame(), &mut z, t0);
    let r = p.process(frame(), &mut z, t0);
    assert_eq!(r.mode, FrameMode::Light);
    assert_eq!(*r.annotated.get_pixel(10, 10), Rgb([255, 255, 255]));
    assert_eq!(*r.annotated.get_pixel(320, 240), BG);
    assert_eq!(z.regenerations(), 1);
}

#[test]
fn hand_flash_runs_six_phases() {
    let (mut p, mut z, t0) = setup();
    let hand = with_block(320, 240, 80, 50, SKIN);
    assert!(p.process(hand, &mut z, t0).flash_on);
    let at = |ms: u64| t0 + Duration::from_millis(ms);
    assert!(!p.process(frame(), &mut z, at(250)).flash_on);
    assert!(p.process(frame(), &mut z, at(450)).flash_on);
    assert!(!p.process(frame(), &mut z, at(1300)).flash_on);
}
