#![no_main]
use libfuzzer_sys::arbitrary::{self, Arbitrary};
use libfuzzer_sys::fuzz_target;
use pisau_core::{Point, ZoneCfg, compute_zones, point_in_zone};

#[derive(Debug, Arbitrary)]
struct Input {
    frame_w: u16,
    frame_h: u16,
    outer_w: u16,
    outer_h: u16,
    inner_w: u16,
    inner_h: u16,
    offset_x: i16,
    offset_y: i16,
    px: i16,
    py: i16,
}

fuzz_target!(|inp: Input| {
    let cfg = ZoneCfg {
        outer_width: i32::from(inp.outer_w % 601),
        outer_height: i32::from(inp.outer_h % 401),
        inner_width: i32::from(inp.inner_w % 401),
        inner_height: i32::from(inp.inner_h % 301),
        offset_x: i32::from(inp.offset_x % 301),
        offset_y: i32::from(inp.offset_y % 201),
        ..ZoneCfg::default()
    };
    let cfg = cfg.clamped().unwrap_or(cfg);
    let zones = compute_zones(u32::from(inp.frame_w), u32::from(inp.frame_h), &cfg);
    let p = Point::new(i32::from(inp.px), i32::from(inp.py));
    // The boundary counts as inside, so every vertex is in its own polygon.
    for v in &zones.outer {
        assert!(point_in_zone(*v, &zones.outer));
    }
    for v in &zones.inner {
        assert!(point_in_zone(*v, &zones.inner));
    }
    let _ = point_in_zone(p, &zones.outer);
    let _ = point_in_zone(p, &zones.inner);
});
