use std::time::Duration;

use pisau_core::coordinator::Advisory;
use pisau_core::{
    DirtyFlag, GovernorCfg, LatchPolicy, Metric, MotorGovernor, MotorState, OverrunAccumulator,
    OverrunCfg, SafetyCoordinator,
};
use pisau_hardware::SimulatedMotorDriver;
use rstest::rstest;

fn secs(s: f64) -> Duration {
    Duration::from_secs_f64(s)
}

#[rstest]
#[case(vec![10.0])]
#[case(vec![2.5, 2.5, 2.5, 2.5])]
#[case(vec![0.5; 20])]
fn advisory_fires_exactly_once_at_ten_seconds(#[case] dts: Vec<f64>) {
    let cfg = OverrunCfg::default();
    let mut acc = OverrunAccumulator::temperature(&cfg);
    let mut advisories = 0;
    for dt in dts {
        if acc.update(55.0, secs(dt), &cfg).advisory {
            advisories += 1;
        }
    }
    assert_eq!(advisories, 1);
    // staying above does not repeat it
    for _ in 0..5 {
        assert!(!acc.update(55.0, secs(0.5), &cfg).advisory);
    }
}

#[test]
fn throttle_fires_exactly_once_at_thirty_seconds() {
    let cfg = OverrunCfg::default();
    let mut acc = OverrunAccumulator::rpm(&cfg);
    let mut throttles = 0;
    for _ in 0..60 {
        if acc.update(2900.0, secs(0.5), &cfg).throttle {
            throttles += 1;
        }
    }
    assert_eq!(throttles, 1);
    assert_eq!(acc.elapsed(), secs(30.0));
    assert!(!acc.update(2900.0, secs(0.5), &cfg).throttle);
}

#[test]
fn dip_below_threshold_resets_accumulator() {
    let cfg = OverrunCfg::default();
    let mut acc = OverrunAccumulator::temperature(&cfg);
    acc.update(51.0, secs(9.5), &cfg);
    let c = acc.update(49.0, secs(0.5), &cfg);
    assert!(!c.cleared, "no advisory yet, nothing to clear");
    assert_eq!(acc.elapsed(), Duration::ZERO);
    assert!(!acc.update(51.0, secs(0.5), &cfg).advisory);

    acc.update(51.0, secs(10.0), &cfg);
    assert!(acc.alerting());
    assert!(acc.update(20.0, secs(0.5), &cfg).cleared);
    assert!(!acc.alerting());
}

fn coordinator_with(
    state: MotorState,
) -> (SafetyCoordinator<SimulatedMotorDriver>, std::rc::Rc<std::cell::RefCell<pisau_hardware::DriverLog>>) {
    let drv = SimulatedMotorDriver::new();
    let probe = drv.probe();
    let gov = MotorGovernor::with_state(
        drv,
        GovernorCfg {
            seed: Some(1),
            ..GovernorCfg::default()
        },
        state,
    )
    .into_shared();
    let c = SafetyCoordinator::new(
        gov,
        DirtyFlag::default(),
        LatchPolicy::default(),
        OverrunCfg::default(),
        Duration::from_millis(500),
    );
    (c, probe)
}

#[test]
fn sustained_full_speed_raises_rpm_advisories_and_throttles_once() {
    let (mut c, probe) = coordinator_with(MotorState {
        set_speed_percent: 100,
        current_rpm: 3000.0,
        temperature_c: 27.0,
        enabled: false,
    });
    c.on_switch(true).unwrap();
    let tick = Duration::from_millis(500);
    let mut all = Vec::new();
    for _ in 0..20 {
        c.on_motor_tick(tick).unwrap();
        all.extend(c.take_advisories());
    }
    assert_eq!(all, vec![Advisory::RpmHigh]);
    for _ in 0..40 {
        c.on_motor_tick(tick).unwrap();
        all.extend(c.take_advisories());
    }
    assert!(all.contains(&Advisory::RpmThrottled));
    assert_eq!(c.governor().borrow().set_speed_percent(), 50);
    // forced exactly once
    let forced = probe
        .borrow()
        .duty_history
        .iter()
        .filter(|d| **d == 50.0)
        .count();
    assert_eq!(forced, 1);
}

#[test]
fn visual_alert_toggles_while_over_and_stops_after_dip() {
    let (mut c, _probe) = coordinator_with(MotorState {
        set_speed_percent: 0,
        current_rpm: 0.0,
        temperature_c: 60.0,
        enabled: false,
    });
    let tick = Duration::from_millis(500);
    // cooling 0.2/tick keeps it above 50 for 50 ticks
    let mut phases = Vec::new();
    for _ in 0..24 {
        c.on_motor_tick(tick).unwrap();
        phases.push(c.alert_visible());
    }
    assert!(phases[..19].iter().all(|p| !p));
    assert!(phases[19]);
    assert!(!phases[20]);
    assert!(phases[21]);
    assert_eq!(c.take_advisories(), vec![Advisory::TemperatureHigh]);

    for _ in 0..40 {
        c.on_motor_tick(tick).unwrap();
    }
    assert_eq!(c.overrun_elapsed(Metric::Temperature), Duration::ZERO);
    assert!(!c.alert_visible());
}

#[test]
fn overrun_is_not_evaluated_while_latched() {
    let (mut c, _probe) = coordinator_with(MotorState {
        temperature_c: 65.0,
        ..MotorState::default()
    });
    c.trigger_emergency("test").unwrap();
    for _ in 0..40 {
        c.on_motor_tick(Duration::from_millis(500)).unwrap();
    }
    assert_eq!(c.overrun_elapsed(Metric::Temperature), Duration::ZERO);
    assert!(c.take_advisories().is_empty());
    // thermal decay continues
    assert!(c.governor().borrow().state().temperature_c < 65.0);
}

// 80% keeps rpm below 2700 so only the temperature side crosses; 100% from
// a cool start crosses only on rpm within 30 s.
#[rstest]
#[case::temperature(80, 2400.0, 55.0, [Advisory::TemperatureHigh, Advisory::TemperatureThrottled])]
#[case::rpm(100, 3000.0, 27.0, [Advisory::RpmHigh, Advisory::RpmThrottled])]
fn thirty_seconds_over_threshold_forces_half_speed_once(
    #[case] percent: u8,
    #[case] rpm: f64,
    #[case] temp: f64,
    #[case] expected: [Advisory; 2],
) {
    let (mut c, probe) = coordinator_with(MotorState {
        set_speed_percent: percent,
        current_rpm: rpm,
        temperature_c: temp,
        enabled: false,
    });
    c.on_switch(true).unwrap();
    let tick = Duration::from_millis(500);
    let mut all = Vec::new();
    for _ in 0..60 {
        c.on_motor_tick(tick).unwrap();
        all.extend(c.take_advisories());
    }
    assert_eq!(all, expected.to_vec());
    assert_eq!(c.governor().borrow().set_speed_percent(), 50);
    assert_eq!(probe.borrow().duty_history, vec![f32::from(percent), 50.0]);

    // still over threshold: no second forcing
    for _ in 0..20 {
        c.on_motor_tick(tick).unwrap();
    }
    assert_eq!(probe.borrow().duty_history.len(), 2);
}

#[test]
fn throttle_at_half_speed_skips_the_duty_write_but_still_advises() {
    let (mut c, probe) = coordinator_with(MotorState {
        set_speed_percent: 50,
        current_rpm: 1500.0,
        temperature_c: 55.0,
        enabled: false,
    });
    c.on_switch(true).unwrap();
    let tick = Duration::from_millis(500);
    let mut all = Vec::new();
    for _ in 0..60 {
        c.on_motor_tick(tick).unwrap();
        all.extend(c.take_advisories());
    }
    assert_eq!(
        all,
        vec![Advisory::TemperatureHigh, Advisory::TemperatureThrottled]
    );
    assert_eq!(c.governor().borrow().set_speed_percent(), 50);
    // only the enable write
    assert_eq!(probe.borrow().duty_history, vec![50.0]);
}
