#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse and validate must never panic; both may reject.
    let Ok(cfg) = pisau_config::load_toml(data) else {
        return;
    };
    if cfg.validate().is_err() {
        return;
    }
    // A valid config must survive a save/load cycle unchanged.
    let text = cfg.to_toml().expect("valid config serializes");
    let back = pisau_config::load_toml(&text).expect("serialized config parses");
    assert_eq!(back, cfg);
});
