#![no_main]

use libfuzzer_sys::fuzz_target;
use lkpatch::{image::writer, patch, Config, Image, PatchDatabase};

fuzz_target!(|data: &[u8]| {
    let Ok(mut image) = Image::parse(data) else {
        return;
    };

    let config = Config::default();
    let rules = PatchDatabase::defaults();
    if patch::apply(&mut image, &rules, &config).is_ok() {
        assert_eq!(writer::to_bytes(&image).len(), data.len());
    }
});
