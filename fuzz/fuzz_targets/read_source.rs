#![no_main]
use libfuzzer_sys::fuzz_target;
use niizarr::NiftiSource;

fuzz_target!(|data: &[u8]| {
    if let Ok(source) = NiftiSource::from_reader(data) {
        let _ = source.header_blob();
    }
});
