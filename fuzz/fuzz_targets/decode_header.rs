#![no_main]
use libfuzzer_sys::fuzz_target;
use niizarr::{nii2json, RawHeader};

fuzz_target!(|data: &[u8]| {
    if let Ok(header) = RawHeader::from_bytes(data) {
        let _ = header.decode_as(header.endianness().to_opposite());
        if let Ok(json) = nii2json(&header, false) {
            let _ = json.to_json().unwrap();
        }
    }
});
