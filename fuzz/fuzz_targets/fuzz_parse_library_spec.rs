#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Library specs arrive on the command line, so any UTF-8 string must
    // either parse or fail with BadLibrarySpec. It should NEVER panic.
    if let Ok(spec) = std::str::from_utf8(data) {
        match speclib::library::parse_library_spec(spec) {
            Ok(parsed) => {
                // A successful parse must format back into a string that
                // parses again.
                let formatted = parsed.to_string();
                let _ = speclib::library::parse_library_spec(&formatted);
            }
            Err(_) => {
                // Rejected input is the expected outcome for most of the
                // fuzz corpus.
            }
        }
    }
});
