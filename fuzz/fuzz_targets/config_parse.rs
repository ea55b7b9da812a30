//! Fuzz test for network configuration parsing
//!
//! Tests that arbitrary TOML input doesn't cause panics when parsed and
//! validated as a network configuration.

#![no_main]

use gatelink_transport::NetworkConfig;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let _: Result<toml::Value, _> = toml::from_str(s);

        if let Ok(config) = toml::from_str::<NetworkConfig>(s) {
            let _ = config.validate();
            let _ = config.effective_key();
        }
    }
});
