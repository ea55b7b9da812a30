//! Fuzz target for socket address parsing
//!
//! Only literal hosts are fed through so the target never touches DNS.

#![no_main]

use gatelink_transport::make_socket_address;
use libfuzzer_sys::fuzz_target;
use std::net::IpAddr;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let host = text.split(':').next().unwrap_or_default();
    let literal = host.is_empty()
        || host == "*"
        || host.bytes().all(|b| b.is_ascii_digit())
        || host.parse::<IpAddr>().is_ok();
    if !literal {
        return;
    }

    for allow_wildcard in [false, true] {
        if let Ok(addr) = make_socket_address(Some(text), "127.0.0.1", 25555, allow_wildcard) {
            assert_ne!(addr.port(), 0);
        }
    }
});
