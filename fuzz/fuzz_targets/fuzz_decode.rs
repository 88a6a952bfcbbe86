// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![no_main]

use libfuzzer_sys::fuzz_target;
use portable::{DecodeMode, Marshaller};

fuzz_target!(|data: &[u8]| {
    let m = Marshaller::default();

    // Seed the registry so well-formed inputs reach field decoding
    if let Ok(b) = m.builder("Fuzz") {
        let _ = b.set_field("a", 1i32);
        let _ = b.set_field("b", "s");
        let _ = b.build();
    }

    let _ = m.decode(data.to_vec(), DecodeMode::Materialize);

    if let Ok(decoded) = m.decode(data.to_vec(), DecodeMode::ForceEncoded) {
        if let Some(obj) = decoded.object() {
            let _ = obj.get_field("a");
            let _ = obj.get_field("b");
            let _ = obj.materialize_graph();
            let _ = m.builder_from(obj).build();
        }
    }
});
