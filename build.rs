// Copyright (c) 2025 Joshua Seaton
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

use rustc_version::{Channel, Result, version_meta};

// Selects the native allocator API (see `core_compat`) when building with a
// nightly toolchain.
fn main() -> Result<()> {
    println!("cargo:rerun-if-changed=build.rs");
    if version_meta()?.channel == Channel::Nightly {
        println!("cargo:rustc-cfg=nightly");
    }
    Ok(())
}
