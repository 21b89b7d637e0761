//! Minifies the embedded dev client at compile time.

#[path = "src/utils/minify.rs"]
mod minify;

use std::{env, fs, path::Path};

const CLIENT: &str = "src/embed/serve/client.js";

fn main() {
    println!("cargo:rerun-if-changed={CLIENT}");
    println!("cargo:rerun-if-changed=src/utils/minify.rs");

    let out_dir = env::var("OUT_DIR").expect("OUT_DIR is set by cargo");
    let source = fs::read_to_string(CLIENT).expect("dev client source is readable");
    let code = minify::minify_js(&source).unwrap_or_else(|| panic!("{CLIENT} does not parse"));
    fs::write(Path::new(&out_dir).join("client.min.js"), code).expect("OUT_DIR is writable");
}
