use std::env;

fn main() {
    let dir = env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR is set by cargo");
    println!("cargo:rustc-link-arg-bins=-T{}/gba.ld", dir);
    println!("cargo:rerun-if-changed=gba.ld");
}
