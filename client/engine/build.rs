fn main() {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    println!("cargo:rerun-if-changed=shaders");
    common::compile_shaders(
        format!("{}/shaders", manifest_dir),
        format!("{}/res/shaders", manifest_dir),
    );
}
