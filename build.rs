fn main() {
    // Stamped into `fiberkit::BUILD_DATE` and printed by the runner at debug level.
    let build_date = chrono::Utc::now().format("%Y-%m-%d %H:%M UTC").to_string();
    println!("cargo:rustc-env=BUILD_DATE={}", build_date);
    println!("cargo:rerun-if-changed=build.rs");
}
