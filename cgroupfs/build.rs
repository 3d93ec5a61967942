fn main() {
    // cgroupfs is a linux kernel interface; android kernels expose the same hierarchies
    #[cfg(not(any(target_os = "android", target_os = "linux")))]
    compile_error!("Building cgroupfs for an unsupported platform. Currently only linux and android are supported")
}
