/// Builds the gRPC client and server code for the `gdid.proto` definition
/// using `tonic-prost-build`.
///
/// A file descriptor set is emitted alongside the generated code so the
/// server can register gRPC reflection.
use std::env;
use std::path::PathBuf;

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let descriptor_path = out_dir.join("gdid_descriptor.bin");

    let mut config = tonic_prost_build::Config::new();
    config.file_descriptor_set_path(&descriptor_path);

    tonic_prost_build::configure()
        .compile_with_config(config, &["proto/gdid.proto"], &["proto"])
        .unwrap();
}
