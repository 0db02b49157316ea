fn main() -> Result<(), Box<dyn std::error::Error>> {
    let protos = [
        "proto/envoy/service/auth/v2/external_auth.proto",
        "proto/envoy/service/auth/v3/external_auth.proto",
    ];

    for proto in &protos {
        println!("cargo:rerun-if-changed={proto}");
    }
    println!("cargo:rerun-if-changed=proto/google/rpc/status.proto");

    // protox compiles the vendored protos in-process, no system protoc needed.
    let file_descriptors = protox::compile(protos, ["proto"])?;

    tonic_build::configure()
        .build_client(true)
        .compile_fds(file_descriptors)?;

    Ok(())
}
