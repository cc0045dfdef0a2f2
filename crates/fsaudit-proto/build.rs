fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Client side only: fsaudit never serves these APIs
    tonic_build::configure()
        .build_server(false)
        .build_client(true)
        .compile_protos(
            &[
                "proto/common.proto",
                "proto/heartbeat.proto",
                "proto/mds.proto",
                "proto/topology.proto",
                "proto/metaserver.proto",
            ],
            &["proto"],
        )?;

    Ok(())
}
