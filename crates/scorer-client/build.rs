fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Compile the proto file for the scorer client
    tonic_build::compile_protos("../../proto/scoring.proto")?;
    Ok(())
}
