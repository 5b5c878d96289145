//! Helpers shared by the integration tests.

use compute_particles::gpu;

/// A headless device able to hold `buffer_bytes` of particles, or `None` when
/// the machine has no suitable adapter. GPU tests return early in that case.
pub fn headless_device(buffer_bytes: u64) -> Option<(wgpu::Device, wgpu::Queue)> {
    match pollster::block_on(gpu::request_headless(buffer_bytes)) {
        Ok(pair) => Some(pair),
        Err(err) => {
            eprintln!("skipping GPU test: {}", err);
            None
        }
    }
}

/// Parse and validate WGSL the same way the program builder does.
#[allow(dead_code)]
pub fn validate_wgsl(source: &str) -> Result<naga::Module, String> {
    let module = naga::front::wgsl::parse_str(source)
        .map_err(|e| format!("WGSL parse error: {:?}", e))?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    validator
        .validate(&module)
        .map_err(|e| format!("WGSL validation error: {:?}", e))?;

    Ok(module)
}
