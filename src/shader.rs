//! WGSL source for the compute and render pipelines.
//!
//! The compute shader has two modes selected per dispatch by the
//! `only_reset` uniform:
//!
//! 1. **Reset**: every invocation inspects its particle; inactive particles
//!    race on the atomic reactivation counter, and the first
//!    `max_emit_count` winners respawn at the current emitter. Run once per
//!    emitter per frame.
//! 2. **Advection**: integrate `position += velocity * delta_time` and
//!    deactivate particles that left the polygon region. Run once per frame,
//!    and this is the only pass that moves active particles.
//!
//! The GPU has no RNG, so speeds and directions come from an integer hash
//! fed by the particle's previous velocity bits, the invocation index, and
//! the random-seed counter. That hash is the reason the pool must be
//! CPU-populated with nonzero velocities before its first upload.

/// Invocations per work group, matching `@workgroup_size` below.
pub const WORKGROUP_SIZE: u32 = 256;

/// Fixed binding points agreed between host and shader.
///
/// The two counters cannot be rebound once the pipeline exists, so these are
/// part of the host/shader contract rather than an implementation detail.
pub const PARTICLE_BINDING: u32 = 0;
pub const UNIFORM_BINDING: u32 = 1;
pub const FACE_BINDING: u32 = 2;
pub const RESET_COUNTER_BINDING: u32 = 3;
pub const RAND_SEED_BINDING: u32 = 4;

/// Work groups needed to cover `particle_count` invocations.
///
/// Always `count / size + 1`, not an exact ceiling: an even multiple gets
/// one surplus group, and the shader bounds-checks its index.
pub fn work_group_count(particle_count: u32) -> u32 {
    (particle_count / WORKGROUP_SIZE) + 1
}

/// Generate the two-mode compute shader.
pub fn compute_shader() -> String {
    format!(
        r#"// Particle reset + advection compute shader.

struct Particle {{
    position: vec4<f32>,
    velocity: vec4<f32>,
    is_active: u32,
    _pad0: u32,
    _pad1: u32,
    _pad2: u32,
}};

struct SurfaceVertex {{
    position: vec4<f32>,
    normal: vec4<f32>,
}};

struct PolygonFace {{
    face_start: SurfaceVertex,
    face_end: SurfaceVertex,
}};

struct DispatchUniforms {{
    region_transform: mat4x4<f32>,
    emitter_transform: mat4x4<f32>,
    point_center: vec4<f32>,
    bar_start: vec4<f32>,
    bar_end: vec4<f32>,
    bar_emit_dir: vec4<f32>,
    max_particle_count: u32,
    max_emit_count: u32,
    use_point_emitter: u32,
    only_reset: u32,
    min_velocity: f32,
    delta_velocity: f32,
    delta_time: f32,
    _pad: f32,
}};

@group(0) @binding({particle_binding})
var<storage, read_write> particles: array<Particle>;

@group(0) @binding({uniform_binding})
var<uniform> uniforms: DispatchUniforms;

@group(0) @binding({face_binding})
var<storage, read> faces: array<PolygonFace>;

@group(0) @binding({reset_counter_binding})
var<storage, read_write> reset_counter: atomic<u32>;

@group(0) @binding({rand_seed_binding})
var<storage, read_write> rand_seed: atomic<u32>;

fn hash(n: u32) -> u32 {{
    var x = n;
    x = x ^ (x >> 17u);
    x = x * 0xed5ad4bbu;
    x = x ^ (x >> 11u);
    x = x * 0xac4c1b51u;
    x = x ^ (x >> 15u);
    x = x * 0x31848babu;
    x = x ^ (x >> 14u);
    return x;
}}

fn rand(seed: u32) -> f32 {{
    return f32(hash(seed)) / 4294967295.0;
}}

fn inside_region(pos: vec4<f32>) -> bool {{
    let face_count = arrayLength(&faces);
    for (var i = 0u; i < face_count; i++) {{
        let vertex = uniforms.region_transform * faces[i].face_start.position;
        let normal = uniforms.region_transform * faces[i].face_start.normal;
        if dot(pos.xy - vertex.xy, normal.xy) > 0.0 {{
            return false;
        }}
    }}
    return true;
}}

@compute @workgroup_size({workgroup_size})
fn main(@builtin(global_invocation_id) global_id: vec3<u32>) {{
    let index = global_id.x;

    // The host over-dispatches by up to one work group.
    if index >= uniforms.max_particle_count {{
        return;
    }}

    var p = particles[index];

    if uniforms.only_reset == 1u {{
        if p.is_active == 0u {{
            // Claim a reactivation slot; losers stay inactive for the next
            // emitter's dispatch.
            let claim = atomicAdd(&reset_counter, 1u);
            if claim < uniforms.max_emit_count {{
                let chaos = atomicAdd(&rand_seed, 1u);
                let seed = bitcast<u32>(p.velocity.x) ^ (index * 2654435761u) ^ chaos;
                let r0 = rand(seed);
                let r1 = rand(seed ^ 0x9e3779b9u);
                let speed = uniforms.min_velocity + r0 * uniforms.delta_velocity;

                if uniforms.use_point_emitter == 1u {{
                    p.position = uniforms.emitter_transform * uniforms.point_center;
                    let theta = r1 * 6.28318530718;
                    p.velocity = vec4<f32>(cos(theta) * speed, sin(theta) * speed, 0.0, 0.0);
                }} else {{
                    let bar_start = uniforms.emitter_transform * uniforms.bar_start;
                    let bar_end = uniforms.emitter_transform * uniforms.bar_end;
                    p.position = mix(bar_start, bar_end, r1);
                    p.velocity = (uniforms.emitter_transform * uniforms.bar_emit_dir) * speed;
                }}

                p.position.w = 1.0;
                p.velocity.w = 0.0;
                p.is_active = 1u;
            }}
        }}
    }} else {{
        if p.is_active == 1u {{
            p.position = p.position + p.velocity * uniforms.delta_time;
            if !inside_region(p.position) {{
                p.is_active = 0u;
            }}
        }}
    }}

    particles[index] = p;
}}
"#,
        particle_binding = PARTICLE_BINDING,
        uniform_binding = UNIFORM_BINDING,
        face_binding = FACE_BINDING,
        reset_counter_binding = RESET_COUNTER_BINDING,
        rand_seed_binding = RAND_SEED_BINDING,
        workgroup_size = WORKGROUP_SIZE,
    )
}

/// Render shader for the particle quads (instanced, six vertices each).
pub fn particle_render_shader() -> String {
    r#"struct RenderUniforms {
    transform: mat4x4<f32>,
};

@group(0) @binding(0)
var<uniform> uniforms: RenderUniforms;

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) alpha: f32,
    @location(1) uv: vec2<f32>,
};

@vertex
fn vs_main(
    @builtin(vertex_index) vertex_index: u32,
    @location(0) particle_pos: vec4<f32>,
    @location(1) is_active: u32,
) -> VertexOutput {
    var quad_vertices = array<vec2<f32>, 6>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>( 1.0, -1.0),
        vec2<f32>(-1.0,  1.0),
        vec2<f32>(-1.0,  1.0),
        vec2<f32>( 1.0, -1.0),
        vec2<f32>( 1.0,  1.0),
    );

    let quad_pos = quad_vertices[vertex_index];
    let particle_size = 0.006;

    var clip_pos = uniforms.transform * vec4<f32>(particle_pos.xy, 0.0, 1.0);
    clip_pos.x += quad_pos.x * particle_size;
    clip_pos.y += quad_pos.y * particle_size;

    var out: VertexOutput;
    out.clip_position = clip_pos;
    out.alpha = f32(is_active);
    out.uv = quad_pos;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    // Inactive particles are culled here rather than on the CPU; the pool
    // never shrinks.
    if in.alpha < 0.5 {
        discard;
    }
    let dist = length(in.uv);
    if dist > 1.0 {
        discard;
    }
    let fade = 1.0 - smoothstep(0.5, 1.0, dist);
    return vec4<f32>(0.85, 0.9, 1.0, fade);
}
"#
    .to_string()
}

/// Render shader for the polygon region outline (line list).
pub fn region_render_shader() -> String {
    r#"struct RenderUniforms {
    transform: mat4x4<f32>,
};

@group(0) @binding(0)
var<uniform> uniforms: RenderUniforms;

@vertex
fn vs_main(@location(0) position: vec4<f32>) -> @builtin(position) vec4<f32> {
    return uniforms.transform * vec4<f32>(position.xy, 0.0, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(0.4, 0.8, 0.4, 1.0);
}
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Validates WGSL code using naga.
    fn validate_wgsl(code: &str) -> Result<(), String> {
        let module = naga::front::wgsl::parse_str(code)
            .map_err(|e| format!("WGSL parse error: {:?}", e))?;

        let mut validator = naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        );
        validator
            .validate(&module)
            .map_err(|e| format!("WGSL validation error: {:?}", e))?;

        Ok(())
    }

    #[test]
    fn test_compute_shader_validates() {
        let src = compute_shader();
        validate_wgsl(&src).expect("compute shader should be valid WGSL");
    }

    #[test]
    fn test_compute_shader_contract() {
        let src = compute_shader();
        // Counter bindings are part of the host/shader contract.
        assert!(src.contains(&format!("@binding({})", RESET_COUNTER_BINDING)));
        assert!(src.contains(&format!("@binding({})", RAND_SEED_BINDING)));
        assert!(src.contains("atomicAdd(&reset_counter"));
        assert!(src.contains("only_reset"));
        assert!(src.contains("max_emit_count"));
    }

    #[test]
    fn test_render_shaders_validate() {
        validate_wgsl(&particle_render_shader()).expect("particle shader should be valid WGSL");
        validate_wgsl(&region_render_shader()).expect("region shader should be valid WGSL");
    }

    #[test]
    fn test_work_group_count_over_dispatches() {
        // 15000 / 256 == 58 full groups plus one extra.
        assert_eq!(work_group_count(15_000), 59);
        // An exact multiple still gets the extra group; this is a tolerated
        // over-dispatch, not a ceiling.
        assert_eq!(work_group_count(256), 2);
        assert_eq!(work_group_count(0), 1);
    }
}
