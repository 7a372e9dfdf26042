//! Inline WGSL for the accumulate and post passes.
//!
//! Binding indices in the shader text must match `render::bindings`
//! ([`super::bindings::BindSlot`] and the frame/history/post constants).

/// Path-tracing pass. Reads the history image, traces one sample per pixel
/// and writes the running average back out.
pub(crate) const ACCUMULATE_SHADER: &str = r#"
struct FrameUniform {
    eye: vec4<f32>,
    forward: vec4<f32>,
    up: vec4<f32>,
    right: vec4<f32>,
    resolution: vec2<u32>,
    iteration_count: u32,
    index_count: u32,
    light_count: vec4<u32>,
}

struct VertexData {
    normal: vec4<f32>,
    uv: vec4<f32>,
}

struct Light {
    radiance: vec4<f32>,
    transform: mat4x4<f32>,
}

struct Material {
    albedo: vec3<f32>,
    roughness: f32,
    metallic: f32,
    ior: f32,
    anisotropy: f32,
    transmission: f32,
}

@group(0) @binding(0) var<uniform> frame: FrameUniform;
@group(0) @binding(1) var history: texture_2d<f32>;

@group(1) @binding(0) var<storage, read> vertices: array<vec4<f32>>;
@group(1) @binding(1) var<storage, read> indices: array<vec4<u32>>;
@group(1) @binding(2) var<storage, read> vertex_data: array<VertexData>;
@group(1) @binding(3) var<storage, read> lights: array<Light>;
@group(1) @binding(4) var<storage, read> materials: array<Material>;
@group(1) @binding(5) var<storage, read> material_map: array<u32>;

const PI: f32 = 3.14159265359;
// tan of half the 45 degree vertical field of view
const TAN_HALF_FOV: f32 = 0.41421356;
const NO_HIT: u32 = 0xffffffffu;
const MAX_BOUNCES: u32 = 4u;
const RAY_EPSILON: f32 = 1e-3;
const SKY: vec3<f32> = vec3<f32>(0.02, 0.02, 0.03);

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> @builtin(position) vec4<f32> {
    // Full-screen triangle, no vertex data.
    let uv = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    return vec4<f32>(uv * 2.0 - 1.0, 0.0, 1.0);
}

fn pcg_hash(input: u32) -> u32 {
    let state = input * 747796405u + 2891336453u;
    let word = ((state >> ((state >> 28u) + 4u)) ^ state) * 277803737u;
    return (word >> 22u) ^ word;
}

fn rand(state: ptr<function, u32>) -> f32 {
    *state = pcg_hash(*state);
    return f32(*state >> 8u) / 16777216.0;
}

struct Hit {
    t: f32,
    tri: u32,
    u: f32,
    v: f32,
}

fn intersect_scene(origin: vec3<f32>, dir: vec3<f32>, max_t: f32) -> Hit {
    var hit: Hit;
    hit.t = max_t;
    hit.tri = NO_HIT;

    for (var i = 0u; i < frame.index_count; i = i + 1u) {
        let quad = indices[i];
        let a = vertices[quad.x].xyz;
        let edge1 = vertices[quad.y].xyz - a;
        let edge2 = vertices[quad.z].xyz - a;

        let p = cross(dir, edge2);
        let det = dot(edge1, p);
        if (abs(det) < 1e-8) {
            continue;
        }
        let inv_det = 1.0 / det;
        let tv = origin - a;
        let u = dot(tv, p) * inv_det;
        if (u < 0.0 || u > 1.0) {
            continue;
        }
        let q = cross(tv, edge1);
        let v = dot(dir, q) * inv_det;
        if (v < 0.0 || u + v > 1.0) {
            continue;
        }
        let t = dot(edge2, q) * inv_det;
        if (t > RAY_EPSILON && t < hit.t) {
            hit = Hit(t, i, u, v);
        }
    }
    return hit;
}

fn shading_normal(hit: Hit, dir: vec3<f32>) -> vec3<f32> {
    let quad = indices[hit.tri];
    let n0 = vertex_data[quad.x].normal.xyz;
    let n1 = vertex_data[quad.y].normal.xyz;
    let n2 = vertex_data[quad.z].normal.xyz;
    var n = normalize((1.0 - hit.u - hit.v) * n0 + hit.u * n1 + hit.v * n2);
    if (dot(n, dir) > 0.0) {
        n = -n;
    }
    return n;
}

fn cosine_sample(n: vec3<f32>, r1: f32, r2: f32) -> vec3<f32> {
    var tangent: vec3<f32>;
    if (abs(n.y) < 0.99) {
        tangent = normalize(cross(vec3<f32>(0.0, 1.0, 0.0), n));
    } else {
        tangent = normalize(cross(vec3<f32>(1.0, 0.0, 0.0), n));
    }
    let bitangent = cross(n, tangent);
    let phi = 2.0 * PI * r1;
    let radius = sqrt(r2);
    let local = vec3<f32>(radius * cos(phi), radius * sin(phi), sqrt(1.0 - r2));
    return normalize(local.x * tangent + local.y * bitangent + local.z * n);
}

fn sample_lights(p: vec3<f32>, n: vec3<f32>, albedo: vec3<f32>) -> vec3<f32> {
    var sum = vec3<f32>(0.0);
    for (var l = 0u; l < frame.light_count.x; l = l + 1u) {
        let light = lights[l];
        let position = (light.transform * vec4<f32>(0.0, 0.0, 0.0, 1.0)).xyz;
        var to_light = position - p;
        let dist2 = dot(to_light, to_light);
        let dist = sqrt(dist2);
        to_light = to_light / dist;
        let cos_term = dot(n, to_light);
        if (cos_term <= 0.0) {
            continue;
        }
        let shadow = intersect_scene(p + n * RAY_EPSILON, to_light, dist - RAY_EPSILON);
        if (shadow.tri != NO_HIT) {
            continue;
        }
        sum = sum + albedo / PI * light.radiance.rgb * cos_term / dist2;
    }
    return sum;
}

fn trace(origin_in: vec3<f32>, dir_in: vec3<f32>, rng: ptr<function, u32>) -> vec3<f32> {
    var origin = origin_in;
    var dir = dir_in;
    var radiance = vec3<f32>(0.0);
    var throughput = vec3<f32>(1.0);

    for (var bounce = 0u; bounce < MAX_BOUNCES; bounce = bounce + 1u) {
        let hit = intersect_scene(origin, dir, 1e30);
        if (hit.tri == NO_HIT) {
            radiance = radiance + throughput * SKY;
            break;
        }

        let material = materials[material_map[hit.tri]];
        let n = shading_normal(hit, dir);
        let p = origin + dir * hit.t;

        radiance = radiance + throughput * sample_lights(p, n, material.albedo);

        if (rand(rng) < material.metallic) {
            let mirror = reflect(dir, n);
            let diffuse = cosine_sample(n, rand(rng), rand(rng));
            dir = normalize(mix(mirror, diffuse, material.roughness));
        } else {
            dir = cosine_sample(n, rand(rng), rand(rng));
        }
        throughput = throughput * material.albedo;
        origin = p + n * RAY_EPSILON;

        // Russian roulette once the throughput has attenuated.
        if (bounce >= 2u) {
            let survive = max(throughput.x, max(throughput.y, throughput.z));
            if (rand(rng) > survive) {
                break;
            }
            throughput = throughput / max(survive, 1e-4);
        }
    }
    return radiance;
}

@fragment
fn fs_main(@builtin(position) position: vec4<f32>) -> @location(0) vec4<f32> {
    let pixel = vec2<u32>(position.xy);
    var rng = pcg_hash(pixel.x * 1973u ^ pixel.y * 9277u ^ frame.iteration_count * 26699u);

    let resolution = vec2<f32>(frame.resolution);
    let jitter = vec2<f32>(rand(&rng), rand(&rng)) - 0.5;
    var ndc = (vec2<f32>(pixel) + 0.5 + jitter) / resolution * 2.0 - 1.0;
    ndc.y = -ndc.y;
    let aspect = resolution.x / resolution.y;

    let dir = normalize(
        frame.forward.xyz
            + ndc.x * aspect * TAN_HALF_FOV * frame.right.xyz
            + ndc.y * TAN_HALF_FOV * frame.up.xyz
    );

    let current = trace(frame.eye.xyz, dir, &rng);

    let previous = textureLoad(history, vec2<i32>(pixel), 0).rgb;
    let count = f32(frame.iteration_count);
    let blended = (previous * count + current) / (count + 1.0);
    return vec4<f32>(blended, 1.0);
}
"#;

/// Presentation pass: tonemaps the accumulated image onto the surface.
pub(crate) const POST_SHADER: &str = r#"
@group(0) @binding(0) var accumulation: texture_2d<f32>;

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> @builtin(position) vec4<f32> {
    let uv = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    return vec4<f32>(uv * 2.0 - 1.0, 0.0, 1.0);
}

@fragment
fn fs_main(@builtin(position) position: vec4<f32>) -> @location(0) vec4<f32> {
    let color = textureLoad(accumulation, vec2<i32>(position.xy), 0).rgb;
    // Reinhard; the sRGB surface handles gamma.
    let mapped = color / (color + vec3<f32>(1.0));
    return vec4<f32>(mapped, 1.0);
}
"#;
