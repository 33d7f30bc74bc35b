//! WGSL sources for the viewer programs

/// Uniform block shared by every scene program
const SCENE: &str = r#"
struct Scene {
    model: mat4x4<f32>,
    view: mat4x4<f32>,
    proj: mat4x4<f32>,
    light_position: vec3<f32>,
    lighting_factor: f32,
    wire_color: vec3<f32>,
    shininess: f32,
    fill_color: vec3<f32>,
    cel_shading: u32,
    important_color: vec3<f32>,
    point_size: f32,
    selected_color: vec3<f32>,
    important_size: f32,
    outline_color: vec3<f32>,
    selected_size: f32,
    viewport: vec2<f32>,
    _padding: vec2<f32>,
};

@group(0) @binding(0)
var<uniform> scene: Scene;
"#;

/// Lit fill pass and the unlit texture variant
const MESH: &str = r#"
struct MeshInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) ambient: vec3<f32>,
    @location(3) specular: vec3<f32>,
    @location(4) diffuse: vec3<f32>,
};

struct MeshOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) eye_position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) ambient: vec3<f32>,
    @location(3) specular: vec3<f32>,
    @location(4) diffuse: vec3<f32>,
};

@vertex
fn vs_mesh(in: MeshInput) -> MeshOutput {
    var out: MeshOutput;
    let model_view = scene.view * scene.model;
    let eye = model_view * vec4<f32>(in.position, 1.0);
    out.clip_position = scene.proj * eye;
    out.eye_position = eye.xyz;
    // model is rotation times uniform scale, so normals transform with it
    out.normal = (model_view * vec4<f32>(in.normal, 0.0)).xyz;
    out.ambient = in.ambient;
    out.specular = in.specular;
    out.diffuse = in.diffuse;
    return out;
}

@fragment
fn fs_mesh(in: MeshOutput, @builtin(front_facing) front: bool) -> @location(0) vec4<f32> {
    var n = normalize(in.normal);
    if (!front) {
        n = -n;
    }
    let light_eye = (scene.view * vec4<f32>(scene.light_position, 1.0)).xyz;
    let l = normalize(light_eye - in.eye_position);
    let v = normalize(-in.eye_position);
    let r = reflect(-l, n);

    var diffuse = max(dot(n, l), 0.0);
    var specular = pow(max(dot(r, v), 0.0), scene.shininess);
    if (scene.cel_shading != 0u) {
        diffuse = floor(diffuse * 4.0) / 4.0;
        specular = step(0.5, specular);
    }

    let color = in.ambient + scene.lighting_factor * (diffuse * in.diffuse + specular * in.specular);
    return vec4<f32>(clamp(color, vec3<f32>(0.0), vec3<f32>(1.0)), 1.0);
}

@fragment
fn fs_texture(in: MeshOutput) -> @location(0) vec4<f32> {
    return vec4<f32>(in.diffuse, 1.0);
}
"#;

const LINES: &str = r#"
struct LineInput {
    @location(0) position: vec3<f32>,
    @location(1) alpha: f32,
};

struct LineOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) alpha: f32,
};

@vertex
fn vs_lines(in: LineInput) -> LineOutput {
    var out: LineOutput;
    out.clip_position = scene.proj * scene.view * scene.model * vec4<f32>(in.position, 1.0);
    out.alpha = in.alpha;
    return out;
}

@fragment
fn fs_lines(in: LineOutput) -> @location(0) vec4<f32> {
    return vec4<f32>(scene.wire_color, in.alpha);
}
"#;

/// Screen-aligned disc markers, one instance per marked point
const POINTS: &str = r#"
struct PointInput {
    @builtin(vertex_index) corner: u32,
    @location(0) position: vec3<f32>,
    @location(1) flags: u32,
};

struct PointOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) local: vec2<f32>,
    @location(1) @interpolate(flat) fill: vec3<f32>,
    @location(2) @interpolate(flat) radius: f32,
};

@vertex
fn vs_points(in: PointInput) -> PointOutput {
    var out: PointOutput;
    let important = (in.flags & 1u) != 0u;
    let selected = (in.flags & 2u) != 0u;

    var radius = scene.point_size;
    var fill = scene.fill_color;
    if (important) {
        radius = scene.important_size;
        fill = scene.important_color;
    }
    if (selected) {
        radius = scene.selected_size;
        fill = scene.selected_color;
    }

    var corners = array<vec2<f32>, 6>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(1.0, -1.0),
        vec2<f32>(1.0, 1.0),
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(1.0, 1.0),
        vec2<f32>(-1.0, 1.0),
    );
    let corner = corners[in.corner];
    var center = scene.proj * scene.view * scene.model * vec4<f32>(in.position, 1.0);
    // pull markers slightly toward the camera so they win against their own vertex
    center.z = center.z - 0.0005 * center.w;
    let offset = corner * (radius + 1.0) * 2.0 / scene.viewport;
    out.clip_position = center + vec4<f32>(offset * center.w, 0.0, 0.0);
    out.local = corner * (radius + 1.0);
    out.fill = fill;
    out.radius = radius;
    return out;
}

@fragment
fn fs_points(in: PointOutput) -> @location(0) vec4<f32> {
    let d = length(in.local);
    if (d > in.radius) {
        discard;
    }
    if (d > in.radius - 1.5) {
        return vec4<f32>(scene.outline_color, 1.0);
    }
    return vec4<f32>(in.fill, 1.0);
}
"#;

/// Overlay plots in normalized device coordinates
pub const PLOT: &str = r#"
struct PlotInput {
    @location(0) position: vec2<f32>,
    @location(1) color: vec3<f32>,
};

struct PlotOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec3<f32>,
};

@vertex
fn vs_plot(in: PlotInput) -> PlotOutput {
    var out: PlotOutput;
    out.clip_position = vec4<f32>(in.position, 0.0, 1.0);
    out.color = in.color;
    return out;
}

@fragment
fn fs_plot(in: PlotOutput) -> @location(0) vec4<f32> {
    return vec4<f32>(in.color, 1.0);
}
"#;

/// Copies the offscreen target onto the window surface
pub const BLIT: &str = r#"
@group(0) @binding(0)
var source: texture_2d<f32>;
@group(0) @binding(1)
var source_sampler: sampler;

struct BlitOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_blit(@builtin(vertex_index) index: u32) -> BlitOutput {
    var out: BlitOutput;
    let uv = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    out.clip_position = vec4<f32>(uv * 2.0 - 1.0, 0.0, 1.0);
    out.uv = vec2<f32>(uv.x, 1.0 - uv.y);
    return out;
}

@fragment
fn fs_blit(in: BlitOutput) -> @location(0) vec4<f32> {
    return textureSample(source, source_sampler, in.uv);
}
"#;

/// Scene uniform block followed by all scene programs
pub fn scene_source() -> String {
    [SCENE, MESH, LINES, POINTS].concat()
}
