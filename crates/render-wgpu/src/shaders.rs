/// WGSL shader for lit, instanced model meshes.
pub const MODEL_SHADER: &str = r#"
struct Uniforms {
    view_proj: mat4x4<f32>,
    ambient: vec4<f32>,
    light_dir: vec4<f32>,
    light_color: vec4<f32>,
};

@group(0) @binding(0)
var<uniform> uniforms: Uniforms;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
};

struct InstanceInput {
    @location(2) model_0: vec4<f32>,
    @location(3) model_1: vec4<f32>,
    @location(4) model_2: vec4<f32>,
    @location(5) model_3: vec4<f32>,
    @location(6) normal_0: vec4<f32>,
    @location(7) normal_1: vec4<f32>,
    @location(8) normal_2: vec4<f32>,
    @location(9) color: vec4<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_normal: vec3<f32>,
    @location(1) color: vec4<f32>,
};

@vertex
fn vs_main(vertex: VertexInput, instance: InstanceInput) -> VertexOutput {
    let model = mat4x4<f32>(
        instance.model_0,
        instance.model_1,
        instance.model_2,
        instance.model_3,
    );
    let world_pos = model * vec4<f32>(vertex.position, 1.0);
    let normal_matrix = mat3x3<f32>(
        instance.normal_0.xyz,
        instance.normal_1.xyz,
        instance.normal_2.xyz,
    );
    let world_normal = normal_matrix * vertex.normal;

    var out: VertexOutput;
    out.clip_position = uniforms.view_proj * world_pos;
    out.world_normal = normalize(world_normal);
    out.color = instance.color;
    return out;
}

@fragment
fn fs_main(in: VertexOutput, @builtin(front_facing) front_facing: bool) -> @location(0) vec4<f32> {
    // Back faces only reach here on double-sided materials.
    let n = select(-in.world_normal, in.world_normal, front_facing);
    let diffuse = max(dot(normalize(n), uniforms.light_dir.xyz), 0.0);
    let lighting = uniforms.ambient.rgb + uniforms.light_color.rgb * diffuse;
    return vec4<f32>(in.color.rgb * lighting, in.color.a);
}
"#;
