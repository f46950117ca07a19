use std::{
    env, fs,
    path::{Path, PathBuf},
};

// Scene uniform shared by every stage. Mirrors `prism_render::SceneUniform`.
const SCENE_BLOCK: &str = r#"
struct Light {
    vec4 position;
    vec4 colour;
};

layout(set = 0, binding = 0) uniform Scene {
    mat4 camera;
    mat4 projection;
    mat4 projCam;
    Light lights[4];
    vec4 camPos;
    uint lightCount;
    uint technique;
} scene;
"#;

// Geometry pass: two tightly packed vec3 streams in, world-space attributes out.
const GBUFFER_VERT: &str = r#"
layout(location = 0) in vec3 inPos;
layout(location = 1) in vec3 inNormal;

layout(location = 0) out vec3 vPos;
layout(location = 1) out vec3 vNormal;

void main() {
    vPos = inPos;
    vNormal = inNormal;
    gl_Position = scene.projCam * vec4(inPos, 1.0);
}
"#;

// Per-draw material, set 1 of scene-pass pipelines.
const MATERIAL_BLOCK: &str = r#"
layout(set = 1, binding = 0) uniform Material {
    vec4 emissive;
    vec4 albedo;
    vec4 specular;
    float shininess;
    float metalness;
} material;
"#;

// G-buffer packing:
//   position.rgb = world position, position.a = shininess
//   normal.rgb   = world normal,   normal.a   = 1 where geometry was drawn
//   albedo.rgb   = albedo,         albedo.a   = metalness
//   emissive.rgb = emissive,       emissive.a = specular strength
const GBUFFER_FRAG: &str = r#"
layout(location = 0) in vec3 vPos;
layout(location = 1) in vec3 vNormal;

layout(location = 0) out vec4 outPosition;
layout(location = 1) out vec4 outNormal;
layout(location = 2) out vec4 outAlbedo;
layout(location = 3) out vec4 outEmissive;

void main() {
    outPosition = vec4(vPos, material.shininess);
    outNormal = vec4(normalize(vNormal), 1.0);
    outAlbedo = vec4(material.albedo.rgb, material.metalness);
    outEmissive = vec4(material.emissive.rgb, material.specular.r);
}
"#;

// Fullscreen triangle from the vertex index; no vertex input.
const COMPOSITE_VERT: &str = r#"
void main() {
    vec2 uv = vec2((gl_VertexIndex << 1) & 2, gl_VertexIndex & 2);
    gl_Position = vec4(uv * 2.0 - 1.0, 0.0, 1.0);
}
"#;

// Lighting shared by deferred composition and forward shading.
// Technique codes match `prism_render::Technique::code`.
const SHADING: &str = r#"
const float PI = 3.14159265;

struct Surface {
    vec3 position;
    vec3 normal;
    vec3 albedo;
    vec3 emissive;
    float shininess;
    float metalness;
    float specular;
};

float distributionGGX(float nh, float roughness) {
    float a = roughness * roughness;
    float a2 = a * a;
    float d = nh * nh * (a2 - 1.0) + 1.0;
    return a2 / max(PI * d * d, 1e-4);
}

float geometrySmith(float nv, float nl, float roughness) {
    float k = (roughness + 1.0) * (roughness + 1.0) / 8.0;
    float gv = nv / (nv * (1.0 - k) + k);
    float gl = nl / (nl * (1.0 - k) + k);
    return gv * gl;
}

vec3 shade(uint technique, Surface s) {
    vec3 p = s.position;
    vec3 n = normalize(s.normal);
    vec3 v = normalize(scene.camPos.xyz - p);
    uint count = min(scene.lightCount, 4u);

    if (technique == 0u) {
        return n * 0.5 + 0.5;
    }
    if (technique == 1u) {
        return v * 0.5 + 0.5;
    }
    if (technique == 2u) {
        vec3 l = count > 0u ? normalize(scene.lights[0].position.xyz - p) : vec3(0.0);
        return l * 0.5 + 0.5;
    }

    vec3 colour = s.emissive + 0.02 * s.albedo;
    if (technique == 3u) {
        float shininess = max(s.shininess, 1.0);
        for (uint i = 0u; i < count; ++i) {
            vec3 l = normalize(scene.lights[i].position.xyz - p);
            vec3 h = normalize(l + v);
            vec3 radiance = scene.lights[i].colour.rgb;
            float diffuse = max(dot(n, l), 0.0);
            float spec = diffuse > 0.0 ? pow(max(dot(n, h), 0.0), shininess) : 0.0;
            colour += radiance * (s.albedo * diffuse / PI + s.specular * spec);
        }
        return colour;
    }

    float roughness = clamp(sqrt(2.0 / (max(s.shininess, 1.0) + 2.0)), 0.05, 1.0);
    vec3 f0 = mix(vec3(0.04), s.albedo, s.metalness);
    float nv = max(dot(n, v), 1e-4);
    for (uint i = 0u; i < count; ++i) {
        vec3 l = normalize(scene.lights[i].position.xyz - p);
        vec3 h = normalize(l + v);
        float nl = max(dot(n, l), 0.0);
        float nh = max(dot(n, h), 0.0);
        vec3 f = f0 + (1.0 - f0) * pow(1.0 - max(dot(h, v), 0.0), 5.0);
        vec3 specular = distributionGGX(nh, roughness) * geometrySmith(nv, nl, roughness) * f
            / max(4.0 * nv * nl, 1e-4);
        vec3 kd = (vec3(1.0) - f) * (1.0 - s.metalness);
        colour += (kd * s.albedo / PI + specular) * scene.lights[i].colour.rgb * nl;
    }
    return colour;
}
"#;

// One variant per technique; TECHNIQUE folds the branch away.
const COMPOSITE_FRAG: &str = r#"
layout(set = 1, binding = 0) uniform sampler2D gPosition;
layout(set = 1, binding = 1) uniform sampler2D gNormal;
layout(set = 1, binding = 2) uniform sampler2D gAlbedo;
layout(set = 1, binding = 3) uniform sampler2D gEmissive;

layout(location = 0) out vec4 outColor;

void main() {
    ivec2 px = ivec2(gl_FragCoord.xy);
    vec4 position = texelFetch(gPosition, px, 0);
    vec4 normal = texelFetch(gNormal, px, 0);
    vec4 albedo = texelFetch(gAlbedo, px, 0);
    vec4 emissive = texelFetch(gEmissive, px, 0);

    if (normal.w == 0.0) {
        outColor = vec4(emissive.rgb, 1.0);
        return;
    }

    Surface s = Surface(
        position.xyz, normal.xyz, albedo.rgb, emissive.rgb, position.w, albedo.a, emissive.a);
    outColor = vec4(shade(uint(TECHNIQUE), s), 1.0);
}
"#;

// Forward path: lit directly, technique read from the scene uniform.
const FORWARD_FRAG: &str = r#"
layout(location = 0) in vec3 vPos;
layout(location = 1) in vec3 vNormal;

layout(location = 0) out vec4 outColor;

void main() {
    Surface s = Surface(
        vPos,
        vNormal,
        material.albedo.rgb,
        material.emissive.rgb,
        material.shininess,
        material.metalness,
        material.specular.r);
    outColor = vec4(shade(scene.technique, s), 1.0);
}
"#;

// Post pass: pixelates the forward image in square blocks and fades
// distant geometry into the clear colour using the sampled depth.
const POST_FRAG: &str = r#"
layout(set = 1, binding = 0) uniform sampler2D sceneColour;
layout(set = 1, binding = 1) uniform sampler2D sceneDepth;

layout(location = 0) out vec4 outColor;

const int BLOCK = 4;
const float FOG_START = 25.0;
const float FOG_END = 90.0;
const vec3 FOG_COLOUR = vec3(0.1);

// Inverse of the right-handed 0..1 perspective depth mapping.
float viewDistance(float depth) {
    return scene.projection[3][2] / (depth + scene.projection[2][2]);
}

void main() {
    ivec2 size = textureSize(sceneColour, 0);
    ivec2 block = (ivec2(gl_FragCoord.xy) / BLOCK) * BLOCK + BLOCK / 2;
    ivec2 px = min(block, size - 1);

    vec3 colour = texelFetch(sceneColour, px, 0).rgb;
    float depth = texelFetch(sceneDepth, px, 0).r;
    if (depth < 1.0) {
        float fog = smoothstep(FOG_START, FOG_END, viewDistance(depth));
        colour = mix(colour, FOG_COLOUR, fog);
    }
    outColor = vec4(colour, 1.0);
}
"#;

// Output names match the logical names the frame pipeline asks for.
const TECHNIQUES: [(&str, &str); 5] = [
    ("composite_normal.frag", "0"),
    ("composite_view.frag", "1"),
    ("composite_light.frag", "2"),
    ("composite_blinn_phong.frag", "3"),
    ("composite_pbr.frag", "4"),
];

fn compile(
    comp: &shaderc::Compiler,
    out: &Path,
    name: &str,
    kind: shaderc::ShaderKind,
    body: &str,
    technique: Option<&str>,
) {
    let uses_scene = !body.contains("gl_VertexIndex");
    let src = if uses_scene {
        format!("#version 450\n{SCENE_BLOCK}{body}")
    } else {
        format!("#version 450\n{body}")
    };
    let mut opts = shaderc::CompileOptions::new().unwrap();
    opts.set_target_env(
        shaderc::TargetEnv::Vulkan,
        shaderc::EnvVersion::Vulkan1_0 as u32,
    );
    opts.set_optimization_level(shaderc::OptimizationLevel::Performance);
    if let Some(t) = technique {
        opts.add_macro_definition("TECHNIQUE", Some(t));
    }
    let spv = comp
        .compile_into_spirv(&src, kind, name, "main", Some(&opts))
        .unwrap_or_else(|e| panic!("{name}: {e}"));
    fs::write(out.join(format!("{name}.spv")), spv.as_binary_u8()).unwrap();
}

fn main() {
    let out = PathBuf::from(env::var("OUT_DIR").unwrap());
    let comp = shaderc::Compiler::new().unwrap();

    let vertex = shaderc::ShaderKind::Vertex;
    let fragment = shaderc::ShaderKind::Fragment;
    let gbuffer = format!("{MATERIAL_BLOCK}{GBUFFER_FRAG}");
    let composite = format!("{SHADING}{COMPOSITE_FRAG}");
    let forward = format!("{MATERIAL_BLOCK}{SHADING}{FORWARD_FRAG}");

    compile(&comp, &out, "gbuffer.vert", vertex, GBUFFER_VERT, None);
    compile(&comp, &out, "gbuffer.frag", fragment, &gbuffer, None);
    compile(&comp, &out, "composite.vert", vertex, COMPOSITE_VERT, None);
    for (name, technique) in TECHNIQUES {
        compile(&comp, &out, name, fragment, &composite, Some(technique));
    }
    compile(&comp, &out, "forward.frag", fragment, &forward, None);
    compile(&comp, &out, "post.frag", fragment, POST_FRAG, None);

    // Inline sources live here.
    println!("cargo:rerun-if-changed=build.rs");
}
