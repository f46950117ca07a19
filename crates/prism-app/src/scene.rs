// SPDX-License-Identifier: CEPL-1.0
//! Procedural demo scene: a floor, a row of boxes and one glowing panel.
use prism_math::glam::Vec3;
use prism_render::{MaterialDesc, MeshSource};

pub const FLOOR_Y: f32 = -8.0;

pub struct DemoScene {
    pub mesh: MeshSource,
    pub materials: Vec<MaterialDesc>,
}

#[derive(Default)]
struct MeshBuilder {
    mesh: MeshSource,
}

impl MeshBuilder {
    /// Corners in counter-clockwise order seen from the side `normal` points to.
    fn quad(&mut self, corners: [Vec3; 4], normal: Vec3, material: u32) {
        for idx in [[0, 1, 2], [0, 2, 3]] {
            for i in idx {
                self.mesh.positions.push(corners[i].to_array());
                self.mesh.normals.push(normal.to_array());
            }
            self.mesh.face_materials.push(material);
        }
    }

    fn cuboid(&mut self, center: Vec3, half: Vec3, material: u32) {
        // (normal, u, v) with u x v == normal
        const FACES: [(Vec3, Vec3, Vec3); 6] = [
            (Vec3::X, Vec3::Y, Vec3::Z),
            (Vec3::NEG_X, Vec3::Z, Vec3::Y),
            (Vec3::Y, Vec3::Z, Vec3::X),
            (Vec3::NEG_Y, Vec3::X, Vec3::Z),
            (Vec3::Z, Vec3::X, Vec3::Y),
            (Vec3::NEG_Z, Vec3::Y, Vec3::X),
        ];
        for (n, u, v) in FACES {
            let (n, u, v) = (n * half, u * half, v * half);
            let c = center + n;
            self.quad([c - u - v, c + u - v, c + u + v, c - u + v], n.normalize(), material);
        }
    }
}

fn material(albedo: [f32; 3], shininess: f32, metalness: f32) -> MaterialDesc {
    MaterialDesc {
        albedo,
        shininess,
        metalness,
        ..MaterialDesc::default()
    }
}

pub fn build() -> DemoScene {
    let materials = vec![
        material([0.55, 0.55, 0.5], 8.0, 0.0),
        material([0.8, 0.1, 0.1], 64.0, 0.0),
        MaterialDesc {
            specular: [1.0, 0.78, 0.34],
            ..material([1.0, 0.78, 0.34], 128.0, 1.0)
        },
        material([0.2, 0.35, 0.8], 16.0, 0.3),
        MaterialDesc {
            emissive: [1.0, 0.9, 0.6],
            ..material([0.0; 3], 1.0, 0.0)
        },
    ];

    let mut b = MeshBuilder::default();
    let s = 20.0;
    b.quad(
        [
            Vec3::new(-s, FLOOR_Y, -s),
            Vec3::new(-s, FLOOR_Y, s),
            Vec3::new(s, FLOOR_Y, s),
            Vec3::new(s, FLOOR_Y, -s),
        ],
        Vec3::Y,
        0,
    );
    for (i, x) in [-6.0f32, -2.0, 2.0, 6.0].into_iter().enumerate() {
        let h = 1.0 + i as f32 * 0.5;
        let mat = 1 + (i as u32 % 3);
        b.cuboid(Vec3::new(x, FLOOR_Y + h, 4.0), Vec3::new(1.2, h, 1.2), mat);
    }
    b.cuboid(Vec3::new(0.0, FLOOR_Y + 6.0, 10.0), Vec3::new(4.0, 1.5, 0.2), 4);

    DemoScene {
        mesh: b.mesh,
        materials,
    }
}
