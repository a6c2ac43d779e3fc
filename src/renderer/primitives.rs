use super::geometry::Index;
use super::vertex::{v, SkinningVertex, TexturedVertex, Vertex};
use std::f32::consts::PI;

pub fn sphere_mesh(radius: f32, segments: u32, rings: u32) -> (Vec<Vertex>, Vec<Index>) {
    let mut vertices = Vec::new();
    let mut indices = Vec::new();

    // Z is up: rings run from the north pole to the south pole
    for ring in 0..=rings {
        let theta = PI * ring as f32 / rings as f32;
        let z = theta.cos();
        let ring_radius = theta.sin();

        for segment in 0..=segments {
            let phi = 2.0 * PI * segment as f32 / segments as f32;
            let normal = [ring_radius * phi.cos(), ring_radius * phi.sin(), z];
            let pos = normal.map(|c| c * radius);
            vertices.push(v(pos, normal));
        }
    }

    for ring in 0..rings {
        for segment in 0..segments {
            let current = (ring * (segments + 1) + segment) as Index;
            let next = current + segments as Index + 1;

            indices.extend_from_slice(&[current, next, current + 1]);
            indices.extend_from_slice(&[current + 1, next, next + 1]);
        }
    }

    (vertices, indices)
}

/// A cube of edge `size` whose faces are split into `divisions`² quads, so
/// it can be morphed into a sphere.
pub fn subdivided_cube_mesh(size: f32, divisions: u32) -> (Vec<Vertex>, Vec<Index>) {
    let half = size / 2.0;
    // (normal, u axis, v axis) for each face, u x v = normal
    let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0, 0.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0]),
    ];

    let mut vertices = Vec::new();
    let mut indices = Vec::new();
    let row = divisions + 1;

    for (normal, u_axis, v_axis) in faces {
        let base = vertices.len() as Index;
        for j in 0..=divisions {
            for i in 0..=divisions {
                let s = -half + size * i as f32 / divisions as f32;
                let t = -half + size * j as f32 / divisions as f32;
                let pos = [0, 1, 2].map(|k| normal[k] * half + u_axis[k] * s + v_axis[k] * t);
                vertices.push(v(pos, normal));
            }
        }
        for j in 0..divisions {
            for i in 0..divisions {
                let a = base + (j * row + i) as Index;
                let b = a + 1;
                let c = a + row as Index;
                let d = c + 1;
                indices.extend_from_slice(&[a, b, d, a, d, c]);
            }
        }
    }

    (vertices, indices)
}

pub fn cube_mesh(size: f32) -> (Vec<Vertex>, Vec<Index>) {
    subdivided_cube_mesh(size, 1)
}

/// A square of edge `size` in the z = 0 plane, facing +Z.
pub fn plane_mesh(size: f32) -> (Vec<Vertex>, Vec<Index>) {
    let h = size / 2.0;
    let n = [0.0, 0.0, 1.0];
    let vertices = vec![
        v([-h, -h, 0.0], n),
        v([h, -h, 0.0], n),
        v([h, h, 0.0], n),
        v([-h, h, 0.0], n),
    ];
    (vertices, vec![0, 1, 2, 0, 2, 3])
}

/// An open cylinder along +Z from 0 to `height`. The upper half follows
/// bone 0, the lower half bone 1, blended over a band around the middle.
pub fn skinned_cylinder_mesh(
    radius: f32,
    height: f32,
    segments: u32,
    stacks: u32,
) -> (Vec<SkinningVertex>, Vec<Index>) {
    let mut vertices = Vec::new();
    let mut indices = Vec::new();

    for stack in 0..=stacks {
        let t = stack as f32 / stacks as f32;
        let z = height * t;
        let upper = ((t - 0.35) / 0.3).clamp(0.0, 1.0);
        for segment in 0..=segments {
            let phi = 2.0 * PI * segment as f32 / segments as f32;
            let (sin, cos) = phi.sin_cos();
            vertices.push(SkinningVertex {
                pos: [radius * cos, radius * sin, z],
                normal: [cos, sin, 0.0],
                weights: [upper, 1.0 - upper],
            });
        }
    }

    for stack in 0..stacks {
        for segment in 0..segments {
            let current = (stack * (segments + 1) + segment) as Index;
            let next = current + segments as Index + 1;
            indices.extend_from_slice(&[current, current + 1, next]);
            indices.extend_from_slice(&[current + 1, next + 1, next]);
        }
    }

    (vertices, indices)
}

/// Two triangles covering clip space, with texture coordinates that put
/// texel (0, 0) at the top-left corner.
pub fn fullscreen_quad_mesh() -> (Vec<TexturedVertex>, Vec<Index>) {
    let vertices = vec![
        TexturedVertex { pos: [-1.0, -1.0, 0.0], uv: [0.0, 1.0] },
        TexturedVertex { pos: [1.0, -1.0, 0.0], uv: [1.0, 1.0] },
        TexturedVertex { pos: [1.0, 1.0, 0.0], uv: [1.0, 0.0] },
        TexturedVertex { pos: [-1.0, 1.0, 0.0], uv: [0.0, 0.0] },
    ];
    (vertices, vec![0, 1, 2, 0, 2, 3])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_indices_in_range(vertex_count: usize, indices: &[Index]) {
        assert_eq!(indices.len() % 3, 0);
        assert!(indices.iter().all(|&i| (i as usize) < vertex_count));
    }

    #[test]
    fn meshes_are_well_formed_triangle_lists() {
        let (v, i) = sphere_mesh(1.0, 16, 8);
        assert_indices_in_range(v.len(), &i);
        let (v, i) = subdivided_cube_mesh(1.0, 4);
        assert_eq!(v.len(), 6 * 25);
        assert_indices_in_range(v.len(), &i);
        let (v, i) = skinned_cylinder_mesh(0.1, 1.0, 12, 6);
        assert_indices_in_range(v.len(), &i);
        let (v, i) = fullscreen_quad_mesh();
        assert_indices_in_range(v.len(), &i);
    }

    #[test]
    fn skin_weights_sum_to_one() {
        let (vertices, _) = skinned_cylinder_mesh(0.1, 1.0, 8, 10);
        for vertex in vertices {
            assert!((vertex.weights[0] + vertex.weights[1] - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn plane_faces_up() {
        let (vertices, _) = plane_mesh(2.0);
        assert_eq!(vertices[0].normal, [0.0, 0.0, 1.0]);
    }
}
