// mesh.rs — tessellates a projection surface into textured quad strips

use std::f32::consts::TAU;

use crate::projection::Surface;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

/// One latitude band. Vertices alternate lower edge / upper edge for each
/// azimuth step, the way a GL quad strip is fed.
#[derive(Debug, Clone, PartialEq)]
pub struct QuadStrip {
    pub vertices: Vec<Vertex>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SurfaceMesh {
    pub strips: Vec<QuadStrip>,
}

impl SurfaceMesh {
    pub fn vertex_count(&self) -> usize {
        self.strips.iter().map(|s| s.vertices.len()).sum()
    }

    /// All strip vertices back to back, ready for a vertex buffer.
    pub fn vertices(&self) -> Vec<Vertex> {
        let mut out = Vec::with_capacity(self.vertex_count());
        for strip in &self.strips {
            out.extend_from_slice(&strip.vertices);
        }
        out
    }

    /// Triangle-list indices into [`SurfaceMesh::vertices`], two triangles per quad.
    pub fn triangle_indices(&self) -> Vec<u32> {
        let mut indices = Vec::new();
        let mut base = 0u32;
        for strip in &self.strips {
            let pairs = (strip.vertices.len() / 2) as u32;
            for j in 0..pairs.saturating_sub(1) {
                let a = base + 2 * j;
                let b = a + 1;
                indices.extend_from_slice(&[
                    a, b, a + 2,
                    b, b + 2, a + 2,
                ]);
            }
            base += strip.vertices.len() as u32;
        }
        indices
    }
}

/// Builds `rings` bands in polar angle and `sectors` steps in azimuth over the
/// surface's θ range. Deterministic for a given surface and tessellation.
pub fn generate_mesh(surface: &Surface, radius: f32, rings: usize, sectors: usize) -> SurfaceMesh {
    if rings == 0 || sectors == 0 {
        return SurfaceMesh::default();
    }

    let (theta_min, theta_max) = surface.theta_range();
    let theta_at = |ring: usize| theta_min + (theta_max - theta_min) * ring as f32 / rings as f32;

    let mut strips = Vec::with_capacity(rings);
    for r in 0..rings {
        let theta1 = theta_at(r);
        let theta2 = theta_at(r + 1);

        let mut vertices = Vec::with_capacity(2 * (sectors + 1));
        for s in 0..=sectors {
            let phi = TAU * s as f32 / sectors as f32;
            for theta in [theta1, theta2] {
                vertices.push(Vertex {
                    position: surface.position(theta, phi, radius).to_array(),
                    uv: surface.tex_coord(theta, phi).to_array(),
                });
            }
        }
        strips.push(QuadStrip { vertices });
    }

    SurfaceMesh { strips }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::SURFACE_RADIUS;
    use approx::assert_abs_diff_eq;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn tessellation_counts() {
        let mesh = generate_mesh(&Surface::Sphere, 1.0, 4, 8);
        assert_eq!(mesh.strips.len(), 4);
        assert!(mesh.strips.iter().all(|s| s.vertices.len() == 18));
        assert_eq!(mesh.vertex_count(), 72);
        assert_eq!(mesh.triangle_indices().len(), 4 * 8 * 6);
    }

    #[test]
    fn indices_stay_in_bounds() {
        let mesh = generate_mesh(&Surface::Morph { sphericity: 0.3 }, 2.0, 5, 7);
        let count = mesh.vertex_count() as u32;
        assert!(mesh.triangle_indices().iter().all(|&i| i < count));
    }

    #[test]
    fn top_of_image_maps_to_top_of_surface() {
        let mesh = generate_mesh(&Surface::Sphere, SURFACE_RADIUS, 8, 16);
        let top = mesh.strips.last().unwrap().vertices[1];
        assert_abs_diff_eq!(top.uv[1], 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(top.position[1], SURFACE_RADIUS, epsilon = 1e-5);

        let bottom = mesh.strips[0].vertices[0];
        assert_abs_diff_eq!(bottom.uv[1], 1.0);
        assert_abs_diff_eq!(bottom.position[1], -SURFACE_RADIUS, epsilon = 1e-5);
    }

    #[test]
    fn cylinder_height_matches_sphere_arc_length() {
        let mesh = generate_mesh(&Surface::Cylinder, 2.0, 4, 4);
        let top = mesh.strips.last().unwrap().vertices[1];
        assert_abs_diff_eq!(top.position[1], 2.0 * FRAC_PI_2, epsilon = 1e-5);
        let radial = (top.position[0].powi(2) + top.position[2].powi(2)).sqrt();
        assert_abs_diff_eq!(radial, 2.0, epsilon = 1e-5);
    }

    #[test]
    fn clamped_sphere_spans_the_full_texture() {
        let theta_max = 60f32.to_radians();
        let mesh = generate_mesh(&Surface::SphereClamp { theta_max }, 1.0, 6, 6);
        let top = mesh.strips.last().unwrap().vertices[1];
        assert_abs_diff_eq!(top.uv[1], 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(top.position[1], theta_max.sin(), epsilon = 1e-5);
    }

    #[test]
    fn morph_extremes_match_pure_surfaces() {
        let sphere = generate_mesh(&Surface::Sphere, 1.0, 3, 5);
        let morph = generate_mesh(&Surface::Morph { sphericity: 1.0 }, 1.0, 3, 5);
        for (a, b) in sphere.vertices().iter().zip(morph.vertices()) {
            for k in 0..3 {
                assert_abs_diff_eq!(a.position[k], b.position[k], epsilon = 1e-6);
            }
            assert_eq!(a.uv, b.uv);
        }

        let cylinder = generate_mesh(&Surface::Cylinder, 1.0, 3, 5);
        let morph = generate_mesh(&Surface::Morph { sphericity: 0.0 }, 1.0, 3, 5);
        for (a, b) in cylinder.vertices().iter().zip(morph.vertices()) {
            for k in 0..3 {
                assert_abs_diff_eq!(a.position[k], b.position[k], epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn empty_tessellation_gives_empty_mesh() {
        assert!(generate_mesh(&Surface::Sphere, 1.0, 0, 8).strips.is_empty());
        assert!(generate_mesh(&Surface::Sphere, 1.0, 8, 0).strips.is_empty());
    }
}
