use kiln_render_interface::vertex::Vertex;

/// CPU-side geometry, `u32` indices, counter-clockwise front faces.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Appends a quad spanned by `u` and `v` around `center`, facing `normal`.
    fn push_face(&mut self, center: glam::Vec3, u: glam::Vec3, v: glam::Vec3, normal: glam::Vec3) {
        let base = self.vertices.len() as u32;
        let corners = [(-1.0, -1.0, [0.0, 1.0]), (1.0, -1.0, [1.0, 1.0]), (1.0, 1.0, [1.0, 0.0]), (-1.0, 1.0, [0.0, 0.0])];
        for (su, sv, uv) in corners {
            let position = center + u * su + v * sv;
            self.vertices.push(Vertex::new(position.to_array(), normal.to_array(), uv));
        }
        self.indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    /// Unit cube centered at the origin; each face has its own vertices so normals stay flat.
    pub fn cube() -> Self {
        let mut mesh = Self::default();
        let h = 0.5;
        for axis in [glam::Vec3::X, glam::Vec3::Y, glam::Vec3::Z] {
            for sign in [1.0, -1.0] {
                let normal = axis * sign;
                // u x v == normal keeps the winding counter-clockwise seen from outside
                let helper = if normal.y.abs() < 0.9 { glam::Vec3::Y } else { glam::Vec3::Z };
                let u = helper.cross(normal).normalize();
                let v = normal.cross(u);
                mesh.push_face(normal * h, u * h, v * h, normal);
            }
        }
        mesh
    }

    /// Square in the XZ plane facing +Y.
    pub fn ground(half_extent: f32) -> Self {
        let mut mesh = Self::default();
        mesh.push_face(
            glam::Vec3::ZERO,
            glam::Vec3::X * half_extent,
            -glam::Vec3::Z * half_extent,
            glam::Vec3::Y,
        );
        mesh
    }

    #[inline]
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }
}

/// RGBA8 checkerboard, `size` x `size` texels in `cells` x `cells` squares.
pub fn checker_pixels(size: u32, cells: u32, dark: [u8; 4], light: [u8; 4]) -> Vec<u8> {
    let cell = (size / cells.max(1)).max(1);
    let mut pixels = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let texel = if ((x / cell) + (y / cell)) % 2 == 0 { light } else { dark };
            pixels.extend_from_slice(&texel);
        }
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle_normal(mesh: &MeshData, tri: &[u32]) -> glam::Vec3 {
        let p = |i: u32| glam::Vec3::from_array(mesh.vertices[i as usize].position);
        (p(tri[1]) - p(tri[0])).cross(p(tri[2]) - p(tri[0])).normalize()
    }

    #[test]
    fn test_cube_counts_and_bounds() {
        let cube = MeshData::cube();
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.index_count(), 36);
        assert!(cube.indices.iter().all(|i| (*i as usize) < cube.vertices.len()));
        for vertex in &cube.vertices {
            assert!(vertex.position.iter().all(|c| c.abs() <= 0.5 + 1e-6));
        }
    }

    #[test]
    fn test_winding_matches_normals() {
        for mesh in [MeshData::cube(), MeshData::ground(4.0)] {
            for tri in mesh.indices.chunks(3) {
                let expected = glam::Vec3::from_array(mesh.vertices[tri[0] as usize].normal);
                assert!(triangle_normal(&mesh, tri).dot(expected) > 0.99);
            }
        }
    }

    #[test]
    fn test_checker() {
        let pixels = checker_pixels(4, 2, [0, 0, 0, 255], [255; 4]);
        assert_eq!(pixels.len(), 4 * 4 * 4);
        // texel (0,0) light, (2,0) dark, (2,2) light
        assert_eq!(&pixels[0..4], &[255; 4]);
        assert_eq!(&pixels[8..12], &[0, 0, 0, 255]);
        let texel = |x: usize, y: usize| &pixels[(y * 4 + x) * 4..(y * 4 + x) * 4 + 4];
        assert_eq!(texel(2, 2), &[255; 4]);
    }
}
