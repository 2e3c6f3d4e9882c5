use glam::Vec3;

/// One emitted triangle, vertices in winding order.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Triangle {
    pub a: Vec3,
    pub b: Vec3,
    pub c: Vec3,
}

impl Triangle {
    pub fn new(a: Vec3, b: Vec3, c: Vec3) -> Self {
        Self { a, b, c }
    }
}

/// Accumulates triangles emitted by the patches of one subtree and turns
/// them into flat vertex/index buffers for the rendering backend.
#[derive(Clone, Debug, Default)]
pub struct TriangleBuffer {
    triangles: Vec<Triangle>,
}

impl TriangleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, triangle: Triangle) {
        self.triangles.push(triangle);
    }

    pub fn clear(&mut self) {
        self.triangles.clear();
    }

    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    /// Appends this buffer's triangles to flat output arrays. Three
    /// consecutive indices form one triangle; vertices are not shared.
    pub fn append_to(&self, vertices: &mut Vec<Vec3>, indices: &mut Vec<u32>) {
        for triangle in &self.triangles {
            let base = vertices.len() as u32;
            vertices.push(triangle.a);
            vertices.push(triangle.b);
            vertices.push(triangle.c);
            indices.push(base);
            indices.push(base + 1);
            indices.push(base + 2);
        }
    }
}

/// Flat per-frame mesh output.
#[derive(Clone, Debug, Default)]
pub struct MeshBuffers {
    pub vertices: Vec<Vec3>,
    pub indices: Vec<u32>,
}

impl MeshBuffers {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_produces_three_indices_per_triangle() {
        let mut buffer = TriangleBuffer::new();
        buffer.push(Triangle::new(Vec3::ZERO, Vec3::X, Vec3::Z));
        buffer.push(Triangle::new(Vec3::X, Vec3::Y, Vec3::Z));

        let mut vertices = Vec::new();
        let mut indices = Vec::new();
        buffer.append_to(&mut vertices, &mut indices);

        assert_eq!(vertices.len(), 6);
        assert_eq!(indices, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(vertices[1], Vec3::X);
    }
}
