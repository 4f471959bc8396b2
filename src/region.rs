//! Static polygon region data.
//!
//! The region is an ordered list of faces, two vertices plus an outward
//! normal each. It is uploaded once and consumed read-only by both the
//! compute shader (containment test during advection) and the render
//! pipeline (outline drawing), so the vertex layout has to serve double duty
//! as a storage-buffer struct and a vertex-attribute stride.

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec4};

/// One endpoint of a polygon face. `position.w == 1`, `normal.w == 0`.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct SurfaceVertex {
    pub position: Vec4,
    pub normal: Vec4,
}

impl SurfaceVertex {
    pub const SIZE: usize = std::mem::size_of::<SurfaceVertex>();

    fn new(position: Vec2, normal: Vec2) -> Self {
        Self {
            position: Vec4::new(position.x, position.y, 0.0, 1.0),
            normal: Vec4::new(normal.x, normal.y, 0.0, 0.0),
        }
    }
}

/// One face of the polygon region: an edge with a shared outward normal.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct PolygonFace {
    pub start: SurfaceVertex,
    pub end: SurfaceVertex,
}

impl PolygonFace {
    pub fn new(p1: Vec2, p2: Vec2) -> Self {
        let normal = rotate_neg_90(p2 - p1);
        Self {
            start: SurfaceVertex::new(p1, normal),
            end: SurfaceVertex::new(p2, normal),
        }
    }
}

/// Rotate a 2D vector by -90 degrees.
///
/// Walking the polygon counter-clockwise, this turns each edge vector into
/// that edge's outward normal.
fn rotate_neg_90(v: Vec2) -> Vec2 {
    Vec2::new(v.y, -v.x)
}

/// The demo scene's polygon: a squat trapezoid-ish quad centered on the
/// window-space origin.
pub fn demo_region() -> Vec<PolygonFace> {
    let p1 = Vec2::new(-0.5, -0.75);
    let p2 = Vec2::new(0.5, -0.75);
    let p3 = Vec2::new(0.75, 0.5);
    let p4 = Vec2::new(-0.75, 0.5);

    vec![
        PolygonFace::new(p1, p2),
        PolygonFace::new(p2, p3),
        PolygonFace::new(p3, p4),
        PolygonFace::new(p4, p1),
    ]
}

/// Raw bytes for the one-time face buffer upload.
pub fn face_bytes(faces: &[PolygonFace]) -> &[u8] {
    bytemuck::cast_slice(faces)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_layout() {
        // Two vec4s per vertex, two vertices per face.
        assert_eq!(SurfaceVertex::SIZE, 32);
        assert_eq!(std::mem::size_of::<PolygonFace>(), 64);
    }

    #[test]
    fn test_demo_region_face_count() {
        assert_eq!(demo_region().len(), 4);
    }

    #[test]
    fn test_normals_perpendicular_to_edges() {
        for face in demo_region() {
            let edge = face.end.position - face.start.position;
            let n = face.start.normal;
            let dot = edge.x * n.x + edge.y * n.y;
            assert!(dot.abs() < 1e-6);
            assert_eq!(face.start.normal, face.end.normal);
        }
    }

    #[test]
    fn test_normals_point_outward() {
        // The origin is inside the demo polygon, so from every face's start
        // vertex the origin must sit on the inner (negative) side.
        for face in demo_region() {
            let to_origin = -face.start.position;
            let n = face.start.normal;
            let dot = to_origin.x * n.x + to_origin.y * n.y;
            assert!(dot < 0.0);
        }
    }
}
