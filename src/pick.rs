// pick.rs — 射线拾取

use glam::{Mat3, Mat4, Quat, Vec2, Vec3};

use crate::scene::{NodeId, SceneDirectory};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    /// `ndc` in `[-1, 1]`, y up. `inv_view_proj` uses the GL depth range.
    pub fn from_ndc(ndc: Vec2, inv_view_proj: Mat4) -> Self {
        let near = inv_view_proj * ndc.extend(-1.0).extend(1.0);
        let far = inv_view_proj * ndc.extend(1.0).extend(1.0);
        let near = near.truncate() / near.w;
        let far = far.truncate() / far.w;
        Self {
            origin: near,
            direction: (far - near).normalize_or(Vec3::NEG_Z),
        }
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub node: NodeId,
    pub distance: f32,
    pub point: Vec3,
    pub normal: Vec3,
}

pub fn ray_intersect_triangle(ray: &Ray, a: Vec3, b: Vec3, c: Vec3) -> Option<f32> {
    let eps = 1.0e-7;
    let edge1 = b - a;
    let edge2 = c - a;
    let pvec = ray.direction.cross(edge2);
    let det = edge1.dot(pvec);
    if det.abs() < eps {
        return None;
    }
    let inv_det = 1.0 / det;
    let tvec = ray.origin - a;
    let u = tvec.dot(pvec) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let qvec = tvec.cross(edge1);
    let v = ray.direction.dot(qvec) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = edge2.dot(qvec) * inv_det;
    if t > eps {
        Some(t)
    } else {
        None
    }
}

/// Hits against visible nodes with opacity above `min_opacity`, nearest
/// first. One hit per node (its closest triangle).
pub fn intersect(scene: &SceneDirectory, ray: &Ray, min_opacity: f32) -> Vec<Hit> {
    let mut hits = Vec::new();
    for (id, node) in scene.iter() {
        if !node.visible || node.opacity <= min_opacity {
            continue;
        }
        let Some(mesh) = &node.mesh else {
            continue;
        };
        let mut best: Option<Hit> = None;
        for [a, b, c] in mesh.triangles() {
            let Some(t) = ray_intersect_triangle(ray, a, b, c) else {
                continue;
            };
            if best.map_or(true, |h| t < h.distance) {
                best = Some(Hit {
                    node: id,
                    distance: t,
                    point: ray.at(t),
                    normal: (b - a).cross(c - a).normalize_or(Vec3::Y),
                });
            }
        }
        hits.extend(best);
    }
    hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    hits
}

/// Orientation whose local +Z points along `normal`, with world Y as up
/// where possible.
pub fn surface_orientation(normal: Vec3) -> Quat {
    let z = normal.normalize_or(Vec3::Y);
    let up = if z.dot(Vec3::Y).abs() > 0.999 { Vec3::Z } else { Vec3::Y };
    let x = up.cross(z).normalize();
    let y = z.cross(x);
    Quat::from_mat3(&Mat3::from_cols(x, y, z)).normalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Mesh, NodeKind, SceneNode};

    fn down_ray(x: f32, z: f32) -> Ray {
        Ray {
            origin: Vec3::new(x, 10.0, z),
            direction: Vec3::NEG_Y,
        }
    }

    fn scene_with_layers() -> SceneDirectory {
        let mut scene = SceneDirectory::new();
        scene.insert(
            SceneNode::new("Floor", NodeKind::Surface, Vec3::ZERO)
                .with_mesh(Mesh::quad(Vec3::ZERO, 10.0, Vec3::Y)),
        );
        scene.insert(
            SceneNode::new("Table", NodeKind::Surface, Vec3::ZERO)
                .with_mesh(Mesh::quad(Vec3::new(0.0, 1.0, 0.0), 1.0, Vec3::Y)),
        );
        scene
    }

    #[test]
    fn hits_sorted_nearest_first() {
        let scene = scene_with_layers();
        let hits = intersect(&scene, &down_ray(0.2, 0.2), 0.2);
        assert_eq!(hits.len(), 2);
        assert_eq!(scene.get(hits[0].node).unwrap().name, "Table");
        assert!((hits[0].point.y - 1.0).abs() < 1e-5);
        assert!((hits[1].distance - 10.0).abs() < 1e-4);
        assert!(hits[0].normal.dot(Vec3::Y) > 0.99);
    }

    #[test]
    fn invisible_and_faded_nodes_are_skipped() {
        let mut scene = scene_with_layers();
        let table = scene.id("Table").unwrap();
        scene.get_mut(table).unwrap().opacity = 0.1;
        assert_eq!(intersect(&scene, &down_ray(0.0, 0.0), 0.2).len(), 1);
        let floor = scene.id("Floor").unwrap();
        scene.get_mut(floor).unwrap().visible = false;
        assert!(intersect(&scene, &down_ray(0.0, 0.0), 0.2).is_empty());
    }

    #[test]
    fn miss_outside_quad() {
        let scene = scene_with_layers();
        let hits = intersect(&scene, &down_ray(5.0, 5.0), 0.2);
        assert_eq!(hits.len(), 1);
        assert_eq!(scene.get(hits[0].node).unwrap().name, "Floor");
        assert!(intersect(&scene, &down_ray(50.0, 0.0), 0.2).is_empty());
    }

    #[test]
    fn ndc_center_ray_follows_view_direction() {
        let view = Mat4::look_at_rh(Vec3::new(0.0, 1.0, 5.0), Vec3::new(0.0, 1.0, 0.0), Vec3::Y);
        let proj = Mat4::perspective_rh_gl(45f32.to_radians(), 1.5, 0.1, 100.0);
        let ray = Ray::from_ndc(Vec2::ZERO, (proj * view).inverse());
        assert!(ray.direction.dot(Vec3::NEG_Z) > 0.999);
        assert!((ray.origin.y - 1.0).abs() < 1e-4);
    }

    #[test]
    fn orientation_points_z_along_normal() {
        for normal in [Vec3::Y, Vec3::X, Vec3::new(0.3, 0.2, -0.9).normalize(), Vec3::NEG_Y] {
            let q = surface_orientation(normal);
            assert!((q * Vec3::Z).dot(normal) > 0.999, "{normal:?}");
        }
    }
}
