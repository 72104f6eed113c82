// ==============================================================================
// collision.rs — STATIC COLLISION WORLD + RAY QUERY CONTRACT
// ------------------------------------------------------------------------------
// The controller only ever asks one question of the world: "what is the nearest
// surface along this ray?". That question is the RayCaster trait.
//
// CollisionWorld is the concrete service: a rapier ColliderSet of fixed
// triangle meshes plus a QueryPipeline. Each registered mesh carries a
// SurfaceProperties record that decides which layers it lives on:
// - GROUP_GROUND: eligible as a ground / overpass contact
// - GROUP_WALL:   eligible as a forward obstruction
//
// Geometry is registered once, after assets finish loading, through
// register_static_geometry(). Malformed meshes are skipped and reported back as
// GeometryWarning values instead of aborting the simulation.
// ==============================================================================

use std::collections::HashMap;

use nalgebra::{Point3, Vector3};
use rapier3d::prelude::*;
use tracing::{debug, warn};

use crate::error::GeometryWarning;

const GROUP_GROUND: Group = Group::from_bits_truncate(0b0001);
const GROUP_WALL: Group = Group::from_bits_truncate(0b0010);

/// Surfaces whose wall tolerance is not overridden accept hits with
/// `|normal.y|` up to this value as walls.
pub const DEFAULT_WALL_TOLERANCE: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub u32);

/// Physics policy attached to a collision primitive at registration time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceProperties {
    pub rideable: bool,       // can support the vehicle (floor, ramp, bridge deck)
    pub wall: bool,           // can stop the vehicle head-on
    pub wall_tolerance: f32,  // max |normal.y| still counted as a wall
}

impl SurfaceProperties {
    /// Road, terrain, bridge decks.
    pub const ROAD: Self = Self { rideable: true, wall: false, wall_tolerance: DEFAULT_WALL_TOLERANCE };

    /// Barriers, buildings.
    pub const BARRIER: Self = Self { rideable: false, wall: true, wall_tolerance: DEFAULT_WALL_TOLERANCE };

    /// Map geometry that is both driven on and bumped into.
    pub const SOLID: Self = Self { rideable: true, wall: true, wall_tolerance: DEFAULT_WALL_TOLERANCE };

    /// Invisible safety floor / interior ceilings: never ground, never wall.
    pub const IGNORED: Self = Self { rideable: false, wall: false, wall_tolerance: 0.0 };

    pub fn with_wall_tolerance(mut self, tolerance: f32) -> Self {
        self.wall_tolerance = tolerance;
        self
    }

    fn groups(&self) -> Group {
        let mut groups = Group::empty();
        if self.rideable {
            groups |= GROUP_GROUND;
        }
        if self.wall {
            groups |= GROUP_WALL;
        }
        groups
    }
}

/// Which slice of the world a query is interested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RayLayer {
    Ground,
    Wall,
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub point: Point3<f32>,
    pub distance: f32,
    pub normal: Vector3<f32>,
    pub surface_id: SurfaceId,
    pub surface: SurfaceProperties,
}

/// Nearest-hit ray query. Implementations must return the closest hit along the
/// ray within `max_distance`, or `None`.
pub trait RayCaster {
    fn cast_ray(
        &self,
        origin: Point3<f32>,
        direction: Vector3<f32>,
        max_distance: f32,
        layer: RayLayer,
    ) -> Option<RayHit>;
}

/// One static triangle mesh as handed over by the asset loader.
#[derive(Debug, Clone)]
pub struct StaticMesh {
    pub name: String,
    pub vertices: Vec<Point3<f32>>,
    pub indices: Vec<[u32; 3]>,
    pub surface: SurfaceProperties,
}

impl StaticMesh {
    pub fn new(
        name: impl Into<String>,
        vertices: Vec<Point3<f32>>,
        indices: Vec<[u32; 3]>,
        surface: SurfaceProperties,
    ) -> Self {
        Self { name: name.into(), vertices, indices, surface }
    }

    /// Horizontal rectangle at height `y` spanning `[min_x, max_x] x [min_z, max_z]`.
    pub fn floor(
        name: impl Into<String>,
        y: f32,
        (min_x, max_x): (f32, f32),
        (min_z, max_z): (f32, f32),
        surface: SurfaceProperties,
    ) -> Self {
        let vertices = vec![
            Point3::new(min_x, y, min_z),
            Point3::new(max_x, y, min_z),
            Point3::new(max_x, y, max_z),
            Point3::new(min_x, y, max_z),
        ];
        Self::new(name, vertices, vec![[0, 2, 1], [0, 3, 2]], surface)
    }

    /// Vertical rectangle from `a` to `b` (ground-plane endpoints) between
    /// heights `bottom` and `top`.
    pub fn wall(
        name: impl Into<String>,
        a: (f32, f32),
        b: (f32, f32),
        bottom: f32,
        top: f32,
        surface: SurfaceProperties,
    ) -> Self {
        let vertices = vec![
            Point3::new(a.0, bottom, a.1),
            Point3::new(b.0, bottom, b.1),
            Point3::new(b.0, top, b.1),
            Point3::new(a.0, top, a.1),
        ];
        Self::new(name, vertices, vec![[0, 1, 2], [0, 2, 3]], surface)
    }

    fn check(&self) -> Result<(), GeometryWarning> {
        if self.indices.is_empty() || self.vertices.is_empty() {
            return Err(GeometryWarning::Empty { name: self.name.clone() });
        }
        if let Some(vertex) = self
            .vertices
            .iter()
            .position(|p| !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite()))
        {
            return Err(GeometryWarning::NonFiniteVertex { name: self.name.clone(), vertex });
        }
        for (triangle, tri) in self.indices.iter().enumerate() {
            if let Some(&index) = tri.iter().find(|&&i| i as usize >= self.vertices.len()) {
                return Err(GeometryWarning::IndexOutOfRange {
                    name: self.name.clone(),
                    triangle,
                    index,
                    vertex_count: self.vertices.len(),
                });
            }
        }
        Ok(())
    }
}

struct SurfaceRecord {
    id: SurfaceId,
    name: String,
    properties: SurfaceProperties,
}

pub struct CollisionWorld {
    bodies: RigidBodySet,             // stays empty; the query API wants one
    colliders: ColliderSet,           // fixed trimesh colliders only
    query_pipeline: QueryPipeline,    // rebuilt after each registration batch
    surfaces: HashMap<ColliderHandle, SurfaceRecord>,
    next_surface: u32,
}

impl Default for CollisionWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl CollisionWorld {
    pub fn new() -> Self {
        Self {
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            query_pipeline: QueryPipeline::new(),
            surfaces: HashMap::new(),
            next_surface: 0,
        }
    }

    /// Insert a batch of static meshes. Returns one warning per rejected mesh.
    pub fn register_static_geometry(
        &mut self,
        meshes: impl IntoIterator<Item = StaticMesh>,
    ) -> Vec<GeometryWarning> {
        let mut warnings = Vec::new();

        for mesh in meshes {
            if let Err(warning) = mesh.check() {
                warn!("skipping collision mesh: {warning}");
                warnings.push(warning);
                continue;
            }

            let memberships = mesh.surface.groups();
            let collider = ColliderBuilder::trimesh(mesh.vertices, mesh.indices)
                .collision_groups(InteractionGroups::new(memberships, Group::ALL))
                .build();
            let handle = self.colliders.insert(collider);

            let id = SurfaceId(self.next_surface);
            self.next_surface += 1;
            debug!("registered surface {:?} `{}` ({:?})", id, mesh.name, mesh.surface);

            self.surfaces.insert(handle, SurfaceRecord {
                id,
                name: mesh.name,
                properties: mesh.surface,
            });
        }

        self.query_pipeline.update(&self.colliders);
        warnings
    }

    pub fn surface_count(&self) -> usize {
        self.surfaces.len()
    }

    pub fn surface_name(&self, id: SurfaceId) -> Option<&str> {
        self.surfaces
            .values()
            .find(|record| record.id == id)
            .map(|record| record.name.as_str())
    }

    fn filter_for(layer: RayLayer) -> QueryFilter<'static> {
        let groups = match layer {
            RayLayer::Ground => InteractionGroups::new(Group::ALL, GROUP_GROUND),
            RayLayer::Wall => InteractionGroups::new(Group::ALL, GROUP_WALL),
            RayLayer::Any => InteractionGroups::all(),
        };
        QueryFilter::default().groups(groups)
    }
}

impl RayCaster for CollisionWorld {
    fn cast_ray(
        &self,
        origin: Point3<f32>,
        direction: Vector3<f32>,
        max_distance: f32,
        layer: RayLayer,
    ) -> Option<RayHit> {
        let dir = direction.try_normalize(1e-6)?;
        let ray = Ray::new(origin, dir);

        let (handle, hit) = self.query_pipeline.cast_ray_and_get_normal(
            &self.bodies,
            &self.colliders,
            &ray,
            max_distance,
            true,
            Self::filter_for(layer),
        )?;

        let record = self.surfaces.get(&handle)?;
        let distance = hit.time_of_impact;

        Some(RayHit {
            point: ray.point_at(distance),
            distance,
            normal: hit.normal,
            surface_id: record.id,
            surface: record.properties,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_world() -> CollisionWorld {
        let mut world = CollisionWorld::new();
        let warnings = world.register_static_geometry([
            StaticMesh::floor("road", 0.0, (-50.0, 50.0), (-50.0, 50.0), SurfaceProperties::ROAD),
            StaticMesh::wall("barrier", (-10.0, -20.0), (10.0, -20.0), -1.0, 5.0, SurfaceProperties::BARRIER),
        ]);
        assert!(warnings.is_empty());
        world
    }

    #[test]
    fn ground_ray_reports_nearest_hit() {
        let world = flat_world();
        let hit = world
            .cast_ray(Point3::new(0.0, 3.0, 0.0), -Vector3::y(), 10.0, RayLayer::Ground)
            .expect("floor below");

        assert!((hit.distance - 3.0).abs() < 1e-4);
        assert!(hit.point.y.abs() < 1e-4);
        assert!(hit.normal.y.abs() > 0.99);
        assert!(hit.surface.rideable);
    }

    #[test]
    fn layers_filter_surfaces() {
        let world = flat_world();
        let origin = Point3::new(0.0, 1.0, 0.0);

        assert!(world.cast_ray(origin, -Vector3::z(), 50.0, RayLayer::Ground).is_none());
        let wall = world
            .cast_ray(origin, -Vector3::z(), 50.0, RayLayer::Wall)
            .expect("barrier ahead");
        assert!((wall.distance - 20.0).abs() < 1e-4);
        assert!(world.cast_ray(origin, -Vector3::y(), 0.5, RayLayer::Any).is_none());
    }

    #[test]
    fn malformed_meshes_are_skipped_with_warnings() {
        let mut world = CollisionWorld::new();
        let warnings = world.register_static_geometry([
            StaticMesh::new("empty", vec![], vec![], SurfaceProperties::ROAD),
            StaticMesh::new(
                "dangling",
                vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0)],
                vec![[0, 1, 7]],
                SurfaceProperties::ROAD,
            ),
            StaticMesh::floor("ok", 0.0, (-1.0, 1.0), (-1.0, 1.0), SurfaceProperties::ROAD),
        ]);

        assert_eq!(warnings.len(), 2);
        assert!(matches!(warnings[1], GeometryWarning::IndexOutOfRange { index: 7, .. }));
        assert_eq!(world.surface_count(), 1);
        assert_eq!(world.surface_name(SurfaceId(0)), Some("ok"));
    }

    #[test]
    fn empty_world_never_hits() {
        let world = CollisionWorld::new();
        assert!(world
            .cast_ray(Point3::origin(), -Vector3::y(), 1_000.0, RayLayer::Any)
            .is_none());
    }
}
