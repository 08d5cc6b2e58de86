//! Arrow primitive entities
//!
//! Every arrow in [`MarkerArrows`] is mirrored into a root entity carrying
//! the marker pose, with a shaft cylinder and a head cone as children. The
//! arrow's long axis is the root's local -Z, matching the core geometry.

use bevy::prelude::*;
use quiver_core::{ArrowDimensions, ArrowHandle, ArrowState, ArrowStore, MarkerId};
use std::collections::HashMap;
use std::f32::consts::FRAC_PI_2;

/// Arrow primitives as plain data; systems write here, the sync system renders
#[derive(Resource, Default, Deref, DerefMut)]
pub struct MarkerArrows(pub ArrowStore);

/// Shared unit meshes for shafts and heads
#[derive(Resource)]
pub struct ArrowMeshes {
    pub shaft: Handle<Mesh>,
    pub head: Handle<Mesh>,
}

/// Root entity of a rendered arrow
#[derive(Component, Debug, Clone)]
pub struct ArrowEntity {
    pub handle: ArrowHandle,
    pub owner: MarkerId,
    pub selectable: bool,
}

/// Marker component for shaft cylinders
#[derive(Component)]
pub struct ArrowShaft;

/// Marker component for head cones
#[derive(Component)]
pub struct ArrowHead;

/// Entities spawned for one arrow handle
pub struct SpawnedArrow {
    root: Entity,
    shaft: Entity,
    head: Entity,
    material: Handle<StandardMaterial>,
    revision: u64,
}

pub fn setup_arrow_meshes(mut commands: Commands, mut meshes: ResMut<Assets<Mesh>>) {
    commands.insert_resource(ArrowMeshes {
        shaft: meshes.add(Cylinder::new(1.0, 1.0)),
        head: meshes.add(Cone {
            radius: 1.0,
            height: 1.0,
        }),
    });
}

/// Root transform: marker pose plus whole-arrow scale
///
/// Message scale is (length, width, height) in the pose frame. The root's
/// local Z is the length axis and local X the height axis, so x and z swap.
pub fn root_transform(state: &ArrowState) -> Transform {
    let p = state.position;
    let q = state.orientation;
    let s = state.scale;
    Transform {
        translation: Vec3::new(p.x as f32, p.y as f32, p.z as f32),
        rotation: Quat::from_xyzw(q.x as f32, q.y as f32, q.z as f32, q.w as f32).normalize(),
        scale: Vec3::new(s.z as f32, s.y as f32, s.x as f32),
    }
}

/// Rotation taking the mesh's +Y axis onto the arrow's -Z axis
fn mesh_to_arrow_axis() -> Quat {
    Quat::from_rotation_x(-FRAC_PI_2)
}

/// Shaft cylinder, from the tail to the start of the head
pub fn shaft_transform(dimensions: &ArrowDimensions) -> Transform {
    let length = dimensions.shaft_length as f32;
    let radius = dimensions.shaft_radius as f32;
    Transform {
        translation: Vec3::new(0.0, 0.0, -length / 2.0),
        rotation: mesh_to_arrow_axis(),
        scale: Vec3::new(radius, length, radius),
    }
}

/// Head cone, from the end of the shaft to the tip
pub fn head_transform(dimensions: &ArrowDimensions) -> Transform {
    let shaft = dimensions.shaft_length as f32;
    let length = dimensions.head_length as f32;
    let radius = dimensions.head_radius as f32;
    Transform {
        translation: Vec3::new(0.0, 0.0, -(shaft + length / 2.0)),
        rotation: mesh_to_arrow_axis(),
        scale: Vec3::new(radius, length, radius),
    }
}

fn arrow_material(state: &ArrowState) -> StandardMaterial {
    let [r, g, b, a] = state.color.to_array();
    StandardMaterial {
        base_color: Color::srgba(r, g, b, a),
        alpha_mode: if a < 1.0 {
            AlphaMode::Blend
        } else {
            AlphaMode::Opaque
        },
        ..default()
    }
}

/// Mirror [`MarkerArrows`] into entities
pub fn sync_arrow_entities(
    mut commands: Commands,
    mut arrows: ResMut<MarkerArrows>,
    meshes: Res<ArrowMeshes>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut spawned: Local<HashMap<ArrowHandle, SpawnedArrow>>,
    mut transforms: Query<&mut Transform>,
    mut roots: Query<&mut ArrowEntity>,
) {
    for handle in arrows.drain_removed() {
        if let Some(arrow) = spawned.remove(&handle) {
            commands.entity(arrow.root).despawn();
            materials.remove(&arrow.material);
        }
    }

    for (handle, state) in arrows.iter() {
        match spawned.get_mut(handle) {
            Some(arrow) if arrow.revision == state.revision => {}
            Some(arrow) => {
                for (entity, transform) in [
                    (arrow.root, root_transform(state)),
                    (arrow.shaft, shaft_transform(&state.dimensions)),
                    (arrow.head, head_transform(&state.dimensions)),
                ] {
                    if let Ok(mut current) = transforms.get_mut(entity) {
                        *current = transform;
                    }
                }
                if let Ok(mut root) = roots.get_mut(arrow.root) {
                    root.owner = state.owner.clone();
                    root.selectable = state.selectable;
                }
                if let Some(material) = materials.get_mut(&arrow.material) {
                    *material = arrow_material(state);
                }
                arrow.revision = state.revision;
            }
            None => {
                let material = materials.add(arrow_material(state));
                let shaft = commands
                    .spawn((
                        Mesh3d(meshes.shaft.clone()),
                        MeshMaterial3d(material.clone()),
                        shaft_transform(&state.dimensions),
                        ArrowShaft,
                    ))
                    .id();
                let head = commands
                    .spawn((
                        Mesh3d(meshes.head.clone()),
                        MeshMaterial3d(material.clone()),
                        head_transform(&state.dimensions),
                        ArrowHead,
                    ))
                    .id();
                let root = commands
                    .spawn((
                        root_transform(state),
                        Visibility::Inherited,
                        ArrowEntity {
                            handle: *handle,
                            owner: state.owner.clone(),
                            selectable: state.selectable,
                        },
                    ))
                    .id();
                commands.entity(root).add_child(shaft);
                commands.entity(root).add_child(head);

                tracing::debug!(%handle, owner = %state.owner, "Spawned arrow entity");
                spawned.insert(
                    *handle,
                    SpawnedArrow {
                        root,
                        shaft,
                        head,
                        material,
                        revision: state.revision,
                    },
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiver_core::{ArrowScene, ColorRgba};

    fn two_point_state() -> ArrowState {
        let mut store = ArrowStore::new();
        let handle = store.create_arrow(&MarkerId::new("test", 1));
        store.set_dimensions(
            &handle,
            ArrowDimensions {
                shaft_length: 9.0,
                shaft_radius: 0.1,
                head_length: 1.0,
                head_radius: 0.2,
            },
        );
        store.set_color(&handle, ColorRgba::new(1.0, 0.0, 0.0, 0.5));
        store.get(&handle).cloned().unwrap()
    }

    #[test]
    fn test_shaft_and_head_run_along_negative_z() {
        let state = two_point_state();
        let shaft = shaft_transform(&state.dimensions);
        let head = head_transform(&state.dimensions);

        // top of the unit cylinder lands where the head starts
        let shaft_end = shaft.transform_point(Vec3::new(0.0, 0.5, 0.0));
        assert!(shaft_end.abs_diff_eq(Vec3::new(0.0, 0.0, -9.0), 1e-5));

        // cone apex is the arrow tip
        let tip = head.transform_point(Vec3::new(0.0, 0.5, 0.0));
        assert!(tip.abs_diff_eq(Vec3::new(0.0, 0.0, -10.0), 1e-5));

        assert!((shaft.scale.x - 0.1).abs() < 1e-6);
        assert!((head.scale.x - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_root_transform_swaps_length_axis() {
        let mut state = two_point_state();
        state.scale = glam::DVec3::new(2.0, 0.5, 0.25);
        state.position = glam::DVec3::new(1.0, 2.0, 3.0);

        let root = root_transform(&state);
        assert_eq!(root.translation, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(root.scale, Vec3::new(0.25, 0.5, 2.0));
    }

    #[test]
    fn test_translucent_material() {
        let state = two_point_state();
        let material = arrow_material(&state);
        assert!(matches!(material.alpha_mode, AlphaMode::Blend));
    }
}
