use std::{f32::consts::FRAC_PI_2, sync::Arc, time::Duration};

use glam::{Quat, Vec3};
use log::{info, warn};
use vitrine_app::{Showroom, ShowroomConfig};
use vitrine_assets::{AssetCatalog, AssetTypeDescriptor, MemoryLoader, SceneData, SceneNode};
use vitrine_core::{
    material::MaterialData,
    mesh::MeshData,
    physics::ColliderKind,
    scene_graph::{Scene, SpotLight},
    transform::Transform,
};
use vitrine_scene::{
    DisplaySwitch, Easing, Flip, HalfwayCallback, PhysicsMode, RotationOptions, SpawnOptions,
};

const FRAME: Duration = Duration::from_micros(16_667);

fn crate_template() -> SceneData {
    let mut data = SceneData::default();
    let root = data.add_node(SceneNode::new("crate"));
    data.add_mesh_node(
        Some(root),
        "body",
        MeshData::cuboid(Vec3::splat(0.5)),
        MaterialData::named("wood").with_base_color([0.6, 0.4, 0.2, 1.0]),
        Transform::IDENTITY,
    );
    data
}

fn ball_template() -> SceneData {
    let mut data = SceneData::default();
    let root = data.add_node(SceneNode::new("ball"));
    data.add_mesh_node(
        Some(root),
        "shell",
        MeshData::cuboid(Vec3::splat(0.3)),
        MaterialData::named("rubber"),
        Transform::IDENTITY,
    );
    data.add_mesh_node(
        Some(root),
        "col_sphere",
        MeshData::cuboid(Vec3::splat(0.3)),
        MaterialData::named("collision"),
        Transform::IDENTITY,
    );
    data
}

fn room_template() -> SceneData {
    let mut data = SceneData::default();
    let root = data.add_node(SceneNode::new("room"));
    data.add_mesh_node(
        Some(root),
        "floor",
        MeshData::cuboid(Vec3::new(10.0, 0.1, 10.0)),
        MaterialData::named("concrete"),
        Transform::from_xyz(0.0, -0.1, 0.0),
    );
    data
}

fn monitor_template() -> SceneData {
    let mut data = SceneData::default();
    let root = data.add_node(SceneNode::new("monitor"));
    data.add_mesh_node(
        Some(root),
        "frame",
        MeshData::cuboid(Vec3::new(0.6, 0.4, 0.05)),
        MaterialData::named("plastic"),
        Transform::IDENTITY,
    );
    data.add_mesh_node(
        Some(root),
        "display_screen",
        MeshData::cuboid(Vec3::new(0.55, 0.35, 0.01)),
        MaterialData::named("screen_off"),
        Transform::from_xyz(0.0, 0.0, 0.05),
    );
    data.add_mesh_node(
        Some(root),
        "activate_power",
        MeshData::cuboid(Vec3::splat(0.03)),
        MaterialData::named("button"),
        Transform::from_xyz(0.5, -0.35, 0.06),
    );
    data
}

fn lamp_template() -> SceneData {
    let mut data = SceneData::default();
    let root = data.add_node(SceneNode::new("lamp"));
    data.add_mesh_node(
        Some(root),
        "shade",
        MeshData::cone(0.2, 0.3, 16),
        MaterialData::named("brass"),
        Transform::IDENTITY,
    );
    data.add_child(
        root,
        SceneNode::new("bulb").with_light(SpotLight {
            color: [1.0, 0.9, 0.7],
            intensity: 4.0,
            range: 6.0,
            target: Vec3::new(0.0, -6.0, 0.0),
            ..Default::default()
        }),
    );
    data
}

fn demo_catalog(loader: &MemoryLoader) -> Result<AssetCatalog, vitrine_assets::AssetError> {
    loader.insert("crate.glb", crate_template());
    loader.insert("ball.glb", ball_template());
    loader.insert("room.glb", room_template());
    loader.insert("monitor.glb", monitor_template());
    loader.insert("lamp.glb", lamp_template());

    AssetCatalog::new()
        .with(
            AssetTypeDescriptor::new("crate", "crate.glb")
                .with_mass(2.0)
                .with_restitution(0.3),
        )?
        .with(
            AssetTypeDescriptor::new("ball", "ball.glb")
                .with_mass(0.5)
                .with_restitution(0.8)
                .with_collider(ColliderKind::Ball),
        )?
        .with(AssetTypeDescriptor::new("room", "room.glb"))?
        .with(AssetTypeDescriptor::new("monitor", "monitor.glb").with_mass(4.0))?
        .with(AssetTypeDescriptor::new("lamp", "lamp.glb").with_mass(1.0))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => ShowroomConfig::from_path(path)?,
        None => ShowroomConfig::default(),
    };

    let loader = Arc::new(MemoryLoader::new().with_latency(Duration::from_millis(5)));
    let catalog = demo_catalog(&loader)?;
    let showroom = Showroom::new(catalog, loader.clone(), config)?;

    let room = showroom
        .spawn(
            "room",
            Vec3::ZERO,
            Quat::IDENTITY,
            SpawnOptions::default().with_physics(PhysicsMode::Fixed),
        )
        .await;

    let (crate_a, crate_b, ball, monitor, lamp) = tokio::join!(
        showroom.spawn("crate", Vec3::new(0.0, 5.0, 0.0), Quat::IDENTITY, SpawnOptions::default()),
        showroom.spawn("crate", Vec3::new(0.2, 7.0, 0.0), Quat::IDENTITY, SpawnOptions::default()),
        showroom.spawn(
            "ball",
            Vec3::new(-1.0, 3.0, 0.5),
            Quat::IDENTITY,
            SpawnOptions::default().revealing_colliders(),
        ),
        showroom.spawn(
            "monitor",
            Vec3::new(2.0, 1.0, -2.0),
            Quat::IDENTITY,
            SpawnOptions::visual_only(),
        ),
        showroom.spawn(
            "lamp",
            Vec3::new(0.0, 3.0, 0.0),
            Quat::IDENTITY,
            SpawnOptions::default().with_physics(PhysicsMode::Kinematic),
        ),
    );
    info!(
        "Spawned room={} crates={}/{} ball={} monitor={} lamp={}, {} template load(s)",
        room.is_some(),
        crate_a.is_some(),
        crate_b.is_some(),
        ball.is_some(),
        monitor.is_some(),
        lamp.is_some(),
        loader.load_count()
    );

    showroom.set_debug_visualization_enabled(true);

    let mut tasks = Vec::new();
    if let Some(monitor) = &monitor {
        let panel = monitor.display.clone();
        let flip = showroom.with_stage(|stage| {
            let on_halfway = panel.map(|panel| {
                Box::new(move |scene: &mut Scene, _| {
                    panel.toggle_display(scene);
                }) as HalfwayCallback
            });
            monitor.flip(&mut stage.rotator, &stage.scene, Duration::from_millis(800), on_halfway)
        });
        tasks.extend(flip.ok());
    }
    if let Some(lamp) = &lamp {
        let turn = showroom.rotate(
            lamp.root,
            Vec3::Y,
            FRAC_PI_2,
            Duration::from_secs(1),
            RotationOptions::default().with_easing(Easing::CubicOut),
        );
        tasks.extend(turn.ok());
    }

    for frame in 0..120 {
        let report = showroom.tick(FRAME);
        if frame % 30 == 0 {
            info!(
                "frame {}: {} synced, {} asleep, {} woken",
                frame, report.synced, report.asleep, report.woken
            );
        }
    }

    for task in tasks {
        match task.await {
            Ok(node) => info!("Rotation on {} finished", node),
            Err(e) => warn!("Rotation ended early: {}", e),
        }
    }

    if let Some(crate_a) = &crate_a
        && let Some(record) = showroom.get_instance(crate_a.instance_id)
    {
        let position = showroom.with_stage(|stage| {
            stage.scene.get(record.visual_node).map(|n| n.transform.translation)
        });
        info!("{} came to rest at {:?}", record.instance_id, position);
    }
    if let Some(ball) = &ball {
        showroom.dispose_instance(ball.instance_id);
    }

    showroom.with_stage(|stage| {
        info!(
            "{} instances, {} bodies, {} wireframes before cleanup",
            stage.storage.len(),
            stage.physics.bodies.len(),
            stage.debug.wireframe_count()
        );
    });
    showroom.cleanup();

    Ok(())
}
