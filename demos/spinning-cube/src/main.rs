use scene_ngin::{
    camera::OrbitController,
    config::{SceneConfig, WindowConfig},
    data_structures::{
        instance::Instance,
        model::GeometryData,
        scene_graph::{ContainerNode, MeshNode, SceneNode},
    },
    flow::{self, WindowSceneManager},
};

const SPHERES: usize = 8;

fn setup(mgr: &mut WindowSceneManager) -> anyhow::Result<()> {
    let device = mgr.renderer().device().clone();

    let cube = MeshNode::new(
        &device,
        "cube",
        &GeometryData::cuboid(1.0, 1.0, 1.0),
        [0.0, 1.0, 0.53, 1.0],
    );
    let cube = mgr.add_content(Box::new(cube))?;

    let mut ring = ContainerNode::new("ring");
    let sphere = GeometryData::uv_sphere(0.25, 24, 16);
    for i in 0..SPHERES {
        let angle = i as f32 / SPHERES as f32 * std::f32::consts::TAU;
        let node = MeshNode::new(&device, &format!("sphere-{i}"), &sphere, [1.0, 0.42, 0.2, 1.0])
            .at(Instance::at(3.0 * angle.cos(), 0.0, 3.0 * angle.sin()));
        ring.add_child(Box::new(node));
    }
    let ring = mgr.add_content(Box::new(ring))?;

    let floor = MeshNode::new(
        &device,
        "floor",
        &GeometryData::plane(20.0, 20.0),
        [0.3, 0.3, 0.35, 1.0],
    )
    .at(Instance::at(0.0, -1.5, 0.0));
    mgr.add_content(Box::new(floor))?;

    mgr.set_controller(Box::new(
        OrbitController::new((0.0, 0.0, 0.0))
            .with_damping(0.05)
            .with_distance_limits(3.0, 20.0),
    ))?;

    mgr.start_animation_loop(move |scene, time| {
        let t = time.elapsed.as_secs_f32();
        if let Some(node) = scene.get_mut(cube) {
            node.apply_transform(&mut |inst| inst.set_euler(t * 0.5, t, 0.0));
        }
        if let Some(node) = scene.get_mut(ring) {
            node.apply_transform(&mut |inst| {
                inst.set_euler(0.0, -t * 0.3, 0.0);
                inst.position.y = (t * 2.0).sin() * 0.5;
            });
        }
    })?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let window = WindowConfig {
        title: "spinning cube".to_string(),
        ..Default::default()
    };
    flow::run(window, SceneConfig::default(), Box::new(setup))
}
