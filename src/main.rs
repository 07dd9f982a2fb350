use tessera::{Frame, RenderableObject, TextureData, ViewerConfig, shapes};

fn main() -> tessera::Result<()> {
    env_logger::init();

    let config = ViewerConfig::new()
        .title("Tessera")
        .size(1024, 768)
        .clear_color(0.08, 0.08, 0.1);

    tessera::run(config, |scene| {
        scene.spawn(RenderableObject::flat(shapes::axes(Default::default())).with_name("axes"))?;

        let mut cube = RenderableObject::lit(shapes::cuboid(Default::default())).with_name("cube");
        cube.translate(-1.5, 2.0, 0.0).scale(0.3, 0.3, 0.3);
        let mut cube_wireframe =
            RenderableObject::flat(shapes::cuboid_wireframe(Default::default())).with_name("cube wireframe");
        cube_wireframe.translate(1.0, 2.0, 0.0).scale(0.2, 0.2, 0.2);

        let mut cylinder = RenderableObject::lit(shapes::cylinder(Default::default())).with_name("cylinder");
        cylinder.translate(-1.5, 0.3, 0.0).scale(0.3, 0.3, 0.3);
        let mut cylinder_wireframe =
            RenderableObject::flat(shapes::cylinder_wireframe(Default::default())).with_name("cylinder wireframe");
        cylinder_wireframe.translate(1.5, 0.6, 0.0).scale(0.2, 0.2, 0.2);

        let mut sphere = RenderableObject::lit(shapes::sphere(Default::default())).with_name("sphere");
        sphere.translate(-1.5, -2.0, 0.0).scale(0.3, 0.3, 0.3);
        let mut sphere_wireframe =
            RenderableObject::flat(shapes::sphere_wireframe(Default::default())).with_name("sphere wireframe");
        sphere_wireframe.translate(1.5, -1.0, 0.0).scale(0.2, 0.2, 0.2);

        let mut torus = RenderableObject::lit(shapes::torus(Default::default())).with_name("torus");
        torus.translate(-1.5, -5.0, 0.0).scale(0.3, 0.3, 0.3);
        let mut torus_wireframe =
            RenderableObject::flat(shapes::torus_wireframe(Default::default())).with_name("torus wireframe");
        torus_wireframe.translate(2.0, -3.0, 0.0).scale(0.2, 0.2, 0.2);

        for object in [
            cube,
            cube_wireframe,
            cylinder,
            cylinder_wireframe,
            sphere,
            sphere_wireframe,
            torus,
            torus_wireframe,
        ] {
            scene.spawn(object)?;
        }

        let checker = TextureData::checkerboard(64, 8, [40, 40, 48, 255], [220, 200, 160, 255]);
        let mut crate_box = RenderableObject::textured(shapes::cuboid(Default::default()), checker).with_name("crate");
        crate_box.translate(0.0, 4.0, 0.0).scale(0.2, 0.2, 0.2);
        let crate_box = scene.spawn(crate_box)?;

        Ok(move |frame: &mut Frame| {
            crate_box.borrow_mut().rotate_y(frame.dt * 0.8);
        })
    })
}
