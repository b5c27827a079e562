use showreel::{
    CpuSurface, Effect, FrameInput, InputEvent, PageLayout, Point, RenderSurface, Rgba8,
    ShowreelConfig, Stage, Texture, Viewport,
    shader::{MagnifierParams, SpotlightParams},
    stage::PointerHit,
};

fn desktop() -> Stage {
    let vp = Viewport::new(1280.0, 800.0).unwrap();
    let mut stage = Stage::new(ShowreelConfig::default(), vp).unwrap();
    stage.mount_page(&PageLayout::default()).unwrap();
    stage
}

#[test]
fn hover_zooms_in_and_leave_turns_the_lens_off() {
    let mut stage = desktop();
    let image = stage.refs().unwrap().shader_images[0];

    stage
        .dispatch(&InputEvent::PointerMove {
            x: 300.0,
            y: 1100.0,
            hit: Some(PointerHit {
                element: image,
                u: 0.25,
                v: 0.25,
            }),
        })
        .unwrap();
    stage.dispatch(&InputEvent::PointerEnter { element: image }).unwrap();
    stage.run_for(400.0);

    let frame = stage.shader_images()[0].frame();
    assert!(frame.hovering);
    assert_eq!(frame.zoom, 1.0);
    assert_eq!(frame.pointer, Point::new(0.25, 0.75));
    // the other image never saw the pointer
    assert!(!stage.shader_images()[1].frame().hovering);

    stage.dispatch(&InputEvent::PointerLeave { element: image }).unwrap();
    stage.advance(16.0);
    assert!(stage.shader_images()[0].frame().hovering);
    stage.run_for(400.0);
    let frame = stage.shader_images()[0].frame();
    assert!(!frame.hovering);
    assert_eq!(frame.zoom, 0.0);
}

#[test]
fn sfx_click_cycles_once_per_loaded_texture() {
    let mut stage = desktop();
    let sfx_image = stage.refs().unwrap().sfx_image;
    let click = InputEvent::Click { element: sfx_image };

    assert!(stage.sfx().unwrap().is_transitioning());
    stage.advance(16.0);
    assert!(!stage.sfx().unwrap().is_transitioning());

    stage.dispatch(&click).unwrap();
    stage.dispatch(&click).unwrap();
    assert_eq!(stage.sfx().unwrap().index(), 1);

    for expected in [2, 0] {
        stage.advance(16.0);
        stage.dispatch(&click).unwrap();
        assert_eq!(stage.sfx().unwrap().index(), expected);
    }

    // clicks elsewhere are not the gallery's
    stage.advance(16.0);
    let other = stage.refs().unwrap().about;
    stage.dispatch(&InputEvent::Click { element: other }).unwrap();
    assert_eq!(stage.sfx().unwrap().index(), 0);
}

#[test]
fn mobile_sfx_swipes_and_moves_the_light() {
    let vp = Viewport::new(400.0, 800.0).unwrap();
    let mut stage = Stage::new(ShowreelConfig::default(), vp).unwrap();
    let refs = stage.mount_page(&PageLayout::default()).unwrap();
    assert!(stage.sfx().unwrap().is_mobile());

    for _ in 0..4 {
        stage.dispatch(&InputEvent::TouchStart { x: 300.0 }).unwrap();
        stage.dispatch(&InputEvent::TouchEnd { x: 100.0 }).unwrap();
    }
    assert_eq!(stage.sfx().unwrap().index(), 2);

    stage
        .dispatch(&InputEvent::PointerMove {
            x: 0.0,
            y: 0.0,
            hit: Some(PointerHit {
                element: refs.sfx_image,
                u: 0.5,
                v: 0.25,
            }),
        })
        .unwrap();
    let light = stage.scene().style(refs.sfx_light).unwrap();
    // sfx image is 0.4vw x 0.6vh
    assert_eq!((light.x, light.y), (80.0, 120.0));
}

#[test]
fn spotlight_is_bright_at_the_pointer_and_ambient_far_away() {
    let texture = Texture::solid(8, 8, Rgba8::WHITE).unwrap();
    let params = SpotlightParams {
        radius_px: 4.0,
        softness_px: 2.0,
        ambient: 0.2,
    };
    let mut surface = CpuSurface::new(Effect::Spotlight(params), 2.0);
    surface.mount(texture);
    surface.resize(100.0, 100.0, 1.0);
    surface
        .render(&FrameInput {
            pointer: Point::new(0.1, 0.9),
            ..FrameInput::default()
        })
        .unwrap();

    let img = surface.to_image().unwrap();
    // (0.1, 0.9) with v up is near the top-left corner
    assert_eq!(img.get_pixel(10, 10).0, [255, 255, 255, 255]);
    assert_eq!(img.get_pixel(90, 90).0, [51, 51, 51, 255]);
}

#[test]
fn magnifier_surface_matches_plain_image_without_hover() {
    let texture = Texture::solid(4, 4, Rgba8::new(200, 100, 50, 255)).unwrap();
    let mut surface = CpuSurface::new(Effect::Magnifier(MagnifierParams::default()), 2.0);
    surface.mount(texture);
    surface.resize(20.0, 20.0, 3.0);
    assert_eq!(surface.size(), (40, 40));
    surface.render(&FrameInput::default()).unwrap();
    assert!(
        surface
            .pixels()
            .chunks_exact(4)
            .all(|px| px == [200, 100, 50, 255])
    );
    surface.dispose();
    assert!(surface.render(&FrameInput::default()).is_err());
}
