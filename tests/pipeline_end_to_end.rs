use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use lookout::{
    build_transform, ColorClass, FitPolicy, InferenceEngine, LensFacing, LensInfo, MappingParams,
    ModelRegistry, Pipeline, PipelineConfig, PipelineState, RasterImage, RawDetection, RawFrame,
    Rect, StateCell, StubBackend, StubStep, SubmitOutcome, ViewGeometry,
};

fn rear_lenses() -> Vec<LensInfo> {
    vec![
        LensInfo::new("0", LensFacing::Back, vec![4.38]),
        LensInfo::new("2", LensFacing::Back, vec![1.54]),
    ]
}

fn sensor_frame(width: u32, height: u32, rotation: u32) -> RawFrame {
    let (w, h) = (width as usize, height as usize);
    let chroma = w.div_ceil(2) * h.div_ceil(2);
    RawFrame::from_i420(
        vec![90; w * h],
        vec![128; chroma],
        vec![128; chroma],
        width,
        height,
        rotation,
        Duration::ZERO,
    )
}

fn registry_with(name: &str, backend: StubBackend) -> Arc<ModelRegistry> {
    let mut registry = ModelRegistry::with_builtin();
    let slot = Mutex::new(Some(backend));
    registry.register(name, move || {
        slot.lock()
            .unwrap()
            .take()
            .map(Box::new)
            .ok_or_else(|| anyhow::anyhow!("backend already taken"))
    });
    Arc::new(registry)
}

fn wait_idle(pipeline: &Pipeline) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while pipeline.is_busy() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn rotated_sensor_fills_portrait_display() {
    // 640x480 sensor rotated 90 degrees gives a 480x640 upright raster.
    let full_frame = Rect::new(0.0, 0.0, 480.0, 640.0);
    let backend = StubBackend::new().with_detections(vec![RawDetection::new(
        "person", 0.9, full_frame,
    )]);

    let mut config = PipelineConfig::default();
    config.model.name = "scripted".into();
    config.display.width = 1080;
    config.display.height = 1920;
    config.display.fit = FitPolicy::Fill;
    config.display.mirror = false;

    let pipeline = Pipeline::start(&config, registry_with("scripted", backend)).unwrap();
    assert_eq!(pipeline.wait_for_model(Duration::from_secs(5)), PipelineState::Ready);
    wait_idle(&pipeline);
    assert!(pipeline.bind_camera(&rear_lenses()));
    assert_eq!(pipeline.bound_lens().unwrap().as_str(), "2");

    assert_eq!(pipeline.submit(sensor_frame(640, 480, 90)), SubmitOutcome::Accepted);
    wait_idle(&pipeline);

    let snapshot = pipeline.current();
    assert_eq!(snapshot.generation, 1);
    assert_eq!(snapshot.boxes.len(), 1);
    let b = &snapshot.boxes[0];
    assert_eq!(b.color_class, ColorClass::PrimarySubject);
    assert_eq!(b.caption(), "person 0.90");
    // Scale is max(1080/480, 1920/640) = 3: the long axis matches exactly,
    // the short axis overflows (cropped).
    assert!(b.rect.left.abs() < 1e-3);
    assert!(b.rect.top.abs() < 1e-3);
    assert!((b.rect.bottom - 1920.0).abs() < 1e-3);
    assert!((b.rect.right - 1440.0).abs() < 1e-3);
    assert!(b.rect.right >= 1080.0);

    let transform = build_transform(&MappingParams {
        source_width: 480,
        source_height: 640,
        rotation_degrees: 0,
        display_width: 1080,
        display_height: 1920,
        mirror: false,
        fit: FitPolicy::Fill,
    });
    assert!((transform.scale_factor() - 3.0).abs() < 1e-6);

    pipeline.shutdown().unwrap();
}

#[test]
fn view_change_rebuilds_mapping() {
    let backend = StubBackend::new().with_detections(vec![RawDetection::new(
        "person",
        0.9,
        Rect::new(0.0, 0.0, 4.0, 4.0),
    )]);
    let mut config = PipelineConfig::default();
    config.model.name = "scripted".into();
    config.display.width = 8;
    config.display.height = 8;

    let pipeline = Pipeline::start(&config, registry_with("scripted", backend)).unwrap();
    pipeline.wait_for_model(Duration::from_secs(5));
    wait_idle(&pipeline);
    pipeline.bind_camera(&rear_lenses());

    pipeline.submit(sensor_frame(8, 8, 0));
    wait_idle(&pipeline);
    assert_eq!(pipeline.current().boxes[0].rect, Rect::new(0.0, 0.0, 4.0, 4.0));

    pipeline.set_view(ViewGeometry {
        mirror: true,
        ..pipeline.view()
    });
    pipeline.submit(sensor_frame(8, 8, 0));
    wait_idle(&pipeline);
    assert_eq!(pipeline.current().boxes[0].rect, Rect::new(4.0, 0.0, 8.0, 4.0));

    pipeline.enter_reduced_mode(4, 4);
    pipeline.submit(sensor_frame(8, 8, 0));
    wait_idle(&pipeline);
    assert_eq!(pipeline.current().boxes[0].rect, Rect::new(2.0, 0.0, 4.0, 2.0));

    pipeline.exit_reduced_mode();
    pipeline.set_zoom(2.0);
    pipeline.submit(sensor_frame(8, 8, 0));
    wait_idle(&pipeline);
    // Mirrored box (4,0)-(8,4) scaled 2x about the display center (4,4).
    assert_eq!(pipeline.current().boxes[0].rect, Rect::new(4.0, -4.0, 12.0, 4.0));

    pipeline.shutdown().unwrap();
}

#[test]
fn model_load_failure_never_publishes() {
    let mut config = PipelineConfig::default();
    config.model.name = "missing-model".into();

    let pipeline = Pipeline::start(&config, Arc::new(ModelRegistry::with_builtin())).unwrap();
    let states = pipeline.subscribe_state();
    assert_eq!(
        pipeline.wait_for_model(Duration::from_secs(5)),
        PipelineState::ModelUnavailable
    );
    assert!(pipeline.state().is_degraded());
    assert!(states
        .iter()
        .take_while(|s| *s != PipelineState::ModelUnavailable)
        .all(|s| s == PipelineState::Uninitialized));

    wait_idle(&pipeline);
    pipeline.bind_camera(&rear_lenses());
    for _ in 0..5 {
        wait_idle(&pipeline);
        pipeline.submit(sensor_frame(64, 48, 90));
    }
    wait_idle(&pipeline);
    assert_eq!(pipeline.current().generation, 0);
    assert_eq!(pipeline.stats().published, 0);
    pipeline.shutdown().unwrap();

    // The engine on its own behaves the same way.
    let state = Arc::new(StateCell::new());
    let mut engine = InferenceEngine::load(
        &ModelRegistry::new(),
        "missing-model",
        Default::default(),
        state.clone(),
    );
    let raster = RasterImage::from_rgb(vec![0; 3 * 16], 4, 4).unwrap();
    assert!(engine.detect(&raster).is_empty());
    assert_eq!(state.get(), PipelineState::ModelUnavailable);
}

#[test]
fn engine_fault_disables_and_freezes_overlay() {
    let backend = StubBackend::new().with_script([
        StubStep::Detections(vec![RawDetection::new("dog", 0.8, Rect::new(0.0, 0.0, 1.0, 1.0))]),
        StubStep::Panic("delegate crashed".into()),
    ]);
    let mut config = PipelineConfig::default();
    config.model.name = "scripted".into();

    let pipeline = Pipeline::start(&config, registry_with("scripted", backend)).unwrap();
    pipeline.wait_for_model(Duration::from_secs(5));
    wait_idle(&pipeline);
    pipeline.bind_camera(&rear_lenses());

    for _ in 0..4 {
        pipeline.submit(sensor_frame(8, 8, 0));
        wait_idle(&pipeline);
    }
    assert_eq!(pipeline.state(), PipelineState::Disabled);
    let snapshot = pipeline.current();
    assert_eq!(snapshot.generation, 1);
    assert_eq!(snapshot.boxes[0].color_class, ColorClass::Other);
    pipeline.shutdown().unwrap();
}
