use facade_core::{
    synthetic::{self, UniformNoise},
    CameraSet, ImageSize, PointCloud, Pt3, Vec3, Viewport,
};
use facade_edit::{
    create_face, extend_edge, move_vertices, BuildStep, ComponentKind, EditConfig, EditContext,
    Intersection, IntersectionCache, MeshData, MoveMode, PolygonBuilder,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn scene() -> (CameraSet, PointCloud) {
    let image = ImageSize::new(4000.0, 3000.0);
    let cameras =
        synthetic::arc_cameras(3, &Pt3::new(0.0, 3.0, 0.0), 15.0, 0.8, 0.5, 3000.0, image).unwrap();
    let grid = synthetic::plane_grid(
        &Pt3::new(-5.0, 0.0, 0.0),
        &Vec3::new(0.25, 0.0, 0.0),
        &Vec3::new(0.0, 0.25, 0.0),
        41,
        25,
    );
    let cloud = PointCloud::new(UniformNoise::new(11, 0.002).displace_along(&grid, &Vec3::z()));
    (cameras, cloud)
}

const WALL: [[f64; 3]; 4] = [
    [-2.0, 1.0, 0.0],
    [2.0, 1.0, 0.0],
    [2.0, 4.0, 0.0],
    [-2.0, 4.0, 0.0],
];

fn wall_corner(i: usize) -> Pt3 {
    Pt3::from(WALL[i])
}

/// Draw the wall quad in camera 1 and commit it as mesh "wall".
fn drawn_wall(ctx: &EditContext<'_>, cache: &mut IntersectionCache) -> MeshData {
    let view = ctx.cameras.get(1).unwrap();
    let mut builder = PolygonBuilder::new();
    let step = (0..3)
        .map(|i| builder.add_click(1, view.to_camera_space(&wall_corner(i))))
        .last();
    let Some(BuildStep::Ready(quad)) = step else {
        panic!("three clicks should complete the quad");
    };
    let edit = create_face(ctx, 1, &quad).unwrap();
    builder.face_built(&quad);

    let mut mesh = MeshData::default();
    assert_eq!(mesh.apply_face(&edit), 0);
    cache.rebuild("wall", &mesh).unwrap();
    mesh
}

#[test]
fn drawn_face_lands_on_the_cloud_plane() {
    init_logging();
    let (cameras, cloud) = scene();
    let config = EditConfig::default();
    let ctx = EditContext::new(&cameras, &cloud, &config);
    let mut cache = IntersectionCache::new();
    let mesh = drawn_wall(&ctx, &mut cache);

    assert_eq!(mesh.faces, vec![vec![0, 1, 2, 3]]);
    for (i, p) in mesh.positions.iter().enumerate() {
        let err = (p - wall_corner(i)).norm();
        assert!(err < 0.05, "corner {i} off by {err}");
        assert!(mesh.vertex_blind_data(i).contains(1));
    }
}

#[test]
fn rebuild_invalidates_every_handle() {
    init_logging();
    let (cameras, cloud) = scene();
    let config = EditConfig::default();
    let ctx = EditContext::new(&cameras, &cloud, &config);
    let mut cache = IntersectionCache::new();
    let mesh = drawn_wall(&ctx, &mut cache);
    let view = cameras.get(1).unwrap();
    let viewport = Viewport::default();

    let at_corner = view.to_camera_space(&mesh.positions[1]);
    let hit = cache.check_intersection(view, &viewport, 10.0, &at_corner, true);
    let old = hit.vertex().expect("corner should be hit");
    assert_eq!(old.index(), 1);
    cache.select_intersected();
    let old_generation = cache.snapshot("wall").unwrap().generation();

    cache.rebuild("wall", &mesh).unwrap();
    assert!(cache.resolve_vertex(old).is_none());
    assert!(cache.vertex_snapshot(old).is_none());
    assert!(cache.intersected().is_none());
    assert!(cache.selected().is_none());

    let fresh = cache
        .check_intersection(view, &viewport, 10.0, &at_corner, true)
        .vertex()
        .unwrap();
    assert_ne!(fresh, old);
    let snap = cache.vertex_snapshot(fresh).unwrap();
    assert!(snap.generation() > old_generation);
    assert_eq!(cache.resolve_vertex(fresh).unwrap().index, 1);
}

#[test]
fn dragged_edge_grows_the_wall() {
    init_logging();
    let (cameras, cloud) = scene();
    let config = EditConfig::default();
    let ctx = EditContext::new(&cameras, &cloud, &config);
    let mut cache = IntersectionCache::new();
    let mut mesh = drawn_wall(&ctx, &mut cache);
    let view = cameras.get(1).unwrap();

    let press = view.to_camera_space(&Pt3::new(2.0, 2.5, 0.0));
    let hit = cache.check_intersection(view, &Viewport::default(), 10.0, &press, true);
    let Intersection::Edge(edge) = hit else {
        panic!("expected an edge, got {hit:?}");
    };
    let (a, b) = cache.edge_vertices(edge).unwrap();
    assert_eq!((a.index, b.index), (1, 2));

    let mouse = view.to_camera_space(&Pt3::new(4.0, 2.5, 0.0));
    let edit = extend_edge(&ctx, &cache, edge, 1, &press, &mouse).unwrap();
    assert_eq!(edit.mesh.as_deref(), Some("wall"));
    assert_eq!(edit.corners[0].vertex, Some(1));
    assert_eq!(edit.corners[1].vertex, Some(2));
    for corner in &edit.corners[2..] {
        assert_eq!(corner.vertex, None);
        assert!(corner.position.z.abs() < 0.02, "{:?}", corner.position);
        assert!((corner.position.x - 4.0).abs() < 0.1, "{:?}", corner.position);
    }

    assert_eq!(mesh.apply_face(&edit), 1);
    assert_eq!(mesh.faces[1], vec![1, 2, 4, 5]);
    cache.rebuild("wall", &mesh).unwrap();
    assert!(cache.resolve_edge(edge).is_none());
    let snap = cache.snapshot("wall").unwrap();
    assert_eq!(snap.edges().len(), 7);
    assert_eq!(snap.vertices()[1].face_count, 2);
}

#[test]
fn clicks_from_more_views_refine_a_vertex() {
    init_logging();
    let (cameras, cloud) = scene();
    let config = EditConfig::default();
    let ctx = EditContext::new(&cameras, &cloud, &config);
    let mut cache = IntersectionCache::new();
    let mut mesh = drawn_wall(&ctx, &mut cache);
    let truth = wall_corner(2);

    // Camera 1 only: triangulation has nothing to intersect with yet, so the
    // vertex sits where the plane put it.
    let before = (mesh.positions[2] - truth).norm();

    for camera in [0, 2] {
        let view = cameras.get(camera).unwrap();
        let target = cache.select("wall", ComponentKind::Vertex, 2);
        let press = view.to_camera_space(&mesh.positions[2]);
        let mouse = view.to_camera_space(&truth);
        let edit = move_vertices(&ctx, &cache, target, camera, &press, &mouse).unwrap();
        assert_eq!(edit.mode, MoveMode::NViewTriangulation);
        mesh.apply_moves(&edit);
        cache.rebuild("wall", &mesh).unwrap();
    }

    let after = (mesh.positions[2] - truth).norm();
    assert!(after < 1e-6, "refined vertex off by {after}");
    assert!(after <= before);
    assert_eq!(mesh.vertex_blind_data(2).len(), 3);
}

#[test]
fn cloud_projection_keeps_a_corner_on_the_wall() {
    init_logging();
    let (cameras, cloud) = scene();
    let config = EditConfig {
        move_mode: MoveMode::PointCloudProjection,
        ..EditConfig::default()
    };
    let ctx = EditContext::new(&cameras, &cloud, &config);
    let mut cache = IntersectionCache::new();
    let mesh = drawn_wall(&ctx, &mut cache);
    let view = cameras.get(1).unwrap();

    let target = cache.select("wall", ComponentKind::Vertex, 0);
    let press = view.to_camera_space(&mesh.positions[0]);
    let mouse = view.to_camera_space(&Pt3::new(-2.5, 0.5, 0.0));
    let edit = move_vertices(&ctx, &cache, target, 1, &press, &mouse).unwrap();
    let m = &edit.moves[0];
    assert!(m.position.z.abs() < 0.02);
    assert!((m.position - Pt3::new(-2.5, 0.5, 0.0)).norm() < 0.05);
    assert_eq!(m.blind_data.len(), 1);
    assert!((m.blind_data.get(1).unwrap() - mouse).norm() < 1e-12);
}
