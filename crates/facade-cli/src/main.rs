use std::{collections::BTreeMap, fs, path::Path};

use anyhow::{bail, Context, Result};
use clap::Parser;
use facade_core::{
    CameraId, CameraParams, CameraSet, ImageSize, PointCloud, Pt2, Pt3, ViewCamera,
};
use facade_edit::{
    create_face, BuildStep, EditConfig, EditContext, MeshData, MoveEdit, MoveMode, PolygonBuilder,
    VertexMove,
};
use facade_linear::{reprojection_rms, triangulate_blind_data};
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// Facade reconstruction requests over a JSON session.
#[derive(Debug, Parser)]
#[command(author, version, about = "Run facade reconstruction requests from a JSON session")]
struct Args {
    /// Path to the JSON session (cameras, point cloud, mesh, requests).
    #[arg(long)]
    input: String,

    /// Optional path to a JSON EditConfig. Defaults are used if omitted.
    #[arg(long)]
    config: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CameraInput {
    id: CameraId,
    image: ImageSize,
    model: CameraParams,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CloudInput {
    positions: Vec<Pt3>,
    /// Visible point indices per camera; cameras missing here see everything.
    #[serde(default)]
    visibility: BTreeMap<CameraId, Vec<usize>>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Request {
    /// Re-triangulate a vertex from its stored clicks.
    Triangulate { vertex: usize },
    /// Build a face from 3 (parallelogram) or 4 camera-space clicks.
    CreateFace { camera: CameraId, clicks: Vec<Pt2> },
}

#[derive(Debug, Serialize, Deserialize)]
struct Session {
    cameras: Vec<CameraInput>,
    #[serde(default)]
    cloud: CloudInput,
    #[serde(default)]
    mesh: MeshData,
    requests: Vec<Request>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum Outcome {
    Triangulated {
        vertex: usize,
        position: Pt3,
        views: usize,
        rms_px: f64,
    },
    FaceCreated {
        face: usize,
        corners: Vec<Pt3>,
    },
    Failed {
        error: String,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct Report {
    outcomes: Vec<Outcome>,
    mesh: MeshData,
}

fn load_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let data =
        fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("cannot parse {}", path.display()))
}

fn build_scene(session: &Session) -> Result<(CameraSet, PointCloud)> {
    let mut cameras = CameraSet::new();
    for c in &session.cameras {
        let camera = c
            .model
            .build(c.image)
            .with_context(|| format!("camera {}", c.id))?;
        if cameras.insert(ViewCamera::new(c.id, camera, c.image)).is_some() {
            bail!("camera {} is listed twice", c.id);
        }
    }
    let mut cloud = PointCloud::new(session.cloud.positions.clone());
    for (&id, indices) in &session.cloud.visibility {
        cloud.set_visibility(id, indices.clone());
    }
    Ok((cameras, cloud))
}

fn triangulate_vertex(cameras: &CameraSet, mesh: &mut MeshData, vertex: usize) -> Result<Outcome> {
    if vertex >= mesh.positions.len() {
        bail!("vertex {vertex} out of range");
    }
    let blind_data = mesh.vertex_blind_data(vertex);
    let position = triangulate_blind_data(&blind_data, cameras)?;
    let observations = blind_data.observations(cameras);
    let rms_px = reprojection_rms(&observations, &position);
    mesh.apply_moves(&MoveEdit {
        mesh: String::new(),
        mode: MoveMode::NViewTriangulation,
        moves: vec![VertexMove {
            vertex,
            position,
            blind_data,
        }],
    });
    Ok(Outcome::Triangulated {
        vertex,
        position,
        views: observations.len(),
        rms_px,
    })
}

fn create_face_from_clicks(
    ctx: &EditContext<'_>,
    mesh: &mut MeshData,
    camera: CameraId,
    clicks: &[Pt2],
) -> Result<Outcome> {
    if !(3..=4).contains(&clicks.len()) {
        bail!("a face needs 3 or 4 clicks, got {}", clicks.len());
    }
    let mut builder = PolygonBuilder::new();
    let mut step = None;
    for click in clicks {
        step = Some(builder.add_click(camera, *click));
    }
    let Some(BuildStep::Ready(quad)) = step else {
        bail!("clicks did not complete a face");
    };
    let edit = create_face(ctx, camera, &quad)?;
    let face = mesh.apply_face(&edit);
    Ok(Outcome::FaceCreated {
        face,
        corners: edit.corners.iter().map(|c| c.position).collect(),
    })
}

fn run_session(session: Session, config: &EditConfig) -> Result<Report> {
    let (cameras, cloud) = build_scene(&session)?;
    let mut mesh = session.mesh;
    mesh.validate().context("invalid session mesh")?;
    let ctx = EditContext::new(&cameras, &cloud, config);
    info!(
        "{} camera(s), {} cloud point(s), {} request(s)",
        cameras.len(),
        cloud.len(),
        session.requests.len()
    );

    let mut outcomes = Vec::with_capacity(session.requests.len());
    for (i, request) in session.requests.iter().enumerate() {
        let result = match request {
            Request::Triangulate { vertex } => triangulate_vertex(&cameras, &mut mesh, *vertex),
            Request::CreateFace { camera, clicks } => {
                create_face_from_clicks(&ctx, &mut mesh, *camera, clicks)
            }
        };
        outcomes.push(result.unwrap_or_else(|err| {
            warn!("request {i} failed: {err:#}");
            Outcome::Failed {
                error: format!("{err:#}"),
            }
        }));
    }
    Ok(Report { outcomes, mesh })
}

fn run_from_files(input_path: &str, config_path: Option<&str>) -> Result<String> {
    let session: Session = load_json_file(Path::new(input_path))?;
    let config = match config_path {
        Some(path) => load_json_file::<EditConfig>(Path::new(path))?,
        None => EditConfig::default(),
    };
    let report = run_session(session, &config)?;
    Ok(serde_json::to_string_pretty(&report)?)
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(err) = try_main() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let args = Args::parse();
    let json = run_from_files(&args.input, args.config.as_deref())?;
    println!("{json}");
    Ok(())
}
