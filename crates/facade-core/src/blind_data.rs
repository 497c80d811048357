//! Per-vertex blind data: the camera-space position clicked in each camera.
//!
//! A vertex placed interactively remembers, for every camera it was clicked
//! in, where the click landed. Re-triangulation always starts from this
//! history, so adding a click in a new camera refines the vertex instead of
//! replacing it.
//!
//! The host persists the history as a table of fixed-size records, see
//! [`ClickRecord`].

use std::collections::BTreeMap;

use bytemuck::{Pod, Zeroable};
use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{CameraSet, PinholeCamera, Pt2, Real};

/// Camera identifier as stored by the host scene.
pub type CameraId = i32;

/// Size in bytes of one encoded [`ClickRecord`].
pub const CLICK_RECORD_SIZE: usize = std::mem::size_of::<ClickRecord>();

/// Errors raised while decoding a record table.
#[derive(Debug, Error, PartialEq)]
pub enum BlindDataError {
    #[error("record table of {len} bytes is not a whole number of 20-byte records")]
    Truncated { len: usize },
    #[error("camera {0} appears twice in the record table")]
    DuplicateCamera(CameraId),
    #[error("camera {0} has a non-finite click position")]
    NonFinite(CameraId),
}

/// One persisted click: camera id and camera-space position.
///
/// Packed, native endianness, no version field: 20 bytes per record.
#[repr(C, packed)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct ClickRecord {
    pub camera_id: CameraId,
    pub x: Real,
    pub y: Real,
}

/// Click history of one vertex, ordered by camera id.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlindData {
    clicks: BTreeMap<CameraId, Pt2>,
}

/// A click resolved against its camera, in image pixels.
#[derive(Clone, Copy, Debug)]
pub struct Observation<'a> {
    pub camera_id: CameraId,
    pub pixel: Pt2,
    pub camera: &'a PinholeCamera,
}

impl BlindData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record (or overwrite) the click made in `camera`.
    pub fn set(&mut self, camera: CameraId, position: Pt2) {
        self.clicks.insert(camera, position);
    }

    pub fn get(&self, camera: CameraId) -> Option<&Pt2> {
        self.clicks.get(&camera)
    }

    /// Forget the click made in `camera`, returning it.
    pub fn unset(&mut self, camera: CameraId) -> Option<Pt2> {
        self.clicks.remove(&camera)
    }

    pub fn clear(&mut self) {
        self.clicks.clear();
    }

    pub fn len(&self) -> usize {
        self.clicks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clicks.is_empty()
    }

    pub fn contains(&self, camera: CameraId) -> bool {
        self.clicks.contains_key(&camera)
    }

    /// Clicks in increasing camera id order.
    pub fn iter(&self) -> impl Iterator<Item = (CameraId, &Pt2)> + '_ {
        self.clicks.iter().map(|(id, p)| (*id, p))
    }

    pub fn records(&self) -> Vec<ClickRecord> {
        self.iter()
            .map(|(camera_id, p)| ClickRecord {
                camera_id,
                x: p.x,
                y: p.y,
            })
            .collect()
    }

    /// Encode the history as a packed record table.
    pub fn encode(&self) -> Vec<u8> {
        bytemuck::cast_slice(&self.records()).to_vec()
    }

    /// Decode a packed record table.
    pub fn decode(bytes: &[u8]) -> Result<Self, BlindDataError> {
        if bytes.len() % CLICK_RECORD_SIZE != 0 {
            return Err(BlindDataError::Truncated { len: bytes.len() });
        }
        let mut out = Self::new();
        for chunk in bytes.chunks_exact(CLICK_RECORD_SIZE) {
            let rec: ClickRecord = bytemuck::pod_read_unaligned(chunk);
            let (id, x, y) = (rec.camera_id, rec.x, rec.y);
            if !x.is_finite() || !y.is_finite() {
                return Err(BlindDataError::NonFinite(id));
            }
            if out.clicks.insert(id, Pt2::new(x, y)).is_some() {
                return Err(BlindDataError::DuplicateCamera(id));
            }
        }
        Ok(out)
    }

    /// Convert every click to image pixels of its camera.
    ///
    /// Clicks made in cameras missing from `cameras` are skipped.
    pub fn observations<'a>(&self, cameras: &'a CameraSet) -> Vec<Observation<'a>> {
        let mut out = Vec::with_capacity(self.len());
        for (camera_id, cs) in self.iter() {
            let Some(view) = cameras.get(camera_id) else {
                warn!("blind data references unknown camera {camera_id}, skipped");
                continue;
            };
            out.push(Observation {
                camera_id,
                pixel: view.image.camera_to_image(cs),
                camera: &view.camera,
            });
        }
        out
    }
}

impl FromIterator<(CameraId, Pt2)> for BlindData {
    fn from_iter<I: IntoIterator<Item = (CameraId, Pt2)>>(iter: I) -> Self {
        Self {
            clicks: iter.into_iter().collect(),
        }
    }
}
