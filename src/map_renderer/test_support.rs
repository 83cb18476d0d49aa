//! Recording fakes for the collaborator traits, shared by the unit tests.

use std::{
    cell::Cell,
    collections::{HashMap, HashSet},
    rc::Rc,
};

use cgmath::Point3;
use web_time::Duration;

use super::collaborators::{
    ChunkVisibility, DrawPass, DrawTarget, MeshBuilder, MeshPart, WeatherEffects,
};
use crate::error::BuildError;

/// A mesh part that only remembers which passes it has geometry for.
#[derive(Debug)]
pub struct FakePart {
    pub id: u32,
    pub normal: bool,
    pub translucent: bool,
    live_parts: Option<Rc<Cell<usize>>>,
}

impl FakePart {
    pub fn normal(id: u32) -> Self {
        Self::with_passes(id, true, false)
    }

    pub fn translucent(id: u32) -> Self {
        Self::with_passes(id, false, true)
    }

    pub fn both(id: u32) -> Self {
        Self::with_passes(id, true, true)
    }

    pub fn empty(id: u32) -> Self {
        Self::with_passes(id, false, false)
    }

    fn with_passes(id: u32, normal: bool, translucent: bool) -> Self {
        Self {
            id,
            normal,
            translucent,
            live_parts: None,
        }
    }

    fn tracked(mut self, live_parts: &Rc<Cell<usize>>) -> Self {
        live_parts.set(live_parts.get() + 1);
        self.live_parts = Some(live_parts.clone());
        self
    }
}

impl MeshPart for FakePart {
    fn has_geometry(&self, pass: DrawPass) -> bool {
        match pass {
            DrawPass::Normal => self.normal,
            DrawPass::Translucent => self.translucent,
        }
    }
}

impl Drop for FakePart {
    fn drop(&mut self) {
        if let Some(live_parts) = &self.live_parts {
            live_parts.set(live_parts.get() - 1);
        }
    }
}

/// Which passes a scripted part has geometry for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Normal,
    Translucent,
    Both,
}

/// Builds parts from a per-chunk script; unscripted chunks get one normal part
/// in batch 0.
#[derive(Debug, Default)]
pub struct ScriptedBuilder {
    layouts: HashMap<Point3<i32>, Vec<(usize, Layout)>>,
    failing: HashSet<Point3<i32>>,
    pub built: Vec<Point3<i32>>,
    pub live_parts: Rc<Cell<usize>>,
    next_id: u32,
}

impl ScriptedBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the parts `coords` is built with; an empty list builds an empty chunk.
    pub fn with_layout(mut self, coords: Point3<i32>, parts: Vec<(usize, Layout)>) -> Self {
        self.layouts.insert(coords, parts);
        self
    }

    pub fn set_layout(&mut self, coords: Point3<i32>, parts: Vec<(usize, Layout)>) {
        self.layouts.insert(coords, parts);
    }

    pub fn fail(&mut self, coords: Point3<i32>) {
        self.failing.insert(coords);
    }

    pub fn succeed(&mut self, coords: Point3<i32>) {
        self.failing.remove(&coords);
    }

    pub fn live_parts(&self) -> usize {
        self.live_parts.get()
    }
}

impl MeshBuilder for ScriptedBuilder {
    type Part = FakePart;

    fn build(
        &mut self,
        coords: Point3<i32>,
        used_atlas_count: usize,
    ) -> Result<Vec<Option<FakePart>>, BuildError> {
        self.built.push(coords);
        if self.failing.contains(&coords) {
            return Err(BuildError::Failed {
                coords,
                reason: "scripted failure".into(),
            });
        }

        let layout = self
            .layouts
            .get(&coords)
            .cloned()
            .unwrap_or_else(|| vec![(0, Layout::Normal)]);

        let mut parts: Vec<Option<FakePart>> = (0..used_atlas_count).map(|_| None).collect();
        for (batch, kind) in layout {
            self.next_id += 1;
            let part = match kind {
                Layout::Normal => FakePart::normal(self.next_id),
                Layout::Translucent => FakePart::translucent(self.next_id),
                Layout::Both => FakePart::both(self.next_id),
            };
            if let Some(slot) = parts.get_mut(batch) {
                *slot = Some(part.tracked(&self.live_parts));
            }
        }

        Ok(parts)
    }
}

/// A camera at a fixed position that sees every chunk except the hidden ones.
#[derive(Debug, Clone)]
pub struct FixedCamera {
    pub position: Point3<f32>,
    pub hidden: HashSet<Point3<i32>>,
    pub chunk_size: f32,
}

impl FixedCamera {
    pub fn at(x: f32, y: f32, z: f32) -> Self {
        Self {
            position: Point3::new(x, y, z),
            hidden: HashSet::new(),
            chunk_size: 16.0,
        }
    }

    pub fn hiding(mut self, coords: Point3<i32>) -> Self {
        self.hidden.insert(coords);
        self
    }
}

impl ChunkVisibility for FixedCamera {
    fn camera_position(&self) -> Point3<f32> {
        self.position
    }

    fn is_chunk_visible(&self, min: Point3<f32>, _max: Point3<f32>) -> bool {
        let coords = Point3::new(
            (min.x / self.chunk_size).floor() as i32,
            (min.y / self.chunk_size).floor() as i32,
            (min.z / self.chunk_size).floor() as i32,
        );
        !self.hidden.contains(&coords)
    }
}

/// One call made against a [`RecordingTarget`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawCall {
    Bind(usize),
    Submit(u32, DrawPass),
}

#[derive(Debug, Default)]
pub struct RecordingTarget {
    pub calls: Vec<DrawCall>,
}

impl RecordingTarget {
    pub fn binds(&self) -> Vec<usize> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                DrawCall::Bind(batch) => Some(*batch),
                DrawCall::Submit(..) => None,
            })
            .collect()
    }

    pub fn submitted_ids(&self) -> Vec<u32> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                DrawCall::Submit(id, _) => Some(*id),
                DrawCall::Bind(_) => None,
            })
            .collect()
    }
}

impl DrawTarget<FakePart> for RecordingTarget {
    fn bind_atlas(&mut self, batch: usize) {
        self.calls.push(DrawCall::Bind(batch));
    }

    fn submit(&mut self, part: &FakePart, pass: DrawPass) {
        self.calls.push(DrawCall::Submit(part.id, pass));
    }
}

#[derive(Debug, Default)]
pub struct RecordingWeather {
    pub advanced: Vec<Duration>,
    pub rendered: Vec<Duration>,
}

impl WeatherEffects for RecordingWeather {
    fn advance(&mut self, delta: Duration) {
        self.advanced.push(delta);
    }

    fn render(&mut self, delta: Duration) {
        self.rendered.push(delta);
    }
}
