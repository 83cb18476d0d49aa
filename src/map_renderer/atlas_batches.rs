//! Per atlas batch occupancy, used to skip empty batches during drawing.
//!
//! Scanning every chunk for every batch each frame would dominate the render
//! cost, so the aggregator keeps a running count of contributing chunks per
//! batch and caches whether any *visible* chunk has normal or translucent
//! geometry in it. The cached flags are only recomputed for batches marked as
//! needing a check.
//!
//! Invariant: a batch with a zero part count never reports normal or
//! translucent parts.

use bitvec::prelude::*;

use super::collaborators::{DrawPass, MeshPart};
use crate::error::InitError;

/// Fixed capacity of the aggregator arrays.
pub const MAX_ATLASES_COUNT: usize = 256;

/// Occupancy counters and cached pass flags, indexed by atlas batch id.
#[derive(Debug, Clone)]
pub struct AtlasBatches {
    parts_count: Vec<u32>,
    has_normal_parts: BitVec,
    has_translucent_parts: BitVec,
    checking_normal_parts: BitVec,
    checking_translucent_parts: BitVec,
}

impl AtlasBatches {
    /// Creates the aggregator for `used_count` atlas batches.
    ///
    /// # Returns
    /// [`InitError::TooManyAtlases`] if `used_count` exceeds [`MAX_ATLASES_COUNT`]
    pub fn new(used_count: usize) -> Result<Self, InitError> {
        if used_count > MAX_ATLASES_COUNT {
            return Err(InitError::TooManyAtlases {
                requested: used_count,
                max: MAX_ATLASES_COUNT,
            });
        }

        Ok(Self {
            parts_count: vec![0; used_count],
            has_normal_parts: BitVec::repeat(false, used_count),
            has_translucent_parts: BitVec::repeat(false, used_count),
            checking_normal_parts: BitVec::repeat(false, used_count),
            checking_translucent_parts: BitVec::repeat(false, used_count),
        })
    }

    /// Number of atlas batches in use.
    pub fn used_count(&self) -> usize {
        self.parts_count.len()
    }

    /// Number of chunks contributing a part to `batch`.
    pub fn parts_count(&self, batch: usize) -> u32 {
        self.parts_count.get(batch).copied().unwrap_or(0)
    }

    /// Whether any visible chunk has geometry for `pass` in `batch`.
    pub fn has_parts(&self, batch: usize, pass: DrawPass) -> bool {
        bit(self.has_flags(pass), batch)
    }

    /// Whether any visible chunk has opaque geometry in `batch`.
    pub fn has_normal_parts(&self, batch: usize) -> bool {
        self.has_parts(batch, DrawPass::Normal)
    }

    /// Whether any visible chunk has translucent geometry in `batch`.
    pub fn has_translucent_parts(&self, batch: usize) -> bool {
        self.has_parts(batch, DrawPass::Translucent)
    }

    /// Whether the cached `pass` flag of `batch` must be recomputed.
    pub fn needs_check(&self, batch: usize, pass: DrawPass) -> bool {
        bit(self.checking_flags(pass), batch)
    }

    /// Whether any batch has a pending recheck.
    pub fn any_pending_checks(&self) -> bool {
        self.checking_normal_parts.any() || self.checking_translucent_parts.any()
    }

    /// Batches with at least one pending recheck, in ascending order.
    pub fn batches_needing_check(&self) -> Vec<usize> {
        (0..self.used_count())
            .filter(|&batch| {
                bit(&self.checking_normal_parts, batch)
                    || bit(&self.checking_translucent_parts, batch)
            })
            .collect()
    }

    /// Counts a newly installed part and schedules a recheck of its batch.
    pub(crate) fn add_part<P: MeshPart>(&mut self, batch: usize, part: &P) {
        if let Some(count) = self.parts_count.get_mut(batch) {
            *count += 1;
            self.mark_part_changed(batch, part);
        } else {
            log::error!(
                "Ignoring part for atlas batch {} ({} batches in use)",
                batch,
                self.used_count()
            );
        }
    }

    /// Uncounts a retired part and schedules a recheck of its batch.
    pub(crate) fn remove_part<P: MeshPart>(&mut self, batch: usize, part: &P) {
        let Some(count) = self.parts_count.get_mut(batch) else {
            return;
        };
        *count = count.saturating_sub(1);

        if *count == 0 {
            for flags in [
                &mut self.has_normal_parts,
                &mut self.has_translucent_parts,
                &mut self.checking_normal_parts,
                &mut self.checking_translucent_parts,
            ] {
                flags.set(batch, false);
            }
        } else {
            self.mark_part_changed(batch, part);
        }
    }

    /// Schedules a recheck for every pass `part` has geometry for.
    pub(crate) fn mark_part_changed<P: MeshPart>(&mut self, batch: usize, part: &P) {
        if batch >= self.used_count() || self.parts_count[batch] == 0 {
            return;
        }
        if part.has_geometry(DrawPass::Normal) {
            self.checking_normal_parts.set(batch, true);
        }
        if part.has_geometry(DrawPass::Translucent) {
            self.checking_translucent_parts.set(batch, true);
        }
    }

    /// Stores the result of a recheck and clears the pending flags of `batch`.
    pub(crate) fn resolve(&mut self, batch: usize, has_normal: bool, has_translucent: bool) {
        if batch >= self.used_count() {
            return;
        }
        let occupied = self.parts_count[batch] > 0;
        self.has_normal_parts.set(batch, occupied && has_normal);
        self.has_translucent_parts.set(batch, occupied && has_translucent);
        self.checking_normal_parts.set(batch, false);
        self.checking_translucent_parts.set(batch, false);
    }

    /// Forgets every part, as after all chunks have been released.
    pub(crate) fn reset(&mut self) {
        self.parts_count.fill(0);
        self.has_normal_parts.fill(false);
        self.has_translucent_parts.fill(false);
        self.checking_normal_parts.fill(false);
        self.checking_translucent_parts.fill(false);
    }

    fn has_flags(&self, pass: DrawPass) -> &BitVec {
        match pass {
            DrawPass::Normal => &self.has_normal_parts,
            DrawPass::Translucent => &self.has_translucent_parts,
        }
    }

    fn checking_flags(&self, pass: DrawPass) -> &BitVec {
        match pass {
            DrawPass::Normal => &self.checking_normal_parts,
            DrawPass::Translucent => &self.checking_translucent_parts,
        }
    }
}

fn bit(flags: &BitVec, index: usize) -> bool {
    flags.get(index).is_some_and(|flag| *flag)
}
