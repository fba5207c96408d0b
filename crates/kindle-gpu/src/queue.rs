//! Queue family selection.

use ash::vk;
use std::collections::BTreeSet;

/// Capabilities that count towards a family's specialization score.
const WORK_FLAGS: vk::QueueFlags = vk::QueueFlags::from_raw(
    vk::QueueFlags::GRAPHICS.as_raw()
        | vk::QueueFlags::COMPUTE.as_raw()
        | vk::QueueFlags::TRANSFER.as_raw(),
);

/// Partially resolved queue family indices.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: Option<u32>,
    pub compute: Option<u32>,
    pub transfer: Option<u32>,
    pub present: Option<u32>,
}

impl QueueFamilyIndices {
    /// All four roles resolved, if they are.
    #[must_use]
    pub fn complete(&self) -> Option<QueueFamilies> {
        Some(QueueFamilies {
            graphics: self.graphics?,
            compute: self.compute?,
            transfer: self.transfer?,
            present: self.present?,
        })
    }
}

/// Fully resolved queue family indices. Roles may share an index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub compute: u32,
    pub transfer: u32,
    pub present: u32,
}

impl QueueFamilies {
    /// Pick the narrowest family for each work role and a present-capable
    /// family.
    ///
    /// A family's score is the number of graphics/compute/transfer bits it
    /// carries; for every role the eligible family with the lowest score
    /// wins, first index on ties. Present support is not scored: the last
    /// family reporting support wins. Scanning stops once every role is
    /// filled.
    pub fn find<P>(families: &[vk::QueueFamilyProperties], mut supports_present: P) -> Option<Self>
    where
        P: FnMut(u32) -> bool,
    {
        let mut indices = QueueFamilyIndices::default();
        let mut scores = Vec::with_capacity(families.len());

        for (i, family) in (0u32..).zip(families) {
            let flags = family.queue_flags;
            scores.push((flags & WORK_FLAGS).as_raw().count_ones());

            consider(&mut indices.graphics, &scores, i, flags, vk::QueueFlags::GRAPHICS);
            consider(&mut indices.compute, &scores, i, flags, vk::QueueFlags::COMPUTE);
            consider(&mut indices.transfer, &scores, i, flags, vk::QueueFlags::TRANSFER);

            if supports_present(i) {
                indices.present = Some(i);
            }

            if let Some(resolved) = indices.complete() {
                return Some(resolved);
            }
        }

        None
    }

    /// Distinct family indices, ascending.
    #[must_use]
    pub fn unique(&self) -> Vec<u32> {
        [self.graphics, self.compute, self.transfer, self.present]
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Whether graphics and present run on different families.
    #[must_use]
    pub const fn split_present(&self) -> bool {
        self.graphics != self.present
    }
}

fn consider(
    slot: &mut Option<u32>,
    scores: &[u32],
    index: u32,
    flags: vk::QueueFlags,
    role: vk::QueueFlags,
) {
    if !flags.contains(role) {
        return;
    }
    let better = match *slot {
        None => true,
        Some(current) => scores[index as usize] < scores[current as usize],
    };
    if better {
        *slot = Some(index);
    }
}
