//! Connected component labeling using union-find.
//!
//! A single raster scan assigns provisional labels using 4-connectivity
//! (west and north neighbours), recording equivalences in an array-backed
//! disjoint set. A second pass rewrites every pixel with its set root and
//! tallies region sizes.
//!
//! Unions always keep the smaller root, so the canonical label of a region
//! is the first label handed out inside it. Labels are handed out in raster
//! order, which makes a lower label mean "discovered earlier".

use rayon::prelude::*;

use crate::image_utils::FOREGROUND;
use crate::rasterize::BinaryMask;

/// A connected region of foreground pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    /// Canonical (root) label, always > 0
    pub label: u32,
    /// Number of pixels carrying this label
    pub pixel_count: u64,
}

/// Per-pixel labels from connected component analysis.
///
/// 0 is background; every foreground pixel holds the root label of its
/// region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMap {
    width: u32,
    height: u32,
    labels: Vec<u32>,
}

impl LabelMap {
    #[inline]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Label at pixel (x, y)
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> u32 {
        self.labels[y as usize * self.width as usize + x as usize]
    }

    /// Raw labels in row-major order
    #[inline]
    pub fn labels(&self) -> &[u32] {
        &self.labels
    }
}

/// Disjoint set over provisional labels, scoped to one labeling call.
///
/// `parent[label]` points towards the set root; slot 0 is the background
/// and never joins a set.
struct DisjointSet {
    parent: Vec<u32>,
}

impl DisjointSet {
    fn new() -> Self {
        Self { parent: vec![0] }
    }

    /// Create a new singleton set and return its label
    fn make_set(&mut self) -> u32 {
        let label = self.parent.len() as u32;
        self.parent.push(label);
        label
    }

    /// Number of labels handed out so far
    fn len(&self) -> usize {
        self.parent.len() - 1
    }

    /// Find the root, compressing the path on the way back
    fn find(&mut self, label: u32) -> u32 {
        let mut root = label;
        while self.parent[root as usize] != root {
            root = self.parent[root as usize];
        }

        let mut current = label;
        while self.parent[current as usize] != root {
            let next = self.parent[current as usize];
            self.parent[current as usize] = root;
            current = next;
        }

        root
    }

    /// Merge two sets (smaller root wins)
    fn union(&mut self, a: u32, b: u32) {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a != root_b {
            let (smaller, larger) = if root_a < root_b {
                (root_a, root_b)
            } else {
                (root_b, root_a)
            };
            self.parent[larger as usize] = smaller;
        }
    }

    /// Resolve every label to its root, indexed by provisional label
    fn resolve_all(&mut self) -> Vec<u32> {
        (0..self.parent.len() as u32)
            .map(|label| self.find(label))
            .collect()
    }
}

/// Label the connected foreground regions of a mask.
///
/// Returns the label map together with one `Region` per canonical label,
/// ordered by ascending label.
pub fn label(mask: &BinaryMask) -> (LabelMap, Vec<Region>) {
    let (width, height) = mask.dimensions();
    let row_len = width as usize;
    let samples = mask.samples();
    let mut labels = vec![0u32; samples.len()];

    if samples.is_empty() {
        return (LabelMap { width, height, labels }, Vec::new());
    }

    // First pass: west/north neighbours are the only ones already visited
    let mut sets = DisjointSet::new();
    for y in 0..height as usize {
        for x in 0..row_len {
            let idx = y * row_len + x;
            if samples[idx] != FOREGROUND {
                continue;
            }

            let west = if x > 0 { labels[idx - 1] } else { 0 };
            let north = if y > 0 { labels[idx - row_len] } else { 0 };

            labels[idx] = match (west, north) {
                (0, 0) => sets.make_set(),
                (w, 0) => w,
                (0, n) => n,
                (w, n) => {
                    let min_label = w.min(n);
                    if w != n {
                        sets.union(min_label, w.max(n));
                    }
                    min_label
                }
            };
        }
    }

    // Second pass: rewrite with roots, rows are independent once resolved
    let roots = sets.resolve_all();
    labels.par_chunks_mut(row_len).for_each(|row| {
        for l in row.iter_mut() {
            *l = roots[*l as usize];
        }
    });

    let mut counts = vec![0u64; roots.len()];
    for &l in &labels {
        counts[l as usize] += 1;
    }

    let regions: Vec<Region> = counts
        .iter()
        .enumerate()
        .skip(1)
        .filter(|(_, &count)| count > 0)
        .map(|(label, &pixel_count)| Region {
            label: label as u32,
            pixel_count,
        })
        .collect();

    log::debug!(
        "Labeled {}x{} mask: {} provisional labels, {} regions",
        width, height, sets.len(), regions.len()
    );

    (LabelMap { width, height, labels }, regions)
}
