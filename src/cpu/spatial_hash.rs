// uniform-grid neighbor index, rebuilt from scratch every frame by counting sort
use glam::{IVec3, Vec3};

#[inline]
fn cell(pos: Vec3, spacing: f32) -> IVec3 {
    (pos / spacing).floor().as_ivec3()
}

pub struct SpatialHashGrid {
    spacing: f32,
    table_size: usize,
    // table_size + 1 entries; bucket b owns entries[cell_start[b]..cell_start[b + 1]]
    cell_start: Vec<usize>,
    cell_entries: Vec<usize>,
    bucket_scratch: Vec<usize>,
}

impl SpatialHashGrid {
    pub fn new(spacing: f32, max_particles: usize) -> Self {
        let table_size = 2 * max_particles;
        Self {
            spacing,
            table_size,
            cell_start: vec![0; table_size + 1],
            cell_entries: vec![0; max_particles],
            bucket_scratch: Vec::with_capacity(27),
        }
    }

    pub fn spacing(&self) -> f32 {
        self.spacing
    }

    /// Number of particles the entry table can index.
    pub fn max_particles(&self) -> usize {
        self.cell_entries.len()
    }

    pub fn table_size(&self) -> usize {
        self.table_size
    }

    /// Mixes integer cell coordinates into a bucket index. Only needs to spread evenly.
    #[inline]
    pub fn hash_coords(&self, c: IVec3) -> usize {
        let h = c.x.wrapping_mul(92_837_111) ^ c.y.wrapping_mul(689_287_499) ^ c.z.wrapping_mul(283_923_481);
        h.unsigned_abs() as usize % self.table_size
    }

    #[inline]
    fn hash_pos(&self, pos: Vec3) -> usize {
        self.hash_coords(cell(pos, self.spacing))
    }

    /// Sorts the first `count` particles into buckets. Particles beyond the
    /// entry table's size are ignored.
    pub fn rebuild(&mut self, positions: &[Vec3], count: usize) {
        if self.table_size == 0 {
            return;
        }
        let n = count.min(positions.len()).min(self.cell_entries.len());

        // occupants per bucket
        self.cell_start.fill(0);
        for pos in &positions[..n] {
            let h = self.hash_pos(*pos);
            self.cell_start[h] += 1;
        }

        // running sum: cell_start[b] is now the end of bucket b
        let mut start = 0;
        for slot in &mut self.cell_start[..self.table_size] {
            start += *slot;
            *slot = start;
        }
        self.cell_start[self.table_size] = start; // guard

        // scatter with a decrementing cursor; leaves cell_start[b] at the bucket's start
        for (i, pos) in positions[..n].iter().enumerate() {
            let h = self.hash_pos(*pos);
            self.cell_start[h] -= 1;
            self.cell_entries[self.cell_start[h]] = i;
        }
    }

    /// Collects into `out` every particle whose cell lies in the cube of cells
    /// covering `positions[i] ± max_dist`. A superset of the true neighbors;
    /// callers still apply the exact distance test.
    pub fn query(&mut self, positions: &[Vec3], i: usize, max_dist: f32, out: &mut Vec<usize>) {
        out.clear();
        if self.table_size == 0 {
            return;
        }
        let p = positions[i];
        let lo = cell(p - Vec3::splat(max_dist), self.spacing);
        let hi = cell(p + Vec3::splat(max_dist), self.spacing);

        // cells of the cube can collide into one bucket; scan each bucket once
        self.bucket_scratch.clear();
        for x in lo.x..=hi.x {
            for y in lo.y..=hi.y {
                for z in lo.z..=hi.z {
                    let h = self.hash_coords(IVec3::new(x, y, z));
                    self.bucket_scratch.push(h);
                }
            }
        }
        self.bucket_scratch.sort_unstable();
        self.bucket_scratch.dedup();

        for &h in &self.bucket_scratch {
            out.extend_from_slice(&self.cell_entries[self.cell_start[h]..self.cell_start[h + 1]]);
        }
    }
}
