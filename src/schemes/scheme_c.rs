use std::collections::HashMap;

use rand_chacha::ChaCha20Rng;

use crate::crypto::{self, Key, AES_IV_LEN};
use crate::dataset::Point;
use crate::workload::Query;

use super::{check_point, check_security_bits, Scheme, SchemeError, SchemeKind, SearchOutcome, UpdateOp};

const DST_IV: &[u8] = b"skq/scheme_c/iv/v1";

/// Complete binary tree over one axis in heap layout: node 1 is the root,
/// leaves start at `2^order`. Each node holds an AES-CTR encrypted bitmap of
/// the objects whose coordinate falls under it.
struct AxisTree {
    axis: u8,
    leaves: usize,
    nodes: Vec<Vec<u8>>,
    versions: Vec<u64>,
}

impl AxisTree {
    fn build(axis: u8, order: u32, coords: &[(usize, u64)], bitmap_len: usize, key: &Key) -> Self {
        let leaves = 1usize << order;
        let mut nodes = vec![vec![0u8; bitmap_len]; 2 * leaves];
        for &(slot, c) in coords {
            let mut node = leaves + c as usize;
            while node >= 1 {
                set_bit(&mut nodes[node], slot, true);
                node /= 2;
            }
        }

        let mut tree = Self {
            axis,
            leaves,
            nodes,
            versions: vec![0; 2 * leaves],
        };
        for node in 1..2 * leaves {
            let iv = tree.iv(key, node);
            crypto::aes256ctr_apply(key, &iv, &mut tree.nodes[node]);
        }
        tree
    }

    fn iv(&self, key: &Key, node: usize) -> [u8; AES_IV_LEN] {
        let full = crypto::prf(
            key,
            DST_IV,
            &[&[self.axis], &(node as u64).to_le_bytes(), &self.versions[node].to_le_bytes()],
        );
        let mut iv = [0u8; AES_IV_LEN];
        iv.copy_from_slice(&full[..AES_IV_LEN]);
        iv
    }

    fn decrypt(&self, key: &Key, node: usize) -> Vec<u8> {
        let mut buf = self.nodes[node].clone();
        crypto::aes256ctr_apply(key, &self.iv(key, node), &mut buf);
        buf
    }

    /// Rewrites every node on the leaf-to-root path of `coord`.
    fn set_path(&mut self, key: &Key, coord: u64, slot: usize, on: bool) {
        let mut node = self.leaves + coord as usize;
        while node >= 1 {
            let mut plain = self.decrypt(key, node);
            set_bit(&mut plain, slot, on);
            self.versions[node] += 1;
            let iv = self.iv(key, node);
            crypto::aes256ctr_apply(key, &iv, &mut plain);
            self.nodes[node] = plain;
            node /= 2;
        }
    }

    /// OR of the canonical nodes covering `[lo, hi]`.
    fn range_union(&self, key: &Key, lo: u64, hi: u64, bitmap_len: usize) -> Vec<u8> {
        let mut acc = vec![0u8; bitmap_len];
        for node in canonical_nodes(self.leaves, lo, hi) {
            for (a, b) in acc.iter_mut().zip(self.decrypt(key, node)) {
                *a |= b;
            }
        }
        acc
    }
}

/// Heap indices of the minimal node set covering leaves `lo..=hi`.
fn canonical_nodes(leaves: usize, lo: u64, hi: u64) -> Vec<usize> {
    let mut out = Vec::new();
    let mut l = leaves + lo as usize;
    let mut r = leaves + hi as usize + 1;
    while l < r {
        if l & 1 == 1 {
            out.push(l);
            l += 1;
        }
        if r & 1 == 1 {
            r -= 1;
            out.push(r);
        }
        l >>= 1;
        r >>= 1;
    }
    out
}

fn set_bit(bitmap: &mut [u8], slot: usize, on: bool) {
    let mask = 1u8 << (slot % 8);
    if on {
        bitmap[slot / 8] |= mask;
    } else {
        bitmap[slot / 8] &= !mask;
    }
}

/// Range-only construction over a population fixed at setup. Keywords are
/// accepted and ignored.
pub struct AxisTrees {
    order: u32,
    key: Key,
    slots: HashMap<u32, usize>,
    bitmap_len: usize,
    x_tree: AxisTree,
    y_tree: AxisTree,
}

impl AxisTrees {
    pub fn new(
        security_bits: u32,
        order: u32,
        objects: &[(u32, Point)],
        rng: &mut ChaCha20Rng,
    ) -> Result<Self, SchemeError> {
        check_security_bits(security_bits)?;
        if order == 0 || order > 24 {
            return Err(SchemeError::Unsupported(format!("axis tree order {order}")));
        }

        let mut slots = HashMap::with_capacity(objects.len());
        let mut xs = Vec::with_capacity(objects.len());
        let mut ys = Vec::with_capacity(objects.len());
        for &(file_id, p) in objects {
            check_point(p, order)?;
            let slot = slots.len();
            if slots.insert(file_id, slot).is_some() {
                return Err(SchemeError::Unsupported(format!("duplicate file id {file_id}")));
            }
            xs.push((slot, p.x));
            ys.push((slot, p.y));
        }

        let bitmap_len = objects.len().div_ceil(8);
        let key: Key = crypto::rand_bytes(rng);
        Ok(Self {
            order,
            x_tree: AxisTree::build(0, order, &xs, bitmap_len, &key),
            y_tree: AxisTree::build(1, order, &ys, bitmap_len, &key),
            key,
            slots,
            bitmap_len,
        })
    }

    pub fn population(&self) -> usize {
        self.slots.len()
    }
}

impl Scheme for AxisTrees {
    fn kind(&self) -> SchemeKind {
        SchemeKind::SchemeC
    }

    fn update(
        &mut self,
        point: Point,
        _keywords: &[String],
        op: UpdateOp,
        file_ids: &[u32],
    ) -> Result<(), SchemeError> {
        check_point(point, self.order)?;
        let on = op == UpdateOp::Add;
        for file_id in file_ids {
            let slot = *self
                .slots
                .get(file_id)
                .ok_or(SchemeError::UnknownObject(*file_id))?;
            self.x_tree.set_path(&self.key, point.x, slot, on);
            self.y_tree.set_path(&self.key, point.y, slot, on);
        }
        Ok(())
    }

    fn search(&mut self, query: &Query) -> Result<SearchOutcome, SchemeError> {
        let w = query.window;
        if w.side_length == 0 {
            return Ok(SearchOutcome::default());
        }
        let edge = 1u64 << self.order;
        let (x_hi, y_hi) = (w.x_start + w.side_length - 1, w.y_start + w.side_length - 1);
        if x_hi >= edge || y_hi >= edge {
            return Err(SchemeError::PointOutOfGrid {
                x: x_hi,
                y: y_hi,
                edge,
            });
        }

        let xs = self.x_tree.range_union(&self.key, w.x_start, x_hi, self.bitmap_len);
        let ys = self.y_tree.range_union(&self.key, w.y_start, y_hi, self.bitmap_len);
        let matches = xs
            .iter()
            .zip(&ys)
            .map(|(a, b)| (a & b).count_ones() as usize)
            .sum();
        Ok(SearchOutcome { matches })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemes::testing::query;
    use rand_core::SeedableRng;

    fn trees(order: u32, objects: &[(u32, Point)]) -> AxisTrees {
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        AxisTrees::new(128, order, objects, &mut rng).unwrap()
    }

    fn p(x: u64, y: u64) -> Point {
        Point { x, y }
    }

    #[test]
    fn canonical_cover() {
        // 8 leaves at 8..16
        assert_eq!(canonical_nodes(8, 0, 7), vec![1]);
        let mut got = canonical_nodes(8, 1, 6);
        got.sort_unstable();
        assert_eq!(got, vec![5, 6, 9, 14]);
        assert_eq!(canonical_nodes(8, 3, 3), vec![11]);
    }

    #[test]
    fn counts_objects_in_window() {
        let s = &mut trees(4, &[(10, p(1, 1)), (20, p(3, 2)), (30, p(9, 9)), (40, p(1, 9))]);
        assert_eq!(s.population(), 4);
        assert_eq!(s.search(&query(4, 0, 0, 4, &[])).unwrap().matches, 2);
        assert_eq!(s.search(&query(4, 0, 0, 16, &[])).unwrap().matches, 4);
        assert_eq!(s.search(&query(4, 8, 8, 4, &[])).unwrap().matches, 1);
        assert_eq!(s.search(&query(4, 8, 8, 0, &[])).unwrap().matches, 0);
    }

    #[test]
    fn delete_and_re_add_toggle_membership() {
        let s = &mut trees(3, &[(1, p(2, 2)), (2, p(6, 6))]);
        s.update(p(2, 2), &[], UpdateOp::Del, &[1]).unwrap();
        assert_eq!(s.search(&query(3, 0, 0, 4, &[])).unwrap().matches, 0);
        s.update(p(2, 2), &[], UpdateOp::Add, &[1]).unwrap();
        assert_eq!(s.search(&query(3, 0, 0, 4, &[])).unwrap().matches, 1);
    }

    #[test]
    fn move_is_del_then_add() {
        let s = &mut trees(3, &[(1, p(2, 2))]);
        s.update(p(2, 2), &[], UpdateOp::Del, &[1]).unwrap();
        s.update(p(3, 3), &[], UpdateOp::Add, &[1]).unwrap();
        assert_eq!(s.search(&query(3, 3, 3, 1, &[])).unwrap().matches, 1);
        assert_eq!(s.search(&query(3, 2, 2, 1, &[])).unwrap().matches, 0);
    }

    #[test]
    fn rejects_unknown_objects_and_duplicates() {
        let s = &mut trees(3, &[(1, p(0, 0))]);
        let err = s.update(p(0, 0), &[], UpdateOp::Add, &[9]).unwrap_err();
        assert!(matches!(err, SchemeError::UnknownObject(9)));

        let mut rng = ChaCha20Rng::seed_from_u64(2);
        assert!(AxisTrees::new(128, 3, &[(1, p(0, 0)), (1, p(1, 1))], &mut rng).is_err());
    }
}
