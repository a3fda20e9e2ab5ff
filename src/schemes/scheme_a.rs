use std::collections::{HashMap, HashSet};

use rand_chacha::ChaCha20Rng;
use rand_core::SeedableRng;

use crate::crypto::{self, CtBlob, Key};
use crate::dataset::Point;
use crate::hilbert::HilbertCurve;
use crate::workload::Query;

use super::{
    apply_op, check_dimension, check_point, intersect_all, Scheme, SchemeError, SchemeKind,
    SearchOutcome, UpdateOp,
};

pub const ENTRY_PT_LEN: usize = 8; // op(1) || pad(3) || file_id(u32 LE)

const DST_TOKEN: &[u8] = b"skq/scheme_a/token/v1";

/// Inverted index keyed by PRF(keyword, hilbert prefix) at every level of
/// the curve, each holding an append-only log of encrypted (op, file) entries.
pub struct PrefixIndex {
    curve: HilbertCurve,
    max_files: u32,
    k_token: Key,
    k_entry: Key,
    index: HashMap<[u8; 32], Vec<CtBlob<ENTRY_PT_LEN>>>,
    rng: ChaCha20Rng,
}

impl PrefixIndex {
    pub fn new(
        max_files: u32,
        order: u32,
        dimension: u32,
        rng: &mut ChaCha20Rng,
    ) -> Result<Self, SchemeError> {
        check_dimension(dimension)?;
        if max_files == 0 {
            return Err(SchemeError::Unsupported("empty file space".into()));
        }
        let curve = HilbertCurve::new(order, dimension)
            .map_err(|e| SchemeError::Unsupported(e.to_string()))?;
        Ok(Self {
            curve,
            max_files,
            k_token: crypto::rand_bytes(rng),
            k_entry: crypto::rand_bytes(rng),
            index: HashMap::new(),
            rng: ChaCha20Rng::from_seed(crypto::rand_bytes(rng)),
        })
    }

    fn token(&self, keyword: &str, level: u32, prefix: u64) -> [u8; 32] {
        crypto::prf(
            &self.k_token,
            DST_TOKEN,
            &[keyword.as_bytes(), &level.to_le_bytes(), &prefix.to_le_bytes()],
        )
    }

    pub fn token_count(&self) -> usize {
        self.index.len()
    }

    /// Live files under one token, replaying its log in order.
    fn replay(&self, token: &[u8; 32], into: &mut HashSet<u32>) -> Result<(), SchemeError> {
        let Some(log) = self.index.get(token) else {
            return Ok(());
        };
        let mut live = HashSet::new();
        for blob in log {
            let pt = crypto::xchacha_decrypt_detached(&self.k_entry, token, blob)?;
            let op = UpdateOp::from_byte(pt[0]).ok_or(SchemeError::Corrupt("op byte"))?;
            let file_id = u32::from_le_bytes([pt[4], pt[5], pt[6], pt[7]]);
            apply_op(&mut live, op, file_id);
        }
        into.extend(live);
        Ok(())
    }
}

impl Scheme for PrefixIndex {
    fn kind(&self) -> SchemeKind {
        SchemeKind::SchemeA
    }

    fn update(
        &mut self,
        point: Point,
        keywords: &[String],
        op: UpdateOp,
        file_ids: &[u32],
    ) -> Result<(), SchemeError> {
        let order = self.curve.order();
        check_point(point, order)?;
        if let Some(&file_id) = file_ids.iter().find(|&&id| id >= self.max_files) {
            return Err(SchemeError::FileOutOfRange {
                file_id,
                max_files: self.max_files,
            });
        }

        let code = self.curve.index(point.x, point.y);
        for kw in keywords {
            for level in 0..=order {
                let prefix = code >> (2 * (order - level));
                let token = self.token(kw, level, prefix);
                for &file_id in file_ids {
                    let mut pt = [0u8; ENTRY_PT_LEN];
                    pt[0] = op.to_byte();
                    pt[4..8].copy_from_slice(&file_id.to_le_bytes());
                    let blob =
                        crypto::xchacha_encrypt_detached(&self.k_entry, &token, &pt, &mut self.rng)?;
                    self.index.entry(token).or_default().push(blob);
                }
            }
        }
        Ok(())
    }

    fn search(&mut self, query: &Query) -> Result<SearchOutcome, SchemeError> {
        let blocks = cover_blocks(query.cells.cells(), self.curve.order());

        let mut per_keyword = Vec::with_capacity(query.keywords.len());
        for kw in &query.keywords {
            let mut found = HashSet::new();
            for &(level, prefix) in &blocks {
                let token = self.token(kw, level, prefix);
                self.replay(&token, &mut found)?;
            }
            per_keyword.push(found);
        }

        Ok(SearchOutcome {
            matches: intersect_all(per_keyword),
        })
    }
}

/// Covers a set of curve codes with maximal aligned quad-blocks, returned as
/// `(level, prefix)` where level 0 is the whole grid and `order` a single cell.
pub fn cover_blocks(codes: &[u64], order: u32) -> Vec<(u32, u64)> {
    let mut sorted = codes.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut out = Vec::new();
    let mut i = 0;
    while i < sorted.len() {
        let start = sorted[i];
        let mut run = 1usize;
        while i + run < sorted.len() && sorted[i + run] == start + run as u64 {
            run += 1;
        }

        let end = start + run as u64;
        let mut c = start;
        while c < end {
            let mut k = 0u32;
            while k < order {
                let next = 1u64 << (2 * (k + 1));
                if c % next != 0 || c + next > end {
                    break;
                }
                k += 1;
            }
            out.push((order - k, c >> (2 * k)));
            c += 1u64 << (2 * k);
        }
        i += run;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemes::testing::{kws, query};

    fn index(order: u32) -> PrefixIndex {
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        PrefixIndex::new(1 << 10, order, 2, &mut rng).unwrap()
    }

    #[test]
    fn full_grid_is_one_block() {
        let curve = HilbertCurve::new(2, 2).unwrap();
        let codes: Vec<u64> = (0..4)
            .flat_map(|x| (0..4).map(move |y| (x, y)))
            .map(|(x, y)| curve.index(x, y))
            .collect();
        assert_eq!(cover_blocks(&codes, 2), vec![(0, 0)]);
    }

    #[test]
    fn blocks_partition_the_codes() {
        let codes = [3u64, 4, 5, 6, 7, 8, 20];
        let blocks = cover_blocks(&codes, 3);
        // 3 | 4..8 as one level-2 block | 8 | 20
        assert_eq!(blocks, vec![(3, 3), (2, 1), (3, 8), (3, 20)]);
        let covered: u64 = blocks.iter().map(|&(l, _)| 1u64 << (2 * (3 - l))).sum();
        assert_eq!(covered, codes.len() as u64);
    }

    #[test]
    fn finds_files_inside_window_only() {
        let mut s = index(4);
        s.update(Point { x: 1, y: 1 }, &kws(&["cafe", "wifi"]), UpdateOp::Add, &[1])
            .unwrap();
        s.update(Point { x: 2, y: 3 }, &kws(&["cafe"]), UpdateOp::Add, &[2])
            .unwrap();
        s.update(Point { x: 12, y: 12 }, &kws(&["cafe"]), UpdateOp::Add, &[3])
            .unwrap();

        assert_eq!(s.search(&query(4, 0, 0, 4, &["cafe"])).unwrap().matches, 2);
        assert_eq!(s.search(&query(4, 0, 0, 4, &["cafe", "wifi"])).unwrap().matches, 1);
        assert_eq!(s.search(&query(4, 0, 0, 16, &["cafe"])).unwrap().matches, 3);
        assert_eq!(s.search(&query(4, 0, 0, 4, &["bar"])).unwrap().matches, 0);
    }

    #[test]
    fn delete_hides_file_and_re_add_restores_it() {
        let mut s = index(3);
        let p = Point { x: 5, y: 2 };
        let kw = kws(&["park"]);
        s.update(p, &kw, UpdateOp::Add, &[7]).unwrap();
        s.update(p, &kw, UpdateOp::Del, &[7]).unwrap();
        assert_eq!(s.search(&query(3, 4, 0, 4, &["park"])).unwrap().matches, 0);
        s.update(p, &kw, UpdateOp::Add, &[7]).unwrap();
        assert_eq!(s.search(&query(3, 4, 0, 4, &["park"])).unwrap().matches, 1);
    }

    #[test]
    fn rejects_out_of_space_updates() {
        let mut s = index(3);
        let err = s
            .update(Point { x: 0, y: 0 }, &kws(&["a"]), UpdateOp::Add, &[1 << 10])
            .unwrap_err();
        assert!(matches!(err, SchemeError::FileOutOfRange { .. }));
        let err = s
            .update(Point { x: 8, y: 0 }, &kws(&["a"]), UpdateOp::Add, &[1])
            .unwrap_err();
        assert!(matches!(err, SchemeError::PointOutOfGrid { .. }));
    }

    #[test]
    fn one_token_per_keyword_and_level() {
        let mut s = index(3);
        s.update(Point { x: 0, y: 0 }, &kws(&["a", "b"]), UpdateOp::Add, &[1, 2])
            .unwrap();
        assert_eq!(s.token_count(), 2 * 4);
    }
}
