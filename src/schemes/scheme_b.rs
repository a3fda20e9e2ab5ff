use std::collections::{HashMap, HashSet};

use rand_chacha::ChaCha20Rng;
use rand_core::SeedableRng;

use crate::crypto::{self, CtBlob, Key};
use crate::dataset::Point;
use crate::hilbert::HilbertCurve;
use crate::workload::Query;

use super::{
    apply_op, check_dimension, check_point, check_security_bits, intersect_all, Scheme,
    SchemeError, SchemeKind, SearchOutcome, UpdateOp,
};

pub const ENTRY_PT_LEN: usize = 16; // op(1) || pad(3) || file_id(u32) || code(u64)

const DST_KW: &[u8] = b"skq/scheme_b/kw/v1";
const DST_ADDR: &[u8] = b"skq/scheme_b/addr/v1";
const DST_ENC: &[u8] = b"skq/scheme_b/enc/v1";

/// Forward-private keyword index. The client keeps one update counter per
/// keyword; every update lands at a fresh PRF address derived from it, so
/// search cost grows with the keyword's whole update history.
pub struct KeywordChain {
    curve: HilbertCurve,
    max_files: u32,
    range_predicate: u64,
    master: Key,
    counters: HashMap<String, u64>,
    server: HashMap<[u8; 32], CtBlob<ENTRY_PT_LEN>>,
    rng: ChaCha20Rng,
}

impl KeywordChain {
    pub fn new(
        security_bits: u32,
        range_predicate: u64,
        max_files: u32,
        order: u32,
        dimension: u32,
        rng: &mut ChaCha20Rng,
    ) -> Result<Self, SchemeError> {
        check_security_bits(security_bits)?;
        check_dimension(dimension)?;
        if max_files == 0 {
            return Err(SchemeError::Unsupported("empty file space".into()));
        }
        let curve = HilbertCurve::new(order, dimension)
            .map_err(|e| SchemeError::Unsupported(e.to_string()))?;
        Ok(Self {
            curve,
            max_files,
            range_predicate,
            master: crypto::rand_bytes(rng),
            counters: HashMap::new(),
            server: HashMap::new(),
            rng: ChaCha20Rng::from_seed(crypto::rand_bytes(rng)),
        })
    }

    fn keyword_key(&self, keyword: &str) -> Key {
        crypto::prf(&self.master, DST_KW, &[keyword.as_bytes()])
    }

    pub fn history_len(&self, keyword: &str) -> u64 {
        self.counters.get(keyword).copied().unwrap_or(0)
    }

    fn decode(pt: &[u8; ENTRY_PT_LEN]) -> Result<(UpdateOp, u32, u64), SchemeError> {
        let op = UpdateOp::from_byte(pt[0]).ok_or(SchemeError::Corrupt("op byte"))?;
        let mut id = [0u8; 4];
        id.copy_from_slice(&pt[4..8]);
        let mut code = [0u8; 8];
        code.copy_from_slice(&pt[8..16]);
        Ok((op, u32::from_le_bytes(id), u64::from_le_bytes(code)))
    }
}

impl Scheme for KeywordChain {
    fn kind(&self) -> SchemeKind {
        SchemeKind::SchemeB
    }

    fn update(
        &mut self,
        point: Point,
        keywords: &[String],
        op: UpdateOp,
        file_ids: &[u32],
    ) -> Result<(), SchemeError> {
        check_point(point, self.curve.order())?;
        if let Some(&file_id) = file_ids.iter().find(|&&id| id >= self.max_files) {
            return Err(SchemeError::FileOutOfRange {
                file_id,
                max_files: self.max_files,
            });
        }
        let code = self.curve.index(point.x, point.y);
        if code >= self.range_predicate {
            return Err(SchemeError::BeyondRangePredicate {
                code,
                bound: self.range_predicate,
            });
        }

        for kw in keywords {
            let k_w = self.keyword_key(kw);
            let k_enc = crypto::prf(&k_w, DST_ENC, &[]);
            let counter = self.counters.entry(kw.clone()).or_insert(0);
            for &file_id in file_ids {
                let addr = crypto::prf(&k_w, DST_ADDR, &[&counter.to_le_bytes()]);
                let mut pt = [0u8; ENTRY_PT_LEN];
                pt[0] = op.to_byte();
                pt[4..8].copy_from_slice(&file_id.to_le_bytes());
                pt[8..16].copy_from_slice(&code.to_le_bytes());
                let blob = crypto::xchacha_encrypt_detached(&k_enc, &addr, &pt, &mut self.rng)?;
                self.server.insert(addr, blob);
                *counter += 1;
            }
        }
        Ok(())
    }

    fn search(&mut self, query: &Query) -> Result<SearchOutcome, SchemeError> {
        let cells: HashSet<u64> = query.cells.cells().iter().copied().collect();

        let mut per_keyword = Vec::with_capacity(query.keywords.len());
        for kw in &query.keywords {
            let k_w = self.keyword_key(kw);
            let k_enc = crypto::prf(&k_w, DST_ENC, &[]);
            let mut live = HashSet::new();
            for i in 0..self.history_len(kw) {
                let addr = crypto::prf(&k_w, DST_ADDR, &[&i.to_le_bytes()]);
                let blob = self
                    .server
                    .get(&addr)
                    .ok_or(SchemeError::Corrupt("missing chain entry"))?;
                let pt = crypto::xchacha_decrypt_detached(&k_enc, &addr, blob)?;
                let (op, file_id, code) = Self::decode(&pt)?;
                if cells.contains(&code) {
                    apply_op(&mut live, op, file_id);
                }
            }
            per_keyword.push(live);
        }

        Ok(SearchOutcome {
            matches: intersect_all(per_keyword),
        })
    }
}
