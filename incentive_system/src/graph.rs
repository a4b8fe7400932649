//! Double-spending detection and tracing.
//!
//! The graph has a node per token, identified by its `dsid`, and a node per spend transaction. A
//! transaction consumes one token and, once traced, produces the token created in it. Only public data
//! is stored: the tags of transactions and the `dsid`s of tokens.
//!
//! When a token is consumed by two transactions with different `gamma`, the user's `usk` and the token's
//! `esk` are recovered from the tags. The token and all transactions consuming it become invalid and
//! with `esk` the trace ciphertexts of those transactions are decrypted to find the tokens they created,
//! which are invalidated in turn. Secret keys of tokens are recomputed from the tags when needed and
//! never kept in the graph.

use crate::{
    error::{IncentiveError, Result},
    keys::UserPublicKey,
    setup::PublicParameters,
    spend::SpendTransaction,
    tag::{DoubleSpendingTag, RecoveredSecrets},
    token::TransactionId,
    util::{group_elem_to_hex, to_bytes},
};
use ark_ec::{pairing::Pairing, CurveGroup};
use ark_std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    vec::Vec,
};
use incentive_utils::solve_discrete_log::DiscreteLogTable;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

#[derive(Clone)]
struct TokenNode<E: Pairing> {
    dsid: E::G1Affine,
    produced_by: Option<usize>,
    consumed_by: Vec<usize>,
    invalid: bool,
    double_spent: bool,
}

#[derive(Clone)]
struct TransactionNode<E: Pairing> {
    transaction_id: TransactionId,
    promotion_id: u64,
    /// The consumed token
    token: usize,
    tag: DoubleSpendingTag<E>,
    valid: bool,
    produces: Option<usize>,
}

/// Proof that a user spent a token twice
#[derive(Clone, PartialEq, Eq)]
pub struct DoubleSpendEvidence<E: Pairing> {
    pub dsid: E::G1Affine,
    pub user_public_key: UserPublicKey<E>,
    pub usk: E::ScalarField,
}

impl<E: Pairing> fmt::Debug for DoubleSpendEvidence<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DoubleSpendEvidence")
            .field("dsid", &self.dsid)
            .field("user_public_key", &self.user_public_key)
            .field("usk", &"<redacted>")
            .finish()
    }
}

/// Changes caused by a call to `db_sync`
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SyncReport<E: Pairing> {
    /// Tokens found to be double-spent in this call
    pub double_spends: Vec<DoubleSpendEvidence<E>>,
    pub invalidated_transactions: Vec<TransactionId>,
    pub invalidated_dsids: Vec<E::G1Affine>,
    /// Invalidated transactions whose trace ciphertexts could not be decrypted
    pub untraceable_transactions: Vec<TransactionId>,
}

impl<E: Pairing> Default for SyncReport<E> {
    fn default() -> Self {
        Self {
            double_spends: Vec::new(),
            invalidated_transactions: Vec::new(),
            invalidated_dsids: Vec::new(),
            untraceable_transactions: Vec::new(),
        }
    }
}

impl<E: Pairing> SyncReport<E> {
    pub fn is_empty(&self) -> bool {
        self.double_spends.is_empty()
            && self.invalidated_transactions.is_empty()
            && self.invalidated_dsids.is_empty()
            && self.untraceable_transactions.is_empty()
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct TransactionInfo<E: Pairing> {
    pub transaction_id: TransactionId,
    pub promotion_id: u64,
    pub gamma: E::ScalarField,
    /// `dsid` of the consumed token
    pub dsid: E::G1Affine,
    pub valid: bool,
    /// `dsid` of the token created by the transaction, known once it is traced
    pub produced_dsid: Option<E::G1Affine>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TokenStatus {
    /// Known from tracing but not spent yet
    Unspent,
    Spent,
    /// Spent in two different transactions
    DoubleSpent,
    /// Derived from a double-spent token
    Invalid,
}

#[derive(Clone)]
pub struct DoubleSpendingGraph<E: Pairing> {
    params: PublicParameters<E>,
    table: DiscreteLogTable<E::G1Affine>,
    tokens: Vec<TokenNode<E>>,
    transactions: Vec<TransactionNode<E>>,
    /// Compressed `dsid` -> token node
    token_index: BTreeMap<Vec<u8>, usize>,
    /// (transaction id, compressed `gamma`) -> transaction node
    transaction_index: BTreeMap<(TransactionId, Vec<u8>), usize>,
}

impl<E: Pairing> DoubleSpendingGraph<E> {
    pub fn new(params: &PublicParameters<E>) -> Self {
        Self {
            table: DiscreteLogTable::new(&params.w, params.config.esk_digit_bits),
            params: params.clone(),
            tokens: Vec::new(),
            transactions: Vec::new(),
            token_index: BTreeMap::new(),
            transaction_index: BTreeMap::new(),
        }
    }

    /// Records a spend transaction. Syncing a known transaction again changes nothing and gives an
    /// empty report.
    pub fn db_sync(&mut self, transaction: &SpendTransaction<E>) -> Result<SyncReport<E>> {
        let mut report = SyncReport::default();
        let key = (
            transaction.transaction_id.clone(),
            to_bytes(&transaction.tag.gamma)?,
        );
        if self.transaction_index.contains_key(&key) {
            debug!(transaction_id = %transaction.transaction_id, "transaction already synced");
            return Ok(report);
        }
        let token = self.token_node(&transaction.dsid)?;
        let tx = self.transactions.len();
        self.transactions.push(TransactionNode {
            transaction_id: transaction.transaction_id.clone(),
            promotion_id: transaction.promotion_id,
            token,
            tag: transaction.tag.clone(),
            valid: true,
            produces: None,
        });
        self.transaction_index.insert(key, tx);
        self.tokens[token].consumed_by.push(tx);
        info!(
            transaction_id = %transaction.transaction_id,
            dsid = %group_elem_to_hex(&transaction.dsid),
            "synced spend transaction"
        );

        if self.tokens[token].invalid || self.conflicting_spends(token).is_some() {
            let esk = self.recover_esk(token);
            self.invalidate(token, esk, &mut report);
        }
        Ok(report)
    }

    /// Check done before accepting a spend: the token must not be invalid or consumed by another
    /// transaction. A retry of the same transaction passes.
    ///
    /// Only reads the graph. The caller must `db_sync` the accepted transaction before serving
    /// the next spend, otherwise a second spend of the same token also passes.
    pub fn check_online(
        &self,
        dsid: &E::G1Affine,
        transaction_id: &TransactionId,
        gamma: &E::ScalarField,
    ) -> Result<()> {
        let Some(token) = self.find_token(dsid)? else {
            return Ok(());
        };
        let node = &self.tokens[token];
        let conflict = node.consumed_by.iter().any(|tx| {
            let tx = &self.transactions[*tx];
            tx.tag.gamma != *gamma || tx.transaction_id != *transaction_id
        });
        if node.invalid || conflict {
            let dsid = group_elem_to_hex(dsid);
            warn!(dsid = %dsid, transaction_id = %transaction_id, "rejected spend of a spent token");
            return Err(IncentiveError::DoubleSpendingDetected(dsid));
        }
        Ok(())
    }

    pub fn is_transaction_valid(
        &self,
        transaction_id: &TransactionId,
        gamma: &E::ScalarField,
    ) -> Result<bool> {
        Ok(self.transactions[self.find_transaction(transaction_id, gamma)?].valid)
    }

    pub fn get_transaction(
        &self,
        transaction_id: &TransactionId,
        gamma: &E::ScalarField,
    ) -> Result<TransactionInfo<E>> {
        let tx = &self.transactions[self.find_transaction(transaction_id, gamma)?];
        Ok(TransactionInfo {
            transaction_id: tx.transaction_id.clone(),
            promotion_id: tx.promotion_id,
            gamma: tx.tag.gamma,
            dsid: self.tokens[tx.token].dsid,
            valid: tx.valid,
            produced_dsid: tx.produces.map(|t| self.tokens[t].dsid),
        })
    }

    pub fn contains_dsid(&self, dsid: &E::G1Affine) -> Result<bool> {
        Ok(self.find_token(dsid)?.is_some())
    }

    pub fn token_status(&self, dsid: &E::G1Affine) -> Result<TokenStatus> {
        let token = self
            .find_token(dsid)?
            .ok_or_else(|| IncentiveError::UnknownDsid(group_elem_to_hex(dsid)))?;
        let node = &self.tokens[token];
        Ok(if node.double_spent {
            TokenStatus::DoubleSpent
        } else if node.invalid {
            TokenStatus::Invalid
        } else if node.consumed_by.is_empty() {
            TokenStatus::Unspent
        } else {
            TokenStatus::Spent
        })
    }

    pub fn num_tokens(&self) -> usize {
        self.tokens.len()
    }

    pub fn num_transactions(&self) -> usize {
        self.transactions.len()
    }

    /// Invalidates the token and everything derived from it using a worklist of `(token, esk)`
    fn invalidate(
        &mut self,
        start: usize,
        esk: Option<E::ScalarField>,
        report: &mut SyncReport<E>,
    ) {
        let mut worklist = vec![(start, esk)];
        let mut visited = BTreeSet::new();
        while let Some((token, esk)) = worklist.pop() {
            if !visited.insert(token) {
                continue;
            }
            let double_spend_esk = self.detect_double_spend(token, report);
            let node = &mut self.tokens[token];
            if !node.invalid {
                node.invalid = true;
                report.invalidated_dsids.push(node.dsid);
            }
            let esk = esk.or(double_spend_esk);
            for tx in self.tokens[token].consumed_by.clone() {
                let node = &mut self.transactions[tx];
                if node.valid {
                    node.valid = false;
                    report.invalidated_transactions.push(node.transaction_id.clone());
                }
                let Some(esk) = esk else {
                    report
                        .untraceable_transactions
                        .push(self.transactions[tx].transaction_id.clone());
                    continue;
                };
                match self.trace(tx, &esk) {
                    Ok((child, child_esk)) => worklist.push((child, Some(child_esk))),
                    Err(e) => {
                        let transaction_id = self.transactions[tx].transaction_id.clone();
                        warn!(transaction_id = %transaction_id, error = %e, "could not trace transaction");
                        report.untraceable_transactions.push(transaction_id);
                    }
                }
            }
        }
    }

    /// Decrypts the secret key of the token created by the transaction and links that token
    fn trace(&mut self, tx: usize, esk: &E::ScalarField) -> Result<(usize, E::ScalarField)> {
        let child_esk = self.transactions[tx]
            .tag
            .trace_new_esk(esk, &self.params, &self.table)?;
        let child_dsid = (self.params.w * child_esk).into_affine();
        let child = self.token_node(&child_dsid)?;
        if self.tokens[child].produced_by.is_none() {
            self.tokens[child].produced_by = Some(tx);
        }
        self.transactions[tx].produces = Some(child);
        Ok((child, child_esk))
    }

    /// Reports the token's double spend if it was not reported before and returns its `esk`
    fn detect_double_spend(
        &mut self,
        token: usize,
        report: &mut SyncReport<E>,
    ) -> Option<E::ScalarField> {
        let secrets = self.double_spend_secrets(token)?;
        let node = &mut self.tokens[token];
        if !node.double_spent {
            node.double_spent = true;
            let dsid = node.dsid;
            warn!(dsid = %group_elem_to_hex(&dsid), "double spending detected");
            report.double_spends.push(DoubleSpendEvidence {
                dsid,
                user_public_key: UserPublicKey((self.params.w * secrets.usk).into_affine()),
                usk: secrets.usk,
            });
        }
        Some(secrets.esk)
    }

    /// Two transactions consuming the token with different `gamma`
    fn conflicting_spends(&self, token: usize) -> Option<(usize, usize)> {
        let consumed_by = &self.tokens[token].consumed_by;
        let first = *consumed_by.first()?;
        let gamma = &self.transactions[first].tag.gamma;
        consumed_by
            .iter()
            .find(|tx| self.transactions[**tx].tag.gamma != *gamma)
            .map(|second| (first, *second))
    }

    /// Secrets recovered from a double spend of the token, if it was double-spent and the recovered
    /// `esk` matches its `dsid`
    fn double_spend_secrets(&self, token: usize) -> Option<RecoveredSecrets<E::ScalarField>> {
        let (first, second) = self.conflicting_spends(token)?;
        let secrets = self.transactions[first]
            .tag
            .recover_secrets(&self.transactions[second].tag)?;
        if (self.params.w * secrets.esk).into_affine() != self.tokens[token].dsid {
            warn!(
                dsid = %group_elem_to_hex(&self.tokens[token].dsid),
                "double spending tags are inconsistent with the dsid"
            );
            return None;
        }
        Some(secrets)
    }

    /// The token's `esk`, from its own double spend or by tracing down from a double-spent ancestor
    fn recover_esk(&self, token: usize) -> Option<E::ScalarField> {
        let mut path = Vec::new();
        let mut current = token;
        let mut esk = loop {
            if let Some(secrets) = self.double_spend_secrets(current) {
                break secrets.esk;
            }
            let tx = self.tokens[current].produced_by?;
            // A cycle is only possible with a malformed trace
            if path.len() > self.transactions.len() {
                return None;
            }
            path.push(tx);
            current = self.transactions[tx].token;
        };
        for tx in path.into_iter().rev() {
            esk = self.transactions[tx]
                .tag
                .trace_new_esk(&esk, &self.params, &self.table)
                .ok()?;
        }
        Some(esk)
    }

    fn token_node(&mut self, dsid: &E::G1Affine) -> Result<usize> {
        let key = to_bytes(dsid)?;
        if let Some(i) = self.token_index.get(&key) {
            return Ok(*i);
        }
        let i = self.tokens.len();
        self.tokens.push(TokenNode {
            dsid: *dsid,
            produced_by: None,
            consumed_by: Vec::new(),
            invalid: false,
            double_spent: false,
        });
        self.token_index.insert(key, i);
        Ok(i)
    }

    fn find_token(&self, dsid: &E::G1Affine) -> Result<Option<usize>> {
        Ok(self.token_index.get(&to_bytes(dsid)?).copied())
    }

    fn find_transaction(
        &self,
        transaction_id: &TransactionId,
        gamma: &E::ScalarField,
    ) -> Result<usize> {
        self.transaction_index
            .get(&(transaction_id.clone(), to_bytes(gamma)?))
            .copied()
            .ok_or_else(|| IncentiveError::UnknownTransaction(transaction_id.to_string()))
    }
}

/// The graph shared between threads. `db_sync` holds the write lock for the whole cascade and
/// queries take the read lock.
pub struct SharedDoubleSpendingGraph<E: Pairing>(Arc<RwLock<DoubleSpendingGraph<E>>>);

impl<E: Pairing> Clone for SharedDoubleSpendingGraph<E> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<E: Pairing> SharedDoubleSpendingGraph<E> {
    pub fn new(params: &PublicParameters<E>) -> Self {
        Self(Arc::new(RwLock::new(DoubleSpendingGraph::new(params))))
    }

    pub fn db_sync(&self, transaction: &SpendTransaction<E>) -> Result<SyncReport<E>> {
        self.0
            .write()
            .map_err(|_| IncentiveError::LockPoisoned)?
            .db_sync(transaction)
    }

    /// See [`DoubleSpendingGraph::check_online`]. Takes the read lock only, so a spend accepted
    /// here is not recorded until it goes through `db_sync`.
    pub fn check_online(
        &self,
        dsid: &E::G1Affine,
        transaction_id: &TransactionId,
        gamma: &E::ScalarField,
    ) -> Result<()> {
        self.read(|g| g.check_online(dsid, transaction_id, gamma))
    }

    pub fn is_transaction_valid(
        &self,
        transaction_id: &TransactionId,
        gamma: &E::ScalarField,
    ) -> Result<bool> {
        self.read(|g| g.is_transaction_valid(transaction_id, gamma))
    }

    pub fn get_transaction(
        &self,
        transaction_id: &TransactionId,
        gamma: &E::ScalarField,
    ) -> Result<TransactionInfo<E>> {
        self.read(|g| g.get_transaction(transaction_id, gamma))
    }

    pub fn contains_dsid(&self, dsid: &E::G1Affine) -> Result<bool> {
        self.read(|g| g.contains_dsid(dsid))
    }

    pub fn token_status(&self, dsid: &E::G1Affine) -> Result<TokenStatus> {
        self.read(|g| g.token_status(dsid))
    }

    fn read<T>(&self, f: impl FnOnce(&DoubleSpendingGraph<E>) -> Result<T>) -> Result<T> {
        f(&*self.0.read().map_err(|_| IncentiveError::LockPoisoned)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::SystemConfig;
    use ark_bls12_381::{Bls12_381, Fr, G1Affine};
    use ark_std::{
        rand::{rngs::StdRng, SeedableRng},
        UniformRand,
    };
    use incentive_utils::elgamal::encrypt_decomposed_message;

    /// A chain of tokens with known secrets where token `i + 1` is created by spending token `i`
    struct Chain {
        usk: Fr,
        esks: Vec<Fr>,
        dsrnds: Vec<(Fr, Fr)>,
    }

    impl Chain {
        fn new(rng: &mut StdRng, len: usize) -> Self {
            Self {
                usk: Fr::rand(rng),
                esks: (0..len).map(|_| Fr::rand(rng)).collect(),
                dsrnds: (0..len).map(|_| (Fr::rand(rng), Fr::rand(rng))).collect(),
            }
        }

        fn dsid(&self, params: &PublicParameters<Bls12_381>, i: usize) -> G1Affine {
            (params.w * self.esks[i]).into_affine()
        }

        /// Spend of token `i` creating token `i + 1`, or a token outside the chain for the last one
        fn spend(
            &self,
            rng: &mut StdRng,
            params: &PublicParameters<Bls12_381>,
            i: usize,
            transaction_id: &str,
        ) -> SpendTransaction<Bls12_381> {
            let gamma = Fr::rand(rng);
            let dsid = self.dsid(params, i);
            let next_esk = self.esks.get(i + 1).copied().unwrap_or_else(|| Fr::rand(rng));
            let esk_provider = Fr::rand(rng);
            let (trace_ciphertexts, _, _) = encrypt_decomposed_message(
                rng,
                &(next_esk - esk_provider),
                params.config.esk_digit_bits,
                &dsid,
                &params.w,
            )
            .unwrap();
            SpendTransaction {
                promotion_id: 1,
                transaction_id: TransactionId::from(transaction_id),
                dsid,
                tag: DoubleSpendingTag {
                    c0: self.usk * gamma + self.dsrnds[i].0,
                    c1: self.esks[i] * gamma + self.dsrnds[i].1,
                    gamma,
                    esk_provider,
                    trace_ciphertexts,
                },
            }
        }
    }

    fn params() -> PublicParameters<Bls12_381> {
        let config = SystemConfig {
            esk_digit_bits: 4,
            ..SystemConfig::default()
        };
        PublicParameters::new(b"test", config).unwrap()
    }

    #[test]
    fn detects_and_traces() {
        let mut rng = StdRng::seed_from_u64(0u64);
        let params = params();
        let mut graph = DoubleSpendingGraph::new(&params);
        let chain = Chain::new(&mut rng, 4);

        let honest = (0..3)
            .map(|i| chain.spend(&mut rng, &params, i, &format!("tx-{i}")))
            .collect::<Vec<_>>();
        for tx in &honest {
            assert!(graph.db_sync(tx).unwrap().is_empty());
        }
        assert_eq!(graph.num_tokens(), 3);
        assert_eq!(
            graph.token_status(&chain.dsid(&params, 0)).unwrap(),
            TokenStatus::Spent
        );
        assert!(!graph.contains_dsid(&chain.dsid(&params, 3)).unwrap());

        // Replays change nothing
        assert!(graph.db_sync(&honest[1]).unwrap().is_empty());
        assert_eq!(graph.num_transactions(), 3);

        // Spending token 1 again reveals usk and invalidates tokens 1, 2 and 3
        let double = chain.spend(&mut rng, &params, 1, "tx-double");
        let report = graph.db_sync(&double).unwrap();
        assert_eq!(report.double_spends.len(), 1);
        let evidence = &report.double_spends[0];
        assert_eq!(evidence.usk, chain.usk);
        assert_eq!(evidence.dsid, chain.dsid(&params, 1));
        assert_eq!(
            evidence.user_public_key.0,
            (params.w * chain.usk).into_affine()
        );
        assert!(!format!("{:?}", evidence).contains(&format!("{:?}", chain.usk)));
        for i in 1..4 {
            assert!(report.invalidated_dsids.contains(&chain.dsid(&params, i)));
        }
        assert!(!report.invalidated_dsids.contains(&chain.dsid(&params, 0)));
        let mut invalidated = report.invalidated_transactions.clone();
        invalidated.sort();
        assert_eq!(
            invalidated,
            vec![
                TransactionId::from("tx-1"),
                TransactionId::from("tx-2"),
                TransactionId::from("tx-double")
            ]
        );
        // The last token was never spent and is known only from tracing
        assert_eq!(
            graph.token_status(&chain.dsid(&params, 3)).unwrap(),
            TokenStatus::Invalid
        );
        assert_eq!(
            graph.token_status(&chain.dsid(&params, 1)).unwrap(),
            TokenStatus::DoubleSpent
        );
        assert!(graph
            .is_transaction_valid(&TransactionId::from("tx-0"), &honest[0].tag.gamma)
            .unwrap());
        let info = graph
            .get_transaction(&TransactionId::from("tx-2"), &honest[2].tag.gamma)
            .unwrap();
        assert!(!info.valid);
        assert_eq!(info.produced_dsid, Some(chain.dsid(&params, 3)));

        // A later spend of a traced token is invalid at once and the double spend is not reported again
        let late = chain.spend(&mut rng, &params, 3, "tx-late");
        let report = graph.db_sync(&late).unwrap();
        assert!(report.double_spends.is_empty());
        assert_eq!(report.invalidated_transactions, vec![TransactionId::from("tx-late")]);
        assert!(graph.db_sync(&late).unwrap().is_empty());

        assert!(matches!(
            graph.is_transaction_valid(&TransactionId::from("unknown"), &Fr::from(1u64)),
            Err(IncentiveError::UnknownTransaction(_))
        ));
        assert!(matches!(
            graph.token_status(&G1Affine::rand(&mut rng)),
            Err(IncentiveError::UnknownDsid(_))
        ));
    }

    #[test]
    fn online_check() {
        let mut rng = StdRng::seed_from_u64(1u64);
        let params = params();
        let mut graph = DoubleSpendingGraph::new(&params);
        let chain = Chain::new(&mut rng, 2);
        let tx = chain.spend(&mut rng, &params, 0, "a");
        graph
            .check_online(&tx.dsid, &tx.transaction_id, &tx.tag.gamma)
            .unwrap();
        graph.db_sync(&tx).unwrap();
        graph
            .check_online(&tx.dsid, &tx.transaction_id, &tx.tag.gamma)
            .unwrap();
        assert!(matches!(
            graph.check_online(&tx.dsid, &TransactionId::from("b"), &Fr::rand(&mut rng)),
            Err(IncentiveError::DoubleSpendingDetected(_))
        ));
    }

    #[test]
    fn undecryptable_trace() {
        let mut rng = StdRng::seed_from_u64(2u64);
        let params = params();
        let mut graph = DoubleSpendingGraph::new(&params);
        let chain = Chain::new(&mut rng, 2);
        let mut tx = chain.spend(&mut rng, &params, 0, "a");
        tx.tag.trace_ciphertexts[0].masked = G1Affine::rand(&mut rng);
        graph.db_sync(&tx).unwrap();
        let report = graph
            .db_sync(&chain.spend(&mut rng, &params, 0, "b"))
            .unwrap();
        assert_eq!(report.double_spends.len(), 1);
        assert_eq!(report.untraceable_transactions, vec![TransactionId::from("a")]);
        assert_eq!(report.invalidated_transactions.len(), 2);
        // The token created in "b" is still found through its valid ciphertexts
        assert_eq!(
            graph.token_status(&chain.dsid(&params, 1)).unwrap(),
            TokenStatus::Invalid
        );
    }
}
