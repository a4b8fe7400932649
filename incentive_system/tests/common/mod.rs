#![allow(dead_code)]

use ark_bls12_381::Bls12_381;
use ark_std::rand::rngs::StdRng;
use incentive_system::prelude::*;

pub type E = Bls12_381;

/// Logs of the protocols are shown with `RUST_LOG=incentive_system=debug`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A provider with one promotion and a registered user
pub struct Fixture {
    pub rng: StdRng,
    pub params: PublicParameters<E>,
    pub promotion: PromotionParameters,
    pub provider: ProviderKeyPair<E>,
    pub user: UserKeyPair<E>,
    /// Graph used by the provider for the online check
    pub graph: SharedDoubleSpendingGraph<E>,
}

impl Fixture {
    pub fn new(seed: u64, point_dimension: u32) -> Self {
        init_tracing();
        let mut rng = test_utils::seeded_rng(seed);
        let config = SystemConfig {
            range_bits: 16,
            ..SystemConfig::default()
        };
        let params = PublicParameters::<E>::new(b"incentive-system-test", config).unwrap();
        let provider = ProviderKeyPair::new(&mut rng, &params).unwrap();
        let promotion = PromotionParameters::new(42, point_dimension, &params).unwrap();
        let user = Self::register(&mut rng, &params, &provider);
        let graph = SharedDoubleSpendingGraph::new(&params);
        Self {
            rng,
            params,
            promotion,
            provider,
            user,
            graph,
        }
    }

    pub fn register(
        rng: &mut StdRng,
        params: &PublicParameters<E>,
        provider: &ProviderKeyPair<E>,
    ) -> UserKeyPair<E> {
        let secret_key = UserSecretKey::new(rng);
        let signature = provider
            .issue_genesis_signature(rng, params, &secret_key.public_key(params))
            .unwrap();
        UserKeyPair::new(secret_key, signature, params, &provider.public_key).unwrap()
    }

    pub fn join(&mut self) -> Token<E> {
        let (request, pending) = JoinRequest::new(
            &mut self.rng,
            &self.params,
            &self.promotion,
            &self.provider.public_key,
            &self.user,
        )
        .unwrap();
        let response = JoinResponse::new(
            &mut self.rng,
            &self.params,
            &self.promotion,
            &self.provider,
            &request,
        )
        .unwrap();
        pending
            .finalize(
                &self.params,
                &self.promotion,
                &self.provider.public_key,
                &self.user,
                &response,
            )
            .unwrap()
    }

    pub fn earn(&self, token: &Token<E>, amount: Vec<u64>, basket_id: &str) -> Token<E> {
        let request = EarnRequest::new(
            &self.promotion,
            &self.user,
            token,
            amount,
            basket_id.as_bytes().to_vec(),
        )
        .unwrap();
        let response =
            EarnResponse::new(&self.params, &self.promotion, &self.provider, &request).unwrap();
        request
            .finalize(
                &self.params,
                &self.promotion,
                &self.provider.public_key,
                &self.user,
                token,
                &response,
            )
            .unwrap()
    }

    /// Runs spend with the provider's online check against `graph`
    pub fn spend_with(
        &self,
        graph: &SharedDoubleSpendingGraph<E>,
        token: &Token<E>,
        new_points: Vec<u64>,
        policy: &SpendDeductTree,
        transaction_id: &TransactionId,
    ) -> Result<(Token<E>, SpendTransaction<E>)> {
        let (request, pending) = SpendRequest::new(
            &self.params,
            &self.promotion,
            &self.provider.public_key,
            &self.user,
            token,
            new_points,
            policy,
            transaction_id,
        )?;
        let (response, transaction) = SpendResponse::new(
            &self.params,
            &self.promotion,
            &self.provider,
            &request,
            policy,
            transaction_id,
            graph,
        )?;
        let new_token = pending.finalize(
            &self.params,
            &self.promotion,
            &self.provider.public_key,
            &self.user,
            &response,
        )?;
        Ok((new_token, transaction))
    }

    pub fn spend(
        &self,
        token: &Token<E>,
        new_points: Vec<u64>,
        policy: &SpendDeductTree,
        transaction_id: &TransactionId,
    ) -> Result<(Token<E>, SpendTransaction<E>)> {
        self.spend_with(&self.graph, token, new_points, policy, transaction_id)
    }

    /// Spend `amount` of the first point type if the token has at least that much
    pub fn deduct_policy(&self, amount: u64) -> SpendDeductTree {
        let dimension = self.promotion.dimension();
        let mut update = TokenUpdateLeaf::new(dimension).with_update(0, 1, -(amount as i64));
        for i in 1..dimension {
            update = update.with_update(i, 1, 0);
        }
        SpendDeductTree::and(
            SpendDeductTree::points(TokenPointsLeaf::new(dimension).with_lower_limit(0, amount)),
            SpendDeductTree::update(update),
        )
    }
}
