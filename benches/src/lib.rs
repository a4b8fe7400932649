use ark_bls12_381::Bls12_381;
use ark_std::rand::rngs::StdRng;
use incentive_system::prelude::*;

pub type E = Bls12_381;

/// Point dimensions the protocols are benchmarked with
pub const POINT_DIMENSIONS: [u32; 3] = [1, 2, 4];

/// A provider, a user and one promotion per entry of `POINT_DIMENSIONS`
pub struct Setup {
    pub rng: StdRng,
    pub params: PublicParameters<E>,
    pub provider: ProviderKeyPair<E>,
    pub user: UserKeyPair<E>,
    pub promotions: Vec<PromotionParameters>,
}

impl Setup {
    pub fn new(seed: u64) -> Self {
        let mut rng = test_utils::seeded_rng(seed);
        let params =
            PublicParameters::<E>::new(b"incentive-system-bench", SystemConfig::default()).unwrap();
        let provider = ProviderKeyPair::new(&mut rng, &params).unwrap();
        let secret_key = UserSecretKey::new(&mut rng);
        let signature = provider
            .issue_genesis_signature(&mut rng, &params, &secret_key.public_key(&params))
            .unwrap();
        let user = UserKeyPair::new(secret_key, signature, &params, &provider.public_key).unwrap();
        let promotions = POINT_DIMENSIONS
            .iter()
            .enumerate()
            .map(|(i, d)| PromotionParameters::new(i as u64, *d, &params).unwrap())
            .collect();
        Self {
            rng,
            params,
            provider,
            user,
            promotions,
        }
    }

    pub fn join(&mut self, promotion: &PromotionParameters) -> Token<E> {
        let (request, pending) = JoinRequest::new(
            &mut self.rng,
            &self.params,
            promotion,
            &self.provider.public_key,
            &self.user,
        )
        .unwrap();
        let response = JoinResponse::new(
            &mut self.rng,
            &self.params,
            promotion,
            &self.provider,
            &request,
        )
        .unwrap();
        pending
            .finalize(
                &self.params,
                promotion,
                &self.provider.public_key,
                &self.user,
                &response,
            )
            .unwrap()
    }

    pub fn earn(
        &self,
        promotion: &PromotionParameters,
        token: &Token<E>,
        amount: Vec<u64>,
    ) -> Token<E> {
        let request =
            EarnRequest::new(promotion, &self.user, token, amount, b"basket".to_vec()).unwrap();
        let response = EarnResponse::new(&self.params, promotion, &self.provider, &request).unwrap();
        request
            .finalize(
                &self.params,
                promotion,
                &self.provider.public_key,
                &self.user,
                token,
                &response,
            )
            .unwrap()
    }

    /// A token of `promotion` with 100 of every point type
    pub fn funded_token(&mut self, promotion: &PromotionParameters) -> Token<E> {
        let token = self.join(promotion);
        self.earn(promotion, &token, vec![100; promotion.dimension()])
    }

    pub fn spend(
        &self,
        graph: &SharedDoubleSpendingGraph<E>,
        promotion: &PromotionParameters,
        token: &Token<E>,
        policy: &SpendDeductTree,
        transaction_id: &TransactionId,
    ) -> Result<(Token<E>, SpendTransaction<E>)> {
        let new_points = token
            .points()
            .iter()
            .enumerate()
            .map(|(i, p)| if i == 0 { p - 1 } else { *p })
            .collect();
        let (request, pending) = SpendRequest::new(
            &self.params,
            promotion,
            &self.provider.public_key,
            &self.user,
            token,
            new_points,
            policy,
            transaction_id,
        )?;
        let (response, transaction) = SpendResponse::new(
            &self.params,
            promotion,
            &self.provider,
            &request,
            policy,
            transaction_id,
            graph,
        )?;
        let token = pending.finalize(
            &self.params,
            promotion,
            &self.provider.public_key,
            &self.user,
            &response,
        )?;
        Ok((token, transaction))
    }
}

/// Deducts 1 from the first point type of a token that has at least 1 of it
pub fn deduct_one(dimension: usize) -> SpendDeductTree {
    let mut update = TokenUpdateLeaf::new(dimension).with_update(0, 1, -1);
    for i in 1..dimension {
        update = update.with_update(i, 1, 0);
    }
    SpendDeductTree::and(
        SpendDeductTree::points(TokenPointsLeaf::new(dimension).with_lower_limit(0, 1)),
        SpendDeductTree::update(update),
    )
}
