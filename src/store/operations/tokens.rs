use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;

use crate::constants::AUTH_TOKEN_LENGTH;
use crate::store::keys;
use crate::store::{Bucket, LearnerId, Store, StoreError, Tx};

pub fn random_token() -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(AUTH_TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

impl Tx<'_> {
    fn current_token(&self, learner: LearnerId) -> Result<Option<(i64, String)>, StoreError> {
        let Some(raw) = self.get(Bucket::LearnerTokens, &keys::learner_key(learner))? else {
            return Ok(None);
        };
        let (issued_at, token) = keys::parse_stamped_value(&raw)
            .ok_or_else(|| StoreError::corrupt(Bucket::LearnerTokens, "short stamped value"))?;
        let token = String::from_utf8(token.to_vec())
            .map_err(|_| StoreError::corrupt(Bucket::LearnerTokens, "token is not utf-8"))?;
        Ok(Some((issued_at, token)))
    }

    fn issue_token(&mut self, learner: LearnerId, now: i64) -> Result<String, StoreError> {
        if let Some((_, previous)) = self.current_token(learner)? {
            self.remove(Bucket::Tokens, previous.as_bytes());
        }
        let token = random_token();
        self.put_u64(Bucket::Tokens, token.as_bytes(), learner);
        self.insert(
            Bucket::LearnerTokens,
            &keys::learner_key(learner),
            keys::stamped_value(now, token.as_bytes()),
        );
        // The first token issued marks registration.
        self.touch_register_date(learner, now)?;
        Ok(token)
    }
}

impl Store {
    /// Mints a new token for the learner; the previous one stops working.
    pub fn generate_token(&self, learner: LearnerId, now: i64) -> Result<String, StoreError> {
        let token = self.write(|tx| tx.issue_token(learner, now))?;
        tracing::info!(learner, "Auth token rotated");
        Ok(token)
    }

    /// The learner's live token, minted on first use.
    pub fn token_for_learner(&self, learner: LearnerId, now: i64) -> Result<String, StoreError> {
        self.write(|tx| match tx.current_token(learner)? {
            Some((_, token)) => Ok(token),
            None => tx.issue_token(learner, now),
        })
    }

    pub fn lookup_token(&self, token: &str) -> Result<LearnerId, StoreError> {
        self.read(|tx| {
            tx.get_u64(Bucket::Tokens, token.as_bytes())?
                .ok_or_else(|| StoreError::not_found("token", "<redacted>"))
        })
    }

    /// Issue time and value of the learner's live token.
    pub fn learner_token(&self, learner: LearnerId) -> Result<Option<(i64, String)>, StoreError> {
        self.read(|tx| tx.current_token(learner))
    }
}
