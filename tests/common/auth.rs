use chrono::Utc;

use phrasebot::store::{LearnerId, Store};

/// Mints a token for `learner` and returns it as an Authorization header pair.
pub fn learner_auth(store: &Store, learner: LearnerId) -> (&'static str, String) {
    let token = store
        .generate_token(learner, Utc::now().timestamp())
        .expect("generate token");
    ("authorization", auth_header(&token))
}

pub fn auth_header(token: &str) -> String {
    format!("Bearer {token}")
}
