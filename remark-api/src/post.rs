use uuid::Uuid;

use crate::{Error, OrderingKey, Time, UserId, STUB_UUID};

#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    Hash,
    PartialEq,
    bolero::generator::TypeGenerator,
    serde::Deserialize,
    serde::Serialize,
)]
pub struct PostId(#[generator(bolero::generator::gen_arbitrary())] pub Uuid);

impl PostId {
    pub fn stub() -> PostId {
        PostId(STUB_UUID)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Post {
    pub id: PostId,
    pub ordering_key: OrderingKey,
    pub author: UserId,
    pub title: String,
    pub created_at: Time,
    pub updated_at: Option<Time>,
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct NewPost {
    pub author: UserId,
    pub title: String,
}

impl NewPost {
    // See comments on the `validate` functions in lib.rs
    pub fn validate(&self) -> Result<(), Error> {
        crate::validate_contents(&self.title)
    }
}
