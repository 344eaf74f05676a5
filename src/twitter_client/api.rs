use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Response<Data, Includes> {
    // NB: the v2 API omits `data` entirely for an empty page
    pub data: Option<Data>,
    pub includes: Option<Includes>,
    pub meta: Option<Meta>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Meta {
    pub next_token: Option<String>,
    pub result_count: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub username: String,
}
