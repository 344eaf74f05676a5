use crate::twitter_client::{api, Relation, TwitterClient};
use anyhow::Result;
use async_trait::async_trait;
use clap::ValueEnum;
use log::{debug, trace};

/// Which side(s) of the followship a run fetches and diffs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Direction {
    /// Only the accounts the user follows
    Up,
    /// Only the accounts following the user
    Down,
    /// Both sides
    Both,
}

// The API allows a fixed number of calls per rolling window.  Going in both
// directions splits that budget between the two lists; a single direction
// gets all of it.  We truncate rather than wait out the window: for a very
// popular account that wait could be days.
const MAX_PAGES_SHARED: usize = 70;
const MAX_PAGES_SINGLE: usize = 140;

/// Seam between the collector and the Twitter client, so tests can drive the
/// page loop without the network.
#[async_trait]
pub trait RelationSource {
    async fn user_by_username(&self, screen_name: &str) -> Result<api::User>;

    async fn relation_page(
        &self,
        relation: Relation,
        user_id: &str,
        pagination_token: Option<&String>,
    ) -> Result<(Vec<api::User>, Option<String>)>;
}

#[async_trait]
impl RelationSource for TwitterClient {
    async fn user_by_username(&self, screen_name: &str) -> Result<api::User> {
        TwitterClient::user_by_username(self, screen_name).await
    }

    async fn relation_page(
        &self,
        relation: Relation,
        user_id: &str,
        pagination_token: Option<&String>,
    ) -> Result<(Vec<api::User>, Option<String>)> {
        TwitterClient::relation_page(self, relation, user_id, pagination_token).await
    }
}

/// Fetch the full list for one relation, sorted and deduplicated.  Returns
/// an empty list without touching the API when `direction` excludes the
/// relation.
pub async fn collect<S: RelationSource + Sync>(
    source: &S,
    relation: Relation,
    user_id: &str,
    direction: Direction,
) -> Result<Vec<String>> {
    match (relation, direction) {
        (Relation::Followers, Direction::Up) | (Relation::Friends, Direction::Down) => {
            debug!("skipping {relation}, not needed going {direction:?}");
            return Ok(Vec::new());
        }
        _ => (),
    }

    let max_pages = match direction {
        Direction::Both => MAX_PAGES_SHARED,
        Direction::Up | Direction::Down => MAX_PAGES_SINGLE,
    };

    let mut names: Vec<String> = Vec::new();
    let mut pagination_token: Option<String> = None;
    let mut pages = 0;

    loop {
        let (users, next_token) = source
            .relation_page(relation, user_id, pagination_token.as_ref())
            .await?;
        pages += 1;
        let page_len = users.len();
        names.extend(users.into_iter().map(|user| user.username));
        trace!(
            "added {page_len} users ({} in total) from page #{pages}",
            names.len()
        );

        match next_token {
            None => break,
            Some(_) if pages >= max_pages => {
                debug!(
                    "reached my limit of {} users in {pages} pages, sorry",
                    names.len()
                );
                break;
            }
            Some(token) => pagination_token = Some(token),
        }
    }

    names.sort();
    names.dedup();
    Ok(names)
}
