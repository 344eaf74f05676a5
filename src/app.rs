use crate::collector::{self, Direction, RelationSource};
use crate::delta;
use crate::snapshot::{self, Snapshot};
use crate::twitter_client::{ApiError, Relation};
use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use log::{debug, info};
use std::path::PathBuf;

/// Everything one run needs, resolved and validated up front.
#[derive(Clone, Debug)]
pub struct RunConfig {
    pub account: String,
    pub direction: Direction,
    pub data_dir: PathBuf,
}

impl RunConfig {
    fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join(&self.account)
    }
}

/// One full run: fetch the current followship, diff it against the stored
/// snapshot, print the report, persist the merged new state.
///
/// Being rate limited ends the run early with a wait estimate on stderr and
/// a success status; it is an expected operating condition, not a bug.  The
/// snapshot is left untouched in that case.
pub async fn run<S: RelationSource + Sync>(config: &RunConfig, source: &S) -> Result<()> {
    info!("generating followship delta for '{}'", config.account);

    let (followers, friends) = match fetch_current(config, source).await {
        Ok(lists) => lists,
        Err(err) => {
            if let Some(ApiError::RateLimited { reset }) = err.downcast_ref::<ApiError>() {
                report_rate_limit(*reset);
                return Ok(());
            }
            return Err(err);
        }
    };

    let path = config.snapshot_path();
    let prior = snapshot::load(&path)?;
    let delta = delta::compute(
        config.direction,
        &followers,
        &prior.followers,
        &friends,
        &prior.friends,
    );
    print!("{}", delta.render(&config.account));

    // A direction we did not fetch keeps its previous listing; only fetched
    // lists may overwrite stored state.
    let next = Snapshot {
        followers: match config.direction {
            Direction::Up => prior.followers,
            _ => followers,
        },
        friends: match config.direction {
            Direction::Down => prior.friends,
            _ => friends,
        },
    };
    snapshot::save(&path, &next)
}

async fn fetch_current<S: RelationSource + Sync>(
    config: &RunConfig,
    source: &S,
) -> Result<(Vec<String>, Vec<String>)> {
    let account = source.user_by_username(&config.account).await?;
    debug!("resolved '{}' to user id {}", config.account, account.id);
    let followers =
        collector::collect(source, Relation::Followers, &account.id, config.direction).await?;
    let friends =
        collector::collect(source, Relation::Friends, &account.id, config.direction).await?;
    Ok((followers, friends))
}

fn report_rate_limit(reset: DateTime<Utc>) {
    let wait = (reset - Utc::now()).num_seconds().max(0);
    let minutes = wait / 60;
    let seconds = wait % 60;
    let plural = if minutes == 1 { "" } else { "s" };
    eprintln!(
        "Rate throttling in effect. Try again in {minutes} minute{plural} and {seconds} seconds."
    );
    eprintln!("Try again at {}.", reset.with_timezone(&Local));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::twitter_client::api;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use chrono::Duration;
    use std::fs;
    use tempfile::TempDir;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|name| name.to_string()).collect()
    }

    fn config(dir: &TempDir, direction: Direction) -> RunConfig {
        RunConfig {
            account: "jdoe".to_string(),
            direction,
            data_dir: dir.path().to_path_buf(),
        }
    }

    /// Serves each relation as a single fixed page.
    struct FixedSource {
        followers: Vec<&'static str>,
        friends: Vec<&'static str>,
    }

    #[async_trait]
    impl RelationSource for FixedSource {
        async fn user_by_username(&self, screen_name: &str) -> Result<api::User> {
            Ok(api::User {
                id: "42".to_string(),
                name: screen_name.to_string(),
                username: screen_name.to_string(),
            })
        }

        async fn relation_page(
            &self,
            relation: Relation,
            _user_id: &str,
            _pagination_token: Option<&String>,
        ) -> Result<(Vec<api::User>, Option<String>)> {
            let list = match relation {
                Relation::Followers => &self.followers,
                Relation::Friends => &self.friends,
            };
            let users = list
                .iter()
                .map(|name| api::User {
                    id: format!("id-{name}"),
                    name: name.to_string(),
                    username: name.to_string(),
                })
                .collect();
            Ok((users, None))
        }
    }

    /// Every list fetch hits the rate limit.
    struct ThrottledSource;

    #[async_trait]
    impl RelationSource for ThrottledSource {
        async fn user_by_username(&self, screen_name: &str) -> Result<api::User> {
            Ok(api::User {
                id: "42".to_string(),
                name: screen_name.to_string(),
                username: screen_name.to_string(),
            })
        }

        async fn relation_page(
            &self,
            _relation: Relation,
            _user_id: &str,
            _pagination_token: Option<&String>,
        ) -> Result<(Vec<api::User>, Option<String>)> {
            Err(ApiError::RateLimited {
                reset: Utc::now() + Duration::minutes(5),
            }
            .into())
        }
    }

    /// Fails with something other than rate limiting.
    struct BrokenSource;

    #[async_trait]
    impl RelationSource for BrokenSource {
        async fn user_by_username(&self, _screen_name: &str) -> Result<api::User> {
            Err(anyhow!("connection reset"))
        }

        async fn relation_page(
            &self,
            _relation: Relation,
            _user_id: &str,
            _pagination_token: Option<&String>,
        ) -> Result<(Vec<api::User>, Option<String>)> {
            Err(anyhow!("connection reset"))
        }
    }

    #[tokio::test]
    async fn first_run_persists_the_initial_listing() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir, Direction::Both);
        let source = FixedSource {
            followers: vec!["bob", "alice"],
            friends: vec![],
        };
        run(&config, &source).await.unwrap();

        let stored = snapshot::load(&config.snapshot_path()).unwrap();
        assert_eq!(stored.followers, names(&["alice", "bob"]));
        assert!(stored.friends.is_empty());
    }

    #[tokio::test]
    async fn an_up_run_carries_prior_followers_forward() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir, Direction::Up);
        snapshot::save(
            &config.snapshot_path(),
            &Snapshot {
                followers: names(&["old_follower"]),
                friends: names(&["old_friend"]),
            },
        )
        .unwrap();

        let source = FixedSource {
            followers: vec!["brand_new_follower"],
            friends: vec!["new_friend"],
        };
        run(&config, &source).await.unwrap();

        let stored = snapshot::load(&config.snapshot_path()).unwrap();
        assert_eq!(stored.followers, names(&["old_follower"]));
        assert_eq!(stored.friends, names(&["new_friend"]));
    }

    #[tokio::test]
    async fn a_down_run_carries_prior_friends_forward() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir, Direction::Down);
        snapshot::save(
            &config.snapshot_path(),
            &Snapshot {
                followers: names(&["old_follower"]),
                friends: names(&["old_friend"]),
            },
        )
        .unwrap();

        let source = FixedSource {
            followers: vec!["new_follower"],
            friends: vec!["brand_new_friend"],
        };
        run(&config, &source).await.unwrap();

        let stored = snapshot::load(&config.snapshot_path()).unwrap();
        assert_eq!(stored.followers, names(&["new_follower"]));
        assert_eq!(stored.friends, names(&["old_friend"]));
    }

    #[tokio::test]
    async fn a_rate_limited_run_leaves_the_snapshot_untouched() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir, Direction::Both);
        let path = config.snapshot_path();
        snapshot::save(
            &path,
            &Snapshot {
                followers: names(&["alice"]),
                friends: names(&["bob"]),
            },
        )
        .unwrap();
        let before = fs::read_to_string(&path).unwrap();

        run(&config, &ThrottledSource).await.unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), before);
    }

    #[tokio::test]
    async fn a_rate_limited_first_run_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir, Direction::Both);
        run(&config, &ThrottledSource).await.unwrap();
        assert!(!config.snapshot_path().exists());
    }

    #[tokio::test]
    async fn other_source_errors_are_fatal() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir, Direction::Both);
        assert!(run(&config, &BrokenSource).await.is_err());
        assert!(!config.snapshot_path().exists());
    }
}
