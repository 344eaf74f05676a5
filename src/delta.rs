use crate::collector::Direction;
use itertools::Itertools;
use std::collections::HashSet;

const NAMES_PER_LINE: usize = 6;

/// Accounts gained and lost in each relation since the last snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Delta {
    pub new_followers: Vec<String>,
    pub gone_followers: Vec<String>,
    pub new_friends: Vec<String>,
    pub gone_friends: Vec<String>,
}

/// Diff the current lists against the prior snapshot.  Lists excluded by
/// `direction` were never fetched, so their delta is left empty rather than
/// reported as a mass unfollow.
pub fn compute(
    direction: Direction,
    followers: &[String],
    old_followers: &[String],
    friends: &[String],
    old_friends: &[String],
) -> Delta {
    let mut delta = Delta::default();

    if matches!(direction, Direction::Down | Direction::Both) {
        delta.new_followers = subtract(followers, old_followers);
        delta.gone_followers = subtract(old_followers, followers);
    }

    if matches!(direction, Direction::Up | Direction::Both) {
        delta.new_friends = subtract(friends, old_friends);
        delta.gone_friends = subtract(old_friends, friends);
    }

    delta
}

fn subtract(from: &[String], remove: &[String]) -> Vec<String> {
    let remove: HashSet<&str> = remove.iter().map(String::as_str).collect();
    from.iter()
        .filter(|name| !remove.contains(name.as_str()))
        .cloned()
        .collect()
}

impl Delta {
    pub fn is_empty(&self) -> bool {
        self.new_followers.is_empty()
            && self.gone_followers.is_empty()
            && self.new_friends.is_empty()
            && self.gone_friends.is_empty()
    }

    /// The operator-facing report.  Empty sets produce no output at all; an
    /// empty delta renders as the empty string.
    pub fn render(&self, account: &str) -> String {
        let mut out = String::new();
        section(
            &mut out,
            format!(
                "{account} is now followed by {} new users:",
                self.new_followers.len()
            ),
            &self.new_followers,
        );
        section(
            &mut out,
            format!(
                "{account} is no longer followed by {} users:",
                self.gone_followers.len()
            ),
            &self.gone_followers,
        );
        section(
            &mut out,
            format!(
                "{account} is now following {} new users:",
                self.new_friends.len()
            ),
            &self.new_friends,
        );
        section(
            &mut out,
            format!(
                "{account} is no longer following {} users:",
                self.gone_friends.len()
            ),
            &self.gone_friends,
        );
        out
    }
}

fn section(out: &mut String, header: String, names: &[String]) {
    if names.is_empty() {
        return;
    }
    out.push_str(&header);
    out.push('\n');
    for mut chunk in &names.iter().chunks(NAMES_PER_LINE) {
        out.push_str("  ");
        out.push_str(&chunk.join(", "));
        out.push('\n');
    }
}
