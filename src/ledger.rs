use crate::error::BoardError;
use crate::model::{Post, Reply, Stance};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    Cast(Stance),
    Withdrawn(Stance),
    Switched { from: Stance, to: Stance },
}

/// Casts `stance` for `user` on one reply of `post` and returns the updated
/// replies. Sibling replies are cloned unchanged; `post` itself is untouched.
pub fn cast_vote(
    post: &Post,
    reply_id: &str,
    user: &str,
    stance: Stance,
) -> Result<(Vec<Reply>, VoteOutcome), BoardError> {
    let mut outcome = None;
    let replies: Vec<Reply> = post
        .replies
        .iter()
        .map(|reply| {
            if reply.id != reply_id {
                return reply.clone();
            }
            let mut updated = reply.clone();
            outcome = Some(toggle(&mut updated, user, stance));
            updated
        })
        .collect();

    let outcome = outcome.ok_or_else(|| BoardError::ReplyNotFound {
        post_id: post.id.clone(),
        reply_id: reply_id.to_string(),
    })?;
    Ok((replies, outcome))
}

pub(crate) fn toggle(reply: &mut Reply, user: &str, stance: Stance) -> VoteOutcome {
    match reply.votes.get(user).copied() {
        None => {
            reply.votes.insert(user.to_string(), stance);
            bump(reply, stance);
            VoteOutcome::Cast(stance)
        }
        Some(existing) if existing == stance => {
            reply.votes.remove(user);
            drop_one(reply, stance);
            VoteOutcome::Withdrawn(stance)
        }
        Some(existing) => {
            reply.votes.insert(user.to_string(), stance);
            drop_one(reply, existing);
            bump(reply, stance);
            VoteOutcome::Switched {
                from: existing,
                to: stance,
            }
        }
    }
}

fn tally_mut(reply: &mut Reply, stance: Stance) -> &mut u32 {
    match stance {
        Stance::Bullish => &mut reply.bullish_votes,
        Stance::Bearish => &mut reply.bearish_votes,
    }
}

fn bump(reply: &mut Reply, stance: Stance) {
    let tally = tally_mut(reply, stance);
    *tally = tally.saturating_add(1);
}

fn drop_one(reply: &mut Reply, stance: Stance) {
    let tally = tally_mut(reply, stance);
    *tally = tally.saturating_sub(1);
}
